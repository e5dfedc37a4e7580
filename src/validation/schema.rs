use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

/// Field name used for failures that concern the body as a whole.
pub const BODY_FIELD: &str = "body";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Email,
}

/// The schema keyword a value failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Malformed,
    NotObject,
    Required,
    Type,
    Format(Format),
    MinLength(usize),
    MaxLength(usize),
    AdditionalProperty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: String,
    pub keyword: Keyword,
}

impl Violation {
    pub fn new(field: impl Into<String>, keyword: Keyword) -> Self {
        Self {
            field: field.into(),
            keyword,
        }
    }
}

/// Rule for one string property of a JSON object.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub required: bool,
    pub format: Option<Format>,
    pub min_len: Option<usize>,
    pub max_len: Option<usize>,
    /// Measure length after trimming surrounding whitespace.
    pub trim: bool,
}

impl FieldRule {
    pub const fn string(name: &'static str) -> Self {
        Self {
            name,
            required: false,
            format: None,
            min_len: None,
            max_len: None,
            trim: false,
        }
    }

    pub const fn trimmed(mut self) -> Self {
        self.trim = true;
        self
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn email(mut self) -> Self {
        self.format = Some(Format::Email);
        self
    }

    pub const fn min_len(mut self, n: usize) -> Self {
        self.min_len = Some(n);
        self
    }

    pub const fn max_len(mut self, n: usize) -> Self {
        self.max_len = Some(n);
        self
    }

    fn check(&self, value: Option<&Value>, out: &mut Vec<Violation>) {
        let value = match value {
            None | Some(Value::Null) => {
                if self.required {
                    out.push(Violation::new(self.name, Keyword::Required));
                }
                return;
            }
            Some(v) => v,
        };
        let Some(s) = value.as_str() else {
            out.push(Violation::new(self.name, Keyword::Type));
            return;
        };

        if let Some(Format::Email) = self.format {
            if !is_valid_email(s.trim()) {
                out.push(Violation::new(self.name, Keyword::Format(Format::Email)));
            }
        }
        let len = if self.trim { s.trim() } else { s }.chars().count();
        if let Some(min) = self.min_len.filter(|min| len < *min) {
            out.push(Violation::new(self.name, Keyword::MinLength(min)));
        }
        if let Some(max) = self.max_len.filter(|max| len > *max) {
            out.push(Violation::new(self.name, Keyword::MaxLength(max)));
        }
    }
}

/// Object schema. Checking reports every failure, in rule order, followed
/// by any unexpected properties.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub fields: &'static [FieldRule],
    pub additional_properties: bool,
}

impl Schema {
    pub fn check(&self, value: &Value) -> Vec<Violation> {
        let Some(obj) = value.as_object() else {
            return vec![Violation::new(BODY_FIELD, Keyword::NotObject)];
        };

        let mut out = Vec::new();
        for rule in self.fields {
            rule.check(obj.get(rule.name), &mut out);
        }
        if !self.additional_properties {
            for key in obj.keys() {
                if !self.fields.iter().any(|r| r.name == key) {
                    out.push(Violation::new(key.as_str(), Keyword::AdditionalProperty));
                }
            }
        }
        out
    }
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}
