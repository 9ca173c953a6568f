//! Tool Argument Validation
//!
//! Turns the untyped `arguments` object of a `tools/call` into typed,
//! fully-defaulted values. Every offending field is recorded; the caller gets
//! all of them at once from [`ArgReader::finish`].
//!
//! `null` is treated the same as an absent field.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// One invalid argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|e| e.field.as_str())
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid arguments: ")?;
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{} {}", error.field, error.message)?;
        }
        Ok(())
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Reads typed fields out of one JSON object, collecting errors
pub struct ArgReader<'a> {
    args: Option<&'a Map<String, Value>>,
    path: String,
    errors: Vec<FieldError>,
}

impl<'a> ArgReader<'a> {
    /// Reader over the top-level arguments. Absent arguments read as `{}`.
    pub fn new(args: &'a Value) -> Self {
        Self::at(args, String::new())
    }

    fn at(value: &'a Value, path: String) -> Self {
        let mut reader = Self {
            args: value.as_object(),
            path,
            errors: Vec::new(),
        };
        if !value.is_null() && !value.is_object() {
            let field = if reader.path.is_empty() {
                "arguments".to_string()
            } else {
                reader.path.clone()
            };
            reader.errors.push(FieldError {
                field,
                message: format!("must be an object, got {}", type_name(value)),
            });
        }
        reader
    }

    fn qualified(&self, field: &str) -> String {
        if self.path.is_empty() {
            field.to_string()
        } else if field.is_empty() {
            self.path.clone()
        } else {
            format!("{}.{}", self.path, field)
        }
    }

    pub fn error(&mut self, field: &str, message: impl Into<String>) {
        let field = self.qualified(field);
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    fn raw(&self, field: &str) -> Option<&'a Value> {
        self.args?.get(field).filter(|v| !v.is_null())
    }

    fn mismatch(&mut self, field: &str, expected: &str, got: &Value) {
        let message = format!("must be {}, got {}", expected, type_name(got));
        self.error(field, message);
    }

    pub fn optional_string(&mut self, field: &str) -> Option<String> {
        match self.raw(field)? {
            Value::String(s) => Some(s.clone()),
            other => {
                self.mismatch(field, "a string", other);
                None
            }
        }
    }

    /// Optional string where `""` counts as absent
    pub fn optional_text(&mut self, field: &str) -> Option<String> {
        self.optional_string(field).filter(|s| !s.is_empty())
    }

    /// Optional identifier; present values must be non-empty
    pub fn optional_id(&mut self, field: &str) -> Option<String> {
        let value = self.optional_string(field)?;
        if value.trim().is_empty() {
            self.error(field, "must not be empty");
            return None;
        }
        Some(value)
    }

    /// Required non-empty string. Returns `""` when invalid; the error is recorded.
    pub fn required_text(&mut self, field: &str) -> String {
        if self.raw(field).is_none() {
            self.error(field, "is required");
            return String::new();
        }
        self.optional_id(field).unwrap_or_default()
    }

    pub fn required_id(&mut self, field: &str) -> String {
        self.required_text(field)
    }

    pub fn optional_bool(&mut self, field: &str) -> Option<bool> {
        match self.raw(field)? {
            Value::Bool(b) => Some(*b),
            other => {
                self.mismatch(field, "a boolean", other);
                None
            }
        }
    }

    pub fn bool_or(&mut self, field: &str, default: bool) -> bool {
        self.optional_bool(field).unwrap_or(default)
    }

    /// Optional integer within `min..=max`
    pub fn optional_int(&mut self, field: &str, min: u64, max: u64) -> Option<u64> {
        let value = self.raw(field)?;
        match value.as_u64() {
            Some(n) if (min..=max).contains(&n) => Some(n),
            Some(_) => {
                self.error(field, format!("must be between {} and {}", min, max));
                None
            }
            None if value.is_number() => {
                self.error(field, format!("must be an integer between {} and {}", min, max));
                None
            }
            None => {
                self.mismatch(field, "an integer", value);
                None
            }
        }
    }

    /// One value out of a fixed table of names
    pub fn choice<T: Copy>(&mut self, field: &str, table: &[(&str, T)], default: T) -> T {
        let Some(name) = self.optional_string(field) else {
            return default;
        };
        match table.iter().find(|(n, _)| *n == name) {
            Some((_, value)) => *value,
            None => {
                let allowed: Vec<&str> = table.iter().map(|(n, _)| *n).collect();
                self.error(field, format!("must be one of: {}", allowed.join(", ")));
                default
            }
        }
    }

    pub fn optional_array(&mut self, field: &str) -> Option<&'a [Value]> {
        match self.raw(field)? {
            Value::Array(items) => Some(items.as_slice()),
            other => {
                self.mismatch(field, "an array", other);
                None
            }
        }
    }

    pub fn optional_string_array(&mut self, field: &str) -> Option<Vec<String>> {
        let items = self.optional_array(field)?;
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            match item.as_str() {
                Some(s) => out.push(s.to_string()),
                None => self.mismatch(&format!("{}[{}]", field, i), "a string", item),
            }
        }
        Some(out)
    }

    /// Array of names out of a fixed table
    pub fn optional_choices<T: Copy>(&mut self, field: &str, table: &[(&str, T)]) -> Option<Vec<T>> {
        let names = self.optional_string_array(field)?;
        let mut out = Vec::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            match table.iter().find(|(n, _)| n == name) {
                Some((_, value)) => out.push(*value),
                None => {
                    let allowed: Vec<&str> = table.iter().map(|(n, _)| *n).collect();
                    self.error(
                        &format!("{}[{}]", field, i),
                        format!("must be one of: {}", allowed.join(", ")),
                    );
                }
            }
        }
        Some(out)
    }

    /// Reader for a nested object; merge it back with [`ArgReader::absorb`]
    pub fn nested(&self, value: &'a Value, field: &str) -> ArgReader<'a> {
        ArgReader::at(value, self.qualified(field))
    }

    /// Reader for a nested object field, if present
    pub fn object(&mut self, field: &str) -> Option<ArgReader<'a>> {
        let value = self.raw(field)?;
        Some(self.nested(value, field))
    }

    pub fn absorb(&mut self, child: ArgReader<'_>) {
        self.errors.extend(child.errors);
    }

    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(self.errors))
        }
    }
}
