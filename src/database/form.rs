use std::collections::HashMap;

use serde_json::Value;

use super::error::TypeError;
use crate::constants::{MAX_SMALL_VALUE, MIN_VALUE};

pub type FormData = HashMap<String, Value>;

/// JSON request body with lookups that report the failing reason per field.
#[derive(Debug, Clone, Default)]
pub struct Form {
    inner: FormData,
}

impl Form {
    pub fn from_data(data: FormData) -> Self {
        Self { inner: data }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.get(key).is_some_and(|value| !value.is_null())
    }

    pub fn get_str(&self, key: &str) -> Result<String, TypeError> {
        match self.inner.get(key) {
            Some(Value::String(v)) if v.trim().is_empty() => {
                Err(TypeError::new("This field may not be blank."))
            }
            Some(Value::String(v)) => Ok(v.to_string()),
            Some(Value::Null) | None => Err(TypeError::required()),
            Some(_) => Err(TypeError::new("Not a valid string.")),
        }
    }

    /// Like `get_str`, but a missing key is not an error
    pub fn get_optional_str(&self, key: &str) -> Result<Option<String>, TypeError> {
        if !self.contains(key) {
            return Ok(None);
        }
        self.get_str(key).map(Some)
    }

    /// Accepts JSON numbers and numeric strings
    pub fn get_number(&self, key: &str) -> Result<i64, TypeError> {
        match self.inner.get(key) {
            Some(Value::Null) | None => Err(TypeError::required()),
            Some(value) => parse_integer(value),
        }
    }

    pub fn get_list(&self, key: &str) -> Result<Vec<Value>, TypeError> {
        match self.inner.get(key) {
            Some(Value::Array(values)) if values.is_empty() => Err(TypeError::required()),
            Some(Value::Array(values)) => Ok(values.to_owned()),
            Some(Value::Null) | None => Err(TypeError::required()),
            Some(_) => Err(TypeError::new("Expected a list of items.")),
        }
    }
}

pub fn parse_integer(value: &Value) -> Result<i64, TypeError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| TypeError::new("A valid integer is required.")),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| TypeError::new("A valid integer is required.")),
        _ => Err(TypeError::new("A valid integer is required.")),
    }
}

/// Range check for `SMALLINT` columns that must be at least `MIN_VALUE`
pub fn small_positive(value: i64) -> Result<i16, TypeError> {
    if value < MIN_VALUE {
        return Err(TypeError::new(&format!(
            "Ensure this value is greater than or equal to {MIN_VALUE}."
        )));
    }
    if value > MAX_SMALL_VALUE {
        return Err(TypeError::new(&format!(
            "Ensure this value is less than or equal to {MAX_SMALL_VALUE}."
        )));
    }

    Ok(value as i16)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::database::error::REQUIRED;

    fn form(value: Value) -> Form {
        Form::from_data(serde_json::from_value(value).unwrap())
    }

    #[test]
    fn strings_must_be_present_and_not_blank() {
        let form = form(json!({ "name": "Borscht", "blank": "  ", "number": 4 }));

        assert_eq!(form.get_str("name").unwrap(), "Borscht");
        assert_eq!(form.get_str("missing").unwrap_err().info, REQUIRED);
        assert_eq!(
            form.get_str("blank").unwrap_err().info,
            "This field may not be blank."
        );
        assert_eq!(form.get_str("number").unwrap_err().info, "Not a valid string.");
        assert_eq!(form.get_optional_str("missing").unwrap(), None);
    }

    #[test]
    fn numbers_accept_numeric_strings() {
        let form = form(json!({ "a": 10, "b": "25", "c": "ten", "d": 1.5 }));

        assert_eq!(form.get_number("a").unwrap(), 10);
        assert_eq!(form.get_number("b").unwrap(), 25);
        assert!(form.get_number("c").is_err());
        assert!(form.get_number("d").is_err());
    }

    #[test]
    fn lists_must_not_be_empty() {
        let form = form(json!({ "tags": [], "other": [1, 2], "scalar": 3 }));

        assert_eq!(form.get_list("tags").unwrap_err().info, REQUIRED);
        assert_eq!(form.get_list("other").unwrap().len(), 2);
        assert!(form.get_list("scalar").is_err());
    }

    #[test]
    fn null_counts_as_missing() {
        let form = form(json!({ "image": null }));

        assert!(!form.contains("image"));
        assert_eq!(form.get_str("image").unwrap_err().info, REQUIRED);
    }

    #[test]
    fn small_positive_bounds() {
        assert_eq!(small_positive(1).unwrap(), 1);
        assert_eq!(small_positive(32767).unwrap(), i16::MAX);
        assert!(small_positive(0).is_err());
        assert!(small_positive(32768).is_err());
    }
}
