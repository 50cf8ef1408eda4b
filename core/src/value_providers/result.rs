use crate::metadata::ModelKind;
use serde_json::Value;
use thiserror::Error;

/// Culture a value was supplied in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueCulture {
    /// Culture-neutral sources such as the URL
    #[default]
    Invariant,
    /// Sources typed by the user, such as form fields
    Current,
}

/// The value could not be converted to the requested kind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("the value '{attempted_value}' is not valid for {kind}")]
pub struct ConversionError {
    /// The string form of the rejected value
    pub attempted_value: String,
    /// Human-readable target kind
    pub kind: &'static str,
}

/// A value resolved by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueProviderResult {
    raw_value: Value,
    attempted_value: String,
    culture: ValueCulture,
}

impl ValueProviderResult {
    /// Create a result.
    #[must_use]
    pub fn new(raw_value: Value, attempted_value: impl Into<String>, culture: ValueCulture) -> Self {
        Self {
            raw_value,
            attempted_value: attempted_value.into(),
            culture,
        }
    }

    /// The value as supplied: a string, an array of strings for repeated keys,
    /// or any JSON value for structured sources.
    #[must_use]
    pub const fn raw_value(&self) -> &Value {
        &self.raw_value
    }

    /// The value rendered as text, as echoed back in error messages.
    #[must_use]
    pub fn attempted_value(&self) -> &str {
        &self.attempted_value
    }

    /// Culture of the source.
    #[must_use]
    pub const fn culture(&self) -> ValueCulture {
        self.culture
    }

    /// Convert the raw value to a simple `kind`.
    ///
    /// Arrays contribute their first element. Empty strings convert to `null`
    /// for every kind except [`ModelKind::String`]. Complex and collection
    /// kinds receive the raw value unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError`] when the value cannot represent `kind`.
    pub fn convert_to(&self, kind: &ModelKind) -> Result<Value, ConversionError> {
        if matches!(kind, ModelKind::Complex | ModelKind::Collection(_)) {
            return Ok(self.raw_value.clone());
        }

        let value = match &self.raw_value {
            Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
            other => other.clone(),
        };

        let fail = |name: &'static str| ConversionError {
            attempted_value: self.attempted_value.clone(),
            kind: name,
        };

        match (kind, value) {
            (_, Value::Null) => Ok(Value::Null),
            (ModelKind::String, Value::String(s)) => Ok(Value::String(s)),
            (ModelKind::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
            (ModelKind::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),
            (ModelKind::String, _) => Err(fail("a string")),
            (ModelKind::File | ModelKind::Any, value) => Ok(value),
            (_, Value::String(s)) if s.trim().is_empty() => Ok(Value::Null),
            (ModelKind::Integer, Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| fail("an integer")),
            (ModelKind::Integer, Value::Number(n)) => n
                .as_i64()
                .map(Value::from)
                .ok_or_else(|| fail("an integer")),
            (ModelKind::Float, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Value::from)
                .ok_or_else(|| fail("a number")),
            (ModelKind::Float, Value::Number(n)) => {
                n.as_f64().map(Value::from).ok_or_else(|| fail("a number"))
            }
            (ModelKind::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(fail("a boolean")),
            },
            (ModelKind::Boolean, Value::Bool(b)) => Ok(Value::Bool(b)),
            (ModelKind::Integer, _) => Err(fail("an integer")),
            (ModelKind::Float, _) => Err(fail("a number")),
            (ModelKind::Boolean, _) => Err(fail("a boolean")),
            (ModelKind::Complex | ModelKind::Collection(_), value) => Ok(value),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text(raw: &str) -> ValueProviderResult {
        ValueProviderResult::new(json!(raw), raw, ValueCulture::Current)
    }

    #[test]
    fn test_numeric_conversions() {
        assert_eq!(text(" 42 ").convert_to(&ModelKind::Integer).unwrap(), json!(42));
        assert_eq!(text("2.5").convert_to(&ModelKind::Float).unwrap(), json!(2.5));
        assert_eq!(text("").convert_to(&ModelKind::Integer).unwrap(), Value::Null);
        let err = text("abc").convert_to(&ModelKind::Integer).unwrap_err();
        assert_eq!(err.attempted_value, "abc");
    }

    #[test]
    fn test_checkbox_pair_takes_first_value() {
        let result = ValueProviderResult::new(json!(["true", "false"]), "true,false", ValueCulture::Current);
        assert_eq!(result.convert_to(&ModelKind::Boolean).unwrap(), json!(true));
    }

    #[test]
    fn test_route_number_converts_to_string() {
        let result = ValueProviderResult::new(json!(7), "7", ValueCulture::Invariant);
        assert_eq!(result.convert_to(&ModelKind::String).unwrap(), json!("7"));
        assert_eq!(result.convert_to(&ModelKind::Integer).unwrap(), json!(7));
    }

    #[test]
    fn test_empty_string_stays_string_for_text() {
        assert_eq!(text("").convert_to(&ModelKind::String).unwrap(), json!(""));
    }
}
