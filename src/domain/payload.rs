//! Lenient field access over push and snapshot payloads.
//!
//! Nothing here fails: a missing field, a field of the wrong type and a
//! payload that is not even an object all read as "absent", and callers
//! fall back to their documented defaults.

use serde_json::Value;

use super::timestamp::Timestamp;

/// Borrowed view over a JSON payload.
#[derive(Debug, Clone, Copy)]
pub struct Payload<'a>(&'a Value);

impl<'a> Payload<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self(value)
    }

    /// Field lookup. The hub serialises camelCase, older endpoints PascalCase.
    fn field(&self, key: &str) -> Option<&'a Value> {
        let obj = self.0.as_object()?;
        if let Some(v) = obj.get(key) {
            return Some(v);
        }
        let mut chars = key.chars();
        let first = chars.next()?;
        let pascal: String = first.to_uppercase().chain(chars).collect();
        obj.get(&pascal)
    }

    /// A non-empty textual field. Numbers and booleans are stringified.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.field(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// A string field that is present, possibly empty.
    pub fn present_str(&self, key: &str) -> Option<&'a str> {
        self.field(key)?.as_str()
    }

    /// Truthiness of a field: `None` when absent or null.
    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.field(key)? {
            Value::Null => None,
            Value::Bool(b) => Some(*b),
            Value::Number(n) => Some(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
            Value::String(s) => Some(!s.is_empty()),
            Value::Array(_) | Value::Object(_) => Some(true),
        }
    }

    /// A non-negative millisecond count given as a number or numeric string.
    pub fn millis(&self, key: &str) -> Option<u64> {
        match self.field(key)? {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn timestamp(&self, key: &str) -> Option<Timestamp> {
        self.field(key)?.as_str().and_then(Timestamp::parse)
    }

    pub fn list(&self, key: &str) -> Option<&'a [Value]> {
        self.field(key)?.as_array().map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_and_mistyped_fields() {
        let v = json!({"status": 3, "title": "", "ok": null, "steps": "nope"});
        let p = Payload::new(&v);

        assert_eq!(p.text("status").as_deref(), Some("3"));
        assert_eq!(p.text("title"), None);
        assert_eq!(p.present_str("title"), Some(""));
        assert_eq!(p.flag("ok"), None);
        assert!(p.list("steps").is_none());
        assert!(p.text("absent").is_none());
    }

    #[test]
    fn test_non_object_payload() {
        let v = json!("just a string");
        let p = Payload::new(&v);
        assert!(p.text("status").is_none());
        assert!(p.millis("duration").is_none());
    }

    #[test]
    fn test_pascal_case_fallback() {
        let v = json!({"StepId": "calculating", "Duration": "1500"});
        let p = Payload::new(&v);
        assert_eq!(p.text("stepId").as_deref(), Some("calculating"));
        assert_eq!(p.millis("duration"), Some(1500));
    }
}
