//! Firestore REST value encoding.
//!
//! Firestore documents carry typed values (`{"stringValue": "..."}`,
//! `{"integerValue": "42"}`, ...). These helpers build the few shapes we write
//! and flatten what we read into plain JSON.

use serde_json::{Map, Value, json};

pub fn string_value(value: &str) -> Value {
    json!({ "stringValue": value })
}

pub fn boolean_value(value: bool) -> Value {
    json!({ "booleanValue": value })
}

/// A reference to another document, by full resource name.
pub fn reference_value(document_name: &str) -> Value {
    json!({ "referenceValue": document_name })
}

/// Field transform that sets `field_path` to the commit time.
pub fn server_timestamp(field_path: &str) -> Value {
    json!({ "fieldPath": field_path, "setToServerValue": "REQUEST_TIME" })
}

/// Read a string-like field (`stringValue` or `timestampValue`).
pub fn field_str<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    let value = fields.get(key)?;
    value
        .get("stringValue")
        .or_else(|| value.get("timestampValue"))
        .and_then(Value::as_str)
}

/// Flatten a typed Firestore value to plain JSON.
pub fn to_plain(value: &Value) -> Value {
    let Some(object) = value.as_object() else {
        return Value::Null;
    };

    if let Some(v) = object.get("stringValue") {
        return v.clone();
    }
    if let Some(v) = object.get("booleanValue") {
        return v.clone();
    }
    if let Some(v) = object.get("integerValue") {
        // 64-bit integers travel as strings
        return match v {
            Value::String(s) => s.parse::<i64>().map(Value::from).unwrap_or(Value::Null),
            other => other.clone(),
        };
    }
    if let Some(v) = object.get("doubleValue") {
        return v.clone();
    }
    if let Some(v) = object.get("timestampValue") {
        return v.clone();
    }
    if let Some(v) = object.get("referenceValue") {
        return v.clone();
    }
    if let Some(map) = object.get("mapValue") {
        let fields = map
            .get("fields")
            .and_then(Value::as_object)
            .map(fields_to_plain)
            .unwrap_or_default();
        return Value::Object(fields);
    }
    if let Some(array) = object.get("arrayValue") {
        let values = array
            .get("values")
            .and_then(Value::as_array)
            .map(|values| values.iter().map(to_plain).collect())
            .unwrap_or_default();
        return Value::Array(values);
    }
    Value::Null
}

/// Flatten every field of a document.
pub fn fields_to_plain(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), to_plain(value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_plain_scalars() {
        assert_eq!(to_plain(&json!({"stringValue": "Jensen"})), json!("Jensen"));
        assert_eq!(to_plain(&json!({"booleanValue": true})), json!(true));
        assert_eq!(to_plain(&json!({"integerValue": "42"})), json!(42));
        assert_eq!(to_plain(&json!({"doubleValue": 1.5})), json!(1.5));
        assert_eq!(to_plain(&json!({"nullValue": null})), Value::Null);
        assert_eq!(
            to_plain(&json!({"timestampValue": "2025-01-01T00:00:00Z"})),
            json!("2025-01-01T00:00:00Z")
        );
    }

    #[test]
    fn test_to_plain_nested() {
        let value = json!({
            "mapValue": {"fields": {
                "tags": {"arrayValue": {"values": [{"stringValue": "a"}, {"integerValue": "2"}]}},
                "ok": {"booleanValue": false}
            }}
        });

        assert_eq!(to_plain(&value), json!({"tags": ["a", 2], "ok": false}));
    }

    #[test]
    fn test_to_plain_empty_array() {
        assert_eq!(to_plain(&json!({"arrayValue": {}})), json!([]));
    }

    #[test]
    fn test_field_str() {
        let fields = json!({
            "type": {"stringValue": "initial_request"},
            "Time": {"timestampValue": "2025-01-01T00:00:00Z"},
            "count": {"integerValue": "3"}
        });
        let fields = fields.as_object().unwrap();

        assert_eq!(field_str(fields, "type"), Some("initial_request"));
        assert_eq!(field_str(fields, "Time"), Some("2025-01-01T00:00:00Z"));
        assert_eq!(field_str(fields, "count"), None);
        assert_eq!(field_str(fields, "missing"), None);
    }
}
