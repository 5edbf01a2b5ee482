//! Codec between plain JSON and the document store's typed-value encoding,
//! where every value is wrapped as `{"<type>Value": ...}`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Number, Value};

use crate::remote::client::RemoteError;

pub fn encode(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            // 64-bit integers travel as strings
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or_default() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({ "arrayValue": { "values": items.iter().map(encode).collect::<Vec<_>>() } }),
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

pub fn encode_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields.iter().map(|(k, v)| (k.clone(), encode(v))).collect()
}

/// A native timestamp, so the store orders it by time rather than as text.
pub fn timestamp(at: &DateTime<Utc>) -> Value {
    json!({ "timestampValue": at.to_rfc3339_opts(SecondsFormat::AutoSi, true) })
}

pub fn decode(value: &Value) -> Result<Value, RemoteError> {
    let wrapper = value.as_object().ok_or_else(|| malformed("typed value is not an object", value))?;
    let (tag, inner) = wrapper.iter().next().ok_or_else(|| malformed("empty typed value", value))?;

    match tag.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => inner.as_bool().map(Value::Bool).ok_or_else(|| malformed("bad booleanValue", inner)),
        "integerValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                other => other.as_i64(),
            };
            parsed.map(Value::from).ok_or_else(|| malformed("bad integerValue", inner))
        }
        "doubleValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<f64>().ok(),
                other => other.as_f64(),
            };
            // NaN and infinities have no JSON form
            Ok(parsed.and_then(Number::from_f64).map(Value::Number).unwrap_or(Value::Null))
        }
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => {
            inner.as_str().map(|s| Value::String(s.to_string())).ok_or_else(|| malformed("bad string value", inner))
        }
        "arrayValue" => {
            let values = inner.get("values").and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default();
            values.iter().map(decode).collect::<Result<Vec<_>, _>>().map(Value::Array)
        }
        "mapValue" => match inner.get("fields").and_then(Value::as_object) {
            Some(fields) => decode_fields(fields).map(Value::Object),
            None => Ok(Value::Object(Map::new())),
        },
        "geoPointValue" => Ok(inner.clone()),
        other => Err(RemoteError::Malformed(format!("unknown value type {}", other))),
    }
}

pub fn decode_fields(fields: &Map<String, Value>) -> Result<Map<String, Value>, RemoteError> {
    fields.iter().map(|(k, v)| Ok((k.clone(), decode(v)?))).collect()
}

fn malformed(what: &str, value: &Value) -> RemoteError {
    RemoteError::Malformed(format!("{}: {}", what, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_sent_as_strings() {
        assert_eq!(encode(&json!(42)), json!({ "integerValue": "42" }));
        assert_eq!(decode(&json!({ "integerValue": "42" })).unwrap(), json!(42));
        assert_eq!(encode(&json!(1.5)), json!({ "doubleValue": 1.5 }));
    }

    #[test]
    fn nested_documents_decode_to_plain_json() {
        let wire = json!({
            "title": { "stringValue": "Double drops" },
            "rateMultiplier": { "doubleValue": 2.0 },
            "startDate": { "timestampValue": "2024-05-01T00:00:00Z" },
            "targets": { "arrayValue": { "values": [
                { "stringValue": "m-001" },
                { "mapValue": { "fields": {
                    "id": { "stringValue": "m-004" },
                    "isLowRate": { "booleanValue": true }
                } } }
            ] } },
            "note": { "nullValue": null }
        });
        let decoded = decode_fields(wire.as_object().unwrap()).unwrap();
        assert_eq!(
            Value::Object(decoded),
            json!({
                "title": "Double drops",
                "rateMultiplier": 2.0,
                "startDate": "2024-05-01T00:00:00Z",
                "targets": ["m-001", { "id": "m-004", "isLowRate": true }],
                "note": null
            })
        );
    }

    #[test]
    fn timestamps_use_the_native_type() {
        let at = DateTime::parse_from_rfc3339("2024-05-01T09:30:00+02:00").unwrap().with_timezone(&Utc);
        assert_eq!(timestamp(&at), json!({ "timestampValue": "2024-05-01T07:30:00Z" }));
        assert_eq!(decode(&timestamp(&at)).unwrap(), json!("2024-05-01T07:30:00Z"));
    }

    #[test]
    fn empty_array_and_map_have_no_inner_fields() {
        assert_eq!(decode(&json!({ "arrayValue": {} })).unwrap(), json!([]));
        assert_eq!(decode(&json!({ "mapValue": {} })).unwrap(), json!({}));
    }

    #[test]
    fn unknown_or_malformed_values_are_errors() {
        assert!(decode(&json!({ "fancyValue": 1 })).is_err());
        assert!(decode(&json!({ "integerValue": "twelve" })).is_err());
        assert!(decode(&json!("bare")).is_err());
    }

    #[test]
    fn encode_then_decode_preserves_a_settings_table() {
        let table = json!({ "rows": [{ "tier": "rod", "rates": { "power": 1.25, "luck": 3 } }] });
        assert_eq!(decode(&encode(&table)).unwrap(), table);
    }
}
