use std::collections::HashSet;

use serde_json::{Map, Number};

use crate::error::{Result, SerialError};
use crate::path::ValuePath;
use crate::value::{ObjectRef, Value};

/// Convert a value to its JSON form, applying `to_json` hooks.
///
/// Fails on kinds JSON cannot represent and on cycles, including cycles
/// that only appear once a hook has run.
pub fn to_json(value: &Value) -> Result<serde_json::Value> {
    JsonWriter::default().convert(value)
}

/// Rebuild a value from parsed JSON.
pub fn from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => Value::array(items.iter().map(from_json)),
        serde_json::Value::Object(map) => {
            Value::object(map.iter().map(|(key, value)| (key.clone(), from_json(value))))
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        from_json(&json)
    }
}

#[derive(Default)]
struct JsonWriter {
    /// Compounds whose conversion (hook included) is still in progress.
    visiting: HashSet<usize>,
    path: ValuePath,
}

impl JsonWriter {
    fn convert(&mut self, value: &Value) -> Result<serde_json::Value> {
        match value {
            Value::Null => Ok(serde_json::Value::Null),
            Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
            Value::Number(n) => match Number::from_f64(*n) {
                Some(number) => Ok(serde_json::Value::Number(number)),
                None => Err(self.unsupported("non-finite number")),
            },
            Value::String(s) => Ok(serde_json::Value::String(s.clone())),
            Value::Date(ms) => Ok(match iso8601(*ms) {
                Some(text) => serde_json::Value::String(text),
                None => serde_json::Value::Null,
            }),
            Value::Bytes(bytes) => {
                let mut map = Map::new();
                map.insert("type".into(), "Buffer".into());
                map.insert(
                    "data".into(),
                    serde_json::Value::Array(bytes.iter().map(|b| (*b).into()).collect()),
                );
                Ok(serde_json::Value::Object(map))
            }
            Value::Proxy(target) => self.convert(target),
            Value::Array(array) => {
                let id = self.enter(value)?;
                let mut out = Vec::new();
                for (index, item) in array.items().iter().enumerate() {
                    self.path.push_index(index);
                    let converted = self.convert(item);
                    self.path.pop();
                    out.push(converted?);
                }
                self.visiting.remove(&id);
                Ok(serde_json::Value::Array(out))
            }
            Value::Object(object) => {
                let id = self.enter(value)?;
                let converted = match object.to_json_hook() {
                    Some(hook) => {
                        let replaced = (*hook)(value);
                        if replaced.same_compound(value) {
                            self.convert_props(object)
                        } else {
                            self.convert(&replaced)
                        }
                    }
                    None => self.convert_props(object),
                };
                self.visiting.remove(&id);
                converted
            }
            Value::Undefined
            | Value::BigInt(_)
            | Value::Symbol(_)
            | Value::Function(_)
            | Value::Promise
            | Value::Intl(_) => Err(self.unsupported(value.kind())),
        }
    }

    fn convert_props(&mut self, object: &ObjectRef) -> Result<serde_json::Value> {
        let mut map = Map::new();
        for (key, item) in object.entries() {
            self.path.push_key(&key);
            let converted = self.convert(&item);
            self.path.pop();
            map.insert(key, converted?);
        }
        Ok(serde_json::Value::Object(map))
    }

    fn enter(&mut self, value: &Value) -> Result<usize> {
        let id = value.identity().unwrap_or_default();
        if !self.visiting.insert(id) {
            return Err(SerialError::Cycle {
                path: self.path.to_string(),
            });
        }
        Ok(id)
    }

    fn unsupported(&self, kind: &'static str) -> SerialError {
        SerialError::Unsupported {
            kind,
            path: self.path.to_string(),
        }
    }
}

/// Render epoch milliseconds as `YYYY-MM-DDTHH:MM:SS.sssZ`.
fn iso8601(ms: f64) -> Option<String> {
    const MAX_TIME_MS: f64 = 8.64e15;
    if !ms.is_finite() || ms.abs() > MAX_TIME_MS {
        return None;
    }
    let ms = ms.trunc() as i64;
    let days = ms.div_euclid(86_400_000);
    let in_day = ms.rem_euclid(86_400_000);

    // Civil-from-days, proleptic Gregorian calendar.
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);

    let year = if (0..=9999).contains(&year) {
        format!("{year:04}")
    } else if year < 0 {
        format!("-{:06}", -year)
    } else {
        format!("+{year:06}")
    };

    Some(format!(
        "{year}-{month:02}-{day:02}T{:02}:{:02}:{:02}.{:03}Z",
        in_day / 3_600_000,
        in_day / 60_000 % 60,
        in_day / 1000 % 60,
        in_day % 1000
    ))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn plain_tree_converts() {
        let value = Value::object([
            ("name", Value::from("subipc")),
            ("tags", Value::array([Value::from(1), Value::Bool(true)])),
            ("none", Value::Null),
        ]);
        assert_eq!(
            to_json(&value).unwrap(),
            json!({"name": "subipc", "tags": [1.0, true], "none": null})
        );
    }

    #[test]
    fn shared_but_acyclic_is_accepted() {
        let shared = Value::object([("x", Value::from(1))]);
        let value = Value::array([shared.clone(), shared]);
        assert_eq!(to_json(&value).unwrap(), json!([{"x": 1.0}, {"x": 1.0}]));
    }

    #[test]
    fn direct_cycle_is_rejected_with_location() {
        let value = Value::object([("a", Value::Null)]);
        if let Value::Object(object) = &value {
            object.set("self", value.clone());
        }
        let err = to_json(&value).unwrap_err();
        assert!(matches!(&err, SerialError::Cycle { path } if path == "$.self"));
    }

    #[test]
    fn hook_replaces_value() {
        let value = Value::object([("secret", Value::from("hidden"))]);
        if let Value::Object(object) = &value {
            object.set_to_json(|_| Value::from("redacted"));
        }
        assert_eq!(to_json(&value).unwrap(), json!("redacted"));
    }

    #[test]
    fn hook_returning_self_serializes_properties() {
        let value = Value::object([("kept", Value::Bool(true))]);
        if let Value::Object(object) = &value {
            object.set_to_json(|this| this.clone());
        }
        assert_eq!(to_json(&value).unwrap(), json!({"kept": true}));
    }

    #[test]
    fn cycle_introduced_by_hook_is_rejected() {
        let value = Value::object(Vec::<(String, Value)>::new());
        if let Value::Object(object) = &value {
            object.set_to_json(|this| {
                Value::object([("test", Value::Bool(true)), ("toJsonCycle", this.clone())])
            });
        }
        let err = to_json(&value).unwrap_err();
        assert!(matches!(&err, SerialError::Cycle { path } if path == "$.toJsonCycle"));
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        let err = to_json(&Value::array([Value::Number(f64::INFINITY)])).unwrap_err();
        assert!(matches!(
            err,
            SerialError::Unsupported { kind: "non-finite number", .. }
        ));
    }

    #[test]
    fn proxy_is_transparent() {
        let value = Value::Proxy(Box::new(Value::object([("x", Value::Null)])));
        assert_eq!(to_json(&value).unwrap(), json!({"x": null}));
    }

    #[test]
    fn dates_and_bytes_use_builtin_forms() {
        assert_eq!(
            to_json(&Value::Date(0.0)).unwrap(),
            json!("1970-01-01T00:00:00.000Z")
        );
        assert_eq!(
            to_json(&Value::Date(1_700_000_000_123.0)).unwrap(),
            json!("2023-11-14T22:13:20.123Z")
        );
        assert_eq!(to_json(&Value::Date(f64::NAN)).unwrap(), json!(null));
        assert_eq!(
            to_json(&Value::Bytes(vec![1, 2])).unwrap(),
            json!({"type": "Buffer", "data": [1, 2]})
        );
    }

    #[test]
    fn from_json_rebuilds_values() {
        let value = from_json(&json!({"a": [1, "two", null], "b": false}));
        assert_eq!(
            value,
            Value::object([
                (
                    "a",
                    Value::array([Value::from(1), Value::from("two"), Value::Null])
                ),
                ("b", Value::Bool(false)),
            ])
        );
    }
}
