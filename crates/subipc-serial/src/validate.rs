use crate::advanced;
use crate::error::Result;
use crate::json::to_json;
use crate::profile::Profile;
use crate::value::Value;

/// Decide whether `value` can be sent under `profile`.
///
/// Under [`Profile::Advanced`] the value and everything reachable from it
/// must avoid undefined, bigints, symbols, functions, promises, proxies and
/// Intl objects; shared and cyclic compounds are fine.
///
/// Under [`Profile::Json`] hooks are applied first, then the result must be
/// free of undefined, bigints, symbols, functions, promises, Intl objects,
/// non-finite numbers and cycles.
pub fn validate(value: &Value, profile: Profile) -> Result<()> {
    match profile {
        Profile::Advanced => advanced::check(value),
        Profile::Json => to_json(value).map(|_| ()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SerialError;

    fn rejected_everywhere() -> Vec<Value> {
        vec![
            Value::Undefined,
            Value::bigint("0"),
            Value::Symbol(Some("test".into())),
            Value::Function("anonymous".into()),
        ]
    }

    #[test]
    fn advanced_rejects_uncloneable_kinds() {
        let mut values = rejected_everywhere();
        values.extend([
            Value::Promise,
            Value::Proxy(Box::new(Value::object(Vec::<(String, Value)>::new()))),
            Value::Intl("Collator".into()),
        ]);
        for value in values {
            let err = validate(&value, Profile::Advanced).unwrap_err();
            assert!(
                matches!(err, SerialError::Unsupported { .. }),
                "{value:?} should be rejected"
            );
            let nested = Value::array([value]);
            assert!(validate(&nested, Profile::Advanced).is_err());
        }
    }

    #[test]
    fn json_rejects_non_json_kinds() {
        for value in rejected_everywhere() {
            assert!(validate(&value, Profile::Json).is_err(), "{value:?}");
            let nested = Value::object([("item", value)]);
            assert!(validate(&nested, Profile::Json).is_err());
        }
    }

    #[test]
    fn cycles_depend_on_profile() {
        let value = Value::object(Vec::<(String, Value)>::new());
        if let Value::Object(object) = &value {
            object.set("self", value.clone());
        }
        assert!(validate(&value, Profile::Advanced).is_ok());
        assert!(matches!(
            validate(&value, Profile::Json),
            Err(SerialError::Cycle { .. })
        ));
    }

    #[test]
    fn ordinary_values_pass_both_profiles() {
        let value = Value::object([
            ("n", Value::from(1.5)),
            ("s", Value::from("text")),
            ("list", Value::array([Value::Null, Value::Bool(false)])),
        ]);
        assert!(validate(&value, Profile::Advanced).is_ok());
        assert!(validate(&value, Profile::Json).is_ok());
    }
}
