use itertools::Itertools;
use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::Value;

use crate::error::NormalizeError;
use crate::json_ext::Object;

/// A declarative field argument, evaluated against a variable binding
/// environment at normalization time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Argument {
    Literal {
        name: String,
        #[serde(default)]
        value: Value,
    },
    Variable {
        name: String,
        #[serde(rename = "variableName")]
        variable_name: String,
    },
    ListValue {
        name: String,
        items: Vec<Option<Argument>>,
    },
    ObjectValue {
        name: String,
        fields: Vec<Argument>,
    },
}

impl Argument {
    pub fn name(&self) -> &str {
        match self {
            Argument::Literal { name, .. }
            | Argument::Variable { name, .. }
            | Argument::ListValue { name, .. }
            | Argument::ObjectValue { name, .. } => name,
        }
    }
}

/// Look up a variable binding, failing when it is absent.
pub(crate) fn variable<'a>(
    variables: &'a Object,
    name: &str,
) -> Result<&'a Value, NormalizeError> {
    variables
        .get(name)
        .ok_or_else(|| NormalizeError::MissingVariable {
            name: name.to_string(),
        })
}

/// Resolve one argument into a concrete runtime value.
pub(crate) fn resolve(argument: &Argument, variables: &Object) -> Result<Value, NormalizeError> {
    match argument {
        Argument::Literal { value, .. } => Ok(value.clone()),
        Argument::Variable { variable_name, .. } => {
            variable(variables, variable_name).map(Clone::clone)
        }
        Argument::ListValue { items, .. } => Ok(Value::Array(
            items
                .iter()
                .map(|item| match item {
                    Some(argument) => resolve(argument, variables),
                    // null entries propagate unchanged
                    None => Ok(Value::Null),
                })
                .collect::<Result<Vec<_>, _>>()?,
        )),
        Argument::ObjectValue { fields, .. } => Ok(Value::Object(
            fields
                .iter()
                .map(|field| Ok((field.name().into(), resolve(field, variables)?)))
                .collect::<Result<Object, NormalizeError>>()?,
        )),
    }
}

/// Resolve a full argument list into `(name, value)` pairs sorted by argument
/// name, so that storage keys are deterministic regardless of the order the
/// compiler emitted the arguments in.
pub(crate) fn resolve_all(
    args: &[Argument],
    variables: &Object,
) -> Result<Vec<(String, Value)>, NormalizeError> {
    Ok(args
        .iter()
        .map(|argument| Ok((argument.name().to_string(), resolve(argument, variables)?)))
        .collect::<Result<Vec<_>, NormalizeError>>()?
        .into_iter()
        .sorted_by(|(a, _), (b, _)| a.cmp(b))
        .collect())
}

/// Serialize resolved arguments into the canonical storage key for a field:
/// the bare field name when there are no arguments, or `name(a:1,b:"two")`
/// otherwise. Aliases never participate; they only govern where the value
/// sits in the payload.
pub(crate) fn format_storage_key(name: &str, resolved: &[(String, Value)]) -> String {
    if resolved.is_empty() {
        return name.to_string();
    }
    let args = resolved
        .iter()
        .map(|(name, value)| {
            format!(
                "{}:{}",
                name,
                serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
            )
        })
        .join(",");
    format!("{}({})", name, args)
}

/// The storage key for a field: the precomputed key when the compiler
/// provided one, otherwise derived from the name and resolved arguments.
pub(crate) fn field_storage_key(
    name: &str,
    static_key: Option<&str>,
    args: &[Argument],
    variables: &Object,
) -> Result<String, NormalizeError> {
    if let Some(key) = static_key {
        return Ok(key.to_string());
    }
    Ok(format_storage_key(name, &resolve_all(args, variables)?))
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;

    fn variables(value: serde_json_bytes::Value) -> Object {
        value.as_object().cloned().unwrap()
    }

    fn parse(value: serde_json_bytes::Value) -> Argument {
        serde_json_bytes::from_value(value).unwrap()
    }

    #[test]
    fn literal_arguments_resolve_to_their_value() {
        let argument = parse(json!({"kind": "Literal", "name": "first", "value": 10}));
        assert_eq!(
            resolve(&argument, &Object::new()).unwrap(),
            json!(10)
        );
    }

    #[test]
    fn variable_arguments_resolve_against_the_environment() {
        let argument = parse(json!({
            "kind": "Variable", "name": "id", "variableName": "userId"
        }));
        let vars = variables(json!({"userId": "42"}));
        assert_eq!(resolve(&argument, &vars).unwrap(), json!("42"));
    }

    #[test]
    fn missing_variable_is_an_error() {
        let argument = parse(json!({
            "kind": "Variable", "name": "id", "variableName": "userId"
        }));
        assert_eq!(
            resolve(&argument, &Object::new()),
            Err(NormalizeError::MissingVariable {
                name: "userId".to_string()
            })
        );
    }

    #[test]
    fn list_and_object_values_resolve_recursively() {
        let argument = parse(json!({
            "kind": "ObjectValue",
            "name": "where",
            "fields": [
                {"kind": "Literal", "name": "role", "value": "ADMIN"},
                {"kind": "ListValue", "name": "ids", "items": [
                    {"kind": "Variable", "name": "first", "variableName": "a"},
                    null,
                ]},
            ]
        }));
        let vars = variables(json!({"a": 1}));
        assert_eq!(
            resolve(&argument, &vars).unwrap(),
            json!({"role": "ADMIN", "ids": [1, null]})
        );
    }

    #[test]
    fn storage_keys_are_sorted_by_argument_name() {
        let args = vec![
            parse(json!({"kind": "Literal", "name": "last", "value": 5})),
            parse(json!({"kind": "Literal", "name": "first", "value": 10})),
        ];
        let key = field_storage_key("friends", None, &args, &Object::new()).unwrap();
        assert_eq!(key, r#"friends(first:10,last:5)"#);
    }

    #[test]
    fn distinct_argument_values_produce_distinct_storage_keys() {
        let one = vec![parse(json!({"kind": "Literal", "name": "id", "value": 1}))];
        let two = vec![parse(json!({"kind": "Literal", "name": "id", "value": 2}))];
        let key_one = field_storage_key("user", None, &one, &Object::new()).unwrap();
        let key_two = field_storage_key("user", None, &two, &Object::new()).unwrap();
        assert_eq!(key_one, "user(id:1)");
        assert_eq!(key_two, "user(id:2)");
        assert_ne!(key_one, key_two);
    }

    #[test]
    fn static_storage_keys_win_over_derived_ones() {
        let args = vec![parse(json!({"kind": "Literal", "name": "id", "value": 1}))];
        let key =
            field_storage_key("user", Some(r#"user(id:1)"#), &args, &Object::new()).unwrap();
        assert_eq!(key, "user(id:1)");
    }

    #[test]
    fn argumentless_fields_use_the_bare_name() {
        assert_eq!(
            field_storage_key("name", None, &[], &Object::new()).unwrap(),
            "name"
        );
    }
}
