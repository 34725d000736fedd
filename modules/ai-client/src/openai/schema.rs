use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Types usable as OpenAI strict structured output.
///
/// Implemented for anything that is `JsonSchema + DeserializeOwned`.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    /// Strict-mode schema: every object closed with `additionalProperties: false`,
    /// every property listed in `required`, and all `$ref`s inlined.
    fn openai_schema() -> Value {
        let mut value = serde_json::to_value(schema_for!(Self)).unwrap_or_default();

        let definitions = value
            .as_object_mut()
            .and_then(|root| {
                root.remove("$schema");
                root.remove("definitions")
            })
            .unwrap_or(Value::Null);

        strictify(&mut value, &definitions);
        value
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

fn strictify(value: &mut Value, definitions: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(resolved) = resolve_ref(map, definitions) {
                *value = resolved;
                strictify(value, definitions);
                return;
            }

            if map.get("type").and_then(Value::as_str) == Some("object") {
                close_object(map);
            }

            for child in map.values_mut() {
                strictify(child, definitions);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                strictify(item, definitions);
            }
        }
        _ => {}
    }
}

/// `$ref` to a local definition, or a single-element `allOf` wrapper.
fn resolve_ref(map: &Map<String, Value>, definitions: &Value) -> Option<Value> {
    if let Some(path) = map.get("$ref").and_then(Value::as_str) {
        let name = path.strip_prefix("#/definitions/")?;
        return definitions.get(name).cloned();
    }
    match map.get("allOf") {
        Some(Value::Array(all_of)) if all_of.len() == 1 => all_of.first().cloned(),
        _ => None,
    }
}

fn close_object(map: &mut Map<String, Value>) {
    map.insert("additionalProperties".to_string(), Value::Bool(false));
    let keys: Vec<Value> = map
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| props.keys().cloned().map(Value::String).collect())
        .unwrap_or_default();
    if !keys.is_empty() {
        map.insert("required".to_string(), Value::Array(keys));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    struct Office {
        city: String,
        phone: Option<String>,
    }

    #[derive(Deserialize, JsonSchema)]
    struct Offices {
        offices: Vec<Office>,
        headquarters: Office,
    }

    #[test]
    fn optional_fields_are_required() {
        let schema = Office::openai_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert!(required.contains(&"city"));
        assert!(required.contains(&"phone"));
        assert_eq!(schema["additionalProperties"], Value::Bool(false));
    }

    #[test]
    fn nested_definitions_are_inlined() {
        let schema = Offices::openai_schema();
        let root = schema.as_object().unwrap();
        assert!(!root.contains_key("definitions"));
        assert!(!root.contains_key("$schema"));

        let hq = &schema["properties"]["headquarters"];
        assert!(hq.get("$ref").is_none());
        assert_eq!(hq["type"], Value::String("object".to_string()));
        assert_eq!(hq["additionalProperties"], Value::Bool(false));

        let item = &schema["properties"]["offices"]["items"];
        assert!(item.get("$ref").is_none());
        assert_eq!(item["additionalProperties"], Value::Bool(false));
    }
}
