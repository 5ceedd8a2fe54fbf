//! Builders that only emit populated structure.
//!
//! The overarching data rule: where data is not present the field is not
//! added to the output, so every nested object or list is added only when at
//! least one of its constituent values is non-empty.

use serde_json::{Map, Value};

use imms_model::mandation::SNOMED_URL;

/// Whether a JSON value carries data. `false` and `0` are valid data; empty
/// strings, empty containers and a single-element list holding an empty
/// string are not.
pub fn is_not_empty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => {
            !(items.is_empty() || (items.len() == 1 && items[0].as_str() == Some("")))
        }
        Value::Object(map) => !map.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

/// True when at least one of the raw cell values is non-empty.
pub fn any_populated(raws: &[&str]) -> bool {
    raws.iter().any(|raw| !raw.is_empty())
}

/// Insert `key` if the value is non-empty.
pub fn add_item(target: &mut Map<String, Value>, key: &str, value: Value) {
    if is_not_empty(&value) {
        target.insert(key.to_string(), value);
    }
}

/// Insert `key` with the converted cell value if the raw cell is non-empty.
pub fn add_converted(
    target: &mut Map<String, Value>,
    key: &str,
    raw: &str,
    convert: fn(&str) -> Value,
) {
    if !raw.is_empty() {
        target.insert(key.to_string(), convert(raw));
    }
}

/// An object built from the non-empty pairs only.
pub fn object_of(pairs: &[(&str, Value)]) -> Value {
    let mut map = Map::new();
    for (key, value) in pairs {
        if is_not_empty(value) {
            map.insert((*key).to_string(), value.clone());
        }
    }
    Value::Object(map)
}

/// Insert `key` as an object of the non-empty pairs, if any pair is populated.
pub fn add_object(target: &mut Map<String, Value>, key: &str, pairs: &[(&str, Value)]) {
    let object = object_of(pairs);
    add_item(target, key, object);
}

/// Insert `key` as a single-element list holding an object of the non-empty
/// pairs, if any pair is populated.
pub fn add_singleton_list(target: &mut Map<String, Value>, key: &str, pairs: &[(&str, Value)]) {
    let object = object_of(pairs);
    if is_not_empty(&object) {
        target.insert(key.to_string(), Value::Array(vec![object]));
    }
}

/// A codeable concept `{"coding": [{system, code, display}]}` with empty
/// parts removed; the coding list is omitted entirely when no part is set.
fn codeable_concept(system: &str, code: &str, display: &str) -> Value {
    let coding = object_of(&[
        ("system", Value::String(system.to_string())),
        ("code", Value::String(code.to_string())),
        ("display", Value::String(display.to_string())),
    ]);
    let mut concept = Map::new();
    if is_not_empty(&coding) {
        concept.insert("coding".to_string(), Value::Array(vec![coding]));
    }
    Value::Object(concept)
}

/// A SNOMED codeable concept.
pub fn snomed_concept(code: &str, display: &str) -> Value {
    codeable_concept(SNOMED_URL, code, display)
}

/// Insert a SNOMED codeable concept if the code or display is non-empty.
pub fn add_snomed(target: &mut Map<String, Value>, key: &str, code: &str, display: &str) {
    if any_populated(&[code, display]) {
        target.insert(key.to_string(), snomed_concept(code, display));
    }
}

/// An extension item with a codeable-concept value, empty parts removed.
pub fn extension_item(url: &str, system: &str, code: &str, display: &str) -> Value {
    let mut item = Map::new();
    item.insert("url".to_string(), Value::String(url.to_string()));
    let concept = codeable_concept(system, code, display);
    add_item(&mut item, "valueCodeableConcept", concept);
    Value::Object(item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn false_and_zero_are_data() {
        assert!(is_not_empty(&json!(false)));
        assert!(is_not_empty(&json!(0)));
    }

    #[test]
    fn empty_shapes_are_empty() {
        assert!(!is_not_empty(&json!(null)));
        assert!(!is_not_empty(&json!("")));
        assert!(!is_not_empty(&json!([])));
        assert!(!is_not_empty(&json!({})));
        assert!(!is_not_empty(&json!([""])));
        assert!(is_not_empty(&json!(["x"])));
    }

    #[test]
    fn add_object_skips_all_empty_pairs() {
        let mut target = Map::new();
        add_object(
            &mut target,
            "manufacturer",
            &[("display", json!(""))],
        );
        assert!(target.is_empty());

        add_object(
            &mut target,
            "manufacturer",
            &[("display", json!("Acme"))],
        );
        assert_eq!(Value::Object(target), json!({"manufacturer": {"display": "Acme"}}));
    }

    #[test]
    fn snomed_concept_drops_empty_parts() {
        assert_eq!(
            snomed_concept("12345", ""),
            json!({"coding": [{"system": "http://snomed.info/sct", "code": "12345"}]})
        );
    }

    #[test]
    fn extension_item_shape() {
        assert_eq!(
            extension_item("http://example.org/ext", "http://snomed.info/sct", "1", "One"),
            json!({
                "url": "http://example.org/ext",
                "valueCodeableConcept": {
                    "coding": [{"system": "http://snomed.info/sct", "code": "1", "display": "One"}]
                }
            })
        );
    }
}
