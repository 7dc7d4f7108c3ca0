//! Target schema for product records and conformance of parsed candidates.

use serde_json::{Map, Number, Value};

/// Semantic type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    Float,
    Text,
    TextList,
    Object,
}

impl FieldType {
    /// Label used when describing the field to the structuring model.
    pub fn label(self) -> &'static str {
        match self {
            FieldType::Integer => "int",
            FieldType::Float => "float",
            FieldType::Text => "text",
            FieldType::TextList => "list of text",
            FieldType::Object => "object",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
}

const fn field(name: &'static str, field_type: FieldType) -> FieldSpec {
    FieldSpec { name, field_type }
}

const PRODUCT_FIELDS: &[FieldSpec] = &[
    field("id", FieldType::Integer),
    field("product_name", FieldType::Text),
    field("barcode", FieldType::Integer),
    field("brand", FieldType::Text),
    field("product_image", FieldType::Text),
    field("item_weight", FieldType::Float),
    field("weight_unit", FieldType::Text),
    field("ingredients", FieldType::TextList),
    field("product_description", FieldType::Text),
    field("storage_requirements", FieldType::Text),
    field("items_per_package", FieldType::Integer),
    field("color", FieldType::Text),
    field("material", FieldType::Text),
    field("width", FieldType::Integer),
    field("height", FieldType::Integer),
    field("dimension_unit", FieldType::Text),
    field("warranty", FieldType::Integer),
];

/// Fixed, ordered field list every output record is conformed to.
#[derive(Debug, Clone, Copy)]
pub struct TargetSchema {
    fields: &'static [FieldSpec],
}

impl TargetSchema {
    pub const fn new(fields: &'static [FieldSpec]) -> Self {
        Self { fields }
    }

    /// The product schema used by the pipeline.
    pub const fn product() -> Self {
        Self::new(PRODUCT_FIELDS)
    }

    pub fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    /// `- name (type)` lines for prompts.
    pub fn describe(&self) -> String {
        self.fields
            .iter()
            .map(|f| format!("- {} ({})", f.name, f.field_type.label()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Project a candidate object onto the schema.
    ///
    /// Output keys are exactly the schema fields, in schema order. Unknown keys
    /// are dropped, missing keys become `null`, and values are coerced leniently;
    /// anything that cannot be coerced becomes `null` and is reported.
    pub fn conform(&self, candidate: &Map<String, Value>) -> Conformed {
        let mut record = Map::with_capacity(self.fields.len());
        let mut warnings = Vec::new();
        let mut matched_fields = 0;

        for spec in self.fields {
            let value = match candidate.get(spec.name) {
                Some(raw) => {
                    matched_fields += 1;
                    match coerce(raw, spec.field_type) {
                        Some(v) => v,
                        None => {
                            warnings.push(format!(
                                "{}: expected {}, got {}",
                                spec.name,
                                spec.field_type.label(),
                                raw
                            ));
                            Value::Null
                        }
                    }
                }
                None => Value::Null,
            };
            record.insert(spec.name.to_string(), value);
        }

        let dropped: Vec<String> = candidate
            .keys()
            .filter(|k| !self.contains(k))
            .cloned()
            .collect();

        Conformed {
            record,
            matched_fields,
            dropped,
            warnings,
        }
    }
}

impl Default for TargetSchema {
    fn default() -> Self {
        Self::product()
    }
}

/// Result of [`TargetSchema::conform`].
#[derive(Debug, Clone)]
pub struct Conformed {
    pub record: Map<String, Value>,
    /// How many schema fields the candidate carried (null or not).
    pub matched_fields: usize,
    /// Candidate keys not in the schema.
    pub dropped: Vec<String>,
    pub warnings: Vec<String>,
}

/// Returns `Some(Value::Null)` for explicit absence, `None` when the value cannot
/// be represented as `field_type`.
fn coerce(value: &Value, field_type: FieldType) -> Option<Value> {
    if value.is_null() {
        return Some(Value::Null);
    }
    if let Value::String(s) = value {
        if is_absent_marker(s) {
            return Some(Value::Null);
        }
    }

    match field_type {
        FieldType::Integer => coerce_integer(value),
        FieldType::Float => coerce_float(value),
        FieldType::Text => coerce_text(value),
        FieldType::TextList => coerce_text_list(value),
        FieldType::Object => value.is_object().then(|| value.clone()),
    }
}

fn is_absent_marker(s: &str) -> bool {
    let t = s.trim();
    t.is_empty() || t.eq_ignore_ascii_case("n/a") || t.eq_ignore_ascii_case("null")
}

fn coerce_integer(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(value.clone()),
        Value::Number(n) => {
            let f = n.as_f64()?;
            (f.fract() == 0.0 && f.abs() < i64::MAX as f64).then(|| Value::from(f as i64))
        }
        Value::String(s) => {
            let t = s.trim();
            if let Ok(i) = t.parse::<i64>() {
                if i.to_string() == t {
                    return Some(Value::from(i));
                }
            }
            // Digit strings with leading zeros (codes) keep their digits.
            (!t.is_empty() && t.bytes().all(|b| b.is_ascii_digit()))
                .then(|| Value::String(t.to_string()))
        }
        _ => None,
    }
}

fn coerce_float(value: &Value) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        _ => None,
    }
}

fn coerce_text(value: &Value) -> Option<Value> {
    match value {
        Value::String(s) => Some(Value::String(s.trim().to_string())),
        Value::Number(n) => Some(Value::String(n.to_string())),
        Value::Bool(b) => Some(Value::String(b.to_string())),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(scalar_text).collect();
            (!parts.is_empty()).then(|| Value::String(parts.join(", ")))
        }
        _ => None,
    }
}

fn coerce_text_list(value: &Value) -> Option<Value> {
    match value {
        Value::Array(items) => Some(Value::Array(
            items
                .iter()
                .filter_map(scalar_text)
                .filter(|s| !is_absent_marker(s))
                .map(Value::String)
                .collect(),
        )),
        Value::String(s) => Some(Value::Array(
            s.split([',', ';'])
                .map(str::trim)
                .map(|part| part.trim_end_matches('.').trim())
                .filter(|part| !part.is_empty())
                .map(|part| Value::String(part.to_string()))
                .collect(),
        )),
        _ => None,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn product_schema_field_order() {
        let names: Vec<_> = TargetSchema::product().fields().iter().map(|f| f.name).collect();
        assert_eq!(names.first(), Some(&"id"));
        assert_eq!(names.last(), Some(&"warranty"));
        assert_eq!(names.len(), 17);
    }

    #[test]
    fn describe_lists_every_field_with_type() {
        let text = TargetSchema::product().describe();
        assert!(text.contains("- product_name (text)"));
        assert!(text.contains("- barcode (int)"));
        assert!(text.contains("- ingredients (list of text)"));
        assert_eq!(text.lines().count(), 17);
    }

    #[test]
    fn conform_drops_unknown_and_nulls_missing() {
        let conformed = TargetSchema::product().conform(&obj(json!({
            "product_name": "Oat Drink",
            "mood": "happy"
        })));
        assert_eq!(conformed.record.len(), 17);
        assert_eq!(conformed.record["product_name"], "Oat Drink");
        assert_eq!(conformed.record["brand"], Value::Null);
        assert!(!conformed.record.contains_key("mood"));
        assert_eq!(conformed.dropped, vec!["mood".to_string()]);
        assert_eq!(conformed.matched_fields, 1);
    }

    #[test]
    fn conform_keeps_schema_order() {
        let conformed = TargetSchema::product().conform(&obj(json!({
            "warranty": 2,
            "id": 7
        })));
        let keys: Vec<_> = conformed.record.keys().cloned().collect();
        assert_eq!(keys[0], "id");
        assert_eq!(keys[16], "warranty");
    }

    #[test]
    fn integer_coercion() {
        let conformed = TargetSchema::product().conform(&obj(json!({
            "id": "42",
            "width": 10.0,
            "height": "tall",
            "items_per_package": 6,
            "barcode": "0123456789012"
        })));
        assert_eq!(conformed.record["id"], 42);
        assert_eq!(conformed.record["width"], 10);
        assert_eq!(conformed.record["height"], Value::Null);
        assert_eq!(conformed.record["items_per_package"], 6);
        assert_eq!(conformed.record["barcode"], "0123456789012");
        assert_eq!(conformed.warnings.len(), 1);
        assert!(conformed.warnings[0].starts_with("height"));
    }

    #[test]
    fn float_coercion() {
        let conformed = TargetSchema::product().conform(&obj(json!({
            "item_weight": "0.5"
        })));
        assert_eq!(conformed.record["item_weight"], 0.5);
    }

    #[test]
    fn absent_markers_become_null() {
        let conformed = TargetSchema::product().conform(&obj(json!({
            "brand": "N/A",
            "color": "",
            "warranty": "n/a"
        })));
        assert_eq!(conformed.record["brand"], Value::Null);
        assert_eq!(conformed.record["color"], Value::Null);
        assert_eq!(conformed.record["warranty"], Value::Null);
        assert!(conformed.warnings.is_empty());
    }

    #[test]
    fn ingredient_sentence_becomes_list() {
        let conformed = TargetSchema::product().conform(&obj(json!({
            "ingredients": "Water, oats (10%), rapeseed oil; salt."
        })));
        assert_eq!(
            conformed.record["ingredients"],
            json!(["Water", "oats (10%)", "rapeseed oil", "salt"])
        );
    }

    #[test]
    fn ingredient_list_filters_non_text() {
        let conformed = TargetSchema::product().conform(&obj(json!({
            "ingredients": ["sugar", null, {"x": 1}, "N/A", " cocoa "]
        })));
        assert_eq!(conformed.record["ingredients"], json!(["sugar", "cocoa"]));
    }

    #[test]
    fn text_from_scalars() {
        let conformed = TargetSchema::product().conform(&obj(json!({
            "color": ["red", "white"],
            "material": 304,
            "storage_requirements": {"temp": "cool"}
        })));
        assert_eq!(conformed.record["color"], "red, white");
        assert_eq!(conformed.record["material"], "304");
        assert_eq!(conformed.record["storage_requirements"], Value::Null);
        assert_eq!(conformed.warnings.len(), 1);
    }

    #[test]
    fn object_fields_accept_objects_only() {
        static FIELDS: &[FieldSpec] = &[field("dimensions", FieldType::Object)];
        let schema = TargetSchema::new(FIELDS);
        let ok = schema.conform(&obj(json!({"dimensions": {"w": 1}})));
        assert_eq!(ok.record["dimensions"], json!({"w": 1}));
        let bad = schema.conform(&obj(json!({"dimensions": "1x2"})));
        assert_eq!(bad.record["dimensions"], Value::Null);
    }
}
