//! Plugin I/O contracts (§4.5): an ordered list of [`FieldSpec`] describing
//! the shape a plugin reads or produces.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    Array,
    Any,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    pub description: String,
    /// Required when `field_type == Array`: the element type.
    pub array_type: Option<FieldType>,
    pub default: Option<serde_json::Value>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, field_type: FieldType, required: bool) -> Self {
        Self {
            name: name.into(),
            field_type,
            required,
            description: String::new(),
            array_type: None,
            default: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn array_of(mut self, element: FieldType) -> Self {
        self.array_type = Some(element);
        self
    }

    /// Whether `value` is compatible with this field's declared type.
    pub fn accepts(&self, value: &serde_json::Value) -> bool {
        match self.field_type {
            FieldType::Any => true,
            FieldType::String => value.is_string(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Float => value.is_f64() || value.is_i64() || value.is_u64(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Array => value.is_array(),
        }
    }
}

/// Validates a spec list for internal consistency (§4.5 "no duplicate names;
/// default values type-check; arrays declare `array_type`").
pub fn validate_field_specs(specs: &[FieldSpec]) -> Result<(), String> {
    let mut seen = std::collections::HashSet::new();
    for spec in specs {
        if !seen.insert(spec.name.as_str()) {
            return Err(format!("duplicate field name `{}`", spec.name));
        }
        if spec.field_type == FieldType::Array && spec.array_type.is_none() {
            return Err(format!("field `{}` declares ARRAY without array_type", spec.name));
        }
        if let Some(default) = &spec.default {
            if !spec.accepts(default) {
                return Err(format!("field `{}` default does not match declared type", spec.name));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_without_array_type_is_rejected() {
        let specs = vec![FieldSpec::new("items", FieldType::Array, true)];
        assert!(validate_field_specs(&specs).is_err());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let specs = vec![
            FieldSpec::new("x", FieldType::Integer, true),
            FieldSpec::new("x", FieldType::String, false),
        ];
        assert!(validate_field_specs(&specs).is_err());
    }

    #[test]
    fn mismatched_default_is_rejected() {
        let specs = vec![FieldSpec::new("n", FieldType::Integer, false).with_default(serde_json::json!("not a number"))];
        assert!(validate_field_specs(&specs).is_err());
    }

    #[test]
    fn well_formed_spec_list_passes() {
        let specs = vec![
            FieldSpec::new("trace_id", FieldType::String, true),
            FieldSpec::new("tags", FieldType::Array, false).array_of(FieldType::String),
        ];
        assert!(validate_field_specs(&specs).is_ok());
    }
}
