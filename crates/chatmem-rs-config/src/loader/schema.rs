//! Structural checks applied to each layer before merging, so an error can
//! name the file that introduced it.

use crate::ConfigError;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy)]
enum Kind {
    Bool,
    Text,
    OptionalText,
    Millis,
}

impl Kind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            Kind::Bool => value.is_boolean(),
            Kind::Text => value.is_string(),
            Kind::OptionalText => value.is_string() || value.is_null(),
            Kind::Millis => value.is_u64(),
        }
    }

    fn expected(self) -> &'static str {
        match self {
            Kind::Bool => "expects a boolean",
            Kind::Text => "expects a string",
            Kind::OptionalText => "expects a string or null",
            Kind::Millis => "expects a non-negative integer (milliseconds)",
        }
    }
}

const ARCHIVE_FIELDS: &[(&str, Kind)] = &[
    ("enabled", Kind::Bool),
    ("directory", Kind::OptionalText),
    ("folder_name", Kind::Text),
    ("debounce_ms", Kind::Millis),
    ("file_extension", Kind::Text),
    ("default_title", Kind::Text),
];

const HANDLES_FIELDS: &[(&str, Kind)] = &[("path", Kind::OptionalText)];

/// Check one layer: top-level sections, then every field in them.
pub(super) fn check_layer(value: &Value, layer: &str) -> Result<(), ConfigError> {
    let Some(root) = value.as_object() else {
        return Err(invalid(layer, "(root)", "must be an object"));
    };
    for (key, value) in root {
        match key.as_str() {
            "$schema" => check_field(value, Kind::Text, layer, key)?,
            "archive" => check_section(value, ARCHIVE_FIELDS, layer, key)?,
            "handles" => check_section(value, HANDLES_FIELDS, layer, key)?,
            _ => return Err(invalid(layer, key, "is not a known setting")),
        }
    }
    Ok(())
}

fn check_section(
    value: &Value,
    fields: &[(&str, Kind)],
    layer: &str,
    section: &str,
) -> Result<(), ConfigError> {
    let map: &Map<String, Value> = value
        .as_object()
        .ok_or_else(|| invalid(layer, section, "must be an object"))?;
    for (key, value) in map {
        let path = format!("{section}.{key}");
        let Some((_, kind)) = fields.iter().find(|(name, _)| *name == key.as_str()) else {
            return Err(invalid(layer, &path, "is not a known setting"));
        };
        check_field(value, *kind, layer, &path)?;
    }
    Ok(())
}

fn check_field(value: &Value, kind: Kind, layer: &str, path: &str) -> Result<(), ConfigError> {
    if kind.accepts(value) {
        Ok(())
    } else {
        Err(invalid(layer, path, kind.expected()))
    }
}

fn invalid(layer: &str, path: &str, message: &str) -> ConfigError {
    ConfigError::InvalidField {
        layer: layer.to_string(),
        path: path.to_string(),
        message: message.to_string(),
    }
}
