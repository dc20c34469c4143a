use serde_json::Value;

/// Fold a higher-precedence layer into `base`.
///
/// Objects merge key by key; any other value replaces what was there.
pub(super) fn overlay(base: &mut Value, upper: Value) {
    let Value::Object(upper_map) = upper else {
        *base = upper;
        return;
    };
    let Value::Object(base_map) = base else {
        *base = Value::Object(upper_map);
        return;
    };
    for (key, value) in upper_map {
        match base_map.get_mut(&key) {
            Some(slot) => overlay(slot, value),
            None => {
                base_map.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::overlay;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn nested_sections_merge_and_scalars_override() {
        let mut base = json!({ "archive": { "enabled": true, "debounce_ms": 1000 } });
        overlay(&mut base, json!({ "archive": { "debounce_ms": 250 } }));
        assert_eq!(
            base,
            json!({ "archive": { "enabled": true, "debounce_ms": 250 } })
        );
    }

    #[test]
    fn null_clears_an_optional_setting() {
        let mut base = json!({ "archive": { "directory": "/srv/chats" } });
        overlay(&mut base, json!({ "archive": { "directory": null } }));
        assert_eq!(base, json!({ "archive": { "directory": null } }));
    }
}
