//! Compact renderings of payloads for log lines

use serde_json::Value;

const MAX_STRING_CHARS: usize = 100;
const MAX_ARRAY_ITEMS: usize = 10;
const MAX_DEPTH: usize = 5;

/// Shorten a JSON value so it can be logged without flooding the output
pub fn summarize(value: &Value) -> Value {
    summarize_at(value, 0)
}

fn summarize_at(value: &Value, depth: usize) -> Value {
    if depth > MAX_DEPTH {
        return Value::String("[Deep Object]".to_string());
    }

    match value {
        Value::String(text) => {
            let length = text.chars().count();
            if length <= MAX_STRING_CHARS {
                return value.clone();
            }
            let prefix: String = text.chars().take(MAX_STRING_CHARS).collect();
            Value::String(format!("{prefix}... ({length} chars)"))
        }
        Value::Array(items) => {
            let mut summary: Vec<Value> = items
                .iter()
                .take(MAX_ARRAY_ITEMS)
                .map(|item| summarize_at(item, depth + 1))
                .collect();
            if items.len() > MAX_ARRAY_ITEMS {
                summary.push(Value::String(format!(
                    "... {} more items",
                    items.len() - MAX_ARRAY_ITEMS
                )));
            }
            Value::Array(summary)
        }
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(key, field)| (key.clone(), summarize_at(field, depth + 1)))
                .collect(),
        ),
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::summarize;

    #[test]
    fn it_truncates_long_strings() {
        let text = "a".repeat(150);

        assert_eq!(
            summarize(&json!(text)),
            json!(format!("{}... (150 chars)", "a".repeat(100)))
        );
        assert_eq!(summarize(&json!("short")), json!("short"));
    }

    #[test]
    fn it_truncates_long_arrays() {
        let items: Vec<u32> = (0..12).collect();

        assert_eq!(
            summarize(&json!(items)),
            json!([0, 1, 2, 3, 4, 5, 6, 7, 8, 9, "... 2 more items"])
        );
    }

    #[test]
    fn it_cuts_off_deep_nesting() {
        let deep = json!({ "a": { "b": { "c": { "d": { "e": { "f": { "g": 1 } } } } } } });

        assert_eq!(
            summarize(&deep),
            json!({ "a": { "b": { "c": { "d": { "e": { "f": "[Deep Object]" } } } } } })
        );
    }
}
