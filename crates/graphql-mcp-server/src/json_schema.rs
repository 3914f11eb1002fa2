/// Macro to generate a JSON schema object from a type
#[macro_export]
macro_rules! schema_from_type {
    ($type:ty) => {{
        match serde_json::to_value(schemars::schema_for!($type)) {
            Ok(serde_json::Value::Object(schema)) => schema,
            _ => serde_json::Map::new(),
        }
    }};
}
