/// A tool offered to the model: stable id, description and parameter schema.
#[derive(Debug, Clone)]
pub struct ToolDef {
    pub id: &'static str,
    pub description: &'static str,
    pub schema: schemars::Schema,
}

impl ToolDef {
    /// Parameter schema as plain JSON, without the `$schema` and `title`
    /// keys that provider APIs reject.
    #[must_use]
    pub fn parameters(&self) -> serde_json::Value {
        let mut params = serde_json::to_value(&self.schema).unwrap_or_default();
        if let serde_json::Value::Object(ref mut map) = params {
            map.remove("$schema");
            map.remove("title");
        }
        params
    }

    /// Names listed under `required` in the schema.
    #[must_use]
    pub fn required_params(&self) -> Vec<&str> {
        self.schema
            .as_object()
            .and_then(|obj| obj.get("required"))
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default()
    }
}
