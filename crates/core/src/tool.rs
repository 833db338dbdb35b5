//! Tool trait, specs, and the registry.
//!
//! Tools are read-only external data fetchers: economic indicator series,
//! news headlines, exchange rates. Each declares a `ToolSpec` the dispatcher
//! validates requests against before execution, and the registry presents
//! the specs to the reasoning backend in a stable order.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::ToolError;

/// Parameter types a tool schema may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Number,
    Integer,
    Boolean,
}

impl ParamKind {
    fn json_type(&self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Number => "number",
            ParamKind::Integer => "integer",
            ParamKind::Boolean => "boolean",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            ParamKind::String => value.is_string(),
            ParamKind::Number => value.is_number(),
            // JSON has no integer type; accept any number without a
            // fractional part.
            ParamKind::Integer => value.as_i64().is_some() || value.as_u64().is_some(),
            ParamKind::Boolean => value.is_boolean(),
        }
    }
}

/// One declared parameter of a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    pub description: String,
}

impl ParamSpec {
    pub fn required(name: &str, kind: ParamKind, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: true,
            description: description.to_string(),
        }
    }

    pub fn optional(name: &str, kind: ParamKind, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: false,
            description: description.to_string(),
        }
    }
}

/// A tool's declared interface. Defined at startup, immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique tool name (e.g. "get_inflation_rate")
    pub name: String,

    /// What this tool does (sent to the model)
    pub description: String,

    /// Ordered parameter declarations
    pub params: Vec<ParamSpec>,
}

impl ToolSpec {
    pub fn new(name: &str, description: &str, params: Vec<ParamSpec>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            params,
        }
    }

    /// Render as a JSON Schema object for the chat-completions tools array.
    pub fn to_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for p in &self.params {
            properties.insert(
                p.name.clone(),
                json!({ "type": p.kind.json_type(), "description": p.description }),
            );
            if p.required {
                required.push(Value::String(p.name.clone()));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Validate a request's arguments against this spec.
    ///
    /// Checks that arguments form a JSON object, every required parameter
    /// is present, and every supplied parameter is declared with a matching
    /// type. Unknown parameters are rejected.
    pub fn validate(&self, arguments: &Value) -> std::result::Result<(), ToolError> {
        let obj = match arguments {
            Value::Object(map) => map,
            Value::Null => {
                return if self.params.iter().any(|p| p.required) {
                    Err(ToolError::InvalidArguments(format!(
                        "{}: arguments missing",
                        self.name
                    )))
                } else {
                    Ok(())
                };
            }
            other => {
                return Err(ToolError::InvalidArguments(format!(
                    "{}: arguments must be a JSON object, got {}",
                    self.name,
                    type_name(other)
                )));
            }
        };

        for p in &self.params {
            match obj.get(&p.name) {
                Some(v) if !p.kind.matches(v) => {
                    return Err(ToolError::InvalidArguments(format!(
                        "{}: parameter '{}' must be {}, got {}",
                        self.name,
                        p.name,
                        p.kind.json_type(),
                        type_name(v)
                    )));
                }
                None if p.required => {
                    return Err(ToolError::InvalidArguments(format!(
                        "{}: missing required parameter '{}'",
                        self.name, p.name
                    )));
                }
                _ => {}
            }
        }

        for key in obj.keys() {
            if !self.params.iter().any(|p| &p.name == key) {
                return Err(ToolError::InvalidArguments(format!(
                    "{}: unknown parameter '{}'",
                    self.name, key
                )));
            }
        }

        Ok(())
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A request to execute a tool, parsed from a model tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequest {
    /// Unique request ID (matches the model's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: Value,
}

/// The result of one tool request. Exactly one per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The request ID this result answers
    pub request_id: String,

    /// The tool that was (or would have been) invoked
    pub tool_name: String,

    /// Whether execution succeeded
    pub success: bool,

    /// Tool output on success, normalized error payload on failure
    pub payload: Value,
}

impl ToolResult {
    /// A successful result carrying the tool's output.
    pub fn ok(request_id: impl Into<String>, tool_name: impl Into<String>, payload: Value) -> Self {
        Self {
            request_id: request_id.into(),
            tool_name: tool_name.into(),
            success: true,
            payload,
        }
    }

    /// A failed result with the normalized error payload
    /// `{"error": {"kind": ..., "message": ...}}`.
    pub fn fail(
        request_id: impl Into<String>,
        tool_name: impl Into<String>,
        error: &ToolError,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            tool_name: tool_name.into(),
            success: false,
            payload: json!({
                "error": {
                    "kind": error.kind(),
                    "message": error.to_string(),
                }
            }),
        }
    }
}

/// The core Tool trait.
///
/// Each upstream data fetcher implements this. Tools are registered in the
/// `ToolRegistry` and made available to the agent loop. All tools are
/// read-only, so a batch of them may execute concurrently.
#[async_trait]
pub trait Tool: Send + Sync {
    /// This tool's declared interface.
    fn spec(&self) -> ToolSpec;

    /// Execute with already-validated arguments.
    async fn execute(&self, arguments: Value) -> std::result::Result<Value, ToolError>;
}

/// An immutable name → Tool map built once at startup.
///
/// `specs()` returns declarations in a stable (name-sorted) order so prompt
/// construction is deterministic across runs.
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.spec().name;
        self.tools.insert(name, tool);
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// All tool specs, name-sorted.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|t| t.spec()).collect()
    }

    /// All registered tool names, name-sorted.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn spec(&self) -> ToolSpec {
            ToolSpec::new(
                "echo",
                "Echoes back the input",
                vec![
                    ParamSpec::required("text", ParamKind::String, "Text to echo"),
                    ParamSpec::optional("times", ParamKind::Integer, "Repeat count"),
                ],
            )
        }

        async fn execute(&self, arguments: Value) -> std::result::Result<Value, ToolError> {
            Ok(json!({ "echoed": arguments["text"] }))
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn registry_specs_are_name_sorted() {
        struct Named(&'static str);
        #[async_trait]
        impl Tool for Named {
            fn spec(&self) -> ToolSpec {
                ToolSpec::new(self.0, "", vec![])
            }
            async fn execute(&self, _: Value) -> std::result::Result<Value, ToolError> {
                Ok(Value::Null)
            }
        }

        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Named("zebra")));
        registry.register(Arc::new(Named("alpha")));
        let names: Vec<_> = registry.specs().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["alpha", "zebra"]);
    }

    #[test]
    fn validate_accepts_well_formed_arguments() {
        let spec = EchoTool.spec();
        assert!(spec.validate(&json!({ "text": "hi" })).is_ok());
        assert!(spec.validate(&json!({ "text": "hi", "times": 3 })).is_ok());
    }

    #[test]
    fn validate_rejects_missing_required() {
        let spec = EchoTool.spec();
        let err = spec.validate(&json!({})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert!(err.to_string().contains("text"));
    }

    #[test]
    fn validate_rejects_wrong_type() {
        let spec = EchoTool.spec();
        let err = spec.validate(&json!({ "text": 42 })).unwrap_err();
        assert!(err.to_string().contains("must be string"));

        let err = spec
            .validate(&json!({ "text": "hi", "times": 1.5 }))
            .unwrap_err();
        assert!(err.to_string().contains("times"));
    }

    #[test]
    fn validate_rejects_unknown_parameter() {
        let spec = EchoTool.spec();
        let err = spec
            .validate(&json!({ "text": "hi", "volume": 11 }))
            .unwrap_err();
        assert!(err.to_string().contains("unknown parameter"));
    }

    #[test]
    fn validate_null_arguments_ok_when_nothing_required() {
        let spec = ToolSpec::new(
            "no_args",
            "",
            vec![ParamSpec::optional("q", ParamKind::String, "")],
        );
        assert!(spec.validate(&Value::Null).is_ok());
    }

    #[test]
    fn failed_result_has_normalized_payload() {
        let err = ToolError::NotFound("bogus".into());
        let result = ToolResult::fail("req_1", "bogus", &err);
        assert!(!result.success);
        assert_eq!(result.payload["error"]["kind"], "tool_not_found");
        assert!(
            result.payload["error"]["message"]
                .as_str()
                .unwrap()
                .contains("bogus")
        );
    }

    #[test]
    fn spec_renders_json_schema() {
        let schema = EchoTool.spec().to_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["text"]["type"], "string");
        assert_eq!(schema["required"], json!(["text"]));
    }
}
