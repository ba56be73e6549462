//! Tool registry for conversation mode.
//!
//! Tools are named operations the model may ask to run on its behalf. Each
//! tool declares its parameters explicitly; the declared schema is both what
//! the model sees and what incoming arguments are validated against.

use crate::error::ToolError;
use crate::turn::FunctionCall;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::sync::Arc;

/// JSON type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    /// Returns the JSON schema type name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }
}

/// Declaration of a single tool parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Parameter name.
    pub name: String,
    /// JSON type.
    pub param_type: ParamType,
    /// Description shown to the model.
    pub description: String,
    /// Whether the model must supply the parameter.
    pub required: bool,
    /// Value used when the parameter is omitted.
    pub default: Option<JsonValue>,
}

impl ParameterSpec {
    /// Declares a required parameter.
    #[must_use]
    pub fn required(
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: true,
            default: None,
        }
    }

    /// Declares an optional parameter.
    #[must_use]
    pub fn optional(
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, default: JsonValue) -> Self {
        self.default = Some(default);
        self
    }

    /// A parameter must be supplied when it is required and has no default.
    #[must_use]
    pub fn must_be_supplied(&self) -> bool {
        self.required && self.default.is_none()
    }
}

/// Definition of a tool available during conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Declared parameters, in declaration order.
    pub parameters: Vec<ParameterSpec>,
}

impl ToolSpec {
    /// Creates a new tool definition without parameters.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, parameter: ParameterSpec) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Gets a parameter by name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Renders the parameters as a JSON schema object.
    #[must_use]
    pub fn parameters_schema(&self) -> JsonValue {
        let properties: Map<String, JsonValue> = self
            .parameters
            .iter()
            .map(|p| {
                let mut property = serde_json::json!({
                    "type": p.param_type.as_str(),
                    "description": p.description,
                });
                if let Some(default) = &p.default {
                    property["default"] = default.clone();
                }
                (p.name.clone(), property)
            })
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Converts the definition to the function-declaration format expected
    /// by chat-completion APIs.
    #[must_use]
    pub fn to_llm_format(&self) -> JsonValue {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters_schema(),
            }
        })
    }

    /// Parses and validates a raw argument payload against the declared
    /// parameters.
    ///
    /// Omitted parameters that declare a default are filled in.
    ///
    /// # Errors
    ///
    /// - `MalformedArguments` if the payload is not a JSON object
    /// - `UnexpectedArgument` for keys the tool does not declare
    /// - `MissingRequiredArgument` for required parameters without a default
    pub fn validate(&self, raw_arguments: &str) -> Result<ToolArguments, ToolError> {
        let raw_arguments = raw_arguments.trim();
        let parsed: JsonValue = if raw_arguments.is_empty() {
            JsonValue::Object(Map::new())
        } else {
            serde_json::from_str(raw_arguments).map_err(|e| ToolError::MalformedArguments {
                name: self.name.clone(),
                reason: e.to_string(),
            })?
        };
        let JsonValue::Object(mut arguments) = parsed else {
            return Err(ToolError::MalformedArguments {
                name: self.name.clone(),
                reason: "expected a JSON object".to_string(),
            });
        };

        if let Some(extra) = arguments.keys().find(|k| self.parameter(k).is_none()) {
            return Err(ToolError::UnexpectedArgument {
                name: self.name.clone(),
                argument: extra.clone(),
            });
        }

        for parameter in &self.parameters {
            if arguments.contains_key(&parameter.name) {
                continue;
            }
            if parameter.must_be_supplied() {
                return Err(ToolError::MissingRequiredArgument {
                    name: self.name.clone(),
                    argument: parameter.name.clone(),
                });
            }
            if let Some(default) = &parameter.default {
                arguments.insert(parameter.name.clone(), default.clone());
            }
        }

        Ok(ToolArguments(arguments))
    }
}

/// Validated arguments handed to a tool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArguments(Map<String, JsonValue>);

impl ToolArguments {
    /// Gets an argument value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&JsonValue> {
        self.0.get(name)
    }

    /// Gets a string argument.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(JsonValue::as_str)
    }

    /// Gets a string argument, failing the tool if it is absent or not a string.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionFailed` naming `tool` when the argument is unusable.
    pub fn require_str(&self, tool: &str, name: &str) -> Result<&str, ToolError> {
        self.get_str(name).ok_or_else(|| ToolError::ExecutionFailed {
            name: tool.to_string(),
            reason: format!("argument '{name}' must be a string"),
        })
    }

    /// Returns the arguments as a JSON object.
    #[must_use]
    pub fn into_json(self) -> JsonValue {
        JsonValue::Object(self.0)
    }
}

/// Trait for tool execution.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool definition.
    fn spec(&self) -> ToolSpec;

    /// Executes the tool with validated arguments, returning plain text.
    async fn execute(&self, arguments: ToolArguments) -> Result<String, ToolError>;
}

struct RegisteredTool {
    spec: ToolSpec,
    tool: Arc<dyn Tool>,
}

/// Registry of available tools.
///
/// Tool names are unique; declarations are offered to the model in
/// registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.tools.iter().map(|t| &t.spec.name))
            .finish()
    }
}

impl ToolRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Registers a tool.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateTool` if a tool with the same name is registered.
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), ToolError> {
        self.register_arc(Arc::new(tool))
    }

    /// Registers a shared tool.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateTool` if a tool with the same name is registered.
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let spec = tool.spec();
        if self.get(&spec.name).is_some() {
            return Err(ToolError::DuplicateTool { name: spec.name });
        }
        tracing::debug!(tool = %spec.name, "registered tool");
        self.tools.push(RegisteredTool { spec, tool });
        Ok(())
    }

    /// Gets a tool definition by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|t| t.spec.name == name).map(|t| &t.spec)
    }

    /// Returns all registered tool definitions.
    pub fn specs(&self) -> impl Iterator<Item = &ToolSpec> {
        self.tools.iter().map(|t| &t.spec)
    }

    /// Returns the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Resolves a requested call to a tool and validated arguments.
    ///
    /// # Errors
    ///
    /// Returns `UnknownTool` for unregistered names, otherwise whatever
    /// [`ToolSpec::validate`] reports.
    pub fn resolve(&self, call: &FunctionCall) -> Result<(Arc<dyn Tool>, ToolArguments), ToolError> {
        let registered = self
            .tools
            .iter()
            .find(|t| t.spec.name == call.name)
            .ok_or_else(|| ToolError::UnknownTool {
                name: call.name.clone(),
            })?;
        let arguments = registered.spec.validate(&call.arguments)?;
        Ok((Arc::clone(&registered.tool), arguments))
    }

    /// Converts definitions to the format expected by LLM APIs.
    #[must_use]
    pub fn to_llm_format(&self) -> Vec<JsonValue> {
        self.specs().map(ToolSpec::to_llm_format).collect()
    }
}
