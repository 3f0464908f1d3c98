//! Tool descriptors and tool results.

use serde::{Deserialize, Deserializer, Serialize};

use crate::{ImageSource, ToolDefinition, ToolResultContent};

/// A JSON Schema document describing a tool's input.
///
/// Opaque beyond one check: the document must be a JSON object. Providers that
/// omit a schema get an empty object schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct InputSchema(serde_json::Value);

impl InputSchema {
    /// Validate a schema document.
    pub fn new(value: serde_json::Value) -> Result<Self, String> {
        if value.is_object() {
            Ok(Self(value))
        } else {
            Err(format!("tool input schema must be a JSON object, got {value}"))
        }
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

impl Default for InputSchema {
    fn default() -> Self {
        Self(serde_json::json!({"type": "object", "properties": {}}))
    }
}

impl<'de> Deserialize<'de> for InputSchema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        InputSchema::new(value).map_err(serde::de::Error::custom)
    }
}

/// A tool advertised by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_schema: InputSchema,
}

impl ToolDescriptor {
    /// The definition sent to the model endpoint.
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.as_value().clone(),
        }
    }
}

/// Result of executing a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// The output content blocks.
    pub content: Vec<ToolResultContent>,
    /// Whether the provider flagged the result as an error.
    pub is_error: bool,
}

impl ToolOutput {
    /// Create a successful text output.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolResultContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Create an error text output.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolResultContent::Text { text: text.into() }],
            is_error: true,
        }
    }

    /// Create an image output from base64 data.
    pub fn image(source: ImageSource) -> Self {
        Self {
            content: vec![ToolResultContent::Image { source }],
            is_error: false,
        }
    }

    /// All text content joined with newlines; images are skipped.
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                ToolResultContent::Text { text } => Some(text.as_str()),
                ToolResultContent::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
