//! Conversation messages and their provider-neutral request form

use serde::{Deserialize, Serialize};

/// Tool/function call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID
    pub id: String,

    /// Tool/function name
    pub name: String,

    /// Arguments as JSON
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: format!("call_{}", uuid::Uuid::new_v4()),
            name: name.into(),
            arguments,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// A typed conversation turn.
///
/// This is the closed set of messages that memory stores and strategies
/// consume. It converts losslessly to and from [`LLMMessage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Input from the human user
    Human { content: String },

    /// Assistant output, optionally requesting tool calls
    Ai {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },

    /// Instructions
    System { content: String },

    /// Result of a tool call
    Tool {
        content: String,
        tool_call_id: String,
        name: String,
    },
}

impl Message {
    pub fn human(content: impl Into<String>) -> Self {
        Self::Human {
            content: content.into(),
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self::Ai {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn ai_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Ai {
            content: content.into(),
            tool_calls,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn tool(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::Tool {
            content: content.into(),
            tool_call_id: tool_call_id.into(),
            name: name.into(),
        }
    }

    /// Text content of the message
    pub fn content(&self) -> &str {
        match self {
            Self::Human { content }
            | Self::Ai { content, .. }
            | Self::System { content }
            | Self::Tool { content, .. } => content,
        }
    }

    /// Role this message maps to in a completion request
    pub fn role(&self) -> MessageRole {
        match self {
            Self::Human { .. } => MessageRole::User,
            Self::Ai { .. } => MessageRole::Assistant,
            Self::System { .. } => MessageRole::System,
            Self::Tool { .. } => MessageRole::Tool,
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Self::System { .. })
    }

    pub fn is_human(&self) -> bool {
        matches!(self, Self::Human { .. })
    }

    /// True for an assistant message with exactly this content
    pub fn is_ai_with_content(&self, text: &str) -> bool {
        matches!(self, Self::Ai { content, .. } if content == text)
    }
}

/// Message role for LLM conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System message (instructions)
    System,
    /// User message
    User,
    /// Assistant message
    Assistant,
    /// Tool/function result
    Tool,
}

/// LLM conversation message format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LLMMessage {
    /// Message role
    pub role: MessageRole,

    /// Message content
    pub content: String,

    /// Tool calls (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    /// Tool call ID (for tool role)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Function name (for tool role)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl LLMMessage {
    fn with_role(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::Assistant, content)
    }

    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(tool_calls),
            ..Self::with_role(MessageRole::Assistant, content)
        }
    }

    pub fn tool(tool_call_id: String, name: String, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id),
            name: Some(name),
            ..Self::with_role(MessageRole::Tool, content)
        }
    }
}

impl From<&Message> for LLMMessage {
    fn from(message: &Message) -> Self {
        match message {
            Message::Human { content } => LLMMessage::user(content.clone()),
            Message::System { content } => LLMMessage::system(content.clone()),
            Message::Ai {
                content,
                tool_calls,
            } => {
                if tool_calls.is_empty() {
                    LLMMessage::assistant(content.clone())
                } else {
                    LLMMessage::assistant_with_tools(content.clone(), tool_calls.clone())
                }
            }
            Message::Tool {
                content,
                tool_call_id,
                name,
            } => LLMMessage::tool(tool_call_id.clone(), name.clone(), content.clone()),
        }
    }
}

impl From<Message> for LLMMessage {
    fn from(message: Message) -> Self {
        LLMMessage::from(&message)
    }
}

impl From<LLMMessage> for Message {
    fn from(message: LLMMessage) -> Self {
        match message.role {
            MessageRole::User => Message::Human {
                content: message.content,
            },
            MessageRole::System => Message::System {
                content: message.content,
            },
            MessageRole::Assistant => Message::Ai {
                content: message.content,
                tool_calls: message.tool_calls.unwrap_or_default(),
            },
            MessageRole::Tool => Message::Tool {
                content: message.content,
                tool_call_id: message.tool_call_id.unwrap_or_default(),
                name: message.name.unwrap_or_default(),
            },
        }
    }
}

/// Convert a conversation into request messages
pub fn to_llm_messages(messages: &[Message]) -> Vec<LLMMessage> {
    messages.iter().map(LLMMessage::from).collect()
}
