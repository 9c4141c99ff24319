//! Chat-completion wire types and the backend seam

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ModelDescriptor;
use crate::error::Result;
use crate::request::ChatMessage;

pub mod openai;

pub use openai::OpenAiCompatBackend;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFormat
{   #[serde(rename = "type")]
    pub kind: String
}

impl ResponseFormat
{   pub fn json_object() -> Self
    {   ResponseFormat { kind: "json_object".to_string() }
    }
}

/// Body of `POST {base_url}/chat/completions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest
{   pub model: String
  , pub messages: Vec<ChatMessage>
  , pub temperature: f32
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse
{   #[serde(default)]
    pub choices: Vec<Choice>
  , #[serde(default)]
    pub usage: Option<Usage>
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice
{   pub message: AssistantMessage
  , #[serde(default)]
    pub finish_reason: Option<String>
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantMessage
{   #[serde(default)]
    pub content: Option<String>
}

/// Token counts; providers may report only some of them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Usage
{   #[serde(default)]
    pub prompt_tokens: Option<u64>
  , #[serde(default)]
    pub completion_tokens: Option<u64>
}

/// A parsed response plus the raw body it came from
#[derive(Debug, Clone)]
pub struct ChatExchange
{   pub response: ChatResponse
  , pub raw: Value
}

impl ChatExchange
{   /// Parse a raw JSON body
    pub fn from_raw(raw: Value) -> Result<Self>
    {   let response: ChatResponse = serde_json::from_value(raw.clone())?;
        Ok(ChatExchange { response, raw })
    }
}

/// `{base_url}/chat/completions`, tolerant of a trailing slash
pub fn chat_completions_url(base_url: &str) -> String
{   format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

/// Performs one chat-completion exchange
#[async_trait]
pub trait ChatBackend: Send + Sync
{   async fn chat(
      &self
    , model: &ModelDescriptor
    , request: &ChatRequest
    ) -> Result<ChatExchange>;

    /// URL recorded in request logs
    fn endpoint(&self, model: &ModelDescriptor) -> String
    {   chat_completions_url(&model.base_url)
    }
}
