//! Unified task and result types for BALLM

use serde::{Deserialize, Serialize};

/// Shape the caller wants the model to answer in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResponseShape
{   #[default]
    Text
  , Json
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role
{   System
  , User
}

/// Role-tagged chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage
{   pub role: Role
  , pub content: String
}

/// One unit of work in a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task
{   /// Optional system message
    pub sys_prompt: Option<String>
  , /// Optional user message
    pub user_prompt: Option<String>
  , /// `provider-model` key
    pub model_key: String
  , pub response_shape: ResponseShape
  , /// Temperature for sampling
    pub temperature: f32
}

impl Task
{   pub fn new(model_key: &str) -> Self
    {   Task
        {   sys_prompt: None
          , user_prompt: None
          , model_key: model_key.to_string()
          , response_shape: ResponseShape::Text
          , temperature: 0.0
        }
    }

    pub fn system(mut self, prompt: &str) -> Self
    {   self.sys_prompt = Some(prompt.to_string());
        self
    }

    pub fn user(mut self, prompt: &str) -> Self
    {   self.user_prompt = Some(prompt.to_string());
        self
    }

    pub fn shape(mut self, shape: ResponseShape) -> Self
    {   self.response_shape = shape;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self
    {   self.temperature = temperature;
        self
    }

    /// System message first, then user; empty prompts are skipped
    pub fn messages(&self) -> Vec<ChatMessage>
    {   let mut messages = Vec::with_capacity(2);
        if let Some(sys) = self.sys_prompt.as_ref().filter(|s| !s.is_empty())
        {   messages.push(ChatMessage
            {   role: Role::System
              , content: sys.clone()
            });
        }
        if let Some(user) = self.user_prompt.as_ref().filter(|s| !s.is_empty())
        {   messages.push(ChatMessage
            {   role: Role::User
              , content: user.clone()
            });
        }
        messages
    }
}

/// Outcome of one provider call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestResult
{   pub model_key: String
  , /// Wall time in milliseconds, absent on failure
    pub elapsed_ms: Option<u64>
  , pub input_tokens: Option<u64>
  , pub output_tokens: Option<u64>
  , /// Response text, or the error description on failure
    pub content: String
  , /// Position of the task in the submitted batch
    pub sequence: usize
}

impl RequestResult
{   /// Result for a call that never produced a response
    pub fn failed(
      model_key: &str
    , sequence: usize
    , error: &crate::error::Error
    ) -> Self
    {   RequestResult
        {   model_key: model_key.to_string()
          , elapsed_ms: None
          , input_tokens: None
          , output_tokens: None
          , content: error.to_string()
          , sequence
        }
    }

    pub fn is_completed(&self) -> bool
    {   self.elapsed_ms.is_some()
    }
}

#[cfg(test)]
mod tests
{   use super::*;

    #[test]
    fn test_messages_skip_empty_prompts()
    {   let task = Task::new("baidu-ernie")
          .system("")
          .user("hello");
        let messages = task.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
    }

    #[test]
    fn test_messages_system_first()
    {   let task = Task::new("baidu-ernie")
          .user("question")
          .system("rules");
        let roles: Vec<Role> = task.messages()
          .iter()
          .map(|m| m.role)
          .collect();
        assert_eq!(roles, vec![Role::System, Role::User]);
    }

    #[test]
    fn test_role_serializes_lowercase()
    {   let m = ChatMessage
        {   role: Role::System
          , content: "x".to_string()
        };
        assert_eq!(
          serde_json::to_string(&m).unwrap(),
          r#"{"role":"system","content":"x"}"#
        );
    }

    #[test]
    fn test_failed_result_has_no_metrics()
    {   let r = RequestResult::failed(
          "baidu-ernie", 4, &crate::error::Error::Timeout
        );
        assert!(!r.is_completed());
        assert_eq!(r.content, "Request timed out");
        assert_eq!(r.sequence, 4);
    }
}
