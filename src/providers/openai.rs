//! OpenAI-compatible chat-completions backend over reqwest

use std::time::Duration;
use async_trait::async_trait;
use serde_json::Value;
use log::{debug, trace, error};

use crate::config::ModelDescriptor;
use crate::error::{Error, Result};
use super::{chat_completions_url, ChatBackend, ChatExchange, ChatRequest};

/// reqwest client for any OpenAI-compatible chat endpoint
#[derive(Debug, Clone)]
pub struct OpenAiCompatBackend
{   http_client: reqwest::Client
}

impl OpenAiCompatBackend
{   pub fn new(timeout: Duration) -> Result<Self>
    {   debug!("Creating OpenAiCompatBackend, timeout {:?}", timeout);
        let http_client = reqwest::Client::builder()
          .timeout(timeout)
          .build()
          .map_err(|e| {
            error!("Failed to build HTTP client: {}", e);
            Error::from(e)
          })?;
        Ok(OpenAiCompatBackend { http_client })
    }
}

#[async_trait]
impl ChatBackend for OpenAiCompatBackend
{   async fn chat(
      &self
    , model: &ModelDescriptor
    , request: &ChatRequest
    ) -> Result<ChatExchange>
    {   let url = chat_completions_url(&model.base_url);
        trace!("POST {} for {}", url, model.key());

        let response = self.http_client
          .post(&url)
          .header("Authorization", format!("Bearer {}", model.api_key))
          .header("Content-Type", "application/json")
          .json(request)
          .send()
          .await
          .map_err(|e| {
            debug!("HTTP error for {}: {}", model.key(), e);
            Error::from(e)
          })?;

        let status = response.status();
        trace!("{} response status: {}", model.key(), status);

        let body = response.text().await?;
        if !status.is_success()
        {   debug!("{} API error {}: {}", model.key(), status, body);
            return Err(Error::ApiError
            {   status: status.as_u16()
              , body
            });
        }

        let raw: Value = serde_json::from_str(&body)?;
        ChatExchange::from_raw(raw)
    }
}

#[cfg(test)]
mod tests
{   use super::*;
    use crate::config::PriceTier;
    use crate::request::{ChatMessage, Role};

    fn descriptor(base_url: &str) -> ModelDescriptor
    {   ModelDescriptor
        {   provider: "local".to_string()
          , provider_name: "Local".to_string()
          , base_url: base_url.to_string()
          , api_key: "sk-test".to_string()
          , model: "tiny".to_string()
          , showname: "Tiny".to_string()
          , price: PriceTier::Free
        }
    }

    fn request() -> ChatRequest
    {   ChatRequest
        {   model: "tiny".to_string()
          , messages: vec![ChatMessage
            {   role: Role::User
              , content: "hi".to_string()
            }]
          , temperature: 0.0
          , response_format: None
        }
    }

    #[tokio::test]
    async fn test_chat_success_sends_bearer()
    {   let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", "/v1/chat/completions")
          .match_header("authorization", "Bearer sk-test")
          .with_status(200)
          .with_header("content-type", "application/json")
          .with_body(r#"{"choices":[{"message":{"content":"hello"}}],
                         "usage":{"prompt_tokens":3,"completion_tokens":1}}"#)
          .create_async()
          .await;

        let backend = OpenAiCompatBackend::new(Duration::from_secs(5))
          .unwrap();
        let ex = backend
          .chat(&descriptor(&format!("{}/v1", server.url())), &request())
          .await
          .unwrap();
        mock.assert_async().await;
        assert_eq!(
          ex.response.choices[0].message.content.as_deref(),
          Some("hello")
        );
        assert_eq!(ex.response.usage.unwrap().prompt_tokens, Some(3));
    }

    #[tokio::test]
    async fn test_chat_non_2xx_is_api_error()
    {   let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("POST", "/chat/completions")
          .with_status(429)
          .with_body("rate limited")
          .create_async()
          .await;

        let backend = OpenAiCompatBackend::new(Duration::from_secs(5))
          .unwrap();
        let err = backend
          .chat(&descriptor(&server.url()), &request())
          .await
          .unwrap_err();
        assert_eq!(
          err,
          Error::ApiError
          {   status: 429
            , body: "rate limited".to_string()
          }
        );
    }

    #[tokio::test]
    async fn test_chat_malformed_body_is_parse_error()
    {   let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("POST", "/chat/completions")
          .with_status(200)
          .with_body("<html>gateway</html>")
          .create_async()
          .await;

        let backend = OpenAiCompatBackend::new(Duration::from_secs(5))
          .unwrap();
        let err = backend
          .chat(&descriptor(&server.url()), &request())
          .await
          .unwrap_err();
        assert!(matches!(err, Error::ParseError(_)));
    }
}
