//! Single model call: measurement, error capture, request logging

use std::sync::Arc;
use std::time::{Duration, Instant};
use log::{debug, warn};

use crate::config::{ModelDescriptor, TemperatureFloors};
use crate::error::{Error, Result};
use crate::logging::{LogRecord, RequestLog};
use crate::providers::{ChatBackend, ChatExchange, ChatRequest, ResponseFormat};
use crate::request::{ChatMessage, RequestResult, ResponseShape};

/// Executes exactly one model call and never fails past its boundary
#[derive(Clone)]
pub struct ProviderClient
{   backend: Arc<dyn ChatBackend>
  , log: Arc<dyn RequestLog>
  , floors: TemperatureFloors
  , timeout: Duration
}

impl ProviderClient
{   pub fn new(
      backend: Arc<dyn ChatBackend>
    , log: Arc<dyn RequestLog>
    , floors: TemperatureFloors
    , timeout: Duration
    ) -> Self
    {   ProviderClient
        {   backend
          , log
          , floors
          , timeout
        }
    }

    /// Request body as sent to `model`
    pub fn build_request(
      &self
    , model: &ModelDescriptor
    , messages: Vec<ChatMessage>
    , shape: ResponseShape
    , temperature: f32
    ) -> ChatRequest
    {   ChatRequest
        {   model: model.model.clone()
          , messages
          , temperature: self.floors.apply(&model.provider, temperature)
          , response_format: match shape
            {   ResponseShape::Json => Some(ResponseFormat::json_object())
              , ResponseShape::Text => None
            }
        }
    }

    async fn exchange(
      &self
    , model: &ModelDescriptor
    , request: &ChatRequest
    ) -> Result<ChatExchange>
    {   if request.messages.is_empty()
        {   return Err(Error::InvalidConfiguration(
              "task has neither a system nor a user prompt".to_string()
            ));
        }
        tokio::time::timeout(self.timeout, self.backend.chat(model, request))
          .await
          .map_err(|_| Error::Timeout)?
    }

    /// Perform the call; failures come back as result content
    pub async fn call(
      &self
    , model: &ModelDescriptor
    , messages: Vec<ChatMessage>
    , shape: ResponseShape
    , temperature: f32
    , sequence: usize
    ) -> RequestResult
    {   let key = model.key();
        let request = self.build_request(model, messages, shape, temperature);
        let started = Instant::now();
        let outcome = self.exchange(model, &request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let request_json = serde_json::to_value(&request)
          .unwrap_or_default();
        let url = self.backend.endpoint(model);

        let outcome = outcome.and_then(|ex| {
          let choice = ex.response.choices.first()
            .ok_or(Error::NoChoicesInResponse)?;
          let content = choice.message.content.clone()
            .unwrap_or_default();
          Ok((ex.raw, ex.response.usage, content))
        });

        match outcome
        {   Ok((raw, usage, content)) => {
              debug!("{} #{} completed in {}ms", key, sequence, elapsed_ms);
              self.log.record(&LogRecord
              {   url
                , request: request_json
                , response: Some(raw)
                , error: None
                , elapsed_ms: Some(elapsed_ms)
              });
              RequestResult
              {   model_key: key
                , elapsed_ms: Some(elapsed_ms)
                , input_tokens: usage.and_then(|u| u.prompt_tokens)
                , output_tokens: usage.and_then(|u| u.completion_tokens)
                , content
                , sequence
              }
            }
          , Err(e) => {
              warn!("{} #{} failed: {}", key, sequence, e);
              self.log.record(&LogRecord
              {   url
                , request: request_json
                , response: None
                , error: Some(e.to_string())
                , elapsed_ms: Some(elapsed_ms)
              });
              RequestResult::failed(&key, sequence, &e)
            }
        }
    }
}
