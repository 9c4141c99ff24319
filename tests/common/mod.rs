//! Fakes shared by the integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use async_trait::async_trait;
use rand::Rng;
use serde_json::json;

use ballm::config::ModelDescriptor;
use ballm::logging::MemorySink;
use ballm::normalizer::{Location, LocationLookup};
use ballm::providers::{ChatBackend, ChatExchange, ChatRequest};
use ballm::request::Role;
use ballm::{Arena, ArenaConfig, CatalogConfig, Error, Result};

pub const CATALOG: &str = r#"
platforms:
  fast:
    name: Fast
    url: https://fast.example.com/v1
    api_key: sk-fast
    concurrent: 2
    models:
      - model: alpha
        showname: Alpha
        price: free
      - model: beta
        showname: Beta
        price: low
  slow:
    name: Slow
    url: https://slow.example.com/v1
    api_key: sk-slow
    models:
      - model: gamma
        showname: Gamma
        price: high
"#;

pub fn init_logger()
{   let _ = env_logger::builder().is_test(true).try_init();
}

pub fn catalog() -> CatalogConfig
{   CatalogConfig::from_yaml_str(CATALOG).unwrap()
}

type Reply = Box<dyn Fn(&ModelDescriptor, &str) -> String + Send + Sync>;

/// Chat backend with random latency, in-flight accounting and
/// failure injection for user prompts containing `fail_marker`
pub struct FakeBackend
{   pub calls: AtomicUsize
  , pub max_delay_ms: u64
  , pub fail_marker: Option<String>
  , in_flight: Mutex<HashMap<String, usize>>
  , peak: Mutex<HashMap<String, usize>>
  , reply: Reply
}

impl FakeBackend
{   /// Echoes `model|user prompt`
    pub fn echo(max_delay_ms: u64) -> Self
    {   Self::replying(max_delay_ms, |m, user| format!("{}|{}", m.model, user))
    }

    pub fn replying<F>(max_delay_ms: u64, reply: F) -> Self
    where F: Fn(&ModelDescriptor, &str) -> String + Send + Sync + 'static
    {   FakeBackend
        {   calls: AtomicUsize::new(0)
          , max_delay_ms
          , fail_marker: None
          , in_flight: Mutex::new(HashMap::new())
          , peak: Mutex::new(HashMap::new())
          , reply: Box::new(reply)
        }
    }

    pub fn failing_on(mut self, marker: &str) -> Self
    {   self.fail_marker = Some(marker.to_string());
        self
    }

    pub fn peak(&self, provider: &str) -> usize
    {   self.peak.lock().unwrap().get(provider).copied().unwrap_or(0)
    }

    fn enter(&self, provider: &str)
    {   let mut in_flight = self.in_flight.lock().unwrap();
        let now = in_flight.entry(provider.to_string()).or_insert(0);
        *now += 1;
        let mut peak = self.peak.lock().unwrap();
        let top = peak.entry(provider.to_string()).or_insert(0);
        *top = (*top).max(*now);
    }

    fn leave(&self, provider: &str)
    {   if let Some(now) = self.in_flight.lock().unwrap().get_mut(provider)
        {   *now -= 1;
        }
    }
}

#[async_trait]
impl ChatBackend for FakeBackend
{   async fn chat(
      &self
    , model: &ModelDescriptor
    , request: &ChatRequest
    ) -> Result<ChatExchange>
    {   self.calls.fetch_add(1, Ordering::SeqCst);
        let user = request.messages.iter()
          .rev()
          .find(|m| m.role == Role::User)
          .map(|m| m.content.clone())
          .unwrap_or_default();
        let delay = rand::thread_rng().gen_range(0..=self.max_delay_ms);

        self.enter(&model.provider);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        self.leave(&model.provider);

        if let Some(marker) = &self.fail_marker
        {   if user.contains(marker.as_str())
            {   return Err(Error::ApiError
                {   status: 500
                  , body: "injected".to_string()
                });
            }
        }
        ChatExchange::from_raw(json!({
          "choices": [{"message": {"role": "assistant", "content": (self.reply)(model, &user)}}],
          "usage": {"prompt_tokens": user.chars().count(), "completion_tokens": 2}
        }))
    }
}

/// Lookup that upper-cases the city and knows nothing else
pub struct FakeLookup;

#[async_trait]
impl LocationLookup for FakeLookup
{   async fn analyze(&self, query: &Location) -> Result<Option<Location>>
    {   if query.city.is_empty()
        {   return Ok(None);
        }
        Ok(Some(Location
        {   province: String::new()
          , city: query.city.to_uppercase()
          , district: query.district.clone()
        }))
    }
}

pub fn arena(backend: Arc<FakeBackend>) -> (Arena, Arc<MemorySink>)
{   let sink = Arc::new(MemorySink::new());
    let arena = Arena::with_parts(
      catalog()
    , &ArenaConfig::default()
    , backend
    , Arc::new(FakeLookup)
    , sink.clone()
    ).unwrap();
    (arena, sink)
}
