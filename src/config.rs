//! Model catalog and runtime configuration

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use log::{debug, error};

use crate::error::{Error, Result};

/// Fixed timeout for a single provider call
pub const REQUEST_TIMEOUT_SECS: u64 = 20;

/// Concurrency gate of the location lookup service
pub const LOOKUP_CONCURRENCY: usize = 10;

pub const DEFAULT_LOOKUP_URL: &str
  = "https://api.yunque123.cn/v1/publicapi/ai/location-analyze";

/// Price tier of a model, used to pre-select models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceTier
{   Free
  , Low
  , Medium
  , High
}

/// One model entry of a platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig
{   /// Machine identifier sent to the provider
    pub model: String
  , /// Human-readable name
    pub showname: String
  , pub price: PriceTier
}

/// One provider platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig
{   /// Display name
    pub name: String
  , /// Base URL of the OpenAI-compatible API
    pub url: String
  , pub api_key: String
  , /// Max in-flight requests (1 when absent)
    #[serde(default)]
    pub concurrent: Option<usize>
  , pub models: Vec<ModelConfig>
}

/// Catalog of every callable model, keyed by platform key
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig
{   pub platforms: BTreeMap<String, PlatformConfig>
}

/// Everything needed to call one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor
{   /// Platform key, e.g. "baidu"
    pub provider: String
  , pub provider_name: String
  , pub base_url: String
  , pub api_key: String
  , /// Machine identifier, e.g. "ernie-speed-128k"
    pub model: String
  , pub showname: String
  , pub price: PriceTier
}

impl ModelDescriptor
{   /// Composite `provider-model` key
    pub fn key(&self) -> String
    {   format!("{}-{}", self.provider, self.model)
    }

    /// "Platform-Model" display name
    pub fn fullname(&self) -> String
    {   format!("{}-{}", self.provider_name, self.showname)
    }
}

/// Selector entry: display name, key, tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry
{   pub showname: String
  , pub value: String
  , pub price: PriceTier
}

/// Split a `provider-model` key on its first dash
pub fn split_model_key(key: &str) -> Result<(&str, &str)>
{   key.split_once('-')
      .filter(|(p, m)| !p.is_empty() && !m.is_empty())
      .ok_or_else(|| Error::UnknownModel(key.to_string()))
}

impl CatalogConfig
{   /// Parse a catalog from YAML text
    pub fn from_yaml_str(text: &str) -> Result<Self>
    {   let catalog: CatalogConfig = serde_yaml::from_str(text)?;
        catalog.validate()?;
        debug!(
          "Loaded catalog with {} platforms",
          catalog.platforms.len()
        );
        Ok(catalog)
    }

    /// Load a catalog from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self>
    {   let text = std::fs::read_to_string(path.as_ref())
          .map_err(|e| {
            error!(
              "Failed to read {}: {}",
              path.as_ref().display(), e
            );
            Error::from(e)
          })?;
        Self::from_yaml_str(&text)
    }

    fn validate(&self) -> Result<()>
    {   for (key, platform) in &self.platforms
        {   if key.is_empty() || key.contains('-')
            {   return Err(Error::InvalidConfiguration(
                  format!("platform key '{}' must be non-empty and dash-free", key)
                ));
            }
            if platform.concurrent == Some(0)
            {   return Err(Error::InvalidConfiguration(
                  format!("platform '{}' has a concurrency of 0", key)
                ));
            }
        }
        Ok(())
    }

    /// Look up a model by its `provider-model` key
    pub fn model(&self, key: &str) -> Result<ModelDescriptor>
    {   let (provider, model) = split_model_key(key)?;
        let platform = self.platforms.get(provider)
          .ok_or_else(|| Error::UnknownModel(key.to_string()))?;
        platform.models.iter()
          .find(|m| m.model == model)
          .map(|m| ModelDescriptor
          {   provider: provider.to_string()
            , provider_name: platform.name.clone()
            , base_url: platform.url.clone()
            , api_key: platform.api_key.clone()
            , model: m.model.clone()
            , showname: m.showname.clone()
            , price: m.price
          })
          .ok_or_else(|| Error::UnknownModel(key.to_string()))
    }

    /// Every model of every platform, in catalog order
    pub fn all_models(&self) -> Vec<ModelEntry>
    {   self.platforms.iter()
          .flat_map(|(key, platform)| {
            platform.models.iter().map(move |m| ModelEntry
            {   showname: format!("{}-{}", platform.name, m.showname)
              , value: format!("{}-{}", key, m.model)
              , price: m.price
            })
          })
          .collect()
    }

    /// Keys of the models in a price tier
    pub fn models_by_price(&self, price: PriceTier) -> Vec<String>
    {   self.all_models()
          .into_iter()
          .filter(|m| m.price == price)
          .map(|m| m.value)
          .collect()
    }

    pub fn all_model_keys(&self) -> Vec<String>
    {   self.all_models().into_iter().map(|m| m.value).collect()
    }

    /// Platform key -> concurrency limit (default 1)
    pub fn concurrency_limits(&self) -> HashMap<String, usize>
    {   self.platforms.iter()
          .map(|(key, p)| (key.clone(), p.concurrent.unwrap_or(1)))
          .collect()
    }
}

/// Per-provider minimum temperature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureFloors
{   pub floors: HashMap<String, f32>
}

impl TemperatureFloors
{   pub fn empty() -> Self
    {   TemperatureFloors { floors: HashMap::new() }
    }

    pub fn with_floor(mut self, provider: &str, floor: f32) -> Self
    {   self.floors.insert(provider.to_string(), floor);
        self
    }

    /// Temperature actually sent to `provider`
    pub fn apply(&self, provider: &str, temperature: f32) -> f32
    {   match self.floors.get(provider)
        {   Some(floor) => temperature.max(*floor)
          , None => temperature
        }
    }
}

impl Default for TemperatureFloors
{   /// Baidu rejects a temperature of 0
    fn default() -> Self
    {   TemperatureFloors::empty().with_floor("baidu", 0.1)
    }
}

/// Runtime knobs of the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaConfig
{   /// Provider call timeout in seconds
    pub timeout_secs: u64
  , /// Location lookup endpoint
    pub lookup_url: String
  , /// Max in-flight location lookups
    pub lookup_concurrency: usize
  , #[serde(default)]
    pub temperature_floors: TemperatureFloors
}

impl ArenaConfig
{   pub fn request_timeout(&self) -> Duration
    {   Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ArenaConfig
{   fn default() -> Self
    {   ArenaConfig
        {   timeout_secs: REQUEST_TIMEOUT_SECS
          , lookup_url: DEFAULT_LOOKUP_URL.to_string()
          , lookup_concurrency: LOOKUP_CONCURRENCY
          , temperature_floors: TemperatureFloors::default()
        }
    }
}
