//! Address cleansing through the location lookup service

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Semaphore;
use log::{debug, error, warn};

use crate::error::{Error, Result};
use crate::logging::{LogRecord, RequestLog};
use super::repair::{empty_value, fix_json, simple_fix_json, RepairStage};

/// Key of the address list in `clean_address_json` responses
pub const ADDRESS_LIST_KEY: &str = "行政地址";

/// Entry keys used inside the address list
const ENTRY_KEYS: [&str; 3] = ["省", "市", "区县"];

/// Keys of a flat location object
const LOCATION_KEYS: [&str; 3] = ["province", "city", "district"];

/// Three administrative levels of an address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location
{   pub province: String
  , pub city: String
  , pub district: String
}

fn text_field(obj: &Map<String, Value>, key: &str) -> String
{   obj.get(key)
      .and_then(Value::as_str)
      .map(|s| s.trim().to_string())
      .unwrap_or_default()
}

impl Location
{   /// Read the three levels from `obj` under `keys`, trimmed
    pub fn from_object(obj: &Map<String, Value>, keys: [&str; 3]) -> Self
    {   Location
        {   province: text_field(obj, keys[0])
          , city: text_field(obj, keys[1])
          , district: text_field(obj, keys[2])
        }
    }

    /// Write the three levels into `obj` under `keys`
    pub fn write_into(&self, obj: &mut Map<String, Value>, keys: [&str; 3])
    {   obj.insert(keys[0].to_string(), Value::String(self.province.clone()));
        obj.insert(keys[1].to_string(), Value::String(self.city.clone()));
        obj.insert(keys[2].to_string(), Value::String(self.district.clone()));
    }

    /// Fill blanks of `refined` from `self`
    fn merge(&self, refined: Location) -> Location
    {   let pick = |new: String, old: &String| {
          if new.trim().is_empty() { old.clone() } else { new }
        };
        Location
        {   province: pick(refined.province, &self.province)
          , city: pick(refined.city, &self.city)
          , district: pick(refined.district, &self.district)
        }
    }
}

/// Lookup service that standardizes a location
#[async_trait]
pub trait LocationLookup: Send + Sync
{   /// `Ok(None)` when the service had no answer
    async fn analyze(&self, query: &Location) -> Result<Option<Location>>;
}

#[derive(Debug, Deserialize)]
struct LookupResponse
{   status: String
  , #[serde(default)]
    data: Vec<Map<String, Value>>
}

/// A level is either a bare string or an object with a `name`
fn level_name(entry: &Map<String, Value>, key: &str) -> Result<String>
{   match entry.get(key)
    {   Some(Value::String(s)) => Ok(s.clone())
      , Some(Value::Object(o)) => o.get("name")
          .and_then(Value::as_str)
          .map(str::to_string)
          .ok_or_else(|| Error::ParseError(format!("{} has no name", key)))
      , _ => Err(Error::ParseError(format!("lookup entry lacks {}", key)))
    }
}

/// Form POST to the location-analyze endpoint
pub struct HttpLocationLookup
{   http_client: reqwest::Client
  , url: String
  , log: Arc<dyn RequestLog>
}

impl HttpLocationLookup
{   pub fn new(
      url: &str
    , timeout: Duration
    , log: Arc<dyn RequestLog>
    ) -> Result<Self>
    {   let http_client = reqwest::Client::builder()
          .timeout(timeout)
          .build()?;
        Ok(HttpLocationLookup
        {   http_client
          , url: url.to_string()
          , log
        })
    }

    async fn post(&self, query: &Location) -> Result<Value>
    {   let response = self.http_client
          .post(&self.url)
          .form(query)
          .send()
          .await?
          .error_for_status()?;
        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl LocationLookup for HttpLocationLookup
{   async fn analyze(&self, query: &Location) -> Result<Option<Location>>
    {   let request = serde_json::to_value(query).unwrap_or_default();
        let raw = match self.post(query).await
        {   Ok(raw) => raw
          , Err(e) => {
              error!("Location lookup failed: {}", e);
              self.log.record(&LogRecord
              {   url: self.url.clone()
                , request
                , response: None
                , error: Some(e.to_string())
                , elapsed_ms: None
              });
              return Err(e);
            }
        };
        self.log.record(&LogRecord
        {   url: self.url.clone()
          , request
          , response: Some(raw.clone())
          , error: None
          , elapsed_ms: None
        });

        let reply: LookupResponse = serde_json::from_value(raw)?;
        if reply.status != "ok"
        {   debug!("Location lookup status: {}", reply.status);
            return Ok(None);
        }
        match reply.data.first()
        {   None => Ok(None)
          , Some(entry) => Ok(Some(Location
            {   province: level_name(entry, "province")?
              , city: level_name(entry, "city")?
              , district: level_name(entry, "district")?
            }))
        }
    }
}

/// Runs lookups behind their own concurrency gate
pub struct LocationEnricher
{   lookup: Arc<dyn LocationLookup>
  , gate: Semaphore
}

impl LocationEnricher
{   pub fn new(lookup: Arc<dyn LocationLookup>, concurrency: usize) -> Self
    {   LocationEnricher
        {   lookup
          , gate: Semaphore::new(concurrency.max(1))
        }
    }

    /// Refined location, or `None` when the lookup gave nothing usable
    pub async fn refine(&self, query: &Location) -> Option<Location>
    {   let _permit = self.gate.acquire().await.ok()?;
        match self.lookup.analyze(query).await
        {   Ok(Some(refined)) => Some(query.merge(refined))
          , Ok(None) => None
          , Err(e) => {
              warn!("Keeping unrefined location {:?}: {}", query, e);
              None
            }
        }
    }

    /// Parse a flat location object and refine its three levels
    pub async fn clean_location(&self, text: &str) -> (Value, RepairStage)
    {   let (value, stage) = simple_fix_json(text);
        let mut obj = match value
        {   Value::Object(obj) if !obj.is_empty() => obj
          , _ => return (empty_value(), RepairStage::Empty)
        };
        let query = Location::from_object(&obj, LOCATION_KEYS);
        if let Some(refined) = self.refine(&query).await
        {   refined.write_into(&mut obj, LOCATION_KEYS);
        }
        (Value::Object(obj), stage)
    }

    /// Repair the response, then rebuild every entry of its address list
    /// as a refined `省/市/区县` object. Non-object entries are dropped;
    /// the list is left alone when no entry survives.
    pub async fn clean_address_json(&self, text: &str) -> (Value, RepairStage)
    {   let (value, stage) = fix_json(text);
        let mut obj = match value
        {   Value::Object(obj) if !obj.is_empty() => obj
          , _ => return (empty_value(), RepairStage::Empty)
        };
        let queries: Vec<Location> = match obj.get(ADDRESS_LIST_KEY)
        {   Some(Value::Array(entries)) => entries.iter()
              .filter_map(|entry| match entry
              {   Value::Object(e) => Some(Location::from_object(e, ENTRY_KEYS))
                , _ => None
              })
              .collect()
          , _ => Vec::new()
        };
        if queries.is_empty()
        {   return (Value::Object(obj), stage);
        }

        let cleaned = join_all(queries.iter().map(|query| async move {
          self.refine(query).await.unwrap_or_else(|| query.clone())
        })).await;
        let rebuilt = cleaned.iter()
          .map(|loc| {
            let mut entry = Map::new();
            loc.write_into(&mut entry, ENTRY_KEYS);
            Value::Object(entry)
          })
          .collect();
        obj.insert(ADDRESS_LIST_KEY.to_string(), Value::Array(rebuilt));
        (Value::Object(obj), stage)
    }
}
