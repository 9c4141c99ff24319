//! Post-processing of raw response text

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use log::debug;

use crate::error::Error;

pub mod location;
pub mod repair;

pub use location::{HttpLocationLookup, Location, LocationEnricher, LocationLookup};
pub use repair::RepairStage;

/// Registered post-processing modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum NormalizeMode
{   /// Leave the text as is
    #[default]
    Passthrough
  , /// Fence-strip, repair, parse
    FixJson
  , /// Fence-strip, parse
    SimpleFixJson
  , /// Parse a location object and refine it via lookup
    CleanLocation
  , /// Repair, then refine each entry of the address list
    CleanAddressJson
}

impl NormalizeMode
{   pub const ALL: [NormalizeMode; 5] = [
      NormalizeMode::Passthrough
    , NormalizeMode::FixJson
    , NormalizeMode::SimpleFixJson
    , NormalizeMode::CleanLocation
    , NormalizeMode::CleanAddressJson
    ];

    pub fn name(&self) -> &'static str
    {   match self
        {   NormalizeMode::Passthrough => ""
          , NormalizeMode::FixJson => "fix_json"
          , NormalizeMode::SimpleFixJson => "simple_fix_json"
          , NormalizeMode::CleanLocation => "clean_location"
          , NormalizeMode::CleanAddressJson => "clean_address_json"
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str
    {   match self
        {   NormalizeMode::Passthrough => "不处理"
          , NormalizeMode::FixJson => "JSON修复"
          , NormalizeMode::SimpleFixJson => "简易JSON修复"
          , NormalizeMode::CleanLocation => "地区清洗"
          , NormalizeMode::CleanAddressJson => "多地区JSON清洗"
        }
    }
}

impl FromStr for NormalizeMode
{   type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {   match s.trim()
        {   "" | "none" => Ok(NormalizeMode::Passthrough)
          , name => NormalizeMode::ALL.iter()
              .find(|m| m.name() == name)
              .copied()
              .ok_or_else(|| Error::UnknownMode(name.to_string()))
        }
    }
}

/// Response after post-processing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum NormalizedResult
{   Text(String)
  , Structured(Value)
}

impl NormalizedResult
{   /// Text form; structured values as compact JSON
    pub fn to_text(&self) -> String
    {   match self
        {   NormalizedResult::Text(s) => s.clone()
          , NormalizedResult::Structured(Value::String(s)) => s.clone()
          , NormalizedResult::Structured(v) => v.to_string()
        }
    }

    pub fn as_value(&self) -> Option<&Value>
    {   match self
        {   NormalizedResult::Structured(v) => Some(v)
          , NormalizedResult::Text(_) => None
        }
    }
}

impl fmt::Display for NormalizedResult
{   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {   f.write_str(&self.to_text())
    }
}

/// A normalized value and the repair stage that produced it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Normalized
{   pub value: NormalizedResult
  , /// `None` for the identity mode
    pub stage: Option<RepairStage>
}

impl Normalized
{   fn structured((value, stage): (Value, RepairStage)) -> Self
    {   Normalized
        {   value: NormalizedResult::Structured(value)
          , stage: Some(stage)
        }
    }
}

/// How many values each repair stage produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RepairTally
{   pub strict: usize
  , pub fence_stripped: usize
  , pub repaired: usize
  , pub empty: usize
}

impl RepairTally
{   pub fn from_results<'a, I>(results: I) -> Self
    where I: IntoIterator<Item = &'a Normalized>
    {   let mut tally = RepairTally::default();
        for stage in results.into_iter().filter_map(|n| n.stage)
        {   match stage
            {   RepairStage::Strict => tally.strict += 1
              , RepairStage::FenceStripped => tally.fence_stripped += 1
              , RepairStage::Repaired => tally.repaired += 1
              , RepairStage::Empty => tally.empty += 1
            }
        }
        tally
    }
}

/// Applies one mode to a whole batch of contents
pub struct ResponseNormalizer
{   enricher: LocationEnricher
}

impl ResponseNormalizer
{   pub fn new(lookup: Arc<dyn LocationLookup>, lookup_concurrency: usize) -> Self
    {   ResponseNormalizer
        {   enricher: LocationEnricher::new(lookup, lookup_concurrency)
        }
    }

    /// Normalize a single content
    pub async fn normalize(&self, mode: NormalizeMode, text: &str) -> Normalized
    {   match mode
        {   NormalizeMode::Passthrough => Normalized
            {   value: NormalizedResult::Text(text.to_string())
              , stage: None
            }
          , NormalizeMode::FixJson => {
              Normalized::structured(repair::fix_json(text))
            }
          , NormalizeMode::SimpleFixJson => {
              Normalized::structured(repair::simple_fix_json(text))
            }
          , NormalizeMode::CleanLocation => {
              Normalized::structured(self.enricher.clean_location(text).await)
            }
          , NormalizeMode::CleanAddressJson => {
              Normalized::structured(self.enricher.clean_address_json(text).await)
            }
        }
    }

    /// Normalize every content concurrently, keeping order
    pub async fn process<S: AsRef<str>>(
      &self
    , contents: &[S]
    , mode: NormalizeMode
    ) -> Vec<Normalized>
    {   debug!("Normalizing {} contents with {:?}", contents.len(), mode);
        let results = join_all(
          contents.iter().map(|c| self.normalize(mode, c.as_ref()))
        ).await;
        debug!("Repair stages: {:?}", RepairTally::from_results(&results));
        results
    }
}

#[cfg(test)]
mod tests
{   use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use crate::error::Result;

    struct NoLookup;

    #[async_trait]
    impl LocationLookup for NoLookup
    {   async fn analyze(&self, _q: &Location) -> Result<Option<Location>>
        {   Ok(None)
        }
    }

    fn normalizer() -> ResponseNormalizer
    {   ResponseNormalizer::new(Arc::new(NoLookup), 10)
    }

    #[test]
    fn test_mode_names_round_trip()
    {   for mode in NormalizeMode::ALL
        {   assert_eq!(mode.name().parse::<NormalizeMode>().unwrap(), mode);
        }
        assert_eq!(
          "repair_everything".parse::<NormalizeMode>(),
          Err(Error::UnknownMode("repair_everything".to_string()))
        );
    }

    #[tokio::test]
    async fn test_identity_keeps_text()
    {   let n = normalizer()
          .normalize(NormalizeMode::Passthrough, "  raw ```json``` ")
          .await;
        assert_eq!(n.value.to_text(), "  raw ```json``` ");
        assert_eq!(n.stage, None);
    }

    #[tokio::test]
    async fn test_well_formed_json_matches_direct_parse()
    {   let text = r#"{"name":"王","tags":["a","b"],"n":1.5,"ok":true}"#;
        let direct: Value = serde_json::from_str(text).unwrap();
        for mode in [NormalizeMode::FixJson, NormalizeMode::SimpleFixJson]
        {   let n = normalizer().normalize(mode, text).await;
            assert_eq!(n.value.as_value(), Some(&direct));
            assert_eq!(n.stage, Some(RepairStage::Strict));
        }
    }

    #[tokio::test]
    async fn test_process_keeps_order_and_tallies()
    {   let contents = vec![
          "{\"a\":1}".to_string()
        , "```json\n{\"b\":2}\n```".to_string()
        , "{'c':3,}".to_string()
        , "nothing".to_string()
        ];
        let results = normalizer()
          .process(&contents, NormalizeMode::FixJson)
          .await;
        let texts: Vec<String> = results.iter()
          .map(|n| n.value.to_text())
          .collect();
        assert_eq!(texts, vec!["{\"a\":1}", "{\"b\":2}", "{\"c\":3}", "{}"]);
        assert_eq!(
          RepairTally::from_results(&results),
          RepairTally
          {   strict: 1
            , fence_stripped: 1
            , repaired: 1
            , empty: 1
          }
        );
    }

    #[test]
    fn test_structured_text_keeps_unicode()
    {   let r = NormalizedResult::Structured(json!({"省": "浙江"}));
        assert_eq!(r.to_text(), "{\"省\":\"浙江\"}");
    }
}
