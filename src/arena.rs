//! Caller-facing batch API: submit, post-process, compare, aggregate

use std::sync::Arc;
use serde::Serialize;
use log::{debug, info};

use crate::admission::AdmissionController;
use crate::client::ProviderClient;
use crate::comparator::CompareMode;
use crate::config::{ArenaConfig, CatalogConfig};
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::logging::{LogCrateSink, RequestLog};
use crate::normalizer::{
  HttpLocationLookup, LocationLookup, Normalized, NormalizeMode, ResponseNormalizer,
};
use crate::providers::{ChatBackend, OpenAiCompatBackend};
use crate::request::{RequestResult, ResponseShape, Task};
use crate::stats::{self, ComparisonOutcome, ModelSummary};

/// One model's answer to a single prompt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SingleRow
{   pub name: String
  , /// "123ms", empty on failure
    pub elapsed: String
  , pub input_tokens: Option<u64>
  , pub output_tokens: Option<u64>
  , pub processed: String
  , pub raw: String
}

/// The whole pipeline, built once from configuration
pub struct Arena
{   catalog: Arc<CatalogConfig>
  , dispatcher: Dispatcher
  , normalizer: ResponseNormalizer
}

impl Arena
{   /// Production wiring: reqwest backend, HTTP lookup, `log` sink
    pub fn new(catalog: CatalogConfig, config: ArenaConfig) -> Result<Self>
    {   let log: Arc<dyn RequestLog> = Arc::new(LogCrateSink);
        let backend = Arc::new(OpenAiCompatBackend::new(config.request_timeout())?);
        let lookup = Arc::new(HttpLocationLookup::new(
          &config.lookup_url
        , config.request_timeout()
        , log.clone()
        )?);
        Self::with_parts(catalog, &config, backend, lookup, log)
    }

    /// Wire the pipeline around caller-supplied collaborators
    pub fn with_parts(
      catalog: CatalogConfig
    , config: &ArenaConfig
    , backend: Arc<dyn ChatBackend>
    , lookup: Arc<dyn LocationLookup>
    , log: Arc<dyn RequestLog>
    ) -> Result<Self>
    {   let catalog = Arc::new(catalog);
        let admission = Arc::new(AdmissionController::from_config(&catalog)?);
        let client = ProviderClient::new(
          backend
        , log
        , config.temperature_floors.clone()
        , config.request_timeout()
        );
        debug!("Arena ready with {} models", catalog.all_model_keys().len());
        Ok(Arena
        {   dispatcher: Dispatcher::new(catalog.clone(), admission, client)
          , normalizer: ResponseNormalizer::new(lookup, config.lookup_concurrency)
          , catalog
        })
    }

    pub fn catalog(&self) -> &CatalogConfig
    {   &self.catalog
    }

    pub fn admission(&self) -> &AdmissionController
    {   self.dispatcher.admission()
    }

    /// Validated task; unknown models and empty prompts fail here
    pub fn build_task(
      &self
    , model_key: &str
    , sys_prompt: Option<&str>
    , user_prompt: Option<&str>
    , shape: ResponseShape
    , temperature: f32
    ) -> Result<Task>
    {   self.catalog.model(model_key)?;
        let present = |p: Option<&str>| p.map_or(false, |p| !p.is_empty());
        if !present(sys_prompt) && !present(user_prompt)
        {   return Err(Error::InvalidConfiguration(
              "a task needs a system or a user prompt".to_string()
            ));
        }
        Ok(Task
        {   sys_prompt: sys_prompt.map(str::to_string)
          , user_prompt: user_prompt.map(str::to_string)
          , model_key: model_key.to_string()
          , response_shape: shape
          , temperature
        })
    }

    /// Dispatch a batch; results in submission order
    pub async fn submit<F>(&self, tasks: Vec<Task>, on_progress: F) -> Vec<RequestResult>
    where F: FnMut(f64)
    {   self.dispatcher.dispatch(tasks, on_progress).await
    }

    /// Normalize every result's content with `mode`
    pub async fn post_process(
      &self
    , results: &[RequestResult]
    , mode: NormalizeMode
    ) -> Vec<Normalized>
    {   let contents: Vec<&str> = results.iter()
          .map(|r| r.content.as_str())
          .collect();
        self.normalizer.process(&contents, mode).await
    }

    /// Judge each normalized answer against its expected value.
    /// The three slices must line up one-to-one.
    pub fn compare(
      &self
    , results: &[RequestResult]
    , normalized: &[Normalized]
    , expected: &[Option<String>]
    , mode: CompareMode
    ) -> Result<Vec<ComparisonOutcome>>
    {   if normalized.len() != results.len() || expected.len() != results.len()
        {   return Err(Error::InvalidConfiguration(format!(
              "cannot compare {} results against {} answers and {} expected values",
              results.len(),
              normalized.len(),
              expected.len()
            )));
        }
        Ok(results.iter()
          .zip(normalized)
          .zip(expected)
          .map(|((result, answer), expected)| ComparisonOutcome
          {   model_key: result.model_key.clone()
            , sequence: result.sequence
            , matched: mode.compare(
                Some(&answer.value.to_text())
              , expected.as_deref()
              )
          })
          .collect())
    }

    /// Per-model summaries named after the catalog's display names
    pub fn aggregate(
      &self
    , results: &[RequestResult]
    , outcomes: Option<&[ComparisonOutcome]>
    ) -> Vec<ModelSummary>
    {   stats::aggregate(results, outcomes)
          .into_iter()
          .map(|s| match self.catalog.model(&s.model_key)
          {   Ok(model) => s.with_name(&model.fullname())
            , Err(_) => s
          })
          .collect()
    }

    /// Send one prompt pair to each model and post-process the answers
    #[allow(clippy::too_many_arguments)]
    pub async fn run_single<F>(
      &self
    , sys_prompt: Option<&str>
    , user_prompt: Option<&str>
    , models: &[String]
    , shape: ResponseShape
    , temperature: f32
    , mode: NormalizeMode
    , on_progress: F
    ) -> Result<Vec<SingleRow>>
    where F: FnMut(f64)
    {   let tasks = models.iter()
          .map(|m| self.build_task(m, sys_prompt, user_prompt, shape, temperature))
          .collect::<Result<Vec<Task>>>()?;
        info!("Single prompt against {} models", tasks.len());

        let results = self.submit(tasks, on_progress).await;
        let processed = self.post_process(&results, mode).await;
        Ok(results.into_iter()
          .zip(processed)
          .map(|(r, p)| SingleRow
          {   name: self.catalog.model(&r.model_key)
                .map(|m| m.fullname())
                .unwrap_or_else(|_| r.model_key.clone())
            , elapsed: r.elapsed_ms
                .map(|ms| format!("{}ms", ms))
                .unwrap_or_default()
            , input_tokens: r.input_tokens
            , output_tokens: r.output_tokens
            , processed: p.value.to_text()
            , raw: r.content
          })
          .collect())
    }
}
