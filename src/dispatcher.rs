//! Concurrent fan-out of a task batch with order-preserving fan-in

use std::sync::Arc;
use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, info, warn};

use crate::admission::AdmissionController;
use crate::client::ProviderClient;
use crate::config::CatalogConfig;
use crate::request::{RequestResult, Task};

/// Runs whole batches against the catalog's providers
pub struct Dispatcher
{   catalog: Arc<CatalogConfig>
  , admission: Arc<AdmissionController>
  , client: ProviderClient
}

impl Dispatcher
{   pub fn new(
      catalog: Arc<CatalogConfig>
    , admission: Arc<AdmissionController>
    , client: ProviderClient
    ) -> Self
    {   Dispatcher
        {   catalog
          , admission
          , client
        }
    }

    pub fn admission(&self) -> &AdmissionController
    {   &self.admission
    }

    /// Resolve, gate and call one task; never fails
    async fn run_task(&self, sequence: usize, task: Task) -> RequestResult
    {   let model = match self.catalog.model(&task.model_key)
        {   Ok(model) => model
          , Err(e) => {
              warn!("Task #{} not sent: {}", sequence, e);
              return RequestResult::failed(&task.model_key, sequence, &e);
            }
        };
        let _ticket = match self.admission.acquire(&model.provider).await
        {   Ok(ticket) => ticket
          , Err(e) => {
              warn!("Task #{} not admitted: {}", sequence, e);
              return RequestResult::failed(&task.model_key, sequence, &e);
            }
        };
        self.client
          .call(
            &model
          , task.messages()
          , task.response_shape
          , task.temperature
          , sequence
          )
          .await
    }

    /// Run every task concurrently; results come back in task order.
    ///
    /// `on_progress` is called once per completed task, in completion
    /// order, with the completed fraction of the batch.
    pub async fn dispatch<F>(
      &self
    , tasks: Vec<Task>
    , mut on_progress: F
    ) -> Vec<RequestResult>
    where F: FnMut(f64)
    {   if tasks.is_empty()
        {   return Vec::new();
        }
        let total = tasks.len();
        info!("Dispatching {} tasks", total);

        let mut pending: FuturesUnordered<_> = tasks.into_iter()
          .enumerate()
          .map(|(sequence, task)| self.run_task(sequence, task))
          .collect();

        let mut results = Vec::with_capacity(total);
        while let Some(result) = pending.next().await
        {   results.push(result);
            on_progress(results.len() as f64 / total as f64);
        }

        results.sort_by_key(|r| r.sequence);
        debug!(
          "Batch done: {}/{} completed",
          results.iter().filter(|r| r.is_completed()).count(),
          total
        );
        results
    }
}
