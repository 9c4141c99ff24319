//! Per-provider admission control

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use log::{debug, trace};

use crate::config::CatalogConfig;
use crate::error::{Error, Result};

/// One admission slot; returned to its provider on drop
#[derive(Debug)]
pub struct AdmissionTicket
{   provider: String
  , _permit: OwnedSemaphorePermit
}

impl AdmissionTicket
{   pub fn provider(&self) -> &str
    {   &self.provider
    }
}

impl Drop for AdmissionTicket
{   fn drop(&mut self)
    {   trace!("Releasing admission slot for {}", self.provider);
    }
}

/// Bounds in-flight calls per provider
#[derive(Debug)]
pub struct AdmissionController
{   gates: HashMap<String, (usize, Arc<Semaphore>)>
}

impl AdmissionController
{   /// Build one gate per provider from a provider -> limit map
    pub fn new(limits: HashMap<String, usize>) -> Result<Self>
    {   let mut gates = HashMap::with_capacity(limits.len());
        for (provider, limit) in limits
        {   if limit == 0
            {   return Err(Error::InvalidConfiguration(
                  format!("concurrency limit for '{}' is 0", provider)
                ));
            }
            debug!("Admission gate {} = {}", provider, limit);
            gates.insert(provider, (limit, Arc::new(Semaphore::new(limit))));
        }
        Ok(AdmissionController { gates })
    }

    pub fn from_config(catalog: &CatalogConfig) -> Result<Self>
    {   Self::new(catalog.concurrency_limits())
    }

    fn gate(&self, provider: &str) -> Result<&Arc<Semaphore>>
    {   self.gates.get(provider)
          .map(|(_, s)| s)
          .ok_or_else(|| Error::InvalidConfiguration(
            format!("no admission gate for provider '{}'", provider)
          ))
    }

    /// Wait for a free slot of `provider`
    pub async fn acquire(&self, provider: &str) -> Result<AdmissionTicket>
    {   trace!("Acquiring admission slot for {}", provider);
        let permit = Arc::clone(self.gate(provider)?)
          .acquire_owned()
          .await
          .map_err(|_| Error::Other(
            format!("admission gate for '{}' closed", provider)
          ))?;
        Ok(AdmissionTicket
        {   provider: provider.to_string()
          , _permit: permit
        })
    }

    /// Explicit release, same as dropping the ticket
    pub fn release(&self, ticket: AdmissionTicket)
    {   drop(ticket);
    }

    pub fn limit(&self, provider: &str) -> Option<usize>
    {   self.gates.get(provider).map(|(limit, _)| *limit)
    }

    /// Free slots right now
    pub fn available(&self, provider: &str) -> Option<usize>
    {   self.gate(provider).ok().map(|s| s.available_permits())
    }
}
