//! Request log sinks and logger setup

use std::sync::Mutex;
use serde::Serialize;
use serde_json::Value;
use log::{error, info};

/// Log target used for request records
pub const REQUEST_TARGET: &str = "req";

/// One structured record per outbound call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord
{   pub url: String
  , pub request: Value
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>
  , #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>
}

impl LogRecord
{   pub fn is_error(&self) -> bool
    {   self.error.is_some()
    }
}

/// Append-only sink for request records.
///
/// Implementations must swallow their own failures; nothing a sink
/// does may change the outcome of the call being logged.
pub trait RequestLog: Send + Sync
{   fn record(&self, record: &LogRecord);
}

/// Writes each record as one JSON line through the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCrateSink;

impl RequestLog for LogCrateSink
{   fn record(&self, record: &LogRecord)
    {   let line = match serde_json::to_string(record)
        {   Ok(line) => line
          , Err(_) => return
        };
        if record.is_error()
        {   error!(target: REQUEST_TARGET, "{}", line);
        } else
        {   info!(target: REQUEST_TARGET, "{}", line);
        }
    }
}

/// Keeps records in memory
#[derive(Debug, Default)]
pub struct MemorySink
{   records: Mutex<Vec<LogRecord>>
}

impl MemorySink
{   pub fn new() -> Self
    {   MemorySink::default()
    }

    pub fn records(&self) -> Vec<LogRecord>
    {   self.records.lock()
          .map(|r| r.clone())
          .unwrap_or_default()
    }
}

impl RequestLog for MemorySink
{   fn record(&self, record: &LogRecord)
    {   if let Ok(mut records) = self.records.lock()
        {   records.push(record.clone());
        }
    }
}

/// Install env_logger, honoring RUST_LOG (default "info").
/// Safe to call more than once.
pub fn init()
{   let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
      )
      .format_timestamp_millis()
      .try_init();
}
