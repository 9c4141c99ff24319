//! BALLM: batch prompts across many LLM providers at once.
//!
//! A batch of [`Task`]s is fanned out to OpenAI-compatible providers,
//! each provider gated by its own concurrency limit, and the answers are
//! gathered back in submission order. Answers can then be normalized
//! (JSON repair, location clean-up), compared to expected answers and
//! summarized per model.
//!
//! ```no_run
//! # async fn demo() -> ballm::Result<()> {
//! use ballm::{Arena, ArenaConfig, CatalogConfig, NormalizeMode, ResponseShape};
//!
//! let catalog = CatalogConfig::load("models.yaml")?;
//! let arena = Arena::new(catalog, ArenaConfig::default())?;
//! let tasks = vec![
//!   arena.build_task("volcengine-doubao", None, Some("hi"), ResponseShape::Text, 0.0)?
//! ];
//! let results = arena.submit(tasks, |p| println!("{:.0}%", p * 100.0)).await;
//! let answers = arena.post_process(&results, NormalizeMode::Passthrough).await;
//! # Ok(()) }
//! ```

pub mod error;
pub mod config;
pub mod request;
pub mod logging;
pub mod providers;
pub mod client;
pub mod admission;
pub mod dispatcher;
pub mod normalizer;
pub mod comparator;
pub mod stats;
pub mod template;
pub mod arena;
pub mod table;

/*

ballm/
├── Cargo.toml
├── src/
│   ├── lib.rs          # Re-exports and main documentation
│   ├── error.rs        # Error type shared by every module
│   ├── config.rs       # Model catalog (YAML) and runtime knobs
│   ├── request.rs      # Task / RequestResult
│   ├── logging.rs      # Per-request log records and sinks
│   ├── providers/      # Chat-completions wire format and backends
│   ├── client.rs       # One timed, logged call to one model
│   ├── admission.rs    # Per-provider in-flight limits
│   ├── dispatcher.rs   # Batch fan-out / ordered fan-in
│   ├── normalizer/     # JSON repair and location enrichment
│   ├── comparator.rs   # Answer vs expected predicates
│   ├── stats.rs        # Per-model summaries
│   ├── template.rs     # $var prompt templates
│   ├── arena.rs        # Caller-facing pipeline
│   └── table.rs        # Rows × models table runs
└── tests/

*/

pub use error::{Error, Result};
pub use config::{ArenaConfig, CatalogConfig, ModelDescriptor, PriceTier, TemperatureFloors};
pub use request::{ChatMessage, RequestResult, ResponseShape, Role, Task};
pub use admission::{AdmissionController, AdmissionTicket};
pub use client::ProviderClient;
pub use dispatcher::Dispatcher;
pub use normalizer::{
  Normalized, NormalizedResult, NormalizeMode, RepairStage, RepairTally, ResponseNormalizer,
};
pub use comparator::CompareMode;
pub use stats::{ComparisonOutcome, ModelSummary};
pub use arena::{Arena, SingleRow};
pub use table::{TablePrompt, TableReport, TableRun};
