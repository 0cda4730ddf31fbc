//! Time-windowed, in-process metric aggregation.
//!
//! Integer samples are submitted under a metric name. Every `duration_ms`
//! the live window is rotated out and summarized (count, sum, average,
//! min/max, throughput, p10/p50/p99/p999) by a background worker, and the
//! newest `sample_count` summaries are kept for reporting.
//!
//! ```no_run
//! use epochstat::{Engine, EngineConfig};
//!
//! let engine = Engine::start(EngineConfig::from_secs(20, 2))?;
//! engine.submit("request_us", 180);
//! println!("{}", engine.generate_report());
//! engine.terminate();
//! # Ok::<(), epochstat::EngineError>(())
//! ```

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod latency;
pub mod report;
pub mod stats;
pub mod types;
pub mod window;

pub use config::EngineConfig;
pub use engine::health::HealthSnapshot;
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use types::{HistorySnapshot, Summary, SummarySet};
