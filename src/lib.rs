// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod alerts;
pub mod analyze;
pub mod config;
pub mod metrics;
pub mod notify;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::alerts::{
    Alert, AlertData, AlertEngine, AlertRule, ConditionType, CycleReport, EngineConfig,
    RuleOutcome, Severity,
};
pub use crate::analyze::{BatchReport, BrandMentionDetector, DataProcessor, TextAnalyzer};
pub use crate::config::{ConfigError, MonitorConfig};
pub use crate::notify::{Notifier, NotifierMux};
pub use crate::store::{MemoryStore, PgStore, ResponseStore, StoreError};
