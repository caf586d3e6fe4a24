//! Flotilla Scheduler - Placement to member cluster scheduling
//!
//! This crate provides:
//! - Plugin status signaling and per-cycle state
//! - The plugin contract (PreFilter, Filter, PreScore, Score) and profiles
//! - The cluster affinity plugin
//! - The scheduling framework that filters, scores and selects clusters
//! - A scheduler service feeding decisions to a binding sink

pub mod binding;
pub mod cluster_source;
pub mod cycle_state;
pub mod error;
pub mod framework;
pub mod plugin;
pub mod plugins;
pub mod scheduler;
pub mod status;
pub mod types;

// Re-export commonly used types
pub use binding::{BindingSink, MemoryBindingSink};
pub use cluster_source::{ClusterSource, StaticClusterSource};
pub use cycle_state::{CycleState, StateKey};
pub use error::{Result, SchedulerError};
pub use framework::{Framework, FrameworkConfig};
pub use plugin::{FilterPlugin, Plugin, PreFilterPlugin, PreScorePlugin, Profile, ScorePlugin};
pub use plugins::{default_profile, ClusterAffinityPlugin};
pub use scheduler::{Scheduler, SchedulerConfig};
pub use status::{Code, Status};
pub use types::{FilterResult, ScheduleDecision, ScoreResult};
