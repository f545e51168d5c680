//! Tick-driven simulation for tickworld.
//!
//! Runs behavior modules against a [`tw_core::WorldState`] one simulated hour
//! at a time, sweeps modifier expiry and renewal, resolves entity
//! requirements against prioritized sources, and persists snapshots so a
//! run can be paused and resumed without changing its outcome.

/// Configuration types for simulation runs.
pub mod config;
/// Modifier expiry and renewal sweeps.
pub mod engine;
/// Error types for the simulation crate.
pub mod error;
/// The trait every behavior module implements, and the module registry.
pub mod module;
/// Built-in behavior modules: replenishment, consumption, needs.
pub mod modules;
/// Snapshot stores: JSON file and in-memory.
pub mod persistence;
/// Requirement resolution across prioritized sources.
pub mod resolver;
/// Top-level simulation driver.
pub mod simulation;
/// Requirement source configuration and applicability predicates.
pub mod source;
/// Periodic world summaries for the log.
pub mod summary;

/// Re-exports of configuration types.
pub use config::{EntitySpec, ModuleEntry, SimConfig, SummaryConfig};
/// Re-exports of [`error::SimError`] and [`error::SimResult`].
pub use error::{SimError, SimResult};
/// Re-exports of the module trait and registry.
pub use module::{BehaviorModule, ModuleFactory, ModuleRegistry};
/// Re-exports of the snapshot stores.
pub use persistence::{JsonFileStore, MemoryStore, SnapshotStore};
/// Re-exports of resolver types.
pub use resolver::{
    AttemptResult, RequirementResolver, ResolutionOutcome, ResolverConfig, SourceAttempt,
};
/// Re-exports of driver types.
pub use simulation::{DriverState, RunReport, Simulation, StopHandle, StopReason};
/// Re-exports of source types.
pub use source::{FulfillmentStrategy, RequirementSource, SourceCondition, SourceSpec};
/// Re-exports of summary types.
pub use summary::{SummaryTracker, WorldSummary};
