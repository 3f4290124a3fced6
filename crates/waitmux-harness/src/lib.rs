//! Scenario-conformance harness for the waitmux primitives.
//!
//! Drives the end-to-end concurrency scenarios (multiple waiters on one
//! event, producer/consumer through a semaphore, contended mutex counting,
//! predicate condition waits, timed waits, and the multiplexed wait-set)
//! and aggregates the outcomes into a serializable report.

pub mod report;
pub mod scenario;

pub use report::{ScenarioReport, ScenarioSummary};
pub use scenario::{ScenarioConfig, ScenarioOutcome, run_all, run_scenario, scenario_names};
