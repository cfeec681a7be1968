//! Oracle implementations: scriptable in-memory and HTTP gateway

pub mod memory;
pub mod messages;
pub mod rest;
pub mod scenario;

pub use memory::{InMemoryOracle, RecordedPreview, ScriptedOutcome};
pub use rest::RestOracle;
pub use scenario::{Scenario, ScenarioEdit};
