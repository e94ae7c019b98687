//! Fluent builder APIs for test scenarios.
//!
//! The [`ScenarioBuilder`] generates a recorded activity together with the
//! planned route and POI set that go with it.

mod scenario;

pub use scenario::{Scenario, ScenarioBuilder};
