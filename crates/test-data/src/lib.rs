//! Test data generation for trackfix.
//!
//! This crate generates realistic recorded activities, planned routes and
//! POI sets so the engine can be exercised end to end without fixture files.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_data::prelude::*;
//!
//! let scenario = ScenarioBuilder::new()
//!     .with_region(Region::BOULDER)
//!     .with_sport(Sport::Running)
//!     .with_distance(5000.0)
//!     .with_laps(2)
//!     .build();
//!
//! let tcx = scenario.recorded_tcx();
//! let route = scenario.planned_route();
//! ```

pub mod builders;
pub mod config;
pub mod profiles;
pub mod sources;
pub mod terrain;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::builders::{Scenario, ScenarioBuilder};
    pub use crate::config::{BoundingBox, Region, ScenarioConfig, Sport};
    pub use crate::profiles::{
        AthleteProfile, CyclistProfile, RunnerProfile, sample_variance, speed_at_grade,
    };
    pub use crate::sources::{ProceduralGenerator, TrackConfig};
    pub use crate::terrain::ElevationGenerator;
}
