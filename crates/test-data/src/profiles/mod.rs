//! Athletic performance profiles.
//!
//! Profiles define realistic speeds, grade factors and sensor behaviour for
//! different activity types. Track generators use them to produce timestamps,
//! heart rate and cadence.

mod cyclist;
mod runner;

pub use cyclist::CyclistProfile;
pub use runner::RunnerProfile;

use rand_distr::{Distribution, Normal};

/// Trait for athletic performance profiles.
///
/// Implementations provide:
/// - Base speed on flat terrain
/// - Grade factor (speed multiplier based on slope)
/// - Day-to-day variance
/// - Heart-rate range and cadence model
pub trait AthleteProfile: Send + Sync {
    /// Base speed on flat terrain in meters per second.
    fn base_speed_mps(&self) -> f64;

    /// Speed multiplier for a given grade (expressed as a fraction, e.g., 0.05 = 5% grade).
    ///
    /// Returns a value between 0 and 2+:
    /// - < 1.0 means slower than base (uphill)
    /// - > 1.0 means faster than base (downhill)
    fn grade_factor(&self, grade: f64) -> f64;

    /// Day-to-day performance variance as a coefficient of variation (0.0 - 1.0).
    fn variance(&self) -> f64;

    /// Heart rate at rest and at full effort, in bpm.
    fn heart_rate_range(&self) -> (f64, f64);

    /// Steps or pedal revolutions per minute at a given speed.
    fn cadence_at(&self, speed_mps: f64) -> u16;

    /// Sport name written into generated activities.
    fn sport(&self) -> &'static str;
}

pub fn speed_at_grade(profile: &dyn AthleteProfile, grade: f64, variance_factor: f64) -> f64 {
    let target = profile.base_speed_mps() * profile.grade_factor(grade);

    // Variance factor is sampled by the caller
    (target * variance_factor).max(0.5) // Minimum 0.5 m/s to avoid division issues
}

/// Samples a variance factor from normal distribution.
/// Returns a multiplier around 1.0.
pub fn sample_variance(profile: &dyn AthleteProfile, rng: &mut impl rand::Rng) -> f64 {
    match Normal::new(1.0, profile.variance()) {
        Ok(normal) if profile.variance() > 0.0 => normal.sample(rng).clamp(0.7, 1.4),
        _ => 1.0,
    }
}

/// Steady-state heart rate for an effort level, where 1.0 is moving at base
/// speed on the flat. Climbing raises the effort even though speed drops.
pub fn target_heart_rate(profile: &dyn AthleteProfile, speed_mps: f64, grade: f64) -> f64 {
    let (rest, max) = profile.heart_rate_range();
    let effort = speed_mps / profile.base_speed_mps() + grade.max(0.0) * 6.0;
    let fraction = (0.55 + 0.3 * effort).clamp(0.4, 0.97);
    rest + (max - rest) * fraction
}

/// Moves `current` toward `target` with a first-order lag of `tau_secs`.
pub fn lagged_heart_rate(current: f64, target: f64, dt_secs: f64, tau_secs: f64) -> f64 {
    if tau_secs <= 0.0 {
        return target;
    }
    current + (target - current) * (1.0 - (-dt_secs / tau_secs).exp())
}
