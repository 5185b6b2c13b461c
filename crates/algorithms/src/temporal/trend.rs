//! Trend and velocity of an index series
//!
//! Both operate on points sorted by date, with time measured in whole days
//! since the first point.

use serde::{Deserialize, Serialize};

use super::records::{days_between, TimeSeriesPoint};
use crate::statistics::{linear_regression, mean};
use geowatch_core::Result;

/// Slopes below this magnitude (per day) are a stable trend
pub const STABLE_SLOPE: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Increasing => "increasing",
            TrendDirection::Decreasing => "decreasing",
            TrendDirection::Stable => "stable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub direction: TrendDirection,
    /// Change per day
    pub slope: f64,
    pub r_squared: f64,
    pub p_value: f64,
    pub confidence: f64,
}

/// Least-squares trend of value against days since the first point
pub fn calculate_trend(points: &[TimeSeriesPoint]) -> Result<TrendAnalysis> {
    let first = points.first().map(|p| p.date).unwrap_or_default();
    let x: Vec<f64> = points.iter().map(|p| days_between(&first, &p.date) as f64).collect();
    let y: Vec<f64> = points.iter().map(|p| p.value).collect();
    let fit = linear_regression(&x, &y)?;

    let (direction, confidence) = if fit.slope.abs() < STABLE_SLOPE {
        let confidence = if fit.p_value < 0.05 { 0.9 } else { 0.5 };
        (TrendDirection::Stable, confidence)
    } else {
        let direction = if fit.slope > 0.0 {
            TrendDirection::Increasing
        } else {
            TrendDirection::Decreasing
        };
        (direction, (fit.r_squared * (1.0 - fit.p_value)).clamp(0.0, 1.0))
    };

    Ok(TrendAnalysis {
        direction,
        slope: fit.slope,
        r_squared: fit.r_squared,
        p_value: fit.p_value,
        confidence,
    })
}

// ---------------------------------------------------------------------------
// Velocity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VelocitySeverity {
    Stable,
    SlowImprovement,
    SlowDegradation,
    ModerateImprovement,
    ModerateDegradation,
    RapidImprovement,
    RapidDegradation,
    ModerateChange,
}

impl VelocitySeverity {
    /// Classify from the latest velocity and mean acceleration (per day)
    pub fn classify(velocity: f64, acceleration: f64) -> Self {
        let speed = velocity.abs();
        if speed < 0.001 && acceleration.abs() < 1e-4 {
            VelocitySeverity::Stable
        } else if speed < 0.002 {
            if acceleration <= 0.0 {
                VelocitySeverity::SlowImprovement
            } else {
                VelocitySeverity::SlowDegradation
            }
        } else if speed < 0.005 {
            if acceleration <= 0.0 {
                VelocitySeverity::ModerateImprovement
            } else {
                VelocitySeverity::ModerateDegradation
            }
        } else if velocity < 0.0 {
            VelocitySeverity::RapidDegradation
        } else if velocity > 0.0 {
            VelocitySeverity::RapidImprovement
        } else {
            VelocitySeverity::ModerateChange
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VelocitySeverity::Stable => "stable",
            VelocitySeverity::SlowImprovement => "slow_improvement",
            VelocitySeverity::SlowDegradation => "slow_degradation",
            VelocitySeverity::ModerateImprovement => "moderate_improvement",
            VelocitySeverity::ModerateDegradation => "moderate_degradation",
            VelocitySeverity::RapidImprovement => "rapid_improvement",
            VelocitySeverity::RapidDegradation => "rapid_degradation",
            VelocitySeverity::ModerateChange => "moderate_change",
        }
    }

    pub fn is_rapid(&self) -> bool {
        matches!(
            self,
            VelocitySeverity::RapidImprovement | VelocitySeverity::RapidDegradation
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VelocityAnalysis {
    pub average_velocity: f64,
    /// Velocity over the last pair of points
    pub current_velocity: f64,
    /// Mean first difference of the velocities
    pub acceleration: f64,
    pub is_accelerating: bool,
    /// Days until the critical threshold at the current velocity; `None`
    /// when moving away from it or no threshold was given
    pub days_to_critical: Option<f64>,
    pub severity: VelocitySeverity,
}

impl Default for VelocityAnalysis {
    fn default() -> Self {
        Self {
            average_velocity: 0.0,
            current_velocity: 0.0,
            acceleration: 0.0,
            is_accelerating: false,
            days_to_critical: None,
            severity: VelocitySeverity::Stable,
        }
    }
}

/// Per-pair rates of change. Pairs on the same day are skipped.
pub fn calculate_velocity(points: &[TimeSeriesPoint], critical_threshold: Option<f64>) -> VelocityAnalysis {
    let velocities: Vec<f64> = points
        .windows(2)
        .filter_map(|pair| {
            let dt = days_between(&pair[0].date, &pair[1].date);
            (dt > 0).then(|| (pair[1].value - pair[0].value) / dt as f64)
        })
        .collect();

    let (Some(average_velocity), Some(&current_velocity)) = (mean(&velocities), velocities.last()) else {
        return VelocityAnalysis::default();
    };

    let accelerations: Vec<f64> = velocities.windows(2).map(|v| v[1] - v[0]).collect();
    let acceleration = mean(&accelerations).unwrap_or(0.0);

    let days_to_critical = match (critical_threshold, points.last()) {
        (Some(threshold), Some(last)) if current_velocity != 0.0 => {
            let days = (threshold - last.value) / current_velocity;
            (days >= 0.0).then_some(days)
        }
        _ => None,
    };

    VelocityAnalysis {
        average_velocity,
        current_velocity,
        acceleration,
        is_accelerating: acceleration > 1e-4,
        days_to_critical,
        severity: VelocitySeverity::classify(current_velocity, acceleration),
    }
}
