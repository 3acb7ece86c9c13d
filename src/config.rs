use crate::error::{EkfError, Result};
use crate::pose::{ArenaBounds, Pose};
use crate::state_estimator::covariance::{CovarianceUpdate, RegularizationPolicy};
use serde::{Deserialize, Serialize};
use std::{fs::File, path::Path};

/// Construction-time parameters of the pose filter. Lengths in millimeters,
/// time in seconds. Defaults describe the paper robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub arena: ArenaBounds,
    /// Distance between the wheels (A).
    pub wheel_separation: f64,
    pub dt: f64,
    pub wheel_diameter: f64,
    /// Raw actuation value that maps to zero wheel rate.
    pub actuation_neutral: f64,
    pub rate_exponent: f64,
    /// Diagonal of Q over (x, y, θ).
    pub process_noise: [f64; 3],
    /// Diagonal of R over (front range, right range, heading).
    pub measurement_noise: [f64; 3],
    pub initial_pose: Pose,
    /// Diagonal of the initial P; Q when absent.
    pub initial_covariance: Option<[f64; 3]>,
    pub regularization: RegularizationPolicy,
    pub covariance_update: CovarianceUpdate,
}

impl Default for FilterConfig {
    fn default() -> Self {
        let dt = 0.1;
        FilterConfig {
            arena: ArenaBounds::default(),
            wheel_separation: 84.0,
            dt,
            wheel_diameter: 49.0,
            actuation_neutral: 90.0,
            rate_exponent: 0.2,
            process_noise: [0.25 * dt, 0.25 * dt, 0.89],
            measurement_noise: [3.28, 1.86, 0.8],
            initial_pose: Pose::default(),
            initial_covariance: None,
            regularization: RegularizationPolicy::default(),
            covariance_update: CovarianceUpdate::default(),
        }
    }
}

fn require_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EkfError::InvalidConfiguration(format!(
            "{} must be positive and finite, got {}",
            name, value
        )))
    }
}

fn require_non_negative_diagonal(name: &str, diag: &[f64; 3]) -> Result<()> {
    match diag.iter().find(|v| !(v.is_finite() && **v >= 0.0)) {
        Some(v) => Err(EkfError::InvalidConfiguration(format!(
            "{} entries must be non-negative and finite, got {}",
            name, v
        ))),
        None => Ok(()),
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<()> {
        require_positive("dt", self.dt)?;
        require_positive("wheel_separation", self.wheel_separation)?;
        require_positive("wheel_diameter", self.wheel_diameter)?;
        require_positive("arena.width", self.arena.width)?;
        require_positive("arena.height", self.arena.height)?;
        require_positive("rate_exponent", self.rate_exponent)?;
        if !self.actuation_neutral.is_finite() {
            return Err(EkfError::InvalidConfiguration(
                "actuation_neutral must be finite".to_string(),
            ));
        }

        require_non_negative_diagonal("process_noise", &self.process_noise)?;
        require_non_negative_diagonal("measurement_noise", &self.measurement_noise)?;
        if let Some(p0) = &self.initial_covariance {
            require_non_negative_diagonal("initial_covariance", p0)?;
        }

        let pose = &self.initial_pose;
        if !(pose.x.is_finite() && pose.y.is_finite() && pose.theta.is_finite()) {
            return Err(EkfError::InvalidConfiguration(
                "initial_pose must be finite".to_string(),
            ));
        }

        let reg = &self.regularization;
        require_positive("regularization.initial_epsilon", reg.initial_epsilon)?;
        require_positive("regularization.max_condition", reg.max_condition)?;
        if !(reg.growth.is_finite() && reg.growth > 1.0) {
            return Err(EkfError::InvalidConfiguration(format!(
                "regularization.growth must exceed 1, got {}",
                reg.growth
            )));
        }
        Ok(())
    }

    pub fn initial_covariance(&self) -> [f64; 3] {
        self.initial_covariance.unwrap_or(self.process_noise)
    }
}

pub fn read_config_from_json(config_path: impl AsRef<Path>) -> anyhow::Result<FilterConfig> {
    let file = File::open(config_path)?;
    let config: FilterConfig = serde_json::from_reader(file)?;
    config.validate()?;

    Ok(config)
}
