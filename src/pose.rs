use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU as _2_PI};

/// Wraps an angle into [0, 2π).
pub fn wrap_angle(theta: f64) -> f64 {
    let wrapped = theta.rem_euclid(_2_PI);
    // rem_euclid can round up to exactly 2π for tiny negative inputs
    if wrapped >= _2_PI {
        0.0
    } else {
        wrapped
    }
}

/// Wraps an angle difference into [-π, π).
pub fn wrap_to_pi(dtheta: f64) -> f64 {
    wrap_angle(dtheta + PI) - PI
}

/// Planar robot pose. Position in millimeters, heading in radians measured
/// clockwise from the +y axis, always kept in [0, 2π).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawPose")]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Pose {
            x,
            y,
            theta: wrap_angle(theta),
        }
    }

    pub fn as_vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.theta)
    }

    /// Additive pose change followed by heading wrap.
    pub fn offset(&self, delta: &Vector3<f64>) -> Self {
        Pose::new(self.x + delta[0], self.y + delta[1], self.theta + delta[2])
    }
}

#[derive(Deserialize)]
struct RawPose {
    x: f64,
    y: f64,
    theta: f64,
}

impl From<RawPose> for Pose {
    fn from(raw: RawPose) -> Self {
        Pose::new(raw.x, raw.y, raw.theta)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Pose::new(0.0, 0.0, 0.0)
    }
}

impl std::fmt::Display for Pose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "X: {:.3}, Y: {:.3}, Th: {:.4}", self.x, self.y, self.theta)
    }
}

/// Axis-aligned arena spanning [0, width] × [0, height] in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArenaBounds {
    pub width: f64,
    pub height: f64,
}

impl Default for ArenaBounds {
    fn default() -> Self {
        ArenaBounds {
            width: 750.0,
            height: 500.0,
        }
    }
}
