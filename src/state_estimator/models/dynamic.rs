use super::DynamicModel;
use crate::pose::Pose;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};

/// Raw actuation pair sent to the two wheel servos.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelCommand {
    pub left: f64,
    pub right: f64,
}

impl WheelCommand {
    pub fn new(left: f64, right: f64) -> Self {
        WheelCommand { left, right }
    }
}

/// Signed angular wheel rates after the actuation power law.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelRates {
    pub wl: f64,
    pub wr: f64,
}

// sign(v) * |v|^exponent, total over the reals
pub fn actuation_to_rate(cmd: f64, neutral: f64, exponent: f64) -> f64 {
    let centered = cmd - neutral;
    if centered == 0.0 {
        return 0.0;
    }
    centered.signum() * centered.abs().powf(exponent)
}

/// Differential-drive kinematics with a power-law motor response.
#[derive(Debug, Clone)]
pub struct DifferentialDrive {
    // dt/2 * pi * wheel diameter
    dconst: f64,
    wheel_separation: f64,
    actuation_neutral: f64,
    rate_exponent: f64,
    q: Matrix3<f64>,
}

impl DifferentialDrive {
    pub fn new(
        dt: f64,
        wheel_diameter: f64,
        wheel_separation: f64,
        actuation_neutral: f64,
        rate_exponent: f64,
        process_noise: [f64; 3],
    ) -> Self {
        DifferentialDrive {
            dconst: dt / 2.0 * PI * wheel_diameter,
            wheel_separation,
            actuation_neutral,
            rate_exponent,
            q: Matrix3::from_diagonal(&Vector3::from(process_noise)),
        }
    }

    pub fn dconst(&self) -> f64 {
        self.dconst
    }

    pub fn wheel_rates(&self, u: &WheelCommand) -> WheelRates {
        WheelRates {
            wl: actuation_to_rate(u.left, self.actuation_neutral, self.rate_exponent),
            wr: actuation_to_rate(u.right, self.actuation_neutral, self.rate_exponent),
        }
    }

    /// Pose delta for the given rates, evaluated at heading `theta`.
    pub fn delta(&self, theta: f64, rates: &WheelRates) -> Vector3<f64> {
        let sum = rates.wl + rates.wr;
        Vector3::new(
            self.dconst * (FRAC_PI_2 - theta).cos() * sum,
            self.dconst * (FRAC_PI_2 - theta).sin() * sum,
            self.dconst / self.wheel_separation * (rates.wl - rates.wr),
        )
    }

    /// Next pose and the process Jacobian evaluated at the pre-update heading.
    pub fn predict(&self, x: &Pose, u: &WheelCommand) -> (Pose, Matrix3<f64>) {
        (self.f(x, u), self.F(x, u))
    }
}

impl DynamicModel for DifferentialDrive {
    type State = Pose;
    type Input = WheelCommand;
    type Covariance = Matrix3<f64>;
    type Jacobian = Matrix3<f64>;

    fn f(&self, x: &Self::State, u: &Self::Input) -> Self::State {
        let rates = self.wheel_rates(u);
        x.offset(&self.delta(x.theta, &rates))
    }

    fn F(&self, x: &Self::State, u: &Self::Input) -> Self::Jacobian {
        let rates = self.wheel_rates(u);
        let k = self.dconst * (rates.wl + rates.wr);
        let phi = FRAC_PI_2 - x.theta;
        Matrix3::new(
            1., 0., k * phi.sin(),
            0., 1., -k * phi.cos(),
            0., 0., 1.,
        )
    }

    fn Q(&self) -> Self::Covariance {
        self.q
    }
}
