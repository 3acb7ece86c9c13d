pub mod covariance;
pub mod ekf;
pub mod models;

use crate::error::Result;

pub trait StateEstimator {
    type Params;
    type Input;
    type Measurement;

    fn predict(&self, eststate: &Self::Params, u: &Self::Input) -> Self::Params;

    fn update(&self, z: &Self::Measurement, eststate: &Self::Params) -> Result<Self::Params>;

    fn step(&self, z: &Self::Measurement, eststate: &Self::Params, u: &Self::Input) -> Result<Self::Params>;
}
