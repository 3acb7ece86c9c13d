//! Pose filter for the paper robot. Owns the estimate and its covariance and
//! runs one predict/update cycle per control tick.

use crate::config::FilterConfig;
use crate::error::{EkfError, Result};
use crate::history::History;
use crate::pose::Pose;
use crate::state_estimator::ekf::{GaussParams, EKF};
use crate::state_estimator::models::dynamic::{DifferentialDrive, WheelCommand};
use crate::state_estimator::models::measurement::{ArenaRangefinders, Measurement};
use crate::state_estimator::models::DynamicModel;
use crate::state_estimator::StateEstimator;
use nalgebra::{Matrix3, Vector3};
use tracing::{debug, warn};

/// What happened to the measurement in one cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Corrected,
    PredictedOnly,
    /// The update failed; the predicted estimate was kept.
    UpdateSkipped(EkfError),
}

pub struct PoseFilter {
    ekf: EKF<DifferentialDrive, ArenaRangefinders>,
    eststate: GaussParams,
    history: History,
}

impl PoseFilter {
    pub fn new(config: &FilterConfig) -> Result<Self> {
        config.validate()?;

        let dynmod = DifferentialDrive::new(
            config.dt,
            config.wheel_diameter,
            config.wheel_separation,
            config.actuation_neutral,
            config.rate_exponent,
            config.process_noise,
        );
        let measmod = ArenaRangefinders::new(config.arena, config.measurement_noise);
        let ekf = EKF::init(
            dynmod,
            measmod,
            config.regularization,
            config.covariance_update,
        );

        let p0 = &config.initial_pose;
        let x0 = Pose::new(p0.x, p0.y, p0.theta);
        let P0 = Matrix3::from_diagonal(&Vector3::from(config.initial_covariance()));

        let mut history = History::new();
        history.record(&x0);

        Ok(PoseFilter {
            ekf,
            eststate: GaussParams::new(x0, P0),
            history,
        })
    }

    pub fn pose(&self) -> &Pose {
        &self.eststate.x
    }

    pub fn covariance(&self) -> &Matrix3<f64> {
        &self.eststate.P
    }

    pub fn state(&self) -> &GaussParams {
        &self.eststate
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn ekf(&self) -> &EKF<DifferentialDrive, ArenaRangefinders> {
        &self.ekf
    }

    pub fn motion_model(&self) -> &DifferentialDrive {
        self.ekf.dynmod()
    }

    pub fn sensor_model(&self) -> &ArenaRangefinders {
        self.ekf.measmod()
    }

    /// Propagates the estimate through the motion model. Returns the new pose
    /// and the process Jacobian used for the covariance. Does not touch the
    /// history; only [`PoseFilter::step`] records a snapshot per cycle.
    pub fn predict(&mut self, u: &WheelCommand) -> (Pose, Matrix3<f64>) {
        let F = self.ekf.dynmod().F(&self.eststate.x, u);
        self.eststate = self.ekf.predict(&self.eststate, u);
        (self.eststate.x, F)
    }

    /// Corrects the estimate with a measurement. On error the estimate is
    /// left untouched. Like [`PoseFilter::predict`], it does not record
    /// history.
    pub fn update(&mut self, z: &Measurement) -> Result<()> {
        self.eststate = self.ekf.update(z, &self.eststate)?;
        Ok(())
    }

    /// One control cycle: predict, update when a measurement is available,
    /// then record the estimate in the history.
    pub fn step(&mut self, u: &WheelCommand, z: Option<&Measurement>) -> StepOutcome {
        self.predict(u);
        let outcome = match z {
            None => StepOutcome::PredictedOnly,
            Some(z) => match self.update(z) {
                Ok(()) => StepOutcome::Corrected,
                Err(e) => {
                    warn!(error = %e, "skipping measurement update, keeping prediction");
                    StepOutcome::UpdateSkipped(e)
                }
            },
        };
        self.history.record(&self.eststate.x);
        debug!(timestep = self.history.len() - 1, pose = %self.eststate.x, "cycle done");
        outcome
    }
}
