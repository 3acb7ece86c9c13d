use super::covariance::{
    innovation_covariance, posterior, propagate, regularized_inverse, CovarianceUpdate,
    RegularizationPolicy,
};
use super::models::measurement::Measurement;
use super::models::{DynamicModel, MeasurementModel};
use super::StateEstimator;
use crate::consistency::Consistency;
use crate::error::Result;
use crate::pose::{wrap_to_pi, Pose};
use nalgebra::{Matrix3, Vector3};
use tracing::{debug, trace};

#[derive(Debug, Clone, PartialEq)]
pub struct GaussParams {
    pub x: Pose,
    pub P: Matrix3<f64>,
}

impl GaussParams {
    pub fn new(x: Pose, P: Matrix3<f64>) -> Self {
        GaussParams { x, P }
    }
}

impl std::fmt::Display for GaussParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} P:{}", self.x, self.P)
    }
}

/// Innovation of one measurement against the current estimate.
#[derive(Debug, Clone)]
pub struct Innovation {
    pub zpred: Measurement,
    pub v: Vector3<f64>,
    pub S: Matrix3<f64>,
    pub H: Matrix3<f64>,
}

pub struct EKF<D, M>
where
    D: DynamicModel,
    M: MeasurementModel,
{
    dynmod: D,
    measmod: M,
    regularization: RegularizationPolicy,
    covariance_update: CovarianceUpdate,
}

impl<D, M> EKF<D, M>
where
    D: DynamicModel<State = Pose, Jacobian = Matrix3<f64>, Covariance = Matrix3<f64>>,
    M: MeasurementModel<State = Pose, Measurement = Measurement, Jacobian = Matrix3<f64>, Covariance = Matrix3<f64>>,
{
    pub fn init(
        dynmod: D,
        measmod: M,
        regularization: RegularizationPolicy,
        covariance_update: CovarianceUpdate,
    ) -> Self {
        EKF {
            dynmod,
            measmod,
            regularization,
            covariance_update,
        }
    }

    pub fn dynmod(&self) -> &D {
        &self.dynmod
    }

    pub fn measmod(&self) -> &M {
        &self.measmod
    }

    pub fn innovation(&self, eststate: &GaussParams, z: &Measurement) -> Innovation {
        let x = &eststate.x;
        let zpred = self.measmod.h(x);
        let H = self.measmod.H(x);
        let R = self.measmod.R();

        let mut v = z.as_vector() - zpred.as_vector();
        v[2] = wrap_to_pi(v[2]);
        let S = innovation_covariance(&eststate.P, &H, &R);

        Innovation { zpred, v, S, H }
    }
}

impl<D, M> StateEstimator for EKF<D, M>
where
    D: DynamicModel<State = Pose, Jacobian = Matrix3<f64>, Covariance = Matrix3<f64>>,
    M: MeasurementModel<State = Pose, Measurement = Measurement, Jacobian = Matrix3<f64>, Covariance = Matrix3<f64>>,
{
    type Params = GaussParams;
    type Input = D::Input;
    type Measurement = Measurement;

    fn predict(&self, eststate: &GaussParams, u: &D::Input) -> GaussParams {
        let F = self.dynmod.F(&eststate.x, u);
        let Q = self.dynmod.Q();

        let x = self.dynmod.f(&eststate.x, u);
        let P = propagate(&eststate.P, &F, &Q);

        trace!(F = %F, "process jacobian");
        debug!(pose = %x, trace_P = P.trace(), "predicted");
        GaussParams::new(x, P)
    }

    fn update(&self, z: &Measurement, eststate: &GaussParams) -> Result<GaussParams> {
        let Innovation { v, S, H, .. } = self.innovation(eststate, z);
        let S_inv = regularized_inverse(&S, &self.regularization)?;

        let P = &eststate.P;
        let W = P * H.transpose() * S_inv;
        let R = self.measmod.R();

        let x = eststate.x.offset(&(W * v));
        let P = posterior(P, &W, &H, &R, self.covariance_update);

        trace!(H = %H, W = %W, "measurement update");
        debug!(pose = %x, trace_P = P.trace(), "updated");
        Ok(GaussParams::new(x, P))
    }

    fn step(&self, z: &Measurement, eststate: &GaussParams, u: &D::Input) -> Result<GaussParams> {
        let eststate_pred = self.predict(eststate, u);
        self.update(z, &eststate_pred)
    }
}

impl<D, M> Consistency for EKF<D, M>
where
    D: DynamicModel<State = Pose, Jacobian = Matrix3<f64>, Covariance = Matrix3<f64>>,
    M: MeasurementModel<State = Pose, Measurement = Measurement, Jacobian = Matrix3<f64>, Covariance = Matrix3<f64>>,
{
    type Params = GaussParams;
    type Measurement = Measurement;
    type GroundTruth = Pose;

    fn NIS(&self, eststate: &GaussParams, z: &Measurement) -> Result<f64> {
        let Innovation { v, S, .. } = self.innovation(eststate, z);
        let S_inv = regularized_inverse(&S, &self.regularization)?;
        Ok(v.dot(&(S_inv * v)))
    }

    fn NEES(&self, eststate: &GaussParams, x_gt: &Pose) -> Result<f64> {
        let x = &eststate.x;
        let x_err = Vector3::new(x.x - x_gt.x, x.y - x_gt.y, wrap_to_pi(x.theta - x_gt.theta));
        let P_inv = regularized_inverse(&eststate.P, &self.regularization)?;
        Ok(x_err.dot(&(P_inv * x_err)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::ArenaBounds;
    use crate::state_estimator::covariance::is_positive_semidefinite;
    use crate::state_estimator::models::dynamic::{DifferentialDrive, WheelCommand};
    use crate::state_estimator::models::measurement::ArenaRangefinders;
    use approx::assert_relative_eq;
    use std::f64::consts::TAU as _2_PI;

    fn ekf(q: [f64; 3], r: [f64; 3]) -> EKF<DifferentialDrive, ArenaRangefinders> {
        EKF::init(
            DifferentialDrive::new(0.1, 49.0, 84.0, 90.0, 0.2, q),
            ArenaRangefinders::new(ArenaBounds::default(), r),
            RegularizationPolicy::default(),
            CovarianceUpdate::Standard,
        )
    }

    fn prior() -> GaussParams {
        GaussParams::new(
            Pose::new(300.0, 200.0, 0.6),
            Matrix3::from_diagonal(&Vector3::new(25.0, 25.0, 0.05)),
        )
    }

    #[test]
    fn test_predict_moves_mean_and_grows_P() {
        let filter = ekf([0.025, 0.025, 0.89], [3.28, 1.86, 0.8]);
        let eststate = prior();
        let pred = filter.predict(&eststate, &WheelCommand::new(120.0, 120.0));
        assert!(pred.x.y > eststate.x.y);
        assert!(pred.x.x > eststate.x.x);
        assert!(pred.P.trace() > eststate.P.trace());
        assert!(is_positive_semidefinite(&pred.P, 1e-9));
    }

    #[test]
    fn test_update_with_exact_measurement_keeps_mean() {
        let filter = ekf([0.0; 3], [0.0; 3]);
        let eststate = prior();
        let z = filter.measmod().expected(&eststate.x);
        let upd = filter.update(&z, &eststate).unwrap();
        assert_relative_eq!(upd.x.x, eststate.x.x, epsilon = 1e-9);
        assert_relative_eq!(upd.x.y, eststate.x.y, epsilon = 1e-9);
        assert_relative_eq!(upd.x.theta, eststate.x.theta, epsilon = 1e-12);
    }

    #[test]
    fn test_update_pulls_toward_measurement() {
        let filter = ekf([0.025, 0.025, 0.89], [3.28, 1.86, 0.8]);
        let eststate = prior();
        let truth = Pose::new(310.0, 205.0, 0.62);
        let z = filter.measmod().expected(&truth);
        let upd = filter.update(&z, &eststate).unwrap();

        let err_before = (eststate.x.as_vector() - truth.as_vector()).norm();
        let err_after = (upd.x.as_vector() - truth.as_vector()).norm();
        assert!(err_after < err_before);
        assert!(upd.P.trace() < eststate.P.trace());
        assert!(is_positive_semidefinite(&upd.P, 1e-9));
    }

    #[test]
    fn test_heading_innovation_wraps() {
        let filter = ekf([0.0; 3], [3.28, 1.86, 0.8]);
        let eststate = GaussParams::new(Pose::new(300.0, 200.0, 0.05), prior().P);
        let mut z = filter.measmod().expected(&eststate.x);
        z.heading = _2_PI - 0.05;
        let innov = filter.innovation(&eststate, &z);
        assert_relative_eq!(innov.v[2], -0.1, epsilon = 1e-12);

        let upd = filter.update(&z, &eststate).unwrap();
        assert!(upd.x.theta < 0.05 || upd.x.theta > _2_PI - 0.05);
    }

    #[test]
    fn test_zero_covariance_update_is_regularized() {
        let filter = ekf([0.0; 3], [0.0; 3]);
        let eststate = GaussParams::new(Pose::new(300.0, 200.0, 0.6), Matrix3::zeros());
        let z = Measurement::new(100.0, 100.0, 0.7);
        let upd = filter.update(&z, &eststate).unwrap();
        assert_relative_eq!(upd.x.as_vector(), eststate.x.as_vector(), epsilon = 1e-9);
        assert_relative_eq!(upd.P, Matrix3::zeros());
    }

    #[test]
    fn test_nis_and_nees() {
        let filter = ekf([0.025, 0.025, 0.89], [3.28, 1.86, 0.8]);
        let eststate = prior();
        let z = filter.measmod().expected(&eststate.x);
        assert_relative_eq!(filter.NIS(&eststate, &z).unwrap(), 0.0, epsilon = 1e-12);

        let truth = Pose::new(305.0, 200.0, 0.6);
        assert_relative_eq!(filter.NEES(&eststate, &truth).unwrap(), 1.0, epsilon = 1e-9);
    }
}
