//! Covariance bookkeeping for the pose filter: prediction through the
//! process Jacobian, innovation covariance, posterior update and a bounded
//! Tikhonov regularization for inverting a near-singular innovation
//! covariance.

use crate::error::{EkfError, Result};
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Policy for regularizing an ill-conditioned innovation covariance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegularizationPolicy {
    /// First ε added to the diagonal.
    pub initial_epsilon: f64,
    /// Factor ε is multiplied by on every further retry.
    pub growth: f64,
    /// Number of regularized attempts after the plain one.
    pub max_retries: u32,
    /// Largest eigenvalue ratio still considered invertible.
    pub max_condition: f64,
}

impl Default for RegularizationPolicy {
    fn default() -> Self {
        RegularizationPolicy {
            initial_epsilon: 1e-5,
            growth: 10.0,
            max_retries: 8,
            max_condition: 1e12,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CovarianceUpdate {
    /// P' = (I - KH) P
    Standard,
    /// P' = (I - KH) P (I - KH)^T + K R K^T
    Joseph,
}

impl Default for CovarianceUpdate {
    fn default() -> Self {
        CovarianceUpdate::Standard
    }
}

pub fn symmetrize(P: &Matrix3<f64>) -> Matrix3<f64> {
    (P + P.transpose()) * 0.5
}

/// P' = F P F^T + Q
pub fn propagate(P: &Matrix3<f64>, F: &Matrix3<f64>, Q: &Matrix3<f64>) -> Matrix3<f64> {
    symmetrize(&(F * P * F.transpose() + Q))
}

/// S = H P H^T + R
pub fn innovation_covariance(
    P: &Matrix3<f64>,
    H: &Matrix3<f64>,
    R: &Matrix3<f64>,
) -> Matrix3<f64> {
    symmetrize(&(H * P * H.transpose() + R))
}

pub fn posterior(
    P: &Matrix3<f64>,
    K: &Matrix3<f64>,
    H: &Matrix3<f64>,
    R: &Matrix3<f64>,
    form: CovarianceUpdate,
) -> Matrix3<f64> {
    let Jo = Matrix3::identity() - K * H;
    let P = match form {
        CovarianceUpdate::Standard => Jo * P,
        CovarianceUpdate::Joseph => Jo * P * Jo.transpose() + K * R * K.transpose(),
    };
    symmetrize(&P)
}

/// Inverse of a symmetric matrix if it is positive definite and its
/// condition number stays below `max_condition`.
fn checked_inverse(S: &Matrix3<f64>, max_condition: f64) -> Option<Matrix3<f64>> {
    if S.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let eig = S.symmetric_eigen().eigenvalues;
    let lo = eig.min();
    let hi = eig.max();
    if lo <= 0.0 || hi / lo > max_condition {
        return None;
    }
    S.cholesky().map(|chol| symmetrize(&chol.inverse()))
}

/// Inverts the innovation covariance, adding εI with geometrically growing ε
/// until it becomes well conditioned or the retry budget is exhausted.
pub fn regularized_inverse(S: &Matrix3<f64>, policy: &RegularizationPolicy) -> Result<Matrix3<f64>> {
    if let Some(S_inv) = checked_inverse(S, policy.max_condition) {
        return Ok(S_inv);
    }

    let mut epsilon = policy.initial_epsilon;
    for retry in 1..=policy.max_retries {
        let S_reg = S + Matrix3::identity() * epsilon;
        if let Some(S_inv) = checked_inverse(&S_reg, policy.max_condition) {
            warn!(retry, epsilon, "innovation covariance regularized");
            return Ok(S_inv);
        }
        if retry < policy.max_retries {
            epsilon *= policy.growth;
        }
    }

    Err(EkfError::NumericalInstability {
        retries: policy.max_retries,
        epsilon,
    })
}

pub fn is_symmetric(P: &Matrix3<f64>, tol: f64) -> bool {
    (P - P.transpose()).amax() <= tol
}

pub fn is_positive_semidefinite(P: &Matrix3<f64>, tol: f64) -> bool {
    is_symmetric(P, tol) && symmetrize(P).symmetric_eigen().eigenvalues.min() >= -tol
}
