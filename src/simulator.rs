//! Ground-truth simulation of the paper robot. The true pose follows the same
//! kinematics as the filter with additive Gaussian disturbance, and the
//! sensors return the geometric ranges and heading plus Gaussian noise.

use crate::config::FilterConfig;
use crate::consistency::Consistency;
use crate::filter::{PoseFilter, StepOutcome};
use crate::pose::Pose;
use crate::state_estimator::ekf::GaussParams;
use crate::state_estimator::models::dynamic::{DifferentialDrive, WheelCommand};
use crate::state_estimator::models::measurement::{ArenaRangefinders, Measurement};
use crate::state_estimator::models::DynamicModel;
use crate::state_estimator::StateEstimator;
use itertools::izip;
use nalgebra::Vector3;
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tracing::info;

/// Standard deviations used to disturb the simulated robot and its sensors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationNoise {
    /// Per-step disturbance of the true (x, y, θ).
    pub process_std: [f64; 3],
    /// Front and right rangefinder noise.
    pub range_std: [f64; 2],
    pub heading_std: f64,
}

impl Default for SimulationNoise {
    fn default() -> Self {
        SimulationNoise::from_config(&FilterConfig::default())
    }
}

impl SimulationNoise {
    /// Range noise with σ = √R of the configured rangefinders, so the filter
    /// models the noise the simulated sensors produce.
    pub fn from_config(config: &FilterConfig) -> Self {
        let [r_front, r_right, _] = config.measurement_noise;
        SimulationNoise {
            process_std: [0.5, 0.5, 0.01],
            range_std: [r_front.sqrt(), r_right.sqrt()],
            heading_std: 0.15,
        }
    }

    pub fn none() -> Self {
        SimulationNoise {
            process_std: [0.0; 3],
            range_std: [0.0; 2],
            heading_std: 0.0,
        }
    }
}

pub struct Simulator {
    truth: Pose,
    dynmod: DifferentialDrive,
    sensors: ArenaRangefinders,
    rng: StdRng,
    process: [Normal<f64>; 3],
    range: [Normal<f64>; 2],
    heading: Normal<f64>,
}

impl Simulator {
    pub fn new(config: &FilterConfig, noise: SimulationNoise, seed: u64) -> anyhow::Result<Self> {
        config.validate()?;
        let [px, py, pth] = noise.process_std;
        let [rf, rr] = noise.range_std;
        Ok(Simulator {
            truth: Pose::new(config.initial_pose.x, config.initial_pose.y, config.initial_pose.theta),
            dynmod: DifferentialDrive::new(
                config.dt,
                config.wheel_diameter,
                config.wheel_separation,
                config.actuation_neutral,
                config.rate_exponent,
                config.process_noise,
            ),
            sensors: ArenaRangefinders::new(config.arena, config.measurement_noise),
            rng: StdRng::seed_from_u64(seed),
            process: [Normal::new(0.0, px)?, Normal::new(0.0, py)?, Normal::new(0.0, pth)?],
            range: [Normal::new(0.0, rf)?, Normal::new(0.0, rr)?],
            heading: Normal::new(0.0, noise.heading_std)?,
        })
    }

    pub fn truth(&self) -> &Pose {
        &self.truth
    }

    /// Moves the true robot one step.
    pub fn advance(&mut self, u: &WheelCommand) -> Pose {
        let disturbance = Vector3::new(
            self.process[0].sample(&mut self.rng),
            self.process[1].sample(&mut self.rng),
            self.process[2].sample(&mut self.rng),
        );
        self.truth = self.dynmod.f(&self.truth, u).offset(&disturbance);
        self.truth
    }

    /// Noisy reading of the sensors at the true pose.
    pub fn sense(&mut self) -> Measurement {
        let z = self.sensors.expected(&self.truth);
        Measurement::new(
            z.front + self.range[0].sample(&mut self.rng),
            z.right + self.range[1].sample(&mut self.rng),
            z.heading + self.heading.sample(&mut self.rng),
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimulationReport {
    pub estimates: Vec<GaussParams>,
    pub truth: Vec<Pose>,
    pub measurements: Vec<Measurement>,
    /// NIS of each measurement against the predicted estimate.
    pub nis: Vec<f64>,
    pub nees: Vec<f64>,
    pub skipped_updates: usize,
}

impl SimulationReport {
    pub fn position_rmse(&self) -> f64 {
        if self.estimates.is_empty() {
            return 0.0;
        }
        let sum: f64 = izip!(&self.estimates, &self.truth)
            .map(|(est, gt)| (est.x.x - gt.x).powi(2) + (est.x.y - gt.y).powi(2))
            .sum();
        (sum / self.estimates.len() as f64).sqrt()
    }

    pub fn mean_nis(&self) -> f64 {
        mean(&self.nis)
    }

    pub fn mean_nees(&self) -> f64 {
        mean(&self.nees)
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Configuration for the demo lap: the robot starts at (275, 150) facing +y
/// and Q matches the per-step disturbance of [`SimulationNoise`] in position.
/// The heading entry is wider than the simulated drift to absorb the
/// linearization error of the rangefinder model near wall corners.
pub fn demo_config() -> FilterConfig {
    FilterConfig {
        initial_pose: Pose::new(275.0, 150.0, 0.0),
        process_noise: [0.25, 0.25, 0.01],
        ..Default::default()
    }
}

/// Closed loop of straight runs and right turns, `laps` times around.
pub fn demo_commands(laps: usize) -> Vec<WheelCommand> {
    let straight = WheelCommand::new(91.0, 91.0);
    let turn = WheelCommand::new(100.0, 80.0);
    let side = std::iter::repeat(straight)
        .take(12)
        .chain(std::iter::repeat(turn).take(5));
    side.cycle().take(laps * 4 * 17).collect()
}

/// Drives a simulated robot with `commands` and filters its sensor readings.
pub fn run_ekf(
    config: &FilterConfig,
    commands: &[WheelCommand],
    noise: SimulationNoise,
    seed: u64,
) -> anyhow::Result<(PoseFilter, SimulationReport)> {
    let mut sim = Simulator::new(config, noise, seed)?;
    let mut filter = PoseFilter::new(config)?;
    let mut report = SimulationReport::default();

    for u in commands {
        let x_gt = sim.advance(u);
        let z = sim.sense();

        let eststate_pred = filter.ekf().predict(filter.state(), u);
        if let Ok(nis) = filter.ekf().NIS(&eststate_pred, &z) {
            report.nis.push(nis);
        }

        if let StepOutcome::UpdateSkipped(_) = filter.step(u, Some(&z)) {
            report.skipped_updates += 1;
        }
        if let Ok(nees) = filter.ekf().NEES(filter.state(), &x_gt) {
            report.nees.push(nees);
        }

        report.estimates.push(filter.state().clone());
        report.truth.push(x_gt);
        report.measurements.push(z);
    }

    info!(
        steps = commands.len(),
        rmse = report.position_rmse(),
        mean_nis = report.mean_nis(),
        mean_nees = report.mean_nees(),
        skipped = report.skipped_updates,
        "simulation finished"
    );
    Ok((filter, report))
}
