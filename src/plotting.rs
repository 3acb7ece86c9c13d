use crate::filter::PoseFilter;
use crate::pose::Pose;
use crate::state_estimator::models::measurement::ArenaRangefinders;
use gnuplot::*;
use nalgebra::{Matrix2, Matrix3, Vector2};
use std::f64::consts::{FRAC_PI_2, TAU as _2_PI};

/// One-sigma position uncertainty ellipse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UncertaintyEllipse {
    pub center: (f64, f64),
    /// Full axis lengths, 2·√λ.
    pub width: f64,
    pub height: f64,
    /// Direction of the `width` axis, radians from +x.
    pub angle: f64,
}

impl UncertaintyEllipse {
    pub fn from_covariance(x: &Pose, P: &Matrix3<f64>) -> Self {
        let P_pos: Matrix2<f64> = P.fixed_view::<2, 2>(0, 0).into_owned();
        let P_pos = (P_pos + P_pos.transpose()) * 0.5;
        let eig = P_pos.symmetric_eigen();
        let v = eig.eigenvectors.column(0);
        UncertaintyEllipse {
            center: (x.x, x.y),
            width: 2.0 * eig.eigenvalues[0].max(0.0).sqrt(),
            height: 2.0 * eig.eigenvalues[1].max(0.0).sqrt(),
            angle: v[1].atan2(v[0]),
        }
    }

    /// Closed outline with `n` segments.
    pub fn outline(&self, n: usize) -> Vec<(f64, f64)> {
        let (s, c) = self.angle.sin_cos();
        (0..=n)
            .map(|i| {
                let t = _2_PI * i as f64 / n as f64;
                let p = Vector2::new(0.5 * self.width * t.cos(), 0.5 * self.height * t.sin());
                (
                    self.center.0 + c * p[0] - s * p[1],
                    self.center.1 + s * p[0] + c * p[1],
                )
            })
            .collect()
    }
}

/// Start and end points of the front and right rangefinder rays.
pub fn sensor_rays(sensors: &ArenaRangefinders, x: &Pose) -> [((f64, f64), (f64, f64)); 2] {
    let front = sensors.front_ray(x).range;
    let right = sensors.right_ray(x).range;
    [
        ((x.x, x.y), ArenaRangefinders::ray_endpoint(x, x.theta, front)),
        ((x.x, x.y), ArenaRangefinders::ray_endpoint(x, x.theta + FRAC_PI_2, right)),
    ]
}

/// Plots the estimated trajectory, the arena, the current sensor rays and the
/// position uncertainty of the latest estimate.
pub fn plot_states(filter: &PoseFilter, truth: Option<&[Pose]>) -> anyhow::Result<()> {
    let history = filter.history();
    let arena = filter.sensor_model().arena();
    let x = filter.pose();
    let ellipse = UncertaintyEllipse::from_covariance(x, filter.covariance());
    let outline = ellipse.outline(64);
    let [front, right] = sensor_rays(filter.sensor_model(), x);

    let mut fg = Figure::new();
    let ax = fg.axes2d();
    ax.set_title(
        &format!("Position over Time: {} - {:.3}", history.len() - 1, x.theta),
        &[],
    )
    .set_x_label("X (mm)", &[])
    .set_y_label("Y (mm)", &[])
    .set_x_grid(true)
    .set_y_grid(true)
    .lines(
        [0.0, arena.width, arena.width, 0.0, 0.0],
        [0.0, 0.0, arena.height, arena.height, 0.0],
        &[Caption("Arena")],
    )
    .points(
        history.iter().map(|e| e.x),
        history.iter().map(|e| e.y),
        &[Caption("Estimate"), PointSymbol('O')],
    )
    .lines([front.0 .0, front.1 .0], [front.0 .1, front.1 .1], &[Caption("Front")])
    .lines([right.0 .0, right.1 .0], [right.0 .1, right.1 .1], &[Caption("Right")])
    .lines(
        outline.iter().map(|p| p.0),
        outline.iter().map(|p| p.1),
        &[Caption("1σ position")],
    );
    if let Some(truth) = truth {
        ax.lines(
            truth.iter().map(|gt| gt.x),
            truth.iter().map(|gt| gt.y),
            &[Caption("Ground truth")],
        );
    }
    fg.show()
        .map_err(|e| anyhow::anyhow!("could not start gnuplot: {:?}", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::ArenaBounds;
    use approx::assert_relative_eq;

    #[test]
    fn test_axis_aligned_ellipse() {
        let P = Matrix3::from_diagonal(&nalgebra::Vector3::new(16.0, 4.0, 0.3));
        let e = UncertaintyEllipse::from_covariance(&Pose::new(10.0, 20.0, 0.0), &P);
        let (major, minor) = if e.width > e.height {
            (e.width, e.height)
        } else {
            (e.height, e.width)
        };
        assert_relative_eq!(major, 8.0, epsilon = 1e-9);
        assert_relative_eq!(minor, 4.0, epsilon = 1e-9);
        assert_eq!(e.center, (10.0, 20.0));
    }

    #[test]
    fn test_outline_matches_covariance() {
        let P = Matrix3::new(9.0, 3.0, 0.0, 3.0, 5.0, 0.0, 0.0, 0.0, 1.0);
        let e = UncertaintyEllipse::from_covariance(&Pose::default(), &P);
        let P_inv = P.fixed_view::<2, 2>(0, 0).into_owned().try_inverse().unwrap();
        for (px, py) in e.outline(16) {
            let d = Vector2::new(px, py);
            // every outline point sits at Mahalanobis distance 1
            assert_relative_eq!(d.dot(&(P_inv * d)), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_sensor_rays_end_on_walls() {
        let sensors = ArenaRangefinders::new(ArenaBounds::default(), [1.0; 3]);
        let x = Pose::new(375.0, 250.0, 0.0);
        let [front, right] = sensor_rays(&sensors, &x);
        assert_relative_eq!(front.1 .1, 500.0, epsilon = 1e-3);
        assert_relative_eq!(right.1 .0, 750.0, epsilon = 1e-3);
    }
}
