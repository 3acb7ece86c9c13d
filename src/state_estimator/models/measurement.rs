use super::MeasurementModel;
use crate::pose::{wrap_angle, ArenaBounds, Pose};
use nalgebra::{Matrix3, RowVector3, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;

/// Added to the trig denominators so axis-aligned rays stay finite.
pub const TRIG_EPSILON: f64 = 1e-7;

/// One reading of the two rangefinders and the magnetometer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub front: f64,
    pub right: f64,
    pub heading: f64,
}

impl Measurement {
    pub fn new(front: f64, right: f64, heading: f64) -> Self {
        Measurement {
            front,
            right,
            heading,
        }
    }

    pub fn as_vector(&self) -> Vector3<f64> {
        Vector3::new(self.front, self.right, self.heading)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wall {
    Top,
    Right,
    Bottom,
    Left,
}

impl Wall {
    /// Perpendicular distance from the robot to this wall.
    pub fn distance(self, pose: &Pose, arena: &ArenaBounds) -> f64 {
        match self {
            Wall::Top => arena.height - pose.y,
            Wall::Right => arena.width - pose.x,
            Wall::Bottom => pose.y,
            Wall::Left => pose.x,
        }
    }

    /// Gradient of `distance` with respect to (x, y, θ).
    pub fn gradient(self) -> RowVector3<f64> {
        match self {
            Wall::Top => RowVector3::new(0., -1., 0.),
            Wall::Right => RowVector3::new(-1., 0., 0.),
            Wall::Bottom => RowVector3::new(0., 1., 0.),
            Wall::Left => RowVector3::new(1., 0., 0.),
        }
    }
}

/// Quarter of the heading circle, counted clockwise from +y.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sector {
    /// [0, π/2): heading up and to the right
    NorthEast,
    /// [π/2, π)
    SouthEast,
    /// [π, 3π/2)
    SouthWest,
    /// [3π/2, 2π)
    NorthWest,
}

impl Sector {
    /// Sector of `angle` and the residual angle within it, in [0, π/2).
    pub fn of(angle: f64) -> (Sector, f64) {
        let angle = wrap_angle(angle);
        let index = ((angle / FRAC_PI_2).floor() as usize).min(3);
        let sector = match index {
            0 => Sector::NorthEast,
            1 => Sector::SouthEast,
            2 => Sector::SouthWest,
            _ => Sector::NorthWest,
        };
        let residual = (angle - index as f64 * FRAC_PI_2).max(0.0);
        (sector, residual)
    }

    /// The two walls a ray in this sector can exit through. The first is
    /// reached over cos(residual), the second over sin(residual).
    pub fn walls(self) -> (Wall, Wall) {
        match self {
            Sector::NorthEast => (Wall::Top, Wall::Right),
            Sector::SouthEast => (Wall::Right, Wall::Bottom),
            Sector::SouthWest => (Wall::Bottom, Wall::Left),
            Sector::NorthWest => (Wall::Left, Wall::Top),
        }
    }
}

/// Range along one ray together with its gradient with respect to the pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayRange {
    pub range: f64,
    pub gradient: RowVector3<f64>,
    pub sector: Sector,
    pub wall: Wall,
}

/// Geometric sensor model for a robot inside a known rectangular arena.
#[derive(Debug, Clone)]
pub struct ArenaRangefinders {
    arena: ArenaBounds,
    r: Matrix3<f64>,
}

impl ArenaRangefinders {
    pub fn new(arena: ArenaBounds, measurement_noise: [f64; 3]) -> Self {
        ArenaRangefinders {
            arena,
            r: Matrix3::from_diagonal(&Vector3::from(measurement_noise)),
        }
    }

    pub fn arena(&self) -> &ArenaBounds {
        &self.arena
    }

    /// Distance to the first wall hit by a ray leaving `pose` at `angle`.
    pub fn ray(&self, pose: &Pose, angle: f64) -> RayRange {
        let (sector, th0) = Sector::of(angle);
        let (cos_wall, sin_wall) = sector.walls();
        let c = th0.cos() + TRIG_EPSILON;
        let s = th0.sin() + TRIG_EPSILON;

        let a0 = cos_wall.distance(pose, &self.arena);
        let a1 = sin_wall.distance(pose, &self.arena);
        let l0 = a0 / c;
        let l1 = a1 / s;

        if l0 <= l1 {
            RayRange {
                range: l0,
                gradient: cos_wall.gradient() / c
                    + RowVector3::new(0., 0., a0 * th0.sin() / (c * c)),
                sector,
                wall: cos_wall,
            }
        } else {
            RayRange {
                range: l1,
                gradient: sin_wall.gradient() / s
                    + RowVector3::new(0., 0., -a1 * th0.cos() / (s * s)),
                sector,
                wall: sin_wall,
            }
        }
    }

    pub fn front_ray(&self, pose: &Pose) -> RayRange {
        self.ray(pose, pose.theta)
    }

    pub fn right_ray(&self, pose: &Pose) -> RayRange {
        self.ray(pose, pose.theta + FRAC_PI_2)
    }

    /// Noiseless reading the sensors would produce at `pose`.
    pub fn expected(&self, pose: &Pose) -> Measurement {
        Measurement::new(
            self.front_ray(pose).range,
            self.right_ray(pose).range,
            pose.theta,
        )
    }

    /// Point where a ray at `angle` with length `range` ends.
    pub fn ray_endpoint(pose: &Pose, angle: f64, range: f64) -> (f64, f64) {
        (pose.x + range * angle.sin(), pose.y + range * angle.cos())
    }
}

impl MeasurementModel for ArenaRangefinders {
    type State = Pose;
    type Measurement = Measurement;
    type Jacobian = Matrix3<f64>;
    type Covariance = Matrix3<f64>;

    fn h(&self, x: &Self::State) -> Self::Measurement {
        self.expected(x)
    }

    fn H(&self, x: &Self::State) -> Self::Jacobian {
        let mut H = Matrix3::zeros();
        H.set_row(0, &self.front_ray(x).gradient);
        H.set_row(1, &self.right_ray(x).gradient);
        // magnetometer reads the heading directly
        H.set_row(2, &RowVector3::new(0., 0., 1.));
        H
    }

    fn R(&self) -> Self::Covariance {
        self.r
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::wrap_to_pi;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_4, PI};

    fn arena() -> ArenaRangefinders {
        ArenaRangefinders::new(ArenaBounds::default(), [3.28, 1.86, 0.8])
    }

    fn numerical_H(sensors: &ArenaRangefinders, x: &Pose) -> Matrix3<f64> {
        let h = 1e-6;
        let mut J = Matrix3::zeros();
        for j in 0..3 {
            let mut dv = Vector3::zeros();
            dv[j] = h;
            let plus = sensors.expected(&x.offset(&dv)).as_vector();
            let minus = sensors.expected(&x.offset(&-dv)).as_vector();
            let mut col = (plus - minus) / (2.0 * h);
            col[2] = wrap_to_pi(plus[2] - minus[2]) / (2.0 * h);
            J.set_column(j, &col);
        }
        J
    }

    #[test]
    fn test_sector_of() {
        assert_eq!(Sector::of(0.0), (Sector::NorthEast, 0.0));
        assert_eq!(Sector::of(FRAC_PI_2).0, Sector::SouthEast);
        assert_eq!(Sector::of(PI + 0.1).0, Sector::SouthWest);
        assert_eq!(Sector::of(-0.1).0, Sector::NorthWest);
        assert_eq!(Sector::of(2.0 * PI).0, Sector::NorthEast);
        let (_, residual) = Sector::of(PI + 0.25);
        assert_relative_eq!(residual, 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_axis_aligned_ranges() {
        let sensors = arena();
        let z = sensors.expected(&Pose::new(375.0, 250.0, 0.0));
        assert_relative_eq!(z.front, 250.0, epsilon = 1e-4);
        assert_relative_eq!(z.right, 375.0, epsilon = 1e-4);
        assert_relative_eq!(z.heading, 0.0);

        let z = sensors.expected(&Pose::new(100.0, 50.0, PI));
        assert_relative_eq!(z.front, 50.0, epsilon = 1e-4);
        assert_relative_eq!(z.right, 100.0, epsilon = 1e-4);
    }

    #[test]
    fn test_diagonal_ray_picks_nearest_wall() {
        let sensors = arena();
        let pose = Pose::new(375.0, 250.0, FRAC_PI_4);
        let ray = sensors.front_ray(&pose);
        assert_eq!(ray.wall, Wall::Top);
        assert_relative_eq!(ray.range, 250.0 * 2f64.sqrt(), epsilon = 1e-3);

        // pointing south-west from near the left wall exits on the left
        let ray = sensors.front_ray(&Pose::new(20.0, 400.0, PI + 1.2));
        assert_eq!(ray.sector, Sector::SouthWest);
        assert_eq!(ray.wall, Wall::Left);
        assert_relative_eq!(ray.range, 20.0 / 1.2f64.sin(), epsilon = 1e-3);
    }

    #[test]
    fn test_every_sector_has_walls() {
        for sector in [
            Sector::NorthEast,
            Sector::SouthEast,
            Sector::SouthWest,
            Sector::NorthWest,
        ] {
            let (a, b) = sector.walls();
            assert_ne!(a, b);
        }
    }

    #[test]
    fn test_H_matches_finite_differences_in_all_sectors() {
        let sensors = arena();
        let poses = [
            Pose::new(300.0, 200.0, 0.3),
            Pose::new(300.0, 200.0, 1.9),
            Pose::new(300.0, 200.0, 3.5),
            Pose::new(300.0, 200.0, 5.0),
            Pose::new(600.0, 80.0, 0.7),
            Pose::new(120.0, 420.0, 2.6),
            Pose::new(700.0, 450.0, 4.2),
            Pose::new(50.0, 60.0, 5.9),
        ];
        let mut front_sectors = Vec::new();
        let mut walls = Vec::new();
        for x in poses.iter() {
            front_sectors.push(sensors.front_ray(x).sector);
            walls.push(sensors.front_ray(x).wall);
            walls.push(sensors.right_ray(x).wall);

            let H = sensors.H(x);
            let H_num = numerical_H(&sensors, x);
            assert_relative_eq!(H, H_num, epsilon = 1e-4, max_relative = 1e-4);
        }
        for sector in [
            Sector::NorthEast,
            Sector::SouthEast,
            Sector::SouthWest,
            Sector::NorthWest,
        ] {
            assert!(front_sectors.contains(&sector));
        }
        for wall in [Wall::Top, Wall::Right, Wall::Bottom, Wall::Left] {
            assert!(walls.contains(&wall), "no pose exercised {:?}", wall);
        }
    }

    #[test]
    fn test_heading_row_is_pass_through() {
        let H = arena().H(&Pose::new(10.0, 20.0, 4.0));
        assert_eq!(H.row(2), RowVector3::new(0., 0., 1.));
    }

    #[test]
    fn test_ray_endpoint_lies_on_wall() {
        let sensors = arena();
        let pose = Pose::new(200.0, 100.0, 2.2);
        let ray = sensors.front_ray(&pose);
        let (ex, ey) = ArenaRangefinders::ray_endpoint(&pose, pose.theta, ray.range);
        let on_wall = ex.abs() < 1e-3
            || (ex - 750.0).abs() < 1e-3
            || ey.abs() < 1e-3
            || (ey - 500.0).abs() < 1e-3;
        assert!(on_wall, "endpoint ({}, {}) not on a wall", ex, ey);
    }
}
