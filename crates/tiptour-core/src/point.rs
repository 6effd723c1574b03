//! 2D point with the in-place vector operations used by the smoothing model

use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;

/// Per-axis tolerance used by [`Point::equals_to`].
pub const EPSILON: f64 = 0.01;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Curve applied to the fraction passed to [`Point::move_towards`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Easing {
    Linear,
    #[default]
    Cubic,
    Expo,
}

impl Easing {
    pub fn apply(self, t: f64) -> f64 {
        match self {
            Easing::Linear => t,
            Easing::Cubic => ease_out_cubic(t),
            Easing::Expo => ease_out_expo(t),
        }
    }
}

pub fn ease_out_cubic(t: f64) -> f64 {
    1.0 - (1.0 - t).powi(3)
}

pub fn ease_out_expo(t: f64) -> f64 {
    if t == 1.0 {
        1.0
    } else {
        1.0 - 2f64.powf(-10.0 * t)
    }
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn update(&mut self, point: Point) -> &mut Self {
        self.x = point.x;
        self.y = point.y;
        self
    }

    /// Covers `speed` of the remaining distance, after easing.
    pub fn move_towards(&mut self, target: Point, speed: f64, easing: Easing) -> &mut Self {
        let eased = easing.apply(speed);
        self.x += (target.x - self.x) * eased;
        self.y += (target.y - self.y) * eased;
        self
    }

    /// Moves `distance` along `angle`. The angle is rotated a quarter turn and
    /// projected with (sin, -cos), which lands on the (cos, sin) direction.
    pub fn move_by_angle(&mut self, angle: f64, distance: f64, friction: Option<f64>) -> &mut Self {
        let rotated = angle + FRAC_PI_2;
        let distance = match friction {
            Some(f) => distance * ease_out_cubic(1.0 - f),
            None => distance,
        };
        self.x += rotated.sin() * distance;
        self.y -= rotated.cos() * distance;
        self
    }

    pub fn difference_to(&self, point: Point) -> Point {
        Point::new(self.x - point.x, self.y - point.y)
    }

    pub fn distance_to(&self, point: Point) -> f64 {
        let d = self.difference_to(point);
        (d.x * d.x + d.y * d.y).sqrt()
    }

    /// Angle of `self - point`, i.e. the direction from `point` towards `self`.
    pub fn angle_to(&self, point: Point) -> f64 {
        let d = self.difference_to(point);
        d.y.atan2(d.x)
    }

    pub fn lerp(&mut self, target: Point, amount: f64) -> &mut Self {
        self.x += (target.x - self.x) * amount;
        self.y += (target.y - self.y) * amount;
        self
    }

    pub fn equals_to(&self, point: Point) -> bool {
        (self.x - point.x).abs() < EPSILON && (self.y - point.y).abs() < EPSILON
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn easing_endpoints() {
        assert_eq!(Easing::Linear.apply(0.3), 0.3);
        assert_eq!(Easing::Cubic.apply(1.0), 1.0);
        assert_eq!(Easing::Expo.apply(1.0), 1.0);
        assert!((Easing::Cubic.apply(0.5) - 0.875).abs() < 1e-12);
        assert!((Easing::Expo.apply(0.0)).abs() < 1e-12);
    }

    #[test]
    fn move_towards_covers_fraction() {
        let mut p = Point::ORIGIN;
        p.move_towards(Point::new(10.0, -20.0), 0.5, Easing::Linear);
        assert!(p.equals_to(Point::new(5.0, -10.0)));

        let mut q = Point::ORIGIN;
        q.move_towards(Point::new(8.0, 0.0), 1.0, Easing::Expo);
        assert_eq!(q.x, 8.0);
    }

    #[test]
    fn move_by_angle_follows_direction() {
        let mut p = Point::ORIGIN;
        p.move_by_angle(0.0, 5.0, None);
        assert!(p.equals_to(Point::new(5.0, 0.0)));

        let mut q = Point::ORIGIN;
        q.move_by_angle(FRAC_PI_2, 3.0, None);
        assert!(q.equals_to(Point::new(0.0, 3.0)));
    }

    #[test]
    fn move_by_angle_with_friction_eases_distance() {
        let mut p = Point::ORIGIN;
        p.move_by_angle(0.0, 10.0, Some(0.5));
        // 10 * (1 - 0.5^3)
        assert!((p.x - 8.75).abs() < 1e-9);
    }

    #[test]
    fn distance_and_angle() {
        let a = Point::new(3.0, 4.0);
        assert_eq!(a.distance_to(Point::ORIGIN), 5.0);
        assert!((Point::new(0.0, 1.0).angle_to(Point::ORIGIN) - FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn equals_uses_tolerance() {
        assert!(Point::new(1.0, 1.0).equals_to(Point::new(1.009, 0.995)));
        assert!(!Point::new(1.0, 1.0).equals_to(Point::new(1.02, 1.0)));
    }
}
