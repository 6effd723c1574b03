//! Dead-zone smoothing filter turning raw pointer samples into a damped position

use crate::point::Point;
use serde::{Deserialize, Serialize};

pub const DEFAULT_RADIUS: f64 = 30.0;
pub const DEFAULT_FRICTION: f64 = 0.92;

/// Below this distance the smooth position is considered settled.
const SETTLE_DISTANCE: f64 = 0.1;
/// Share of the friction complement used for drift inside the dead zone.
const DRIFT_FACTOR: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CursorConfig {
    pub radius: f64,
    pub friction: f64,
    pub enabled: bool,
    pub initial_point: Point,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            radius: DEFAULT_RADIUS,
            friction: DEFAULT_FRICTION,
            enabled: true,
            initial_point: Point::ORIGIN,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UpdateOptions {
    /// Snap straight to the sample, skipping the filter.
    pub immediate: bool,
    /// Friction for this update only.
    pub friction: Option<f64>,
}

impl UpdateOptions {
    pub fn immediate() -> Self {
        Self {
            immediate: true,
            friction: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmoothCursor {
    pointer: Point,
    smooth: Point,
    radius: f64,
    friction: f64,
    angle: f64,
    distance: f64,
    enabled: bool,
    has_moved: bool,
}

impl SmoothCursor {
    pub fn new(config: CursorConfig) -> Self {
        Self {
            pointer: config.initial_point,
            smooth: config.initial_point,
            radius: config.radius.max(0.0),
            friction: config.friction.clamp(0.0, 1.0),
            angle: 0.0,
            distance: 0.0,
            enabled: config.enabled,
            has_moved: false,
        }
    }

    pub fn at(point: Point) -> Self {
        Self::new(CursorConfig {
            initial_point: point,
            ..CursorConfig::default()
        })
    }

    /// Feeds one raw sample. Returns whether the smooth position moved.
    pub fn update(&mut self, sample: Point, options: UpdateOptions) -> bool {
        self.has_moved = false;
        self.pointer.update(sample);

        if options.immediate {
            self.smooth.update(sample);
            self.distance = 0.0;
            self.angle = 0.0;
            self.has_moved = true;
            return true;
        }

        if !self.enabled {
            self.distance = 0.0;
            self.angle = 0.0;
            self.smooth.update(sample);
            self.has_moved = true;
            return true;
        }

        self.distance = self.pointer.distance_to(self.smooth);
        self.angle = self.pointer.angle_to(self.smooth);
        let friction = options
            .friction
            .map(|f| f.clamp(0.0, 1.0))
            .unwrap_or(self.friction);

        if self.distance > self.radius {
            let overshoot = self.distance - self.radius;
            self.smooth
                .move_by_angle(self.angle, overshoot * (1.0 - friction), None);
            self.has_moved = true;
        } else if self.distance > SETTLE_DISTANCE {
            self.smooth
                .lerp(self.pointer, (1.0 - friction) * DRIFT_FACTOR);
            self.has_moved = true;
        }

        self.has_moved
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_radius(&mut self, radius: f64) {
        self.radius = radius.max(0.0);
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn set_friction(&mut self, friction: f64) {
        self.friction = friction.clamp(0.0, 1.0);
    }

    pub fn friction(&self) -> f64 {
        self.friction
    }

    pub fn smooth_position(&self) -> Point {
        self.smooth
    }

    pub fn pointer_position(&self) -> Point {
        self.pointer
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn has_moved(&self) -> bool {
        self.has_moved
    }

    /// Snaps pointer and smooth position to `point`, or to the current pointer.
    pub fn reset(&mut self, point: Option<Point>) {
        let at = point.unwrap_or(self.pointer);
        self.pointer.update(at);
        self.smooth.update(at);
        self.distance = 0.0;
        self.angle = 0.0;
        self.has_moved = false;
    }
}

impl Default for SmoothCursor {
    fn default() -> Self {
        Self::new(CursorConfig::default())
    }
}
