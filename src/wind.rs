//! Course-wide wind.
//!
//! Directions are degrees in the course frame, measured counter-clockwise
//! from +x, and name where the wind blows *toward*. A wind angle equal to the
//! shot bearing is a pure tailwind.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const MAX_WIND_SPEED: f64 = 15.0;
const DIRECTION_STEP_DEG: f64 = 5.0;
const SPEED_STEP: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WindConditions {
    /// Degrees in `[0, 360)`.
    pub direction: f64,
    /// Meters per second in `[0, 15]`.
    pub speed: f64,
}

impl WindConditions {
    pub fn calm() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WindEffect {
    /// Added to the carry along the shot line (negative into a headwind).
    pub distance_change: f64,
    /// Sideways drift, positive to the left of the shot line.
    pub lateral_deviation: f64,
}

/// Wind effect on a shot of `distance` meters along `shot_direction` radians.
pub fn wind_effect(
    wind: WindConditions,
    shot_direction: f64,
    distance: f64,
    factor: f64,
) -> WindEffect {
    let relative = wind.direction.to_radians() - shot_direction;
    let scale = distance * wind.speed * factor;
    WindEffect {
        distance_change: scale * relative.cos(),
        lateral_deviation: scale * relative.sin(),
    }
}

#[derive(Debug, Clone)]
pub struct WindAgent {
    conditions: WindConditions,
    update_interval: u64,
    ticks: u64,
}

impl WindAgent {
    pub fn new(conditions: WindConditions, update_interval: u64) -> Self {
        Self {
            conditions: WindConditions {
                direction: conditions.direction.rem_euclid(360.0),
                speed: conditions.speed.clamp(0.0, MAX_WIND_SPEED),
            },
            update_interval: update_interval.max(1),
            ticks: 0,
        }
    }

    /// Random starting breeze: any direction, 2 to 8 m/s.
    pub fn random<R: Rng>(rng: &mut R, update_interval: u64) -> Self {
        let conditions = WindConditions {
            direction: rng.gen_range(0.0..360.0),
            speed: rng.gen_range(2.0..8.0),
        };
        Self::new(conditions, update_interval)
    }

    pub fn conditions(&self) -> WindConditions {
        self.conditions
    }

    /// Advances one tick; on cadence ticks the wind takes a bounded random step.
    pub fn update<R: Rng>(&mut self, rng: &mut R) -> WindConditions {
        self.ticks += 1;
        if self.ticks % self.update_interval == 0 {
            let before = self.conditions;
            self.conditions.direction = (self.conditions.direction
                + rng.gen_range(-DIRECTION_STEP_DEG..=DIRECTION_STEP_DEG))
            .rem_euclid(360.0);
            self.conditions.speed = (self.conditions.speed
                + rng.gen_range(-SPEED_STEP..=SPEED_STEP))
            .clamp(0.0, MAX_WIND_SPEED);
            debug!(
                from_direction = before.direction,
                to_direction = self.conditions.direction,
                from_speed = before.speed,
                to_speed = self.conditions.speed,
                "wind shifted"
            );
        }
        self.conditions
    }
}
