//! Utility-based shot selection.
//!
//! The planner walks a fixed grid of (club, power, angle) candidates, predicts
//! each landing spot with the current wind, and keeps the candidate with the
//! highest utility. Enumeration order is clubs in preference order, then
//! power ascending, then angle from -30 to +30 degrees; the first candidate
//! reaching the best utility wins ties. After each club's grid one more
//! candidate is tried: straight at the flag with exactly the remaining
//! distance, when the club reaches that far. Without it a ball resting just
//! outside the completion radius can have no grid step short enough to hole
//! out and would never move again.

use std::f64::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

use crate::{
    config::SimulationConfig,
    course::{determine_lie, Course, Hazards, Hole, Lie},
    geometry::{bearing, distance, BoundingBox, Point},
    player::Ability,
    wind::{wind_effect, WindConditions},
};

const DIRECTION_SPREAD_DEG: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Club {
    Driver,
    Iron,
    Wedge,
    Putter,
}

impl Club {
    pub fn distance_multiplier(self) -> f64 {
        match self {
            Club::Driver => 1.0,
            Club::Iron => 0.7,
            Club::Wedge => 0.4,
            Club::Putter => 0.15,
        }
    }
}

/// Clubs worth trying from `lie` at `distance_to_flag`, in preference order.
pub fn candidate_clubs(lie: Lie, distance_to_flag: f64) -> &'static [Club] {
    if lie == Lie::Green {
        &[Club::Putter]
    } else if distance_to_flag < 50.0 {
        &[Club::Wedge, Club::Putter]
    } else if distance_to_flag < 150.0 {
        &[Club::Wedge, Club::Iron]
    } else {
        &[Club::Driver, Club::Iron]
    }
}

pub fn club_max_distance(club: Club, strength: f64, lie: Lie, config: &SimulationConfig) -> f64 {
    let carry = config.base_max_distance
        * club.distance_multiplier()
        * strength
        * lie.distance_multiplier();
    carry.max(config.hole_completion_distance)
}

/// Where a ball struck with `power` meters along `direction` comes to rest,
/// with the wind's carry change and sideways drift applied.
pub fn landing_position(
    ball: Point,
    power: f64,
    direction: f64,
    wind: WindConditions,
    wind_factor: f64,
) -> Point {
    let effect = wind_effect(wind, direction, power, wind_factor);
    ball.offset(direction, power + effect.distance_change)
        .offset(direction + FRAC_PI_2, effect.lateral_deviation)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShotOption {
    pub club: Club,
    /// Intended carry in meters before wind.
    pub power: f64,
    pub direction: f64,
    pub landing_position: Point,
    pub landing_lie: Lie,
    pub utility: f64,
}

/// Everything the planner reads about the world for one decision.
#[derive(Clone, Copy)]
pub struct ShotContext<'a> {
    pub hole: &'a Hole,
    pub hazards: &'a Hazards,
    pub wind: WindConditions,
    pub config: &'a SimulationConfig,
    /// Other holes to penalise; `None` skips the cross-hole check.
    pub course: Option<&'a Course>,
    pub bounds: Option<BoundingBox>,
}

impl<'a> ShotContext<'a> {
    pub fn new(
        hole: &'a Hole,
        hazards: &'a Hazards,
        wind: WindConditions,
        config: &'a SimulationConfig,
    ) -> Self {
        Self {
            hole,
            hazards,
            wind,
            config,
            course: None,
            bounds: None,
        }
    }

    /// Enables the other-hole and out-of-bounds penalties.
    pub fn with_course(mut self, course: &'a Course) -> Self {
        self.course = Some(course);
        self.bounds = course.bounds(self.config.course_margin);
        self
    }

    /// Terrain at `position`, reporting `Hole` inside the completion radius.
    /// The green wins over water it sits in; water wins over the hole.
    pub fn lie_at(&self, position: Point) -> Lie {
        match determine_lie(position, self.hole, self.hazards) {
            Lie::Water => Lie::Water,
            _ if distance(position, self.hole.flag) < self.config.hole_completion_distance => {
                Lie::Hole
            }
            lie => lie,
        }
    }

    pub fn utility(&self, landing: Point, lie: Lie) -> f64 {
        if lie == Lie::Water {
            return f64::NEG_INFINITY;
        }
        let mut utility = -distance(landing, self.hole.flag) * lie.utility_multiplier();
        if let Some(course) = self.course {
            let on_other_hole = course
                .holes()
                .filter(|h| h.number != self.hole.number)
                .any(|h| h.covers(landing));
            if on_other_hole {
                utility -= self.config.other_hole_penalty;
            }
        }
        if let Some(bounds) = self.bounds {
            if !bounds.contains(landing) {
                utility -= self.config.out_of_bounds_penalty;
            }
        }
        utility
    }
}

/// Best candidate shot for a ball at `ball` lying `lie`.
pub fn select_best_shot(ctx: &ShotContext<'_>, ball: Point, lie: Lie, ability: Ability) -> ShotOption {
    let flag = ctx.hole.flag;
    let distance_to_flag = distance(ball, flag);
    let line = bearing(ball, flag);
    let power_steps = ctx.config.power_steps.max(1);
    let direction_steps = ctx.config.direction_steps.max(1);

    let mut best: Option<ShotOption> = None;
    let mut consider = |club: Club, power: f64, direction: f64| {
        let landing = landing_position(
            ball,
            power,
            direction,
            ctx.wind,
            ctx.config.wind_effect_factor,
        );
        let landing_lie = ctx.lie_at(landing);
        let utility = ctx.utility(landing, landing_lie);
        if best.map_or(true, |b| utility > b.utility) {
            best = Some(ShotOption {
                club,
                power,
                direction,
                landing_position: landing,
                landing_lie,
                utility,
            });
        }
    };

    for &club in candidate_clubs(lie, distance_to_flag) {
        let max_distance = club_max_distance(club, ability.strength, lie, ctx.config);
        for p in 0..=power_steps {
            let power = max_distance * f64::from(p) / f64::from(power_steps);
            for d in 0..=direction_steps {
                let offset_deg = -DIRECTION_SPREAD_DEG
                    + 2.0 * DIRECTION_SPREAD_DEG * f64::from(d) / f64::from(direction_steps);
                consider(club, power, line + offset_deg.to_radians());
            }
        }
        if distance_to_flag <= max_distance {
            consider(club, distance_to_flag, line);
        }
    }

    // candidate_clubs never returns an empty slice, so the grid is non-empty.
    best.unwrap_or(ShotOption {
        club: Club::Putter,
        power: 0.0,
        direction: line,
        landing_position: ball,
        landing_lie: lie,
        utility: f64::NEG_INFINITY,
    })
}
