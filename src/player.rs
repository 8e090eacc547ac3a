use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    course::{Hazards, Lie},
    geometry::{bearing, distance, segment_crosses_polygon_entry, Point},
    shot::{landing_position, select_best_shot, Club, ShotContext},
    wind::WindConditions,
};

const BASE_POWER_SPREAD: f64 = 0.05;
const EXTRA_POWER_SPREAD: f64 = 0.15;
const BASE_DIRECTION_SPREAD_DEG: f64 = 2.0;
const EXTRA_DIRECTION_SPREAD_DEG: f64 = 17.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ability {
    /// 0.0 (wild) to 1.0 (tour pro).
    pub accuracy: f64,
    /// Fraction of the base carry the player can produce.
    pub strength: f64,
}

impl Ability {
    pub fn new(accuracy: f64, strength: f64) -> Self {
        Self {
            accuracy: accuracy.clamp(0.0, 1.0),
            strength: strength.clamp(0.0, 1.0),
        }
    }

    fn inaccuracy(self) -> f64 {
        1.0 - self.accuracy.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionState {
    Idle,
    Walking,
    Hitting,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShotOutcome {
    pub player_id: u32,
    pub stroke_number: u32,
    pub club: Club,
    pub from: Point,
    /// Where the ball first came down, before any drop.
    pub landed: Point,
    /// Where the ball lies now.
    pub position: Point,
    pub lie: Lie,
    pub water_penalty: bool,
    pub is_complete: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerAgent {
    pub id: u32,
    pub ability: Ability,
    pub player_position: Point,
    pub ball_position: Point,
    /// Strokes on the current hole, penalties included.
    pub strokes: u32,
    pub lie: Lie,
    pub is_complete: bool,
    pub motion_state: MotionState,
    /// Strokes for each finished hole, in play order.
    pub scorecard: Vec<u32>,
}

impl PlayerAgent {
    pub fn new(id: u32, ability: Ability, tee: Point) -> Self {
        Self {
            id,
            ability,
            player_position: tee,
            ball_position: tee,
            strokes: 0,
            lie: Lie::Tee,
            is_complete: false,
            motion_state: MotionState::Idle,
            scorecard: Vec::new(),
        }
    }

    pub fn total_strokes(&self) -> u32 {
        self.scorecard.iter().sum::<u32>() + self.strokes
    }

    pub fn is_at_ball(&self) -> bool {
        self.motion_state == MotionState::Idle
    }

    /// Books the current hole's strokes onto the scorecard.
    pub fn finish_hole(&mut self) {
        self.scorecard.push(std::mem::take(&mut self.strokes));
    }

    /// Puts player and ball on a new tee.
    pub fn start_hole(&mut self, tee: Point) {
        self.player_position = tee;
        self.ball_position = tee;
        self.strokes = 0;
        self.lie = Lie::Tee;
        self.is_complete = false;
        self.motion_state = MotionState::Idle;
    }

    /// One tick of walking. Returns true once the player stands at the ball.
    pub fn walk_to_ball(&mut self, walking_speed: f64, taking_distance: f64) -> bool {
        let remaining = distance(self.player_position, self.ball_position);
        if remaining < taking_distance {
            self.player_position = self.ball_position;
            self.motion_state = MotionState::Idle;
            return true;
        }
        self.player_position = self
            .player_position
            .step_toward(self.ball_position, walking_speed)
            .0;
        self.motion_state = MotionState::Walking;
        false
    }

    /// Whether the planned shot is clear of the greenkeeper and of any ball
    /// ahead that the shot could reach.
    pub fn can_take_shot(
        &self,
        ctx: &ShotContext<'_>,
        greenkeeper_position: Option<Point>,
        other_balls: &[Point],
    ) -> bool {
        let shot = select_best_shot(ctx, self.ball_position, self.lie, self.ability);

        if let Some(keeper) = greenkeeper_position {
            if distance(keeper, shot.landing_position) < ctx.config.greenkeeper_safety_radius {
                debug!(player = self.id, "holding: greenkeeper near landing zone");
                return false;
            }
        }

        let flag = ctx.hole.flag;
        let own_to_flag = distance(self.ball_position, flag);
        let reach = distance(self.ball_position, shot.landing_position) + ctx.config.group_safety_margin;
        let blocked = other_balls.iter().any(|&other| {
            distance(other, flag) < own_to_flag && distance(other, self.ball_position) <= reach
        });
        if blocked {
            debug!(player = self.id, "holding: group ahead within reach");
        }
        !blocked
    }

    /// Plays one stroke. A complete player is skipped and `None` returned.
    pub fn take_shot<R: Rng>(&mut self, ctx: &ShotContext<'_>, rng: &mut R) -> Option<ShotOutcome> {
        if self.is_complete {
            warn!(player = self.id, "asked to shoot after holing out; skipping");
            return None;
        }

        self.strokes += 1;
        self.motion_state = MotionState::Hitting;

        let plan = select_best_shot(ctx, self.ball_position, self.lie, self.ability);
        let inaccuracy = self.ability.inaccuracy();

        let power_spread = BASE_POWER_SPREAD + EXTRA_POWER_SPREAD * inaccuracy;
        let power = plan.power * (1.0 + rng.gen_range(-power_spread..=power_spread));
        let direction_spread = BASE_DIRECTION_SPREAD_DEG + EXTRA_DIRECTION_SPREAD_DEG * inaccuracy;
        let direction =
            plan.direction + rng.gen_range(-direction_spread..=direction_spread).to_radians();
        // Misreading the wind: the felt wind strength is off by up to the
        // player's inaccuracy.
        let misread = 1.0 + inaccuracy * rng.gen_range(-1.0..=1.0);
        let felt_wind = WindConditions {
            direction: ctx.wind.direction,
            speed: ctx.wind.speed * misread,
        };

        let from = self.ball_position;
        let landed = landing_position(from, power, direction, felt_wind, ctx.config.wind_effect_factor);
        self.ball_position = landed;
        self.lie = ctx.lie_at(landed);

        let water_penalty = self.lie == Lie::Water;
        if water_penalty {
            self.apply_water_penalty(from, ctx);
        }

        if distance(self.ball_position, ctx.hole.flag) < ctx.config.hole_completion_distance {
            self.is_complete = true;
            self.lie = Lie::Hole;
        }
        self.motion_state = MotionState::Walking;

        debug!(
            player = self.id,
            stroke = self.strokes,
            club = ?plan.club,
            lie = ?self.lie,
            water_penalty,
            "shot played"
        );

        Some(ShotOutcome {
            player_id: self.id,
            stroke_number: self.strokes,
            club: plan.club,
            from,
            landed,
            position: self.ball_position,
            lie: self.lie,
            water_penalty,
            is_complete: self.is_complete,
        })
    }

    /// Penalty drop for a ball that came to rest in water after being struck
    /// from `prior`. Adds one stroke and re-derives the lie; a drop that is
    /// still wet is played as rough.
    pub fn apply_water_penalty(&mut self, prior: Point, ctx: &ShotContext<'_>) {
        self.ball_position = water_drop_position(
            prior,
            self.ball_position,
            ctx.hazards,
            ctx.config.water_drop_distance,
        );
        self.strokes += 1;
        self.lie = match ctx.lie_at(self.ball_position) {
            Lie::Water => Lie::Rough,
            lie => lie,
        };
    }
}

/// Drop spot `drop_distance` meters back toward `prior` from where the path
/// `prior -> landed` first entered water, or `prior` itself when that entry
/// is closer than `drop_distance`.
pub fn water_drop_position(prior: Point, landed: Point, hazards: &Hazards, drop_distance: f64) -> Point {
    let entry = hazards
        .water
        .iter()
        .filter_map(|water| segment_crosses_polygon_entry(prior, landed, water))
        .min_by(|a, b| distance(prior, *a).total_cmp(&distance(prior, *b)));

    match entry {
        Some(entry) if distance(prior, entry) >= drop_distance => {
            entry.offset(bearing(entry, prior), drop_distance)
        }
        _ => prior,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::SimulationConfig, course::Hole, geometry::Polygon};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn hole() -> Hole {
        Hole {
            number: 1,
            par: 4,
            flag: Point::new(200.0, 50.0),
            fairway: Polygon::rect(0.0, 40.0, 90.0, 60.0),
            green: Polygon::rect(180.0, 40.0, 220.0, 60.0),
            bunkers: vec![],
            tees: vec![Polygon::rect(-5.0, 45.0, 5.0, 55.0)],
        }
    }

    fn pond() -> Hazards {
        Hazards {
            water: vec![Polygon::rect(100.0, 30.0, 120.0, 70.0)],
            bridges: vec![],
        }
    }

    #[test]
    fn walking_snaps_once_within_reach() {
        let mut player = PlayerAgent::new(1, Ability::new(0.8, 0.9), Point::new(0.0, 0.0));
        player.ball_position = Point::new(50.0, 0.0);
        assert!(!player.walk_to_ball(30.0, 1.0));
        assert_eq!(player.motion_state, MotionState::Walking);
        assert!(!player.walk_to_ball(30.0, 1.0));
        assert!(player.walk_to_ball(30.0, 1.0));
        assert_eq!(player.player_position, player.ball_position);
        assert!(player.is_at_ball());
    }

    #[test]
    fn stroke_counts_one_per_dry_shot() {
        let hole = hole();
        let hazards = Hazards::none();
        let config = SimulationConfig::default();
        let ctx = ShotContext::new(&hole, &hazards, WindConditions::calm(), &config);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut player = PlayerAgent::new(1, Ability::new(0.9, 1.0), Point::new(0.0, 50.0));
        let outcome = player.take_shot(&ctx, &mut rng).expect("shot");
        assert!(!outcome.water_penalty);
        assert_eq!(player.strokes, 1);
        assert_eq!(player.motion_state, MotionState::Walking);
    }

    #[test]
    fn water_drop_backs_off_from_entry() {
        let prior = Point::new(0.0, 50.0);
        let landed = Point::new(110.0, 50.0);
        let drop = water_drop_position(prior, landed, &pond(), 2.0);
        assert!((drop.x - 98.0).abs() < 1e-9);
        assert!((drop.y - 50.0).abs() < 1e-9);
    }

    #[test]
    fn water_drop_near_start_returns_prior() {
        let prior = Point::new(99.0, 50.0);
        let drop = water_drop_position(prior, Point::new(110.0, 50.0), &pond(), 2.0);
        assert_eq!(drop, prior);
    }

    #[test]
    fn penalty_adds_a_stroke_and_dries_the_lie() {
        let hole = hole();
        let hazards = pond();
        let config = SimulationConfig::default();
        let ctx = ShotContext::new(&hole, &hazards, WindConditions::calm(), &config);
        let mut player = PlayerAgent::new(1, Ability::new(0.0, 1.0), Point::new(0.0, 50.0));
        player.ball_position = Point::new(110.0, 50.0);
        player.strokes = 1;
        player.apply_water_penalty(Point::new(0.0, 50.0), &ctx);
        assert_eq!(player.strokes, 2);
        assert_eq!(player.lie, Lie::Rough);
        assert!(!hazards.is_water(player.ball_position));
    }

    #[test]
    fn complete_player_is_skipped() {
        let hole = hole();
        let hazards = Hazards::none();
        let config = SimulationConfig::default();
        let ctx = ShotContext::new(&hole, &hazards, WindConditions::calm(), &config);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut player = PlayerAgent::new(1, Ability::new(1.0, 1.0), hole.flag);
        player.is_complete = true;
        assert!(player.take_shot(&ctx, &mut rng).is_none());
        assert_eq!(player.strokes, 0);
    }

    #[test]
    fn greenkeeper_in_landing_zone_blocks_the_shot() {
        let hole = hole();
        let hazards = Hazards::none();
        let config = SimulationConfig::default();
        let ctx = ShotContext::new(&hole, &hazards, WindConditions::calm(), &config);
        let player = PlayerAgent::new(1, Ability::new(1.0, 1.0), Point::new(0.0, 50.0));
        assert!(player.can_take_shot(&ctx, None, &[]));
        assert!(player.can_take_shot(&ctx, Some(Point::new(0.0, 300.0)), &[]));
        assert!(!player.can_take_shot(&ctx, Some(Point::new(195.0, 50.0)), &[]));
    }

    #[test]
    fn ball_ahead_within_reach_blocks_but_ball_behind_does_not() {
        let hole = hole();
        let hazards = Hazards::none();
        let config = SimulationConfig::default();
        let ctx = ShotContext::new(&hole, &hazards, WindConditions::calm(), &config);
        let player = PlayerAgent::new(1, Ability::new(1.0, 1.0), Point::new(0.0, 50.0));
        assert!(!player.can_take_shot(&ctx, None, &[Point::new(150.0, 50.0)]));
        assert!(player.can_take_shot(&ctx, None, &[Point::new(-40.0, 50.0)]));
    }

    #[test]
    fn scorecard_accumulates_across_holes() {
        let mut player = PlayerAgent::new(7, Ability::new(0.5, 0.5), Point::default());
        player.strokes = 5;
        player.finish_hole();
        player.start_hole(Point::new(10.0, 10.0));
        player.strokes = 3;
        assert_eq!(player.scorecard, vec![5]);
        assert_eq!(player.total_strokes(), 8);
        assert_eq!(player.lie, Lie::Tee);
    }
}
