//! Flag service routine.
//!
//! The greenkeeper keeps a per-hole timer of ticks since the flag last moved.
//! Once a timer reaches the service interval the hole becomes pending, and
//! stays pending until a new flag is actually committed there. From idle the
//! greenkeeper heads for the nearest pending green along the navigator's
//! water-avoiding route, walks to a random spot on the green, holds there
//! while placing the flag, then steps back to the green center.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    config::SimulationConfig,
    course::Course,
    geometry::{distance, sample_point_in_polygon, Point},
    navigator::Navigator,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GreenkeeperState {
    Idle,
    WalkingToHole,
    PlacingFlag,
    WalkingToGreenCenter,
}

/// Emitted on the tick a flag is moved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlagUpdate {
    pub hole: u32,
    pub position: Point,
}

impl FlagUpdate {
    /// Writes the new flag into the course. False for an unknown hole.
    pub fn apply(&self, course: &mut Course) -> bool {
        course.set_flag(self.hole, self.position)
    }
}

#[derive(Debug, Clone)]
pub struct GreenkeeperAgent {
    pub position: Point,
    pub motion_state: GreenkeeperState,
    pub current_hole: Option<u32>,
    current_path: VecDeque<Point>,
    flag_target: Option<Point>,
    placement_ticks: u32,
    service_timers: BTreeMap<u32, u64>,
    pending: BTreeSet<u32>,
    last_serviced: Option<u32>,
    speed: f64,
    service_interval: u64,
    placement_duration: u32,
    sampling_attempts: u32,
}

impl GreenkeeperAgent {
    /// Starts idle at `position` with every hole already due for service.
    pub fn new(course: &Course, position: Point, config: &SimulationConfig) -> Self {
        let service_interval = config.service_interval_ticks.max(1);
        Self {
            position,
            motion_state: GreenkeeperState::Idle,
            current_hole: None,
            current_path: VecDeque::new(),
            flag_target: None,
            placement_ticks: 0,
            service_timers: course
                .hole_numbers()
                .map(|n| (n, service_interval))
                .collect(),
            pending: BTreeSet::new(),
            last_serviced: None,
            speed: config.greenkeeper_speed,
            service_interval,
            placement_duration: config.flag_placement_ticks.max(1),
            sampling_attempts: config.flag_sampling_attempts,
        }
    }

    pub fn service_timer(&self, hole: u32) -> Option<u64> {
        self.service_timers.get(&hole).copied()
    }

    /// Overrides a hole's timer. A hole put back under the interval leaves
    /// the pending set unless it is the one being serviced.
    pub fn set_service_timer(&mut self, hole: u32, ticks: u64) {
        if let Some(timer) = self.service_timers.get_mut(&hole) {
            *timer = ticks;
            if ticks < self.service_interval && self.current_hole != Some(hole) {
                self.pending.remove(&hole);
            }
        }
    }

    pub fn pending(&self) -> &BTreeSet<u32> {
        &self.pending
    }

    pub fn holes_pending(&self) -> usize {
        self.pending.len()
    }

    pub fn last_serviced(&self) -> Option<u32> {
        self.last_serviced
    }

    pub fn remaining_path(&self) -> impl Iterator<Item = &Point> {
        self.current_path.iter()
    }

    /// One tick. Returns the flag committed this tick; the caller applies it
    /// to the course once every other agent has acted on the old flag.
    pub fn update<R: Rng>(
        &mut self,
        course: &Course,
        navigator: &Navigator,
        rng: &mut R,
    ) -> Option<FlagUpdate> {
        self.advance_timers();

        match self.motion_state {
            GreenkeeperState::Idle => {
                self.start_next_service(course, navigator);
                None
            }
            GreenkeeperState::WalkingToHole => {
                self.walk_route();
                if self.current_path.is_empty() {
                    self.approach_flag_spot(course, rng);
                }
                None
            }
            GreenkeeperState::PlacingFlag => self.place_flag(course),
            GreenkeeperState::WalkingToGreenCenter => {
                self.walk_route();
                if self.current_path.is_empty() {
                    self.motion_state = GreenkeeperState::Idle;
                    self.current_hole = None;
                    self.flag_target = None;
                }
                None
            }
        }
    }

    fn advance_timers(&mut self) {
        for (&hole, timer) in &mut self.service_timers {
            if self.current_hole == Some(hole) {
                continue;
            }
            *timer += 1;
            if *timer >= self.service_interval && self.pending.insert(hole) {
                debug!(hole, timer = *timer, "hole due for flag service");
            }
        }
    }

    fn start_next_service(&mut self, course: &Course, navigator: &Navigator) {
        let target = self
            .pending
            .iter()
            .filter_map(|&n| course.hole(n).map(|h| (n, distance(self.position, h.green_center()))))
            .fold(None::<(u32, f64)>, |best, (n, d)| match best {
                Some((_, best_d)) if best_d <= d => best,
                _ => Some((n, d)),
            });
        let Some((hole, _)) = target else {
            return;
        };
        let Some(green_center) = course.hole(hole).map(|h| h.green_center()) else {
            return;
        };

        let route = self
            .last_serviced
            .and_then(|from| navigator.path(from, hole))
            .filter(|route| !route.is_empty());
        self.current_path = match route {
            Some(route) => route.iter().copied().collect(),
            None => VecDeque::from([green_center]),
        };
        self.current_hole = Some(hole);
        self.flag_target = None;
        self.motion_state = GreenkeeperState::WalkingToHole;
        info!(
            hole,
            from = ?self.last_serviced,
            waypoints = self.current_path.len(),
            "greenkeeper heading out"
        );
    }

    /// Moves toward the next waypoint, dropping it once reached.
    fn walk_route(&mut self) {
        if let Some(&waypoint) = self.current_path.front() {
            let (next, arrived) = self.position.step_toward(waypoint, self.speed);
            self.position = next;
            if arrived {
                self.current_path.pop_front();
            }
        }
    }

    /// Route finished: either start the last leg to a sampled flag spot, or,
    /// when already standing on it, begin placing the flag.
    fn approach_flag_spot<R: Rng>(&mut self, course: &Course, rng: &mut R) {
        if self.flag_target.is_some() {
            self.motion_state = GreenkeeperState::PlacingFlag;
            self.placement_ticks = 0;
            return;
        }
        let Some(hole) = self.current_hole.and_then(|n| course.hole(n)) else {
            warn!(hole = ?self.current_hole, "service target vanished; going idle");
            self.reset_to_idle();
            return;
        };
        let spot = sample_point_in_polygon(&hole.green, rng, self.sampling_attempts)
            .unwrap_or_else(|| {
                warn!(
                    hole = hole.number,
                    attempts = self.sampling_attempts,
                    "flag sampling failed; using green center"
                );
                hole.green_center()
            });
        self.flag_target = Some(spot);
        self.current_path.push_back(spot);
    }

    fn place_flag(&mut self, course: &Course) -> Option<FlagUpdate> {
        self.placement_ticks += 1;
        if self.placement_ticks < self.placement_duration {
            return None;
        }
        let (Some(hole), Some(position)) = (self.current_hole, self.flag_target) else {
            self.reset_to_idle();
            return None;
        };
        let Some(green_center) = course.hole(hole).map(|h| h.green_center()) else {
            warn!(hole, "cannot move flag on unknown hole");
            self.reset_to_idle();
            return None;
        };
        if let Some(timer) = self.service_timers.get_mut(&hole) {
            *timer = 0;
        }
        self.pending.remove(&hole);
        self.last_serviced = Some(hole);
        self.current_path = VecDeque::from([green_center]);
        self.motion_state = GreenkeeperState::WalkingToGreenCenter;
        info!(hole, x = position.x, y = position.y, "flag moved");
        Some(FlagUpdate { hole, position })
    }

    fn reset_to_idle(&mut self) {
        self.motion_state = GreenkeeperState::Idle;
        self.current_hole = None;
        self.current_path.clear();
        self.flag_target = None;
        self.placement_ticks = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        course::{Hazards, Hole},
        geometry::Polygon,
    };
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn hole(number: u32, min_x: f64) -> Hole {
        let green = Polygon::rect(min_x, 0.0, min_x + 20.0, 20.0);
        Hole {
            number,
            par: 4,
            flag: green.center(),
            fairway: Polygon::default(),
            green,
            bunkers: vec![],
            tees: vec![],
        }
    }

    fn two_hole_course() -> Course {
        Course::new(vec![hole(1, 0.0), hole(2, 200.0)], Hazards::none()).unwrap()
    }

    fn config(interval: u64) -> SimulationConfig {
        SimulationConfig {
            service_interval_ticks: interval,
            ..SimulationConfig::default()
        }
    }

    fn run_until_flag<R: Rng>(
        keeper: &mut GreenkeeperAgent,
        course: &mut Course,
        navigator: &Navigator,
        rng: &mut R,
        max_ticks: usize,
    ) -> Option<FlagUpdate> {
        let update = (0..max_ticks).find_map(|_| keeper.update(course, navigator, rng))?;
        assert!(update.apply(course));
        Some(update)
    }

    #[test]
    fn every_hole_is_due_on_the_first_tick() {
        let course = two_hole_course();
        let navigator = Navigator::build(&course);
        let mut keeper = GreenkeeperAgent::new(&course, Point::default(), &config(10));
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        keeper.update(&course, &navigator, &mut rng);
        assert_eq!(keeper.pending().iter().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(keeper.motion_state, GreenkeeperState::WalkingToHole);
        assert_eq!(keeper.current_hole, Some(1));
        // Nothing serviced yet, so the walk goes straight to the green.
        let path: Vec<Point> = keeper.remaining_path().copied().collect();
        assert_eq!(path, vec![course.hole(1).unwrap().green_center()]);
    }

    #[test]
    fn pending_on_the_exact_tick_the_interval_is_reached() {
        let course = two_hole_course();
        let navigator = Navigator::build(&course);
        let mut keeper = GreenkeeperAgent::new(&course, Point::new(500.0, 500.0), &config(5));
        keeper.set_service_timer(1, 0);
        keeper.set_service_timer(2, 0);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for tick in 1..=4 {
            keeper.update(&course, &navigator, &mut rng);
            assert!(keeper.pending().is_empty(), "pending too early at tick {tick}");
        }
        keeper.update(&course, &navigator, &mut rng);
        assert_eq!(keeper.service_timer(1), Some(5));
        assert!(keeper.pending().contains(&1));
    }

    #[test]
    fn flag_relocation_lands_on_the_green_and_resets_the_timer() {
        let mut course = two_hole_course();
        let navigator = Navigator::build(&course);
        let mut keeper = GreenkeeperAgent::new(&course, Point::new(-50.0, 10.0), &config(1_000));
        keeper.set_service_timer(2, 0);
        let before = course.hole(1).unwrap().flag;
        let mut rng = ChaCha8Rng::seed_from_u64(9);

        let update = run_until_flag(&mut keeper, &mut course, &navigator, &mut rng, 50)
            .expect("flag never moved");
        assert_eq!(update.hole, 1);
        let hole = course.hole(1).unwrap();
        assert_eq!(hole.flag, update.position);
        assert_ne!(hole.flag, before);
        assert!(hole.green.contains(hole.flag));
        assert_eq!(keeper.service_timer(1), Some(0));
        assert!(!keeper.pending().contains(&1));
        assert_eq!(keeper.last_serviced(), Some(1));
        assert_eq!(keeper.motion_state, GreenkeeperState::WalkingToGreenCenter);
    }

    #[test]
    fn hole_stays_pending_until_the_flag_is_committed() {
        let course = two_hole_course();
        let navigator = Navigator::build(&course);
        let mut keeper = GreenkeeperAgent::new(&course, Point::new(-50.0, 10.0), &config(1_000));
        keeper.set_service_timer(2, 0);
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        loop {
            if keeper.update(&course, &navigator, &mut rng).is_some() {
                break;
            }
            assert!(keeper.pending().contains(&1));
        }
        assert!(keeper.pending().is_empty());
    }

    #[test]
    fn placement_holds_for_the_configured_ticks() {
        let course = two_hole_course();
        let navigator = Navigator::build(&course);
        let cfg = SimulationConfig {
            flag_placement_ticks: 4,
            ..config(1_000)
        };
        let mut keeper = GreenkeeperAgent::new(&course, Point::new(10.0, 10.0), &cfg);
        keeper.set_service_timer(2, 0);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut placing = 0;
        loop {
            let update = keeper.update(&course, &navigator, &mut rng);
            if keeper.motion_state == GreenkeeperState::PlacingFlag {
                placing += 1;
            }
            if update.is_some() {
                break;
            }
        }
        assert_eq!(placing, 4);
    }

    #[test]
    fn returns_to_green_center_then_serves_the_next_hole() {
        let mut course = two_hole_course();
        let navigator = Navigator::build(&course);
        let mut keeper = GreenkeeperAgent::new(&course, Point::new(10.0, 10.0), &config(1_000));
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        let first = run_until_flag(&mut keeper, &mut course, &navigator, &mut rng, 50).unwrap();
        assert_eq!(first.hole, 1);
        while keeper.motion_state != GreenkeeperState::Idle {
            keeper.update(&course, &navigator, &mut rng);
        }
        assert_eq!(keeper.position, Point::new(10.0, 10.0));
        assert_eq!(keeper.current_hole, None);
        assert_eq!(keeper.remaining_path().count(), 0);

        keeper.update(&course, &navigator, &mut rng);
        assert_eq!(keeper.current_hole, Some(2));
        let path: Vec<Point> = keeper.remaining_path().copied().collect();
        assert_eq!(Some(path.as_slice()), navigator.path(1, 2));

        let second = run_until_flag(&mut keeper, &mut course, &navigator, &mut rng, 50).unwrap();
        assert_eq!(second.hole, 2);
    }

    #[test]
    fn movement_is_capped_per_tick() {
        let course = two_hole_course();
        let navigator = Navigator::build(&course);
        let mut keeper = GreenkeeperAgent::new(&course, Point::new(-300.0, 10.0), &config(1_000));
        keeper.set_service_timer(2, 0);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        keeper.update(&course, &navigator, &mut rng);
        let start = keeper.position;
        keeper.update(&course, &navigator, &mut rng);
        assert!((distance(start, keeper.position) - 30.0).abs() < 1e-9);
    }
}
