//! Tick orchestration.
//!
//! One tick advances, in order: the wind, the greenkeeper, every active group
//! (one action each), then spawning. The greenkeeper's flag move is applied
//! last so players only ever read the flag as it stood at tick start.

use std::path::PathBuf;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::{
    config::{GroupSpawnConfig, SimulationConfig},
    course::Course,
    error::EngineError,
    geometry::Point,
    greenkeeper::{FlagUpdate, GreenkeeperAgent},
    group::PlayerGroup,
    navigator::Navigator,
    player::{Ability, PlayerAgent},
    rng::{RngManager, StreamId},
    shot::ShotContext,
    snapshot::{GreenkeeperSnapshot, GroupSnapshot, SimSnapshot, SnapshotWriter},
    wind::{WindAgent, WindConditions},
};

pub struct EngineSettings {
    pub scenario_name: String,
    pub seed: u64,
    pub snapshot_interval_ticks: u64,
    pub snapshot_dir: PathBuf,
    pub simulation: SimulationConfig,
    pub spawn: GroupSpawnConfig,
}

impl EngineSettings {
    pub fn new(scenario_name: impl Into<String>, seed: u64) -> Self {
        Self {
            scenario_name: scenario_name.into(),
            seed,
            snapshot_interval_ticks: 0,
            snapshot_dir: PathBuf::from("snapshots"),
            simulation: SimulationConfig::default(),
            spawn: GroupSpawnConfig::default(),
        }
    }
}

pub struct EngineBuilder {
    settings: EngineSettings,
    course: Course,
    navigator: Option<Navigator>,
    path_cache: Option<PathBuf>,
    wind: Option<WindConditions>,
}

impl EngineBuilder {
    pub fn new(settings: EngineSettings, course: Course) -> Self {
        Self {
            settings,
            course,
            navigator: None,
            path_cache: None,
            wind: None,
        }
    }

    /// Uses (and refreshes when stale) a route cache file.
    pub fn with_path_cache(mut self, path: impl Into<PathBuf>) -> Self {
        self.path_cache = Some(path.into());
        self
    }

    pub fn with_navigator(mut self, navigator: Navigator) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Fixes the starting wind instead of drawing it from the seed.
    pub fn with_wind(mut self, wind: WindConditions) -> Self {
        self.wind = Some(wind);
        self
    }

    pub fn build(self) -> Engine {
        let EngineBuilder {
            settings,
            course,
            navigator,
            path_cache,
            wind,
        } = self;

        let navigator = match (navigator, &path_cache) {
            (Some(navigator), _) => navigator,
            (None, Some(path)) => Navigator::load_or_build(&course, path),
            (None, None) => Navigator::build(&course),
        };

        let mut rng = RngManager::new(settings.seed);
        let wind_interval = settings.simulation.wind_update_interval;
        let wind = match wind {
            Some(conditions) => WindAgent::new(conditions, wind_interval),
            None => WindAgent::random(&mut rng.stream(StreamId::Wind), wind_interval),
        };

        let start = course
            .hole(1)
            .map(|h| h.green_center())
            .unwrap_or_default();
        let greenkeeper = GreenkeeperAgent::new(&course, start, &settings.simulation);

        info!(
            scenario = %settings.scenario_name,
            holes = course.num_holes(),
            seed = settings.seed,
            "engine ready"
        );

        Engine {
            rng,
            snapshot_writer: SnapshotWriter::new(
                &settings.snapshot_dir,
                settings.snapshot_interval_ticks,
            ),
            course,
            navigator,
            wind,
            greenkeeper,
            groups: Vec::new(),
            tick: 0,
            next_group_id: 1,
            next_player_id: 1,
            groups_spawned: 0,
            groups_finished: 0,
            last_spawn_tick: None,
            last_flag_update: None,
            settings,
        }
    }
}

pub struct Engine {
    rng: RngManager,
    course: Course,
    navigator: Navigator,
    wind: WindAgent,
    greenkeeper: GreenkeeperAgent,
    groups: Vec<PlayerGroup>,
    tick: u64,
    next_group_id: u32,
    next_player_id: u32,
    groups_spawned: usize,
    groups_finished: usize,
    last_spawn_tick: Option<u64>,
    last_flag_update: Option<FlagUpdate>,
    snapshot_writer: SnapshotWriter,
    settings: EngineSettings,
}

enum GroupProgress {
    Playing,
    HoleFinished,
}

impl Engine {
    /// Advances one tick and returns the resulting state. Only the optional
    /// disk archive can fail.
    pub fn tick(&mut self) -> Result<SimSnapshot, EngineError> {
        self.tick += 1;

        let wind = self.wind.update(&mut self.rng.stream(StreamId::Wind));
        let flag_update = self.greenkeeper.update(
            &self.course,
            &self.navigator,
            &mut self.rng.stream(StreamId::Greenkeeper),
        );

        for index in 0..self.groups.len() {
            self.advance_group(index, wind);
        }
        let before = self.groups.len();
        self.groups.retain(|g| !g.is_complete);
        self.groups_finished += before - self.groups.len();

        self.maybe_spawn_group();

        if let Some(update) = flag_update {
            if !update.apply(&mut self.course) {
                warn!(hole = update.hole, "flag update for unknown hole dropped");
            }
        }
        self.last_flag_update = flag_update;

        let snapshot = self.get_state();
        self.snapshot_writer
            .maybe_write(&snapshot, &self.settings.scenario_name)?;
        Ok(snapshot)
    }

    /// Runs up to `ticks` ticks, stopping early once the configured number
    /// of groups has finished. Returns the number of ticks executed.
    pub fn run(&mut self, ticks: u64) -> Result<u64, EngineError> {
        self.run_with_hook(ticks, |_| {})
    }

    pub fn run_with_hook<F>(&mut self, ticks: u64, mut hook: F) -> Result<u64, EngineError>
    where
        F: FnMut(&SimSnapshot),
    {
        for executed in 0..ticks {
            if self.all_groups_finished() {
                info!(tick = self.tick, "all scheduled groups finished");
                return Ok(executed);
            }
            let snapshot = self.tick()?;
            hook(&snapshot);
        }
        Ok(ticks)
    }

    pub fn get_state(&self) -> SimSnapshot {
        SimSnapshot {
            tick: self.tick,
            groups: self.groups.iter().map(GroupSnapshot::from).collect(),
            greenkeeper: GreenkeeperSnapshot::from(&self.greenkeeper),
            wind: self.wind.conditions(),
            flag_update: self.last_flag_update,
            groups_finished: self.groups_finished,
        }
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn scenario_name(&self) -> &str {
        &self.settings.scenario_name
    }

    pub fn course(&self) -> &Course {
        &self.course
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn groups(&self) -> &[PlayerGroup] {
        &self.groups
    }

    pub fn greenkeeper(&self) -> &GreenkeeperAgent {
        &self.greenkeeper
    }

    pub fn wind(&self) -> WindConditions {
        self.wind.conditions()
    }

    pub fn groups_spawned(&self) -> usize {
        self.groups_spawned
    }

    pub fn groups_finished(&self) -> usize {
        self.groups_finished
    }

    fn all_groups_finished(&self) -> bool {
        self.settings
            .spawn
            .max_groups
            .is_some_and(|max| self.groups_finished >= max)
    }

    fn advance_group(&mut self, index: usize, wind: WindConditions) {
        let hole_number = self.groups[index].current_hole;
        let Some(hole) = self.course.hole(hole_number) else {
            warn!(
                group = self.groups[index].id,
                hole = hole_number,
                "group is on an unknown hole; retiring it"
            );
            self.groups[index].is_complete = true;
            return;
        };

        let other_balls: Vec<Point> = self
            .groups
            .iter()
            .enumerate()
            .filter(|&(i, g)| i != index && g.current_hole == hole_number)
            .flat_map(|(_, g)| g.balls_in_play())
            .collect();
        let ctx = ShotContext::new(hole, &self.course.hazards, wind, &self.settings.simulation)
            .with_course(&self.course);

        let progress = play_group(
            &mut self.groups[index],
            &ctx,
            self.greenkeeper.position,
            &other_balls,
            &mut self.rng.stream(StreamId::Shots),
        );

        if let GroupProgress::HoleFinished = progress {
            self.advance_to_next_hole(index);
        }
    }

    fn advance_to_next_hole(&mut self, index: usize) {
        let num_holes = self.course.num_holes();
        let group = &mut self.groups[index];
        for player in &mut group.players {
            player.finish_hole();
        }

        if group.current_hole >= num_holes {
            group.is_complete = true;
            info!(
                group = group.id,
                tee_time = group.tee_time,
                tick = self.tick,
                strokes = ?group.players.iter().map(PlayerAgent::total_strokes).collect::<Vec<_>>(),
                "group finished the round"
            );
            return;
        }

        group.current_hole += 1;
        let tee = self
            .course
            .hole(group.current_hole)
            .map(|h| h.tee_position())
            .unwrap_or_default();
        for player in &mut group.players {
            player.start_hole(tee);
        }
        group.mark_all_players_need_to_shoot();
        info!(group = group.id, hole = group.current_hole, "group moved to next hole");
    }

    fn maybe_spawn_group(&mut self) {
        let spawn = &self.settings.spawn;
        if spawn
            .max_groups
            .is_some_and(|max| self.groups_spawned >= max)
        {
            return;
        }
        if self.groups.len() >= spawn.max_active_groups {
            return;
        }
        if let Some(last) = self.last_spawn_tick {
            if self.tick - last < spawn.interval_ticks.max(1) {
                return;
            }
        }
        if self.groups.iter().any(|g| g.current_hole == 1) {
            return;
        }
        let Some(tee) = self.course.hole(1).map(|h| h.tee_position()) else {
            return;
        };

        let mut rng = self.rng.stream(StreamId::Spawn);
        let players = (0..spawn.players_per_group)
            .map(|_| {
                let ability = Ability::new(
                    sample_range(&mut rng, spawn.accuracy),
                    sample_range(&mut rng, spawn.strength),
                );
                let player = PlayerAgent::new(self.next_player_id, ability, tee);
                self.next_player_id += 1;
                player
            })
            .collect();

        let group = PlayerGroup::new(self.next_group_id, players, 1, self.tick);
        info!(
            group = group.id,
            tick = self.tick,
            players = group.players.len(),
            "group teed off"
        );
        self.next_group_id += 1;
        self.groups_spawned += 1;
        self.last_spawn_tick = Some(self.tick);
        self.groups.push(group);
    }
}

/// One action for one group: a shot by whoever is away, a step toward the
/// balls, or the start of a new round.
fn play_group<R: Rng>(
    group: &mut PlayerGroup,
    ctx: &ShotContext<'_>,
    greenkeeper_position: Point,
    other_balls: &[Point],
    rng: &mut R,
) -> GroupProgress {
    if !group.players_need_to_shoot.is_empty() {
        let turn = group.set_current_turn_index(ctx.hole.flag);
        let eligible =
            group.players_need_to_shoot.contains(&turn) && !group.players[turn].is_complete;
        if !eligible {
            let players = &group.players;
            group
                .players_need_to_shoot
                .retain(|&i| !players[i].is_complete);
        } else if group.players[turn].can_take_shot(ctx, Some(greenkeeper_position), other_balls) {
            if let Some(outcome) = group.players[turn].take_shot(ctx, rng) {
                debug!(
                    group = group.id,
                    hole = group.current_hole,
                    player = outcome.player_id,
                    stroke = outcome.stroke_number,
                    holed = outcome.is_complete,
                    "turn played"
                );
            }
            group.players_need_to_shoot.remove(&turn);
        }
    } else if !group.all_players_at_ball() {
        group.walk_all_players_to_balls(
            ctx.config.walking_speed,
            ctx.config.shot_taking_distance,
        );
    } else {
        group.mark_all_players_need_to_shoot();
    }

    if group.all_players_complete() {
        GroupProgress::HoleFinished
    } else {
        GroupProgress::Playing
    }
}

fn sample_range<R: Rng>(rng: &mut R, [low, high]: [f64; 2]) -> f64 {
    if high > low {
        rng.gen_range(low..=high)
    } else {
        low
    }
}
