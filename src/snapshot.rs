use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    course::Lie,
    error::EngineError,
    geometry::Point,
    greenkeeper::{FlagUpdate, GreenkeeperAgent, GreenkeeperState},
    group::PlayerGroup,
    player::{MotionState, PlayerAgent},
    wind::WindConditions,
};

/// Post-tick state handed to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimSnapshot {
    pub tick: u64,
    pub groups: Vec<GroupSnapshot>,
    pub greenkeeper: GreenkeeperSnapshot,
    pub wind: WindConditions,
    /// Present only on the tick a flag moved.
    pub flag_update: Option<FlagUpdate>,
    pub groups_finished: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub id: u32,
    pub current_hole: u32,
    pub tee_time: u64,
    pub turn_fallbacks: u64,
    pub players: Vec<PlayerSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: u32,
    pub position: Point,
    pub ball_position: Point,
    pub strokes: u32,
    pub total_strokes: u32,
    pub lie: Lie,
    pub motion_state: MotionState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GreenkeeperSnapshot {
    pub position: Point,
    pub motion_state: GreenkeeperState,
    pub current_hole: Option<u32>,
    pub holes_pending: usize,
}

impl From<&PlayerAgent> for PlayerSnapshot {
    fn from(player: &PlayerAgent) -> Self {
        Self {
            id: player.id,
            position: player.player_position,
            ball_position: player.ball_position,
            strokes: player.strokes,
            total_strokes: player.total_strokes(),
            lie: player.lie,
            motion_state: player.motion_state,
        }
    }
}

impl From<&PlayerGroup> for GroupSnapshot {
    fn from(group: &PlayerGroup) -> Self {
        Self {
            id: group.id,
            current_hole: group.current_hole,
            tee_time: group.tee_time,
            turn_fallbacks: group.turn_fallbacks,
            players: group.players.iter().map(PlayerSnapshot::from).collect(),
        }
    }
}

impl From<&GreenkeeperAgent> for GreenkeeperSnapshot {
    fn from(keeper: &GreenkeeperAgent) -> Self {
        Self {
            position: keeper.position,
            motion_state: keeper.motion_state,
            current_hole: keeper.current_hole,
            holes_pending: keeper.holes_pending(),
        }
    }
}

/// Writes every Nth snapshot to `<dir>/<scenario>/tick_000123.json`.
/// An interval of 0 disables the archive.
pub struct SnapshotWriter {
    output_dir: PathBuf,
    interval_ticks: u64,
}

impl SnapshotWriter {
    pub fn new(output_dir: impl AsRef<Path>, interval_ticks: u64) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            interval_ticks,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.interval_ticks > 0
    }

    pub fn maybe_write(
        &self,
        snapshot: &SimSnapshot,
        scenario_name: &str,
    ) -> Result<Option<PathBuf>, EngineError> {
        if !self.is_enabled() || snapshot.tick % self.interval_ticks != 0 {
            return Ok(None);
        }

        let dir = self.output_dir.join(scenario_name);
        fs::create_dir_all(&dir)?;
        let file_path = dir.join(format!("tick_{:06}.json", snapshot.tick));
        let json = serde_json::to_string_pretty(snapshot)?;
        fs::write(&file_path, json)?;
        Ok(Some(file_path))
    }
}
