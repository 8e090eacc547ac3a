use std::collections::BTreeSet;

use tracing::warn;

use crate::{
    geometry::{distance, Point},
    player::PlayerAgent,
};

/// Players who tee off together and move hole to hole as one unit.
#[derive(Debug, Clone)]
pub struct PlayerGroup {
    pub id: u32,
    pub players: Vec<PlayerAgent>,
    pub current_hole: u32,
    pub turn_index: usize,
    /// Indices that still have to play in the current round of the hole.
    pub players_need_to_shoot: BTreeSet<usize>,
    pub is_complete: bool,
    /// Tick the group was sent out.
    pub tee_time: u64,
    /// Times turn selection found nobody eligible and fell back to index 0.
    pub turn_fallbacks: u64,
}

impl PlayerGroup {
    pub fn new(id: u32, players: Vec<PlayerAgent>, starting_hole: u32, tee_time: u64) -> Self {
        let mut group = Self {
            id,
            players,
            current_hole: starting_hole,
            turn_index: 0,
            players_need_to_shoot: BTreeSet::new(),
            is_complete: false,
            tee_time,
            turn_fallbacks: 0,
        };
        group.mark_all_players_need_to_shoot();
        group
    }

    /// Starts a new round: every player still on the hole owes a shot.
    pub fn mark_all_players_need_to_shoot(&mut self) {
        self.players_need_to_shoot = self
            .players
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.is_complete)
            .map(|(i, _)| i)
            .collect();
    }

    pub fn all_shots_taken_this_round(&self) -> bool {
        self.players_need_to_shoot.is_empty()
    }

    pub fn all_players_at_ball(&self) -> bool {
        self.players.iter().all(PlayerAgent::is_at_ball)
    }

    pub fn all_players_complete(&self) -> bool {
        self.players.iter().all(|p| p.is_complete)
    }

    pub fn walk_all_players_to_balls(&mut self, walking_speed: f64, taking_distance: f64) {
        for player in &mut self.players {
            player.walk_to_ball(walking_speed, taking_distance);
        }
    }

    /// Picks who plays next: among players still owing a shot and not yet
    /// holed out, the one whose ball is farthest from `flag`. With nobody
    /// eligible the index falls back to 0 and the fallback is counted.
    pub fn set_current_turn_index(&mut self, flag: Point) -> usize {
        let farthest = self
            .players_need_to_shoot
            .iter()
            .copied()
            .filter(|&i| !self.players[i].is_complete)
            .map(|i| (i, distance(self.players[i].ball_position, flag)))
            .fold(None::<(usize, f64)>, |best, (i, d)| match best {
                Some((_, best_d)) if best_d >= d => best,
                _ => Some((i, d)),
            });

        self.turn_index = match farthest {
            Some((index, _)) => index,
            None => {
                self.turn_fallbacks += 1;
                warn!(
                    group = self.id,
                    hole = self.current_hole,
                    fallbacks = self.turn_fallbacks,
                    "no eligible player for turn; defaulting to index 0"
                );
                0
            }
        };
        self.turn_index
    }

    /// Every ball in the group that is still in play.
    pub fn balls_in_play(&self) -> impl Iterator<Item = Point> + '_ {
        self.players
            .iter()
            .filter(|p| !p.is_complete)
            .map(|p| p.ball_position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Ability;

    fn group_with_balls(balls: &[(f64, f64)]) -> PlayerGroup {
        let players = balls
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| {
                let mut p = PlayerAgent::new(i as u32, Ability::new(0.8, 0.8), Point::default());
                p.ball_position = Point::new(x, y);
                p
            })
            .collect();
        PlayerGroup::new(1, players, 1, 0)
    }

    #[test]
    fn farthest_from_flag_plays_first() {
        let mut group = group_with_balls(&[(50.0, 0.0), (10.0, 0.0), (80.0, 0.0)]);
        assert_eq!(group.set_current_turn_index(Point::new(100.0, 0.0)), 1);
    }

    #[test]
    fn players_who_already_shot_are_skipped() {
        let mut group = group_with_balls(&[(50.0, 0.0), (10.0, 0.0), (80.0, 0.0)]);
        group.players_need_to_shoot.remove(&1);
        assert_eq!(group.set_current_turn_index(Point::new(100.0, 0.0)), 0);
    }

    #[test]
    fn complete_players_are_never_selected() {
        let mut group = group_with_balls(&[(50.0, 0.0), (10.0, 0.0), (80.0, 0.0)]);
        group.players[1].is_complete = true;
        assert_eq!(group.set_current_turn_index(Point::new(100.0, 0.0)), 0);
        assert_eq!(group.turn_fallbacks, 0);
    }

    #[test]
    fn nobody_eligible_falls_back_to_zero() {
        let mut group = group_with_balls(&[(50.0, 0.0), (10.0, 0.0)]);
        group.turn_index = 1;
        group.players_need_to_shoot.clear();
        assert_eq!(group.set_current_turn_index(Point::new(100.0, 0.0)), 0);
        assert_eq!(group.turn_fallbacks, 1);
    }

    #[test]
    fn equal_distances_keep_the_lower_index() {
        let mut group = group_with_balls(&[(0.0, 10.0), (0.0, -10.0)]);
        assert_eq!(group.set_current_turn_index(Point::default()), 0);
    }

    #[test]
    fn new_round_excludes_complete_players() {
        let mut group = group_with_balls(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
        group.players[2].is_complete = true;
        group.players_need_to_shoot.clear();
        group.mark_all_players_need_to_shoot();
        assert_eq!(group.players_need_to_shoot.iter().copied().collect::<Vec<_>>(), vec![0, 1]);
    }
}
