//! Simulation tunables. Every field has a default so a scenario only needs
//! to override what it changes.

use serde::{Deserialize, Serialize};

fn default_walking_speed() -> f64 {
    30.0
}

fn default_shot_taking_distance() -> f64 {
    1.0
}

fn default_hole_completion_distance() -> f64 {
    1.0
}

fn default_base_max_distance() -> f64 {
    250.0
}

fn default_power_steps() -> u32 {
    10
}

fn default_direction_steps() -> u32 {
    12
}

fn default_other_hole_penalty() -> f64 {
    500.0
}

fn default_out_of_bounds_penalty() -> f64 {
    1000.0
}

fn default_course_margin() -> f64 {
    60.0
}

fn default_greenkeeper_safety_radius() -> f64 {
    30.0
}

fn default_group_safety_margin() -> f64 {
    20.0
}

fn default_wind_update_interval() -> u64 {
    1
}

fn default_wind_effect_factor() -> f64 {
    0.02
}

fn default_greenkeeper_speed() -> f64 {
    30.0
}

fn default_service_interval_ticks() -> u64 {
    120
}

fn default_flag_placement_ticks() -> u32 {
    3
}

fn default_flag_sampling_attempts() -> u32 {
    250
}

fn default_water_drop_distance() -> f64 {
    2.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Meters a player covers per tick.
    #[serde(default = "default_walking_speed")]
    pub walking_speed: f64,
    #[serde(default = "default_shot_taking_distance")]
    pub shot_taking_distance: f64,
    #[serde(default = "default_hole_completion_distance")]
    pub hole_completion_distance: f64,
    /// Driver carry for a strength 1.0 player from a clean lie.
    #[serde(default = "default_base_max_distance")]
    pub base_max_distance: f64,
    #[serde(default = "default_power_steps")]
    pub power_steps: u32,
    #[serde(default = "default_direction_steps")]
    pub direction_steps: u32,
    #[serde(default = "default_other_hole_penalty")]
    pub other_hole_penalty: f64,
    #[serde(default = "default_out_of_bounds_penalty")]
    pub out_of_bounds_penalty: f64,
    #[serde(default = "default_course_margin")]
    pub course_margin: f64,
    #[serde(default = "default_greenkeeper_safety_radius")]
    pub greenkeeper_safety_radius: f64,
    #[serde(default = "default_group_safety_margin")]
    pub group_safety_margin: f64,
    #[serde(default = "default_wind_update_interval")]
    pub wind_update_interval: u64,
    /// Distance change per meter of carry per m/s of wind.
    #[serde(default = "default_wind_effect_factor")]
    pub wind_effect_factor: f64,
    #[serde(default = "default_greenkeeper_speed")]
    pub greenkeeper_speed: f64,
    #[serde(default = "default_service_interval_ticks")]
    pub service_interval_ticks: u64,
    #[serde(default = "default_flag_placement_ticks")]
    pub flag_placement_ticks: u32,
    #[serde(default = "default_flag_sampling_attempts")]
    pub flag_sampling_attempts: u32,
    #[serde(default = "default_water_drop_distance")]
    pub water_drop_distance: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            walking_speed: default_walking_speed(),
            shot_taking_distance: default_shot_taking_distance(),
            hole_completion_distance: default_hole_completion_distance(),
            base_max_distance: default_base_max_distance(),
            power_steps: default_power_steps(),
            direction_steps: default_direction_steps(),
            other_hole_penalty: default_other_hole_penalty(),
            out_of_bounds_penalty: default_out_of_bounds_penalty(),
            course_margin: default_course_margin(),
            greenkeeper_safety_radius: default_greenkeeper_safety_radius(),
            group_safety_margin: default_group_safety_margin(),
            wind_update_interval: default_wind_update_interval(),
            wind_effect_factor: default_wind_effect_factor(),
            greenkeeper_speed: default_greenkeeper_speed(),
            service_interval_ticks: default_service_interval_ticks(),
            flag_placement_ticks: default_flag_placement_ticks(),
            flag_sampling_attempts: default_flag_sampling_attempts(),
            water_drop_distance: default_water_drop_distance(),
        }
    }
}

fn default_spawn_interval() -> u64 {
    30
}

fn default_players_per_group() -> usize {
    4
}

fn default_max_active_groups() -> usize {
    6
}

fn default_accuracy_range() -> [f64; 2] {
    [0.5, 0.95]
}

fn default_strength_range() -> [f64; 2] {
    [0.6, 1.0]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSpawnConfig {
    #[serde(default = "default_spawn_interval")]
    pub interval_ticks: u64,
    #[serde(default = "default_players_per_group")]
    pub players_per_group: usize,
    #[serde(default = "default_max_active_groups")]
    pub max_active_groups: usize,
    /// Total groups to send out; unlimited when absent.
    #[serde(default)]
    pub max_groups: Option<usize>,
    #[serde(default = "default_accuracy_range")]
    pub accuracy: [f64; 2],
    #[serde(default = "default_strength_range")]
    pub strength: [f64; 2],
}

impl Default for GroupSpawnConfig {
    fn default() -> Self {
        Self {
            interval_ticks: default_spawn_interval(),
            players_per_group: default_players_per_group(),
            max_active_groups: default_max_active_groups(),
            max_groups: None,
            accuracy: default_accuracy_range(),
            strength: default_strength_range(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_yields_defaults() {
        let config: SimulationConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, SimulationConfig::default());
        assert_eq!(config.power_steps, 10);
        assert_eq!(config.service_interval_ticks, 120);
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config: SimulationConfig =
            serde_yaml::from_str("walking_speed: 12.5\nflag_placement_ticks: 1\n").unwrap();
        assert_eq!(config.walking_speed, 12.5);
        assert_eq!(config.flag_placement_ticks, 1);
        assert_eq!(config.greenkeeper_speed, 30.0);
    }

    #[test]
    fn spawn_config_round_trips_through_yaml() {
        let spawn = GroupSpawnConfig {
            max_groups: Some(3),
            ..GroupSpawnConfig::default()
        };
        let yaml = serde_yaml::to_string(&spawn).unwrap();
        let loaded: GroupSpawnConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(loaded, spawn);
    }
}
