use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{
    config::{GroupSpawnConfig, LoggingConfig, SimulationConfig},
    course::Course,
    engine::{EngineBuilder, EngineSettings},
};

fn default_snapshot_interval_ticks() -> u64 {
    0
}

fn default_tick_interval_ms() -> u64 {
    250
}

const DEFAULT_TICKS: u64 = 600;

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    pub seed: u64,
    #[serde(default)]
    pub ticks: Option<u64>,
    /// Course JSON, relative to the scenario file.
    pub course: PathBuf,
    /// Route cache file, relative to the scenario file.
    #[serde(default)]
    pub path_cache: Option<PathBuf>,
    #[serde(default = "default_snapshot_interval_ticks")]
    pub snapshot_interval_ticks: u64,
    /// Wall-clock pacing of the live server.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub spawn: GroupSpawnConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let mut scenario: Scenario = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        let scenario_dir = path.parent().unwrap_or(Path::new("."));
        scenario.course = scenario_dir.join(&scenario.course);
        scenario.path_cache = scenario.path_cache.map(|cache| scenario_dir.join(cache));
        Ok(scenario)
    }
}

impl Scenario {
    pub fn ticks(&self, override_ticks: Option<u64>) -> u64 {
        override_ticks.or(self.ticks).unwrap_or(DEFAULT_TICKS)
    }

    pub fn load_course(&self) -> Result<Course> {
        Course::load(&self.course)
            .with_context(|| format!("Failed to load course {}", self.course.display()))
    }

    pub fn engine_settings(&self, snapshot_dir: PathBuf, snapshot_interval: u64) -> EngineSettings {
        EngineSettings {
            scenario_name: self.name.clone(),
            seed: self.seed,
            snapshot_interval_ticks: snapshot_interval,
            snapshot_dir,
            simulation: self.simulation.clone(),
            spawn: self.spawn.clone(),
        }
    }

    /// Builder with the course loaded and the route cache attached.
    pub fn engine_builder(&self, settings: EngineSettings) -> Result<EngineBuilder> {
        let builder = EngineBuilder::new(settings, self.load_course()?);
        Ok(match &self.path_cache {
            Some(cache) => builder.with_path_cache(cache),
            None => builder,
        })
    }
}
