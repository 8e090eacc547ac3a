pub mod config;
pub mod course;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod greenkeeper;
pub mod group;
pub mod navigator;
pub mod player;
pub mod rng;
pub mod scenario;
pub mod shot;
pub mod snapshot;
pub mod web;
pub mod wind;

pub use course::Course;
pub use engine::{Engine, EngineBuilder, EngineSettings};
pub use scenario::{Scenario, ScenarioLoader};
pub use snapshot::SimSnapshot;
