//! Command line walkthrough of the watchmux engines.

pub mod config;
pub mod scenario;

pub use config::{Args, ScenarioChoice};
pub use scenario::{run, ScenarioReport};
