//! Demo configuration.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use watchmux_core::{DeliveryPolicy, EngineConfig, Error, Result};

/// Which scenario to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScenarioChoice {
    /// Subtree and direct subscribers on one parent node.
    Subtree,
    /// A read-only subscriber on a data object.
    Object,
    /// Queued records delivered when a target's last subscriber leaves.
    Drain,
    /// Every scenario, in order.
    All,
}

/// watchmux demo command line arguments.
#[derive(Debug, Parser)]
#[command(name = "watchmux-demo")]
#[command(about = "Run watchmux subscription scenarios")]
pub struct Args {
    /// Scenario to run.
    #[arg(short, long, value_enum, default_value_t = ScenarioChoice::All)]
    pub scenario: ScenarioChoice,

    /// Subscriber failure handling (isolate or propagate). Overrides the
    /// config file.
    #[arg(short, long)]
    pub delivery: Option<DeliveryPolicy>,

    /// Engine configuration file (JSON).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print reports as JSON instead of logging them.
    #[arg(long)]
    pub json: bool,
}

impl Args {
    /// Build the engine configuration from the config file and flags.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("failed to read {}: {e}", path.display()))
                })?;
                EngineConfig::from_json(&text)?
            }
            None => EngineConfig::default(),
        };
        if let Some(delivery) = self.delivery {
            config.delivery = delivery;
        }
        Ok(config)
    }
}
