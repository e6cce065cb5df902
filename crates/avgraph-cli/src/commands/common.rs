//! Helpers shared by the commands.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use avgraph_config::{BuiltStage, StageConfig};
use avgraph_engine::routing::RoutingEngine;
use avgraph_engine::{Engine, HwDeviceType};

/// The reference engine, able to open every device type.
pub fn engine() -> Arc<dyn Engine> {
    Arc::new(RoutingEngine::with_hw_devices(&HwDeviceType::ALL))
}

/// Loads a config file and builds its stage.
pub fn build_stage(path: &Path) -> anyhow::Result<(StageConfig, BuiltStage)> {
    let config = StageConfig::load(path)
        .with_context(|| format!("cannot load config '{}'", path.display()))?;
    let built = config
        .build(engine())
        .with_context(|| format!("cannot build stage from '{}'", path.display()))?;
    Ok((config, built))
}
