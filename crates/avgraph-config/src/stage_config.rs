//! Stage config file format and building.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use avgraph_core::{FilterStage, PadId};
use avgraph_engine::Engine;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::format::FormatConfig;
use crate::validation::{self, ValidationResult};

/// A filter stage described in TOML.
///
/// Either `input` (one implicit input whose first frame configures the
/// graph) or named `inputs` may be set, not both.
///
/// # TOML Format
///
/// ```toml
/// description = "[in]split[a][b]"
///
/// [options]
/// threads = "2"
///
/// [hw]
/// device_type = "vaapi"
///
/// [[inputs]]
/// name = "in"
/// [inputs.format]
/// kind = "video"
/// pixel_format = "nv12"
/// width = 1280
/// height = 720
///
/// [[outputs]]
/// name = "a"
///
/// [[outputs]]
/// name = "b"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageConfig {
    /// Filter description.
    pub description: String,

    /// Engine options applied to every graph.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,

    /// Hardware device shared by the graphs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hw: Option<HwConfig>,

    /// Format of the single implicit input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<FormatConfig>,

    /// Named input pads.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<InputConfig>,

    /// Named output pads.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<OutputConfig>,
}

/// Hardware device selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HwConfig {
    /// Device type name (`"vaapi"`, `"cuda"`, ...).
    pub device_type: String,
    /// Device path or index; the engine default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

/// A named input pad.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputConfig {
    /// Pad name, matching a label of the description.
    pub name: String,
    /// Format known up front.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<FormatConfig>,
}

/// A named output pad.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// Pad name, matching a label of the description.
    pub name: String,
}

/// A stage built from a [`StageConfig`].
pub struct BuiltStage {
    /// The stage.
    pub stage: FilterStage,
    /// Input pads by name.
    pub inputs: BTreeMap<String, PadId>,
    /// Output pads by name.
    pub outputs: BTreeMap<String, PadId>,
}

impl std::fmt::Debug for BuiltStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltStage")
            .field("state", &self.stage.graph_state())
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

impl StageConfig {
    /// A config with a description and nothing else.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            options: BTreeMap::new(),
            hw: None,
            input: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Set an engine option.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Use a single implicit input of the given format.
    pub fn with_input(mut self, format: FormatConfig) -> Self {
        self.input = Some(format);
        self
    }

    /// Declare a named input pad.
    pub fn add_input(&mut self, name: impl Into<String>, format: Option<FormatConfig>) {
        self.inputs.push(InputConfig {
            name: name.into(),
            format,
        });
    }

    /// Declare a named output pad.
    pub fn add_output(&mut self, name: impl Into<String>) {
        self.outputs.push(OutputConfig { name: name.into() });
    }

    /// Load a config from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), "config: loaded");
        Ok(config)
    }

    /// Load a config from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the config to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check the config without building anything.
    pub fn validate(&self) -> ValidationResult<()> {
        validation::validate(self)
    }

    /// Validates the config and builds a stage on `engine`.
    ///
    /// Options and the hardware device are applied first, then the
    /// description, then outputs, inputs and their formats. With named pads
    /// a graph that fails to build is reported through the stage's events,
    /// not as an error here.
    pub fn build(&self, engine: Arc<dyn Engine>) -> Result<BuiltStage, ConfigError> {
        self.validate()?;
        let mut stage = FilterStage::new(engine);

        for (key, value) in &self.options {
            stage.set_option(key, Some(value))?;
        }
        if let Some(hw) = &self.hw {
            stage.set_hw_device(&hw.device_type, hw.device.as_deref())?;
        }
        stage.set_description(&self.description)?;

        if let Some(input) = &self.input {
            stage.set_input_format(&input.to_flow_def()?)?;
        }

        let mut outputs = BTreeMap::new();
        for output in &self.outputs {
            outputs.insert(output.name.clone(), stage.add_output_pad(&output.name)?);
        }
        let mut inputs = BTreeMap::new();
        for input in &self.inputs {
            let id = stage.add_input_pad(&input.name)?;
            if let Some(format) = &input.format {
                stage.set_pad_format(id, &format.to_flow_def()?)?;
            }
            inputs.insert(input.name.clone(), id);
        }

        tracing::info!(
            inputs = inputs.len(),
            outputs = outputs.len(),
            state = ?stage.graph_state(),
            "config: stage built"
        );
        Ok(BuiltStage {
            stage,
            inputs,
            outputs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{AudioFormat, VideoFormat};
    use crate::validation::ValidationError;
    use avgraph_core::GraphState;
    use avgraph_engine::routing::RoutingEngine;

    const SPLIT: &str = r#"
description = "[in]split[a][b]"

[options]
threads = "2"

[[inputs]]
name = "in"
[inputs.format]
kind = "video"
pixel_format = "nv12"
width = 64
height = 48
frame_rate = "25"

[[outputs]]
name = "a"

[[outputs]]
name = "b"
"#;

    #[test]
    fn parse_named_pads() {
        let config = StageConfig::from_toml(SPLIT).unwrap();
        assert_eq!(config.description, "[in]split[a][b]");
        assert_eq!(config.options.get("threads").map(String::as_str), Some("2"));
        assert_eq!(config.inputs.len(), 1);
        assert_eq!(config.outputs.len(), 2);
        assert!(matches!(
            config.inputs[0].format,
            Some(FormatConfig::Video(ref v)) if v.width == 64
        ));
    }

    #[test]
    fn toml_round_trip() {
        let mut config = StageConfig::new("[in]null[out]").with_option("threads", "1");
        config.add_input(
            "in",
            Some(FormatConfig::Audio(AudioFormat {
                sample_format: "s16".to_string(),
                channels: 2,
                sample_rate: 48_000,
            })),
        );
        config.add_output("out");
        let parsed = StageConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn builds_a_configured_split() {
        let config = StageConfig::from_toml(SPLIT).unwrap();
        let built = config.build(Arc::new(RoutingEngine::new())).unwrap();
        assert_eq!(built.stage.graph_state(), GraphState::Configured);
        assert_eq!(built.outputs.len(), 2);
        assert_eq!(
            built.stage.options().collect::<Vec<_>>(),
            vec![("threads", "2")]
        );
        assert!(built.stage.pad_is_bound(built.outputs["a"]));
    }

    #[test]
    fn single_input_waits_for_its_first_frame() {
        let config = StageConfig::new("null")
            .with_input(FormatConfig::Video(VideoFormat::new("yuv420p", 32, 32)));
        let built = config.build(Arc::new(RoutingEngine::new())).unwrap();
        assert!(built.inputs.is_empty());
        assert_eq!(built.stage.graph_state(), GraphState::Allocated);
    }

    #[test]
    fn invalid_configs_are_not_built() {
        let config = StageConfig::new("");
        assert!(matches!(
            config.build(Arc::new(RoutingEngine::new())),
            Err(ConfigError::Validation(ValidationError::MissingDescription))
        ));
    }

    #[test]
    fn unavailable_hardware_is_a_stage_error() {
        let mut config = StageConfig::new("[in]null[out]");
        config.hw = Some(HwConfig {
            device_type: "cuda".to_string(),
            device: None,
        });
        assert!(matches!(
            config.build(Arc::new(RoutingEngine::new())),
            Err(ConfigError::Stage(_))
        ));
    }
}
