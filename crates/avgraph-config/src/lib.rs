//! Stage configuration for avgraph filter stages.
//!
//! A [`StageConfig`] describes a whole stage in TOML: the filter description,
//! engine options, an optional hardware device, and either a single implicit
//! input or named input and output pads with their formats.
//!
//! # Features
//!
//! - **Files**: load and save configs as TOML
//! - **Validation**: report every problem in a config before building
//! - **Building**: turn a config into a ready [`FilterStage`](avgraph_core::FilterStage)
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use avgraph_config::{FormatConfig, StageConfig, VideoFormat};
//! use avgraph_core::GraphState;
//! use avgraph_engine::routing::RoutingEngine;
//!
//! let mut config = StageConfig::new("[cam]split[a][b]");
//! config.add_input(
//!     "cam",
//!     Some(FormatConfig::Video(VideoFormat::new("yuv420p", 320, 240).with_frame_rate("25"))),
//! );
//! config.add_output("a");
//! config.add_output("b");
//!
//! let built = config.build(Arc::new(RoutingEngine::new())).unwrap();
//! assert_eq!(built.stage.graph_state(), GraphState::Configured);
//! ```

mod error;
mod format;
mod stage_config;
/// Stage config validation.
pub mod validation;

pub use error::ConfigError;
pub use format::{AudioFormat, FormatConfig, VideoFormat};
pub use stage_config::{BuiltStage, HwConfig, InputConfig, OutputConfig, StageConfig};
pub use validation::{ValidationError, ValidationResult, validate};
