//! Stage config validation.
//!
//! Validation runs before anything touches an engine: every problem in a
//! config is collected, so a user sees all of them at once.
//!
//! # Example
//!
//! ```rust
//! use avgraph_config::{StageConfig, ValidationError};
//!
//! let mut config = StageConfig::new("[in]null[out]");
//! config.add_output("out");
//! config.add_output("out");
//! assert_eq!(
//!     config.validate(),
//!     Err(ValidationError::DuplicatePad("out".into()))
//! );
//! ```

use std::collections::BTreeSet;

use avgraph_engine::HwDeviceType;
use thiserror::Error;

use crate::stage_config::StageConfig;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// No filter description.
    #[error("missing filter description")]
    MissingDescription,

    /// Two pads share a name.
    #[error("duplicate pad name '{0}'")]
    DuplicatePad(String),

    /// Both a single input and named inputs are configured.
    #[error("a single input cannot be combined with named inputs")]
    MixedInputs,

    /// Zero picture dimension.
    #[error("picture size {width}x{height} has a zero dimension")]
    ZeroSize {
        /// Configured width.
        width: u32,
        /// Configured height.
        height: u32,
    },

    /// Zero sample rate.
    #[error("sample rate must be positive")]
    ZeroRate,

    /// A ratio that does not parse as a positive `num/den`.
    #[error("'{field}' is not a positive ratio: '{value}'")]
    MalformedRational {
        /// Config field.
        field: String,
        /// Offending value.
        value: String,
    },

    /// Unknown pixel format name.
    #[error("unknown pixel format: {0}")]
    UnknownPixelFormat(String),

    /// Hardware surfaces cannot be configured as input formats.
    #[error("hardware pixel format '{0}' cannot describe an input")]
    HardwarePixelFormat(String),

    /// Unknown sample format name.
    #[error("unknown sample format: {0}")]
    UnknownSampleFormat(String),

    /// Unknown colour code point name.
    #[error("unknown {field} '{value}'")]
    UnknownColour {
        /// Config field.
        field: String,
        /// Offending name.
        value: String,
    },

    /// Channel count without a known layout.
    #[error("unsupported channel count {0} (expected 1, 2 or 6)")]
    UnsupportedChannels(u8),

    /// Unknown hardware device type.
    #[error("unknown hardware device type: {0}")]
    UnknownDeviceType(String),

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

impl ValidationError {
    /// `Ok` for no errors, the error itself for one, [`Multiple`](Self::Multiple) otherwise.
    pub fn collect(mut errors: Vec<ValidationError>) -> ValidationResult<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ValidationError::Multiple(errors)),
        }
    }
}

/// Checks a whole stage config.
pub fn validate(config: &StageConfig) -> ValidationResult<()> {
    let mut errors = Vec::new();

    if config.description.trim().is_empty() {
        errors.push(ValidationError::MissingDescription);
    }
    if let Some(hw) = &config.hw
        && HwDeviceType::from_name(&hw.device_type).is_none()
    {
        errors.push(ValidationError::UnknownDeviceType(hw.device_type.clone()));
    }
    if config.input.is_some() && !config.inputs.is_empty() {
        errors.push(ValidationError::MixedInputs);
    }

    let mut seen = BTreeSet::new();
    let names = config
        .inputs
        .iter()
        .map(|i| &i.name)
        .chain(config.outputs.iter().map(|o| &o.name));
    for name in names {
        if !seen.insert(name.as_str()) {
            errors.push(ValidationError::DuplicatePad(name.clone()));
        }
    }

    if let Some(input) = &config.input {
        input.check(&mut errors);
    }
    for input in &config.inputs {
        if let Some(format) = &input.format {
            format.check(&mut errors);
        }
    }

    ValidationError::collect(errors)
}
