//! Canonical engine names for flow-definition enumerants.

use avgraph_engine::{ColorPrimaries, ColorSpace, TransferCharacteristic};
use avgraph_media::FlowDef;

use crate::error::StageError;
use crate::formats::pixel_format_from_flow;

/// Engine name of the pixel format described by `flow`.
///
/// With `software` set, the plane list is read even when a hardware
/// surface type is present.
pub fn pixel_format_name(flow: &FlowDef, software: bool) -> Result<&'static str, StageError> {
    pixel_format_from_flow(flow, software).map(|f| f.name())
}

fn code_point(value: i64) -> Option<i32> {
    i32::try_from(value).ok()
}

/// Name of an H.273 colour primaries code point.
pub fn colour_primaries_name(value: i64) -> Option<&'static str> {
    code_point(value).and_then(|v| ColorPrimaries(v).name())
}

/// Name of an H.273 transfer characteristics code point.
pub fn transfer_characteristics_name(value: i64) -> Option<&'static str> {
    code_point(value).and_then(|v| TransferCharacteristic(v).name())
}

/// Name of an H.273 matrix coefficients code point.
pub fn matrix_coefficients_name(value: i64) -> Option<&'static str> {
    code_point(value).and_then(|v| ColorSpace(v).name())
}
