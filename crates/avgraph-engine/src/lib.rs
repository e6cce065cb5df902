//! Filter-graph engine interface for avgraph.
//!
//! The stage in `avgraph-core` drives filter graphs through the [`Engine`]
//! and [`FilterGraph`] traits defined here and exchanges [`NativeFrame`]s
//! with them. [`routing::RoutingEngine`] is a complete implementation whose
//! filters route frames without touching their contents; it is what the
//! tests, benches and CLI run against.
//!
//! ## Core Components
//!
//! - [`Engine`] / [`FilterGraph`]: graph construction, configuration, data path
//! - [`NativeFrame`]: engine-side frame with shared plane memory ([`PlaneBuffer`])
//! - [`PixelFormat`], [`SampleFormat`], [`ChannelLayout`]: format vocabulary
//! - [`HwDevice`] / [`HwFrames`]: hardware device and surface pool handles
//! - [`EngineError`] / [`PullError`]: engine diagnostics
//!
//! ## Example
//!
//! ```rust
//! use avgraph_engine::routing::RoutingEngine;
//! use avgraph_engine::Engine;
//!
//! let engine = RoutingEngine::new();
//! assert!(engine.has_filter("buffersink"));
//! assert!(!engine.has_filter("scale"));
//! ```

pub mod error;
pub mod format;
pub mod frame;
pub mod graph;
pub mod hw;
pub mod routing;

pub use error::{EngineError, PullError};
pub use format::{
    ChannelLayout, ColorPrimaries, ColorRange, ColorSpace, MediaType, PixelFormat, PlaneGeometry,
    Ratio, SampleFormat, TransferCharacteristic,
};
pub use frame::{AudioProps, FrameProps, FramePlane, NativeFrame, PlaneBuffer, PlaneRef, VideoProps};
pub use graph::{
    AudioParams, Engine, FilterGraph, FilterId, FilterInfo, InOut, ParsedLinks, StreamParams,
    VideoParams,
};
pub use hw::{HwDevice, HwDeviceType, HwFrames};
