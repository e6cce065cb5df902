//! avgraph Core - a filter-graph stage for media pipelines
//!
//! This crate runs an engine filter graph as one stage of a pipeline. Buffers
//! enter through input pads, flow through the graph described by a textual
//! filter description, and leave through output pads with repaired timing.
//!
//! # Components
//!
//! - **Frame Bridge** ([`bridge`]): zero-copy conversion between
//!   [`MediaBuffer`](avgraph_media::MediaBuffer)s and engine frames
//! - **Clock Continuity Tracker** ([`ClockTracker`]): strictly increasing
//!   program time, wall-clock anchoring and latency
//! - **Graph Lifecycle Manager**: builds, configures and tears down the engine
//!   graph whenever the description, options, pads or formats change
//! - **Pad Coordinator**: routes buffers in, drains sinks out, retains early
//!   buffers and schedules [`Wakeup`]s
//!
//! [`FilterStage`] ties them together and is the only entry point a pipeline
//! needs. [`FormatPlan`] derives conversion descriptions between two formats,
//! and [`names`] exposes canonical engine names of format enumerants.
//!
//! # Example
//!
//! ```rust
//! use std::sync::{Arc, mpsc};
//! use avgraph_core::{FilterStage, GraphState, OutputEvent, formats};
//! use avgraph_engine::PixelFormat;
//! use avgraph_engine::routing::RoutingEngine;
//! use avgraph_media::{BufferAllocator, FlowDef, Rational};
//!
//! let mut stage = FilterStage::new(Arc::new(RoutingEngine::new()));
//! stage.set_description("[cam]null[preview]").unwrap();
//! let cam = stage.add_input_pad("cam").unwrap();
//! let preview = stage.add_output_pad("preview").unwrap();
//!
//! let (tx, rx) = mpsc::channel();
//! stage.attach_output(preview, Box::new(tx)).unwrap();
//! stage.set_allocator(BufferAllocator::new());
//!
//! let mut flow = FlowDef::picture();
//! formats::pixel_format_to_flow(PixelFormat::Gray, &mut flow).unwrap();
//! flow.set_hsize(4);
//! flow.set_vsize(4);
//! flow.set_fps(Rational::new(25, 1));
//! stage.set_pad_format(cam, &flow).unwrap();
//! assert_eq!(stage.graph_state(), GraphState::Configured);
//!
//! let planes = formats::pixel_planes(PixelFormat::Gray).unwrap();
//! let mut buffer = BufferAllocator::new().picture(4, 4, &planes).build();
//! buffer.attrs.pts_prog = Some(0);
//! stage.push_input(cam, buffer).unwrap();
//!
//! let delivered = rx
//!     .try_iter()
//!     .filter(|e| matches!(e, OutputEvent::Buffer(_)))
//!     .count();
//! assert_eq!(delivered, 1);
//! ```

pub mod bridge;
pub mod clock;
mod coordinator;
pub mod descriptor;
pub mod error;
pub mod events;
pub mod format_plan;
pub mod formats;
mod graph;
pub mod names;
pub mod output;
pub mod pad;
mod stage;

pub use clock::{ClockTracker, Stamp};
pub use descriptor::MediaDescriptor;
pub use error::{ErrorKind, StageError};
pub use events::StageEvent;
pub use format_plan::{Conversion, FormatPlan};
pub use graph::{EXTRA_HW_FRAMES, GraphState};
pub use output::{OutputEvent, OutputSink};
pub use pad::{PadDirection, PadId, Wakeup};
pub use stage::FilterStage;
