//! Pipeline-side media model for avgraph.
//!
//! This crate holds the types a pipeline stage exchanges with its neighbours:
//!
//! - [`FlowDef`]: an ordered attribute dictionary describing a stream
//!   (picture or sound, geometry, rates, colour metadata, latency)
//! - [`MediaBuffer`]: shared plane storage plus per-reference timing
//!   attributes and flags
//! - [`BufferAllocator`]: builds buffers and counts the live storages it
//!   handed out
//! - [`Clock`]: the system clock ticking at [`CLOCK_FREQ`]
//!
//! # Example
//!
//! ```rust
//! use avgraph_media::{BufferAllocator, FlowDef, PlaneLayout};
//!
//! let mut flow = FlowDef::picture();
//! flow.add_pic_plane(&PlaneLayout::new("y8", 1, 1, 1));
//! flow.set_hsize(4);
//! flow.set_vsize(2);
//!
//! let alloc = BufferAllocator::new();
//! let buffer = alloc.picture(4, 2, &flow.pic_planes().unwrap()).build();
//! assert_eq!(buffer.pic_size().unwrap(), (4, 2));
//! assert_eq!(alloc.live_buffers(), 1);
//! ```

pub mod alloc;
pub mod buffer;
pub mod clock;
pub mod error;
pub mod flow;
pub mod rational;

pub use alloc::{BufferAllocator, PictureBuilder, SoundBuilder};
pub use buffer::{BufferAttrs, MediaBuffer, PlaneSource, SourceLayout};
pub use clock::{CLOCK_FREQ, Clock, ManualClock, SystemClock};
pub use error::MediaError;
pub use flow::{Attr, FlowDef, MediaKind, PICTURE_DEF, PlaneLayout, SOUND_DEF};
pub use rational::Rational;
