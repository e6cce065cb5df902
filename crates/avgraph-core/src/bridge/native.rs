//! Pipeline buffers backed by engine frames.

use std::any::Any;

use avgraph_engine::NativeFrame;
use avgraph_media::{PlaneSource, SourceLayout};

/// A [`PlaneSource`] over the planes of a [`NativeFrame`].
///
/// Keeps the frame (and so its plane references) alive for as long as any
/// pipeline buffer wraps it. Hardware frames have no planes.
pub struct NativeBacked {
    frame: NativeFrame,
    layout: SourceLayout,
}

impl NativeBacked {
    pub(crate) fn new(frame: NativeFrame, layout: SourceLayout) -> Self {
        Self { frame, layout }
    }

    /// The wrapped frame.
    pub fn frame(&self) -> &NativeFrame {
        &self.frame
    }
}

impl PlaneSource for NativeBacked {
    fn layout(&self) -> SourceLayout {
        self.layout.clone()
    }

    fn plane_bytes(&self, index: usize) -> Option<&[u8]> {
        self.frame.planes.get(index).map(|p| p.data.bytes())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
