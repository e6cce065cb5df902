//! Plane release accounting.
//!
//! One pipeline buffer can back several native planes. Each plane holds a
//! [`BridgedPlane`]; the buffer is unmapped and released when the last one
//! is dropped, whatever the drop order.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use avgraph_engine::PlaneBuffer;
use avgraph_media::MediaBuffer;
use bytes::Bytes;

use crate::error::StageError;

struct Slot {
    buffer: Option<MediaBuffer>,
    mapped: Vec<String>,
}

/// Shared counter of outstanding native planes for one pipeline buffer.
pub(crate) struct PlaneRelease {
    outstanding: AtomicUsize,
    slot: Mutex<Slot>,
}

impl PlaneRelease {
    /// Starts accounting for `buffer`, holding one builder reference.
    fn new(buffer: MediaBuffer) -> Arc<Self> {
        Arc::new(Self {
            outstanding: AtomicUsize::new(1),
            slot: Mutex::new(Slot {
                buffer: Some(buffer),
                mapped: Vec::new(),
            }),
        })
    }

    fn acquire(&self) {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
    }

    fn release(&self) {
        if self.outstanding.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        let (buffer, mapped) = {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            (slot.buffer.take(), std::mem::take(&mut slot.mapped))
        };
        if let Some(buffer) = buffer {
            for name in &mapped {
                let _ = buffer.unmap_plane(name);
            }
            tracing::trace!(planes = mapped.len(), "bridge_release: buffer released");
        }
    }

    /// Still-held buffer, shared with fresh attributes.
    pub(crate) fn share_buffer(&self) -> Option<MediaBuffer> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.buffer.as_ref().map(MediaBuffer::share)
    }

    fn mapped_count(&self) -> usize {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .mapped
            .len()
    }
}

/// Owning reference on a [`PlaneRelease`].
struct ReleaseGuard(Arc<PlaneRelease>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// Native plane memory borrowed from a pipeline buffer.
///
/// Dropping the last plane of a buffer unmaps every plane that was mapped
/// for it and releases the buffer.
pub struct BridgedPlane {
    data: Bytes,
    guard: ReleaseGuard,
}

impl BridgedPlane {
    pub(crate) fn release(&self) -> &Arc<PlaneRelease> {
        &self.guard.0
    }
}

impl fmt::Debug for BridgedPlane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgedPlane")
            .field("len", &self.data.len())
            .finish_non_exhaustive()
    }
}

impl PlaneBuffer for BridgedPlane {
    fn bytes(&self) -> &[u8] {
        &self.data
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Maps planes of one buffer into [`BridgedPlane`]s.
///
/// The builder keeps its own reference until it is dropped, so a failure
/// halfway releases the buffer exactly once together with the planes
/// already handed out.
pub(crate) struct PlaneMapper {
    guard: ReleaseGuard,
}

impl PlaneMapper {
    pub(crate) fn new(buffer: MediaBuffer) -> Self {
        Self {
            guard: ReleaseGuard(PlaneRelease::new(buffer)),
        }
    }

    /// Maps plane `name` and wraps it.
    pub(crate) fn map(&self, name: &str) -> Result<BridgedPlane, StageError> {
        let state = &self.guard.0;
        let data = {
            let mut slot = state.slot.lock().unwrap_or_else(PoisonError::into_inner);
            let buffer = slot
                .buffer
                .as_ref()
                .ok_or_else(|| StageError::invalid("buffer already released"))?;
            let data = buffer.map_plane(name)?;
            slot.mapped.push(name.to_string());
            data
        };
        state.acquire();
        Ok(BridgedPlane {
            data,
            guard: ReleaseGuard(Arc::clone(state)),
        })
    }
}

/// The buffer every plane of `planes` was mapped from, when they all come
/// from one buffer and cover every plane mapped for it.
pub(crate) fn common_buffer<'a>(
    mut planes: impl Iterator<Item = &'a BridgedPlane>,
    count: usize,
) -> Option<MediaBuffer> {
    let first = planes.next()?.release();
    if !planes.all(|p| Arc::ptr_eq(p.release(), first)) || first.mapped_count() != count {
        return None;
    }
    first.share_buffer()
}

#[cfg(test)]
mod tests {
    use super::*;
    use avgraph_media::{BufferAllocator, PlaneLayout};

    fn three_planes(alloc: &BufferAllocator) -> MediaBuffer {
        alloc
            .picture(
                4,
                4,
                &[
                    PlaneLayout::new("y8", 1, 1, 1),
                    PlaneLayout::new("u8", 2, 2, 1),
                    PlaneLayout::new("v8", 2, 2, 1),
                ],
            )
            .build()
    }

    #[test]
    fn buffer_released_after_last_plane() {
        let alloc = BufferAllocator::new();
        let buffer = three_planes(&alloc);
        let probe = buffer.clone();
        let mapper = PlaneMapper::new(buffer);
        let y = mapper.map("y8").unwrap();
        let u = mapper.map("u8").unwrap();
        let v = mapper.map("v8").unwrap();
        drop(mapper);
        assert_eq!(probe.mapped_count("y8"), 1);

        drop(u);
        drop(y);
        assert_eq!(probe.mapped_count("y8"), 1);
        assert_eq!(probe.mapped_count("v8"), 1);
        drop(v);
        assert_eq!(probe.mapped_count("y8"), 0);
        assert_eq!(probe.mapped_count("u8"), 0);
        assert_eq!(probe.mapped_count("v8"), 0);

        drop(probe);
        assert_eq!(alloc.live_buffers(), 0);
    }

    #[test]
    fn failed_mapping_releases_the_buffer() {
        let alloc = BufferAllocator::new();
        let mapper = PlaneMapper::new(three_planes(&alloc));
        let y = mapper.map("y8").unwrap();
        assert!(mapper.map("a8").is_err());
        drop(mapper);
        assert_eq!(alloc.live_buffers(), 1);
        drop(y);
        assert_eq!(alloc.live_buffers(), 0);
    }

    #[test]
    fn common_buffer_needs_every_plane() {
        let alloc = BufferAllocator::new();
        let mapper = PlaneMapper::new(three_planes(&alloc));
        let planes = [
            mapper.map("y8").unwrap(),
            mapper.map("u8").unwrap(),
            mapper.map("v8").unwrap(),
        ];
        assert!(common_buffer(planes.iter(), 3).is_some());
        assert!(common_buffer(planes[..2].iter(), 2).is_none());
    }
}
