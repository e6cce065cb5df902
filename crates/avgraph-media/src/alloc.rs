//! Buffer allocation.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::BytesMut;

use crate::buffer::{LiveToken, MediaBuffer, PicPlane, PlaneSource, SoundPlane, Storage, StorageData};
use crate::flow::PlaneLayout;

/// Creates media buffers and tracks how many storages are still alive.
///
/// Clones share the live counter.
#[derive(Debug, Clone, Default)]
pub struct BufferAllocator {
    live: Arc<AtomicUsize>,
}

impl BufferAllocator {
    /// Creates an allocator with no live buffers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of storages created here and not yet released.
    pub fn live_buffers(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    fn token(&self) -> LiveToken {
        self.live.fetch_add(1, Ordering::AcqRel);
        LiveToken(Arc::clone(&self.live))
    }

    /// Starts a zero-filled picture with the given planes.
    pub fn picture(&self, hsize: usize, vsize: usize, planes: &[PlaneLayout]) -> PictureBuilder {
        PictureBuilder {
            alloc: self.clone(),
            hsize,
            vsize,
            planes: planes
                .iter()
                .map(|layout| {
                    let stride = layout.stride(hsize);
                    let data = BytesMut::zeroed(stride * layout.rows(vsize));
                    (layout.clone(), stride, data)
                })
                .collect(),
        }
    }

    /// Starts zero-filled sound with `samples` samples per plane.
    pub fn sound(&self, samples: usize, sample_size: usize, planes: &[&str]) -> SoundBuilder {
        SoundBuilder {
            alloc: self.clone(),
            samples,
            sample_size,
            planes: planes
                .iter()
                .map(|name| ((*name).to_string(), BytesMut::zeroed(samples * sample_size)))
                .collect(),
        }
    }

    /// Wraps externally owned planes without copying them.
    pub fn wrap(&self, source: Arc<dyn PlaneSource>) -> MediaBuffer {
        let layout = source.layout();
        MediaBuffer::from_storage(Storage::new(
            StorageData::External { source, layout },
            Some(self.token()),
        ))
    }
}

/// Writable picture under construction.
#[derive(Debug)]
pub struct PictureBuilder {
    alloc: BufferAllocator,
    hsize: usize,
    vsize: usize,
    planes: Vec<(PlaneLayout, usize, BytesMut)>,
}

impl PictureBuilder {
    /// Stride in bytes of a plane.
    pub fn stride(&self, chroma: &str) -> Option<usize> {
        self.planes
            .iter()
            .find(|(l, _, _)| l.chroma == chroma)
            .map(|(_, stride, _)| *stride)
    }

    /// Writable bytes of a plane.
    pub fn plane_mut(&mut self, chroma: &str) -> Option<&mut [u8]> {
        self.planes
            .iter_mut()
            .find(|(l, _, _)| l.chroma == chroma)
            .map(|(_, _, data)| &mut data[..])
    }

    /// Freezes the planes into a shared buffer.
    pub fn build(self) -> MediaBuffer {
        let planes = self
            .planes
            .into_iter()
            .map(|(layout, stride, data)| PicPlane {
                layout,
                stride,
                data: data.freeze(),
            })
            .collect();
        MediaBuffer::from_storage(Storage::new(
            StorageData::Picture {
                hsize: self.hsize,
                vsize: self.vsize,
                planes,
            },
            Some(self.alloc.token()),
        ))
    }
}

/// Writable sound under construction.
#[derive(Debug)]
pub struct SoundBuilder {
    alloc: BufferAllocator,
    samples: usize,
    sample_size: usize,
    planes: Vec<(String, BytesMut)>,
}

impl SoundBuilder {
    /// Writable bytes of a plane.
    pub fn plane_mut(&mut self, name: &str) -> Option<&mut [u8]> {
        self.planes
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, data)| &mut data[..])
    }

    /// Freezes the planes into a shared buffer.
    pub fn build(self) -> MediaBuffer {
        let planes = self
            .planes
            .into_iter()
            .map(|(name, data)| SoundPlane {
                name,
                data: data.freeze(),
            })
            .collect();
        MediaBuffer::from_storage(Storage::new(
            StorageData::Sound {
                samples: self.samples,
                sample_size: self.sample_size,
                planes,
            },
            Some(self.alloc.token()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sizes_planes_from_layout() {
        let alloc = BufferAllocator::new();
        let mut b = alloc.picture(
            6,
            4,
            &[PlaneLayout::new("y8", 1, 1, 1), PlaneLayout::new("u8v8", 2, 2, 2)],
        );
        assert_eq!(b.stride("y8"), Some(6));
        assert_eq!(b.stride("u8v8"), Some(6));
        assert_eq!(b.plane_mut("u8v8").unwrap().len(), 12);
        assert!(b.plane_mut("v8").is_none());
        let buf = b.build();
        assert_eq!(buf.plane("y8").unwrap().len(), 24);
    }

    #[test]
    fn live_count_tracks_storages_not_handles() {
        let alloc = BufferAllocator::new();
        let a = alloc.sound(8, 4, &["lr"]).build();
        let b = a.clone();
        let c = alloc.sound(8, 4, &["lr"]).build();
        assert_eq!(alloc.live_buffers(), 2);
        drop((a, c));
        assert_eq!(alloc.live_buffers(), 1);
        drop(b);
        assert_eq!(alloc.live_buffers(), 0);
    }

    #[test]
    fn unbuilt_builder_leaks_nothing() {
        let alloc = BufferAllocator::new();
        let b = alloc.picture(2, 2, &[PlaneLayout::new("y8", 1, 1, 1)]);
        drop(b);
        assert_eq!(alloc.live_buffers(), 0);
    }
}
