//! Reference-counted media buffers.
//!
//! A [`MediaBuffer`] is a cheap handle: cloning it shares the plane storage
//! and copies the per-reference [`BufferAttrs`]. The storage is released
//! when the last handle sharing it is dropped.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use bytes::Bytes;

use crate::error::MediaError;
use crate::flow::{MediaKind, PlaneLayout};

/// Per-reference timing attributes and flags.
///
/// Timestamps are in [`crate::CLOCK_FREQ`] ticks; `None` means unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferAttrs {
    /// Timestamp as produced by the source, before any continuity repair.
    pub pts_orig: Option<u64>,
    /// Program (content-relative) timestamp.
    pub pts_prog: Option<u64>,
    /// System (wall-clock) timestamp.
    pub pts_sys: Option<u64>,
    /// Duration in ticks.
    pub duration: Option<u64>,
    /// Progressive picture.
    pub progressive: bool,
    /// Top field first (interlaced pictures).
    pub tff: bool,
    /// Random access point.
    pub key: bool,
}

/// Plane geometry of an external source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLayout {
    /// Picture planes with their strides.
    Picture {
        /// Width in pixels.
        hsize: usize,
        /// Height in lines.
        vsize: usize,
        /// Planes and their strides in bytes.
        planes: Vec<(PlaneLayout, usize)>,
    },
    /// Sound planes.
    Sound {
        /// Samples per plane.
        samples: usize,
        /// Bytes per sample in one plane.
        sample_size: usize,
        /// Plane names.
        planes: Vec<String>,
    },
}

/// Memory owned outside the pipeline that can back a [`MediaBuffer`].
///
/// Plane indices follow the order of [`SourceLayout`] planes. The returned
/// slices must stay valid and unchanged for the lifetime of the source.
pub trait PlaneSource: Send + Sync + 'static {
    /// Plane geometry.
    fn layout(&self) -> SourceLayout;

    /// Bytes of plane `index`.
    fn plane_bytes(&self, index: usize) -> Option<&[u8]>;

    /// Downcasting hook, used to recognise sources this workspace created.
    fn as_any(&self) -> &dyn Any;
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub(crate) struct PicPlane {
    pub(crate) layout: PlaneLayout,
    pub(crate) stride: usize,
    pub(crate) data: Bytes,
}

#[derive(Debug)]
pub(crate) struct SoundPlane {
    pub(crate) name: String,
    pub(crate) data: Bytes,
}

pub(crate) enum StorageData {
    Picture {
        hsize: usize,
        vsize: usize,
        planes: Vec<PicPlane>,
    },
    Sound {
        samples: usize,
        sample_size: usize,
        planes: Vec<SoundPlane>,
    },
    External {
        source: Arc<dyn PlaneSource>,
        layout: SourceLayout,
    },
}

/// Decrements the allocator's live counter when dropped.
#[derive(Debug)]
pub(crate) struct LiveToken(pub(crate) Arc<AtomicUsize>);

impl Drop for LiveToken {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

pub(crate) struct Storage {
    data: StorageData,
    maps: Vec<AtomicU32>,
    _live: Option<LiveToken>,
}

impl Storage {
    pub(crate) fn new(data: StorageData, live: Option<LiveToken>) -> Self {
        let n = match &data {
            StorageData::Picture { planes, .. } => planes.len(),
            StorageData::Sound { planes, .. } => planes.len(),
            StorageData::External { layout, .. } => match layout {
                SourceLayout::Picture { planes, .. } => planes.len(),
                SourceLayout::Sound { planes, .. } => planes.len(),
            },
        };
        Self {
            data,
            maps: (0..n).map(|_| AtomicU32::new(0)).collect(),
            _live: live,
        }
    }

    fn plane_index(&self, name: &str) -> Option<usize> {
        match &self.data {
            StorageData::Picture { planes, .. } => {
                planes.iter().position(|p| p.layout.chroma == name)
            }
            StorageData::Sound { planes, .. } => planes.iter().position(|p| p.name == name),
            StorageData::External { layout, .. } => match layout {
                SourceLayout::Picture { planes, .. } => {
                    planes.iter().position(|(p, _)| p.chroma == name)
                }
                SourceLayout::Sound { planes, .. } => planes.iter().position(|p| p == name),
            },
        }
    }

    fn kind(&self) -> MediaKind {
        match &self.data {
            StorageData::Picture { .. } => MediaKind::Picture,
            StorageData::Sound { .. } => MediaKind::Sound,
            StorageData::External { layout, .. } => match layout {
                SourceLayout::Picture { .. } => MediaKind::Picture,
                SourceLayout::Sound { .. } => MediaKind::Sound,
            },
        }
    }
}

/// Owner handed to [`Bytes::from_owner`] so external planes map without copying.
struct ExternalPlane {
    source: Arc<dyn PlaneSource>,
    index: usize,
}

impl AsRef<[u8]> for ExternalPlane {
    fn as_ref(&self) -> &[u8] {
        self.source.plane_bytes(self.index).unwrap_or(&[])
    }
}

// ---------------------------------------------------------------------------
// MediaBuffer
// ---------------------------------------------------------------------------

/// Shared media storage plus per-reference attributes.
#[derive(Clone, Default)]
pub struct MediaBuffer {
    storage: Option<Arc<Storage>>,
    /// Timing attributes and flags of this reference.
    pub attrs: BufferAttrs,
}

impl fmt::Debug for MediaBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaBuffer")
            .field("kind", &self.kind())
            .field("attrs", &self.attrs)
            .finish_non_exhaustive()
    }
}

impl MediaBuffer {
    pub(crate) fn from_storage(storage: Storage) -> Self {
        Self {
            storage: Some(Arc::new(storage)),
            attrs: BufferAttrs::default(),
        }
    }

    fn storage(&self) -> Result<&Storage, MediaError> {
        self.storage.as_deref().ok_or(MediaError::NoStorage)
    }

    /// A new handle on the same storage with default attributes.
    pub fn share(&self) -> MediaBuffer {
        MediaBuffer {
            storage: self.storage.clone(),
            attrs: BufferAttrs::default(),
        }
    }

    /// Returns `true` when both handles share one storage.
    pub fn same_storage(&self, other: &MediaBuffer) -> bool {
        match (&self.storage, &other.storage) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Drops this handle's reference to the storage, keeping the attributes.
    pub fn detach_storage(&mut self) {
        self.storage = None;
    }

    /// Kind of media held, `None` once detached.
    pub fn kind(&self) -> Option<MediaKind> {
        self.storage.as_deref().map(Storage::kind)
    }

    /// The external source backing this buffer, if any.
    pub fn external_source(&self) -> Option<&Arc<dyn PlaneSource>> {
        match &self.storage.as_deref()?.data {
            StorageData::External { source, .. } => Some(source),
            _ => None,
        }
    }

    // -- pictures ------------------------------------------------------------

    /// Picture width and height.
    pub fn pic_size(&self) -> Result<(usize, usize), MediaError> {
        match &self.storage()?.data {
            StorageData::Picture { hsize, vsize, .. }
            | StorageData::External {
                layout: SourceLayout::Picture { hsize, vsize, .. },
                ..
            } => Ok((*hsize, *vsize)),
            _ => Err(MediaError::WrongKind("picture")),
        }
    }

    /// Picture planes with their strides, in storage order.
    pub fn pic_planes(&self) -> Result<Vec<(PlaneLayout, usize)>, MediaError> {
        match &self.storage()?.data {
            StorageData::Picture { planes, .. } => Ok(planes
                .iter()
                .map(|p| (p.layout.clone(), p.stride))
                .collect()),
            StorageData::External {
                layout: SourceLayout::Picture { planes, .. },
                ..
            } => Ok(planes.clone()),
            _ => Err(MediaError::WrongKind("picture")),
        }
    }

    // -- sound ---------------------------------------------------------------

    /// Samples per plane.
    pub fn sound_samples(&self) -> Result<usize, MediaError> {
        match &self.storage()?.data {
            StorageData::Sound { samples, .. }
            | StorageData::External {
                layout: SourceLayout::Sound { samples, .. },
                ..
            } => Ok(*samples),
            _ => Err(MediaError::WrongKind("sound")),
        }
    }

    /// Bytes per sample in one plane.
    pub fn sound_sample_size(&self) -> Result<usize, MediaError> {
        match &self.storage()?.data {
            StorageData::Sound { sample_size, .. }
            | StorageData::External {
                layout: SourceLayout::Sound { sample_size, .. },
                ..
            } => Ok(*sample_size),
            _ => Err(MediaError::WrongKind("sound")),
        }
    }

    /// Sound plane names, in storage order.
    pub fn sound_planes(&self) -> Result<Vec<String>, MediaError> {
        match &self.storage()?.data {
            StorageData::Sound { planes, .. } => {
                Ok(planes.iter().map(|p| p.name.clone()).collect())
            }
            StorageData::External {
                layout: SourceLayout::Sound { planes, .. },
                ..
            } => Ok(planes.clone()),
            _ => Err(MediaError::WrongKind("sound")),
        }
    }

    // -- plane access --------------------------------------------------------

    /// Borrows the bytes of a plane without mapping it.
    pub fn plane(&self, name: &str) -> Result<&[u8], MediaError> {
        let storage = self.storage()?;
        let index = storage
            .plane_index(name)
            .ok_or_else(|| MediaError::NoSuchPlane(name.to_string()))?;
        let bytes = match &storage.data {
            StorageData::Picture { planes, .. } => Some(&planes[index].data[..]),
            StorageData::Sound { planes, .. } => Some(&planes[index].data[..]),
            StorageData::External { source, .. } => source.plane_bytes(index),
        };
        bytes.ok_or_else(|| MediaError::NoSuchPlane(name.to_string()))
    }

    /// Maps a plane read-only and returns a shared view of its bytes.
    ///
    /// Every successful call must be paired with [`MediaBuffer::unmap_plane`]
    /// or [`MediaBuffer::unmap_all`].
    pub fn map_plane(&self, name: &str) -> Result<Bytes, MediaError> {
        let storage = self.storage()?;
        let index = storage
            .plane_index(name)
            .ok_or_else(|| MediaError::NoSuchPlane(name.to_string()))?;
        let bytes = match &storage.data {
            StorageData::Picture { planes, .. } => planes[index].data.clone(),
            StorageData::Sound { planes, .. } => planes[index].data.clone(),
            StorageData::External { source, .. } => Bytes::from_owner(ExternalPlane {
                source: Arc::clone(source),
                index,
            }),
        };
        storage.maps[index].fetch_add(1, Ordering::AcqRel);
        Ok(bytes)
    }

    /// Releases one mapping of a plane.
    pub fn unmap_plane(&self, name: &str) -> Result<(), MediaError> {
        let storage = self.storage()?;
        let index = storage
            .plane_index(name)
            .ok_or_else(|| MediaError::NoSuchPlane(name.to_string()))?;
        let _ = storage.maps[index].fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
            n.checked_sub(1)
        });
        Ok(())
    }

    /// Releases one mapping of every plane that is mapped.
    pub fn unmap_all(&self) {
        if let Some(storage) = self.storage.as_deref() {
            for count in &storage.maps {
                let _ = count.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                    n.checked_sub(1)
                });
            }
        }
    }

    /// Number of outstanding mappings of a plane (zero for unknown planes).
    pub fn mapped_count(&self, name: &str) -> u32 {
        self.storage
            .as_deref()
            .and_then(|s| s.plane_index(name).map(|i| s.maps[i].load(Ordering::Acquire)))
            .unwrap_or(0)
    }
}
