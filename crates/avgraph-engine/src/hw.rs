//! Hardware device and frame-pool contexts.

use core::fmt;
use std::sync::Arc;

use crate::format::PixelFormat;

/// Kinds of hardware acceleration device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HwDeviceType {
    /// VA-API.
    Vaapi,
    /// NVIDIA CUDA.
    Cuda,
    /// Intel Quick Sync.
    Qsv,
    /// VDPAU.
    Vdpau,
    /// Apple VideoToolbox.
    VideoToolbox,
    /// Direct3D 11.
    D3d11va,
    /// DRM/KMS.
    Drm,
    /// OpenCL.
    OpenCl,
    /// Vulkan.
    Vulkan,
}

impl HwDeviceType {
    /// Every device type.
    pub const ALL: [HwDeviceType; 9] = [
        HwDeviceType::Vaapi,
        HwDeviceType::Cuda,
        HwDeviceType::Qsv,
        HwDeviceType::Vdpau,
        HwDeviceType::VideoToolbox,
        HwDeviceType::D3d11va,
        HwDeviceType::Drm,
        HwDeviceType::OpenCl,
        HwDeviceType::Vulkan,
    ];

    /// Canonical name.
    pub fn name(self) -> &'static str {
        match self {
            HwDeviceType::Vaapi => "vaapi",
            HwDeviceType::Cuda => "cuda",
            HwDeviceType::Qsv => "qsv",
            HwDeviceType::Vdpau => "vdpau",
            HwDeviceType::VideoToolbox => "videotoolbox",
            HwDeviceType::D3d11va => "d3d11va",
            HwDeviceType::Drm => "drm",
            HwDeviceType::OpenCl => "opencl",
            HwDeviceType::Vulkan => "vulkan",
        }
    }

    /// Looks a device type up by name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }
}

impl fmt::Display for HwDeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug)]
struct DeviceInner {
    kind: HwDeviceType,
    device: Option<String>,
}

/// Shared handle on an opened hardware device.
///
/// Clones refer to the same device; equality is identity.
#[derive(Debug, Clone)]
pub struct HwDevice(Arc<DeviceInner>);

impl HwDevice {
    /// Wraps an opened device. Engines call this once the device is open.
    pub fn new(kind: HwDeviceType, device: Option<&str>) -> Self {
        Self(Arc::new(DeviceInner {
            kind,
            device: device.map(str::to_string),
        }))
    }

    /// Device type.
    pub fn kind(&self) -> HwDeviceType {
        self.0.kind
    }

    /// Device path or name it was opened with.
    pub fn device(&self) -> Option<&str> {
        self.0.device.as_deref()
    }
}

impl PartialEq for HwDevice {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for HwDevice {}

#[derive(Debug)]
struct FramesInner {
    device: HwDevice,
    format: PixelFormat,
    sw_format: PixelFormat,
    width: u32,
    height: u32,
}

/// Shared handle on a pool of hardware frames.
#[derive(Debug, Clone)]
pub struct HwFrames(Arc<FramesInner>);

impl HwFrames {
    /// Describes a frame pool on `device`.
    pub fn new(
        device: HwDevice,
        format: PixelFormat,
        sw_format: PixelFormat,
        width: u32,
        height: u32,
    ) -> Self {
        Self(Arc::new(FramesInner {
            device,
            format,
            sw_format,
            width,
            height,
        }))
    }

    /// Device the pool lives on.
    pub fn device(&self) -> &HwDevice {
        &self.0.device
    }

    /// Hardware pixel format of the surfaces.
    pub fn format(&self) -> PixelFormat {
        self.0.format
    }

    /// Software layout of the surface contents.
    pub fn sw_format(&self) -> PixelFormat {
        self.0.sw_format
    }

    /// Surface size.
    pub fn size(&self) -> (u32, u32) {
        (self.0.width, self.0.height)
    }
}

impl PartialEq for HwFrames {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for HwFrames {}
