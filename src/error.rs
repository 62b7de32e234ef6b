use thiserror::Error;

use crate::device::TextureId;

pub type Result<T> = std::result::Result<T, AtlasError>;

#[derive(Debug, Error)]
pub enum AtlasError {
    #[error("atlas is full ({capacity} slots in use)")]
    AtlasFull { capacity: u32 },

    #[error("image has zero area ({width}x{height})")]
    InvalidImage { width: u32, height: u32 },

    #[error("slot {0} released twice")]
    DoubleRelease(u32),

    #[error("slot {0} is not live")]
    InvalidSlot(u32),

    #[error("failed to allocate the atlas texture")]
    GpuResourceInit(#[source] DeviceError),

    #[error("device rejected slot upload")]
    Upload(#[from] DeviceError),

    #[error("failed to bind the atlas texture")]
    Bind(#[source] DeviceError),

    #[error("invalid atlas configuration: {0}")]
    InvalidConfig(String),
}

/// Failures reported by a [`GraphicsDevice`](crate::device::GraphicsDevice).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("no adapter available")]
    NoAdapter,

    #[error("device request failed: {0}")]
    RequestDevice(String),

    #[error("unknown texture {0:?}")]
    UnknownTexture(TextureId),

    #[error("texture {0:?} bound with the wrong target")]
    TargetMismatch(TextureId),

    #[error("no texture bound to unit {0}")]
    NothingBound(u32),

    #[error("texture {0:?} has no storage")]
    NotAllocated(TextureId),

    #[error("texture {0:?} already has storage")]
    AlreadyAllocated(TextureId),

    #[error("allocation refused: {0}")]
    AllocationRefused(String),

    #[error("{what} of {requested} exceeds device limit {limit}")]
    LimitExceeded {
        what: &'static str,
        requested: u32,
        limit: u32,
    },

    #[error("upload region {x},{y},{z} {width}x{height}x{depth} is outside the texture")]
    OutOfBounds {
        x: u32,
        y: u32,
        z: u32,
        width: u32,
        height: u32,
        depth: u32,
    },

    #[error("pixel buffer holds {actual} bytes, region needs {expected}")]
    PixelBufferTooSmall { expected: usize, actual: usize },

    #[error("unsupported unpack alignment {0}")]
    BadAlignment(u32),
}
