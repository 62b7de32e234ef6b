//! Fixed-capacity texture atlas.
//!
//! One GPU texture, either a square 2-D grid of tiles or a 2-D array with one tile per layer,
//! is divided into slots. [`AtlasTexture::add_image`] stages an image to the tile size, gives
//! it a slot id and writes it into the texture with a partial upload;
//! [`AtlasTexture::remove_image`] blanks the slot and hands the id back for reuse. The GPU is
//! reached only through the [`GraphicsDevice`] trait, implemented for `wgpu` by
//! [`WgpuDevice`] and in memory by [`RecordingDevice`].

pub mod atlas;
pub mod config;
pub mod device;
pub mod error;
pub mod logging;
pub mod settings;
pub mod utils;

pub use atlas::{AtlasLayout, AtlasTexture, LayoutMode, SlotLocation, UvRect};
pub use config::AtlasConfig;
pub use device::{GraphicsDevice, RecordingDevice, TextureId, WgpuDevice};
pub use error::{AtlasError, DeviceError, Result};
pub use settings::UserSettings;
