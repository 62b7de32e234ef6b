// Slot atlas
//
// A fixed-capacity texture atlas: one GPU texture (a 2-D grid or a 2-D array) split into
// equally sized slots. Images are staged to the tile size, given a reusable slot id and
// written into the texture with partial uploads, never by reallocating the texture.

pub mod allocator;
pub mod layout;
pub mod stager;
pub mod texture;
pub mod uploader;

pub use allocator::SlotAllocator;
pub use layout::{AtlasLayout, LayoutMode, SlotLocation, UvRect};
pub use stager::{ImageStager, StagedImage};
pub use texture::AtlasTexture;
pub use uploader::GpuUploader;
