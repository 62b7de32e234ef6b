use image::RgbaImage;

#[allow(unused_imports)]
use log::{debug, info, warn};

use crate::atlas::{AtlasLayout, GpuUploader, ImageStager, SlotAllocator, UvRect};
use crate::config::AtlasConfig;
use crate::device::{GraphicsDevice, SamplingPolicy, TextureId};
use crate::error::{AtlasError, Result};

/// A fixed-capacity atlas over a single GPU texture.
///
/// The texture is allocated on first use and never resized. `add_image` stages an image to
/// the tile size, assigns it a slot and uploads it in place; `remove_image` blanks the slot
/// and returns its id to the pool. Every call that touches the GPU takes the device
/// explicitly.
#[derive(Debug)]
pub struct AtlasTexture {
    config: AtlasConfig,
    layout: AtlasLayout,
    allocator: SlotAllocator,
    stager: ImageStager,
    uploader: GpuUploader,
    texture: Option<TextureId>,
    // Created but not yet given storage; reused when init is retried
    pending: Option<TextureId>,
}

impl AtlasTexture {
    pub fn new(config: AtlasConfig) -> Result<Self> {
        config.validate()?;

        let layout = AtlasLayout::new(config.layout_mode(), config.tile_resolution);
        let allocator = SlotAllocator::new(layout.capacity());
        let stager = ImageStager::new(config.tile_resolution, config.clear_color);
        let uploader = GpuUploader::new(
            config.texture_unit,
            config.premultiply_alpha,
            config.unpack_alignment,
        );

        info!(
            "Creating atlas: {:?}, tile {}px, {} slots",
            layout.mode(),
            config.tile_resolution,
            layout.capacity()
        );

        Ok(Self {
            config,
            layout,
            allocator,
            stager,
            uploader,
            texture: None,
            pending: None,
        })
    }

    /// Allocate the GPU texture if it does not exist yet.
    pub fn init<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D) -> Result<TextureId> {
        if let Some(texture) = self.texture {
            return Ok(texture);
        }

        let kind = self.layout.texture_kind();
        let extent = self.layout.storage_extent();

        let texture = match self.pending {
            Some(texture) => texture,
            None => {
                let texture = device
                    .create_texture(kind)
                    .map_err(AtlasError::GpuResourceInit)?;
                self.pending = Some(texture);
                texture
            }
        };
        self.uploader
            .prepare(device, kind, texture)
            .map_err(AtlasError::GpuResourceInit)?;
        device
            .set_sampling(kind, SamplingPolicy::ATLAS)
            .map_err(AtlasError::GpuResourceInit)?;
        device
            .allocate_storage(kind, extent)
            .map_err(AtlasError::GpuResourceInit)?;

        info!(
            "Allocated atlas texture {:?}: {}x{}x{}",
            texture, extent.width, extent.height, extent.depth
        );
        self.pending = None;
        self.texture = Some(texture);
        Ok(texture)
    }

    /// Insert `image`, returning its slot id and UV rectangle.
    pub fn add_image<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        image: &RgbaImage,
    ) -> Result<(u32, UvRect)> {
        let texture = self.init(device)?;

        let staged = self.stager.stage(image)?;
        let id = self.allocator.acquire()?;
        let location = self.layout.location(id)?;

        if let Err(e) = self.uploader.upload(device, texture, location, &staged) {
            self.allocator.release(id)?;
            return Err(e.into());
        }

        let uv = self.layout.uv_rect(id, staged.width, staged.height)?;
        debug!(
            "Atlas: slot {id} <- {}x{} (staged {}x{}), uv {:?}",
            image.width(),
            image.height(),
            staged.width,
            staged.height,
            uv.to_array()
        );
        Ok((id, uv))
    }

    /// Clear slot `id` on the GPU and return it to the pool.
    pub fn remove_image<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        id: u32,
    ) -> Result<()> {
        if !self.allocator.is_live(id) {
            return Err(AtlasError::InvalidSlot(id));
        }
        let texture = self.texture.ok_or(AtlasError::InvalidSlot(id))?;
        let location = self.layout.location(id)?;

        let blank = self.stager.blank_tile();
        self.uploader.upload(device, texture, location, &blank)?;
        self.allocator.release(id)?;

        debug!("Atlas: cleared slot {id} ({} live)", self.allocator.live_count());
        Ok(())
    }

    /// Whole-texture re-uploads are not supported; slots are only ever written one at a time.
    pub fn mark_full_reupload(&self) {
        warn!(
            "mark_full_reupload called on an atlas texture; ignored, slots are uploaded individually"
        );
    }

    /// Bind the atlas texture to its unit for sampling, allocating it first if needed.
    pub fn bind<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D) -> Result<TextureId> {
        let texture = self.init(device)?;
        device
            .bind_texture(self.uploader.unit(), self.layout.texture_kind(), texture)
            .map_err(AtlasError::Bind)?;
        Ok(texture)
    }

    pub fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    pub fn is_initialized(&self) -> bool {
        self.texture.is_some()
    }

    pub fn sampling(&self) -> SamplingPolicy {
        SamplingPolicy::ATLAS
    }

    pub fn layout(&self) -> &AtlasLayout {
        &self.layout
    }

    pub fn config(&self) -> &AtlasConfig {
        &self.config
    }

    pub fn capacity(&self) -> u32 {
        self.layout.capacity()
    }

    pub fn live_count(&self) -> u32 {
        self.allocator.live_count()
    }

    pub fn is_live(&self, id: u32) -> bool {
        self.allocator.is_live(id)
    }
}
