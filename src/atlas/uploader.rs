use std::borrow::Cow;

#[allow(unused_imports)]
use log::{debug, trace};

use crate::atlas::{SlotLocation, StagedImage};
use crate::device::{
    GraphicsDevice, Region2d, Region3d, TextureId, TextureKind, UnpackParams, BYTES_PER_PIXEL,
};
use crate::error::DeviceError;

/// Issues the bind / unpack / partial-upload sequence for one slot.
#[derive(Debug, Clone, Copy)]
pub struct GpuUploader {
    unit: u32,
    unpack: UnpackParams,
}

impl GpuUploader {
    pub fn new(unit: u32, premultiply_alpha: bool, alignment: u32) -> Self {
        Self {
            unit,
            unpack: UnpackParams {
                flip_y: false,
                premultiply_alpha,
                alignment,
            },
        }
    }

    pub fn unit(&self) -> u32 {
        self.unit
    }

    pub fn unpack(&self) -> UnpackParams {
        self.unpack
    }

    /// Bind `texture` to the atlas unit and set the unpack state.
    pub fn prepare<D: GraphicsDevice + ?Sized>(
        &self,
        device: &mut D,
        kind: TextureKind,
        texture: TextureId,
    ) -> Result<(), DeviceError> {
        device.bind_texture(self.unit, kind, texture)?;
        device.set_unpack(self.unpack)
    }

    pub fn upload<D: GraphicsDevice + ?Sized>(
        &self,
        device: &mut D,
        texture: TextureId,
        location: SlotLocation,
        staged: &StagedImage<'_>,
    ) -> Result<(), DeviceError> {
        let kind = match location {
            SlotLocation::Grid { .. } => TextureKind::D2,
            SlotLocation::Layer(_) => TextureKind::D2Array,
        };
        self.prepare(device, kind, texture)?;

        let pixels = self.align_rows(staged);
        match location {
            SlotLocation::Layer(z) => {
                trace!("GpuUploader: {}x{} into layer {z}", staged.width, staged.height);
                device.sub_upload_3d(
                    Region3d {
                        x: 0,
                        y: 0,
                        z,
                        width: staged.width,
                        height: staged.height,
                        depth: 1,
                    },
                    &pixels,
                )
            }
            SlotLocation::Grid { x, y } => {
                trace!("GpuUploader: {}x{} at ({x}, {y})", staged.width, staged.height);
                device.sub_upload_2d(
                    Region2d {
                        x,
                        y,
                        width: staged.width,
                        height: staged.height,
                    },
                    &pixels,
                )
            }
        }
    }

    /// Staged pixels are tightly packed; pad each row out to the unpack alignment.
    fn align_rows<'a>(&self, staged: &StagedImage<'a>) -> Cow<'a, [u8]> {
        let tight = staged.width as usize * BYTES_PER_PIXEL;
        let stride = self.unpack.row_stride(staged.width);
        if stride == tight {
            return Cow::Borrowed(staged.pixels);
        }

        let mut padded = vec![0; stride * staged.height as usize];
        for (dst, src) in padded
            .chunks_exact_mut(stride)
            .zip(staged.pixels.chunks_exact(tight))
        {
            dst[..tight].copy_from_slice(src);
        }
        Cow::Owned(padded)
    }
}
