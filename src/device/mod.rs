// Graphics device seam
//
// The atlas never talks to a GPU API directly. Everything it needs from the device is the
// small GL-shaped surface below: create, bind, pixel-store state, sampling state, storage
// allocation and partial uploads. Uploads and parameter calls act on whatever texture is
// bound to the active unit, so call order matters.

pub mod recording;
pub mod wgpu_device;

pub use recording::{DeviceCall, RecordingDevice};
pub use wgpu_device::WgpuDevice;

use crate::error::DeviceError;

/// Bytes per texel of the only pixel format the atlas uses (RGBA8).
pub const BYTES_PER_PIXEL: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    D2,
    D2Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnpackParams {
    pub flip_y: bool,
    pub premultiply_alpha: bool,
    pub alignment: u32,
}

impl Default for UnpackParams {
    fn default() -> Self {
        Self {
            flip_y: false,
            premultiply_alpha: false,
            alignment: 4,
        }
    }
}

impl UnpackParams {
    /// Row stride in bytes of a `width` pixel wide source row under this alignment.
    pub fn row_stride(&self, width: u32) -> usize {
        let align = self.alignment.max(1) as usize;
        let tight = width as usize * BYTES_PER_PIXEL;
        tight.div_ceil(align) * align
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
    ClampToEdge,
    Repeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingPolicy {
    pub wrap_u: WrapMode,
    pub wrap_v: WrapMode,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub mipmaps: bool,
}

impl SamplingPolicy {
    /// The fixed policy every atlas texture is created with.
    pub const ATLAS: Self = Self {
        wrap_u: WrapMode::ClampToEdge,
        wrap_v: WrapMode::ClampToEdge,
        mag_filter: FilterMode::Linear,
        min_filter: FilterMode::Linear,
        mipmaps: false,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region2d {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region3d {
    pub x: u32,
    pub y: u32,
    pub z: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

pub trait GraphicsDevice {
    fn create_texture(&mut self, kind: TextureKind) -> Result<TextureId, DeviceError>;

    fn bind_texture(
        &mut self,
        unit: u32,
        kind: TextureKind,
        texture: TextureId,
    ) -> Result<(), DeviceError>;

    fn set_unpack(&mut self, params: UnpackParams) -> Result<(), DeviceError>;

    fn set_sampling(
        &mut self,
        kind: TextureKind,
        policy: SamplingPolicy,
    ) -> Result<(), DeviceError>;

    fn allocate_storage(&mut self, kind: TextureKind, extent: Extent) -> Result<(), DeviceError>;

    fn sub_upload_2d(&mut self, region: Region2d, pixels: &[u8]) -> Result<(), DeviceError>;

    fn sub_upload_3d(&mut self, region: Region3d, pixels: &[u8]) -> Result<(), DeviceError>;
}

/// Repack `pixels` (rows of `row_stride` bytes) into tightly packed RGBA8 rows, applying the
/// unpack state. Shared by every device implementation so they agree byte for byte.
pub(crate) fn unpack_rows(
    pixels: &[u8],
    width: u32,
    rows: u32,
    params: &UnpackParams,
) -> Result<Vec<u8>, DeviceError> {
    if !matches!(params.alignment, 1 | 2 | 4 | 8) {
        return Err(DeviceError::BadAlignment(params.alignment));
    }

    let stride = params.row_stride(width);
    let tight = width as usize * BYTES_PER_PIXEL;
    let rows = rows as usize;
    // The last row does not need trailing padding.
    let expected = if rows == 0 { 0 } else { stride * (rows - 1) + tight };
    if pixels.len() < expected {
        return Err(DeviceError::PixelBufferTooSmall {
            expected,
            actual: pixels.len(),
        });
    }

    let mut out = Vec::with_capacity(tight * rows);
    for row in 0..rows {
        let src_row = if params.flip_y { rows - 1 - row } else { row };
        let start = src_row * stride;
        out.extend_from_slice(&pixels[start..start + tight]);
    }

    if params.premultiply_alpha {
        for px in out.chunks_exact_mut(BYTES_PER_PIXEL) {
            let a = px[3] as u32;
            for c in &mut px[..3] {
                *c = ((*c as u32 * a + 127) / 255) as u8;
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_stride_alignment() {
        let params = UnpackParams {
            alignment: 8,
            ..Default::default()
        };
        assert_eq!(params.row_stride(3), 16);
        assert_eq!(params.row_stride(2), 8);
        assert_eq!(UnpackParams::default().row_stride(3), 12);
    }

    #[test]
    fn test_unpack_flip_and_premultiply() {
        // 1x2 image: top row red at half alpha, bottom row opaque green
        let pixels = [255, 0, 0, 128, 0, 255, 0, 255];
        let params = UnpackParams {
            flip_y: true,
            premultiply_alpha: true,
            alignment: 4,
        };

        let out = unpack_rows(&pixels, 1, 2, &params).unwrap();
        assert_eq!(&out[..4], &[0, 255, 0, 255]);
        assert_eq!(&out[4..], &[128, 0, 0, 128]);
    }

    #[test]
    fn test_unpack_strips_padding() {
        // width 1 with alignment 8 means one 4 byte pad per row, except after the last
        let pixels = [1, 2, 3, 4, 0, 0, 0, 0, 5, 6, 7, 8];
        let params = UnpackParams {
            alignment: 8,
            ..Default::default()
        };

        let out = unpack_rows(&pixels, 1, 2, &params).unwrap();
        assert_eq!(out, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_unpack_rejects_short_buffer() {
        let err = unpack_rows(&[0; 7], 1, 2, &UnpackParams::default()).unwrap_err();
        assert_eq!(
            err,
            DeviceError::PixelBufferTooSmall {
                expected: 8,
                actual: 7
            }
        );
    }

    #[test]
    fn test_unpack_rejects_bad_alignment() {
        let params = UnpackParams {
            alignment: 3,
            ..Default::default()
        };
        assert_eq!(
            unpack_rows(&[0; 4], 1, 1, &params),
            Err(DeviceError::BadAlignment(3))
        );
    }
}
