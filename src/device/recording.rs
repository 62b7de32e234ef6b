// In-memory device
//
// Records every call in issue order and mirrors texture memory on the CPU. Used by the test
// suite and by the CLI's --dry-run mode, where no adapter is needed.

use std::collections::HashMap;

#[allow(unused_imports)]
use log::{debug, trace};

use crate::device::{
    unpack_rows, Extent, GraphicsDevice, Region2d, Region3d, SamplingPolicy, TextureId,
    TextureKind, UnpackParams, BYTES_PER_PIXEL,
};
use crate::error::DeviceError;

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    CreateTexture(TextureKind, TextureId),
    BindTexture {
        unit: u32,
        kind: TextureKind,
        texture: TextureId,
    },
    SetUnpack(UnpackParams),
    SetSampling(TextureKind, SamplingPolicy),
    AllocateStorage(TextureKind, Extent),
    SubUpload2d(Region2d),
    SubUpload3d(Region3d),
}

#[derive(Debug)]
struct MirroredTexture {
    kind: TextureKind,
    extent: Option<Extent>,
    sampling: Option<SamplingPolicy>,
    texels: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct RecordingDevice {
    calls: Vec<DeviceCall>,
    textures: HashMap<TextureId, MirroredTexture>,
    units: HashMap<u32, TextureId>,
    active_unit: u32,
    unpack: UnpackParams,
    next_id: u32,
    refuse_allocations: bool,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `allocate_storage` fail.
    pub fn refuse_allocations(&mut self, refuse: bool) {
        self.refuse_allocations = refuse;
    }

    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn extent(&self, texture: TextureId) -> Option<Extent> {
        self.textures.get(&texture).and_then(|t| t.extent)
    }

    pub fn sampling(&self, texture: TextureId) -> Option<SamplingPolicy> {
        self.textures.get(&texture).and_then(|t| t.sampling)
    }

    /// Read back one RGBA texel.
    pub fn pixel(&self, texture: TextureId, x: u32, y: u32, z: u32) -> Option<[u8; 4]> {
        let tex = self.textures.get(&texture)?;
        let extent = tex.extent?;
        if x >= extent.width || y >= extent.height || z >= extent.depth {
            return None;
        }
        let idx = texel_index(&extent, x, y, z);
        let mut out = [0; 4];
        out.copy_from_slice(&tex.texels[idx..idx + BYTES_PER_PIXEL]);
        Some(out)
    }

    fn bound(&self) -> Result<TextureId, DeviceError> {
        self.units
            .get(&self.active_unit)
            .copied()
            .ok_or(DeviceError::NothingBound(self.active_unit))
    }

    fn write_region(&mut self, region: Region3d, pixels: &[u8]) -> Result<(), DeviceError> {
        let id = self.bound()?;
        let rows = region.height * region.depth;
        let data = unpack_rows(pixels, region.width, rows, &self.unpack)?;

        let tex = self
            .textures
            .get_mut(&id)
            .ok_or(DeviceError::UnknownTexture(id))?;
        let extent = tex.extent.ok_or(DeviceError::NotAllocated(id))?;

        let fits = region.x.checked_add(region.width).is_some_and(|r| r <= extent.width)
            && region.y.checked_add(region.height).is_some_and(|b| b <= extent.height)
            && region.z.checked_add(region.depth).is_some_and(|d| d <= extent.depth);
        if !fits {
            return Err(DeviceError::OutOfBounds {
                x: region.x,
                y: region.y,
                z: region.z,
                width: region.width,
                height: region.height,
                depth: region.depth,
            });
        }

        let row_bytes = region.width as usize * BYTES_PER_PIXEL;
        for layer in 0..region.depth {
            for row in 0..region.height {
                let src = ((layer * region.height + row) as usize) * row_bytes;
                let dst = texel_index(&extent, region.x, region.y + row, region.z + layer);
                tex.texels[dst..dst + row_bytes].copy_from_slice(&data[src..src + row_bytes]);
            }
        }

        trace!("RecordingDevice: wrote {region:?} into {id:?}");
        Ok(())
    }
}

fn texel_index(extent: &Extent, x: u32, y: u32, z: u32) -> usize {
    let layer = extent.width as usize * extent.height as usize;
    (z as usize * layer + y as usize * extent.width as usize + x as usize) * BYTES_PER_PIXEL
}

impl GraphicsDevice for RecordingDevice {
    fn create_texture(&mut self, kind: TextureKind) -> Result<TextureId, DeviceError> {
        let id = TextureId(self.next_id);
        self.next_id += 1;
        self.textures.insert(
            id,
            MirroredTexture {
                kind,
                extent: None,
                sampling: None,
                texels: Vec::new(),
            },
        );
        self.calls.push(DeviceCall::CreateTexture(kind, id));
        Ok(id)
    }

    fn bind_texture(
        &mut self,
        unit: u32,
        kind: TextureKind,
        texture: TextureId,
    ) -> Result<(), DeviceError> {
        self.calls.push(DeviceCall::BindTexture {
            unit,
            kind,
            texture,
        });
        let tex = self
            .textures
            .get(&texture)
            .ok_or(DeviceError::UnknownTexture(texture))?;
        if tex.kind != kind {
            return Err(DeviceError::TargetMismatch(texture));
        }
        self.active_unit = unit;
        self.units.insert(unit, texture);
        Ok(())
    }

    fn set_unpack(&mut self, params: UnpackParams) -> Result<(), DeviceError> {
        self.calls.push(DeviceCall::SetUnpack(params));
        self.unpack = params;
        Ok(())
    }

    fn set_sampling(
        &mut self,
        kind: TextureKind,
        policy: SamplingPolicy,
    ) -> Result<(), DeviceError> {
        self.calls.push(DeviceCall::SetSampling(kind, policy));
        let id = self.bound()?;
        let tex = self
            .textures
            .get_mut(&id)
            .ok_or(DeviceError::UnknownTexture(id))?;
        if tex.kind != kind {
            return Err(DeviceError::TargetMismatch(id));
        }
        tex.sampling = Some(policy);
        Ok(())
    }

    fn allocate_storage(&mut self, kind: TextureKind, extent: Extent) -> Result<(), DeviceError> {
        self.calls.push(DeviceCall::AllocateStorage(kind, extent));
        if self.refuse_allocations {
            return Err(DeviceError::AllocationRefused(
                "allocations disabled on this device".to_string(),
            ));
        }

        let id = self.bound()?;
        let tex = self
            .textures
            .get_mut(&id)
            .ok_or(DeviceError::UnknownTexture(id))?;
        if tex.kind != kind {
            return Err(DeviceError::TargetMismatch(id));
        }
        if tex.extent.is_some() {
            return Err(DeviceError::AlreadyAllocated(id));
        }

        let bytes = extent.width as usize
            * extent.height as usize
            * extent.depth as usize
            * BYTES_PER_PIXEL;
        tex.texels = vec![0; bytes];
        tex.extent = Some(extent);
        debug!("RecordingDevice: allocated {extent:?} for {id:?}");
        Ok(())
    }

    fn sub_upload_2d(&mut self, region: Region2d, pixels: &[u8]) -> Result<(), DeviceError> {
        self.calls.push(DeviceCall::SubUpload2d(region));
        self.write_region(
            Region3d {
                x: region.x,
                y: region.y,
                z: 0,
                width: region.width,
                height: region.height,
                depth: 1,
            },
            pixels,
        )
    }

    fn sub_upload_3d(&mut self, region: Region3d, pixels: &[u8]) -> Result<(), DeviceError> {
        self.calls.push(DeviceCall::SubUpload3d(region));
        self.write_region(region, pixels)
    }
}
