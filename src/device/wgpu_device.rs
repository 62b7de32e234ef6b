// wgpu-backed GraphicsDevice
//
// wgpu has no texture units or pixel-store state, so both are emulated here: the unit table
// decides which texture an upload targets, and the unpack parameters are applied on the CPU
// before the bytes reach `queue.write_texture`.

use std::collections::HashMap;
use std::sync::Arc;

#[allow(unused_imports)]
use log::{debug, info, warn};

use crate::device::{
    unpack_rows, Extent, FilterMode, GraphicsDevice, Region2d, Region3d, SamplingPolicy,
    TextureId, TextureKind, UnpackParams, WrapMode, BYTES_PER_PIXEL,
};
use crate::error::DeviceError;

const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

#[derive(Debug)]
struct Allocation {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    extent: Extent,
}

#[derive(Debug)]
struct DeviceTexture {
    kind: TextureKind,
    sampling: SamplingPolicy,
    allocation: Option<Allocation>,
}

#[derive(Debug)]
pub struct WgpuDevice {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    textures: HashMap<TextureId, DeviceTexture>,
    units: HashMap<u32, TextureId>,
    active_unit: u32,
    unpack: UnpackParams,
    next_id: u32,
}

impl WgpuDevice {
    /// Wrap the device and queue of an existing renderer.
    pub fn from_parts(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self {
            device,
            queue,
            textures: HashMap::new(),
            units: HashMap::new(),
            active_unit: 0,
            unpack: UnpackParams::default(),
            next_id: 0,
        }
    }

    /// Request an adapter and device without a surface.
    pub fn new_headless() -> Result<Self, DeviceError> {
        let backends = wgpu::util::backend_bits_from_env().unwrap_or_else(wgpu::Backends::all);
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let adapter =
            futures::executor::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            }))
            .ok_or(DeviceError::NoAdapter)?;
        info!("{:?}", adapter.get_info());

        let (device, queue) = futures::executor::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("slotatlas device"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter.limits(),
            },
            None,
        ))
        .map_err(|e| DeviceError::RequestDevice(e.to_string()))?;

        Ok(Self::from_parts(Arc::new(device), Arc::new(queue)))
    }

    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    pub fn texture(&self, id: TextureId) -> Option<&wgpu::Texture> {
        self.allocation(id).map(|a| &a.texture)
    }

    pub fn texture_view(&self, id: TextureId) -> Option<&wgpu::TextureView> {
        self.allocation(id).map(|a| &a.view)
    }

    pub fn sampler(&self, id: TextureId) -> Option<&wgpu::Sampler> {
        self.allocation(id).map(|a| &a.sampler)
    }

    /// Submit the queued texture writes.
    pub fn flush(&self) {
        self.queue.submit(std::iter::empty());
    }

    fn allocation(&self, id: TextureId) -> Option<&Allocation> {
        self.textures.get(&id).and_then(|t| t.allocation.as_ref())
    }

    fn bound(&self) -> Result<TextureId, DeviceError> {
        self.units
            .get(&self.active_unit)
            .copied()
            .ok_or(DeviceError::NothingBound(self.active_unit))
    }

    fn bound_texture_mut(&mut self, kind: TextureKind) -> Result<(TextureId, &mut DeviceTexture), DeviceError> {
        let id = self.bound()?;
        let tex = self
            .textures
            .get_mut(&id)
            .ok_or(DeviceError::UnknownTexture(id))?;
        if tex.kind != kind {
            return Err(DeviceError::TargetMismatch(id));
        }
        Ok((id, tex))
    }

    fn create_sampler(&self, policy: &SamplingPolicy) -> wgpu::Sampler {
        self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("slotatlas sampler"),
            address_mode_u: address_mode(policy.wrap_u),
            address_mode_v: address_mode(policy.wrap_v),
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter_mode(policy.mag_filter),
            min_filter: filter_mode(policy.min_filter),
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        })
    }

    fn write_region(&mut self, region: Region3d, pixels: &[u8]) -> Result<(), DeviceError> {
        let id = self.bound()?;
        let allocation = self
            .textures
            .get(&id)
            .ok_or(DeviceError::UnknownTexture(id))?
            .allocation
            .as_ref()
            .ok_or(DeviceError::NotAllocated(id))?;

        let extent = allocation.extent;
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

        if region.width == 0 || region.height == 0 || region.depth == 0 {
            return Ok(());
        }

        let data = unpack_rows(pixels, region.width, region.height * region.depth, &self.unpack)?;

        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &allocation.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: region.x,
                    y: region.y,
                    z: region.z,
                },
                aspect: wgpu::TextureAspect::All,
            },
            &data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(BYTES_PER_PIXEL as u32 * region.width),
                rows_per_image: Some(region.height),
            },
            wgpu::Extent3d {
                width: region.width,
                height: region.height,
                depth_or_array_layers: region.depth,
            },
        );

        debug!("WgpuDevice: queued write {region:?} into {id:?}");
        Ok(())
    }
}

fn check_limits(limits: &wgpu::Limits, kind: TextureKind, extent: Extent) -> Result<(), DeviceError> {
    let max_2d = limits.max_texture_dimension_2d;
    for (what, requested) in [("width", extent.width), ("height", extent.height)] {
        if requested > max_2d {
            return Err(DeviceError::LimitExceeded {
                what,
                requested,
                limit: max_2d,
            });
        }
    }

    let max_depth = match kind {
        TextureKind::D2 => 1,
        TextureKind::D2Array => limits.max_texture_array_layers,
    };
    if extent.depth > max_depth {
        return Err(DeviceError::LimitExceeded {
            what: "array layers",
            requested: extent.depth,
            limit: max_depth,
        });
    }

    Ok(())
}

fn address_mode(mode: WrapMode) -> wgpu::AddressMode {
    match mode {
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
    }
}

fn filter_mode(mode: FilterMode) -> wgpu::FilterMode {
    match mode {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

impl GraphicsDevice for WgpuDevice {
    fn create_texture(&mut self, kind: TextureKind) -> Result<TextureId, DeviceError> {
        let id = TextureId(self.next_id);
        self.next_id += 1;
        self.textures.insert(
            id,
            DeviceTexture {
                kind,
                sampling: SamplingPolicy::ATLAS,
                allocation: None,
            },
        );
        Ok(id)
    }

    fn bind_texture(
        &mut self,
        unit: u32,
        kind: TextureKind,
        texture: TextureId,
    ) -> Result<(), DeviceError> {
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
        if !matches!(params.alignment, 1 | 2 | 4 | 8) {
            return Err(DeviceError::BadAlignment(params.alignment));
        }
        self.unpack = params;
        Ok(())
    }

    fn set_sampling(
        &mut self,
        kind: TextureKind,
        policy: SamplingPolicy,
    ) -> Result<(), DeviceError> {
        let (id, _) = self.bound_texture_mut(kind)?;
        let sampler = self.create_sampler(&policy);
        let tex = self
            .textures
            .get_mut(&id)
            .ok_or(DeviceError::UnknownTexture(id))?;
        tex.sampling = policy;
        if let Some(allocation) = tex.allocation.as_mut() {
            allocation.sampler = sampler;
        }
        Ok(())
    }

    fn allocate_storage(&mut self, kind: TextureKind, extent: Extent) -> Result<(), DeviceError> {
        let (id, tex) = self.bound_texture_mut(kind)?;
        if tex.allocation.is_some() {
            return Err(DeviceError::AlreadyAllocated(id));
        }
        let sampling = tex.sampling;
        check_limits(&self.device.limits(), kind, extent)?;

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("slotatlas texture"),
            size: wgpu::Extent3d {
                width: extent.width,
                height: extent.height,
                depth_or_array_layers: extent.depth,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        let validation = futures::executor::block_on(self.device.pop_error_scope());
        let out_of_memory = futures::executor::block_on(self.device.pop_error_scope());
        if let Some(err) = validation.or(out_of_memory) {
            warn!("WgpuDevice: texture allocation failed: {err}");
            return Err(DeviceError::AllocationRefused(err.to_string()));
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(match kind {
                TextureKind::D2 => wgpu::TextureViewDimension::D2,
                TextureKind::D2Array => wgpu::TextureViewDimension::D2Array,
            }),
            ..Default::default()
        });
        let sampler = self.create_sampler(&sampling);

        info!(
            "WgpuDevice: allocated {}x{}x{} {:?} texture {:?}",
            extent.width, extent.height, extent.depth, kind, id
        );

        if let Some(tex) = self.textures.get_mut(&id) {
            tex.allocation = Some(Allocation {
                texture,
                view,
                sampler,
                extent,
            });
        }
        Ok(())
    }

    fn sub_upload_2d(&mut self, region: Region2d, pixels: &[u8]) -> Result<(), DeviceError> {
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
        self.write_region(region, pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> wgpu::Limits {
        wgpu::Limits {
            max_texture_dimension_2d: 4096,
            max_texture_array_layers: 16,
            ..wgpu::Limits::default()
        }
    }

    fn extent(width: u32, height: u32, depth: u32) -> Extent {
        Extent {
            width,
            height,
            depth,
        }
    }

    #[test]
    fn test_limits_accept_extent_at_the_edge() {
        let limits = limits();
        assert!(check_limits(&limits, TextureKind::D2, extent(4096, 4096, 1)).is_ok());
        assert!(check_limits(&limits, TextureKind::D2Array, extent(4096, 4096, 16)).is_ok());
    }

    #[test]
    fn test_limits_reject_oversized_sides() {
        let limits = limits();
        assert_eq!(
            check_limits(&limits, TextureKind::D2, extent(4097, 16, 1)),
            Err(DeviceError::LimitExceeded {
                what: "width",
                requested: 4097,
                limit: 4096
            })
        );
        assert_eq!(
            check_limits(&limits, TextureKind::D2Array, extent(16, 8192, 1)),
            Err(DeviceError::LimitExceeded {
                what: "height",
                requested: 8192,
                limit: 4096
            })
        );
    }

    #[test]
    fn test_limits_on_depth() {
        let limits = limits();
        assert_eq!(
            check_limits(&limits, TextureKind::D2Array, extent(64, 64, 17)),
            Err(DeviceError::LimitExceeded {
                what: "array layers",
                requested: 17,
                limit: 16
            })
        );
        // a plain 2-D texture holds a single layer
        assert_eq!(
            check_limits(&limits, TextureKind::D2, extent(64, 64, 2)),
            Err(DeviceError::LimitExceeded {
                what: "array layers",
                requested: 2,
                limit: 1
            })
        );
    }

    #[test]
    fn test_sampling_modes_map_to_wgpu() {
        let policy = SamplingPolicy::ATLAS;
        assert_eq!(address_mode(policy.wrap_u), wgpu::AddressMode::ClampToEdge);
        assert_eq!(address_mode(policy.wrap_v), wgpu::AddressMode::ClampToEdge);
        assert_eq!(filter_mode(policy.mag_filter), wgpu::FilterMode::Linear);
        assert_eq!(filter_mode(policy.min_filter), wgpu::FilterMode::Linear);

        assert_eq!(address_mode(WrapMode::Repeat), wgpu::AddressMode::Repeat);
        assert_eq!(filter_mode(FilterMode::Nearest), wgpu::FilterMode::Nearest);
    }
}
