use bytemuck::{Pod, Zeroable};

use crate::device::{Extent, TextureKind};
use crate::error::{AtlasError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutMode {
    /// Tiles laid out row-major across one 2-D surface
    Grid { rows: u32, cols: u32 },
    /// One slot per layer of a 2-D array
    Layered { layers: u32 },
}

/// Where a slot lives in the texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotLocation {
    /// Pixel offset of the tile's top-left corner
    Grid { x: u32, y: u32 },
    Layer(u32),
}

/// Normalized `(u0, v0, scale_u, scale_v)` of a slot's content.
///
/// Layered slots are always relative to their own layer, so their origin is `(0, 0)`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct UvRect {
    pub u0: f32,
    pub v0: f32,
    pub scale_u: f32,
    pub scale_v: f32,
}

impl UvRect {
    pub fn to_array(self) -> [f32; 4] {
        [self.u0, self.v0, self.scale_u, self.scale_v]
    }
}

/// Maps slot ids to texture locations and UV rectangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasLayout {
    mode: LayoutMode,
    tile_resolution: u32,
}

impl AtlasLayout {
    pub fn new(mode: LayoutMode, tile_resolution: u32) -> Self {
        Self {
            mode,
            tile_resolution,
        }
    }

    pub fn mode(&self) -> LayoutMode {
        self.mode
    }

    pub fn tile_resolution(&self) -> u32 {
        self.tile_resolution
    }

    pub fn capacity(&self) -> u32 {
        match self.mode {
            LayoutMode::Grid { rows, cols } => rows * cols,
            LayoutMode::Layered { layers } => layers,
        }
    }

    pub fn texture_kind(&self) -> TextureKind {
        match self.mode {
            LayoutMode::Grid { .. } => TextureKind::D2,
            LayoutMode::Layered { .. } => TextureKind::D2Array,
        }
    }

    /// Size of the backing storage.
    pub fn storage_extent(&self) -> Extent {
        let tile = self.tile_resolution;
        match self.mode {
            LayoutMode::Grid { rows, cols } => Extent {
                width: cols * tile,
                height: rows * tile,
                depth: 1,
            },
            LayoutMode::Layered { layers } => Extent {
                width: tile,
                height: tile,
                depth: layers,
            },
        }
    }

    fn check(&self, id: u32) -> Result<()> {
        if id >= self.capacity() {
            return Err(AtlasError::InvalidSlot(id));
        }
        Ok(())
    }

    /// Column and row of `id`, in tiles. Layered slots all sit at `(0, 0)`.
    pub fn grid_offset(&self, id: u32) -> Result<(u32, u32)> {
        self.check(id)?;
        Ok(match self.mode {
            LayoutMode::Grid { cols, .. } => (id % cols, id / cols),
            LayoutMode::Layered { .. } => (0, 0),
        })
    }

    /// Array layer of `id`; always 0 in grid mode.
    pub fn layer(&self, id: u32) -> Result<u32> {
        self.check(id)?;
        Ok(match self.mode {
            LayoutMode::Grid { .. } => 0,
            LayoutMode::Layered { .. } => id,
        })
    }

    pub fn location(&self, id: u32) -> Result<SlotLocation> {
        match self.mode {
            LayoutMode::Grid { .. } => {
                let (col, row) = self.grid_offset(id)?;
                Ok(SlotLocation::Grid {
                    x: col * self.tile_resolution,
                    y: row * self.tile_resolution,
                })
            }
            LayoutMode::Layered { .. } => Ok(SlotLocation::Layer(self.layer(id)?)),
        }
    }

    /// UV rectangle of `content_width` x `content_height` pixels written at the slot's origin.
    /// Content larger than a tile is clamped to the tile.
    pub fn uv_rect(&self, id: u32, content_width: u32, content_height: u32) -> Result<UvRect> {
        let (col, row) = self.grid_offset(id)?;
        let (rows, cols) = match self.mode {
            LayoutMode::Grid { rows, cols } => (rows as f32, cols as f32),
            LayoutMode::Layered { .. } => (1.0, 1.0),
        };

        let tile = self.tile_resolution as f32;
        let fill_u = content_width.min(self.tile_resolution) as f32 / tile;
        let fill_v = content_height.min(self.tile_resolution) as f32 / tile;

        Ok(UvRect {
            u0: col as f32 / cols,
            v0: row as f32 / rows,
            scale_u: fill_u / cols,
            scale_v: fill_v / rows,
        })
    }
}
