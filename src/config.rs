use crate::atlas::LayoutMode;
use crate::error::{AtlasError, Result};

// Default values for configuration
// These serve as fallback values and can be used for "reset to defaults" functionality
pub const DEFAULT_ATLAS_RESOLUTION: u32 = 1024;
pub const DEFAULT_TILE_RESOLUTION: u32 = 1024;
pub const DEFAULT_LAYER_COUNT: u32 = 16;
pub const DEFAULT_PREMULTIPLY_ALPHA: bool = false;
pub const DEFAULT_UNPACK_ALIGNMENT: u32 = 4;
pub const DEFAULT_TEXTURE_UNIT: u32 = 0;
pub const DEFAULT_CLEAR_COLOR: [u8; 4] = [0, 0, 0, 0];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtlasConfig {
    pub atlas_resolution: u32,      // Side of the square grid texture, in pixels
    pub tile_resolution: u32,       // Side of one slot, in pixels
    pub layer_count: u32,           // 0 selects grid mode, otherwise one slot per array layer
    pub premultiply_alpha: bool,
    pub unpack_alignment: u32,      // Source row alignment in bytes: 1, 2, 4 or 8
    pub texture_unit: u32,          // Unit the atlas binds to before every upload
    pub clear_color: [u8; 4],       // Fill used when a slot is removed
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            atlas_resolution: DEFAULT_ATLAS_RESOLUTION,
            tile_resolution: DEFAULT_TILE_RESOLUTION,
            layer_count: DEFAULT_LAYER_COUNT,
            premultiply_alpha: DEFAULT_PREMULTIPLY_ALPHA,
            unpack_alignment: DEFAULT_UNPACK_ALIGNMENT,
            texture_unit: DEFAULT_TEXTURE_UNIT,
            clear_color: DEFAULT_CLEAR_COLOR,
        }
    }
}

impl AtlasConfig {
    /// Grid atlas of `atlas_resolution`² split into `tile_resolution`² tiles.
    pub fn grid(atlas_resolution: u32, tile_resolution: u32) -> Self {
        Self {
            atlas_resolution,
            tile_resolution,
            layer_count: 0,
            ..Default::default()
        }
    }

    /// Array atlas with one `tile_resolution`² layer per slot.
    pub fn layered(tile_resolution: u32, layer_count: u32) -> Self {
        Self {
            atlas_resolution: tile_resolution,
            tile_resolution,
            layer_count,
            ..Default::default()
        }
    }

    pub fn with_premultiply_alpha(mut self, premultiply: bool) -> Self {
        self.premultiply_alpha = premultiply;
        self
    }

    pub fn with_unpack_alignment(mut self, alignment: u32) -> Self {
        self.unpack_alignment = alignment;
        self
    }

    pub fn with_texture_unit(mut self, unit: u32) -> Self {
        self.texture_unit = unit;
        self
    }

    pub fn with_clear_color(mut self, color: [u8; 4]) -> Self {
        self.clear_color = color;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.tile_resolution == 0 {
            return Err(AtlasError::InvalidConfig(
                "tile resolution must be non-zero".to_string(),
            ));
        }

        if !matches!(self.unpack_alignment, 1 | 2 | 4 | 8) {
            return Err(AtlasError::InvalidConfig(format!(
                "unpack alignment must be 1, 2, 4 or 8, got {}",
                self.unpack_alignment
            )));
        }

        if self.layer_count == 0 {
            if self.atlas_resolution < self.tile_resolution
                || self.atlas_resolution % self.tile_resolution != 0
            {
                return Err(AtlasError::InvalidConfig(format!(
                    "atlas resolution {} is not a multiple of tile resolution {}",
                    self.atlas_resolution, self.tile_resolution
                )));
            }

            let tiles = self.atlas_resolution / self.tile_resolution;
            if tiles.checked_mul(tiles).is_none() {
                return Err(AtlasError::InvalidConfig(format!(
                    "{tiles}x{tiles} tiles do not fit a u32 slot id"
                )));
            }
        }

        Ok(())
    }

    /// The layout mode this configuration selects. Call [`validate`](Self::validate) first.
    pub fn layout_mode(&self) -> LayoutMode {
        if self.layer_count > 0 {
            LayoutMode::Layered {
                layers: self.layer_count,
            }
        } else {
            let tiles = self.atlas_resolution / self.tile_resolution.max(1);
            LayoutMode::Grid {
                rows: tiles,
                cols: tiles,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_layered() {
        let config = AtlasConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.layout_mode(), LayoutMode::Layered { layers: 16 });
    }

    #[test]
    fn test_grid_mode_dimensions() {
        let config = AtlasConfig::grid(2048, 512);
        assert_eq!(config.layout_mode(), LayoutMode::Grid { rows: 4, cols: 4 });
    }

    #[test]
    fn test_rejects_uneven_grid() {
        assert!(matches!(
            AtlasConfig::grid(1000, 300).validate(),
            Err(AtlasError::InvalidConfig(_))
        ));
        assert!(matches!(
            AtlasConfig::grid(256, 512).validate(),
            Err(AtlasError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_zero_tile_and_bad_alignment() {
        assert!(AtlasConfig::grid(1024, 0).validate().is_err());
        assert!(AtlasConfig::layered(0, 4).validate().is_err());
        assert!(AtlasConfig::default()
            .with_unpack_alignment(3)
            .validate()
            .is_err());
    }

    #[test]
    fn test_rejects_grid_with_too_many_slots() {
        assert!(matches!(
            AtlasConfig::grid(70_000, 1).validate(),
            Err(AtlasError::InvalidConfig(_))
        ));
        // 65_535^2 still fits in u32
        assert!(AtlasConfig::grid(65_535, 1).validate().is_ok());
    }
}
