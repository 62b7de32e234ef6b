use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use log::{debug, info, warn, error};

use crate::config::{
    AtlasConfig, DEFAULT_ATLAS_RESOLUTION, DEFAULT_CLEAR_COLOR, DEFAULT_LAYER_COUNT,
    DEFAULT_PREMULTIPLY_ALPHA, DEFAULT_TEXTURE_UNIT, DEFAULT_TILE_RESOLUTION,
    DEFAULT_UNPACK_ALIGNMENT,
};

/// User-specific atlas settings read from a YAML file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    /// Side of the square grid texture in pixels
    #[serde(default = "default_atlas_resolution")]
    pub atlas_resolution: u32,

    /// Side of one slot in pixels
    #[serde(default = "default_tile_resolution")]
    pub tile_resolution: u32,

    /// Number of array layers; 0 selects grid mode
    #[serde(default = "default_layer_count")]
    pub layer_count: u32,

    #[serde(default = "default_premultiply_alpha")]
    pub premultiply_alpha: bool,

    #[serde(default = "default_unpack_alignment")]
    pub unpack_alignment: u32,

    #[serde(default = "default_texture_unit")]
    pub texture_unit: u32,

    /// RGBA fill written into removed slots
    #[serde(default = "default_clear_color")]
    pub clear_color: [u8; 4],
}

fn default_atlas_resolution() -> u32 {
    DEFAULT_ATLAS_RESOLUTION
}

fn default_tile_resolution() -> u32 {
    DEFAULT_TILE_RESOLUTION
}

fn default_layer_count() -> u32 {
    DEFAULT_LAYER_COUNT
}

fn default_premultiply_alpha() -> bool {
    DEFAULT_PREMULTIPLY_ALPHA
}

fn default_unpack_alignment() -> u32 {
    DEFAULT_UNPACK_ALIGNMENT
}

fn default_texture_unit() -> u32 {
    DEFAULT_TEXTURE_UNIT
}

fn default_clear_color() -> [u8; 4] {
    DEFAULT_CLEAR_COLOR
}

impl Default for UserSettings {
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

impl UserSettings {
    /// Get the path to the settings file
    /// On macOS: ~/Library/Application Support/slotatlas/settings.yaml
    /// On Linux: ~/.config/slotatlas/settings.yaml
    /// On Windows: C:\Users\<user>\AppData\Roaming\slotatlas\settings.yaml
    pub fn settings_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."));

        config_dir.join("slotatlas").join("settings.yaml")
    }

    /// Load settings from the YAML file
    /// If custom_path is provided, uses that path; otherwise uses the default settings path
    pub fn load(custom_path: Option<&Path>) -> Self {
        let path = match custom_path {
            Some(p) => {
                info!("Using custom settings path: {}", p.display());
                p.to_path_buf()
            }
            None => Self::settings_path(),
        };

        if !path.exists() {
            info!("Settings file not found at {:?}, using defaults", path);
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(contents) => {
                match serde_yaml::from_str::<UserSettings>(&contents) {
                    Ok(settings) => {
                        info!("Loaded settings from {:?}", path);
                        debug!("Settings: atlas={}, tile={}, layers={}, alignment={}",
                            settings.atlas_resolution, settings.tile_resolution,
                            settings.layer_count, settings.unpack_alignment);
                        settings
                    }
                    Err(e) => {
                        error!("Failed to parse settings file at {:?}: {}", path, e);
                        warn!("Using default settings");
                        Self::default()
                    }
                }
            }
            Err(e) => {
                error!("Failed to read settings file at {:?}: {}", path, e);
                warn!("Using default settings");
                Self::default()
            }
        }
    }

    /// Write the settings to `path` (or the default location) as commented YAML
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf, String> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::settings_path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create settings directory: {}", e))?;
            }
        }

        fs::write(&path, self.to_yaml_with_comments())
            .map_err(|e| format!("Failed to write settings file: {}", e))?;

        info!("Saved settings to {:?}", path);
        Ok(path)
    }

    /// Generate YAML content with comments for new files
    fn to_yaml_with_comments(&self) -> String {
        let [r, g, b, a] = self.clear_color;
        format!(
            r#"# slotatlas settings
# Values here override the built-in defaults.

# Side of the square grid texture in pixels (grid mode only)
atlas_resolution: {}

# Side of one slot in pixels; larger images are downscaled to fit
tile_resolution: {}

# Number of texture array layers
# - 0: grid mode, (atlas_resolution / tile_resolution)^2 slots on one surface
# - n: layered mode, one slot per layer
layer_count: {}

# Premultiply color by alpha while uploading
premultiply_alpha: {}

# Source row alignment in bytes: 1, 2, 4 or 8
unpack_alignment: {}

# Texture unit the atlas binds to
texture_unit: {}

# RGBA fill written into a slot when its image is removed
clear_color: [{}, {}, {}, {}]
"#,
            self.atlas_resolution,
            self.tile_resolution,
            self.layer_count,
            self.premultiply_alpha,
            self.unpack_alignment,
            self.texture_unit,
            r, g, b, a
        )
    }

    pub fn to_config(&self) -> AtlasConfig {
        AtlasConfig {
            atlas_resolution: self.atlas_resolution,
            tile_resolution: self.tile_resolution,
            layer_count: self.layer_count,
            premultiply_alpha: self.premultiply_alpha,
            unpack_alignment: self.unpack_alignment,
            texture_unit: self.texture_unit,
            clear_color: self.clear_color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = UserSettings::load(Some(&dir.path().join("absent.yaml")));
        assert_eq!(settings, UserSettings::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        fs::write(&path, "layer_count: 0\natlas_resolution: 4096\n").unwrap();

        let settings = UserSettings::load(Some(&path));
        assert_eq!(settings.layer_count, 0);
        assert_eq!(settings.atlas_resolution, 4096);
        assert_eq!(settings.tile_resolution, DEFAULT_TILE_RESOLUTION);
    }

    #[test]
    fn test_malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        fs::write(&path, "layer_count: [not a number").unwrap();

        assert_eq!(UserSettings::load(Some(&path)), UserSettings::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.yaml");
        let settings = UserSettings {
            layer_count: 0,
            tile_resolution: 256,
            clear_color: [255, 0, 255, 255],
            ..Default::default()
        };

        settings.save(Some(&path)).unwrap();
        let loaded = UserSettings::load(Some(&path));
        assert_eq!(loaded, settings);
        assert_eq!(loaded.to_config().layer_count, 0);
    }
}
