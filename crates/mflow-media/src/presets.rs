//! Named color presets.
//!
//! A handful of looks ship built in. Additional presets can be loaded from a
//! JSON object of `name -> adjustments` (same camelCase fields as the job
//! parameters); loaded entries replace built-ins with the same name.

use std::collections::HashMap;
use std::path::Path;

use mflow_models::ColorAdjustments;
use tracing::info;

use crate::error::{MediaError, MediaResult};

/// Environment variable naming an optional preset file.
pub const PRESETS_FILE_ENV: &str = "FILTER_PRESETS_FILE";

/// Adjustments that compile to an empty filter chain.
pub fn identity() -> ColorAdjustments {
    ColorAdjustments {
        brightness: Some(0.0),
        contrast: Some(1.0),
        saturation: Some(1.0),
        temperature: Some(6500.0),
        gamma: Some(1.0),
        shadows: Some(0.0),
        highlights: Some(0.0),
        vibrance: Some(0.0),
        hue: Some(0.0),
        exposure: Some(0.0),
        tint: Some(0.0),
        sharpness: Some(0.0),
    }
}

fn builtin_presets() -> Vec<(&'static str, ColorAdjustments)> {
    vec![
        ("original", identity()),
        (
            "vintage",
            ColorAdjustments {
                brightness: Some(0.05),
                contrast: Some(0.9),
                saturation: Some(0.7),
                temperature: Some(5000.0),
                gamma: Some(1.1),
                shadows: Some(0.2),
                highlights: Some(-0.1),
                vibrance: Some(-0.2),
                tint: Some(5.0),
                sharpness: Some(-0.5),
                ..identity()
            },
        ),
        (
            "cinematic",
            ColorAdjustments {
                brightness: Some(-0.03),
                contrast: Some(1.2),
                saturation: Some(0.9),
                temperature: Some(6000.0),
                shadows: Some(-0.3),
                highlights: Some(0.1),
                vibrance: Some(0.2),
                tint: Some(-5.0),
                sharpness: Some(0.5),
                ..identity()
            },
        ),
        (
            "warm",
            ColorAdjustments {
                temperature: Some(5200.0),
                saturation: Some(1.1),
                brightness: Some(0.02),
                ..identity()
            },
        ),
        (
            "cool",
            ColorAdjustments {
                temperature: Some(8000.0),
                saturation: Some(0.95),
                ..identity()
            },
        ),
        (
            "black_and_white",
            ColorAdjustments {
                saturation: Some(0.0),
                contrast: Some(1.15),
                ..identity()
            },
        ),
        (
            "vivid",
            ColorAdjustments {
                saturation: Some(1.35),
                vibrance: Some(0.5),
                contrast: Some(1.1),
                sharpness: Some(0.4),
                ..identity()
            },
        ),
    ]
}

/// Case-insensitive preset lookup.
#[derive(Debug, Clone)]
pub struct PresetRegistry {
    presets: HashMap<String, ColorAdjustments>,
}

impl Default for PresetRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PresetRegistry {
    pub fn builtin() -> Self {
        let presets = builtin_presets()
            .into_iter()
            .map(|(name, adj)| (name.to_string(), adj))
            .collect();
        Self { presets }
    }

    pub fn empty() -> Self {
        Self {
            presets: HashMap::new(),
        }
    }

    /// Built-ins plus the file named by `FILTER_PRESETS_FILE`, if set.
    pub fn from_env() -> MediaResult<Self> {
        let mut registry = Self::builtin();
        if let Ok(path) = std::env::var(PRESETS_FILE_ENV) {
            let added = registry.load_file(&path)?;
            info!("Loaded {} filter presets from {}", added, path);
        }
        Ok(registry)
    }

    /// Merge presets from a JSON file. Returns how many were loaded.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> MediaResult<usize> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        self.load_json(&raw).map_err(|e| {
            MediaError::invalid_params(format!("preset file {}: {}", path.display(), e))
        })
    }

    pub fn load_json(&mut self, raw: &str) -> MediaResult<usize> {
        let parsed: HashMap<String, ColorAdjustments> = serde_json::from_str(raw)
            .map_err(|e| MediaError::invalid_params(format!("invalid preset JSON: {}", e)))?;
        let count = parsed.len();
        for (name, adj) in parsed {
            self.insert(&name, adj);
        }
        Ok(count)
    }

    pub fn insert(&mut self, name: &str, adjustments: ColorAdjustments) {
        self.presets.insert(name.trim().to_lowercase(), adjustments);
    }

    pub fn resolve(&self, name: &str) -> Option<&ColorAdjustments> {
        self.presets.get(&name.trim().to_lowercase())
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.presets.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = PresetRegistry::builtin();
        assert!(registry.resolve("Vintage").is_some());
        assert!(registry.resolve("  CINEMATIC ").is_some());
        assert!(registry.resolve("neon").is_none());
    }

    #[test]
    fn test_builtin_names() {
        let registry = PresetRegistry::builtin();
        assert_eq!(
            registry.names(),
            vec!["black_and_white", "cinematic", "cool", "original", "vintage", "vivid", "warm"]
        );
    }

    #[test]
    fn test_load_json_overrides_and_adds() {
        let mut registry = PresetRegistry::builtin();
        let added = registry
            .load_json(r#"{"Neon": {"saturation": 1.8}, "warm": {"temperature": 4000}}"#)
            .unwrap();
        assert_eq!(added, 2);

        let neon = registry.resolve("neon").unwrap();
        assert_eq!(neon.saturation, Some(1.8));
        assert_eq!(neon.contrast, None);
        assert_eq!(registry.resolve("warm").unwrap().temperature, Some(4000.0));
    }

    #[test]
    fn test_load_json_rejects_garbage() {
        let mut registry = PresetRegistry::empty();
        assert!(matches!(
            registry.load_json("[1, 2]"),
            Err(MediaError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("presets.json");
        std::fs::write(&path, r#"{"faded": {"contrast": 0.8}}"#).unwrap();

        let mut registry = PresetRegistry::empty();
        assert_eq!(registry.load_file(&path).unwrap(), 1);
        assert_eq!(registry.resolve("FADED").unwrap().contrast, Some(0.8));
    }
}
