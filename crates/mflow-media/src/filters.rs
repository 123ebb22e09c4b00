//! Color adjustment to FFmpeg filter compilation.
//!
//! Each slider maps to one filter primitive. Values within the no-op
//! threshold of their neutral point are dropped, so an untouched job
//! produces no `-vf` at all. Emission order is fixed.

use std::path::Path;

use mflow_models::{ColorAdjustments, FilterParams};
use tracing::warn;

use crate::command::Transcode;
use crate::presets::PresetRegistry;

/// No-op threshold for every slider except temperature.
pub const EPSILON: f64 = 0.001;

/// Neutral white point in kelvin.
pub const NEUTRAL_TEMPERATURE: f64 = 6500.0;

/// No-op threshold for temperature, in kelvin.
pub const TEMPERATURE_EPSILON: f64 = 1.0;

fn active(value: Option<f64>, neutral: f64) -> Option<f64> {
    value.filter(|v| (v - neutral).abs() > EPSILON)
}

pub fn brightness_filter(value: Option<f64>) -> Option<String> {
    active(value, 0.0).map(|b| format!("eq=brightness={:.3}", b))
}

pub fn contrast_filter(value: Option<f64>) -> Option<String> {
    active(value, 1.0).map(|c| format!("eq=contrast={:.3}", c))
}

pub fn saturation_filter(value: Option<f64>) -> Option<String> {
    active(value, 1.0).map(|s| format!("eq=saturation={:.3}", s))
}

pub fn gamma_filter(value: Option<f64>) -> Option<String> {
    active(value, 1.0).map(|g| format!("eq=gamma={:.3}", g))
}

pub fn hue_filter(value: Option<f64>) -> Option<String> {
    active(value, 0.0).map(|h| format!("hue=h={:.1}", h))
}

/// Warm shifts push red, cool shifts push blue; both capped at 0.3.
pub fn temperature_filter(value: Option<f64>) -> Option<String> {
    let t = value.filter(|t| (t - NEUTRAL_TEMPERATURE).abs() > TEMPERATURE_EPSILON)?;
    if t < NEUTRAL_TEMPERATURE {
        let rs = ((NEUTRAL_TEMPERATURE - t) / NEUTRAL_TEMPERATURE * 0.3).min(0.3);
        Some(format!("colorbalance=rs={:.3}", rs))
    } else {
        let bs = ((t - NEUTRAL_TEMPERATURE) / 3500.0 * 0.3).min(0.3);
        Some(format!("colorbalance=bs={:.3}", bs))
    }
}

pub fn shadows_filter(value: Option<f64>) -> Option<String> {
    active(value, 0.0).map(|x| {
        let g = (1.0 - 0.2 * x).clamp(0.5, 2.0);
        format!("eq=gamma_r={:.3}:gamma_g={:.3}:gamma_b={:.3}", g, g, g)
    })
}

pub fn highlights_filter(value: Option<f64>) -> Option<String> {
    active(value, 0.0).map(|x| format!("eq=brightness={:.3}", 0.1 * x))
}

pub fn vibrance_filter(value: Option<f64>) -> Option<String> {
    active(value, 0.0).map(|x| format!("eq=saturation={:.3}", (1.0 + 0.3 * x).clamp(0.0, 3.0)))
}

pub fn exposure_filter(value: Option<f64>) -> Option<String> {
    active(value, 0.0).map(|x| format!("eq=brightness={:.3}", x))
}

pub fn tint_filter(value: Option<f64>) -> Option<String> {
    active(value, 0.0).map(|x| format!("colorbalance=gs={:.3}", (0.01 * x).clamp(-0.5, 0.5)))
}

/// Positive values sharpen, negative values blur.
pub fn sharpness_filter(value: Option<f64>) -> Option<String> {
    active(value, 0.0).map(|x| {
        if x > 0.0 {
            format!("unsharp=5:5:{:.2}:5:5:0.0", (1.5 * x).min(2.0))
        } else {
            format!("boxblur={:.2}", x.abs().min(5.0))
        }
    })
}

/// `lut3d` for a local `.cube` file; omitted with a warning if the file is gone.
pub fn lut_filter(path: Option<&Path>) -> Option<String> {
    let path = path?;
    if path.is_file() {
        Some(format!("lut3d='{}'", path.display()))
    } else {
        warn!("LUT file {} does not exist, skipping", path.display());
        None
    }
}

/// Apply the preset, if any. A resolved preset replaces every slider.
pub fn resolve_adjustments(params: &FilterParams, presets: &PresetRegistry) -> ColorAdjustments {
    match params.preset_name.as_deref() {
        Some(name) => match presets.resolve(name) {
            Some(preset) => preset.clone(),
            None => {
                warn!("Unknown filter preset '{}', using individual adjustments", name);
                params.adjustments.clone()
            }
        },
        None => params.adjustments.clone(),
    }
}

/// Ordered filter chain for the given adjustments.
pub fn build_filter_chain(adj: &ColorAdjustments, lut: Option<&Path>) -> Vec<String> {
    [
        brightness_filter(adj.brightness),
        contrast_filter(adj.contrast),
        saturation_filter(adj.saturation),
        gamma_filter(adj.gamma),
        hue_filter(adj.hue),
        temperature_filter(adj.temperature),
        shadows_filter(adj.shadows),
        highlights_filter(adj.highlights),
        vibrance_filter(adj.vibrance),
        exposure_filter(adj.exposure),
        tint_filter(adj.tint),
        sharpness_filter(adj.sharpness),
        lut_filter(lut),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Full transcode command for a color filter job.
pub fn build_filter_command(
    input: &Path,
    output: &Path,
    params: &FilterParams,
    presets: &PresetRegistry,
    lut: Option<&Path>,
) -> Transcode {
    let adjustments = resolve_adjustments(params, presets);
    let chain = build_filter_chain(&adjustments, lut);

    let mut cmd = Transcode::new(input, output);
    if !chain.is_empty() {
        cmd = cmd.video_filter(&chain.join(","));
    }
    cmd.x264("medium", None)
        .raw(["-profile:v", "main", "-level", "3.1", "-pix_fmt", "yuv420p"])
        .aac("192k")
        .opt("-movflags", "+faststart")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn adjustments() -> ColorAdjustments {
        ColorAdjustments::default()
    }

    #[test]
    fn test_contrast_and_blur_without_neutral_saturation() {
        let adj = ColorAdjustments {
            contrast: Some(1.2),
            saturation: Some(1.0),
            sharpness: Some(-2.0),
            ..adjustments()
        };
        assert_eq!(
            build_filter_chain(&adj, None),
            vec!["eq=contrast=1.200", "boxblur=2.00"]
        );
    }

    #[test]
    fn test_untouched_job_has_no_video_filter() {
        let params = FilterParams::default();
        let args = build_filter_command(
            Path::new("/in.mp4"),
            Path::new("/out.mp4"),
            &params,
            &PresetRegistry::builtin(),
            None,
        )
        .to_args();
        assert!(!args.iter().any(|a| a == "-vf"));
        assert_eq!(
            args,
            vec![
                "-i", "/in.mp4", "-c:v", "libx264", "-preset", "medium", "-profile:v", "main",
                "-level", "3.1", "-pix_fmt", "yuv420p", "-c:a", "aac", "-b:a", "192k",
                "-movflags", "+faststart", "-y", "/out.mp4"
            ]
        );
    }

    #[test]
    fn test_no_op_thresholds() {
        let adj = ColorAdjustments {
            brightness: Some(0.0005),
            contrast: Some(1.0009),
            temperature: Some(6501.0),
            hue: Some(-0.001),
            ..adjustments()
        };
        assert!(build_filter_chain(&adj, None).is_empty());
    }

    #[test]
    fn test_full_chain_order() {
        let adj = ColorAdjustments {
            brightness: Some(0.1),
            contrast: Some(1.1),
            saturation: Some(1.2),
            gamma: Some(0.9),
            hue: Some(15.0),
            temperature: Some(5200.0),
            shadows: Some(1.0),
            highlights: Some(-0.5),
            vibrance: Some(0.5),
            exposure: Some(0.2),
            tint: Some(10.0),
            sharpness: Some(1.0),
        };
        assert_eq!(
            build_filter_chain(&adj, None),
            vec![
                "eq=brightness=0.100",
                "eq=contrast=1.100",
                "eq=saturation=1.200",
                "eq=gamma=0.900",
                "hue=h=15.0",
                "colorbalance=rs=0.060",
                "eq=gamma_r=0.800:gamma_g=0.800:gamma_b=0.800",
                "eq=brightness=-0.050",
                "eq=saturation=1.150",
                "eq=brightness=0.200",
                "colorbalance=gs=0.100",
                "unsharp=5:5:1.50:5:5:0.0",
            ]
        );
    }

    #[test]
    fn test_temperature_directions_and_caps() {
        assert_eq!(temperature_filter(Some(10000.0)).unwrap(), "colorbalance=bs=0.300");
        assert_eq!(temperature_filter(Some(8250.0)).unwrap(), "colorbalance=bs=0.150");
        assert_eq!(temperature_filter(Some(0.0)).unwrap(), "colorbalance=rs=0.300");
        assert_eq!(temperature_filter(Some(6500.5)), None);
        assert_eq!(temperature_filter(None), None);
    }

    #[test]
    fn test_clamps() {
        assert_eq!(shadows_filter(Some(10.0)).unwrap(), "eq=gamma_r=0.500:gamma_g=0.500:gamma_b=0.500");
        assert_eq!(shadows_filter(Some(-10.0)).unwrap(), "eq=gamma_r=2.000:gamma_g=2.000:gamma_b=2.000");
        assert_eq!(vibrance_filter(Some(-10.0)).unwrap(), "eq=saturation=0.000");
        assert_eq!(vibrance_filter(Some(10.0)).unwrap(), "eq=saturation=3.000");
        assert_eq!(tint_filter(Some(100.0)).unwrap(), "colorbalance=gs=0.500");
        assert_eq!(tint_filter(Some(-100.0)).unwrap(), "colorbalance=gs=-0.500");
        assert_eq!(sharpness_filter(Some(3.0)).unwrap(), "unsharp=5:5:2.00:5:5:0.0");
        assert_eq!(sharpness_filter(Some(-9.0)).unwrap(), "boxblur=5.00");
    }

    #[test]
    fn test_preset_overrides_every_slider() {
        let params = FilterParams {
            preset_name: Some("Black_And_White".to_string()),
            adjustments: ColorAdjustments {
                brightness: Some(0.5),
                ..adjustments()
            },
            ..FilterParams::default()
        };
        let adj = resolve_adjustments(&params, &PresetRegistry::builtin());
        assert_eq!(
            build_filter_chain(&adj, None),
            vec!["eq=contrast=1.150", "eq=saturation=0.000"]
        );
    }

    #[test]
    fn test_unknown_preset_keeps_sliders() {
        let params = FilterParams {
            preset_name: Some("neon".to_string()),
            adjustments: ColorAdjustments {
                hue: Some(-30.0),
                ..adjustments()
            },
            ..FilterParams::default()
        };
        let adj = resolve_adjustments(&params, &PresetRegistry::builtin());
        assert_eq!(build_filter_chain(&adj, None), vec!["hue=h=-30.0"]);
    }

    #[test]
    fn test_original_preset_is_empty() {
        let params = FilterParams {
            preset_name: Some("original".to_string()),
            ..FilterParams::default()
        };
        let adj = resolve_adjustments(&params, &PresetRegistry::builtin());
        assert!(build_filter_chain(&adj, None).is_empty());
    }

    #[test]
    fn test_lut_appended_last_when_present() {
        let dir = TempDir::new().unwrap();
        let lut = dir.path().join("look.cube");
        std::fs::write(&lut, "LUT_3D_SIZE 2\n").unwrap();

        let adj = ColorAdjustments {
            exposure: Some(0.3),
            ..adjustments()
        };
        let chain = build_filter_chain(&adj, Some(&lut));
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[1], format!("lut3d='{}'", lut.display()));
    }

    #[test]
    fn test_missing_lut_is_omitted() {
        let dir = TempDir::new().unwrap();
        let lut = dir.path().join("gone.cube");
        assert!(build_filter_chain(&adjustments(), Some(&lut)).is_empty());
    }

    #[test]
    fn test_chain_joined_into_single_vf() {
        let params = FilterParams {
            adjustments: ColorAdjustments {
                contrast: Some(1.2),
                sharpness: Some(-2.0),
                ..adjustments()
            },
            ..FilterParams::default()
        };
        let args = build_filter_command(
            Path::new("/in.mp4"),
            Path::new("/out.mp4"),
            &params,
            &PresetRegistry::builtin(),
            None,
        )
        .to_args();
        assert_eq!(&args[2..4], &["-vf", "eq=contrast=1.200,boxblur=2.00"]);
    }
}
