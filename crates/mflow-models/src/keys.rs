//! Object key layout.
//!
//! Keys follow `<kind>/<scope>/<userId>/<subkind>/<filename>` and always
//! embed a millisecond timestamp, so re-processing a job writes a new key
//! instead of overwriting the previous output.

use std::path::Path;

/// Last path segment of a key or path.
pub fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// File name without its final extension.
pub fn file_stem(key: &str) -> &str {
    let name = file_name(key);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(idx) => &name[..idx],
    }
}

/// Keep key components free of separators and shell-hostile characters.
pub fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn filtered_video(user_id: &str, ts: i64) -> String {
    format!("videos/filtered/{}/filtered/filtered_{}.mp4", user_id, ts)
}

pub fn speed_video(user_id: &str, ts: i64) -> String {
    format!("speed-videos/{}/speed_{}.mp4", user_id, ts)
}

pub fn compressed(user_id: &str, ts: i64, source_key: &str) -> String {
    format!(
        "Compression/processed/{}/compressed_{}_{}",
        user_id,
        ts,
        sanitize_component(file_name(source_key))
    )
}

pub fn converted(user_id: &str, ts: i64, source_key: &str, extension: &str) -> String {
    format!(
        "conversions/{}/processed/converted_{}_{}.{}",
        user_id,
        ts,
        sanitize_component(file_stem(source_key)),
        extension
    )
}

pub fn background_removed(user_id: &str, ts: i64, source_key: &str) -> String {
    format!(
        "image/standalone/{}/processed/{}_{}.png",
        user_id,
        ts,
        sanitize_component(file_stem(source_key))
    )
}

pub fn document_output(user_id: &str, ts: i64, file: &str) -> String {
    format!("documents/{}/{}/output/{}", user_id, ts, sanitize_component(file))
}

pub fn aspect_ratio_video(user_id: &str, ts: i64, source_key: &str) -> String {
    format!(
        "aspect_ratio/{}/processed/aspect_ratio_{}_{}.mp4",
        user_id,
        ts,
        sanitize_component(file_stem(source_key))
    )
}

pub fn subtitled_video(user_id: &str, ts: i64, source_key: &str) -> String {
    format!(
        "subtitles/{}/processed/subtitled_{}_{}.mp4",
        user_id,
        ts,
        sanitize_component(file_stem(source_key))
    )
}

/// Scratch file name for a downloaded lookup table.
pub fn lut_file_name(ts: i64) -> String {
    format!("lut_{}.cube", ts)
}

/// Extension of a key or path, lower-cased.
pub fn extension(path: impl AsRef<Path>) -> Option<String> {
    path.as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}
