//! Destination path planning.

use std::path::{Path, PathBuf};

/// Name used when a song name sanitises to nothing.
const FALLBACK_NAME: &str = "untitled";

/// Replace characters that are illegal in file names on common platforms
/// with their full-width look-alikes.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '\\' => '＼',
            '/' => '／',
            ':' => '：',
            '*' => '＊',
            '?' => '？',
            '"' => '＂',
            '<' => '＜',
            '>' => '＞',
            '|' => '｜',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if cleaned.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        cleaned
    }
}

/// Destination for a song: `save_dir/<sanitised name><extension>`.
///
/// `extension` may be given with or without its leading dot.
pub fn plan_target(save_dir: &Path, name: &str, extension: &str) -> PathBuf {
    let extension = extension.trim_start_matches('.');
    let file_name = if extension.is_empty() {
        sanitize_file_name(name)
    } else {
        format!("{}.{extension}", sanitize_file_name(name))
    };
    save_dir.join(file_name)
}

/// Anchor a relative target onto the save directory.
pub fn resolve_target(save_dir: &Path, target: impl Into<PathBuf>) -> PathBuf {
    let target = target.into();
    if target.is_absolute() {
        target
    } else {
        save_dir.join(target)
    }
}
