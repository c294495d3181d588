use std::fs;
use std::path::{Path, PathBuf};

use image::ImageFormat;

use crate::error::{ClipboardError, SaveError};
use crate::record::ImageRecord;

const KNOWN_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

#[derive(Debug, PartialEq, Eq)]
pub struct Saved {
    pub path: PathBuf,
    /// The requested directory was unusable and `fallback` was used instead.
    pub fell_back: bool,
}

// ---------------------------------------------------------------------------
// File naming
// ---------------------------------------------------------------------------

fn sniffed_extension(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => "png",
        Ok(ImageFormat::Jpeg) => "jpg",
        Ok(ImageFormat::Gif) => "gif",
        Ok(ImageFormat::Bmp) => "bmp",
        Ok(ImageFormat::WebP) => "webp",
        _ => "jpg",
    }
}

/// Derive a file name from the last path segment of `source_url`. Unknown or
/// missing extensions are replaced by one sniffed from the payload.
pub fn file_name_for(source_url: &str, bytes: &[u8]) -> String {
    let path = source_url
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let path = path.split_once("://").map_or(path, |(_, rest)| {
        rest.split_once('/').map_or("", |(_, p)| p)
    });
    let base = path.rsplit('/').next().unwrap_or_default();

    let (stem, ext) = match base.rsplit_once('.') {
        Some((stem, ext)) if KNOWN_EXTENSIONS.contains(&ext.to_lowercase().as_str()) => {
            (stem, ext.to_string())
        }
        Some((stem, _)) => (stem, sniffed_extension(bytes).to_string()),
        None => (base, sniffed_extension(bytes).to_string()),
    };
    let stem = if stem.is_empty() { "image" } else { stem };
    format!("{}.{}", stem, ext)
}

/// `name` inside `dir`, or a timestamped variant if that file already exists.
fn unique_target(dir: &Path, name: &str) -> PathBuf {
    let target = dir.join(name);
    if !target.exists() {
        return target;
    }
    let (stem, ext) = name.rsplit_once('.').unwrap_or((name, "jpg"));
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S%.3f");
    dir.join(format!("{}-{}.{}", stem, stamp, ext))
}

// ---------------------------------------------------------------------------
// Save / copy
// ---------------------------------------------------------------------------

/// Write the record's bytes verbatim into `dir`, creating it if needed.
pub fn save_to_dir(
    record: Option<&ImageRecord>,
    dir: &Path,
    fallback: &Path,
) -> Result<Saved, SaveError> {
    let record = record.ok_or(SaveError::NoImage)?;

    let (dir, fell_back) = match fs::create_dir_all(dir) {
        Ok(()) => (dir, false),
        Err(e) => {
            log::warn!(
                "cannot create download directory {}: {}; using {}",
                dir.display(),
                e,
                fallback.display()
            );
            fs::create_dir_all(fallback).map_err(|source| SaveError::Io {
                path: fallback.to_path_buf(),
                source,
            })?;
            (fallback, true)
        }
    };

    let path = unique_target(dir, &file_name_for(record.source_url(), record.bytes()));
    fs::write(&path, record.bytes()).map_err(|source| SaveError::Io {
        path: path.clone(),
        source,
    })?;
    log::info!("saved {} ({} bytes)", path.display(), record.bytes().len());
    Ok(Saved { path, fell_back })
}

pub fn copy_to_clipboard(record: Option<&ImageRecord>) -> Result<(), ClipboardError> {
    let record = record.ok_or(ClipboardError::NoImage)?;
    let frame = record.frame();
    let data = arboard::ImageData {
        width: frame.width as usize,
        height: frame.height as usize,
        bytes: frame.rgba.as_slice().into(),
    };
    let mut clipboard =
        arboard::Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
    clipboard
        .set_image(data)
        .map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
    log::debug!("copied {} to clipboard", record.source_url());
    Ok(())
}
