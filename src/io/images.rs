//! Image loading for detector input.

use crate::io::IoError;
use image::DynamicImage;
use log::{debug, info};
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "bmp", "jpg"];

pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage, IoError> {
    let path = path.as_ref();
    debug!("Loading image {}", path.display());
    Ok(image::open(path)?)
}

/// Loads a single image, or every `png`/`bmp`/`jpg` file of a directory
/// in file name order.
pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<DynamicImage>, IoError> {
    let path = path.as_ref();
    if !path.is_dir() {
        return Ok(vec![load_image(path)?]);
    }

    let files = image_files(path)?;
    info!("Loading {} images from {}", files.len(), path.display());
    files.iter().map(load_image).collect()
}

fn image_files(dir: &Path) -> Result<Vec<PathBuf>, IoError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let supported = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if path.is_file() && supported {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
