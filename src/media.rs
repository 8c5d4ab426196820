use std::path::{Path, PathBuf};

use crate::constants::RECIPE_IMAGE_DIR;
use crate::error::ApiError;

/// Image formats accepted for recipe uploads, recognised by their magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
    Gif,
    Webp,
    Bmp,
}

impl ImageKind {
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageKind::Png)
        } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageKind::Jpeg)
        } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            Some(ImageKind::Gif)
        } else if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            Some(ImageKind::Webp)
        } else if data.starts_with(b"BM") && data.len() >= 26 {
            Some(ImageKind::Bmp)
        } else {
            None
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageKind::Png => "png",
            ImageKind::Jpeg => "jpg",
            ImageKind::Gif => "gif",
            ImageKind::Webp => "webp",
            ImageKind::Bmp => "bmp",
        }
    }
}

/// Validates an uploaded file as an image.
pub fn check_image(data: &[u8]) -> Result<ImageKind, ApiError> {
    if data.is_empty() {
        return Err(ApiError::field("image", "The submitted file is empty."));
    }
    ImageKind::sniff(data).ok_or_else(|| {
        ApiError::field(
            "image",
            "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
        )
    })
}

/// Writes the image under a fresh random name and returns its path relative
/// to `media_root`.
pub async fn store_image(
    media_root: &Path,
    data: &[u8],
    kind: ImageKind,
) -> Result<String, ApiError> {
    let relative = format!(
        "{RECIPE_IMAGE_DIR}/{}.{}",
        uuid::Uuid::new_v4(),
        kind.extension()
    );
    let path: PathBuf = media_root.join(&relative);

    write_atomically(&path, data)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to store {}: {e}", path.display())))?;

    log::info!("> Stored image {relative}");
    Ok(relative)
}

async fn write_atomically(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let temp_path = path.with_extension("tmp");
    tokio::fs::write(&temp_path, data).await?;
    tokio::fs::rename(&temp_path, path).await
}

/// Removes a previously stored image. A file that is already gone is not an error.
pub async fn remove_image(media_root: &Path, relative: &str) {
    match tokio::fs::remove_file(media_root.join(relative)).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("> Failed to remove image {relative}: {e}"),
    }
}
