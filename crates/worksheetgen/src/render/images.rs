//! The Image Map: generated images keyed by their description.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::{GenericImageView, ImageFormat};

use crate::error::RenderError;

/// A generated image written to the job workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedImage {
    pub path: PathBuf,
}

impl MaterializedImage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn read(&self) -> Result<Vec<u8>, RenderError> {
        std::fs::read(&self.path).map_err(|e| RenderError::ReadImage {
            path: self.path.clone(),
            source: e,
        })
    }

    /// Reads and decodes the image. `None` when it is unreadable or not an image.
    pub fn load(&self) -> Option<LoadedImage> {
        let bytes = match self.read() {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Image unavailable, rendering placeholder: {}", e);
                return None;
            }
        };
        let loaded = LoadedImage::decode(bytes);
        if loaded.is_none() {
            log::warn!(
                "Image '{}' could not be decoded, rendering placeholder",
                crate::sanitize::redact_path(&self.path)
            );
        }
        loaded
    }
}

/// A decoded image with the metadata both renderers need.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    image: image::DynamicImage,
}

impl LoadedImage {
    pub fn decode(bytes: Vec<u8>) -> Option<Self> {
        let format = image::guess_format(&bytes).ok()?;
        let image = image::load_from_memory_with_format(&bytes, format).ok()?;
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self {
            bytes,
            format,
            width,
            height,
            image,
        })
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    pub fn is_jpeg(&self) -> bool {
        self.format == ImageFormat::Jpeg
    }

    /// Raw 8-bit RGB pixels.
    pub fn to_rgb(&self) -> Vec<u8> {
        self.image.to_rgb8().into_raw()
    }
}

/// Images generated for one run, keyed by description.
#[derive(Debug, Clone, Default)]
pub struct ImageMap {
    images: HashMap<String, MaterializedImage>,
}

impl ImageMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, description: impl Into<String>, image: MaterializedImage) {
        self.images.insert(description.into(), image);
    }

    pub fn get(&self, description: &str) -> Option<&MaterializedImage> {
        self.images.get(description)
    }

    pub fn contains(&self, description: &str) -> bool {
        self.images.contains_key(description)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.images.values().map(|i| i.path.as_path())
    }

    /// Loads and decodes the image for a description, if present and valid.
    pub fn load(&self, description: &str) -> Option<LoadedImage> {
        self.get(description).and_then(MaterializedImage::load)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::png_bytes;
    use super::*;

    #[test]
    fn test_decode_png() {
        let loaded = LoadedImage::decode(png_bytes(4, 3)).unwrap();
        assert_eq!((loaded.width, loaded.height), (4, 3));
        assert_eq!(loaded.mime_type(), "image/png");
        assert!(!loaded.is_jpeg());
        assert_eq!(loaded.to_rgb().len(), 4 * 3 * 3);
    }

    #[test]
    fn test_decode_garbage_is_none() {
        assert!(LoadedImage::decode(b"not an image".to_vec()).is_none());
    }

    #[test]
    fn test_map_load_missing_file_is_none() {
        let mut map = ImageMap::new();
        map.insert("a cat", MaterializedImage::new("/nonexistent/image_1.png"));
        assert!(map.contains("a cat"));
        assert!(map.load("a cat").is_none());
        assert!(map.load("a dog").is_none());
    }

    #[test]
    fn test_map_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image_1.png");
        std::fs::write(&path, png_bytes(2, 2)).unwrap();

        let mut map = ImageMap::new();
        map.insert("a cat", MaterializedImage::new(&path));
        assert_eq!(map.len(), 1);
        assert!(map.load("a cat").is_some());
        assert_eq!(map.paths().count(), 1);
    }
}
