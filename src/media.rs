use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::{
    constants::IMAGE_FORMATS,
    error::{Error, HtmlError, TypeError},
};

pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

const RECIPE_IMAGE_FOLDER: &str = "recipes";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
}

/// Decodes `data:image/<ext>;base64,<payload>`. The stored extension follows the
/// decoded content, not the declared one.
pub fn decode_image(value: &str) -> Result<DecodedImage, TypeError> {
    let (header, payload) = value
        .strip_prefix("data:image/")
        .and_then(|rest| rest.split_once(";base64,"))
        .ok_or_else(|| TypeError::new(INVALID_IMAGE))?;

    let declared = header.to_lowercase();
    if !IMAGE_FORMATS.iter().any(|(ext, _)| *ext == declared) {
        return Err(TypeError::new(INVALID_IMAGE));
    }

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_| TypeError::new(INVALID_IMAGE))?;

    let extension = sniff_extension(&bytes).ok_or_else(|| TypeError::new(INVALID_IMAGE))?;

    Ok(DecodedImage { bytes, extension })
}

fn sniff_extension(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some("png"),
        [0xFF, 0xD8, 0xFF, ..] => Some("jpg"),
        [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some("gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("webp"),
        _ => None,
    }
}

/// Uploaded files on disk under `root`, served below `url`
#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
    url: String,
}

impl MediaStorage {
    pub fn new(root: PathBuf, url: String) -> Self {
        Self { root, url }
    }

    /// Writes the image and returns its path relative to the media root
    pub async fn save(&self, image: &DecodedImage) -> Result<String, Error> {
        let relative = format!(
            "{RECIPE_IMAGE_FOLDER}/{}.{}",
            uuid::Uuid::new_v4(),
            image.extension
        );

        let folder = self.root.join(RECIPE_IMAGE_FOLDER);
        tokio::fs::create_dir_all(&folder).await.map_err(|e| {
            log::error!("Failed to create {}: {e}", folder.display());
            HtmlError::InternalServerError.default()
        })?;

        let path = self.root.join(&relative);
        tokio::fs::write(&path, &image.bytes).await.map_err(|e| {
            log::error!("Failed to write {}: {e}", path.display());
            HtmlError::InternalServerError.default()
        })?;

        log::debug!("Stored {relative} ({} bytes)", image.bytes.len());
        Ok(relative)
    }

    /// Best effort, a file that is already gone is not an error
    pub async fn remove(&self, relative: &str) {
        if let Err(e) = tokio::fs::remove_file(self.root.join(relative)).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to remove {relative}: {e}");
            }
        }
    }

    pub fn url_for(&self, relative: &str) -> String {
        format!("{}{}", self.url, relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

    fn data_uri(kind: &str, bytes: &[u8]) -> String {
        format!("data:image/{kind};base64,{}", STANDARD.encode(bytes))
    }

    #[test]
    fn png_is_decoded() {
        let image = decode_image(&data_uri("png", PNG)).unwrap();

        assert_eq!(image.extension, "png");
        assert_eq!(image.bytes, PNG);
    }

    #[test]
    fn extension_follows_content() {
        let image = decode_image(&data_uri("jpeg", PNG)).unwrap();
        assert_eq!(image.extension, "png");
    }

    #[test]
    fn non_images_are_rejected() {
        assert!(decode_image(&data_uri("png", b"plain text")).is_err());
        assert!(decode_image(&data_uri("svg+xml", PNG)).is_err());
        assert!(decode_image("data:image/png;base64,***").is_err());
        assert!(decode_image("https://example.com/soup.png").is_err());
    }

    #[test]
    fn urls_are_joined() {
        let storage = MediaStorage::new(PathBuf::from("media"), String::from("/media/"));
        assert_eq!(storage.url_for("recipes/a.png"), "/media/recipes/a.png");
    }

    #[tokio::test]
    async fn images_are_written_below_the_root() {
        let root = std::env::temp_dir().join(format!("foodgram-media-{}", uuid::Uuid::new_v4()));
        let storage = MediaStorage::new(root.clone(), String::from("/media/"));

        let image = decode_image(&data_uri("png", PNG)).unwrap();
        let relative = storage.save(&image).await.unwrap();

        assert!(relative.starts_with("recipes/") && relative.ends_with(".png"));
        assert_eq!(tokio::fs::read(root.join(&relative)).await.unwrap(), PNG);

        storage.remove(&relative).await;
        assert!(!root.join(&relative).exists());

        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
