use std::path::{Component, Path, PathBuf};

use base64::{engine::general_purpose, Engine as _};

use crate::{
    constants::{IMAGE_EXTENSIONS, MEDIA_URL, RECIPE_IMAGE_DIR},
    error::{Error, HtmlError},
};

/// Public url of a stored media path.
pub fn media_url(path: &str) -> String {
    if path.is_empty() || path.starts_with(MEDIA_URL) {
        return path.to_string();
    }
    format!("{MEDIA_URL}{path}")
}

/// Decodes a `data:image/<format>;base64,<payload>` uri into bytes and a file extension.
pub fn decode_image(data: &str) -> Result<(Vec<u8>, &'static str), Error> {
    let invalid = || Error::field("image", "Upload a valid base64 encoded image.");

    let (header, payload) = data.split_once(',').ok_or_else(invalid)?;
    let format = header
        .strip_prefix("data:image/")
        .and_then(|rest| rest.strip_suffix(";base64"))
        .ok_or_else(invalid)?;

    let extension = IMAGE_EXTENSIONS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(format))
        .map(|(_, extension)| *extension)
        .ok_or_else(|| Error::field("image", "Unsupported image format."))?;

    let bytes = general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|_| invalid())?;
    if bytes.is_empty() {
        return Err(invalid());
    }

    Ok((bytes, extension))
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stores a recipe image and returns its path relative to the media root.
    pub async fn save_recipe_image(&self, data: &str) -> Result<String, Error> {
        let (bytes, extension) = decode_image(data)?;
        let relative = format!("{RECIPE_IMAGE_DIR}/{}.{extension}", uuid::Uuid::new_v4());

        let directory = self.root.join(RECIPE_IMAGE_DIR);
        tokio::fs::create_dir_all(&directory).await.map_err(|e| {
            log::error!("Failed to create {}: {e}", directory.display());
            HtmlError::InternalServerError.default()
        })?;

        let path = self.root.join(&relative);
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            log::error!("Failed to write {}: {e}", path.display());
            HtmlError::InternalServerError.default()
        })?;

        log::debug!("Stored image {relative}");
        Ok(relative)
    }

    /// Failures are logged only; a stale file never fails the request.
    pub async fn remove(&self, relative: &str) {
        let relative = Path::new(relative);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            log::warn!("Refusing to remove media outside root: {}", relative.display());
            return;
        }

        let path = self.root.join(relative);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            log::warn!("Failed to remove {}: {e}", path.display());
        }
    }
}
