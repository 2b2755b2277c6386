//! Local media storage. Uploaded files land in one flat directory under
//! random names and are served back from `/media`.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::form::UploadedFile;

pub const MEDIA_ROUTE: &str = "/media";

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "avif"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "mkv", "m4v", "ogv", "avi"];

/// What an upload field may hold. Anything outside the allowlist is refused,
/// since stored files are served from the API's own origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    fn allowed(self) -> &'static [&'static str] {
        match self {
            Self::Image => IMAGE_EXTENSIONS,
            Self::Video => VIDEO_EXTENSIONS,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
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

    /// Writes the upload to disk and returns its public URL. The stored
    /// extension always comes from `kind`'s allowlist.
    pub async fn save(&self, file: &UploadedFile, kind: MediaKind) -> Result<String, ApiError> {
        let ext = extension_of(file, kind).ok_or_else(|| {
            ApiError::bad_request(format!("Unsupported {} file type", kind.label()))
        })?;
        let name = format!("{}.{}", Uuid::new_v4(), ext);
        let path = self.root.join(&name);

        let stored = async {
            let mut out = tokio::fs::File::create(&path).await?;
            out.write_all(&file.bytes).await?;
            out.flush().await
        };
        if let Err(e) = stored.await {
            error!("Failed to write media file {}: {}", path.display(), e);
            if let Err(e) = tokio::fs::remove_file(&path).await {
                debug!("No partial media file to clean up at {}: {}", path.display(), e);
            }
            return Err(ApiError::Internal(anyhow::anyhow!("failed to store upload")));
        }

        debug!("Stored {} bytes as {}", file.bytes.len(), name);
        Ok(format!("{MEDIA_ROUTE}/{name}"))
    }

    /// Best-effort delete of a file previously returned by [`save`](Self::save).
    pub async fn remove(&self, url: &str) {
        let Some(path) = self.local_path(url) else {
            warn!("Refusing to delete media outside the store: {}", url);
            return;
        };

        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!("Failed to delete media file {}: {}", path.display(), e);
        }
    }

    fn local_path(&self, url: &str) -> Option<PathBuf> {
        let name = url.strip_prefix(MEDIA_ROUTE)?.strip_prefix('/')?;
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(['/', '\\']);
        valid.then(|| self.root.join(name))
    }
}

/// Extension to store the upload under: the client file name's extension if
/// `kind` allows it, otherwise one derived from the MIME type.
fn extension_of(file: &UploadedFile, kind: MediaKind) -> Option<&'static str> {
    let from_name = file
        .file_name
        .as_deref()
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let from_mime = file
        .content_type
        .as_deref()
        .and_then(|m| m.split('/').nth(1))
        .and_then(|sub| sub.split(['+', ';']).next())
        .map(|sub| match sub.trim().to_ascii_lowercase().as_str() {
            "quicktime" => "mov".to_owned(),
            "x-matroska" => "mkv".to_owned(),
            "x-msvideo" => "avi".to_owned(),
            "ogg" => "ogv".to_owned(),
            other => other.to_owned(),
        });

    from_name.into_iter().chain(from_mime).find_map(|ext| {
        kind.allowed()
            .iter()
            .copied()
            .find(|allowed| *allowed == ext)
    })
}
