use std::sync::Arc;

use tracing::error;
use vidtube_db::Database;

use crate::auth::AuthConfig;
use crate::error::ApiError;
use crate::mail::Mailer;
use crate::media::MediaStore;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub auth: AuthConfig,
    pub media: MediaStore,
    pub mailer: Arc<dyn Mailer + Send + Sync>,
    /// Base URL of the web client; mailed links point into it.
    pub public_url: String,
    /// Request body cap, applied to multipart uploads.
    pub max_upload_bytes: usize,
}

impl AppStateInner {
    /// Runs blocking database work off the async runtime.
    pub async fn with_db<F, T>(self: &Arc<Self>, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let state = Arc::clone(self);
        tokio::task::spawn_blocking(move || f(&state.db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                ApiError::Internal(anyhow::anyhow!("database task failed: {}", e))
            })?
            .map_err(ApiError::from)
    }
}
