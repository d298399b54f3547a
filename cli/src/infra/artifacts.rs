//! Writes AmneziaWG client configs to uniquely named local files.

use std::io::Write as _;
use std::path::PathBuf;

use crate::application::ports::ArtifactWriter;
use crate::domain::ProvisionError;

/// Writes `wg_<stem>_<random>.conf` files (mode 0600 on unix) into a
/// directory. Files are kept for the caller to deliver and delete.
#[derive(Debug, Clone)]
pub struct ArtifactDir {
    dir: PathBuf,
}

impl ArtifactDir {
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Configured directory, or the system temp dir.
    #[must_use]
    pub fn from_setting(dir: Option<PathBuf>) -> Self {
        Self::new(dir.unwrap_or_else(std::env::temp_dir))
    }
}

impl ArtifactWriter for ArtifactDir {
    async fn write_artifact(&self, stem: &str, contents: &str) -> Result<PathBuf, ProvisionError> {
        let dir = self.dir.clone();
        let prefix = format!("wg_{stem}_");
        let contents = contents.to_string();
        let written = tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&dir).map_err(|e| ProvisionError::local(&dir, e))?;
            let mut file = tempfile::Builder::new()
                .prefix(&prefix)
                .suffix(".conf")
                .tempfile_in(&dir)
                .map_err(|e| ProvisionError::local(&dir, e))?;
            file.write_all(contents.as_bytes())
                .map_err(|e| ProvisionError::local(file.path(), e))?;
            let (_, path) = file
                .keep()
                .map_err(|e| ProvisionError::local(&dir, e.error))?;
            Ok::<_, ProvisionError>(path)
        })
        .await
        .map_err(|e| ProvisionError::local(&self.dir, std::io::Error::other(e)))??;
        tracing::debug!(path = %written.display(), "wrote client config");
        Ok(written)
    }
}
