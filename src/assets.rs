use std::path::PathBuf;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::fs;

// what the store hands back after a successful write. file_path is what goes
// in the song row (and over the wire), asset_id is what delete() wants later
pub struct StoredAsset {
    pub file_path: String,
    pub asset_id: String,
}

// seam in front of wherever the audio actually lives. uploads write here
// BEFORE the song row exists, so a failed insert has to come back through
// delete() to release the asset again
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn store(&self, filename: &str, bytes: &[u8]) -> Result<StoredAsset>;
    async fn delete(&self, asset_id: &str) -> Result<()>;
}

// plain directory-on-disk store, served back out under /media
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    // keep filenames boring so they can't do anything funny in a path
    fn sanitize(name: &str) -> String {
        name.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

#[async_trait]
impl AssetStore for DiskStore {
    async fn store(&self, filename: &str, bytes: &[u8]) -> Result<StoredAsset> {
        // timestamp prefix keeps repeated uploads of the same file apart
        let name = format!(
            "{}-{}",
            chrono::Utc::now().timestamp_millis(),
            Self::sanitize(filename)
        );

        fs::write(self.root.join(&name), bytes).await?;

        Ok(StoredAsset {
            file_path: format!("/media/{name}"),
            asset_id: name,
        })
    }

    async fn delete(&self, asset_id: &str) -> Result<()> {
        if asset_id.contains("..") || asset_id.contains('/') {
            bail!("bad asset id: {asset_id}");
        }

        fs::remove_file(self.root.join(asset_id)).await?;
        Ok(())
    }
}
