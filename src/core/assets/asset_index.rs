use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::core::downloader::sha1_hex;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http::Transport;
use crate::core::version::AssetIndexInfo;

/// Asset index of one version: virtual path → content-addressed object.
#[derive(Debug, Clone)]
pub struct AssetIndex {
    pub id: String,
    pub objects: BTreeMap<String, AssetObject>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AssetObject {
    pub hash: String,
    pub size: u64,
}

#[derive(Deserialize)]
struct AssetIndexFile {
    #[serde(default)]
    objects: BTreeMap<String, AssetObject>,
}

impl AssetIndex {
    pub fn parse(id: &str, raw: &[u8]) -> LauncherResult<Self> {
        let file: AssetIndexFile = serde_json::from_slice(raw)?;
        Ok(Self {
            id: id.to_string(),
            objects: file.objects,
        })
    }

    /// `assets/indexes/<id>.json`
    pub fn index_path(assets_dir: &Path, id: &str) -> PathBuf {
        assets_dir.join("indexes").join(format!("{}.json", id))
    }

    /// Use the stored index when its SHA-1 still matches the descriptor,
    /// otherwise download, verify, and store it.
    pub async fn load_or_fetch(
        transport: &dyn Transport,
        info: &AssetIndexInfo,
        assets_dir: &Path,
    ) -> LauncherResult<Self> {
        let index_path = Self::index_path(assets_dir, &info.id);

        if let Ok(existing) = tokio::fs::read(&index_path).await {
            if sha1_hex(&existing) == info.sha1 {
                debug!("Reusing asset index {:?}", index_path);
                return Self::parse(&info.id, &existing);
            }
        }

        info!("Fetching asset index {}", info.id);
        let raw = transport.get_bytes(&info.url).await?;

        let actual = sha1_hex(&raw);
        if actual != info.sha1 {
            return Err(LauncherError::Sha1Mismatch {
                path: index_path,
                expected: info.sha1.clone(),
                actual,
            });
        }

        if let Some(parent) = index_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }
        tokio::fs::write(&index_path, &raw)
            .await
            .map_err(|e| LauncherError::io(&index_path, e))?;

        let index = Self::parse(&info.id, &raw)?;
        info!("Asset index {} lists {} objects", index.id, index.objects.len());
        Ok(index)
    }

    /// Read a stored index without the network.
    pub async fn load_local(assets_dir: &Path, id: &str) -> LauncherResult<Self> {
        let path = Self::index_path(assets_dir, id);
        let raw = tokio::fs::read(&path)
            .await
            .map_err(|e| LauncherError::Io { path, source: e })?;
        Self::parse(id, &raw)
    }
}
