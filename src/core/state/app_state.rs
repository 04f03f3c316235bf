use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::assets::RESOURCES_URL;
use crate::core::downloader::{Downloader, DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http::{HttpTransport, Transport};
use crate::core::planner::ArtifactPlanner;
use crate::core::version::{ManifestResolver, Platform, VERSION_MANIFEST_URL};

const APP_DIR_NAME: &str = "mclaunch";
const SETTINGS_FILE: &str = "launcher_settings.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherSettings {
    pub manifest_url: String,
    pub resources_url: String,
    pub concurrency: usize,
    pub download_chunk_size: usize,
    /// Check SHA-1 of asset objects, not only their size.
    pub verify_asset_hashes: bool,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            manifest_url: VERSION_MANIFEST_URL.into(),
            resources_url: RESOURCES_URL.into(),
            concurrency: DEFAULT_CONCURRENCY,
            download_chunk_size: DEFAULT_CHUNK_SIZE,
            verify_asset_hashes: false,
        }
    }
}

/// Everything a command needs for one install root.
pub struct AppState {
    pub data_dir: PathBuf,
    pub settings: LauncherSettings,
    transport: Arc<dyn Transport>,
}

impl AppState {
    /// State for `data_dir` over HTTP, with settings read from disk.
    pub fn new(data_dir: impl Into<PathBuf>) -> LauncherResult<Self> {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new()?);
        Ok(Self::with_transport(data_dir, transport))
    }

    pub fn with_transport(data_dir: impl Into<PathBuf>, transport: Arc<dyn Transport>) -> Self {
        let data_dir = data_dir.into();
        let settings = load_settings_from_disk(&data_dir).unwrap_or_default();
        Self {
            data_dir,
            settings,
            transport,
        }
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.data_dir.join("versions")
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.data_dir.join("libraries")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.data_dir.join("assets")
    }

    pub fn natives_dir(&self) -> PathBuf {
        self.data_dir.join("natives")
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    /// A fresh resolver; the manifest is fetched at most once through it.
    pub fn resolver(&self) -> ManifestResolver {
        ManifestResolver::new(self.transport(), self.settings.manifest_url.clone())
    }

    pub fn planner(&self, platform: Platform) -> ArtifactPlanner {
        ArtifactPlanner {
            assets_dir: self.assets_dir(),
            libraries_dir: self.libraries_dir(),
            versions_dir: self.versions_dir(),
            resources_url: self.settings.resources_url.clone(),
            verify_asset_hashes: self.settings.verify_asset_hashes,
            platform,
        }
    }

    pub fn downloader(&self) -> Downloader {
        Downloader::new(self.transport())
            .with_concurrency(self.settings.concurrency)
            .with_chunk_size(self.settings.download_chunk_size)
    }

    pub fn save_settings(&self) -> LauncherResult<()> {
        let settings_path = self.data_dir.join(SETTINGS_FILE);
        std::fs::create_dir_all(&self.data_dir).map_err(|e| LauncherError::io(&self.data_dir, e))?;
        let json = serde_json::to_string_pretty(&self.settings)?;
        std::fs::write(&settings_path, json).map_err(|e| LauncherError::io(&settings_path, e))
    }
}

/// Read `launcher_settings.json`; `None` when missing or unreadable.
pub fn load_settings_from_disk(data_dir: &Path) -> Option<LauncherSettings> {
    let path = data_dir.join(SETTINGS_FILE);
    let raw = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(settings) => Some(settings),
        Err(e) => {
            warn!("Ignoring malformed settings at {:?}: {}", path, e);
            None
        }
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}
