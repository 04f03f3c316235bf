// ─── Version Manifest ───
// Fetches the top-level version index and resolves version names against it.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http::Transport;

use super::version_file::VersionJson;

pub const VERSION_MANIFEST_URL: &str =
    "https://launchermeta.mojang.com/mc/game/version_manifest.json";

/// Alias resolved to `latest.release`.
pub const LATEST_RELEASE: &str = "latest";
/// Alias resolved to `latest.snapshot`.
pub const LATEST_SNAPSHOT: &str = "latest-snapshot";

/// Top-level version manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionManifest {
    pub latest: LatestVersions,
    pub versions: Vec<VersionEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LatestVersions {
    pub release: String,
    pub snapshot: String,
}

/// A single entry in the manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub version_type: VersionType,
    pub url: String,
    #[serde(rename = "releaseTime", default)]
    pub release_time: Option<DateTime<Utc>>,
}

/// Release channel of a version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VersionType {
    Release,
    Snapshot,
    OldAlpha,
    OldBeta,
    Other(String),
}

impl From<String> for VersionType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "release" => VersionType::Release,
            "snapshot" => VersionType::Snapshot,
            "old_alpha" => VersionType::OldAlpha,
            "old_beta" => VersionType::OldBeta,
            _ => VersionType::Other(raw),
        }
    }
}

impl From<VersionType> for String {
    fn from(value: VersionType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for VersionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionType::Release => write!(f, "release"),
            VersionType::Snapshot => write!(f, "snapshot"),
            VersionType::OldAlpha => write!(f, "old_alpha"),
            VersionType::OldBeta => write!(f, "old_beta"),
            VersionType::Other(raw) => write!(f, "{}", raw),
        }
    }
}

impl VersionManifest {
    /// Find a specific version entry by ID (first match wins).
    pub fn find_version(&self, id: &str) -> Option<&VersionEntry> {
        self.versions.iter().find(|v| v.id == id)
    }

    /// Substitute the `latest` aliases; anything else passes through.
    pub fn resolve_alias<'a>(&'a self, name: &'a str) -> &'a str {
        match name {
            LATEST_RELEASE => &self.latest.release,
            LATEST_SNAPSHOT => &self.latest.snapshot,
            other => other,
        }
    }

    /// Entries of the given types, in manifest order.
    pub fn filter_types(&self, types: &[VersionType]) -> Vec<&VersionEntry> {
        self.versions
            .iter()
            .filter(|v| types.contains(&v.version_type))
            .collect()
    }
}

/// Per-run access to the remote manifest.
///
/// The manifest is fetched at most once per resolver and shared read-only
/// afterwards.
pub struct ManifestResolver {
    transport: Arc<dyn Transport>,
    manifest_url: String,
    manifest: OnceCell<VersionManifest>,
}

impl ManifestResolver {
    pub fn new(transport: Arc<dyn Transport>, manifest_url: impl Into<String>) -> Self {
        Self {
            transport,
            manifest_url: manifest_url.into(),
            manifest: OnceCell::new(),
        }
    }

    pub async fn fetch_manifest(&self) -> LauncherResult<&VersionManifest> {
        self.manifest
            .get_or_try_init(|| async {
                info!("Fetching version manifest from {}", self.manifest_url);
                let raw = self.transport.get_bytes(&self.manifest_url).await?;
                let manifest: VersionManifest = serde_json::from_slice(&raw)?;
                info!("Loaded {} versions from manifest", manifest.versions.len());
                Ok::<_, LauncherError>(manifest)
            })
            .await
    }

    /// Resolve `latest` / `latest-snapshot` to a concrete id.
    ///
    /// Concrete ids are returned as-is without touching the network.
    pub async fn resolve_version_id(&self, name: &str) -> LauncherResult<String> {
        if name != LATEST_RELEASE && name != LATEST_SNAPSHOT {
            return Ok(name.to_string());
        }
        let manifest = self.fetch_manifest().await?;
        let id = manifest.resolve_alias(name).to_string();
        debug!("Resolved {} to {}", name, id);
        Ok(id)
    }

    /// Fetch one version's descriptor.
    ///
    /// Returns the parsed descriptor together with the raw body so callers
    /// can persist it byte-for-byte.
    pub async fn fetch_descriptor(&self, id: &str) -> LauncherResult<(VersionJson, Bytes)> {
        let manifest = self.fetch_manifest().await?;
        let entry = manifest
            .find_version(id)
            .ok_or_else(|| LauncherError::VersionNotFound(id.to_string()))?;

        info!("Fetching version descriptor for {}", entry.id);
        let raw = self.transport.get_bytes(&entry.url).await?;
        let descriptor = VersionJson::parse(&raw)?;
        Ok((descriptor, raw))
    }

    /// Versions of the requested types, in manifest order.
    pub async fn list_versions(&self, types: &[VersionType]) -> LauncherResult<Vec<VersionEntry>> {
        let manifest = self.fetch_manifest().await?;
        Ok(manifest.filter_types(types).into_iter().cloned().collect())
    }
}
