// ─── Artifact Planner ───
// Expands a version descriptor and its asset index into concrete transfers.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};

use crate::core::assets::AssetIndex;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::version::{LibraryEntry, Platform, VersionJson};

use super::item::{ContentItem, ContentKind};

/// Sequential stages of a sync; each completes before the next starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Assets,
    Libraries,
    Client,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Assets => write!(f, "assets"),
            Phase::Libraries => write!(f, "libraries"),
            Phase::Client => write!(f, "client"),
        }
    }
}

/// Everything one version needs, grouped by phase.
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    pub assets: Vec<ContentItem>,
    /// Library and native items.
    pub libraries: Vec<ContentItem>,
    pub client: Option<ContentItem>,
}

impl SyncPlan {
    pub fn phases(&self) -> [(Phase, &[ContentItem]); 3] {
        [
            (Phase::Assets, self.assets.as_slice()),
            (Phase::Libraries, self.libraries.as_slice()),
            (Phase::Client, self.client.as_slice()),
        ]
    }

    pub fn len(&self) -> usize {
        self.assets.len() + self.libraries.len() + usize::from(self.client.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Turns descriptors into `ContentItem`s for one install root.
#[derive(Debug, Clone)]
pub struct ArtifactPlanner {
    pub assets_dir: PathBuf,
    pub libraries_dir: PathBuf,
    pub versions_dir: PathBuf,
    pub resources_url: String,
    /// Also check SHA-1 of asset objects, not just their size.
    pub verify_asset_hashes: bool,
    pub platform: Platform,
}

impl ArtifactPlanner {
    /// Plan the whole version. `index` is `None` when assets are skipped.
    pub fn plan(&self, descriptor: &VersionJson, index: Option<&AssetIndex>) -> LauncherResult<SyncPlan> {
        let assets = match index {
            Some(index) => self.plan_assets(index)?,
            None => Vec::new(),
        };
        let libraries = self.plan_libraries(&descriptor.libraries)?;
        let client = self.plan_client(descriptor)?;

        info!(
            "Planned {} assets, {} libraries/natives and the client for {}",
            assets.len(),
            libraries.len(),
            descriptor.id
        );
        Ok(SyncPlan {
            assets,
            libraries,
            client: Some(client),
        })
    }

    /// One item per distinct object; every virtual path becomes an alias.
    pub fn plan_assets(&self, index: &AssetIndex) -> LauncherResult<Vec<ContentItem>> {
        let objects_dir = self.assets_dir.join("objects");
        let legacy_dir = self.assets_dir.join("virtual").join("legacy");
        let resources_url = self.resources_url.trim_end_matches('/');

        let mut items: Vec<ContentItem> = Vec::new();
        let mut by_hash: HashMap<&str, usize> = HashMap::new();

        for (virtual_path, object) in &index.objects {
            let hash = object.hash.as_str();
            if hash.len() < 2 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(LauncherError::InvalidManifest(format!(
                    "asset {} has invalid hash {:?}",
                    virtual_path, hash
                )));
            }
            let alias = join_relative(&legacy_dir, virtual_path)?;

            if let Some(&existing) = by_hash.get(hash) {
                let item = &mut items[existing];
                if item.size != object.size {
                    return Err(LauncherError::InvalidManifest(format!(
                        "asset object {} listed with sizes {} and {}",
                        hash, item.size, object.size
                    )));
                }
                item.legacy_aliases.push(alias);
                continue;
            }

            let prefix = &hash[..2];
            let mut item = ContentItem::new(
                ContentKind::Asset,
                format!("{}/{}/{}", resources_url, prefix, hash),
                objects_dir.join(prefix).join(hash),
                object.size,
            );
            if self.verify_asset_hashes {
                item.sha1 = Some(hash.to_ascii_lowercase());
            }
            item.legacy_aliases.push(alias);

            by_hash.insert(hash, items.len());
            items.push(item);
        }

        debug!(
            "{} asset paths map to {} objects",
            index.objects.len(),
            items.len()
        );
        Ok(items)
    }

    /// Library and native items allowed on this planner's platform.
    pub fn plan_libraries(&self, libraries: &[LibraryEntry]) -> LauncherResult<Vec<ContentItem>> {
        let mut items = Vec::new();
        let mut seen: HashSet<PathBuf> = HashSet::new();

        for lib in libraries {
            if !lib.is_allowed(&self.platform) {
                debug!("Skipping library (OS rule): {}", lib.display_name());
                continue;
            }

            let mut planned = Vec::with_capacity(2);

            if let Some(artifact) = &lib.downloads.artifact {
                let dest = join_relative(&self.libraries_dir, &artifact.path)?;
                planned.push(
                    ContentItem::new(ContentKind::Library, &artifact.url, dest, artifact.size)
                        .with_sha1(&artifact.sha1),
                );
            }

            if let Some(native) = lib.native_artifact(&self.platform) {
                let dest = join_relative(&self.libraries_dir, &native.path)?;
                let mut item = ContentItem::new(ContentKind::Native, &native.url, dest, native.size)
                    .with_sha1(&native.sha1);
                item.extract = lib.extract.clone();
                planned.push(item);
            }

            if planned.is_empty() && lib.natives.is_none() {
                warn!(
                    "Library {} has no downloadable artifact; skipping",
                    lib.display_name()
                );
            }

            for item in planned {
                if seen.insert(item.dest.clone()) {
                    items.push(item);
                } else {
                    debug!("Duplicate library path {:?} dropped", item.dest);
                }
            }
        }

        Ok(items)
    }

    /// The client binary at `versions/<id>/<id>.jar`.
    pub fn plan_client(&self, descriptor: &VersionJson) -> LauncherResult<ContentItem> {
        let client = descriptor
            .downloads
            .as_ref()
            .and_then(|d| d.client.as_ref())
            .ok_or_else(|| {
                LauncherError::InvalidManifest(format!(
                    "version {} has no client download",
                    descriptor.id
                ))
            })?;

        Ok(ContentItem::new(
            ContentKind::Client,
            &client.url,
            VersionJson::client_jar_path(&self.versions_dir, &descriptor.id),
            client.size,
        )
        .with_sha1(&client.sha1))
    }
}

/// Join a slash-separated manifest path below `base`.
///
/// Components that could leave `base` are rejected.
pub fn join_relative(base: &Path, relative: &str) -> LauncherResult<PathBuf> {
    let mut path = base.to_path_buf();
    let mut pushed = false;

    for segment in relative.split('/').filter(|s| !s.is_empty()) {
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) => {
                path.push(part);
                pushed = true;
            }
            _ => {
                return Err(LauncherError::InvalidManifest(format!(
                    "unsafe path {:?}",
                    relative
                )))
            }
        }
    }

    if !pushed {
        return Err(LauncherError::InvalidManifest(format!(
            "empty path {:?}",
            relative
        )));
    }
    Ok(path)
}
