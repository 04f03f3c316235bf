// ─── Commands ───
// The install / list / launch flows an outer CLI drives.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::assets::AssetIndex;
use crate::core::auth::LaunchAccountProfile;
use crate::core::downloader::{PhaseSkips, SyncSummary};
use crate::core::error::LauncherResult;
use crate::core::launch::{self, NativeExtractor, NativesSession};
use crate::core::progress::ProgressReporter;
use crate::core::state::AppState;
use crate::core::version::{LaunchArguments, Platform, VersionEntry, VersionJson, VersionType};

#[derive(Debug, Clone, Deserialize)]
pub struct InstallRequest {
    /// A concrete id, `latest`, or `latest-snapshot`.
    pub version: String,
    #[serde(default)]
    pub skip_assets: bool,
    #[serde(default)]
    pub skip_libraries: bool,
    /// Overrides the configured worker count.
    #[serde(default)]
    pub concurrency: Option<usize>,
}

impl InstallRequest {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            skip_assets: false,
            skip_libraries: false,
            concurrency: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallOutcome {
    pub version_id: String,
    pub summary: SyncSummary,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LaunchRequest {
    pub version: String,
    #[serde(default)]
    pub account: LaunchAccountProfile,
}

/// Everything the process launcher needs besides the Java binary.
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub classpath: Vec<PathBuf>,
    pub natives_dir: PathBuf,
    pub main_class: String,
    pub arguments: LaunchArguments,
    pub substitutions: HashMap<String, String>,
}

/// Download and verify everything one version needs.
pub async fn install_version(
    state: &AppState,
    request: InstallRequest,
    reporter: &ProgressReporter,
) -> LauncherResult<InstallOutcome> {
    let resolver = state.resolver();
    let version_id = resolver.resolve_version_id(&request.version).await?;
    info!("Installing version {}", version_id);

    let (descriptor, raw) = resolver.fetch_descriptor(&version_id).await?;
    VersionJson::save_to(&raw, &state.versions_dir(), &version_id).await?;

    let index = if request.skip_assets {
        None
    } else {
        match &descriptor.asset_index {
            Some(info) => Some(
                AssetIndex::load_or_fetch(state.transport().as_ref(), info, &state.assets_dir())
                    .await?,
            ),
            None => {
                warn!("Version {} declares no asset index", version_id);
                None
            }
        }
    };

    let plan = state
        .planner(Platform::current())
        .plan(&descriptor, index.as_ref())?;

    let mut downloader = state.downloader();
    if let Some(n) = request.concurrency {
        downloader = downloader.with_concurrency(n);
    }
    let skips = PhaseSkips {
        assets: request.skip_assets,
        libraries: request.skip_libraries,
    };
    let summary = downloader.sync_plan(&plan, reporter, skips).await?;

    info!(
        "Installed {}: {} fetched, {} reused, {} bytes",
        version_id, summary.fetched, summary.reused, summary.bytes
    );
    Ok(InstallOutcome {
        version_id,
        summary,
    })
}

/// Remote versions of the given types, in manifest order.
///
/// An empty filter lists releases only.
pub async fn list_versions(
    state: &AppState,
    types: &[VersionType],
) -> LauncherResult<Vec<VersionEntry>> {
    let release_only = [VersionType::Release];
    let types = if types.is_empty() { &release_only[..] } else { types };
    state.resolver().list_versions(types).await
}

/// Unpack natives and gather launch inputs for an installed version.
///
/// The caller owns the returned session and cleans it up once the game
/// process has exited.
pub async fn prepare_launch(
    state: &AppState,
    request: LaunchRequest,
) -> LauncherResult<(LaunchPlan, NativesSession)> {
    let versions_dir = state.versions_dir();
    let descriptor = VersionJson::load_local(&versions_dir, &request.version).await?;
    info!("Preparing launch of {}", descriptor.id);

    let libraries = state
        .planner(Platform::current())
        .plan_libraries(&descriptor.libraries)?;

    let session = NativeExtractor::new(&state.data_dir, state.natives_dir())
        .extract(&libraries)
        .await?;

    let client_jar = VersionJson::client_jar_path(&versions_dir, &descriptor.id);
    let classpath = launch::classpath_entries(&libraries, &client_jar);
    let joined = match launch::build_classpath(&classpath) {
        Ok(joined) => joined,
        Err(e) => {
            if let Err(cleanup_err) = session.cleanup().await {
                warn!("Could not remove natives: {}", cleanup_err);
            }
            return Err(e);
        }
    };

    let account = request.account.sanitized();
    let substitutions =
        launch::substitutions(&state.data_dir, &descriptor, &account, session.dir(), &joined);

    let plan = LaunchPlan {
        classpath,
        natives_dir: session.dir().to_path_buf(),
        main_class: descriptor.main_class,
        arguments: descriptor.arguments,
        substitutions,
    };
    Ok((plan, session))
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::Path;
    use std::sync::Arc;

    use zip::write::SimpleFileOptions;

    use super::*;
    use crate::core::downloader::sha1_hex;
    use crate::core::error::LauncherError;
    use crate::core::http::testing::MockTransport;
    use crate::core::http::Transport;

    const MANIFEST_URL: &str = "http://meta.test/version_manifest.json";
    const RESOURCES: &str = "http://resources.test";

    struct Fixture {
        transport: Arc<MockTransport>,
        client: &'static [u8],
        library: &'static [u8],
        asset: &'static [u8],
    }

    impl Fixture {
        fn new() -> Self {
            let fixture = Self {
                transport: Arc::new(MockTransport::new()),
                client: b"client jar bytes",
                library: b"library jar bytes",
                asset: b"sound",
            };
            fixture.serve();
            fixture
        }

        fn serve(&self) {
            let asset_hash = sha1_hex(self.asset);
            let index = serde_json::json!({
                "objects": {
                    "sounds/a.ogg": {"hash": asset_hash, "size": self.asset.len()},
                    "sounds/b.ogg": {"hash": asset_hash, "size": self.asset.len()}
                }
            })
            .to_string();

            let descriptor = serde_json::json!({
                "id": "1.0",
                "type": "release",
                "mainClass": "net.minecraft.client.main.Main",
                "minecraftArguments": "--username ${auth_player_name} --version ${version_name}",
                "assetIndex": {
                    "id": "legacy",
                    "url": "http://meta.test/legacy.json",
                    "sha1": sha1_hex(index.as_bytes()),
                    "size": index.len()
                },
                "downloads": {
                    "client": {
                        "url": "http://meta.test/client.jar",
                        "sha1": sha1_hex(self.client),
                        "size": self.client.len()
                    }
                },
                "libraries": [{
                    "name": "org.example:lib:1.0",
                    "downloads": {
                        "artifact": {
                            "path": "org/example/lib/1.0/lib-1.0.jar",
                            "url": "http://libs.test/lib-1.0.jar",
                            "sha1": sha1_hex(self.library),
                            "size": self.library.len()
                        }
                    }
                }]
            })
            .to_string();

            let manifest = serde_json::json!({
                "latest": {"release": "1.0", "snapshot": "1.1-pre"},
                "versions": [
                    {"id": "1.1-pre", "type": "snapshot", "url": "http://meta.test/1.1-pre.json"},
                    {"id": "1.0", "type": "release", "url": "http://meta.test/1.0.json"},
                    {"id": "b1.7", "type": "old_beta", "url": "http://meta.test/b1.7.json"}
                ]
            })
            .to_string();

            self.transport.serve(MANIFEST_URL, manifest);
            self.transport.serve("http://meta.test/1.0.json", descriptor);
            self.transport.serve("http://meta.test/legacy.json", index);
            self.transport.serve("http://meta.test/client.jar", self.client);
            self.transport.serve("http://libs.test/lib-1.0.jar", self.library);
            self.transport
                .serve(&format!("{}/{}/{}", RESOURCES, &asset_hash[..2], asset_hash), self.asset);
        }

        fn state(&self, root: &Path) -> AppState {
            let transport: Arc<dyn Transport> = self.transport.clone();
            let mut state = AppState::with_transport(root, transport);
            state.settings.manifest_url = MANIFEST_URL.into();
            state.settings.resources_url = RESOURCES.into();
            state
        }
    }

    #[tokio::test]
    async fn install_places_every_file_and_second_run_reuses_them() {
        let root = tempfile::tempdir().unwrap();
        let fixture = Fixture::new();
        let state = fixture.state(root.path());

        let outcome = install_version(&state, InstallRequest::new("latest"), &ProgressReporter::new())
            .await
            .unwrap();
        assert_eq!(outcome.version_id, "1.0");
        assert_eq!(outcome.summary.fetched, 3);

        let asset_hash = sha1_hex(fixture.asset);
        let base = root.path();
        assert!(base.join("versions/1.0/1.0.json").is_file());
        assert_eq!(std::fs::read(base.join("versions/1.0/1.0.jar")).unwrap(), fixture.client);
        assert_eq!(
            std::fs::read(base.join("libraries/org/example/lib/1.0/lib-1.0.jar")).unwrap(),
            fixture.library
        );
        assert!(base
            .join("assets/objects")
            .join(&asset_hash[..2])
            .join(&asset_hash)
            .is_file());
        assert!(base.join("assets/virtual/legacy/sounds/a.ogg").is_file());
        assert!(base.join("assets/virtual/legacy/sounds/b.ogg").is_file());
        assert!(base.join("assets/indexes/legacy.json").is_file());

        let requests = fixture.transport.requests();
        let again = install_version(&state, InstallRequest::new("1.0"), &ProgressReporter::new())
            .await
            .unwrap();
        assert_eq!(again.summary.fetched, 0);
        assert_eq!(again.summary.reused, 3);
        // Only the manifest and descriptor are fetched again.
        assert_eq!(fixture.transport.requests(), requests + 2);
    }

    #[tokio::test]
    async fn skipped_phases_touch_neither_assets_nor_libraries() {
        let root = tempfile::tempdir().unwrap();
        let fixture = Fixture::new();
        let state = fixture.state(root.path());

        let mut request = InstallRequest::new("1.0");
        request.skip_assets = true;
        request.skip_libraries = true;
        let outcome = install_version(&state, request, &ProgressReporter::new())
            .await
            .unwrap();

        assert_eq!(outcome.summary.fetched, 1);
        assert!(!root.path().join("assets").exists());
        assert!(!root.path().join("libraries").exists());
        assert!(root.path().join("versions/1.0/1.0.jar").is_file());
    }

    #[tokio::test]
    async fn unknown_version_is_reported() {
        let root = tempfile::tempdir().unwrap();
        let fixture = Fixture::new();
        let state = fixture.state(root.path());

        let err = install_version(&state, InstallRequest::new("9.9"), &ProgressReporter::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::VersionNotFound(id) if id == "9.9"));
    }

    #[tokio::test]
    async fn list_defaults_to_releases() {
        let root = tempfile::tempdir().unwrap();
        let fixture = Fixture::new();
        let state = fixture.state(root.path());

        let releases = list_versions(&state, &[]).await.unwrap();
        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0].id, "1.0");

        let mixed = list_versions(&state, &[VersionType::Snapshot, VersionType::OldBeta])
            .await
            .unwrap();
        let ids: Vec<_> = mixed.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["1.1-pre", "b1.7"]);
    }

    #[tokio::test]
    async fn prepare_launch_builds_plan_from_installed_files() {
        let root = tempfile::tempdir().unwrap();
        let fixture = Fixture::new();
        let state = fixture.state(root.path());
        install_version(&state, InstallRequest::new("1.0"), &ProgressReporter::new())
            .await
            .unwrap();

        let request = LaunchRequest {
            version: "1.0".into(),
            account: LaunchAccountProfile::offline("Alex"),
        };
        let (plan, session) = prepare_launch(&state, request).await.unwrap();

        assert_eq!(plan.main_class, "net.minecraft.client.main.Main");
        assert_eq!(plan.classpath.len(), 2);
        assert!(plan.classpath[0].ends_with("lib-1.0.jar"));
        assert!(plan.classpath[1].ends_with("1.0.jar"));
        assert!(matches!(plan.arguments, LaunchArguments::Legacy(ref s) if s.contains("${auth_player_name}")));
        assert_eq!(plan.substitutions["auth_player_name"], "Alex");
        assert_eq!(plan.substitutions["assets_index_name"], "legacy");
        assert!(plan.substitutions["classpath"].contains("lib-1.0.jar"));

        assert!(session.created());
        assert!(plan.natives_dir.is_dir());
        session.cleanup().await.unwrap();
        assert!(!plan.natives_dir.exists());
    }

    #[tokio::test]
    async fn prepare_launch_extracts_natives() {
        let root = tempfile::tempdir().unwrap();
        let fixture = Fixture::new();
        let state = fixture.state(root.path());

        let os = Platform::current().name;
        let native_rel = "org/example/native/1.0/native-1.0-natives.jar";
        let native_path = root.path().join("libraries").join(native_rel);
        std::fs::create_dir_all(native_path.parent().unwrap()).unwrap();
        let mut writer = zip::ZipWriter::new(std::fs::File::create(&native_path).unwrap());
        let options = SimpleFileOptions::default();
        writer.start_file("META-INF/MANIFEST.MF", options).unwrap();
        writer.write_all(b"Manifest-Version: 1.0\n").unwrap();
        writer.start_file("libnative.so", options).unwrap();
        writer.write_all(b"\x7fELF").unwrap();
        writer.finish().unwrap();

        let mut natives = serde_json::Map::new();
        natives.insert(os, "natives".into());
        let descriptor = serde_json::json!({
            "id": "1.0",
            "mainClass": "Main",
            "libraries": [{
                "name": "org.example:native:1.0",
                "downloads": {
                    "classifiers": {
                        "natives": {
                            "path": native_rel,
                            "url": "http://libs.test/native.jar",
                            "sha1": "00",
                            "size": 1
                        }
                    }
                },
                "natives": natives,
                "extract": {"exclude": ["META-INF/"]}
            }]
        })
        .to_string();
        VersionJson::save_to(descriptor.as_bytes(), &state.versions_dir(), "1.0")
            .await
            .unwrap();

        let (plan, session) = prepare_launch(
            &state,
            LaunchRequest {
                version: "1.0".into(),
                account: LaunchAccountProfile::default(),
            },
        )
        .await
        .unwrap();

        assert!(plan.natives_dir.join("libnative.so").is_file());
        assert!(!plan.natives_dir.join("META-INF").exists());
        assert_eq!(plan.classpath.len(), 1);
        session.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn prepare_launch_requires_installed_descriptor() {
        let root = tempfile::tempdir().unwrap();
        let state = Fixture::new().state(root.path());

        let err = prepare_launch(
            &state,
            LaunchRequest {
                version: "1.0".into(),
                account: LaunchAccountProfile::default(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, LauncherError::VersionNotFound(_)));
    }
}
