// ─── Version File ───
// Parses a version descriptor and resolves its era-dependent shape once.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};

use super::manifest::VersionType;
use super::rules::{self, LibraryRule, Platform};

/// A fully parsed version descriptor.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawVersionJson")]
pub struct VersionJson {
    pub id: String,
    pub version_type: Option<VersionType>,
    pub main_class: String,
    pub asset_index: Option<AssetIndexInfo>,
    pub downloads: Option<VersionDownloads>,
    pub libraries: Vec<LibraryEntry>,
    pub arguments: LaunchArguments,
}

/// Wire shape; fields vary by descriptor era.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVersionJson {
    id: String,
    #[serde(rename = "type", default)]
    version_type: Option<VersionType>,
    main_class: String,
    #[serde(default)]
    asset_index: Option<AssetIndexInfo>,
    #[serde(default)]
    downloads: Option<VersionDownloads>,
    #[serde(default)]
    libraries: Vec<LibraryEntry>,
    #[serde(default)]
    arguments: Option<ModernArguments>,
    /// Pre-1.13 single template string.
    #[serde(default)]
    minecraft_arguments: Option<String>,
}

impl From<RawVersionJson> for VersionJson {
    fn from(raw: RawVersionJson) -> Self {
        // Structured arguments take precedence when both are present.
        let arguments = match (raw.arguments, raw.minecraft_arguments) {
            (Some(modern), _) => LaunchArguments::Modern(modern),
            (None, Some(legacy)) => LaunchArguments::Legacy(legacy),
            (None, None) => LaunchArguments::Legacy(String::new()),
        };

        Self {
            id: raw.id,
            version_type: raw.version_type,
            main_class: raw.main_class,
            asset_index: raw.asset_index,
            downloads: raw.downloads,
            libraries: raw.libraries,
            arguments,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionDownloads {
    pub client: Option<DownloadArtifact>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadArtifact {
    pub sha1: String,
    pub size: u64,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIndexInfo {
    pub id: String,
    pub url: String,
    pub sha1: String,
    pub size: u64,
    #[serde(default)]
    pub total_size: Option<u64>,
}

// ─── Launch arguments ───

/// Argument template, in whichever shape the descriptor era uses.
#[derive(Debug, Clone, PartialEq)]
pub enum LaunchArguments {
    /// `minecraftArguments`: one space-separated template string.
    Legacy(String),
    /// `arguments`: structured, possibly rule-conditioned lists.
    Modern(ModernArguments),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ModernArguments {
    #[serde(default)]
    pub game: Vec<ArgumentValue>,
    #[serde(default)]
    pub jvm: Vec<ArgumentValue>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ArgumentValue {
    Plain(String),
    Conditional {
        rules: Vec<ArgumentRule>,
        value: OneOrMany,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ArgumentRule {
    #[serde(flatten)]
    pub rule: LibraryRule,
    /// Launcher feature flags (demo mode, custom resolution, ...).
    #[serde(default)]
    pub features: Option<BTreeMap<String, bool>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// Template tokens that apply on a given platform, before substitution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgumentTemplate {
    pub jvm: Vec<String>,
    pub game: Vec<String>,
}

impl LaunchArguments {
    /// Flatten to template tokens for `platform`.
    ///
    /// Feature-gated arguments are dropped; no launcher features are enabled.
    pub fn template(&self, platform: &Platform) -> ArgumentTemplate {
        match self {
            LaunchArguments::Legacy(raw) => ArgumentTemplate {
                jvm: Vec::new(),
                game: raw.split_whitespace().map(str::to_string).collect(),
            },
            LaunchArguments::Modern(args) => ArgumentTemplate {
                jvm: flatten_arguments(&args.jvm, platform),
                game: flatten_arguments(&args.game, platform),
            },
        }
    }
}

fn flatten_arguments(values: &[ArgumentValue], platform: &Platform) -> Vec<String> {
    let mut out = Vec::new();
    for value in values {
        match value {
            ArgumentValue::Plain(arg) => out.push(arg.clone()),
            ArgumentValue::Conditional { rules, value } => {
                if rules.iter().any(|r| r.features.is_some()) {
                    continue;
                }
                let plain: Vec<LibraryRule> = rules.iter().map(|r| r.rule.clone()).collect();
                if !rules::evaluate_argument(&plain, platform) {
                    continue;
                }
                match value {
                    OneOrMany::One(arg) => out.push(arg.clone()),
                    OneOrMany::Many(args) => out.extend(args.iter().cloned()),
                }
            }
        }
    }
    out
}

// ─── Library Entry ───

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibraryEntry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub downloads: LibraryDownloads,
    /// Platform name → classifier id, possibly containing `${arch}`.
    #[serde(default)]
    pub natives: Option<HashMap<String, String>>,
    #[serde(default)]
    pub rules: Vec<LibraryRule>,
    #[serde(default)]
    pub extract: Option<ExtractRules>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibraryDownloads {
    #[serde(default)]
    pub artifact: Option<LibDownloadArtifact>,
    #[serde(default)]
    pub classifiers: Option<HashMap<String, LibDownloadArtifact>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LibDownloadArtifact {
    /// Slash-separated path below the libraries root.
    pub path: String,
    pub sha1: String,
    pub size: u64,
    pub url: String,
}

/// Archive members to leave out when unpacking a native library.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExtractRules {
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl LibraryEntry {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }

    /// Evaluate this entry's rules on `platform`.
    pub fn is_allowed(&self, platform: &Platform) -> bool {
        rules::evaluate(&self.rules, platform)
    }

    /// Classifier id for `platform`, with `${arch}` substituted.
    pub fn native_classifier(&self, platform: &Platform) -> Option<String> {
        let natives = self.natives.as_ref()?;
        natives
            .get(&platform.name)
            .map(|classifier| classifier.replace("${arch}", platform.arch))
    }

    /// The native archive for `platform`, if this entry ships one.
    pub fn native_artifact(&self, platform: &Platform) -> Option<&LibDownloadArtifact> {
        let classifier = self.native_classifier(platform)?;
        let found = self
            .downloads
            .classifiers
            .as_ref()
            .and_then(|classifiers| classifiers.get(&classifier));
        if found.is_none() {
            debug!(
                "No classifier {} for {} on {}",
                classifier,
                self.display_name(),
                platform.name
            );
        }
        found
    }
}

impl VersionJson {
    pub fn parse(raw: &[u8]) -> LauncherResult<Self> {
        Ok(serde_json::from_slice(raw)?)
    }

    /// `versions/<id>/<id>.json`
    pub fn descriptor_path(versions_dir: &Path, version_id: &str) -> PathBuf {
        versions_dir
            .join(version_id)
            .join(format!("{}.json", version_id))
    }

    /// `versions/<id>/<id>.jar`
    pub fn client_jar_path(versions_dir: &Path, version_id: &str) -> PathBuf {
        versions_dir
            .join(version_id)
            .join(format!("{}.jar", version_id))
    }

    /// Persist the descriptor exactly as it was fetched.
    pub async fn save_to(raw: &[u8], versions_dir: &Path, version_id: &str) -> LauncherResult<()> {
        let path = Self::descriptor_path(versions_dir, version_id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }
        tokio::fs::write(&path, raw)
            .await
            .map_err(|e| LauncherError::Io { path, source: e })?;
        Ok(())
    }

    /// Re-read a previously installed descriptor without the network.
    pub async fn load_local(versions_dir: &Path, version_id: &str) -> LauncherResult<Self> {
        let path = Self::descriptor_path(versions_dir, version_id);
        let raw = tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LauncherError::VersionNotFound(version_id.to_string())
            } else {
                LauncherError::Io {
                    path: path.clone(),
                    source: e,
                }
            }
        })?;
        Self::parse(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux() -> Platform {
        Platform::new("linux", "6.1.0", "64")
    }

    #[test]
    fn legacy_arguments_are_kept_as_template_string() {
        let parsed: VersionJson = serde_json::from_value(serde_json::json!({
            "id": "1.8.9",
            "type": "release",
            "mainClass": "net.minecraft.client.main.Main",
            "minecraftArguments": "--username ${auth_player_name} --version ${version_name}"
        }))
        .unwrap();

        assert_eq!(
            parsed.arguments,
            LaunchArguments::Legacy("--username ${auth_player_name} --version ${version_name}".into())
        );
        let template = parsed.arguments.template(&linux());
        assert_eq!(template.game.len(), 4);
        assert!(template.jvm.is_empty());
        assert_eq!(parsed.version_type, Some(VersionType::Release));
    }

    #[test]
    fn modern_arguments_apply_rules_and_drop_features() {
        let parsed: VersionJson = serde_json::from_value(serde_json::json!({
            "id": "1.20.4",
            "mainClass": "net.minecraft.client.main.Main",
            "arguments": {
                "game": [
                    "--username",
                    "${auth_player_name}",
                    {
                        "rules": [{"action": "allow", "features": {"is_demo_user": true}}],
                        "value": "--demo"
                    },
                    {
                        "rules": [{"action": "allow", "os": {"name": "windows"}}],
                        "value": "--should-not-appear"
                    }
                ],
                "jvm": [
                    {
                        "rules": [{"action": "allow", "os": {"name": "linux"}}],
                        "value": ["-Dlinux=1", "-Dlinux2=1"]
                    },
                    "-cp",
                    "${classpath}"
                ]
            }
        }))
        .unwrap();

        let template = parsed.arguments.template(&linux());
        assert_eq!(template.game, ["--username", "${auth_player_name}"]);
        assert_eq!(template.jvm, ["-Dlinux=1", "-Dlinux2=1", "-cp", "${classpath}"]);
    }

    #[test]
    fn native_classifier_substitutes_arch() {
        let lib: LibraryEntry = serde_json::from_value(serde_json::json!({
            "name": "tv.twitch:twitch-platform:5.16",
            "natives": {"linux": "natives-linux-${arch}", "osx": "natives-osx"},
            "downloads": {
                "classifiers": {
                    "natives-linux-64": {
                        "path": "tv/twitch/twitch-platform/5.16/twitch-platform-5.16-natives-linux-64.jar",
                        "sha1": "aa", "size": 10, "url": "http://libs.test/linux64.jar"
                    }
                }
            },
            "extract": {"exclude": ["META-INF/"]}
        }))
        .unwrap();

        assert_eq!(
            lib.native_classifier(&linux()).as_deref(),
            Some("natives-linux-64")
        );
        assert!(lib.native_artifact(&linux()).is_some());
        assert!(lib
            .native_artifact(&Platform::new("linux", "6.1.0", "32"))
            .is_none());
        assert!(lib
            .native_artifact(&Platform::new("windows", "10.0", "64"))
            .is_none());
        assert_eq!(lib.extract.unwrap().exclude, ["META-INF/"]);
    }

    #[tokio::test]
    async fn saved_descriptor_is_byte_identical_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let raw = br#"{"id":"1.7.10",  "mainClass":"net.minecraft.client.main.Main", "minecraftArguments":"--a b"}"#;

        VersionJson::save_to(raw, dir.path(), "1.7.10").await.unwrap();
        let on_disk = std::fs::read(dir.path().join("1.7.10").join("1.7.10.json")).unwrap();
        assert_eq!(on_disk, raw);

        let loaded = VersionJson::load_local(dir.path(), "1.7.10").await.unwrap();
        assert_eq!(loaded.id, "1.7.10");
    }

    #[tokio::test]
    async fn loading_missing_descriptor_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = VersionJson::load_local(dir.path(), "nope").await.unwrap_err();
        assert!(matches!(err, LauncherError::VersionNotFound(_)));
    }
}
