pub mod manifest;
pub mod rules;
pub mod version_file;

pub use manifest::{
    ManifestResolver, VersionEntry, VersionManifest, VersionType, LATEST_RELEASE, LATEST_SNAPSHOT,
    VERSION_MANIFEST_URL,
};
pub use rules::{LibraryRule, OsRule, Platform, RuleAction};
pub use version_file::{
    ArgumentTemplate, AssetIndexInfo, DownloadArtifact, ExtractRules, LaunchArguments,
    LibDownloadArtifact, LibraryEntry, VersionJson,
};
