// ─── Classpath Builder ───
// Classpath entries and placeholder values for launching an installed version.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::auth::LaunchAccountProfile;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::planner::{ContentItem, ContentKind};
use crate::core::version::VersionJson;

pub const LAUNCHER_NAME: &str = "mclaunch";
pub const LAUNCHER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Jars that go on `-cp`, in descriptor order, client jar last.
///
/// Archives that get extracted into the natives directory stay off the
/// classpath; everything else the library phase placed is included.
pub fn classpath_entries(library_items: &[ContentItem], client_jar: &Path) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = library_items
        .iter()
        .filter(|item| matches!(item.kind, ContentKind::Library | ContentKind::Native))
        .filter(|item| !item.needs_extraction())
        .map(|item| item.dest.clone())
        .collect();
    entries.push(client_jar.to_path_buf());

    dedup_preserving_order(&mut entries);
    debug!("Classpath has {} entries", entries.len());
    entries
}

/// Join entries with the platform separator.
pub fn build_classpath(entries: &[PathBuf]) -> LauncherResult<String> {
    let joined: Vec<String> = entries
        .iter()
        .map(|p| safe_path_str(p))
        .filter(|s| !s.trim().is_empty())
        .collect();

    if joined.is_empty() {
        return Err(LauncherError::Other(
            "Classpath is empty: no libraries or client jar".into(),
        ));
    }
    Ok(joined.join(get_classpath_separator()))
}

/// Platform-specific Java classpath separator.
pub fn get_classpath_separator() -> &'static str {
    if cfg!(target_os = "windows") {
        ";"
    } else {
        ":"
    }
}

/// Values for the `${...}` placeholders of a version's argument template.
pub fn substitutions(
    root: &Path,
    descriptor: &VersionJson,
    account: &LaunchAccountProfile,
    natives_dir: &Path,
    classpath: &str,
) -> HashMap<String, String> {
    let assets_dir = root.join("assets");
    let index_name = descriptor
        .asset_index
        .as_ref()
        .map(|info| info.id.clone())
        .unwrap_or_else(|| "legacy".into());
    let version_type = descriptor
        .version_type
        .as_ref()
        .map(|t| t.to_string())
        .unwrap_or_else(|| "release".into());

    let pairs = [
        ("auth_player_name", account.username.clone()),
        (
            "auth_session",
            format!("token:{}:{}", account.access_token, account.uuid),
        ),
        ("auth_uuid", account.uuid.clone()),
        ("auth_access_token", account.access_token.clone()),
        ("user_type", account.user_type.clone()),
        ("user_properties", "{}".into()),
        ("game_directory", path_str(root)),
        (
            "game_assets",
            path_str(&assets_dir.join("virtual").join("legacy")),
        ),
        ("assets_root", path_str(&assets_dir)),
        ("assets_index_name", index_name),
        ("version_name", descriptor.id.clone()),
        ("version_type", version_type),
        ("natives_directory", path_str(natives_dir)),
        ("launcher_name", LAUNCHER_NAME.into()),
        ("launcher_version", LAUNCHER_VERSION.into()),
        ("classpath", classpath.to_string()),
    ];

    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn dedup_preserving_order(entries: &mut Vec<PathBuf>) {
    let mut seen = std::collections::HashSet::new();
    entries.retain(|entry| {
        let key = if cfg!(target_os = "windows") {
            entry.to_string_lossy().to_lowercase()
        } else {
            entry.to_string_lossy().to_string()
        };
        seen.insert(key)
    });
}

/// Convert path to string, resolving it when it exists.
pub fn safe_path_str(path: &Path) -> String {
    let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let text = resolved.to_string_lossy().to_string();

    #[cfg(target_os = "windows")]
    {
        // Java rejects extended-length `\\?\` prefixes on the classpath.
        if let Some(stripped) = text.strip_prefix(r"\\?\") {
            return stripped.to_string();
        }
    }

    text
}
