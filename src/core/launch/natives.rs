// ─── Native Extraction ───
// Unpacks native archives into a per-launch directory and removes it after.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::planner::ContentItem;

/// Unpacks native archives below an install root.
#[derive(Debug, Clone)]
pub struct NativeExtractor {
    root: PathBuf,
    target_dir: PathBuf,
}

/// A natives directory in use by one launch.
///
/// Only a session that created the directory removes it again.
#[derive(Debug)]
#[must_use = "call cleanup() once the game process has exited"]
pub struct NativesSession {
    dir: PathBuf,
    root: PathBuf,
    created: bool,
}

impl NativeExtractor {
    pub fn new(root: impl Into<PathBuf>, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            target_dir: target_dir.into(),
        }
    }

    /// Extract every item that asks for it into the target directory.
    ///
    /// If the directory already exists nothing is read and the existing
    /// contents are used as they are.
    pub async fn extract(&self, items: &[ContentItem]) -> LauncherResult<NativesSession> {
        let exists = tokio::fs::try_exists(&self.target_dir)
            .await
            .map_err(|e| LauncherError::io(&self.target_dir, e))?;
        if exists {
            info!(
                "Natives directory {:?} already present; skipping extraction",
                self.target_dir
            );
            return Ok(self.session(false));
        }

        tokio::fs::create_dir_all(&self.target_dir)
            .await
            .map_err(|e| LauncherError::io(&self.target_dir, e))?;
        // Removes the directory again unless extraction runs to completion,
        // including when this future is dropped part-way.
        let guard = CreatedDir::new(&self.target_dir, &self.root);

        let mut extracted = 0;
        for item in items {
            let Some(rules) = &item.extract else {
                continue;
            };
            let archive = item.dest.clone();
            let dest_dir = self.target_dir.clone();
            let exclude = rules.exclude.clone();
            let abort = guard.abort_flag();

            extracted += tokio::task::spawn_blocking(move || {
                extract_archive(&archive, &dest_dir, &exclude, &abort)
            })
            .await
            .map_err(|e| LauncherError::Other(format!("Task join error: {}", e)))??;
        }

        guard.disarm();
        info!("Extracted {} native files into {:?}", extracted, self.target_dir);
        Ok(self.session(true))
    }

    fn session(&self, created: bool) -> NativesSession {
        NativesSession {
            dir: self.target_dir.clone(),
            root: self.root.clone(),
            created,
        }
    }
}

impl NativesSession {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether this session created (and so owns) the directory.
    pub fn created(&self) -> bool {
        self.created
    }

    /// Remove the directory if this session created it.
    pub async fn cleanup(self) -> LauncherResult<()> {
        if !self.created {
            return Ok(());
        }

        let Some(dir) = contained_dir(&self.dir, &self.root)? else {
            return Ok(());
        };

        tokio::fs::remove_dir_all(&dir)
            .await
            .map_err(|e| LauncherError::io(&dir, e))?;
        debug!("Removed natives directory {:?}", dir);
        Ok(())
    }
}

/// Resolve `dir` and make sure it lies strictly inside `root`.
///
/// `Ok(None)` when `dir` no longer exists.
fn contained_dir(dir: &Path, root: &Path) -> LauncherResult<Option<PathBuf>> {
    let dir = match std::fs::canonicalize(dir) {
        Ok(dir) => dir,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(LauncherError::io(dir, e)),
    };
    let root = std::fs::canonicalize(root).map_err(|e| LauncherError::io(root, e))?;

    if dir == root || !dir.starts_with(&root) {
        return Err(LauncherError::UnsafePath { path: dir, root });
    }
    Ok(Some(dir))
}

/// Set once extraction must stop. Writers hold the lock per entry.
type AbortFlag = Arc<Mutex<bool>>;

/// A natives directory created by an extraction still in progress.
struct CreatedDir {
    dir: PathBuf,
    root: PathBuf,
    abort: AbortFlag,
    armed: bool,
}

impl CreatedDir {
    fn new(dir: &Path, root: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            root: root.to_path_buf(),
            abort: Arc::new(Mutex::new(false)),
            armed: true,
        }
    }

    fn abort_flag(&self) -> AbortFlag {
        Arc::clone(&self.abort)
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CreatedDir {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        // Waits for an entry being written, then stops further writes.
        *self.abort.lock().unwrap_or_else(|e| e.into_inner()) = true;

        let removed = contained_dir(&self.dir, &self.root).and_then(|dir| match dir {
            Some(dir) => std::fs::remove_dir_all(&dir).map_err(|e| LauncherError::io(&dir, e)),
            None => Ok(()),
        });
        match removed {
            Ok(()) => debug!("Removed unfinished natives directory {:?}", self.dir),
            Err(e) => warn!("Could not remove natives after failure: {}", e),
        }
    }
}

fn is_excluded(name: &str, exclude: &[String]) -> bool {
    exclude
        .iter()
        .any(|e| name == e || (e.ends_with('/') && name.starts_with(e.as_str())))
}

fn extract_archive(
    archive: &Path,
    dest_dir: &Path,
    exclude: &[String],
    abort: &Mutex<bool>,
) -> LauncherResult<usize> {
    let file = std::fs::File::open(archive).map_err(|e| LauncherError::io(archive, e))?;
    let mut zip = zip::ZipArchive::new(std::io::BufReader::new(file))?;
    let mut count = 0;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let name = entry.name().to_string();

        if is_excluded(&name, exclude) {
            continue;
        }
        let Some(relative) = entry.enclosed_name() else {
            warn!("Skipping unsafe entry {:?} in {:?}", name, archive);
            continue;
        };
        let out = dest_dir.join(relative);

        let aborted = abort.lock().unwrap_or_else(|e| e.into_inner());
        if *aborted {
            return Err(LauncherError::Cancelled);
        }

        if entry.is_dir() {
            std::fs::create_dir_all(&out).map_err(|e| LauncherError::io(&out, e))?;
            continue;
        }
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
        }

        let mut target = std::fs::File::create(&out).map_err(|e| LauncherError::io(&out, e))?;
        std::io::copy(&mut entry, &mut target).map_err(|e| LauncherError::io(&out, e))?;
        debug!("Extracted native: {}", name);
        count += 1;
    }

    Ok(count)
}
