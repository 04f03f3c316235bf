use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use sha1::{Digest, Sha1};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::{ReaderStream, StreamReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http::Transport;
use crate::core::planner::{ContentItem, ContentKind, Phase, SyncPlan};
use crate::core::progress::{Measure, ProgressReporter, Tick};

/// Default number of parallel transfers.
pub const DEFAULT_CONCURRENCY: usize = 8;
/// Default read size while streaming a body to disk.
pub const DEFAULT_CHUNK_SIZE: usize = 2048;

/// How an item ended up in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// The file on disk already matched.
    Reused,
    /// The file was downloaded.
    Fetched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemOutcome {
    pub kind: ContentKind,
    pub size: u64,
    pub placement: Placement,
}

impl Measure for ItemOutcome {
    fn measure(&self) -> Tick {
        Tick::Item(self.size)
    }
}

/// Totals of one or more synced phases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub fetched: usize,
    pub reused: usize,
    /// Bytes downloaded (reused files do not count).
    pub bytes: u64,
}

impl SyncSummary {
    fn record(&mut self, outcome: &ItemOutcome) {
        match outcome.placement {
            Placement::Reused => self.reused += 1,
            Placement::Fetched => {
                self.fetched += 1;
                self.bytes += outcome.size;
            }
        }
    }

    pub fn merge(&mut self, other: SyncSummary) {
        self.fetched += other.fetched;
        self.reused += other.reused;
        self.bytes += other.bytes;
    }
}

/// Which phases of a plan to leave alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseSkips {
    pub assets: bool,
    pub libraries: bool,
}

/// Concurrent, size- and SHA-1-validated downloader.
pub struct Downloader {
    transport: Arc<dyn Transport>,
    /// Maximum number of parallel downloads.
    concurrency: usize,
    chunk_size: usize,
    cancel: CancellationToken,
}

impl Downloader {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            concurrency: DEFAULT_CONCURRENCY,
            chunk_size: DEFAULT_CHUNK_SIZE,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_chunk_size(mut self, n: usize) -> Self {
        self.chunk_size = n.max(1);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that aborts every running and future sync of this downloader.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    // ── Phases ──────────────────────────────────────────

    /// Sync a whole plan, one phase after the other.
    pub async fn sync_plan(
        &self,
        plan: &SyncPlan,
        reporter: &ProgressReporter,
        skips: PhaseSkips,
    ) -> LauncherResult<SyncSummary> {
        let mut total = SyncSummary::default();

        for (phase, items) in plan.phases() {
            let skipped = match phase {
                Phase::Assets => skips.assets,
                Phase::Libraries => skips.libraries,
                Phase::Client => false,
            };
            if skipped {
                info!("Skipping {} phase", phase);
                continue;
            }
            total.merge(self.sync_phase(phase, items, reporter).await?);
        }

        Ok(total)
    }

    /// Sync one phase with fresh progress counters.
    pub async fn sync_phase(
        &self,
        phase: Phase,
        items: &[ContentItem],
        reporter: &ProgressReporter,
    ) -> LauncherResult<SyncSummary> {
        info!(
            "Syncing {}: {} files, concurrency={}",
            phase,
            items.len(),
            self.concurrency
        );
        reporter.begin(phase, items);
        let summary = self.sync(items, reporter).await?;
        reporter.finish(phase);

        info!(
            "{} done: {} fetched ({} bytes), {} already present",
            phase, summary.fetched, summary.bytes, summary.reused
        );
        Ok(summary)
    }

    /// Bring every item into place using a bounded worker pool.
    ///
    /// Returns on the first failure; in-flight transfers are dropped.
    pub async fn sync(
        &self,
        items: &[ContentItem],
        reporter: &ProgressReporter,
    ) -> LauncherResult<SyncSummary> {
        let work = stream::iter(items)
            .map(|item| self.sync_item(item, reporter))
            .buffer_unordered(self.concurrency);
        let work: std::pin::Pin<
            Box<dyn futures_util::Stream<Item = LauncherResult<ItemOutcome>> + Send + '_>,
        > = Box::pin(work);
        let mut completed = reporter.track(work);

        let drain = async move {
            let mut summary = SyncSummary::default();
            while let Some(result) = completed.next().await {
                summary.record(&result?);
            }
            Ok::<_, LauncherError>(summary)
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                warn!("Sync cancelled; partially written files are left for the next run");
                Err(LauncherError::Cancelled)
            }
            result = drain => result,
        }
    }

    // ── Single item ─────────────────────────────────────

    async fn sync_item(
        &self,
        item: &ContentItem,
        reporter: &ProgressReporter,
    ) -> LauncherResult<ItemOutcome> {
        ensure_parent(&item.dest).await?;

        let placement = if self.is_in_place(item).await? {
            Placement::Reused
        } else {
            self.fetch(item, reporter).await?;
            Placement::Fetched
        };

        for alias in &item.legacy_aliases {
            ensure_alias(&item.dest, alias, item.size).await?;
        }

        debug!("{:?} {} {:?}", placement, item.kind, item.dest);
        Ok(ItemOutcome {
            kind: item.kind,
            size: item.size,
            placement,
        })
    }

    /// Check the file at `dest`, deleting it when it does not match.
    async fn is_in_place(&self, item: &ContentItem) -> LauncherResult<bool> {
        let metadata = match tokio::fs::metadata(&item.dest).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(LauncherError::io(&item.dest, e)),
        };
        if !metadata.is_file() {
            return Ok(false);
        }

        if metadata.len() != item.size {
            debug!(
                "Size of {:?} is {} instead of {}; re-fetching",
                item.dest,
                metadata.len(),
                item.size
            );
            remove_file(&item.dest).await?;
            return Ok(false);
        }

        if let Some(expected) = &item.sha1 {
            let actual = file_sha1(&item.dest).await?;
            if !actual.eq_ignore_ascii_case(expected) {
                debug!("SHA-1 of {:?} does not match; re-fetching", item.dest);
                remove_file(&item.dest).await?;
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Stream `url` into a temp file, verify it, then move it onto `dest`.
    async fn fetch(&self, item: &ContentItem, reporter: &ProgressReporter) -> LauncherResult<()> {
        let body = self.transport.open(&item.url).await?;

        if let Some(declared) = body.content_length {
            if declared != item.size {
                return Err(LauncherError::ContentLengthMismatch {
                    url: item.url.clone(),
                    expected: item.size,
                    declared,
                });
            }
        }

        let part = part_path(&item.dest);
        let reader = StreamReader::new(body.stream);
        let mut chunks = reporter.track(ReaderStream::with_capacity(reader, self.chunk_size));
        let mut hasher = item.sha1.as_ref().map(|_| Sha1::new());
        let mut written: u64 = 0;

        let streamed: LauncherResult<()> = async {
            // Keep the handle scoped so it is closed before the rename.
            let mut file = tokio::fs::File::create(&part)
                .await
                .map_err(|e| LauncherError::io(&part, e))?;

            while let Some(chunk) = chunks.next().await {
                let chunk = chunk.map_err(|source| LauncherError::Interrupted {
                    url: item.url.clone(),
                    source,
                })?;
                written += chunk.len() as u64;
                if written > item.size {
                    return Err(LauncherError::SizeMismatch {
                        path: item.dest.clone(),
                        expected: item.size,
                        actual: written,
                    });
                }
                if let Some(hasher) = hasher.as_mut() {
                    hasher.update(&chunk);
                }
                file.write_all(&chunk)
                    .await
                    .map_err(|e| LauncherError::io(&part, e))?;
            }

            file.flush().await.map_err(|e| LauncherError::io(&part, e))?;
            Ok::<(), LauncherError>(())
        }
        .await;

        let verified = streamed.and_then(|()| {
            if written != item.size {
                return Err(LauncherError::SizeMismatch {
                    path: item.dest.clone(),
                    expected: item.size,
                    actual: written,
                });
            }
            if let (Some(expected), Some(hasher)) = (&item.sha1, hasher) {
                let actual = hex::encode(hasher.finalize());
                if !actual.eq_ignore_ascii_case(expected) {
                    return Err(LauncherError::Sha1Mismatch {
                        path: item.dest.clone(),
                        expected: expected.clone(),
                        actual,
                    });
                }
            }
            Ok(())
        });

        if let Err(e) = verified {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(e);
        }

        tokio::fs::rename(&part, &item.dest)
            .await
            .map_err(|e| LauncherError::io(&item.dest, e))?;
        Ok(())
    }

    /// Validate an existing file's SHA-1.
    pub async fn validate_sha1(path: &Path, expected: &str) -> LauncherResult<bool> {
        Ok(file_sha1(path).await?.eq_ignore_ascii_case(expected))
    }
}

/// Lowercase hex SHA-1 of a buffer.
pub fn sha1_hex(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

async fn file_sha1(path: &Path) -> LauncherResult<String> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| LauncherError::io(path, e))?;
    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| LauncherError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Make sure `alias` is a link to `target`, replacing a stale file.
async fn ensure_alias(target: &Path, alias: &Path, size: u64) -> LauncherResult<()> {
    ensure_parent(alias).await?;

    match tokio::fs::metadata(alias).await {
        Ok(metadata) if metadata.is_file() && metadata.len() == size => return Ok(()),
        Ok(_) => remove_file(alias).await?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(LauncherError::io(alias, e)),
    }

    if let Err(e) = tokio::fs::hard_link(target, alias).await {
        debug!("Hard link {:?} failed ({}); copying instead", alias, e);
        tokio::fs::copy(target, alias)
            .await
            .map_err(|e| LauncherError::io(alias, e))?;
    }
    Ok(())
}

async fn ensure_parent(path: &Path) -> LauncherResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| LauncherError::io(parent, e))?;
    }
    Ok(())
}

async fn remove_file(path: &Path) -> LauncherResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(LauncherError::io(path, e)),
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}
