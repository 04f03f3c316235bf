pub mod client;

pub use client::{
    sha1_hex, Downloader, ItemOutcome, PhaseSkips, Placement, SyncSummary, DEFAULT_CHUNK_SIZE,
    DEFAULT_CONCURRENCY,
};
