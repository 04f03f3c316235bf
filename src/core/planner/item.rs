use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::core::version::ExtractRules;

/// What a planned file is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Asset,
    Library,
    Native,
    Client,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Asset => write!(f, "asset"),
            ContentKind::Library => write!(f, "library"),
            ContentKind::Native => write!(f, "native"),
            ContentKind::Client => write!(f, "client"),
        }
    }
}

/// One independently transferable file of a sync plan.
///
/// Within a plan, `dest` is unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    pub kind: ContentKind,
    pub url: String,
    pub dest: PathBuf,
    pub size: u64,
    /// Expected SHA-1 (lowercase hex). `None` means size-only verification.
    pub sha1: Option<String>,
    /// Extra paths that must hard-link to `dest` (legacy asset layout).
    pub legacy_aliases: Vec<PathBuf>,
    /// Set on native archives that get unpacked at launch time.
    pub extract: Option<ExtractRules>,
}

impl ContentItem {
    pub fn new(kind: ContentKind, url: impl Into<String>, dest: PathBuf, size: u64) -> Self {
        Self {
            kind,
            url: url.into(),
            dest,
            size,
            sha1: None,
            legacy_aliases: Vec::new(),
            extract: None,
        }
    }

    pub fn with_sha1(mut self, sha1: impl Into<String>) -> Self {
        self.sha1 = Some(sha1.into());
        self
    }

    pub fn needs_extraction(&self) -> bool {
        self.extract.is_some()
    }
}
