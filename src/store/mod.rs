//! Board document persistence.
//!
//! One self-contained JSON document per board, at a path derived from the
//! slugified title. Writes go through a temp sibling plus atomic rename;
//! reads validate the document and skip (not fail) anything malformed. A
//! short TTL cache absorbs the interactive layer's read bursts.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use dashmap::DashMap;
use tracing::{debug, warn};
use unicode_normalization::UnicodeNormalization;
use url::Url;

use crate::model::JobBoard;

/// Fallback token for titles that slugify to nothing.
const EMPTY_SLUG_FALLBACK: &str = "board";

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

/// NFKD → ASCII-lossy → non-alphanumeric runs to single `-` → trimmed,
/// lowercased. Stable under repeat application.
pub fn slugify(value: &str) -> String {
    let ascii: String = value.nfkd().filter(char::is_ascii).collect();

    let mut slug = String::with_capacity(ascii.len());
    let mut pending_dash = false;
    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        EMPTY_SLUG_FALLBACK.to_string()
    } else {
        slug
    }
}

fn validate(board: &JobBoard) -> std::result::Result<(), String> {
    if board.title.trim().is_empty() {
        return Err("empty title".to_string());
    }
    Url::parse(&board.icon_url).map_err(|e| format!("bad icon_url: {e}"))?;
    Url::parse(&board.website_url).map_err(|e| format!("bad website_url: {e}"))?;
    for job in &board.content {
        if job.title.trim().is_empty() {
            return Err(format!("job with empty title: {}", job.link));
        }
        if job.link.trim().is_empty() {
            return Err("job with empty link".to_string());
        }
    }
    Ok(())
}

struct CacheEntry {
    loaded_at: Instant,
    board: JobBoard,
}

/// Directory-backed board store with a write-through TTL read cache.
pub struct BoardStore {
    pages_dir: PathBuf,
    cache: DashMap<PathBuf, CacheEntry>,
    cache_ttl: Duration,
}

impl BoardStore {
    pub fn new(pages_dir: impl Into<PathBuf>) -> Self {
        Self::with_cache_ttl(pages_dir, DEFAULT_CACHE_TTL)
    }

    pub fn with_cache_ttl(pages_dir: impl Into<PathBuf>, cache_ttl: Duration) -> Self {
        Self {
            pages_dir: pages_dir.into(),
            cache: DashMap::new(),
            cache_ttl,
        }
    }

    pub fn pages_dir(&self) -> &Path {
        &self.pages_dir
    }

    /// Document path for a board title.
    pub fn board_path(&self, title: &str) -> PathBuf {
        self.pages_dir.join(format!("{}.json", slugify(title)))
    }

    /// All board document paths, sorted. Creates the directory on demand.
    pub fn list_board_files(&self) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.pages_dir)
            .with_context(|| format!("creating {}", self.pages_dir.display()))?;
        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.pages_dir)
            .with_context(|| format!("reading {}", self.pages_dir.display()))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();
        Ok(files)
    }

    /// Load one board, via the cache when fresh. Invalid documents are an
    /// error here; [`BoardStore::load_all`] is the skipping variant.
    pub async fn load(&self, path: &Path) -> Result<JobBoard> {
        if let Some(entry) = self.cache.get(path)
            && entry.loaded_at.elapsed() < self.cache_ttl
        {
            return Ok(entry.board.clone());
        }

        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let mut board: JobBoard = serde_json::from_slice(&bytes)
            .with_context(|| format!("decoding {}", path.display()))?;
        validate(&board).map_err(|reason| {
            anyhow::anyhow!("{} failed validation: {reason}", path.display())
        })?;

        // Restore history invariants at the read boundary.
        let flap_window = board.policy.flap_window();
        for job in &mut board.content {
            job.normalize(flap_window);
        }

        self.cache.insert(
            path.to_path_buf(),
            CacheEntry {
                loaded_at: Instant::now(),
                board: board.clone(),
            },
        );
        Ok(board)
    }

    /// Load every board in the directory, skipping documents that fail to
    /// decode or validate.
    pub async fn load_all(&self) -> Result<Vec<(PathBuf, JobBoard)>> {
        let mut out = Vec::new();
        for path in self.list_board_files()? {
            match self.load(&path).await {
                Ok(board) => out.push((path, board)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping invalid board document");
                }
            }
        }
        Ok(out)
    }

    /// Persist a board: pretty-printed UTF-8 JSON written to a temp sibling,
    /// then atomically renamed over the target. The cache entry is replaced
    /// so an immediate re-read observes the write.
    pub async fn save(&self, path: &Path, board: &JobBoard) -> Result<()> {
        let json = serde_json::to_vec_pretty(board).context("serializing board")?;
        let path_owned = path.to_path_buf();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let parent = path_owned
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            std::fs::create_dir_all(&parent)
                .with_context(|| format!("creating {}", parent.display()))?;

            let mut tmp = tempfile::NamedTempFile::new_in(&parent)
                .context("creating temp sibling")?;
            tmp.write_all(&json).context("writing board document")?;
            tmp.flush().context("flushing board document")?;
            tmp.persist(&path_owned)
                .with_context(|| format!("renaming into {}", path_owned.display()))?;
            Ok(())
        })
        .await
        .context("board write task panicked")??;

        self.cache.insert(
            path.to_path_buf(),
            CacheEntry {
                loaded_at: Instant::now(),
                board: board.clone(),
            },
        );
        debug!(path = %path.display(), "board persisted");
        Ok(())
    }

    pub fn invalidate(&self, path: &Path) {
        self.cache.remove(path);
    }
}

/// Clear `content`, `last_scraped`, and `next_scrape_at` on every board in
/// the directory, optionally writing `.bak` siblings first. Returns how many
/// boards were reset.
pub async fn reset_boards(store: &BoardStore, backup: bool) -> Result<usize> {
    let mut reset = 0usize;
    for path in store.list_board_files()? {
        let mut board = match store.load(&path).await {
            Ok(board) => board,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping");
                continue;
            }
        };

        board.content.clear();
        board.last_scraped = None;
        board.next_scrape_at = None;

        if backup {
            let bak = path.with_extension("json.bak");
            std::fs::copy(&path, &bak)
                .with_context(|| format!("backing up {}", path.display()))?;
        }

        store.save(&path, &board).await?;
        reset += 1;
    }
    Ok(reset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_folds_unicode_and_punctuation() {
        assert_eq!(slugify("Carl Zeiss AG"), "carl-zeiss-ag");
        assert_eq!(slugify("Über GmbH & Co."), "uber-gmbh-co");
        assert_eq!(slugify("  --  "), "board");
        assert_eq!(slugify(""), "board");
    }

    #[test]
    fn slugify_is_idempotent() {
        for title in ["Acme Inc.", "Łódź Software", "A  B\tC"] {
            let once = slugify(title);
            assert_eq!(slugify(&once), once);
        }
    }
}
