use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::info;

use crate::settings::{DEFAULT_PAGE_SIZE, GallerySettings};

const INDEX_FILE_NAME: &str = "index.json";
const MEMES_DIR_NAME: &str = "memes";
const UPLOAD_LABEL: &str = "upload";

/// A finished PNG, ready to be persisted.
#[derive(Debug, Clone)]
pub struct NewMeme {
    pub png: Vec<u8>,
    pub top_text: String,
    pub bottom_text: String,
    pub template_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMeme {
    pub id: String,
    pub image_url: String,
    pub path: String,
    pub top_text: String,
    pub bottom_text: String,
    pub template_id: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub reactions_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemePage {
    pub page: usize,
    pub items: Vec<StoredMeme>,
    pub has_more: bool,
}

/// Where rendered memes are kept.
pub trait MemeStore: Send + Sync {
    fn save(&self, meme: NewMeme) -> Result<StoredMeme>;
    /// Newest first.
    fn page(&self, index: usize) -> Result<MemePage>;
    fn get(&self, id: &str) -> Result<Option<StoredMeme>>;
    /// Adds `delta` to the reaction count; the count never drops below zero.
    fn react(&self, id: &str, delta: i64) -> Result<Option<StoredMeme>>;
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct GalleryIndex {
    memes: Vec<StoredMeme>,
}

/// Directory-backed store: PNG files under `memes/` plus an `index.json`.
#[derive(Debug)]
pub struct LocalGallery {
    dir: PathBuf,
    page_size: usize,
    lock: Mutex<()>,
}

impl LocalGallery {
    pub fn new(dir: impl Into<PathBuf>, page_size: usize) -> Self {
        Self {
            dir: dir.into(),
            page_size: if page_size == 0 {
                DEFAULT_PAGE_SIZE
            } else {
                page_size
            },
            lock: Mutex::new(()),
        }
    }

    pub fn from_settings(settings: &GallerySettings) -> Self {
        Self::new(settings.dir.clone(), settings.page_size)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE_NAME)
    }

    fn read_index(&self) -> Result<GalleryIndex> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(GalleryIndex::default());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read gallery index: {}", path.display()))?;
        let index = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse gallery index: {}", path.display()))?;
        Ok(index)
    }

    fn write_index(&self, index: &GalleryIndex) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create gallery dir: {}", self.dir.display()))?;
        let content = serde_json::to_string_pretty(index)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .with_context(|| "failed to create gallery index temp file")?;
        tmp.write_all(content.as_bytes())
            .with_context(|| "failed to write gallery index")?;
        tmp.persist(self.index_path())
            .map_err(|err| anyhow!("failed to replace gallery index: {}", err.error))?;
        Ok(())
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| anyhow!("gallery lock poisoned"))
    }

    fn next_file_path(&self, label: &str) -> PathBuf {
        let dir = self.dir.join(MEMES_DIR_NAME);
        let stem = format!("{}-{}", now_unix_millis(), sanitize_filename_component(label));
        let mut path = dir.join(format!("{}.png", stem));
        let mut suffix = 1;
        while path.exists() {
            path = dir.join(format!("{}-{}.png", stem, suffix));
            suffix += 1;
        }
        path
    }
}

impl MemeStore for LocalGallery {
    fn save(&self, meme: NewMeme) -> Result<StoredMeme> {
        let _guard = self.guard()?;
        let label = meme
            .template_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or(UPLOAD_LABEL);
        let path = self.next_file_path(label);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create gallery dir: {}", parent.display()))?;
        }
        fs::write(&path, &meme.png)
            .with_context(|| format!("failed to write meme: {}", path.display()))?;
        let absolute = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());

        let path_text = path.to_string_lossy().to_string();
        let stored = StoredMeme {
            id: format!("{:x}", md5::compute(path_text.as_bytes())),
            image_url: format!("file://{}", absolute.display()),
            path: path_text,
            top_text: meme.top_text,
            bottom_text: meme.bottom_text,
            template_id: meme.template_id,
            created_at: now_rfc3339()?,
            reactions_count: 0,
        };

        let mut index = self.read_index()?;
        index.memes.push(stored.clone());
        self.write_index(&index)?;
        info!("gallery: saved {} ({})", stored.id, stored.path);
        Ok(stored)
    }

    fn page(&self, index: usize) -> Result<MemePage> {
        let _guard = self.guard()?;
        let items: Vec<StoredMeme> = self
            .read_index()?
            .memes
            .into_iter()
            .rev()
            .skip(index.saturating_mul(self.page_size))
            .take(self.page_size)
            .collect();
        Ok(MemePage {
            page: index,
            has_more: items.len() == self.page_size,
            items,
        })
    }

    fn get(&self, id: &str) -> Result<Option<StoredMeme>> {
        let _guard = self.guard()?;
        Ok(self
            .read_index()?
            .memes
            .into_iter()
            .find(|meme| meme.id == id))
    }

    fn react(&self, id: &str, delta: i64) -> Result<Option<StoredMeme>> {
        let _guard = self.guard()?;
        let mut index = self.read_index()?;
        let Some(meme) = index.memes.iter_mut().find(|meme| meme.id == id) else {
            return Ok(None);
        };
        meme.reactions_count = meme.reactions_count.saturating_add_signed(delta);
        let updated = meme.clone();
        self.write_index(&index)?;
        Ok(Some(updated))
    }
}

fn now_unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .with_context(|| "failed to format timestamp")
}

fn sanitize_filename_component(value: &str) -> String {
    let mut out = String::new();
    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() || ch == '.' || ch == '-' || ch == '_' {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    if out.is_empty() {
        UPLOAD_LABEL.to_string()
    } else {
        out
    }
}
