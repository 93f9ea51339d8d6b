use base64::Engine;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use tokio::sync::OnceCell;

use crate::error::AttachmentError;
use crate::fs::FileSystem;
use crate::model::{now, Attachment};

/// Directory beside the project file that holds pasted images.
pub const ATTACHMENTS_DIR: &str = "attachments";

const REFERENCE_PREFIX: &str = "./attachments/";

// ![alt](./attachments/<file>) with an optional "title"
fn image_link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"!\[([^\]]*)\]\(\./attachments/([^)\s]+)(\s+"[^"]*")?\)"#)
            .expect("attachment link pattern")
    })
}

/// MIME type for an attachment file name, by extension.
pub fn mime_for(filename: &str) -> &'static str {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("bmp") => "image/bmp",
        _ => "image/png",
    }
}

/// A bare file name: no separators, no `.`/`..`.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(['/', '\\'])
        && Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name)
}

pub fn attachments_dir(project_path: &Path) -> Result<PathBuf, AttachmentError> {
    project_path
        .parent()
        .map(|dir| dir.join(ATTACHMENTS_DIR))
        .ok_or_else(|| AttachmentError::NoProjectDir(project_path.to_path_buf()))
}

pub fn placeholder(filename: &str) -> String {
    format!("*[image unavailable: {}]*", filename)
}

fn data_url(filename: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime_for(filename),
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Observable state of one cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheState {
    Missing,
    Pending,
    Ready(String),
}

/// Result of storing a pasted image.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredAttachment {
    /// Markdown to insert into the note, e.g. `![f.png](./attachments/f.png)`.
    pub reference: String,
    pub attachment: Attachment,
    pub path: PathBuf,
}

type Slot = Arc<OnceCell<String>>;

/// Turns `./attachments/...` image links into embedded data URLs.
///
/// Materialized images are memoized by file name for the life of the process.
/// Concurrent requests for the same file share a single read; requests for
/// different files do not wait on each other.
pub struct AttachmentResolver {
    fs: Arc<dyn FileSystem>,
    cache: Mutex<HashMap<String, Slot>>,
}

impl AttachmentResolver {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, filename: &str) -> Slot {
        let mut cache = self.cache.lock().expect("attachment cache mutex");
        cache
            .entry(filename.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    fn forget_if_unresolved(&self, filename: &str, slot: &Slot) {
        let mut cache = self.cache.lock().expect("attachment cache mutex");
        if let Some(current) = cache.get(filename) {
            if Arc::ptr_eq(current, slot) && !current.initialized() {
                cache.remove(filename);
            }
        }
    }

    pub fn peek(&self, filename: &str) -> CacheState {
        let cache = self.cache.lock().expect("attachment cache mutex");
        match cache.get(filename) {
            None => CacheState::Missing,
            Some(slot) => match slot.get() {
                Some(url) => CacheState::Ready(url.clone()),
                None => CacheState::Pending,
            },
        }
    }

    /// Data URL for one attachment, reading it at most once.
    pub async fn materialize(
        &self,
        filename: &str,
        project_path: &Path,
    ) -> Result<String, AttachmentError> {
        if !is_plain_file_name(filename) {
            return Err(AttachmentError::InvalidName(filename.to_string()));
        }
        let path = attachments_dir(project_path)?.join(filename);

        let slot = self.slot(filename);
        let result = slot
            .get_or_try_init(|| async {
                let bytes = self
                    .fs
                    .read_bytes(&path)
                    .await
                    .map_err(|source| AttachmentError::Io {
                        path: path.clone(),
                        source,
                    })?;
                Ok::<_, AttachmentError>(data_url(filename, &bytes))
            })
            .await
            .cloned();

        if result.is_err() {
            self.forget_if_unresolved(filename, &slot);
        }
        result
    }

    /// Rewrites every attachment image link in `content` to an embedded data
    /// URL. Files that cannot be read become an inline placeholder.
    pub async fn resolve(&self, content: &str, project_path: &Path) -> String {
        let re = image_link_regex();

        let filenames: Vec<String> = re
            .captures_iter(content)
            .map(|caps| caps[2].to_string())
            .collect();

        let mut resolved: HashMap<String, Option<String>> = HashMap::new();
        for filename in filenames {
            if resolved.contains_key(&filename) {
                continue;
            }
            let url = match self.materialize(&filename, project_path).await {
                Ok(url) => Some(url),
                Err(e) => {
                    log::warn!("Error loading image {}: {}", filename, e);
                    None
                }
            };
            resolved.insert(filename, url);
        }

        re.replace_all(content, |caps: &Captures| {
            let alt = &caps[1];
            let filename = &caps[2];
            match resolved.get(filename).and_then(|u| u.as_deref()) {
                Some(url) => format!("![{}]({})", alt, url),
                None => placeholder(filename),
            }
        })
        .into_owned()
    }

    /// Writes pasted image bytes into the attachments directory and returns
    /// the markdown reference to insert.
    pub async fn store(
        &self,
        bytes: &[u8],
        suggested_name: &str,
        project_path: &Path,
    ) -> Result<StoredAttachment, AttachmentError> {
        let dir = attachments_dir(project_path)?;
        self.fs
            .create_dir_all(&dir)
            .await
            .map_err(|source| AttachmentError::Io {
                path: dir.clone(),
                source,
            })?;

        let ext = Path::new(suggested_name)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_else(|| "png".to_string());

        let base = format!("image-{}", chrono::Utc::now().timestamp_millis());
        let mut counter = 0;
        let (filename, path) = loop {
            let filename = match counter {
                0 => format!("{}.{}", base, ext),
                n => format!("{}-{}.{}", base, n, ext),
            };
            let path = dir.join(&filename);
            match self.fs.create_new(&path, bytes).await {
                Ok(()) => break (filename, path),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => counter += 1,
                Err(source) => return Err(AttachmentError::Io { path, source }),
            }
        };
        log::info!("Image saved as: {} at: {}", filename, dir.display());

        // Seed the cache so the first render does not read the file back.
        let _ = self.slot(&filename).set(data_url(&filename, bytes));

        let created = now();
        let id = filename
            .rsplit_once('.')
            .map(|(stem, _)| stem.to_string())
            .unwrap_or_else(|| filename.clone());
        Ok(StoredAttachment {
            reference: format!("![{}]({}{})", filename, REFERENCE_PREFIX, filename),
            attachment: Attachment {
                id,
                filetype: mime_for(&filename).to_string(),
                filesize: bytes.len() as u64,
                filename,
                created_at: created,
                updated_at: created,
            },
            path,
        })
    }
}
