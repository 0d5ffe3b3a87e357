use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::Context;

use crate::foundation::error::{ReelError, ReelResult};

/// Where static media (frames, video) is served from.
///
/// Implementations are shared with the preload worker pool, hence `Send + Sync`.
pub trait AssetSource: Send + Sync + std::fmt::Debug {
    /// Absolute locator for `rel` (filesystem path or URL), used for logging and by `ffmpeg`.
    fn locate(&self, rel: &str) -> ReelResult<String>;

    /// Read the full bytes of `rel`.
    fn fetch(&self, rel: &str) -> ReelResult<Vec<u8>>;
}

/// Static files below a local directory (the deployment's public folder).
#[derive(Clone, Debug)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, rel: &str) -> ReelResult<PathBuf> {
        let norm = normalize_asset_path(rel)?;
        Ok(self.root.join(Path::new(&norm)))
    }
}

impl AssetSource for DirSource {
    fn locate(&self, rel: &str) -> ReelResult<String> {
        Ok(self.path_for(rel)?.to_string_lossy().into_owned())
    }

    fn fetch(&self, rel: &str) -> ReelResult<Vec<u8>> {
        let path = self.path_for(rel)?;
        std::fs::read(&path)
            .with_context(|| format!("read asset bytes from '{}'", path.display()))
            .map_err(ReelError::from)
    }
}

/// Static files behind an http(s) origin, below the deployment base path.
#[derive(Clone, Debug)]
pub struct HttpSource {
    origin: String,
    base_path: String,
    client: reqwest::blocking::Client,
}

impl HttpSource {
    pub fn new(origin: &str, base_path: &str) -> ReelResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ReelError::media(format!("failed to build http client: {e}")))?;
        Ok(Self {
            origin: origin.trim_end_matches('/').to_string(),
            base_path: normalize_base_path(base_path),
            client,
        })
    }
}

impl AssetSource for HttpSource {
    fn locate(&self, rel: &str) -> ReelResult<String> {
        asset_url(&self.origin, &self.base_path, rel)
    }

    fn fetch(&self, rel: &str) -> ReelResult<Vec<u8>> {
        let url = self.locate(rel)?;
        let resp = self
            .client
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| ReelError::media(format!("GET '{url}' failed: {e}")))?;
        let bytes = resp
            .bytes()
            .map_err(|e| ReelError::media(format!("GET '{url}' body read failed: {e}")))?;
        Ok(bytes.to_vec())
    }
}

/// Pick a source for `root`: `http://`/`https://` roots are fetched over HTTP, anything else is
/// a local directory.
pub fn open_source(root: &str, base_path: &str) -> ReelResult<Arc<dyn AssetSource>> {
    if root.starts_with("http://") || root.starts_with("https://") {
        Ok(Arc::new(HttpSource::new(root, base_path)?))
    } else {
        Ok(Arc::new(DirSource::new(root)))
    }
}

/// `"beta/krrish/"` -> `"/beta/krrish"`, `""` and `"/"` -> `""`.
pub fn normalize_base_path(base_path: &str) -> String {
    let trimmed = base_path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

pub fn asset_url(origin: &str, base_path: &str, rel: &str) -> ReelResult<String> {
    let norm = normalize_asset_path(rel)?;
    Ok(format!(
        "{}{}/{}",
        origin.trim_end_matches('/'),
        normalize_base_path(base_path),
        norm
    ))
}

/// Site-rooted asset path (`/frames/a.jpg`) to a normalized relative path (`frames/a.jpg`).
pub fn normalize_asset_path(source: &str) -> ReelResult<String> {
    normalize_rel_path(source.trim_start_matches(['/', '\\']))
}

/// Normalize and validate a relative asset path.
///
/// The normalized result uses `/` separators, removes `.` segments, and rejects absolute paths or
/// parent traversals (`..`).
pub fn normalize_rel_path(source: &str) -> ReelResult<String> {
    let s = source.replace('\\', "/");
    if s.starts_with('/') {
        return Err(ReelError::validation("asset paths must be relative"));
    }
    if s.is_empty() {
        return Err(ReelError::validation("asset path must be non-empty"));
    }

    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(ReelError::validation("asset paths must not contain '..'"));
        }
        out.push(part);
    }

    if out.is_empty() {
        return Err(ReelError::validation("asset path must contain a file name"));
    }

    Ok(out.join("/"))
}
