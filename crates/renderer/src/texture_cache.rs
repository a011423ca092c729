//! Path-keyed texture cache: at most one GPU upload per distinct path.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use asset::{ImageDecoder, TextureKind, TextureLoadError};

use crate::backend::GpuBackend;

/// Texture as referenced by a mesh. `kind` is per reference; identity is `path`.
#[derive(Clone, Debug, PartialEq)]
pub struct Texture<T> {
    pub handle: T,
    pub kind: TextureKind,
    pub path: PathBuf,
}

struct CacheEntry<T> {
    handle: T,
    failed: bool,
}

/// Owns every texture a model uploaded.
/// Keys are the path spelling as given: `a/./b.png` and `a/b.png` are distinct entries.
pub struct TextureCache<T> {
    entries: HashMap<OsString, CacheEntry<T>>,
    // insertion order, for stable iteration
    order: Vec<PathBuf>,
    uploads: usize,
}

impl<T: Clone> TextureCache<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
            uploads: 0,
        }
    }

    /// Return the texture for `path`, decoding and uploading it on first request only.
    /// Paths match by exact spelling, without component normalization.
    ///
    /// A failed decode is remembered: the path keeps a sentinel handle and later
    /// requests fail with [`TextureLoadError::Unavailable`] without touching disk.
    pub fn get_or_load<B, D>(
        &mut self,
        backend: &mut B,
        decoder: &D,
        path: &Path,
        kind: TextureKind,
    ) -> Result<Texture<T>, TextureLoadError>
    where
        B: GpuBackend<Texture = T>,
        D: ImageDecoder + ?Sized,
    {
        if let Some(entry) = self.entries.get(path.as_os_str()) {
            if entry.failed {
                return Err(TextureLoadError::Unavailable {
                    path: path.to_path_buf(),
                });
            }
            return Ok(Texture {
                handle: entry.handle.clone(),
                kind,
                path: path.to_path_buf(),
            });
        }

        let (handle, result) = match decoder.decode(path) {
            Ok(image) => {
                let handle = backend.create_texture(&path.to_string_lossy(), &image);
                self.uploads += 1;
                log::info!(
                    "finish loading texture from {} ({}x{})",
                    path.display(),
                    image.width,
                    image.height
                );
                (handle, Ok(()))
            }
            Err(err) => (backend.invalid_texture(), Err(err)),
        };

        self.order.push(path.to_path_buf());
        self.entries.insert(
            path.as_os_str().to_owned(),
            CacheEntry {
                handle: handle.clone(),
                failed: result.is_err(),
            },
        );

        result.map(|()| Texture {
            handle,
            kind,
            path: path.to_path_buf(),
        })
    }

    /// Cached handle for `path`, if it was requested before (sentinel if it failed).
    pub fn get(&self, path: &Path) -> Option<&T> {
        self.entries.get(path.as_os_str()).map(|e| &e.handle)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path.as_os_str())
    }

    /// Number of distinct paths requested.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Successful GPU uploads performed.
    pub fn upload_count(&self) -> usize {
        self.uploads
    }

    /// Paths in first-request order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.order.iter().map(PathBuf::as_path)
    }
}

impl<T: Clone> Default for TextureCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
