//! Error types shared by the import pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal failure of a scene import. No model is produced.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read scene {path}: {source:#}")]
    Parse {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
    #[error("scene {path} is incomplete")]
    Incomplete { path: PathBuf },
    #[error("scene {path} has no root node")]
    MissingRoot { path: PathBuf },
    #[error("node '{node}' references mesh {index}, scene has {count}")]
    InvalidMeshReference {
        node: String,
        index: usize,
        count: usize,
    },
    #[error("mesh '{mesh}' references material {index}, scene has {count}")]
    InvalidMaterialReference {
        mesh: String,
        index: usize,
        count: usize,
    },
}

/// Non-fatal failure to produce a texture. The mesh keeps a hole in its texture list.
#[derive(Debug, Error)]
pub enum TextureLoadError {
    #[error("failed to decode texture {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("texture {path} failed to load earlier")]
    Unavailable { path: PathBuf },
}

impl TextureLoadError {
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Decode { path, .. } | Self::Unavailable { path } => path,
        }
    }
}
