//! Container dispatch: picks the walker for a path by directory test, then extension.

use crate::walk::directory::slash_path;
use crate::walk::{
    clean_path, BodyMode, DirectoryWalker, EntryWalker, RpmWalker, SevenZWalker,
    TarCompression, TarWalker, ZipWalker,
};
use archdiff_common::{ArchDiffError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Container kinds understood by [`dispatch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Directory,
    Tar(TarCompression),
    Zip,
    SevenZ,
    Rpm,
}

impl ContainerKind {
    /// Kind selected by the final filename extension, compared case-insensitively.
    /// `.tar.gz` therefore matches on `gz`.
    pub fn from_extension(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_string_lossy().to_lowercase();
        match extension.as_str() {
            "gz" | "tgz" => Some(ContainerKind::Tar(TarCompression::Gzip)),
            "xz" => Some(ContainerKind::Tar(TarCompression::Xz)),
            "tar" => Some(ContainerKind::Tar(TarCompression::None)),
            "zip" => Some(ContainerKind::Zip),
            "7z" => Some(ContainerKind::SevenZ),
            "rpm" => Some(ContainerKind::Rpm),
            _ => None,
        }
    }

    /// An existing directory is always walked as a directory, whatever its name
    pub fn detect(path: &Path) -> Option<Self> {
        if path.is_dir() {
            Some(ContainerKind::Directory)
        } else {
            Self::from_extension(path)
        }
    }
}

pub fn is_supported(path: &Path) -> bool {
    ContainerKind::detect(path).is_some()
}

/// Classify `path`, failing with `UnsupportedFormat` for anything not walkable
pub fn check(path: &Path) -> Result<ContainerKind> {
    ContainerKind::detect(path).ok_or_else(|| ArchDiffError::UnsupportedFormat {
        path: path.to_path_buf(),
        extension: path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default(),
    })
}

/// Build the walker for `path`
pub fn dispatch(path: &Path, body_mode: BodyMode) -> Result<Box<dyn EntryWalker>> {
    let kind = check(path)?;
    debug!("Dispatching {:?} as {:?}", path, kind);

    let walker: Box<dyn EntryWalker> = match kind {
        ContainerKind::Directory => Box::new(DirectoryWalker::new(absolute_root(path)?)),
        ContainerKind::Tar(compression) => {
            Box::new(TarWalker::new(path.to_path_buf(), compression).with_body_mode(body_mode))
        }
        ContainerKind::Zip => {
            Box::new(ZipWalker::new(path.to_path_buf()).with_body_mode(body_mode))
        }
        ContainerKind::SevenZ => {
            Box::new(SevenZWalker::new(path.to_path_buf()).with_body_mode(body_mode))
        }
        ContainerKind::Rpm => {
            Box::new(RpmWalker::new(path.to_path_buf()).with_body_mode(body_mode))
        }
    };

    Ok(walker)
}

/// Absolute, cleaned form of a directory root so it can be stripped from walked paths
fn absolute_root(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    Ok(PathBuf::from(clean_path(&slash_path(&joined))))
}
