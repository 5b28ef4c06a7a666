use super::{Content, EntryFailure, EntryMeta, EntryWalker, Visitor, WalkEntry, WalkItem};
use archdiff_common::{ArchDiffError, EntryKind, FileMode, Result};
use jwalk::{Parallelism, WalkDir};
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Walks a directory tree on the local filesystem. Symlinks are reported, never followed.
pub struct DirectoryWalker {
    root: PathBuf,
}

impl DirectoryWalker {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl EntryWalker for DirectoryWalker {
    fn container(&self) -> &Path {
        &self.root
    }

    fn walk(&self, visit: &mut Visitor<'_>) -> Result<()> {
        // The caller may already be running on the rayon pool
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .skip_hidden(false)
            .parallelism(Parallelism::Serial);

        let mut count = 0usize;
        for entry in walker {
            let item = match entry {
                Ok(entry) => read_entry(&entry.path()),
                Err(e) => {
                    let path = e
                        .path()
                        .map(slash_path)
                        .unwrap_or_else(|| slash_path(&self.root));
                    Err(EntryFailure {
                        error: ArchDiffError::entry(path.clone(), &e),
                        path,
                        meta: None,
                    })
                }
            };
            count += 1;
            visit(item)?;
        }

        debug!("Walked {} entries under {:?}", count, self.root);
        Ok(())
    }
}

fn read_entry(path: &Path) -> WalkItem {
    let display = slash_path(path);

    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) => {
            return Err(EntryFailure {
                error: ArchDiffError::entry(display.clone(), e),
                path: display,
                meta: None,
            })
        }
    };

    let (uid, gid) = owner_ids(&metadata);
    let meta = EntryMeta::new(display, file_mode(&metadata)).with_ids(uid, gid);

    let content = match meta.kind {
        EntryKind::Dir => Content::Empty,
        EntryKind::Symlink => match fs::read_link(path) {
            Ok(target) => Content::Link(target.to_string_lossy().into_owned()),
            Err(e) => {
                return Err(EntryFailure {
                    path: meta.path.clone(),
                    error: ArchDiffError::entry(meta.path.clone(), e),
                    meta: Some(meta),
                })
            }
        },
        EntryKind::File => Content::OnDisk {
            path: path.to_path_buf(),
            size: metadata.len(),
        },
    };

    Ok(WalkEntry { meta, content })
}

pub(crate) fn slash_path(path: &Path) -> String {
    let text = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        text.into_owned()
    } else {
        text.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

#[cfg(unix)]
fn file_mode(metadata: &Metadata) -> FileMode {
    use std::os::unix::fs::MetadataExt;
    FileMode(metadata.mode())
}

#[cfg(not(unix))]
fn file_mode(metadata: &Metadata) -> FileMode {
    let file_type = metadata.file_type();
    let (kind, perm) = if file_type.is_symlink() {
        (EntryKind::Symlink, 0o777)
    } else if file_type.is_dir() {
        (EntryKind::Dir, 0o777)
    } else {
        (EntryKind::File, 0o666)
    };
    let perm = if metadata.permissions().readonly() {
        perm & !0o222
    } else {
        perm
    };
    FileMode::with_kind(kind, perm)
}

#[cfg(unix)]
fn owner_ids(metadata: &Metadata) -> (Option<u32>, Option<u32>) {
    use std::os::unix::fs::MetadataExt;
    (Some(metadata.uid()), Some(metadata.gid()))
}

#[cfg(not(unix))]
fn owner_ids(_metadata: &Metadata) -> (Option<u32>, Option<u32>) {
    (None, None)
}
