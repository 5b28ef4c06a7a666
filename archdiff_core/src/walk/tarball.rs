use super::{
    clean_path, into_item, read_body, BodyMode, Content, EntryFailure, EntryMeta, EntryWalker,
    Visitor,
};
use archdiff_common::{ArchDiffError, FileMode, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tar::{Archive, Entry, EntryType};
use tracing::debug;
use xz2::read::XzDecoder;

/// Compression wrapped around a tar stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TarCompression {
    None,
    Gzip,
    Xz,
}

/// TAR archive walker (plain, gzip or xz compressed)
pub struct TarWalker {
    archive_path: PathBuf,
    compression: TarCompression,
    body_mode: BodyMode,
}

impl TarWalker {
    pub fn new(archive_path: PathBuf, compression: TarCompression) -> Self {
        Self {
            archive_path,
            compression,
            body_mode: BodyMode::default(),
        }
    }

    pub fn with_body_mode(mut self, body_mode: BodyMode) -> Self {
        self.body_mode = body_mode;
        self
    }

    fn open_stream(&self) -> Result<Box<dyn Read>> {
        let file = File::open(&self.archive_path)
            .map_err(|e| ArchDiffError::open(&self.archive_path, e))?;
        let file = BufReader::new(file);

        Ok(match self.compression {
            TarCompression::None => Box::new(file),
            TarCompression::Gzip => Box::new(GzDecoder::new(file)),
            TarCompression::Xz => Box::new(XzDecoder::new(file)),
        })
    }
}

impl EntryWalker for TarWalker {
    fn container(&self) -> &Path {
        &self.archive_path
    }

    fn walk(&self, visit: &mut Visitor<'_>) -> Result<()> {
        debug!("Walking tar archive {:?} ({:?})", self.archive_path, self.compression);
        let stream = self.open_stream()?;
        walk_tar_stream(stream, &self.archive_path, self.body_mode, visit)
    }
}

/// Walk an already decompressed tar stream
pub(crate) fn walk_tar_stream<R: Read>(
    stream: R,
    container: &Path,
    body_mode: BodyMode,
    visit: &mut Visitor<'_>,
) -> Result<()> {
    let mut archive = Archive::new(stream);
    let entries = archive
        .entries()
        .map_err(|e| ArchDiffError::corrupt(container, e))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| ArchDiffError::corrupt(container, e))?;
        let entry_type = entry.header().entry_type();
        if entry_type == EntryType::XGlobalHeader {
            continue;
        }

        let path = entry
            .path()
            .map(|p| clean_path(&p.to_string_lossy()))
            .map_err(|e| ArchDiffError::corrupt(container, e))?;

        let meta = match entry_meta(&entry, path.clone(), entry_type) {
            Ok(meta) => meta,
            Err(error) => {
                visit(Err(EntryFailure {
                    path,
                    meta: None,
                    error,
                }))?;
                continue;
            }
        };

        let content = match entry_type {
            // Hard links are reported like symlinks pointing at the linked name
            EntryType::Link | EntryType::Symlink => entry
                .link_name()
                .map(|target| {
                    Content::Link(
                        target
                            .map(|t| t.to_string_lossy().into_owned())
                            .unwrap_or_default(),
                    )
                })
                .map_err(|e| ArchDiffError::entry(path.as_str(), e)),
            EntryType::Directory => Ok(Content::Empty),
            _ => {
                let size = entry.size();
                read_body(&mut entry, size, &path, body_mode)
            }
        };

        visit(into_item(meta, content))?;
    }

    Ok(())
}

fn entry_meta<R: Read>(
    entry: &Entry<'_, R>,
    path: String,
    entry_type: EntryType,
) -> Result<EntryMeta> {
    let header = entry.header();
    let perm = header
        .mode()
        .map_err(|e| ArchDiffError::entry(path.as_str(), e))?;

    let type_bits = match entry_type {
        EntryType::Directory => FileMode::S_IFDIR,
        EntryType::Link | EntryType::Symlink => FileMode::S_IFLNK,
        EntryType::Char => FileMode::S_IFCHR,
        EntryType::Block => FileMode::S_IFBLK,
        EntryType::Fifo => FileMode::S_IFIFO,
        _ => FileMode::S_IFREG,
    };
    let mode = FileMode(type_bits | (perm & 0o7777));

    let uid = header.uid().ok().and_then(|id| u32::try_from(id).ok());
    let gid = header.gid().ok().and_then(|id| u32::try_from(id).ok());

    let mut meta = EntryMeta::new(path, mode).with_ids(uid, gid);
    meta.user_name = embedded_name(header.username());
    meta.group_name = embedded_name(header.groupname());
    Ok(meta)
}

fn embedded_name(name: std::result::Result<Option<&str>, std::str::Utf8Error>) -> Option<String> {
    match name {
        Ok(Some(name)) if !name.is_empty() => Some(name.to_string()),
        _ => None,
    }
}
