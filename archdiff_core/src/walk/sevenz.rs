use super::{
    clean_path, into_item, member_mode, read_body, read_link_target, BodyMode, Content,
    EntryMeta, EntryWalker, Visitor, WalkItem,
};
use archdiff_common::{ArchDiffError, EntryKind, Result};
use sevenz_rust::{Password, SevenZArchiveEntry, SevenZReader};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

const FILE_ATTRIBUTE_READONLY: u32 = 0x1;
const FILE_ATTRIBUTE_DIRECTORY: u32 = 0x10;
/// High 16 bits of the attributes hold a unix mode
const FILE_ATTRIBUTE_UNIX_EXTENSION: u32 = 0x8000;

/// 7Z archive walker. 7z records no ownership.
pub struct SevenZWalker {
    archive_path: PathBuf,
    body_mode: BodyMode,
}

impl SevenZWalker {
    pub fn new(archive_path: PathBuf) -> Self {
        Self {
            archive_path,
            body_mode: BodyMode::default(),
        }
    }

    pub fn with_body_mode(mut self, body_mode: BodyMode) -> Self {
        self.body_mode = body_mode;
        self
    }
}

impl EntryWalker for SevenZWalker {
    fn container(&self) -> &Path {
        &self.archive_path
    }

    fn walk(&self, visit: &mut Visitor<'_>) -> Result<()> {
        let file = File::open(&self.archive_path)
            .map_err(|e| ArchDiffError::open(&self.archive_path, e))?;
        let len = file
            .metadata()
            .map_err(|e| ArchDiffError::open(&self.archive_path, e))?
            .len();

        let mut reader = SevenZReader::new(file, len, Password::empty())
            .map_err(|e| ArchDiffError::corrupt(&self.archive_path, e))?;
        debug!("Walking 7z archive {:?}", self.archive_path);

        let body_mode = self.body_mode;
        let mut aborted = None;
        let result = reader.for_each_entries(|entry, body| {
            let item = read_member(entry, body, body_mode);
            match visit(item) {
                Ok(()) => Ok(true),
                Err(e) => {
                    aborted = Some(e);
                    // Ok(false) only ends the current folder; an error unwinds the whole reader
                    Err(sevenz_rust::Error::other("walk aborted"))
                }
            }
        });

        if let Some(e) = aborted {
            return Err(e);
        }
        result.map_err(|e| ArchDiffError::corrupt(&self.archive_path, e))
    }
}

fn read_member(entry: &SevenZArchiveEntry, body: &mut dyn Read, body_mode: BodyMode) -> WalkItem {
    let path = clean_path(entry.name());
    let attributes = if entry.has_windows_attributes {
        entry.windows_attributes
    } else {
        0
    };
    let mode = member_mode(unix_mode(attributes, entry.is_directory()), entry.is_directory());
    let meta = EntryMeta::new(path, mode);

    let content = match meta.kind {
        EntryKind::Dir => Ok(Content::Empty),
        EntryKind::Symlink => read_link_target(body, &meta.path).map(Content::Link),
        EntryKind::File => match body_mode {
            BodyMode::Buffer => read_body(body, entry.size(), &meta.path, body_mode),
            // Solid blocks are one stream; drain so the next member starts in place
            BodyMode::Skip => io::copy(body, &mut io::sink())
                .map(|_| Content::Skipped { size: entry.size() })
                .map_err(|e| ArchDiffError::entry(meta.path.as_str(), e)),
        },
    };

    into_item(meta, content)
}

/// Unix mode from windows attributes; without the unix extension fall back to
/// `0666` / `0777` minus write bits for read-only members
pub(crate) fn unix_mode(attributes: u32, is_dir: bool) -> u32 {
    if attributes & FILE_ATTRIBUTE_UNIX_EXTENSION != 0 {
        return attributes >> 16;
    }

    let mut perm = if is_dir || attributes & FILE_ATTRIBUTE_DIRECTORY != 0 {
        0o040777
    } else {
        0o666
    };
    if attributes & FILE_ATTRIBUTE_READONLY != 0 {
        perm &= !0o222;
    }
    perm
}
