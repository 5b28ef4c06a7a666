use super::{
    clean_path, into_item, member_mode, read_body, read_link_target, BodyMode, Content,
    EntryFailure, EntryMeta, EntryWalker, Visitor, WalkItem,
};
use archdiff_common::{ArchDiffError, EntryKind, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::read::ZipFile;
use zip::ZipArchive;

/// Info-ZIP "new unix" extra field carrying uid/gid
const UNIX_OWNER_EXTRA_ID: u16 = 0x7875;

/// ZIP archive walker
pub struct ZipWalker {
    archive_path: PathBuf,
    body_mode: BodyMode,
}

impl ZipWalker {
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

impl EntryWalker for ZipWalker {
    fn container(&self) -> &Path {
        &self.archive_path
    }

    fn walk(&self, visit: &mut Visitor<'_>) -> Result<()> {
        let file = File::open(&self.archive_path)
            .map_err(|e| ArchDiffError::open(&self.archive_path, e))?;
        let mut archive = ZipArchive::new(BufReader::new(file))
            .map_err(|e| ArchDiffError::corrupt(&self.archive_path, e))?;

        debug!("Walking zip archive {:?} ({} members)", self.archive_path, archive.len());

        for index in 0..archive.len() {
            let item = match archive.by_index(index) {
                Ok(mut member) => read_member(&mut member, self.body_mode),
                Err(e) => {
                    let path = format!("{}#{}", self.archive_path.display(), index);
                    Err(EntryFailure {
                        error: ArchDiffError::entry(path.clone(), e),
                        path,
                        meta: None,
                    })
                }
            };
            visit(item)?;
        }

        Ok(())
    }
}

fn read_member(member: &mut ZipFile<'_>, body_mode: BodyMode) -> WalkItem {
    let path = clean_path(member.name());
    let is_dir = member.is_dir();
    let default_mode = if is_dir { 0o777 } else { 0o666 };
    let mode = member_mode(member.unix_mode().unwrap_or(default_mode), is_dir);
    let (uid, gid) = unix_owner(member.extra_data());
    let size = member.size();

    let meta = EntryMeta::new(path, mode).with_ids(uid, gid);
    let content = match meta.kind {
        EntryKind::Dir => Ok(Content::Empty),
        EntryKind::Symlink => read_link_target(member, &meta.path).map(Content::Link),
        EntryKind::File => read_body(member, size, &meta.path, body_mode),
    };

    into_item(meta, content)
}

/// Extract uid/gid from the Info-ZIP unix extra field, if the member carries one
pub(crate) fn unix_owner(extra: &[u8]) -> (Option<u32>, Option<u32>) {
    let mut rest = extra;

    while rest.len() >= 4 {
        let id = u16::from_le_bytes([rest[0], rest[1]]);
        let len = u16::from_le_bytes([rest[2], rest[3]]) as usize;
        let Some(data) = rest.get(4..4 + len) else {
            break;
        };

        if id == UNIX_OWNER_EXTRA_ID {
            if let Some(ids) = parse_unix_owner(data) {
                return ids;
            }
        }
        rest = &rest[4 + len..];
    }

    (None, None)
}

fn parse_unix_owner(data: &[u8]) -> Option<(Option<u32>, Option<u32>)> {
    // version(1) uid_size(1) uid(uid_size) gid_size(1) gid(gid_size)
    if *data.first()? != 1 {
        return None;
    }
    let uid_size = *data.get(1)? as usize;
    let uid = data.get(2..2 + uid_size)?;
    let gid_size = *data.get(2 + uid_size)? as usize;
    let gid = data.get(3 + uid_size..3 + uid_size + gid_size)?;
    Some((le_uint(uid), le_uint(gid)))
}

fn le_uint(bytes: &[u8]) -> Option<u32> {
    if bytes.is_empty() || bytes.len() > 8 {
        return None;
    }
    let value = bytes
        .iter()
        .rev()
        .fold(0u64, |acc, &byte| (acc << 8) | u64::from(byte));
    u32::try_from(value).ok()
}
