//! Streaming enumeration of container entries.
//!
//! Every container kind (directory, tar, zip, 7z, rpm) is exposed through the
//! [`EntryWalker`] trait. A walk hands each entry to a visitor as a
//! [`WalkItem`]: either the entry with its content, or an [`EntryFailure`]
//! carrying whatever metadata could be recovered. The visitor returns `Err`
//! to abort; the walker stops reading and returns that error unchanged.

pub mod directory;
pub mod rpm;
pub mod sevenz;
pub mod tarball;
pub mod zipfile;

#[cfg(test)]
mod tests_archive;


pub use directory::DirectoryWalker;
pub use rpm::{read_payload_info, PayloadInfo, RpmWalker};
pub use sevenz::SevenZWalker;
pub use tarball::{TarCompression, TarWalker};
pub use zipfile::ZipWalker;

use archdiff_common::{ArchDiffError, EntryKind, FileMode, Result};
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

/// Largest body size preallocated up front when buffering
const MAX_PREALLOC: u64 = 16 * 1024 * 1024;

/// How regular-file bodies inside archives are handled during a walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyMode {
    /// Read each body into memory and verify its declared length
    #[default]
    Buffer,
    /// Leave bodies unread; only the declared size is reported
    Skip,
}

/// Metadata of one entry as recorded by its container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMeta {
    /// Slash-separated, cleaned path as named by the container
    pub path: String,
    pub kind: EntryKind,
    pub mode: FileMode,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    /// User name embedded by the format (tar only)
    pub user_name: Option<String>,
    /// Group name embedded by the format (tar only)
    pub group_name: Option<String>,
}

impl EntryMeta {
    pub fn new(path: String, mode: FileMode) -> Self {
        Self {
            path,
            kind: EntryKind::from_mode(mode),
            mode,
            uid: None,
            gid: None,
            user_name: None,
            group_name: None,
        }
    }

    pub fn with_ids(mut self, uid: Option<u32>, gid: Option<u32>) -> Self {
        self.uid = uid;
        self.gid = gid;
        self
    }
}

/// Body of an entry
#[derive(Debug)]
pub enum Content {
    /// Directories
    Empty,
    /// Symlink target (also used for tar hard links)
    Link(String),
    /// Archive member read into memory, exactly its declared length
    Buffered(Cursor<Vec<u8>>),
    /// File in a directory tree, opened on demand
    OnDisk { path: PathBuf, size: u64 },
    /// Body left unread under [`BodyMode::Skip`]
    Skipped { size: u64 },
}

impl Content {
    pub fn size(&self) -> u64 {
        match self {
            Content::Empty => 0,
            Content::Link(target) => target.len() as u64,
            Content::Buffered(cursor) => cursor.get_ref().len() as u64,
            Content::OnDisk { size, .. } | Content::Skipped { size } => *size,
        }
    }

    pub fn link_target(&self) -> Option<&str> {
        match self {
            Content::Link(target) => Some(target),
            _ => None,
        }
    }

    /// Open the body for reading
    pub fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        match self {
            Content::Empty => Ok(Box::new(io::empty())),
            Content::Link(target) => Ok(Box::new(target.as_bytes())),
            Content::Buffered(cursor) => Ok(Box::new(cursor.get_ref().as_slice())),
            Content::OnDisk { path, .. } => Ok(Box::new(File::open(path)?)),
            Content::Skipped { .. } => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "entry body was skipped during the walk",
            )),
        }
    }

    pub fn read_all(&self) -> io::Result<Vec<u8>> {
        let mut data = Vec::new();
        self.open()?.read_to_end(&mut data)?;
        Ok(data)
    }
}

/// A successfully read entry
#[derive(Debug)]
pub struct WalkEntry {
    pub meta: EntryMeta,
    pub content: Content,
}

/// A member that could not be opened or fully read
#[derive(Debug)]
pub struct EntryFailure {
    pub path: String,
    pub meta: Option<EntryMeta>,
    pub error: ArchDiffError,
}

pub type WalkItem = std::result::Result<WalkEntry, EntryFailure>;

/// Visitor called once per entry; `Err` aborts the walk
pub type Visitor<'a> = dyn FnMut(WalkItem) -> Result<()> + 'a;

/// Enumerates the entries of one container in the order the format yields them
pub trait EntryWalker: Send + Sync {
    /// Path of the container being walked
    fn container(&self) -> &Path;

    /// Visit every entry. Whole-container failures end the walk with an error;
    /// per-entry failures are handed to `visit`.
    fn walk(&self, visit: &mut Visitor<'_>) -> Result<()>;
}

/// Clean a slash-separated path: drop empty and `.` segments and resolve `..`.
/// A leading slash is kept; `..` never climbs above the start.
pub fn clean_path(raw: &str) -> String {
    let rooted = raw.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for part in raw.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            _ => parts.push(part),
        }
    }

    let joined = parts.join("/");
    if rooted {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// Reconcile a unix mode recorded by an archive with the member's directory flag
pub(crate) fn member_mode(unix_mode: u32, is_dir: bool) -> FileMode {
    let recorded = FileMode(unix_mode);
    let kind = if is_dir {
        EntryKind::Dir
    } else if recorded.type_bits() == 0 {
        EntryKind::File
    } else {
        EntryKind::from_mode(recorded)
    };

    if recorded.type_bits() != 0 && EntryKind::from_mode(recorded) == kind {
        recorded
    } else {
        FileMode::with_kind(kind, unix_mode)
    }
}

/// Read or skip a regular-file body according to `mode`
pub(crate) fn read_body<R: Read + ?Sized>(
    reader: &mut R,
    size: u64,
    path: &str,
    mode: BodyMode,
) -> Result<Content> {
    match mode {
        BodyMode::Buffer => buffer_body(reader, size, path),
        BodyMode::Skip => Ok(Content::Skipped { size }),
    }
}

/// Buffer a body into a random-access byte source of exactly `size` bytes
pub(crate) fn buffer_body<R: Read + ?Sized>(
    reader: &mut R,
    size: u64,
    path: &str,
) -> Result<Content> {
    let mut data = Vec::with_capacity(size.min(MAX_PREALLOC) as usize);
    reader
        .read_to_end(&mut data)
        .map_err(|e| ArchDiffError::entry(path, e))?;

    if data.len() as u64 != size {
        return Err(ArchDiffError::entry(
            path,
            format!("size mismatch: expected {}, got {}", size, data.len()),
        ));
    }

    Ok(Content::Buffered(Cursor::new(data)))
}

/// Read a symlink target stored as the member body
pub(crate) fn read_link_target<R: Read + ?Sized>(reader: &mut R, path: &str) -> Result<String> {
    let mut data = Vec::new();
    reader
        .read_to_end(&mut data)
        .map_err(|e| ArchDiffError::entry(path, e))?;
    Ok(String::from_utf8_lossy(&data).into_owned())
}

/// Pair a content result with its metadata
pub(crate) fn into_item(meta: EntryMeta, content: Result<Content>) -> WalkItem {
    match content {
        Ok(content) => Ok(WalkEntry { meta, content }),
        Err(error) => Err(EntryFailure {
            path: meta.path.clone(),
            meta: Some(meta),
            error,
        }),
    }
}
