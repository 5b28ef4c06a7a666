//! RPM packages: the lead and header sections are read only far enough to
//! learn the payload format and compressor, then the cpio payload is walked.

use super::{
    clean_path, into_item, read_body, read_link_target, BodyMode, Content, EntryMeta,
    EntryWalker, Visitor, WalkItem,
};
use archdiff_common::{ArchDiffError, EntryKind, FileMode, Result};
use cpio::NewcReader;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::debug;
use xz2::read::XzDecoder;

const LEAD_SIZE: usize = 96;
const LEAD_MAGIC: [u8; 4] = [0xed, 0xab, 0xee, 0xdb];
const HEADER_MAGIC: [u8; 3] = [0x8e, 0xad, 0xe8];

const TAG_PAYLOADFORMAT: u32 = 1124;
const TAG_PAYLOADCOMPRESSOR: u32 = 1125;

const TYPE_STRING: u32 = 6;
const TYPE_STRING_ARRAY: u32 = 8;
const TYPE_I18NSTRING: u32 = 9;

const MAX_INDEX_ENTRIES: usize = 0x1_0000;
const MAX_STORE_SIZE: usize = 256 * 1024 * 1024;

/// Payload description from the main RPM header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayloadInfo {
    pub format: Option<String>,
    pub compressor: Option<String>,
}

struct IndexEntry {
    tag: u32,
    kind: u32,
    offset: u32,
}

struct Header {
    index: Vec<IndexEntry>,
    store: Vec<u8>,
}

impl Header {
    fn read<R: Read>(reader: &mut R) -> io::Result<Header> {
        let mut intro = [0u8; 16];
        reader.read_exact(&mut intro)?;
        if intro[..3] != HEADER_MAGIC {
            return Err(invalid("bad header magic"));
        }

        let count = be_u32(&intro[8..12]) as usize;
        let store_len = be_u32(&intro[12..16]) as usize;
        if count > MAX_INDEX_ENTRIES || store_len > MAX_STORE_SIZE {
            return Err(invalid("header size out of range"));
        }

        let raw = read_section(reader, count * 16)?;
        let index = raw
            .chunks_exact(16)
            .map(|chunk| IndexEntry {
                tag: be_u32(&chunk[0..4]),
                kind: be_u32(&chunk[4..8]),
                offset: be_u32(&chunk[8..12]),
            })
            .collect();

        let store = read_section(reader, store_len)?;

        Ok(Header { index, store })
    }

    /// On-disk size of this header section
    fn len(&self) -> usize {
        16 + self.index.len() * 16 + self.store.len()
    }

    fn string(&self, tag: u32) -> Option<String> {
        let entry = self.index.iter().find(|entry| {
            entry.tag == tag
                && matches!(entry.kind, TYPE_STRING | TYPE_STRING_ARRAY | TYPE_I18NSTRING)
        })?;
        let bytes = self.store.get(entry.offset as usize..)?;
        let end = bytes.iter().position(|&b| b == 0)?;
        Some(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }
}

/// Read exactly `len` bytes, growing the buffer only as data arrives
fn read_section<R: Read>(reader: &mut R, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("header section truncated: expected {} bytes, got {}", len, buf.len()),
        ));
    }
    Ok(buf)
}

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn invalid(reason: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, reason.to_string())
}

/// Read the lead, signature and main header, leaving `reader` at the start of the payload
pub fn read_payload_info<R: Read>(reader: &mut R) -> io::Result<PayloadInfo> {
    let mut lead = [0u8; LEAD_SIZE];
    reader.read_exact(&mut lead)?;
    if lead[..4] != LEAD_MAGIC {
        return Err(invalid("not an rpm package"));
    }

    // The signature section is padded to an 8-byte boundary
    let signature = Header::read(reader)?;
    let padding = (8 - signature.len() % 8) % 8;
    let mut pad = [0u8; 8];
    reader.read_exact(&mut pad[..padding])?;

    let header = Header::read(reader)?;
    Ok(PayloadInfo {
        format: header.string(TAG_PAYLOADFORMAT),
        compressor: header.string(TAG_PAYLOADCOMPRESSOR),
    })
}

/// RPM package walker over its cpio payload
pub struct RpmWalker {
    package_path: PathBuf,
    body_mode: BodyMode,
}

impl RpmWalker {
    pub fn new(package_path: PathBuf) -> Self {
        Self {
            package_path,
            body_mode: BodyMode::default(),
        }
    }

    pub fn with_body_mode(mut self, body_mode: BodyMode) -> Self {
        self.body_mode = body_mode;
        self
    }

    fn open_payload(&self) -> Result<Box<dyn Read>> {
        let file = File::open(&self.package_path)
            .map_err(|e| ArchDiffError::open(&self.package_path, e))?;
        let mut reader = BufReader::new(file);

        let info = read_payload_info(&mut reader)
            .map_err(|e| ArchDiffError::corrupt(&self.package_path, e))?;
        debug!("RPM {:?} payload: {:?}", self.package_path, info);

        match info.format.as_deref() {
            Some("cpio") => {}
            other => {
                return Err(ArchDiffError::corrupt(
                    &self.package_path,
                    format!("unsupported payload format: {}", other.unwrap_or("<undeclared>")),
                ))
            }
        }

        match info.compressor.as_deref() {
            Some("xz") => Ok(Box::new(XzDecoder::new(reader))),
            Some("gzip") => Ok(Box::new(GzDecoder::new(reader))),
            other => Err(ArchDiffError::corrupt(
                &self.package_path,
                format!(
                    "unsupported rpm compression format: {}",
                    other.unwrap_or("<undeclared>")
                ),
            )),
        }
    }
}

impl EntryWalker for RpmWalker {
    fn container(&self) -> &Path {
        &self.package_path
    }

    fn walk(&self, visit: &mut Visitor<'_>) -> Result<()> {
        let payload = self.open_payload()?;
        walk_cpio(payload, &self.package_path, self.body_mode, visit)
    }
}

/// Walk a newc cpio stream up to its trailer
pub(crate) fn walk_cpio<R: Read>(
    stream: R,
    container: &Path,
    body_mode: BodyMode,
    visit: &mut Visitor<'_>,
) -> Result<()> {
    let mut inner = stream;
    loop {
        let mut reader = NewcReader::new(inner).map_err(|e| ArchDiffError::corrupt(container, e))?;
        if reader.entry().is_trailer() {
            return Ok(());
        }

        let item = read_member(&mut reader, body_mode);
        visit(item)?;

        inner = reader
            .finish()
            .map_err(|e| ArchDiffError::corrupt(container, e))?;
    }
}

fn read_member<R: Read>(reader: &mut NewcReader<R>, body_mode: BodyMode) -> WalkItem {
    let entry = reader.entry();
    let mode = FileMode(entry.mode());
    let size = u64::from(entry.file_size());
    let meta = EntryMeta::new(clean_path(entry.name()), mode)
        .with_ids(Some(entry.uid()), Some(entry.gid()));

    let content = match meta.kind {
        EntryKind::Dir => Ok(Content::Empty),
        EntryKind::Symlink => read_link_target(reader, &meta.path).map(Content::Link),
        EntryKind::File => read_body(reader, size, &meta.path, body_mode),
    };

    into_item(meta, content)
}
