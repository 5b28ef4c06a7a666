use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Kind of a file-system object found inside a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
}

impl EntryKind {
    /// Classify unix `st_mode` type bits. Device nodes, fifos and sockets count as files.
    pub fn from_mode(mode: FileMode) -> Self {
        match mode.type_bits() {
            FileMode::S_IFDIR => EntryKind::Dir,
            FileMode::S_IFLNK => EntryKind::Symlink,
            _ => EntryKind::File,
        }
    }

    pub fn is_dir(self) -> bool {
        self == EntryKind::Dir
    }

    fn type_bits(self) -> u32 {
        match self {
            EntryKind::File => FileMode::S_IFREG,
            EntryKind::Dir => FileMode::S_IFDIR,
            EntryKind::Symlink => FileMode::S_IFLNK,
        }
    }
}

/// Unix `st_mode`-style bit set: type bits, setid/sticky bits and permission bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileMode(pub u32);

impl FileMode {
    pub const S_IFMT: u32 = 0o170000;
    pub const S_IFSOCK: u32 = 0o140000;
    pub const S_IFLNK: u32 = 0o120000;
    pub const S_IFREG: u32 = 0o100000;
    pub const S_IFBLK: u32 = 0o060000;
    pub const S_IFDIR: u32 = 0o040000;
    pub const S_IFCHR: u32 = 0o020000;
    pub const S_IFIFO: u32 = 0o010000;

    pub const S_ISUID: u32 = 0o4000;
    pub const S_ISGID: u32 = 0o2000;
    pub const S_ISVTX: u32 = 0o1000;

    /// Mode with the type bits of `kind` and the given permission/setid bits.
    /// Type bits already present in `perm` are replaced.
    pub fn with_kind(kind: EntryKind, perm: u32) -> Self {
        FileMode(kind.type_bits() | (perm & 0o7777))
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn type_bits(self) -> u32 {
        self.0 & Self::S_IFMT
    }

    pub fn is_sticky(self) -> bool {
        self.0 & Self::S_ISVTX != 0
    }

    /// Permission bits plus the sticky bit, the part compared by the permissions-only policy
    pub fn permissions(self) -> u32 {
        self.0 & (Self::S_ISVTX | 0o777)
    }

    /// Octal permissions prefixed by the sticky digit, e.g. `0644` or `1777`
    pub fn perm_string(self) -> String {
        let sticky = if self.is_sticky() { '1' } else { '0' };
        format!("{}{:o}", sticky, self.0 & 0o777)
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let type_char = match self.type_bits() {
            Self::S_IFDIR => 'd',
            Self::S_IFLNK => 'l',
            Self::S_IFCHR => 'c',
            Self::S_IFBLK => 'b',
            Self::S_IFIFO => 'p',
            Self::S_IFSOCK => 's',
            _ => '-',
        };

        let bits = self.0;
        let mut out = String::with_capacity(10);
        out.push(type_char);

        let triplets = [
            (0o400, 0o200, 0o100, Self::S_ISUID, 's'),
            (0o040, 0o020, 0o010, Self::S_ISGID, 's'),
            (0o004, 0o002, 0o001, Self::S_ISVTX, 't'),
        ];
        for (r, w, x, special, special_char) in triplets {
            out.push(if bits & r != 0 { 'r' } else { '-' });
            out.push(if bits & w != 0 { 'w' } else { '-' });
            out.push(match (bits & x != 0, bits & special != 0) {
                (true, true) => special_char,
                (false, true) => special_char.to_ascii_uppercase(),
                (true, false) => 'x',
                (false, false) => '-',
            });
        }

        f.write_str(&out)
    }
}

/// Ownership metadata of an entry. Numeric ids are `None` when the format does not record them;
/// names are empty when they could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Owner {
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub user: String,
    pub group: String,
}

impl Owner {
    pub fn uid_string(&self) -> String {
        id_string(self.uid)
    }

    pub fn gid_string(&self) -> String {
        id_string(self.gid)
    }
}

fn id_string(id: Option<u32>) -> String {
    match id {
        Some(id) => id.to_string(),
        None => "-".to_string(),
    }
}

/// One file-system object discovered inside a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub path: String,
    pub kind: EntryKind,
    pub mode: FileMode,
    pub owner: Owner,
}

/// Complete, filtered enumeration of one container keyed by normalized path
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    root: PathBuf,
    entries: HashMap<String, Entry>,
}

impl Snapshot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: HashMap::new(),
        }
    }

    /// Container this snapshot was built from
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Insert an entry, replacing and returning any earlier entry with the same path
    pub fn insert(&mut self, entry: Entry) -> Option<Entry> {
        self.entries.insert(entry.path.clone(), entry)
    }

    pub fn get(&self, path: &str) -> Option<&Entry> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Entry)> {
        self.entries.iter()
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }
}

impl FromIterator<Entry> for Snapshot {
    fn from_iter<I: IntoIterator<Item = Entry>>(iter: I) -> Self {
        let mut snapshot = Snapshot::default();
        for entry in iter {
            snapshot.insert(entry);
        }
        snapshot
    }
}

/// Which entry kinds a snapshot keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FileFilter {
    #[default]
    All,
    /// Skip directories (files and symlinks are kept)
    FilesOnly,
    /// Skip everything that is not a directory
    DirsOnly,
}

impl FileFilter {
    pub fn accepts(self, kind: EntryKind) -> bool {
        match self {
            FileFilter::All => true,
            FileFilter::FilesOnly => !kind.is_dir(),
            FileFilter::DirsOnly => kind.is_dir(),
        }
    }
}

/// Rule deciding whether a source and target entry at the same path count as the same
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Equivalence {
    /// Path, kind, mode and owner all equal
    #[default]
    Full,
    /// Permission bits and sticky bit equal
    PermissionsOnly,
    /// Owner record equal
    OwnerOnly,
}

impl Equivalence {
    pub fn equivalent(self, a: &Entry, b: &Entry) -> bool {
        match self {
            Equivalence::Full => a == b,
            Equivalence::PermissionsOnly => a.mode.permissions() == b.mode.permissions(),
            Equivalence::OwnerOnly => a.owner == b.owner,
        }
    }
}

/// Source and target side of a path whose entries are not equivalent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedEntry {
    pub source: Entry,
    pub target: Entry,
}

/// Maximum rendered width of the owner columns across both snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColumnWidths {
    pub user: usize,
    pub group: usize,
    pub uid: usize,
    pub gid: usize,
}

impl ColumnWidths {
    pub fn observe(&mut self, owner: &Owner) {
        self.user = self.user.max(owner.user.chars().count());
        self.group = self.group.max(owner.group.chars().count());
        self.uid = self.uid.max(owner.uid_string().len());
        self.gid = self.gid.max(owner.gid_string().len());
    }
}

/// Result of comparing two snapshots. Every path of either side is in exactly one map.
#[derive(Debug, Clone, Default)]
pub struct DiffResult {
    pub added: HashMap<String, Entry>,
    pub removed: HashMap<String, Entry>,
    pub unchanged: HashMap<String, Entry>,
    pub changed: HashMap<String, ChangedEntry>,
    pub widths: ColumnWidths,
}

impl DiffResult {
    pub fn total(&self) -> usize {
        self.added.len() + self.removed.len() + self.unchanged.len() + self.changed.len()
    }

    /// True when anything was added, removed or changed
    pub fn has_differences(&self) -> bool {
        !(self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty())
    }
}

/// Map values ordered lexicographically by key
pub fn sorted_by_path<V>(map: &HashMap<String, V>) -> Vec<(&str, &V)> {
    let mut items: Vec<(&str, &V)> = map.iter().map(|(k, v)| (k.as_str(), v)).collect();
    items.sort_by(|a, b| a.0.cmp(b.0));
    items
}
