use crate::dispatch::dispatch;
use crate::owner::NameCache;
use crate::walk::{clean_path, BodyMode, EntryWalker, WalkEntry};
use archdiff_common::{CompareConfig, Entry, Result, Snapshot};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Builds filtered snapshots of containers
pub struct TreeBuilder {
    config: CompareConfig,
    names: Arc<NameCache>,
    body_mode: BodyMode,
}

#[derive(Default)]
struct BuildStats {
    kept: usize,
    filtered: usize,
    duplicates: usize,
}

impl TreeBuilder {
    pub fn new(config: CompareConfig, names: Arc<NameCache>) -> Self {
        Self {
            config,
            names,
            body_mode: BodyMode::default(),
        }
    }

    pub fn with_body_mode(mut self, body_mode: BodyMode) -> Self {
        self.body_mode = body_mode;
        self
    }

    /// Dispatch `container` and build its snapshot
    pub fn build(&self, container: &Path) -> Result<Snapshot> {
        let walker = dispatch(container, self.body_mode)?;
        self.build_from(walker.as_ref())
    }

    /// Build both snapshots concurrently, returning the source error first if both fail
    pub fn build_pair(&self, source: &Path, target: &Path) -> Result<(Snapshot, Snapshot)> {
        let (source, target) = rayon::join(|| self.build(source), || self.build(target));
        Ok((source?, target?))
    }

    pub fn build_from(&self, walker: &dyn EntryWalker) -> Result<Snapshot> {
        let root = walker.container().to_string_lossy().into_owned();
        let mut snapshot = Snapshot::new(walker.container());
        let mut stats = BuildStats::default();

        walker.walk(&mut |item| {
            let entry = item.map_err(|failure| failure.error)?;
            match self.ingest(entry, &root) {
                Some(entry) => {
                    stats.kept += 1;
                    if let Some(previous) = snapshot.insert(entry) {
                        stats.duplicates += 1;
                        debug!(
                            "Duplicate path {:?} in {}, keeping the later entry",
                            previous.path, root
                        );
                    }
                }
                None => stats.filtered += 1,
            }
            Ok(())
        })?;

        info!(
            "Built snapshot of {}: {} entries kept, {} distinct ({} filtered, {} duplicates)",
            root,
            stats.kept,
            snapshot.len(),
            stats.filtered,
            stats.duplicates
        );
        Ok(snapshot)
    }

    /// Turn a walked entry into a snapshot entry, or `None` when a filter drops it
    fn ingest(&self, walked: WalkEntry, root: &str) -> Option<Entry> {
        let meta = walked.meta;
        if !self.config.file_filter.accepts(meta.kind) {
            return None;
        }

        let mut path = normalize_path(&meta.path, root);
        if let Some(cut) = &self.config.cut {
            path = relative_clean(&cut.replace_all(&path, ""));
        }
        if path.is_empty() {
            return None;
        }

        if let Some(include) = &self.config.include {
            if !include.is_match(&path) {
                return None;
            }
        }
        if let Some(exclude) = &self.config.exclude {
            if exclude.is_match(&path) {
                return None;
            }
        }

        Some(Entry {
            owner: self.names.resolve_owner(&meta),
            path,
            kind: meta.kind,
            mode: meta.mode,
        })
    }
}

/// Normalize a walked path relative to its container root: slash-separated,
/// root prefix and leading slash removed, `.` and `..` resolved.
pub fn normalize_path(raw: &str, root: &str) -> String {
    let path = raw.replace('\\', "/");
    let root = root.replace('\\', "/");
    let root = root.trim_end_matches('/');

    let relative = if root.is_empty() {
        path.as_str()
    } else if path == root {
        ""
    } else {
        path.strip_prefix(root)
            .filter(|rest| rest.starts_with('/'))
            .unwrap_or(&path)
    };

    relative_clean(relative)
}

fn relative_clean(path: &str) -> String {
    clean_path(path).trim_start_matches('/').to_string()
}
