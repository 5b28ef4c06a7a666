use archdiff_common::{ChangedEntry, DiffResult, Equivalence, Snapshot};
use tracing::info;

/// Partitions the paths of two snapshots into added, removed, changed and unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffEngine {
    equivalence: Equivalence,
}

impl DiffEngine {
    pub fn new(equivalence: Equivalence) -> Self {
        Self { equivalence }
    }

    pub fn equivalence(&self) -> Equivalence {
        self.equivalence
    }

    pub fn compare(&self, source: &Snapshot, target: &Snapshot) -> DiffResult {
        let mut result = DiffResult::default();

        for (path, entry) in target.iter() {
            result.widths.observe(&entry.owner);
            match source.get(path) {
                None => {
                    result.added.insert(path.clone(), entry.clone());
                }
                Some(original) if self.equivalence.equivalent(original, entry) => {
                    result.unchanged.insert(path.clone(), entry.clone());
                }
                Some(original) => {
                    result.changed.insert(
                        path.clone(),
                        ChangedEntry {
                            source: original.clone(),
                            target: entry.clone(),
                        },
                    );
                }
            }
        }

        for (path, entry) in source.iter() {
            result.widths.observe(&entry.owner);
            if !target.contains(path) {
                result.removed.insert(path.clone(), entry.clone());
            }
        }

        info!(
            "Compared {} source and {} target entries: {} added, {} removed, {} changed, {} unchanged",
            source.len(),
            target.len(),
            result.added.len(),
            result.removed.len(),
            result.changed.len(),
            result.unchanged.len()
        );

        result
    }
}
