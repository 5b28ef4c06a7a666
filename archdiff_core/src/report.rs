//! Text and JSON rendering of a [`DiffResult`].

use archdiff_common::{
    sorted_by_path, ChangedEntry, ColumnWidths, DiffResult, Entry, EntryKind, Owner,
};
use serde::Serialize;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::Path;

/// Renders diff results; sections are ordered changed, added, removed, unchanged
pub struct Reporter;

impl Reporter {
    pub fn write_text<W: Write>(
        out: &mut W,
        result: &DiffResult,
        source: &Path,
        target: &Path,
    ) -> io::Result<()> {
        let header = |kind: &str| {
            format!(
                "--- {} files ({} -> {}) ---",
                kind,
                source.display(),
                target.display()
            )
        };
        let widths = &result.widths;

        if !result.changed.is_empty() {
            writeln!(out, "{}", header("changed"))?;
            let width = path_width(&result.changed);
            for (path, change) in sorted_by_path(&result.changed) {
                write_change(out, path, change, width, widths)?;
            }
        }

        let sections = [
            ("added", &result.added),
            ("removed", &result.removed),
            ("unchanged", &result.unchanged),
        ];
        for (kind, entries) in sections {
            if entries.is_empty() {
                continue;
            }
            writeln!(out, "{}", header(kind))?;
            let width = path_width(entries);
            for (path, entry) in sorted_by_path(entries) {
                writeln!(
                    out,
                    "{}: {:<width$} {} ({} {})",
                    kind,
                    path,
                    entry.mode.perm_string(),
                    entry.mode,
                    owner_string(&entry.owner, widths),
                    width = width
                )?;
            }
        }

        Ok(())
    }

    pub fn write_json<W: Write>(
        out: &mut W,
        result: &DiffResult,
        source: &Path,
        target: &Path,
    ) -> io::Result<()> {
        let report = JsonReport {
            source: source.display().to_string(),
            target: target.display().to_string(),
            summary: JsonSummary {
                added: result.added.len(),
                removed: result.removed.len(),
                changed: result.changed.len(),
                unchanged: result.unchanged.len(),
            },
            changed: sorted_by_path(&result.changed)
                .into_iter()
                .map(|(path, change)| JsonChange {
                    path,
                    source: JsonEntry::from(&change.source),
                    target: JsonEntry::from(&change.target),
                })
                .collect(),
            added: json_entries(&result.added),
            removed: json_entries(&result.removed),
            unchanged: json_entries(&result.unchanged),
        };

        serde_json::to_writer_pretty(&mut *out, &report)?;
        writeln!(out)
    }
}

fn write_change<W: Write>(
    out: &mut W,
    path: &str,
    change: &ChangedEntry,
    width: usize,
    widths: &ColumnWidths,
) -> io::Result<()> {
    let (source, target) = (&change.source, &change.target);
    writeln!(
        out,
        "changed: {:<width$} {} -> {} ({} {} -> {} {})",
        path,
        source.mode.perm_string(),
        target.mode.perm_string(),
        source.mode,
        owner_string(&source.owner, widths),
        target.mode,
        owner_string(&target.owner, widths),
        width = width
    )
}

/// Widest path of a section plus one column of padding
fn path_width<V>(entries: &HashMap<String, V>) -> usize {
    entries.keys().map(|path| path.chars().count()).max().unwrap_or(0) + 1
}

/// `user:group (uid:gid)` aligned to the column widths of the whole result
fn owner_string(owner: &Owner, widths: &ColumnWidths) -> String {
    format!(
        "{:>uw$}:{:<gw$} ({:>iw$}:{:<jw$})",
        owner.user,
        owner.group,
        owner.uid_string(),
        owner.gid_string(),
        uw = widths.user,
        gw = widths.group,
        iw = widths.uid,
        jw = widths.gid
    )
}

#[derive(Serialize)]
struct JsonReport<'a> {
    source: String,
    target: String,
    summary: JsonSummary,
    changed: Vec<JsonChange<'a>>,
    added: Vec<JsonEntry<'a>>,
    removed: Vec<JsonEntry<'a>>,
    unchanged: Vec<JsonEntry<'a>>,
}

#[derive(Serialize)]
struct JsonSummary {
    added: usize,
    removed: usize,
    changed: usize,
    unchanged: usize,
}

#[derive(Serialize)]
struct JsonChange<'a> {
    path: &'a str,
    source: JsonEntry<'a>,
    target: JsonEntry<'a>,
}

#[derive(Serialize)]
struct JsonEntry<'a> {
    path: &'a str,
    kind: EntryKind,
    perm: String,
    mode: String,
    uid: Option<u32>,
    gid: Option<u32>,
    user: &'a str,
    group: &'a str,
}

impl<'a> From<&'a Entry> for JsonEntry<'a> {
    fn from(entry: &'a Entry) -> Self {
        Self {
            path: &entry.path,
            kind: entry.kind,
            perm: entry.mode.perm_string(),
            mode: entry.mode.to_string(),
            uid: entry.owner.uid,
            gid: entry.owner.gid,
            user: &entry.owner.user,
            group: &entry.owner.group,
        }
    }
}

fn json_entries(entries: &HashMap<String, Entry>) -> Vec<JsonEntry<'_>> {
    sorted_by_path(entries)
        .into_iter()
        .map(|(_, entry)| JsonEntry::from(entry))
        .collect()
}
