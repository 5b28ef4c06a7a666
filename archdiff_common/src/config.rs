use crate::{ArchDiffError, Equivalence, FileFilter};
use directories::ProjectDirs;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "archdiff.toml";

/// Raw comparison options as given on the command line or in `archdiff.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareOptions {
    /// Only compare directories
    pub dirs_only: bool,
    /// Only compare files and symlinks
    pub files_only: bool,
    /// Only compare permissions and the sticky bit
    pub perm_only: bool,
    /// Only compare owner, group, uid and gid
    pub owner_only: bool,
    /// Keep only paths matching this regex (applied after cut)
    pub include: Option<String>,
    /// Drop paths matching this regex (applied after cut)
    pub exclude: Option<String>,
    /// Remove every match of this regex from paths before comparing
    pub cut: Option<String>,
}

/// Validated comparison configuration handed to the tree builder and diff engine
#[derive(Debug, Clone, Default)]
pub struct CompareConfig {
    pub file_filter: FileFilter,
    pub equivalence: Equivalence,
    pub include: Option<Regex>,
    pub exclude: Option<Regex>,
    pub cut: Option<Regex>,
}

impl CompareOptions {
    /// Overlay `other` on top of `self`: flags are OR-ed, patterns given in `other` win.
    pub fn merge(mut self, other: CompareOptions) -> CompareOptions {
        self.dirs_only |= other.dirs_only;
        self.files_only |= other.files_only;
        self.perm_only |= other.perm_only;
        self.owner_only |= other.owner_only;
        if other.include.is_some() {
            self.include = other.include;
        }
        if other.exclude.is_some() {
            self.exclude = other.exclude;
        }
        if other.cut.is_some() {
            self.cut = other.cut;
        }
        self
    }

    pub fn validate(&self) -> Result<CompareConfig, ArchDiffError> {
        let file_filter = match (self.dirs_only, self.files_only) {
            (true, true) => {
                return Err(ArchDiffError::Config(
                    "may only define --dirs-only or --files-only, not both".to_string(),
                ))
            }
            (true, false) => FileFilter::DirsOnly,
            (false, true) => FileFilter::FilesOnly,
            (false, false) => FileFilter::All,
        };

        let equivalence = match (self.perm_only, self.owner_only) {
            (true, true) => {
                return Err(ArchDiffError::Config(
                    "may only define --perm-only or --owner-only, not both".to_string(),
                ))
            }
            (true, false) => Equivalence::PermissionsOnly,
            (false, true) => Equivalence::OwnerOnly,
            (false, false) => Equivalence::Full,
        };

        Ok(CompareConfig {
            file_filter,
            equivalence,
            include: compile_pattern("include", self.include.as_deref())?,
            exclude: compile_pattern("exclude", self.exclude.as_deref())?,
            cut: compile_pattern("cut", self.cut.as_deref())?,
        })
    }
}

fn compile_pattern(
    which: &'static str,
    pattern: Option<&str>,
) -> Result<Option<Regex>, ArchDiffError> {
    match pattern {
        None | Some("") => Ok(None),
        Some(pattern) => Regex::new(pattern)
            .map(Some)
            .map_err(|source| ArchDiffError::FilterCompile { which, source }),
    }
}

/// Load options from `explicit`, or from the per-user config directory.
/// A missing per-user file yields defaults; a missing explicit file is an error.
pub fn load_options(explicit: Option<&Path>) -> Result<CompareOptions, ArchDiffError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(CompareOptions::default()),
        },
    };

    let data = fs::read_to_string(&path)
        .map_err(|e| ArchDiffError::Config(format!("cannot read {}: {}", path.display(), e)))?;
    toml::from_str(&data).map_err(|e| ArchDiffError::Serialization(e.to_string()))
}

pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "archdiff").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}
