pub mod diff;
pub mod dispatch;
pub mod owner;
pub mod report;
pub mod tree;
pub mod walk;

pub use diff::DiffEngine;
pub use dispatch::{check, dispatch, is_supported, ContainerKind};
pub use owner::{IdentityLookup, NameCache, SystemLookup};
pub use report::Reporter;
pub use tree::{normalize_path, TreeBuilder};
pub use walk::{BodyMode, EntryWalker};
