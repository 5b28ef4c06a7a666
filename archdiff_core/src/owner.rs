//! uid/gid to name resolution shared by both tree builds of a run.

use crate::walk::EntryMeta;
use archdiff_common::Owner;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Source of user and group names for numeric ids
pub trait IdentityLookup: Send + Sync {
    fn user_name(&self, uid: u32) -> Option<String>;
    fn group_name(&self, gid: u32) -> Option<String>;
}

/// Looks ids up in the system user and group databases
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLookup;

#[cfg(unix)]
impl IdentityLookup for SystemLookup {
    fn user_name(&self, uid: u32) -> Option<String> {
        use nix::unistd::{Uid, User};
        User::from_uid(Uid::from_raw(uid)).ok().flatten().map(|user| user.name)
    }

    fn group_name(&self, gid: u32) -> Option<String> {
        use nix::unistd::{Gid, Group};
        Group::from_gid(Gid::from_raw(gid)).ok().flatten().map(|group| group.name)
    }
}

#[cfg(not(unix))]
impl IdentityLookup for SystemLookup {
    fn user_name(&self, _uid: u32) -> Option<String> {
        None
    }

    fn group_name(&self, _gid: u32) -> Option<String> {
        None
    }
}

/// Run-scoped name cache. Each distinct id is looked up at most once; failed
/// lookups are cached as the empty name.
pub struct NameCache {
    lookup: Box<dyn IdentityLookup>,
    users: Mutex<HashMap<u32, String>>,
    groups: Mutex<HashMap<u32, String>>,
}

impl NameCache {
    pub fn new() -> Self {
        Self::with_lookup(Box::new(SystemLookup))
    }

    pub fn with_lookup(lookup: Box<dyn IdentityLookup>) -> Self {
        Self {
            lookup,
            users: Mutex::new(HashMap::new()),
            groups: Mutex::new(HashMap::new()),
        }
    }

    pub fn user_name(&self, uid: u32) -> String {
        // Lock is held through the lookup: one lookup per id across threads
        let mut users = lock(&self.users);
        users
            .entry(uid)
            .or_insert_with(|| {
                let name = self.lookup.user_name(uid).unwrap_or_default();
                debug!("Resolved uid {} to {:?}", uid, name);
                name
            })
            .clone()
    }

    pub fn group_name(&self, gid: u32) -> String {
        let mut groups = lock(&self.groups);
        groups
            .entry(gid)
            .or_insert_with(|| {
                let name = self.lookup.group_name(gid).unwrap_or_default();
                debug!("Resolved gid {} to {:?}", gid, name);
                name
            })
            .clone()
    }

    /// Owner record for a walked entry. Names embedded by the format win over lookups.
    pub fn resolve_owner(&self, meta: &EntryMeta) -> Owner {
        let user = match (&meta.user_name, meta.uid) {
            (Some(name), _) => name.clone(),
            (None, Some(uid)) => self.user_name(uid),
            (None, None) => String::new(),
        };
        let group = match (&meta.group_name, meta.gid) {
            (Some(name), _) => name.clone(),
            (None, Some(gid)) => self.group_name(gid),
            (None, None) => String::new(),
        };

        Owner {
            uid: meta.uid,
            gid: meta.gid,
            user,
            group,
        }
    }
}

impl Default for NameCache {
    fn default() -> Self {
        Self::new()
    }
}

fn lock(map: &Mutex<HashMap<u32, String>>) -> MutexGuard<'_, HashMap<u32, String>> {
    // Entries are inserted whole, so a poisoned map is still consistent
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
