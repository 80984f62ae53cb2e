//! User and group store: authentication, per-path permissions and the
//! group-defined ceilings consumed by the quota registry and rate limiter.
//!
//! Loaded once at startup from a TOML file and shared read-only by all
//! sessions.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::core_quota::StatLimits;

#[derive(Debug, Clone, Deserialize)]
pub struct UserDef {
    pub name: String,
    pub password_hash: String,
    pub group: String,
    pub home: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Permissions {
    #[serde(default = "default_true")]
    pub can_read: bool,
    #[serde(default = "default_true")]
    pub can_write: bool,
    #[serde(default = "default_true")]
    pub can_delete: bool,
    #[serde(default = "default_true")]
    pub can_mkdir: bool,
    #[serde(default = "default_true")]
    pub can_rename: bool,
    #[serde(default = "default_true")]
    pub can_list: bool,
    #[serde(default = "default_true")]
    pub can_upload: bool,
    #[serde(default = "default_true")]
    pub can_download: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Permissions {
    fn default() -> Self {
        Self {
            can_read: true,
            can_write: true,
            can_delete: true,
            can_mkdir: true,
            can_rename: true,
            can_list: true,
            can_upload: true,
            can_download: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupDef {
    pub name: String,
    #[serde(default)]
    pub permissions: Permissions,
    /// Daily upload byte ceiling; 0 = unlimited.
    #[serde(default)]
    pub max_bytes_up_per_day: u64,
    #[serde(default)]
    pub max_files_up_per_day: u64,
    #[serde(default)]
    pub max_bytes_down_per_day: u64,
    #[serde(default)]
    pub max_files_down_per_day: u64,
    /// Transfer rate ceiling in KiB/s; 0 = unlimited.
    #[serde(default)]
    pub max_rate_kib: u64,
}

#[derive(Debug, Deserialize)]
struct UserFile {
    #[serde(default)]
    users: Vec<UserDef>,
    #[serde(default)]
    groups: Vec<GroupDef>,
}

pub struct UserStore {
    users: HashMap<String, UserDef>,
    groups: HashMap<String, GroupDef>,
}

fn limit(value: u64) -> Option<u64> {
    if value == 0 {
        None
    } else {
        Some(value)
    }
}

impl UserStore {
    pub fn load(path: &str) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read user file: {}", path))?;
        let file: UserFile = toml::from_str(&text)
            .with_context(|| format!("Failed to parse user file: {}", path))?;
        Ok(Self::from_defs(file.users, file.groups))
    }

    pub fn from_defs(users: Vec<UserDef>, groups: Vec<GroupDef>) -> Self {
        Self {
            users: users.into_iter().map(|u| (u.name.clone(), u)).collect(),
            groups: groups.into_iter().map(|g| (g.name.clone(), g)).collect(),
        }
    }

    pub fn known_user(&self, name: &str) -> bool {
        self.users.contains_key(name)
    }

    /// Verifies the password against the stored bcrypt hash.
    pub fn authenticate(&self, name: &str, password: &str) -> bool {
        match self.users.get(name) {
            Some(user) => bcrypt::verify(password, &user.password_hash).unwrap_or(false),
            None => false,
        }
    }

    fn group_of(&self, user: &str) -> Option<&GroupDef> {
        let user = self.users.get(user)?;
        self.groups.get(&user.group)
    }

    /// Effective permission set for a user acting on `path`.
    ///
    /// Permissions are group-scoped; the path parameter is part of the
    /// collaborator interface and reserved for per-directory rules.
    pub fn permissions_for(&self, user: &str, _path: &Path) -> Permissions {
        self.group_of(user)
            .map(|g| g.permissions.clone())
            .unwrap_or_default()
    }

    /// Daily statistic ceilings from the user's group.
    pub fn limits_for(&self, user: &str) -> StatLimits {
        match self.group_of(user) {
            Some(group) => StatLimits {
                max_bytes_up: limit(group.max_bytes_up_per_day),
                max_files_up: limit(group.max_files_up_per_day),
                max_bytes_down: limit(group.max_bytes_down_per_day),
                max_files_down: limit(group.max_files_down_per_day),
            },
            None => StatLimits::default(),
        }
    }

    /// Group transfer-rate ceiling in bytes per second; `None` = unlimited.
    pub fn rate_ceiling_for(&self, user: &str) -> Option<u64> {
        self.group_of(user)
            .and_then(|g| limit(g.max_rate_kib))
            .map(|kib| kib * 1024)
    }
}
