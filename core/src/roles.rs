//! Role hierarchy for workspaces and documents.
//!
//! Both role types are integer backed and ordered by ascending privilege, so
//! "at least" checks are plain comparisons (`role >= required`). The integer
//! value is what gets persisted, which lets the storage layer run the same
//! comparison in SQL.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[repr(i64)]
pub enum WorkspaceRole {
    #[default]
    Collaborator = 1,
    Admin = 10,
    Owner = 99,
}

impl WorkspaceRole {
    pub const ALL: [WorkspaceRole; 3] = [Self::Collaborator, Self::Admin, Self::Owner];

    pub const fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.as_i64() == value)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Collaborator => "collaborator",
            Self::Admin => "admin",
            Self::Owner => "owner",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(value))
    }

    /// Role given to the previous owner when ownership moves to someone else.
    pub const fn demoted_owner() -> Self {
        Self::Admin
    }

    pub fn at_least(self, required: Self) -> bool {
        self >= required
    }
}

impl fmt::Display for WorkspaceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i64)]
pub enum DocRole {
    Reader = 10,
    Editor = 20,
    Manager = 30,
    Owner = 99,
}

impl DocRole {
    pub const ALL: [DocRole; 4] = [Self::Reader, Self::Editor, Self::Manager, Self::Owner];

    pub const fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.as_i64() == value)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reader => "reader",
            Self::Editor => "editor",
            Self::Manager => "manager",
            Self::Owner => "owner",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(value))
    }

    /// Next-highest role below `Owner`; previous owners land here on transfer.
    pub const fn demoted_owner() -> Self {
        Self::Manager
    }

    pub fn at_least(self, required: Self) -> bool {
        self >= required
    }
}

impl fmt::Display for DocRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations that can be performed on a single document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DocAction {
    Read,
    Comment,
    Write,
    Publish,
    Manage,
    Delete,
    TransferOwner,
}

impl DocAction {
    pub const ALL: [DocAction; 7] = [
        Self::Read,
        Self::Comment,
        Self::Write,
        Self::Publish,
        Self::Manage,
        Self::Delete,
        Self::TransferOwner,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Comment => "comment",
            Self::Write => "write",
            Self::Publish => "publish",
            Self::Manage => "manage",
            Self::Delete => "delete",
            Self::TransferOwner => "transferOwner",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let simplified: String = value
            .trim()
            .chars()
            .filter(|ch| *ch != '_' && *ch != '-')
            .collect();
        Self::ALL
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(&simplified))
    }

    pub const fn is_read(self) -> bool {
        matches!(self, Self::Read)
    }
}

impl fmt::Display for DocAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimum explicit document role needed to perform `action`.
pub const fn required_doc_role(action: DocAction) -> DocRole {
    match action {
        DocAction::Read | DocAction::Comment => DocRole::Reader,
        DocAction::Write => DocRole::Editor,
        DocAction::Publish | DocAction::Manage | DocAction::Delete => DocRole::Manager,
        DocAction::TransferOwner => DocRole::Owner,
    }
}

/// Minimum workspace role that grants `action` on every document of the
/// workspace without an explicit document grant.
pub const fn required_workspace_role(action: DocAction) -> WorkspaceRole {
    match action {
        DocAction::Read | DocAction::Comment | DocAction::Write => WorkspaceRole::Collaborator,
        DocAction::Publish | DocAction::Manage | DocAction::Delete => WorkspaceRole::Admin,
        DocAction::TransferOwner => WorkspaceRole::Owner,
    }
}
