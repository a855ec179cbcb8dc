use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{DocId, WorkspaceId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceVisibility {
    pub public: bool,
    pub enable_url_preview: bool,
}

/// How a published document is rendered to anonymous readers.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicDocMode {
    #[default]
    Page,
    Edgeless,
}

impl PublicDocMode {
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("page") {
            Some(Self::Page)
        } else if value.eq_ignore_ascii_case("edgeless") {
            Some(Self::Edgeless)
        } else {
            None
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Edgeless => "edgeless",
        }
    }
}

impl fmt::Display for PublicDocMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publication state of a document. A missing row means "never published".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentVisibility {
    pub workspace_id: WorkspaceId,
    pub doc_id: DocId,
    pub public: bool,
    pub mode: PublicDocMode,
    pub updated_at: i64,
}
