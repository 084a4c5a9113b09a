use serde::Serialize;

use crate::error::{HostError, Result};

/// Kind of a listed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingEntry {
    pub name: String,
    pub kind: EntryKind,
}

/// A decoded ListDir response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub path: String,
    pub entries: Vec<ListingEntry>,
}

impl Listing {
    /// Parse `path` followed by `\n<d|f><name>` lines.
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.split('\n');
        let path = lines.next().unwrap_or_default().to_string();
        let mut entries = Vec::new();
        for line in lines {
            let mut chars = line.chars();
            let kind = match chars.next() {
                Some('d') => EntryKind::Dir,
                Some('f') => EntryKind::File,
                _ => {
                    return Err(HostError::Unexpected(format!(
                        "listing line without kind marker: {line:?}"
                    )))
                }
            };
            entries.push(ListingEntry {
                name: chars.as_str().to_string(),
                kind,
            });
        }
        Ok(Self { path, entries })
    }
}
