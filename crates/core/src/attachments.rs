//! File attachment descriptors and the replacement rule.
//!
//! Uploading a file whose name matches an existing attachment overwrites
//! the stored blob under the *same* file identity; a new name gets a fresh
//! identity. Within one upload the last file of a given name wins, so an
//! experiment never ends up with two attachments of the same name.
//!
//! The name match is resolved by the record store in the same atomic
//! update that records the attachment ([`claim_by_name`] is the in-memory
//! form of that update), never from a previously read file list.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::types::DbId;

/// Reference to a stored blob attached to an experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub id: DbId,
    pub filename: String,
    pub mimetype: String,
}

/// Where an uploaded file's content ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobTarget {
    /// The name was already attached; content goes to this identity.
    Replace(DbId),
    /// The freshly written blob became the attachment.
    Fresh,
}

impl BlobTarget {
    /// Compare the descriptor offered for a name with the one the store
    /// kept for it.
    pub fn resolve(offered: &FileDescriptor, claimed: &FileDescriptor) -> Self {
        if offered.id == claimed.id {
            BlobTarget::Fresh
        } else {
            BlobTarget::Replace(claimed.id)
        }
    }
}

/// Collapse uploads sharing a name to the last occurrence, keeping the
/// position of the first.
pub fn collapse_by_name<T, F>(uploads: Vec<T>, name_of: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    let mut by_name: IndexMap<String, T> = IndexMap::with_capacity(uploads.len());
    for upload in uploads {
        by_name.insert(name_of(&upload).to_string(), upload);
    }
    by_name.into_values().collect()
}

/// Record `offered` in `files` unless its name is already attached.
///
/// A name match keeps the attached identity and takes the offered content
/// type. Returns the descriptor now attached under that name.
pub fn claim_by_name(files: &mut Vec<FileDescriptor>, offered: &FileDescriptor) -> FileDescriptor {
    match files.iter_mut().find(|f| f.filename == offered.filename) {
        Some(existing) => {
            existing.mimetype = offered.mimetype.clone();
            existing.clone()
        }
        None => {
            files.push(offered.clone());
            offered.clone()
        }
    }
}
