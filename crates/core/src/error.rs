//! Error taxonomy shared by the ledger, codec and facade.

use std::{fmt, io, path::PathBuf};

use thiserror::Error;

/// Result alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, LibraryError>;

/// Which collection an identifier was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// A catalog item.
    Item,
    /// A library member.
    Member,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Item => f.write_str("item"),
            Self::Member => f.write_str("member"),
        }
    }
}

/// Every way a library operation can fail.
///
/// Each kind is distinct so callers can react differently, e.g. re-prompt on
/// [`LibraryError::NotFound`] but abort on [`LibraryError::CorruptRecord`].
#[derive(Debug, Error)]
pub enum LibraryError {
    /// A referenced item or member id is absent.
    #[error("{kind} '{id}' not found")]
    NotFound {
        /// Collection that was searched.
        kind: EntityKind,
        /// The missing id.
        id: String,
    },

    /// The item is already on loan.
    #[error("item '{item}' is already borrowed")]
    AlreadyBorrowed {
        /// Id of the item on loan.
        item: String,
    },

    /// The item is available, so there is nothing to return.
    #[error("item '{item}' is not borrowed")]
    NotBorrowed {
        /// Id of the item on the shelf.
        item: String,
    },

    /// The item is on loan, but to somebody else.
    #[error("item '{item}' is not held by member '{member}'")]
    NotHeldByMember {
        /// Id of the item being returned.
        item: String,
        /// Id of the member who tried to return it.
        member: String,
    },

    /// A persisted row could not be decoded.
    #[error("corrupt record at line {line}: {reason} ({content:?})")]
    CorruptRecord {
        /// 1-based line where the record starts.
        line: usize,
        /// The raw record text.
        content: String,
        /// What was wrong with it.
        reason: String,
    },

    /// An explicit identifier collides with an existing one.
    #[error("{kind} id '{id}' already exists")]
    DuplicateId {
        /// Collection the id belongs to.
        kind: EntityKind,
        /// The colliding id.
        id: String,
    },

    /// A field supplied by the caller is unusable.
    #[error("invalid {field}: {reason}")]
    InvalidInput {
        /// Name of the rejected field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// The library could not be written as rows.
    #[error("failed to encode library: {0}")]
    Encode(#[source] csv::Error),

    /// Reading or writing the save file failed.
    #[error("failed to access {}: {source}", path.display())]
    Io {
        /// File that was being accessed.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
}

impl LibraryError {
    pub(crate) fn corrupt(line: usize, content: &str, reason: impl Into<String>) -> Self {
        Self::CorruptRecord {
            line,
            content: content.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for failures that leave the library untouched and can be fixed by
    /// re-entering the request (unknown ids, wrong loan state, bad input).
    pub fn is_user_error(&self) -> bool {
        !matches!(
            self,
            Self::CorruptRecord { .. } | Self::Encode(_) | Self::Io { .. }
        )
    }
}
