//!
//! The Error module contains [RegistryError], the one error type returned by every fallible
//! operation in the crate.
//!

use thiserror::Error;

use crate::access_control::Identity;
use crate::records::BookId;

/// Result type alias for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Everything that can go wrong inside a [Registry](crate::Registry)
///
/// The first three variants are the business errors a caller is expected to handle.  Any call
/// that returns one of them has made no change to the registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// An owner-only operation was invoked by someone else
    #[error("{caller} is not the registry owner")]
    NotOwner { caller: Identity },

    /// An admin-only operation was invoked by a non-admin.  This includes the owner, unless the
    /// owner has also been added as an admin
    #[error("{caller} is not an admin")]
    NotAdmin { caller: Identity },

    /// The id doesn't reference a live book, either because it was never assigned or because
    /// the book was deleted
    #[error("no live book with id {0}")]
    NotFound(BookId),

    /// Every [BookId] has been issued, so no more books can be added
    #[error("the book id sequence is exhausted")]
    IdsExhausted,

    /// The registry at this path already belongs to a different owner
    #[error("registry is owned by {existing}, not {requested}")]
    OwnerMismatch { existing: Identity, requested: Identity },

    /// No registry has been created at this path
    #[error("no registry found at {0}")]
    Uninitialized(String),

    /// The registry was written by a version of this crate with an incompatible format
    #[error("registry was created by version {found}, which is incompatible with {running}")]
    IncompatibleVersion { found: String, running: String },

    /// The registry was written with a different value encoding than the configured coder
    #[error("registry was encoded with {found}, but the configured coder is {configured}")]
    CoderMismatch { found: String, configured: String },

    /// The stored state contradicts itself
    #[error("corrupt registry: {0}")]
    Corrupt(String),

    /// Encoding or decoding a stored value failed
    #[error("codec error: {0}")]
    Codec(String),

    #[error("database error: {0}")]
    Database(#[from] rocksdb::Error),

    #[error("version parse error: {0}")]
    Version(#[from] semver::Error),
}

impl RegistryError {
    /// Returns `true` for the errors that come from the caller's request rather than from the
    /// registry's storage
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::NotOwner { .. } | Self::NotAdmin { .. } | Self::NotFound(_))
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }
}
