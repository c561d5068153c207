//!
//! The Events module contains [RegistryEvent], the notifications a [Registry](crate::Registry)
//! queues for every successful change, so an external indexer can follow the registry without
//! polling it.
//!

use serde::{Serialize, Deserialize};

use super::access_control::Identity;
use super::records::BookId;

/// A change that has been committed to a [Registry](crate::Registry)
///
/// Events are only queued after the change has landed, and rejected calls never produce one.  Each
/// event carries the identity that made the change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryEvent {
    AdminAdded { admin : Identity, by : Identity },
    BookAdded { book_id : BookId, by : Identity },
    BookUpdated { book_id : BookId, by : Identity },
    BookDeleted { book_id : BookId, by : Identity },
}

impl RegistryEvent {
    /// The book the event concerns, if it concerns one
    pub fn book_id(&self) -> Option<BookId> {
        match self {
            Self::AdminAdded { .. } => None,
            Self::BookAdded { book_id, .. } |
            Self::BookUpdated { book_id, .. } |
            Self::BookDeleted { book_id, .. } => Some(*book_id),
        }
    }

    /// The identity that made the change
    pub fn by(&self) -> &Identity {
        match self {
            Self::AdminAdded { by, .. } |
            Self::BookAdded { by, .. } |
            Self::BookUpdated { by, .. } |
            Self::BookDeleted { by, .. } => by,
        }
    }
}
