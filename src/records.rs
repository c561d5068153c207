//!
//! The Records module contains the types for working with book records.  [BookId] and [Book] are
//! re-exported to the public interface.
//!

use serde::{Serialize, Deserialize};

/// A unique identifier for a book within a [Registry](crate::Registry)
///
/// BookIds are drawn from a strictly increasing sequence that is persisted with the registry, so
/// the id of a deleted book is never handed out again, even after the registry is reopened.
#[derive(Copy, Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, derive_more::Display, Serialize, Deserialize)]
pub struct BookId(pub u64);
impl BookId {
    pub const NULL : BookId = BookId(u64::MAX);
    pub const FIRST : BookId = BookId(0);
}

impl BookId {
    /// Returns the id that follows this one in the sequence, or `None` if the sequence has run out
    pub fn next(&self) -> Option<Self> {
        self.0.checked_add(1).map(BookId)
    }
    pub fn to_le_bytes(&self) -> [u8; 8] {
        self.0.to_le_bytes()
    }
    /// Returns `None` if `bytes` isn't exactly 8 bytes long
    pub fn from_le_bytes(bytes : &[u8]) -> Option<Self> {
        let array : [u8; 8] = bytes.try_into().ok()?;
        Some(BookId(u64::from_le_bytes(array)))
    }
}

/// A catalog entry in a [Registry](crate::Registry)
///
/// The `year` is free-form text, exactly as it was supplied by the admin who wrote the record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id : BookId,
    pub title : String,
    pub year : String,
    pub author : String,
}

impl Book {
    pub fn new(id : BookId, title : &str, year : &str, author : &str) -> Self {
        Self {
            id,
            title : title.to_string(),
            year : year.to_string(),
            author : author.to_string(),
        }
    }

    /// Overwrites the mutable fields.  The id is left alone
    pub fn set_fields(&mut self, title : &str, year : &str, author : &str) {
        self.title = title.to_string();
        self.year = year.to_string();
        self.author = author.to_string();
    }
}

/// What is actually stored for each live book.  The `position` is the book's current slot in the
/// dense book index, and is the reverse half of the position -> BookId mapping
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookData {
    pub book : Book,
    pub position : u64,
}

impl BookData {
    pub fn new(book : Book, position : u64) -> Self {
        Self{
            book,
            position
        }
    }
}
