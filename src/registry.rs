//!
//! The Registry module contains the main [Registry] object
//!

use std::collections::VecDeque;
use std::path::Path;

use rocksdb::WriteBatch;
use semver::Version;
use tracing::{debug, info, warn};

use super::access_control::{AccessControl, Identity};
use super::database::*;
use super::encode_decode::Coder;
use super::error::{RegistryError, Result};
use super::events::RegistryEvent;
use super::perf_counters::*;
use super::records::{Book, BookData, BookId};
use super::registry_config::*;

/// A persistent catalog of [Book]s, curated by admins that are appointed by a single owner
///
/// Anyone may read the catalog.  Adding, updating and deleting books is restricted to admins, and
/// appointing admins is restricted to the owner.  The caller's [Identity] is passed explicitly to
/// every restricted operation.
///
/// Each mutation is all-or-nothing.  Access is checked before anything is staged, every write for
/// the mutation goes into a single batch, and the in-memory counters only advance once the batch
/// has been committed.  Mutations take `&mut self`, so there is only ever one writer.
///
/// The live books are kept in a dense index, positions `0..get_book_count()`.  Deleting a book
/// moves the book in the last position into the vacated slot, so positions are not stable across
/// deletions but ids are.
pub struct Registry<ConfigT : RegistryConfig> {
    book_count : u64,
    next_book_id : BookId,
    access : AccessControl,
    db : DBConnection<ConfigT::CoderT>,
    _config : ConfigT,
    events : VecDeque<RegistryEvent>,
}

impl <ConfigT : RegistryConfig>Registry<ConfigT> {

    /// Creates a new Registry owned by `owner`, backed by the database at the path provided.
    ///
    /// If a registry already exists at the path, it is opened instead, as long as it belongs to the
    /// same owner.  Otherwise [RegistryError::OwnerMismatch] is returned.
    pub fn new<P : AsRef<Path>>(path : P, owner : Identity, config : ConfigT) -> Result<Self> {

        let db = DBConnection::new(ConfigT::CoderT::new(), path.as_ref(), true, ConfigT::SYNC_WRITES)?;

        match db.get_owner()? {
            Some(existing) => {
                if existing != owner {
                    return Err(RegistryError::OwnerMismatch { existing, requested : owner });
                }
                Self::load(db, owner, config)
            },
            None => {
                let mut batch = WriteBatch::default();
                db.stage_registry_metadata(&mut batch, &owner)?;
                db.commit(batch)?;

                info!(path = %path.as_ref().display(), %owner, "created registry");
                Ok(Self {
                    book_count : 0,
                    next_book_id : BookId::FIRST,
                    access : AccessControl::new(owner, 0),
                    db,
                    _config : config,
                    events : VecDeque::new(),
                })
            }
        }
    }

    /// Opens an existing Registry at the path provided
    ///
    /// Returns [RegistryError::Uninitialized] if no registry has been created at the path.  In that
    /// case nothing at the path is touched.
    pub fn open<P : AsRef<Path>>(path : P, config : ConfigT) -> Result<Self> {

        let path = path.as_ref();
        if !DBConnection::<ConfigT::CoderT>::holds_registry(path)? {
            return Err(RegistryError::Uninitialized(path.display().to_string()));
        }

        let db = DBConnection::new(ConfigT::CoderT::new(), path, false, ConfigT::SYNC_WRITES)?;
        let owner = db.get_owner()?
            .ok_or_else(|| RegistryError::Uninitialized(path.display().to_string()))?;

        Self::load(db, owner, config)
    }

    /// Restores the in-memory state from an initialized database
    fn load(db : DBConnection<ConfigT::CoderT>, owner : Identity, config : ConfigT) -> Result<Self> {

        let found_version = db.get_version()?
            .ok_or_else(|| RegistryError::corrupt("registry has an owner but no version"))?;
        if !versions_compatible(&found_version, env!("CARGO_PKG_VERSION"))? {
            return Err(RegistryError::IncompatibleVersion { found : found_version, running : env!("CARGO_PKG_VERSION").to_string() });
        }

        let found_coder = db.get_coder_name()?
            .ok_or_else(|| RegistryError::corrupt("registry has an owner but no coder"))?;
        if found_coder != <ConfigT::CoderT as Coder>::FORMAT_NAME {
            return Err(RegistryError::CoderMismatch { found : found_coder, configured : <ConfigT::CoderT as Coder>::FORMAT_NAME.to_string() });
        }

        //Counts are recovered by probing the dense index column families, and the id sequence
        // from its metadata entry
        let book_count = db.book_count()?;
        let admin_count = db.admin_count()?;
        let next_book_id = db.get_next_book_id()?;

        info!(%owner, book_count, admin_count, next_book_id = %next_book_id, "opened registry");
        Ok(Self {
            book_count,
            next_book_id,
            access : AccessControl::new(owner, admin_count),
            db,
            _config : config,
            events : VecDeque::new(),
        })
    }

    /// Returns the registry's owner
    pub fn owner(&self) -> &Identity {
        self.access.owner()
    }

    /// Appoints `identity` as an admin.  Only the owner may call this.
    ///
    /// Appointing an identity that is already an admin succeeds without changing anything.
    pub fn add_admin(&mut self, caller : &Identity, identity : &Identity) -> Result<()> {
        if self.access.add_admin(&self.db, caller, identity)? {
            self.push_event(RegistryEvent::AdminAdded { admin : identity.clone(), by : caller.clone() });
        }
        Ok(())
    }

    /// Returns `true` if `identity` has been appointed as an admin
    pub fn is_admin(&self, identity : &Identity) -> Result<bool> {
        self.access.is_admin(&self.db, identity)
    }

    /// Returns the number of admins that have been appointed
    pub fn admin_count(&self) -> usize {
        self.access.admin_count()
    }

    /// Returns the admin appointed at `index`, in the order they were appointed
    pub fn admin_at(&self, index : usize) -> Result<Option<Identity>> {
        self.access.admin_at(&self.db, index)
    }

    /// Returns an iterator over the admins, in the order they were appointed
    pub fn admins(&self) -> impl Iterator<Item=Result<Identity>> + '_ {
        (0..self.admin_count()).filter_map(move |index| self.admin_at(index).transpose())
    }

    /// Adds a new book to the registry and returns its id.  Only an admin may call this.
    ///
    /// The new book takes the last position in the index.
    pub fn add_book(&mut self, caller : &Identity, title : &str, year : &str, author : &str) -> Result<BookId> {

        self.access.require_admin(&self.db, caller)?;

        let book_id = self.next_book_id;
        //NULL is the last value in the sequence, so it is never issued
        let next_book_id = book_id.next().ok_or(RegistryError::IdsExhausted)?;
        let position = self.book_count;
        let book_data = BookData::new(Book::new(book_id, title, year, author), position);

        let mut batch = WriteBatch::default();
        self.db.stage_book(&mut batch, &book_data)?;
        self.db.stage_book_position(&mut batch, position, book_id)?;
        self.db.stage_next_book_id(&mut batch, next_book_id)?;
        self.db.commit(batch)?;

        self.next_book_id = next_book_id;
        self.book_count += 1;

        self.push_event(RegistryEvent::BookAdded { book_id, by : caller.clone() });
        Ok(book_id)
    }

    /// Replaces the title, year and author of a live book.  Only an admin may call this.
    ///
    /// The book keeps its id and its position in the index.
    pub fn update_book(&mut self, caller : &Identity, book_id : BookId, title : &str, year : &str, author : &str) -> Result<()> {

        self.access.require_admin(&self.db, caller)?;

        let mut book_data = self.db.get_book_data(book_id)?.ok_or(RegistryError::NotFound(book_id))?;
        book_data.book.set_fields(title, year, author);

        let mut batch = WriteBatch::default();
        self.db.stage_book(&mut batch, &book_data)?;
        self.db.commit(batch)?;

        self.push_event(RegistryEvent::BookUpdated { book_id, by : caller.clone() });
        Ok(())
    }

    /// Deletes a live book.  Only an admin may call this.
    ///
    /// A deleted book can't be accessed again, and its id is never reused.  If the book wasn't in
    /// the last position, the last book is moved into its slot.
    pub fn delete_book(&mut self, caller : &Identity, book_id : BookId) -> Result<()> {

        self.access.require_admin(&self.db, caller)?;

        let deleted = self.db.get_book_data(book_id)?.ok_or(RegistryError::NotFound(book_id))?;
        let last_position = self.book_count.checked_sub(1)
            .ok_or_else(|| RegistryError::corrupt(format!("book {book_id} is live but the index is empty")))?;

        let mut batch = WriteBatch::default();
        self.db.stage_delete_book(&mut batch, book_id)?;

        if deleted.position != last_position {

            //Move the last book into the vacated slot, and fix up the position it has recorded
            let moved_id = self.db.get_book_id_at(last_position)?
                .ok_or_else(|| RegistryError::corrupt(format!("book index has a gap at position {last_position}")))?;
            let mut moved = self.db.get_book_data(moved_id)?
                .ok_or_else(|| RegistryError::corrupt(format!("book index references missing book {moved_id}")))?;
            moved.position = deleted.position;

            self.db.stage_book(&mut batch, &moved)?;
            self.db.stage_book_position(&mut batch, deleted.position, moved_id)?;
            debug!(moved_id = %moved_id, from = last_position, to = deleted.position, "compacting book index");
        }
        self.db.stage_delete_book_position(&mut batch, last_position)?;
        self.db.commit(batch)?;

        if deleted.position != last_position {
            self.db.perf_counters().update(|fields| fields.compaction_move_count += 1);
        }

        self.book_count = last_position;

        self.push_event(RegistryEvent::BookDeleted { book_id, by : caller.clone() });
        Ok(())
    }

    /// Returns a live book.  Anyone may call this.
    pub fn get_book(&self, book_id : BookId) -> Result<Book> {
        self.db.get_book_data(book_id)?
            .map(|book_data| book_data.book)
            .ok_or(RegistryError::NotFound(book_id))
    }

    /// Returns the number of live books.  Anyone may call this.
    pub fn get_book_count(&self) -> usize {
        self.book_count as usize
    }

    /// Returns the book at a position in the index, or `None` if the position is past the end
    pub fn book_at(&self, position : usize) -> Result<Option<Book>> {

        let position = position as u64;
        if position >= self.book_count {
            return Ok(None);
        }

        let book_id = self.db.get_book_id_at(position)?
            .ok_or_else(|| RegistryError::corrupt(format!("book index has a gap at position {position}")))?;
        let book_data = self.db.get_book_data(book_id)?
            .ok_or_else(|| RegistryError::corrupt(format!("book index references missing book {book_id}")))?;

        if book_data.position != position {
            return Err(RegistryError::corrupt(format!("book {book_id} is indexed at {position} but records position {}", book_data.position)));
        }
        Ok(Some(book_data.book))
    }

    /// Returns an iterator over the live books, in index order
    pub fn books(&self) -> impl Iterator<Item=Result<Book>> + '_ {
        (0..self.get_book_count()).filter_map(move |position| self.book_at(position).transpose())
    }

    /// Removes and returns every queued event, oldest first
    pub fn drain_events(&mut self) -> Vec<RegistryEvent> {
        self.events.drain(..).collect()
    }

    /// Returns the queued events without removing them, oldest first
    pub fn pending_events(&self) -> impl Iterator<Item=&RegistryEvent> {
        self.events.iter()
    }

    fn push_event(&mut self, event : RegistryEvent) {
        info!(registry_event = ?event, "committed");

        if ConfigT::MAX_PENDING_EVENTS == 0 {
            return;
        }
        if self.events.len() >= ConfigT::MAX_PENDING_EVENTS {
            if let Some(dropped) = self.events.pop_front() {
                warn!(dropped_event = ?dropped, "event queue full, dropping oldest event");
            }
        }
        self.events.push_back(event);
    }

    /// Resets all values in the performance counters, so the information returned by [get_perf_counters](Registry::get_perf_counters) only
    /// reflects activity since the last call to `reset_perf_counters`
    pub fn reset_perf_counters(&self) {
        self.db.perf_counters().reset();
    }

    /// Returns the values in the performance counters, which should reflect all activity since the previous call
    /// to [reset_perf_counters](Registry::reset_perf_counters)
    pub fn get_perf_counters(&self) -> PerfCounterFields {
        self.db.perf_counters().get()
    }
}

/// A registry written by `found` can be opened by `running` when the major versions match.  While
/// the major version is 0, the minor versions must match too
fn versions_compatible(found : &str, running : &str) -> Result<bool> {
    let found = Version::parse(found)?;
    let running = Version::parse(running)?;

    if running.major == 0 {
        Ok(found.major == 0 && found.minor == running.minor)
    } else {
        Ok(found.major == running.major)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_compatibility() {
        assert!(versions_compatible("0.1.0", "0.1.7").unwrap());
        assert!(!versions_compatible("0.1.0", "0.2.0").unwrap());
        assert!(versions_compatible("1.0.0", "1.4.2").unwrap());
        assert!(!versions_compatible("1.4.2", "2.0.0").unwrap());
        assert!(!versions_compatible("0.9.0", "1.0.0").unwrap());
        assert!(matches!(versions_compatible("not-a-version", "0.1.0"), Err(RegistryError::Version(_))));
    }
}
