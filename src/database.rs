//!
//! The Database module contains wrappers around the database (RocksDB) connection, and the
//! functions for getting and staging registry state in the DB.  Nothing should be re-exported.
//!
//! Reads go straight to the DB.  Writes are never applied directly: they are staged into a
//! [WriteBatch] with the `stage_*` functions and then applied together by [DBConnection::commit],
//! so a mutation either lands completely or not at all.
//!

use std::path::Path;

use rocksdb::{DB, DBWithThreadMode, ColumnFamily, ColumnFamilyDescriptor, WriteBatch, WriteOptions};

use super::access_control::Identity;
use super::encode_decode::Coder;
use super::error::{RegistryError, Result};
use super::records::{*};
use super::perf_counters::{*};

/// The ColumnFamily names used for the different types of data
pub const ADMINS_CF_NAME : &str = "admins";
pub const ADMIN_ORDER_CF_NAME : &str = "admin_order";
pub const BOOKS_CF_NAME : &str = "books";
pub const BOOK_INDEX_CF_NAME : &str = "book_index";
pub const METADATA_CF_NAME : &str = "metadata";

/// Keys within the "metadata" column family
const VERSION_KEY : &[u8] = b"version";
const CODER_KEY : &[u8] = b"coder";
const OWNER_KEY : &[u8] = b"owner";
const NEXT_BOOK_ID_KEY : &[u8] = b"next_book_id";

/// The first position probed when counting the entries of a dense column family
const PROBE_STARTING_HINT : u64 = 16;

/// Encapsulates a connection to a database
pub struct DBConnection<C: Coder + Send + Sync> {
    db : DBWithThreadMode<rocksdb::SingleThreaded>,
    coder : C,
    sync_writes : bool,
    perf_counters : PerfCounters,
}

impl<C: Coder> DBConnection<C> {

    /// Opens the database at `path`.  If `create_if_missing` is `false` and there is no database
    /// at the path, the RocksDB error is returned
    pub fn new(coder : C, path : &Path, create_if_missing : bool, sync_writes : bool) -> Result<Self> {

        let cf_names = [ADMINS_CF_NAME, ADMIN_ORDER_CF_NAME, BOOKS_CF_NAME, BOOK_INDEX_CF_NAME, METADATA_CF_NAME];
        let cf_descriptors = cf_names.iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, rocksdb::Options::default()))
            .collect::<Vec<_>>();

        //Configure the database itself
        let mut db_opts = rocksdb::Options::default();
        db_opts.create_missing_column_families(create_if_missing);
        db_opts.create_if_missing(create_if_missing);

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        Ok(Self{
            db,
            coder,
            sync_writes,
            perf_counters : PerfCounters::new(),
        })
    }

    /// Returns `true` if there is a RocksDB database at `path` that has the registry's column
    /// families.  Nothing at the path is created or modified
    pub fn holds_registry(path : &Path) -> Result<bool> {
        if !path.join("CURRENT").exists() {
            return Ok(false);
        }
        let cf_names = DB::list_cf(&rocksdb::Options::default(), path)?;
        Ok(cf_names.iter().any(|name| name == METADATA_CF_NAME))
    }

    pub fn perf_counters(&self) -> &PerfCounters {
        &self.perf_counters
    }

    fn cf(&self, name : &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| RegistryError::corrupt(format!("missing column family \"{name}\"")))
    }

    /// A point read, returning an owned copy of the value bytes
    fn get_bytes(&self, cf_name : &str, key : &[u8]) -> Result<Option<Vec<u8>>> {
        let cf_handle = self.cf(cf_name)?;
        self.perf_counters.update(|fields| fields.db_read_count += 1);
        Ok(self.db.get_pinned_cf(cf_handle, key)?.map(|bytes| bytes.to_vec()))
    }

    /// Applies every write staged in the batch, atomically
    pub fn commit(&self, batch : WriteBatch) -> Result<()> {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.sync_writes);
        self.db.write_opt(batch, &write_opts)?;

        self.perf_counters.update(|fields| fields.batch_commit_count += 1);
        Ok(())
    }

    /// Returns the version of the crate this DB was created with, or `None` if the DB hasn't been
    /// initialized as a registry
    pub fn get_version(&self) -> Result<Option<String>> {
        self.get_metadata_string(VERSION_KEY)
    }

    /// Returns the [Coder::FORMAT_NAME] of the coder this DB was created with
    pub fn get_coder_name(&self) -> Result<Option<String>> {
        self.get_metadata_string(CODER_KEY)
    }

    pub fn get_owner(&self) -> Result<Option<Identity>> {
        Ok(self.get_metadata_string(OWNER_KEY)?.map(Identity::from))
    }

    fn get_metadata_string(&self, key : &[u8]) -> Result<Option<String>> {
        match self.get_bytes(METADATA_CF_NAME, key)? {
            Some(value_bytes) => {
                let value = String::from_utf8(value_bytes)
                    .map_err(|_| RegistryError::corrupt("metadata entry is not valid UTF-8"))?;
                Ok(Some(value))
            },
            None => Ok(None)
        }
    }

    /// Returns the id that will be assigned to the next book added
    ///
    /// A registry that has never had a book added doesn't have an entry, and starts at [BookId::FIRST]
    pub fn get_next_book_id(&self) -> Result<BookId> {
        match self.get_bytes(METADATA_CF_NAME, NEXT_BOOK_ID_KEY)? {
            Some(id_bytes) => BookId::from_le_bytes(&id_bytes)
                .ok_or_else(|| RegistryError::corrupt("malformed next_book_id entry")),
            None => Ok(BookId::FIRST)
        }
    }

    /// Stages the metadata entries written once, when a registry is created
    pub fn stage_registry_metadata(&self, batch : &mut WriteBatch, owner : &Identity) -> Result<()> {
        let metadata_cf_handle = self.cf(METADATA_CF_NAME)?;
        batch.put_cf(metadata_cf_handle, VERSION_KEY, env!("CARGO_PKG_VERSION").as_bytes());
        batch.put_cf(metadata_cf_handle, CODER_KEY, C::FORMAT_NAME.as_bytes());
        batch.put_cf(metadata_cf_handle, OWNER_KEY, owner.as_bytes());
        Ok(())
    }

    pub fn stage_next_book_id(&self, batch : &mut WriteBatch, next_book_id : BookId) -> Result<()> {
        let metadata_cf_handle = self.cf(METADATA_CF_NAME)?;
        batch.put_cf(metadata_cf_handle, NEXT_BOOK_ID_KEY, next_book_id.to_le_bytes());
        Ok(())
    }

    /// Returns the insertion index of an admin, or `None` if the identity isn't an admin
    pub fn get_admin_index(&self, identity : &Identity) -> Result<Option<u64>> {
        match self.get_bytes(ADMINS_CF_NAME, identity.as_bytes())? {
            Some(index_bytes) => Ok(Some(decode_u64(&index_bytes)?)),
            None => Ok(None)
        }
    }

    /// Returns the admin that was added at the given insertion index
    pub fn get_admin_at(&self, index : u64) -> Result<Option<Identity>> {
        match self.get_bytes(ADMIN_ORDER_CF_NAME, &index.to_le_bytes())? {
            Some(identity_bytes) => {
                let identity = String::from_utf8(identity_bytes)
                    .map_err(|_| RegistryError::corrupt(format!("admin {index} is not valid UTF-8")))?;
                Ok(Some(Identity::from(identity)))
            },
            None => Ok(None)
        }
    }

    /// Stages both halves of an admin entry: the membership entry and the insertion-order slot
    pub fn stage_admin(&self, batch : &mut WriteBatch, identity : &Identity, index : u64) -> Result<()> {
        batch.put_cf(self.cf(ADMINS_CF_NAME)?, identity.as_bytes(), index.to_le_bytes());
        batch.put_cf(self.cf(ADMIN_ORDER_CF_NAME)?, index.to_le_bytes(), identity.as_bytes());
        Ok(())
    }

    /// Returns the number of admins, by probing the "admin_order" column family
    ///
    /// NOTE: this is not a simple lookup, and is designed to be called when opening a registry, not
    /// as a simple accessor
    pub fn admin_count(&self) -> Result<u64> {
        let admin_order_cf_handle = self.cf(ADMIN_ORDER_CF_NAME)?;
        let admin_count = probe_for_max_sequential_key(&self.db, admin_order_cf_handle, PROBE_STARTING_HINT)?;
        Ok(admin_count)
    }

    /// Returns the number of live books, by probing the "book_index" column family.  Positions in
    /// the book index are dense, so the first missing position is the count
    ///
    /// NOTE: this is not a simple lookup, and is designed to be called when opening a registry, not
    /// as a simple accessor
    pub fn book_count(&self) -> Result<u64> {
        let book_index_cf_handle = self.cf(BOOK_INDEX_CF_NAME)?;
        let book_count = probe_for_max_sequential_key(&self.db, book_index_cf_handle, PROBE_STARTING_HINT)?;
        Ok(book_count)
    }

    /// Returns the stored data for a live book, or `None` if the id doesn't reference a live book
    pub fn get_book_data(&self, book_id : BookId) -> Result<Option<BookData>> {
        match self.get_bytes(BOOKS_CF_NAME, &book_id.to_le_bytes())? {
            Some(book_bytes) => {
                let book_data = self.coder.decode_from_bytes(&book_bytes).map_err(RegistryError::Codec)?;
                Ok(Some(book_data))
            },
            None => Ok(None)
        }
    }

    /// Returns the id of the book in a given slot of the book index
    pub fn get_book_id_at(&self, position : u64) -> Result<Option<BookId>> {
        match self.get_bytes(BOOK_INDEX_CF_NAME, &position.to_le_bytes())? {
            Some(id_bytes) => BookId::from_le_bytes(&id_bytes)
                .map(Some)
                .ok_or_else(|| RegistryError::corrupt(format!("malformed book index entry at position {position}"))),
            None => Ok(None)
        }
    }

    /// Stages a book entry.  If the book already exists, it will be overwritten
    ///
    /// NOTE: This function will NOT update the book index, so the caller is responsible for keeping
    /// `book_data.position` in agreement with the index
    pub fn stage_book(&self, batch : &mut WriteBatch, book_data : &BookData) -> Result<()> {
        let book_bytes = self.coder.encode_to_buf(book_data).map_err(RegistryError::Codec)?;
        batch.put_cf(self.cf(BOOKS_CF_NAME)?, book_data.book.id.to_le_bytes(), book_bytes);
        Ok(())
    }

    pub fn stage_book_position(&self, batch : &mut WriteBatch, position : u64, book_id : BookId) -> Result<()> {
        batch.put_cf(self.cf(BOOK_INDEX_CF_NAME)?, position.to_le_bytes(), book_id.to_le_bytes());
        Ok(())
    }

    /// Stages the removal of a book entry
    ///
    /// This should only be staged as part of another operation as it leaves the book index
    /// inconsistent on its own
    pub fn stage_delete_book(&self, batch : &mut WriteBatch, book_id : BookId) -> Result<()> {
        batch.delete_cf(self.cf(BOOKS_CF_NAME)?, book_id.to_le_bytes());
        Ok(())
    }

    pub fn stage_delete_book_position(&self, batch : &mut WriteBatch, position : u64) -> Result<()> {
        batch.delete_cf(self.cf(BOOK_INDEX_CF_NAME)?, position.to_le_bytes());
        Ok(())
    }
}

impl<C: Coder + Send + Sync> Drop for DBConnection<C> {
    fn drop(&mut self) {
        //Flush the memtables so reopening doesn't need to replay the WAL.  There's nobody to report
        // a failure to, and the WAL still has everything, so the result is ignored
        let _ = self.db.flush();
    }
}

fn decode_u64(bytes : &[u8]) -> Result<u64> {
    let array : [u8; 8] = bytes.try_into()
        .map_err(|_| RegistryError::corrupt(format!("expected an 8 byte integer, found {} bytes", bytes.len())))?;
    Ok(u64::from_le_bytes(array))
}

// Returns the u64 that is one larger than the largest key, assuming the column family contains
// all of the smaller keys without any gaps.  If there are missing keys, the results are undefined.
//
// Implements a binary search through the possible keys, looking for the highest numbered key
// This function should resolve one bit of the key, each time through the loop, so it should loop
// at most 64 times for a 64 bit key, and likely much less because of the starting hint
fn probe_for_max_sequential_key(db : &DBWithThreadMode<rocksdb::SingleThreaded>, cf : &ColumnFamily, starting_hint : u64) -> std::result::Result<u64, rocksdb::Error> {

    let mut min = 0;
    let mut max = u64::MAX;

    let mut guess_max = if starting_hint > 0xFFFFFFFF {
        u64::MAX
    } else if starting_hint < 1 {
        1
    } else {
        starting_hint * starting_hint
    };

    let mut cur_val = starting_hint;
    loop {

        //NOTE: this is an optimization to save one DB query at the cost of an extra test each loop
        //The case where max == min will result in no hit and exit at the bottom of the loop body
        if max == min {
            return Ok(cur_val)
        }

        if db.get_pinned_cf(cf, cur_val.to_le_bytes())?.is_some() {
            min = cur_val + 1;
            if guess_max < max/2 {
                guess_max *= 2;
            } else {
                guess_max = max;
            }
        } else {
            max = cur_val;
            guess_max = max;

            if max == min {
                return Ok(cur_val)
            }
        }

        cur_val = ((guess_max - min) / 2) + min;
    }
}
