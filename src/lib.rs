
//! # book_registry Overview
//!
//! A persistent, permissioned catalog of books backed by [RocksDB](https://rocksdb.org).
//!
//! A [Registry] has a single owner, fixed when the registry is created.  The owner appoints admins,
//! and admins add, update and delete books.  Anyone may read the books.  There is no way to
//! transfer ownership or to remove an admin.
//!
//! ## Records & Identifiers
//!
//! Every [Book] has a [BookId] that is assigned when the book is added and never changes.  Ids come
//! from a strictly increasing sequence stored with the registry, so the id of a deleted book is
//! never handed out again, not even after the registry is closed and reopened.
//!
//! The live books are also kept in a dense index, so they can be enumerated by position with
//! [Registry::book_at] or [Registry::books].  Deleting a book moves the last book in the index into
//! the vacated position, so positions shift around while ids stay put.
//!
//! ## Callers
//!
//! The registry doesn't authenticate anybody.  Whatever hosts the registry supplies the caller's
//! [Identity] to each restricted operation, and the registry trusts it.
//!
//! | Operation | Who may call it |
//! |---|---|
//! | [add_admin](Registry::add_admin) | the owner |
//! | [add_book](Registry::add_book), [update_book](Registry::update_book), [delete_book](Registry::delete_book) | an admin |
//! | [get_book](Registry::get_book), [get_book_count](Registry::get_book_count), [is_admin](Registry::is_admin) | anyone |
//!
//! The owner is not an admin unless it appoints itself.
//!
//! ## Usage Example
//!
//! ```
//! use book_registry::{*};
//!
//! let dir = std::env::temp_dir().join("usage_example.rocks");
//! # let _ = std::fs::remove_dir_all(&dir);
//! let owner = Identity::from("0xowner");
//! let admin = Identity::from("0xadmin");
//!
//! //Create the registry, and have the owner appoint an admin
//! let mut registry = Registry::new(&dir, owner.clone(), DefaultRegistryConfig()).unwrap();
//! registry.add_admin(&owner, &admin).unwrap();
//!
//! //The owner isn't an admin, so it can't add books
//! assert!(registry.add_book(&owner, "Ethereum whitepaper", "2014", "Vitalik Buterin").is_err());
//!
//! //But the admin can
//! let id = registry.add_book(&admin, "Ethereum whitepaper", "2014", "Vitalik Buterin").unwrap();
//! assert_eq!(registry.get_book(id).unwrap().author, "Vitalik Buterin");
//! assert_eq!(registry.get_book_count(), 1);
//!
//! registry.delete_book(&admin, id).unwrap();
//! assert!(matches!(registry.get_book(id), Err(RegistryError::NotFound(_))));
//! ```
//!
//! ## Atomicity
//!
//! Every mutation checks the caller first, then stages all of its writes in a single RocksDB write
//! batch.  If any check fails nothing has been staged, and if the batch fails to commit nothing has
//! been written.  Mutating operations take `&mut self`, so a registry only ever has one writer.  To
//! share a registry between threads, put it behind a `Mutex`.
//!
//! ## Events
//!
//! Each committed change queues a [RegistryEvent], which can be collected with
//! [Registry::drain_events].  Events are also logged with [tracing](https://docs.rs/tracing),
//! along with rejected calls.  The crate never installs a subscriber.
//!
//! ## Registry Configuration
//!
//! A [RegistryConfig] object is passed as an argument to [Registry::new].  [DefaultRegistryConfig]
//! will be sufficient for most situations.  The coder used to store books is selected with the
//! `bitcode` (default), `bincode` and `msgpack` features, and the `perf_counters` feature enables
//! [PerfCounterFields].
//!

mod access_control;
pub use access_control::Identity;
mod database;
mod encode_decode;
pub use encode_decode::Coder;
#[cfg(feature = "bitcode")]
pub use encode_decode::bitcode_interface::BitcodeCoder;
#[cfg(feature = "bincode")]
pub use encode_decode::bincode_interface::BincodeCoder;
#[cfg(feature = "msgpack")]
pub use encode_decode::msgpack_interface::MsgPackCoder;
mod error;
pub use error::{RegistryError, Result};
mod events;
pub use events::RegistryEvent;
mod perf_counters;
pub use perf_counters::PerfCounterFields;
mod records;
pub use records::{Book, BookId};
mod registry_config;
pub use registry_config::{RegistryConfig, DefaultRegistryConfig};
mod registry;
pub use registry::Registry;

/// The [Coder] used by [DefaultRegistryConfig], chosen by the enabled features
#[cfg(feature = "bitcode")]
pub type DefaultCoder = BitcodeCoder;
#[cfg(all(not(feature = "bitcode"), feature = "bincode"))]
pub type DefaultCoder = BincodeCoder;
#[cfg(all(not(feature = "bitcode"), not(feature = "bincode"), feature = "msgpack"))]
pub type DefaultCoder = MsgPackCoder;

#[cfg(not(any(feature = "bitcode", feature = "bincode", feature = "msgpack")))]
compile_error!("at least one of the \"bitcode\", \"bincode\" or \"msgpack\" features must be enabled");


#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rand::{Rng, SeedableRng};
    use tempfile::TempDir;

    use crate::{*};

    struct Accounts {
        owner : Identity,
        admin : Identity,
        non_privileged : Identity,
    }

    fn accounts() -> Accounts {
        Accounts {
            owner : Identity::from("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"),
            admin : Identity::from("0x70997970c51812dc3a010c7d01b50e0d17dc79c8"),
            non_privileged : Identity::from("0x3c44cdddb6a900fa2b585dd299e03d12fa4293bc"),
        }
    }

    /// A fresh registry in its own directory, with `accounts.admin` already appointed
    fn new_registry(accounts : &Accounts) -> (TempDir, Registry<DefaultRegistryConfig>) {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = Registry::new(dir.path().join("registry.rocks"), accounts.owner.clone(), DefaultRegistryConfig()).unwrap();
        registry.add_admin(&accounts.owner, &accounts.admin).unwrap();
        (dir, registry)
    }

    /// Checks every live book against the model, both by id and by position
    fn assert_matches_model(registry : &Registry<DefaultRegistryConfig>, model : &HashMap<BookId, Book>) {
        assert_eq!(registry.get_book_count(), model.len());

        for (book_id, book) in model.iter() {
            assert_eq!(&registry.get_book(*book_id).unwrap(), book);
        }

        //Enumerating by position must visit every live book exactly once
        let mut enumerated : Vec<Book> = registry.books().map(|book| book.unwrap()).collect();
        enumerated.sort_by_key(|book| book.id);
        let mut expected : Vec<Book> = model.values().cloned().collect();
        expected.sort_by_key(|book| book.id);
        assert_eq!(enumerated, expected);
        assert_eq!(registry.book_at(model.len()).unwrap(), None);
    }

    #[test]
    fn whitepaper_scenario() {
        let accounts = accounts();
        let (_dir, mut registry) = new_registry(&accounts);

        let isbn = registry.add_book(&accounts.admin, "Ethereum whitepaper", "2014", "Vitalik Buterin").unwrap();
        assert_eq!(registry.get_book_count(), 1);
        assert_eq!(registry.book_at(0).unwrap(), Some(Book::new(isbn, "Ethereum whitepaper", "2014", "Vitalik Buterin")));

        registry.update_book(&accounts.admin, isbn, "Uniswap whitepaper", "2018", "Uniswap").unwrap();
        let book = registry.get_book(isbn).unwrap();
        assert_eq!(book.id, isbn);
        assert_eq!(book.title, "Uniswap whitepaper");
        assert_eq!(book.year, "2018");
        assert_eq!(book.author, "Uniswap");
        assert_eq!(registry.get_book_count(), 1);

        registry.delete_book(&accounts.admin, isbn).unwrap();
        assert_eq!(registry.get_book_count(), 0);
        assert!(matches!(registry.get_book(isbn), Err(RegistryError::NotFound(id)) if id == isbn));
    }

    #[test]
    fn admin_is_recorded_in_order() {
        let accounts = accounts();
        let (_dir, mut registry) = new_registry(&accounts);

        assert_eq!(registry.admin_at(0).unwrap(), Some(accounts.admin.clone()));
        assert!(registry.is_admin(&accounts.admin).unwrap());
        assert!(!registry.is_admin(&accounts.owner).unwrap());
        assert!(!registry.is_admin(&accounts.non_privileged).unwrap());

        registry.add_admin(&accounts.owner, &accounts.non_privileged).unwrap();
        let admins : Vec<Identity> = registry.admins().map(|admin| admin.unwrap()).collect();
        assert_eq!(admins, vec![accounts.admin.clone(), accounts.non_privileged.clone()]);

        //Re-appointing is a no-op
        registry.add_admin(&accounts.owner, &accounts.admin).unwrap();
        assert_eq!(registry.admin_count(), 2);
    }

    #[test]
    fn only_owner_appoints_admins() {
        let accounts = accounts();
        let (_dir, mut registry) = new_registry(&accounts);

        for caller in [&accounts.admin, &accounts.non_privileged] {
            let err = registry.add_admin(caller, &accounts.non_privileged).unwrap_err();
            assert!(matches!(err, RegistryError::NotOwner { .. }));
        }
        assert!(!registry.is_admin(&accounts.non_privileged).unwrap());
        assert_eq!(registry.admin_count(), 1);
    }

    #[test]
    fn unprivileged_callers_cannot_mutate() {
        let accounts = accounts();
        let (_dir, mut registry) = new_registry(&accounts);
        let isbn = registry.add_book(&accounts.admin, "Ethereum whitepaper", "2014", "Vitalik Buterin").unwrap();
        let original = registry.get_book(isbn).unwrap();
        registry.drain_events();

        //Neither the owner (who isn't an admin) nor an outsider may touch the catalog
        for caller in [&accounts.owner, &accounts.non_privileged] {
            let err = registry.add_book(caller, "Bitcoin whitepaper", "2008", "Satoshi Nakamoto").unwrap_err();
            assert!(matches!(err, RegistryError::NotAdmin { caller : ref rejected } if rejected == caller));

            let err = registry.update_book(caller, isbn, "Uniswap whitepaper", "2018", "Uniswap").unwrap_err();
            assert!(matches!(err, RegistryError::NotAdmin { .. }));

            let err = registry.delete_book(caller, isbn).unwrap_err();
            assert!(matches!(err, RegistryError::NotAdmin { .. }));

            //Access is checked before existence
            let err = registry.delete_book(caller, BookId(999)).unwrap_err();
            assert!(matches!(err, RegistryError::NotAdmin { .. }));

            assert_eq!(registry.get_book_count(), 1);
            assert_eq!(registry.get_book(isbn).unwrap(), original);
        }
        assert!(registry.drain_events().is_empty());

        //Reads are open to everyone
        assert_eq!(registry.get_book(isbn).unwrap().title, "Ethereum whitepaper");
    }

    #[test]
    fn owner_can_appoint_itself() {
        let accounts = accounts();
        let (_dir, mut registry) = new_registry(&accounts);

        registry.add_admin(&accounts.owner, &accounts.owner).unwrap();
        let isbn = registry.add_book(&accounts.owner, "Ethereum whitepaper", "2014", "Vitalik Buterin").unwrap();
        registry.update_book(&accounts.owner, isbn, "Uniswap whitepaper", "2018", "Uniswap").unwrap();
        registry.delete_book(&accounts.owner, isbn).unwrap();
        assert_eq!(registry.get_book_count(), 0);
    }

    #[test]
    fn missing_books_are_not_found() {
        let accounts = accounts();
        let (_dir, mut registry) = new_registry(&accounts);

        //Never assigned
        assert!(matches!(registry.get_book(BookId(0)), Err(RegistryError::NotFound(_))));
        assert!(matches!(registry.update_book(&accounts.admin, BookId(0), "a", "b", "c"), Err(RegistryError::NotFound(_))));
        assert!(matches!(registry.delete_book(&accounts.admin, BookId::NULL), Err(RegistryError::NotFound(_))));

        //Deleted
        let isbn = registry.add_book(&accounts.admin, "Ethereum whitepaper", "2014", "Vitalik Buterin").unwrap();
        let other = registry.add_book(&accounts.admin, "Bitcoin whitepaper", "2008", "Satoshi Nakamoto").unwrap();
        registry.delete_book(&accounts.admin, isbn).unwrap();
        assert_eq!(registry.get_book_count(), 1);

        assert!(matches!(registry.delete_book(&accounts.admin, isbn), Err(RegistryError::NotFound(_))));
        assert!(matches!(registry.update_book(&accounts.admin, isbn, "Uniswap whitepaper", "2018", "Uniswap"), Err(RegistryError::NotFound(_))));
        assert_eq!(registry.get_book_count(), 1);
        assert_eq!(registry.get_book(other).unwrap().title, "Bitcoin whitepaper");
    }

    #[test]
    fn ids_are_never_reused() {
        let accounts = accounts();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.rocks");

        let mut issued = vec![];
        {
            let mut registry = Registry::new(&path, accounts.owner.clone(), DefaultRegistryConfig()).unwrap();
            registry.add_admin(&accounts.owner, &accounts.admin).unwrap();

            for i in 0..5 {
                issued.push(registry.add_book(&accounts.admin, &format!("Volume {i}"), "2020", "Anon").unwrap());
            }
            //Deleting the newest book must not free its id for the next add
            registry.delete_book(&accounts.admin, issued[4]).unwrap();
            registry.delete_book(&accounts.admin, issued[1]).unwrap();
            issued.push(registry.add_book(&accounts.admin, "Volume 5", "2021", "Anon").unwrap());
        }

        //Nor does reopening the registry
        let mut registry = Registry::open(&path, DefaultRegistryConfig()).unwrap();
        issued.push(registry.add_book(&accounts.admin, "Volume 6", "2022", "Anon").unwrap());

        let mut deduped = issued.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), issued.len());
        assert!(issued.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn id_sequence_runs_out_without_issuing_null() {
        let accounts = accounts();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.rocks");
        {
            let mut registry = Registry::new(&path, accounts.owner.clone(), DefaultRegistryConfig()).unwrap();
            registry.add_admin(&accounts.owner, &accounts.admin).unwrap();
        }

        //Fast-forward the stored sequence to its last usable id
        {
            let db = crate::database::DBConnection::new(DefaultCoder::new(), &path, false, false).unwrap();
            let mut batch = rocksdb::WriteBatch::default();
            db.stage_next_book_id(&mut batch, BookId(u64::MAX - 1)).unwrap();
            db.commit(batch).unwrap();
        }

        let mut registry = Registry::open(&path, DefaultRegistryConfig()).unwrap();
        let last = registry.add_book(&accounts.admin, "Ethereum whitepaper", "2014", "Vitalik Buterin").unwrap();
        assert_eq!(last, BookId(u64::MAX - 1));

        let err = registry.add_book(&accounts.admin, "Bitcoin whitepaper", "2008", "Satoshi Nakamoto").unwrap_err();
        assert!(matches!(err, RegistryError::IdsExhausted));
        assert_eq!(registry.get_book_count(), 1);
        assert!(matches!(registry.get_book(BookId::NULL), Err(RegistryError::NotFound(_))));

        //Existing books can still be managed
        registry.update_book(&accounts.admin, last, "Uniswap whitepaper", "2018", "Uniswap").unwrap();
        registry.delete_book(&accounts.admin, last).unwrap();
        assert_eq!(registry.get_book_count(), 0);
    }

    #[test]
    fn deleting_non_last_book_keeps_others_retrievable() {
        let accounts = accounts();
        let (_dir, mut registry) = new_registry(&accounts);

        let eth = registry.add_book(&accounts.admin, "Ethereum whitepaper", "2014", "Vitalik Buterin").unwrap();
        let btc = registry.add_book(&accounts.admin, "Bitcoin whitepaper", "2008", "Satoshi Nakamoto").unwrap();
        let uni = registry.add_book(&accounts.admin, "Uniswap whitepaper", "2018", "Uniswap").unwrap();

        //Delete the first book, so the last one is moved into position 0
        registry.delete_book(&accounts.admin, eth).unwrap();
        assert_eq!(registry.get_book_count(), 2);
        assert_eq!(registry.book_at(0).unwrap().map(|book| book.id), Some(uni));
        assert_eq!(registry.book_at(1).unwrap().map(|book| book.id), Some(btc));
        assert_eq!(registry.get_book(uni).unwrap().title, "Uniswap whitepaper");
        assert_eq!(registry.get_book(btc).unwrap().title, "Bitcoin whitepaper");

        //The moved book's recorded position must have been fixed up, or this delete would
        // corrupt the index
        registry.delete_book(&accounts.admin, uni).unwrap();
        assert_eq!(registry.get_book_count(), 1);
        assert_eq!(registry.book_at(0).unwrap().map(|book| book.id), Some(btc));
        assert_eq!(registry.get_book(btc).unwrap().author, "Satoshi Nakamoto");

        //Updating keeps the position
        registry.update_book(&accounts.admin, btc, "Bitcoin: A Peer-to-Peer Electronic Cash System", "2008", "Satoshi Nakamoto").unwrap();
        assert_eq!(registry.book_at(0).unwrap().map(|book| book.title), Some("Bitcoin: A Peer-to-Peer Electronic Cash System".to_string()));
    }

    #[test]
    /// Runs a long random sequence of adds, updates and deletes against the registry, and checks the
    /// registry against a simple model after every step
    fn random_operations_match_model() {
        let accounts = accounts();
        let (_dir, mut registry) = new_registry(&accounts);
        let mut model : HashMap<BookId, Book> = HashMap::new();
        let mut rng = rand_pcg::Pcg64::seed_from_u64(0x5eed);

        for step in 0..400 {
            let live : Vec<BookId> = {
                let mut ids : Vec<BookId> = model.keys().copied().collect();
                ids.sort();
                ids
            };

            match rng.gen_range(0..10) {
                //Bias toward adds, so the registry grows and deletes hit the middle of the index
                0..=4 => {
                    let title = format!("Title {step}");
                    let year = format!("{}", rng.gen_range(1900..2030));
                    let book_id = registry.add_book(&accounts.admin, &title, &year, "Author").unwrap();
                    assert!(!model.contains_key(&book_id));
                    model.insert(book_id, Book::new(book_id, &title, &year, "Author"));
                },
                5..=6 if !live.is_empty() => {
                    let book_id = live[rng.gen_range(0..live.len())];
                    let title = format!("Revised {step}");
                    registry.update_book(&accounts.admin, book_id, &title, "1999", "Editor").unwrap();
                    model.insert(book_id, Book::new(book_id, &title, "1999", "Editor"));
                },
                _ if !live.is_empty() => {
                    let book_id = live[rng.gen_range(0..live.len())];
                    registry.delete_book(&accounts.admin, book_id).unwrap();
                    model.remove(&book_id);
                    assert!(matches!(registry.get_book(book_id), Err(RegistryError::NotFound(_))));
                },
                _ => {}
            }

            assert_matches_model(&registry, &model);
        }
    }

    #[test]
    fn registry_survives_reopen() {
        let accounts = accounts();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.rocks");

        let mut model = HashMap::new();
        {
            let mut registry = Registry::new(&path, accounts.owner.clone(), DefaultRegistryConfig()).unwrap();
            registry.add_admin(&accounts.owner, &accounts.admin).unwrap();
            for (title, year, author) in [("Ethereum whitepaper", "2014", "Vitalik Buterin"), ("Bitcoin whitepaper", "2008", "Satoshi Nakamoto"), ("Uniswap whitepaper", "2018", "Uniswap")] {
                let book_id = registry.add_book(&accounts.admin, title, year, author).unwrap();
                model.insert(book_id, Book::new(book_id, title, year, author));
            }
            let first = *model.keys().min().unwrap();
            registry.delete_book(&accounts.admin, first).unwrap();
            model.remove(&first);
        }

        let mut registry = Registry::open(&path, DefaultRegistryConfig()).unwrap();
        assert_eq!(registry.owner(), &accounts.owner);
        assert!(registry.is_admin(&accounts.admin).unwrap());
        assert_eq!(registry.admin_count(), 1);
        assert_matches_model(&registry, &model);

        //The reopened registry keeps working, including the compaction path
        let last = *model.keys().max().unwrap();
        registry.delete_book(&accounts.admin, *model.keys().min().unwrap()).unwrap();
        model.retain(|book_id, _| *book_id == last);
        assert_matches_model(&registry, &model);
    }

    #[test]
    fn reopening_checks_owner() {
        let accounts = accounts();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.rocks");

        //There's nothing to open yet
        assert!(matches!(Registry::open(&path, DefaultRegistryConfig()), Err(RegistryError::Uninitialized(_))));

        drop(Registry::new(&path, accounts.owner.clone(), DefaultRegistryConfig()).unwrap());

        let err = Registry::new(&path, accounts.admin.clone(), DefaultRegistryConfig()).err().unwrap();
        assert!(matches!(err, RegistryError::OwnerMismatch { existing, requested } if existing == accounts.owner && requested == accounts.admin));

        //Same owner is fine
        let registry = Registry::new(&path, accounts.owner.clone(), DefaultRegistryConfig()).unwrap();
        assert_eq!(registry.owner(), &accounts.owner);
    }

    #[test]
    fn open_empty_directory_is_uninitialized() {
        let dir = tempfile::tempdir().unwrap();

        //A directory that exists but holds no database
        assert!(matches!(Registry::open(dir.path(), DefaultRegistryConfig()), Err(RegistryError::Uninitialized(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        //A RocksDB database that was never made into a registry must be left as it was
        let path = dir.path().join("plain.rocks");
        drop(rocksdb::DB::open_default(&path).unwrap());
        assert!(matches!(Registry::open(&path, DefaultRegistryConfig()), Err(RegistryError::Uninitialized(_))));
        let cf_names = rocksdb::DB::list_cf(&rocksdb::Options::default(), &path).unwrap();
        assert_eq!(cf_names, vec!["default".to_string()]);
    }

    #[test]
    fn events_follow_committed_changes() {
        let accounts = accounts();
        let (_dir, mut registry) = new_registry(&accounts);
        assert_eq!(registry.drain_events(), vec![RegistryEvent::AdminAdded { admin : accounts.admin.clone(), by : accounts.owner.clone() }]);

        let isbn = registry.add_book(&accounts.admin, "Ethereum whitepaper", "2014", "Vitalik Buterin").unwrap();
        registry.update_book(&accounts.admin, isbn, "Uniswap whitepaper", "2018", "Uniswap").unwrap();
        let _ = registry.delete_book(&accounts.non_privileged, isbn);
        registry.delete_book(&accounts.admin, isbn).unwrap();

        let events = registry.drain_events();
        assert_eq!(events, vec![
            RegistryEvent::BookAdded { book_id : isbn, by : accounts.admin.clone() },
            RegistryEvent::BookUpdated { book_id : isbn, by : accounts.admin.clone() },
            RegistryEvent::BookDeleted { book_id : isbn, by : accounts.admin.clone() },
        ]);
        assert!(events.iter().all(|event| event.book_id() == Some(isbn) && event.by() == &accounts.admin));
        assert_eq!(registry.pending_events().count(), 0);
    }

    #[test]
    fn event_queue_is_bounded() {
        struct Config();
        impl RegistryConfig for Config {
            type CoderT = DefaultCoder;
            const MAX_PENDING_EVENTS : usize = 2;
        }

        let accounts = accounts();
        let dir = tempfile::tempdir().unwrap();
        let mut registry = Registry::new(dir.path().join("registry.rocks"), accounts.owner.clone(), Config()).unwrap();
        registry.add_admin(&accounts.owner, &accounts.admin).unwrap();
        let first = registry.add_book(&accounts.admin, "Ethereum whitepaper", "2014", "Vitalik Buterin").unwrap();
        let second = registry.add_book(&accounts.admin, "Bitcoin whitepaper", "2008", "Satoshi Nakamoto").unwrap();

        //The AdminAdded event was the oldest, so it was dropped
        let book_ids : Vec<Option<BookId>> = registry.pending_events().map(|event| event.book_id()).collect();
        assert_eq!(book_ids, vec![Some(first), Some(second)]);
    }

    #[test]
    fn event_queue_can_be_disabled() {
        struct Config();
        impl RegistryConfig for Config {
            type CoderT = DefaultCoder;
            const MAX_PENDING_EVENTS : usize = 0;
        }

        let accounts = accounts();
        let dir = tempfile::tempdir().unwrap();
        let mut registry = Registry::new(dir.path().join("registry.rocks"), accounts.owner.clone(), Config()).unwrap();
        registry.add_admin(&accounts.owner, &accounts.admin).unwrap();
        let isbn = registry.add_book(&accounts.admin, "Ethereum whitepaper", "2014", "Vitalik Buterin").unwrap();

        //The mutations still land, they just aren't queued
        assert_eq!(registry.get_book(isbn).unwrap().title, "Ethereum whitepaper");
        assert_eq!(registry.pending_events().count(), 0);
        assert!(registry.drain_events().is_empty());
    }

    #[cfg(all(feature = "bitcode", feature = "bincode"))]
    #[test]
    fn reopening_checks_coder() {
        struct BincodeConfig();
        impl RegistryConfig for BincodeConfig {
            type CoderT = BincodeCoder;
        }

        let accounts = accounts();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.rocks");
        drop(Registry::new(&path, accounts.owner.clone(), DefaultRegistryConfig()).unwrap());

        let err = Registry::open(&path, BincodeConfig()).err().unwrap();
        assert!(matches!(err, RegistryError::CoderMismatch { .. }));
    }

    #[test]
    /// This tests the perf-counters
    fn perf_counters_test() {
        let accounts = accounts();
        let (_dir, mut registry) = new_registry(&accounts);
        let eth = registry.add_book(&accounts.admin, "Ethereum whitepaper", "2014", "Vitalik Buterin").unwrap();
        let btc = registry.add_book(&accounts.admin, "Bitcoin whitepaper", "2008", "Satoshi Nakamoto").unwrap();

        #[cfg(feature = "perf_counters")]
        {
            registry.reset_perf_counters();

            //Deleting the first of two books moves the second into its slot
            registry.delete_book(&accounts.admin, eth).unwrap();
            let _ = registry.delete_book(&accounts.non_privileged, eth);
            let counters = registry.get_perf_counters();
            assert_eq!(counters.batch_commit_count, 1);
            assert_eq!(counters.compaction_move_count, 1);
            assert_eq!(counters.rejected_call_count, 1);
            assert!(counters.db_read_count > 0);


            //Deleting the book in the last position doesn't move anything
            registry.delete_book(&accounts.admin, btc).unwrap();
            let counters = registry.get_perf_counters();
            assert_eq!(counters.batch_commit_count, 2);
            assert_eq!(counters.compaction_move_count, 1);

            println!("-=-=-=-=-=-=-=-=- delete_book test -=-=-=-=-=-=-=-=-");
            println!("db_read_count {}", counters.db_read_count);
            println!("batch_commit_count {}", counters.batch_commit_count);
        }

        #[cfg(not(feature = "perf_counters"))]
        {
            registry.delete_book(&accounts.admin, eth).unwrap();
            registry.delete_book(&accounts.admin, btc).unwrap();
            assert_eq!(registry.get_perf_counters(), PerfCounterFields::new());
            println!("perf_counters feature not enabled");
        }
    }
}
