//!
//! The RegistryConfig module contains the parameters for configuring a Registry.  The RegistryConfig
//! trait is re-exported.
//!

/// The RegistryConfig trait specifies all of the parameters for configuring a [Registry](crate::Registry)
///
/// ## An example creating a [Registry](crate::Registry) using a custom [RegistryConfig]
/// ```
/// use book_registry::{*};
///
/// struct Config();
/// impl RegistryConfig for Config {
///     type CoderT = DefaultCoder;
///     const SYNC_WRITES : bool = true;
///     const MAX_PENDING_EVENTS : usize = 16;
/// }
/// let dir = std::env::temp_dir().join("config_example.rocks");
/// # let _ = std::fs::remove_dir_all(&dir);
/// let registry = Registry::new(&dir, Identity::from("0xowner"), Config()).unwrap();
/// assert_eq!(registry.get_book_count(), 0);
/// ```
///
pub trait RegistryConfig {

    /// The [Coder](crate::Coder) used to encode the books stored in the database.
    ///
    /// The coder's [FORMAT_NAME](crate::Coder::FORMAT_NAME) is recorded when a registry is created,
    /// and reopening the registry with a different coder is an error.
    type CoderT : 'static + crate::Coder + Send + Sync;

    /// When `true`, every committed mutation is synced to disk before the call returns.
    ///
    /// Without syncing, a committed mutation survives a crash of the process but may be lost if the
    /// machine itself goes down.  Syncing makes every mutation considerably slower.
    const SYNC_WRITES : bool = false;

    /// The maximum number of [RegistryEvent](crate::RegistryEvent)s held in the queue between calls to
    /// [drain_events](crate::Registry::drain_events).  When the queue is full, the oldest event is
    /// dropped to make room.
    ///
    /// A value of 0 disables the queue.  The events are still logged.
    const MAX_PENDING_EVENTS : usize = 1024;
}

/// A struct that implements [RegistryConfig] with default values.  This can be passed as a convenience
/// when a default configuration for [Registry](crate::Registry) is acceptable
pub struct DefaultRegistryConfig();

impl RegistryConfig for DefaultRegistryConfig {
    type CoderT = crate::DefaultCoder;
    const SYNC_WRITES : bool = false;
    const MAX_PENDING_EVENTS : usize = 1024;
}
