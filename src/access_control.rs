//!
//! The AccessControl module tracks the registry's owner and its admins, and decides who may call
//! the gated operations.  [Identity] is re-exported to the public interface.
//!

use rocksdb::WriteBatch;
use serde::{Serialize, Deserialize};
use tracing::{debug, warn};

use super::database::DBConnection;
use super::encode_decode::Coder;
use super::error::{RegistryError, Result};

/// The identity of a caller, as supplied by whatever is hosting the registry
///
/// The registry trusts the identity it is handed.  Authenticating the caller is the host's job.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, derive_more::Display, Serialize, Deserialize)]
pub struct Identity(String);

impl Identity {
    pub fn new(identity : impl Into<String>) -> Self {
        Identity(identity.into())
    }
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl From<&str> for Identity {
    fn from(identity : &str) -> Self {
        Identity(identity.to_string())
    }
}

impl From<String> for Identity {
    fn from(identity : String) -> Self {
        Identity(identity)
    }
}

/// The owner and admin set of a registry
///
/// The owner is fixed when the registry is created.  The owner may appoint admins, but is not an
/// admin itself unless it appoints itself.  The admins are kept in insertion order and there is no
/// way to remove one.
///
/// Membership lives in the database; this struct only caches what is needed to append.
pub struct AccessControl {
    owner : Identity,
    admin_count : u64,
}

impl AccessControl {

    pub(crate) fn new(owner : Identity, admin_count : u64) -> Self {
        Self {
            owner,
            admin_count
        }
    }

    pub fn owner(&self) -> &Identity {
        &self.owner
    }

    pub fn admin_count(&self) -> usize {
        self.admin_count as usize
    }

    pub(crate) fn is_admin<C : Coder>(&self, db : &DBConnection<C>, identity : &Identity) -> Result<bool> {
        Ok(db.get_admin_index(identity)?.is_some())
    }

    /// Returns the admin added at `index`, counting from the first admin ever added
    pub(crate) fn admin_at<C : Coder>(&self, db : &DBConnection<C>, index : usize) -> Result<Option<Identity>> {
        if index >= self.admin_count() {
            return Ok(None);
        }
        match db.get_admin_at(index as u64)? {
            Some(identity) => Ok(Some(identity)),
            None => Err(RegistryError::corrupt(format!("admin order has a gap at index {index}")))
        }
    }

    pub(crate) fn require_owner<C : Coder>(&self, db : &DBConnection<C>, caller : &Identity) -> Result<()> {
        if *caller != self.owner {
            warn!(%caller, "rejected owner-only call");
            db.perf_counters().update(|fields| fields.rejected_call_count += 1);
            return Err(RegistryError::NotOwner { caller : caller.clone() });
        }
        Ok(())
    }

    pub(crate) fn require_admin<C : Coder>(&self, db : &DBConnection<C>, caller : &Identity) -> Result<()> {
        if !self.is_admin(db, caller)? {
            warn!(%caller, "rejected admin-only call");
            db.perf_counters().update(|fields| fields.rejected_call_count += 1);
            return Err(RegistryError::NotAdmin { caller : caller.clone() });
        }
        Ok(())
    }

    /// Appends `identity` to the admins.  Returns `false` without writing anything if it was
    /// already an admin
    pub(crate) fn add_admin<C : Coder>(&mut self, db : &DBConnection<C>, caller : &Identity, identity : &Identity) -> Result<bool> {

        self.require_owner(db, caller)?;

        if self.is_admin(db, identity)? {
            debug!(%identity, "already an admin");
            return Ok(false);
        }

        let mut batch = WriteBatch::default();
        db.stage_admin(&mut batch, identity, self.admin_count)?;
        db.commit(batch)?;

        //Only advance once the batch has landed
        self.admin_count += 1;
        Ok(true)
    }
}
