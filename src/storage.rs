use crate::data::ShowId;
use crate::tiers::Partition;
use gloo_storage::errors::StorageError as BrowserStorageError;
use gloo_storage::{LocalStorage, Storage};
use log::warn;
use thiserror::Error;

const STORAGE_KEY_PREFIX: &str = "tierListState_";

pub fn storage_key(show_id: ShowId) -> String {
    format!("{}{}", STORAGE_KEY_PREFIX, show_id)
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("saved tier list for show {show_id} is unreadable: {reason}")]
    Corrupt { show_id: ShowId, reason: String },
    #[error("could not save tier list for show {show_id}: {reason}")]
    Write { show_id: ShowId, reason: String },
    #[error("browser storage is unavailable for show {show_id}")]
    Unavailable { show_id: ShowId },
}

/// Durable per-show home for partition snapshots.
pub trait SnapshotStore {
    fn load(&self, show_id: ShowId) -> Result<Option<Partition>, StorageError>;
    fn save(&self, show_id: ShowId, partition: &Partition) -> Result<(), StorageError>;
    fn clear(&self, show_id: ShowId) -> Result<(), StorageError>;
}

/// `window.localStorage`. Browsers with storage disabled (blocked cookies,
/// private modes) report no storage object; the store then keeps nothing and
/// every write is an `Unavailable` error.
#[derive(Debug, Clone, Copy)]
pub struct BrowserStore {
    available: bool,
}

impl BrowserStore {
    pub fn detect() -> Self {
        let available = web_sys::window()
            .and_then(|window| window.local_storage().ok().flatten())
            .is_some();
        if !available {
            warn!("localStorage is unavailable; tier lists will not be saved");
        }
        Self { available }
    }

    #[cfg(test)]
    pub(crate) fn unavailable() -> Self {
        Self { available: false }
    }

    fn ensure_available(&self, show_id: ShowId) -> Result<(), StorageError> {
        if self.available {
            Ok(())
        } else {
            Err(StorageError::Unavailable { show_id })
        }
    }
}

impl SnapshotStore for BrowserStore {
    /// Without storage there is nothing saved, so the show loads fresh.
    fn load(&self, show_id: ShowId) -> Result<Option<Partition>, StorageError> {
        if !self.available {
            return Ok(None);
        }
        match LocalStorage::get::<Partition>(storage_key(show_id)) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(BrowserStorageError::KeyNotFound(_)) => Ok(None),
            Err(err) => Err(StorageError::Corrupt {
                show_id,
                reason: err.to_string(),
            }),
        }
    }

    fn save(&self, show_id: ShowId, partition: &Partition) -> Result<(), StorageError> {
        self.ensure_available(show_id)?;
        LocalStorage::set(storage_key(show_id), partition).map_err(|err| StorageError::Write {
            show_id,
            reason: err.to_string(),
        })
    }

    fn clear(&self, show_id: ShowId) -> Result<(), StorageError> {
        self.ensure_available(show_id)?;
        LocalStorage::delete(storage_key(show_id));
        Ok(())
    }
}

pub fn load_partition<S: SnapshotStore + ?Sized>(
    store: &S,
    show_id: ShowId,
) -> Result<Option<Partition>, StorageError> {
    Ok(store.load(show_id)?.map(Partition::restore))
}

/// Writes the snapshot once. The caller keeps its in-memory partition
/// whether or not this succeeds.
pub fn save_partition<S: SnapshotStore + ?Sized>(
    store: &S,
    show_id: ShowId,
    partition: &Partition,
) -> Result<(), StorageError> {
    store.save(show_id, partition).map_err(|err| {
        warn!("Failed to persist tier list: {}", err);
        err
    })
}

#[cfg(test)]
pub(crate) use memory::MemoryStore;
