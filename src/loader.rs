use crate::data::{fetch_all_episodes, ProviderError, ShowId, ShowProvider, ShowSelection};
use crate::state::AppAction;
use crate::storage::{load_partition, SnapshotStore, StorageError};
use crate::tiers::Partition;
use log::{error, info};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Loads `show_id` and reports every step through `dispatch`. Failures end in
/// a single `LoadFailed`; their detail only reaches the log.
pub async fn load_show<P, S, F>(provider: &P, store: &S, show_id: ShowId, dispatch: F)
where
    P: ShowProvider + ?Sized,
    S: SnapshotStore + ?Sized,
    F: Fn(AppAction),
{
    dispatch(AppAction::LoadStarted(show_id));

    match fetch_partition(provider, store, show_id, &dispatch).await {
        Ok(partition) => dispatch(AppAction::PartitionLoaded { show_id, partition }),
        Err(err) => {
            error!("Loading show {} failed: {}", show_id, err);
            dispatch(AppAction::LoadFailed(show_id));
        }
    }
}

async fn fetch_partition<P, S, F>(
    provider: &P,
    store: &S,
    show_id: ShowId,
    dispatch: &F,
) -> Result<Partition, LoadError>
where
    P: ShowProvider + ?Sized,
    S: SnapshotStore + ?Sized,
    F: Fn(AppAction),
{
    let details = provider.show_details(show_id).await?;
    dispatch(AppAction::SummaryLoaded(ShowSelection::from(&details)));

    if let Some(snapshot) = load_partition(store, show_id)? {
        info!("Restored saved tier list for show {}", show_id);
        return Ok(snapshot);
    }

    let episodes = fetch_all_episodes(provider, &details).await?;
    Ok(Partition::initialize(episodes))
}

/// Drops the saved snapshot and rebuilds the board from a fresh fetch.
pub async fn reset_show<P, S, F>(provider: &P, store: &S, show_id: ShowId, dispatch: F)
where
    P: ShowProvider + ?Sized,
    S: SnapshotStore + ?Sized,
    F: Fn(AppAction),
{
    if let Err(err) = store.clear(show_id) {
        error!("Reset of show {} failed: {}", show_id, err);
        dispatch(AppAction::PersistFailed(
            "Could not reset the saved tier list.".to_string(),
        ));
        return;
    }
    load_show(provider, store, show_id, dispatch).await;
}
