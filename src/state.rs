use crate::data::{ShowId, ShowSelection};
use crate::dragflow::{DragInput, DragSession};
use crate::tiers::{MoveOutcome, Partition};
use log::{debug, info};
use std::collections::BTreeSet;
use std::rc::Rc;
use yew::Reducible;

pub const LOAD_FAILED_MESSAGE: &str =
    "Failed to load episodes. Check the link or try another show.";
pub const EXPORT_FAILED_MESSAGE: &str = "Could not export the tier list image.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadStatus {
    #[default]
    Idle,
    LoadingShow,
    LoadingEpisodes,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Error(String),
    Warning(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppAction {
    LoadStarted(ShowId),
    SummaryLoaded(ShowSelection),
    PartitionLoaded { show_id: ShowId, partition: Partition },
    LoadFailed(ShowId),
    InvalidInput(String),
    Drag(DragInput),
    PersistFailed(String),
    ToggleSeason(u32),
    DismissNotice,
    ExportStarted,
    ExportFinished(Result<(), String>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    pub selection: Option<ShowSelection>,
    pub status: LoadStatus,
    /// Show whose load results are still accepted.
    pub pending: Option<ShowId>,
    pub partition: Partition,
    /// Bumped whenever `partition` changes; drives saving.
    pub revision: u64,
    pub drag: DragSession,
    pub notice: Option<Notice>,
    pub collapsed_seasons: BTreeSet<u32>,
    pub exporting: bool,
}

impl AppState {
    pub fn is_loading(&self) -> bool {
        matches!(self.status, LoadStatus::LoadingShow | LoadStatus::LoadingEpisodes)
    }

    /// The show whose partition should be written to storage right now.
    pub fn persist_target(&self) -> Option<ShowId> {
        match (&self.selection, self.status) {
            (Some(selection), LoadStatus::Ready) => Some(selection.id),
            _ => None,
        }
    }

    fn accepts(&self, show_id: ShowId) -> bool {
        self.pending == Some(show_id)
    }

    pub fn apply(mut self, action: AppAction) -> Self {
        match action {
            AppAction::LoadStarted(show_id) => {
                info!("Loading show {}", show_id);
                self = AppState {
                    status: LoadStatus::LoadingShow,
                    pending: Some(show_id),
                    revision: self.revision + 1,
                    exporting: self.exporting,
                    ..AppState::default()
                };
            }
            AppAction::SummaryLoaded(selection) => {
                if self.accepts(selection.id) {
                    self.selection = Some(selection);
                    self.status = LoadStatus::LoadingEpisodes;
                } else {
                    debug!("Ignoring summary for superseded show {}", selection.id);
                }
            }
            AppAction::PartitionLoaded { show_id, partition } => {
                if self.accepts(show_id) {
                    info!(
                        "Show {} ready with {} episodes",
                        show_id,
                        partition.episode_count()
                    );
                    self.partition = partition;
                    self.revision += 1;
                    self.status = LoadStatus::Ready;
                    self.pending = None;
                } else {
                    debug!("Ignoring partition for superseded show {}", show_id);
                }
            }
            AppAction::LoadFailed(show_id) => {
                if self.accepts(show_id) {
                    self = AppState {
                        notice: Some(Notice::Error(LOAD_FAILED_MESSAGE.to_string())),
                        revision: self.revision + 1,
                        exporting: self.exporting,
                        ..AppState::default()
                    };
                }
            }
            AppAction::InvalidInput(message) => {
                self.notice = Some(Notice::Error(message));
            }
            AppAction::Drag(input) => {
                let (drag, request) = self.drag.transition(input);
                self.drag = drag;
                if let Some(request) = request {
                    if self.status == LoadStatus::Ready
                        && self.partition.move_episode(&request) == MoveOutcome::Moved
                    {
                        self.revision += 1;
                    }
                }
            }
            AppAction::PersistFailed(message) => {
                self.notice = Some(Notice::Warning(message));
            }
            AppAction::ToggleSeason(season) => {
                if !self.collapsed_seasons.remove(&season) {
                    self.collapsed_seasons.insert(season);
                }
            }
            AppAction::DismissNotice => {
                self.notice = None;
            }
            AppAction::ExportStarted => {
                self.exporting = true;
            }
            AppAction::ExportFinished(result) => {
                self.exporting = false;
                if let Err(message) = result {
                    self.notice = Some(Notice::Error(message));
                }
            }
        }
        self
    }
}

impl Reducible for AppState {
    type Action = AppAction;

    fn reduce(self: Rc<Self>, action: Self::Action) -> Rc<Self> {
        Rc::new((*self).clone().apply(action))
    }
}
