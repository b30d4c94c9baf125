use crate::data::Episode;
use crate::tiers::{EpisodeMove, Location};

#[derive(Debug, Clone, PartialEq)]
pub struct DragItem {
    pub episode: Episode,
    pub source: Location,
    pub pointer_id: i32,
    pub position: (f64, f64),
    /// Drop target under the pointer, if any.
    pub over: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DragSession {
    #[default]
    Idle,
    Dragging(DragItem),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DragInput {
    Start {
        episode: Episode,
        source: Location,
        pointer_id: i32,
        position: (f64, f64),
    },
    Move {
        pointer_id: i32,
        position: (f64, f64),
        over: Option<Location>,
    },
    End {
        pointer_id: i32,
        over: Option<Location>,
    },
    Cancel {
        pointer_id: i32,
    },
}

impl DragSession {
    pub fn item(&self) -> Option<&DragItem> {
        match self {
            DragSession::Idle => None,
            DragSession::Dragging(item) => Some(item),
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self, DragSession::Dragging(_))
    }

    pub fn hovered(&self) -> Option<&Location> {
        self.item().and_then(|item| item.over.as_ref())
    }

    /// Advances the session. The second value is the move to apply to the
    /// partition when the gesture ended over a drop target.
    pub fn transition(&self, input: DragInput) -> (DragSession, Option<EpisodeMove>) {
        match (self, input) {
            (
                DragSession::Idle,
                DragInput::Start {
                    episode,
                    source,
                    pointer_id,
                    position,
                },
            ) => (
                DragSession::Dragging(DragItem {
                    episode,
                    over: Some(source.clone()),
                    source,
                    pointer_id,
                    position,
                }),
                None,
            ),
            (
                DragSession::Dragging(item),
                DragInput::Move {
                    pointer_id,
                    position,
                    over,
                },
            ) if item.pointer_id == pointer_id => (
                DragSession::Dragging(DragItem {
                    position,
                    over,
                    ..item.clone()
                }),
                None,
            ),
            (DragSession::Dragging(item), DragInput::End { pointer_id, over })
                if item.pointer_id == pointer_id =>
            {
                let request = over.map(|to| EpisodeMove {
                    episode_id: item.episode.id,
                    from: item.source.clone(),
                    to,
                });
                (DragSession::Idle, request)
            }
            (DragSession::Dragging(item), DragInput::Cancel { pointer_id })
                if item.pointer_id == pointer_id =>
            {
                (DragSession::Idle, None)
            }
            // A second pointer, or input for a gesture that is not ours.
            (current, _) => (current.clone(), None),
        }
    }
}
