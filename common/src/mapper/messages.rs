use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A position on screen, as last reported by the rendering layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

/// A selection reported by the editing surface, in UTF-16 code units of the
/// document's plain text. `start == end` is a collapsed cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

impl Selection {
    pub fn caret(at: usize) -> Self {
        Self { start: at, end: at }
    }

    pub fn range(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Events the editing surface feeds into a [`super::MapperSession`].
#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Pointer released (or click) on the editable region, not on a marker.
    PointerUp { selection: Selection, point: ScreenPoint },
    /// An existing marker was clicked.
    MarkerClicked { instance_id: String, point: ScreenPoint },
    /// The operator picked a field in the chooser.
    FieldChosen(String),
    Cancel,
    Escape,
    /// A click landed outside both the editable region and the chooser.
    ClickOutside,
    /// Confirms the pending removal prompt.
    ConfirmRemove,
    /// Chooses "replace" for an invalid marker.
    ReplaceMarker,
    RemoveInstance(String),
    RemoveField(String),
    /// The caret moved (keyboard navigation, programmatic focus).
    CaretMoved(usize),
    /// Debounced snapshot of the live surface after edits.
    SurfaceSynced(String),
    /// Field names currently valid in the schema registry.
    SetValidFields(HashSet<String>),
}
