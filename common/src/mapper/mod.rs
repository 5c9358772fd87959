//! Interactive field mapper.
//!
//! Lets an operator bind regions of template HTML to data fields, either by
//! highlighting text (the selection is replaced by a marker) or by clicking a
//! position (a marker is inserted there). The editing surface itself lives
//! elsewhere; this module owns the state it drives:
//!
//! - `document`: the parsed text/markup/marker model and every position rule;
//! - `messages` / `state` / `update`: an Elm-style session (`Msg` in,
//!   mutated `MapperSession` out, `bool` to request a re-render);
//! - `repair`: the token -> field repair workflow for blocked uploads.
//!
//! Positions crossing the boundary are UTF-16 code units of the plain text,
//! matching what browser selection APIs report.

pub mod document;
pub mod error;
pub mod messages;
pub mod repair;
pub mod state;
pub mod update;

pub use document::{placeholder_literals, EditPlan, MappedDocument, Marker, MarkerSpan, Node};
pub use error::MapperError;
pub use messages::{Msg, ScreenPoint, Selection};
pub use repair::{RepairEntry, RepairSession};
pub use state::{MapperSession, PendingMapping, Phase};
pub use update::update;

use crate::model::mapping::TemplateFieldMapping;

/// Maps a screen point back to a plain-text position (UTF-16 units).
///
/// Consulted when a click was captured against an older document revision.
pub trait PointResolver {
    fn offset_at(&self, point: ScreenPoint) -> Option<usize>;
}

/// Resolver for headless sessions: never recovers a position.
pub struct NoPointResolver;

impl PointResolver for NoPointResolver {
    fn offset_at(&self, _point: ScreenPoint) -> Option<usize> {
        None
    }
}

impl<F> PointResolver for F
where
    F: Fn(ScreenPoint) -> Option<usize>,
{
    fn offset_at(&self, point: ScreenPoint) -> Option<usize> {
        self(point)
    }
}

impl MapperSession {
    pub fn update(&mut self, msg: Msg, resolver: &dyn PointResolver) -> bool {
        update::update(self, msg, resolver)
    }

    /// Final HTML and mapping for persistence.
    ///
    /// Every `{{literal}}` left in the HTML gets an entry: markers map to
    /// their own field, other literals keep their loaded mapping or map to
    /// themselves.
    pub fn commit(&self) -> (String, TemplateFieldMapping) {
        let html = self.document.to_html();
        let mut mapping: TemplateFieldMapping = placeholder_literals(&html)
            .into_iter()
            .map(|literal| {
                let field = self
                    .base_mapping
                    .get(&literal)
                    .cloned()
                    .unwrap_or_else(|| literal.clone());
                (literal, field)
            })
            .collect();
        for marker in self.document.markers() {
            mapping.insert(marker.field.clone(), marker.field.clone());
        }
        (html, mapping)
    }
}
