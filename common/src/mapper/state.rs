//! Session state for the interactive field mapper.
//!
//! One session covers one operator editing one template. Everything here is
//! in memory only: dropping the session discards unsaved mapping instances.

use super::document::{MappedDocument, MarkerSpan};
use super::messages::ScreenPoint;
use crate::helpers::byte_to_utf16_idx;
use crate::model::mapping::{InteractionType, MappingInstance, TemplateFieldMapping};
use std::collections::HashSet;

/// A captured interaction waiting for the operator to pick a field.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMapping {
    pub interaction: InteractionType,
    /// Byte offsets into the plain text at capture time.
    pub start: usize,
    pub end: usize,
    /// Text under the selection at capture time (empty for clicks).
    pub captured_text: String,
    /// Document revision the offsets belong to.
    pub revision: u64,
    /// Where the chooser is anchored; also used to recompute stale click positions.
    pub point: Option<ScreenPoint>,
    /// Instance being replaced, for the "fix invalid marker" flow.
    pub replacing: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Idle,
    AwaitingFieldChoice(PendingMapping),
    /// A valid marker was clicked; the operator may remove it.
    ConfirmRemoval { instance_id: String },
    /// An invalid marker was clicked; the operator may remove or replace it.
    ResolveInvalidMarker { instance_id: String },
}

/// Main state container of a mapping session.
pub struct MapperSession {
    pub document: MappedDocument,
    /// Active bindings; always mirrors the markers in `document`.
    pub instances: Vec<MappingInstance>,
    pub phase: Phase,
    /// `None` until the schema registry has been consulted; then every field
    /// outside the set is treated as invalid.
    pub valid_fields: Option<HashSet<String>>,
    /// Caret position in UTF-16 code units of the plain text, never inside a marker.
    pub caret: Option<usize>,
    /// Mapping loaded with the template, for literals that are not markers.
    pub base_mapping: TemplateFieldMapping,
}

impl MapperSession {
    /// Starts a session over template HTML, adopting the markers it already contains.
    pub fn new(html: &str, base_mapping: TemplateFieldMapping) -> Self {
        let mut session = Self {
            document: MappedDocument::parse(html),
            instances: Vec::new(),
            phase: Phase::Idle,
            valid_fields: None,
            caret: None,
            base_mapping,
        };
        session.sync_instances();
        session
    }

    /// Moves the caret to a byte offset of the plain text.
    pub(crate) fn place_caret(&mut self, byte_offset: usize) {
        let text = self.document.text();
        self.caret = Some(byte_to_utf16_idx(&text, byte_offset));
    }

    /// Marker positions for the surface, in UTF-16 code units.
    pub fn marker_layout(&self) -> Vec<MarkerSpan> {
        let text = self.document.text();
        self.document
            .marker_layout()
            .into_iter()
            .map(|span| MarkerSpan {
                start: byte_to_utf16_idx(&text, span.start),
                end: byte_to_utf16_idx(&text, span.end),
                ..span
            })
            .collect()
    }

    pub fn is_field_valid(&self, field: &str) -> bool {
        self.valid_fields
            .as_ref()
            .is_none_or(|fields| fields.contains(field))
    }

    /// Re-aligns `instances` with the markers actually present in the document.
    ///
    /// Instances whose marker vanished are dropped; markers without an instance
    /// (e.g. loaded from saved HTML) get one.
    pub fn sync_instances(&mut self) {
        let present: HashSet<String> = self
            .document
            .markers()
            .map(|m| m.instance_id.clone())
            .collect();
        self.instances.retain(|i| present.contains(&i.instance_id));

        let known: HashSet<String> = self.instances.iter().map(|i| i.instance_id.clone()).collect();
        let adopted: Vec<MappingInstance> = self
            .document
            .markers()
            .filter(|m| !known.contains(&m.instance_id))
            .map(|m| MappingInstance {
                instance_id: m.instance_id.clone(),
                field: m.field.clone(),
                original_text: m.original_text.clone(),
                placeholder_markup: m.to_html(),
                interaction_type: if m.original_text.is_empty() {
                    InteractionType::Click
                } else {
                    InteractionType::Highlight
                },
            })
            .collect();
        self.instances.extend(adopted);
    }

    /// Instances whose field is not valid in the current registry snapshot.
    pub fn invalid_instances(&self) -> Vec<&MappingInstance> {
        self.instances
            .iter()
            .filter(|i| !self.is_field_valid(&i.field))
            .collect()
    }
}
