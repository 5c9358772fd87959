//! Update function for the mapper session.
//!
//! Elm-style: `update` receives the session and a `Msg`, mutates the session,
//! and returns whether the surface should re-render.
//!
//! Key behaviors
//! - Pointer interactions become pending mappings (`highlight` or `click`);
//!   selections touching markers are rejected.
//! - Choosing a field lands a marker and records a `MappingInstance`. Stale
//!   positions are re-validated or recomputed, and as a last resort the marker
//!   is appended at the end of the document.
//! - Clicking a marker prompts for removal, or removal/replacement when its
//!   field is no longer valid.
//! - Removals and surface syncs keep `instances` and the markup in lockstep.

use super::document::{EditPlan, MappedDocument, Marker};
use super::error::MapperError;
use super::messages::{Msg, ScreenPoint, Selection};
use super::state::{MapperSession, PendingMapping, Phase};
use super::PointResolver;
use crate::helpers::utf16_to_byte_idx;
use crate::model::mapping::{InteractionType, MappingInstance};
use log::{debug, info, warn};

/// Central update function of the mapper.
///
/// Contract
/// - Mutates `session` based on `msg`.
/// - Consults `resolver` only to recompute a stale click position.
/// - Returns `true` when the surface should re-render (or reposition its caret).
pub fn update(session: &mut MapperSession, msg: Msg, resolver: &dyn PointResolver) -> bool {
    match msg {
        Msg::PointerUp { selection, point } => {
            if matches!(
                session.phase,
                Phase::ConfirmRemoval { .. } | Phase::ResolveInvalidMarker { .. }
            ) {
                return false;
            }
            begin_pending(session, selection, Some(point))
        }
        Msg::MarkerClicked { instance_id, .. } => open_marker_prompt(session, &instance_id),
        Msg::FieldChosen(field) => choose_field(session, &field, resolver),
        Msg::Cancel | Msg::Escape | Msg::ClickOutside => {
            let changed = session.phase != Phase::Idle;
            session.phase = Phase::Idle;
            changed
        }
        Msg::ConfirmRemove => match &session.phase {
            Phase::ConfirmRemoval { instance_id } | Phase::ResolveInvalidMarker { instance_id } => {
                let instance_id = instance_id.clone();
                session.phase = Phase::Idle;
                remove_instance(session, &instance_id);
                true
            }
            _ => false,
        },
        Msg::ReplaceMarker => {
            let Phase::ResolveInvalidMarker { instance_id } = &session.phase else {
                return false;
            };
            let instance_id = instance_id.clone();
            let (Some(span), Some(marker)) = (
                session.document.marker_span(&instance_id),
                session.document.marker(&instance_id),
            ) else {
                session.phase = Phase::Idle;
                return true;
            };
            session.phase = Phase::AwaitingFieldChoice(PendingMapping {
                interaction: InteractionType::Highlight,
                start: span.start,
                end: span.end,
                captured_text: marker.original_text.clone(),
                revision: session.document.revision(),
                point: None,
                replacing: Some(instance_id),
            });
            true
        }
        Msg::RemoveInstance(instance_id) => remove_instance(session, &instance_id),
        Msg::RemoveField(field) => {
            let removed = session.document.remove_field(&field);
            session.sync_instances();
            clear_stale_prompt(session);
            info!("Removed {} marker(s) for field '{}'", removed.len(), field);
            !removed.is_empty()
        }
        Msg::CaretMoved(utf16) => {
            let text = session.document.text();
            let requested = utf16_to_byte_idx(&text, utf16);
            let normalized = session.document.normalize_offset(requested);
            session.place_caret(normalized);
            normalized != requested
        }
        Msg::SurfaceSynced(html) => {
            if html == session.document.to_html() {
                return false;
            }
            let revision = session.document.revision();
            session.document = MappedDocument::parse(&html);
            session.document.advance_past(revision);
            session.sync_instances();
            clear_stale_prompt(session);
            debug!("Resynced editor snapshot ({} markers)", session.instances.len());
            true
        }
        Msg::SetValidFields(fields) => {
            session.valid_fields = Some(fields);
            true
        }
    }
}

fn begin_pending(
    session: &mut MapperSession,
    selection: Selection,
    point: Option<ScreenPoint>,
) -> bool {
    let text = session.document.text();
    let start = utf16_to_byte_idx(&text, selection.start);
    let end = utf16_to_byte_idx(&text, selection.end);

    match session.document.plan_edit(start, end) {
        Ok(EditPlan::ClickedMarker(instance_id)) => {
            open_marker_prompt(session, &instance_id)
        }
        Ok(EditPlan::InsertAt(offset)) => {
            session.place_caret(offset);
            session.phase = Phase::AwaitingFieldChoice(PendingMapping {
                interaction: InteractionType::Click,
                start: offset,
                end: offset,
                captured_text: String::new(),
                revision: session.document.revision(),
                point,
                replacing: None,
            });
            true
        }
        Ok(EditPlan::Replace { start, end }) => {
            session.phase = Phase::AwaitingFieldChoice(PendingMapping {
                interaction: InteractionType::Highlight,
                start,
                end,
                captured_text: text[start..end].to_string(),
                revision: session.document.revision(),
                point,
                replacing: None,
            });
            true
        }
        Err(MapperError::SelectionOverlapsMarker) => {
            info!("Selection overlaps an existing marker; ignoring it");
            session.phase = Phase::Idle;
            true
        }
        Err(e) => {
            warn!("Ignoring pointer interaction: {}", e);
            session.phase = Phase::Idle;
            true
        }
    }
}

fn open_marker_prompt(session: &mut MapperSession, instance_id: &str) -> bool {
    let Some(marker) = session.document.marker(instance_id) else {
        warn!("Clicked marker {} is not in the document", instance_id);
        return false;
    };
    let instance_id = instance_id.to_string();
    session.phase = if session.is_field_valid(&marker.field) {
        Phase::ConfirmRemoval { instance_id: instance_id.clone() }
    } else {
        Phase::ResolveInvalidMarker { instance_id: instance_id.clone() }
    };
    match session.document.marker_span(&instance_id) {
        Some(span) => session.place_caret(span.end),
        None => session.caret = None,
    }
    true
}

fn choose_field(session: &mut MapperSession, field: &str, resolver: &dyn PointResolver) -> bool {
    let Phase::AwaitingFieldChoice(pending) = &session.phase else {
        return false;
    };
    let field = field.trim();
    if field.is_empty() {
        return false;
    }
    let pending = pending.clone();
    let marker = Marker::new(field, &pending.captured_text);

    if let Err(e) = place_marker(session, &pending, marker.clone(), resolver) {
        warn!(
            "Marker insertion for '{}' failed ({}); appending it at the end of the document",
            field, e
        );
        session.document.append_marker(marker.clone());
    }

    session.instances.push(MappingInstance {
        instance_id: marker.instance_id.clone(),
        field: marker.field.clone(),
        original_text: marker.original_text.clone(),
        placeholder_markup: marker.to_html(),
        interaction_type: pending.interaction,
    });
    session.sync_instances();
    match session.document.marker_span(&marker.instance_id) {
        Some(span) => session.place_caret(span.end),
        None => session.caret = None,
    }
    session.phase = Phase::Idle;
    info!("Mapped field '{}' ({:?})", field, pending.interaction);
    true
}

/// Lands `marker` where `pending` points, re-validating stale positions.
fn place_marker(
    session: &mut MapperSession,
    pending: &PendingMapping,
    marker: Marker,
    resolver: &dyn PointResolver,
) -> Result<(), MapperError> {
    let document = &mut session.document;
    if let Some(replacing) = &pending.replacing {
        return document.replace_marker(replacing, marker);
    }

    let fresh = pending.revision == document.revision();
    match pending.interaction {
        InteractionType::Highlight => {
            if !fresh
                && document.text_at(pending.start, pending.end).as_deref()
                    != Some(pending.captured_text.as_str())
            {
                return Err(MapperError::StaleRange);
            }
            document.replace_range(pending.start, pending.end, marker)
        }
        InteractionType::Click => {
            let offset = if fresh {
                pending.start
            } else {
                let point = pending.point.ok_or(MapperError::StaleRange)?;
                let utf16 = resolver.offset_at(point).ok_or(MapperError::StaleRange)?;
                debug!("Recomputed stale click position from {:?}", point);
                utf16_to_byte_idx(&document.text(), utf16)
            };
            let offset = document.normalize_offset(offset);
            document.insert_marker(offset, marker)
        }
    }
}

fn remove_instance(session: &mut MapperSession, instance_id: &str) -> bool {
    let removed = session.document.remove_marker(instance_id);
    session.sync_instances();
    clear_stale_prompt(session);
    match removed {
        Some(marker) => {
            info!("Removed marker {} for field '{}'", instance_id, marker.field);
            true
        }
        None => {
            warn!("No marker with instance id {}", instance_id);
            false
        }
    }
}

/// Drops a removal prompt whose marker no longer exists.
fn clear_stale_prompt(session: &mut MapperSession) {
    let target = match &session.phase {
        Phase::ConfirmRemoval { instance_id } | Phase::ResolveInvalidMarker { instance_id } => {
            Some(instance_id.clone())
        }
        Phase::AwaitingFieldChoice(PendingMapping {
            replacing: Some(instance_id),
            ..
        }) => Some(instance_id.clone()),
        _ => None,
    };
    if let Some(instance_id) = target {
        if session.document.marker(&instance_id).is_none() {
            session.phase = Phase::Idle;
        }
    }
}
