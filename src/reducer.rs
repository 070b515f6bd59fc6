//! The closed set of document operations and the pure transition function.
//!
//! [`reduce`] never reads a clock or generates ids itself: the caller passes
//! both in a [`Transition`], which keeps every transition reproducible in
//! tests. A rejected action returns an [`ActionError`] and produces no new
//! document.
//!
//! Order keys: additions take `max + 1`, removals and reorders rewrite the
//! remaining keys to `0..n-1`.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::biodata_model::{
    Biodata, BiodataBackground, BiodataField, BiodataPhoto, BiodataSection, CustomStyles,
    FieldPatch, MetaPatch, NewField, NewSection, SectionPatch,
};
use crate::defaults::create_initial_biodata;
use crate::error::ActionError;
use crate::reorder::is_permutation;
use crate::templates::TemplateId;

/// Named document operations, tagged by `type` on the wire.
///
/// ```rust
/// use biodata_core::reducer::Action;
///
/// let action: Action = serde_json::from_str(
///     r#"{"type":"UPDATE_FIELD","sectionId":"personal","fieldId":"name","value":"Asha"}"#,
/// )?;
/// assert!(matches!(action, Action::UpdateField { .. }));
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum Action {
    UpdateField {
        section_id: String,
        field_id: String,
        value: String,
    },
    AddField {
        section_id: String,
        field: NewField,
    },
    RemoveField {
        section_id: String,
        field_id: String,
    },
    UpdateFieldConfig {
        section_id: String,
        field_id: String,
        config: FieldPatch,
    },
    AddSection {
        section: NewSection,
    },
    RemoveSection {
        section_id: String,
    },
    UpdateSection {
        section_id: String,
        updates: SectionPatch,
    },
    ReorderSections {
        section_ids: Vec<String>,
    },
    ReorderFields {
        section_id: String,
        field_ids: Vec<String>,
    },
    SetTemplate {
        template_id: TemplateId,
    },
    SetBackground {
        background: BiodataBackground,
    },
    SetPhoto {
        #[serde(default)]
        photo: Option<BiodataPhoto>,
    },
    SetCustomStyles {
        #[serde(default)]
        styles: Option<CustomStyles>,
    },
    UpdateMeta {
        meta: MetaPatch,
    },
    ImportData {
        data: Box<Biodata>,
    },
    Reset,
}

impl Action {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Action::UpdateField { .. } => "UPDATE_FIELD",
            Action::AddField { .. } => "ADD_FIELD",
            Action::RemoveField { .. } => "REMOVE_FIELD",
            Action::UpdateFieldConfig { .. } => "UPDATE_FIELD_CONFIG",
            Action::AddSection { .. } => "ADD_SECTION",
            Action::RemoveSection { .. } => "REMOVE_SECTION",
            Action::UpdateSection { .. } => "UPDATE_SECTION",
            Action::ReorderSections { .. } => "REORDER_SECTIONS",
            Action::ReorderFields { .. } => "REORDER_FIELDS",
            Action::SetTemplate { .. } => "SET_TEMPLATE",
            Action::SetBackground { .. } => "SET_BACKGROUND",
            Action::SetPhoto { .. } => "SET_PHOTO",
            Action::SetCustomStyles { .. } => "SET_CUSTOM_STYLES",
            Action::UpdateMeta { .. } => "UPDATE_META",
            Action::ImportData { .. } => "IMPORT_DATA",
            Action::Reset => "RESET",
        }
    }
}

/// Inputs a transition needs from outside the document.
#[derive(Debug, Clone)]
pub struct Transition {
    pub now: DateTime<Utc>,
    /// Used by actions that create an entity (add field, add section, reset).
    pub fresh_id: String,
}

/// Applies `action` to `state`, returning the next document.
pub fn reduce(state: &Biodata, action: Action, transition: Transition) -> Result<Biodata, ActionError> {
    let Transition { now, fresh_id } = transition;

    let mut next = match action {
        Action::ImportData { data } => {
            check_identity_invariants(&data)?;
            *data
        }
        Action::Reset => create_initial_biodata(fresh_id, now),
        other => {
            let mut next = state.clone();
            apply_edit(&mut next, other, fresh_id)?;
            next
        }
    };

    next.updated_at = now;
    Ok(next)
}

fn apply_edit(doc: &mut Biodata, action: Action, fresh_id: String) -> Result<(), ActionError> {
    match action {
        Action::UpdateField { section_id, field_id, value } => {
            field_mut(doc, &section_id, &field_id)?.value = value;
        }

        Action::AddField { section_id, field } => {
            let section = section_mut(doc, &section_id)?;
            if section.field(&fresh_id).is_some() {
                return Err(ActionError::DuplicateId(fresh_id));
            }
            let order = next_order(section.fields.iter().map(|f| f.order));
            section.fields.push(field.into_field(fresh_id, order));
        }

        Action::RemoveField { section_id, field_id } => {
            let section = section_mut(doc, &section_id)?;
            let before = section.fields.len();
            section.fields.retain(|f| f.id != field_id);
            if section.fields.len() == before {
                return Err(ActionError::FieldNotFound { section_id, field_id });
            }
            normalize_field_order(&mut section.fields);
        }

        Action::UpdateFieldConfig { section_id, field_id, config } => {
            config.apply_to(field_mut(doc, &section_id, &field_id)?);
        }

        Action::AddSection { section } => {
            if doc.section(&fresh_id).is_some() {
                return Err(ActionError::DuplicateId(fresh_id));
            }
            let order = next_order(doc.sections.iter().map(|s| s.order));
            let new_section = build_section(section, fresh_id, order)?;
            doc.sections.push(new_section);
        }

        Action::RemoveSection { section_id } => {
            let before = doc.sections.len();
            doc.sections.retain(|s| s.id != section_id);
            if doc.sections.len() == before {
                return Err(ActionError::SectionNotFound(section_id));
            }
            normalize_section_order(&mut doc.sections);
        }

        Action::UpdateSection { section_id, updates } => {
            updates.apply_to(section_mut(doc, &section_id)?);
        }

        Action::ReorderSections { section_ids } => {
            let current: Vec<&str> = doc.sections.iter().map(|s| s.id.as_str()).collect();
            if !is_permutation(&current, &section_ids) {
                return Err(ActionError::NotAPermutation(section_ids.join(",")));
            }
            let mut remaining = std::mem::take(&mut doc.sections);
            for (position, id) in section_ids.iter().enumerate() {
                if let Some(index) = remaining.iter().position(|s| &s.id == id) {
                    let mut section = remaining.swap_remove(index);
                    section.order = position as u32;
                    doc.sections.push(section);
                }
            }
        }

        Action::ReorderFields { section_id, field_ids } => {
            let section = section_mut(doc, &section_id)?;
            let current: Vec<&str> = section.fields.iter().map(|f| f.id.as_str()).collect();
            if !is_permutation(&current, &field_ids) {
                return Err(ActionError::NotAPermutation(field_ids.join(",")));
            }
            let mut remaining = std::mem::take(&mut section.fields);
            for (position, id) in field_ids.iter().enumerate() {
                if let Some(index) = remaining.iter().position(|f| &f.id == id) {
                    let mut field = remaining.swap_remove(index);
                    field.order = position as u32;
                    section.fields.push(field);
                }
            }
        }

        Action::SetTemplate { template_id } => doc.template_id = template_id,
        Action::SetBackground { background } => doc.background = background,
        Action::SetPhoto { photo } => doc.photo = photo,
        Action::SetCustomStyles { styles } => doc.custom_styles = styles,
        Action::UpdateMeta { meta } => meta.apply_to(&mut doc.meta),

        // Whole-document replacements are handled by `reduce`.
        Action::ImportData { .. } | Action::Reset => {}
    }
    Ok(())
}

/// Section ids unique in the document, field ids unique in their section.
pub fn check_identity_invariants(doc: &Biodata) -> Result<(), ActionError> {
    let mut section_ids = HashSet::new();
    for section in &doc.sections {
        if !section_ids.insert(section.id.as_str()) {
            return Err(ActionError::DuplicateId(section.id.clone()));
        }
        let mut field_ids = HashSet::new();
        for field in &section.fields {
            if !field_ids.insert(field.id.as_str()) {
                return Err(ActionError::DuplicateId(format!("{}/{}", section.id, field.id)));
            }
        }
    }
    Ok(())
}

fn build_section(section: NewSection, id: String, order: u32) -> Result<BiodataSection, ActionError> {
    let mut seen = HashSet::new();
    for field in &section.fields {
        if !seen.insert(field.id.as_str()) {
            return Err(ActionError::DuplicateId(format!("{id}/{}", field.id)));
        }
    }

    let fields = section
        .fields
        .into_iter()
        .enumerate()
        .map(|(position, mut field)| {
            field.order = position as u32;
            field
        })
        .collect();

    Ok(BiodataSection {
        id,
        title: section.title,
        title_hindi: section.title_hindi,
        icon: section.icon,
        fields,
        order,
        visible: section.visible,
        collapsible: section.collapsible,
        collapsed: section.collapsed,
    })
}

fn next_order(orders: impl Iterator<Item = u32>) -> u32 {
    orders.max().map_or(0, |max| max + 1)
}

fn normalize_section_order(sections: &mut [BiodataSection]) {
    sections.sort_by_key(|s| s.order);
    for (position, section) in sections.iter_mut().enumerate() {
        section.order = position as u32;
    }
}

fn normalize_field_order(fields: &mut [BiodataField]) {
    fields.sort_by_key(|f| f.order);
    for (position, field) in fields.iter_mut().enumerate() {
        field.order = position as u32;
    }
}

fn section_mut<'a>(doc: &'a mut Biodata, section_id: &str) -> Result<&'a mut BiodataSection, ActionError> {
    doc.section_mut(section_id)
        .ok_or_else(|| ActionError::SectionNotFound(section_id.to_string()))
}

fn field_mut<'a>(
    doc: &'a mut Biodata,
    section_id: &str,
    field_id: &str,
) -> Result<&'a mut BiodataField, ActionError> {
    section_mut(doc, section_id)?
        .field_mut(field_id)
        .ok_or_else(|| ActionError::FieldNotFound {
            section_id: section_id.to_string(),
            field_id: field_id.to_string(),
        })
}
