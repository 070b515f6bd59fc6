//! Data model definitions for biodata documents.
//!
//! This module defines the document graph stored by the engine: a [`Biodata`]
//! root holding ordered [`BiodataSection`]s, each holding ordered
//! [`BiodataField`]s, plus the presentation descriptors ([`BiodataPhoto`],
//! [`BiodataBackground`], [`CustomStyles`]) and the partial patches accepted by
//! the reducer.
//!
//! Every type serializes with camelCase keys so that a document saved by the
//! engine and a document exported by the browser application share one JSON
//! shape.
//!
//! The free functions at the bottom are pure derivations used by the render
//! pipeline and the host UI. None of them mutate the document.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::templates::TemplateId;

/// Id of the section holding the person's details.
pub const PERSONAL_SECTION_ID: &str = "personal";

/// Id of the name field inside [`PERSONAL_SECTION_ID`].
pub const NAME_FIELD_ID: &str = "name";

/// Shown wherever a display name is needed and none was entered.
pub const DISPLAY_NAME_PLACEHOLDER: &str = "Your Name";

/// The complete user-authored biodata record.
///
/// # Examples
///
/// ```rust
/// use biodata_core::defaults::create_initial_biodata;
///
/// let doc = create_initial_biodata("doc-1", chrono::Utc::now());
/// let json = serde_json::to_string(&doc)?;
/// let back: biodata_core::biodata_model::Biodata = serde_json::from_str(&json)?;
/// assert_eq!(doc, back);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Biodata {
    /// Opaque unique identifier of the document.
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Advanced by every accepted reducer transition.
    pub updated_at: DateTime<Utc>,
    /// Schema version the document was written with.
    pub version: String,
    pub meta: BiodataMeta,
    pub sections: Vec<BiodataSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<BiodataPhoto>,
    pub template_id: TemplateId,
    pub background: BiodataBackground,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_styles: Option<CustomStyles>,
}

impl Biodata {
    pub fn section(&self, section_id: &str) -> Option<&BiodataSection> {
        self.sections.iter().find(|s| s.id == section_id)
    }

    pub fn section_mut(&mut self, section_id: &str) -> Option<&mut BiodataSection> {
        self.sections.iter_mut().find(|s| s.id == section_id)
    }

    pub fn field(&self, section_id: &str, field_id: &str) -> Option<&BiodataField> {
        self.section(section_id).and_then(|s| s.field(field_id))
    }
}

/// Document-level information that is not a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiodataMeta {
    /// Person's name, used for export file names.
    pub name: String,
    pub language: LanguageMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub religious_invocation: Option<ReligiousInvocation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageMode {
    English,
    Hindi,
    Bilingual,
}

/// Invocation line printed above the name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReligiousInvocation {
    pub preset: InvocationPreset,
    /// Only read when `preset` is [`InvocationPreset::Custom`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationPreset {
    Hindu,
    Muslim,
    Christian,
    Sikh,
    Buddhist,
    Jain,
    None,
    Custom,
}

/// A named, ordered group of fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiodataSection {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_hindi: Option<String>,
    /// Icon name understood by the host UI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub fields: Vec<BiodataField>,
    pub order: u32,
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapsible: Option<bool>,
    /// UI-only state, persisted for convenience.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapsed: Option<bool>,
}

impl BiodataSection {
    pub fn field(&self, field_id: &str) -> Option<&BiodataField> {
        self.fields.iter().find(|f| f.id == field_id)
    }

    pub fn field_mut(&mut self, field_id: &str) -> Option<&mut BiodataField> {
        self.fields.iter_mut().find(|f| f.id == field_id)
    }
}

/// A single labeled value slot.
///
/// `value` is always stored as a string; [`FieldType`] only matters when the
/// value is validated or rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiodataField {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_hindi: Option<String>,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Allowed values, meaningful for [`FieldType::Select`] only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<FieldConstraints>,
    pub order: u32,
    pub visible: bool,
    pub editable: bool,
}

/// Closed set of field kinds.
///
/// The wire names follow the browser application (`textarea` is multi-line
/// text, `select` is single-select).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Textarea,
    Select,
    Date,
    Time,
    Email,
    Phone,
    Number,
    Url,
    Image,
}

/// Optional per-field constraint set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldConstraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Replaces the generic failure message of any constraint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiodataPhoto {
    /// Base64 data URL.
    pub url: String,
    pub position: PhotoPosition,
    pub shape: PhotoShape,
    pub size: PhotoSize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border: Option<PhotoBorder>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhotoPosition {
    TopLeft,
    TopCenter,
    TopRight,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoShape {
    Square,
    Rounded,
    Circle,
    Oval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoSize {
    Small,
    Medium,
    Large,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoBorder {
    pub width: u32,
    pub color: String,
    pub style: BorderLineStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderLineStyle {
    Solid,
    Double,
    Dashed,
    Dotted,
}

/// Page background. `value` is read according to `kind`: a hex color, a CSS
/// gradient, an image URL or a pattern name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiodataBackground {
    #[serde(rename = "type")]
    pub kind: BackgroundKind,
    pub value: String,
    /// 0-100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blur: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay: Option<BackgroundOverlay>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundKind {
    Color,
    Gradient,
    Image,
    Pattern,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundOverlay {
    pub color: String,
    pub opacity: u8,
}

/// Per-document overrides layered on top of the selected template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomStyles {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_font: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_font: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<FontScale>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_height: Option<LineHeight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_style: Option<PageBorderStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corner_decoration: Option<CornerDecoration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontScale {
    Small,
    Medium,
    Large,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineHeight {
    Tight,
    Normal,
    Relaxed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageBorderStyle {
    None,
    Simple,
    Double,
    Ornate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CornerDecoration {
    None,
    Floral,
    Paisley,
    Geometric,
}

/// A field as supplied to the add-field action; id and order are assigned by
/// the reducer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewField {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_hindi: Option<String>,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<FieldConstraints>,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_true")]
    pub editable: bool,
}

impl NewField {
    pub fn into_field(self, id: String, order: u32) -> BiodataField {
        BiodataField {
            id,
            label: self.label,
            label_hindi: self.label_hindi,
            field_type: self.field_type,
            value: self.value,
            placeholder: self.placeholder,
            options: self.options,
            validation: self.validation,
            order,
            visible: self.visible,
            editable: self.editable,
        }
    }
}

/// A section as supplied to the add-section action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSection {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_hindi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Initial fields; they keep their ids and get order keys by position.
    #[serde(default)]
    pub fields: Vec<BiodataField>,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapsible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapsed: Option<bool>,
}

/// Partial update of a field's configuration.
///
/// Absent keys leave the field untouched. For optional attributes an explicit
/// `null` clears the attribute. Id and order are not patchable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub label_hindi: Option<Option<String>>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub options: Option<Option<Vec<String>>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub validation: Option<Option<FieldConstraints>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editable: Option<bool>,
}

impl FieldPatch {
    pub fn apply_to(self, field: &mut BiodataField) {
        if let Some(label) = self.label {
            field.label = label;
        }
        if let Some(label_hindi) = self.label_hindi {
            field.label_hindi = label_hindi;
        }
        if let Some(field_type) = self.field_type {
            field.field_type = field_type;
        }
        if let Some(value) = self.value {
            field.value = value;
        }
        if let Some(placeholder) = self.placeholder {
            field.placeholder = placeholder;
        }
        if let Some(options) = self.options {
            field.options = options;
        }
        if let Some(validation) = self.validation {
            field.validation = validation;
        }
        if let Some(visible) = self.visible {
            field.visible = visible;
        }
        if let Some(editable) = self.editable {
            field.editable = editable;
        }
    }
}

/// Partial update of a section. Id, order and the field list are not
/// patchable; fields change through the field actions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub title_hindi: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub icon: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub collapsible: Option<Option<bool>>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub collapsed: Option<Option<bool>>,
}

impl SectionPatch {
    pub fn apply_to(self, section: &mut BiodataSection) {
        if let Some(title) = self.title {
            section.title = title;
        }
        if let Some(title_hindi) = self.title_hindi {
            section.title_hindi = title_hindi;
        }
        if let Some(icon) = self.icon {
            section.icon = icon;
        }
        if let Some(visible) = self.visible {
            section.visible = visible;
        }
        if let Some(collapsible) = self.collapsible {
            section.collapsible = collapsible;
        }
        if let Some(collapsed) = self.collapsed {
            section.collapsed = collapsed;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<LanguageMode>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub religious_invocation: Option<Option<ReligiousInvocation>>,
}

impl MetaPatch {
    pub fn apply_to(self, meta: &mut BiodataMeta) {
        if let Some(name) = self.name {
            meta.name = name;
        }
        if let Some(language) = self.language {
            meta.language = language;
        }
        if let Some(invocation) = self.religious_invocation {
            meta.religious_invocation = invocation;
        }
    }
}

fn default_true() -> bool {
    true
}

// Distinguishes an absent key (None) from an explicit null (Some(None)).
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Visible sections sorted by order key.
pub fn visible_sections(doc: &Biodata) -> Vec<&BiodataSection> {
    let mut sections: Vec<&BiodataSection> = doc.sections.iter().filter(|s| s.visible).collect();
    sections.sort_by_key(|s| s.order);
    sections
}

/// Visible fields with a non-empty value, sorted by order key.
pub fn visible_fields(section: &BiodataSection) -> Vec<&BiodataField> {
    let mut fields: Vec<&BiodataField> = section
        .fields
        .iter()
        .filter(|f| f.visible && !f.value.is_empty())
        .collect();
    fields.sort_by_key(|f| f.order);
    fields
}

/// Value of the `personal`/`name` field, or [`DISPLAY_NAME_PLACEHOLDER`].
pub fn display_name(doc: &Biodata) -> String {
    doc.field(PERSONAL_SECTION_ID, NAME_FIELD_ID)
        .map(|f| f.value.as_str())
        .filter(|v| !v.is_empty())
        .unwrap_or(DISPLAY_NAME_PLACEHOLDER)
        .to_string()
}

/// Display form of a field value.
///
/// Date fields render as `"15 January 1995"`; everything else, including
/// dates that do not parse, is returned verbatim.
pub fn formatted_value(field: &BiodataField) -> String {
    if field.field_type == FieldType::Date && !field.value.is_empty() {
        if let Some(date) = parse_calendar_date(&field.value) {
            return date.format("%-d %B %Y").to_string();
        }
    }
    field.value.clone()
}

/// Parses `YYYY-MM-DD` or a full RFC 3339 timestamp into a calendar date.
pub fn parse_calendar_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(trimmed).ok().map(|dt| dt.date_naive()))
}
