//! Document → page description.
//!
//! [`render_page`] decides *what* appears on the single A4 page and in which
//! order. How it looks is the template's business: swapping templates only
//! changes the [`ResolvedTheme`], never the section and field enumeration.

use log::warn;
use serde::Serialize;

use crate::biodata_model::{
    display_name, formatted_value, visible_fields, visible_sections, Biodata, BiodataBackground,
    BiodataField, BiodataSection, FieldType, LanguageMode, PhotoBorder, PhotoPosition, PhotoShape,
    PhotoSize,
};
use crate::templates::{get_template, invocation_text, ResolvedTheme};

const MM_PER_INCH: f32 = 25.4;
const CSS_DPI: f32 = 96.0;
const PDF_POINTS_PER_INCH: f32 = 72.0;

/// Physical page size in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSize {
    pub width_mm: f32,
    pub height_mm: f32,
}

impl PageSize {
    /// ISO A4 portrait, 210 × 297 mm.
    pub const A4: PageSize = PageSize { width_mm: 210.0, height_mm: 297.0 };

    /// Pixel size at 96 dpi multiplied by `scale`.
    pub fn pixels(&self, scale: f32) -> (u32, u32) {
        let to_px = |mm: f32| (mm / MM_PER_INCH * CSS_DPI * scale).round() as u32;
        (to_px(self.width_mm), to_px(self.height_mm))
    }

    /// Size in PDF points.
    pub fn points(&self) -> (f32, f32) {
        let to_pt = |mm: f32| mm / MM_PER_INCH * PDF_POINTS_PER_INCH;
        (to_pt(self.width_mm), to_pt(self.height_mm))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedPage {
    pub page: PageSize,
    pub scale: f32,
    pub width_px: u32,
    pub height_px: u32,
    pub theme: ResolvedTheme,
    pub background: BiodataBackground,
    pub invocation: Option<String>,
    pub display_name: String,
    pub photo: Option<RenderedPhoto>,
    pub sections: Vec<RenderedSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedPhoto {
    pub url: String,
    pub position: PhotoPosition,
    pub shape: PhotoShape,
    pub size: PhotoSize,
    pub border: Option<PhotoBorder>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedSection {
    pub id: String,
    pub title: String,
    /// Hindi title in bilingual mode.
    pub secondary_title: Option<String>,
    pub rows: Vec<RenderedRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedRow {
    pub field_id: String,
    pub field_type: FieldType,
    pub label: String,
    pub secondary_label: Option<String>,
    pub value: String,
}

/// Builds the page description for `doc` at `scale`.
///
/// Sections whose visible field list is empty are skipped. A non-finite or
/// non-positive scale falls back to 1.
pub fn render_page(doc: &Biodata, scale: f32) -> RenderedPage {
    let scale = if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        warn!("Ignoring invalid render scale {scale}, using 1.0");
        1.0
    };

    let template = get_template(doc.template_id);
    let theme = ResolvedTheme::resolve(template, doc.custom_styles.as_ref());
    let page = PageSize::A4;
    let (width_px, height_px) = page.pixels(scale);
    let language = doc.meta.language;

    let sections = visible_sections(doc)
        .into_iter()
        .filter_map(|section| render_section(section, language))
        .collect();

    let photo = doc.photo.as_ref().map(|photo| RenderedPhoto {
        url: photo.url.clone(),
        position: photo.position,
        shape: photo.shape,
        size: photo.size,
        border: photo.border.clone(),
    });

    RenderedPage {
        page,
        scale,
        width_px,
        height_px,
        theme,
        background: doc.background.clone(),
        invocation: invocation_text(doc.meta.religious_invocation.as_ref()),
        display_name: display_name(doc),
        photo,
        sections,
    }
}

/// The selected template's preferred photo anchor, for a photo being added.
pub fn default_photo_position(doc: &Biodata) -> PhotoPosition {
    get_template(doc.template_id).layout.photo_position
}

fn render_section(section: &BiodataSection, language: LanguageMode) -> Option<RenderedSection> {
    let fields = visible_fields(section);
    if fields.is_empty() {
        return None;
    }

    let (title, secondary_title) = localized(&section.title, section.title_hindi.as_deref(), language);
    let rows = fields.into_iter().map(|field| render_row(field, language)).collect();

    Some(RenderedSection {
        id: section.id.clone(),
        title,
        secondary_title,
        rows,
    })
}

fn render_row(field: &BiodataField, language: LanguageMode) -> RenderedRow {
    let (label, secondary_label) = localized(&field.label, field.label_hindi.as_deref(), language);
    RenderedRow {
        field_id: field.id.clone(),
        field_type: field.field_type,
        label,
        secondary_label,
        value: formatted_value(field),
    }
}

fn localized(primary: &str, hindi: Option<&str>, language: LanguageMode) -> (String, Option<String>) {
    let hindi = hindi.filter(|h| !h.trim().is_empty());
    match language {
        LanguageMode::English => (primary.to_string(), None),
        LanguageMode::Hindi => (hindi.unwrap_or(primary).to_string(), None),
        LanguageMode::Bilingual => (primary.to_string(), hindi.map(str::to_string)),
    }
}
