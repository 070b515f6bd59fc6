//! Static template catalogue and invocation presets.
//!
//! Templates are read-only reference data: a document only stores the
//! [`TemplateId`]. The render pipeline resolves the id with [`get_template`]
//! and layers the document's [`CustomStyles`] on top with
//! [`ResolvedTheme::resolve`].

use serde::{Deserialize, Serialize};

use crate::biodata_model::{CustomStyles, InvocationPreset, PhotoPosition, ReligiousInvocation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateId {
    #[default]
    Classic,
    Modern,
    Elegant,
    Royal,
}

pub const DEFAULT_TEMPLATE_ID: TemplateId = TemplateId::Classic;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplatePalette {
    pub primary: &'static str,
    pub secondary: &'static str,
    pub accent: &'static str,
    pub background: &'static str,
    pub text: &'static str,
    pub border: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateFonts {
    pub heading: &'static str,
    pub body: &'static str,
    pub accent: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionStyle {
    Card,
    Divider,
    Minimal,
    Ornate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderAlignment {
    Centered,
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateLayout {
    pub photo_position: PhotoPosition,
    pub section_style: SectionStyle,
    pub header_style: HeaderAlignment,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: TemplateId,
    pub name: &'static str,
    pub description: &'static str,
    pub thumbnail: &'static str,
    pub colors: TemplatePalette,
    pub fonts: TemplateFonts,
    pub layout: TemplateLayout,
}

static CLASSIC: Template = Template {
    id: TemplateId::Classic,
    name: "Classic Traditional",
    description: "A timeless design with traditional borders and elegant serif fonts",
    thumbnail: "/templates/classic-thumb.png",
    colors: TemplatePalette {
        primary: "#8B1538",
        secondary: "#D4A84B",
        accent: "#FF6B35",
        background: "#FFF9F0",
        text: "#2D1810",
        border: "#D4A84B",
    },
    fonts: TemplateFonts {
        heading: "Playfair Display, serif",
        body: "Noto Sans, sans-serif",
        accent: Some("Noto Serif, serif"),
    },
    layout: TemplateLayout {
        photo_position: PhotoPosition::TopRight,
        section_style: SectionStyle::Divider,
        header_style: HeaderAlignment::Centered,
    },
};

static MODERN: Template = Template {
    id: TemplateId::Modern,
    name: "Modern Minimal",
    description: "Clean, contemporary design with subtle colors and clear typography",
    thumbnail: "/templates/modern-thumb.png",
    colors: TemplatePalette {
        primary: "#1E3A8A",
        secondary: "#4B5563",
        accent: "#D4A84B",
        background: "#FFFFFF",
        text: "#1F2937",
        border: "#E5E7EB",
    },
    fonts: TemplateFonts {
        heading: "Noto Sans, sans-serif",
        body: "Noto Sans, sans-serif",
        accent: None,
    },
    layout: TemplateLayout {
        photo_position: PhotoPosition::TopLeft,
        section_style: SectionStyle::Card,
        header_style: HeaderAlignment::Left,
    },
};

static ELEGANT: Template = Template {
    id: TemplateId::Elegant,
    name: "Elegant Gold",
    description: "Luxurious design with gold accents and decorative elements",
    thumbnail: "/templates/elegant-thumb.png",
    colors: TemplatePalette {
        primary: "#D4A84B",
        secondary: "#8B1538",
        accent: "#E5C268",
        background: "#FFFFF0",
        text: "#2D1810",
        border: "#D4A84B",
    },
    fonts: TemplateFonts {
        heading: "Playfair Display, serif",
        body: "Noto Serif, serif",
        accent: Some("Playfair Display, serif"),
    },
    layout: TemplateLayout {
        photo_position: PhotoPosition::TopCenter,
        section_style: SectionStyle::Ornate,
        header_style: HeaderAlignment::Centered,
    },
};

static ROYAL: Template = Template {
    id: TemplateId::Royal,
    name: "Royal Heritage",
    description: "Rich, regal design inspired by royal Indian aesthetics",
    thumbnail: "/templates/royal-thumb.png",
    colors: TemplatePalette {
        primary: "#6B0F2A",
        secondary: "#D4A84B",
        accent: "#006B5A",
        background: "#FFF8E7",
        text: "#2D1810",
        border: "#6B0F2A",
    },
    fonts: TemplateFonts {
        heading: "Playfair Display, serif",
        body: "Noto Sans, sans-serif",
        accent: Some("Noto Serif, serif"),
    },
    layout: TemplateLayout {
        photo_position: PhotoPosition::TopCenter,
        section_style: SectionStyle::Ornate,
        header_style: HeaderAlignment::Centered,
    },
};

/// Every template, in selection-list order.
pub fn template_list() -> [&'static Template; 4] {
    [&CLASSIC, &MODERN, &ELEGANT, &ROYAL]
}

pub fn get_template(id: TemplateId) -> &'static Template {
    match id {
        TemplateId::Classic => &CLASSIC,
        TemplateId::Modern => &MODERN,
        TemplateId::Elegant => &ELEGANT,
        TemplateId::Royal => &ROYAL,
    }
}

/// Template palette and fonts after applying per-document overrides.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTheme {
    pub template_id: TemplateId,
    pub primary_color: String,
    pub secondary_color: String,
    pub accent_color: String,
    pub background_color: String,
    pub text_color: String,
    pub border_color: String,
    pub heading_font: String,
    pub body_font: String,
    pub accent_font: Option<String>,
    pub section_style: SectionStyle,
    pub header_style: HeaderAlignment,
    /// Overrides with no template counterpart pass through untouched.
    pub extras: CustomStyles,
}

impl ResolvedTheme {
    /// Overrides win field by field; anything unset falls back to the template.
    pub fn resolve(template: &Template, overrides: Option<&CustomStyles>) -> Self {
        let empty = CustomStyles::default();
        let o = overrides.unwrap_or(&empty);
        let pick = |over: &Option<String>, base: &str| over.clone().unwrap_or_else(|| base.to_string());

        Self {
            template_id: template.id,
            primary_color: pick(&o.primary_color, template.colors.primary),
            secondary_color: pick(&o.secondary_color, template.colors.secondary),
            accent_color: pick(&o.accent_color, template.colors.accent),
            background_color: pick(&o.background_color, template.colors.background),
            text_color: pick(&o.text_color, template.colors.text),
            border_color: pick(&o.border_color, template.colors.border),
            heading_font: pick(&o.heading_font, template.fonts.heading),
            body_font: pick(&o.body_font, template.fonts.body),
            accent_font: template.fonts.accent.map(str::to_string),
            section_style: template.layout.section_style,
            header_style: template.layout.header_style,
            extras: CustomStyles {
                font_size: o.font_size,
                line_height: o.line_height,
                border_style: o.border_style,
                border_width: o.border_width,
                corner_decoration: o.corner_decoration,
                ..CustomStyles::default()
            },
        }
    }
}

/// Fixed invocation line for a faith preset; `None` for `none` and `custom`.
pub fn preset_invocation(preset: InvocationPreset) -> Option<&'static str> {
    match preset {
        InvocationPreset::Hindu => Some("॥ श्री गणेशाय नमः ॥"),
        InvocationPreset::Muslim => Some("بِسْمِ اللَّهِ الرَّحْمَنِ الرَّحِيم"),
        InvocationPreset::Christian => Some("✝ In the name of the Father, Son, and Holy Spirit ✝"),
        InvocationPreset::Sikh => Some("ੴ ਵਾਹਿਗੁਰੂ ਜੀ ਕੀ ਫਤਹਿ"),
        InvocationPreset::Buddhist => Some("☸ May all beings be happy ☸"),
        InvocationPreset::Jain => Some("णमो अरिहंताणं"),
        InvocationPreset::None | InvocationPreset::Custom => None,
    }
}

pub fn invocation_label(preset: InvocationPreset) -> &'static str {
    match preset {
        InvocationPreset::Hindu => "Hindu (Shri Ganeshaya Namah)",
        InvocationPreset::Muslim => "Muslim (Bismillah)",
        InvocationPreset::Christian => "Christian",
        InvocationPreset::Sikh => "Sikh (Waheguru Ji Ki Fateh)",
        InvocationPreset::Buddhist => "Buddhist",
        InvocationPreset::Jain => "Jain",
        InvocationPreset::None => "None",
        InvocationPreset::Custom => "Custom Text",
    }
}

/// Resolves the invocation line to print, if any. Blank text counts as none.
pub fn invocation_text(invocation: Option<&ReligiousInvocation>) -> Option<String> {
    let invocation = invocation?;
    let text = match invocation.preset {
        InvocationPreset::Custom => invocation.custom_text.clone().unwrap_or_default(),
        preset => preset_invocation(preset).unwrap_or_default().to_string(),
    };
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}
