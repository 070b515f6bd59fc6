//! Default document used on first launch and on reset.

use chrono::{DateTime, Utc};

use crate::biodata_model::{
    BackgroundKind, Biodata, BiodataBackground, BiodataField, BiodataMeta, BiodataSection,
    FieldType, InvocationPreset, LanguageMode, ReligiousInvocation, NAME_FIELD_ID,
    PERSONAL_SECTION_ID,
};
use crate::codec::SCHEMA_VERSION;
use crate::templates::DEFAULT_TEMPLATE_ID;

/// Cream page color of the default background.
pub const DEFAULT_BACKGROUND_COLOR: &str = "#FFF9F0";

/// A fresh document: english, no invocation, default template, cream
/// background and the default section set with every value empty.
pub fn create_initial_biodata(id: impl Into<String>, now: DateTime<Utc>) -> Biodata {
    Biodata {
        id: id.into(),
        created_at: now,
        updated_at: now,
        version: SCHEMA_VERSION.to_string(),
        meta: BiodataMeta {
            name: String::new(),
            language: LanguageMode::English,
            religious_invocation: Some(ReligiousInvocation {
                preset: InvocationPreset::None,
                custom_text: None,
            }),
        },
        sections: default_sections(),
        photo: None,
        template_id: DEFAULT_TEMPLATE_ID,
        background: BiodataBackground {
            kind: BackgroundKind::Color,
            value: DEFAULT_BACKGROUND_COLOR.to_string(),
            opacity: Some(100),
            blur: None,
            overlay: None,
        },
        custom_styles: None,
    }
}

// (id, label, hindi label, type, placeholder)
type FieldSpec = (&'static str, &'static str, &'static str, FieldType, &'static str);

const PERSONAL_FIELDS: &[FieldSpec] = &[
    (NAME_FIELD_ID, "Full Name", "पूरा नाम", FieldType::Text, "Enter full name"),
    ("dateOfBirth", "Date of Birth", "जन्म तिथि", FieldType::Date, ""),
    ("timeOfBirth", "Time of Birth", "जन्म समय", FieldType::Time, ""),
    ("placeOfBirth", "Place of Birth", "जन्म स्थान", FieldType::Text, "City, State"),
    ("height", "Height", "ऊंचाई", FieldType::Text, "e.g. 5' 6\""),
    ("complexion", "Complexion", "रंग", FieldType::Select, ""),
    ("religion", "Religion", "धर्म", FieldType::Text, ""),
    ("caste", "Caste", "जाति", FieldType::Text, ""),
    ("gotra", "Gotra", "गोत्र", FieldType::Text, ""),
    ("manglik", "Manglik", "मांगलिक", FieldType::Select, ""),
];

const EDUCATION_FIELDS: &[FieldSpec] = &[
    ("education", "Highest Education", "शिक्षा", FieldType::Text, "e.g. B.Tech, MBA"),
    ("occupation", "Occupation", "व्यवसाय", FieldType::Text, ""),
    ("company", "Company / Organisation", "कंपनी", FieldType::Text, ""),
    ("income", "Annual Income", "वार्षिक आय", FieldType::Text, ""),
];

const FAMILY_FIELDS: &[FieldSpec] = &[
    ("fatherName", "Father's Name", "पिता का नाम", FieldType::Text, ""),
    ("fatherOccupation", "Father's Occupation", "पिता का व्यवसाय", FieldType::Text, ""),
    ("motherName", "Mother's Name", "माता का नाम", FieldType::Text, ""),
    ("motherOccupation", "Mother's Occupation", "माता का व्यवसाय", FieldType::Text, ""),
    ("siblings", "Siblings", "भाई-बहन", FieldType::Textarea, ""),
    ("familyType", "Family Type", "परिवार का प्रकार", FieldType::Select, ""),
];

const CONTACT_FIELDS: &[FieldSpec] = &[
    ("phone", "Phone Number", "फ़ोन नंबर", FieldType::Phone, "+91 98765 43210"),
    ("email", "Email", "ईमेल", FieldType::Email, "name@example.com"),
    ("address", "Address", "पता", FieldType::Textarea, ""),
];

/// Select options for the default fields that have a fixed choice list.
fn default_options(field_id: &str) -> Option<Vec<String>> {
    let options: &[&str] = match field_id {
        "complexion" => &["Very Fair", "Fair", "Wheatish", "Wheatish Brown", "Dark"],
        "manglik" => &["No", "Yes", "Anshik (Partial)", "Don't Know"],
        "familyType" => &["Joint", "Nuclear"],
        _ => return None,
    };
    Some(options.iter().map(|o| o.to_string()).collect())
}

/// The default section set: personal, education and career, family, contact.
pub fn default_sections() -> Vec<BiodataSection> {
    let groups: [(&str, &str, &str, &str, &[FieldSpec]); 4] = [
        (PERSONAL_SECTION_ID, "Personal Details", "व्यक्तिगत विवरण", "user", PERSONAL_FIELDS),
        ("education", "Education & Career", "शिक्षा और करियर", "graduation-cap", EDUCATION_FIELDS),
        ("family", "Family Details", "पारिवारिक विवरण", "users", FAMILY_FIELDS),
        ("contact", "Contact Details", "संपर्क विवरण", "phone", CONTACT_FIELDS),
    ];

    groups
        .iter()
        .enumerate()
        .map(|(order, (id, title, title_hindi, icon, fields))| BiodataSection {
            id: id.to_string(),
            title: title.to_string(),
            title_hindi: Some(title_hindi.to_string()),
            icon: Some(icon.to_string()),
            fields: fields
                .iter()
                .enumerate()
                .map(|(field_order, spec)| default_field(spec, field_order as u32))
                .collect(),
            order: order as u32,
            visible: true,
            collapsible: Some(true),
            collapsed: Some(false),
        })
        .collect()
}

fn default_field(spec: &FieldSpec, order: u32) -> BiodataField {
    let (id, label, label_hindi, field_type, placeholder) = *spec;
    BiodataField {
        id: id.to_string(),
        label: label.to_string(),
        label_hindi: Some(label_hindi.to_string()),
        field_type,
        value: String::new(),
        placeholder: (!placeholder.is_empty()).then(|| placeholder.to_string()),
        options: default_options(id),
        validation: None,
        order,
        visible: true,
        editable: true,
    }
}
