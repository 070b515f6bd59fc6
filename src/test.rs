//! # Test Suite for Biodata Core
//!
//! Covers the document model, the reducer, validation, the import/export
//! codec, the render and export pipelines, the autosave store and the FFI
//! surface.
//!
//! ## Test Categories
//!
//! ### 1. Reducer Tests
//! - **Purpose**: Verify every action and its order-key bookkeeping
//! - **Coverage**: Field/section add, remove, update, reorder; template,
//!   photo, background, meta; import and reset; rejected actions
//!
//! ### 2. Reorder Tests
//! - **Purpose**: Drag-and-drop arithmetic and permutation checks
//!
//! ### 3. Validation Tests
//! - **Purpose**: Type checks, constraint checks, completion, upload limits
//!
//! ### 4. Codec Tests
//! - **Purpose**: Envelope export, staged import rejection, file naming
//!
//! ### 5. Render Tests
//! - **Purpose**: Page enumeration, localization, template independence
//!
//! ### 6. Store Tests
//! - **Purpose**: Debounced autosave and preview, quota failures,
//!   subscriptions, restore and reload
//!
//! ### 7. Storage Tests
//! - **Purpose**: LMDB and in-memory backends, map-full as quota
//!
//! ### 8. Export Tests
//! - **Purpose**: Page fitting, PDF assembly, in-flight guard
//!
//! ### 9. FFI Function Tests
//! - **Purpose**: Every extern "C" function, null pointers, malformed JSON
//!
//! ## Running the Tests
//!
//! ```bash
//! cargo test
//!
//! cargo test test_reducer_   # Reducer tests
//! cargo test test_store_     # Store tests
//! cargo test test_ffi_       # FFI tests
//! ```

#[cfg(test)]
pub mod tests {
    use std::ffi::{CStr, CString};
    use std::os::raw::c_char;
    use std::sync::{mpsc, Arc, Mutex};
    use std::time::{Duration, Instant};

    use chrono::{DateTime, TimeZone, Utc};
    use image::{Rgba, RgbaImage};
    use log::info;
    use serde_json::json;

    use crate::app_response::AppResponse;
    use crate::biodata_model::{
        display_name, formatted_value, Biodata, BiodataPhoto, FieldConstraints, FieldPatch,
        FieldType, InvocationPreset, LanguageMode, MetaPatch, NewField, NewSection, PhotoPosition,
        PhotoShape, PhotoSize, ReligiousInvocation, SectionPatch, DISPLAY_NAME_PLACEHOLDER,
    };
    use crate::biodata_store::{BiodataStore, StoreEvent};
    use crate::codec::{
        export_envelope, export_file_name, parse_envelope, parse_envelope_text, sanitize_file_stem,
        SCHEMA_VERSION,
    };
    use crate::config::StoreConfig;
    use crate::debounce::Debouncer;
    use crate::defaults::create_initial_biodata;
    use crate::error::{ActionError, ExportError, ImportError, PhotoError, StorageError};
    use crate::export::{
        fit_to_page, ExportJob, ExportRequest, ExportStatus, FixedRaster, PageDocumentBuilder,
        PdfPageBuilder, Rasterizer,
    };
    use crate::photo::{self, fit_within};
    use crate::reducer::{reduce, Action, Transition};
    use crate::render::{default_photo_position, render_page, PageSize, RenderedPage};
    use crate::reorder::{is_permutation, move_item};
    use crate::storage::{DocumentStorage, LmdbStorage, MemoryStorage, DOCUMENT_KEY};
    use crate::templates::{
        get_template, invocation_label, invocation_text, template_list, ResolvedTheme, TemplateId,
    };
    use crate::validation::{
        completion_percentage, is_valid_email, is_valid_phone, validate_document, validate_field,
        validate_import_file, validate_photo_upload,
    };

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 10, 30, 0).unwrap()
    }

    fn sample_doc() -> Biodata {
        create_initial_biodata("doc-1", fixed_time())
    }

    fn step(fresh_id: &str) -> Transition {
        Transition {
            now: Utc::now(),
            fresh_id: fresh_id.to_string(),
        }
    }

    fn apply(doc: &Biodata, action: Action) -> Biodata {
        reduce(doc, action, step("fresh-1")).unwrap()
    }

    fn set_value(section_id: &str, field_id: &str, value: &str) -> Action {
        Action::UpdateField {
            section_id: section_id.to_string(),
            field_id: field_id.to_string(),
            value: value.to_string(),
        }
    }

    fn new_field(label: &str, field_type: FieldType) -> NewField {
        NewField {
            label: label.to_string(),
            label_hindi: None,
            field_type,
            value: String::new(),
            placeholder: None,
            options: None,
            validation: None,
            visible: true,
            editable: true,
        }
    }

    fn section_ids(doc: &Biodata) -> Vec<String> {
        doc.sections.iter().map(|s| s.id.clone()).collect()
    }

    fn field_ids(doc: &Biodata, section_id: &str) -> Vec<String> {
        doc.section(section_id)
            .unwrap()
            .fields
            .iter()
            .map(|f| f.id.clone())
            .collect()
    }

    fn envelope_json(doc: &Biodata) -> serde_json::Value {
        serde_json::to_value(export_envelope(doc, fixed_time())).unwrap()
    }

    fn memory_store() -> BiodataStore<MemoryStorage> {
        BiodataStore::open(MemoryStorage::new(), StoreConfig::default())
    }

    // ---------------------------------------------------------------------
    // 1. Reducer Tests
    // ---------------------------------------------------------------------

    #[test]
    fn test_reducer_update_field_sets_value_and_timestamp() {
        let doc = sample_doc();
        let next = apply(&doc, set_value("personal", "name", "Asha Sharma"));

        assert_eq!(next.field("personal", "name").unwrap().value, "Asha Sharma");
        assert!(next.updated_at > doc.updated_at);
        assert_eq!(next.created_at, doc.created_at);
        assert_eq!(doc.field("personal", "name").unwrap().value, "");
    }

    #[test]
    fn test_reducer_update_unknown_targets_rejected() {
        let doc = sample_doc();

        let err = reduce(&doc, set_value("nope", "name", "x"), step("f")).unwrap_err();
        assert_eq!(err, ActionError::SectionNotFound("nope".to_string()));

        let err = reduce(&doc, set_value("personal", "nope", "x"), step("f")).unwrap_err();
        assert!(matches!(err, ActionError::FieldNotFound { .. }));
    }

    #[test]
    fn test_reducer_add_field_takes_next_order_key() {
        let doc = sample_doc();
        let before = doc.section("contact").unwrap().fields.len();

        let next = reduce(
            &doc,
            Action::AddField {
                section_id: "contact".to_string(),
                field: new_field("Website", FieldType::Url),
            },
            step("website"),
        )
        .unwrap();

        let section = next.section("contact").unwrap();
        assert_eq!(section.fields.len(), before + 1);
        let added = section.field("website").unwrap();
        assert_eq!(added.order, before as u32);
        assert_eq!(added.field_type, FieldType::Url);
    }

    #[test]
    fn test_reducer_add_field_with_taken_id_rejected() {
        let doc = sample_doc();
        let err = reduce(
            &doc,
            Action::AddField {
                section_id: "personal".to_string(),
                field: new_field("Name again", FieldType::Text),
            },
            step("name"),
        )
        .unwrap_err();
        assert_eq!(err, ActionError::DuplicateId("name".to_string()));
    }

    #[test]
    fn test_reducer_remove_field_renormalizes_orders() {
        let doc = sample_doc();
        let next = apply(
            &doc,
            Action::RemoveField {
                section_id: "family".to_string(),
                field_id: "fatherOccupation".to_string(),
            },
        );

        let section = next.section("family").unwrap();
        assert!(section.field("fatherOccupation").is_none());
        let orders: Vec<u32> = section.fields.iter().map(|f| f.order).collect();
        assert_eq!(orders, (0..section.fields.len() as u32).collect::<Vec<_>>());
    }

    #[test]
    fn test_reducer_update_field_config_patches_and_clears() {
        let doc = sample_doc();
        let patch: FieldPatch =
            serde_json::from_value(json!({ "label": "Mobile", "placeholder": null, "visible": false })).unwrap();

        let next = apply(
            &doc,
            Action::UpdateFieldConfig {
                section_id: "contact".to_string(),
                field_id: "phone".to_string(),
                config: patch,
            },
        );

        let field = next.field("contact", "phone").unwrap();
        assert_eq!(field.label, "Mobile");
        assert_eq!(field.placeholder, None);
        assert!(!field.visible);
        assert_eq!(field.label_hindi, doc.field("contact", "phone").unwrap().label_hindi);
    }

    #[test]
    fn test_reducer_add_section_with_fields() {
        let doc = sample_doc();
        let mut extra = doc.field("personal", "height").unwrap().clone();
        extra.id = "hobbies".to_string();
        extra.order = 7;

        let next = reduce(
            &doc,
            Action::AddSection {
                section: NewSection {
                    title: "Interests".to_string(),
                    title_hindi: None,
                    icon: None,
                    fields: vec![extra],
                    visible: true,
                    collapsible: None,
                    collapsed: None,
                },
            },
            step("interests"),
        )
        .unwrap();

        let section = next.section("interests").unwrap();
        assert_eq!(section.order, 4);
        assert_eq!(section.fields[0].order, 0);
        assert_eq!(section_ids(&next).last().unwrap(), "interests");
    }

    #[test]
    fn test_reducer_remove_section_renormalizes_orders() {
        let doc = sample_doc();
        let next = apply(&doc, Action::RemoveSection { section_id: "education".to_string() });

        assert_eq!(section_ids(&next), ["personal", "family", "contact"]);
        let orders: Vec<u32> = next.sections.iter().map(|s| s.order).collect();
        assert_eq!(orders, [0, 1, 2]);

        let err = reduce(&next, Action::RemoveSection { section_id: "education".to_string() }, step("f"));
        assert!(matches!(err, Err(ActionError::SectionNotFound(_))));
    }

    #[test]
    fn test_reducer_update_section_patch() {
        let doc = sample_doc();
        let updates: SectionPatch = serde_json::from_value(json!({ "title": "About Me", "visible": false })).unwrap();
        let next = apply(&doc, Action::UpdateSection { section_id: "personal".to_string(), updates });

        let section = next.section("personal").unwrap();
        assert_eq!(section.title, "About Me");
        assert!(!section.visible);
        assert_eq!(section.fields, doc.section("personal").unwrap().fields);
    }

    #[test]
    fn test_reducer_reorder_sections_rewrites_orders() {
        let doc = sample_doc();
        let wanted = ["contact", "personal", "family", "education"].map(String::from).to_vec();
        let next = apply(&doc, Action::ReorderSections { section_ids: wanted.clone() });

        assert_eq!(section_ids(&next), wanted);
        for (position, section) in next.sections.iter().enumerate() {
            assert_eq!(section.order, position as u32);
        }
    }

    #[test]
    fn test_reducer_reorder_rejects_non_permutation() {
        let doc = sample_doc();

        let missing = ["contact", "personal", "family"].map(String::from).to_vec();
        let err = reduce(&doc, Action::ReorderSections { section_ids: missing }, step("f")).unwrap_err();
        assert!(matches!(err, ActionError::NotAPermutation(_)));

        let duplicated = ["name", "name"].map(String::from).to_vec();
        let err = reduce(
            &doc,
            Action::ReorderFields { section_id: "personal".to_string(), field_ids: duplicated },
            step("f"),
        )
        .unwrap_err();
        assert!(matches!(err, ActionError::NotAPermutation(_)));
    }

    #[test]
    fn test_reducer_reorder_fields() {
        let doc = sample_doc();
        let mut ids = field_ids(&doc, "contact");
        ids.reverse();

        let next = apply(&doc, Action::ReorderFields { section_id: "contact".to_string(), field_ids: ids.clone() });
        assert_eq!(field_ids(&next, "contact"), ids);
    }

    fn assert_dense_orders(doc: &Biodata, section_id: &str) {
        let section = doc.section(section_id).unwrap();
        let mut orders: Vec<u32> = section.fields.iter().map(|f| f.order).collect();
        orders.sort_unstable();
        assert_eq!(orders, (0..section.fields.len() as u32).collect::<Vec<_>>());
        let mut section_orders: Vec<u32> = doc.sections.iter().map(|s| s.order).collect();
        section_orders.sort_unstable();
        assert_eq!(section_orders, (0..doc.sections.len() as u32).collect::<Vec<_>>());
    }

    #[test]
    fn test_reducer_mixed_edits_keep_orders_dense() {
        let mut doc = sample_doc();
        assert_dense_orders(&doc, "contact");

        let add = |id: &str| Action::AddField {
            section_id: "contact".to_string(),
            field: new_field(id, FieldType::Text),
        };

        doc = reduce(&doc, add("Website"), step("website")).unwrap();
        assert_dense_orders(&doc, "contact");

        let first = field_ids(&doc, "contact")[0].clone();
        doc = apply(&doc, Action::RemoveField { section_id: "contact".to_string(), field_id: first });
        assert_dense_orders(&doc, "contact");

        let mut ids = field_ids(&doc, "contact");
        ids.rotate_left(1);
        doc = apply(&doc, Action::ReorderFields { section_id: "contact".to_string(), field_ids: ids });
        assert_dense_orders(&doc, "contact");

        doc = reduce(&doc, add("Landline"), step("landline")).unwrap();
        assert_dense_orders(&doc, "contact");
        assert_eq!(doc.field("contact", "landline").unwrap().order, doc.section("contact").unwrap().fields.len() as u32 - 1);

        doc = apply(&doc, Action::RemoveSection { section_id: "family".to_string() });
        assert_dense_orders(&doc, "contact");

        let mut sections = section_ids(&doc);
        sections.reverse();
        doc = apply(&doc, Action::ReorderSections { section_ids: sections });
        assert_dense_orders(&doc, "contact");
    }

    #[test]
    fn test_reducer_presentation_actions() {
        let doc = sample_doc();
        let photo = BiodataPhoto {
            url: "data:image/png;base64,AAAA".to_string(),
            position: PhotoPosition::TopLeft,
            shape: PhotoShape::Circle,
            size: PhotoSize::Medium,
            border: None,
        };

        let next = apply(&doc, Action::SetTemplate { template_id: TemplateId::Royal });
        let next = apply(&next, Action::SetPhoto { photo: Some(photo.clone()) });
        assert_eq!(next.template_id, TemplateId::Royal);
        assert_eq!(next.photo, Some(photo));

        let cleared = apply(&next, Action::SetPhoto { photo: None });
        assert!(cleared.photo.is_none());

        let meta: MetaPatch = serde_json::from_value(json!({ "name": "Asha", "language": "bilingual" })).unwrap();
        let with_meta = apply(&cleared, Action::UpdateMeta { meta });
        assert_eq!(with_meta.meta.name, "Asha");
        assert_eq!(with_meta.meta.language, LanguageMode::Bilingual);
        assert_eq!(with_meta.meta.religious_invocation, doc.meta.religious_invocation);
    }

    #[test]
    fn test_reducer_import_and_reset() {
        let doc = sample_doc();
        let mut other = create_initial_biodata("imported", fixed_time());
        other.meta.name = "Imported".to_string();

        let now = Utc::now();
        let imported = reduce(
            &doc,
            Action::ImportData { data: Box::new(other.clone()) },
            Transition { now, fresh_id: "unused".to_string() },
        )
        .unwrap();
        assert_eq!(imported.id, "imported");
        assert_eq!(imported.meta.name, "Imported");
        assert_eq!(imported.updated_at, now);

        let reset = reduce(&imported, Action::Reset, step("brand-new")).unwrap();
        assert_eq!(reset.id, "brand-new");
        assert_eq!(reset.meta.name, "");
        assert_eq!(section_ids(&reset), section_ids(&sample_doc()));
    }

    #[test]
    fn test_reducer_action_wire_format() {
        let action: Action = serde_json::from_value(json!({ "type": "SET_PHOTO", "photo": null })).unwrap();
        assert_eq!(action, Action::SetPhoto { photo: None });

        let action: Action = serde_json::from_value(json!({ "type": "RESET" })).unwrap();
        assert_eq!(action, Action::Reset);

        let action: Action = serde_json::from_value(json!({
            "type": "REORDER_FIELDS",
            "sectionId": "contact",
            "fieldIds": ["email", "phone", "address"],
        }))
        .unwrap();
        assert_eq!(action.name(), "REORDER_FIELDS");

        let bad: Result<Action, _> = serde_json::from_value(json!({ "type": "DELETE_EVERYTHING" }));
        assert!(bad.is_err());
    }

    // ---------------------------------------------------------------------
    // 2. Reorder Tests
    // ---------------------------------------------------------------------

    #[test]
    fn test_reorder_move_down_and_up() {
        let ids = ["A", "B", "C", "D"].map(String::from);
        assert_eq!(move_item(&ids, "A", "C"), ["B", "C", "A", "D"]);
        assert_eq!(move_item(&ids, "D", "B"), ["A", "D", "B", "C"]);
    }

    #[test]
    fn test_reorder_noop_cases() {
        let ids = ["A", "B", "C"].map(String::from);
        assert_eq!(move_item(&ids, "B", "B"), ids);
        assert_eq!(move_item(&ids, "X", "B"), ids);
        assert_eq!(move_item(&ids, "A", "X"), ids);
    }

    #[test]
    fn test_reorder_result_feeds_reducer() {
        let doc = sample_doc();
        let moved = move_item(&section_ids(&doc), "personal", "family");
        let next = apply(&doc, Action::ReorderSections { section_ids: moved });
        assert_eq!(section_ids(&next), ["education", "family", "personal", "contact"]);
    }

    #[test]
    fn test_reorder_is_permutation() {
        let current = ["a", "b", "c"];
        assert!(is_permutation(&current, &["c", "a", "b"].map(String::from)));
        assert!(!is_permutation(&current, &["a", "b"].map(String::from)));
        assert!(!is_permutation(&current, &["a", "b", "d"].map(String::from)));
        assert!(!is_permutation(&["a", "a"], &["a", "a"].map(String::from)));
    }

    // ---------------------------------------------------------------------
    // 3. Validation Tests
    // ---------------------------------------------------------------------

    #[test]
    fn test_validation_email_and_phone() {
        assert!(is_valid_email("asha@example.com"));
        assert!(!is_valid_email("asha@example"));
        assert!(!is_valid_email("asha @example.com"));

        assert!(is_valid_phone("9876543210"));
        assert!(is_valid_phone("+91 98765-43210"));
        assert!(is_valid_phone("09876543210"));
        assert!(!is_valid_phone("12345"));
        assert!(!is_valid_phone("5876543210"));

        let mut site = sample_doc().field("contact", "email").unwrap().clone();
        site.field_type = FieldType::Url;
        site.value = "https://example.com/asha".to_string();
        assert!(validate_field(&site).valid);
        site.value = "example dot com".to_string();
        assert_eq!(validate_field(&site).message.as_deref(), Some("Please enter a valid URL"));
    }

    #[test]
    fn test_validation_is_repeatable() {
        let doc = apply(&sample_doc(), set_value("contact", "email", "asha@"));
        let field = doc.field("contact", "email").unwrap();

        let first = validate_field(field);
        let second = validate_field(field);
        assert_eq!(first, second);
        assert!(!first.valid);
        assert_eq!(validate_document(&doc), validate_document(&doc));
    }

    #[test]
    fn test_validation_empty_values_are_valid() {
        let doc = sample_doc();
        let email = doc.field("contact", "email").unwrap();
        assert!(validate_field(email).valid);
        assert!(validate_document(&doc).valid);
    }

    #[test]
    fn test_validation_type_failures_reported_per_field() {
        let doc = sample_doc();
        let doc = apply(&doc, set_value("contact", "email", "not-an-email"));
        let doc = apply(&doc, set_value("contact", "phone", "12"));

        let result = validate_document(&doc);
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 2);
        assert_eq!(
            result.error_for_field("contact", "email"),
            Some("Please enter a valid email address")
        );
        assert_eq!(result.errors_for_section("contact").count(), 2);
    }

    #[test]
    fn test_validation_hidden_fields_skipped() {
        let doc = sample_doc();
        let doc = apply(&doc, set_value("contact", "email", "broken"));
        let hidden = apply(
            &doc,
            Action::UpdateSection {
                section_id: "contact".to_string(),
                updates: SectionPatch { visible: Some(false), ..SectionPatch::default() },
            },
        );
        assert!(validate_document(&hidden).valid);
    }

    #[test]
    fn test_validation_constraints() {
        let mut field = sample_doc().field("personal", "name").unwrap().clone();
        field.validation = Some(FieldConstraints {
            min_length: Some(3),
            max_length: Some(5),
            pattern: Some("^[A-Za-z]+$".to_string()),
            message: None,
        });

        field.value = "ab".to_string();
        assert_eq!(validate_field(&field).message.as_deref(), Some("Minimum 3 characters required"));

        field.value = "abcdef".to_string();
        assert_eq!(validate_field(&field).message.as_deref(), Some("Maximum 5 characters allowed"));

        field.value = "ab1".to_string();
        assert_eq!(validate_field(&field).message.as_deref(), Some("Invalid format"));

        field.value = "abc".to_string();
        assert!(validate_field(&field).valid);

        field.validation = Some(FieldConstraints {
            min_length: Some(0),
            pattern: Some("([".to_string()),
            message: Some("Letters only".to_string()),
            ..FieldConstraints::default()
        });
        assert_eq!(validate_field(&field).message.as_deref(), Some("Letters only"));
    }

    #[test]
    fn test_validation_completion_percentage() {
        let doc = sample_doc();
        assert_eq!(completion_percentage(&doc), 0);

        let total: usize = doc.sections.iter().map(|s| s.fields.len()).sum();
        let mut filled = doc.clone();
        for section in filled.sections.iter_mut() {
            for field in section.fields.iter_mut() {
                field.value = "x".to_string();
            }
        }
        assert_eq!(completion_percentage(&filled), 100);

        let one = apply(&doc, set_value("personal", "name", "Asha"));
        let expected = ((1.0 / total as f64) * 100.0).round() as u8;
        assert_eq!(completion_percentage(&one), expected);

        let mut empty = doc.clone();
        empty.sections.clear();
        assert_eq!(completion_percentage(&empty), 100);
    }

    #[test]
    fn test_validation_upload_limits() {
        assert!(validate_photo_upload("image/png", 1024).valid);
        assert!(!validate_photo_upload("application/pdf", 1024).valid);
        assert!(!validate_photo_upload("image/jpeg", 6 * 1024 * 1024).valid);

        assert!(validate_import_file("backup.json", "", 512).valid);
        assert!(!validate_import_file("backup.txt", "text/plain", 512).valid);
        assert!(!validate_import_file("backup.json", "application/json", 2 * 1024 * 1024).valid);
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = std::io::Cursor::new(Vec::new());
        RgbaImage::from_pixel(width, height, Rgba([120, 80, 40, 255]))
            .write_to(&mut bytes, image::ImageOutputFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    fn decode_data_url(url: &str) -> image::DynamicImage {
        use base64::Engine as _;
        let encoded = url.strip_prefix("data:image/jpeg;base64,").unwrap();
        let jpeg = base64::engine::general_purpose::STANDARD.decode(encoded).unwrap();
        assert_eq!(image::guess_format(&jpeg).unwrap(), image::ImageFormat::Jpeg);
        image::load_from_memory(&jpeg).unwrap()
    }

    #[test]
    fn test_validation_photo_fit_within() {
        assert_eq!(fit_within(1600, 400, 800, 800), (800, 200));
        assert_eq!(fit_within(400, 1600, 800, 800), (200, 800));
        assert_eq!(fit_within(2000, 1800, 800, 800), (800, 720));
        assert_eq!(fit_within(300, 200, 800, 800), (300, 200));
    }

    #[test]
    fn test_validation_compress_photo() {
        let url = photo::compress_photo(&png_bytes(1600, 400), 800, 800, 80).unwrap();
        let image = decode_data_url(&url);
        assert_eq!((image.width(), image.height()), (800, 200));

        let url = photo::compress_photo(&png_bytes(120, 90), 800, 800, 80).unwrap();
        let image = decode_data_url(&url);
        assert_eq!((image.width(), image.height()), (120, 90));

        assert!(matches!(
            photo::compress_photo(b"not an image", 800, 800, 80),
            Err(PhotoError::Image(_))
        ));
        assert_eq!(
            photo::compress_photo(&png_bytes(4, 4), 0, 800, 80),
            Err(PhotoError::InvalidBounds { max_width: 0, max_height: 800 })
        );
    }

    // ---------------------------------------------------------------------
    // 4. Codec Tests
    // ---------------------------------------------------------------------

    #[test]
    fn test_codec_envelope_round_trip() {
        let doc = apply(&sample_doc(), set_value("personal", "name", "Asha"));
        let envelope = export_envelope(&doc, fixed_time());
        assert_eq!(envelope.version, SCHEMA_VERSION);
        assert_eq!(envelope.exported_at, fixed_time());

        let text = serde_json::to_string(&envelope).unwrap();
        let parsed = parse_envelope_text(&text).unwrap();
        assert_eq!(parsed.data, doc);
    }

    #[test]
    fn test_codec_store_export_json_reimports() {
        let mut source = memory_store();
        source.dispatch(set_value("personal", "name", "Round Trip")).unwrap();
        let text = source.export_json().unwrap();
        assert!(text.contains("\n"));

        let mut target = memory_store();
        target.import_text(&text).unwrap();
        assert_eq!(target.document().sections, source.document().sections);
        assert_eq!(target.document().id, source.document().id);
    }

    #[test]
    fn test_codec_rejects_non_json() {
        assert!(matches!(parse_envelope_text("{ not json"), Err(ImportError::Parse(_))));
    }

    #[test]
    fn test_codec_rejects_bad_structure() {
        let mut value = envelope_json(&sample_doc());
        value["data"].as_object_mut().unwrap().remove("sections");
        assert!(matches!(parse_envelope(value), Err(ImportError::Structure(_))));

        assert!(matches!(parse_envelope(json!([1, 2, 3])), Err(ImportError::Structure(_))));

        let mut value = envelope_json(&sample_doc());
        value["data"]["sections"][0]["fields"][0]["type"] = json!("hologram");
        assert!(matches!(parse_envelope(value), Err(ImportError::Structure(_))));
    }

    #[test]
    fn test_codec_rejects_non_rfc3339_timestamps() {
        let mut value = envelope_json(&sample_doc());
        value["exportedAt"] = json!("yesterday");
        assert!(matches!(parse_envelope(value), Err(ImportError::Structure(_))));

        let mut value = envelope_json(&sample_doc());
        value["data"]["updatedAt"] = json!("05/03/2024");
        assert!(matches!(parse_envelope(value), Err(ImportError::Structure(_))));

        let mut value = envelope_json(&sample_doc());
        value["data"]["createdAt"] = json!("2024-03-05T10:30:00.000Z");
        assert!(parse_envelope(value).is_ok());
    }

    #[test]
    fn test_codec_rejects_duplicate_ids() {
        let mut value = envelope_json(&sample_doc());
        let first = value["data"]["sections"][0].clone();
        value["data"]["sections"].as_array_mut().unwrap().push(first);
        assert!(matches!(parse_envelope(value), Err(ImportError::Structure(_))));
    }

    #[test]
    fn test_codec_version_check() {
        let mut value = envelope_json(&sample_doc());
        value["version"] = json!("2.0.0");
        assert_eq!(
            parse_envelope(value),
            Err(ImportError::Version { found: "2.0.0".to_string(), expected: SCHEMA_VERSION.to_string() })
        );

        let mut value = envelope_json(&sample_doc());
        value["version"] = json!("1.4.2");
        assert!(parse_envelope(value).is_ok());
    }

    #[test]
    fn test_codec_file_names() {
        assert_eq!(sanitize_file_stem("  Asha  K. Sharma! "), "Asha_K_Sharma");

        let doc = sample_doc();
        assert_eq!(export_file_name(&doc, "json", fixed_time()), "biodata_biodata_2024-03-05.json");

        let named = apply(&doc, set_value("personal", "name", "Ravi Kumar"));
        assert_eq!(export_file_name(&named, "pdf", fixed_time()), "biodata_Ravi_Kumar_2024-03-05.pdf");

        let mut meta_named = named.clone();
        meta_named.meta.name = "Asha Sharma".to_string();
        assert_eq!(export_file_name(&meta_named, "json", fixed_time()), "biodata_Asha_Sharma_2024-03-05.json");
    }

    // ---------------------------------------------------------------------
    // 5. Render Tests
    // ---------------------------------------------------------------------

    #[test]
    fn test_render_skips_empty_and_hidden() {
        let doc = sample_doc();
        let page = render_page(&doc, 1.0);
        assert!(page.sections.is_empty());
        assert_eq!(page.display_name, DISPLAY_NAME_PLACEHOLDER);
        assert_eq!((page.width_px, page.height_px), (794, 1123));

        let doc = apply(&doc, set_value("personal", "name", "Asha"));
        let doc = apply(&doc, set_value("contact", "email", "asha@example.com"));
        let doc = apply(
            &doc,
            Action::UpdateFieldConfig {
                section_id: "contact".to_string(),
                field_id: "email".to_string(),
                config: FieldPatch { visible: Some(false), ..FieldPatch::default() },
            },
        );

        let page = render_page(&doc, 2.0);
        let ids: Vec<&str> = page.sections.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["personal"]);
        assert_eq!(page.sections[0].rows.len(), 1);
        assert_eq!(page.display_name, "Asha");
        assert_eq!(page.width_px, 1587);
    }

    #[test]
    fn test_render_follows_order_keys() {
        let mut doc = sample_doc();
        for section in doc.sections.iter_mut() {
            if let Some(first) = section.fields.first_mut() {
                first.value = "x".to_string();
            }
        }
        let reordered = apply(
            &doc,
            Action::ReorderSections {
                section_ids: ["contact", "family", "education", "personal"].map(String::from).to_vec(),
            },
        );

        let page = render_page(&reordered, 1.0);
        let ids: Vec<&str> = page.sections.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["contact", "family", "education", "personal"]);
    }

    #[test]
    fn test_render_template_swap_keeps_content() {
        let doc = apply(&sample_doc(), set_value("personal", "name", "Asha"));
        let classic = render_page(&doc, 1.0);

        for template in template_list() {
            let swapped = apply(&doc, Action::SetTemplate { template_id: template.id });
            let page = render_page(&swapped, 1.0);
            assert_eq!(page.sections, classic.sections);
            assert_eq!(page.theme.primary_color, template.colors.primary);
        }
    }

    #[test]
    fn test_render_localized_labels_and_dates() {
        let doc = apply(&sample_doc(), set_value("personal", "dateOfBirth", "1995-01-15"));
        let date = doc.field("personal", "dateOfBirth").unwrap();
        assert_eq!(formatted_value(date), "15 January 1995");

        let bilingual = apply(
            &doc,
            Action::UpdateMeta { meta: MetaPatch { language: Some(LanguageMode::Bilingual), ..MetaPatch::default() } },
        );
        let page = render_page(&bilingual, 1.0);
        let section = &page.sections[0];
        assert_eq!(section.title, "Personal Details");
        assert_eq!(section.secondary_title.as_deref(), Some("व्यक्तिगत विवरण"));
        assert_eq!(section.rows[0].value, "15 January 1995");

        let hindi = apply(
            &doc,
            Action::UpdateMeta { meta: MetaPatch { language: Some(LanguageMode::Hindi), ..MetaPatch::default() } },
        );
        let page = render_page(&hindi, 1.0);
        assert_eq!(page.sections[0].rows[0].label, "जन्म तिथि");
        assert!(page.sections[0].rows[0].secondary_label.is_none());
    }

    #[test]
    fn test_render_invocation_and_theme_overrides() {
        assert_eq!(invocation_text(None), None);
        let hindu = ReligiousInvocation { preset: InvocationPreset::Hindu, custom_text: None };
        assert_eq!(invocation_text(Some(&hindu)).as_deref(), Some("॥ श्री गणेशाय नमः ॥"));
        let blank = ReligiousInvocation { preset: InvocationPreset::Custom, custom_text: Some("  ".to_string()) };
        assert_eq!(invocation_text(Some(&blank)), None);
        assert_eq!(invocation_label(InvocationPreset::Custom), "Custom Text");

        let template = get_template(TemplateId::Modern);
        let overrides = crate::biodata_model::CustomStyles {
            primary_color: Some("#123456".to_string()),
            ..Default::default()
        };
        let theme = ResolvedTheme::resolve(template, Some(&overrides));
        assert_eq!(theme.primary_color, "#123456");
        assert_eq!(theme.secondary_color, template.colors.secondary);
    }

    #[test]
    fn test_render_photo_and_default_anchor() {
        let doc = apply(&sample_doc(), Action::SetTemplate { template_id: TemplateId::Modern });
        assert_eq!(default_photo_position(&doc), PhotoPosition::TopLeft);
        assert!(render_page(&doc, 1.0).photo.is_none());

        let photo = BiodataPhoto {
            url: "data:image/jpeg;base64,AAAA".to_string(),
            position: PhotoPosition::Center,
            shape: PhotoShape::Oval,
            size: PhotoSize::Large,
            border: None,
        };
        let doc = apply(&doc, Action::SetPhoto { photo: Some(photo) });
        let rendered = render_page(&doc, 1.0).photo.unwrap();
        assert_eq!(rendered.position, PhotoPosition::Center);
        assert_eq!(rendered.shape, PhotoShape::Oval);
    }

    #[test]
    fn test_render_invalid_scale_falls_back() {
        let page = render_page(&sample_doc(), f32::NAN);
        assert_eq!(page.scale, 1.0);
        let page = render_page(&sample_doc(), -2.0);
        assert_eq!(page.width_px, 794);
    }

    // ---------------------------------------------------------------------
    // 6. Store Tests
    // ---------------------------------------------------------------------

    #[test]
    fn test_store_debouncer_fires_once() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        assert!(!debouncer.poll(start));

        debouncer.schedule(start);
        debouncer.schedule(start + Duration::from_millis(50));
        assert!(!debouncer.poll(start + Duration::from_millis(120)));
        assert_eq!(debouncer.remaining(start + Duration::from_millis(120)), Some(Duration::from_millis(30)));
        assert!(debouncer.poll(start + Duration::from_millis(150)));
        assert!(!debouncer.poll(start + Duration::from_millis(500)));
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn test_store_burst_produces_single_write() {
        init_logger();
        let mut store = memory_store();
        let start = Instant::now();

        for (i, name) in ["A", "As", "Ash", "Ashx", "Asha"].iter().enumerate() {
            let at = start + Duration::from_millis(75 * i as u64);
            store.dispatch_at(set_value("personal", "name", name), at).unwrap();
        }

        let report = store.tick_at(start + Duration::from_millis(1200));
        assert!(report.saved.is_none());
        assert!(report.preview.is_some());
        assert_eq!(store.storage().write_count(), 0);
        assert!(store.save_status().dirty);

        let report = store.tick_at(start + Duration::from_millis(1300));
        assert_eq!(report.saved, Some(Ok(())));
        assert_eq!(store.storage().write_count(), 1);
        assert!(!store.save_status().dirty);

        let saved = store.storage().read(DOCUMENT_KEY).unwrap().unwrap();
        let saved: Biodata = serde_json::from_str(&saved).unwrap();
        assert_eq!(display_name(&saved), "Asha");

        let report = store.tick_at(start + Duration::from_millis(5000));
        assert!(report.saved.is_none());
        assert_eq!(store.storage().write_count(), 1);
    }

    #[test]
    fn test_store_quota_failure_keeps_document() {
        init_logger();
        let mut store = BiodataStore::open(MemoryStorage::with_quota(64), StoreConfig::default());
        let start = Instant::now();
        store.dispatch_at(set_value("personal", "name", "Asha"), start).unwrap();

        let report = store.tick_at(start + Duration::from_secs(2));
        assert!(matches!(report.saved, Some(Err(StorageError::QuotaExceeded(_)))));
        assert_eq!(display_name(store.document()), "Asha");
        assert!(store.save_status().dirty);
        assert!(matches!(store.save_status().last_error, Some(StorageError::QuotaExceeded(_))));

        store.dispatch_at(set_value("personal", "name", "Asha S"), start).unwrap();
        store.storage_mut().set_quota(None);
        assert!(store.flush().is_ok());
        assert_eq!(store.save_status().last_error, None);
    }

    #[test]
    fn test_store_flush_retries_failed_autosave() {
        init_logger();
        let mut store = BiodataStore::open(MemoryStorage::with_quota(64), StoreConfig::default());
        let start = Instant::now();
        store.dispatch_at(set_value("personal", "name", "Asha"), start).unwrap();

        let report = store.tick_at(start + Duration::from_secs(2));
        assert!(matches!(report.saved, Some(Err(StorageError::QuotaExceeded(_)))));
        assert_eq!(store.storage().write_count(), 0);

        store.storage_mut().set_quota(None);
        assert_eq!(store.flush(), Ok(()));
        assert_eq!(store.storage().write_count(), 1);
        assert!(!store.save_status().dirty);
        assert_eq!(store.save_status().last_error, None);

        let saved: Biodata = serde_json::from_str(&store.storage().read(DOCUMENT_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(display_name(&saved), "Asha");

        assert_eq!(store.flush(), Ok(()));
        assert_eq!(store.storage().write_count(), 1);
    }

    #[test]
    fn test_store_flush_reports_persistent_failure() {
        let mut store = BiodataStore::open(MemoryStorage::with_quota(64), StoreConfig::default());
        let start = Instant::now();
        store.dispatch_at(set_value("personal", "name", "Asha"), start).unwrap();
        let _ = store.tick_at(start + Duration::from_secs(2));

        assert!(matches!(store.flush(), Err(StorageError::QuotaExceeded(_))));
        assert!(store.save_status().dirty);
    }

    #[test]
    fn test_store_rejected_action_changes_nothing() {
        let mut store = memory_store();
        let before = store.document().clone();
        let start = Instant::now();

        let result = store.dispatch_at(Action::RemoveSection { section_id: "ghost".to_string() }, start);
        assert!(result.is_err());
        assert_eq!(store.document(), &before);
        let report = store.tick_at(start + Duration::from_secs(5));
        assert!(report.saved.is_none());
        assert!(report.preview.is_none());
    }

    #[test]
    fn test_store_subscribers_notified() {
        let mut store = memory_store();
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = store.subscribe(move |event| {
            let label = match event {
                StoreEvent::Changed { action, .. } => action.to_string(),
                StoreEvent::Saved { .. } => "saved".to_string(),
                StoreEvent::SaveFailed(_) => "failed".to_string(),
                StoreEvent::PreviewReady(_) => "preview".to_string(),
                StoreEvent::Reloaded => "reloaded".to_string(),
            };
            sink.lock().unwrap().push(label);
        });

        let start = Instant::now();
        store.dispatch_at(set_value("personal", "name", "Asha"), start).unwrap();
        store.tick_at(start + Duration::from_secs(2));
        assert_eq!(*seen.lock().unwrap(), ["UPDATE_FIELD", "saved", "preview"]);

        assert!(store.unsubscribe(id));
        store.dispatch(Action::Reset).unwrap();
        assert_eq!(seen.lock().unwrap().len(), 3);
        assert!(!store.unsubscribe(id));
    }

    #[test]
    fn test_store_restores_saved_draft() {
        let mut storage = MemoryStorage::new();
        let saved = apply(&sample_doc(), set_value("personal", "name", "Saved Name"));
        storage.write(DOCUMENT_KEY, &serde_json::to_string(&saved).unwrap()).unwrap();

        let store = BiodataStore::open(storage, StoreConfig::default());
        assert_eq!(store.document(), &saved);
    }

    #[test]
    fn test_store_falls_back_on_bad_draft() {
        for raw in ["not json", r#"{"id":"x"}"#, r#"{"id":"","sections":[]}"#, r#"{"id":"x","sections":[]}"#] {
            let mut storage = MemoryStorage::new();
            storage.write(DOCUMENT_KEY, raw).unwrap();
            let store = BiodataStore::open(storage, StoreConfig::default());
            assert_eq!(section_ids(store.document()), section_ids(&sample_doc()));
            assert!(!store.document().id.is_empty());
        }
    }

    #[test]
    fn test_store_import_paths() {
        let mut store = memory_store();
        let before = store.document().clone();

        assert!(matches!(store.import_text("nope"), Err(ImportError::Parse(_))));
        let mut wrong_version = envelope_json(&sample_doc());
        wrong_version["version"] = json!("3.0.0");
        assert!(matches!(store.import_value(wrong_version), Err(ImportError::Version { .. })));
        assert_eq!(store.document(), &before);

        let incoming = apply(&sample_doc(), set_value("personal", "name", "Imported"));
        let text = serde_json::to_string(&export_envelope(&incoming, fixed_time())).unwrap();
        store.import_text(&text).unwrap();
        assert_eq!(display_name(store.document()), "Imported");
        assert!(store.document().updated_at >= incoming.updated_at);
        assert!(store.save_status().dirty);
    }

    #[test]
    fn test_store_reload_last_writer_wins() {
        let mut store = memory_store();
        assert!(!store.reload_from_storage());

        store.dispatch(set_value("personal", "name", "Local")).unwrap();
        let external = apply(&sample_doc(), set_value("personal", "name", "Other Tab"));
        store
            .storage_mut()
            .write(DOCUMENT_KEY, &serde_json::to_string(&external).unwrap())
            .unwrap();

        assert!(store.reload_from_storage());
        assert_eq!(display_name(store.document()), "Other Tab");
        assert!(!store.save_status().dirty);
        assert!(store.flush().is_ok());
        assert_eq!(store.storage().write_count(), 1);
    }

    #[test]
    fn test_store_config_from_json() {
        let config = StoreConfig::from_json(r#"{"autosaveDelayMs": 250, "jpegQuality": 80}"#).unwrap();
        assert_eq!(config.autosave_delay(), Duration::from_millis(250));
        assert_eq!(config.preview_delay(), Duration::from_millis(300));
        assert_eq!(config.jpeg_quality, 80);
        assert_eq!(StoreConfig::from_json("  ").unwrap(), StoreConfig::default());
        assert!(StoreConfig::from_json("[1]").is_err());
    }

    // ---------------------------------------------------------------------
    // 7. Storage Tests
    // ---------------------------------------------------------------------

    #[test]
    fn test_storage_lmdb_persists_across_reopen() {
        init_logger();
        let dir = tempfile::tempdir().unwrap();
        let name = dir.path().join("biodata");
        let name = name.to_str().unwrap();

        {
            let mut storage = LmdbStorage::open(name, 1024 * 1024).unwrap();
            assert_eq!(storage.read(DOCUMENT_KEY).unwrap(), None);
            storage.write(DOCUMENT_KEY, "{\"hello\":1}").unwrap();
            storage.write("other", "x").unwrap();
            assert!(storage.remove("other").unwrap());
            assert!(!storage.remove("other").unwrap());
            storage.sync().unwrap();
        }

        let storage = LmdbStorage::open(name, 1024 * 1024).unwrap();
        assert_eq!(storage.read(DOCUMENT_KEY).unwrap().as_deref(), Some("{\"hello\":1}"));
        assert!(storage.path().ends_with("biodata.lmdb"));
        storage.destroy().unwrap();
        assert!(!dir.path().join("biodata.lmdb").exists());
    }

    #[test]
    fn test_storage_lmdb_map_full_is_quota() {
        let dir = tempfile::tempdir().unwrap();
        let name = dir.path().join("tiny");
        let mut storage = LmdbStorage::open(name.to_str().unwrap(), 64 * 1024).unwrap();

        let big = "x".repeat(1024 * 1024);
        let err = storage.write(DOCUMENT_KEY, &big).unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded(_)));
    }

    #[test]
    fn test_storage_store_over_lmdb() {
        let dir = tempfile::tempdir().unwrap();
        let name = dir.path().join("store");
        let name = name.to_str().unwrap();

        let storage = LmdbStorage::open(name, 1024 * 1024).unwrap();
        let mut store = BiodataStore::open(storage, StoreConfig::default());
        store.dispatch(set_value("personal", "name", "Durable")).unwrap();
        store.flush().unwrap();
        drop(store);

        let storage = LmdbStorage::open(name, 1024 * 1024).unwrap();
        let store = BiodataStore::open(storage, StoreConfig::default());
        assert_eq!(display_name(store.document()), "Durable");
    }

    #[test]
    fn test_storage_memory_quota() {
        let mut storage = MemoryStorage::with_quota(20);
        storage.write("k", "0123456789").unwrap();
        storage.write("k", "012345678901234567").unwrap();
        assert!(matches!(storage.write("k2", "0123"), Err(StorageError::QuotaExceeded(_))));
        assert_eq!(storage.write_count(), 2);
    }

    // ---------------------------------------------------------------------
    // 8. Export Tests
    // ---------------------------------------------------------------------

    struct GatedRaster {
        gate: Mutex<mpsc::Receiver<()>>,
    }

    impl Rasterizer for GatedRaster {
        fn rasterize(&self, _page: &RenderedPage, _scale: f32) -> Result<RgbaImage, ExportError> {
            let _ = self.gate.lock().unwrap().recv();
            Ok(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255])))
        }
    }

    struct FailingRaster;

    impl Rasterizer for FailingRaster {
        fn rasterize(&self, _page: &RenderedPage, _scale: f32) -> Result<RgbaImage, ExportError> {
            Err(ExportError::Rasterize("canvas lost".to_string()))
        }
    }

    struct PanickingRaster;

    impl Rasterizer for PanickingRaster {
        fn rasterize(&self, _page: &RenderedPage, _scale: f32) -> Result<RgbaImage, ExportError> {
            panic!("renderer crashed");
        }
    }

    fn export_request() -> ExportRequest {
        ExportRequest {
            page: render_page(&sample_doc(), 2.0),
            scale: 2.0,
            file_name: "biodata_test.pdf".to_string(),
        }
    }

    #[test]
    fn test_export_fit_to_page() {
        let wide = fit_to_page(200.0, 100.0, 100.0, 200.0);
        assert_eq!((wide.x, wide.y, wide.width, wide.height), (0.0, 75.0, 100.0, 50.0));

        let tall = fit_to_page(100.0, 400.0, 100.0, 200.0);
        assert_eq!((tall.x, tall.y, tall.width, tall.height), (25.0, 0.0, 50.0, 200.0));

        let exact = fit_to_page(50.0, 100.0, 100.0, 200.0);
        assert_eq!((exact.x, exact.y, exact.width, exact.height), (0.0, 0.0, 100.0, 200.0));
    }

    #[test]
    fn test_export_pdf_single_page() {
        let raster = RgbaImage::from_pixel(8, 12, Rgba([200, 30, 60, 255]));
        let bytes = PdfPageBuilder::default().build(&raster, PageSize::A4).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);

        let page_id = *pages.values().next().unwrap();
        let media_box = doc.get_dictionary(page_id).unwrap().get(b"MediaBox").unwrap().as_array().unwrap();
        let corners: Vec<f32> = media_box.iter().map(|v| v.as_float().unwrap()).collect();
        let (page_w, page_h) = PageSize::A4.points();
        assert!((corners[2] - 595.28).abs() < 0.01);
        assert!((corners[3] - 841.89).abs() < 0.01);
        assert!((corners[2] - page_w).abs() < 0.01 && (corners[3] - page_h).abs() < 0.01);

        let empty = RgbaImage::new(0, 0);
        assert!(PdfPageBuilder::new(90).build(&empty, PageSize::A4).is_err());
    }

    #[test]
    fn test_export_job_success_writes_file() {
        init_logger();
        let dir = tempfile::tempdir().unwrap();
        let job = ExportJob::new();
        assert_eq!(job.status(), ExportStatus::Idle);

        let raster = FixedRaster(RgbaImage::from_pixel(4, 6, Rgba([255, 255, 255, 255])));
        let handle = job
            .start(export_request(), Arc::new(raster), Arc::new(PdfPageBuilder::default()), Some(dir.path().to_path_buf()))
            .unwrap();
        handle.join().unwrap();

        match job.status() {
            ExportStatus::Succeeded { file_name, size_bytes, path } => {
                assert_eq!(file_name, "biodata_test.pdf");
                assert!(size_bytes > 0);
                assert_eq!(path, Some(dir.path().join("biodata_test.pdf")));
            }
            other => panic!("unexpected status {other:?}"),
        }
        assert!(dir.path().join("biodata_test.pdf").exists());
        let output = job.take_output().unwrap();
        assert!(output.bytes.starts_with(b"%PDF"));
        assert!(job.take_output().is_none());
    }

    #[test]
    fn test_export_job_rejects_second_start_while_in_flight() {
        let (tx, rx) = mpsc::channel();
        let job = ExportJob::new();
        let raster = Arc::new(GatedRaster { gate: Mutex::new(rx) });
        let builder = Arc::new(PdfPageBuilder::default());

        let first = job.start(export_request(), raster.clone(), builder.clone(), None).unwrap();
        assert!(job.is_in_flight());

        let second = job.start(export_request(), raster, builder, None);
        assert_eq!(second.err(), Some(ExportError::AlreadyInFlight));

        tx.send(()).unwrap();
        first.join().unwrap();
        assert!(matches!(job.status(), ExportStatus::Succeeded { .. }));
    }

    #[test]
    fn test_export_job_recovers_from_panicking_rasterizer() {
        let job = ExportJob::new();
        let builder = Arc::new(PdfPageBuilder::default());

        let handle = job.start(export_request(), Arc::new(PanickingRaster), builder.clone(), None).unwrap();
        assert!(handle.join().is_ok());
        assert_eq!(
            job.status(),
            ExportStatus::Failed { message: "Export worker panicked: renderer crashed".to_string() }
        );
        assert!(job.take_output().is_none());

        let raster = FixedRaster(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255])));
        let retry = job.start(export_request(), Arc::new(raster), builder, None).unwrap();
        retry.join().unwrap();
        assert!(matches!(job.status(), ExportStatus::Succeeded { .. }));
    }

    #[test]
    fn test_export_failure_leaves_store_untouched() {
        let mut store = memory_store();
        store.dispatch(set_value("personal", "name", "Asha")).unwrap();
        let before = store.document().clone();

        let job = ExportJob::new();
        let handle = job
            .start(store.export_request(), Arc::new(FailingRaster), Arc::new(PdfPageBuilder::default()), None)
            .unwrap();
        handle.join().unwrap();

        assert_eq!(
            job.status(),
            ExportStatus::Failed { message: "Rasterization failed: canvas lost".to_string() }
        );
        assert_eq!(store.document(), &before);
        assert!(store.export_request().file_name.starts_with("biodata_Asha_"));

        let retry = job.start(store.export_request(), Arc::new(FixedRaster(RgbaImage::new(2, 2))), Arc::new(PdfPageBuilder::default()), None);
        assert!(retry.is_ok());
        retry.unwrap().join().unwrap();
    }

    // ---------------------------------------------------------------------
    // 9. FFI Function Tests
    // ---------------------------------------------------------------------

    fn read_response(ptr: *const c_char) -> AppResponse {
        assert!(!ptr.is_null());
        let text = unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string();
        crate::free_response(ptr as *mut c_char);
        serde_json::from_str(&text).unwrap()
    }

    fn ok_payload(ptr: *const c_char) -> serde_json::Value {
        match read_response(ptr) {
            AppResponse::Ok(json) => serde_json::from_str(&json).unwrap_or(serde_json::Value::String(json)),
            other => panic!("expected Ok, got {other}"),
        }
    }

    #[test]
    fn test_ffi_null_pointers() {
        let null = std::ptr::null_mut();
        assert!(crate::create_store(std::ptr::null(), std::ptr::null()).is_null());
        assert!(matches!(read_response(crate::get_document(null)), AppResponse::BadRequest(_)));
        assert!(matches!(read_response(crate::tick_store(null)), AppResponse::BadRequest(_)));
        assert!(matches!(read_response(crate::close_store(null)), AppResponse::BadRequest(_)));
        assert!(matches!(
            read_response(crate::move_item(std::ptr::null(), std::ptr::null(), std::ptr::null())),
            AppResponse::BadRequest(_)
        ));
        crate::free_response(std::ptr::null_mut());
    }

    #[test]
    fn test_ffi_move_item() {
        let ids = CString::new(r#"["A","B","C","D"]"#).unwrap();
        let moved = CString::new("A").unwrap();
        let target = CString::new("C").unwrap();
        let payload = ok_payload(crate::move_item(ids.as_ptr(), moved.as_ptr(), target.as_ptr()));
        assert_eq!(payload, json!(["B", "C", "A", "D"]));

        let bad = CString::new("{}").unwrap();
        assert!(matches!(
            read_response(crate::move_item(bad.as_ptr(), moved.as_ptr(), target.as_ptr())),
            AppResponse::SerializationError(_)
        ));
    }

    #[test]
    fn test_ffi_compress_photo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portrait.png");
        std::fs::write(&path, png_bytes(1000, 2000)).unwrap();
        let path = CString::new(path.to_str().unwrap()).unwrap();

        let url = match read_response(crate::compress_photo(path.as_ptr(), 0, 0, 0)) {
            AppResponse::Ok(url) => url,
            other => panic!("expected a data URL, got {other}"),
        };
        let image = decode_data_url(&url);
        assert_eq!((image.width(), image.height()), (400, 800));

        let text = dir.path().join("notes.txt");
        std::fs::write(&text, "hello").unwrap();
        let text = CString::new(text.to_str().unwrap()).unwrap();
        assert!(matches!(
            read_response(crate::compress_photo(text.as_ptr(), 800, 800, 80)),
            AppResponse::ValidationError(_)
        ));

        let missing = CString::new(dir.path().join("missing.png").to_str().unwrap()).unwrap();
        assert!(matches!(
            read_response(crate::compress_photo(missing.as_ptr(), 800, 800, 80)),
            AppResponse::BadRequest(_)
        ));
        assert!(matches!(
            read_response(crate::compress_photo(std::ptr::null(), 800, 800, 80)),
            AppResponse::BadRequest(_)
        ));
    }

    #[test]
    fn test_ffi_store_lifecycle() {
        init_logger();
        let dir = tempfile::tempdir().unwrap();
        let name = CString::new(dir.path().join("ffi").to_str().unwrap()).unwrap();
        let config = CString::new(r#"{"autosaveDelayMs": 0}"#).unwrap();

        let handle = crate::create_store(name.as_ptr(), config.as_ptr());
        assert!(!handle.is_null());

        let action = CString::new(
            r#"{"type":"UPDATE_FIELD","sectionId":"personal","fieldId":"name","value":"Asha Sharma"}"#,
        )
        .unwrap();
        let doc = ok_payload(crate::dispatch_action(handle, action.as_ptr()));
        assert_eq!(doc["sections"][0]["fields"][0]["value"], "Asha Sharma");

        let unknown = CString::new(r#"{"type":"REMOVE_SECTION","sectionId":"ghost"}"#).unwrap();
        assert!(matches!(read_response(crate::dispatch_action(handle, unknown.as_ptr())), AppResponse::NotFound(_)));
        let garbage = CString::new("{").unwrap();
        assert!(matches!(
            read_response(crate::dispatch_action(handle, garbage.as_ptr())),
            AppResponse::SerializationError(_)
        ));

        let tick = ok_payload(crate::tick_store(handle));
        assert_eq!(tick["saved"], json!(true));
        let status = ok_payload(crate::save_status(handle));
        assert_eq!(status["dirty"], json!(false));

        let validation = ok_payload(crate::validate_document(handle));
        assert_eq!(validation["valid"], json!(true));
        let completion = ok_payload(crate::completion_percentage(handle));
        assert!(completion.as_u64().unwrap() > 0);
        let page = ok_payload(crate::render_page(handle, 1.0));
        assert_eq!(page["displayName"], "Asha Sharma");

        let exported = ok_payload(crate::export_document(handle));
        assert!(exported["fileName"].as_str().unwrap().starts_with("biodata_Asha_Sharma_"));
        assert_eq!(exported["envelope"]["version"], SCHEMA_VERSION);

        let not_json = CString::new("hello").unwrap();
        assert!(matches!(
            read_response(crate::import_document(handle, not_json.as_ptr())),
            AppResponse::ImportStructureError(_)
        ));
        let mut envelope = exported["envelope"].clone();
        envelope["version"] = json!("9.0.0");
        let future = CString::new(envelope.to_string()).unwrap();
        assert!(matches!(
            read_response(crate::import_document(handle, future.as_ptr())),
            AppResponse::ImportVersionError(_)
        ));
        envelope["version"] = json!(SCHEMA_VERSION);
        let valid = CString::new(envelope.to_string()).unwrap();
        let imported = ok_payload(crate::import_document(handle, valid.as_ptr()));
        assert_eq!(imported["id"], exported["envelope"]["data"]["id"]);

        let status = ok_payload(crate::export_status(handle));
        assert_eq!(status["status"], "idle");

        assert!(read_response(crate::flush_store(handle)).is_ok());
        let reload = ok_payload(crate::reload_store(handle));
        assert_eq!(reload["changed"], json!(false));
        assert!(read_response(crate::close_store(handle)).is_ok());

        let reopened = crate::create_store(name.as_ptr(), std::ptr::null());
        assert!(!reopened.is_null());
        let doc = ok_payload(crate::get_document(reopened));
        assert_eq!(doc["sections"][0]["fields"][0]["value"], "Asha Sharma");
        info!("Reopened store restored {}", doc["id"]);
        assert!(read_response(crate::close_store(reopened)).is_ok());
    }

    #[test]
    fn test_ffi_pdf_export_from_raster_file() {
        let dir = tempfile::tempdir().unwrap();
        let name = CString::new(dir.path().join("pdf").to_str().unwrap()).unwrap();
        let handle = crate::create_store(name.as_ptr(), std::ptr::null());
        assert!(!handle.is_null());

        let raster_path = dir.path().join("page.png");
        RgbaImage::from_pixel(10, 14, Rgba([250, 240, 230, 255])).save(&raster_path).unwrap();
        let raster = CString::new(raster_path.to_str().unwrap()).unwrap();
        let out = CString::new(dir.path().to_str().unwrap()).unwrap();

        let file_name = match read_response(crate::start_pdf_export(handle, raster.as_ptr(), out.as_ptr())) {
            AppResponse::Ok(name) => name,
            other => panic!("export did not start: {other}"),
        };
        assert!(file_name.ends_with(".pdf"));

        let deadline = Instant::now() + Duration::from_secs(10);
        let status = loop {
            let status = ok_payload(crate::export_status(handle));
            if status["status"] != "inFlight" || Instant::now() > deadline {
                break status;
            }
            std::thread::sleep(Duration::from_millis(10));
        };
        assert_eq!(status["status"], "succeeded");
        assert!(dir.path().join(&file_name).exists());

        assert!(read_response(crate::close_store(handle)).is_ok());
    }
}
