//! Flat header fields from the first settings schema and their nested
//! `header.*` equivalents.

use serde_json::{Map, Value};

use crate::color::{HslColor, normalize_hex, normalize_opacity, number};
use crate::document::{self, Document};
use crate::header::DEFAULT_BORDER_WIDTH;

/// Author recorded on documents rewritten by the legacy migration.
pub const MIGRATION_AUTHOR: &str = "migration:DF-246";

pub const HEADER_KEY: &str = "header";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyTarget {
    /// Copy the value verbatim to the nested path.
    Field(&'static [&'static str]),
    /// Merge an `{h, s, l}` object (or hex string) into the object at the path.
    Color(&'static [&'static str]),
    /// Normalize to the 0..=100 scale and store at the path.
    Opacity(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy)]
pub struct LegacyKey {
    pub key: &'static str,
    pub target: LegacyTarget,
}

const fn field(key: &'static str, path: &'static [&'static str]) -> LegacyKey {
    LegacyKey {
        key,
        target: LegacyTarget::Field(path),
    }
}

/// Every known flat key. Paths are relative to `header`.
pub const LEGACY_KEYS: &[LegacyKey] = &[
    field("headerHeight", &["height"]),
    field("headerSticky", &["sticky"]),
    field("headerOverlay", &["overlay"]),
    field("headerLogoUrl", &["logo", "url"]),
    field("headerLogoAlt", &["logo", "alt"]),
    field("headerLogoMaxWidth", &["logo", "maxWidth"]),
    field("headerLogoScrolledUrl", &["logo", "scrolledUrl"]),
    field("headerLinkColor", &["link"]),
    LegacyKey {
        key: "headerInitialBackgroundColor",
        target: LegacyTarget::Color(&["bg", "initial"]),
    },
    LegacyKey {
        key: "headerInitialBackgroundOpacity",
        target: LegacyTarget::Opacity(&["bg", "initial", "opacity"]),
    },
    LegacyKey {
        key: "headerScrolledBackgroundColor",
        target: LegacyTarget::Color(&["bg", "scrolled"]),
    },
    LegacyKey {
        key: "headerScrolledBackgroundOpacity",
        target: LegacyTarget::Opacity(&["bg", "scrolled", "opacity"]),
    },
    field("headerTopBorderEnabled", &["border", "enabled"]),
    field("headerTopBorderWidth", &["border", "width"]),
    field("headerTopBorderColor", &["border", "color"]),
    field("headerNavLinks", &["nav"]),
    field("headerCtaEnabled", &["cta", "enabled"]),
    field("headerCtaLabel", &["cta", "label"]),
    field("headerCtaHref", &["cta", "href"]),
    field("headerCtaLinkType", &["cta", "linkType"]),
    field("headerCtaVariant", &["cta", "variant"]),
    field("headerCtaSize", &["cta", "size"]),
    field("mobileFloatingCtaEnabled", &["mobileFloating", "enabled"]),
    field("mobileFloatingCtaPosition", &["mobileFloating", "position"]),
    field("mobileFloatingCtaOffsetX", &["mobileFloating", "offsetX"]),
    field("mobileFloatingCtaOffsetY", &["mobileFloating", "offsetY"]),
    field("mobileFloatingCtaSize", &["mobileFloating", "size"]),
    field("mobileFloatingCtaVariant", &["mobileFloating", "variant"]),
];

pub fn is_legacy_key(key: &str) -> bool {
    LEGACY_KEYS.iter().any(|k| k.key == key)
}

pub fn has_legacy_keys(doc: &Document) -> bool {
    doc.keys().any(|k| is_legacy_key(k))
}

/// Result of lifting flat keys out of a document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiftedHeader {
    /// Nested header fields built from legacy values only.
    pub header: Document,
    /// Legacy keys that were removed, in table order.
    pub moved_keys: Vec<String>,
}

/// Remove every legacy flat key from `doc` and build the nested header
/// fragment they describe. Fields without a legacy source are not written.
pub fn lift_legacy_keys(doc: &mut Document) -> LiftedHeader {
    let mut lifted = LiftedHeader::default();
    for legacy in LEGACY_KEYS {
        let Some(value) = doc.remove(legacy.key) else {
            continue;
        };
        lifted.moved_keys.push(legacy.key.to_string());
        match legacy.target {
            LegacyTarget::Field(path) => document::set_path(&mut lifted.header, path, value),
            LegacyTarget::Color(path) => {
                if let Some(components) = color_components(&value) {
                    for (k, v) in components {
                        let mut full: Vec<&str> = path.to_vec();
                        full.push(k);
                        document::set_path(&mut lifted.header, &full, v);
                    }
                }
            }
            LegacyTarget::Opacity(path) => {
                if let Some(v) = number(&value) {
                    document::set_path(&mut lifted.header, path, Value::from(normalize_opacity(v)));
                }
            }
        }
    }
    lifted
}

/// `{h, s, l}` entries of a legacy color, which was stored either as an
/// object or as a hex string.
fn color_components(value: &Value) -> Option<Vec<(&'static str, Value)>> {
    match value {
        Value::Object(obj) => {
            let picked: Vec<(&'static str, Value)> = ["h", "s", "l"]
                .into_iter()
                .filter_map(|k| obj.get(k).map(|v| (k, v.clone())))
                .collect();
            (!picked.is_empty()).then_some(picked)
        }
        Value::String(s) => {
            let hsl = normalize_hex(s).and_then(|hex| HslColor::from_hex(&hex))?;
            Some(vec![
                ("h", Value::from(hsl.h)),
                ("s", Value::from(hsl.s)),
                ("l", Value::from(hsl.l)),
            ])
        }
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MigratedDocument {
    pub document: Document,
    pub moved_keys: Vec<String>,
}

/// Rewrite a document from the flat layout to the nested one.
///
/// Returns `None` when no legacy key is present. Legacy values override the
/// nested value at the same path; nested fields without a legacy source are
/// kept. Provenance stamping is left to the caller.
pub fn migrate_document(doc: &Document) -> Option<MigratedDocument> {
    if !has_legacy_keys(doc) {
        return None;
    }
    let mut migrated = doc.clone();
    let lifted = lift_legacy_keys(&mut migrated);

    let mut header = match migrated.remove(HEADER_KEY) {
        Some(Value::Object(existing)) => existing,
        _ => Map::new(),
    };
    document::merge_patch(&mut header, &lifted.header);

    let border_enabled = document::get_path(&header, &["border", "enabled"])
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if border_enabled && document::get_path(&header, &["border", "width"]).is_none() {
        document::set_path(&mut header, &["border", "width"], Value::from(DEFAULT_BORDER_WIDTH));
    }

    migrated.insert(HEADER_KEY.to_string(), Value::Object(header));

    let mut document = doc.clone();
    let dropped = document::replace_whole(&mut document, migrated);
    // Only legacy keys may leave the document, and every lifted one must.
    debug_assert!(dropped.iter().all(|k| is_legacy_key(k)));
    debug_assert_eq!(dropped.len(), lifted.moved_keys.len());
    let moved_keys = LEGACY_KEYS
        .iter()
        .map(|legacy| legacy.key)
        .filter(|key| dropped.iter().any(|d| d == key))
        .map(str::to_string)
        .collect();

    Some(MigratedDocument {
        document,
        moved_keys,
    })
}
