//! Shape normalization for the header appearance.
//!
//! Each historical layout has an extraction strategy producing a
//! [`HeaderPatch`]. Strategies are consulted in a fixed order, newest layout
//! first, and the first one to supply a field wins that field. Whatever is
//! still missing falls back to the canonical defaults.

use serde_json::{Map, Value};

use crate::CoreError;
use crate::color::{ColorValue, Hsla, normalize_opacity, number};
use crate::document::{self, Document};
use crate::header::*;
use crate::legacy::{self, HEADER_KEY};

/// One configuration concern of the header appearance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concern {
    Header,
    LinkColor,
    Border,
    Background,
    Cta,
    MobileFloating,
    Logo,
}

impl Concern {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::LinkColor => "link",
            Self::Border => "border",
            Self::Background => "bg",
            Self::Cta => "cta",
            Self::MobileFloating => "mobileFloating",
            Self::Logo => "logo",
        }
    }
}

/// Partially known header appearance. `None` means "this source is silent".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderPatch {
    pub height: Option<f64>,
    pub sticky: Option<bool>,
    pub overlay: Option<bool>,
    pub logo_url: Option<String>,
    pub logo_alt: Option<String>,
    pub logo_max_width: Option<f64>,
    pub logo_scrolled_url: Option<String>,
    pub link: Option<ColorValue>,
    pub bg_initial: Option<Hsla>,
    pub bg_scrolled: Option<Hsla>,
    pub border_enabled: Option<bool>,
    pub border_width: Option<f64>,
    pub border_color: Option<ColorValue>,
    pub nav: Option<Vec<NavLink>>,
    pub cta_enabled: Option<bool>,
    pub cta_label: Option<String>,
    pub cta_href: Option<String>,
    pub cta_link_type: Option<LinkType>,
    pub cta_variant: Option<ButtonVariant>,
    pub cta_size: Option<ButtonSize>,
    pub floating_enabled: Option<bool>,
    pub floating_position: Option<FloatingPosition>,
    pub floating_offset_x: Option<f64>,
    pub floating_offset_y: Option<f64>,
    pub floating_size: Option<ButtonSize>,
    pub floating_variant: Option<ButtonVariant>,
}

macro_rules! fill_fields {
    ($target:ident, $source:ident; $($field:ident),+ $(,)?) => {
        $(
            if $target.$field.is_none() {
                $target.$field = $source.$field;
            }
        )+
    };
}

impl HeaderPatch {
    /// Fill every field this patch is silent on from `lower`.
    pub fn fill_from(&mut self, lower: HeaderPatch) {
        fill_fields!(self, lower;
            height, sticky, overlay,
            logo_url, logo_alt, logo_max_width, logo_scrolled_url,
            link, bg_initial, bg_scrolled,
            border_enabled, border_width, border_color,
            nav,
            cta_enabled, cta_label, cta_href, cta_link_type, cta_variant, cta_size,
            floating_enabled, floating_position, floating_offset_x, floating_offset_y,
            floating_size, floating_variant,
        );
    }

    pub fn is_empty(&self) -> bool {
        *self == HeaderPatch::default()
    }

    /// Substitute defaults and clamp into canonical bounds.
    pub fn finish(self) -> HeaderAppearance {
        let defaults = HeaderAppearance::default();
        HeaderAppearance {
            height: clamp_px(self.height, HEIGHT_RANGE, defaults.height),
            sticky: self.sticky.unwrap_or(defaults.sticky),
            overlay: self.overlay.unwrap_or(defaults.overlay),
            logo: Logo {
                url: self.logo_url.unwrap_or(defaults.logo.url),
                alt: self.logo_alt.unwrap_or(defaults.logo.alt),
                max_width: clamp_px(self.logo_max_width, LOGO_MAX_WIDTH_RANGE, defaults.logo.max_width),
                scrolled_url: self.logo_scrolled_url.unwrap_or(defaults.logo.scrolled_url),
            },
            link: self.link.unwrap_or(defaults.link),
            bg: Backgrounds {
                initial: self.bg_initial.unwrap_or(defaults.bg.initial),
                scrolled: self.bg_scrolled.unwrap_or(defaults.bg.scrolled),
            },
            border: Border {
                enabled: self.border_enabled.unwrap_or(defaults.border.enabled),
                width: clamp_px(self.border_width, BORDER_WIDTH_RANGE, defaults.border.width as u16) as u8,
                color: self.border_color.unwrap_or(defaults.border.color),
            },
            nav: self
                .nav
                .map(|mut links| {
                    links.truncate(MAX_NAV_LINKS);
                    links
                })
                .unwrap_or(defaults.nav),
            cta: Cta {
                enabled: self.cta_enabled.unwrap_or(defaults.cta.enabled),
                label: self.cta_label.unwrap_or(defaults.cta.label),
                href: self.cta_href.unwrap_or(defaults.cta.href),
                link_type: self.cta_link_type.unwrap_or(defaults.cta.link_type),
                variant: self.cta_variant.unwrap_or(defaults.cta.variant),
                size: self.cta_size.unwrap_or(defaults.cta.size),
            },
            mobile_floating: MobileFloating {
                enabled: self.floating_enabled.unwrap_or(defaults.mobile_floating.enabled),
                position: self.floating_position.unwrap_or(defaults.mobile_floating.position),
                offset_x: clamp_px(
                    self.floating_offset_x,
                    FLOATING_OFFSET_RANGE,
                    defaults.mobile_floating.offset_x,
                ),
                offset_y: clamp_px(
                    self.floating_offset_y,
                    FLOATING_OFFSET_RANGE,
                    defaults.mobile_floating.offset_y,
                ),
                size: self.floating_size.unwrap_or(defaults.mobile_floating.size),
                variant: self.floating_variant.unwrap_or(defaults.mobile_floating.variant),
            },
        }
    }
}

fn clamp_px(value: Option<f64>, (min, max): (i64, i64), default: u16) -> u16 {
    match value {
        Some(v) if v.is_finite() => v.round().clamp(min as f64, max as f64) as u16,
        _ => default,
    }
}

/// A pure reader for one historical layout.
pub type ExtractionStrategy = fn(&Document) -> HeaderPatch;

/// Strategies in precedence order, newest layout first.
pub const STRATEGIES: &[(&str, ExtractionStrategy)] = &[
    ("nested-header", extract_nested_header),
    ("appearance-section", extract_appearance_section),
    ("appearance-root", extract_appearance_root),
    ("legacy-flat", extract_legacy_flat),
];

/// Normalize any historical settings shape into the canonical header appearance.
pub fn normalize_header(raw: &Document) -> HeaderAppearance {
    let mut merged = HeaderPatch::default();
    for (_, strategy) in STRATEGIES {
        merged.fill_from(strategy(raw));
    }
    merged.finish()
}

/// Canonical JSON for one concern.
pub fn normalize_concern(concern: Concern, raw: &Document) -> Result<Value, CoreError> {
    let header = normalize_header(raw);
    let value = match concern {
        Concern::Header => serde_json::to_value(&header)?,
        Concern::LinkColor => serde_json::to_value(&header.link)?,
        Concern::Border => serde_json::to_value(&header.border)?,
        Concern::Background => serde_json::to_value(header.bg)?,
        Concern::Cta => serde_json::to_value(&header.cta)?,
        Concern::MobileFloating => serde_json::to_value(&header.mobile_floating)?,
        Concern::Logo => serde_json::to_value(&header.logo)?,
    };
    Ok(value)
}

/// Whether any layout in `raw` carries header appearance data.
pub fn has_header_source(raw: &Document) -> bool {
    STRATEGIES.iter().any(|(_, strategy)| !strategy(raw).is_empty())
}

// ----------------------------------------------------------------------------
// Field readers
// ----------------------------------------------------------------------------

fn get<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !v.is_null())
}

fn num(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    get(obj, key).and_then(number)
}

fn boolean(obj: &Map<String, Value>, key: &str) -> Option<bool> {
    match get(obj, key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s == "true" => Some(true),
        Value::String(s) if s == "false" => Some(false),
        _ => None,
    }
}

fn text(obj: &Map<String, Value>, key: &str) -> Option<String> {
    get(obj, key).and_then(Value::as_str).map(str::to_string)
}

fn object<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    get(obj, key).and_then(Value::as_object)
}

fn parsed<T>(obj: &Map<String, Value>, key: &str, parse: fn(&str) -> Option<T>) -> Option<T> {
    get(obj, key).and_then(Value::as_str).and_then(parse)
}

fn color(obj: &Map<String, Value>, key: &str, default: &ColorValue) -> Option<ColorValue> {
    get(obj, key).and_then(|v| ColorValue::from_json(v, default))
}

fn hsla(obj: &Map<String, Value>, key: &str, fallback: Hsla) -> Option<Hsla> {
    get(obj, key).and_then(|v| Hsla::from_json(v, fallback))
}

fn nav_links(value: Option<&Value>) -> Option<Vec<NavLink>> {
    let items = value?.as_array()?;
    let links = items
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|item| {
            let label = text(item, "label").or_else(|| text(item, "title"))?;
            let href = text(item, "href").or_else(|| text(item, "url")).unwrap_or_default();
            (!label.trim().is_empty()).then_some(NavLink { label, href })
        })
        .collect();
    Some(links)
}

// ----------------------------------------------------------------------------
// Strategies
// ----------------------------------------------------------------------------

/// `header.*`: the current nested layout.
pub fn extract_nested_header(raw: &Document) -> HeaderPatch {
    let Some(header) = object(raw, HEADER_KEY) else {
        return HeaderPatch::default();
    };
    let logo = object(header, "logo");
    let bg = object(header, "bg");
    let border = object(header, "border");
    let cta = object(header, "cta");
    let floating = object(header, "mobileFloating");

    HeaderPatch {
        height: num(header, "height"),
        sticky: boolean(header, "sticky"),
        overlay: boolean(header, "overlay"),
        logo_url: logo.and_then(|o| text(o, "url")),
        logo_alt: logo.and_then(|o| text(o, "alt")),
        logo_max_width: logo.and_then(|o| num(o, "maxWidth")),
        logo_scrolled_url: logo.and_then(|o| {
            text(o, "scrolledUrl").or_else(|| object(o, "scrolled").and_then(|s| text(s, "url")))
        }),
        link: color(header, "link", &default_link_color())
            .or_else(|| color(header, "linkColor", &default_link_color())),
        bg_initial: bg.and_then(|o| {
            hsla(o, "initial", DEFAULT_BG_INITIAL).or_else(|| hsla(o, "top", DEFAULT_BG_INITIAL))
        }),
        bg_scrolled: bg.and_then(|o| hsla(o, "scrolled", DEFAULT_BG_SCROLLED)),
        border_enabled: border.and_then(|o| boolean(o, "enabled")),
        border_width: border.and_then(|o| num(o, "width").or_else(|| num(o, "widthPx"))),
        border_color: border.and_then(|o| color(o, "color", &default_border_color())),
        nav: nav_links(get(header, "nav")),
        cta_enabled: cta.and_then(|o| boolean(o, "enabled")),
        cta_label: cta.and_then(|o| text(o, "label")),
        cta_href: cta.and_then(|o| text(o, "href")),
        cta_link_type: cta.and_then(|o| parsed(o, "linkType", LinkType::parse)),
        cta_variant: cta.and_then(|o| parsed(o, "variant", ButtonVariant::parse)),
        cta_size: cta.and_then(|o| parsed(o, "size", ButtonSize::parse)),
        floating_enabled: floating.and_then(|o| boolean(o, "enabled")),
        floating_position: floating.and_then(|o| parsed(o, "position", FloatingPosition::parse)),
        floating_offset_x: floating.and_then(|o| num(o, "offsetX")),
        floating_offset_y: floating.and_then(|o| num(o, "offsetY")),
        floating_size: floating.and_then(|o| parsed(o, "size", ButtonSize::parse)),
        floating_variant: floating.and_then(|o| parsed(o, "variant", ButtonVariant::parse)),
    }
}

/// `appearance.*`: the standalone appearance layout embedded in settings.
pub fn extract_appearance_section(raw: &Document) -> HeaderPatch {
    object(raw, "appearance")
        .map(read_appearance_layout)
        .unwrap_or_default()
}

/// The standalone appearance layout at the root, as found in the legacy
/// appearance document itself.
pub fn extract_appearance_root(raw: &Document) -> HeaderPatch {
    read_appearance_layout(raw)
}

fn read_appearance_layout(obj: &Map<String, Value>) -> HeaderPatch {
    let border = object(obj, "border");
    let cta = object(obj, "cta");
    let floating = object(obj, "mobileCta");

    HeaderPatch {
        height: num(obj, "heightPx"),
        sticky: boolean(obj, "isSticky"),
        overlay: boolean(obj, "isOverlay"),
        logo_url: text(obj, "logoUrl"),
        logo_alt: text(obj, "logoAlt"),
        logo_max_width: num(obj, "logoMaxWidth"),
        logo_scrolled_url: text(obj, "logoScrolledUrl"),
        link: color(obj, "linkColor", &default_link_color()),
        bg_initial: hsla(obj, "topBg", DEFAULT_BG_INITIAL),
        bg_scrolled: hsla(obj, "scrolledBg", DEFAULT_BG_SCROLLED),
        border_enabled: border.and_then(|o| boolean(o, "enabled")),
        border_width: border.and_then(|o| num(o, "widthPx").or_else(|| num(o, "width"))),
        border_color: border.and_then(|o| color(o, "color", &default_border_color())),
        nav: nav_links(get(obj, "navLinks")),
        cta_enabled: cta.and_then(|o| boolean(o, "enabled")),
        cta_label: cta.and_then(|o| text(o, "label")),
        cta_href: cta.and_then(|o| text(o, "href")),
        cta_link_type: cta.and_then(|o| parsed(o, "linkType", LinkType::parse)),
        cta_variant: cta.and_then(|o| parsed(o, "variant", ButtonVariant::parse)),
        cta_size: cta.and_then(|o| parsed(o, "size", ButtonSize::parse)),
        floating_enabled: floating.and_then(|o| boolean(o, "enabled")),
        floating_position: floating.and_then(|o| parsed(o, "position", FloatingPosition::parse)),
        floating_offset_x: floating.and_then(|o| num(o, "offsetX")),
        floating_offset_y: floating.and_then(|o| num(o, "offsetY")),
        floating_size: floating.and_then(|o| parsed(o, "size", ButtonSize::parse)),
        floating_variant: floating.and_then(|o| parsed(o, "variant", ButtonVariant::parse)),
    }
}

/// Flat top-level keys of the first settings schema.
pub fn extract_legacy_flat(raw: &Document) -> HeaderPatch {
    let color_pair = |color_key: &str, opacity_key: &str, fallback: Hsla| -> Option<Hsla> {
        let color = get(raw, color_key).and_then(|v| {
            ColorValue::from_json(v, &ColorValue::hsl(fallback.hsl())).map(|c| c.hsl)
        });
        let opacity = num(raw, opacity_key).map(normalize_opacity);
        if color.is_none() && opacity.is_none() {
            return None;
        }
        Some(Hsla::with_hsl(
            color.unwrap_or(fallback.hsl()),
            opacity.unwrap_or(fallback.opacity),
        ))
    };

    HeaderPatch {
        height: num(raw, "headerHeight"),
        sticky: boolean(raw, "headerSticky"),
        overlay: boolean(raw, "headerOverlay"),
        logo_url: text(raw, "headerLogoUrl"),
        logo_alt: text(raw, "headerLogoAlt"),
        logo_max_width: num(raw, "headerLogoMaxWidth"),
        logo_scrolled_url: text(raw, "headerLogoScrolledUrl"),
        link: color(raw, "headerLinkColor", &default_link_color()),
        bg_initial: color_pair(
            "headerInitialBackgroundColor",
            "headerInitialBackgroundOpacity",
            DEFAULT_BG_INITIAL,
        ),
        bg_scrolled: color_pair(
            "headerScrolledBackgroundColor",
            "headerScrolledBackgroundOpacity",
            DEFAULT_BG_SCROLLED,
        ),
        border_enabled: boolean(raw, "headerTopBorderEnabled"),
        border_width: num(raw, "headerTopBorderWidth"),
        border_color: color(raw, "headerTopBorderColor", &default_border_color()),
        nav: nav_links(get(raw, "headerNavLinks")),
        cta_enabled: boolean(raw, "headerCtaEnabled"),
        cta_label: text(raw, "headerCtaLabel"),
        cta_href: text(raw, "headerCtaHref"),
        cta_link_type: parsed(raw, "headerCtaLinkType", LinkType::parse),
        cta_variant: parsed(raw, "headerCtaVariant", ButtonVariant::parse),
        cta_size: parsed(raw, "headerCtaSize", ButtonSize::parse),
        floating_enabled: boolean(raw, "mobileFloatingCtaEnabled"),
        floating_position: parsed(raw, "mobileFloatingCtaPosition", FloatingPosition::parse),
        floating_offset_x: num(raw, "mobileFloatingCtaOffsetX"),
        floating_offset_y: num(raw, "mobileFloatingCtaOffsetY"),
        floating_size: parsed(raw, "mobileFloatingCtaSize", ButtonSize::parse),
        floating_variant: parsed(raw, "mobileFloatingCtaVariant", ButtonVariant::parse),
    }
}

// ----------------------------------------------------------------------------
// Patch canonicalization (save path)
// ----------------------------------------------------------------------------

/// Coerce legacy-shaped parts of an incoming patch into the nested layout.
///
/// Flat legacy keys move under `header`, where an explicit nested value in
/// the same patch takes precedence. Background opacities are put on the
/// 0..=100 scale, `bg.top` becomes `bg.initial`, `linkColor` becomes `link`,
/// `border.widthPx` becomes `border.width`, and color shorthands become
/// tagged color objects. A shorthand that names no recognisable color is
/// left as it is for the validator to report. Fields the patch does not
/// mention stay absent, and a `null` header counts as not mentioned.
pub fn canonicalize_patch(patch: &Document) -> Document {
    let mut out = patch.clone();
    let lifted = legacy::lift_legacy_keys(&mut out);

    let nested = match out.remove(HEADER_KEY) {
        Some(Value::Object(map)) => Some(map),
        // `null` means "no header in this patch", same as the validator.
        Some(Value::Null) | None => None,
        Some(other) => {
            // Not an object: the validator rejects it, so the lifted legacy
            // fields never reach the store on their own.
            out.insert(HEADER_KEY.to_string(), other);
            return out;
        }
    };
    if nested.is_none() && lifted.moved_keys.is_empty() {
        return out;
    }

    let mut header = lifted.header;
    if let Some(nested) = nested {
        document::merge_patch(&mut header, &nested);
    }
    canonicalize_header(&mut header);
    out.insert(HEADER_KEY.to_string(), Value::Object(header));
    out
}

fn canonicalize_header(header: &mut Map<String, Value>) {
    if let Some(Value::Object(logo)) = header.get_mut("logo") {
        let scrolled_url = logo.get("scrolled").and_then(|s| s.get("url")).cloned();
        if let Some(url) = scrolled_url {
            logo.remove("scrolled");
            logo.entry("scrolledUrl").or_insert(url);
        }
    }

    rename(header, "linkColor", "link");
    let link = header
        .get("link")
        .filter(|v| is_shorthand(v))
        .and_then(|v| ColorValue::from_shorthand(v, &default_link_color()));
    if let Some(c) = link {
        header.insert("link".into(), to_json(&c));
    }

    if let Some(Value::Object(bg)) = header.get_mut("bg") {
        rename(bg, "top", "initial");
        for state in ["initial", "scrolled"] {
            if let Some(Value::Object(layer)) = bg.get_mut(state) {
                if let Some(v) = layer.get("opacity").and_then(number) {
                    layer.insert("opacity".into(), Value::from(normalize_opacity(v)));
                }
            }
        }
    }

    if let Some(Value::Object(border)) = header.get_mut("border") {
        rename(border, "widthPx", "width");
        let color = border
            .get("color")
            .filter(|v| is_shorthand(v))
            .and_then(|v| ColorValue::from_shorthand(v, &default_border_color()));
        if let Some(c) = color {
            border.insert("color".into(), to_json(&c));
        }
    }
}

/// A color not already in the tagged `{kind, ...}` form.
fn is_shorthand(value: &Value) -> bool {
    value.get("kind").is_none()
}

fn rename(obj: &mut Map<String, Value>, from: &str, to: &str) {
    if let Some(v) = obj.remove(from) {
        obj.entry(to.to_string()).or_insert(v);
    }
}

fn to_json(color: &ColorValue) -> Value {
    serde_json::json!({
        "kind": color.kind.as_str(),
        "token": color.token,
        "hex": color.hex,
        "hsl": {"h": color.hsl.h, "s": color.hsl.s, "l": color.hsl.l},
    })
}
