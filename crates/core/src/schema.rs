//! Declarative schema for the canonical header appearance and the
//! validator that walks it.
//!
//! Full mode fills a default for every absent field and returns a complete
//! canonical object. Partial mode checks only the fields that are present,
//! which is what the save path needs so an additive merge keeps everything
//! the patch does not mention.

use std::fmt;

use serde_json::{Map, Value};

use crate::color::{ColorKind, ColorValue, HslColor, Hsla, NAMED_TOKENS, is_hex_color};
use crate::document::{self, Document};
use crate::header::*;
use crate::legacy::HEADER_KEY;

pub const THEME_COLORS_KEY: &str = "themeColors";

const MAX_DEPTH: usize = 32;

// ============================================================================
// Errors
// ============================================================================

/// One offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub path: String,
    pub expected: String,
    pub received: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "<root>" } else { &self.path };
        write!(f, "{path}: expected {}, received {}", self.expected, self.received)
    }
}

/// Every field that failed validation. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn paths(&self) -> Vec<&str> {
        self.0.iter().map(|e| e.path.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} invalid field(s)", self.0.len())?;
        for e in &self.0 {
            write!(f, "; {e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

// ============================================================================
// Schema nodes
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Bool { default: bool },
    /// Integer in `[min, max]`. Fractional input is rounded, never clamped.
    Int { min: i64, max: i64, default: i64 },
    Str { default: String, non_empty: bool },
    Enum { variants: &'static [&'static str], default: &'static str },
    /// `""` or a 3/6 digit hex color.
    Hex { default: String },
    Object(Vec<(&'static str, SchemaNode)>),
    Array { item: Box<SchemaNode>, max_len: usize },
}

/// Schema builder helpers.
pub mod t {
    use super::SchemaNode;

    pub fn boolean(default: bool) -> SchemaNode {
        SchemaNode::Bool { default }
    }

    pub fn int(min: i64, max: i64, default: i64) -> SchemaNode {
        SchemaNode::Int { min, max, default }
    }

    pub fn range(range: (i64, i64), default: i64) -> SchemaNode {
        int(range.0, range.1, default)
    }

    pub fn string(default: &str) -> SchemaNode {
        SchemaNode::Str {
            default: default.to_string(),
            non_empty: false,
        }
    }

    pub fn required_string() -> SchemaNode {
        SchemaNode::Str {
            default: String::new(),
            non_empty: true,
        }
    }

    pub fn one_of(variants: &'static [&'static str], default: &'static str) -> SchemaNode {
        SchemaNode::Enum { variants, default }
    }

    pub fn hex(default: &str) -> SchemaNode {
        SchemaNode::Hex {
            default: default.to_string(),
        }
    }

    pub fn object(fields: Vec<(&'static str, SchemaNode)>) -> SchemaNode {
        SchemaNode::Object(fields)
    }

    pub fn array(item: SchemaNode, max_len: usize) -> SchemaNode {
        SchemaNode::Array {
            item: Box::new(item),
            max_len,
        }
    }
}

pub fn hsl_schema(default: HslColor) -> SchemaNode {
    t::object(vec![
        ("h", t::int(0, 360, default.h as i64)),
        ("s", t::int(0, 100, default.s as i64)),
        ("l", t::int(0, 100, default.l as i64)),
    ])
}

pub fn hsla_schema(default: Hsla) -> SchemaNode {
    t::object(vec![
        ("h", t::int(0, 360, default.h as i64)),
        ("s", t::int(0, 100, default.s as i64)),
        ("l", t::int(0, 100, default.l as i64)),
        ("opacity", t::int(0, 100, default.opacity as i64)),
    ])
}

const COLOR_KINDS: &[&str] = &["named", "custom", "hsl"];

pub fn color_schema(default: &ColorValue) -> SchemaNode {
    t::object(vec![
        ("kind", t::one_of(COLOR_KINDS, default.kind.as_str())),
        ("token", t::string(&default.token)),
        ("hex", t::hex(&default.hex)),
        ("hsl", hsl_schema(default.hsl)),
    ])
}

/// Schema of the canonical header appearance.
pub fn header_schema() -> SchemaNode {
    let d = HeaderAppearance::default();
    t::object(vec![
        ("height", t::range(HEIGHT_RANGE, d.height as i64)),
        ("sticky", t::boolean(d.sticky)),
        ("overlay", t::boolean(d.overlay)),
        (
            "logo",
            t::object(vec![
                ("url", t::string(&d.logo.url)),
                ("alt", t::string(&d.logo.alt)),
                ("maxWidth", t::range(LOGO_MAX_WIDTH_RANGE, d.logo.max_width as i64)),
                ("scrolledUrl", t::string(&d.logo.scrolled_url)),
            ]),
        ),
        ("link", color_schema(&d.link)),
        (
            "bg",
            t::object(vec![
                ("initial", hsla_schema(d.bg.initial)),
                ("scrolled", hsla_schema(d.bg.scrolled)),
            ]),
        ),
        (
            "border",
            t::object(vec![
                ("enabled", t::boolean(d.border.enabled)),
                ("width", t::range(BORDER_WIDTH_RANGE, d.border.width as i64)),
                ("color", color_schema(&d.border.color)),
            ]),
        ),
        (
            "nav",
            t::array(
                t::object(vec![("label", t::required_string()), ("href", t::string(""))]),
                MAX_NAV_LINKS,
            ),
        ),
        (
            "cta",
            t::object(vec![
                ("enabled", t::boolean(d.cta.enabled)),
                ("label", t::string(&d.cta.label)),
                ("href", t::string(&d.cta.href)),
                ("linkType", t::one_of(LinkType::ALL, d.cta.link_type.as_str())),
                ("variant", t::one_of(ButtonVariant::ALL, d.cta.variant.as_str())),
                ("size", t::one_of(ButtonSize::ALL, d.cta.size.as_str())),
            ]),
        ),
        (
            "mobileFloating",
            t::object(vec![
                ("enabled", t::boolean(d.mobile_floating.enabled)),
                (
                    "position",
                    t::one_of(FloatingPosition::ALL, d.mobile_floating.position.as_str()),
                ),
                ("offsetX", t::range(FLOATING_OFFSET_RANGE, d.mobile_floating.offset_x as i64)),
                ("offsetY", t::range(FLOATING_OFFSET_RANGE, d.mobile_floating.offset_y as i64)),
                ("size", t::one_of(ButtonSize::ALL, d.mobile_floating.size.as_str())),
                ("variant", t::one_of(ButtonVariant::ALL, d.mobile_floating.variant.as_str())),
            ]),
        ),
    ])
}

// ============================================================================
// Validation context
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Full,
    Partial,
}

struct ValidationContext {
    errors: Vec<FieldError>,
    path: Vec<String>,
    mode: Mode,
}

impl ValidationContext {
    fn new(mode: Mode) -> Self {
        Self {
            errors: vec![],
            path: vec![],
            mode,
        }
    }

    fn push_key(&mut self, key: impl Into<String>) {
        self.path.push(key.into());
    }

    fn push_index(&mut self, idx: usize) {
        self.path.push(format!("[{idx}]"));
    }

    fn pop(&mut self) {
        self.path.pop();
    }

    /// Join path segments, collapsing `".[0]"` into `"[0]"`.
    fn current_path(&self) -> String {
        self.path.join(".").replace(".[", "[")
    }

    fn add_error(&mut self, expected: impl Into<String>, received: impl Into<String>) {
        self.errors.push(FieldError {
            path: self.current_path(),
            expected: expected.into(),
            received: received.into(),
        });
    }

    fn finish(self, value: Value) -> Result<Value, ValidationErrors> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(ValidationErrors(self.errors))
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn value_display(value: &Value) -> String {
    match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("\"{s}\""),
        other => type_name(other).to_string(),
    }
}

fn default_value(node: &SchemaNode) -> Value {
    match node {
        SchemaNode::Bool { default } => Value::Bool(*default),
        SchemaNode::Int { default, .. } => Value::from(*default),
        SchemaNode::Str { default, .. } => Value::String(default.clone()),
        SchemaNode::Enum { default, .. } => Value::from(*default),
        SchemaNode::Hex { default } => Value::String(default.clone()),
        SchemaNode::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(k, child)| ((*k).to_string(), default_value(child)))
                .collect(),
        ),
        SchemaNode::Array { .. } => Value::Array(vec![]),
    }
}

// ============================================================================
// Core walker
// ============================================================================

/// Validate one (possibly absent) value. `null` counts as absent.
fn walk(
    node: &SchemaNode,
    value: Option<&Value>,
    ctx: &mut ValidationContext,
    depth: usize,
) -> Option<Value> {
    if depth > MAX_DEPTH {
        ctx.add_error("shallower nesting", "too deep");
        return None;
    }
    let value = match value.filter(|v| !v.is_null()) {
        Some(v) => v,
        None => {
            return match ctx.mode {
                Mode::Full => Some(default_value(node)),
                Mode::Partial => None,
            };
        }
    };

    match node {
        SchemaNode::Bool { .. } => match value {
            Value::Bool(_) => Some(value.clone()),
            other => {
                ctx.add_error("boolean", type_name(other));
                None
            }
        },

        SchemaNode::Int { min, max, .. } => match value.as_f64() {
            Some(f) => {
                let rounded = f.round();
                if rounded < *min as f64 || rounded > *max as f64 {
                    ctx.add_error(format!("integer between {min} and {max}"), value_display(value));
                    None
                } else {
                    Some(Value::from(rounded as i64))
                }
            }
            None => {
                ctx.add_error("number", type_name(value));
                None
            }
        },

        SchemaNode::Str { non_empty, .. } => match value.as_str() {
            Some(s) if *non_empty && s.trim().is_empty() => {
                ctx.add_error("non-empty string", "empty string");
                None
            }
            Some(_) => Some(value.clone()),
            None => {
                ctx.add_error("string", type_name(value));
                None
            }
        },

        SchemaNode::Enum { variants, .. } => match value.as_str() {
            Some(s) if variants.contains(&s) => Some(value.clone()),
            _ => {
                ctx.add_error(format!("one of {}", variants.join("|")), value_display(value));
                None
            }
        },

        SchemaNode::Hex { .. } => match value.as_str() {
            Some(s) if s.is_empty() || is_hex_color(s) => Some(value.clone()),
            _ => {
                ctx.add_error("hex color", value_display(value));
                None
            }
        },

        SchemaNode::Object(fields) => {
            let Some(obj) = value.as_object() else {
                ctx.add_error("object", type_name(value));
                return None;
            };
            let mut out = Map::new();
            for (key, child) in fields {
                ctx.push_key(*key);
                if let Some(v) = walk(child, obj.get(*key), ctx, depth + 1) {
                    out.insert((*key).to_string(), v);
                }
                ctx.pop();
            }
            Some(Value::Object(out))
        }

        SchemaNode::Array { item, max_len } => {
            let Some(items) = value.as_array() else {
                ctx.add_error("array", type_name(value));
                return None;
            };
            if items.len() > *max_len {
                ctx.add_error(format!("at most {max_len} items"), format!("{} items", items.len()));
                return None;
            }
            // Array elements are always whole values.
            let outer = ctx.mode;
            ctx.mode = Mode::Full;
            let mut out = Vec::with_capacity(items.len());
            for (idx, element) in items.iter().enumerate() {
                ctx.push_index(idx);
                if let Some(v) = walk(item, Some(element), ctx, depth + 1) {
                    out.push(v);
                }
                ctx.pop();
            }
            ctx.mode = outer;
            Some(Value::Array(out))
        }
    }
}

/// Checks across fields that a tree walk cannot express.
fn check_color(obj: Option<&Value>, ctx: &mut ValidationContext) {
    let Some(obj) = obj.and_then(Value::as_object) else {
        return;
    };
    let Some(kind) = obj.get("kind") else {
        ctx.push_key("kind");
        ctx.add_error(format!("one of {}", COLOR_KINDS.join("|")), "none");
        ctx.pop();
        return;
    };
    match kind.as_str().and_then(ColorKind::parse) {
        Some(ColorKind::Custom) => {
            if !obj.get("hex").and_then(Value::as_str).is_some_and(is_hex_color) {
                ctx.push_key("hex");
                ctx.add_error("hex color for kind custom", "none");
                ctx.pop();
            }
        }
        Some(ColorKind::Named) => {
            let token = obj.get("token").and_then(Value::as_str);
            if !token.is_some_and(|t| NAMED_TOKENS.contains(&t)) {
                ctx.push_key("token");
                ctx.add_error(
                    format!("one of {}", NAMED_TOKENS.join("|")),
                    token.map(|t| format!("\"{t}\"")).unwrap_or_else(|| "none".into()),
                );
                ctx.pop();
            }
        }
        _ => {}
    }
}

fn check_header_colors(header: &Value, ctx: &mut ValidationContext) {
    ctx.push_key("link");
    check_color(header.get("link"), ctx);
    ctx.pop();
    ctx.push_key("border");
    ctx.push_key("color");
    check_color(header.get("border").and_then(|b| b.get("color")), ctx);
    ctx.pop();
    ctx.pop();
}

// ============================================================================
// Public API
// ============================================================================

/// Validate a canonical header candidate, filling every absent field.
pub fn validate_header(candidate: &Value) -> Result<HeaderAppearance, ValidationErrors> {
    let mut ctx = ValidationContext::new(Mode::Full);
    let out = walk(&header_schema(), Some(candidate), &mut ctx, 0).unwrap_or(Value::Null);
    check_header_colors(&out, &mut ctx);
    let out = ctx.finish(out)?;
    serde_json::from_value(out).map_err(|e| {
        ValidationErrors(vec![FieldError {
            path: String::new(),
            expected: "header appearance".into(),
            received: e.to_string(),
        }])
    })
}

/// Validate an incoming settings patch.
///
/// Reserved provenance fields are dropped. The `header` subtree is checked
/// field by field against the header schema without filling defaults, and
/// every `themeColors` entry must be an HSL color. Other top-level keys are
/// free-form.
pub fn validate_patch(patch: &Document) -> Result<Document, ValidationErrors> {
    let mut ctx = ValidationContext::new(Mode::Partial);
    let mut out = document::without_reserved(patch);
    // A null section is absent, never "clear the stored section".
    for key in [HEADER_KEY, THEME_COLORS_KEY] {
        if out.get(key).is_some_and(Value::is_null) {
            out.remove(key);
        }
    }

    if let Some(header) = out.get(HEADER_KEY).filter(|v| !v.is_null()).cloned() {
        ctx.push_key(HEADER_KEY);
        let checked = walk(&header_schema(), Some(&header), &mut ctx, 1);
        if let Some(checked) = &checked {
            check_header_colors(checked, &mut ctx);
        }
        ctx.pop();
        if let Some(checked) = checked {
            out.insert(HEADER_KEY.to_string(), checked);
        }
    }

    if let Some(theme) = out.get(THEME_COLORS_KEY).filter(|v| !v.is_null()).cloned() {
        ctx.push_key(THEME_COLORS_KEY);
        match theme.as_object() {
            Some(entries) => {
                let mut checked = Map::new();
                for (name, color) in entries {
                    ctx.push_key(name.clone());
                    if let Some(v) = walk(&hsl_schema(HslColor::new(0, 0, 0)), Some(color), &mut ctx, 2) {
                        checked.insert(name.clone(), v);
                    }
                    ctx.pop();
                }
                out.insert(THEME_COLORS_KEY.to_string(), Value::Object(checked));
            }
            None => ctx.add_error("object", type_name(&theme)),
        }
        ctx.pop();
    }

    ctx.finish(Value::Null).map(|_| out)
}

/// Validate a whole value as a settings patch.
pub fn validate_patch_value(patch: &Value) -> Result<Document, ValidationErrors> {
    match patch.as_object() {
        Some(obj) => validate_patch(obj),
        None => Err(ValidationErrors(vec![FieldError {
            path: String::new(),
            expected: "object".into(),
            received: type_name(patch).into(),
        }])),
    }
}
