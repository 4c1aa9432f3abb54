//! Color values shared by the header appearance concerns.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Named tokens the renderer knows how to resolve.
pub const NAMED_TOKENS: [&str; 7] = [
    "white",
    "black",
    "primary",
    "secondary",
    "accent",
    "foreground",
    "muted",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HslColor {
    pub h: u16,
    pub s: u8,
    pub l: u8,
}

impl HslColor {
    pub const fn new(h: u16, s: u8, l: u8) -> Self {
        Self { h, s, l }
    }

    /// Hue wrapped into 0..360, saturation and lightness clamped to 0..=100.
    pub fn clamped(h: f64, s: f64, l: f64) -> Self {
        let h = if h.is_finite() { h.rem_euclid(360.0) } else { 0.0 };
        // rem_euclid can round up to exactly 360.0
        let h = (h.round() as u16) % 360;
        Self {
            h,
            s: clamp_percent(s),
            l: clamp_percent(l),
        }
    }

    /// Read `{h, s, l}` from a JSON object. Missing components come from `fallback`.
    pub fn from_json(value: &Value, fallback: HslColor) -> Option<Self> {
        let obj = value.as_object()?;
        let h = obj.get("h").and_then(number);
        let s = obj.get("s").and_then(number);
        let l = obj.get("l").and_then(number);
        if h.is_none() && s.is_none() && l.is_none() {
            return None;
        }
        Some(Self::clamped(
            h.unwrap_or(fallback.h as f64),
            s.unwrap_or(fallback.s as f64),
            l.unwrap_or(fallback.l as f64),
        ))
    }

    pub fn to_hex(&self) -> String {
        let (r, g, b) = hsl_to_rgb(self.h as f64, self.s as f64 / 100.0, self.l as f64 / 100.0);
        format!("#{r:02x}{g:02x}{b:02x}")
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let normalized = normalize_hex(hex)?;
        let channel = |i: usize| u8::from_str_radix(&normalized[i..i + 2], 16).ok();
        let (r, g, b) = (channel(1)?, channel(3)?, channel(5)?);
        let (h, s, l) = rgb_to_hsl(r, g, b);
        Some(Self::clamped(h, s * 100.0, l * 100.0))
    }
}

/// HSL plus opacity on the canonical 0..=100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hsla {
    pub h: u16,
    pub s: u8,
    pub l: u8,
    pub opacity: u8,
}

impl Hsla {
    pub const fn new(h: u16, s: u8, l: u8, opacity: u8) -> Self {
        Self { h, s, l, opacity }
    }

    pub fn hsl(&self) -> HslColor {
        HslColor::new(self.h, self.s, self.l)
    }

    pub fn with_hsl(color: HslColor, opacity: u8) -> Self {
        Self::new(color.h, color.s, color.l, opacity)
    }

    /// Read `{h, s, l, opacity}` from a JSON object, accepting either opacity
    /// scale. Missing components come from `fallback`.
    pub fn from_json(value: &Value, fallback: Hsla) -> Option<Self> {
        let obj = value.as_object()?;
        let opacity = obj.get("opacity").and_then(number).map(normalize_opacity);
        let color = HslColor::from_json(value, fallback.hsl());
        if color.is_none() && opacity.is_none() {
            return None;
        }
        Some(Self::with_hsl(
            color.unwrap_or(fallback.hsl()),
            opacity.unwrap_or(fallback.opacity),
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorKind {
    Named,
    Custom,
    Hsl,
}

impl ColorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Named => "named",
            Self::Custom => "custom",
            Self::Hsl => "hsl",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "named" => Some(Self::Named),
            "custom" => Some(Self::Custom),
            "hsl" => Some(Self::Hsl),
            _ => None,
        }
    }
}

/// A color that may be a theme token, a custom hex, or an explicit HSL.
/// Every field is always populated so renderers never branch on absence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorValue {
    pub kind: ColorKind,
    pub token: String,
    pub hex: String,
    pub hsl: HslColor,
}

impl ColorValue {
    pub fn named(token: &str, hsl: HslColor) -> Self {
        Self {
            kind: ColorKind::Named,
            token: token.to_string(),
            hex: String::new(),
            hsl,
        }
    }

    pub fn hsl(hsl: HslColor) -> Self {
        Self {
            kind: ColorKind::Hsl,
            token: String::new(),
            hex: hsl.to_hex(),
            hsl,
        }
    }

    pub fn custom(hex: &str) -> Option<Self> {
        let hex = normalize_hex(hex)?;
        let hsl = HslColor::from_hex(&hex)?;
        Some(Self {
            kind: ColorKind::Custom,
            token: String::new(),
            hex,
            hsl,
        })
    }

    /// Interpret any of the historical color encodings.
    ///
    /// Returns `None` when the input carries no color at all (absent, null,
    /// empty string) so a lower-precedence source can supply one. Input that
    /// is present but unrecognised resolves to `default`.
    pub fn from_json(value: &Value, default: &ColorValue) -> Option<Self> {
        match value {
            Value::String(s) if s.trim().is_empty() => None,
            Value::Object(obj) => match obj.get("kind").and_then(Value::as_str) {
                Some(kind) => Some(Self::from_tagged(obj, kind, default)),
                None => Self::from_shorthand(value, default).or_else(|| Some(default.clone())),
            },
            Value::Null => None,
            _ => Self::from_shorthand(value, default).or_else(|| Some(default.clone())),
        }
    }

    /// Strict reading of an untagged color: a hex string, a known token, an
    /// `{h, s, l}` object, or an object carrying a known `token` or a valid
    /// `hex`. Anything else is `None`.
    pub fn from_shorthand(value: &Value, default: &ColorValue) -> Option<Self> {
        match value {
            Value::String(s) => Self::from_text(s.trim(), default),
            Value::Object(obj) => HslColor::from_json(value, default.hsl)
                .map(ColorValue::hsl)
                .or_else(|| {
                    obj.get("token")
                        .and_then(Value::as_str)
                        .filter(|t| NAMED_TOKENS.contains(t))
                        .map(|t| ColorValue::named(t, default.hsl))
                })
                .or_else(|| obj.get("hex").and_then(Value::as_str).and_then(ColorValue::custom)),
            _ => None,
        }
    }

    fn from_text(s: &str, default: &ColorValue) -> Option<Self> {
        if is_hex_color(s) {
            return ColorValue::custom(s);
        }
        NAMED_TOKENS
            .contains(&s)
            .then(|| ColorValue::named(s, default.hsl))
    }

    fn from_tagged(obj: &serde_json::Map<String, Value>, kind: &str, default: &ColorValue) -> Self {
        match ColorKind::parse(kind) {
            Some(ColorKind::Custom) => obj
                .get("hex")
                .and_then(Value::as_str)
                .and_then(ColorValue::custom)
                .unwrap_or_else(|| default.clone()),
            Some(ColorKind::Named) => obj
                .get("token")
                .and_then(Value::as_str)
                .filter(|t| NAMED_TOKENS.contains(t))
                .map(|t| ColorValue::named(t, default.hsl))
                .unwrap_or_else(|| default.clone()),
            Some(ColorKind::Hsl) => obj
                .get("hsl")
                .and_then(|v| HslColor::from_json(v, default.hsl))
                .map(ColorValue::hsl)
                .unwrap_or_else(|| default.clone()),
            None => default.clone(),
        }
    }
}

/// Map an opacity from either scale to the canonical 0..=100 integer.
///
/// Values in `[0, 1]` are fractions, values above 1 are percentages. `1`
/// itself is read as a fraction (fully opaque).
pub fn normalize_opacity(v: f64) -> u8 {
    if !v.is_finite() || v <= 0.0 {
        return 0;
    }
    let percent = if v <= 1.0 { v * 100.0 } else { v };
    percent.round().min(100.0) as u8
}

pub fn is_hex_color(s: &str) -> bool {
    let digits = s.strip_prefix('#').unwrap_or(s);
    matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit())
}

/// Lower-case `#rrggbb`, expanding the 3-digit form.
pub fn normalize_hex(s: &str) -> Option<String> {
    if !is_hex_color(s) {
        return None;
    }
    let digits = s.trim_start_matches('#').to_ascii_lowercase();
    if digits.len() == 3 {
        let expanded: String = digits.chars().flat_map(|c| [c, c]).collect();
        Some(format!("#{expanded}"))
    } else {
        Some(format!("#{digits}"))
    }
}

/// Numbers, or numeric strings with an optional `px`/`%` suffix.
pub fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s
            .trim()
            .trim_end_matches("px")
            .trim_end_matches('%')
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite()),
        _ => None,
    }
}

fn clamp_percent(v: f64) -> u8 {
    if !v.is_finite() {
        return 0;
    }
    v.round().clamp(0.0, 100.0) as u8
}

fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (u8, u8, u8) {
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let hp = h / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
    let (r1, g1, b1) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    let to_byte = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    (to_byte(r1), to_byte(g1), to_byte(b1))
}

fn rgb_to_hsl(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let r = r as f64 / 255.0;
    let g = g as f64 / 255.0;
    let b = b as f64 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    let d = max - min;
    if d == 0.0 {
        return (0.0, 0.0, l);
    }
    let s = d / (1.0 - (2.0 * l - 1.0).abs());
    let h = if max == r {
        60.0 * (((g - b) / d).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / d + 2.0)
    } else {
        60.0 * ((r - g) / d + 4.0)
    };
    (h, s, l)
}
