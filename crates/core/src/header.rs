//! Canonical header appearance: the single shape every historical layout is
//! normalized into and the renderer consumes.

use serde::{Deserialize, Serialize};

use crate::color::{ColorValue, HslColor, Hsla};

pub const HEIGHT_RANGE: (i64, i64) = (56, 200);
pub const LOGO_MAX_WIDTH_RANGE: (i64, i64) = (24, 600);
pub const BORDER_WIDTH_RANGE: (i64, i64) = (0, 16);
pub const FLOATING_OFFSET_RANGE: (i64, i64) = (0, 200);
pub const MAX_NAV_LINKS: usize = 12;

pub const DEFAULT_HEIGHT: u16 = 80;
pub const DEFAULT_LOGO_MAX_WIDTH: u16 = 160;
pub const DEFAULT_BORDER_WIDTH: u8 = 1;
pub const DEFAULT_FLOATING_OFFSET: u16 = 16;
pub const DEFAULT_LINK_TOKEN: &str = "white";
pub const DEFAULT_CTA_LABEL: &str = "Contact";
pub const DEFAULT_CTA_HREF: &str = "/contact";

pub const WHITE: HslColor = HslColor::new(0, 0, 100);
pub const DEFAULT_BORDER_HSL: HslColor = HslColor::new(0, 0, 90);
pub const DEFAULT_BG_INITIAL: Hsla = Hsla::new(0, 0, 100, 0);
pub const DEFAULT_BG_SCROLLED: Hsla = Hsla::new(0, 0, 100, 95);

pub fn default_link_color() -> ColorValue {
    ColorValue::named(DEFAULT_LINK_TOKEN, WHITE)
}

pub fn default_border_color() -> ColorValue {
    ColorValue::hsl(DEFAULT_BORDER_HSL)
}

macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident, default = $default:ident, { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [&'static str] = &[$($text),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($text => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$default
            }
        }
    };
}

string_enum!(LinkType, default = Internal, {
    Internal => "internal",
    External => "external",
    Anchor => "anchor",
});

string_enum!(ButtonVariant, default = Primary, {
    Primary => "primary",
    Secondary => "secondary",
    Outline => "outline",
    Ghost => "ghost",
});

string_enum!(ButtonSize, default = Md, {
    Sm => "sm",
    Md => "md",
    Lg => "lg",
});

string_enum!(FloatingPosition, default = BottomRight, {
    BottomRight => "bottom-right",
    BottomLeft => "bottom-left",
    BottomCenter => "bottom-center",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Logo {
    pub url: String,
    pub alt: String,
    pub max_width: u16,
    /// Logo shown once the page is scrolled. Empty means reuse `url`.
    pub scrolled_url: String,
}

impl Default for Logo {
    fn default() -> Self {
        Self {
            url: String::new(),
            alt: String::new(),
            max_width: DEFAULT_LOGO_MAX_WIDTH,
            scrolled_url: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backgrounds {
    pub initial: Hsla,
    pub scrolled: Hsla,
}

impl Default for Backgrounds {
    fn default() -> Self {
        Self {
            initial: DEFAULT_BG_INITIAL,
            scrolled: DEFAULT_BG_SCROLLED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Border {
    pub enabled: bool,
    /// Pixels.
    pub width: u8,
    pub color: ColorValue,
}

impl Default for Border {
    fn default() -> Self {
        Self {
            enabled: false,
            width: DEFAULT_BORDER_WIDTH,
            color: default_border_color(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavLink {
    pub label: String,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cta {
    pub enabled: bool,
    pub label: String,
    pub href: String,
    pub link_type: LinkType,
    pub variant: ButtonVariant,
    pub size: ButtonSize,
}

impl Default for Cta {
    fn default() -> Self {
        Self {
            enabled: false,
            label: DEFAULT_CTA_LABEL.to_string(),
            href: DEFAULT_CTA_HREF.to_string(),
            link_type: LinkType::default(),
            variant: ButtonVariant::default(),
            size: ButtonSize::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileFloating {
    pub enabled: bool,
    pub position: FloatingPosition,
    pub offset_x: u16,
    pub offset_y: u16,
    pub size: ButtonSize,
    pub variant: ButtonVariant,
}

impl Default for MobileFloating {
    fn default() -> Self {
        Self {
            enabled: false,
            position: FloatingPosition::default(),
            offset_x: DEFAULT_FLOATING_OFFSET,
            offset_y: DEFAULT_FLOATING_OFFSET,
            size: ButtonSize::default(),
            variant: ButtonVariant::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderAppearance {
    pub height: u16,
    pub sticky: bool,
    pub overlay: bool,
    pub logo: Logo,
    pub link: ColorValue,
    pub bg: Backgrounds,
    pub border: Border,
    pub nav: Vec<NavLink>,
    pub cta: Cta,
    pub mobile_floating: MobileFloating,
}

impl Default for HeaderAppearance {
    fn default() -> Self {
        Self {
            height: DEFAULT_HEIGHT,
            sticky: true,
            overlay: false,
            logo: Logo::default(),
            link: default_link_color(),
            bg: Backgrounds::default(),
            border: Border::default(),
            nav: Vec::new(),
            cta: Cta::default(),
            mobile_floating: MobileFloating::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_camel_case() {
        let value = serde_json::to_value(HeaderAppearance::default()).unwrap();
        assert_eq!(value["logo"]["maxWidth"], json!(160));
        assert_eq!(value["mobileFloating"]["position"], json!("bottom-right"));
        assert_eq!(value["cta"]["linkType"], json!("internal"));
        assert_eq!(value["link"]["kind"], json!("named"));
        assert_eq!(value["bg"]["scrolled"]["opacity"], json!(95));
    }

    #[test]
    fn enum_parse_matches_as_str() {
        for text in FloatingPosition::ALL {
            assert_eq!(FloatingPosition::parse(text).map(|p| p.as_str()), Some(*text));
        }
        assert_eq!(ButtonSize::parse("xl"), None);
    }
}
