use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::context::SizeContext;
use crate::error::{CtmlError, CtmlResult};

/// Pixels per centimeter at the CSS reference density of 96 dpi.
pub const CM_TO_PX: f64 = 37.795275590551181102362204724409;

/// Which dimension a percentage resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Width,
    Height,
}

/// The supported unit suffixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    Pixel,
    Centimeter,
    Millimeter,
    QuarterMillimeter,
    Inch,
    Pica,
    Point,
    Percentage,
    Em,
    ViewWidth,
    ViewHeight,
    RelativePercentage,
}

impl UnitKind {
    /// Maps a lowercase suffix to its unit. Unknown suffixes fall back to pixels.
    pub fn from_suffix(suffix: &str) -> UnitKind {
        match suffix {
            "cm" => UnitKind::Centimeter,
            "mm" => UnitKind::Millimeter,
            "q" => UnitKind::QuarterMillimeter,
            "in" => UnitKind::Inch,
            "pc" => UnitKind::Pica,
            "pt" => UnitKind::Point,
            "px" => UnitKind::Pixel,
            "%" => UnitKind::Percentage,
            "em" => UnitKind::Em,
            "vh" => UnitKind::ViewHeight,
            "vw" => UnitKind::ViewWidth,
            "rp" => UnitKind::RelativePercentage,
            _ => UnitKind::Pixel,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            UnitKind::Pixel => "px",
            UnitKind::Centimeter => "cm",
            UnitKind::Millimeter => "mm",
            UnitKind::QuarterMillimeter => "q",
            UnitKind::Inch => "in",
            UnitKind::Pica => "pc",
            UnitKind::Point => "pt",
            UnitKind::Percentage => "%",
            UnitKind::Em => "em",
            UnitKind::ViewHeight => "vh",
            UnitKind::ViewWidth => "vw",
            UnitKind::RelativePercentage => "rp",
        }
    }
}

/// Strips everything a unit string may not contain before matching.
static FILTER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^a-z0-9.%-]+").unwrap()
});

/// A numeric prefix followed by an optional trailing suffix.
static UNIT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(-?[0-9]*\.?[0-9]*?)([a-z%]+)?$").unwrap()
});

/// A CSS-like measurement: a number plus a unit suffix.
///
/// Absolute units resolve on their own; `em`, percentages and viewport
/// units need a [`SizeContext`] (and percentages an [`Axis`]).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardUnit {
    pub kind: UnitKind,
    pub value: f64,
}

impl CardUnit {
    pub const ZERO: CardUnit = CardUnit {
        kind: UnitKind::Pixel,
        value: 0.0,
    };

    pub fn new(kind: UnitKind, value: f64) -> Self {
        Self { kind, value }
    }

    pub fn pixels(value: f64) -> Self {
        Self::new(UnitKind::Pixel, value)
    }

    /// Parses a unit string like `"12px"`, `"-30.5mm"` or `"30%"`.
    ///
    /// `"0"`, the empty string, and anything that filters down to nothing
    /// yield [`CardUnit::ZERO`] before any suffix inference happens. A
    /// missing or unknown suffix means pixels.
    pub fn parse(text: &str) -> CtmlResult<CardUnit> {
        let lowered = text.trim().to_lowercase();
        if lowered.is_empty() || lowered == "0" {
            return Ok(CardUnit::ZERO);
        }

        let cleaned = FILTER_PATTERN.replace_all(&lowered, "");
        if cleaned.is_empty() || cleaned == "0" {
            return Ok(CardUnit::ZERO);
        }

        let caps = UNIT_PATTERN
            .captures(&cleaned)
            .ok_or_else(|| CtmlError::InvalidUnitFormat {
                value: text.to_string(),
            })?;

        let number = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let value: f64 = number.parse().map_err(|_| CtmlError::InvalidUnitFormat {
            value: text.to_string(),
        })?;

        let kind = caps
            .get(2)
            .map(|m| UnitKind::from_suffix(m.as_str()))
            .unwrap_or(UnitKind::Pixel);

        Ok(CardUnit { kind, value })
    }

    /// Resolves the unit to whole pixels.
    ///
    /// A zero value always resolves to `0`, whatever the kind. Relative
    /// kinds fail with [`CtmlError::MissingContext`] when the context (or,
    /// for percentages, the axis) is absent. Rounding is half-to-even.
    pub fn resolve_pixels(
        &self,
        context: Option<&SizeContext>,
        axis: Option<Axis>,
    ) -> CtmlResult<i32> {
        if self.value == 0.0 {
            return Ok(0);
        }

        let pixels = match self.kind {
            UnitKind::Pixel => self.value,
            UnitKind::Centimeter => self.value * CM_TO_PX,
            UnitKind::Millimeter => self.value * CM_TO_PX / 10.0,
            UnitKind::QuarterMillimeter => self.value * CM_TO_PX / 10.0 / 4.0,
            UnitKind::Inch => self.value * 96.0,
            UnitKind::Pica => self.value * 96.0 / 6.0,
            UnitKind::Point => self.value / (72.0 / 96.0),
            UnitKind::Em => {
                let ctx = self.require_context(context, "an em needs a font size")?;
                self.value * f64::from(ctx.font_size())
            }
            UnitKind::ViewWidth => {
                let ctx = self.require_context(context, "a viewport unit needs the chain root")?;
                self.value / 100.0 * f64::from(ctx.root_width())
            }
            UnitKind::ViewHeight => {
                let ctx = self.require_context(context, "a viewport unit needs the chain root")?;
                self.value / 100.0 * f64::from(ctx.root_height())
            }
            UnitKind::Percentage => {
                let ctx = self.require_context(context, "a percentage needs a parent dimension")?;
                let axis = axis.ok_or_else(|| CtmlError::MissingContext {
                    unit: self.to_string(),
                    reason: "a percentage needs an axis to resolve against".to_string(),
                })?;
                let dimension = match axis {
                    Axis::Width => ctx.width(),
                    Axis::Height => ctx.height(),
                };
                self.value / 100.0 * f64::from(dimension)
            }
            UnitKind::RelativePercentage => {
                let ctx = self.require_context(context, "a relative percentage needs both parent dimensions")?;
                self.value / 100.0 * (f64::from(ctx.width()) + f64::from(ctx.height())) / 2.0
            }
        };

        Ok(pixels.round_ties_even() as i32)
    }

    fn require_context<'c>(
        &self,
        context: Option<&'c SizeContext>,
        reason: &str,
    ) -> CtmlResult<&'c SizeContext> {
        context.ok_or_else(|| CtmlError::MissingContext {
            unit: self.to_string(),
            reason: reason.to_string(),
        })
    }
}

impl fmt::Display for CardUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.kind.symbol())
    }
}

impl FromStr for CardUnit {
    type Err = CtmlError;

    fn from_str(s: &str) -> CtmlResult<Self> {
        CardUnit::parse(s)
    }
}

impl Serialize for CardUnit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CardUnit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        CardUnit::parse(&text).map_err(serde::de::Error::custom)
    }
}
