//! Edit module core types
//!
//! Size change descriptors, rotate and combine targets, pipeline options and
//! the edit/selection error types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::codec::ResampleFilter;
use crate::combine::Direction;
use crate::page_spec::{parse_page_number, PageNumber};
use crate::record::EditKind;

// ============================================================
// Error Types
// ============================================================

/// A failed edit on one page
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Image {} Failed: {message}", stage_verb(.stage))]
pub struct EditError {
    pub stage: EditKind,
    pub message: String,
}

impl EditError {
    pub fn new(stage: EditKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

fn stage_verb(stage: &EditKind) -> &'static str {
    match stage {
        EditKind::Resize => "Resize",
        EditKind::Rotate => "Rotation",
        EditKind::Combine => "Combining",
    }
}

/// An edit target that is not part of the resolved selection
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionError {
    #[error("Image Rotation Failed: Page {page} not found in selection")]
    RotateTarget { page: i64 },

    #[error("Image Combining Failed: Page {} not found in selection", missing_pages(.pages))]
    CombineTargets { pages: Vec<i64> },
}

fn missing_pages(pages: &[i64]) -> String {
    pages
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(" and ")
}

pub type Result<T> = std::result::Result<T, EditError>;

// ============================================================
// Size Changes
// ============================================================

/// How one image dimension changes during resize.
///
/// In configuration a bare integer means [`SizeChange::ChangeTo`] and a
/// string such as `"50%"` means [`SizeChange::ModifyByPercent`]; every mode
/// can also be written as a table, e.g. `{ mode = "downscale", value = 1080 }`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawSizeChange", into = "RawSizeChange")]
pub enum SizeChange {
    #[default]
    NoChange,
    /// Set the dimension to exactly this many pixels
    ChangeTo(u32),
    /// Add (or subtract) pixels
    ModifyByPixels(i64),
    /// Scale by a percentage of the current size
    ModifyByPercent(f64),
    /// Grow to this size; never shrinks
    Upscale(u32),
    /// Shrink to this size; never grows
    Downscale(u32),
}

impl SizeChange {
    /// Whether this descriptor changes the dimension at all
    pub fn is_change(&self) -> bool {
        !matches!(self, SizeChange::NoChange)
    }

    /// Apply to a current dimension, before aspect-ratio correction
    pub fn apply(&self, current: u32) -> f64 {
        let current_f = current as f64;
        match *self {
            SizeChange::NoChange => current_f,
            SizeChange::ChangeTo(n) => n as f64,
            SizeChange::ModifyByPixels(delta) => current_f + delta as f64,
            SizeChange::ModifyByPercent(percent) => current_f * percent / 100.0,
            SizeChange::Upscale(n) => current_f.max(n as f64),
            SizeChange::Downscale(n) => current_f.min(n as f64),
        }
    }
}

impl fmt::Display for SizeChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeChange::NoChange => write!(f, "no change"),
            SizeChange::ChangeTo(n) => write!(f, "change to {}", n),
            SizeChange::ModifyByPixels(n) => write!(f, "{:+} pixels", n),
            SizeChange::ModifyByPercent(p) => write!(f, "{}%", p),
            SizeChange::Upscale(n) => write!(f, "upscale to {}", n),
            SizeChange::Downscale(n) => write!(f, "downscale to {}", n),
        }
    }
}

/// Command line form: `160`, `+20`, `-20`, `50%`, `up:1080`, `down:1080`
/// or `no-change`
impl FromStr for SizeChange {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("no-change") || s == "0" {
            return Ok(SizeChange::NoChange);
        }
        if s.ends_with('%') {
            return parse_percent(s).map(SizeChange::ModifyByPercent);
        }
        if let Some((mode, value)) = s.split_once(':') {
            let pixels = value
                .trim()
                .parse::<u32>()
                .map_err(|_| format!("invalid pixel count {:?}", value))?;
            return match mode.trim().to_ascii_lowercase().as_str() {
                "up" | "upscale" => Ok(SizeChange::Upscale(pixels)),
                "down" | "downscale" => Ok(SizeChange::Downscale(pixels)),
                "to" | "change-to" => Ok(SizeChange::ChangeTo(pixels)),
                other => Err(format!("unknown size mode {:?}", other)),
            };
        }
        if s.starts_with('+') || s.starts_with('-') {
            return s
                .parse::<i64>()
                .map(SizeChange::ModifyByPixels)
                .map_err(|_| format!("invalid pixel offset {:?}", s));
        }
        s.parse::<u32>()
            .map(SizeChange::ChangeTo)
            .map_err(|_| format!("invalid size {:?}", s))
    }
}

/// Size change modes as written in configuration tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SizeChangeMode {
    NoChange,
    ChangeTo,
    ModifyByPixels,
    ModifyByPercent,
    Upscale,
    Downscale,
}

/// Serialized form of [`SizeChange`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawSizeChange {
    Pixels(i64),
    Text(String),
    Table {
        mode: SizeChangeMode,
        #[serde(default)]
        value: Option<PercentOrNumber>,
    },
}

/// A table value: a number, or a percent string for `modify-by-percent`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PercentOrNumber {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl PercentOrNumber {
    fn as_f64(&self) -> std::result::Result<f64, String> {
        match self {
            PercentOrNumber::Integer(n) => Ok(*n as f64),
            PercentOrNumber::Float(f) => Ok(*f),
            PercentOrNumber::Text(s) => parse_percent(s),
        }
    }
}

/// Parse `"50%"`, `"50"` or `"12.5 %"` into a percentage
pub fn parse_percent(s: &str) -> std::result::Result<f64, String> {
    let trimmed = s.trim().trim_end_matches('%').trim();
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite())
        .ok_or_else(|| format!("can't decipher what kind of number this is: {:?}", s))
}

fn to_pixels(value: f64, mode: SizeChangeMode) -> std::result::Result<u32, String> {
    if value.fract() != 0.0 || value < 0.0 || value > u32::MAX as f64 {
        return Err(format!("{:?} needs a whole, non-negative pixel count, got {}", mode, value));
    }
    Ok(value as u32)
}

impl TryFrom<RawSizeChange> for SizeChange {
    type Error = String;

    fn try_from(raw: RawSizeChange) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawSizeChange::Pixels(0) => Ok(SizeChange::NoChange),
            RawSizeChange::Pixels(n) => u32::try_from(n)
                .map(SizeChange::ChangeTo)
                .map_err(|_| format!("size must be positive, got {}", n)),
            RawSizeChange::Text(s) => {
                if s.trim().eq_ignore_ascii_case("no-change") {
                    Ok(SizeChange::NoChange)
                } else {
                    parse_percent(&s).map(SizeChange::ModifyByPercent)
                }
            }
            RawSizeChange::Table { mode, value } => {
                let value = match (mode, value) {
                    (SizeChangeMode::NoChange, _) => return Ok(SizeChange::NoChange),
                    (_, None) => return Err(format!("{:?} requires a value", mode)),
                    (_, Some(v)) => v.as_f64()?,
                };
                match mode {
                    SizeChangeMode::NoChange => Ok(SizeChange::NoChange),
                    SizeChangeMode::ChangeTo => to_pixels(value, mode).map(SizeChange::ChangeTo),
                    SizeChangeMode::ModifyByPixels => {
                        if value.fract() != 0.0 {
                            return Err(format!("pixel offset must be whole, got {}", value));
                        }
                        Ok(SizeChange::ModifyByPixels(value as i64))
                    }
                    SizeChangeMode::ModifyByPercent => Ok(SizeChange::ModifyByPercent(value)),
                    SizeChangeMode::Upscale => to_pixels(value, mode).map(SizeChange::Upscale),
                    SizeChangeMode::Downscale => to_pixels(value, mode).map(SizeChange::Downscale),
                }
            }
        }
    }
}

impl From<SizeChange> for RawSizeChange {
    fn from(change: SizeChange) -> Self {
        let table = |mode, value| RawSizeChange::Table { mode, value };
        match change {
            SizeChange::NoChange => table(SizeChangeMode::NoChange, None),
            SizeChange::ChangeTo(n) => RawSizeChange::Pixels(n as i64),
            SizeChange::ModifyByPixels(n) => {
                table(SizeChangeMode::ModifyByPixels, Some(PercentOrNumber::Integer(n)))
            }
            SizeChange::ModifyByPercent(p) => RawSizeChange::Text(format!("{}%", p)),
            SizeChange::Upscale(n) => {
                table(SizeChangeMode::Upscale, Some(PercentOrNumber::Integer(n as i64)))
            }
            SizeChange::Downscale(n) => {
                table(SizeChangeMode::Downscale, Some(PercentOrNumber::Integer(n as i64)))
            }
        }
    }
}

// ============================================================
// Rotate and Combine Targets
// ============================================================

/// Which pages the rotate stage turns, counter-clockwise in degrees
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RotateSpec {
    /// No rotation
    #[default]
    None,
    /// Every selected page by the same angle
    All(f32),
    /// Specific pages, plus an angle for every other selected page
    Pages {
        #[serde(default)]
        pages: BTreeMap<String, f32>,
        #[serde(default)]
        all: Option<f32>,
    },
}

impl RotateSpec {
    /// Rotate every selected page by `degrees`
    pub fn all(degrees: f32) -> Self {
        RotateSpec::All(degrees)
    }

    /// Rotate specific pages, optionally every other selected page too
    pub fn pages(pages: &[(i64, f32)], all: Option<f32>) -> Self {
        RotateSpec::Pages {
            pages: pages.iter().map(|(p, d)| (p.to_string(), *d)).collect(),
            all,
        }
    }

    /// Whether any page could be rotated
    pub fn is_empty(&self) -> bool {
        match self {
            RotateSpec::None => true,
            RotateSpec::All(degrees) => *degrees == 0.0,
            RotateSpec::Pages { pages, all } => {
                pages.is_empty() && all.map_or(true, |d| d == 0.0)
            }
        }
    }

    /// Page targets as signed page numbers; non-numeric keys are disabled
    pub fn targets(&self) -> Vec<(PageNumber, f32)> {
        match self {
            RotateSpec::Pages { pages, .. } => pages
                .iter()
                .map(|(key, degrees)| {
                    let page = match key.trim().parse::<i64>() {
                        Ok(n) => PageNumber::Number(n),
                        Err(_) => PageNumber::Disabled(key.clone()),
                    };
                    (page, *degrees)
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Angle for selected pages without a specific entry
    pub fn all_angle(&self) -> Option<f32> {
        match self {
            RotateSpec::None => None,
            RotateSpec::All(degrees) => Some(*degrees),
            RotateSpec::Pages { all, .. } => *all,
        }
    }
}

/// One combine instruction: page `a` absorbs page `b` along `direction`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombineSpec {
    #[serde(default)]
    pub direction: Direction,
    pub a: PageNumber,
    pub b: PageNumber,
}

impl CombineSpec {
    pub fn new(direction: Direction, a: i64, b: i64) -> Self {
        Self {
            direction,
            a: PageNumber::Number(a),
            b: PageNumber::Number(b),
        }
    }

    pub fn horizontal(a: i64, b: i64) -> Self {
        Self::new(Direction::Horizontal, a, b)
    }

    pub fn vertical(a: i64, b: i64) -> Self {
        Self::new(Direction::Vertical, a, b)
    }

    /// Whether either page reference is disabled
    pub fn is_disabled(&self) -> bool {
        self.a.is_disabled() || self.b.is_disabled()
    }
}

/// Command line form: `4:5` (horizontal), `h:4:5` or `v:4:6`
impl FromStr for CombineSpec {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        let (direction, a, b) = match parts.as_slice() {
            [a, b] => (Direction::Horizontal, *a, *b),
            [dir, a, b] => {
                let direction = match dir.to_ascii_lowercase().as_str() {
                    "h" | "horizontal" => Direction::Horizontal,
                    "v" | "vertical" => Direction::Vertical,
                    other => return Err(format!("unknown direction {:?}", other)),
                };
                (direction, *a, *b)
            }
            _ => return Err(format!("expected [h|v:]PAGE:PAGE, got {:?}", s)),
        };
        Ok(Self {
            direction,
            a: parse_page_number(a).map_err(|e| e.to_string())?,
            b: parse_page_number(b).map_err(|e| e.to_string())?,
        })
    }
}

// ============================================================
// Options
// ============================================================

/// Edit pipeline options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditOptions {
    /// Width change
    pub width: SizeChange,
    /// Height change
    pub height: SizeChange,
    /// Keep the aspect ratio when only one dimension changes
    pub keep_aspect_ratio: bool,
    /// Rotation targets
    pub rotate: RotateSpec,
    /// Combine instructions, applied in order
    pub combine: Vec<CombineSpec>,
    /// Resampling filter for every stage
    pub resample: ResampleFilter,
    /// When combining, scale the larger image down (true) or the smaller up
    pub shrink_larger: bool,
}

impl Default for EditOptions {
    fn default() -> Self {
        Self {
            width: SizeChange::NoChange,
            height: SizeChange::NoChange,
            keep_aspect_ratio: true,
            rotate: RotateSpec::None,
            combine: Vec::new(),
            resample: ResampleFilter::Nearest,
            shrink_larger: true,
        }
    }
}

impl EditOptions {
    /// Create a new options builder
    pub fn builder() -> EditOptionsBuilder {
        EditOptionsBuilder::default()
    }

    /// Whether the resize stage has anything to do
    pub fn has_resize(&self) -> bool {
        self.width.is_change() || self.height.is_change()
    }

    /// Whether no edits are configured
    pub fn is_identity(&self) -> bool {
        !self.has_resize() && self.rotate.is_empty() && self.combine.is_empty()
    }
}

/// Builder for [`EditOptions`]
#[derive(Debug, Default)]
pub struct EditOptionsBuilder {
    options: EditOptions,
}

impl EditOptionsBuilder {
    #[must_use]
    pub fn width(mut self, change: SizeChange) -> Self {
        self.options.width = change;
        self
    }

    #[must_use]
    pub fn height(mut self, change: SizeChange) -> Self {
        self.options.height = change;
        self
    }

    #[must_use]
    pub fn keep_aspect_ratio(mut self, keep: bool) -> Self {
        self.options.keep_aspect_ratio = keep;
        self
    }

    #[must_use]
    pub fn rotate(mut self, rotate: RotateSpec) -> Self {
        self.options.rotate = rotate;
        self
    }

    /// Append one combine instruction
    #[must_use]
    pub fn combine(mut self, spec: CombineSpec) -> Self {
        self.options.combine.push(spec);
        self
    }

    #[must_use]
    pub fn resample(mut self, filter: ResampleFilter) -> Self {
        self.options.resample = filter;
        self
    }

    #[must_use]
    pub fn shrink_larger(mut self, shrink: bool) -> Self {
        self.options.shrink_larger = shrink;
        self
    }

    pub fn build(self) -> EditOptions {
        self.options
    }
}
