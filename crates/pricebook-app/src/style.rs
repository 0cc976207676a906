// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Reads presentation metadata (cell fills) as domain data.
//!
//! Price lists mark tag cells with a background color. The convention the
//! sheets follow is captured by [`SolidFillTags`]: only a solid fill with an
//! explicit RGB foreground counts, and the two defaults producers write for
//! "no color" (`00000000` and `FFFFFFFF`) are ignored.

use crate::model::{CellFill, FillPattern, TagColor};

const TRANSPARENT_BLACK: &str = "00000000";
const OPAQUE_WHITE: &str = "FFFFFFFF";

/// Maps a tag cell's fill to the color a line item carries.
pub trait TagStyle {
    fn tag_color(&self, fill: Option<&CellFill>) -> Option<TagColor>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolidFillTags;

impl TagStyle for SolidFillTags {
    fn tag_color(&self, fill: Option<&CellFill>) -> Option<TagColor> {
        let fill = fill?;
        if fill.pattern != FillPattern::Solid {
            return None;
        }
        let rgb = fill.fg_rgb.as_deref()?.trim();
        if rgb.eq_ignore_ascii_case(TRANSPARENT_BLACK) || rgb.eq_ignore_ascii_case(OPAQUE_WHITE) {
            return None;
        }
        if rgb.len() < 6 || !rgb.is_ascii() {
            return None;
        }
        // Drop the alpha byte: the color is the last six hex digits.
        TagColor::from_hex(&rgb[rgb.len() - 6..])
    }
}

/// Ignores fills entirely; every item comes out untagged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoTagColors;

impl TagStyle for NoTagColors {
    fn tag_color(&self, _fill: Option<&CellFill>) -> Option<TagColor> {
        None
    }
}
