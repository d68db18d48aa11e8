//! Run-level character formatting: font family, point size, bold.

use crate::document::Run;

/// Schema order of `w:rPr` children (CT_RPr), enough to place what we set.
const RPR_ORDER: &[&str] = &[
    "w:rStyle",
    "w:rFonts",
    "w:b",
    "w:bCs",
    "w:i",
    "w:iCs",
    "w:caps",
    "w:smallCaps",
    "w:strike",
    "w:dstrike",
    "w:outline",
    "w:shadow",
    "w:emboss",
    "w:imprint",
    "w:noProof",
    "w:snapToGrid",
    "w:vanish",
    "w:webHidden",
    "w:color",
    "w:spacing",
    "w:w",
    "w:kern",
    "w:position",
    "w:sz",
    "w:szCs",
    "w:highlight",
    "w:u",
    "w:effect",
    "w:bdr",
    "w:shd",
    "w:fitText",
    "w:vertAlign",
    "w:rtl",
    "w:cs",
    "w:em",
    "w:lang",
    "w:eastAsianLayout",
    "w:specVanish",
    "w:oMath",
];

/// Font family and size applied to generated text.
#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    pub name: String,
    pub size_pt: f32,
}

impl FontSpec {
    pub fn new(name: impl Into<String>, size_pt: f32) -> Self {
        Self {
            name: name.into(),
            size_pt,
        }
    }
}

impl Default for FontSpec {
    fn default() -> Self {
        Self::new("Times New Roman", 12.0)
    }
}

/// Set font family (including the east-Asian slot), size and bold on a run.
pub fn apply(run: &mut Run, font_name: &str, size_pt: f32, bold: bool) {
    let rpr = run.properties_mut();

    let fonts = rpr.ensure_child("w:rFonts", RPR_ORDER);
    fonts.set_attr("w:ascii", font_name);
    fonts.set_attr("w:hAnsi", font_name);
    fonts.set_attr("w:eastAsia", font_name);

    let b = rpr.ensure_child("w:b", RPR_ORDER);
    if bold {
        b.remove_attr("w:val");
    } else {
        b.set_attr("w:val", "0");
    }

    // Word stores sizes in half-points
    let half_points = (size_pt * 2.0).round() as u32;
    rpr.ensure_child("w:sz", RPR_ORDER)
        .set_attr("w:val", half_points.to_string());
}

/// Set only the bold flag, leaving font and size alone.
pub fn set_bold(run: &mut Run, bold: bool) {
    let b = run.properties_mut().ensure_child("w:b", RPR_ORDER);
    if bold {
        b.remove_attr("w:val");
    } else {
        b.set_attr("w:val", "0");
    }
}

/// Whether the run is directly marked bold.
pub fn is_bold(run: &Run) -> bool {
    run.properties()
        .and_then(|p| p.child("w:b"))
        .is_some_and(|b| !matches!(b.attr("w:val"), Some("0" | "false" | "off")))
}

/// Directly applied font family and size in points, if any.
pub fn font_of(run: &Run) -> (Option<String>, Option<f32>) {
    let props = run.properties();
    let name = props
        .and_then(|p| p.child("w:rFonts"))
        .and_then(|f| f.attr("w:ascii"))
        .map(str::to_string);
    let size = props
        .and_then(|p| p.child("w:sz"))
        .and_then(|s| s.attr("w:val"))
        .and_then(|v| v.parse::<f32>().ok())
        .map(|half| half / 2.0);
    (name, size)
}
