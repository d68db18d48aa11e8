//! Placeholder substitution over a parsed document.
//!
//! Tokens are matched literally (`<<Client Name>>`). Paragraphs are edited
//! run by run: a token whose characters straddle two runs is not replaced and
//! stays visible in the output. Table cells in agreements are rewritten at
//! cell level and re-styled; invoices keep run-level edits everywhere and
//! embolden amount fields.

use crate::document::{Alignment, Cell, Document, Paragraph, Run, VerticalAlignment};
use crate::format::{self, FontSpec};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Token whose cell is left-aligned instead of centered.
pub const ADDRESS_TOKEN: &str = "<<Address>>";
/// Token receiving the invoice total spelled out.
pub const AMOUNT_IN_WORDS_TOKEN: &str = "<<Amt to word>>";
/// Font forced onto rewritten table cells.
pub const CELL_FONT: &str = "Times New Roman";

/// Kind of document being generated; selects the substitution rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Nda,
    Contract,
    Invoice,
}

impl DocumentKind {
    pub fn label(self) -> &'static str {
        match self {
            DocumentKind::Nda => "NDA",
            DocumentKind::Contract => "Contract",
            DocumentKind::Invoice => "Invoice",
        }
    }

    /// Point size used for rewritten table cells.
    pub fn cell_font_size(self) -> f32 {
        match self {
            DocumentKind::Nda => 11.0,
            _ => 12.0,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nda" => Ok(DocumentKind::Nda),
            "contract" => Ok(DocumentKind::Contract),
            "invoice" => Ok(DocumentKind::Invoice),
            other => Err(format!("unknown document kind '{}'", other)),
        }
    }
}

/// Token → replacement text for one generation request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceholderMap(BTreeMap<String, String>);

impl PlaceholderMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, token: impl Into<String>, value: impl Into<String>) {
        self.0.insert(token.into(), value.into());
    }

    pub fn with(mut self, token: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(token, value);
        self
    }

    pub fn get(&self, token: &str) -> Option<&str> {
        self.0.get(token).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PlaceholderMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// True for invoice tokens whose value is a money amount.
fn is_amount_token(token: &str) -> bool {
    token.starts_with("<<Price")
        || token.starts_with("<<Total")
        || token.eq_ignore_ascii_case(AMOUNT_IN_WORDS_TOKEN)
}

/// Replace `token` inside every run of `para` that holds it whole.
/// Calls `on_replace` for each edited run and returns the occurrence count.
fn replace_in_runs(
    para: &mut Paragraph,
    token: &str,
    value: &str,
    mut on_replace: impl FnMut(&mut Run),
) -> usize {
    let mut count = 0;
    for run in para.runs_mut() {
        let text = run.text();
        if text.contains(token) {
            count += text.matches(token).count();
            run.set_text(&text.replace(token, value));
            on_replace(run);
        }
    }
    count
}

/// Cell-level replacement for agreements: rewrite the text, then normalize
/// alignment and font for the whole cell. A cell that held the address is
/// left-aligned whatever else it held; other rewritten cells are centered.
fn replace_in_cell(cell: &mut Cell, placeholders: &PlaceholderMap, size_pt: f32) -> usize {
    if cell.text().trim().is_empty() {
        return 0;
    }
    let mut count = 0;
    let mut has_address = false;
    for (token, value) in placeholders.iter() {
        let text = cell.text();
        if !text.contains(token) {
            continue;
        }
        count += text.matches(token).count();
        has_address |= token == ADDRESS_TOKEN;
        cell.set_text(&text.replace(token, value));
        log::debug!("Cell {} -> {:?}", token, value);
    }
    if count == 0 {
        return 0;
    }

    let alignment = if has_address {
        Alignment::Left
    } else {
        Alignment::Center
    };
    for para in cell.paragraphs_mut() {
        para.set_alignment(alignment);
        for run in para.runs_mut() {
            format::apply(run, CELL_FONT, size_pt, false);
        }
    }
    cell.set_vertical_alignment(VerticalAlignment::Center);
    count
}

/// Substitute every placeholder in `doc` in place.
///
/// `font` styles replaced text in the first (title) paragraph of agreements.
/// Returns the number of token occurrences replaced; unknown tokens and
/// tokens split across runs are left as they are.
pub fn substitute(
    doc: &mut Document,
    placeholders: &PlaceholderMap,
    font: &FontSpec,
    kind: DocumentKind,
) -> usize {
    let mut replaced = 0;

    for (index, para) in doc.paragraphs_mut().enumerate() {
        if para.text().is_empty() {
            continue;
        }
        for (token, value) in placeholders.iter() {
            if !para.text().contains(token) {
                continue;
            }
            let n = match kind {
                DocumentKind::Invoice => replace_in_runs(para, token, value, |run| {
                    if is_amount_token(token) {
                        format::set_bold(run, true);
                    }
                }),
                DocumentKind::Nda | DocumentKind::Contract => {
                    replace_in_runs(para, token, value, |run| {
                        if index == 0 {
                            format::apply(run, &font.name, font.size_pt, true);
                        }
                    })
                }
            };
            if n > 0 {
                log::debug!("Paragraph {}: {} -> {:?} ({}x)", index, token, value, n);
            }
            replaced += n;
        }
    }

    for table in doc.tables_mut() {
        for row in table.rows_mut() {
            for cell in row.cells_mut() {
                replaced += match kind {
                    DocumentKind::Invoice => replace_in_invoice_cell(cell, placeholders),
                    DocumentKind::Nda | DocumentKind::Contract => {
                        replace_in_cell(cell, placeholders, kind.cell_font_size())
                    }
                };
            }
        }
    }

    replaced
}

/// Invoice cells keep their run formatting; amount runs become bold.
fn replace_in_invoice_cell(cell: &mut Cell, placeholders: &PlaceholderMap) -> usize {
    let mut count = 0;
    for (token, value) in placeholders.iter() {
        if !cell.text().contains(token) {
            continue;
        }
        for para in cell.paragraphs_mut() {
            count += replace_in_runs(para, token, value, |run| {
                if is_amount_token(token) {
                    format::set_bold(run, true);
                }
            });
        }
    }
    count
}
