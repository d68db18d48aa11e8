//! Typed view over `word/document.xml`.
//!
//! The body is split into [`Block`]s (paragraphs, tables, anything else kept
//! raw). Paragraphs hold [`Run`]s, tables hold rows of [`Cell`]s. Only the
//! properties the generator edits are modelled; everything else rides along
//! as raw [`Node`]s so a parse/serialize cycle leaves the part intact.

use crate::xml::{self, Element, Node, XmlError};

pub const W_BODY: &str = "w:body";
pub const W_P: &str = "w:p";
pub const W_PPR: &str = "w:pPr";
pub const W_R: &str = "w:r";
pub const W_RPR: &str = "w:rPr";
pub const W_T: &str = "w:t";
pub const W_TAB: &str = "w:tab";
pub const W_BR: &str = "w:br";
pub const W_CR: &str = "w:cr";
pub const W_TBL: &str = "w:tbl";
pub const W_TR: &str = "w:tr";
pub const W_TC: &str = "w:tc";
pub const W_TCPR: &str = "w:tcPr";

/// Schema order of `w:pPr` children (CT_PPr).
const PPR_ORDER: &[&str] = &[
    "w:pStyle",
    "w:keepNext",
    "w:keepLines",
    "w:pageBreakBefore",
    "w:framePr",
    "w:widowControl",
    "w:numPr",
    "w:suppressLineNumbers",
    "w:pBdr",
    "w:shd",
    "w:tabs",
    "w:suppressAutoHyphens",
    "w:kinsoku",
    "w:wordWrap",
    "w:overflowPunct",
    "w:topLinePunct",
    "w:autoSpaceDE",
    "w:autoSpaceDN",
    "w:bidi",
    "w:adjustRightInd",
    "w:snapToGrid",
    "w:spacing",
    "w:ind",
    "w:contextualSpacing",
    "w:mirrorIndents",
    "w:suppressOverlap",
    "w:jc",
    "w:textDirection",
    "w:textAlignment",
    "w:textboxTightWrap",
    "w:outlineLvl",
    "w:divId",
    "w:cnfStyle",
    "w:rPr",
    "w:sectPr",
    "w:pPrChange",
];

/// Schema order of `w:tcPr` children (CT_TcPr).
const TCPR_ORDER: &[&str] = &[
    "w:cnfStyle",
    "w:tcW",
    "w:gridSpan",
    "w:hMerge",
    "w:vMerge",
    "w:tcBorders",
    "w:shd",
    "w:noWrap",
    "w:tcMar",
    "w:textDirection",
    "w:tcFitText",
    "w:vAlign",
    "w:hideMark",
];

/// Paragraph alignment (`w:jc`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
    Right,
    Justify,
}

impl Alignment {
    fn as_val(self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
            Alignment::Justify => "both",
        }
    }

    fn from_val(val: &str) -> Option<Self> {
        match val {
            "left" | "start" => Some(Alignment::Left),
            "center" => Some(Alignment::Center),
            "right" | "end" => Some(Alignment::Right),
            "both" | "distribute" => Some(Alignment::Justify),
            _ => None,
        }
    }
}

/// Cell vertical alignment (`w:vAlign`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalAlignment {
    Top,
    Center,
    Bottom,
}

impl VerticalAlignment {
    fn as_val(self) -> &'static str {
        match self {
            VerticalAlignment::Top => "top",
            VerticalAlignment::Center => "center",
            VerticalAlignment::Bottom => "bottom",
        }
    }

    fn from_val(val: &str) -> Option<Self> {
        match val {
            "top" => Some(VerticalAlignment::Top),
            "center" => Some(VerticalAlignment::Center),
            "bottom" => Some(VerticalAlignment::Bottom),
            _ => None,
        }
    }
}

// ============================================================================
// Blocks
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
    Other(Node),
}

impl Block {
    fn from_node(node: Node) -> Self {
        match node {
            Node::Element(e) if e.name == W_P => Block::Paragraph(Paragraph::from_element(e)),
            Node::Element(e) if e.name == W_TBL => Block::Table(Table::from_element(e)),
            other => Block::Other(other),
        }
    }

    fn to_node(&self) -> Node {
        match self {
            Block::Paragraph(p) => Node::Element(p.to_element()),
            Block::Table(t) => Node::Element(t.to_element()),
            Block::Other(n) => n.clone(),
        }
    }
}

/// Convert container children to blocks, dropping inter-element whitespace.
fn blocks_from(children: Vec<Node>) -> Vec<Block> {
    children
        .into_iter()
        .filter(|n| !matches!(n, Node::Text(t) if t.trim().is_empty()))
        .map(Block::from_node)
        .collect()
}

// ============================================================================
// Runs
// ============================================================================

/// Smallest styled text span (`w:r`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Run {
    attributes: Vec<(String, String)>,
    properties: Option<Element>,
    content: Vec<Node>,
}

fn is_text_bearing(node: &Node) -> bool {
    match node {
        Node::Element(e) => matches!(e.name.as_str(), W_T | W_TAB | W_BR | W_CR),
        Node::Text(_) => true,
        Node::Raw(_) => false,
    }
}

/// Split text into `w:t` / `w:tab` / `w:br` nodes.
fn text_nodes(text: &str) -> Vec<Node> {
    let mut nodes = Vec::new();
    let mut segment = String::new();
    let flush = |segment: &mut String, nodes: &mut Vec<Node>| {
        if !segment.is_empty() {
            let mut t = Element::new(W_T).with_attr("xml:space", "preserve");
            t.children.push(Node::Text(std::mem::take(segment)));
            nodes.push(Node::Element(t));
        }
    };
    for ch in text.chars() {
        match ch {
            '\t' => {
                flush(&mut segment, &mut nodes);
                nodes.push(Node::Element(Element::new(W_TAB)));
            }
            '\n' => {
                flush(&mut segment, &mut nodes);
                nodes.push(Node::Element(Element::new(W_BR)));
            }
            '\r' => {}
            c => segment.push(c),
        }
    }
    flush(&mut segment, &mut nodes);
    nodes
}

impl Run {
    pub fn new(text: &str) -> Self {
        Self {
            attributes: Vec::new(),
            properties: None,
            content: text_nodes(text),
        }
    }

    fn from_element(el: Element) -> Self {
        let mut properties = None;
        let mut content = Vec::new();
        for child in el.children {
            match child {
                Node::Element(e) if e.name == W_RPR && properties.is_none() => {
                    properties = Some(e)
                }
                other => content.push(other),
            }
        }
        Self {
            attributes: el.attributes,
            properties,
            content,
        }
    }

    fn to_element(&self) -> Element {
        let mut el = Element::new(W_R);
        el.attributes = self.attributes.clone();
        if let Some(props) = &self.properties {
            el.children.push(Node::Element(props.clone()));
        }
        el.children.extend(self.content.iter().cloned());
        el
    }

    /// Visible text: `w:t` content, tabs as `\t`, breaks as `\n`.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.content {
            if let Node::Element(e) = node {
                match e.name.as_str() {
                    W_T => out.push_str(&e.text()),
                    W_TAB => out.push('\t'),
                    W_BR | W_CR => out.push('\n'),
                    _ => {}
                }
            }
        }
        out
    }

    /// Replace the run's text, keeping non-text children (drawings, field chars).
    pub fn set_text(&mut self, text: &str) {
        let at = self
            .content
            .iter()
            .position(is_text_bearing)
            .unwrap_or(self.content.len());
        self.content.retain(|n| !is_text_bearing(n));
        let at = at.min(self.content.len());
        self.content.splice(at..at, text_nodes(text));
    }

    pub fn properties(&self) -> Option<&Element> {
        self.properties.as_ref()
    }

    /// Run properties, created on first use.
    pub fn properties_mut(&mut self) -> &mut Element {
        self.properties.get_or_insert_with(|| Element::new(W_RPR))
    }

    /// Append a raw child such as a `w:drawing`.
    pub fn push(&mut self, node: Node) {
        self.content.push(node);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.content.iter().any(|n| n.is_element(name))
    }
}

// ============================================================================
// Paragraphs
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Run(Run),
    Other(Node),
}

/// A `w:p` paragraph.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Paragraph {
    attributes: Vec<(String, String)>,
    properties: Option<Element>,
    content: Vec<Inline>,
}

impl Paragraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paragraph with one run per text fragment, for building fixtures.
    pub fn from_runs<'a>(fragments: impl IntoIterator<Item = &'a str>) -> Self {
        let mut p = Self::new();
        for fragment in fragments {
            p.push_run(Run::new(fragment));
        }
        p
    }

    fn from_element(el: Element) -> Self {
        let mut properties = None;
        let mut content = Vec::new();
        for child in el.children {
            match child {
                Node::Element(e) if e.name == W_PPR && properties.is_none() => {
                    properties = Some(e)
                }
                Node::Element(e) if e.name == W_R => content.push(Inline::Run(Run::from_element(e))),
                Node::Text(t) if t.trim().is_empty() => {}
                other => content.push(Inline::Other(other)),
            }
        }
        Self {
            attributes: el.attributes,
            properties,
            content,
        }
    }

    fn to_element(&self) -> Element {
        let mut el = Element::new(W_P);
        el.attributes = self.attributes.clone();
        if let Some(props) = &self.properties {
            el.children.push(Node::Element(props.clone()));
        }
        for item in &self.content {
            el.children.push(match item {
                Inline::Run(r) => Node::Element(r.to_element()),
                Inline::Other(n) => n.clone(),
            });
        }
        el
    }

    /// Concatenated text of the paragraph's direct runs.
    pub fn text(&self) -> String {
        self.runs().map(Run::text).collect()
    }

    pub fn runs(&self) -> impl Iterator<Item = &Run> {
        self.content.iter().filter_map(|i| match i {
            Inline::Run(r) => Some(r),
            Inline::Other(_) => None,
        })
    }

    pub fn runs_mut(&mut self) -> impl Iterator<Item = &mut Run> {
        self.content.iter_mut().filter_map(|i| match i {
            Inline::Run(r) => Some(r),
            Inline::Other(_) => None,
        })
    }

    pub fn push_run(&mut self, run: Run) {
        self.content.push(Inline::Run(run));
    }

    /// Remove all content, keeping paragraph properties.
    pub fn clear(&mut self) {
        self.content.clear();
    }

    pub fn alignment(&self) -> Option<Alignment> {
        self.properties
            .as_ref()
            .and_then(|p| p.child("w:jc"))
            .and_then(|jc| jc.attr("w:val"))
            .and_then(Alignment::from_val)
    }

    pub fn set_alignment(&mut self, alignment: Alignment) {
        self.properties
            .get_or_insert_with(|| Element::new(W_PPR))
            .ensure_child("w:jc", PPR_ORDER)
            .set_attr("w:val", alignment.as_val());
    }
}

// ============================================================================
// Tables
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum TableItem {
    Row(Row),
    Other(Node),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowItem {
    Cell(Cell),
    Other(Node),
}

/// A `w:tbl` table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    attributes: Vec<(String, String)>,
    content: Vec<TableItem>,
}

/// A `w:tr` row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    attributes: Vec<(String, String)>,
    content: Vec<RowItem>,
}

/// A `w:tc` cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cell {
    attributes: Vec<(String, String)>,
    properties: Option<Element>,
    blocks: Vec<Block>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    fn from_element(el: Element) -> Self {
        let content = el
            .children
            .into_iter()
            .filter(|n| !matches!(n, Node::Text(t) if t.trim().is_empty()))
            .map(|n| match n {
                Node::Element(e) if e.name == W_TR => TableItem::Row(Row::from_element(e)),
                other => TableItem::Other(other),
            })
            .collect();
        Self {
            attributes: el.attributes,
            content,
        }
    }

    fn to_element(&self) -> Element {
        let mut el = Element::new(W_TBL);
        el.attributes = self.attributes.clone();
        for item in &self.content {
            el.children.push(match item {
                TableItem::Row(r) => Node::Element(r.to_element()),
                TableItem::Other(n) => n.clone(),
            });
        }
        el
    }

    pub fn push_row(&mut self, row: Row) {
        self.content.push(TableItem::Row(row));
    }

    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.content.iter().filter_map(|i| match i {
            TableItem::Row(r) => Some(r),
            TableItem::Other(_) => None,
        })
    }

    pub fn rows_mut(&mut self) -> impl Iterator<Item = &mut Row> {
        self.content.iter_mut().filter_map(|i| match i {
            TableItem::Row(r) => Some(r),
            TableItem::Other(_) => None,
        })
    }
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    fn from_element(el: Element) -> Self {
        let content = el
            .children
            .into_iter()
            .filter(|n| !matches!(n, Node::Text(t) if t.trim().is_empty()))
            .map(|n| match n {
                Node::Element(e) if e.name == W_TC => RowItem::Cell(Cell::from_element(e)),
                other => RowItem::Other(other),
            })
            .collect();
        Self {
            attributes: el.attributes,
            content,
        }
    }

    fn to_element(&self) -> Element {
        let mut el = Element::new(W_TR);
        el.attributes = self.attributes.clone();
        for item in &self.content {
            el.children.push(match item {
                RowItem::Cell(c) => Node::Element(c.to_element()),
                RowItem::Other(n) => n.clone(),
            });
        }
        el
    }

    pub fn push_cell(&mut self, cell: Cell) {
        self.content.push(RowItem::Cell(cell));
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.content.iter().filter_map(|i| match i {
            RowItem::Cell(c) => Some(c),
            RowItem::Other(_) => None,
        })
    }

    pub fn cells_mut(&mut self) -> impl Iterator<Item = &mut Cell> {
        self.content.iter_mut().filter_map(|i| match i {
            RowItem::Cell(c) => Some(c),
            RowItem::Other(_) => None,
        })
    }
}

impl Cell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_paragraph(mut self, paragraph: Paragraph) -> Self {
        self.blocks.push(Block::Paragraph(paragraph));
        self
    }

    pub fn with_table(mut self, table: Table) -> Self {
        self.blocks.push(Block::Table(table));
        self
    }

    fn from_element(el: Element) -> Self {
        let mut properties = None;
        let mut rest = Vec::new();
        for child in el.children {
            match child {
                Node::Element(e) if e.name == W_TCPR && properties.is_none() => {
                    properties = Some(e)
                }
                other => rest.push(other),
            }
        }
        Self {
            attributes: el.attributes,
            properties,
            blocks: blocks_from(rest),
        }
    }

    fn to_element(&self) -> Element {
        let mut el = Element::new(W_TC);
        el.attributes = self.attributes.clone();
        if let Some(props) = &self.properties {
            el.children.push(Node::Element(props.clone()));
        }
        el.children.extend(self.blocks.iter().map(Block::to_node));
        el
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn blocks_mut(&mut self) -> &mut Vec<Block> {
        &mut self.blocks
    }

    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Paragraph(p) => Some(p),
            _ => None,
        })
    }

    pub fn paragraphs_mut(&mut self) -> impl Iterator<Item = &mut Paragraph> {
        self.blocks.iter_mut().filter_map(|b| match b {
            Block::Paragraph(p) => Some(p),
            _ => None,
        })
    }

    /// Text of the cell's own paragraphs, one line per paragraph.
    pub fn text(&self) -> String {
        self.paragraphs()
            .map(Paragraph::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Replace the whole cell content with a single paragraph holding one run.
    /// Existing paragraph and run formatting is discarded; cell properties stay.
    pub fn set_text(&mut self, text: &str) {
        let mut p = Paragraph::new();
        p.push_run(Run::new(text));
        self.blocks = vec![Block::Paragraph(p)];
    }

    pub fn vertical_alignment(&self) -> Option<VerticalAlignment> {
        self.properties
            .as_ref()
            .and_then(|p| p.child("w:vAlign"))
            .and_then(|v| v.attr("w:val"))
            .and_then(VerticalAlignment::from_val)
    }

    pub fn set_vertical_alignment(&mut self, alignment: VerticalAlignment) {
        self.properties
            .get_or_insert_with(|| Element::new(W_TCPR))
            .ensure_child("w:vAlign", TCPR_ORDER)
            .set_attr("w:val", alignment.as_val());
    }
}

// ============================================================================
// Document
// ============================================================================

const DOCUMENT_NAMESPACES: &[(&str, &str)] = &[
    (
        "xmlns:w",
        "http://schemas.openxmlformats.org/wordprocessingml/2006/main",
    ),
    (
        "xmlns:r",
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships",
    ),
    (
        "xmlns:wp",
        "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing",
    ),
];

/// The main document part.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    declaration: bool,
    /// `w:document` with the body child left as a placeholder slot.
    root: Element,
    body_index: usize,
    body_attributes: Vec<(String, String)>,
    blocks: Vec<Block>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty document with the standard namespaces.
    pub fn new() -> Self {
        let mut root = Element::new("w:document");
        for (k, v) in DOCUMENT_NAMESPACES {
            root.set_attr(k, *v);
        }
        root.children.push(Node::Element(Element::new(W_BODY)));
        Self {
            declaration: true,
            root,
            body_index: 0,
            body_attributes: Vec::new(),
            blocks: Vec::new(),
        }
    }

    pub fn parse(xml_text: &str) -> Result<Self, XmlError> {
        let parsed = xml::parse(xml_text)?;
        let mut root = parsed.root;
        let body_index = root
            .children
            .iter()
            .position(|n| n.is_element(W_BODY))
            .ok_or(XmlError::Missing(W_BODY))?;
        let body = std::mem::replace(
            &mut root.children[body_index],
            Node::Element(Element::new(W_BODY)),
        );
        let Node::Element(body) = body else {
            return Err(XmlError::Missing(W_BODY));
        };
        Ok(Self {
            declaration: parsed.declaration,
            root,
            body_index,
            body_attributes: body.attributes,
            blocks: blocks_from(body.children),
        })
    }

    pub fn to_xml(&self) -> String {
        let mut root = self.root.clone();
        let mut body = Element::new(W_BODY);
        body.attributes = self.body_attributes.clone();
        body.children = self.blocks.iter().map(Block::to_node).collect();
        root.children[self.body_index] = Node::Element(body);
        xml::XmlDocument {
            declaration: self.declaration,
            root,
        }
        .to_xml()
    }

    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn blocks_mut(&mut self) -> &mut Vec<Block> {
        &mut self.blocks
    }

    /// Top-level body paragraphs in document order.
    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Paragraph(p) => Some(p),
            _ => None,
        })
    }

    pub fn paragraphs_mut(&mut self) -> impl Iterator<Item = &mut Paragraph> {
        self.blocks.iter_mut().filter_map(|b| match b {
            Block::Paragraph(p) => Some(p),
            _ => None,
        })
    }

    /// Top-level body tables in document order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Table(t) => Some(t),
            _ => None,
        })
    }

    pub fn tables_mut(&mut self) -> impl Iterator<Item = &mut Table> {
        self.blocks.iter_mut().filter_map(|b| match b {
            Block::Table(t) => Some(t),
            _ => None,
        })
    }
}
