//! End-to-end generation against Word-style templates
//!
//! Templates are assembled in memory as raw `.docx` zips, the way Word lays
//! them out (split runs, run properties, extra parts), written to a temp
//! directory, and then run through the public `Assembler` API.

use chrono::NaiveDate;
use docgen_toolkit::document::{Alignment, Document, VerticalAlignment};
use docgen_toolkit::docx::DocxPackage;
use docgen_toolkit::format::{font_of, is_bold};
use docgen_toolkit::image::ImageAsset;
use docgen_toolkit::{
    AgreementFields, Assembler, AssemblerConfig, FileCounter, GenerateError, GenerationRequest,
    InvoiceFields, MemoryCounter, Money, PaymentScheme, Region, TemplateKey,
};
use std::io::{Cursor, Write};
use std::path::Path;

const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:style w:type="paragraph" w:styleId="Title"/></w:styles>"#;

const PNG_1X1: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

/// Wrap body XML in a full package with styles and relationships.
fn build_docx(body: &str) -> Vec<u8> {
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing"><w:body>{}<w:sectPr><w:pgSz w:w="11906" w:h="16838"/></w:sectPr></w:body></w:document>"#,
        body
    );
    let parts: Vec<(&str, String)> = vec![
        (
            "[Content_Types].xml",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/></Types>"#
                .to_string(),
        ),
        (
            "_rels/.rels",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#
                .to_string(),
        ),
        ("word/document.xml", document),
        (
            "word/_rels/document.xml.rels",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#
                .to_string(),
        ),
        ("word/styles.xml", STYLES_XML.to_string()),
    ];

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for (name, content) in parts {
        zip.start_file(name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn p(runs: &[&str]) -> String {
    let runs: String = runs
        .iter()
        .map(|t| format!(r#"<w:r><w:rPr><w:i/></w:rPr><w:t xml:space="preserve">{}</w:t></w:r>"#, t))
        .collect();
    format!("<w:p>{}</w:p>", runs)
}

fn table(cells: &[&str]) -> String {
    let cells: String = cells
        .iter()
        .map(|c| format!(r#"<w:tc><w:tcPr><w:tcW w:w="4000" w:type="dxa"/></w:tcPr>{}</w:tc>"#, p(&[c])))
        .collect();
    format!(r#"<w:tbl><w:tblPr/><w:tr>{}</w:tr></w:tbl>"#, cells)
}

fn esc(s: &str) -> String {
    s.replace('<', "&lt;").replace('>', "&gt;")
}

fn write_template(dir: &Path, key: TemplateKey, body: &str) {
    std::fs::write(dir.join(key.file_name()), build_docx(body)).unwrap();
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
}

fn agreement(signature: Option<ImageAsset>) -> AgreementFields {
    AgreementFields {
        client_name: "Jane Doe".into(),
        company_name: "Acme Ltd".into(),
        address: "12 High Street".into(),
        date: date(),
        signature,
    }
}

fn invoice(client: &str, scheme: PaymentScheme, region: Region) -> InvoiceFields {
    InvoiceFields {
        client_name: client.into(),
        client_address: "9 Market Road".into(),
        client_email: Some("billing@example.com".into()),
        project_name: "Website".into(),
        phone_number: "+91 98765 43210".into(),
        gst_number: "29ABCDE1234F1Z5".into(),
        base_amount: Money::parse("333.33").unwrap(),
        region,
        scheme,
        date: date(),
        signature: None,
    }
}

fn config(templates: &Path, output: &Path) -> AssemblerConfig {
    AssemblerConfig {
        template_dir: templates.to_path_buf(),
        output_dir: output.to_path_buf(),
        ..AssemblerConfig::default()
    }
}

fn parse_output(bytes: &[u8]) -> (DocxPackage, Document) {
    let package = DocxPackage::from_bytes(bytes).unwrap();
    let doc = package.document().unwrap();
    (package, doc)
}

fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[test]
fn test_nda_from_word_template() {
    let templates = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let body = [
        p(&[&esc("Mutual NDA with << Client Name >>")]),
        p(&[&esc("Effective << Date >> between <<Company Name>> and "), &esc("<< Client "), &esc("Name >>")]),
        table(&[&esc("<<Address>>"), &esc("Signed << Date (Signature) >>")]),
    ]
    .concat();
    write_template(templates.path(), TemplateKey::Nda, &body);

    let assembler = Assembler::new(
        AssemblerConfig {
            font_name: "Arial".into(),
            font_size: Some(14.0),
            ..config(templates.path(), output.path())
        },
        MemoryCounter::default(),
    );
    let generated = assembler
        .generate(&GenerationRequest::Nda(agreement(None)))
        .unwrap();
    let (package, doc) = parse_output(&generated.bytes);

    // Untouched parts survive byte for byte
    assert_eq!(package.part("word/styles.xml"), Some(STYLES_XML.as_bytes()));

    let paragraphs: Vec<_> = doc.paragraphs().collect();
    assert_eq!(paragraphs[0].text(), "Mutual NDA with Jane Doe");
    let title_run = paragraphs[0].runs().next().unwrap();
    assert!(is_bold(title_run));
    assert_eq!(font_of(title_run), (Some("Arial".to_string()), Some(14.0)));

    // A token split across runs stays literally in place
    assert_eq!(
        paragraphs[1].text(),
        "Effective 01-07-2024 between Acme Ltd and << Client Name >>"
    );
    assert!(!is_bold(paragraphs[1].runs().next().unwrap()));

    let row = doc.tables().next().unwrap().rows().next().unwrap();
    let cells: Vec<_> = row.cells().collect();
    assert_eq!(cells[0].text(), "12 High Street");
    assert_eq!(cells[1].text(), "Signed 01-07-2024");

    let address = cells[0].paragraphs().next().unwrap();
    assert_eq!(address.alignment(), Some(Alignment::Left));
    assert_eq!(
        font_of(address.runs().next().unwrap()),
        (Some("Times New Roman".to_string()), Some(11.0))
    );
    assert_eq!(
        cells[1].paragraphs().next().unwrap().alignment(),
        Some(Alignment::Center)
    );
    assert_eq!(cells[1].vertical_alignment(), Some(VerticalAlignment::Center));
}

#[test]
fn test_contract_with_signature_in_cell() {
    let templates = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let body = [
        p(&[&esc("Contract for << Client Name >>")]),
        table(&[&esc("<<Signature>>"), "Authorised signatory"]),
    ]
    .concat();
    write_template(templates.path(), TemplateKey::Contract, &body);

    let assembler = Assembler::new(
        config(templates.path(), output.path()),
        MemoryCounter::default(),
    );
    let signature = ImageAsset::from_bytes(PNG_1X1.to_vec()).unwrap();
    let generated = assembler
        .generate(&GenerationRequest::Contract(agreement(Some(signature))))
        .unwrap();
    assert!(generated.file_name.starts_with("Contract - Jane Doe 01 Jul 2024 - "));

    let (package, doc) = parse_output(&generated.bytes);
    let title_run = doc.paragraphs().next().unwrap().runs().next().unwrap();
    assert!(is_bold(title_run));
    assert_eq!(font_of(title_run), (Some("Times New Roman".to_string()), Some(12.0)));
    assert_eq!(package.part("word/media/image1.png"), Some(PNG_1X1));
    let rels = package.relationships().unwrap();
    // Existing styles relationship keeps rId1
    assert!(rels.iter().any(|(id, _, target)| id == "rId2" && target == "media/image1.png"));

    let xml = doc.to_xml();
    assert!(xml.contains(r#"<wp:extent cx="1828800" cy="731520"/>"#));
    assert!(!xml.contains("&lt;&lt;Signature&gt;&gt;"));
}

#[test]
fn test_missing_signature_placeholder_leaves_no_output() {
    let templates = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_template(templates.path(), TemplateKey::Nda, &p(&["No signature block"]));

    let assembler = Assembler::new(
        config(templates.path(), output.path()),
        MemoryCounter::default(),
    );
    let signature = ImageAsset::from_bytes(PNG_1X1.to_vec()).unwrap();
    let err = assembler
        .generate(&GenerationRequest::Nda(agreement(Some(signature))))
        .unwrap_err();
    assert!(matches!(err, GenerateError::PlaceholderNotFound(_)));
    assert_eq!(entries(output.path()), 0);
}

#[test]
fn test_invoices_share_a_persistent_counter() {
    let templates = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let state = tempfile::tempdir().unwrap();
    let counter_path = state.path().join("invoice_counter.txt");

    let key = TemplateKey::Invoice {
        region: Region::Inr,
        scheme: PaymentScheme::ThreeEmi,
    };
    let body = [
        p(&[&esc("Invoice No: <<Invoice>>")]),
        p(&[&esc("Bill to <<Client Name>>, <<Client Email>>, GST <<GST Number>>")]),
        table(&[&esc("<<Price 1>>"), &esc("<<Price 2>>"), &esc("<<Price 3>>")]),
        table(&[&esc("Tax <<Tax Rate>>: <<Price 4>>"), &esc("<<Total 1>>")]),
        p(&[&esc("Rupees <<Amt to word>> only")]),
    ]
    .concat();
    write_template(templates.path(), key, &body);

    let assembler = Assembler::new(
        config(templates.path(), output.path()),
        FileCounter::new(&counter_path),
    );

    let first = assembler
        .generate(&GenerationRequest::Invoice(invoice("Ravi & Sons", PaymentScheme::ThreeEmi, Region::Inr)))
        .unwrap();
    let second = assembler
        .generate(&GenerationRequest::Invoice(invoice("Meera", PaymentScheme::ThreeEmi, Region::Inr)))
        .unwrap();

    assert_eq!(first.invoice_number, Some(1000));
    assert_eq!(second.invoice_number, Some(1001));
    assert_eq!(first.file_name, "Invoice_Ravi _ Sons_01-07-2024_1000.docx");
    assert_eq!(
        std::fs::read_to_string(&counter_path).unwrap().trim(),
        "1002"
    );
    assert_eq!(entries(output.path()), 2);

    // 333.33 + 60 tax = 393.33 → 118 / 157 / 118.33
    let (_, doc) = parse_output(&first.bytes);
    let texts: Vec<String> = doc.paragraphs().map(|p| p.text()).collect();
    assert_eq!(texts[0], "Invoice No: 1000");
    assert_eq!(
        texts[1],
        "Bill to Ravi & Sons, billing@example.com, GST 29ABCDE1234F1Z5"
    );
    assert_eq!(texts[2], "Rupees Three Hundred And Ninety-Three only");
    assert!(is_bold(doc.paragraphs().nth(2).unwrap().runs().next().unwrap()));

    let tables: Vec<_> = doc.tables().collect();
    let prices: Vec<String> = tables[0].rows().next().unwrap().cells().map(|c| c.text()).collect();
    assert_eq!(prices, vec!["Rs. 118.00", "Rs. 157.00", "Rs. 118.33"]);
    let totals: Vec<String> = tables[1].rows().next().unwrap().cells().map(|c| c.text()).collect();
    assert_eq!(totals, vec!["Tax 18%: Rs. 60.00", "Rs. 393.33"]);

    // Invoice cells keep their own run formatting
    let cell_run = tables[0].rows().next().unwrap().cells().next().unwrap()
        .paragraphs().next().unwrap().runs().next().unwrap().clone();
    assert!(is_bold(&cell_run));
    assert!(cell_run.properties().unwrap().child("w:i").is_some());
}

#[test]
fn test_usd_five_emi() {
    let templates = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let key = TemplateKey::Invoice {
        region: Region::Usd,
        scheme: PaymentScheme::FiveEmi,
    };
    write_template(
        templates.path(),
        key,
        &p(&[&esc("<<Price 1>>|<<Price 5>>|<<Price 10>>|<<Total 1>>")]),
    );

    let assembler = Assembler::new(
        config(templates.path(), output.path()),
        MemoryCounter::new(7),
    );
    let mut fields = invoice("Globex", PaymentScheme::FiveEmi, Region::Usd);
    fields.base_amount = Money::from_units(10_000);
    let generated = assembler
        .generate(&GenerationRequest::Invoice(fields))
        .unwrap();

    let (_, doc) = parse_output(&generated.bytes);
    assert_eq!(
        doc.paragraphs().next().unwrap().text(),
        "USD 2,360.00|USD 2,360.00|USD 2,360.00|USD 11,800.00"
    );
    assert!(generated.file_name.ends_with("_7.docx"));
}
