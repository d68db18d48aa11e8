//! Document assembly: template lookup, placeholder maps, editing and output.
//!
//! One [`Assembler::generate`] call handles one request from start to
//! finish. Output is written to a temp file in the output directory and
//! renamed into place only once the whole document has been produced.

use crate::counter::InvoiceCounter;
use crate::docx::DocxPackage;
use crate::error::{GenerateError, Result};
use crate::format::FontSpec;
use crate::image::{embed_image, ImageAsset, SIGNATURE_TOKEN};
use crate::invoice::{InvoiceSchedule, Money, PaymentScheme, Region};
use crate::substitute::{substitute, DocumentKind, PlaceholderMap, ADDRESS_TOKEN, CELL_FONT};
use chrono::NaiveDate;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

/// `dd-mm-yyyy`, used inside documents and invoice file names.
pub const DATE_FORMAT: &str = "%d-%m-%Y";
/// `dd Mon yyyy`, used in agreement file names.
pub const FILE_DATE_FORMAT: &str = "%d %b %Y";

/// Accept `dd-mm-yyyy` (as printed in documents) or ISO `yyyy-mm-dd`.
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    let input = input.trim();
    NaiveDate::parse_from_str(input, DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(input, "%Y-%m-%d"))
        .map_err(|_| GenerateError::invalid(format!("unrecognised date '{}'", input)))
}

/// Which template file a request needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKey {
    Nda,
    Contract,
    Invoice {
        region: Region,
        scheme: PaymentScheme,
    },
}

impl TemplateKey {
    pub fn file_name(self) -> String {
        match self {
            TemplateKey::Nda => "NDA Template 1.docx".to_string(),
            TemplateKey::Contract => "Contract Template 1.docx".to_string(),
            TemplateKey::Invoice { region, scheme } => {
                let layout = match scheme {
                    PaymentScheme::OnePayment => "1 Payment",
                    PaymentScheme::ThreeEmi => "3 EMI Payment Schedule",
                    PaymentScheme::FiveEmi => "5 EMI Payment Schedule",
                };
                format!("Invoice Template - {} - {} 1.docx", region.code(), layout)
            }
        }
    }

    pub fn kind(self) -> DocumentKind {
        match self {
            TemplateKey::Nda => DocumentKind::Nda,
            TemplateKey::Contract => DocumentKind::Contract,
            TemplateKey::Invoice { .. } => DocumentKind::Invoice,
        }
    }
}

impl fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateKey::Invoice { region, scheme } => write!(f, "Invoice ({}, {})", region, scheme),
            other => f.write_str(other.kind().label()),
        }
    }
}

/// Where templates come from, where output goes, and the title font.
#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    /// Directory holding the template .docx files
    pub template_dir: PathBuf,
    /// Directory generated documents are written to
    pub output_dir: PathBuf,
    /// Font family for replaced text in an agreement's title paragraph
    pub font_name: String,
    /// Title size override in points; `None` uses the kind's own size
    pub font_size: Option<f32>,
}

impl AssemblerConfig {
    /// Title font for `kind`: 11 pt for NDAs and 12 pt otherwise, unless overridden.
    pub fn title_font(&self, kind: DocumentKind) -> FontSpec {
        FontSpec::new(
            self.font_name.as_str(),
            self.font_size.unwrap_or_else(|| kind.cell_font_size()),
        )
    }
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            template_dir: PathBuf::from("."),
            output_dir: std::env::temp_dir(),
            font_name: CELL_FONT.to_string(),
            font_size: None,
        }
    }
}

/// Form values for an NDA or Contract.
#[derive(Debug, Clone)]
pub struct AgreementFields {
    pub client_name: String,
    pub company_name: String,
    pub address: String,
    pub date: NaiveDate,
    pub signature: Option<ImageAsset>,
}

impl AgreementFields {
    pub fn placeholders(&self) -> PlaceholderMap {
        let date = self.date.format(DATE_FORMAT).to_string();
        PlaceholderMap::new()
            .with("<< Client Name >>", self.client_name.as_str())
            .with("<<Company Name>>", self.company_name.as_str())
            .with(ADDRESS_TOKEN, self.address.as_str())
            .with("<< Date >>", date.as_str())
            .with("<< Date (Signature) >>", date)
    }
}

/// Form values for an invoice.
#[derive(Debug, Clone)]
pub struct InvoiceFields {
    pub client_name: String,
    pub client_address: String,
    /// Falls back to the address when absent.
    pub client_email: Option<String>,
    pub project_name: String,
    pub phone_number: String,
    pub gst_number: String,
    pub base_amount: Money,
    pub region: Region,
    pub scheme: PaymentScheme,
    pub date: NaiveDate,
    pub signature: Option<ImageAsset>,
}

impl InvoiceFields {
    /// Client-supplied placeholders; amounts and the invoice number are added
    /// by the assembler.
    pub fn placeholders(&self) -> PlaceholderMap {
        let email = self
            .client_email
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or(&self.client_address);
        PlaceholderMap::new()
            .with("<<Client Name>>", self.client_name.as_str())
            .with("<<Client Address>>", self.client_address.as_str())
            .with("<<Client Email>>", email)
            .with("<<Project Name>>", self.project_name.as_str())
            .with("<<Mobile Number>>", self.phone_number.as_str())
            .with("<<GST Number>>", self.gst_number.as_str())
            .with("<<Date>>", self.date.format(DATE_FORMAT).to_string())
    }
}

#[derive(Debug, Clone)]
pub enum GenerationRequest {
    Nda(AgreementFields),
    Contract(AgreementFields),
    Invoice(InvoiceFields),
}

impl GenerationRequest {
    pub fn template_key(&self) -> TemplateKey {
        match self {
            GenerationRequest::Nda(_) => TemplateKey::Nda,
            GenerationRequest::Contract(_) => TemplateKey::Contract,
            GenerationRequest::Invoice(f) => TemplateKey::Invoice {
                region: f.region,
                scheme: f.scheme,
            },
        }
    }
}

/// A finished document on disk.
#[derive(Debug, Clone)]
pub struct GeneratedDocument {
    pub path: PathBuf,
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub invoice_number: Option<u64>,
}

/// Keep letters, digits and whitespace; everything else becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Strip characters no file system accepts, keeping the name readable.
fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

fn short_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}

/// Load `template`, substitute, optionally embed the signature, and return
/// the new package bytes. Any load/parse/save fault is a substitution failure.
pub fn edit_template(
    template: &Path,
    placeholders: &PlaceholderMap,
    kind: DocumentKind,
    font: &FontSpec,
    signature: Option<&ImageAsset>,
) -> Result<Vec<u8>> {
    let mut package = DocxPackage::open(template).map_err(GenerateError::edit)?;
    let mut doc = package.document().map_err(GenerateError::edit)?;

    let replaced = substitute(&mut doc, placeholders, font, kind);
    log::debug!(
        "{}: replaced {} placeholder occurrence(s)",
        template.display(),
        replaced
    );

    if let Some(asset) = signature {
        embed_image(&mut doc, &mut package, SIGNATURE_TOKEN, asset)?;
    }

    package.set_document(&doc);
    package.to_bytes().map_err(GenerateError::edit)
}

/// Generates documents from templates.
pub struct Assembler<C> {
    config: AssemblerConfig,
    counter: C,
}

impl<C: InvoiceCounter> Assembler<C> {
    pub fn new(config: AssemblerConfig, counter: C) -> Self {
        Self { config, counter }
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    pub fn counter(&self) -> &C {
        &self.counter
    }

    pub fn template_path(&self, key: TemplateKey) -> Result<PathBuf> {
        let path = self.config.template_dir.join(key.file_name());
        if path.is_file() {
            Ok(path)
        } else {
            Err(GenerateError::TemplateNotFound {
                key: key.to_string(),
                path,
            })
        }
    }

    pub fn generate(&self, request: &GenerationRequest) -> Result<GeneratedDocument> {
        match request {
            GenerationRequest::Nda(fields) => self.generate_agreement(TemplateKey::Nda, fields),
            GenerationRequest::Contract(fields) => {
                self.generate_agreement(TemplateKey::Contract, fields)
            }
            GenerationRequest::Invoice(fields) => self.generate_invoice(fields),
        }
    }

    fn generate_agreement(
        &self,
        key: TemplateKey,
        fields: &AgreementFields,
    ) -> Result<GeneratedDocument> {
        let template = self.template_path(key)?;
        let bytes = edit_template(
            &template,
            &fields.placeholders(),
            key.kind(),
            &self.config.title_font(key.kind()),
            fields.signature.as_ref(),
        )?;

        let file_name = format!(
            "{} - {} {} - {}.docx",
            key.kind().label(),
            file_safe(&fields.client_name),
            fields.date.format(FILE_DATE_FORMAT),
            short_id()
        );
        let path = self.persist(&file_name, &bytes)?;
        log::info!("Generated {} at {}", key, path.display());
        Ok(GeneratedDocument {
            path,
            file_name,
            bytes,
            invoice_number: None,
        })
    }

    fn generate_invoice(&self, fields: &InvoiceFields) -> Result<GeneratedDocument> {
        if !fields.region.schemes().contains(&fields.scheme) {
            return Err(GenerateError::invalid(format!(
                "{} invoices do not offer {}",
                fields.region, fields.scheme
            )));
        }
        let key = TemplateKey::Invoice {
            region: fields.region,
            scheme: fields.scheme,
        };
        let template = self.template_path(key)?;

        let schedule = InvoiceSchedule::compute(fields.base_amount, fields.scheme);
        let invoice_number = self.counter.next()?;

        let mut placeholders = fields.placeholders();
        for (token, value) in schedule.placeholders(fields.region).iter() {
            placeholders.insert(token, value);
        }
        placeholders.insert("<<Invoice>>", invoice_number.to_string());

        let bytes = edit_template(
            &template,
            &placeholders,
            DocumentKind::Invoice,
            &self.config.title_font(DocumentKind::Invoice),
            fields.signature.as_ref(),
        )?;

        let file_name = format!(
            "Invoice_{}_{}_{}.docx",
            sanitize_file_name(&fields.client_name),
            fields.date.format(DATE_FORMAT),
            invoice_number
        );
        let path = self.persist(&file_name, &bytes)?;
        log::info!(
            "Generated invoice {} ({}) at {}",
            invoice_number,
            key,
            path.display()
        );
        Ok(GeneratedDocument {
            path,
            file_name,
            bytes,
            invoice_number: Some(invoice_number),
        })
    }

    /// Write through a temp file in the output directory, then rename.
    fn persist(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let dir = &self.config.output_dir;
        std::fs::create_dir_all(dir).map_err(GenerateError::edit)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(GenerateError::edit)?;
        tmp.write_all(bytes).map_err(GenerateError::edit)?;
        let path = dir.join(file_name);
        tmp.persist(&path).map_err(|e| GenerateError::edit(e.error))?;
        Ok(path)
    }
}
