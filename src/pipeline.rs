//! Batch generation from a CSV file.
//!
//! Each data row describes one request. Rows that fail are logged, recorded
//! in the manifest, and skipped; the batch keeps going.

use crate::assembler::{
    parse_date, AgreementFields, Assembler, GenerationRequest, InvoiceFields,
};
use crate::counter::InvoiceCounter;
use crate::error::GenerateError;
use crate::image::ImageAsset;
use crate::invoice::Money;
use crate::substitute::DocumentKind;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// One input row. Columns not used by the row's kind may be left empty.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BatchRecord {
    pub kind: String,
    pub client_name: String,
    pub company_name: String,
    pub address: String,
    pub client_email: String,
    pub project_name: String,
    pub phone_number: String,
    pub gst_number: String,
    pub amount: String,
    pub region: String,
    pub scheme: String,
    /// `dd-mm-yyyy` or `yyyy-mm-dd`; empty means the batch date.
    pub date: String,
    /// Image path, relative to the CSV file's directory.
    pub signature: String,
}

impl BatchRecord {
    pub fn to_request(
        &self,
        default_date: NaiveDate,
        base_dir: &Path,
    ) -> crate::error::Result<GenerationRequest> {
        let kind: DocumentKind = self.kind.parse().map_err(GenerateError::InvalidInput)?;
        let date = if self.date.trim().is_empty() {
            default_date
        } else {
            parse_date(&self.date)?
        };
        let signature = if self.signature.trim().is_empty() {
            None
        } else {
            Some(ImageAsset::from_path(&base_dir.join(self.signature.trim()))?)
        };

        Ok(match kind {
            DocumentKind::Nda | DocumentKind::Contract => {
                let fields = AgreementFields {
                    client_name: self.client_name.clone(),
                    company_name: self.company_name.clone(),
                    address: self.address.clone(),
                    date,
                    signature,
                };
                if kind == DocumentKind::Nda {
                    GenerationRequest::Nda(fields)
                } else {
                    GenerationRequest::Contract(fields)
                }
            }
            DocumentKind::Invoice => GenerationRequest::Invoice(InvoiceFields {
                client_name: self.client_name.clone(),
                client_address: self.address.clone(),
                client_email: Some(self.client_email.clone()).filter(|e| !e.trim().is_empty()),
                project_name: self.project_name.clone(),
                phone_number: self.phone_number.clone(),
                gst_number: self.gst_number.clone(),
                base_amount: Money::parse(&self.amount)?,
                region: self.region.parse()?,
                scheme: self.scheme.parse()?,
                date,
                signature,
            }),
        })
    }
}

/// One manifest line per input row.
#[derive(Debug, Clone, Serialize)]
struct ManifestRow {
    row: usize,
    status: &'static str,
    file: String,
    invoice: String,
    error: String,
}

/// Configuration for a batch run.
pub struct BatchConfig {
    /// Input CSV path
    pub input: PathBuf,
    /// Manifest CSV path
    pub manifest: PathBuf,
    /// Date used for rows that leave `date` empty
    pub date: NaiveDate,
}

/// Progress information for a batch run.
pub struct BatchProgress {
    /// Rows finished so far
    pub completed: usize,
    /// Total number of data rows
    pub total: usize,
    /// Rows that failed
    pub failed: usize,
}

/// Outcome of a batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    /// Data rows in the input
    pub total: usize,
    /// Rows that produced a document
    pub generated: usize,
    /// Rows that failed and were skipped
    pub failed: usize,
    /// Whether the progress callback stopped the run early
    pub cancelled: bool,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let done = self.generated + self.failed;
        if self.cancelled {
            write!(
                f,
                "Cancelled after {} of {} rows ({} generated, {} failed)",
                done, self.total, self.generated, self.failed
            )
        } else {
            write!(
                f,
                "Done! Processed {} rows ({} generated, {} failed)",
                done, self.generated, self.failed
            )
        }
    }
}

/// Generate one document per CSV row and write a manifest.
///
/// Calls `on_progress` after each row. Return `false` from the callback to cancel.
pub fn run_batch<C: InvoiceCounter>(
    assembler: &Assembler<C>,
    config: &BatchConfig,
    mut on_progress: impl FnMut(&BatchProgress) -> bool,
) -> Result<BatchSummary> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(&config.input)
        .with_context(|| format!("Failed to open batch CSV {}", config.input.display()))?;
    let rows: Vec<csv::Result<BatchRecord>> = reader.deserialize().collect();
    let base_dir = config
        .input
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let mut writer =
        csv::Writer::from_path(&config.manifest).context("Failed to create manifest CSV")?;

    let mut summary = BatchSummary {
        total: rows.len(),
        generated: 0,
        failed: 0,
        cancelled: false,
    };

    for (index, row) in rows.into_iter().enumerate() {
        let row_num = index + 1;
        let outcome = row
            .map_err(|e| GenerateError::invalid(e.to_string()))
            .and_then(|record| record.to_request(config.date, &base_dir))
            .and_then(|request| assembler.generate(&request));

        let line = match outcome {
            Ok(doc) => {
                summary.generated += 1;
                ManifestRow {
                    row: row_num,
                    status: "ok",
                    file: doc.path.display().to_string(),
                    invoice: doc.invoice_number.map(|n| n.to_string()).unwrap_or_default(),
                    error: String::new(),
                }
            }
            Err(e) => {
                log::warn!("Row {}: {}", row_num, e);
                summary.failed += 1;
                ManifestRow {
                    row: row_num,
                    status: "failed",
                    file: String::new(),
                    invoice: String::new(),
                    error: e.to_string(),
                }
            }
        };
        writer.serialize(&line)?;

        let keep_going = on_progress(&BatchProgress {
            completed: row_num,
            total: summary.total,
            failed: summary.failed,
        });
        if !keep_going {
            summary.cancelled = true;
            break;
        }
    }

    writer.flush()?;
    log::info!("{}", summary);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::{AssemblerConfig, TemplateKey};
    use crate::counter::MemoryCounter;
    use crate::document::{Block, Document, Paragraph};
    use crate::docx::DocxPackage;
    use crate::invoice::{PaymentScheme, Region};

    fn fixture(dir: &Path, key: TemplateKey, text: &str) {
        let mut doc = Document::new();
        doc.push(Block::Paragraph(Paragraph::from_runs([text])));
        let bytes = DocxPackage::minimal(&doc).to_bytes().unwrap();
        std::fs::write(dir.join(key.file_name()), bytes).unwrap();
    }

    fn setup(csv: &str) -> (tempfile::TempDir, Assembler<MemoryCounter>, BatchConfig) {
        let dir = tempfile::tempdir().unwrap();
        let templates = dir.path().join("templates");
        std::fs::create_dir(&templates).unwrap();
        fixture(&templates, TemplateKey::Nda, "NDA for << Client Name >>");
        fixture(
            &templates,
            TemplateKey::Invoice {
                region: Region::Inr,
                scheme: PaymentScheme::OnePayment,
            },
            "Invoice <<Invoice>> total <<Total 1>>",
        );
        std::fs::write(dir.path().join("batch.csv"), csv).unwrap();

        let assembler = Assembler::new(
            AssemblerConfig {
                template_dir: templates,
                output_dir: dir.path().join("out"),
                ..AssemblerConfig::default()
            },
            MemoryCounter::default(),
        );
        let config = BatchConfig {
            input: dir.path().join("batch.csv"),
            manifest: dir.path().join("manifest.csv"),
            date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        };
        (dir, assembler, config)
    }

    const CSV: &str = "\
kind,client_name,address,amount,region,scheme,date
NDA,Jane Doe,1 Road,,,,
invoice,Bob,2 Street,1000,INR,1 Payment,15-02-2024
memo,Nobody,,,,,
invoice,Carol,3 Ave,-5,INR,1 Payment,
";

    #[test]
    fn test_batch_generates_and_records_failures() {
        let (dir, assembler, config) = setup(CSV);
        let mut seen = Vec::new();
        let summary = run_batch(&assembler, &config, |p| {
            seen.push((p.completed, p.total, p.failed));
            true
        })
        .unwrap();

        assert_eq!(
            summary,
            BatchSummary {
                total: 4,
                generated: 2,
                failed: 2,
                cancelled: false
            }
        );
        assert_eq!(seen, vec![(1, 4, 0), (2, 4, 0), (3, 4, 1), (4, 4, 2)]);

        let mut manifest = csv::Reader::from_path(dir.path().join("manifest.csv")).unwrap();
        let rows: Vec<csv::StringRecord> = manifest.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 4);
        assert_eq!(&rows[0][1], "ok");
        assert!(rows[0][2].contains("NDA - Jane Doe 31 Jan 2024 - "));
        assert_eq!(&rows[1][1], "ok");
        assert!(rows[1][2].ends_with("Invoice_Bob_15-02-2024_1000.docx"));
        assert_eq!(&rows[1][3], "1000");
        assert_eq!(&rows[2][1], "failed");
        assert!(rows[2][4].contains("unknown document kind"));
        assert_eq!(&rows[3][1], "failed");
        assert!(rows[3][4].contains("invalid input"));

        // Only the successful invoice consumed a number
        assert_eq!(assembler.counter().peek(), 1001);
    }

    #[test]
    fn test_batch_cancel() {
        let (dir, assembler, config) = setup(CSV);
        let summary = run_batch(&assembler, &config, |p| p.completed < 1).unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.generated, 1);
        assert!(summary.to_string().starts_with("Cancelled after 1 of 4 rows"));

        let manifest = std::fs::read_to_string(dir.path().join("manifest.csv")).unwrap();
        assert_eq!(manifest.lines().count(), 2);
    }

    #[test]
    fn test_missing_input_is_error() {
        let (dir, assembler, mut config) = setup(CSV);
        config.input = dir.path().join("nope.csv");
        assert!(run_batch(&assembler, &config, |_| true).is_err());
    }
}
