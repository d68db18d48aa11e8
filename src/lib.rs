//! Document Generation Toolkit
//!
//! Fills NDA, Contract and Invoice Word templates from form values.
//!
//! This library provides:
//! - `assembler`: Template lookup, placeholder maps and output for one request
//! - `substitute`: Placeholder replacement over a parsed document
//! - `image`: Signature image embedding
//! - `invoice`: Tax, totals and installment schedules
//! - `counter`: Persistent invoice numbering
//! - `pipeline`: Batch generation from CSV
//! - `docx`, `document`, `xml`: Package, document model and XML tree
//!
//! Binaries:
//! - `docgen`: Command-line front end for single and batch generation

pub mod assembler;
pub mod counter;
pub mod document;
pub mod docx;
pub mod error;
pub mod format;
pub mod image;
pub mod invoice;
pub mod pipeline;
pub mod substitute;
pub mod words;
pub mod xml;

pub use assembler::{
    AgreementFields, Assembler, AssemblerConfig, GeneratedDocument, GenerationRequest,
    InvoiceFields, TemplateKey,
};
pub use counter::{FileCounter, InvoiceCounter, MemoryCounter};
pub use docx::DOCX_MIME;
pub use error::{GenerateError, Result};
pub use invoice::{InvoiceSchedule, Money, PaymentScheme, Region};
pub use substitute::{DocumentKind, PlaceholderMap};
