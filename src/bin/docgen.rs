//! docgen - Generate NDA, Contract and Invoice documents from Word templates
//!
//! Templates are looked up by name in the template directory; generated files
//! land in the output directory (system temp by default) and their paths are
//! printed on stdout.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use docgen_toolkit::assembler::{parse_date, AssemblerConfig};
use docgen_toolkit::counter::DEFAULT_COUNTER_FILE;
use docgen_toolkit::image::ImageAsset;
use docgen_toolkit::invoice::{format_percentage, format_price};
use docgen_toolkit::pipeline::{run_batch, BatchConfig};
use docgen_toolkit::words::amount_to_words;
use docgen_toolkit::{
    AgreementFields, Assembler, FileCounter, GenerationRequest, InvoiceFields, InvoiceSchedule,
    Money, PaymentScheme, Region,
};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "docgen")]
#[command(about = "Generate NDA, Contract and Invoice documents from Word templates")]
struct Cli {
    /// Directory holding the template .docx files
    #[arg(long, global = true, env = "DOCGEN_TEMPLATES", default_value = ".")]
    templates: PathBuf,

    /// Directory for generated documents (default: system temp directory)
    #[arg(long, global = true, env = "DOCGEN_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Invoice counter file
    #[arg(long, global = true, env = "DOCGEN_COUNTER", default_value = DEFAULT_COUNTER_FILE)]
    counter: PathBuf,

    /// Font for the agreement title paragraph
    #[arg(long, global = true, default_value = "Times New Roman")]
    font: String,

    /// Font size in points for the agreement title paragraph (default: 11 for NDAs, 12 otherwise)
    #[arg(long, global = true)]
    font_size: Option<f32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct AgreementArgs {
    /// Client name
    #[arg(long)]
    client: String,

    /// Company name
    #[arg(long)]
    company: String,

    /// Address (free text)
    #[arg(long)]
    address: String,

    /// Date, dd-mm-yyyy or yyyy-mm-dd (default: today)
    #[arg(long)]
    date: Option<String>,

    /// PNG or JPEG image for the <<Signature>> placeholder
    #[arg(long)]
    signature: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a non-disclosure agreement
    Nda(AgreementArgs),

    /// Generate a contract
    Contract(AgreementArgs),

    /// Generate an invoice (takes the next invoice number)
    Invoice {
        /// Client name
        #[arg(long)]
        client: String,

        /// Client address
        #[arg(long)]
        address: String,

        /// Client e-mail (default: the address)
        #[arg(long)]
        email: Option<String>,

        /// Project name
        #[arg(long)]
        project: String,

        /// Phone number
        #[arg(long)]
        phone: String,

        /// GST / tax ID number
        #[arg(long, default_value = "")]
        gst: String,

        /// Base amount excluding tax
        #[arg(long)]
        amount: String,

        /// Billing region (INR or USD)
        #[arg(long, default_value = "INR")]
        region: Region,

        /// Payment scheme (1 Payment, 3 EMI, 5 EMI)
        #[arg(long)]
        scheme: PaymentScheme,

        /// Invoice date, dd-mm-yyyy or yyyy-mm-dd (default: today)
        #[arg(long)]
        date: Option<String>,

        /// PNG or JPEG image for the <<Signature>> placeholder
        #[arg(long)]
        signature: Option<PathBuf>,
    },

    /// Print the tax and installment breakdown without generating anything
    Schedule {
        /// Base amount excluding tax
        #[arg(long)]
        amount: String,

        /// Billing region (INR or USD)
        #[arg(long, default_value = "INR")]
        region: Region,

        /// Payment scheme (1 Payment, 3 EMI, 5 EMI)
        #[arg(long)]
        scheme: PaymentScheme,
    },

    /// Generate one document per row of a CSV file
    Batch {
        /// Input CSV file
        #[arg(short, long)]
        input: PathBuf,

        /// Manifest CSV listing each row's outcome
        #[arg(short, long, default_value = "manifest.csv")]
        manifest: PathBuf,

        /// Date for rows without one (default: today)
        #[arg(long)]
        date: Option<String>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = AssemblerConfig {
        template_dir: cli.templates.clone(),
        output_dir: cli.output_dir.clone().unwrap_or_else(std::env::temp_dir),
        font_name: cli.font.clone(),
        font_size: cli.font_size,
    };
    let assembler = Assembler::new(config, FileCounter::new(&cli.counter));

    match cli.command {
        Commands::Nda(args) => {
            let fields = agreement_fields(args)?;
            generate(&assembler, GenerationRequest::Nda(fields))?;
        }
        Commands::Contract(args) => {
            let fields = agreement_fields(args)?;
            generate(&assembler, GenerationRequest::Contract(fields))?;
        }
        Commands::Invoice {
            client,
            address,
            email,
            project,
            phone,
            gst,
            amount,
            region,
            scheme,
            date,
            signature,
        } => {
            let fields = InvoiceFields {
                client_name: client,
                client_address: address,
                client_email: email,
                project_name: project,
                phone_number: phone,
                gst_number: gst,
                base_amount: Money::parse(&amount)?,
                region,
                scheme,
                date: date_or_today(date.as_deref())?,
                signature: load_signature(signature.as_deref())?,
            };
            generate(&assembler, GenerationRequest::Invoice(fields))?;
        }
        Commands::Schedule {
            amount,
            region,
            scheme,
        } => {
            print_schedule(Money::parse(&amount)?, region, scheme)?;
        }
        Commands::Batch {
            input,
            manifest,
            date,
        } => {
            let config = BatchConfig {
                input,
                manifest,
                date: date_or_today(date.as_deref())?,
            };
            let summary = run_batch(&assembler, &config, |p| {
                eprint!("\rRow {}/{} ({} failed)", p.completed, p.total, p.failed);
                let _ = std::io::stderr().flush();
                true
            })?;
            eprintln!();
            println!("{}", summary);
            println!("Manifest written to {}", config.manifest.display());
        }
    }

    Ok(())
}

fn date_or_today(date: Option<&str>) -> Result<NaiveDate> {
    match date {
        Some(d) => Ok(parse_date(d)?),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

fn load_signature(path: Option<&Path>) -> Result<Option<ImageAsset>> {
    path.map(|p| {
        ImageAsset::from_path(p)
            .with_context(|| format!("Failed to load signature image {}", p.display()))
    })
    .transpose()
}

fn agreement_fields(args: AgreementArgs) -> Result<AgreementFields> {
    Ok(AgreementFields {
        client_name: args.client,
        company_name: args.company,
        address: args.address,
        date: date_or_today(args.date.as_deref())?,
        signature: load_signature(args.signature.as_deref())?,
    })
}

fn generate(assembler: &Assembler<FileCounter>, request: GenerationRequest) -> Result<()> {
    let key = request.template_key();
    let doc = assembler
        .generate(&request)
        .with_context(|| format!("Failed to generate {}", key))?;
    if let Some(number) = doc.invoice_number {
        println!("Invoice number: {}", number);
    }
    println!("{}", doc.path.display());
    Ok(())
}

fn print_schedule(base: Money, region: Region, scheme: PaymentScheme) -> Result<()> {
    if !region.schemes().contains(&scheme) {
        bail!("{} invoices do not offer {}", region, scheme);
    }
    let schedule = InvoiceSchedule::compute(base, scheme);
    println!("Scheme:          {}", schedule.scheme);
    println!("Base amount:     {}", format_price(schedule.base, region));
    println!(
        "Tax ({}):       {}",
        format_percentage(schedule.tax_rate),
        format_price(schedule.tax, region)
    );
    println!("Total:           {}", format_price(schedule.total, region));
    println!(
        "In words:        {}",
        amount_to_words(schedule.total.whole_units())
    );
    for (i, part) in schedule.installments.iter().enumerate() {
        println!("Installment {}:   {}", i + 1, format_price(*part, region));
    }
    Ok(())
}
