//! facturas - grading invoice generator
//!
//! Fills an XLSX grading template once per student or team:
//! - Header cells (course, task, student or team names)
//! - The rubric block resized to any number of weighted parts, with the
//!   template's formatting copied to the new rows
//! - Net-grade merge repaired and the totals below the block rewritten
//! - Deterministic, file-system-safe output names
//!
//! # Usage
//!
//! ```no_run
//! use facturas::{engine, resolver, GeneratorConfig, Workbook};
//! # fn main() -> facturas::Result<()> {
//! let config = GeneratorConfig::default();
//! let request = resolver::GenerationRequest {
//!     course: facturas::Course { code: "CE1101".into(), name: "Programación".into() },
//!     task_name: "Tarea 1".into(),
//!     part_label: "Parte".into(),
//!     rubric: resolver::RubricConfig::default(),
//!     groups: vec![facturas::Group::single("Mora Vargas Luis")],
//! };
//! let plan = resolver::resolve(&request)?;
//! let template = Workbook::open(&config.template)?;
//! for invoice in &plan.invoices {
//!     let book = engine::render(&template, &invoice.invocation, &config.layout)?;
//!     book.save(config.output_dir.join(&invoice.filename))?;
//! }
//! # Ok(())
//! # }
//! ```

// Spreadsheet I/O
pub mod cell_ref;
pub mod error;
pub(crate) mod export;
pub(crate) mod parser;
pub mod types;
pub mod xml_helpers;

// Invoice generation
pub mod batch;
pub mod config;
pub mod engine;
pub mod job;
pub mod layout;
pub mod logging;
pub mod model;
pub mod resolver;
pub mod roster;

pub use batch::{run_batch, BatchReport, FailurePolicy, InvoiceOutcome, ProgressObserver};
pub use config::GeneratorConfig;
pub use error::{FacturaError, Result};
pub use layout::TemplateLayout;
pub use model::{Course, Group, Invocation, RubricPart};
pub use types::*;
