//! Batch generation: one invoice per planned group, in order.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::GeneratorConfig;
use crate::engine;
use crate::error::{FacturaError, Result};
use crate::resolver::PlannedInvoice;
use crate::types::Workbook;

/// What to do when one invoice fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the batch and return the failure.
    #[default]
    AbortOnFirst,
    /// Record the failure and go on with the next invoice.
    Continue,
}

/// Result of one invoice.
#[derive(Debug)]
pub struct InvoiceOutcome {
    pub filename: String,
    /// Path written, or why nothing was written.
    pub result: Result<PathBuf>,
}

impl InvoiceOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug)]
pub struct BatchReport {
    pub output_dir: PathBuf,
    pub outcomes: Vec<InvoiceOutcome>,
}

impl BatchReport {
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &InvoiceOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

/// Notified after every invoice, successful or not.
pub trait ProgressObserver {
    /// `fraction` is the share of the batch completed, in `(0, 1]`.
    fn invoice_done(&mut self, outcome: &InvoiceOutcome, fraction: f64);
}

impl<F: FnMut(&InvoiceOutcome, f64)> ProgressObserver for F {
    fn invoice_done(&mut self, outcome: &InvoiceOutcome, fraction: f64) {
        self(outcome, fraction);
    }
}

/// Observer that ignores progress.
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn invoice_done(&mut self, _outcome: &InvoiceOutcome, _fraction: f64) {}
}

/// Generate every planned invoice.
///
/// # Errors
/// [`FacturaError::TemplateMissing`] before anything is attempted when the
/// template does not exist; an I/O error when the output directory cannot be
/// created; and, under [`FailurePolicy::AbortOnFirst`], the first invoice
/// failure wrapped in [`FacturaError::Invoice`].
pub fn run_batch(
    config: &GeneratorConfig,
    invoices: &[PlannedInvoice],
    observer: &mut dyn ProgressObserver,
) -> Result<BatchReport> {
    if !config.template.is_file() {
        tracing::error!(template = %config.template.display(), "template not found");
        return Err(FacturaError::TemplateMissing(config.template.clone()));
    }
    std::fs::create_dir_all(&config.output_dir)?;

    let total = invoices.len();
    let mut outcomes = Vec::with_capacity(total);

    for (done, planned) in (1..).zip(invoices) {
        let result = generate_one(config, planned);
        match &result {
            Ok(path) => tracing::info!(path = %path.display(), "invoice written"),
            Err(e) => tracing::warn!(filename = %planned.filename, error = %e, "invoice failed"),
        }

        let outcome = InvoiceOutcome {
            filename: planned.filename.clone(),
            result,
        };
        observer.invoice_done(&outcome, fraction(done, total));

        if config.failure_policy == FailurePolicy::AbortOnFirst {
            if let Err(source) = outcome.result {
                return Err(FacturaError::Invoice {
                    filename: outcome.filename,
                    source: Box::new(source),
                });
            }
        }
        outcomes.push(outcome);
    }

    let report = BatchReport {
        output_dir: config.output_dir.clone(),
        outcomes,
    };
    tracing::info!(
        written = report.success_count(),
        total,
        output_dir = %report.output_dir.display(),
        "batch finished"
    );
    Ok(report)
}

/// Load the template fresh, render, save.
fn generate_one(config: &GeneratorConfig, planned: &PlannedInvoice) -> Result<PathBuf> {
    let template = Workbook::open(&config.template)?;
    let book = engine::render(&template, &planned.invocation, &config.layout)?;
    let path = config.output_dir.join(&planned.filename);
    book.save(&path)?;
    Ok(path)
}

#[allow(clippy::cast_precision_loss)]
fn fraction(done: usize, total: usize) -> f64 {
    if total == 0 {
        1.0
    } else {
        done as f64 / total as f64
    }
}
