//! CLI for facturas - lists courses and students, generates invoices.
//!
//! Usage:
//!   facturas_cli courses                      # Course list (cursos.csv)
//!   facturas_cli students                     # Roster files in the directory
//!   facturas_cli students grupo1.csv          # Students on one roster
//!   facturas_cli generate --job job.json      # Generate every invoice

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use facturas::batch::{run_batch, FailurePolicy, InvoiceOutcome};
use facturas::job::Job;
use facturas::{logging, resolver, roster, GeneratorConfig, Result};

/// Grading invoice generator
#[derive(Parser, Debug)]
#[command(name = "facturas")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (JSON)
    #[arg(long, short, global = true, env = "FACTURAS_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Log level or filter directive (overrides --verbose)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the courses in the course list
    Courses {
        /// Course list file (defaults to the configured one)
        #[arg(long)]
        course_list: Option<PathBuf>,
    },

    /// List roster files, or the students on one roster
    Students {
        /// Roster file; without it the roster files in --dir are listed
        #[arg(value_name = "ROSTER")]
        file: Option<PathBuf>,

        /// Directory searched for roster files
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },

    /// Generate invoices for a job file
    Generate {
        /// Job file (JSON) with course, students and rubric
        #[arg(long)]
        job: PathBuf,

        /// Template workbook
        #[arg(long)]
        template: Option<PathBuf>,

        /// Output directory
        #[arg(long, short)]
        output_dir: Option<PathBuf>,

        /// Keep going when an invoice fails
        #[arg(long)]
        continue_on_error: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init_tracing(cli.verbose, cli.log_level.as_deref(), cli.log_json) {
        eprintln!("Warning: Failed to initialize logging: {e}");
    }

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = GeneratorConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Courses { course_list } => {
            let path = course_list.unwrap_or(config.course_list);
            for course in roster::load_courses(&path)? {
                println!("{}", course.label());
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Students { file, dir } => {
            match file {
                Some(path) => {
                    for student in roster::load_roster(&path)? {
                        println!("{student}");
                    }
                }
                None => {
                    let course_list = file_name_of(&config.course_list);
                    for path in roster::discover_rosters(&dir, &course_list)? {
                        println!("{}", path.display());
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Generate {
            job,
            template,
            output_dir,
            continue_on_error,
        } => {
            if let Some(template) = template {
                config.template = template;
            }
            if let Some(output_dir) = output_dir {
                config.output_dir = output_dir;
            }
            if continue_on_error {
                config.failure_policy = FailurePolicy::Continue;
            }
            generate(&config, &job)
        }
    }
}

fn generate(config: &GeneratorConfig, job_path: &Path) -> Result<ExitCode> {
    let job = Job::load(job_path)?;
    let courses = roster::load_courses(&config.course_list)?;
    let students = roster::load_roster(&job.roster)?;
    let request = job.into_request(&courses, &students)?;

    let plan = resolver::resolve(&request)?;
    if let Some(total) = plan.weight_warning {
        eprintln!("Warning: rubric weights add up to {total:.1}%, not 100%");
    }

    let mut progress = |outcome: &InvoiceOutcome, fraction: f64| match &outcome.result {
        Ok(path) => eprintln!("[{:>3.0}%] {}", fraction * 100.0, path.display()),
        Err(e) => eprintln!("[{:>3.0}%] {} failed: {e}", fraction * 100.0, outcome.filename),
    };
    let report = run_batch(config, &plan.invoices, &mut progress)?;

    println!(
        "{} invoice(s) written to '{}'",
        report.success_count(),
        report.output_dir.display()
    );
    if report.failures().next().is_some() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| roster::COURSE_LIST_FILE.to_string())
}
