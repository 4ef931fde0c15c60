//! Remedy - Autonomous fix verification from the command line.
//!
//! ## Commands
//!
//! - `fix`: run a full fix-verify-retry investigation for an error
//! - `exec`: run a single program in an isolated sandbox
//! - `check-manifest`: validate a `remedy.toml` project manifest

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;

use remedy_core::{
    apply_fix_to_repo, BugReportStore, BugStatus, ChannelSink, ContextProvider, ExecutionCell,
    HttpFixGenerator, Investigation, InvestigationRequest, Investigator, Language,
    ManualDebugFallback, MemoryBugStore, NoContext, Outcome, SandboxFactory,
};
use remedy_sandbox::{DockerSandboxFactory, Manifest};

#[derive(Parser)]
#[command(name = "remedy")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Autonomous fix verification orchestrator", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Investigate a bug: generate, execute, and verify fixes with retries
    Fix {
        /// Bug identifier (used for session naming and the fix branch)
        #[arg(long)]
        bug_id: String,

        /// Error message, inline
        #[arg(long, conflicts_with = "error_file")]
        error: Option<String>,

        /// File containing the error message / stack trace
        #[arg(long)]
        error_file: Option<PathBuf>,

        /// File containing the code under investigation
        #[arg(long)]
        code_file: PathBuf,

        /// Target language (python, javascript, go, rust, ...)
        #[arg(long, default_value = "python")]
        language: String,

        /// Path of the file inside the project, for generator context
        #[arg(long)]
        file_path: Option<String>,

        /// Maximum fix attempts before exhaustion
        #[arg(long, default_value_t = remedy_core::DEFAULT_MAX_ATTEMPTS)]
        max_attempts: u32,

        /// Project directory (manifest + dependency files)
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,

        /// Disable fallback guidance on exhaustion
        #[arg(long)]
        no_fallback: bool,

        /// Commit a verified fix onto `fix/bug-<bug_id>` in this repository
        #[arg(long)]
        commit_to: Option<PathBuf>,

        /// Print the full investigation record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run one program inside an isolated sandbox and print its output
    Exec {
        /// File containing the program to run
        #[arg(long)]
        code_file: PathBuf,

        /// Target language
        #[arg(long, default_value = "python")]
        language: String,

        /// Project directory (manifest + dependency files)
        #[arg(long, default_value = ".")]
        project_dir: PathBuf,
    },

    /// Validate a project manifest
    CheckManifest {
        /// Manifest path (default: ./remedy.toml)
        #[arg(default_value = "remedy.toml")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    remedy_core::init_tracing(cli.json_logs, level);

    match cli.command {
        Commands::Fix {
            bug_id,
            error,
            error_file,
            code_file,
            language,
            file_path,
            max_attempts,
            project_dir,
            no_fallback,
            commit_to,
            json,
        } => {
            let error_message = match (error, error_file) {
                (Some(inline), _) => inline,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?,
                (None, None) => anyhow::bail!("one of --error or --error-file is required"),
            };
            let code = std::fs::read_to_string(&code_file)
                .with_context(|| format!("reading {}", code_file.display()))?;

            cmd_fix(FixArgs {
                bug_id,
                error_message,
                code,
                language: Language::parse(&language),
                file_path,
                max_attempts,
                project_dir,
                fallback_enabled: !no_fallback,
                commit_to,
                json,
            })
            .await
        }
        Commands::Exec {
            code_file,
            language,
            project_dir,
        } => cmd_exec(&code_file, Language::parse(&language), &project_dir).await,
        Commands::CheckManifest { path } => cmd_check_manifest(&path),
    }
}

struct FixArgs {
    bug_id: String,
    error_message: String,
    code: String,
    language: Language,
    file_path: Option<String>,
    max_attempts: u32,
    project_dir: PathBuf,
    fallback_enabled: bool,
    commit_to: Option<PathBuf>,
    json: bool,
}

async fn cmd_fix(args: FixArgs) -> Result<()> {
    let manifest = Manifest::load_from_project(&args.project_dir)
        .context("loading project manifest")?;
    let factory = DockerSandboxFactory::with_docker(manifest)
        .with_project_dir(args.project_dir.clone());
    let generator = HttpFixGenerator::from_env().context("configuring fix generator")?;
    let fallback = ManualDebugFallback::new(args.fallback_enabled);

    let (sink, mut events) = ChannelSink::new();
    let investigator = Investigator::new(
        Arc::new(factory),
        Arc::new(generator),
        Arc::new(fallback),
    )
    .with_sink(Arc::new(sink));

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            println!(
                "[{}] {}",
                event.timestamp.format("%H:%M:%S"),
                event.message
            );
        }
    });

    // The report store here is the in-memory collaborator; a persistent
    // backend would slot in behind the same trait.
    let store = MemoryBugStore::new();
    let report = store.create(&args.error_message).await?;
    store.update_status(report.id, BugStatus::Investigating).await?;

    let mut request =
        InvestigationRequest::new(&args.bug_id, &args.error_message, &args.code)
            .with_language(args.language)
            .with_max_attempts(args.max_attempts);
    if let Some(file_path) = &args.file_path {
        request = request.with_file_path(file_path.clone());
    }
    // No semantic index is wired in this build; absence means empty context.
    if let Some(context) = NoContext.context_for(&args.error_message).await {
        request = request.with_context(context);
    }

    let investigation = investigator.run(request).await?;
    let status = if investigation.outcome.is_success() {
        BugStatus::Fixed
    } else {
        BugStatus::Unfixable
    };
    store.update_status(report.id, status).await?;
    // Dropping the investigator releases the channel sink so the printer
    // task sees end-of-stream.
    drop(investigator);
    let _ = printer.await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&investigation)?);
    } else {
        print_summary(&investigation);
    }

    if let (Some(repo), Some(winning)) = (&args.commit_to, investigation.winning_attempt()) {
        let target = args
            .file_path
            .clone()
            .context("--commit-to requires --file-path")?;
        let message = apply_fix_to_repo(repo, &args.bug_id, &target, &winning.fix.fixed_code)?;
        println!("{message}");
    }

    if investigation.outcome.is_success() {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

fn print_summary(investigation: &Investigation) {
    println!();
    match &investigation.outcome {
        Outcome::Succeeded { winning_attempt } => {
            println!(
                "fix verified on attempt {winning_attempt}/{}",
                investigation.total_attempts()
            );
            if let Some(attempt) = investigation.winning_attempt() {
                println!("\nroot cause: {}", attempt.fix.root_cause);
                println!("\n{}", attempt.fix.fixed_code);
            }
        }
        Outcome::ExhaustedWithFallback { guidance } => {
            println!("{}", guidance.headline);
            println!("\nlikely causes:");
            for cause in &guidance.likely_causes {
                println!("  - {cause}");
            }
            println!("\nsuggested steps:");
            for (i, step) in guidance.suggested_steps.iter().enumerate() {
                println!("  {}. {step}", i + 1);
            }
        }
        Outcome::ExhaustedNoFallback { last_error } => {
            println!(
                "no verified fix after {} attempt(s); last error:\n{last_error}",
                investigation.total_attempts()
            );
        }
    }
}

async fn cmd_exec(code_file: &PathBuf, language: Language, project_dir: &PathBuf) -> Result<()> {
    let code = std::fs::read_to_string(code_file)
        .with_context(|| format!("reading {}", code_file.display()))?;
    let manifest = Manifest::load_from_project(project_dir).context("loading project manifest")?;
    let factory =
        DockerSandboxFactory::with_docker(manifest).with_project_dir(project_dir.clone());

    let cell = factory.provision("exec").await?;
    let result = cell.execute(&code, language).await;
    cell.teardown().await;
    let result = result?;

    print!("{}", result.output);
    if result.timed_out {
        eprintln!("(execution timed out)");
    }
    std::process::exit(result.exit_code);
}

fn cmd_check_manifest(path: &PathBuf) -> Result<()> {
    match Manifest::load(path) {
        Ok(manifest) => {
            println!(
                "manifest ok: {} service(s), {} MiB / {} cpus",
                manifest.services.len(),
                manifest.resources.memory_mib,
                manifest.resources.cpus
            );
            for service in &manifest.services {
                let probe = if service.healthcheck.is_some() {
                    "health probe"
                } else {
                    "settle delay"
                };
                println!("  - {} ({}, readiness: {probe})", service.name, service.image);
            }
            Ok(())
        }
        Err(e) => anyhow::bail!("manifest invalid: {e}"),
    }
}
