//! contractkit CLI - contract tests and stub validation for OpenAPI specs

mod storage;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use contractkit_core::facet::PathPattern;
use contractkit_core::verdict::EXIT_FAILED;
use contractkit_core::{
    Config, Resolver, RunReport, TestOutcome, VerdictPolicy, VerdictStatus, converge_paths,
};
use contractkit_runner::{ContractRunner, OpenApiLoader, StubCheck};

#[derive(Parser)]
#[command(name = "contractkit")]
#[command(about = "Contract tests and stub validation for OpenAPI specifications")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "terminal")]
    output: OutputFormat,

    /// Debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: .contractkit.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run contract tests against the configured server
    Test {
        /// Partial successes do not fail the run
        #[arg(long)]
        lenient: bool,

        /// Also test every distinct request shape and invalid requests
        #[arg(long)]
        generative: bool,

        /// Upper bound on the number of tests run
        #[arg(long)]
        max_tests: Option<usize>,

        /// Do not save the run under ~/.contractkit/reports
        #[arg(long)]
        no_save: bool,
    },

    /// Show the tests that would run, without sending requests
    Plan {
        #[arg(long)]
        generative: bool,
    },

    /// Validate stub files against the contract
    StubCheck {
        /// Stub files (in addition to the configured ones)
        stubs: Vec<PathBuf>,
    },

    /// Check that a newer spec is backward compatible with an older one
    Compat {
        /// The older spec
        older: PathBuf,
        /// The newer spec (default: the configured spec)
        newer: Option<PathBuf>,
    },

    /// Initialize config file
    Init,

    /// Export JSON Schema for the run report
    Schema,
}

#[derive(Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Terminal,
    Json,
    Silent,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(3)
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::load_default()?,
    };
    tracing::debug!(spec = %config.spec.display(), base_url = %config.base_url, "config loaded");
    Ok(config)
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Test {
            lenient,
            generative,
            max_tests,
            no_save,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            config.generative |= generative;
            config.max_tests = max_tests.or(config.max_tests);
            let runner = ContractRunner::from_config(&config)?;

            if cli.output == OutputFormat::Terminal {
                eprintln!("Config:");
                eprintln!("  spec:     {}", config.spec.display());
                eprintln!("  base_url: {}", config.base_url);
                if !config.headers.is_empty() {
                    eprintln!("  headers:  {} configured", config.headers.len());
                }
                eprintln!("  mode:     {}", if config.generative { "generative" } else { "examples" });
                eprintln!();
            }

            let start = Instant::now();
            let outcomes = runner.run()?;
            let duration_secs = start.elapsed().as_secs_f64();

            let policy = if lenient {
                VerdictPolicy::lenient()
            } else {
                VerdictPolicy::default()
            };
            let verdict = policy.verdict(&outcomes);
            let report = RunReport::new(&outcomes, &verdict);

            match cli.output {
                OutputFormat::Terminal => print_outcomes(&outcomes, &report),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Silent => {}
            }

            if !no_save {
                let record = storage::RunRecord {
                    config: &config,
                    report: &report,
                    outcomes: &outcomes,
                    duration_secs,
                };
                match storage::save_run(&record) {
                    Ok(path) if cli.output == OutputFormat::Terminal => eprintln!("Report saved: {}", path.display()),
                    Ok(_) => {}
                    Err(e) => eprintln!("Warning: failed to save report: {e}"),
                }
            }

            Ok(verdict.exit_code)
        }

        Commands::Plan { generative } => {
            let mut config = load_config(cli.config.as_deref())?;
            config.generative |= generative;
            let plan = ContractRunner::from_config(&config)?.plan()?;
            match cli.output {
                OutputFormat::Terminal => println!("{}", plan.to_terminal()),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
                OutputFormat::Silent => {}
            }
            Ok(i32::from(plan.has_errors()))
        }

        Commands::StubCheck { stubs } => {
            let mut config = load_config(cli.config.as_deref())?;
            config.stubs.extend(stubs);
            let checks = ContractRunner::from_config(&config)?.check_stubs();
            match cli.output {
                OutputFormat::Terminal => print_stub_checks(&checks),
                OutputFormat::Json => {
                    let json: Vec<_> = checks
                        .iter()
                        .map(|c| {
                            serde_json::json!({
                                "stub": c.path.display().to_string(),
                                "valid": c.is_valid(),
                                "scenario": c.result.as_ref().ok(),
                                "error": c.result.as_ref().err(),
                            })
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&json)?);
                }
                OutputFormat::Silent => {}
            }
            Ok(if checks.iter().all(StubCheck::is_valid) {
                0
            } else {
                EXIT_FAILED
            })
        }

        Commands::Compat { older, newer } => {
            let config = load_config(cli.config.as_deref())?;
            let loader = OpenApiLoader::new().with_settings(config.match_settings());
            let newer = newer.unwrap_or_else(|| config.spec.clone());
            let report = loader.load(&newer)?.backward_compatible_with(&loader.load(&older)?);
            if cli.output != OutputFormat::Silent {
                println!("{report}");
            }
            Ok(if report.is_compatible() { 0 } else { EXIT_FAILED })
        }

        Commands::Init => {
            let config_path = ".contractkit.toml";
            if Path::new(config_path).exists() {
                eprintln!("{config_path} already exists");
                return Ok(1);
            }

            std::fs::write(config_path, Config::example())?;
            println!("Created {config_path}");
            println!("\nEdit the file to configure:");
            println!("  - spec: path to your OpenAPI spec");
            println!("  - base_url: server to test");
            println!("  - headers: auth tokens, API keys");
            println!("  - stubs: stub files for `contractkit stub-check`");
            Ok(0)
        }

        Commands::Schema => {
            println!("{}", contractkit_core::report::generate_schema()?);
            Ok(0)
        }
    }
}

fn print_outcomes(outcomes: &[TestOutcome], report: &RunReport) {
    for outcome in outcomes {
        println!("[{}] {}", outcome.result, outcome.description);
        if outcome.result.is_passed() {
            continue;
        }
        if let Some(details) = outcome.details() {
            for line in details.lines() {
                println!("       {line}");
            }
            println!();
        }
    }

    let icon = if report.verdict == VerdictStatus::Pass { "PASS" } else { "FAIL" };
    println!("\n{icon}: {}", report.reason);
    let counts = &report.counts;
    println!(
        "  Tests: {} total, {} passed, {} partial, {} failed, {} errors",
        counts.total, counts.passed, counts.partial, counts.failed, counts.errored
    );
    if !report.operations.is_empty() {
        println!("\nOperations:");
        for op in &report.operations {
            println!("  {}: {}/{} passed", op.operation, op.counts.passed, op.counts.total);
        }
    }
}

fn print_stub_checks(checks: &[StubCheck]) {
    for check in checks {
        match &check.result {
            Ok(scenario) => println!("[OK] {} -> {scenario}", check.path.display()),
            Err(reason) => {
                println!("[NG] {}", check.path.display());
                for line in reason.lines() {
                    println!("     {line}");
                }
            }
        }
    }

    let paths: Vec<PathPattern> = checks
        .iter()
        .filter(|c| c.is_valid())
        .filter_map(|c| c.request.as_ref())
        .filter_map(|request| PathPattern::from_template(&request.path, &Default::default()).ok())
        .collect();
    let endpoints = converge_paths(paths, &Resolver::new());
    let valid = checks.iter().filter(|c| c.is_valid()).count();
    println!("\n{valid}/{} stubs valid", checks.len());
    if !endpoints.is_empty() {
        println!("Stubbed endpoints:");
        for endpoint in &endpoints {
            println!("  {}", endpoint.template());
        }
    }
}
