//! # benchtop
//!
//! Config-driven hardware test runner.
//!
//! ## Usage
//!
//! ```bash
//! # Run the smoke profile on the default mock platform
//! benchtop --exec-profile smoke
//!
//! # Legacy selection: every smoke test that applies to a real ECU
//! benchtop --platform ecu_platform_b --category smoke
//!
//! # Show what would run, as JSON
//! benchtop --exec-profile nightly --collect-only --format json
//!
//! # Critical CAN tests only, stopping at the first failure
//! benchtop -s can_bus -m critical -x
//!
//! # Convert a monolithic test_registry.yaml to the split layout
//! benchtop --migrate-registry
//! ```

use std::path::PathBuf;

use anyhow::Result;
use benchtop_adapters::AdapterRegistry;
use benchtop_core::{
    CliFilters, ConfigStore, ExecutionPlanner, OverrideSet, PlanRequest, Priority,
};
use benchtop_runner::{
    PlanReport, RunReport, RunResults, TerminalReporter, TestEngine, Verbosity, builtin_tests,
    create_progress_callback, exit, print_plan, select_by_markers,
};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use serde::Serialize;
use tracing::debug;

/// Output format for listings, plans, and results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
enum OutputFormat {
    /// Colored, human-readable
    #[default]
    Text,
    /// Machine-readable JSON on stdout
    Json,
}

/// Config-driven hardware test runner.
///
/// Selects tests from the test registry for a hardware platform, optionally
/// through an execution profile, and runs them against live or mock adapters.
#[derive(Parser, Debug)]
#[command(name = "benchtop")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Only run these tests (by name)
    #[arg(value_name = "TEST")]
    tests: Vec<String>,

    /// Configuration root holding `hardware/` and the test registry
    #[arg(long, env = "BENCHTOP_CONFIG_DIR", default_value = "config")]
    config_dir: PathBuf,

    /// Hardware platform (overrides HARDWARE_PLATFORM)
    #[arg(long, visible_alias = "hardware", value_name = "NAME")]
    platform: Option<String>,

    /// Execution profile to run
    #[arg(long = "exec-profile", value_name = "NAME")]
    exec_profile: Option<String>,

    /// Only run tests from this suite
    #[arg(short = 's', long, value_name = "NAME")]
    suite: Option<String>,

    /// Only run tests with this category
    #[arg(short = 'c', long, value_name = "NAME")]
    category: Option<String>,

    /// Only run tests with this priority
    #[arg(short = 'p', long, value_name = "LEVEL")]
    priority: Option<Priority>,

    /// Only run tests carrying this marker (repeatable, all must match)
    #[arg(short = 'm', long = "marker", value_name = "MARKER")]
    markers: Vec<String>,

    /// Timeout for every selected test, overriding all config levels
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Use the mock variant of every interface
    #[arg(long)]
    force_mock: bool,

    /// Stop after the first failed or errored test
    #[arg(short = 'x', long)]
    exitfirst: bool,

    /// Rewrite a monolithic test_registry.yaml as the split layout and exit
    #[arg(long)]
    migrate_registry: bool,

    /// List execution profiles and exit
    #[arg(long)]
    list_profiles: bool,

    /// List test suites and exit
    #[arg(long)]
    list_suites: bool,

    /// List hardware platforms and exit
    #[arg(long)]
    list_platforms: bool,

    /// List registered adapters and exit
    #[arg(long)]
    list_adapters: bool,

    /// Print the execution plan without touching hardware
    #[arg(long)]
    collect_only: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Debug logging and detailed output
    #[arg(short, long)]
    verbose: bool,

    /// Only print the summary
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else if self.verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }

    fn filters(&self) -> CliFilters {
        let mut filters = CliFilters::default().with_names(self.tests.iter().cloned());
        if let Some(suite) = &self.suite {
            filters = filters.with_suite(suite);
        }
        if let Some(category) = &self.category {
            filters = filters.with_category(category);
        }
        if let Some(priority) = self.priority {
            filters = filters.with_priority(priority);
        }
        if let Some(seconds) = self.timeout {
            filters = filters.with_overrides(OverrideSet::default().with_timeout(seconds));
        }
        filters
    }

    fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays parseable with --format json.
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let code = match run(&cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {:#}", "Error:".red().bold(), err);
            exit::for_error(&err)
        }
    };
    debug!(code, "exiting");
    std::process::exit(code);
}

async fn run(cli: &Cli) -> Result<i32> {
    if cli.list_adapters {
        list_adapters(cli)?;
        return Ok(exit::PASSED);
    }

    let store = ConfigStore::open(&cli.config_dir)?;

    if cli.migrate_registry {
        migrate_registry(cli, &store)?;
        return Ok(exit::PASSED);
    }

    if cli.list_profiles || cli.list_suites || cli.list_platforms {
        list_config(cli, &store)?;
        return Ok(exit::PASSED);
    }

    let request = PlanRequest {
        platform: cli.platform.clone(),
        profile: cli.exec_profile.clone(),
        filters: cli.filters(),
    };
    let mut plan = ExecutionPlanner::from_env(&store).plan(&request)?;
    select_by_markers(&mut plan, &cli.markers);
    let globals = store.load_globals();

    if cli.collect_only {
        if cli.json() {
            print_json(&PlanReport::new(&plan, &globals))?;
        } else {
            print_plan(&plan, &globals);
        }
        return Ok(if plan.is_empty() {
            exit::NO_TESTS
        } else {
            exit::PASSED
        });
    }

    if plan.is_empty() {
        if cli.json() {
            let results = RunResults {
                platform: plan.platform.name.clone(),
                profile: plan.profile.as_ref().map(|p| p.name.clone()),
                ..RunResults::default()
            };
            print_json(&RunReport::new(&results))?;
        } else {
            println!(
                "{}",
                format!("No tests selected for platform {}", plan.platform.name).yellow()
            );
        }
        return Ok(exit::NO_TESTS);
    }

    let verbosity = cli.verbosity();
    let mut engine = TestEngine::new(builtin_tests())
        .with_forced_mock(cli.force_mock)
        .with_exit_first(cli.exitfirst);
    if !cli.json() {
        println!(
            "\n{} {}",
            "Benchtop".bold(),
            format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
        );
        println!("{}", "━".repeat(40).dimmed());
        engine = engine.on_progress(create_progress_callback(verbosity));
    }

    let results = engine.run(&plan).await?;

    if cli.json() {
        print_json(&RunReport::new(&results))?;
    } else {
        let reporter = TerminalReporter::with_verbosity(verbosity);
        if verbosity != Verbosity::Quiet {
            reporter.print_failures(&results);
        }
        reporter.print_summary(&results);
    }

    Ok(exit::for_results(&results))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn list_adapters(cli: &Cli) -> Result<()> {
    let adapters = AdapterRegistry::builtin().availability();
    if cli.json() {
        return print_json(&adapters);
    }

    println!("{}\n", "Registered adapters:".bold());
    for adapter in &adapters {
        let variants = match (adapter.live, adapter.mock) {
            (true, true) => "live, mock",
            (true, false) => "live",
            (false, true) => "mock",
            (false, false) => "none",
        };
        println!("  {}  {}", adapter.interface.cyan(), variants.dimmed());
    }
    Ok(())
}

fn migrate_registry(cli: &Cli, store: &ConfigStore) -> Result<()> {
    let (migrated, written) = store.migrate_to_split()?;
    if cli.json() {
        return print_json(&written);
    }

    let registry = migrated.registry();
    println!(
        "{}\n",
        format!(
            "Migrated {} suite(s) and {} profile(s) to the split layout:",
            registry.suites.len(),
            registry.profiles.len()
        )
        .bold()
    );
    for path in &written {
        println!("  {}", path.display().to_string().cyan());
    }
    print_total(written.len(), "file");
    Ok(())
}

fn list_config(cli: &Cli, store: &ConfigStore) -> Result<()> {
    if cli.list_profiles {
        let profiles = store.list_profiles();
        if cli.json() {
            print_json(&profiles)?;
        } else {
            println!("{}\n", "Execution profiles:".bold());
            for profile in &profiles {
                let timeout = profile
                    .timeout
                    .map_or_else(String::new, |seconds| format!(", timeout {seconds}s"));
                println!(
                    "  {}  {} {}",
                    profile.name.cyan(),
                    profile.description,
                    format!("({} inclusion(s){timeout})", profile.inclusions).dimmed()
                );
            }
            print_total(profiles.len(), "profile");
        }
    }

    if cli.list_suites {
        let suites = store.list_suites();
        if cli.json() {
            print_json(&suites)?;
        } else {
            println!("{}\n", "Test suites:".bold());
            for suite in &suites {
                println!(
                    "  {}  {} {}",
                    suite.name.cyan(),
                    suite.description,
                    format!("({} test(s))", suite.tests).dimmed()
                );
            }
            print_total(suites.len(), "suite");
        }
    }

    if cli.list_platforms {
        let platforms = store.list_platforms()?;
        if cli.json() {
            print_json(&platforms)?;
        } else {
            println!("{}\n", "Hardware platforms:".bold());
            for platform in &platforms {
                println!("  {}", platform.cyan());
            }
            print_total(platforms.len(), "platform");
        }
    }
    Ok(())
}

fn print_total(count: usize, noun: &str) {
    println!(
        "\n  {}\n",
        format!("Total: {} {}{}", count, noun, if count == 1 { "" } else { "s" }).dimmed()
    );
}
