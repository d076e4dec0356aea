//! Terminal and JSON reporting.
//!
//! - `TerminalReporter`: colored progress and summaries
//! - `RunReport` / `PlanReport`: machine-readable documents for `--format json`

use std::sync::{Arc, Mutex};

use benchtop_core::{ExecutionPlan, GlobalDefaults, MetadataSource, PlatformSource, TestKey};
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;

use crate::binding::{Marker, markers_for};
use crate::engine::{ProgressCallback, ProgressEvent, RunResults, TestOutcome, TestStatus};

/// Verbosity level for terminal output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Only the final summary.
    Quiet,
    #[default]
    Normal,
    /// Also lists excluded tests and markers.
    Verbose,
}

/// Colored terminal reporter.
#[derive(Debug, Default)]
pub struct TerminalReporter {
    verbosity: Verbosity,
}

impl TerminalReporter {
    pub fn with_verbosity(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    /// Handles a progress event, printing appropriate output.
    pub fn handle_progress(&mut self, event: ProgressEvent) {
        if self.verbosity == Verbosity::Quiet {
            return;
        }
        match event {
            ProgressEvent::RunStarted {
                platform,
                total_tests,
                excluded,
            } => self.print_run_started(&platform, total_tests, excluded),
            ProgressEvent::HardwareReady {
                platform,
                interfaces,
            } => {
                println!(
                    "{}",
                    format!("Hardware ready on {platform}: {}", interfaces.join(", ")).dimmed()
                );
                println!();
            }
            ProgressEvent::TestStarted { key } => {
                if self.verbosity == Verbosity::Verbose {
                    println!("  {} {}", "RUN ".dimmed(), key.to_string().dimmed());
                }
            }
            ProgressEvent::TestCompleted { outcome } => self.print_outcome(&outcome),
            ProgressEvent::TestSkipped { key, reason } => self.print_skipped(&key, &reason),
            ProgressEvent::RunCompleted { .. } => {}
        }
    }

    fn print_run_started(&self, platform: &str, total: usize, excluded: usize) {
        println!(
            "\n{}",
            format!(
                "Running {} test{} on {}",
                total,
                if total == 1 { "" } else { "s" },
                platform
            )
            .bold()
        );
        if excluded > 0 {
            println!(
                "{}",
                format!("{excluded} registered test(s) excluded by selection").dimmed()
            );
        }
    }

    fn print_outcome(&self, outcome: &TestOutcome) {
        let duration = format!("({:.2}s)", outcome.duration.as_secs_f64()).dimmed();
        println!(
            "  {} {} {}",
            status_label(outcome.status),
            outcome.key,
            duration
        );
        if let Some(message) = &outcome.message {
            println!("      {}", message.red());
        }
        if self.verbosity == Verbosity::Verbose && !outcome.markers.is_empty() {
            println!("      {}", marker_list(&outcome.markers).dimmed());
        }
    }

    fn print_skipped(&self, key: &TestKey, reason: &str) {
        // Excluded tests are noise unless asked for.
        if reason == crate::binding::EXCLUDED_REASON && self.verbosity != Verbosity::Verbose {
            return;
        }
        println!(
            "  {} {} {}",
            status_label(TestStatus::Skipped),
            key.to_string().dimmed(),
            format!("({reason})").dimmed()
        );
    }

    /// Prints the run summary.
    pub fn print_summary(&self, results: &RunResults) {
        println!("\n{}", "━".repeat(40).dimmed());

        let passed = results.passed_count();
        let failed = results.failed_count();
        let errors = results.error_count();
        let skipped = results.skipped_count();
        let total = results.executed_count();

        let (verdict, color) = if failed + errors == 0 {
            ("PASSED", colored::Color::Green)
        } else if passed > 0 {
            ("MIXED", colored::Color::Yellow)
        } else {
            ("FAILED", colored::Color::Red)
        };

        let mut parts = vec![];
        if passed > 0 {
            parts.push(format!("{passed} passed").green().to_string());
        }
        if failed > 0 {
            parts.push(format!("{failed} failed").red().to_string());
        }
        if errors > 0 {
            parts.push(format!("{errors} errors").red().to_string());
        }
        if skipped > 0 {
            parts.push(format!("{skipped} skipped").dimmed().to_string());
        }

        println!(
            "{}",
            format!("{verdict}: {passed} of {total} tests on {}", results.platform)
                .color(color)
                .bold()
        );
        if !parts.is_empty() {
            println!("   {}", parts.join(", "));
        }
        println!(
            "\n   {}",
            format!("Completed in {:.1}s", results.duration.as_secs_f64()).dimmed()
        );
    }

    /// Prints details for failed and errored tests.
    pub fn print_failures(&self, results: &RunResults) {
        let failures = results.failures();
        if failures.is_empty() {
            return;
        }
        println!("\n{}", "Failures:".red().bold());
        for outcome in failures {
            println!("  {} {}", status_label(outcome.status), outcome.key.to_string().bold());
            if let Some(message) = &outcome.message {
                println!("      {message}");
            }
        }
    }
}

fn status_label(status: TestStatus) -> colored::ColoredString {
    match status {
        TestStatus::Passed => "PASS".green(),
        TestStatus::Failed => "FAIL".red(),
        TestStatus::Skipped => "SKIP".dimmed(),
        TestStatus::Error => "ERR ".red().bold(),
    }
}

fn marker_list(markers: &[Marker]) -> String {
    markers
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Creates a progress callback that prints through a `TerminalReporter`.
pub fn create_progress_callback(verbosity: Verbosity) -> ProgressCallback {
    let reporter = Arc::new(Mutex::new(TerminalReporter::with_verbosity(verbosity)));
    Box::new(move |event| {
        if let Ok(mut r) = reporter.lock() {
            r.handle_progress(event);
        }
    })
}

/// Prints a plan without running it.
pub fn print_plan(plan: &ExecutionPlan, globals: &GlobalDefaults) {
    let profile = plan
        .profile
        .as_ref()
        .map_or_else(|| "(legacy selection)".to_string(), |p| p.name.clone());
    println!(
        "{} {} {}",
        "Platform:".bold(),
        plan.platform.name.cyan(),
        format!("({})", source_label(plan)).dimmed()
    );
    println!("{} {}", "Profile:".bold(), profile);
    println!();

    for test in &plan.resolved_tests {
        println!(
            "  {}  {}",
            test.key.to_string().cyan(),
            test.description.dimmed()
        );
        println!(
            "      category={} priority={} severity={} platforms={} hardware={} timeout={}",
            test.category,
            test.priority,
            globals.severity(test.priority),
            test.platforms,
            test.requires_hardware,
            test.timeout
                .map_or_else(|| "-".to_string(), |seconds| format!("{seconds}s")),
        );
        let sources: Vec<String> = test
            .provenance
            .iter()
            .filter(|p| p.source != MetadataSource::Test)
            .map(|p| format!("{}<-{}", p.field, p.source))
            .collect();
        if !sources.is_empty() {
            println!("      {}", sources.join(" ").dimmed());
        }
        println!("      {}", marker_list(&markers_for(plan, test)).dimmed());
    }

    println!(
        "\n  {}",
        format!(
            "Total: {} test{}",
            plan.len(),
            if plan.len() == 1 { "" } else { "s" }
        )
        .dimmed()
    );
}

fn source_label(plan: &ExecutionPlan) -> &'static str {
    match plan.platform_source {
        PlatformSource::Cli => "--platform",
        PlatformSource::Environment => benchtop_core::PLATFORM_ENV,
        PlatformSource::Default => "default",
    }
}

/// Summary counts in a [`RunReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub skipped: usize,
    pub all_passed: bool,
}

/// JSON document written for `--format json` runs.
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub generated_at: DateTime<Utc>,
    pub summary: ReportSummary,
    #[serde(flatten)]
    pub results: &'a RunResults,
}

impl<'a> RunReport<'a> {
    pub fn new(results: &'a RunResults) -> Self {
        Self {
            generated_at: Utc::now(),
            summary: ReportSummary {
                passed: results.passed_count(),
                failed: results.failed_count(),
                errors: results.error_count(),
                skipped: results.skipped_count(),
                all_passed: results.all_passed(),
            },
            results,
        }
    }
}

/// A planned test with the markers the engine would attach.
#[derive(Debug, Serialize)]
pub struct PlannedTest<'a> {
    #[serde(flatten)]
    pub test: &'a benchtop_core::ResolvedTest,
    pub severity: String,
    pub markers: Vec<Marker>,
}

/// JSON document written for `--collect-only --format json`.
#[derive(Debug, Serialize)]
pub struct PlanReport<'a> {
    pub generated_at: DateTime<Utc>,
    pub platform: &'a str,
    pub platform_source: PlatformSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<&'a benchtop_core::ProfileSummary>,
    pub environment: &'a std::collections::BTreeMap<String, String>,
    pub tests: Vec<PlannedTest<'a>>,
}

impl<'a> PlanReport<'a> {
    pub fn new(plan: &'a ExecutionPlan, globals: &GlobalDefaults) -> Self {
        Self {
            generated_at: Utc::now(),
            platform: &plan.platform.name,
            platform_source: plan.platform_source,
            profile: plan.profile.as_ref(),
            environment: &plan.environment_overlay,
            tests: plan
                .resolved_tests
                .iter()
                .map(|test| PlannedTest {
                    test,
                    severity: globals.severity(test.priority).to_string(),
                    markers: markers_for(plan, test),
                })
                .collect(),
        }
    }
}
