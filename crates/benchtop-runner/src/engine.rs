//! The in-process test engine.
//!
//! One [`TestEngine::run`] call is one session: the plan is bound to the
//! registered tests, a single [`HardwareFacade`] is brought up for the
//! platform, every selected test runs against it in plan order under its
//! resolved timeout, and the facade is torn down exactly once on the way out,
//! whatever happened in between.
//!
//! # Example
//!
//! ```no_run
//! use benchtop_core::{ConfigStore, ExecutionPlanner, PlanRequest};
//! use benchtop_runner::{TestEngine, builtin_tests};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = ConfigStore::open("config")?;
//!     let plan = ExecutionPlanner::from_env(&store).plan(&PlanRequest::default())?;
//!
//!     let engine = TestEngine::new(builtin_tests());
//!     let results = engine.run(&plan).await?;
//!     println!("{} passed, {} failed", results.passed_count(), results.failed_count());
//!     Ok(())
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use benchtop_adapters::{AdapterRegistry, HardwareFacade};
use benchtop_core::{ExecutionPlan, PlatformConfig, ResolvedTest, TestKey};
use benchtop_proto::AdapterError;
use scopeguard::ScopeGuard;
use serde::{Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::binding::{self, Collected, EXCLUDED_REASON, Marker};
use crate::case::{HardwareTest, TestContext};
use crate::error::{RunnerError, TestFailure};

/// Reason shown for tests left unrun after an early stop.
pub const STOPPED_REASON: &str = "not run: stopped after first failure";

/// Final state of one collected test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
    /// The test could not run as written (no implementation, adapter misuse).
    Error,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::Passed => write!(f, "passed"),
            TestStatus::Failed => write!(f, "failed"),
            TestStatus::Skipped => write!(f, "skipped"),
            TestStatus::Error => write!(f, "error"),
        }
    }
}

/// Result of one collected test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestOutcome {
    #[serde(flatten)]
    pub key: TestKey,
    pub status: TestStatus,
    /// Failure, error, or skip reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub markers: Vec<Marker>,
    #[serde(rename = "duration_secs", serialize_with = "seconds")]
    pub duration: Duration,
}

fn seconds<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

impl TestOutcome {
    fn new(key: TestKey, status: TestStatus, markers: &[Marker]) -> Self {
        Self {
            key,
            status,
            message: None,
            markers: markers.to_vec(),
            duration: Duration::ZERO,
        }
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, TestStatus::Failed | TestStatus::Error)
    }
}

/// Aggregate results from a session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunResults {
    pub platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    pub outcomes: Vec<TestOutcome>,
    #[serde(rename = "duration_secs", serialize_with = "seconds")]
    pub duration: Duration,
}

impl RunResults {
    fn count(&self, status: TestStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn passed_count(&self) -> usize {
        self.count(TestStatus::Passed)
    }

    pub fn failed_count(&self) -> usize {
        self.count(TestStatus::Failed)
    }

    pub fn error_count(&self) -> usize {
        self.count(TestStatus::Error)
    }

    pub fn skipped_count(&self) -> usize {
        self.count(TestStatus::Skipped)
    }

    /// Tests that ran or were meant to run (everything but skips).
    pub fn executed_count(&self) -> usize {
        self.outcomes.len() - self.skipped_count()
    }

    pub fn all_passed(&self) -> bool {
        !self.outcomes.iter().any(TestOutcome::is_failure)
    }

    pub fn failures(&self) -> Vec<&TestOutcome> {
        self.outcomes.iter().filter(|o| o.is_failure()).collect()
    }

    pub fn outcome(&self, suite: &str, name: &str) -> Option<&TestOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.key.suite == suite && o.key.name == name)
    }
}

/// Progress events emitted during a session.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Emitted once collection is complete.
    RunStarted {
        platform: String,
        total_tests: usize,
        excluded: usize,
    },
    /// The session hardware is up.
    HardwareReady {
        platform: String,
        interfaces: Vec<String>,
    },
    TestStarted { key: TestKey },
    TestCompleted { outcome: TestOutcome },
    TestSkipped { key: TestKey, reason: String },
    RunCompleted { results: RunResults },
}

/// Callback for progress updates.
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// Runs registered hardware tests against an execution plan.
pub struct TestEngine {
    tests: Vec<Box<dyn HardwareTest>>,
    registry: Arc<AdapterRegistry>,
    force_mock: bool,
    exit_first: bool,
    on_progress: Option<ProgressCallback>,
}

impl TestEngine {
    /// Creates an engine over `tests` using the built-in adapters.
    pub fn new(tests: Vec<Box<dyn HardwareTest>>) -> Self {
        Self {
            tests,
            registry: Arc::new(AdapterRegistry::builtin()),
            force_mock: false,
            exit_first: false,
            on_progress: None,
        }
    }

    pub fn with_registry(mut self, registry: Arc<AdapterRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Uses the mock variant of every interface.
    pub fn with_forced_mock(mut self, force: bool) -> Self {
        self.force_mock = force;
        self
    }

    /// Stops after the first failed or errored test. The remaining planned
    /// tests are reported as skipped.
    pub fn with_exit_first(mut self, exit_first: bool) -> Self {
        self.exit_first = exit_first;
        self
    }

    /// Sets a callback for progress updates.
    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub fn test_count(&self) -> usize {
        self.tests.len()
    }

    pub fn tests(&self) -> impl Iterator<Item = &dyn HardwareTest> {
        self.tests.iter().map(|test| test.as_ref())
    }

    /// Runs one session for `plan`.
    ///
    /// Fails only when the session hardware cannot be brought up. Test
    /// failures, skips, and timeouts are reported in the results.
    pub async fn run(&self, plan: &ExecutionPlan) -> Result<RunResults, RunnerError> {
        let start = Instant::now();
        let collection = binding::collect(plan, &self.tests);
        let runnable = collection.runnable_count();

        self.emit_progress(ProgressEvent::RunStarted {
            platform: plan.platform.name.clone(),
            total_tests: plan.len(),
            excluded: collection.excluded_count(),
        });
        info!(
            platform = %plan.platform.name,
            selected = plan.len(),
            runnable,
            "session started"
        );

        let mut session = if runnable > 0 {
            Some(self.open_session(&plan.platform)?)
        } else {
            None
        };

        let mut outcomes = Vec::with_capacity(collection.items.len());
        let mut stopped = false;
        for item in &collection.items {
            if stopped && !matches!(item, Collected::Excluded { .. }) {
                self.emit_progress(ProgressEvent::TestSkipped {
                    key: item.key().clone(),
                    reason: STOPPED_REASON.to_string(),
                });
                outcomes.push(
                    TestOutcome::new(item.key().clone(), TestStatus::Skipped, item.markers())
                        .with_message(STOPPED_REASON),
                );
                continue;
            }
            let outcome = match item {
                Collected::Selected {
                    test,
                    markers,
                    implementation,
                } => {
                    let Some(facade) = session.as_deref_mut() else {
                        continue;
                    };
                    self.emit_progress(ProgressEvent::TestStarted {
                        key: test.key.clone(),
                    });
                    let outcome = execute(
                        facade,
                        test,
                        markers,
                        *implementation,
                        &plan.environment_overlay,
                    )
                    .await;
                    if outcome.status == TestStatus::Skipped {
                        self.emit_progress(ProgressEvent::TestSkipped {
                            key: outcome.key.clone(),
                            reason: outcome.message.clone().unwrap_or_default(),
                        });
                    } else {
                        self.emit_progress(ProgressEvent::TestCompleted {
                            outcome: outcome.clone(),
                        });
                    }
                    outcome
                }
                Collected::Unimplemented { test, markers } => {
                    let outcome = TestOutcome::new(test.key.clone(), TestStatus::Error, markers)
                        .with_message(format!(
                            "no implementation registered for {}",
                            test.key
                        ));
                    self.emit_progress(ProgressEvent::TestCompleted {
                        outcome: outcome.clone(),
                    });
                    outcome
                }
                Collected::Excluded { key } => {
                    self.emit_progress(ProgressEvent::TestSkipped {
                        key: key.clone(),
                        reason: EXCLUDED_REASON.to_string(),
                    });
                    TestOutcome::new(key.clone(), TestStatus::Skipped, &[])
                        .with_message(EXCLUDED_REASON)
                }
            };
            if self.exit_first && outcome.is_failure() {
                info!(test = %outcome.key, "stopping after first failure");
                stopped = true;
            }
            outcomes.push(outcome);
        }

        drop(session);

        let results = RunResults {
            platform: plan.platform.name.clone(),
            profile: plan.profile.as_ref().map(|p| p.name.clone()),
            outcomes,
            duration: start.elapsed(),
        };
        info!(
            passed = results.passed_count(),
            failed = results.failed_count(),
            errors = results.error_count(),
            skipped = results.skipped_count(),
            "session finished"
        );

        self.emit_progress(ProgressEvent::RunCompleted {
            results: results.clone(),
        });

        Ok(results)
    }

    /// Brings up the session facade. The returned guard cleans it up when
    /// dropped, including on early return and unwinding.
    fn open_session(
        &self,
        platform: &PlatformConfig,
    ) -> Result<ScopeGuard<HardwareFacade, impl FnOnce(HardwareFacade)>, RunnerError> {
        let facade = HardwareFacade::new(platform.clone(), Arc::clone(&self.registry))
            .with_forced_mock(self.force_mock);
        let mut facade = scopeguard::guard(facade, |mut facade| {
            let result = facade.cleanup();
            if result.success {
                info!(platform = %facade.platform().name, "session hardware released");
            } else {
                warn!(
                    platform = %facade.platform().name,
                    error = result.error_message(),
                    "session hardware cleanup reported errors"
                );
            }
        });

        let init = facade.initialize()?;
        if !init.success {
            return Err(RunnerError::HardwareSetup {
                platform: platform.name.clone(),
                message: init.error_message().to_string(),
            });
        }
        if !init.log.is_empty() {
            debug!(log = %init.log, "hardware initialized");
        }

        self.emit_progress(ProgressEvent::HardwareReady {
            platform: platform.name.clone(),
            interfaces: facade
                .interface_names()
                .into_iter()
                .map(String::from)
                .collect(),
        });
        Ok(facade)
    }

    /// Emits a progress event if a callback is registered.
    fn emit_progress(&self, event: ProgressEvent) {
        if let Some(callback) = &self.on_progress {
            callback(event);
        }
    }
}

async fn execute(
    facade: &mut HardwareFacade,
    test: &ResolvedTest,
    markers: &[Marker],
    implementation: &dyn HardwareTest,
    overlay: &BTreeMap<String, String>,
) -> TestOutcome {
    let started = Instant::now();
    let mut ctx = TestContext::new(facade, test, markers, overlay);
    let body = implementation.run(&mut ctx);

    let result = match test.timeout_duration() {
        Some(limit) => match tokio::time::timeout(limit, body).await {
            Ok(result) => result,
            Err(_) => {
                warn!(test = %test.key, seconds = limit.as_secs(), "test timed out");
                return TestOutcome::new(test.key.clone(), TestStatus::Failed, markers)
                    .with_message(format!("timed out after {}s", limit.as_secs()))
                    .with_duration(started.elapsed());
            }
        },
        None => body.await,
    };

    let outcome = TestOutcome::new(test.key.clone(), TestStatus::Passed, markers);
    let outcome = match result {
        Ok(()) => outcome,
        Err(TestFailure::Skipped(reason)) => TestOutcome {
            status: TestStatus::Skipped,
            ..outcome
        }
        .with_message(reason),
        // A platform without the interface skips the test instead of failing it.
        Err(TestFailure::Adapter(err @ AdapterError::NotConfigured { .. })) => TestOutcome {
            status: TestStatus::Skipped,
            ..outcome
        }
        .with_message(err.to_string()),
        Err(err @ TestFailure::Adapter(_)) => TestOutcome {
            status: TestStatus::Error,
            ..outcome
        }
        .with_message(err.to_string()),
        Err(err) => TestOutcome {
            status: TestStatus::Failed,
            ..outcome
        }
        .with_message(err.to_string()),
    };
    debug!(test = %test.key, status = %outcome.status, "test finished");
    outcome.with_duration(started.elapsed())
}
