//! # benchtop-core
//!
//! Configuration and test selection for the Benchtop hardware-test harness.
//!
//! Data flows from the [`ConfigStore`] (YAML on disk, either registry layout)
//! through [`resolve`] (metadata merging and filtering) into the
//! [`ExecutionPlanner`], which produces an [`ExecutionPlan`] for a runner.
//!
//! ```no_run
//! use benchtop_core::{ConfigStore, ExecutionPlanner, PlanRequest};
//!
//! let store = ConfigStore::open("config")?;
//! let plan = ExecutionPlanner::from_env(&store).plan(&PlanRequest {
//!     profile: Some("smoke".to_string()),
//!     ..PlanRequest::default()
//! })?;
//! for test in &plan.resolved_tests {
//!     println!("{} ({})", test.key, test.category);
//! }
//! # Ok::<(), benchtop_core::ConfigError>(())
//! ```

mod error;
mod model;
mod planner;
mod platform;
mod resolver;
mod store;

pub use error::{ConfigError, ConfigResult, DocumentKind};
pub use model::{
    CategoryInfo, ExecutionProfile, FieldDefaults, GlobalDefaults, Inclusion, OverrideSet,
    PlatformSet, Priority, PriorityInfo, ProfileSummary, SuiteDefinition, SuiteSummary, TestSpec,
    ValidationRules,
};
pub use planner::{
    Annotation, DEFAULT_PLATFORM, ExecutionPlan, ExecutionPlanner, PLATFORM_ENV, PROFILE_ENV,
    PlanRequest, PlatformSource, SELECTED_TESTS_ENV, TestAnnotations,
};
pub use platform::{InterfaceConfig, PlatformConfig, PlatformInfo, TestParameters};
pub use resolver::{
    CliFilters, FALLBACK_CATEGORY, FALLBACK_PRIORITY, Field, MetadataSource, Provenance,
    ResolvedTest, TestKey, resolve,
};
pub use store::{
    ConfigStore, GLOBALS_FILE, HARDWARE_DIR, PROFILES_DIR, REGISTRY_DIR, REGISTRY_FILE,
    RegistryLayout, SUITES_DIR, TestRegistry,
};
