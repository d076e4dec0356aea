//! Load-time checks applied to a normalized registry.
//!
//! Every reference a profile makes must resolve and every category or
//! priority must be allowed by the globals `validation` rules, so the
//! resolver never meets an unresolvable name.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use super::TestRegistry;
use super::layout::RegistryLayout;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{OverrideSet, PlatformSet, Priority, ValidationRules};

/// Field-path prefixes differ per layout so diagnostics point into the
/// right document.
struct Prefixes {
    monolithic: bool,
}

impl Prefixes {
    fn suite(&self, name: &str) -> String {
        if self.monolithic {
            format!("test_suites.{name}.")
        } else {
            String::new()
        }
    }

    fn suite_defaults(&self, name: &str) -> String {
        if self.monolithic {
            format!("test_suites.{name}.")
        } else {
            "suite_info.default_".to_string()
        }
    }

    fn profile(&self, name: &str) -> String {
        if self.monolithic {
            format!("execution_profiles.{name}.")
        } else {
            String::new()
        }
    }
}

pub(super) fn validate(registry: &TestRegistry, layout: &RegistryLayout) -> ConfigResult<()> {
    let prefixes = Prefixes {
        monolithic: matches!(layout, RegistryLayout::Monolithic { .. }),
    };
    let rules = &registry.globals.validation;

    let defaults = &registry.globals.defaults;
    let globals_path = registry.globals_source.as_path();
    let globals_prefix = "defaults.";
    check_platforms(globals_path, globals_prefix, defaults.platforms.as_ref())?;
    check_category(globals_path, globals_prefix, defaults.category.as_deref(), rules)?;
    check_priority(globals_path, globals_prefix, defaults.priority, rules)?;

    check_unique(
        "suite",
        "suite_info.name",
        registry.suites.iter().map(|s| (s.name.as_str(), s.source.as_path())),
    )?;
    check_unique(
        "profile",
        "execution_profile.name",
        registry.profiles.iter().map(|p| (p.name.as_str(), p.source.as_path())),
    )?;

    for suite in &registry.suites {
        let path = suite.source.as_path();
        let defaults_prefix = prefixes.suite_defaults(&suite.name);
        check_platforms(path, &defaults_prefix, suite.default_platforms.as_ref())?;
        check_category(path, &defaults_prefix, suite.default_category.as_deref(), rules)?;
        check_priority(path, &defaults_prefix, suite.default_priority, rules)?;

        let mut seen = HashSet::new();
        for (i, test) in suite.tests.iter().enumerate() {
            let prefix = format!("{}tests[{i}].", prefixes.suite(&suite.name));
            if test.name.trim().is_empty() {
                return Err(ConfigError::schema(
                    path,
                    format!("{prefix}name"),
                    "test name must not be empty",
                ));
            }
            if !seen.insert(test.name.as_str()) {
                return Err(ConfigError::schema(
                    path,
                    format!("{prefix}name"),
                    format!("duplicate test name '{}' in suite '{}'", test.name, suite.name),
                ));
            }
            check_platforms(path, &prefix, test.platforms.as_ref())?;
            check_category(path, &prefix, test.category.as_deref(), rules)?;
            check_priority(path, &prefix, test.priority, rules)?;
        }
    }

    for profile in &registry.profiles {
        let path = profile.source.as_path();
        for (i, inclusion) in profile.include.iter().enumerate() {
            let prefix = format!("{}include[{i}]", prefixes.profile(&profile.name));
            let Some(suite) = registry.suite(&inclusion.suite) else {
                return Err(ConfigError::dangling(
                    path,
                    format!("{prefix}.suite"),
                    format!(
                        "profile '{}' includes unknown suite '{}'",
                        profile.name, inclusion.suite
                    ),
                ));
            };
            if let Some(names) = &inclusion.tests {
                if names.is_empty() {
                    return Err(ConfigError::schema(
                        path,
                        format!("{prefix}.tests"),
                        "empty test subset; omit `tests` to include the whole suite",
                    ));
                }
                for (j, name) in names.iter().enumerate() {
                    if suite.test(name).is_none() {
                        return Err(ConfigError::dangling(
                            path,
                            format!("{prefix}.tests[{j}]"),
                            format!("suite '{}' has no test '{name}'", suite.name),
                        ));
                    }
                }
            }
            check_overrides(path, &format!("{prefix}.overrides."), &inclusion.overrides, rules)?;
        }
    }

    Ok(())
}

/// Two documents resolving to the same name (`can_bus.yaml` next to
/// `can_bus.yml`) are rejected; the error names both files.
fn check_unique<'a>(
    kind: &str,
    field: &str,
    entries: impl Iterator<Item = (&'a str, &'a Path)>,
) -> ConfigResult<()> {
    let mut seen: HashMap<&str, &Path> = HashMap::new();
    for (name, path) in entries {
        if let Some(first) = seen.insert(name, path) {
            return Err(ConfigError::schema(
                path,
                field,
                format!(
                    "duplicate {kind} '{name}': already defined in {}",
                    first.display()
                ),
            ));
        }
    }
    Ok(())
}

/// Validates a command-line override set against the same rules.
pub(crate) fn check_overrides(
    path: &Path,
    prefix: &str,
    overrides: &OverrideSet,
    rules: &ValidationRules,
) -> ConfigResult<()> {
    check_platforms(path, prefix, overrides.platforms.as_ref())?;
    check_category(path, prefix, overrides.category.as_deref(), rules)?;
    check_priority(path, prefix, overrides.priority, rules)
}

fn check_platforms(path: &Path, prefix: &str, platforms: Option<&PlatformSet>) -> ConfigResult<()> {
    if platforms.is_some_and(PlatformSet::is_empty) {
        return Err(ConfigError::schema(
            path,
            format!("{prefix}platforms"),
            "platform list must not be empty",
        ));
    }
    Ok(())
}

fn check_category(
    path: &Path,
    prefix: &str,
    category: Option<&str>,
    rules: &ValidationRules,
) -> ConfigResult<()> {
    match category {
        Some(category) if !rules.allows_category(category) => Err(unknown_category(
            path,
            format!("{prefix}category"),
            category,
            rules,
        )),
        _ => Ok(()),
    }
}

fn check_priority(
    path: &Path,
    prefix: &str,
    priority: Option<Priority>,
    rules: &ValidationRules,
) -> ConfigResult<()> {
    match priority {
        Some(priority) if !rules.allows_priority(priority) => Err(ConfigError::schema(
            path,
            format!("{prefix}priority"),
            format!("priority '{priority}' is not allowed"),
        )),
        _ => Ok(()),
    }
}

fn unknown_category(
    path: &Path,
    field: String,
    category: &str,
    rules: &ValidationRules,
) -> ConfigError {
    let valid = rules
        .valid_categories
        .as_deref()
        .unwrap_or_default()
        .join(", ");
    ConfigError::schema(
        path,
        field,
        format!("category '{category}' is not one of: {valid}"),
    )
}
