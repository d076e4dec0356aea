//! The Config Store.
//!
//! `ConfigStore::open` detects the registry layout under a config root,
//! normalizes it into a [`TestRegistry`], and validates it once. Platform
//! files are read on demand from `<root>/hardware/<name>.yaml`.
//!
//! ```text
//! config/
//! ├── hardware/<platform>.yaml
//! ├── test_registry/            (split layout)
//! │   ├── _globals.yaml
//! │   ├── suites/<suite>.yaml
//! │   └── execution/<profile>.yaml
//! └── test_registry.yaml        (monolithic layout)
//! ```

pub(crate) mod document;
mod layout;
mod monolithic;
mod split;
mod validate;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

pub use layout::{
    GLOBALS_FILE, HARDWARE_DIR, PROFILES_DIR, REGISTRY_DIR, REGISTRY_FILE, RegistryLayout,
    SUITES_DIR,
};
pub(crate) use validate::check_overrides;

use crate::error::{ConfigError, ConfigResult, DocumentKind};
use crate::model::{
    ExecutionProfile, GlobalDefaults, ProfileSummary, SuiteDefinition, SuiteSummary,
};
use crate::platform::PlatformConfig;

/// Suites, profiles, and globals normalized from either layout.
///
/// Suites and profiles are kept sorted by name so both layouts produce the
/// same sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestRegistry {
    pub globals: GlobalDefaults,
    /// The document the globals came from (may not exist).
    pub globals_source: PathBuf,
    pub suites: Vec<SuiteDefinition>,
    pub profiles: Vec<ExecutionProfile>,
}

impl TestRegistry {
    pub fn new(
        globals: GlobalDefaults,
        globals_source: PathBuf,
        mut suites: Vec<SuiteDefinition>,
        mut profiles: Vec<ExecutionProfile>,
    ) -> Self {
        suites.sort_by(|a, b| a.name.cmp(&b.name));
        profiles.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            globals,
            globals_source,
            suites,
            profiles,
        }
    }

    pub fn suite(&self, name: &str) -> Option<&SuiteDefinition> {
        self.suites.iter().find(|suite| suite.name == name)
    }

    pub fn profile(&self, name: &str) -> Option<&ExecutionProfile> {
        self.profiles.iter().find(|profile| profile.name == name)
    }

    pub fn suite_names(&self) -> Vec<String> {
        self.suites.iter().map(|suite| suite.name.clone()).collect()
    }

    pub fn profile_names(&self) -> Vec<String> {
        self.profiles.iter().map(|profile| profile.name.clone()).collect()
    }
}

/// Access to a configuration root. Only [`ConfigStore::migrate_to_split`]
/// writes to it.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    root: PathBuf,
    layout: RegistryLayout,
    registry: TestRegistry,
}

impl ConfigStore {
    /// Loads and validates the registry under `root`.
    pub fn open(root: impl Into<PathBuf>) -> ConfigResult<Self> {
        let root = root.into();
        let layout = RegistryLayout::detect(&root);
        let registry = match &layout {
            RegistryLayout::Split { dir } => split::load_registry(dir)?,
            RegistryLayout::Monolithic { file } => monolithic::load_registry(file)?,
            RegistryLayout::Empty => TestRegistry::default(),
        };
        validate::validate(&registry, &layout)?;

        info!(
            layout = layout.name(),
            suites = registry.suites.len(),
            profiles = registry.profiles.len(),
            "loaded test registry"
        );

        Ok(Self {
            root,
            layout,
            registry,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Rewrites a monolithic registry as the split layout and moves the
    /// monolithic file aside to `test_registry.yaml.backup`.
    ///
    /// Returns the store reopened on the new layout and the files written.
    pub fn migrate_to_split(&self) -> ConfigResult<(ConfigStore, Vec<PathBuf>)> {
        let RegistryLayout::Monolithic { file } = &self.layout else {
            return Err(ConfigError::NotMigratable {
                path: self.root.clone(),
                reason: format!("registry layout is {}, not monolithic", self.layout.name()),
            });
        };

        let dir = self.root.join(REGISTRY_DIR);
        split::write_registry(&self.registry, &dir)?;

        let mut backup = file.clone().into_os_string();
        backup.push(".backup");
        let backup = PathBuf::from(backup);
        fs::rename(file, &backup).map_err(|source| ConfigError::Io {
            path: file.clone(),
            source,
        })?;
        info!(
            from = %file.display(),
            to = %dir.display(),
            backup = %backup.display(),
            "migrated registry to split layout"
        );

        let store = ConfigStore::open(&self.root)?;
        let written = store.layout.files()?;
        Ok((store, written))
    }

    pub fn layout(&self) -> &RegistryLayout {
        &self.layout
    }

    pub fn registry(&self) -> &TestRegistry {
        &self.registry
    }

    pub fn suites(&self) -> &[SuiteDefinition] {
        &self.registry.suites
    }

    pub fn hardware_dir(&self) -> PathBuf {
        self.root.join(HARDWARE_DIR)
    }

    /// Reads `hardware/<name>.yaml`.
    pub fn load_platform(&self, name: &str) -> ConfigResult<PlatformConfig> {
        let path = self.hardware_dir().join(format!("{name}.yaml"));
        let is_plain_name = !name.is_empty() && !name.contains(['/', '\\']) && name != "..";
        if !is_plain_name || !path.is_file() {
            return Err(ConfigError::NotFound {
                kind: DocumentKind::Platform,
                name: name.to_string(),
                path,
                available: self.list_platforms()?,
            });
        }

        debug!(platform = name, path = %path.display(), "loading platform");
        let text = document::read(&path)?;
        PlatformConfig::from_yaml(name, &path, &text)
    }

    /// Platform names (file stems) under `hardware/`, sorted.
    pub fn list_platforms(&self) -> ConfigResult<Vec<String>> {
        Ok(document::yaml_files(&self.hardware_dir())?
            .iter()
            .map(|path| document::stem(path))
            .collect())
    }

    pub fn load_suite(&self, name: &str) -> ConfigResult<SuiteDefinition> {
        self.registry
            .suite(name)
            .cloned()
            .ok_or_else(|| self.not_found(DocumentKind::Suite, name))
    }

    pub fn load_profile(&self, name: &str) -> ConfigResult<ExecutionProfile> {
        self.registry
            .profile(name)
            .cloned()
            .ok_or_else(|| self.not_found(DocumentKind::Profile, name))
    }

    pub fn load_globals(&self) -> GlobalDefaults {
        self.registry.globals.clone()
    }

    pub fn list_profiles(&self) -> Vec<ProfileSummary> {
        self.registry
            .profiles
            .iter()
            .map(ExecutionProfile::summary)
            .collect()
    }

    pub fn list_suites(&self) -> Vec<SuiteSummary> {
        self.registry
            .suites
            .iter()
            .map(SuiteDefinition::summary)
            .collect()
    }

    fn not_found(&self, kind: DocumentKind, name: &str) -> ConfigError {
        let (path, available) = match (&self.layout, kind) {
            (RegistryLayout::Split { dir }, DocumentKind::Suite) => (
                dir.join(SUITES_DIR).join(format!("{name}.yaml")),
                self.registry.suite_names(),
            ),
            (RegistryLayout::Split { dir }, _) => (
                dir.join(PROFILES_DIR).join(format!("{name}.yaml")),
                self.registry.profile_names(),
            ),
            (RegistryLayout::Monolithic { file }, DocumentKind::Suite) => {
                (file.clone(), self.registry.suite_names())
            }
            (RegistryLayout::Monolithic { file }, _) => {
                (file.clone(), self.registry.profile_names())
            }
            (RegistryLayout::Empty, _) => (self.root.join(REGISTRY_DIR), Vec::new()),
        };
        ConfigError::NotFound {
            kind,
            name: name.to_string(),
            path,
            available,
        }
    }
}
