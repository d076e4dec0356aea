//! Registry layout detection.

use std::path::{Path, PathBuf};

use tracing::warn;

use super::document::yaml_files;
use crate::error::ConfigResult;

pub const REGISTRY_DIR: &str = "test_registry";
pub const REGISTRY_FILE: &str = "test_registry.yaml";
pub const GLOBALS_FILE: &str = "_globals.yaml";
pub const SUITES_DIR: &str = "suites";
pub const PROFILES_DIR: &str = "execution";
pub const HARDWARE_DIR: &str = "hardware";

/// Which on-disk layout the suites and profiles come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryLayout {
    /// `test_registry/{_globals.yaml, suites/, execution/}`.
    Split { dir: PathBuf },
    /// A single `test_registry.yaml`.
    Monolithic { file: PathBuf },
    /// Neither layout is present.
    Empty,
}

impl RegistryLayout {
    /// Detects the layout under `root`. The split layout wins when both exist.
    pub fn detect(root: &Path) -> Self {
        let dir = root.join(REGISTRY_DIR);
        let file = root.join(REGISTRY_FILE);

        match (dir.is_dir(), file.is_file()) {
            (true, true) => {
                warn!(
                    ignored = %file.display(),
                    "both registry layouts present; using {}",
                    dir.display()
                );
                RegistryLayout::Split { dir }
            }
            (true, false) => RegistryLayout::Split { dir },
            (false, true) => RegistryLayout::Monolithic { file },
            (false, false) => {
                warn!(root = %root.display(), "no test registry found; nothing to run");
                RegistryLayout::Empty
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RegistryLayout::Split { .. } => "split",
            RegistryLayout::Monolithic { .. } => "monolithic",
            RegistryLayout::Empty => "empty",
        }
    }

    /// Every registry document the layout consists of.
    pub fn files(&self) -> ConfigResult<Vec<PathBuf>> {
        match self {
            RegistryLayout::Split { dir } => {
                let mut files = Vec::new();
                let globals = dir.join(GLOBALS_FILE);
                if globals.is_file() {
                    files.push(globals);
                }
                files.extend(yaml_files(&dir.join(SUITES_DIR))?);
                files.extend(yaml_files(&dir.join(PROFILES_DIR))?);
                Ok(files)
            }
            RegistryLayout::Monolithic { file } => Ok(vec![file.clone()]),
            RegistryLayout::Empty => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_detect_each_layout() {
        let root = TempDir::new().unwrap();
        assert_eq!(RegistryLayout::detect(root.path()), RegistryLayout::Empty);

        fs::write(root.path().join(REGISTRY_FILE), "test_suites: {}\n").unwrap();
        assert_eq!(RegistryLayout::detect(root.path()).name(), "monolithic");

        fs::create_dir(root.path().join(REGISTRY_DIR)).unwrap();
        assert_eq!(
            RegistryLayout::detect(root.path()),
            RegistryLayout::Split {
                dir: root.path().join(REGISTRY_DIR)
            }
        );
    }

    #[test]
    fn test_split_files_lists_globals_suites_and_profiles() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join(REGISTRY_DIR);
        fs::create_dir_all(dir.join(SUITES_DIR)).unwrap();
        fs::create_dir_all(dir.join(PROFILES_DIR)).unwrap();
        fs::write(dir.join(GLOBALS_FILE), "").unwrap();
        fs::write(dir.join(SUITES_DIR).join("can_bus.yaml"), "").unwrap();
        fs::write(dir.join(PROFILES_DIR).join("smoke.yaml"), "").unwrap();

        let files = RegistryLayout::detect(root.path()).files().unwrap();
        assert_eq!(
            files,
            vec![
                dir.join(GLOBALS_FILE),
                dir.join(SUITES_DIR).join("can_bus.yaml"),
                dir.join(PROFILES_DIR).join("smoke.yaml"),
            ]
        );
    }
}
