//! Discovers workflow definitions on disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::schema::WorkflowDefinition;
use crate::error::OrchestrationError;

/// Collects `*.yaml` / `*.yml` workflow files keyed by workflow id.
#[derive(Debug, Default)]
pub struct WorkflowLoader {
    workflows: BTreeMap<String, WorkflowDefinition>,
}

impl WorkflowLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// `~/.maestro/workflows`, then `./.maestro/workflows`. Loaded in this
    /// order, so a project definition replaces a home one with the same id.
    pub fn default_dirs() -> Vec<PathBuf> {
        Self::default_dirs_in(Path::new("."), dirs::home_dir().as_deref())
    }

    /// [`Self::default_dirs`] relative to an explicit project root and home.
    pub fn default_dirs_in(project_root: &Path, home: Option<&Path>) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        if let Some(home) = home {
            dirs.push(home.join(".maestro").join("workflows"));
        }
        dirs.push(project_root.join(".maestro").join("workflows"));
        dirs
    }

    /// Load every workflow file in `dir`. A later file with the same id
    /// replaces an earlier one. Fails on the first unreadable or invalid file.
    pub fn load_dir(&mut self, dir: impl AsRef<Path>) -> Result<usize, OrchestrationError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(OrchestrationError::Config(format!(
                "Workflow directory '{}' does not exist",
                dir.display()
            )));
        }

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(|e| {
            OrchestrationError::Config(format!("Failed to read directory '{}': {}", dir.display(), e))
        })? {
            let entry =
                entry.map_err(|e| OrchestrationError::Config(format!("Directory entry error: {}", e)))?;
            let path = entry.path();
            match path.extension().and_then(|e| e.to_str()) {
                Some("yaml" | "yml") => paths.push(path),
                _ => continue,
            }
        }
        // read_dir order is platform dependent.
        paths.sort();

        let mut count = 0;
        for path in paths {
            let definition = WorkflowDefinition::from_file(&path.to_string_lossy())?;
            tracing::info!(
                "[WorkflowLoader] Loaded workflow: {} ({}, {} steps)",
                definition.id,
                definition.workflow_type,
                definition.steps.len()
            );
            self.workflows.insert(definition.id.clone(), definition);
            count += 1;
        }

        Ok(count)
    }

    /// Load from each default directory that exists; errors are logged and
    /// skipped.
    pub fn load_default_dirs(&mut self) -> usize {
        self.load_dirs(&Self::default_dirs())
    }

    pub fn load_dirs(&mut self, dirs: &[PathBuf]) -> usize {
        let mut total = 0;
        for dir in dirs {
            if !dir.is_dir() {
                continue;
            }
            match self.load_dir(dir) {
                Ok(n) => {
                    tracing::info!("[WorkflowLoader] Loaded {} workflows from '{}'", n, dir.display());
                    total += n;
                }
                Err(e) => {
                    tracing::warn!("[WorkflowLoader] Failed to load from '{}': {}", dir.display(), e);
                }
            }
        }
        total
    }

    pub fn get(&self, id: &str) -> Option<&WorkflowDefinition> {
        self.workflows.get(id)
    }

    pub fn all(&self) -> &BTreeMap<String, WorkflowDefinition> {
        &self.workflows
    }

    pub fn into_definitions(self) -> Vec<WorkflowDefinition> {
        self.workflows.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::WorkflowType;

    const SEQ: &str = "id: onboarding\ntype: sequential\nsteps:\n  - id: a\n    target: profile\n";
    const PAR: &str = "id: checkup\ntype: parallel\nsteps:\n  - id: a\n    target: fitness\n  - id: b\n    target: nutrition\n";

    #[test]
    fn test_load_dir_picks_up_yaml_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("onboarding.yaml"), SEQ).unwrap();
        std::fs::write(dir.path().join("checkup.yml"), PAR).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a workflow").unwrap();

        let mut loader = WorkflowLoader::new();
        assert_eq!(loader.load_dir(dir.path()).unwrap(), 2);
        assert_eq!(loader.get("checkup").unwrap().workflow_type, WorkflowType::Parallel);
        let ids: Vec<_> = loader.all().keys().cloned().collect();
        assert_eq!(ids, vec!["checkup", "onboarding"]);
    }

    #[test]
    fn test_invalid_file_fails_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.yaml"), "id: x\ntype: sometimes\nsteps: []\n").unwrap();

        let err = WorkflowLoader::new().load_dir(dir.path()).unwrap_err();
        assert!(matches!(err, OrchestrationError::Config(_)));
    }

    #[test]
    fn test_missing_dir() {
        let err = WorkflowLoader::new().load_dir("/definitely/not/here").unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_load_dirs_skips_broken_and_missing() {
        let good = tempfile::tempdir().unwrap();
        let bad = tempfile::tempdir().unwrap();
        std::fs::write(good.path().join("onboarding.yaml"), SEQ).unwrap();
        std::fs::write(bad.path().join("broken.yaml"), "::::").unwrap();

        let mut loader = WorkflowLoader::new();
        let total = loader.load_dirs(&[
            PathBuf::from("/definitely/not/here"),
            bad.path().to_path_buf(),
            good.path().to_path_buf(),
        ]);
        assert_eq!(total, 1);
        assert_eq!(loader.into_definitions().len(), 1);
    }

    #[test]
    fn test_default_dirs_project_overrides_home() {
        let project = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let dirs = WorkflowLoader::default_dirs_in(project.path(), Some(home.path()));
        assert_eq!(dirs, vec![
            home.path().join(".maestro/workflows"),
            project.path().join(".maestro/workflows"),
        ]);

        for dir in &dirs {
            std::fs::create_dir_all(dir).unwrap();
        }
        std::fs::write(dirs[0].join("onboarding.yaml"), SEQ).unwrap();
        std::fs::write(dirs[0].join("checkup.yaml"), PAR).unwrap();
        std::fs::write(
            dirs[1].join("onboarding.yaml"),
            "id: onboarding\ntype: loop\nsteps:\n  - id: a\n    target: profile\n",
        )
        .unwrap();

        let mut loader = WorkflowLoader::new();
        assert_eq!(loader.load_dirs(&dirs), 3);
        assert_eq!(loader.all().len(), 2);
        assert_eq!(loader.get("onboarding").unwrap().workflow_type, WorkflowType::Loop);
    }

    #[test]
    fn test_default_dirs_end_with_project_dir() {
        let dirs = WorkflowLoader::default_dirs();
        assert_eq!(dirs.last(), Some(&PathBuf::from(".").join(".maestro").join("workflows")));
    }
}
