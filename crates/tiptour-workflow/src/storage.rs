//! Workflow storage - one pretty-printed JSON document per workflow id

use crate::types::Workflow;
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const EXTENSION: &str = "json";

pub struct WorkflowStorage {
    dir: PathBuf,
}

impl WorkflowStorage {
    /// Storage under `$HOME/.tiptour/workflows`.
    pub fn new() -> Result<Self> {
        let home = std::env::var("HOME").context("HOME not set")?;
        Self::with_dir(PathBuf::from(home).join(".tiptour").join("workflows"))
    }

    pub fn with_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating workflow directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn file(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            bail!("invalid workflow id {:?}", id);
        }
        Ok(self.dir.join(format!("{}.{}", id, EXTENSION)))
    }

    /// Writes `<id>.json`, replacing any previous version.
    pub fn save(&self, workflow: &Workflow) -> Result<PathBuf> {
        let path = self.file(&workflow.id)?;
        fs::write(&path, to_json(workflow)?)
            .with_context(|| format!("writing {}", path.display()))?;
        tracing::debug!("saved workflow {} to {}", workflow.id, path.display());
        Ok(path)
    }

    /// Reads a stored document. Not validated here.
    pub fn load(&self, id: &str) -> Result<Workflow> {
        let path = self.file(id)?;
        let text =
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        from_json(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Stored ids, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub fn exists(&self, id: &str) -> bool {
        self.file(id).is_ok_and(|p| p.is_file())
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let path = self.file(id)?;
        fs::remove_file(&path).with_context(|| format!("deleting {}", path.display()))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}

/// Export form: pretty-printed JSON.
pub fn to_json(workflow: &Workflow) -> Result<String> {
    Ok(serde_json::to_string_pretty(workflow)?)
}

/// Import form. Parses without validating, like [`WorkflowStorage::load`].
pub fn from_json(text: &str) -> Result<Workflow> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Step;
    use tiptour_core::Selector;

    fn sample(id: &str) -> Workflow {
        Workflow::new(id, vec![Step::click(Selector::css("#go"))]).with_name("Go")
    }

    #[test]
    fn save_load_list_delete() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = WorkflowStorage::with_dir(tmp.path().join("flows")).unwrap();

        let path = storage.save(&sample("b")).unwrap();
        assert_eq!(path.file_name().unwrap(), "b.json");
        storage.save(&sample("a")).unwrap();
        fs::write(storage.path().join("notes.txt"), "x").unwrap();

        assert_eq!(storage.list().unwrap(), vec!["a", "b"]);
        assert_eq!(storage.load("a").unwrap(), sample("a"));
        assert!(storage.exists("b"));

        storage.delete("b").unwrap();
        assert_eq!(storage.list().unwrap(), vec!["a"]);
        assert!(!storage.exists("b"));
        assert!(storage.load("b").is_err());
    }

    #[test]
    fn saved_documents_are_pretty() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = WorkflowStorage::with_dir(tmp.path()).unwrap();
        let path = storage.save(&sample("w")).unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert!(text.starts_with("{\n  \"version\": \"1.0\""));
    }

    #[test]
    fn rejects_path_like_ids() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = WorkflowStorage::with_dir(tmp.path()).unwrap();
        assert!(storage.save(&sample("../escape")).is_err());
        assert!(storage.load("").is_err());
    }

    #[test]
    fn import_does_not_validate() {
        let wf = from_json(r#"{"version":"9","id":"x","steps":[]}"#).unwrap();
        assert_eq!(wf.version, "9");
        assert!(from_json("[]").is_err());
    }
}
