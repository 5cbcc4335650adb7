//! Validate Commands

use anyhow::{bail, Result};
use appdrive_flow::FlowSpec;
use clap::Args;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::output::{print_list, status_marker, OutputFormat, TableDisplay};

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Flow file or directory of flow files
    pub path: PathBuf,
}

#[derive(Serialize)]
pub struct ValidationRow {
    pub path: String,
    pub name: Option<String>,
    pub valid: bool,
    pub error: Option<String>,
}

impl TableDisplay for ValidationRow {
    fn headers() -> Vec<&'static str> {
        vec!["PATH", "FLOW", "RESULT", "ERROR"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.path.clone(),
            self.name.clone().unwrap_or_default(),
            status_marker(self.valid),
            self.error.clone().unwrap_or_default(),
        ]
    }
}

fn check(path: &Path) -> ValidationRow {
    let parsed = FlowSpec::from_file(path);
    let name = parsed.as_ref().ok().map(|f| f.name.clone());
    let error = parsed.and_then(|f| f.validate()).err().map(|e| e.to_string());
    ValidationRow {
        path: path.display().to_string(),
        name,
        valid: error.is_none(),
        error,
    }
}

/// Check one file, or every flow file under a directory
pub fn validate_path(path: &Path) -> Result<Vec<ValidationRow>> {
    if path.is_file() {
        return Ok(vec![check(path)]);
    }
    if !path.is_dir() {
        bail!("{} does not exist", path.display());
    }
    Ok(walkdir::WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| ext == "yaml" || ext == "yml")
                .unwrap_or(false)
        })
        .map(|e| check(e.path()))
        .collect())
}

pub async fn execute(args: ValidateArgs, format: OutputFormat) -> Result<()> {
    let rows = validate_path(&args.path)?;
    print_list(&rows, format)?;

    let invalid = rows.iter().filter(|r| !r.valid).count();
    if invalid > 0 {
        bail!("{} invalid flow file(s)", invalid);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn reports_each_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.yaml"), "name: a\nsteps:\n  - action: back\n").unwrap();
        std::fs::write(
            dir.path().join("b.yml"),
            "name: b\nsteps:\n  - action: log\n    message: ${missing}\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let rows = validate_path(dir.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].valid);
        assert_eq!(rows[1].name.as_deref(), Some("b"));
        assert!(rows[1].error.as_deref().unwrap().contains("${missing}"));
    }

    #[test]
    fn unparseable_file_has_no_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "name: [unclosed\n").unwrap();
        let rows = validate_path(&path).unwrap();
        assert!(!rows[0].valid);
        assert!(rows[0].name.is_none());
    }
}
