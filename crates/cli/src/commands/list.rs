//! List Commands

use anyhow::Result;
use appdrive_flow::{builtin, FlowSpec};
use serde::Serialize;

use crate::config::AppdriveConfig;
use crate::output::{print_list, OutputFormat, TableDisplay};

/// Flow summary for listing
#[derive(Serialize)]
pub struct FlowRow {
    pub name: String,
    pub source: String,
    pub steps: usize,
    pub tags: Vec<String>,
    pub description: String,
}

impl FlowRow {
    fn new(flow: FlowSpec, source: &str) -> Self {
        Self {
            name: flow.name,
            source: source.to_string(),
            steps: flow.steps.len(),
            tags: flow.tags,
            description: flow.description,
        }
    }
}

impl TableDisplay for FlowRow {
    fn headers() -> Vec<&'static str> {
        vec!["NAME", "SOURCE", "STEPS", "TAGS", "DESCRIPTION"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.source.clone(),
            self.steps.to_string(),
            self.tags.join(", "),
            self.description.clone(),
        ]
    }
}

/// Built-in flows followed by the flows directory
pub fn collect(config: &AppdriveConfig) -> Result<Vec<FlowRow>> {
    let mut rows: Vec<FlowRow> = builtin::all()?
        .into_iter()
        .map(|f| FlowRow::new(f, "built-in"))
        .collect();

    if config.flows_dir.is_dir() {
        let source = config.flows_dir.display().to_string();
        rows.extend(
            FlowSpec::load_all(&config.flows_dir)?
                .into_iter()
                .map(|f| FlowRow::new(f, &source)),
        );
    }
    Ok(rows)
}

pub async fn execute(config: &AppdriveConfig, format: OutputFormat) -> Result<()> {
    print_list(&collect(config)?, format)
}
