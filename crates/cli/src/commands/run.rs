//! Run Commands

use anyhow::{bail, Result};
use appdrive_flow::{builtin, FlowOutcome, FlowRunner, FlowSpec, SuiteOutcome};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use crate::config::AppdriveConfig;
use crate::output::{print_error, print_list, print_success, status_marker, OutputFormat, TableDisplay};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Flow to run by name (flows directory first, then built-ins)
    #[arg(long, conflicts_with_all = ["file", "dir"])]
    pub flow: Option<String>,

    /// Flow file to run
    #[arg(long, conflicts_with = "dir")]
    pub file: Option<PathBuf>,

    /// Run every flow in this directory instead of the configured one
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Only run flows carrying this tag
    #[arg(long)]
    pub tag: Option<String>,

    /// Seed for generated values
    #[arg(long)]
    pub seed: Option<u64>,

    /// Do not write results.json
    #[arg(long)]
    pub no_results: bool,
}

/// One row of the run summary
#[derive(Serialize)]
pub struct OutcomeRow {
    pub name: String,
    pub success: bool,
    pub steps: String,
    pub duration_ms: u64,
    pub error: Option<String>,
}

impl From<&FlowOutcome> for OutcomeRow {
    fn from(outcome: &FlowOutcome) -> Self {
        let passed = outcome.steps.iter().filter(|s| s.success).count();
        Self {
            name: outcome.name.clone(),
            success: outcome.success,
            steps: format!("{}/{}", passed, outcome.steps.len()),
            duration_ms: outcome.duration_ms,
            error: outcome.error.clone(),
        }
    }
}

impl TableDisplay for OutcomeRow {
    fn headers() -> Vec<&'static str> {
        vec!["FLOW", "RESULT", "STEPS", "DURATION", "ERROR"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            status_marker(self.success),
            self.steps.clone(),
            format!("{} ms", self.duration_ms),
            self.error.clone().unwrap_or_default(),
        ]
    }
}

/// Pick the flows to run from the arguments
pub fn select_flows(args: &RunArgs, config: &AppdriveConfig) -> Result<Vec<FlowSpec>> {
    let mut flows = if let Some(path) = &args.file {
        vec![FlowSpec::from_file(path)?]
    } else if let Some(name) = &args.flow {
        let local = if config.flows_dir.is_dir() {
            FlowSpec::find_in_dir(&config.flows_dir, name)?
        } else {
            None
        };
        match local {
            Some(flow) => vec![flow],
            None => vec![builtin::find(name)?],
        }
    } else {
        let dir = args.dir.as_ref().unwrap_or(&config.flows_dir);
        if !dir.is_dir() {
            bail!(
                "flows directory {} does not exist; use --flow for a built-in flow ({})",
                dir.display(),
                builtin::names().join(", ")
            );
        }
        FlowSpec::load_all(dir)?
    };

    if let Some(tag) = &args.tag {
        flows.retain(|f| f.tags.iter().any(|t| t == tag));
    }
    if flows.is_empty() {
        bail!("no flows selected");
    }
    Ok(flows)
}

pub async fn execute(args: RunArgs, config: &AppdriveConfig, format: OutputFormat) -> Result<()> {
    let flows = select_flows(&args, config)?;

    let mut runner_config = config.runner_config();
    if args.seed.is_some() {
        runner_config.seed = args.seed;
    }
    let mut runner = FlowRunner::with_config(runner_config);

    let suite: SuiteOutcome = runner.run_flows(&flows).await;

    let rows: Vec<OutcomeRow> = suite.results.iter().map(OutcomeRow::from).collect();
    print_list(&rows, format)?;

    if !args.no_results {
        runner.write_results(&suite)?;
    }

    if suite.failed > 0 {
        print_error(&format!("{} of {} flow(s) failed", suite.failed, suite.total));
        bail!("flow run failed");
    }
    print_success(&format!("{} flow(s) passed in {} ms", suite.passed, suite.duration_ms));
    Ok(())
}
