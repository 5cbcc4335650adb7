//! Flow runner: one session per flow, steps in order, teardown always

use appdrive_driver::{DriverConfig, Element, KeyCode, Session};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::builtin;
use crate::error::{FlowError, FlowResult};
use crate::generate;
use crate::spec::{Action, FlowSpec, FlowStep, Target};
use crate::template;

const REDACTED: &str = "********";

/// Result of a single step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub index: usize,
    pub step_name: String,
    pub success: bool,
    pub optional: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub screenshot_path: Option<PathBuf>,
}

/// Result of running one flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowOutcome {
    pub name: String,
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub session_id: Option<String>,
    /// Generated values, secrets redacted
    pub variables: BTreeMap<String, String>,
    pub steps: Vec<StepOutcome>,
    pub failure_screenshot: Option<PathBuf>,
    pub error: Option<String>,
}

impl FlowOutcome {
    fn failed(name: &str, started_at: DateTime<Utc>, error: String) -> Self {
        Self {
            name: name.to_string(),
            success: false,
            started_at,
            duration_ms: 0,
            session_id: None,
            variables: BTreeMap::new(),
            steps: vec![],
            failure_screenshot: None,
            error: Some(error),
        }
    }
}

/// Result of running several flows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteOutcome {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<FlowOutcome>,
}

impl SuiteOutcome {
    pub fn from_results(results: Vec<FlowOutcome>, duration_ms: u64) -> Self {
        let passed = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
            duration_ms,
            results,
        }
    }
}

/// Configuration for the flow runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub driver: DriverConfig,

    /// Directory searched by `run_all`, `run_tagged` and `run_named`
    pub flows_dir: PathBuf,

    /// Results and screenshots go here
    pub output_dir: PathBuf,

    /// Capture the screen when a step fails
    pub screenshot_on_failure: bool,

    /// Timeout for `wait_for` steps that do not set one
    pub wait_timeout: Duration,

    pub poll_interval: Duration,

    /// Seed for generated values; random when unset
    pub seed: Option<u64>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            driver: DriverConfig::default(),
            flows_dir: PathBuf::from("flows"),
            output_dir: PathBuf::from("appdrive-results"),
            screenshot_on_failure: true,
            wait_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(500),
            seed: None,
        }
    }
}

/// Runs flows against the automation endpoint
pub struct FlowRunner {
    config: RunnerConfig,
    rng: StdRng,
}

impl FlowRunner {
    pub fn new() -> Self {
        Self::with_config(RunnerConfig::default())
    }

    pub fn with_config(config: RunnerConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { config, rng }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    fn screenshot_dir(&self) -> PathBuf {
        self.config.output_dir.join("screenshots")
    }

    /// Flows from the flows directory, or none when it does not exist
    fn load_dir(&self) -> FlowResult<Vec<FlowSpec>> {
        if self.config.flows_dir.is_dir() {
            FlowSpec::load_all(&self.config.flows_dir)
        } else {
            Ok(Vec::new())
        }
    }

    /// Run every flow in the flows directory
    pub async fn run_all(&mut self) -> FlowResult<SuiteOutcome> {
        let flows = self.load_dir()?;
        Ok(self.run_flows(&flows).await)
    }

    /// Run flows from the flows directory carrying `tag`
    pub async fn run_tagged(&mut self, tag: &str) -> FlowResult<SuiteOutcome> {
        let flows = self.load_dir()?;
        let tagged: Vec<FlowSpec> = FlowSpec::filter_by_tag(&flows, tag).into_iter().cloned().collect();
        Ok(self.run_flows(&tagged).await)
    }

    /// Run a flow by name; the flows directory shadows built-ins
    pub async fn run_named(&mut self, name: &str) -> FlowResult<FlowOutcome> {
        let local = if self.config.flows_dir.is_dir() {
            FlowSpec::find_in_dir(&self.config.flows_dir, name)?
        } else {
            None
        };
        let flow = match local {
            Some(flow) => flow,
            None => builtin::find(name)?,
        };
        self.run_flow(&flow).await
    }

    /// Run flows sequentially; a flow that cannot start counts as failed
    pub async fn run_flows(&mut self, flows: &[FlowSpec]) -> SuiteOutcome {
        let start = Instant::now();
        let mut results = Vec::with_capacity(flows.len());

        info!("Running {} flow(s)...", flows.len());

        for flow in flows {
            let outcome = match self.run_flow(flow).await {
                Ok(outcome) => outcome,
                Err(e) => FlowOutcome::failed(&flow.name, Utc::now(), e.to_string()),
            };
            if outcome.success {
                info!("✓ {} ({} ms)", outcome.name, outcome.duration_ms);
            } else {
                error!("✗ {} - {}", outcome.name, outcome.error.as_deref().unwrap_or("unknown error"));
            }
            results.push(outcome);
        }

        let suite = SuiteOutcome::from_results(results, start.elapsed().as_millis() as u64);
        info!(
            "Flow results: {} passed, {} failed ({} ms)",
            suite.passed, suite.failed, suite.duration_ms
        );
        suite
    }

    /// Run a single flow.
    ///
    /// Errors are returned only when the flow cannot start (invalid flow,
    /// generator failure, session refused). Step failures are reported in
    /// the outcome, and the session is deleted either way.
    pub async fn run_flow(&mut self, flow: &FlowSpec) -> FlowResult<FlowOutcome> {
        flow.validate()?;
        let started_at = Utc::now();
        let start = Instant::now();

        let vars = generate::resolve(&flow.variables, &mut self.rng)?;
        let secrets = flow.secret_variables();
        let reported: BTreeMap<String, String> = vars
            .iter()
            .map(|(k, v)| {
                let shown = if secrets.contains(&k.as_str()) { REDACTED.to_string() } else { v.clone() };
                (k.clone(), shown)
            })
            .collect();
        for (k, v) in &reported {
            info!("{} = {}", k, v);
        }

        let mut driver = self.config.driver.clone();
        if let Some(caps) = &flow.capabilities {
            driver.capabilities = driver.capabilities.merged(caps);
        }

        info!("Starting flow '{}' ({} steps)", flow.name, flow.steps.len());
        let session = Session::start(&driver).await?;

        let mut steps = Vec::with_capacity(flow.steps.len());
        let mut flow_error: Option<String> = None;
        let mut failure_screenshot = None;

        for (index, step) in flow.steps.iter().enumerate() {
            let result = self.execute_step(&session, flow, index, step, &vars, &reported).await;

            if let Some(err) = &result.error {
                if step.optional {
                    warn!("Optional step {} failed, continuing: {}", result.step_name, err);
                } else {
                    error!("Step {} failed: {}", result.step_name, err);
                    flow_error = Some(format!("{} - {}", result.step_name, err));
                    if self.config.screenshot_on_failure {
                        failure_screenshot = self
                            .capture(&session, &format!("{}-failure-step{}", flow.name, index + 1))
                            .await;
                    }
                    steps.push(result);
                    break;
                }
            }
            steps.push(result);
        }

        if let Err(e) = session.quit().await {
            warn!("Failed to delete session {}: {}", session.id(), e);
        }

        Ok(FlowOutcome {
            name: flow.name.clone(),
            success: flow_error.is_none(),
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            session_id: Some(session.id().to_string()),
            variables: reported,
            steps,
            failure_screenshot,
            error: flow_error,
        })
    }

    async fn execute_step(
        &self,
        session: &Session,
        flow: &FlowSpec,
        index: usize,
        step: &FlowStep,
        vars: &BTreeMap<String, String>,
        shown: &BTreeMap<String, String>,
    ) -> StepOutcome {
        let start = Instant::now();
        let step_name = step.action.describe();
        debug!("Executing step {}: {}", index + 1, step_name);

        let result = self.execute_action(session, flow, &step.action, vars, shown).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(screenshot_path) => StepOutcome {
                index,
                step_name,
                success: true,
                optional: step.optional,
                duration_ms,
                error: None,
                screenshot_path,
            },
            Err(e) => StepOutcome {
                index,
                step_name,
                success: false,
                optional: step.optional,
                duration_ms,
                error: Some(e.to_string()),
                screenshot_path: None,
            },
        }
    }

    /// `vars` holds the real values and is only used for input sent to the
    /// device and for comparisons; `shown` has secrets redacted and is used
    /// for everything that ends up in logs or reports.
    async fn execute_action(
        &self,
        session: &Session,
        flow: &FlowSpec,
        action: &Action,
        vars: &BTreeMap<String, String>,
        shown: &BTreeMap<String, String>,
    ) -> FlowResult<Option<PathBuf>> {
        match action {
            Action::Sleep { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            Action::Tap { target, times, wait_ms } => {
                let element = self.locate(session, target, *wait_ms).await?;
                for _ in 0..*times {
                    element.click().await?;
                }
            }
            Action::Fill {
                target,
                value,
                clear_keystrokes,
                clear_existing,
                settle_ms,
                submit,
                hide_keyboard,
                wait_ms,
            } => {
                let value = template::render(value, vars)?;
                let element = self.locate(session, target, *wait_ms).await?;
                element.click().await?;

                let existing = if *clear_existing { Some(element.text().await?) } else { None };
                let deletes = delete_count(*clear_keystrokes, existing.as_deref());
                session.press_keycode_times(KeyCode::DEL, deletes).await?;
                if *settle_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(*settle_ms)).await;
                }

                element.send_keys(&value).await?;
                if *submit {
                    session.press_keycode(KeyCode::DPAD_CENTER).await?;
                }
                if *hide_keyboard {
                    session.press_keycode(KeyCode::BACK).await?;
                }
            }
            Action::PressKey { key, times } => {
                session.press_keycode_times(*key, *times).await?;
            }
            Action::Back => {
                session.press_keycode(KeyCode::BACK).await?;
            }
            Action::Scroll { from, to } => {
                let origin = session.find_first(from.locators()).await?;
                let destination = session.find_first(to.locators()).await?;
                session.scroll(&origin, &destination).await?;
            }
            Action::WaitFor { target, timeout_ms } => {
                let timeout = timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(self.config.wait_timeout);
                session
                    .wait_for(target.locators(), timeout, self.config.poll_interval)
                    .await?;
            }
            Action::AssertText { target, equals, contains } => {
                let actual = session.find_first(target.locators()).await?.text().await?;
                if let Some(expected) = equals {
                    if actual != template::render(expected, vars)? {
                        return Err(FlowError::AssertionFailed(format!(
                            "{}: expected text '{}', got '{}'",
                            target.label(),
                            template::render(expected, shown)?,
                            redact_secrets(&actual, vars, shown)
                        )));
                    }
                }
                if let Some(needle) = contains {
                    if !actual.contains(&template::render(needle, vars)?) {
                        return Err(FlowError::AssertionFailed(format!(
                            "{}: '{}' does not contain '{}'",
                            target.label(),
                            redact_secrets(&actual, vars, shown),
                            template::render(needle, shown)?
                        )));
                    }
                }
            }
            Action::AssertVisible { target, visible } => {
                let displayed = match session.find_first(target.locators()).await {
                    Ok(element) => element.is_displayed().await?,
                    Err(e) if e.is_not_found() => false,
                    Err(e) => return Err(e.into()),
                };
                if displayed != *visible {
                    return Err(FlowError::AssertionFailed(format!(
                        "{}: expected {}, but it is {}",
                        target.label(),
                        if *visible { "visible" } else { "hidden" },
                        if displayed { "visible" } else { "hidden" }
                    )));
                }
            }
            Action::Screenshot { name } => {
                let path = self.screenshot_path(&format!("{}-{}", flow.name, name));
                write_screenshot(&path, &session.screenshot().await?)?;
                return Ok(Some(path));
            }
            Action::LogSettings => {
                let settings = session.settings().await?;
                info!("Driver settings: {}", settings);
            }
            Action::Log { message } => {
                info!("[FLOW LOG] {}", template::render(message, shown)?);
            }
        }
        Ok(None)
    }

    async fn locate(&self, session: &Session, target: &Target, wait_ms: Option<u64>) -> FlowResult<Element> {
        let element = match wait_ms {
            Some(ms) => {
                session
                    .wait_for(target.locators(), Duration::from_millis(ms), self.config.poll_interval)
                    .await?
            }
            None => session.find_first(target.locators()).await?,
        };
        Ok(element)
    }

    fn screenshot_path(&self, name: &str) -> PathBuf {
        self.screenshot_dir().join(format!("{}.png", sanitize(name)))
    }

    /// Best-effort screenshot; failures are only logged
    async fn capture(&self, session: &Session, name: &str) -> Option<PathBuf> {
        let path = self.screenshot_path(name);
        let result = match session.screenshot().await {
            Ok(png) => write_screenshot(&path, &png),
            Err(e) => Err(e.into()),
        };
        match result {
            Ok(()) => {
                info!("Saved failure screenshot: {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("Could not capture failure screenshot: {}", e);
                None
            }
        }
    }

    /// Write results to `results.json` in the output directory
    pub fn write_results(&self, results: &SuiteOutcome) -> FlowResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

impl Default for FlowRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// DEL presses for a fill step: the fixed count plus one per existing character
fn delete_count(clear_keystrokes: u32, existing: Option<&str>) -> u32 {
    let existing = existing.map_or(0, |text| u32::try_from(text.chars().count()).unwrap_or(u32::MAX));
    clear_keystrokes.saturating_add(existing)
}

/// Mask any secret value that shows up in text read back from the screen
fn redact_secrets(text: &str, vars: &BTreeMap<String, String>, shown: &BTreeMap<String, String>) -> String {
    vars.iter()
        .filter(|(name, value)| !value.is_empty() && shown.get(*name) != Some(*value))
        .fold(text.to_string(), |acc, (_, value)| acc.replace(value.as_str(), REDACTED))
}

fn write_screenshot(path: &Path, png: &[u8]) -> FlowResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, png)?;
    Ok(())
}

/// Keep file names portable
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
