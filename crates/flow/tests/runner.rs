//! Flow runner against the in-process fake endpoint

use std::time::Duration;

use appdrive_driver::fake::{Command, FakeAppium, FakeElement, FAKE_PNG};
use appdrive_driver::{Capabilities, DriverConfig, KeyCode, Locator};
use appdrive_flow::{builtin, Action, FlowError, FlowRunner, FlowSpec, RunnerConfig, SuiteOutcome};
use tempfile::TempDir;

struct Harness {
    fake: FakeAppium,
    runner: FlowRunner,
    dir: TempDir,
}

async fn harness() -> Harness {
    let fake = FakeAppium::start().await.expect("start fake endpoint");
    let dir = TempDir::new().unwrap();
    let config = RunnerConfig {
        driver: DriverConfig {
            server_url: fake.base_url().to_string(),
            request_timeout: Duration::from_secs(5),
            capabilities: Capabilities::android().with_device("emulator-5554"),
        },
        flows_dir: dir.path().join("flows"),
        output_dir: dir.path().join("out"),
        screenshot_on_failure: true,
        wait_timeout: Duration::from_millis(200),
        poll_interval: Duration::from_millis(20),
        seed: Some(7),
    };
    Harness {
        fake,
        runner: FlowRunner::with_config(config),
        dir,
    }
}

fn flow(yaml: &str) -> FlowSpec {
    FlowSpec::from_yaml(yaml).unwrap()
}

fn clicks(fake: &FakeAppium, id: &str) -> usize {
    fake.commands()
        .iter()
        .filter(|c| matches!(c, Command::Click(e) if e == id))
        .count()
}

#[tokio::test]
async fn tap_clicks_the_same_element_repeatedly() {
    let mut h = harness().await;
    let next = h.fake.add(FakeElement::new(Locator::text("NEXT")));

    let outcome = h
        .runner
        .run_flow(&flow(
            r#"
name: onboarding
steps:
  - action: tap
    target:
      text: NEXT
    times: 3
"#,
        ))
        .await
        .unwrap();

    assert!(outcome.success, "{:?}", outcome.error);
    assert_eq!(clicks(&h.fake, &next), 3);
    let finds = h.fake.commands().iter().filter(|c| matches!(c, Command::Find(_))).count();
    assert_eq!(finds, 1);
    assert_eq!(h.fake.live_sessions(), 0);
}

#[tokio::test]
async fn fill_clears_types_and_hides_keyboard() {
    let mut h = harness().await;
    let email = h.fake.add(FakeElement::new(Locator::accessibility_id("register-email-or-phone")));

    let outcome = h
        .runner
        .run_flow(&flow(
            r#"
name: email
variables:
  email:
    generator: literal
    value: testemail4242@test.tst
steps:
  - action: fill
    target:
      accessibility_id: register-email-or-phone
    value: ${email}
    clear_keystrokes: 25
    settle_ms: 10
    hide_keyboard: true
"#,
        ))
        .await
        .unwrap();

    assert!(outcome.success, "{:?}", outcome.error);
    let mut expected = vec![KeyCode::DEL.0; 25];
    expected.push(KeyCode::BACK.0);
    assert_eq!(h.fake.keycodes(), expected);
    assert_eq!(h.fake.element_text(&email).as_deref(), Some("testemail4242@test.tst"));
    assert_eq!(clicks(&h.fake, &email), 1);
}

#[tokio::test]
async fn fill_deletes_existing_text_and_submits() {
    let mut h = harness().await;
    h.fake.add(FakeElement::new(Locator::xpath("//android.widget.EditText[@content-desc=\"add-cash-input\"]")).text("0.00"));

    let outcome = h
        .runner
        .run_flow(&flow(
            r#"
name: deposit
variables:
  amount:
    generator: amount
    min: 100
    max: 10000
steps:
  - action: fill
    target:
      xpath: //android.widget.EditText[@content-desc="add-cash-input"]
    value: ${amount}
    clear_existing: true
    submit: true
"#,
        ))
        .await
        .unwrap();

    assert!(outcome.success, "{:?}", outcome.error);
    assert_eq!(h.fake.keycodes(), vec![67, 67, 67, 67, 23]);
    let amount = &outcome.variables["amount"];
    let parsed: f64 = amount.parse().unwrap();
    assert!((100.0..10000.0).contains(&parsed));
    assert_eq!(amount.split('.').nth(1).map(str::len), Some(2));
}

#[tokio::test]
async fn fallback_chain_uses_first_match() {
    let mut h = harness().await;
    let button = h.fake.add(FakeElement::new(Locator::content_desc("onboarding-button")));

    let outcome = h
        .runner
        .run_flow(&flow(
            r#"
name: fallback
steps:
  - action: tap
    target:
      - text: NEXT
      - content_desc: onboarding-button
"#,
        ))
        .await
        .unwrap();

    assert!(outcome.success, "{:?}", outcome.error);
    assert_eq!(clicks(&h.fake, &button), 1);
}

#[tokio::test]
async fn failing_step_stops_flow_and_still_quits() {
    let mut h = harness().await;
    let next = h.fake.add(FakeElement::new(Locator::text("NEXT")));
    let done = h.fake.add(FakeElement::new(Locator::text("DONE")));

    let outcome = h
        .runner
        .run_flow(&flow(
            r#"
name: payment
steps:
  - action: tap
    target:
      text: NEXT
  - action: tap
    target:
      text: I'VE ALREADY PAID
  - action: tap
    target:
      text: DONE
"#,
        ))
        .await
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.steps.len(), 2);
    assert!(outcome.steps[0].success);
    assert!(!outcome.steps[1].success);
    assert!(outcome.error.as_deref().unwrap().contains("ALREADY PAID"));
    assert_eq!(clicks(&h.fake, &next), 1);
    assert_eq!(clicks(&h.fake, &done), 0);
    assert_eq!(h.fake.live_sessions(), 0);

    let shot = outcome.failure_screenshot.expect("failure screenshot");
    assert!(shot.starts_with(h.dir.path().join("out").join("screenshots")));
    assert_eq!(std::fs::read(shot).unwrap(), FAKE_PNG);
}

#[tokio::test]
async fn optional_step_failure_is_tolerated() {
    let mut h = harness().await;
    let email = h.fake.add(FakeElement::new(Locator::accessibility_id("register-email-or-phone")));

    let outcome = h
        .runner
        .run_flow(&flow(
            r#"
name: scroll-then-fill
steps:
  - action: scroll
    from:
      accessibility_id: register-id-number
    to:
      accessibility_id: register-last-name
    optional: true
  - action: tap
    target:
      accessibility_id: register-email-or-phone
"#,
        ))
        .await
        .unwrap();

    assert!(outcome.success, "{:?}", outcome.error);
    assert!(!outcome.steps[0].success);
    assert!(outcome.steps[0].optional);
    assert_eq!(clicks(&h.fake, &email), 1);
}

#[tokio::test]
async fn wait_for_polls_until_element_appears() {
    let mut h = harness().await;
    h.fake.add(FakeElement::new(Locator::text("CONTINUE")).appears_after(3));

    let outcome = h
        .runner
        .run_flow(&flow(
            r#"
name: wait
steps:
  - action: wait_for
    target:
      text: CONTINUE
    timeout_ms: 2000
  - action: assert_visible
    target:
      text: CONTINUE
  - action: assert_visible
    target:
      text: LOGIN
    visible: false
"#,
        ))
        .await
        .unwrap();

    assert!(outcome.success, "{:?}", outcome.error);
}

#[tokio::test]
async fn assert_text_mismatch_fails() {
    let mut h = harness().await;
    h.fake.add(FakeElement::new(Locator::accessibility_id("balance")).text("R 0.00"));

    let outcome = h
        .runner
        .run_flow(&flow(
            r#"
name: balance
steps:
  - action: assert_text
    target:
      accessibility_id: balance
    contains: "R "
  - action: assert_text
    target:
      accessibility_id: balance
    equals: R 100.00
"#,
        ))
        .await
        .unwrap();

    assert!(!outcome.success);
    assert!(outcome.steps[0].success);
    assert!(outcome.steps[1].error.as_deref().unwrap().contains("R 100.00"));
}

#[tokio::test]
async fn screenshot_and_settings_steps() {
    let mut h = harness().await;

    let outcome = h
        .runner
        .run_flow(&flow(
            r#"
name: capture
steps:
  - action: log_settings
  - action: screenshot
    name: home screen
  - action: press_key
    key: escape
"#,
        ))
        .await
        .unwrap();

    assert!(outcome.success, "{:?}", outcome.error);
    let path = outcome.steps[1].screenshot_path.clone().unwrap();
    assert!(path.ends_with("capture-home_screen.png"));
    assert_eq!(std::fs::read(path).unwrap(), FAKE_PNG);
    assert!(h.fake.commands().contains(&Command::Settings));
    assert_eq!(h.fake.keycodes(), vec![111]);
}

#[tokio::test]
async fn flow_capabilities_override_defaults() {
    let mut h = harness().await;

    h.runner
        .run_flow(&flow(
            r#"
name: caps
capabilities:
  platformName: Android
  deviceName: pixel-7
  automationName: UiAutomator2
  appWaitForLaunch: false
steps:
  - action: log
    message: hello
"#,
        ))
        .await
        .unwrap();

    match &h.fake.commands()[0] {
        Command::NewSession(body) => {
            let caps = &body["capabilities"]["alwaysMatch"];
            assert_eq!(caps["appium:deviceName"], "pixel-7");
            assert_eq!(caps["appium:automationName"], "UiAutomator2");
            assert_eq!(caps["appium:appWaitForLaunch"], false);
        }
        other => panic!("expected new session, got {:?}", other),
    }
}

#[tokio::test]
async fn rejected_session_is_a_failed_outcome_in_a_suite() {
    let mut h = harness().await;
    h.fake.reject_sessions(true);

    let spec = flow(
        r#"
name: nothing
steps:
  - action: back
"#,
    );
    assert!(matches!(h.runner.run_flow(&spec).await, Err(FlowError::Driver(_))));

    let suite = h.runner.run_flows(&[spec]).await;
    assert_eq!((suite.total, suite.failed), (1, 1));
    assert!(suite.results[0].error.is_some());
}

#[tokio::test]
async fn results_json_redacts_secrets() {
    let mut h = harness().await;
    let field = h.fake.add(FakeElement::new(Locator::id("set-password-input-1")));

    let outcome = h
        .runner
        .run_flow(&flow(
            r#"
name: password
variables:
  password:
    generator: password
  email:
    generator: email
steps:
  - action: fill
    target:
      id: set-password-input-1
    value: ${password}
"#,
        ))
        .await
        .unwrap();

    let typed = h.fake.element_text(&field).unwrap();
    assert!(typed.len() >= 15);
    assert_eq!(outcome.variables["password"], "********");
    assert!(outcome.variables["email"].ends_with("@test.tst"));

    let suite = SuiteOutcome::from_results(vec![outcome], 1);
    let path = h.runner.write_results(&suite).unwrap();
    assert_eq!(path, h.dir.path().join("out").join("results.json"));
    let written = std::fs::read_to_string(path).unwrap();
    assert!(!written.contains(&typed));
    let parsed: SuiteOutcome = serde_json::from_str(&written).unwrap();
    assert_eq!(parsed.passed, 1);
}

#[tokio::test]
async fn assertion_errors_never_show_secret_values() {
    let mut h = harness().await;
    let field = h.fake.add(FakeElement::new(Locator::id("set-password-input-1")));
    h.fake.add(FakeElement::new(Locator::id("set-password-input-2")).text("nope"));

    let outcome = h
        .runner
        .run_flow(&flow(
            r#"
name: password-check
variables:
  password:
    generator: password
steps:
  - action: fill
    target:
      id: set-password-input-1
    value: ${password}
  - action: log
    message: "typed ${password}"
  - action: assert_text
    target:
      id: set-password-input-2
    equals: ${password}
    optional: true
  - action: assert_text
    target:
      id: set-password-input-1
    contains: nope
"#,
        ))
        .await
        .unwrap();

    let typed = h.fake.element_text(&field).unwrap();
    assert!(typed.len() >= 15);
    assert!(!outcome.success);
    assert!(outcome.steps[1].success);

    let expected_side = outcome.steps[2].error.as_deref().unwrap();
    assert!(expected_side.contains("expected text '********'"), "{}", expected_side);
    assert!(expected_side.contains("got 'nope'"));

    let actual_side = outcome.steps[3].error.as_deref().unwrap();
    assert!(actual_side.contains("'********' does not contain 'nope'"), "{}", actual_side);

    for error in outcome.steps.iter().filter_map(|s| s.error.as_deref()).chain(outcome.error.as_deref()) {
        assert!(!error.contains(&typed), "{}", error);
    }
}

#[tokio::test]
async fn builtin_registration_runs_end_to_end() {
    const FORM: &str = "/hierarchy/android.widget.FrameLayout/android.widget.LinearLayout/android.widget.FrameLayout/android.widget.FrameLayout/android.widget.FrameLayout/android.widget.FrameLayout/android.view.ViewGroup/android.view.ViewGroup/android.view.ViewGroup/android.view.ViewGroup/android.view.ViewGroup/android.view.ViewGroup[2]/android.widget.ScrollView/android.view.ViewGroup";
    let field = |row: u32| Locator::xpath(format!("{}/android.view.ViewGroup[{}]/android.view.ViewGroup/android.widget.EditText", FORM, row));

    let mut h = harness().await;
    let onboarding = h.fake.add(FakeElement::new(Locator::content_desc("onboarding-button")));
    let start = h.fake.add(FakeElement::new(Locator::text("START SAVING")));
    let cont = h.fake.add(FakeElement::new(Locator::text("CONTINUE")));
    let email = h.fake.add(FakeElement::new(field(4)));
    let id_number = h.fake.add(FakeElement::new(field(3)));
    let confirm = h.fake.add(FakeElement::new(field(2)));
    let password = h.fake.add(FakeElement::new(field(1)));
    let payment = h.fake.add(FakeElement::new(Locator::text("NEXT: PAYMENT")));
    let paid = h.fake.add(FakeElement::new(Locator::text("I'VE ALREADY PAID")));
    let done = h.fake.add(FakeElement::new(Locator::text("DONE")));

    let mut registration = builtin::find("registration").unwrap();
    registration.steps.retain(|s| !matches!(s.action, Action::Sleep { .. }));
    for step in &mut registration.steps {
        if let Action::Fill { settle_ms, .. } = &mut step.action {
            *settle_ms = 0;
        }
    }

    let outcome = h.runner.run_flow(&registration).await.unwrap();
    assert!(outcome.success, "{:?}", outcome.error);

    assert_eq!(clicks(&h.fake, &onboarding), 3);
    assert_eq!(clicks(&h.fake, &start), 1);
    assert_eq!(clicks(&h.fake, &cont), 3);
    assert_eq!(clicks(&h.fake, &payment), 2);
    assert_eq!(clicks(&h.fake, &paid), 1);
    assert_eq!(clicks(&h.fake, &done), 1);

    let scroll = outcome
        .steps
        .iter()
        .find(|s| s.step_name.starts_with("scroll"))
        .expect("scroll step");
    assert!(scroll.optional && !scroll.success);

    let mut keys = vec![KeyCode::DEL.0; 25];
    keys.push(KeyCode::BACK.0);
    keys.extend(vec![KeyCode::DEL.0; 15]);
    keys.extend([KeyCode::BACK.0, KeyCode::BACK.0]);
    assert_eq!(h.fake.keycodes(), keys);

    let typed_email = h.fake.element_text(&email).unwrap();
    assert!(typed_email.starts_with("testemail") && typed_email.ends_with("@test.tst"));
    assert_eq!(outcome.variables["email"], typed_email);

    let typed_id = h.fake.element_text(&id_number).unwrap();
    assert_eq!(typed_id.len(), 13);
    assert!(typed_id.chars().all(|c| c.is_ascii_digit()));

    let typed_password = h.fake.element_text(&password).unwrap();
    assert!(typed_password.len() >= 15);
    assert_eq!(h.fake.element_text(&confirm).unwrap(), typed_password);
    assert_eq!(outcome.variables["password"], "********");

    assert!(h.fake.commands().contains(&Command::Settings));
    assert_eq!(h.fake.live_sessions(), 0);
}

#[tokio::test]
async fn broken_file_in_flows_dir_does_not_block_named_runs() {
    let mut h = harness().await;
    let flows = h.dir.path().join("flows");
    std::fs::create_dir_all(&flows).unwrap();
    std::fs::write(flows.join("scratch.yaml"), "name: [unclosed\n").unwrap();
    std::fs::write(flows.join("quick.yaml"), "name: quick\nsteps:\n  - action: back\n").unwrap();

    let outcome = h.runner.run_named("quick").await.unwrap();
    assert!(outcome.success);
    assert_eq!(h.fake.keycodes(), vec![4]);

    assert!(h.runner.run_all().await.is_err());
}

#[tokio::test]
async fn flows_dir_shadows_builtins_and_filters_by_tag() {
    let mut h = harness().await;
    let flows = h.dir.path().join("flows");
    std::fs::create_dir_all(&flows).unwrap();
    std::fs::write(
        flows.join("registration.yaml"),
        "name: registration\ntags: [smoke]\nsteps:\n  - action: back\n",
    )
    .unwrap();
    std::fs::write(
        flows.join("other.yml"),
        "name: other\ntags: [slow]\nsteps:\n  - action: log\n    message: hi\n",
    )
    .unwrap();

    let outcome = h.runner.run_named("registration").await.unwrap();
    assert!(outcome.success);
    assert_eq!(h.fake.keycodes(), vec![4]);

    let suite = h.runner.run_tagged("smoke").await.unwrap();
    assert_eq!(suite.total, 1);

    let suite = h.runner.run_all().await.unwrap();
    assert_eq!(suite.total, 2);
    assert_eq!(suite.passed, 2);

    assert!(matches!(h.runner.run_named("missing").await, Err(FlowError::NotFound(_))));
}
