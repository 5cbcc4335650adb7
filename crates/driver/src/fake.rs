//! In-process fake Appium endpoint
//!
//! Serves the subset of the WebDriver protocol this crate speaks, backed by a
//! scripted screen of elements, and records every command it receives so
//! tests can assert on the exact interaction sequence.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;

use crate::element::ElementRect;
use crate::locator::Locator;
use crate::wire::ELEMENT_KEY;

/// Bytes returned by the screenshot endpoint
pub const FAKE_PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake-screen";

/// A command as seen by the fake server
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Status,
    NewSession(Value),
    DeleteSession(String),
    Timeouts(Value),
    Find(Locator),
    FindAll(Locator),
    Click(String),
    SendKeys { element: String, text: String },
    Clear(String),
    Text(String),
    Displayed(String),
    Attribute { element: String, name: String },
    Rect(String),
    PressKeycode(u32),
    Settings,
    Actions(Value),
    ReleaseActions,
    Screenshot,
    Source,
}

/// An element on the scripted screen
#[derive(Debug, Clone)]
pub struct FakeElement {
    pub id: String,
    pub locator: Locator,
    pub text: String,
    pub displayed: bool,
    pub rect: ElementRect,
    /// Number of lookups that miss before the element shows up
    pub appears_after: u32,
    lookups: u32,
}

impl FakeElement {
    pub fn new(locator: Locator) -> Self {
        Self {
            id: String::new(),
            locator,
            text: String::new(),
            displayed: true,
            rect: ElementRect { x: 0.0, y: 0.0, width: 100.0, height: 40.0 },
            appears_after: 0,
            lookups: 0,
        }
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    pub fn rect(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.rect = ElementRect { x, y, width, height };
        self
    }

    pub fn appears_after(mut self, lookups: u32) -> Self {
        self.appears_after = lookups;
        self
    }
}

#[derive(Debug, Default)]
struct FakeState {
    elements: Vec<FakeElement>,
    sessions: HashSet<String>,
    next_session: u32,
    next_element: u32,
    commands: Vec<Command>,
    reject_sessions: bool,
    legacy: bool,
    settings: Value,
}

type Shared = Arc<Mutex<FakeState>>;

/// A running fake endpoint. Stops when dropped.
pub struct FakeAppium {
    base_url: String,
    state: Shared,
    handle: JoinHandle<()>,
}

impl FakeAppium {
    /// Bind to a free local port and start serving under `/wd/hub`
    pub async fn start() -> std::io::Result<Self> {
        let state: Shared = Arc::new(Mutex::new(FakeState {
            settings: json!({ "ignoreUnimportantViews": false, "waitForIdleTimeout": 10000 }),
            ..Default::default()
        }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr: SocketAddr = listener.local_addr()?;
        let app = Router::new().nest("/wd/hub", routes()).with_state(state.clone());

        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            base_url: format!("http://{}/wd/hub", addr),
            state,
            handle,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Put an element on screen and return its id
    pub fn add(&self, mut element: FakeElement) -> String {
        let mut state = self.lock();
        state.next_element += 1;
        element.id = format!("el-{}", state.next_element);
        let id = element.id.clone();
        state.elements.push(element);
        id
    }

    pub fn remove(&self, id: &str) {
        self.lock().elements.retain(|e| e.id != id);
    }

    /// Current text of an element, including anything typed into it
    pub fn element_text(&self, id: &str) -> Option<String> {
        self.lock().elements.iter().find(|e| e.id == id).map(|e| e.text.clone())
    }

    /// Refuse every `POST /session`
    pub fn reject_sessions(&self, reject: bool) {
        self.lock().reject_sessions = reject;
    }

    /// Answer in the JSONWP dialect instead of W3C
    pub fn legacy_replies(&self, legacy: bool) {
        self.lock().legacy = legacy;
    }

    pub fn commands(&self) -> Vec<Command> {
        self.lock().commands.clone()
    }

    pub fn live_sessions(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Key codes pressed so far, in order
    pub fn keycodes(&self) -> Vec<u32> {
        self.commands()
            .into_iter()
            .filter_map(|c| match c {
                Command::PressKeycode(k) => Some(k),
                _ => None,
            })
            .collect()
    }
}

impl Drop for FakeAppium {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn routes() -> Router<Shared> {
    Router::new()
        .route("/status", get(status))
        .route("/session", post(new_session))
        .route("/session/:sid", axum::routing::delete(delete_session))
        .route("/session/:sid/timeouts", post(timeouts))
        .route("/session/:sid/element", post(find))
        .route("/session/:sid/elements", post(find_all))
        .route("/session/:sid/element/:eid/click", post(click))
        .route("/session/:sid/element/:eid/value", post(send_keys))
        .route("/session/:sid/element/:eid/clear", post(clear))
        .route("/session/:sid/element/:eid/text", get(text))
        .route("/session/:sid/element/:eid/displayed", get(displayed))
        .route("/session/:sid/element/:eid/attribute/:name", get(attribute))
        .route("/session/:sid/element/:eid/rect", get(rect))
        .route("/session/:sid/appium/device/press_keycode", post(press_keycode))
        .route("/session/:sid/appium/settings", get(settings))
        .route("/session/:sid/actions", post(actions).delete(release_actions))
        .route("/session/:sid/screenshot", get(screenshot))
        .route("/session/:sid/source", get(source))
}

fn lock(state: &Shared) -> MutexGuard<'_, FakeState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

fn ok(value: Value) -> Response {
    Json(json!({ "value": value })).into_response()
}

fn w3c_error(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(json!({ "value": { "error": code, "message": message, "stacktrace": "" } })),
    )
        .into_response()
}

/// Record `command` and check the session exists
fn enter(state: &mut FakeState, sid: &str, command: Command) -> Result<(), Response> {
    state.commands.push(command);
    if state.sessions.contains(sid) {
        Ok(())
    } else {
        Err(w3c_error(
            StatusCode::NOT_FOUND,
            "invalid session id",
            &format!("session {} does not exist", sid),
        ))
    }
}

fn element<'a>(state: &'a mut FakeState, eid: &str) -> Result<&'a mut FakeElement, Response> {
    state.elements.iter_mut().find(|e| e.id == eid).ok_or_else(|| {
        w3c_error(
            StatusCode::NOT_FOUND,
            "stale element reference",
            &format!("element {} is no longer attached", eid),
        )
    })
}

fn parse_locator(body: &Value) -> Result<Locator, Response> {
    serde_json::from_value(body.clone())
        .map_err(|e| w3c_error(StatusCode::BAD_REQUEST, "invalid argument", &e.to_string()))
}

/// Matching elements currently on screen; each lookup counts towards `appears_after`
fn lookup(state: &mut FakeState, locator: &Locator) -> Vec<String> {
    let mut found = Vec::new();
    for el in state.elements.iter_mut().filter(|e| &e.locator == locator) {
        el.lookups += 1;
        if el.lookups > el.appears_after {
            found.push(el.id.clone());
        }
    }
    found
}

async fn status(State(state): State<Shared>) -> Response {
    lock(&state).commands.push(Command::Status);
    ok(json!({ "ready": true, "message": "The server is ready to accept new connections", "build": { "version": "fake" } }))
}

async fn new_session(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut state = lock(&state);
    state.commands.push(Command::NewSession(body.clone()));
    if state.reject_sessions {
        return w3c_error(StatusCode::INTERNAL_SERVER_ERROR, "session not created", "device offline");
    }
    state.next_session += 1;
    let sid = format!("session-{}", state.next_session);
    state.sessions.insert(sid.clone());

    let caps = body["capabilities"]["alwaysMatch"].clone();
    if state.legacy {
        Json(json!({ "sessionId": sid, "status": 0, "value": body["desiredCapabilities"].clone() }))
            .into_response()
    } else {
        ok(json!({ "sessionId": sid, "capabilities": caps }))
    }
}

async fn delete_session(State(state): State<Shared>, Path(sid): Path<String>) -> Response {
    let mut state = lock(&state);
    if let Err(r) = enter(&mut state, &sid, Command::DeleteSession(sid.clone())) {
        return r;
    }
    state.sessions.remove(&sid);
    ok(Value::Null)
}

async fn timeouts(State(state): State<Shared>, Path(sid): Path<String>, Json(body): Json<Value>) -> Response {
    let mut state = lock(&state);
    match enter(&mut state, &sid, Command::Timeouts(body)) {
        Ok(()) => ok(Value::Null),
        Err(r) => r,
    }
}

async fn find(State(state): State<Shared>, Path(sid): Path<String>, Json(body): Json<Value>) -> Response {
    let locator = match parse_locator(&body) {
        Ok(l) => l,
        Err(r) => return r,
    };
    let mut state = lock(&state);
    if let Err(r) = enter(&mut state, &sid, Command::Find(locator.clone())) {
        return r;
    }
    let legacy = state.legacy;
    match lookup(&mut state, &locator).into_iter().next() {
        Some(id) if legacy => ok(json!({ "ELEMENT": id })),
        Some(id) => ok(json!({ ELEMENT_KEY: id })),
        None => w3c_error(
            StatusCode::NOT_FOUND,
            "no such element",
            "An element could not be located on the page using the given search parameters.",
        ),
    }
}

async fn find_all(State(state): State<Shared>, Path(sid): Path<String>, Json(body): Json<Value>) -> Response {
    let locator = match parse_locator(&body) {
        Ok(l) => l,
        Err(r) => return r,
    };
    let mut state = lock(&state);
    if let Err(r) = enter(&mut state, &sid, Command::FindAll(locator.clone())) {
        return r;
    }
    let refs: Vec<Value> = lookup(&mut state, &locator)
        .into_iter()
        .map(|id| json!({ ELEMENT_KEY: id }))
        .collect();
    ok(Value::Array(refs))
}

async fn click(State(state): State<Shared>, Path((sid, eid)): Path<(String, String)>) -> Response {
    let mut state = lock(&state);
    if let Err(r) = enter(&mut state, &sid, Command::Click(eid.clone())) {
        return r;
    }
    match element(&mut state, &eid) {
        Ok(_) => ok(Value::Null),
        Err(r) => r,
    }
}

async fn send_keys(
    State(state): State<Shared>,
    Path((sid, eid)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    let text = body["text"].as_str().unwrap_or_default().to_string();
    let mut state = lock(&state);
    let command = Command::SendKeys { element: eid.clone(), text: text.clone() };
    if let Err(r) = enter(&mut state, &sid, command) {
        return r;
    }
    match element(&mut state, &eid) {
        Ok(el) => {
            el.text.push_str(&text);
            ok(Value::Null)
        }
        Err(r) => r,
    }
}

async fn clear(State(state): State<Shared>, Path((sid, eid)): Path<(String, String)>) -> Response {
    let mut state = lock(&state);
    if let Err(r) = enter(&mut state, &sid, Command::Clear(eid.clone())) {
        return r;
    }
    match element(&mut state, &eid) {
        Ok(el) => {
            el.text.clear();
            ok(Value::Null)
        }
        Err(r) => r,
    }
}

async fn text(State(state): State<Shared>, Path((sid, eid)): Path<(String, String)>) -> Response {
    let mut state = lock(&state);
    if let Err(r) = enter(&mut state, &sid, Command::Text(eid.clone())) {
        return r;
    }
    match element(&mut state, &eid) {
        Ok(el) => ok(json!(el.text)),
        Err(r) => r,
    }
}

async fn displayed(State(state): State<Shared>, Path((sid, eid)): Path<(String, String)>) -> Response {
    let mut state = lock(&state);
    if let Err(r) = enter(&mut state, &sid, Command::Displayed(eid.clone())) {
        return r;
    }
    match element(&mut state, &eid) {
        Ok(el) => ok(json!(el.displayed)),
        Err(r) => r,
    }
}

async fn attribute(
    State(state): State<Shared>,
    Path((sid, eid, name)): Path<(String, String, String)>,
) -> Response {
    let mut state = lock(&state);
    let command = Command::Attribute { element: eid.clone(), name: name.clone() };
    if let Err(r) = enter(&mut state, &sid, command) {
        return r;
    }
    match element(&mut state, &eid) {
        Ok(el) => match name.as_str() {
            "text" => ok(json!(el.text)),
            "displayed" => ok(json!(el.displayed.to_string())),
            "content-desc" if el.locator.strategy == crate::locator::Strategy::AccessibilityId => {
                ok(json!(el.locator.value))
            }
            _ => ok(Value::Null),
        },
        Err(r) => r,
    }
}

async fn rect(State(state): State<Shared>, Path((sid, eid)): Path<(String, String)>) -> Response {
    let mut state = lock(&state);
    if let Err(r) = enter(&mut state, &sid, Command::Rect(eid.clone())) {
        return r;
    }
    match element(&mut state, &eid) {
        Ok(el) => ok(json!(el.rect)),
        Err(r) => r,
    }
}

async fn press_keycode(
    State(state): State<Shared>,
    Path(sid): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let code = body["keycode"].as_u64().unwrap_or_default() as u32;
    let mut state = lock(&state);
    match enter(&mut state, &sid, Command::PressKeycode(code)) {
        Ok(()) => ok(Value::Null),
        Err(r) => r,
    }
}

async fn settings(State(state): State<Shared>, Path(sid): Path<String>) -> Response {
    let mut state = lock(&state);
    match enter(&mut state, &sid, Command::Settings) {
        Ok(()) => ok(state.settings.clone()),
        Err(r) => r,
    }
}

async fn actions(State(state): State<Shared>, Path(sid): Path<String>, Json(body): Json<Value>) -> Response {
    let mut state = lock(&state);
    match enter(&mut state, &sid, Command::Actions(body)) {
        Ok(()) => ok(Value::Null),
        Err(r) => r,
    }
}

async fn release_actions(State(state): State<Shared>, Path(sid): Path<String>) -> Response {
    let mut state = lock(&state);
    match enter(&mut state, &sid, Command::ReleaseActions) {
        Ok(()) => ok(Value::Null),
        Err(r) => r,
    }
}

async fn screenshot(State(state): State<Shared>, Path(sid): Path<String>) -> Response {
    let mut state = lock(&state);
    match enter(&mut state, &sid, Command::Screenshot) {
        Ok(()) => ok(json!(BASE64.encode(FAKE_PNG))),
        Err(r) => r,
    }
}

async fn source(State(state): State<Shared>, Path(sid): Path<String>) -> Response {
    let mut state = lock(&state);
    match enter(&mut state, &sid, Command::Source) {
        Ok(()) => ok(json!("<hierarchy><android.widget.FrameLayout/></hierarchy>")),
        Err(r) => r,
    }
}
