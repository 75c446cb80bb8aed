//! In-process fakes for the browser ports and the backend API

#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use rwa_common::fixtures::VALID_USERS;
use rwa_common::Viewport;
use rwa_e2e::auth_state::{DISPATCH_SCRIPT, SEND_READY_SCRIPT, STATE_VALUE_SCRIPT};
use rwa_e2e::cookie::SessionCookie;
use rwa_e2e::driver::{url_matches, BrowserContext, BrowserPage, BrowserSession, LoadState, WaitState};
use rwa_e2e::runner::SessionFactory;
use rwa_e2e::{E2eError, E2eResult};

const POLL: Duration = Duration::from_millis(50);
const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(10);

type Reaction = Arc<dyn Fn(&mut FakePage) + Send + Sync>;

/// Scriptable page state
#[derive(Default)]
pub struct FakePage {
    pub url: String,
    pub viewport: Viewport,
    /// Selector -> moment it becomes visible
    visible: HashMap<String, Instant>,
    texts: HashMap<String, String>,
    pub values: HashMap<String, String>,
    disabled: HashSet<String>,
    on_click: HashMap<String, Reaction>,
    on_dispatch: HashMap<String, Reaction>,
    /// Samples for `authService.state.value`; the last one repeats
    auth_samples: VecDeque<Option<String>>,
    pub send_ready: bool,
    pub clicks: Vec<String>,
    pub gotos: Vec<String>,
    pub dispatched: Vec<(String, Value)>,
    pub cookies: Vec<SessionCookie>,
    pub init_scripts: Vec<String>,
    pub screenshots: Vec<PathBuf>,
    pub closed: bool,
}

impl FakePage {
    pub fn show(&mut self, selector: &str) -> &mut Self {
        self.visible.insert(selector.to_string(), Instant::now());
        self
    }

    pub fn show_after(&mut self, selector: &str, delay: Duration) -> &mut Self {
        self.visible.insert(selector.to_string(), Instant::now() + delay);
        self
    }

    pub fn hide(&mut self, selector: &str) -> &mut Self {
        self.visible.remove(selector);
        self
    }

    pub fn text(&mut self, selector: &str, text: &str) -> &mut Self {
        self.texts.insert(selector.to_string(), text.to_string());
        self
    }

    /// Clicks on `selector` time out
    pub fn disable(&mut self, selector: &str) -> &mut Self {
        self.disabled.insert(selector.to_string());
        self
    }

    pub fn on_click(&mut self, selector: &str, reaction: impl Fn(&mut FakePage) + Send + Sync + 'static) -> &mut Self {
        self.on_click.insert(selector.to_string(), Arc::new(reaction));
        self
    }

    pub fn on_dispatch(&mut self, event: &str, reaction: impl Fn(&mut FakePage) + Send + Sync + 'static) -> &mut Self {
        self.on_dispatch.insert(event.to_string(), Arc::new(reaction));
        self
    }

    pub fn auth_state(&mut self, state: Option<&str>) -> &mut Self {
        self.auth_samples = VecDeque::from([state.map(str::to_string)]);
        self
    }

    pub fn auth_sequence(&mut self, states: &[Option<&str>]) -> &mut Self {
        self.auth_samples = states.iter().map(|s| s.map(str::to_string)).collect();
        self
    }

    fn visible_now(&self, selector: &str) -> bool {
        self.visible
            .get(selector)
            .is_some_and(|at| *at <= Instant::now())
    }

    fn sample_auth(&mut self) -> Option<String> {
        if self.auth_samples.len() > 1 {
            self.auth_samples.pop_front().flatten()
        } else {
            self.auth_samples.front().cloned().flatten()
        }
    }
}

/// Fake page + context pair
#[derive(Default)]
pub struct FakeBrowser {
    page: Mutex<FakePage>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn edit<R>(&self, f: impl FnOnce(&mut FakePage) -> R) -> R {
        f(&mut *self.page.lock())
    }

    /// Sign-in form at `url` with the fields rendered
    pub fn signin_form(url: &str) -> Self {
        let fake = Self::new();
        fake.edit(|p| {
            p.url = url.to_string();
            p.show("#username")
                .show("#password")
                .show(r#"[data-test="signin-submit"]"#);
        });
        fake
    }

    async fn wait_until(&self, timeout: Duration, what: &str, cond: impl Fn(&FakePage) -> bool) -> E2eResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let done = cond(&*self.page.lock());
            if done {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(E2eError::Timeout(format!("{} after {:?}", what, timeout)));
            }
            tokio::time::sleep(POLL.min(deadline - now)).await;
        }
    }
}

#[async_trait]
impl BrowserPage for FakeBrowser {
    async fn goto(&self, url: &str, _wait_until: LoadState) -> E2eResult<()> {
        let mut page = self.page.lock();
        page.url = url.to_string();
        page.gotos.push(url.to_string());
        Ok(())
    }

    async fn wait_for_load_state(&self, _state: LoadState) -> E2eResult<()> {
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, state: WaitState, timeout: Duration) -> E2eResult<()> {
        let want_visible = matches!(state, WaitState::Visible | WaitState::Attached);
        self.wait_until(timeout, &format!("{} to be {:?}", selector, state), |p| {
            p.visible_now(selector) == want_visible
        })
        .await
    }

    async fn click(&self, selector: &str, timeout: Option<Duration>) -> E2eResult<()> {
        let timeout = timeout.unwrap_or(DEFAULT_ACTION_TIMEOUT);
        self.wait_until(timeout, &format!("{} to be clickable", selector), |p| {
            p.visible_now(selector) && !p.disabled.contains(selector)
        })
        .await?;

        let mut page = self.page.lock();
        page.clicks.push(selector.to_string());
        if let Some(reaction) = page.on_click.get(selector).cloned() {
            reaction(&mut *page);
        }
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> E2eResult<()> {
        self.page
            .lock()
            .values
            .insert(selector.to_string(), value.to_string());
        Ok(())
    }

    async fn clear(&self, selector: &str) -> E2eResult<()> {
        self.page.lock().values.remove(selector);
        Ok(())
    }

    async fn is_visible(&self, selector: &str) -> E2eResult<bool> {
        Ok(self.page.lock().visible_now(selector))
    }

    async fn text_content(&self, selector: &str) -> E2eResult<Option<String>> {
        Ok(self.page.lock().texts.get(selector).cloned())
    }

    async fn url(&self) -> E2eResult<String> {
        Ok(self.page.lock().url.clone())
    }

    async fn wait_for_url(&self, pattern: &str, timeout: Duration) -> E2eResult<()> {
        self.wait_until(timeout, &format!("URL {}", pattern), |p| url_matches(&p.url, pattern))
            .await
    }

    async fn evaluate(&self, function: &str, arg: Option<Value>) -> E2eResult<Value> {
        let mut page = self.page.lock();
        if function == STATE_VALUE_SCRIPT {
            Ok(page.sample_auth().map(Value::String).unwrap_or(Value::Null))
        } else if function == SEND_READY_SCRIPT {
            Ok(Value::Bool(page.send_ready))
        } else if function == DISPATCH_SCRIPT {
            let arg = arg.unwrap_or(Value::Null);
            let event = arg[0].as_str().unwrap_or_default().to_string();
            page.dispatched.push((event.clone(), arg[1].clone()));
            if let Some(reaction) = page.on_dispatch.get(&event).cloned() {
                reaction(&mut *page);
            }
            Ok(Value::Null)
        } else {
            Err(E2eError::Playwright(format!("unsupported script: {}", function)))
        }
    }

    async fn viewport(&self) -> E2eResult<Viewport> {
        Ok(self.page.lock().viewport)
    }

    async fn screenshot(&self, path: &Path) -> E2eResult<()> {
        self.page.lock().screenshots.push(path.to_path_buf());
        Ok(())
    }
}

#[async_trait]
impl BrowserContext for FakeBrowser {
    async fn add_cookies(&self, cookies: &[SessionCookie]) -> E2eResult<()> {
        self.page.lock().cookies.extend_from_slice(cookies);
        Ok(())
    }

    async fn clear_cookies(&self) -> E2eResult<()> {
        self.page.lock().cookies.clear();
        Ok(())
    }

    async fn add_init_script(&self, script: &str) -> E2eResult<()> {
        self.page.lock().init_scripts.push(script.to_string());
        Ok(())
    }

    async fn close(&self) -> E2eResult<()> {
        self.page.lock().closed = true;
        Ok(())
    }
}

/// Hands out fresh fakes built by `setup`, keeping each one for inspection
pub struct FakeFactory {
    setup: Box<dyn Fn() -> FakeBrowser + Send + Sync>,
    pub opened: Mutex<Vec<Arc<FakeBrowser>>>,
}

impl FakeFactory {
    pub fn new(setup: impl Fn() -> FakeBrowser + Send + Sync + 'static) -> Self {
        Self {
            setup: Box::new(setup),
            opened: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SessionFactory for FakeFactory {
    async fn open(&self, viewport: Viewport) -> E2eResult<Arc<dyn BrowserSession>> {
        let fake = Arc::new((self.setup)());
        fake.edit(|p| p.viewport = viewport);
        self.opened.lock().push(fake.clone());
        Ok(fake)
    }
}

pub const SESSION_ID: &str = "s%3AJx8bXo2qZk.Wm1bcmTSmVQ";

/// Knobs for the fake API
#[derive(Debug, Clone, Copy, Default)]
pub struct BackendOptions {
    pub seed_fails: bool,
    /// Authenticate without issuing a session cookie
    pub omit_cookie: bool,
    /// Answer the liveness route like a proxy with nothing behind it
    pub bad_gateway: bool,
}

#[derive(Default)]
struct BackendState {
    options: BackendOptions,
    seeds: AtomicU32,
    logins: AtomicU32,
}

/// Fake backend API on an ephemeral port
pub struct FakeBackend {
    pub url: String,
    state: Arc<BackendState>,
    server: tokio::task::JoinHandle<()>,
}

impl FakeBackend {
    pub async fn start(options: BackendOptions) -> Self {
        let state = Arc::new(BackendState {
            options,
            ..BackendState::default()
        });
        let app = Router::new()
            .route("/", get(root))
            .route("/testData/seed", post(seed))
            .route("/login", post(login))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { url, state, server }
    }

    pub fn seeds(&self) -> u32 {
        self.state.seeds.load(Ordering::SeqCst)
    }

    pub fn logins(&self) -> u32 {
        self.state.logins.load(Ordering::SeqCst)
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// An address nothing listens on
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    url
}

async fn root(State(state): State<Arc<BackendState>>) -> Response {
    if state.options.bad_gateway {
        (StatusCode::BAD_GATEWAY, "502 Bad Gateway").into_response()
    } else {
        "OK".into_response()
    }
}

async fn seed(State(state): State<Arc<BackendState>>) -> Response {
    state.seeds.fetch_add(1, Ordering::SeqCst);
    if state.options.seed_fails {
        (StatusCode::INTERNAL_SERVER_ERROR, "seed script crashed").into_response()
    } else {
        "Seeded".into_response()
    }
}

async fn login(State(state): State<Arc<BackendState>>, Json(body): Json<Value>) -> Response {
    state.logins.fetch_add(1, Ordering::SeqCst);
    let username = body["username"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();

    let Some(user) = VALID_USERS
        .iter()
        .find(|u| u.username == username && u.password == password)
    else {
        return "Unauthorized".into_response();
    };

    let payload = Json(json!({
        "user": {
            "id": user.id.unwrap_or_default(),
            "username": user.username,
            "firstName": "Test",
            "lastName": "User",
            "balance": 163_000,
        }
    }));
    if state.options.omit_cookie {
        return payload.into_response();
    }
    let cookie = format!("connect.sid={}; Path=/; HttpOnly", SESSION_ID);
    ([(header::SET_COOKIE, cookie)], payload).into_response()
}
