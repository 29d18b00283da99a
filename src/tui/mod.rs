/// Ratatui-based TUI for unibot.
///
/// Architecture:
///   main thread:    event loop — crossterm keyboard events + mpsc UiEvent drain
///   network tasks:  tokio::spawn — one per backend call, report back via
///                   UnboundedSender<UiEvent>
///
/// All state lives in AppState and is mutated only inside `apply_event` /
/// `handle_key` on the main thread, one event at a time. In-flight tasks are
/// tagged with the epoch current at spawn; session-ending transitions
/// (logout, new chat) bump the epoch and abort the stored handles, and any
/// response that still slips through with a stale epoch is dropped unapplied.
pub mod chat;
pub mod render;

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::client::ApiClient;
use crate::config::ResolvedConfig;
use crate::conversation::ConversationBuffer;
use crate::format;
use crate::history::{HistoryEntry, HistoryRegistry};
use crate::session::{self, SessionStore};

/// How long the "Document uploaded successfully" notice stays visible.
const UPLOAD_NOTICE_TTL: Duration = Duration::from_secs(3);

// ── UiEvent — typed events from network tasks → TUI ──────────────────────────

/// Outcomes carry Err(transport error) vs Ok(backend verdict): transport
/// failures are logged and change no state; backend `success:false` is
/// surfaced only where the flow has a message slot.
#[derive(Debug)]
pub enum UiEvent {
    LoginDone {
        username: String,
        outcome: Result<(bool, String), String>,
    },
    SignupDone {
        outcome: Result<(bool, String), String>,
    },
    HistoryFetched {
        epoch: u64,
        outcome: Result<Vec<HistoryEntry>, String>,
    },
    /// Backend reply for the send with this seq: Ok((raw response, topic)).
    ReplyArrived {
        epoch: u64,
        seq: u64,
        outcome: Result<(String, String), String>,
    },
    NewChatAck {
        outcome: Result<bool, String>,
    },
    DeleteDone {
        epoch: u64,
        topic: String,
        outcome: Result<(bool, String), String>,
    },
    UploadDone {
        outcome: Result<(), String>,
    },
}

// ── Screens & form focus ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    SignUp,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginField {
    Username,
    Password,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupField {
    Name,
    Username,
    Email,
    Password,
}

impl SignupField {
    fn next(self) -> Self {
        match self {
            SignupField::Name => SignupField::Username,
            SignupField::Username => SignupField::Email,
            SignupField::Email => SignupField::Password,
            SignupField::Password => SignupField::Name,
        }
    }
}

// ── Attached document ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AttachedDocument {
    /// File name as shown in the status bar and sent to the backend
    pub name: String,
    /// Contents read at attach time
    pub content: String,
}

// ── AppState ──────────────────────────────────────────────────────────────────

pub struct AppState {
    pub screen: Screen,
    pub session: SessionStore,
    pub buffer: ConversationBuffer,
    pub registry: HistoryRegistry,

    // login form
    pub login_username: String,
    pub login_password: String,
    pub login_focus: LoginField,
    pub login_pending: bool,

    // signup form
    pub signup_name: String,
    pub signup_username: String,
    pub signup_email: String,
    pub signup_password: String,
    pub signup_focus: SignupField,
    pub signup_status: Option<String>,
    pub signup_pending: bool,

    // chat screen
    pub input: String,
    pub cursor: usize, // byte offset in input
    pub scroll: usize, // lines scrolled up in the conversation pane
    pub sidebar_focused: bool,
    pub sidebar_selected: usize,
    pub document: Option<AttachedDocument>,
    /// Status-line notice (send failures, delete results, /help output)
    pub notice: Option<String>,
    pub upload_notice: Option<(String, Instant)>,
    pub pending_sends: usize,
    pub spinner_tick: u32,

    // request lifecycle
    pub epoch: u64,
    inflight: Vec<AbortHandle>,

    // display
    pub profile: String,
    pub endpoint: String,
    pub email_domain: String,
}

impl AppState {
    pub fn new(resolved: &ResolvedConfig) -> Self {
        Self {
            screen: Screen::Login,
            session: SessionStore::new(),
            buffer: ConversationBuffer::new(),
            registry: HistoryRegistry::new(),
            login_username: String::new(),
            login_password: String::new(),
            login_focus: LoginField::Username,
            login_pending: false,
            signup_name: String::new(),
            signup_username: String::new(),
            signup_email: String::new(),
            signup_password: String::new(),
            signup_focus: SignupField::Name,
            signup_status: None,
            signup_pending: false,
            input: String::new(),
            cursor: 0,
            scroll: 0,
            sidebar_focused: false,
            sidebar_selected: 0,
            document: None,
            notice: None,
            upload_notice: None,
            pending_sends: 0,
            spinner_tick: 0,
            epoch: 0,
            inflight: Vec::new(),
            profile: resolved.profile_name.clone(),
            endpoint: resolved.endpoint.clone(),
            email_domain: resolved.email_domain.clone(),
        }
    }

    fn note(&mut self, msg: impl Into<String>) {
        self.notice = Some(msg.into());
    }

    fn track(&mut self, handle: AbortHandle) {
        self.inflight.retain(|h| !h.is_finished());
        self.inflight.push(handle);
    }

    /// Session-ending transition: abort every in-flight cancellable task and
    /// invalidate whatever still manages to report back.
    fn cancel_inflight(&mut self) {
        self.epoch += 1;
        for h in self.inflight.drain(..) {
            h.abort();
        }
        self.pending_sends = 0;
    }
}

// ── Task context ──────────────────────────────────────────────────────────────

/// Everything a spawned network task needs: the shared HTTP client and the
/// channel back into the event loop.
#[derive(Clone)]
pub struct Ctx {
    pub client: Arc<ApiClient>,
    pub tx: mpsc::UnboundedSender<UiEvent>,
}

fn err_string(e: anyhow::Error) -> String {
    format!("{e:#}")
}

// ── Spawned operations ────────────────────────────────────────────────────────

fn spawn_login(ctx: &Ctx, username: String, password: String) {
    let ctx = ctx.clone();
    tokio::spawn(async move {
        let outcome = ctx
            .client
            .login(&username, &password)
            .await
            .map(|ack| (ack.success, ack.message))
            .map_err(err_string);
        let _ = ctx.tx.send(UiEvent::LoginDone { username, outcome });
    });
}

fn spawn_signup(ctx: &Ctx, name: String, username: String, email: String, password: String) {
    let ctx = ctx.clone();
    tokio::spawn(async move {
        let outcome = ctx
            .client
            .signup(&name, &username, &email, &password)
            .await
            .map(|ack| (ack.success, ack.message))
            .map_err(err_string);
        let _ = ctx.tx.send(UiEvent::SignupDone { outcome });
    });
}

fn spawn_fetch_history(ctx: &Ctx, epoch: u64, username: String) -> AbortHandle {
    let ctx = ctx.clone();
    let task = tokio::spawn(async move {
        let outcome = ctx
            .client
            .fetch_history(&username)
            .await
            .map_err(err_string);
        let _ = ctx.tx.send(UiEvent::HistoryFetched { epoch, outcome });
    });
    task.abort_handle()
}

fn spawn_send(
    ctx: &Ctx,
    epoch: u64,
    seq: u64,
    text: String,
    username: String,
    topic: String,
    document: Option<String>,
) -> AbortHandle {
    let ctx = ctx.clone();
    let task = tokio::spawn(async move {
        let outcome = ctx
            .client
            .send_message(&text, &username, &topic, document.as_deref())
            .await
            .map(|r| (r.response, r.topic))
            .map_err(err_string);
        let _ = ctx.tx.send(UiEvent::ReplyArrived { epoch, seq, outcome });
    });
    task.abort_handle()
}

fn spawn_new_chat_notify(ctx: &Ctx, username: String) {
    let ctx = ctx.clone();
    tokio::spawn(async move {
        let outcome = ctx
            .client
            .start_new_chat(&username)
            .await
            .map(|ack| ack.success)
            .map_err(err_string);
        let _ = ctx.tx.send(UiEvent::NewChatAck { outcome });
    });
}

fn spawn_delete(ctx: &Ctx, epoch: u64, username: String, topic: String) -> AbortHandle {
    let ctx = ctx.clone();
    let task = tokio::spawn(async move {
        let outcome = ctx
            .client
            .delete_chat_session(&username, &topic)
            .await
            .map(|ack| (ack.success, ack.message))
            .map_err(err_string);
        let _ = ctx.tx.send(UiEvent::DeleteDone { epoch, topic, outcome });
    });
    task.abort_handle()
}

fn spawn_upload(ctx: &Ctx, username: String, name: String, content: String) {
    let ctx = ctx.clone();
    tokio::spawn(async move {
        let outcome = ctx
            .client
            .upload_document(&username, &name, content)
            .await
            .map_err(err_string);
        let _ = ctx.tx.send(UiEvent::UploadDone { outcome });
    });
}

/// Fire-and-forget end-session notification. Logout proceeds locally no
/// matter what happens to this request.
fn spawn_end_session(ctx: &Ctx) {
    let ctx = ctx.clone();
    tokio::spawn(async move {
        if let Err(e) = ctx.client.end_session().await {
            debug_log(&format!("end_session: {e:#}"));
        }
    });
}

// ── Debug log ─────────────────────────────────────────────────────────────────

/// Best-effort append to /tmp/unibot.log — the only place transport errors
/// land for flows without a visible message slot (raw mode eats stderr).
pub fn debug_log(line: &str) {
    use std::io::Write as _;
    if let Ok(mut f) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("/tmp/unibot.log")
    {
        let _ = writeln!(f, "{line}");
    }
}

// ── Event application ─────────────────────────────────────────────────────────

pub fn apply_event(state: &mut AppState, ev: UiEvent, ctx: &Ctx) {
    match ev {
        UiEvent::LoginDone { username, outcome } => {
            state.login_pending = false;
            match outcome {
                Ok((true, _)) => {
                    state.session.login_succeeded(&username);
                    state.screen = Screen::Chat;
                    state.login_password.clear();
                    // Fresh login: replace the registry with the server
                    // snapshot once it arrives.
                    let handle = spawn_fetch_history(ctx, state.epoch, username);
                    state.track(handle);
                }
                Ok((false, message)) => state.session.login_failed(&message),
                Err(e) => debug_log(&format!("login: {e}")),
            }
        }

        UiEvent::SignupDone { outcome } => {
            state.signup_pending = false;
            match outcome {
                Ok((true, _)) => {
                    state.session.register_succeeded();
                    state.signup_status = Some(session::REGISTERED_MESSAGE.to_string());
                }
                Ok((false, message)) => state.signup_status = Some(message),
                Err(e) => {
                    debug_log(&format!("signup: {e}"));
                    state.signup_status = Some("An error occurred. Please try again.".to_string());
                }
            }
        }

        UiEvent::HistoryFetched { epoch, outcome } => {
            if epoch != state.epoch {
                return; // fetched for a session that no longer exists
            }
            match outcome {
                Ok(entries) => {
                    state.registry.replace_from_server(entries);
                    state.sidebar_selected = 0;
                }
                // Leave the registry untouched — no retries, no partials
                Err(e) => debug_log(&format!("chat_history: {e}")),
            }
        }

        UiEvent::ReplyArrived { epoch, seq, outcome } => {
            if epoch != state.epoch {
                return; // response from a cancelled session — drop unapplied
            }
            state.pending_sends = state.pending_sends.saturating_sub(1);
            match outcome {
                Ok((response, topic)) => {
                    let formatted = format::format(&response);
                    buffer_apply_reply(state, seq, &formatted, &topic);
                }
                Err(e) => {
                    state.buffer.abandon_turn(seq);
                    debug_log(&format!("send_message: {e}"));
                }
            }
        }

        UiEvent::NewChatAck { outcome } => match outcome {
            Ok(true) => {}
            Ok(false) => debug_log("start_new_chat: backend reported failure"),
            Err(e) => debug_log(&format!("start_new_chat: {e}")),
        },

        UiEvent::DeleteDone { epoch, topic, outcome } => {
            if epoch != state.epoch {
                return;
            }
            match outcome {
                Ok((true, _)) => {
                    let removed = state.registry.remove_topic(&topic);
                    state.sidebar_selected = state
                        .sidebar_selected
                        .min(state.registry.len().saturating_sub(1));
                    state.note(format!("deleted \"{topic}\" ({removed} entries)"));
                }
                // A failed delete must not remove the local entry
                Ok((false, message)) => state.note(format!("delete failed: {message}")),
                Err(e) => debug_log(&format!("delete_chat_session: {e}")),
            }
        }

        UiEvent::UploadDone { outcome } => match outcome {
            Ok(()) => {
                state.upload_notice = Some((
                    "Document uploaded successfully".to_string(),
                    Instant::now(),
                ));
            }
            Err(e) => debug_log(&format!("upload_text_document: {e}")),
        },
    }
}

fn buffer_apply_reply(state: &mut AppState, seq: u64, formatted: &str, topic: &str) {
    if state.buffer.complete_turn(seq, formatted, topic) {
        state.scroll = 0; // snap to the newest turn
    }
}

// ── User-driven operations ────────────────────────────────────────────────────

fn submit_login(state: &mut AppState, ctx: &Ctx) {
    if state.login_pending {
        return;
    }
    state.login_pending = true;
    spawn_login(
        ctx,
        state.login_username.clone(),
        state.login_password.clone(),
    );
}

fn submit_signup(state: &mut AppState, ctx: &Ctx) {
    if state.signup_pending {
        return;
    }
    // Pre-checks short-circuit before any network call
    if let Err(msg) = session::validate_signup(
        &state.signup_email,
        &state.signup_password,
        &state.email_domain,
    ) {
        state.signup_status = Some(msg);
        return;
    }
    state.signup_pending = true;
    state.signup_status = None;
    spawn_signup(
        ctx,
        state.signup_name.clone(),
        state.signup_username.clone(),
        state.signup_email.clone(),
        state.signup_password.clone(),
    );
}

/// Send the input box contents as a user turn. No emptiness guard — observed
/// behavior sends whitespace unconditionally, and we keep it.
fn submit_send(state: &mut AppState, ctx: &Ctx) {
    let Some(username) = state.session.username().map(str::to_string) else {
        return;
    };
    let text = std::mem::take(&mut state.input);
    state.cursor = 0;
    state.notice = None;

    let seq = state.buffer.begin_turn(&text);
    state.scroll = 0;
    state.pending_sends += 1;

    let handle = spawn_send(
        ctx,
        state.epoch,
        seq,
        text,
        username,
        state.buffer.topic().to_string(),
        state.document.as_ref().map(|d| d.content.clone()),
    );
    state.track(handle);
}

/// Archive the active conversation (dedup-aware), reset the buffer, then
/// notify the backend. Outstanding calls are cancelled first.
fn start_new_chat(state: &mut AppState, ctx: &Ctx) {
    state.cancel_inflight();
    state.registry.archive(state.buffer.snapshot());
    state.buffer.reset();
    state.scroll = 0;
    if let Some(username) = state.session.username() {
        spawn_new_chat_notify(ctx, username.to_string());
    }
}

/// Local state reset plus a fire-and-forget end-session notification.
/// Never blocks on — and cannot fail due to — backend availability.
fn logout(state: &mut AppState, ctx: &Ctx) {
    state.cancel_inflight();
    spawn_end_session(ctx);

    // Logout discards without archiving
    state.session.logged_out();
    state.buffer.reset();
    state.registry.clear();
    state.document = None;
    state.notice = None;
    state.upload_notice = None;
    state.input.clear();
    state.cursor = 0;
    state.sidebar_focused = false;
    state.sidebar_selected = 0;
    state.login_username.clear();
    state.login_password.clear();
    state.login_focus = LoginField::Username;
    state.screen = Screen::Login;
}

fn request_delete(state: &mut AppState, ctx: &Ctx, topic: String) {
    let Some(username) = state.session.username().map(str::to_string) else {
        return;
    };
    let handle = spawn_delete(ctx, state.epoch, username, topic);
    state.track(handle);
}

fn open_history_entry(state: &mut AppState, idx: usize) {
    if let Some(entry) = state.registry.get(idx) {
        let entry = entry.clone();
        state.buffer.load(&entry);
        state.scroll = 0;
        state.sidebar_focused = false;
    }
}

fn attach_document(state: &mut AppState, path: &str) {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let name = std::path::Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.to_string());
            state.note(format!("attached {name} ({} bytes)", content.len()));
            state.document = Some(AttachedDocument { name, content });
        }
        Err(e) => state.note(format!("could not read {path}: {e}")),
    }
}

fn upload_document(state: &mut AppState, ctx: &Ctx) {
    let Some(username) = state.session.username().map(str::to_string) else {
        return;
    };
    match &state.document {
        Some(doc) => spawn_upload(ctx, username, doc.name.clone(), doc.content.clone()),
        None => state.note("no document attached — use /attach <path> first"),
    }
}

// ── Slash commands ────────────────────────────────────────────────────────────

const HELP_NOTICE: &str =
    "/new  /attach <path>  /upload  /delete <topic>  /logout  /quit   Tab: history";

/// Returns false when the command asks to quit.
fn run_command(state: &mut AppState, ctx: &Ctx, line: &str) -> bool {
    let mut parts = line.splitn(2, ' ');
    let cmd = parts.next().unwrap_or("");
    let arg = parts.next().unwrap_or("").trim();

    match cmd {
        "/new" => start_new_chat(state, ctx),
        "/attach" if !arg.is_empty() => attach_document(state, arg),
        "/attach" => state.note("usage: /attach <path to .txt file>"),
        "/upload" => upload_document(state, ctx),
        "/delete" if !arg.is_empty() => request_delete(state, ctx, arg.to_string()),
        "/delete" => state.note("usage: /delete <topic>"),
        "/logout" => logout(state, ctx),
        "/help" => state.note(HELP_NOTICE),
        "/quit" => return false,
        _ => state.note(format!("unknown command {cmd} — /help lists commands")),
    }
    true
}

// ── Key handling ──────────────────────────────────────────────────────────────

/// Returns false when the app should exit.
pub fn handle_key(state: &mut AppState, ctx: &Ctx, key: KeyEvent) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return false;
    }
    match state.screen {
        Screen::Login => handle_login_key(state, ctx, key),
        Screen::SignUp => handle_signup_key(state, ctx, key),
        Screen::Chat => handle_chat_key(state, ctx, key),
    }
}

fn handle_login_key(state: &mut AppState, ctx: &Ctx, key: KeyEvent) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('s') {
        state.screen = Screen::SignUp;
        state.signup_status = None;
        state.signup_focus = SignupField::Name;
        return true;
    }
    match key.code {
        KeyCode::Tab | KeyCode::Down | KeyCode::Up => {
            state.login_focus = match state.login_focus {
                LoginField::Username => LoginField::Password,
                LoginField::Password => LoginField::Username,
            };
        }
        KeyCode::Enter => submit_login(state, ctx),
        KeyCode::Backspace => {
            login_field_mut(state).pop();
        }
        KeyCode::Char(c) => login_field_mut(state).push(c),
        _ => {}
    }
    true
}

fn login_field_mut(state: &mut AppState) -> &mut String {
    match state.login_focus {
        LoginField::Username => &mut state.login_username,
        LoginField::Password => &mut state.login_password,
    }
}

fn handle_signup_key(state: &mut AppState, ctx: &Ctx, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Esc => {
            state.screen = Screen::Login;
        }
        KeyCode::Tab | KeyCode::Down => {
            state.signup_focus = state.signup_focus.next();
        }
        KeyCode::Enter => submit_signup(state, ctx),
        KeyCode::Backspace => {
            signup_field_mut(state).pop();
        }
        KeyCode::Char(c) => signup_field_mut(state).push(c),
        _ => {}
    }
    true
}

fn signup_field_mut(state: &mut AppState) -> &mut String {
    match state.signup_focus {
        SignupField::Name => &mut state.signup_name,
        SignupField::Username => &mut state.signup_username,
        SignupField::Email => &mut state.signup_email,
        SignupField::Password => &mut state.signup_password,
    }
}

fn handle_chat_key(state: &mut AppState, ctx: &Ctx, key: KeyEvent) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('n') {
        start_new_chat(state, ctx);
        return true;
    }

    // ── Sidebar focused: navigate archived conversations ─────────────────────
    if state.sidebar_focused {
        match key.code {
            KeyCode::Tab | KeyCode::Esc => state.sidebar_focused = false,
            KeyCode::Up => state.sidebar_selected = state.sidebar_selected.saturating_sub(1),
            KeyCode::Down => {
                if state.sidebar_selected + 1 < state.registry.len() {
                    state.sidebar_selected += 1;
                }
            }
            KeyCode::Enter => open_history_entry(state, state.sidebar_selected),
            KeyCode::Char('d') => {
                if let Some(entry) = state.registry.get(state.sidebar_selected) {
                    let topic = entry.topic.clone();
                    request_delete(state, ctx, topic);
                }
            }
            _ => {}
        }
        return true;
    }

    // ── Input box ─────────────────────────────────────────────────────────────
    match key.code {
        KeyCode::Tab => {
            if !state.registry.is_empty() {
                state.sidebar_focused = true;
            }
        }
        KeyCode::Enter => {
            let line = state.input.trim().to_string();
            if line.starts_with('/') {
                state.input.clear();
                state.cursor = 0;
                return run_command(state, ctx, &line);
            }
            submit_send(state, ctx);
        }
        KeyCode::Char(c) => {
            state.input.insert(state.cursor, c);
            state.cursor += c.len_utf8();
        }
        KeyCode::Backspace => {
            if state.cursor > 0 {
                let prev = prev_boundary(&state.input, state.cursor);
                state.input.replace_range(prev..state.cursor, "");
                state.cursor = prev;
            }
        }
        KeyCode::Delete => {
            if state.cursor < state.input.len() {
                let next = next_boundary(&state.input, state.cursor);
                state.input.replace_range(state.cursor..next, "");
            }
        }
        KeyCode::Left => {
            if state.cursor > 0 {
                state.cursor = prev_boundary(&state.input, state.cursor);
            }
        }
        KeyCode::Right => {
            if state.cursor < state.input.len() {
                state.cursor = next_boundary(&state.input, state.cursor);
            }
        }
        KeyCode::Home => state.cursor = 0,
        KeyCode::End => state.cursor = state.input.len(),
        KeyCode::Up | KeyCode::PageUp => state.scroll += 1,
        KeyCode::Down | KeyCode::PageDown => state.scroll = state.scroll.saturating_sub(1),
        _ => {}
    }
    true
}

fn prev_boundary(s: &str, idx: usize) -> usize {
    let mut i = idx - 1;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn next_boundary(s: &str, idx: usize) -> usize {
    let mut i = idx + 1;
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

// ── Terminal setup / teardown ─────────────────────────────────────────────────

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) {
    let _ = disable_raw_mode();
    let _ = execute!(terminal.backend_mut(), LeaveAlternateScreen);
    let _ = terminal.show_cursor();
}

// ── Main TUI run loop ─────────────────────────────────────────────────────────

pub async fn run(resolved: ResolvedConfig) -> Result<()> {
    let mut terminal = setup_terminal()?;

    // Panic hook — restore terminal before printing panic
    let orig_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        orig_hook(info);
    }));

    let result = event_loop(&mut terminal, resolved).await;

    restore_terminal(&mut terminal);
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    resolved: ResolvedConfig,
) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<UiEvent>();
    let ctx = Ctx {
        client: Arc::new(ApiClient::new(resolved.endpoint.clone())),
        tx,
    };
    let mut state = AppState::new(&resolved);

    let mut crossterm_events = EventStream::new();
    let mut ticker = tokio::time::interval(Duration::from_millis(120));

    terminal.draw(|f| render::draw(f, &state))?;

    loop {
        tokio::select! {
            // ── Animation tick / notice expiry ────────────────────────────────
            _ = ticker.tick() => {
                let mut dirty = false;
                if state.pending_sends > 0 || state.login_pending || state.signup_pending {
                    state.spinner_tick = state.spinner_tick.wrapping_add(1);
                    dirty = true;
                }
                if let Some((_, shown_at)) = &state.upload_notice {
                    if shown_at.elapsed() >= UPLOAD_NOTICE_TTL {
                        state.upload_notice = None;
                        dirty = true;
                    }
                }
                if dirty {
                    terminal.draw(|f| render::draw(f, &state))?;
                }
            }

            // ── Drain events from network tasks ───────────────────────────────
            Some(ev) = rx.recv() => {
                apply_event(&mut state, ev, &ctx);
                terminal.draw(|f| render::draw(f, &state))?;
            }

            // ── Keyboard/resize events ────────────────────────────────────────
            Some(Ok(ev)) = crossterm_events.next() => {
                match ev {
                    Event::Key(key) => {
                        if !handle_key(&mut state, &ctx, key) {
                            break;
                        }
                    }
                    Event::Resize(_, _) => {}
                    _ => {}
                }
                terminal.draw(|f| render::draw(f, &state))?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Turn;

    fn test_ctx() -> (Ctx, mpsc::UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let ctx = Ctx {
            // Unroutable endpoint — tests never await these requests
            client: Arc::new(ApiClient::new("http://127.0.0.1:1".to_string())),
            tx,
        };
        (ctx, rx)
    }

    fn logged_in_state() -> AppState {
        let resolved = ResolvedConfig {
            endpoint: "http://127.0.0.1:1".to_string(),
            email_domain: "@umt.edu.pk".to_string(),
            profile_name: "test".to_string(),
        };
        let mut state = AppState::new(&resolved);
        state.session.login_succeeded("ali");
        state.screen = Screen::Chat;
        state
    }

    fn entry(topic: &str, texts: &[&str]) -> HistoryEntry {
        HistoryEntry {
            topic: topic.to_string(),
            turns: texts.iter().map(|t| Turn::user(*t)).collect(),
        }
    }

    #[tokio::test]
    async fn test_logout_clears_state_regardless_of_backend() {
        let (ctx, _rx) = test_ctx();
        let mut state = logged_in_state();
        state.buffer.begin_turn("hello");
        state.registry.replace_from_server(vec![entry("T", &["m"])]);

        // The end-session call cannot succeed (unroutable endpoint), but the
        // local reset is unconditional and immediate.
        logout(&mut state, &ctx);
        assert_eq!(state.screen, Screen::Login);
        assert!(!state.session.is_authenticated());
        assert!(state.buffer.is_empty());
        assert!(state.registry.is_empty());
    }

    #[tokio::test]
    async fn test_stale_epoch_reply_is_dropped() {
        let (ctx, _rx) = test_ctx();
        let mut state = logged_in_state();
        let seq = state.buffer.begin_turn("hello");
        state.pending_sends = 1;
        let stale = state.epoch;

        // New chat cancels in-flight work and bumps the epoch
        start_new_chat(&mut state, &ctx);
        assert!(state.buffer.is_empty());

        apply_event(
            &mut state,
            UiEvent::ReplyArrived {
                epoch: stale,
                seq,
                outcome: Ok(("late".to_string(), "Stale".to_string())),
            },
            &ctx,
        );
        assert!(state.buffer.is_empty());
        assert_eq!(state.buffer.topic(), crate::conversation::DEFAULT_TOPIC);
    }

    #[tokio::test]
    async fn test_new_chat_archives_once() {
        let (ctx, _rx) = test_ctx();
        let mut state = logged_in_state();

        let seq = state.buffer.begin_turn("hello");
        state.buffer.complete_turn(seq, "hi there", "Greeting");

        start_new_chat(&mut state, &ctx);
        assert_eq!(state.registry.len(), 1);
        assert_eq!(state.registry.entries()[0].topic, "Greeting");
        assert!(state.buffer.is_empty());

        // Re-archiving identical content (reopen + new chat) adds nothing
        open_history_entry(&mut state, 0);
        start_new_chat(&mut state, &ctx);
        assert_eq!(state.registry.len(), 1);
    }

    #[tokio::test]
    async fn test_new_chat_with_empty_buffer_archives_nothing() {
        let (ctx, _rx) = test_ctx();
        let mut state = logged_in_state();
        start_new_chat(&mut state, &ctx);
        assert!(state.registry.is_empty());
    }

    #[tokio::test]
    async fn test_reply_applies_format_and_topic() {
        let (ctx, _rx) = test_ctx();
        let mut state = logged_in_state();
        let seq = state.buffer.begin_turn("hello");
        state.pending_sends = 1;
        let epoch = state.epoch;

        apply_event(
            &mut state,
            UiEvent::ReplyArrived {
                epoch,
                seq,
                outcome: Ok(("### Hi\nok".to_string(), "Greeting".to_string())),
            },
            &ctx,
        );

        let turns: Vec<&Turn> = state.buffer.turns().collect();
        assert_eq!(turns[0].text, "hello");
        assert!(turns[1].text.starts_with("<h3>Hi</h3>"));
        assert_eq!(state.buffer.topic(), "Greeting");
        assert_eq!(state.pending_sends, 0);
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_local_entries() {
        let (ctx, _rx) = test_ctx();
        let mut state = logged_in_state();
        state
            .registry
            .replace_from_server(vec![entry("T", &["m1"]), entry("U", &["m2"])]);
        let epoch = state.epoch;

        apply_event(
            &mut state,
            UiEvent::DeleteDone {
                epoch,
                topic: "T".to_string(),
                outcome: Ok((false, "not found".to_string())),
            },
            &ctx,
        );
        assert_eq!(state.registry.len(), 2);
        assert!(state.notice.as_deref().unwrap().contains("delete failed"));
    }

    #[tokio::test]
    async fn test_confirmed_delete_removes_all_topic_entries() {
        let (ctx, _rx) = test_ctx();
        let mut state = logged_in_state();
        state.registry.replace_from_server(vec![
            entry("T", &["m1"]),
            entry("T", &["m2"]),
            entry("U", &["m3"]),
        ]);
        let epoch = state.epoch;

        apply_event(
            &mut state,
            UiEvent::DeleteDone {
                epoch,
                topic: "T".to_string(),
                outcome: Ok((true, "deleted".to_string())),
            },
            &ctx,
        );
        assert_eq!(state.registry.len(), 1);
        assert_eq!(state.registry.entries()[0].topic, "U");
    }

    #[tokio::test]
    async fn test_history_fetch_failure_leaves_registry_unchanged() {
        let (ctx, _rx) = test_ctx();
        let mut state = logged_in_state();
        state.registry.replace_from_server(vec![entry("T", &["m"])]);
        let epoch = state.epoch;

        apply_event(
            &mut state,
            UiEvent::HistoryFetched {
                epoch,
                outcome: Err("connection refused".to_string()),
            },
            &ctx,
        );
        assert_eq!(state.registry.len(), 1);
    }

    #[tokio::test]
    async fn test_login_failure_surfaces_message() {
        let (ctx, _rx) = test_ctx();
        let resolved = ResolvedConfig {
            endpoint: "http://127.0.0.1:1".to_string(),
            email_domain: "@umt.edu.pk".to_string(),
            profile_name: "test".to_string(),
        };
        let mut state = AppState::new(&resolved);
        state.login_pending = true;

        apply_event(
            &mut state,
            UiEvent::LoginDone {
                username: "ali".to_string(),
                outcome: Ok((false, "Invalid credentials".to_string())),
            },
            &ctx,
        );
        assert_eq!(state.screen, Screen::Login);
        assert!(!state.login_pending);
        assert_eq!(state.session.status(), Some("Invalid credentials"));
    }
}
