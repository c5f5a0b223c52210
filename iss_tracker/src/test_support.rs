use crate::error::MailError;
use crate::notifier::Mailer;
use axum::Router;
use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use lettre::Message;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing::subscriber::DefaultGuard;

pub fn iss_body(latitude: &str, longitude: &str) -> String {
    format!(
        r#"{{"message": "success", "timestamp": 1718000000, "iss_position": {{"latitude": "{latitude}", "longitude": "{longitude}"}}}}"#
    )
}

pub fn sun_body(sunrise: &str, sunset: &str) -> String {
    format!(r#"{{"results": {{"sunrise": "{sunrise}", "sunset": "{sunset}"}}, "status": "OK"}}"#)
}

#[derive(Clone)]
struct MockState {
    status: StatusCode,
    body: String,
    queries: Arc<Mutex<Vec<String>>>,
}

/// Local HTTP server answering every request with one canned response.
pub struct MockApi {
    addr: SocketAddr,
    queries: Arc<Mutex<Vec<String>>>,
}

impl MockApi {
    pub async fn ok(body: impl Into<String>) -> Self {
        Self::serve(StatusCode::OK, body.into()).await
    }

    pub async fn status(code: u16) -> Self {
        let status = StatusCode::from_u16(code).expect("valid status code");
        Self::serve(status, "{}".to_string()).await
    }

    async fn serve(status: StatusCode, body: String) -> Self {
        let queries = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new().fallback(respond).with_state(MockState {
            status,
            body,
            queries: Arc::clone(&queries),
        });
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock api");
        let addr = listener.local_addr().expect("mock api address");
        tokio::spawn(async move { axum::serve(listener, app).await });
        Self { addr, queries }
    }

    /// URL of a port nothing listens on.
    pub async fn closed_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind throwaway listener");
        let addr = listener.local_addr().expect("throwaway address");
        drop(listener);
        format!("http://{addr}/")
    }

    /// URL of a server that accepts connections and never answers.
    pub async fn stalled_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stalled listener");
        let addr = listener.local_addr().expect("stalled address");
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });
        format!("http://{addr}/")
    }

    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().expect("queries lock").clone()
    }
}

async fn respond(State(state): State<MockState>, RawQuery(query): RawQuery) -> impl IntoResponse {
    state
        .queries
        .lock()
        .expect("queries lock")
        .push(query.unwrap_or_default());
    (state.status, [(CONTENT_TYPE, "application/json")], state.body)
}

#[derive(Default)]
struct Outbox {
    sessions: usize,
    sent: Vec<Message>,
}

/// Mail transport double that records every session and message.
#[derive(Clone, Default)]
pub struct RecordingMailer {
    outbox: Arc<Mutex<Outbox>>,
    reject_login: bool,
    reject_recipient: Option<String>,
    cancel_after_sessions: Option<(usize, CancellationToken)>,
}

impl RecordingMailer {
    pub fn rejecting_login() -> Self {
        Self {
            reject_login: true,
            ..Self::default()
        }
    }

    pub fn rejecting_recipient(email: &str) -> Self {
        Self {
            reject_recipient: Some(email.to_string()),
            ..Self::default()
        }
    }

    /// Cancels `token` once `sessions` mail sessions have been opened.
    pub fn cancel_after(mut self, sessions: usize, token: CancellationToken) -> Self {
        self.cancel_after_sessions = Some((sessions, token));
        self
    }

    pub fn sessions(&self) -> usize {
        self.outbox.lock().expect("outbox lock").sessions
    }

    pub fn sent(&self) -> Vec<Message> {
        self.outbox.lock().expect("outbox lock").sent.clone()
    }
}

impl Mailer for RecordingMailer {
    async fn open(&self) -> Result<(), MailError> {
        let sessions = {
            let mut outbox = self.outbox.lock().expect("outbox lock");
            outbox.sessions += 1;
            outbox.sessions
        };
        if let Some((limit, token)) = &self.cancel_after_sessions
            && sessions >= *limit
        {
            token.cancel();
        }
        if self.reject_login {
            return Err(MailError::Unavailable);
        }
        Ok(())
    }

    async fn send(&self, message: Message) -> Result<(), MailError> {
        if let Some(rejected) = &self.reject_recipient
            && message
                .envelope()
                .to()
                .iter()
                .any(|address| address.to_string() == *rejected)
        {
            return Err(MailError::Unavailable);
        }
        self.outbox.lock().expect("outbox lock").sent.push(message);
        Ok(())
    }
}

/// Collects WARN and above from the current thread's events.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn install(&self) -> DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(Level::WARN)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn warnings(&self) -> Vec<String> {
        let buffer = self.0.lock().expect("log buffer lock");
        String::from_utf8_lossy(&buffer)
            .lines()
            .filter(|line| line.contains("WARN"))
            .map(str::to_string)
            .collect()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0
            .lock()
            .expect("log buffer lock")
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
