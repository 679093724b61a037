use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use engine::{RepeatingTimer, Vec2};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::progress::{npc_flag_map, task_flag_map, ProgressSnapshot, ProgressState};
use super::transition::CarriedProgress;
use super::ui::UiPort;

pub(crate) const MIRROR_PERIOD: Duration = Duration::from_secs(1);
pub(crate) const REMOTE_PERIOD: Duration = Duration::from_secs(5);
const REMOTE_QUEUE_CAPACITY: usize = 4;
const REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default)]
pub(crate) struct SessionContext {
    pub(crate) snapshot: ProgressSnapshot,
    pub(crate) carried: Option<CarriedProgress>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct RoundedPosition {
    pub(crate) x: i64,
    pub(crate) y: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct RemoteSavePayload {
    pub(crate) player: RoundedPosition,
    pub(crate) is_played: bool,
    #[serde(rename = "tasksCompleted")]
    pub(crate) tasks_completed: BTreeMap<String, bool>,
    pub(crate) samsaram: BTreeMap<String, bool>,
    pub(crate) cash: u64,
    pub(crate) keyss: u8,
}

impl RemoteSavePayload {
    pub(crate) fn from_progress(progress: &ProgressState, position: Vec2) -> Self {
        Self {
            player: RoundedPosition {
                x: position.x.round() as i64,
                y: position.y.round() as i64,
            },
            is_played: progress.has_seen_intro,
            tasks_completed: task_flag_map(&progress.task_flags()),
            samsaram: npc_flag_map(&progress.npc_flags()),
            cash: progress.cash,
            keyss: progress.key_count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SaveRequest {
    pub(crate) token: String,
    pub(crate) payload: RemoteSavePayload,
}

#[derive(Debug, Error)]
pub(crate) enum CredentialError {
    #[error("failed to read login data {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse login data at {path}: {message}")]
    Parse { path: String, message: String },
    #[error("login data has no token")]
    MissingToken,
}

pub(crate) trait CredentialSource {
    fn bearer_token(&self) -> Result<String, CredentialError>;
}

#[derive(Debug, Deserialize)]
struct LoginData {
    #[serde(default)]
    token: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct LoginDataFile {
    path: PathBuf,
}

impl LoginDataFile {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl CredentialSource for LoginDataFile {
    fn bearer_token(&self) -> Result<String, CredentialError> {
        let raw = fs::read_to_string(&self.path).map_err(|source| CredentialError::Read {
            path: self.path.clone(),
            source,
        })?;
        let mut deserializer = serde_json::Deserializer::from_str(&raw);
        let data = serde_path_to_error::deserialize::<_, LoginData>(&mut deserializer).map_err(
            |error| {
                let path = error.path().to_string();
                CredentialError::Parse {
                    path: if path.is_empty() { ".".to_string() } else { path },
                    message: error.into_inner().to_string(),
                }
            },
        )?;
        data.token
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .ok_or(CredentialError::MissingToken)
    }
}

#[derive(Debug, Error)]
pub(crate) enum RemoteSyncError {
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("failed to spawn remote sync worker: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("remote sync queue is full")]
    QueueFull,
    #[error("remote sync worker has stopped")]
    WorkerGone,
}

pub(crate) trait RemoteStore {
    fn submit(&mut self, request: SaveRequest) -> Result<(), RemoteSyncError>;
}

pub(crate) struct HttpRemoteStore {
    sender: Option<SyncSender<SaveRequest>>,
    stopping: Arc<AtomicBool>,
}

impl HttpRemoteStore {
    pub(crate) fn spawn(url: String) -> Result<Self, RemoteSyncError> {
        Self::spawn_with_timeout(url, REMOTE_TIMEOUT)
    }

    fn spawn_with_timeout(url: String, timeout: Duration) -> Result<Self, RemoteSyncError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RemoteSyncError::Client)?;
        let (sender, receiver) = mpsc::sync_channel::<SaveRequest>(REMOTE_QUEUE_CAPACITY);
        let stopping = Arc::new(AtomicBool::new(false));
        let worker_stopping = Arc::clone(&stopping);
        thread::Builder::new()
            .name("remote-sync".to_string())
            .spawn(move || {
                for request in receiver {
                    if worker_stopping.load(Ordering::Acquire) {
                        break;
                    }
                    post_save(&client, &url, &request);
                }
                debug!("remote_sync_worker_stopped");
            })
            .map_err(RemoteSyncError::Spawn)?;
        info!("remote_sync_worker_started");
        Ok(Self {
            sender: Some(sender),
            stopping,
        })
    }
}

fn post_save(client: &reqwest::blocking::Client, url: &str, request: &SaveRequest) {
    let result = client
        .post(url)
        .bearer_auth(&request.token)
        .json(&request.payload)
        .send();
    match result {
        Ok(response) if response.status().is_success() => {
            debug!(status = response.status().as_u16(), "remote_sync_ok");
        }
        Ok(response) => {
            warn!(status = response.status().as_u16(), "remote_sync_rejected");
        }
        Err(error) => warn!(error = %error, "remote_sync_failed"),
    }
}

fn queue_error(error: TrySendError<SaveRequest>) -> RemoteSyncError {
    match error {
        TrySendError::Full(_) => RemoteSyncError::QueueFull,
        TrySendError::Disconnected(_) => RemoteSyncError::WorkerGone,
    }
}

impl RemoteStore for HttpRemoteStore {
    fn submit(&mut self, request: SaveRequest) -> Result<(), RemoteSyncError> {
        let Some(sender) = self.sender.as_ref() else {
            return Err(RemoteSyncError::WorkerGone);
        };
        sender.try_send(request).map_err(queue_error)
    }
}

// The worker is detached: queued saves are abandoned and an in-flight post finishes
// or times out on its own.
impl Drop for HttpRemoteStore {
    fn drop(&mut self) {
        self.stopping.store(true, Ordering::Release);
        self.sender.take();
        debug!("remote_sync_worker_detached");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RemoteTick {
    Disabled,
    Submitted,
    NoCredentials,
    Dropped,
}

pub(crate) struct PersistenceSync {
    mirror_timer: RepeatingTimer,
    remote_timer: RepeatingTimer,
    remote: Option<Box<dyn RemoteStore>>,
    credentials: Box<dyn CredentialSource>,
}

impl PersistenceSync {
    pub(crate) fn new(
        remote: Option<Box<dyn RemoteStore>>,
        credentials: Box<dyn CredentialSource>,
    ) -> Self {
        Self {
            mirror_timer: RepeatingTimer::new(MIRROR_PERIOD),
            remote_timer: RepeatingTimer::new(REMOTE_PERIOD),
            remote,
            credentials,
        }
    }

    pub(crate) fn tick(
        &mut self,
        dt_seconds: f32,
        progress: &mut ProgressState,
        position: Vec2,
        session: &mut SessionContext,
        ui: &mut dyn UiPort,
    ) {
        if self.mirror_timer.tick(dt_seconds) {
            mirror(progress, position, session, ui);
        }
        if self.remote_timer.tick(dt_seconds) {
            self.push_remote(progress, position);
        }
    }

    pub(crate) fn push_remote(&mut self, progress: &ProgressState, position: Vec2) -> RemoteTick {
        let Some(remote) = self.remote.as_mut() else {
            return RemoteTick::Disabled;
        };
        let token = match self.credentials.bearer_token() {
            Ok(token) => token,
            Err(error) => {
                warn!(error = %error, "remote_sync_skipped_no_credentials");
                return RemoteTick::NoCredentials;
            }
        };
        let request = SaveRequest {
            token,
            payload: RemoteSavePayload::from_progress(progress, position),
        };
        match remote.submit(request) {
            Ok(()) => RemoteTick::Submitted,
            Err(error) => {
                warn!(error = %error, "remote_sync_dropped");
                RemoteTick::Dropped
            }
        }
    }
}

pub(crate) fn mirror(
    progress: &mut ProgressState,
    position: Vec2,
    session: &mut SessionContext,
    ui: &mut dyn UiPort,
) {
    if position.is_finite() {
        progress.position = Some(position);
    }
    session.snapshot = progress.to_snapshot();
    ui.update_counters(progress.key_count(), progress.cash);
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::rc::Rc;
    use std::time::Instant;

    use serde_json::json;

    use super::*;
    use crate::app::gameplay::progress::TaskId;
    use crate::app::gameplay::ui::NoopUi;

    struct RecordingStore {
        requests: Rc<RefCell<Vec<SaveRequest>>>,
        accept: bool,
    }

    impl RemoteStore for RecordingStore {
        fn submit(&mut self, request: SaveRequest) -> Result<(), RemoteSyncError> {
            if !self.accept {
                return Err(RemoteSyncError::QueueFull);
            }
            self.requests.borrow_mut().push(request);
            Ok(())
        }
    }

    struct StaticToken(Option<&'static str>);

    impl CredentialSource for StaticToken {
        fn bearer_token(&self) -> Result<String, CredentialError> {
            self.0
                .map(str::to_string)
                .ok_or(CredentialError::MissingToken)
        }
    }

    fn sync_with(
        token: Option<&'static str>,
        accept: bool,
    ) -> (PersistenceSync, Rc<RefCell<Vec<SaveRequest>>>) {
        let requests = Rc::new(RefCell::new(Vec::new()));
        let store = RecordingStore {
            requests: Rc::clone(&requests),
            accept,
        };
        (
            PersistenceSync::new(Some(Box::new(store)), Box::new(StaticToken(token))),
            requests,
        )
    }

    #[test]
    fn payload_rounds_position_and_uses_remote_field_names() {
        let mut progress = ProgressState::default();
        progress.complete_task(TaskId::new(1).expect("task"));
        progress.cash = 40;
        progress.has_seen_intro = true;

        let payload = RemoteSavePayload::from_progress(&progress, Vec2::new(10.6, 19.4));
        let value = serde_json::to_value(&payload).expect("encode");
        assert_eq!(value["player"], json!({ "x": 11, "y": 19 }));
        assert_eq!(value["is_played"], json!(true));
        assert_eq!(value["tasksCompleted"]["task1"], json!(true));
        assert_eq!(value["samsaram"]["npc7"], json!(false));
        assert_eq!(value["cash"], json!(40));
        assert_eq!(value["keyss"], json!(1));
    }

    #[test]
    fn mirror_and_remote_fire_on_their_own_cadence() {
        let (mut sync, requests) = sync_with(Some("jwt"), true);
        let mut progress = ProgressState::default();
        let mut session = SessionContext::default();
        let mut ui = NoopUi;

        for _ in 0..(60 * 5) {
            sync.tick(
                1.0 / 60.0,
                &mut progress,
                Vec2::new(300.0, 400.0),
                &mut session,
                &mut ui,
            );
        }

        assert_eq!(progress.position, Some(Vec2::new(300.0, 400.0)));
        assert_eq!(session.snapshot, progress.to_snapshot());
        let requests = requests.borrow();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].token, "jwt");
    }

    #[test]
    fn missing_credentials_skip_the_remote_tick() {
        let (mut sync, requests) = sync_with(None, true);
        let progress = ProgressState::default();
        assert_eq!(
            sync.push_remote(&progress, Vec2::ZERO),
            RemoteTick::NoCredentials
        );
        assert!(requests.borrow().is_empty());
    }

    #[test]
    fn full_queue_drops_the_request() {
        let (mut sync, _requests) = sync_with(Some("jwt"), false);
        assert_eq!(
            sync.push_remote(&ProgressState::default(), Vec2::ZERO),
            RemoteTick::Dropped
        );
    }

    #[test]
    fn disabled_remote_is_a_no_op() {
        let mut sync = PersistenceSync::new(None, Box::new(StaticToken(Some("jwt"))));
        assert_eq!(
            sync.push_remote(&ProgressState::default(), Vec2::ZERO),
            RemoteTick::Disabled
        );
    }

    #[test]
    fn login_data_file_reads_token() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("logindata.json");
        fs::write(&path, json!({ "token": "abc.def", "user": "x" }).to_string())
            .expect("write");
        assert_eq!(
            LoginDataFile::new(path.clone()).bearer_token().expect("token"),
            "abc.def"
        );

        fs::write(&path, json!({ "user": "x" }).to_string()).expect("write");
        assert!(matches!(
            LoginDataFile::new(path).bearer_token(),
            Err(CredentialError::MissingToken)
        ));
        assert!(matches!(
            LoginDataFile::new(temp.path().join("absent.json")).bearer_token(),
            Err(CredentialError::Read { .. })
        ));
    }

    fn save_request(cash: u64) -> SaveRequest {
        let mut progress = ProgressState::default();
        progress.cash = cash;
        SaveRequest {
            token: "jwt-token".to_string(),
            payload: RemoteSavePayload::from_progress(&progress, Vec2::ZERO),
        }
    }

    fn local_listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let url = format!("http://{}/save", listener.local_addr().expect("addr"));
        (listener, url)
    }

    fn read_http_request(stream: &mut TcpStream) -> String {
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("read timeout");
        let mut raw = Vec::new();
        let mut chunk = [0_u8; 1024];
        loop {
            let read = stream.read(&mut chunk).expect("read");
            if read == 0 {
                break;
            }
            raw.extend_from_slice(&chunk[..read]);
            let Some(header_end) = raw.windows(4).position(|window| window == b"\r\n\r\n") else {
                continue;
            };
            let headers = String::from_utf8_lossy(&raw[..header_end]).to_ascii_lowercase();
            let body_len = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if raw.len() >= header_end + 4 + body_len {
                break;
            }
        }
        String::from_utf8_lossy(&raw).to_ascii_lowercase()
    }

    fn serve_status(status_line: &'static str) -> (String, mpsc::Receiver<String>) {
        let (listener, url) = local_listener();
        let (sender, receiver) = mpsc::channel();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let request = read_http_request(&mut stream);
                let response = format!(
                    "HTTP/1.1 {status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                );
                let _ = stream.write_all(response.as_bytes());
                if sender.send(request).is_err() {
                    break;
                }
            }
        });
        (url, receiver)
    }

    fn serve_silence() -> String {
        let (listener, url) = local_listener();
        thread::spawn(move || {
            let mut held = Vec::new();
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                held.push(stream);
            }
        });
        url
    }

    #[test]
    fn http_store_posts_bearer_and_payload_and_survives_server_errors() {
        let (url, requests) = serve_status("500 Internal Server Error");
        let mut store =
            HttpRemoteStore::spawn_with_timeout(url, Duration::from_secs(5)).expect("store");

        store.submit(save_request(1)).expect("first submit");
        let first = requests
            .recv_timeout(Duration::from_secs(10))
            .expect("first post");
        assert!(first.starts_with("post /save"));
        assert!(first.contains("authorization: bearer jwt-token"));
        assert!(first.contains("\"cash\":1"));
        assert!(first.contains("\"keyss\":0"));

        store.submit(save_request(2)).expect("second submit");
        let second = requests
            .recv_timeout(Duration::from_secs(10))
            .expect("worker keeps posting after a rejected save");
        assert!(second.contains("\"cash\":2"));
    }

    #[test]
    fn closed_connection_is_dropped_and_the_next_save_still_posts() {
        let (listener, url) = local_listener();
        let (sender, requests) = mpsc::channel();
        thread::spawn(move || {
            let mut incoming = listener.incoming();
            if let Some(Ok(first)) = incoming.next() {
                drop(first);
            }
            for stream in incoming {
                let Ok(mut stream) = stream else { break };
                let request = read_http_request(&mut stream);
                let _ = stream.write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                );
                if sender.send(request).is_err() {
                    break;
                }
            }
        });
        let mut store =
            HttpRemoteStore::spawn_with_timeout(url, Duration::from_secs(5)).expect("store");

        store.submit(save_request(1)).expect("first submit");
        thread::sleep(Duration::from_millis(200));
        store.submit(save_request(2)).expect("second submit");

        let deadline = Instant::now() + Duration::from_secs(10);
        let mut delivered = false;
        while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
            match requests.recv_timeout(remaining) {
                Ok(request) if request.contains("\"cash\":2") => {
                    delivered = true;
                    break;
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
        assert!(delivered);
    }

    #[test]
    fn unreachable_server_never_blocks_submit_or_shutdown() {
        let (listener, url) = local_listener();
        drop(listener);
        let started = Instant::now();
        let mut store =
            HttpRemoteStore::spawn_with_timeout(url, Duration::from_secs(5)).expect("store");

        for cash in 0..3 {
            store.submit(save_request(cash)).expect("submit");
        }
        drop(store);

        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn dropping_the_store_does_not_wait_for_a_silent_server() {
        let url = serve_silence();
        let mut store =
            HttpRemoteStore::spawn_with_timeout(url, Duration::from_secs(30)).expect("store");
        for cash in 0..3 {
            store.submit(save_request(cash)).expect("submit");
        }

        let started = Instant::now();
        drop(store);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn stalled_worker_reports_a_full_queue() {
        let url = serve_silence();
        let mut store =
            HttpRemoteStore::spawn_with_timeout(url, Duration::from_secs(30)).expect("store");

        let first_error = (0..REMOTE_QUEUE_CAPACITY as u64 + 2)
            .find_map(|cash| store.submit(save_request(cash)).err());
        assert!(matches!(first_error, Some(RemoteSyncError::QueueFull)));
    }

    #[test]
    fn queue_errors_map_to_sync_errors() {
        assert!(matches!(
            queue_error(TrySendError::Full(save_request(0))),
            RemoteSyncError::QueueFull
        ));
        assert!(matches!(
            queue_error(TrySendError::Disconnected(save_request(0))),
            RemoteSyncError::WorkerGone
        ));
    }
}
