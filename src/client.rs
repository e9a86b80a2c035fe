//! Client binding for the engine daemon.
//!
//! Connects to the service socket, verifies the channel with a ping
//! handshake, and correlates replies to requests by envelope id. A dead
//! binding (EOF, failed send) is recoverable: the next call rebinds and
//! retries once. A structural refusal (permission denied on the socket)
//! is terminal and never retried.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::UnixStream;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::ipc::{self, Envelope, Reply, Request};
use crate::language::Language;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<String>>>>;

/// Why a request attempt failed. Only an envelope that never reached the
/// wire is safe to resend; after a successful send the daemon may have
/// executed the request, so a lost reply is surfaced, not retried.
enum RequestFailure {
    NotSent(ClientError),
    ReplyLost(ClientError),
}

impl RequestFailure {
    fn into_error(self) -> ClientError {
        match self {
            Self::NotSent(e) | Self::ReplyLost(e) => e,
        }
    }
}

pub struct EngineClient {
    socket_path: PathBuf,
    writer: tokio::sync::Mutex<Option<OwnedWriteHalf>>,
    /// Pending map of the current connection. Each rebind installs a
    /// fresh map so a stale reader draining out can only fail its own
    /// requests, never the new connection's.
    pending: Mutex<PendingMap>,
    next_id: AtomicU64,
    refused: AtomicBool,
}

impl EngineClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            writer: tokio::sync::Mutex::new(None),
            pending: Mutex::new(Arc::new(Mutex::new(HashMap::new()))),
            next_id: AtomicU64::new(1),
            refused: AtomicBool::new(false),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub async fn is_bound(&self) -> bool {
        self.writer.lock().await.is_some()
    }

    /// Establish (or re-establish) the connection and verify it with a
    /// ping handshake before anything heavier is attempted.
    pub async fn connect(&self) -> Result<(), ClientError> {
        if self.refused.load(Ordering::SeqCst) {
            return Err(ClientError::Refused);
        }

        let stream = match UnixStream::connect(&self.socket_path).await {
            Ok(stream) => stream,
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                warn!(socket = %self.socket_path.display(), "binding_refused");
                self.refused.store(true, Ordering::SeqCst);
                return Err(ClientError::Refused);
            }
            Err(e) => return Err(ClientError::Unavailable(e.to_string())),
        };

        let (read_half, write_half) = stream.into_split();
        *self.writer.lock().await = Some(write_half);

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        *self.pending.lock().unwrap() = Arc::clone(&pending);
        tokio::spawn(async move {
            let mut lines = BufReader::new(read_half).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match serde_json::from_str::<Reply>(&line) {
                    Ok(Reply::Result { id, text }) => {
                        match pending.lock().unwrap().remove(&id) {
                            Some(tx) => {
                                let _ = tx.send(text);
                            }
                            None => debug!(id, "unmatched reply"),
                        }
                    }
                    Err(e) => warn!(error = %e, "malformed reply line"),
                }
            }
            debug!("service_disconnected");
            // Anything still waiting will never be answered on this
            // connection; dropping the senders fails the callers.
            pending.lock().unwrap().clear();
        });

        let ack = self
            .request(Request::Ping)
            .await
            .map_err(RequestFailure::into_error)?;
        info!(ack = %ack, "service_connected");
        Ok(())
    }

    pub async fn speak(&self, text: &str, lang: Language) -> Result<String, ClientError> {
        self.call(Request::Speak {
            text: text.to_string(),
            lang: lang.wire_token().to_string(),
        })
        .await
    }

    pub async fn stop(&self) -> Result<String, ClientError> {
        self.call(Request::Stop).await
    }

    pub async fn ping(&self) -> Result<String, ClientError> {
        self.call(Request::Ping).await
    }

    /// Issue a request; when the envelope never reached the wire, rebind
    /// and retry once so a restarted daemon is picked up transparently.
    /// A reply lost after a successful send is never retried.
    async fn call(&self, request: Request) -> Result<String, ClientError> {
        match self.request(request.clone()).await {
            Ok(text) => Ok(text),
            Err(RequestFailure::NotSent(ClientError::Refused)) => Err(ClientError::Refused),
            Err(RequestFailure::NotSent(e)) => {
                warn!(error = %e, "ipc_unavailable, rebinding");
                self.connect().await?;
                self.request(request)
                    .await
                    .map_err(RequestFailure::into_error)
            }
            Err(lost) => Err(lost.into_error()),
        }
    }

    /// Send one envelope on the current connection and await its
    /// correlated result. Fails explicitly on a stale binding; never
    /// treated as success.
    async fn request(&self, request: Request) -> Result<String, RequestFailure> {
        if self.refused.load(Ordering::SeqCst) {
            return Err(RequestFailure::NotSent(ClientError::Refused));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let line = ipc::to_line(&Envelope { id, request })
            .map_err(|e| RequestFailure::NotSent(ClientError::Unavailable(e.to_string())))?;

        let (tx, rx) = oneshot::channel();
        let pending = Arc::clone(&self.pending.lock().unwrap());
        pending.lock().unwrap().insert(id, tx);

        let sent = {
            let mut writer = self.writer.lock().await;
            match writer.as_mut() {
                Some(w) => w.write_all(line.as_bytes()).await.is_ok(),
                None => false,
            }
        };
        if !sent {
            pending.lock().unwrap().remove(&id);
            *self.writer.lock().await = None;
            return Err(RequestFailure::NotSent(ClientError::Unavailable(
                "not bound".into(),
            )));
        }

        rx.await.map_err(|_| {
            RequestFailure::ReplyLost(ClientError::Unavailable(
                "connection lost before reply".into(),
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::EngineService;
    use crate::session::DONE_RESULT;
    use crate::testutil::{fake_session, FakeLoader, FakePlayer};
    use tokio::task::JoinHandle;

    fn spawn_service(root: &Path, socket: &Path) -> JoinHandle<std::io::Result<()>> {
        let loader = Arc::new(FakeLoader::default());
        let player = Arc::new(FakePlayer::new(5));
        let session = fake_session(root, &[Language::En], loader, player);
        let service = EngineService::bind(session, socket).unwrap();
        tokio::spawn(service.run())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unconnected_client_binds_on_first_call() {
        let tmp = tempfile::tempdir().unwrap();
        let socket = tmp.path().join("voxd.sock");
        let _service = spawn_service(tmp.path(), &socket);

        // No explicit connect(): the first call rebinds transparently.
        let client = EngineClient::new(&socket);
        assert!(!client.is_bound().await);
        assert_eq!(client.speak("hello", Language::En).await.unwrap(), DONE_RESULT);
        assert!(client.is_bound().await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rebinds_once_daemon_appears() {
        let tmp = tempfile::tempdir().unwrap();
        let socket = tmp.path().join("voxd.sock");

        // Daemon not up yet: binding fails, but it is transient, not
        // a structural refusal.
        let client = EngineClient::new(&socket);
        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, ClientError::Unavailable(_)));
        let err = client.ping().await.unwrap_err();
        assert!(matches!(err, ClientError::Unavailable(_)));

        // Daemon comes up; the next call rebinds and succeeds.
        let _service = spawn_service(tmp.path(), &socket);
        assert_eq!(client.ping().await.unwrap(), "pong");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn lost_reply_is_not_retried() {
        let tmp = tempfile::tempdir().unwrap();
        let socket = tmp.path().join("voxd.sock");
        let listener = tokio::net::UnixListener::bind(&socket).unwrap();
        let accepts = Arc::new(AtomicU64::new(0));

        // A daemon that answers the handshake ping, then reads the next
        // request and drops the connection without replying.
        let seen = Arc::clone(&accepts);
        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                seen.fetch_add(1, Ordering::SeqCst);
                let (read_half, mut write_half) = stream.into_split();
                let mut lines = BufReader::new(read_half).lines();
                if let Ok(Some(line)) = lines.next_line().await {
                    let envelope: Envelope = serde_json::from_str(&line).unwrap();
                    let pong = ipc::to_line(&Reply::Result {
                        id: envelope.id,
                        text: "pong".into(),
                    })
                    .unwrap();
                    let _ = write_half.write_all(pong.as_bytes()).await;
                }
                let _ = lines.next_line().await;
            }
        });

        let client = EngineClient::new(&socket);
        client.connect().await.unwrap();

        // The speak reached the daemon; once its reply is lost the call
        // must fail rather than resend a request that may have executed.
        let err = client.speak("hello", Language::En).await.unwrap_err();
        assert!(matches!(err, ClientError::Unavailable(_)));
        assert_eq!(accepts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refused_is_terminal() {
        let client = EngineClient::new("/nonexistent/voxd.sock");
        client.refused.store(true, Ordering::SeqCst);
        assert!(matches!(
            client.connect().await.unwrap_err(),
            ClientError::Refused
        ));
        assert!(matches!(
            client.ping().await.unwrap_err(),
            ClientError::Refused
        ));
    }
}
