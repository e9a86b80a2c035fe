//! Unix-socket IPC service exposing the engine session.
//!
//! All connections feed one ordered dispatch queue; requests are handled
//! strictly in arrival order. `ping` and `stop` are answered inline on
//! the dispatch task (both are non-blocking, so they stay deliverable
//! during a long synthesis); `speak` is spawned and its result goes out
//! of band when the cycle resolves. Each queued request carries its
//! connection's reply sender as the return address.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::ipc::{self, Envelope, Reply, Request};
use crate::language::Language;
use crate::session::{EngineSession, PONG_RESULT};

/// One queued request plus its return address.
struct Dispatch {
    envelope: Envelope,
    reply_tx: mpsc::UnboundedSender<Reply>,
}

pub struct EngineService {
    session: EngineSession,
    listener: UnixListener,
    socket_path: PathBuf,
}

impl std::fmt::Debug for EngineService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineService")
            .field("socket_path", &self.socket_path)
            .finish_non_exhaustive()
    }
}

impl EngineService {
    /// Bind the service socket. A socket file left by a crashed run is
    /// reclaimed; one served by a live daemon refuses the bind.
    pub fn bind(session: EngineSession, socket_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if socket_path.exists() {
            if std::os::unix::net::UnixStream::connect(socket_path).is_ok() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::AddrInUse,
                    format!("{} is served by a running daemon", socket_path.display()),
                ));
            }
            std::fs::remove_file(socket_path)?;
        }
        let listener = UnixListener::bind(socket_path)?;
        info!(socket = %socket_path.display(), "engine service listening");
        Ok(Self {
            session,
            listener,
            socket_path: socket_path.to_path_buf(),
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Accept connections and drive the dispatch queue until the process
    /// shuts down.
    pub async fn run(self) -> std::io::Result<()> {
        let (dispatch_tx, mut dispatch_rx) = mpsc::channel::<Dispatch>(64);

        let session = self.session.clone();
        tokio::spawn(async move {
            while let Some(Dispatch { envelope, reply_tx }) = dispatch_rx.recv().await {
                handle_request(&session, envelope, reply_tx);
            }
        });

        loop {
            let (stream, _) = self.listener.accept().await?;
            debug!("client connected");
            let dispatch_tx = dispatch_tx.clone();
            tokio::spawn(serve_connection(stream, dispatch_tx));
        }
    }
}

/// Process one request on the dispatch task. Must not block.
fn handle_request(
    session: &EngineSession,
    envelope: Envelope,
    reply_tx: mpsc::UnboundedSender<Reply>,
) {
    let Envelope { id, request } = envelope;
    match request {
        Request::Ping => send_result(&reply_tx, id, PONG_RESULT.to_string()),
        Request::Stop => {
            let text = session.stop();
            send_result(&reply_tx, id, text);
        }
        Request::Speak { text, lang } => {
            let lang = Language::from_wire(&lang);
            debug!(id, lang = %lang, chars = text.len(), "speak dispatched");
            let session = session.clone();
            tokio::spawn(async move {
                let text = match session.speak(&text, lang).await {
                    Ok(text) => text,
                    // Recoverable by design: the failure becomes the result.
                    Err(e) => e.to_string(),
                };
                send_result(&reply_tx, id, text);
            });
        }
    }
}

fn send_result(reply_tx: &mpsc::UnboundedSender<Reply>, id: u64, text: String) {
    if reply_tx.send(Reply::Result { id, text }).is_err() {
        debug!(id, "reply_failed, client gone");
    }
}

/// Read request lines from one client and forward them to the dispatch
/// queue; drain its reply channel back onto the socket.
async fn serve_connection(stream: UnixStream, dispatch_tx: mpsc::Sender<Dispatch>) {
    let (read_half, mut write_half) = stream.into_split();
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<Reply>();

    let writer = tokio::spawn(async move {
        while let Some(reply) = reply_rx.recv().await {
            let Ok(line) = ipc::to_line(&reply) else {
                continue;
            };
            if write_half.write_all(line.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    let mut lines = BufReader::new(read_half).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Envelope>(&line) {
            Ok(envelope) => {
                if dispatch_tx
                    .send(Dispatch {
                        envelope,
                        reply_tx: reply_tx.clone(),
                    })
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Err(e) => warn!(error = %e, "malformed request line"),
        }
    }
    debug!("client disconnected");

    drop(reply_tx);
    let _ = writer.await;
}
