use std::sync::Arc;

use facegate_core::{Directive, EngineError, FaceObservation, LivenessEngine, Status};
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tracing::Instrument;
use uuid::Uuid;

use crate::capture::{CaptureError, CapturedPhoto, PhotoCapture};
use crate::config::Config;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("session task exited")]
    ChannelClosed,
}

/// Notifications for the camera UI besides status changes.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Capture succeeded; the cycle is over.
    Captured(CapturedPhoto),
    /// Capture failed; frame processing has resumed.
    CaptureFailed(String),
    /// Camera lost during capture; the session is inactive until reopened.
    CameraUnavailable(String),
}

/// Messages sent from handles to the session task.
enum SessionRequest {
    Frame {
        faces: Vec<FaceObservation>,
    },
    Capture {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
    Reopen {
        reply: oneshot::Sender<()>,
    },
}

/// Clone-safe handle to a running capture session.
#[derive(Clone)]
pub struct SessionHandle {
    id: Uuid,
    tx: mpsc::Sender<SessionRequest>,
    status: watch::Receiver<Status>,
}

impl SessionHandle {
    /// Push one frame of detections. Never blocks: if the session is still
    /// busy with earlier frames this one is dropped and `false` returned.
    pub fn push_frame(&self, faces: Vec<FaceObservation>) -> bool {
        match self.tx.try_send(SessionRequest::Frame { faces }) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::trace!(session = %self.id, "frame queue full, dropping frame");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Manual-mode capture button.
    pub async fn request_capture(&self) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionRequest::Capture { reply })
            .await
            .map_err(|_| SessionError::ChannelClosed)?;
        rx.await.map_err(|_| SessionError::ChannelClosed)?
    }

    /// Close the capture UI. Countdown and detector memory are gone once this returns.
    pub async fn close(&self) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionRequest::Close { reply })
            .await
            .map_err(|_| SessionError::ChannelClosed)?;
        rx.await.map_err(|_| SessionError::ChannelClosed)
    }

    /// Start a fresh cycle with a new random challenge.
    pub async fn reopen(&self) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionRequest::Reopen { reply })
            .await
            .map_err(|_| SessionError::ChannelClosed)?;
        rx.await.map_err(|_| SessionError::ChannelClosed)
    }

    /// Subscribe to live status changes.
    pub fn status(&self) -> watch::Receiver<Status> {
        self.status.clone()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

/// Receiving side of [`SessionEvent`]s.
pub struct SessionEvents {
    rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl SessionEvents {
    pub async fn next(&mut self) -> Option<SessionEvent> {
        self.rx.recv().await
    }

    pub fn try_next(&mut self) -> Option<SessionEvent> {
        self.rx.try_recv().ok()
    }
}

/// Spawn a capture session on the current tokio runtime.
///
/// Checks the camera first and fails fast with
/// [`SessionError::CameraUnavailable`]; otherwise selects a challenge and
/// starts accepting frames. The session task owns the engine, so frame
/// arrivals, countdown ticks and capture completions are serialized.
///
/// # Panics
///
/// Panics if called outside a tokio runtime.
pub fn spawn_session<C: PhotoCapture>(
    config: Config,
    capture: C,
) -> Result<(SessionHandle, SessionEvents), SessionError> {
    capture.ensure_ready().map_err(|e| match e {
        CaptureError::CameraUnavailable(reason) => SessionError::CameraUnavailable(reason),
        other => SessionError::CameraUnavailable(other.to_string()),
    })?;

    let id = Uuid::new_v4();
    let mut engine = LivenessEngine::new(config.engine);
    engine.start();

    let (status_tx, status_rx) = watch::channel(engine.status().clone());
    let (tx, rx) = mpsc::channel(config.frame_queue.max(1));
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    let task = SessionTask {
        engine,
        capture: Arc::new(capture),
        status_tx,
        events: event_tx,
        in_flight: None,
    };

    let span = tracing::info_span!("session", id = %id);
    tokio::spawn(task.run(rx).instrument(span));

    Ok((
        SessionHandle {
            id,
            tx,
            status: status_rx,
        },
        SessionEvents { rx: event_rx },
    ))
}

type CaptureJob = JoinHandle<Result<CapturedPhoto, CaptureError>>;

struct SessionTask<C> {
    engine: LivenessEngine,
    capture: Arc<C>,
    status_tx: watch::Sender<Status>,
    events: mpsc::UnboundedSender<SessionEvent>,
    in_flight: Option<CaptureJob>,
}

impl<C: PhotoCapture> SessionTask<C> {
    async fn run(mut self, mut rx: mpsc::Receiver<SessionRequest>) {
        tracing::info!("session started");
        loop {
            let tick_at = self.engine.next_tick_at();
            tokio::select! {
                req = rx.recv() => match req {
                    Some(req) => self.handle(req),
                    None => break,
                },
                () = sleep_until(tick_at) => {
                    let directive = self.engine.tick(now());
                    self.apply(directive);
                }
                res = join_capture(&mut self.in_flight) => {
                    self.in_flight = None;
                    self.finish_capture(res);
                }
            }
            self.publish_status();
        }

        self.abort_capture();
        tracing::info!("session ended");
    }

    fn handle(&mut self, req: SessionRequest) {
        match req {
            SessionRequest::Frame { faces } => {
                let directive = self.engine.on_frame(&faces, now());
                self.apply(directive);
            }
            SessionRequest::Capture { reply } => {
                let result = self.engine.begin_manual_capture().map_err(SessionError::from);
                if result.is_ok() {
                    self.start_capture();
                }
                let _ = reply.send(result);
            }
            SessionRequest::Close { reply } => {
                self.abort_capture();
                self.engine.close();
                tracing::info!("session closed");
                self.publish_status();
                let _ = reply.send(());
            }
            SessionRequest::Reopen { reply } => {
                self.abort_capture();
                self.engine.start();
                tracing::info!("session reopened");
                self.publish_status();
                let _ = reply.send(());
            }
        }
    }

    fn apply(&mut self, directive: Directive) {
        if directive == Directive::Capture {
            self.start_capture();
        }
    }

    fn start_capture(&mut self) {
        if self.in_flight.is_some() {
            tracing::warn!("capture already in flight, ignoring trigger");
            return;
        }
        let capture = Arc::clone(&self.capture);
        self.in_flight = Some(tokio::spawn(async move { capture.capture_photo().await }));
    }

    fn finish_capture(&mut self, res: Result<Result<CapturedPhoto, CaptureError>, JoinError>) {
        let outcome = match res {
            Ok(Ok(photo)) if photo.path.as_os_str().is_empty() => Err(CaptureError::NoImage),
            Ok(outcome) => outcome,
            Err(e) => Err(CaptureError::Failed(e.to_string())),
        };

        match outcome {
            Ok(photo) => {
                if self.engine.capture_succeeded() {
                    tracing::info!(path = %photo.path.display(), "photo captured");
                    let _ = self.events.send(SessionEvent::Captured(photo));
                }
            }
            Err(e) if e.is_fatal() => {
                let reason = e.to_string();
                self.engine.camera_unavailable(reason.clone());
                let _ = self.events.send(SessionEvent::CameraUnavailable(reason));
            }
            Err(e) => {
                let reason = e.to_string();
                self.engine.capture_failed(reason.clone());
                let _ = self.events.send(SessionEvent::CaptureFailed(reason));
            }
        }
    }

    fn abort_capture(&mut self) {
        if let Some(job) = self.in_flight.take() {
            job.abort();
        }
    }

    fn publish_status(&self) {
        let status = self.engine.status();
        self.status_tx.send_if_modified(|current| {
            if current != status {
                *current = status.clone();
                true
            } else {
                false
            }
        });
    }
}

/// Engine time comes from the tokio clock so paused-time tests stay consistent.
fn now() -> std::time::Instant {
    tokio::time::Instant::now().into_std()
}

async fn sleep_until(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending().await,
    }
}

async fn join_capture(job: &mut Option<CaptureJob>) -> Result<Result<CapturedPhoto, CaptureError>, JoinError> {
    match job {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}
