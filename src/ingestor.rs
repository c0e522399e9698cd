//! Incremental consumer for the article event stream.
//!
//! A [`StreamIngestor`] owns at most one live session. [`StreamIngestor::start`]
//! cancels the previous session, waits for its task to wind down, and only
//! then spawns the new one, so a sink never sees events from a superseded
//! request once `start` has returned.

use std::fmt::Display;

use reqwest::Client;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ArticleError, Result};
use crate::request::ArticleRequest;
use crate::sse::{parse_line, LineFramer, StreamEvent};

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Receiver of [`StreamEvent`]s. Called from the session task, in wire order.
pub trait StreamSink: Send + 'static {
    fn on_event(&mut self, event: StreamEvent);
}

impl StreamSink for mpsc::UnboundedSender<StreamEvent> {
    fn on_event(&mut self, event: StreamEvent) {
        // A dropped receiver just means nobody is watching any more.
        let _ = self.send(event);
    }
}

impl StreamSink for Box<dyn FnMut(StreamEvent) + Send> {
    fn on_event(&mut self, event: StreamEvent) {
        (self)(event)
    }
}

/// Wrap a closure as a sink.
pub fn sink_fn<F>(f: F) -> Box<dyn FnMut(StreamEvent) + Send>
where
    F: FnMut(StreamEvent) + Send + 'static,
{
    Box::new(f)
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A `done` payload arrived; carries the full text.
    Completed(String),
    /// Transport, HTTP status or application failure; carries the message
    /// that was sent as [`StreamEvent::Error`].
    Failed(String),
    /// Cancelled explicitly or superseded by a newer session.
    Cancelled,
    /// Body ended without `done` or `error`; carries the text so far.
    Closed(String),
}

/// Per-request accumulator: decodes blocks, dispatches payloads and keeps
/// the cumulative text. Holds no I/O, so it can be driven directly.
pub struct StreamSession {
    id: Uuid,
    framer: LineFramer,
    text: String,
    finished: Option<Outcome>,
}

impl Default for StreamSession {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            framer: LineFramer::new(),
            text: String::new(),
            finished: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Text accumulated so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_some()
    }

    /// Process one raw block. Every line the block completes is handled
    /// before returning. Returns the outcome once the session terminates;
    /// later calls do nothing and return the same outcome.
    pub fn feed(&mut self, block: &[u8], emit: &mut dyn FnMut(StreamEvent)) -> Option<Outcome> {
        if self.finished.is_some() {
            return self.finished.clone();
        }
        let lines = self.framer.push(block);
        self.dispatch_lines(lines, emit)
    }

    /// Handle end of body: flush the decoder, process any unterminated final
    /// line, and close the session if nothing terminated it.
    pub fn finish(&mut self, emit: &mut dyn FnMut(StreamEvent)) -> Outcome {
        if let Some(outcome) = &self.finished {
            return outcome.clone();
        }
        let lines = self.framer.finish();
        if let Some(outcome) = self.dispatch_lines(lines, emit) {
            return outcome;
        }
        let outcome = Outcome::Closed(self.text.clone());
        self.finished = Some(outcome.clone());
        outcome
    }

    /// Terminate with a failure that did not come from the payload stream.
    pub fn fail(&mut self, message: String, emit: &mut dyn FnMut(StreamEvent)) -> Outcome {
        if let Some(outcome) = &self.finished {
            return outcome.clone();
        }
        emit(StreamEvent::Error(message.clone()));
        let outcome = Outcome::Failed(message);
        self.finished = Some(outcome.clone());
        outcome
    }

    fn dispatch_lines(
        &mut self,
        lines: Vec<String>,
        emit: &mut dyn FnMut(StreamEvent),
    ) -> Option<Outcome> {
        for line in lines {
            let payload = match parse_line(&line) {
                None => continue,
                Some(Ok(payload)) => payload,
                Some(Err(e)) => {
                    warn!(session = %self.id, error = %e, "skipping unparseable stream line");
                    continue;
                }
            };

            if let Some(message) = payload.error_message() {
                let message = message.to_string();
                emit(StreamEvent::Error(message.clone()));
                self.finished = Some(Outcome::Failed(message));
                return self.finished.clone();
            }

            if let Some(chunk) = payload.chunk_text() {
                self.text.push_str(chunk);
                emit(StreamEvent::Chunk(self.text.clone()));
            }

            if payload.is_done() {
                emit(StreamEvent::Done(self.text.clone()));
                self.finished = Some(Outcome::Completed(self.text.clone()));
                return self.finished.clone();
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Caller's side of a running session.
pub struct SessionHandle {
    id: Uuid,
    token: CancellationToken,
    outcome: oneshot::Receiver<Outcome>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Ask the session to stop. It ends as [`Outcome::Cancelled`] without
    /// emitting anything further.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait for the session to end.
    pub async fn wait(self) -> Outcome {
        self.outcome.await.unwrap_or(Outcome::Cancelled)
    }
}

struct ActiveSession {
    id: Uuid,
    token: CancellationToken,
    task: JoinHandle<()>,
}

// ---------------------------------------------------------------------------
// Ingestor
// ---------------------------------------------------------------------------

/// Drives one streaming generate call at a time.
pub struct StreamIngestor {
    client: Client,
    active: Option<ActiveSession>,
}

impl Default for StreamIngestor {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

impl StreamIngestor {
    pub fn new(client: Client) -> Self {
        Self { client, active: None }
    }

    /// Id of the live session, if one is still running.
    pub fn active_id(&self) -> Option<Uuid> {
        self.active
            .as_ref()
            .filter(|a| !a.task.is_finished())
            .map(|a| a.id)
    }

    /// Validate `request`, cancel any live session, and POST to `endpoint`
    /// with the body streamed into `sink`.
    ///
    /// Validation errors are returned here. Everything after that,
    /// including connection failures and non-success statuses, is reported
    /// through the sink as [`StreamEvent::Error`].
    pub async fn start<S: StreamSink>(
        &mut self,
        endpoint: &str,
        request: &ArticleRequest,
        sink: S,
    ) -> Result<SessionHandle> {
        request.validate()?;
        self.supersede().await;

        let client = self.client.clone();
        let endpoint = endpoint.to_string();
        let request = request.normalized();

        Ok(self.spawn(sink, move |token| async move {
            let response = tokio::select! {
                biased;
                _ = token.cancelled() => return Opened::Cancelled,
                res = open(&client, &endpoint, &request) => res,
            };
            match response {
                Ok(response) => Opened::Body(Box::pin(response.bytes_stream())),
                Err(e) => Opened::Failed(e),
            }
        }))
    }

    /// Like [`start`](Self::start) but consumes an already-open body. Used
    /// when the transport is not reqwest, and by tests.
    pub async fn attach<St, B, E, S>(&mut self, body: St, sink: S) -> SessionHandle
    where
        St: Stream<Item = std::result::Result<B, E>> + Send + Unpin + 'static,
        B: AsRef<[u8]> + Send + 'static,
        E: Display + Send + 'static,
        S: StreamSink,
    {
        self.supersede().await;
        self.spawn(sink, move |_token| async move { Opened::Body(body) })
    }

    /// Cancel the session behind `handle` if it is the live one.
    pub fn cancel(&mut self, handle: &SessionHandle) {
        handle.cancel();
        if self.active.as_ref().is_some_and(|a| a.id == handle.id) {
            self.active = None;
        }
    }

    async fn supersede(&mut self) {
        if let Some(prev) = self.active.take() {
            prev.token.cancel();
            if let Err(e) = prev.task.await {
                warn!(session = %prev.id, error = %e, "superseded session task failed");
            } else {
                debug!(session = %prev.id, "superseded session released");
            }
        }
    }

    fn spawn<S, O, Fut, St, B, E>(&mut self, mut sink: S, open_body: O) -> SessionHandle
    where
        S: StreamSink,
        O: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Opened<St>> + Send + 'static,
        St: Stream<Item = std::result::Result<B, E>> + Send + Unpin + 'static,
        B: AsRef<[u8]> + Send + 'static,
        E: Display + Send + 'static,
    {
        let token = CancellationToken::new();
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let mut session = StreamSession::new();
        let id = session.id();
        debug!(session = %id, "stream session started");

        let task_token = token.clone();
        let task = tokio::spawn(async move {
            let outcome = {
                let guard = task_token.clone();
                let mut emit = |event: StreamEvent| {
                    if !guard.is_cancelled() {
                        sink.on_event(event);
                    }
                };
                match open_body(task_token.clone()).await {
                    Opened::Cancelled => Outcome::Cancelled,
                    Opened::Failed(e) if task_token.is_cancelled() => {
                        debug!(session = %id, error = %e, "failure after cancellation absorbed");
                        Outcome::Cancelled
                    }
                    Opened::Failed(e) => session.fail(format!("Streaming error: {e}"), &mut emit),
                    Opened::Body(body) => drive(body, &mut session, &task_token, &mut emit).await,
                }
            };
            match &outcome {
                Outcome::Completed(text) => {
                    info!(session = %id, chars = text.chars().count(), "stream session completed")
                }
                Outcome::Failed(message) => warn!(session = %id, %message, "stream session failed"),
                Outcome::Cancelled => debug!(session = %id, "stream session cancelled"),
                Outcome::Closed(_) => debug!(session = %id, "stream closed without done"),
            }
            let _ = outcome_tx.send(outcome);
        });

        self.active = Some(ActiveSession { id, token: token.clone(), task });
        SessionHandle { id, token, outcome: outcome_rx }
    }
}

impl Drop for StreamIngestor {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.token.cancel();
        }
    }
}

enum Opened<St> {
    Body(St),
    Failed(ArticleError),
    Cancelled,
}

async fn open(client: &Client, endpoint: &str, request: &ArticleRequest) -> Result<reqwest::Response> {
    let response = client
        .post(endpoint)
        .header("Content-Type", "application/json")
        .json(request)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(ArticleError::Protocol { status, body });
    }
    Ok(response)
}

/// Read blocks until the session terminates, the body ends, or the token
/// fires. Cancellation is checked around every read.
async fn drive<St, B, E>(
    mut body: St,
    session: &mut StreamSession,
    token: &CancellationToken,
    emit: &mut (dyn FnMut(StreamEvent) + Send),
) -> Outcome
where
    St: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => return Outcome::Cancelled,
            next = body.next() => next,
        };
        if token.is_cancelled() {
            return Outcome::Cancelled;
        }
        match next {
            Some(Ok(block)) => {
                if let Some(outcome) = session.feed(block.as_ref(), &mut *emit) {
                    return outcome;
                }
            }
            Some(Err(e)) => return session.fail(format!("Streaming error: {e}"), &mut *emit),
            None => return session.finish(&mut *emit),
        }
    }
}
