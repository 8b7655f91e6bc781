//! Flow-controlled duplex streaming pipeline
//!
//! Drives one provider's bidirectional streaming channel: an input-forwarder
//! task feeds the outbound half, an output-collector task decodes inbound
//! events into a bounded FIFO buffer, and the caller pulls chunks one at a
//! time through [`StreamingPipeline::next_chunk`].
//!
//! Flow control: the buffer holds at most `buffer_capacity` chunks. Reaching
//! capacity blocks the collector and pauses the forwarder; draining to the
//! low watermark resumes forwarding. Input is delayed, never dropped.
//!
//! Teardown is deterministic in every direction: idle timeout and channel
//! errors abort the sequence and close the channel, `cancel` and `Drop` both
//! signal the tasks to shut the sink within a bounded grace period, and
//! delivered chunks are always in channel sequence order.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use speech_core::{
    ChannelEvent, DuplexHandles, InputStream, SpeechError, StreamChunk, StreamConfig, StreamSink,
    StreamSource,
};
use tokio::sync::{watch, Notify};
use tokio::time::Instant;
use tracing::{debug, warn};

/// How long a teardown waits for the sink to close before giving up
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Lifecycle of one pipeline instance
///
/// The channel handshake resolves before a pipeline exists, so the first
/// observable state is `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Both tasks running, chunks flowing
    Open,
    /// Input exhausted and end-of-input sent; collecting remaining output
    Draining,
    /// Completed or cancelled; no further chunks
    Closed,
    /// Aborted by timeout, protocol violation or channel error
    Errored,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Draining => write!(f, "draining"),
            Self::Closed => write!(f, "closed"),
            Self::Errored => write!(f, "errored"),
        }
    }
}

struct Inner<O> {
    state: PipelineState,
    buffer: VecDeque<StreamChunk<O>>,
    /// First error observed; taken exactly once by the consumer
    error: Option<SpeechError>,
    /// Channel logically complete (final chunk seen or channel closed)
    finished: bool,
    last_sequence: Option<u64>,
    saw_final: bool,
    high_watermark: usize,
}

struct Shared<O> {
    inner: Mutex<Inner<O>>,
    /// Consumer wakeup: a chunk, an error or completion arrived
    chunk_ready: Notify,
    /// Collector wakeup: the consumer freed a buffer slot
    space_ready: Notify,
    /// Backpressure gate read by the forwarder
    paused: watch::Sender<bool>,
    /// Teardown signal read by both tasks
    cancel: watch::Sender<bool>,
}

enum PushOutcome<O> {
    Stored { now_full: bool, is_final: bool },
    Full(StreamChunk<O>),
    Abort,
    Protocol(String),
}

impl<O> Shared<O> {
    /// Record the first error, abort the sequence and tear the channel down
    fn fail(&self, error: SpeechError) {
        {
            let mut inner = self.inner.lock();
            if inner.error.is_none() && inner.state != PipelineState::Closed {
                warn!(%error, "Stream aborted");
                inner.state = PipelineState::Errored;
                inner.error = Some(error);
            }
        }
        let _ = self.cancel.send(true);
        self.chunk_ready.notify_one();
        self.space_ready.notify_one();
    }

    /// End-of-input was sent; the channel now only produces output
    fn mark_draining(&self) {
        let mut inner = self.inner.lock();
        if inner.state == PipelineState::Open {
            inner.state = PipelineState::Draining;
        }
    }

    /// The channel closed or produced its final chunk
    fn mark_channel_complete(&self) {
        self.inner.lock().finished = true;
        self.chunk_ready.notify_one();
    }

    /// Validate and buffer one chunk, unless the buffer is at capacity
    fn try_push(&self, chunk: StreamChunk<O>, capacity: usize) -> PushOutcome<O> {
        let mut inner = self.inner.lock();

        if matches!(inner.state, PipelineState::Errored | PipelineState::Closed) {
            return PushOutcome::Abort;
        }
        if inner.saw_final {
            return PushOutcome::Protocol(format!(
                "chunk {} received after final chunk",
                chunk.sequence
            ));
        }
        if let Some(last) = inner.last_sequence {
            if chunk.sequence <= last {
                return PushOutcome::Protocol(format!(
                    "sequence regressed from {last} to {}",
                    chunk.sequence
                ));
            }
        }
        if inner.buffer.len() >= capacity {
            return PushOutcome::Full(chunk);
        }

        inner.last_sequence = Some(chunk.sequence);
        let is_final = chunk.is_final;
        if is_final {
            inner.saw_final = true;
            inner.finished = true;
        }
        inner.buffer.push_back(chunk);
        if inner.buffer.len() > inner.high_watermark {
            inner.high_watermark = inner.buffer.len();
        }

        PushOutcome::Stored {
            now_full: inner.buffer.len() >= capacity,
            is_final,
        }
    }
}

/// One streaming operation against one provider
///
/// `O` is the output payload type: `String` for transcription, `Bytes` for
/// synthesis. Dropping the pipeline tears the channel down.
pub struct StreamingPipeline<O> {
    shared: Arc<Shared<O>>,
    capacity_low_watermark: usize,
    idle_timeout_ms: u64,
    idle_timeout: Duration,
    /// When the last chunk was delivered (or the channel opened)
    last_progress: Instant,
}

impl<O: Send + 'static> StreamingPipeline<O> {
    /// Open a channel and start the pipeline over it
    ///
    /// The connect future (transport connect plus session init) is raced
    /// against the configured connect timeout.
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::ConnectionFailed` when the handshake does not
    /// complete within `connect_timeout_ms`, or the connect future's own
    /// error when it fails outright.
    pub async fn connect<I, C>(
        connect: C,
        input: InputStream<I>,
        config: &StreamConfig,
    ) -> Result<Self, SpeechError>
    where
        I: Send + 'static,
        C: Future<Output = Result<DuplexHandles<I, O>, SpeechError>>,
    {
        let handles = race_handshake(connect, config).await?;
        Ok(Self::from_handles(handles, input, config))
    }

    /// Start the pipeline over an already-open channel
    #[must_use]
    pub fn from_handles<I>(
        handles: DuplexHandles<I, O>,
        input: InputStream<I>,
        config: &StreamConfig,
    ) -> Self
    where
        I: Send + 'static,
    {
        let (sink, source) = handles;
        let capacity = config.buffer_capacity;
        let (paused, paused_rx) = watch::channel(false);
        let (cancel, cancel_rx) = watch::channel(false);

        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                state: PipelineState::Open,
                buffer: VecDeque::with_capacity(capacity),
                error: None,
                finished: false,
                last_sequence: None,
                saw_final: false,
                high_watermark: 0,
            }),
            chunk_ready: Notify::new(),
            space_ready: Notify::new(),
            paused,
            cancel,
        });

        tokio::spawn(run_forwarder(
            sink,
            input,
            Arc::clone(&shared),
            paused_rx,
            cancel_rx.clone(),
        ));
        tokio::spawn(run_collector(source, Arc::clone(&shared), cancel_rx, capacity));

        Self {
            shared,
            capacity_low_watermark: config.low_watermark(),
            idle_timeout_ms: config.idle_timeout_ms,
            idle_timeout: Duration::from_millis(config.idle_timeout_ms),
            last_progress: Instant::now(),
        }
    }

    /// Pull the next output chunk
    ///
    /// Blocks while the buffer is empty and the stream is live. Returns
    /// `Ok(None)` once the stream completed, was cancelled, or after its
    /// terminal error has already been raised.
    ///
    /// # Errors
    ///
    /// - `SpeechError::StreamTimeout` when no chunk arrives within the idle
    ///   window, measured from the last delivered chunk.
    /// - `SpeechError::StreamProtocol` on sequence regressions or chunks
    ///   after the final one.
    /// - Any error the channel itself reported.
    ///
    /// Each terminal error is raised exactly once; pulls after that return
    /// `Ok(None)`.
    pub async fn next_chunk(&mut self) -> Result<Option<StreamChunk<O>>, SpeechError> {
        enum Step<O> {
            Deliver(StreamChunk<O>),
            Fail(SpeechError),
            Done,
            Wait,
        }

        loop {
            let step = {
                let mut inner = self.shared.inner.lock();
                if let Some(error) = inner.error.take() {
                    Step::Fail(error)
                } else if matches!(inner.state, PipelineState::Errored | PipelineState::Closed) {
                    Step::Done
                } else if let Some(chunk) = inner.buffer.pop_front() {
                    Step::Deliver(chunk)
                } else if inner.finished {
                    inner.state = PipelineState::Closed;
                    Step::Done
                } else {
                    Step::Wait
                }
            };

            match step {
                Step::Deliver(chunk) => {
                    if self.shared.inner.lock().buffer.len() <= self.capacity_low_watermark {
                        let _ = self.shared.paused.send(false);
                    }
                    self.shared.space_ready.notify_one();
                    self.last_progress = Instant::now();
                    return Ok(Some(chunk));
                }
                Step::Fail(error) => return Err(error),
                Step::Done => {
                    // Completion releases the channel without waiting for
                    // the caller to drop the pipeline.
                    let _ = self.shared.cancel.send(true);
                    return Ok(None);
                }
                Step::Wait => {
                    let deadline = self.last_progress + self.idle_timeout;
                    let notified = self.shared.chunk_ready.notified();
                    tokio::select! {
                        () = notified => {}
                        () = tokio::time::sleep_until(deadline) => {
                            self.shared
                                .fail(SpeechError::StreamTimeout(self.idle_timeout_ms));
                            let stored = self.shared.inner.lock().error.take();
                            return Err(stored
                                .unwrap_or(SpeechError::StreamTimeout(self.idle_timeout_ms)));
                        }
                    }
                }
            }
        }
    }

    /// Abort consumption and tear the channel down
    pub fn cancel(&self) {
        let _ = self.shared.cancel.send(true);
        let mut inner = self.shared.inner.lock();
        if inner.state != PipelineState::Errored {
            inner.state = PipelineState::Closed;
        }
        drop(inner);
        self.shared.chunk_ready.notify_one();
        self.shared.space_ready.notify_one();
    }

    /// Current pipeline state
    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.shared.inner.lock().state
    }

    /// Maximum buffer occupancy observed so far
    #[must_use]
    pub fn high_watermark(&self) -> usize {
        self.shared.inner.lock().high_watermark
    }
}

impl<O> fmt::Debug for StreamingPipeline<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.inner.lock();
        f.debug_struct("StreamingPipeline")
            .field("state", &inner.state)
            .field("buffered", &inner.buffer.len())
            .field("high_watermark", &inner.high_watermark)
            .finish_non_exhaustive()
    }
}

impl<O> Drop for StreamingPipeline<O> {
    fn drop(&mut self) {
        let _ = self.shared.cancel.send(true);
    }
}

/// Race a channel handshake against the configured connect timeout
///
/// Shared by [`StreamingPipeline::connect`] and the orchestrator's
/// per-attempt connect phase, so failed attempts never consume the caller's
/// input stream.
pub(crate) async fn race_handshake<I, O, C>(
    connect: C,
    config: &StreamConfig,
) -> Result<DuplexHandles<I, O>, SpeechError>
where
    C: Future<Output = Result<DuplexHandles<I, O>, SpeechError>>,
{
    let timeout = Duration::from_millis(config.connect_timeout_ms);
    match tokio::time::timeout(timeout, connect).await {
        Ok(result) => result,
        Err(_) => Err(SpeechError::ConnectionFailed(format!(
            "no channel within {}ms",
            config.connect_timeout_ms
        ))),
    }
}

/// Feed input items into the sink, honoring backpressure and cancellation
///
/// Owns the sink for the pipeline's whole life: after the input is exhausted
/// it sends end-of-input and keeps the sink open for the drain, closing it
/// only once teardown is signalled.
async fn run_forwarder<I, O>(
    mut sink: Box<dyn StreamSink<I>>,
    mut input: InputStream<I>,
    shared: Arc<Shared<O>>,
    mut paused_rx: watch::Receiver<bool>,
    mut cancel_rx: watch::Receiver<bool>,
) {
    let mut draining = false;
    while !draining {
        // Backpressure gate: forward nothing while the buffer is saturated.
        let gated = tokio::select! {
            gate = paused_rx.wait_for(|paused| !*paused) => gate.is_ok(),
            _ = cancel_rx.wait_for(|cancelled| *cancelled) => false,
        };
        if !gated {
            break;
        }

        let item = tokio::select! {
            _ = cancel_rx.wait_for(|cancelled| *cancelled) => break,
            item = input.next() => item,
        };

        match item {
            Some(item) => {
                if let Err(error) = sink.send(item).await {
                    shared.fail(error);
                    break;
                }
            }
            None => {
                match sink.finish().await {
                    Ok(()) => {
                        debug!("Input exhausted, end-of-input sent");
                        shared.mark_draining();
                    }
                    Err(error) => shared.fail(error),
                }
                draining = true;
            }
        }
    }

    if draining {
        // Keep the sink alive for the drain; close on teardown.
        let _ = cancel_rx.wait_for(|cancelled| *cancelled).await;
    }
    let _ = tokio::time::timeout(CLOSE_GRACE, sink.close()).await;
}

/// Decode inbound channel events into the bounded buffer
async fn run_collector<O: Send>(
    mut source: Box<dyn StreamSource<O>>,
    shared: Arc<Shared<O>>,
    mut cancel_rx: watch::Receiver<bool>,
    capacity: usize,
) {
    loop {
        let event = tokio::select! {
            _ = cancel_rx.wait_for(|cancelled| *cancelled) => return,
            event = source.next_event() => event,
        };

        match event {
            Some(ChannelEvent::Chunk(chunk)) => {
                let mut pending = chunk;
                loop {
                    match shared.try_push(pending, capacity) {
                        PushOutcome::Stored { now_full, is_final } => {
                            if now_full {
                                let _ = shared.paused.send(true);
                            }
                            if is_final {
                                debug!("Final chunk received");
                            }
                            shared.chunk_ready.notify_one();
                            break;
                        }
                        PushOutcome::Full(chunk) => {
                            pending = chunk;
                            tokio::select! {
                                () = shared.space_ready.notified() => {}
                                _ = cancel_rx.wait_for(|cancelled| *cancelled) => return,
                            }
                        }
                        PushOutcome::Abort => return,
                        PushOutcome::Protocol(message) => {
                            shared.fail(SpeechError::StreamProtocol(message));
                            return;
                        }
                    }
                }
            }
            Some(ChannelEvent::Error(error)) => {
                shared.fail(error);
                return;
            }
            Some(ChannelEvent::Closed) | None => {
                debug!("Channel closed");
                shared.mark_channel_complete();
                return;
            }
        }
    }
}
