use crate::domain::{CatalogListener, LineFramer, Record, TextDecoder, encode_show_line};
use crate::infra::{PortConfig, Transport, TransportError};
use std::fmt;
use std::io;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

const READ_CHUNK_BYTES: usize = 1024;
/// Outbound lines waiting on a slow device; further lines are dropped.
const OUTBOUND_QUEUE_LINES: usize = 32;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

impl LinkState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Disconnected => "offline",
            Self::Connecting => "connecting",
            Self::Connected => "linked",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What the session reports back to its controller.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LinkSignal {
    State(LinkState),
    /// A complete, trimmed, non-empty inbound line.
    Line(String),
    /// User-visible failure (connect refused, link dropped on error).
    Error(String),
}

#[derive(Debug)]
enum LinkRequest {
    Connect,
    Disconnect,
    Send(String),
}

/// Cheap handle for driving a running link session.
#[derive(Clone, Debug)]
pub struct LinkHandle {
    requests: mpsc::UnboundedSender<LinkRequest>,
    state: watch::Receiver<LinkState>,
}

impl LinkHandle {
    pub fn connect(&self) {
        let _ = self.requests.send(LinkRequest::Connect);
    }

    pub fn disconnect(&self) {
        let _ = self.requests.send(LinkRequest::Disconnect);
    }

    /// Queues `line` for writing. Dropped by the session when no stream is open.
    pub fn send_line(&self, line: String) {
        let _ = self.requests.send(LinkRequest::Send(line));
    }

    pub fn state(&self) -> LinkState {
        *self.state.borrow()
    }
}

/// Starts the session task on the current runtime.
pub fn spawn_link_session<T: Transport>(
    transport: T,
    config: PortConfig,
) -> (LinkHandle, mpsc::UnboundedReceiver<LinkSignal>) {
    let (request_tx, request_rx) = mpsc::unbounded_channel();
    let (signal_tx, signal_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(LinkState::Disconnected);

    let session = LinkSession {
        transport,
        config,
        io: None,
        framer: LineFramer::new(),
        decoder: TextDecoder::new(),
        state: state_tx,
        signals: signal_tx,
    };
    tokio::spawn(session.run(request_rx));

    (
        LinkHandle {
            requests: request_tx,
            state: state_rx,
        },
        signal_rx,
    )
}

struct LinkIo<S> {
    reader: ReadHalf<S>,
    outbound: mpsc::Sender<String>,
    write_failures: mpsc::UnboundedReceiver<io::Error>,
    writer: JoinHandle<()>,
}

impl<S> Drop for LinkIo<S> {
    fn drop(&mut self) {
        self.writer.abort();
    }
}

/// Owns the write half so a stalled device never blocks the session loop.
async fn run_writer<S: AsyncWrite>(
    mut writer: WriteHalf<S>,
    mut lines: mpsc::Receiver<String>,
    failures: mpsc::UnboundedSender<io::Error>,
) {
    while let Some(line) = lines.recv().await {
        let written = match writer.write_all(line.as_bytes()).await {
            Ok(()) => writer.flush().await,
            Err(error) => Err(error),
        };
        if let Err(error) = written {
            let closed = is_closed_error(&error);
            let _ = failures.send(error);
            if closed {
                break;
            }
        }
    }
}

struct LinkSession<T: Transport> {
    transport: T,
    config: PortConfig,
    io: Option<LinkIo<T::Stream>>,
    framer: LineFramer,
    decoder: TextDecoder,
    state: watch::Sender<LinkState>,
    signals: mpsc::UnboundedSender<LinkSignal>,
}

enum LoopEvent {
    Request(Option<LinkRequest>),
    Read(io::Result<usize>),
    WriteFailed(io::Error),
}

impl<T: Transport> LinkSession<T> {
    async fn run(mut self, mut requests: mpsc::UnboundedReceiver<LinkRequest>) {
        let mut buf = [0u8; READ_CHUNK_BYTES];
        loop {
            let event = match self.io.as_mut() {
                Some(io) => tokio::select! {
                    biased;
                    request = requests.recv() => LoopEvent::Request(request),
                    Some(error) = io.write_failures.recv() => LoopEvent::WriteFailed(error),
                    read = io.reader.read(&mut buf) => LoopEvent::Read(read),
                },
                None => LoopEvent::Request(requests.recv().await),
            };

            match event {
                LoopEvent::Request(None) => break,
                LoopEvent::Request(Some(request)) => self.handle_request(request).await,
                LoopEvent::Read(Ok(0)) => {
                    tracing::info!("device closed the link");
                    self.close();
                }
                LoopEvent::Read(Ok(len)) => self.handle_chunk(&buf[..len]),
                LoopEvent::Read(Err(error)) => {
                    tracing::warn!(%error, "link read failed");
                    self.close();
                }
                LoopEvent::WriteFailed(error) => self.handle_write_failure(error),
            }
        }
        self.close();
    }

    async fn handle_request(&mut self, request: LinkRequest) {
        match request {
            LinkRequest::Connect => self.connect().await,
            LinkRequest::Disconnect => self.close(),
            LinkRequest::Send(line) => self.write_line(line),
        }
    }

    async fn connect(&mut self) {
        if self.io.is_some() || *self.state.borrow() != LinkState::Disconnected {
            tracing::debug!("connect ignored; link already {}", *self.state.borrow());
            return;
        }

        self.set_state(LinkState::Connecting);
        match self.open().await {
            Ok(stream) => {
                let (reader, writer) = tokio::io::split(stream);
                let (outbound, lines) = mpsc::channel(OUTBOUND_QUEUE_LINES);
                let (failure_tx, write_failures) = mpsc::unbounded_channel();
                let writer = tokio::spawn(run_writer(writer, lines, failure_tx));
                self.io = Some(LinkIo {
                    reader,
                    outbound,
                    write_failures,
                    writer,
                });
                self.framer.clear();
                self.decoder.reset();
                self.set_state(LinkState::Connected);
            }
            Err(error) => {
                tracing::warn!(%error, "link connect failed");
                self.set_state(LinkState::Failed);
                let _ = self.signals.send(LinkSignal::Error(error.to_string()));
                self.set_state(LinkState::Disconnected);
            }
        }
    }

    async fn open(&mut self) -> Result<T::Stream, TransportError> {
        let handle = self.transport.request_access().await?;
        tracing::info!(port = %handle, baud = self.config.baud_rate, "opening link");
        self.transport.open(&handle, &self.config).await
    }

    fn handle_chunk(&mut self, bytes: &[u8]) {
        let text = self.decoder.decode(bytes);
        for line in self.framer.feed(&text) {
            if line.is_empty() {
                continue;
            }
            tracing::debug!(%line, "inbound line");
            let _ = self.signals.send(LinkSignal::Line(line));
        }
    }

    fn write_line(&mut self, line: String) {
        let Some(io) = self.io.as_mut() else {
            tracing::debug!("link not open; dropping outbound line");
            return;
        };

        match io.outbound.try_send(line) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(line)) => {
                tracing::warn!(
                    line = line.trim_end(),
                    "device not draining; dropping outbound line"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("writer stopped; dropping outbound line");
            }
        }
    }

    fn handle_write_failure(&mut self, error: io::Error) {
        let closed = is_closed_error(&error);
        let error = TransportError::Write(error);
        if closed {
            tracing::warn!(%error, "link closed during write");
            let _ = self.signals.send(LinkSignal::Error(error.to_string()));
            self.close();
        } else {
            tracing::warn!(%error, "link write failed");
        }
    }

    fn close(&mut self) {
        let was_open = self.io.take().is_some();
        if !self.framer.pending().is_empty() {
            tracing::debug!(pending = self.framer.pending(), "discarding partial line");
        }
        self.framer.clear();
        self.decoder.reset();
        if was_open || *self.state.borrow() != LinkState::Disconnected {
            self.set_state(LinkState::Disconnected);
        }
    }

    fn set_state(&self, next: LinkState) {
        self.state.send_replace(next);
        tracing::info!(state = %next, "link state");
        let _ = self.signals.send(LinkSignal::State(next));
    }
}

fn is_closed_error(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::WriteZero
    )
}

/// Mirrors every selection change to the device while the link is up.
pub struct OutboundNotifier {
    link: LinkHandle,
}

impl OutboundNotifier {
    pub fn new(link: LinkHandle) -> Self {
        Self { link }
    }
}

impl CatalogListener for OutboundNotifier {
    fn current_changed(&mut self, _index: usize, record: &Record) {
        if self.link.state() != LinkState::Connected {
            return;
        }
        self.link.send_line(encode_show_line(record));
    }
}
