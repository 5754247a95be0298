use std::fmt;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
#[cfg(unix)]
use std::task::ready;
#[cfg(unix)]
use tokio::io::unix::AsyncFd;

pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Device-name prefixes probed when no serial port is configured.
const SERIAL_CANDIDATE_PREFIXES: [&str; 4] =
    ["ttyACM", "ttyUSB", "cu.usbmodem", "cu.usbserial"];

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LinkTarget {
    /// Serial character device; `None` probes `/dev` on access.
    Serial(Option<PathBuf>),
    /// Serial-over-TCP bridge, `host:port`.
    Tcp(String),
}

impl fmt::Display for LinkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial(Some(path)) => write!(f, "{}", path.display()),
            Self::Serial(None) => write!(f, "serial (auto)"),
            Self::Tcp(addr) => write!(f, "tcp://{addr}"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PortConfig {
    pub baud_rate: u32,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

/// A port the transport has been granted access to, not yet opened.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PortHandle {
    Device(PathBuf),
    Socket(SocketAddr),
}

impl fmt::Display for PortHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Device(path) => write!(f, "{}", path.display()),
            Self::Socket(addr) => write!(f, "tcp://{addr}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("failed to open {port}: {message}")]
    Open { port: String, message: String },

    #[error("write failed: {0}")]
    Write(#[source] io::Error),
}

/// Byte stream to a device; reading and writing may happen independently.
pub trait DeviceIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> DeviceIo for T {}

/// Capability for reaching the display device. Closing is dropping the stream.
pub trait Transport: Send + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn request_access(
        &mut self,
    ) -> impl Future<Output = Result<PortHandle, TransportError>> + Send;

    fn open(
        &mut self,
        handle: &PortHandle,
        config: &PortConfig,
    ) -> impl Future<Output = Result<Self::Stream, TransportError>> + Send;
}

/// Serial or TCP transport selected from configuration.
#[derive(Clone, Debug)]
pub struct DeviceTransport {
    target: LinkTarget,
}

impl DeviceTransport {
    pub fn new(target: LinkTarget) -> Self {
        Self { target }
    }
}

impl Transport for DeviceTransport {
    type Stream = Box<dyn DeviceIo>;

    async fn request_access(&mut self) -> Result<PortHandle, TransportError> {
        match &self.target {
            LinkTarget::Serial(Some(path)) => {
                check_device_access(path)?;
                Ok(PortHandle::Device(path.clone()))
            }
            LinkTarget::Serial(None) => {
                let path = detect_serial_device(Path::new("/dev")).ok_or_else(|| {
                    TransportError::AccessDenied("no serial device found".to_string())
                })?;
                check_device_access(&path)?;
                Ok(PortHandle::Device(path))
            }
            LinkTarget::Tcp(addr) => {
                let mut resolved = tokio::net::lookup_host(addr.as_str())
                    .await
                    .map_err(|error| TransportError::AccessDenied(format!("{addr}: {error}")))?;
                resolved.next().map(PortHandle::Socket).ok_or_else(|| {
                    TransportError::AccessDenied(format!("{addr}: no addresses"))
                })
            }
        }
    }

    async fn open(
        &mut self,
        handle: &PortHandle,
        config: &PortConfig,
    ) -> Result<Box<dyn DeviceIo>, TransportError> {
        let open_error = |message: String| TransportError::Open {
            port: handle.to_string(),
            message,
        };

        match handle {
            PortHandle::Device(path) => {
                let stream = open_serial_device(path, config)
                    .map_err(|error| open_error(error.to_string()))?;
                Ok(Box::new(stream))
            }
            PortHandle::Socket(addr) => {
                let stream = tokio::net::TcpStream::connect(addr)
                    .await
                    .map_err(|error| open_error(error.to_string()))?;
                let _ = stream.set_nodelay(true);
                Ok(Box::new(stream))
            }
        }
    }
}

fn check_device_access(path: &Path) -> Result<(), TransportError> {
    match std::fs::metadata(path) {
        Ok(_) => Ok(()),
        Err(error) => Err(TransportError::AccessDenied(format!(
            "{}: {error}",
            path.display()
        ))),
    }
}

/// First matching device under `dev_dir`, in name order.
pub fn detect_serial_device(dev_dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dev_dir).ok()?;
    let mut candidates = entries
        .filter_map(Result::ok)
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            SERIAL_CANDIDATE_PREFIXES
                .iter()
                .any(|prefix| name.starts_with(prefix))
        })
        .map(|entry| entry.path())
        .collect::<Vec<_>>();
    candidates.sort();
    candidates.into_iter().next()
}

#[cfg(unix)]
fn open_serial_device(path: &Path, config: &PortConfig) -> io::Result<SerialStream> {
    use std::os::unix::fs::OpenOptionsExt;

    let file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
        .open(path)?;
    configure_tty(&file, config.baud_rate)?;
    SerialStream::new(file)
}

#[cfg(not(unix))]
fn open_serial_device(_path: &Path, _config: &PortConfig) -> io::Result<SerialStream> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "serial devices are only supported on unix",
    ))
}

/// Non-blocking character device driven by the runtime's reactor. Reads and
/// writes wait on readiness independently, so a parked read never holds up a
/// write.
#[cfg(unix)]
pub struct SerialStream {
    inner: AsyncFd<std::fs::File>,
}

#[cfg(unix)]
impl SerialStream {
    /// Switches `file` to non-blocking mode and registers it with the reactor.
    pub fn new(file: std::fs::File) -> io::Result<Self> {
        use std::os::fd::AsRawFd;

        let fd = file.as_raw_fd();
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self {
            inner: AsyncFd::new(file)?,
        })
    }
}

#[cfg(not(unix))]
pub enum SerialStream {}

#[cfg(not(unix))]
impl AsyncRead for SerialStream {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match *self {}
    }
}

#[cfg(not(unix))]
impl AsyncWrite for SerialStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match *self {}
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match *self {}
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match *self {}
    }
}

#[cfg(unix)]
impl AsyncRead for SerialStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        use std::io::Read;

        loop {
            let mut guard = ready!(self.inner.poll_read_ready(cx))?;
            let unfilled = buf.initialize_unfilled();
            match guard.try_io(|inner| {
                let mut file = inner.get_ref();
                file.read(unfilled)
            }) {
                Ok(Ok(len)) => {
                    buf.advance(len);
                    return Poll::Ready(Ok(()));
                }
                Ok(Err(error)) => return Poll::Ready(Err(error)),
                Err(_would_block) => continue,
            }
        }
    }
}

#[cfg(unix)]
impl AsyncWrite for SerialStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        use std::io::Write;

        loop {
            let mut guard = ready!(self.inner.poll_write_ready(cx))?;
            match guard.try_io(|inner| {
                let mut file = inner.get_ref();
                file.write(buf)
            }) {
                Ok(result) => return Poll::Ready(result),
                Err(_would_block) => continue,
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Raw mode at the requested speed. Non-TTY files (FIFOs, pipes) are left alone.
#[cfg(unix)]
fn configure_tty(file: &std::fs::File, baud_rate: u32) -> io::Result<()> {
    use std::os::fd::AsRawFd;

    let fd = file.as_raw_fd();
    if unsafe { libc::isatty(fd) } != 1 {
        return Ok(());
    }

    let speed = baud_constant(baud_rate).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("unsupported baud rate: {baud_rate}"),
        )
    })?;

    let mut termios = std::mem::MaybeUninit::<libc::termios>::uninit();
    if unsafe { libc::tcgetattr(fd, termios.as_mut_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    let mut termios = unsafe { termios.assume_init() };

    unsafe {
        libc::cfmakeraw(&mut termios);
        libc::cfsetispeed(&mut termios, speed);
        libc::cfsetospeed(&mut termios, speed);
    }
    termios.c_cflag |= libc::CLOCAL | libc::CREAD;
    termios.c_cc[libc::VMIN] = 1;
    termios.c_cc[libc::VTIME] = 0;

    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &termios) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(unix)]
fn baud_constant(baud_rate: u32) -> Option<libc::speed_t> {
    match baud_rate {
        1200 => Some(libc::B1200),
        2400 => Some(libc::B2400),
        4800 => Some(libc::B4800),
        9600 => Some(libc::B9600),
        19200 => Some(libc::B19200),
        38400 => Some(libc::B38400),
        57600 => Some(libc::B57600),
        115_200 => Some(libc::B115200),
        230_400 => Some(libc::B230400),
        _ => None,
    }
}
