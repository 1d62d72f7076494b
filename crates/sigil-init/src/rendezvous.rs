//! Host rendezvous handshake over Unix domain sockets.
//!
//! The counterpart process listens on `<dir>/<rvid>`; this process connects and
//! keeps the direction it needs. Connecting retries with backoff while the
//! counterpart is not listening yet, up to a fixed bound.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use sigil_contracts::{DEFAULT_RVID_DIR_NAME, DEFAULT_RVID_TIMEOUT_MS};

use crate::std_handles::PipeResolver;

const INITIAL_BACKOFF: Duration = Duration::from_millis(10);
const MAX_BACKOFF: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendezvousConfig {
    pub dir: PathBuf,
    pub timeout: Duration,
}

impl Default for RendezvousConfig {
    fn default() -> Self {
        RendezvousConfig {
            dir: std::env::temp_dir().join(DEFAULT_RVID_DIR_NAME),
            timeout: Duration::from_millis(DEFAULT_RVID_TIMEOUT_MS),
        }
    }
}

impl RendezvousConfig {
    pub fn endpoint(&self, rvid: u32) -> PathBuf {
        endpoint_in(&self.dir, rvid)
    }
}

fn endpoint_in(dir: &Path, rvid: u32) -> PathBuf {
    dir.join(rvid.to_string())
}

impl PipeResolver for RendezvousConfig {
    fn finish_pipe(&mut self, rvid: u32, for_write: bool) -> io::Result<File> {
        finish_pipe(self, rvid, for_write)
    }
}

fn is_not_ready(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused
    )
}

/// Run `attempt` until it succeeds, fails for good, or `timeout` expires.
fn retry_until<T>(
    timeout: Duration,
    what: &str,
    mut attempt: impl FnMut() -> io::Result<T>,
    mut is_retryable: impl FnMut(&io::Error) -> bool,
) -> io::Result<T> {
    let deadline = Instant::now() + timeout;
    let mut backoff = INITIAL_BACKOFF;
    loop {
        match attempt() {
            Ok(v) => return Ok(v),
            Err(err) if is_retryable(&err) => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("{what} not ready after {} ms: {err}", timeout.as_millis()),
                    ));
                }
                std::thread::sleep(backoff.min(deadline - now));
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(unix)]
pub fn finish_pipe(cfg: &RendezvousConfig, rvid: u32, for_write: bool) -> io::Result<File> {
    use std::net::Shutdown;
    use std::os::fd::OwnedFd;
    use std::os::unix::net::UnixStream;

    let path = cfg.endpoint(rvid);
    let what = format!("rendezvous {}", path.display());
    let stream = retry_until(cfg.timeout, &what, || UnixStream::connect(&path), is_not_ready)?;

    let unused = if for_write {
        Shutdown::Read
    } else {
        Shutdown::Write
    };
    let _ = stream.shutdown(unused);
    Ok(File::from(OwnedFd::from(stream)))
}

#[cfg(not(unix))]
pub fn finish_pipe(_cfg: &RendezvousConfig, rvid: u32, _for_write: bool) -> io::Result<File> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("rendezvous {rvid}: no rendezvous transport on this host"),
    ))
}

/// The counterpart side: a listening endpoint for one rendezvous id.
///
/// The endpoint file is removed on drop.
#[cfg(unix)]
#[derive(Debug)]
pub struct RendezvousListener {
    listener: std::os::unix::net::UnixListener,
    path: PathBuf,
    rvid: u32,
}

#[cfg(unix)]
impl RendezvousListener {
    pub fn bind(dir: &Path, rvid: u32) -> io::Result<Self> {
        use std::os::unix::fs::DirBuilderExt as _;

        std::fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(dir)?;
        let path = endpoint_in(dir, rvid);
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }
        let listener = std::os::unix::net::UnixListener::bind(&path)?;
        Ok(RendezvousListener {
            listener,
            path,
            rvid,
        })
    }

    pub fn rvid(&self) -> u32 {
        self.rvid
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait up to `timeout` for the other process to connect.
    pub fn accept(&self, timeout: Duration) -> io::Result<std::os::unix::net::UnixStream> {
        self.listener.set_nonblocking(true)?;
        let what = format!("peer on {}", self.path.display());
        let res = retry_until(
            timeout,
            &what,
            || self.listener.accept().map(|(stream, _)| stream),
            |err| err.kind() == io::ErrorKind::WouldBlock,
        );
        self.listener.set_nonblocking(false)?;
        let stream = res?;
        stream.set_nonblocking(false)?;
        log::debug!("rendezvous {}: peer connected", self.rvid);
        Ok(stream)
    }
}

#[cfg(unix)]
impl Drop for RendezvousListener {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
