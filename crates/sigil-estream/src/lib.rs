//! Buffered standard streams with a replaceable standard-handle table.
//!
//! All text output after bootstrap goes through an [`Estream`]. The handle backing
//! each standard stream can be swapped with [`Estream::set_std_handle`] before (or
//! after) the stream is first used; the stream is opened lazily from whatever
//! handle is installed at that moment.
//!
//! Write and flush operations report an integer status in the stdio tradition:
//! `0` on success and [`EOF`] on failure.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead as _, BufReader, BufWriter, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

/// Status returned by write and flush operations on failure.
pub const EOF: i32 = -1;

const STDOUT_BUFFER_BYTES: usize = 8 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StdStream {
    Stdin,
    Stdout,
    Stderr,
}

impl StdStream {
    pub const ALL: [StdStream; 3] = [StdStream::Stdin, StdStream::Stdout, StdStream::Stderr];

    pub fn index(self) -> usize {
        match self {
            StdStream::Stdin => 0,
            StdStream::Stdout => 1,
            StdStream::Stderr => 2,
        }
    }

    /// True for the streams the process writes to.
    pub fn is_output(self) -> bool {
        !matches!(self, StdStream::Stdin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StdStream::Stdin => "stdin",
            StdStream::Stdout => "stdout",
            StdStream::Stderr => "stderr",
        }
    }
}

impl fmt::Display for StdStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a standard stream is bound to.
pub enum StdHandle {
    /// The descriptor the process was started with.
    Inherit,
    /// No device at all; every operation on the stream fails.
    Invalid,
    File(File),
    Writer(Box<dyn Write + Send>),
    Reader(Box<dyn Read + Send>),
}

impl StdHandle {
    pub fn kind(&self) -> &'static str {
        match self {
            StdHandle::Inherit => "inherit",
            StdHandle::Invalid => "invalid",
            StdHandle::File(_) => "file",
            StdHandle::Writer(_) => "writer",
            StdHandle::Reader(_) => "reader",
        }
    }
}

impl fmt::Debug for StdHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StdHandle::File(file) => f.debug_tuple("File").field(file).finish(),
            other => f.write_str(other.kind()),
        }
    }
}

fn no_device(which: StdStream) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotConnected,
        format!("{which} is not bound to a device"),
    )
}

fn wrong_direction(which: StdStream) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("{which} handle does not support this direction"),
    )
}

struct Sink {
    which: StdStream,
    handle: StdHandle,
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.handle {
            StdHandle::Inherit => match self.which {
                StdStream::Stderr => io::stderr().write(buf),
                _ => io::stdout().write(buf),
            },
            StdHandle::Invalid => Err(no_device(self.which)),
            StdHandle::File(f) => f.write(buf),
            StdHandle::Writer(w) => w.write(buf),
            StdHandle::Reader(_) => Err(wrong_direction(self.which)),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.handle {
            StdHandle::Inherit => match self.which {
                StdStream::Stderr => io::stderr().flush(),
                _ => io::stdout().flush(),
            },
            StdHandle::Invalid => Err(no_device(self.which)),
            StdHandle::File(f) => f.flush(),
            StdHandle::Writer(w) => w.flush(),
            StdHandle::Reader(_) => Err(wrong_direction(self.which)),
        }
    }
}

struct Source {
    handle: StdHandle,
}

impl Read for Source {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.handle {
            StdHandle::Inherit => io::stdin().read(buf),
            StdHandle::Invalid => Err(no_device(StdStream::Stdin)),
            StdHandle::File(f) => f.read(buf),
            StdHandle::Reader(r) => r.read(buf),
            StdHandle::Writer(_) => Err(wrong_direction(StdStream::Stdin)),
        }
    }
}

#[derive(Default)]
struct State {
    pending: [Option<StdHandle>; 3],
    stdin: Option<BufReader<Source>>,
    stdout: Option<BufWriter<Sink>>,
    stderr: Option<BufWriter<Sink>>,
}

impl State {
    fn output(&mut self, which: StdStream) -> Option<&mut BufWriter<Sink>> {
        // stderr is unbuffered: a zero capacity writer passes every write through.
        let (slot, capacity) = match which {
            StdStream::Stdin => return None,
            StdStream::Stdout => (&mut self.stdout, STDOUT_BUFFER_BYTES),
            StdStream::Stderr => (&mut self.stderr, 0),
        };
        let pending = &mut self.pending[which.index()];
        Some(slot.get_or_insert_with(|| {
            let handle = pending.take().unwrap_or(StdHandle::Inherit);
            BufWriter::with_capacity(capacity, Sink { which, handle })
        }))
    }

    fn input(&mut self) -> &mut BufReader<Source> {
        let pending = &mut self.pending[StdStream::Stdin.index()];
        self.stdin.get_or_insert_with(|| {
            let handle = pending.take().unwrap_or(StdHandle::Inherit);
            BufReader::new(Source { handle })
        })
    }
}

/// Process-wide stream context. Clones share the same streams.
#[derive(Clone)]
pub struct Estream {
    state: Arc<Mutex<State>>,
}

impl fmt::Debug for Estream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Estream").finish_non_exhaustive()
    }
}

impl Estream {
    /// Set up the stream context. No stream is opened until it is first used.
    pub fn init() -> Self {
        Estream {
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Bind `which` to `handle`. A stream that is already open is flushed and
    /// closed; the next operation reopens it on the new handle.
    pub fn set_std_handle(&self, which: StdStream, handle: StdHandle) {
        let mut st = self.lock();
        match which {
            StdStream::Stdin => st.stdin = None,
            StdStream::Stdout => {
                if let Some(mut w) = st.stdout.take() {
                    let _ = w.flush();
                }
            }
            StdStream::Stderr => {
                if let Some(mut w) = st.stderr.take() {
                    let _ = w.flush();
                }
            }
        }
        st.pending[which.index()] = Some(handle);
    }

    pub fn fwrite(&self, which: StdStream, data: &[u8]) -> i32 {
        let mut st = self.lock();
        let Some(w) = st.output(which) else {
            return EOF;
        };
        match w.write_all(data) {
            Ok(()) => 0,
            Err(_) => EOF,
        }
    }

    pub fn fputs(&self, which: StdStream, s: &str) -> i32 {
        self.fwrite(which, s.as_bytes())
    }

    /// Flush `which`. Flushing stdin drops any buffered input.
    pub fn fflush(&self, which: StdStream) -> i32 {
        let mut st = self.lock();
        if which == StdStream::Stdin {
            if let Some(r) = st.stdin.as_mut() {
                let n = r.buffer().len();
                r.consume(n);
            }
            return 0;
        }
        let Some(w) = st.output(which) else {
            return EOF;
        };
        match w.flush() {
            Ok(()) => 0,
            Err(_) => EOF,
        }
    }

    /// Flush every output stream that has been opened.
    pub fn flush_all(&self) -> i32 {
        let mut guard = self.lock();
        let st = &mut *guard;
        let mut status = 0;
        for w in [st.stdout.as_mut(), st.stderr.as_mut()].into_iter().flatten() {
            if w.flush().is_err() {
                status = EOF;
            }
        }
        status
    }

    pub fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut st = self.lock();
        st.input().read(buf)
    }

    /// An `io::Write` adapter over one of the output streams.
    pub fn writer(&self, which: StdStream) -> StreamWriter {
        StreamWriter {
            es: self.clone(),
            which,
        }
    }
}

pub struct StreamWriter {
    es: Estream,
    which: StdStream,
}

impl Write for StreamWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut st = self.es.lock();
        match st.output(self.which) {
            Some(w) => w.write(buf),
            None => Err(wrong_direction(self.which)),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut st = self.es.lock();
        match st.output(self.which) {
            Some(w) => w.flush(),
            None => Err(wrong_direction(self.which)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        fn contents(&self) -> Vec<u8> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn stdin_from(bytes: &'static [u8]) -> Estream {
        let es = Estream::init();
        es.set_std_handle(StdStream::Stdin, StdHandle::Reader(Box::new(bytes)));
        es
    }

    #[test]
    fn stdout_is_buffered_until_flush() {
        let es = Estream::init();
        let cap = Capture::default();
        es.set_std_handle(StdStream::Stdout, StdHandle::Writer(Box::new(cap.clone())));

        assert_eq!(es.fputs(StdStream::Stdout, "hello\n"), 0);
        assert!(cap.contents().is_empty());
        assert_eq!(es.fflush(StdStream::Stdout), 0);
        assert_eq!(cap.contents(), b"hello\n");
    }

    #[test]
    fn stderr_writes_through() {
        let es = Estream::init();
        let cap = Capture::default();
        es.set_std_handle(StdStream::Stderr, StdHandle::Writer(Box::new(cap.clone())));

        assert_eq!(es.fputs(StdStream::Stderr, "oops"), 0);
        assert_eq!(cap.contents(), b"oops");
    }

    #[test]
    fn invalid_handle_fails_at_point_of_use() {
        let es = Estream::init();
        es.set_std_handle(StdStream::Stderr, StdHandle::Invalid);
        assert_eq!(es.fputs(StdStream::Stderr, "lost"), EOF);

        es.set_std_handle(StdStream::Stdout, StdHandle::Invalid);
        // Buffered: the failure shows up on flush.
        assert_eq!(es.fputs(StdStream::Stdout, "lost"), 0);
        assert_eq!(es.fflush(StdStream::Stdout), EOF);

        es.set_std_handle(StdStream::Stdin, StdHandle::Invalid);
        let mut buf = [0u8; 4];
        assert!(es.read(&mut buf).is_err());
    }

    #[test]
    fn writing_to_stdin_is_an_error() {
        let es = Estream::init();
        assert_eq!(es.fputs(StdStream::Stdin, "x"), EOF);
        assert!(es.writer(StdStream::Stdin).write(b"x").is_err());
    }

    #[test]
    fn replacing_an_open_stream_flushes_the_old_handle() {
        let es = Estream::init();
        let first = Capture::default();
        let second = Capture::default();
        es.set_std_handle(StdStream::Stdout, StdHandle::Writer(Box::new(first.clone())));
        assert_eq!(es.fputs(StdStream::Stdout, "one"), 0);

        es.set_std_handle(StdStream::Stdout, StdHandle::Writer(Box::new(second.clone())));
        assert_eq!(es.fputs(StdStream::Stdout, "two"), 0);
        assert_eq!(es.flush_all(), 0);

        assert_eq!(first.contents(), b"one");
        assert_eq!(second.contents(), b"two");
    }

    #[test]
    fn flushing_stdin_drops_buffered_input() {
        let es = stdin_from(b"abcdef");
        let mut buf = [0u8; 3];
        assert_eq!(es.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"abc");

        assert_eq!(es.fflush(StdStream::Stdin), 0);
        assert_eq!(es.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn std_stream_indices() {
        for (i, s) in StdStream::ALL.into_iter().enumerate() {
            assert_eq!(s.index(), i);
        }
        assert!(!StdStream::Stdin.is_output());
        assert!(StdStream::Stdout.is_output());
        assert!(StdStream::Stderr.is_output());
    }
}
