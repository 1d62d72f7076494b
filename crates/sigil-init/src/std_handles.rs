//! Standard streams handed over as rendezvous ids on the command line.
//!
//! Where a parent cannot pass pipe handles to its child, it creates the pipes
//! itself and passes one rendezvous id per standard stream as the leading
//! arguments:
//!
//! ```text
//! -&S0=<rvid> -&S1=<rvid> -&S2=<rvid>
//! ```
//!
//! Each option is optional, but the ones present must come first. Scanning stops
//! at the first argument that is not a well-formed option. `null` instead of an
//! id binds the stream to no device, and so does an id too large to name a
//! rendezvous.

use std::ffi::OsString;
use std::fmt;
use std::fs::File;
use std::io;

use serde::Serialize;
use sigil_contracts::{STD_HANDLE_NULL_VALUE, STD_HANDLE_OPTION_PREFIX};
use sigil_estream::{Estream, StdHandle, StdStream};

/// Completes the counterpart's half of a rendezvous.
pub trait PipeResolver {
    /// Finish the pipe identified by `rvid`. `for_write` selects the end this
    /// process writes to (stdout, stderr) rather than reads from (stdin).
    fn finish_pipe(&mut self, rvid: u32, for_write: bool) -> io::Result<File>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RendezvousValue {
    Id(u32),
    Null,
    /// Digits that do not fit a rendezvous id.
    OutOfRange(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StdHandleOption {
    pub stream: StdStream,
    pub value: RendezvousValue,
}

impl fmt::Display for StdHandleOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{STD_HANDLE_OPTION_PREFIX}{}=", self.stream.index())?;
        match &self.value {
            RendezvousValue::Id(rvid) => write!(f, "{rvid}"),
            RendezvousValue::Null => f.write_str(STD_HANDLE_NULL_VALUE),
            RendezvousValue::OutOfRange(digits) => f.write_str(digits),
        }
    }
}

/// Parse one `-&S<0|1|2>=<digits|null>` argument.
pub fn parse_std_handle_option(arg: &str) -> Option<StdHandleOption> {
    let rest = arg.strip_prefix(STD_HANDLE_OPTION_PREFIX)?;
    let (selector, value) = rest.split_once('=')?;
    let stream = match selector {
        "0" => StdStream::Stdin,
        "1" => StdStream::Stdout,
        "2" => StdStream::Stderr,
        _ => return None,
    };
    let value = if value == STD_HANDLE_NULL_VALUE {
        RendezvousValue::Null
    } else if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        match value.parse() {
            Ok(rvid) => RendezvousValue::Id(rvid),
            Err(_) => RendezvousValue::OutOfRange(value.to_string()),
        }
    } else {
        return None;
    };
    Some(StdHandleOption { stream, value })
}

/// The leading run of standard-handle options after the program name.
pub fn scan_std_handle_options(args: &[OsString]) -> Vec<StdHandleOption> {
    args.iter()
        .skip(1)
        .map_while(|arg| arg.to_str().and_then(parse_std_handle_option))
        .collect()
}

/// Where a standard stream ended up after rewriting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StdHandleSource {
    #[default]
    Inherit,
    Null,
    Rendezvous {
        rvid: u32,
    },
    /// The handshake failed; the stream is bound to no device.
    Failed {
        rvid: u32,
    },
    /// The id did not fit; the stream is bound to no device.
    OutOfRange,
}

#[derive(Debug, Default)]
pub struct RewriteOutcome {
    pub consumed: usize,
    pub sources: [StdHandleSource; 3],
    pub notes: Vec<String>,
}

impl RewriteOutcome {
    pub fn source(&self, which: StdStream) -> StdHandleSource {
        self.sources[which.index()]
    }
}

/// Install the handles named by the leading standard-handle options and remove
/// those options from `args`.
///
/// Handles are installed as each option is seen, so a stream named twice keeps
/// the later handle. When nothing is consumed `args` is left untouched.
pub fn rewrite_std_handles(
    args: &mut Vec<OsString>,
    estream: &Estream,
    resolver: &mut dyn PipeResolver,
) -> RewriteOutcome {
    let mut outcome = RewriteOutcome::default();

    for opt in scan_std_handle_options(args) {
        let (handle, source) = match opt.value {
            RendezvousValue::Null => (StdHandle::Invalid, StdHandleSource::Null),
            RendezvousValue::Id(rvid) => match resolver.finish_pipe(rvid, opt.stream.is_output()) {
                Ok(file) => (StdHandle::File(file), StdHandleSource::Rendezvous { rvid }),
                Err(err) => {
                    outcome
                        .notes
                        .push(format!("{}: rendezvous {rvid} failed: {err}", opt.stream));
                    (StdHandle::Invalid, StdHandleSource::Failed { rvid })
                }
            },
            RendezvousValue::OutOfRange(digits) => {
                outcome
                    .notes
                    .push(format!("{}: rendezvous id {digits} is out of range", opt.stream));
                (StdHandle::Invalid, StdHandleSource::OutOfRange)
            }
        };
        estream.set_std_handle(opt.stream, handle);
        outcome.sources[opt.stream.index()] = source;
        outcome.consumed += 1;
    }

    if outcome.consumed > 0 {
        args.drain(1..1 + outcome.consumed);
    }
    outcome
}
