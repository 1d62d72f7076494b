//! Output hook for help, version and usage text.
//!
//! The argument parser never writes to a file descriptor itself; it hands text to
//! a registered output function. Bootstrap registers one that writes through the
//! estream layer so this text follows any redirected standard handle.

use std::io::Write as _;

use sigil_estream::{Estream, StdStream, EOF};

/// `mode` selects stdout (1) or stderr (2). `Some(text)` writes, `None` flushes.
pub type OutFn = Box<dyn Fn(i32, Option<&str>) -> i32 + Send + Sync>;

/// Write `text` to the estream stream selected by `mode`, or flush it when
/// `text` is `None`. Any other mode is rejected with a negative status.
pub fn write_via_estream(es: &Estream, mode: i32, text: Option<&str>) -> i32 {
    let which = match mode {
        1 => StdStream::Stdout,
        2 => StdStream::Stderr,
        _ => return -1,
    };
    match text {
        Some(s) => es.fputs(which, s),
        None => es.fflush(which),
    }
}

pub fn estream_outfnc(es: Estream) -> OutFn {
    Box::new(move |mode, text| write_via_estream(&es, mode, text))
}

#[derive(Default)]
pub struct ArgParseHooks {
    outfnc: Option<OutFn>,
}

impl ArgParseHooks {
    pub fn register_outfnc(&mut self, f: OutFn) {
        self.outfnc = Some(f);
    }

    pub fn has_outfnc(&self) -> bool {
        self.outfnc.is_some()
    }

    pub fn emit(&self, mode: i32, text: Option<&str>) -> i32 {
        match &self.outfnc {
            Some(f) => f(mode, text),
            None => write_direct(mode, text),
        }
    }

    /// Print a clap help/version/usage message through the output function and
    /// return the exit code clap asks for.
    #[cfg(feature = "clap")]
    pub fn emit_clap_error(&self, err: &clap::Error) -> i32 {
        let mode = if err.use_stderr() { 2 } else { 1 };
        log::debug!("argument parser exit: {:?}", err.kind());
        let text = err.render().to_string();
        let _ = self.emit(mode, Some(&text));
        let _ = self.emit(mode, None);
        err.exit_code()
    }
}

impl std::fmt::Debug for ArgParseHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArgParseHooks")
            .field("outfnc", &self.outfnc.is_some())
            .finish()
    }
}

fn write_direct(mode: i32, text: Option<&str>) -> i32 {
    let res = match (mode, text) {
        (1, Some(s)) => std::io::stdout().write_all(s.as_bytes()),
        (1, None) => std::io::stdout().flush(),
        (2, Some(s)) => std::io::stderr().write_all(s.as_bytes()),
        (2, None) => std::io::stderr().flush(),
        _ => return -1,
    };
    if res.is_ok() {
        0
    } else {
        EOF
    }
}
