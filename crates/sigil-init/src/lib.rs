//! Process bootstrap: bring platform subsystems into a known state before
//! `main` parses arguments, logs, or does any I/O.
//!
//! Call [`init_common_subsystems`] as the first statement of `main` with the raw
//! argument vector. On platforms that pass standard streams as rendezvous ids
//! the leading `-&S<n>=<rvid>` options are consumed and removed, so the argument
//! parser only ever sees the program's own arguments.
//!
//! Nothing here fails: problems are recorded in the [`BootstrapReport`] and
//! surface when the affected facility is first used.
//!
//! CAUTION: this may run with elevated privileges. Besides the argument vector it
//! reads the locale variables for charset detection, `TMPDIR` for the default
//! rendezvous directory and, for unprivileged processes only, `SIGIL_*`
//! variables.

use std::ffi::OsString;

use sigil_contracts::{DEFAULT_CHARSET, EXIT_ACTION_ESTREAM_FLUSH, EXIT_ACTION_EXIT_DELAY};
use sigil_estream::Estream;
use sigil_platform::ThreadingRuntime;

pub mod charset;
pub mod config;
pub mod exit_actions;
pub mod outfnc;
pub mod rendezvous;
pub mod report;
pub mod sockets;
pub mod std_handles;
pub mod subsystems;

pub use config::BootstrapConfig;
pub use exit_actions::ExitActions;
pub use outfnc::{estream_outfnc, write_via_estream, ArgParseHooks, OutFn};
#[cfg(unix)]
pub use rendezvous::RendezvousListener;
pub use rendezvous::RendezvousConfig;
pub use report::{BootstrapReport, BootstrapStep, StdHandlesReport};
pub use sockets::SocketStatus;
pub use std_handles::{
    parse_std_handle_option, rewrite_std_handles, scan_std_handle_options, PipeResolver,
    RendezvousValue, RewriteOutcome, StdHandleOption, StdHandleSource,
};
pub use subsystems::{HostSubsystems, Subsystems};

/// Everything bootstrap set up, handed to the rest of the program.
#[derive(Debug)]
pub struct InitContext {
    estream: Estream,
    argparse: ArgParseHooks,
    report: BootstrapReport,
    exit_actions: ExitActions,
}

impl InitContext {
    pub fn estream(&self) -> &Estream {
        &self.estream
    }

    pub fn argparse(&self) -> &ArgParseHooks {
        &self.argparse
    }

    pub fn report(&self) -> &BootstrapReport {
        &self.report
    }

    /// Run the exit actions: flush the streams, then any exit delay. Dropping
    /// the context does the same.
    pub fn shutdown(mut self) {
        self.exit_actions.run();
    }
}

/// Bootstrap with host subsystems and configuration from the environment.
pub fn init_common_subsystems(args: &mut Vec<OsString>) -> InitContext {
    let (config, mut notes) = BootstrapConfig::from_env();
    let mut host = HostSubsystems::new(config.rendezvous.clone());
    let mut ctx = bootstrap(args, &config, &mut host);
    notes.append(&mut ctx.report.notes);
    ctx.report.notes = notes;
    ctx
}

/// Bring up the subsystems in their fixed order.
///
/// `args` is the full argument vector including the program name; leading
/// standard-handle options are removed from it on platforms that use them.
pub fn bootstrap(
    args: &mut Vec<OsString>,
    config: &BootstrapConfig,
    subsystems: &mut dyn Subsystems,
) -> InitContext {
    let caps = config.platform.caps();
    let mut report = BootstrapReport::new(config.platform, config.threading);

    let detected = subsystems.detect_native_charset(config.charset_hint.as_deref());
    report.charset_detected = detected.is_some();
    report.charset = detected.unwrap_or_else(|| DEFAULT_CHARSET.to_string());
    report.steps.push(BootstrapStep::Charset);

    if caps.needs_socket_startup {
        report.sockets = match config.threading {
            ThreadingRuntime::Cooperative => {
                report.steps.push(BootstrapStep::ThreadingRuntime);
                if let Err(err) = subsystems.init_threading_runtime() {
                    report
                        .notes
                        .push(format!("threading runtime init failed: {err}"));
                }
                SocketStatus::DeferredToThreadingRuntime
            }
            ThreadingRuntime::None => {
                report.steps.push(BootstrapStep::Sockets);
                match subsystems.startup_sockets() {
                    Ok(()) => SocketStatus::Started,
                    Err(err) => {
                        report.notes.push(format!("socket startup failed: {err}"));
                        SocketStatus::Failed
                    }
                }
            }
        };
    }

    // Registered before the stream library so it runs after the final flush.
    let mut exit_actions = ExitActions::new();
    if caps.delays_exit {
        let delay = config.exit_delay;
        exit_actions.register(EXIT_ACTION_EXIT_DELAY, move || std::thread::sleep(delay));
        report.steps.push(BootstrapStep::ExitDelay);
    }

    let estream = Estream::init();
    let flush_on_exit = estream.clone();
    exit_actions.register(EXIT_ACTION_ESTREAM_FLUSH, move || {
        let _ = flush_on_exit.flush_all();
    });
    report.steps.push(BootstrapStep::Estream);

    if caps.rewrites_std_handles {
        let outcome = rewrite_std_handles(args, &estream, subsystems.pipe_resolver());
        report.consumed_args = outcome.consumed;
        report.std_handles = StdHandlesReport {
            stdin: outcome.sources[0],
            stdout: outcome.sources[1],
            stderr: outcome.sources[2],
        };
        report.notes.extend(outcome.notes);
        report.steps.push(BootstrapStep::StdHandles);
    }

    let mut argparse = ArgParseHooks::default();
    argparse.register_outfnc(estream_outfnc(estream.clone()));
    report.steps.push(BootstrapStep::Outfnc);

    report.exit_actions = exit_actions.names_in_run_order();

    InitContext {
        estream,
        argparse,
        report,
        exit_actions,
    }
}
