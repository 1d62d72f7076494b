use serde::Serialize;
use sigil_contracts::SIGIL_BOOTSTRAP_REPORT_SCHEMA_VERSION;
use sigil_platform::{PlatformId, ThreadingRuntime};

use crate::sockets::SocketStatus;
use crate::std_handles::StdHandleSource;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BootstrapStep {
    Charset,
    ThreadingRuntime,
    Sockets,
    ExitDelay,
    Estream,
    StdHandles,
    Outfnc,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StdHandlesReport {
    pub stdin: StdHandleSource,
    pub stdout: StdHandleSource,
    pub stderr: StdHandleSource,
}

#[derive(Clone, Debug, Serialize)]
pub struct BootstrapReport {
    pub schema_version: &'static str,
    pub platform: PlatformId,
    pub threading: ThreadingRuntime,
    pub charset: String,
    pub charset_detected: bool,
    pub sockets: SocketStatus,
    pub std_handles: StdHandlesReport,
    pub consumed_args: usize,
    pub exit_actions: Vec<&'static str>,
    pub steps: Vec<BootstrapStep>,
    pub notes: Vec<String>,
}

impl BootstrapReport {
    pub fn new(platform: PlatformId, threading: ThreadingRuntime) -> Self {
        BootstrapReport {
            schema_version: SIGIL_BOOTSTRAP_REPORT_SCHEMA_VERSION,
            platform,
            threading,
            charset: String::new(),
            charset_detected: false,
            sockets: SocketStatus::NotRequired,
            std_handles: StdHandlesReport::default(),
            consumed_args: 0,
            exit_actions: Vec::new(),
            steps: Vec::new(),
            notes: Vec::new(),
        }
    }
}
