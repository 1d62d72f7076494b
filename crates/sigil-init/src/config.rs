use std::time::Duration;

use sigil_contracts::{
    DEFAULT_EXIT_DELAY_MS, ENV_CHARSET, ENV_EXIT_DELAY_MS, ENV_PLATFORM, ENV_RVID_DIR,
    ENV_RVID_TIMEOUT_MS, ENV_THREADING,
};
use sigil_platform::{PlatformId, ThreadingRuntime};

use crate::rendezvous::RendezvousConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapConfig {
    pub platform: PlatformId,
    pub threading: ThreadingRuntime,
    pub charset_hint: Option<String>,
    pub rendezvous: RendezvousConfig,
    pub exit_delay: Duration,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        BootstrapConfig {
            platform: PlatformId::host(),
            threading: ThreadingRuntime::None,
            charset_hint: None,
            rendezvous: RendezvousConfig::default(),
            exit_delay: Duration::from_millis(DEFAULT_EXIT_DELAY_MS),
        }
    }
}

impl BootstrapConfig {
    /// Defaults overridden by `SIGIL_*` variables. Returns notes about values
    /// that were ignored.
    pub fn from_env() -> (Self, Vec<String>) {
        Self::from_lookup(|name| std::env::var(name).ok(), running_privileged())
    }

    /// A privileged process does not trust its environment: every override is
    /// ignored.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        privileged: bool,
    ) -> (Self, Vec<String>) {
        let mut cfg = BootstrapConfig::default();
        let mut notes = Vec::new();

        if privileged {
            notes.push("running privileged; SIGIL_* environment ignored".to_string());
            return (cfg, notes);
        }

        if let Some(raw) = lookup(ENV_PLATFORM) {
            match raw.parse::<PlatformId>() {
                Ok(p) => cfg.platform = p,
                Err(err) => notes.push(format!("ignoring {ENV_PLATFORM}: {err}")),
            }
        }
        if let Some(raw) = lookup(ENV_THREADING) {
            match ThreadingRuntime::parse(&raw) {
                Some(t) => cfg.threading = t,
                None => notes.push(format!(
                    "ignoring {ENV_THREADING}={raw:?} (expected one of: none, cooperative)"
                )),
            }
        }
        if let Some(raw) = lookup(ENV_CHARSET) {
            if !raw.trim().is_empty() {
                cfg.charset_hint = Some(raw.trim().to_string());
            }
        }
        if let Some(raw) = lookup(ENV_RVID_DIR) {
            if !raw.is_empty() {
                cfg.rendezvous.dir = raw.into();
            }
        }
        if let Some(ms) = read_ms(&lookup, ENV_RVID_TIMEOUT_MS, &mut notes) {
            cfg.rendezvous.timeout = ms;
        }
        if let Some(ms) = read_ms(&lookup, ENV_EXIT_DELAY_MS, &mut notes) {
            cfg.exit_delay = ms;
        }

        (cfg, notes)
    }
}

fn read_ms(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    notes: &mut Vec<String>,
) -> Option<Duration> {
    let raw = lookup(name)?;
    match raw.trim().parse::<u64>() {
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(_) => {
            notes.push(format!("ignoring {name}={raw:?} (expected milliseconds)"));
            None
        }
    }
}

/// True when the real and effective user or group ids differ.
#[cfg(unix)]
pub fn running_privileged() -> bool {
    unsafe { libc::getuid() != libc::geteuid() || libc::getgid() != libc::getegid() }
}

#[cfg(not(unix))]
pub fn running_privileged() -> bool {
    false
}
