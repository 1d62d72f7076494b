//! Shared, version-pinned identifiers.
//!
//! These constants are the single source of truth for schema/version strings that
//! appear in machine-readable output, for the synthetic startup options and for the
//! environment variables read during bootstrap.

pub const SIGIL_BOOTSTRAP_REPORT_SCHEMA_VERSION: &str = "sigil.bootstrap.report@0.1.0";
pub const SIGIL_PLATFORM_CAPS_SCHEMA_VERSION: &str = "sigil.platform.caps@0.1.0";

/// Prefix of the synthetic standard-handle options: `-&S<n>=<rvid>`.
pub const STD_HANDLE_OPTION_PREFIX: &str = "-&S";
/// Value of a standard-handle option that binds the stream to no device.
pub const STD_HANDLE_NULL_VALUE: &str = "null";

pub const ENV_PLATFORM: &str = "SIGIL_PLATFORM";
pub const ENV_THREADING: &str = "SIGIL_THREADING";
pub const ENV_CHARSET: &str = "SIGIL_CHARSET";
pub const ENV_RVID_DIR: &str = "SIGIL_RVID_DIR";
pub const ENV_RVID_TIMEOUT_MS: &str = "SIGIL_RVID_TIMEOUT_MS";
pub const ENV_EXIT_DELAY_MS: &str = "SIGIL_EXIT_DELAY_MS";
pub const ENV_LOG: &str = "SIGIL_LOG";

pub const DEFAULT_CHARSET: &str = "iso-8859-1";
pub const DEFAULT_RVID_DIR_NAME: &str = "sigil-rvid";
pub const DEFAULT_RVID_TIMEOUT_MS: u64 = 5_000;
/// Some remote shells drop output written right before process exit; waiting a
/// little after the final flush avoids that.
pub const DEFAULT_EXIT_DELAY_MS: u64 = 400;
pub const DEFAULT_LOG_FILTER: &str = "warn";

pub const EXIT_ACTION_ESTREAM_FLUSH: &str = "estream-flush";
pub const EXIT_ACTION_EXIT_DELAY: &str = "exit-delay";
