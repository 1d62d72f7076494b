//! Platform profile registry.
//!
//! Bootstrap decisions (socket startup, standard-handle rewriting, exit delay) are
//! keyed off a `PlatformId` rather than scattered `cfg` checks, so that every
//! profile can be selected and exercised on any host.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlatformId {
    #[default]
    Posix,
    W32,
    W32ce,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct PlatformCaps {
    /// The socket library must be started explicitly before first use.
    pub needs_socket_startup: bool,
    /// Child processes cannot inherit pipe handles; standard streams arrive as
    /// rendezvous ids on the command line instead.
    pub rewrites_std_handles: bool,
    /// Output written right before exit may be lost unless exit is delayed.
    pub delays_exit: bool,
}

impl PlatformId {
    pub const ALL: [PlatformId; 3] = [PlatformId::Posix, PlatformId::W32, PlatformId::W32ce];

    pub fn host() -> Self {
        if cfg!(windows) {
            PlatformId::W32
        } else {
            PlatformId::Posix
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlatformId::Posix => "posix",
            PlatformId::W32 => "w32",
            PlatformId::W32ce => "w32ce",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "posix" | "unix" => Some(PlatformId::Posix),
            "w32" | "windows" => Some(PlatformId::W32),
            "w32ce" | "windows-ce" => Some(PlatformId::W32ce),
            _ => None,
        }
    }

    pub fn caps(self) -> PlatformCaps {
        match self {
            PlatformId::Posix => PlatformCaps {
                needs_socket_startup: false,
                rewrites_std_handles: false,
                delays_exit: false,
            },
            PlatformId::W32 => PlatformCaps {
                needs_socket_startup: true,
                rewrites_std_handles: false,
                delays_exit: false,
            },
            PlatformId::W32ce => PlatformCaps {
                needs_socket_startup: true,
                rewrites_std_handles: true,
                delays_exit: true,
            },
        }
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct PlatformParseError {
    value: String,
}

impl fmt::Display for PlatformParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid platform {:?} (expected one of: posix, w32, w32ce)",
            self.value
        )
    }
}

impl std::error::Error for PlatformParseError {}

impl FromStr for PlatformId {
    type Err = PlatformParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        PlatformId::parse(&lowered).ok_or(PlatformParseError { value: lowered })
    }
}

#[cfg(feature = "clap")]
impl clap::ValueEnum for PlatformId {
    fn value_variants<'a>() -> &'a [Self] {
        &PlatformId::ALL
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        match self {
            PlatformId::Posix => Some(clap::builder::PossibleValue::new("posix").alias("unix")),
            PlatformId::W32 => Some(clap::builder::PossibleValue::new("w32").alias("windows")),
            PlatformId::W32ce => {
                Some(clap::builder::PossibleValue::new("w32ce").alias("windows-ce"))
            }
        }
    }
}

/// Threading runtime the program links against.
///
/// A cooperative runtime starts the socket library as part of its own
/// initialization, so bootstrap must not do it a second time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThreadingRuntime {
    #[default]
    None,
    Cooperative,
}

impl ThreadingRuntime {
    pub fn as_str(self) -> &'static str {
        match self {
            ThreadingRuntime::None => "none",
            ThreadingRuntime::Cooperative => "cooperative",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "none" => Some(ThreadingRuntime::None),
            "cooperative" | "pth" => Some(ThreadingRuntime::Cooperative),
            _ => None,
        }
    }
}

impl fmt::Display for ThreadingRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_parse() {
        for p in PlatformId::ALL {
            assert_eq!(PlatformId::parse(p.as_str()), Some(p));
        }
        assert_eq!(PlatformId::parse("windows-ce"), Some(PlatformId::W32ce));
        assert_eq!(PlatformId::parse("amiga"), None);
    }

    #[test]
    fn from_str_is_case_insensitive() {
        assert_eq!(PlatformId::from_str(" W32CE ").unwrap(), PlatformId::W32ce);
        let err = PlatformId::from_str("beos").unwrap_err();
        assert!(err.to_string().contains("expected one of"));
    }

    #[test]
    fn only_w32ce_rewrites_std_handles() {
        for p in PlatformId::ALL {
            let caps = p.caps();
            assert_eq!(caps.rewrites_std_handles, p == PlatformId::W32ce);
            // Rewriting implies the exit delay and the socket startup.
            if caps.rewrites_std_handles {
                assert!(caps.delays_exit);
                assert!(caps.needs_socket_startup);
            }
        }
    }

    #[test]
    fn posix_needs_nothing() {
        assert_eq!(PlatformId::Posix.caps(), PlatformCaps::default());
    }

    #[test]
    fn threading_runtime_parse() {
        assert_eq!(ThreadingRuntime::parse("none"), Some(ThreadingRuntime::None));
        assert_eq!(
            ThreadingRuntime::parse("pth"),
            Some(ThreadingRuntime::Cooperative)
        );
        assert_eq!(ThreadingRuntime::parse("green"), None);
    }
}
