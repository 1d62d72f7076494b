use std::process::{Command, Output};

use serde_json::Value;
use sigil_contracts::{SIGIL_BOOTSTRAP_REPORT_SCHEMA_VERSION, SIGIL_PLATFORM_CAPS_SCHEMA_VERSION};

fn sigil(platform: &str, args: &[&str]) -> Output {
    let exe = env!("CARGO_BIN_EXE_sigil");
    Command::new(exe)
        .args(args)
        .env("SIGIL_PLATFORM", platform)
        .env("SIGIL_EXIT_DELAY_MS", "0")
        .env_remove("SIGIL_THREADING")
        .env_remove("SIGIL_LOG")
        .output()
        .expect("run sigil")
}

fn parse_json_stdout(out: &Output) -> Value {
    serde_json::from_slice(&out.stdout).expect("parse stdout JSON")
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

#[test]
fn report_on_posix_consumes_nothing() {
    let out = sigil("posix", &["report"]);
    assert_eq!(out.status.code(), Some(0), "stderr:\n{}", stderr(&out));
    let v = parse_json_stdout(&out);
    assert_eq!(v["schema_version"], SIGIL_BOOTSTRAP_REPORT_SCHEMA_VERSION);
    assert_eq!(v["platform"], "posix");
    assert_eq!(v["consumed_args"], 0);
    assert_eq!(v["sockets"], "not-required");
    for s in ["stdin", "stdout", "stderr"] {
        assert_eq!(v["std_handles"][s]["kind"], "inherit");
    }
    assert_eq!(v["exit_actions"], serde_json::json!(["estream-flush"]));
}

#[test]
fn w32ce_strips_leading_null_handles() {
    let out = sigil("w32ce", &["-&S0=null", "-&S2=null", "report"]);
    assert_eq!(out.status.code(), Some(0));
    let v = parse_json_stdout(&out);
    assert_eq!(v["consumed_args"], 2);
    assert_eq!(v["std_handles"]["stdin"]["kind"], "null");
    assert_eq!(v["std_handles"]["stdout"]["kind"], "inherit");
    assert_eq!(v["std_handles"]["stderr"]["kind"], "null");
    assert_eq!(
        v["exit_actions"],
        serde_json::json!(["estream-flush", "exit-delay"])
    );
    // stderr is bound to no device.
    assert!(out.stderr.is_empty());
}

#[test]
fn remaining_args_keep_their_order() {
    let out = sigil("w32ce", &["-&S0=null", "args", "--", "foo", "-&S1=null", "bar"]);
    assert_eq!(out.status.code(), Some(0), "stderr:\n{}", stderr(&out));
    assert_eq!(
        String::from_utf8_lossy(&out.stdout),
        "foo\n-&S1=null\nbar\n"
    );
}

#[test]
fn malformed_option_is_left_for_the_parser() {
    let out = sigil("w32ce", &["-&S3=5", "report"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(out.stdout.is_empty());
    assert!(
        stderr(&out).contains("unexpected argument"),
        "stderr:\n{}",
        stderr(&out)
    );
}

#[test]
fn posix_does_not_rewrite() {
    let out = sigil("posix", &["-&S1=null", "report"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(stderr(&out).contains("unexpected argument"));
}

#[test]
fn version_goes_through_stdout() {
    let out = sigil("posix", &["--version"]);
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(
        String::from_utf8_lossy(&out.stdout).trim(),
        format!("sigil {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn help_is_silenced_by_null_stdout() {
    let out = sigil("w32ce", &["-&S1=null", "--help"]);
    assert_eq!(out.status.code(), Some(0));
    assert!(out.stdout.is_empty());
}

#[test]
fn caps_describes_requested_platform() {
    let out = sigil("posix", &["caps", "--platform", "w32ce"]);
    assert_eq!(out.status.code(), Some(0), "stderr:\n{}", stderr(&out));
    let v = parse_json_stdout(&out);
    assert_eq!(v["schema_version"], SIGIL_PLATFORM_CAPS_SCHEMA_VERSION);
    assert_eq!(v["platform"], "w32ce");
    assert_eq!(v["caps"]["rewrites_std_handles"], true);
    assert_eq!(v["caps"]["delays_exit"], true);

    let out = sigil("w32", &["caps"]);
    let v = parse_json_stdout(&out);
    assert_eq!(v["platform"], "w32");
    assert_eq!(v["caps"]["rewrites_std_handles"], false);
}

#[test]
fn invalid_platform_env_is_ignored() {
    let out = sigil("os2", &["report"]);
    assert_eq!(out.status.code(), Some(0));
    let v = parse_json_stdout(&out);
    let notes = v["notes"].as_array().expect("notes[]");
    assert!(notes
        .iter()
        .any(|n| n.as_str().unwrap_or("").contains("SIGIL_PLATFORM")));
}

#[cfg(unix)]
mod rendezvous {
    use std::io::{Read as _, Write as _};
    use std::path::PathBuf;
    use std::process::{Command, Stdio};
    use std::time::Duration;

    use sigil_init::RendezvousListener;

    fn make_temp_dir(prefix: &str) -> PathBuf {
        let base = std::env::temp_dir();
        let pid = std::process::id();
        for n in 0..10_000u32 {
            let p = base.join(format!("sigil-cli-{prefix}-{pid}-{n}"));
            if std::fs::create_dir(&p).is_ok() {
                return p;
            }
        }
        panic!("failed to create temp dir under {}", base.display());
    }

    fn spawn_sigil(dir: &PathBuf, args: &[&str]) -> std::process::Child {
        Command::new(env!("CARGO_BIN_EXE_sigil"))
            .args(args)
            .env("SIGIL_PLATFORM", "w32ce")
            .env("SIGIL_EXIT_DELAY_MS", "0")
            .env("SIGIL_RVID_DIR", dir)
            .env("SIGIL_RVID_TIMEOUT_MS", "5000")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("spawn sigil")
    }

    #[test]
    fn cat_reads_stdin_from_rendezvous() {
        let dir = make_temp_dir("cat");
        let listener = RendezvousListener::bind(&dir, 7).expect("bind");

        let child = spawn_sigil(&dir, &["-&S0=7", "cat"]);
        let mut peer = listener.accept(Duration::from_secs(10)).expect("accept");
        peer.write_all(b"hello through a rendezvous\n").unwrap();
        drop(peer);

        let out = child.wait_with_output().expect("wait sigil");
        assert_eq!(
            out.status.code(),
            Some(0),
            "stderr:\n{}",
            String::from_utf8_lossy(&out.stderr)
        );
        assert_eq!(out.stdout, b"hello through a rendezvous\n");

        drop(listener);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn args_write_stdout_to_rendezvous() {
        let dir = make_temp_dir("args");
        let listener = RendezvousListener::bind(&dir, 8).expect("bind");

        let child = spawn_sigil(&dir, &["-&S1=8", "args", "one", "two"]);
        let mut peer = listener.accept(Duration::from_secs(10)).expect("accept");
        let mut got = String::new();
        peer.read_to_string(&mut got).unwrap();

        let out = child.wait_with_output().expect("wait sigil");
        assert_eq!(out.status.code(), Some(0));
        assert_eq!(got, "one\ntwo\n");
        assert!(out.stdout.is_empty());

        drop(listener);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
