use std::ffi::OsString;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser};
use serde::Serialize;
use sigil_contracts::{DEFAULT_LOG_FILTER, ENV_LOG, SIGIL_PLATFORM_CAPS_SCHEMA_VERSION};
use sigil_estream::{Estream, StdStream};
use sigil_init::InitContext;
use sigil_platform::{PlatformCaps, PlatformId};

const EXIT_RUNTIME_ERROR: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "sigil")]
#[command(about = "Sigil command-line security tool.", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Print what process bootstrap set up, as JSON.
    Report,
    /// Print the capabilities of a platform profile, as JSON.
    Caps(CapsArgs),
    /// Print the remaining arguments, one per line.
    Args(ArgsArgs),
    /// Copy standard input to standard output.
    Cat,
}

#[derive(Args, Debug)]
struct CapsArgs {
    /// Platform profile to describe (defaults to the active one).
    #[arg(long, value_enum)]
    platform: Option<PlatformId>,
}

#[derive(Args, Debug)]
struct ArgsArgs {
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CapsDoc {
    schema_version: &'static str,
    platform: PlatformId,
    caps: PlatformCaps,
}

fn main() -> ExitCode {
    let mut args: Vec<OsString> = std::env::args_os().collect();
    let ctx = sigil_init::init_common_subsystems(&mut args);

    init_logging(ctx.estream());
    for note in &ctx.report().notes {
        log::debug!("bootstrap: {note}");
    }

    let code = match try_main(&ctx, args) {
        Ok(code) => code,
        Err(err) => {
            let _ = ctx.argparse().emit(2, Some(&format!("sigil: {err:#}\n")));
            EXIT_RUNTIME_ERROR
        }
    };
    ctx.shutdown();
    ExitCode::from(code)
}

fn init_logging(es: &Estream) {
    let env = env_logger::Env::new().filter_or(ENV_LOG, DEFAULT_LOG_FILTER);
    let _ = env_logger::Builder::from_env(env)
        .target(env_logger::Target::Pipe(Box::new(
            es.writer(StdStream::Stderr),
        )))
        .format_timestamp(None)
        .try_init();
}

fn try_main(ctx: &InitContext, args: Vec<OsString>) -> Result<u8> {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            let code = ctx.argparse().emit_clap_error(&err);
            return Ok(u8::try_from(code).unwrap_or(EXIT_RUNTIME_ERROR));
        }
    };

    let es = ctx.estream();
    match cli.command {
        Command::Report => {
            let json = serde_json::to_string_pretty(ctx.report())
                .context("serialize bootstrap report")?;
            write_stdout(es, &json)?;
            write_stdout(es, "\n")?;
        }
        Command::Caps(args) => {
            let platform = args.platform.unwrap_or(ctx.report().platform);
            let doc = CapsDoc {
                schema_version: SIGIL_PLATFORM_CAPS_SCHEMA_VERSION,
                platform,
                caps: platform.caps(),
            };
            let json = serde_json::to_string_pretty(&doc).context("serialize platform caps")?;
            write_stdout(es, &json)?;
            write_stdout(es, "\n")?;
        }
        Command::Args(args) => {
            log::debug!("args: {} remaining", args.args.len());
            for arg in &args.args {
                write_stdout(es, arg)?;
                write_stdout(es, "\n")?;
            }
        }
        Command::Cat => cat(es)?,
    }

    if es.fflush(StdStream::Stdout) != 0 {
        anyhow::bail!("flush stdout failed");
    }
    Ok(0)
}

fn write_stdout(es: &Estream, s: &str) -> Result<()> {
    if es.fputs(StdStream::Stdout, s) != 0 {
        anyhow::bail!("write to stdout failed");
    }
    Ok(())
}

fn cat(es: &Estream) -> Result<()> {
    let mut buf = [0u8; 64 * 1024];
    let mut total: u64 = 0;
    loop {
        let n = es.read(&mut buf).context("read stdin")?;
        if n == 0 {
            break;
        }
        if es.fwrite(StdStream::Stdout, &buf[..n]) != 0 {
            anyhow::bail!("write to stdout failed");
        }
        total = total.saturating_add(n as u64);
    }
    log::debug!("cat: copied {total} bytes");
    Ok(())
}
