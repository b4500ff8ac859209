//! The privileged audit log server.
//!
//! Started by the viewer with one end of a socket pair as its stdin; reads
//! files under the audit log directory on the viewer's behalf. Takes no
//! arguments beyond `--help` and `--version`.

use std::os::fd::AsFd;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::process::ExitCode;

use nix::sys::stat::SFlag;
use tracing::error;

use audit_viewer::protocol::serve;

const LOG_DIR: &str = "/var/log/audit";

fn handle_args() -> Result<(), ExitCode> {
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        None => Ok(()),
        Some("--help") => {
            println!(
                "Usage: audit-viewer-server\n\n\
                 Serves audit log files over a socket on its standard input.\n\
                 Not intended to be started directly."
            );
            Err(ExitCode::SUCCESS)
        }
        Some("--version") => {
            println!("audit-viewer-server {}", env!("CARGO_PKG_VERSION"));
            Err(ExitCode::SUCCESS)
        }
        Some(arg) => {
            eprintln!("audit-viewer-server: unexpected argument {arg:?}");
            Err(ExitCode::FAILURE)
        }
    }
}

fn run() -> anyhow::Result<()> {
    let stdin = std::io::stdin();
    let stat = nix::sys::stat::fstat(stdin.as_fd())?;
    if stat.st_mode & SFlag::S_IFMT.bits() != SFlag::S_IFSOCK.bits() {
        anyhow::bail!("standard input is not a socket");
    }
    // Work on a duplicate so the stdin handle stays untouched.
    let fd = stdin.as_fd().try_clone_to_owned()?;
    let mut stream = UnixStream::from(fd);
    serve(&mut stream, Path::new(LOG_DIR))?;
    Ok(())
}

fn main() -> ExitCode {
    if let Err(code) = handle_args() {
        return code;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            eprintln!("audit-viewer-server: {err:#}");
            ExitCode::FAILURE
        }
    }
}
