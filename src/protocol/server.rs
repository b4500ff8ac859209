//! Server side of the privileged server protocol.
//!
//! The server answers requests on behalf of an unprivileged client,
//! restricting file access to one directory of audit logs. Protocol
//! violations (unknown request, bad file name) are fatal to the whole
//! connection rather than reported to the peer.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::transport::{self, Transport};
use super::{REQ_LIST_FILES, REQ_READ_FILE, SERVER_HELLO};
use crate::error::{Result, ViewerError};

/// Longest accepted file name, matching the usual filesystem limit.
const NAME_MAX: u32 = 255;

/// Send the hello value and answer requests until the client closes the
/// connection.
///
/// File names are resolved inside `log_dir` only. Returns an error on
/// transport failure or protocol violation; a clean client close returns
/// `Ok(())`.
pub fn serve<T: Transport>(transport: &mut T, log_dir: &Path) -> Result<()> {
    transport::send_u32(transport, SERVER_HELLO)?;
    loop {
        let mut buf = [0u8; 4];
        if !transport::recv_some(transport, &mut buf)? {
            return Ok(());
        }
        let req = u32::from_ne_bytes(buf);
        match req {
            REQ_LIST_FILES => req_list_files(transport, log_dir)?,
            REQ_READ_FILE => req_read_file(transport, log_dir)?,
            _ => {
                return Err(ViewerError::format(format!("unknown server request {req}")));
            }
        }
    }
}

/// Send the directory listing as length-prefixed names, zero-terminated.
///
/// Listing errors are not reported; the sequence is quietly truncated.
fn req_list_files<T: Transport>(transport: &mut T, log_dir: &Path) -> Result<()> {
    if let Ok(entries) = std::fs::read_dir(log_dir) {
        for entry in entries.flatten() {
            let name = entry.file_name();
            let bytes = name.as_encoded_bytes();
            let Ok(len) = u32::try_from(bytes.len()) else {
                continue;
            };
            transport::send_u32(transport, len)?;
            transport::send_all(transport, bytes)?;
        }
    } else {
        warn!(dir = %log_dir.display(), "cannot list log directory");
    }
    transport::send_u32(transport, 0)
}

/// Read a validated file name from the client and resolve it in `log_dir`.
fn recv_file_path<T: Transport>(transport: &mut T, log_dir: &Path) -> Result<PathBuf> {
    let len = transport::recv_u32(transport)?;
    if len > NAME_MAX {
        return Err(ViewerError::format("file name too long"));
    }
    let mut name = vec![0u8; len as usize];
    transport::recv_exact(transport, &mut name)?;
    let name = String::from_utf8(name)
        .map_err(|_| ViewerError::format("file name is not valid UTF-8"))?;
    if name.contains('/') || name == "." || name == ".." {
        return Err(ViewerError::format("file name escapes the log directory"));
    }
    Ok(log_dir.join(name))
}

/// Reply with an errno value, then file size and contents on success.
///
/// The file is read into memory first so that no failure can occur after
/// the success errno has been sent.
fn req_read_file<T: Transport>(transport: &mut T, log_dir: &Path) -> Result<()> {
    let path = recv_file_path(transport, log_dir)?;
    match read_regular_file(&path) {
        Ok(data) => {
            debug!(path = %path.display(), bytes = data.len(), "serving file");
            transport::send_u32(transport, 0)?;
            transport::send_u64(transport, data.len() as u64)?;
            transport::send_all(transport, &data)
        }
        Err(err) => {
            let code = err.raw_os_error().unwrap_or(nix::libc::EIO);
            debug!(path = %path.display(), code, "file read failed");
            transport::send_u32(transport, code as u32)
        }
    }
}

fn read_regular_file(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let meta = file.metadata()?;
    // Only regular files; no devices or sockets through this door.
    if !meta.is_file() {
        return Err(std::io::Error::from_raw_os_error(nix::libc::EINVAL));
    }
    let mut data = Vec::with_capacity(meta.len() as usize);
    file.read_to_end(&mut data)?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::super::transport::testing::ScriptedTransport;
    use super::*;
    use std::io::Write;

    fn request(parts: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        for part in parts {
            out.extend_from_slice(part);
        }
        out
    }

    #[test]
    fn clean_close_after_hello_is_ok() {
        let mut t = ScriptedTransport::new(b"", false);
        let dir = tempfile::tempdir().unwrap();
        serve(&mut t, dir.path()).unwrap();
        assert_eq!(t.outgoing, SERVER_HELLO.to_ne_bytes());
    }

    #[test]
    fn unknown_request_is_fatal() {
        let mut t = ScriptedTransport::new(&99u32.to_ne_bytes(), false);
        let dir = tempfile::tempdir().unwrap();
        assert!(serve(&mut t, dir.path()).is_err());
    }

    #[test]
    fn list_files_quietly_truncates_on_missing_dir() {
        let mut t = ScriptedTransport::new(&REQ_LIST_FILES.to_ne_bytes(), false);
        serve(&mut t, Path::new("/nonexistent-audit-logs")).unwrap();
        let mut expected = SERVER_HELLO.to_ne_bytes().to_vec();
        expected.extend_from_slice(&0u32.to_ne_bytes());
        assert_eq!(t.outgoing, expected);
    }

    #[test]
    fn read_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = File::create(dir.path().join("audit.log")).unwrap();
        f.write_all(b"hello").unwrap();
        let req = request(&[
            &REQ_READ_FILE.to_ne_bytes(),
            &9u32.to_ne_bytes(),
            b"audit.log",
        ]);
        let mut t = ScriptedTransport::new(&req, false);
        serve(&mut t, dir.path()).unwrap();
        let mut expected = SERVER_HELLO.to_ne_bytes().to_vec();
        expected.extend_from_slice(&0u32.to_ne_bytes());
        expected.extend_from_slice(&5u64.to_ne_bytes());
        expected.extend_from_slice(b"hello");
        assert_eq!(t.outgoing, expected);
    }

    #[test]
    fn read_missing_file_replies_enoent() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(&[&REQ_READ_FILE.to_ne_bytes(), &2u32.to_ne_bytes(), b"no"]);
        let mut t = ScriptedTransport::new(&req, false);
        serve(&mut t, dir.path()).unwrap();
        let mut expected = SERVER_HELLO.to_ne_bytes().to_vec();
        expected.extend_from_slice(&(nix::libc::ENOENT as u32).to_ne_bytes());
        assert_eq!(t.outgoing, expected);
    }

    #[test]
    fn path_escapes_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(&[
            &REQ_READ_FILE.to_ne_bytes(),
            &11u32.to_ne_bytes(),
            b"../../creds",
        ]);
        let mut t = ScriptedTransport::new(&req, false);
        assert!(serve(&mut t, dir.path()).is_err());
    }
}
