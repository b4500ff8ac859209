//! Client side of the privileged server protocol.

use std::os::fd::OwnedFd;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

use super::transport::{self, Transport};
use super::{REQ_LIST_FILES, REQ_READ_FILE, SERVER_HELLO};
use crate::error::{Result, ViewerError};

/// A client to the privileged audit log server.
///
/// The client owns its channel exclusively; requests and responses strictly
/// alternate and there is no timeout, so a hung server blocks the caller.
#[derive(Debug)]
pub struct Client<T: Transport = UnixStream> {
    transport: T,
}

impl Client<UnixStream> {
    /// Spawn the server executable at `server_path` and perform the
    /// handshake.
    ///
    /// The child gets one end of a socket pair as its stdin and is passed no
    /// other arguments. Returns [`ViewerError::ServerUnavailable`] if the
    /// child closes the socket without sending the hello value; spawn
    /// failures and transport failures propagate as I/O errors.
    pub fn spawn(server_path: &Path) -> Result<Self> {
        let (ours, theirs) = UnixStream::pair()?;
        debug!(server = %server_path.display(), "starting privileged server");
        // The child is never waited on; it exits once the socket closes.
        let _child = Command::new(server_path)
            .stdin(Stdio::from(OwnedFd::from(theirs)))
            .spawn()?;
        Self::handshake(ours)
    }
}

impl<T: Transport> Client<T> {
    /// Verify the server hello on an already-connected transport.
    pub fn handshake(mut transport: T) -> Result<Self> {
        let mut buf = [0u8; 4];
        if !transport::recv_some(&mut transport, &mut buf)? {
            return Err(ViewerError::ServerUnavailable);
        }
        let hello = u32::from_ne_bytes(buf);
        if hello != SERVER_HELLO {
            return Err(ViewerError::ServerUnavailable);
        }
        debug!("privileged server handshake complete");
        Ok(Self { transport })
    }

    /// Return the names of the available audit log files.
    pub fn list_files(&mut self) -> Result<Vec<String>> {
        transport::send_u32(&mut self.transport, REQ_LIST_FILES)?;
        let mut names = Vec::new();
        loop {
            let len = transport::recv_u32(&mut self.transport)?;
            if len == 0 {
                break;
            }
            let mut name = vec![0u8; len as usize];
            transport::recv_exact(&mut self.transport, &mut name)?;
            names.push(String::from_utf8_lossy(&name).into_owned());
        }
        Ok(names)
    }

    /// Return the contents of the file named `filename`.
    ///
    /// A nonzero errno reply from the server becomes an I/O error carrying
    /// that OS error code.
    pub fn read_file(&mut self, filename: &str) -> Result<Vec<u8>> {
        transport::send_u32(&mut self.transport, REQ_READ_FILE)?;
        transport::send_u32(&mut self.transport, filename.len() as u32)?;
        transport::send_all(&mut self.transport, filename.as_bytes())?;
        let err = transport::recv_u32(&mut self.transport)?;
        if err != 0 {
            return Err(ViewerError::from_errno(err as i32));
        }
        let size = transport::recv_u64(&mut self.transport)?;
        let mut data = vec![0u8; size as usize];
        transport::recv_exact(&mut self.transport, &mut data)?;
        Ok(data)
    }
}
