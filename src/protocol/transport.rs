//! Byte-stream transport with full-transfer send and receive loops.

use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;

use crate::error::{Result, ViewerError};

/// A connected bidirectional byte stream.
///
/// `send` and `recv` have socket semantics: both may transfer fewer bytes
/// than requested, and `recv` returning 0 means the peer closed the
/// connection. The helpers below turn these into whole-message transfers.
pub trait Transport {
    fn send(&mut self, buf: &[u8]) -> io::Result<usize>;
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl Transport for UnixStream {
    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write(buf)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read(buf)
    }
}

/// Send all of `buf`, looping over short writes.
pub fn send_all<T: Transport + ?Sized>(transport: &mut T, buf: &[u8]) -> Result<()> {
    let mut done = 0;
    while done < buf.len() {
        let n = transport.send(&buf[done..])?;
        done += n;
    }
    Ok(())
}

/// Receive exactly `buf.len()` bytes, looping over short reads.
///
/// A zero-byte read before the buffer is full is reported as an ENODATA
/// I/O error ("not enough data"), distinct from the handshake-time peer
/// close handled in [`recv_some`].
pub fn recv_exact<T: Transport + ?Sized>(transport: &mut T, buf: &mut [u8]) -> Result<()> {
    let mut done = 0;
    while done < buf.len() {
        let n = transport.recv(&mut buf[done..])?;
        if n == 0 {
            return Err(ViewerError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                not_enough_data(),
            )));
        }
        done += n;
    }
    Ok(())
}

/// Receive exactly `buf.len()` bytes, returning `Ok(false)` if the peer
/// closed the connection before sending anything at all.
pub fn recv_some<T: Transport + ?Sized>(transport: &mut T, buf: &mut [u8]) -> Result<bool> {
    let n = transport.recv(buf)?;
    if n == 0 {
        return Ok(false);
    }
    recv_exact(transport, &mut buf[n..])?;
    Ok(true)
}

/// Send a u32 in host byte order.
pub fn send_u32<T: Transport + ?Sized>(transport: &mut T, value: u32) -> Result<()> {
    send_all(transport, &value.to_ne_bytes())
}

/// Send a u64 in host byte order.
pub fn send_u64<T: Transport + ?Sized>(transport: &mut T, value: u64) -> Result<()> {
    send_all(transport, &value.to_ne_bytes())
}

/// Receive a u32 in host byte order.
pub fn recv_u32<T: Transport + ?Sized>(transport: &mut T) -> Result<u32> {
    let mut buf = [0u8; 4];
    recv_exact(transport, &mut buf)?;
    Ok(u32::from_ne_bytes(buf))
}

/// Receive a u64 in host byte order.
pub fn recv_u64<T: Transport + ?Sized>(transport: &mut T) -> Result<u64> {
    let mut buf = [0u8; 8];
    recv_exact(transport, &mut buf)?;
    Ok(u64::from_ne_bytes(buf))
}

fn not_enough_data() -> io::Error {
    io::Error::from_raw_os_error(nix::libc::ENODATA)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Transport;
    use std::collections::VecDeque;
    use std::io;

    /// A scripted transport: `recv` drains `incoming`, `send` appends to
    /// `outgoing`. With `trickle` set, both move at most one byte per call.
    #[derive(Debug)]
    pub struct ScriptedTransport {
        pub incoming: VecDeque<u8>,
        pub outgoing: Vec<u8>,
        pub trickle: bool,
    }

    impl ScriptedTransport {
        pub fn new(incoming: &[u8], trickle: bool) -> Self {
            Self {
                incoming: incoming.iter().copied().collect(),
                outgoing: Vec::new(),
                trickle,
            }
        }
    }

    impl Transport for ScriptedTransport {
        fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = if self.trickle { buf.len().min(1) } else { buf.len() };
            self.outgoing.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if buf.is_empty() {
                return Ok(0);
            }
            let limit = if self.trickle { 1 } else { buf.len() };
            let mut n = 0;
            while n < limit {
                match self.incoming.pop_front() {
                    Some(b) => {
                        buf[n] = b;
                        n += 1;
                    }
                    None => break,
                }
            }
            Ok(n)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedTransport;
    use super::*;
    use crate::error::ViewerError;

    #[test]
    fn recv_exact_assembles_fragments() {
        let mut t = ScriptedTransport::new(b"abcdef", true);
        let mut buf = [0u8; 6];
        recv_exact(&mut t, &mut buf).unwrap();
        assert_eq!(&buf, b"abcdef");
    }

    #[test]
    fn recv_exact_reports_truncated_stream() {
        let mut t = ScriptedTransport::new(b"ab", false);
        let mut buf = [0u8; 4];
        let err = recv_exact(&mut t, &mut buf).unwrap_err();
        assert_eq!(err.os_error(), Some(nix::libc::ENODATA));
    }

    #[test]
    fn recv_some_distinguishes_immediate_close() {
        let mut t = ScriptedTransport::new(b"", false);
        let mut buf = [0u8; 4];
        assert!(!recv_some(&mut t, &mut buf).unwrap());
    }

    #[test]
    fn recv_some_fails_on_mid_message_close() {
        let mut t = ScriptedTransport::new(b"ab", false);
        let mut buf = [0u8; 4];
        match recv_some(&mut t, &mut buf) {
            Err(ViewerError::Io(_)) => {}
            other => panic!("expected I/O error, got {other:?}"),
        }
    }

    #[test]
    fn send_all_survives_short_writes() {
        let mut t = ScriptedTransport::new(b"", true);
        send_all(&mut t, b"hello world").unwrap();
        assert_eq!(t.outgoing, b"hello world");
    }

    #[test]
    fn integers_round_trip_through_trickle_transport() {
        let mut t = ScriptedTransport::new(b"", true);
        send_u32(&mut t, 0xdeadbeef).unwrap();
        send_u64(&mut t, u64::MAX - 1).unwrap();
        let sent = std::mem::take(&mut t.outgoing);
        let mut t = ScriptedTransport::new(&sent, true);
        assert_eq!(recv_u32(&mut t).unwrap(), 0xdeadbeef);
        assert_eq!(recv_u64(&mut t).unwrap(), u64::MAX - 1);
    }
}
