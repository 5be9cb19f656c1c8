use std::io;
use std::net::{Ipv4Addr, UdpSocket};
#[cfg(unix)]
use std::os::unix::net::UnixDatagram;

use parking_lot::Mutex;

use crate::sink::LineSink;

enum Remote {
    Udp(UdpSocket),
    #[cfg(unix)]
    UnixDatagram(UnixDatagram),
}

impl Remote {
    fn connect(addr: &str) -> io::Result<Self> {
        // Try treating the address as a fully-qualified URL, where the scheme is the transport identifier.
        if let Some((scheme, path)) = addr.split_once("://") {
            return match scheme {
                "udp" => Self::udp(path),
                #[cfg(unix)]
                "unixgram" => {
                    let socket = UnixDatagram::unbound()?;
                    socket.connect(path)?;
                    socket.set_nonblocking(true)?;

                    Ok(Self::UnixDatagram(socket))
                }
                _ => Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("invalid scheme '{scheme}', expected one of 'udp', 'unixgram'"),
                )),
            };
        }

        // If there is no scheme, fall back to a UDP socket
        Self::udp(addr)
    }

    fn udp(addr: &str) -> io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect(addr)?;
        socket.set_nonblocking(true)?;

        Ok(Self::Udp(socket))
    }

    fn send(&self, buf: &[u8]) -> io::Result<()> {
        match self {
            Self::Udp(socket) => socket.send(buf).map(drop),
            #[cfg(unix)]
            Self::UnixDatagram(socket) => socket.send(buf).map(drop),
        }
    }
}

/// A [`LineSink`] sending lines to a StatsD daemon over UDP or a unix datagram socket.
///
/// Lines are joined with newlines into packets of at most `max_packet_length` bytes. A packet is
/// sent when the next line does not fit, on [`flush`](LineSink::flush), and when dropped. Lines
/// longer than a packet are sent on their own.
///
/// Addresses are either `host:port`, `udp://host:port` or `unixgram:///path/to/socket`.
pub struct Upstream {
    remote: Remote,
    buffer: Mutex<Vec<u8>>,
    max_packet_length: usize,
}

impl Upstream {
    /// Connects a non-blocking socket to the given address.
    pub fn connect(addr: &str, max_packet_length: usize) -> io::Result<Self> {
        let remote = Remote::connect(addr)?;

        Ok(Upstream {
            remote,
            buffer: Mutex::new(Vec::with_capacity(max_packet_length)),
            max_packet_length,
        })
    }

    fn send_buffer(&self, buffer: &mut Vec<u8>) -> io::Result<()> {
        if buffer.is_empty() {
            return Ok(());
        }

        let result = self.remote.send(buffer);
        buffer.clear();
        result
    }
}

impl LineSink for Upstream {
    fn emit(&self, line: &str) -> io::Result<()> {
        let line = line.as_bytes();
        let mut buffer = self.buffer.lock();

        if !buffer.is_empty() && buffer.len() + 1 + line.len() > self.max_packet_length {
            // Line does not fit into the remaining space. Send what we have.
            self.send_buffer(&mut buffer)?;
        }

        if line.len() > self.max_packet_length {
            // Line too big for an entire packet, send it on its own.
            return self.remote.send(line);
        }

        if !buffer.is_empty() {
            buffer.push(b'\n');
        }
        buffer.extend_from_slice(line);

        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        let mut buffer = self.buffer.lock();
        self.send_buffer(&mut buffer)
    }
}

impl Drop for Upstream {
    fn drop(&mut self) {
        let buffer = self.buffer.get_mut();
        if !buffer.is_empty() {
            self.remote.send(buffer).ok();
        }
    }
}

impl std::fmt::Debug for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let transport = match self.remote {
            Remote::Udp(_) => "udp",
            #[cfg(unix)]
            Remote::UnixDatagram(_) => "unixgram",
        };

        f.debug_struct("Upstream")
            .field("transport", &transport)
            .field("max_packet_length", &self.max_packet_length)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn listen() -> (UdpSocket, String) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let addr = socket.local_addr().unwrap().to_string();
        (socket, addr)
    }

    fn recv(socket: &UdpSocket) -> String {
        let mut buf = [0; 2048];
        let len = socket.recv(&mut buf).unwrap();
        String::from_utf8_lossy(&buf[..len]).into_owned()
    }

    fn upstream(addr: &str, max_packet_length: usize) -> Upstream {
        // Bind the client to loopback so the listener accepts the packets.
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.connect(addr).unwrap();
        Upstream {
            remote: Remote::Udp(socket),
            buffer: Mutex::new(Vec::new()),
            max_packet_length,
        }
    }

    #[test]
    fn test_lines_are_joined_until_flush() {
        let (server, addr) = listen();
        let upstream = upstream(&addr, 1400);

        upstream.emit("a:1|c").unwrap();
        upstream.emit("b:2|g").unwrap();
        upstream.flush().unwrap();

        assert_eq!(recv(&server), "a:1|c\nb:2|g");
    }

    #[test]
    fn test_full_packet_is_sent() {
        let (server, addr) = listen();
        let upstream = upstream(&addr, 12);

        upstream.emit("a:1|c").unwrap();
        upstream.emit("b:2|c").unwrap();
        upstream.emit("c:3|c").unwrap();
        upstream.flush().unwrap();

        assert_eq!(recv(&server), "a:1|c\nb:2|c");
        assert_eq!(recv(&server), "c:3|c");
    }

    #[test]
    fn test_oversized_line_is_sent_alone() {
        let (server, addr) = listen();
        let upstream = upstream(&addr, 8);

        upstream.emit("a:1|c").unwrap();
        upstream.emit("my.long.counter:1|c").unwrap();
        upstream.flush().unwrap();

        assert_eq!(recv(&server), "a:1|c");
        assert_eq!(recv(&server), "my.long.counter:1|c");
    }

    #[test]
    fn test_drop_sends_remaining_lines() {
        let (server, addr) = listen();
        let upstream = upstream(&addr, 1400);

        upstream.emit("a:1|c").unwrap();
        drop(upstream);

        assert_eq!(recv(&server), "a:1|c");
    }

    #[test]
    fn test_connect() {
        let (_server, addr) = listen();
        assert!(Upstream::connect(&addr, 1400).is_ok());
        assert!(Upstream::connect(&format!("udp://{addr}"), 1400).is_ok());

        let error = Upstream::connect("tcp://localhost:8125", 1400).unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::InvalidInput);
    }
}
