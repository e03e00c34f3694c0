//! Non-blocking byte transport between this gateway and a FIX
//! counterparty. A [`Connection`] never blocks: `try_read`/`try_write`
//! both return immediately, in keeping with the no-suspension-points
//! rule (§5). This is a different layer from the cluster's own
//! transport (§4.2's shared-memory fabric, out of scope, stood in for
//! by `fixgate_cluster::InMemoryTransport` in tests).

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};

pub trait Connection {
    /// `Ok(0)` means nothing was available right now, not EOF-on-empty.
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn try_write(&mut self, buf: &[u8]) -> io::Result<usize>;
}

pub struct TcpConnection {
    stream: TcpStream,
}

impl TcpConnection {
    pub fn connect(addr: impl ToSocketAddrs) -> io::Result<TcpConnection> {
        TcpConnection::from_stream(TcpStream::connect(addr)?)
    }

    pub fn from_stream(stream: TcpStream) -> io::Result<TcpConnection> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        Ok(TcpConnection { stream })
    }
}

impl Connection for TcpConnection {
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.stream.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn try_write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.stream.write(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e),
        }
    }
}

/// Non-blocking listener: `poll_accept` never waits for a connection.
pub struct TcpAcceptor {
    listener: TcpListener,
}

impl TcpAcceptor {
    pub fn bind(addr: impl ToSocketAddrs) -> io::Result<TcpAcceptor> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        Ok(TcpAcceptor { listener })
    }

    pub fn poll_accept(&self) -> io::Result<Option<TcpConnection>> {
        match self.listener.accept() {
            Ok((stream, _addr)) => TcpConnection::from_stream(stream).map(Some),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}
