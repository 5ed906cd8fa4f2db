//! Byte transport underneath a connection.
//!
//! The connection only ever sees a non-blocking byte pipe: reads report
//! `WouldBlock` when nothing is available and `Ok(0)` once the peer is gone.

use crate::config::ConnectionConfig;
use crate::Version;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use tracing::debug;

pub trait Transport {
    fn connect(&mut self, host: &str, port: u16, secure: bool) -> io::Result<()>;

    /// `Ok(0)` is end of stream, `WouldBlock` means try again later.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Returns how many bytes were accepted, possibly fewer than offered.
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn close(&mut self);
}

type TlsStream = StreamOwned<ClientConnection, TcpStream>;

enum Inner {
    Plain(TcpStream),
    Tls(Box<TlsStream>),
}

/// TCP transport, optionally wrapped in TLS with the version's ALPN token.
pub struct TcpTransport {
    version: Version,
    nodelay: bool,
    inner: Option<Inner>,
}

impl TcpTransport {
    pub fn new(version: Version) -> Self {
        Self {
            version,
            nodelay: true,
            inner: None,
        }
    }

    pub fn from_config(version: Version, config: &ConnectionConfig) -> Self {
        Self {
            version,
            nodelay: config.tcp_nodelay,
            inner: None,
        }
    }

    /// Protocol the server picked during the TLS handshake.
    pub fn negotiated_protocol(&self) -> Option<&[u8]> {
        match &self.inner {
            Some(Inner::Tls(tls)) => tls.conn.alpn_protocol(),
            _ => None,
        }
    }

    fn config_tls(&self, host: &str) -> io::Result<ClientConnection> {
        let root_store = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let mut config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(tls_error)?
            .with_root_certificates(root_store)
            .with_no_client_auth();
        config.alpn_protocols = vec![self.version.alpn().to_vec()];
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        ClientConnection::new(Arc::new(config), server_name).map_err(tls_error)
    }

    fn stream(&mut self) -> io::Result<&mut Inner> {
        self.inner
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "transport not connected"))
    }
}

impl Transport for TcpTransport {
    fn connect(&mut self, host: &str, port: u16, secure: bool) -> io::Result<()> {
        let mut sock = TcpStream::connect((host, port))?;
        sock.set_nodelay(self.nodelay)?;
        let inner = match secure {
            true => {
                let mut tls = self.config_tls(host)?;
                while tls.is_handshaking() {
                    tls.complete_io(&mut sock)?;
                }
                if tls.alpn_protocol() != Some(self.version.alpn()) {
                    debug!(host, version = %self.version, "server did not confirm alpn");
                }
                Inner::Tls(Box::new(StreamOwned::new(tls, sock)))
            }
            false => Inner::Plain(sock),
        };
        match &inner {
            Inner::Plain(sock) => sock.set_nonblocking(true)?,
            Inner::Tls(tls) => tls.sock.set_nonblocking(true)?,
        }
        debug!(host, port, secure, "transport connected");
        self.inner = Some(inner);

        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.stream()? {
            Inner::Plain(sock) => sock.read(buf),
            Inner::Tls(tls) => tls.read(buf),
        }
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        match self.stream()? {
            Inner::Plain(sock) => sock.write(bytes),
            Inner::Tls(tls) => tls.write(bytes),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.stream()? {
            Inner::Plain(sock) => sock.flush(),
            Inner::Tls(tls) => tls.flush(),
        }
    }

    fn close(&mut self) {
        match self.inner.take() {
            Some(Inner::Plain(sock)) => {
                let _ = sock.shutdown(std::net::Shutdown::Both);
            }
            Some(Inner::Tls(mut tls)) => {
                tls.conn.send_close_notify();
                let _ = tls.conn.complete_io(&mut tls.sock);
                let _ = tls.sock.shutdown(std::net::Shutdown::Both);
            }
            None => {}
        }
    }
}

fn tls_error(e: rustls::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}
