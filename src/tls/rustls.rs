use std::io::{self, Cursor, Read, Write};
use std::sync::Arc;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, Connection, ServerConfig, ServerConnection};

use super::TlsEngine;
use crate::Error;

/// [`TlsEngine`] on top of a rustls connection.
#[derive(Debug)]
pub struct RustlsEngine {
    conn: Connection,
}

impl RustlsEngine {
    /// Client side, verifying the server as `name`.
    pub fn client(config: Arc<ClientConfig>, name: ServerName<'static>) -> Result<Self, Error> {
        let conn = ClientConnection::new(config, name).map_err(tls_err)?;
        Ok(RustlsEngine { conn: conn.into() })
    }

    /// Server side.
    pub fn server(config: Arc<ServerConfig>) -> Result<Self, Error> {
        let conn = ServerConnection::new(config).map_err(tls_err)?;
        Ok(RustlsEngine { conn: conn.into() })
    }

    /// The rustls connection, for ALPN, peer certificates and the like.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn tls_err(e: rustls::Error) -> Error {
    Error::Tls(e.to_string())
}

fn io_err(e: io::Error) -> Error {
    Error::Tls(e.to_string())
}

impl TlsEngine for RustlsEngine {
    fn enc_in(&mut self, data: &[u8]) -> Result<usize, Error> {
        let n = match self.conn.read_tls(&mut Cursor::new(data)) {
            Ok(n) => n,
            // received plaintext buffer full, taken again once clear_out ran
            Err(e) if e.kind() == io::ErrorKind::Other => 0,
            Err(e) => return Err(io_err(e)),
        };
        self.conn.process_new_packets().map_err(tls_err)?;
        Ok(n)
    }

    fn clear_in(&mut self, data: &[u8]) -> Result<usize, Error> {
        self.conn.writer().write(data).map_err(io_err)
    }

    fn clear_out(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        match self.conn.reader().read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            // peer went away without close_notify, the transport end tells the rest
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(0),
            Err(e) => Err(io_err(e)),
        }
    }

    fn enc_out(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        if !self.conn.wants_write() {
            return Ok(0);
        }
        let mut out = buf;
        self.conn.write_tls(&mut out).map_err(io_err)
    }

    fn is_init_finished(&self) -> bool {
        !self.conn.is_handshaking()
    }

    fn start(&mut self) -> Result<(), Error> {
        // a client has its hello queued since construction
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), Error> {
        self.conn.send_close_notify();
        Ok(())
    }

    fn close(&mut self) {
        debug!("rustls engine closed");
    }
}
