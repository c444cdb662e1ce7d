//! # Byte-Stream Transport
//!
//! A single reliable ordered byte stream per session: the worker binds
//! and blocks-accepts one driver, the driver connects to `(host, port)`
//! with a bounded retry budget. Built directly on `tokio::net::TcpStream`,
//! restricted to the single-connection discipline this protocol
//! requires — multiplexing several concurrent connections over one
//! session is out of scope, so there's no per-connection routing table
//! here.

use crate::error::{NetOffError, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Connect/accept retry budget and socket buffer sizing shared by both
/// peers.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub host: String,
    pub port: u16,
    /// Delay between retry attempts.
    pub retry_delay: Duration,
    /// Maximum number of attempts before giving up.
    pub max_attempts: u32,
    /// Socket send/receive buffer size.
    pub buffer_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            retry_delay: Duration::from_millis(100),
            max_attempts: 50,
            buffer_size: 65536,
        }
    }
}

/// The single socket backing one driver/worker session.
pub struct Transport {
    stream: TcpStream,
    peer_addr: SocketAddr,
}

impl Transport {
    /// Worker side: bind `config.port` and block-accept exactly one
    /// driver, retrying the accept on a fixed delay up to
    /// `config.max_attempts` times.
    pub async fn accept_one(config: &TransportConfig) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port);
        debug!("binding worker listener on {addr}");
        let listener = TcpListener::bind(&addr).await?;

        let mut attempts = 0;
        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    debug!("accepted driver connection from {peer_addr}");
                    configure_socket(&stream, config.buffer_size)?;
                    return Ok(Self { stream, peer_addr });
                }
                Err(e) => {
                    attempts += 1;
                    if attempts >= config.max_attempts {
                        warn!("worker accept exhausted after {attempts} attempts: {e}");
                        return Err(NetOffError::Unreachable { attempts });
                    }
                    sleep(config.retry_delay).await;
                }
            }
        }
    }

    /// Driver side: connect to `(config.host, config.port)`, retrying on
    /// a fixed delay up to `config.max_attempts` times.
    pub async fn connect(config: &TransportConfig) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port);
        let mut attempts = 0;
        loop {
            match TcpStream::connect(&addr).await {
                Ok(stream) => {
                    let peer_addr = stream.peer_addr()?;
                    debug!("driver connected to {peer_addr}");
                    configure_socket(&stream, config.buffer_size)?;
                    return Ok(Self { stream, peer_addr });
                }
                Err(e) => {
                    attempts += 1;
                    if attempts >= config.max_attempts {
                        warn!("driver connect exhausted after {attempts} attempts: {e}");
                        return Err(NetOffError::Unreachable { attempts });
                    }
                    sleep(config.retry_delay).await;
                }
            }
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Send exactly `buf.len()` bytes, failing if the peer closes early.
    pub async fn send_exact(&mut self, buf: &[u8]) -> Result<()> {
        self.stream.write_all(buf).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Receive exactly `buf.len()` bytes, failing if the peer closes early.
    pub async fn recv_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.stream.read_exact(buf).await?;
        Ok(())
    }

    /// Write a `u32` length prefix followed by `buf`.
    pub async fn send_variable(&mut self, buf: &[u8]) -> Result<()> {
        let len = buf.len() as u32;
        self.stream.write_all(&len.to_ne_bytes()).await?;
        self.stream.write_all(buf).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read a `u32` length prefix, then exactly that many bytes into a
    /// freshly allocated buffer.
    pub async fn recv_variable(&mut self) -> Result<Vec<u8>> {
        let mut len_bytes = [0u8; 4];
        self.stream.read_exact(&mut len_bytes).await?;
        let len = u32::from_ne_bytes(len_bytes) as usize;
        let mut buf = vec![0u8; len];
        self.stream.read_exact(&mut buf).await?;
        Ok(buf)
    }

    pub async fn close(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

fn configure_socket(stream: &TcpStream, buffer_size: usize) -> Result<()> {
    let socket = socket2::SockRef::from(stream);
    socket.set_nodelay(true)?;
    socket.set_recv_buffer_size(buffer_size)?;
    socket.set_send_buffer_size(buffer_size)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Duration as TokioDuration;

    #[tokio::test]
    async fn accept_and_connect_exchange_exact_frames() {
        let config = TransportConfig {
            host: "127.0.0.1".to_string(),
            port: 19801,
            ..Default::default()
        };

        let server_config = config.clone();
        let server = tokio::spawn(async move {
            let mut t = Transport::accept_one(&server_config).await.unwrap();
            let mut buf = [0u8; 5];
            t.recv_exact(&mut buf).await.unwrap();
            assert_eq!(&buf, b"hello");
            t.send_variable(b"world").await.unwrap();
        });

        tokio::time::sleep(TokioDuration::from_millis(50)).await;
        let mut client = Transport::connect(&config).await.unwrap();
        client.send_exact(b"hello").await.unwrap();
        let reply = client.recv_variable().await.unwrap();
        assert_eq!(reply, b"world");

        server.await.unwrap();
    }

    #[tokio::test]
    async fn connect_without_listener_eventually_gives_up() {
        let config = TransportConfig {
            host: "127.0.0.1".to_string(),
            port: 19802,
            retry_delay: Duration::from_millis(1),
            max_attempts: 3,
            ..Default::default()
        };
        let err = Transport::connect(&config).await.unwrap_err();
        assert!(matches!(err, NetOffError::Unreachable { attempts: 3 }));
    }
}
