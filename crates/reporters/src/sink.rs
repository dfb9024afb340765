//! Lazily connected TCP output shared by the socket reporters.

use {
    tokio::{
        io::{AsyncWriteExt, BufWriter},
        net::TcpStream,
    },
    tracing::debug,
};

use crate::error::Result;

#[derive(Debug)]
pub struct TcpSink {
    address: String,
    port: u16,
    stream: Option<BufWriter<TcpStream>>,
}

impl TcpSink {
    #[must_use]
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            stream: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Write `bytes` and flush, connecting first if needed. Any failure drops
    /// the connection so the next call reconnects.
    pub async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let mut stream = match self.stream.take() {
            Some(stream) => stream,
            None => {
                let stream = TcpStream::connect((self.address.as_str(), self.port)).await?;
                debug!(address = %self.address, port = self.port, "connected");
                BufWriter::new(stream)
            },
        };
        stream.write_all(bytes).await?;
        stream.flush().await?;
        self.stream = Some(stream);
        Ok(())
    }

    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
    }
}
