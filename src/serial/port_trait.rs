//! Trait abstraction for serial port operations to enable testing

use async_trait::async_trait;
use bytes::BytesMut;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};

/// Trait for serial port I/O operations
#[async_trait]
pub trait SerialPortIO: Send {
    /// Read available bytes into `buf`, returning how many were appended.
    ///
    /// Must be cancel-safe: dropping the future before completion loses no data.
    async fn read(&mut self, buf: &mut BytesMut) -> io::Result<usize>;

    /// Write all data to the port
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush the output buffer
    async fn flush(&mut self) -> io::Result<()>;
}

/// Wrapper around an async byte stream (normally `tokio_serial::SerialStream`)
/// that implements SerialPortIO
pub struct TokioSerialPort<T = tokio_serial::SerialStream> {
    port: T,
}

impl<T> TokioSerialPort<T> {
    pub fn new(port: T) -> Self {
        Self { port }
    }
}

#[async_trait]
impl<T> SerialPortIO for TokioSerialPort<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read(&mut self, buf: &mut BytesMut) -> io::Result<usize> {
        use tokio::io::AsyncReadExt;
        self.port.read_buf(buf).await
    }

    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        use tokio::io::AsyncWriteExt;
        self.port.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        use tokio::io::AsyncWriteExt;
        self.port.flush().await
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tokio_port_reads_scripted_stream() {
        let stream = tokio_test::io::Builder::new()
            .read(b"{\"soc\":0.5}\n")
            .build();
        let mut port = TokioSerialPort::new(stream);
        let mut buf = BytesMut::with_capacity(64);

        let n = port.read(&mut buf).await.unwrap();
        assert_eq!(n, 12);
        assert_eq!(&buf[..], b"{\"soc\":0.5}\n");
    }

    #[tokio::test]
    async fn test_tokio_port_writes_and_flushes() {
        let stream = tokio_test::io::Builder::new()
            .write(b"{\"epoch\":1700000000}\n")
            .build();
        let mut port = TokioSerialPort::new(stream);

        port.write_all(b"{\"epoch\":1700000000}\n").await.unwrap();
        port.flush().await.unwrap();
    }
}
