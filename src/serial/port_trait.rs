//! Trait abstraction for serial port operations to enable testing

use async_trait::async_trait;
use std::io;
use tracing::debug;

/// Trait for serial port I/O operations
#[async_trait]
pub trait SerialPortIO: Send {
    /// Write all data to the port
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush the output buffer
    async fn flush(&mut self) -> io::Result<()>;

    /// Number of bytes waiting in the input buffer
    fn bytes_to_read(&mut self) -> io::Result<u32>;

    /// Read buffered bytes into `buf`
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Wrapper around tokio_serial::SerialStream that implements SerialPortIO
pub struct TokioSerialPort {
    port: tokio_serial::SerialStream,
    device_path: String,
}

impl TokioSerialPort {
    pub fn new(port: tokio_serial::SerialStream, device_path: impl Into<String>) -> Self {
        Self {
            port,
            device_path: device_path.into(),
        }
    }
}

impl Drop for TokioSerialPort {
    fn drop(&mut self) {
        debug!("Closing serial port {}", self.device_path);
    }
}

#[async_trait]
impl SerialPortIO for TokioSerialPort {
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        use tokio::io::AsyncWriteExt;
        self.port.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        use tokio::io::AsyncWriteExt;
        self.port.flush().await
    }

    fn bytes_to_read(&mut self) -> io::Result<u32> {
        use tokio_serial::SerialPort;
        self.port.bytes_to_read().map_err(io::Error::from)
    }

    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        use tokio::io::AsyncReadExt;
        self.port.read(buf).await
    }
}
