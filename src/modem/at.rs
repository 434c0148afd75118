//! # AT Command Transport
//!
//! Sends one AT command and collects the modem's answer.
//!
//! Bytes left over from an earlier exchange are discarded, then the command is
//! written with a CRLF terminator. The answer is accumulated until it contains
//! the expected token or the command timeout passes; after a match the rest of
//! the answer gets a short settle delay and is drained. The answer is accepted
//! only if it contains the expected token. A missing token is a [`TrackerError::AtMismatch`]; port
//! failures surface as [`TrackerError::Serial`]. Retries are the caller's job.

use bytes::BytesMut;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, error};

use crate::error::{Result, TrackerError};
use crate::serial::port_trait::SerialPortIO;

/// Interval between input-buffer checks while waiting for an answer
const POLL_STEP: Duration = Duration::from_millis(20);

/// Chunk size for draining the input buffer
const READ_CHUNK: usize = 256;

/// Timing applied to every AT exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtTiming {
    /// Upper bound on the wait for the expected token
    pub timeout: Duration,
    /// Pause after the token arrived so the rest of the answer is buffered
    pub settle: Duration,
}

impl Default for AtTiming {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
            settle: Duration::from_millis(10),
        }
    }
}

/// AT command transport bound to one serial port
pub struct AtTransport {
    port: Box<dyn SerialPortIO>,
    timing: AtTiming,
}

impl AtTransport {
    pub fn new(port: Box<dyn SerialPortIO>, timing: AtTiming) -> Self {
        Self { port, timing }
    }

    /// Send `command` and return the raw answer if it contains `expected`
    ///
    /// # Arguments
    ///
    /// * `command` - AT command without line terminator (e.g. `AT+CGPS?`)
    /// * `expected` - Token the answer must contain (e.g. `+CGPS: `)
    ///
    /// # Returns
    ///
    /// The raw, lossily decoded answer including the command echo
    ///
    /// # Errors
    ///
    /// - `AtMismatch` when the answer lacks `expected` (including no answer)
    /// - `Serial` when the port cannot be written or read
    pub async fn send(&mut self, command: &str, expected: &str) -> Result<String> {
        self.send_with_timeout(command, expected, self.timing.timeout).await
    }

    /// Same as [`AtTransport::send`] with an explicit answer timeout
    pub async fn send_with_timeout(
        &mut self,
        command: &str,
        expected: &str,
        timeout: Duration,
    ) -> Result<String> {
        self.discard_stale().await?;

        let line = format!("{}\r\n", command);
        self.port
            .write_all(line.as_bytes())
            .await
            .map_err(|e| TrackerError::Serial(format!("Failed to write {}: {}", command, e)))?;
        self.port
            .flush()
            .await
            .map_err(|e| TrackerError::Serial(format!("Failed to flush after {}: {}", command, e)))?;

        let response = self.collect_response(expected, timeout).await?;

        if !response.contains(expected) {
            error!("{} ERROR", command);
            error!("{} back:\t{}", command, response);
            return Err(TrackerError::AtMismatch {
                command: command.to_string(),
                expected: expected.to_string(),
                response,
            });
        }

        debug!("{} -> {}", command, response.trim());
        Ok(response)
    }

    /// Accumulate the answer until `expected` shows up or `timeout` passes
    async fn collect_response(&mut self, expected: &str, timeout: Duration) -> Result<String> {
        let deadline = Instant::now() + timeout;
        let mut buffer = BytesMut::new();

        loop {
            self.drain_into(&mut buffer).await?;
            if String::from_utf8_lossy(&buffer).contains(expected) {
                break;
            }
            if Instant::now() >= deadline {
                return Ok(String::from_utf8_lossy(&buffer).into_owned());
            }
            sleep(POLL_STEP.min(deadline.saturating_duration_since(Instant::now()))).await;
        }

        // Trailing result code usually follows the token
        sleep(self.timing.settle).await;
        self.drain_into(&mut buffer).await?;

        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Drop unsolicited or late bytes so they are not taken for the next answer
    async fn discard_stale(&mut self) -> Result<()> {
        let mut stale = BytesMut::new();
        self.drain_into(&mut stale).await?;
        if !stale.is_empty() {
            debug!("Discarded {} stale bytes: {:?}", stale.len(), String::from_utf8_lossy(&stale));
        }
        Ok(())
    }

    async fn drain_into(&mut self, buffer: &mut BytesMut) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK];
        while self.pending()? > 0 {
            let n = self
                .port
                .read(&mut chunk)
                .await
                .map_err(|e| TrackerError::Serial(format!("Failed to read answer: {}", e)))?;
            if n == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..n]);
        }
        Ok(())
    }

    fn pending(&mut self) -> Result<u32> {
        self.port
            .bytes_to_read()
            .map_err(|e| TrackerError::Serial(format!("Failed to query input buffer: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::port_trait::mocks::MockSerialPort;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::io;

    fn transport(mock: &MockSerialPort) -> AtTransport {
        AtTransport::new(Box::new(mock.clone()), AtTiming::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_command_is_crlf_terminated() {
        let mock = MockSerialPort::with_replies(&["\r\nOK\r\n"]);
        let mut at = transport(&mock);

        at.send("AT", "OK").await.unwrap();

        assert_eq!(mock.get_written_data(), vec![b"AT\r\n".to_vec()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_matching_answer_is_returned_raw() {
        let mock = MockSerialPort::with_replies(&["AT+CGPS?\r\n+CGPS: 1,1\r\n\r\nOK\r\n"]);
        let mut at = transport(&mock);

        let answer = at.send("AT+CGPS?", "+CGPS: ").await.unwrap();

        assert!(answer.contains("+CGPS: 1,1"));
        assert!(answer.ends_with("OK\r\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_token_is_mismatch() {
        let mock = MockSerialPort::with_replies(&["\r\nERROR\r\n"]);
        let mut at = transport(&mock);

        match at.send("AT+CGPS=1", "OK").await {
            Err(TrackerError::AtMismatch { command, expected, response }) => {
                assert_eq!(command, "AT+CGPS=1");
                assert_eq!(expected, "OK");
                assert!(response.contains("ERROR"));
            }
            other => panic!("Expected AtMismatch, got: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_modem_times_out_as_mismatch() {
        let mock = MockSerialPort::new();
        let mut at = transport(&mock);

        let start = Instant::now();
        let err = at.send("AT+CGPSINFO", "+CGPSINFO: ").await.unwrap_err();

        assert!(matches!(err, TrackerError::AtMismatch { ref response, .. } if response.is_empty()));
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_is_serial_error() {
        let mock = MockSerialPort::new();
        mock.set_write_error(io::ErrorKind::BrokenPipe);
        let mut at = transport(&mock);

        let err = at.send("AT", "OK").await.unwrap_err();

        assert!(err.is_transport());
        assert!(!err.is_gps_failure());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_failure_is_serial_error() {
        let mock = MockSerialPort::with_replies(&["OK"]);
        mock.set_read_error(io::ErrorKind::Other);
        let mut at = transport(&mock);

        assert!(matches!(at.send("AT", "OK").await, Err(TrackerError::Serial(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_answer_is_drained_in_chunks() {
        let long = format!("{}\r\nOK\r\n", "X".repeat(READ_CHUNK * 3));
        let mock = MockSerialPort::with_replies(&[&long]);
        let mut at = transport(&mock);

        let answer = at.send("AT+LONG", "OK").await.unwrap();

        assert_eq!(answer.len(), long.len());
        assert_eq!(mock.bytes_to_read_now(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_utf8_is_decoded_lossily() {
        let modem = EchoingModem::new(&[b"\xff\r\nOK\r\n"], Duration::ZERO);
        let mut at = AtTransport::new(Box::new(modem), AtTiming::default());

        let answer = at.send("AT", "OK").await.unwrap();
        assert!(answer.contains('\u{FFFD}'));
        assert!(answer.ends_with("OK\r\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_answer_after_immediate_echo_is_collected() {
        let modem = EchoingModem::new(
            &[b"\r\n+CGPS: 1,1\r\n\r\nOK\r\n", b"\r\nERROR\r\n"],
            Duration::from_millis(50),
        );
        let mut at = AtTransport::new(Box::new(modem), AtTiming::default());

        let status = at.send("AT+CGPS?", "+CGPS: ").await.unwrap();
        assert!(status.starts_with("AT+CGPS?\r\n"));
        assert!(status.contains("+CGPS: 1,1"));

        // The next command sees its own answer, not the previous one
        let err = at.send("AT+CGPS=1", "OK").await.unwrap_err();
        match err {
            TrackerError::AtMismatch { response, .. } => {
                assert!(response.contains("ERROR"));
                assert!(!response.contains("+CGPS: 1,1"));
            }
            other => panic!("Expected AtMismatch, got: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_answer_later_than_timeout_is_discarded_before_next_command() {
        let modem = EchoingModem::new(
            &[b"\r\n+CGPS: 1,1\r\n\r\nOK\r\n", b"\r\nERROR\r\n"],
            Duration::from_millis(1500),
        );
        let mut at = AtTransport::new(Box::new(modem), AtTiming::default());

        assert!(matches!(
            at.send("AT+CGPS?", "+CGPS: ").await,
            Err(TrackerError::AtMismatch { .. })
        ));
        sleep(Duration::from_secs(1)).await;

        // The late status answer is sitting in the buffer and must not pass for "OK"
        let err = at.send("AT+CGPS=1", "OK").await.unwrap_err();
        match err {
            TrackerError::AtMismatch { response, .. } => {
                assert!(!response.contains("+CGPS: 1,1"));
                assert!(!response.contains("OK"));
            }
            other => panic!("Expected AtMismatch, got: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_bytes_are_dropped_before_writing() {
        let mock = MockSerialPort::with_replies(&["\r\nERROR\r\n"]);
        mock.rx_buffer.lock().unwrap().extend_from_slice(b"+CGPS: 1,1\r\nOK\r\n");
        let mut at = transport(&mock);

        assert!(matches!(at.send("AT+CGPS=1", "OK").await, Err(TrackerError::AtMismatch { .. })));
    }

    /// Modem that echoes each command at once and answers after `delay`
    struct EchoingModem {
        rx: Vec<u8>,
        answers: VecDeque<Vec<u8>>,
        delay: Duration,
        scheduled: Option<(Instant, Vec<u8>)>,
    }

    impl EchoingModem {
        fn new(answers: &[&[u8]], delay: Duration) -> Self {
            Self {
                rx: Vec::new(),
                answers: answers.iter().map(|a| a.to_vec()).collect(),
                delay,
                scheduled: None,
            }
        }

        fn release_due(&mut self) {
            if matches!(self.scheduled, Some((at, _)) if Instant::now() >= at) {
                if let Some((_, answer)) = self.scheduled.take() {
                    self.rx.extend_from_slice(&answer);
                }
            }
        }
    }

    #[async_trait]
    impl SerialPortIO for EchoingModem {
        async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
            self.rx.extend_from_slice(data);
            if let Some(answer) = self.answers.pop_front() {
                self.scheduled = Some((Instant::now() + self.delay, answer));
            }
            Ok(())
        }

        async fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn bytes_to_read(&mut self) -> io::Result<u32> {
            self.release_due();
            Ok(self.rx.len() as u32)
        }

        async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(self.rx.len());
            buf[..n].copy_from_slice(&self.rx[..n]);
            self.rx.drain(..n);
            Ok(n)
        }
    }

    impl MockSerialPort {
        fn bytes_to_read_now(&self) -> usize {
            self.rx_buffer.lock().unwrap().len()
        }
    }
}
