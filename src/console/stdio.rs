use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel as cbc;

use super::{Console, ConsoleError};

/// How long a blocking read waits for a byte before rechecking the interrupt flag.
const READ_POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// A console on plain byte streams, normally stdin and stdout.
///
/// Used when input is not a terminal. A background thread reads the input
/// one byte at a time and hands it over a channel, so the availability poll
/// never waits on the stream. A source at end of input never reports a key.
pub struct StdioConsole<W = io::Stdout> {
    input: cbc::Receiver<io::Result<u8>>,
    output: W,
    lookahead: Option<u8>,
    eof: bool,
    interrupt: Arc<AtomicBool>,
}

impl StdioConsole {
    pub fn new(interrupt: Arc<AtomicBool>) -> Self {
        Self::from_streams(io::stdin(), io::stdout(), interrupt)
    }
}

impl<W: Write> StdioConsole<W> {
    /// Build a console reading `input` on its own thread and writing `output`.
    ///
    /// The reader thread exits at end of input, on a read error, or once the
    /// console is dropped and the next byte has no one to go to.
    pub fn from_streams(
        input: impl Read + Send + 'static,
        output: W,
        interrupt: Arc<AtomicBool>,
    ) -> Self {
        let (tx, rx) = cbc::bounded(1);

        std::thread::spawn(move || {
            for byte in input.bytes() {
                let failed = byte.is_err();
                let Ok(()) = tx.send(byte) else { return };
                if failed {
                    return;
                }
            }
        });

        Self {
            input: rx,
            output,
            lookahead: None,
            eof: false,
            interrupt,
        }
    }

    /// Accept one message from the reader thread.
    fn accept(&mut self, msg: io::Result<u8>) -> Result<(), ConsoleError> {
        match msg {
            Ok(byte) => {
                self.lookahead = Some(byte);
                Ok(())
            }
            Err(e) => {
                self.eof = true;
                Err(e.into())
            }
        }
    }
}

impl<W: Write> Console for StdioConsole<W> {
    fn key_available(&mut self) -> Result<bool, ConsoleError> {
        if self.lookahead.is_none() && !self.eof {
            match self.input.try_recv() {
                Ok(msg) => self.accept(msg)?,
                Err(cbc::TryRecvError::Empty) => {}
                Err(cbc::TryRecvError::Disconnected) => self.eof = true,
            }
        }
        Ok(self.lookahead.is_some())
    }

    fn read_char(&mut self) -> Result<u8, ConsoleError> {
        // Programs poll for a key and then print; make sure the prompt is visible.
        self.output.flush()?;

        loop {
            if let Some(byte) = self.lookahead.take() {
                return Ok(byte);
            }
            if self.eof {
                return Err(ConsoleError::EndOfInput);
            }
            if self.interrupt.load(Ordering::SeqCst) {
                return Err(ConsoleError::Interrupted);
            }
            match self.input.recv_timeout(READ_POLL_TIMEOUT) {
                Ok(msg) => self.accept(msg)?,
                Err(cbc::RecvTimeoutError::Timeout) => {}
                Err(cbc::RecvTimeoutError::Disconnected) => self.eof = true,
            }
        }
    }

    fn write_char(&mut self, ch: u8) -> Result<(), ConsoleError> {
        self.output.write_all(&[ch])?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ConsoleError> {
        self.output.flush()?;
        Ok(())
    }

    fn poll_interrupt(&mut self) -> Result<bool, ConsoleError> {
        Ok(self.interrupt.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    /// Input that never produces a byte until the test ends.
    struct Stalled(cbc::Receiver<()>);

    impl Read for Stalled {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    fn no_interrupt() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(false))
    }

    #[test]
    fn test_lookahead_then_read() {
        let mut console = StdioConsole::from_streams(&b"xy"[..], Vec::new(), no_interrupt());

        assert_eq!(console.read_char().unwrap(), b'x');
        assert_eq!(console.read_char().unwrap(), b'y');
        assert!(matches!(console.read_char(), Err(ConsoleError::EndOfInput)));
        assert!(!console.key_available().unwrap());
    }

    #[test]
    fn test_key_available_keeps_the_byte() {
        let mut console = StdioConsole::from_streams(&b"k"[..], Vec::new(), no_interrupt());

        let deadline = Instant::now() + Duration::from_secs(5);
        while !console.key_available().unwrap() {
            assert!(Instant::now() < deadline, "input never arrived");
            std::thread::yield_now();
        }
        assert!(console.key_available().unwrap());
        assert_eq!(console.read_char().unwrap(), b'k');
    }

    #[test]
    fn test_poll_does_not_wait_for_input() {
        let (_hold, rx) = cbc::unbounded();
        let mut console = StdioConsole::from_streams(Stalled(rx), Vec::new(), no_interrupt());

        let start = Instant::now();
        assert!(!console.key_available().unwrap());
        assert!(!console.key_available().unwrap());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_interrupt_ends_blocked_read() {
        let (_hold, rx) = cbc::unbounded();
        let flag = no_interrupt();
        let mut console = StdioConsole::from_streams(Stalled(rx), Vec::new(), Arc::clone(&flag));

        let raiser = {
            let flag = Arc::clone(&flag);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(100));
                flag.store(true, Ordering::SeqCst);
            })
        };

        assert!(matches!(console.read_char(), Err(ConsoleError::Interrupted)));
        assert!(console.poll_interrupt().unwrap());
        raiser.join().unwrap();
    }

    #[test]
    fn test_write_passthrough() {
        let mut console = StdioConsole::from_streams(io::empty(), Vec::new(), no_interrupt());
        console.write_str("ok\n").unwrap();
        console.flush().unwrap();

        assert_eq!(console.output, b"ok\n".to_vec());
    }
}
