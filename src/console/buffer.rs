use std::collections::VecDeque;

use super::{Console, ConsoleError};

/// A console backed by in-memory queues.
///
/// Input is consumed from a queue filled up front or with
/// [`push_input`](Self::push_input); output accumulates until taken.
#[derive(Debug, Default, Clone)]
pub struct BufferConsole {
    input: VecDeque<u8>,
    output: Vec<u8>,
}

impl BufferConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(input: &[u8]) -> Self {
        Self {
            input: input.iter().copied().collect(),
            output: Vec::new(),
        }
    }

    pub fn push_input(&mut self, input: &[u8]) {
        self.input.extend(input.iter().copied());
    }

    /// Number of input characters not yet read.
    pub fn pending_input(&self) -> usize {
        self.input.len()
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Output decoded lossily as UTF-8.
    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }
}

impl Console for BufferConsole {
    fn key_available(&mut self) -> Result<bool, ConsoleError> {
        Ok(!self.input.is_empty())
    }

    fn read_char(&mut self) -> Result<u8, ConsoleError> {
        self.input.pop_front().ok_or(ConsoleError::EndOfInput)
    }

    fn write_char(&mut self, ch: u8) -> Result<(), ConsoleError> {
        self.output.push(ch);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ConsoleError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_queue() {
        let mut console = BufferConsole::with_input(b"hi");
        console.push_input(b"!");

        assert!(console.key_available().unwrap());
        assert_eq!(console.read_char().unwrap(), b'h');
        assert_eq!(console.read_char().unwrap(), b'i');
        assert_eq!(console.read_char().unwrap(), b'!');
        assert!(!console.key_available().unwrap());
        assert!(matches!(console.read_char(), Err(ConsoleError::EndOfInput)));
    }

    #[test]
    fn test_output_capture() {
        let mut console = BufferConsole::new();
        console.write_str("HALT\n").unwrap();

        assert_eq!(console.output_string(), "HALT\n");
        assert_eq!(console.take_output(), b"HALT\n".to_vec());
        assert!(console.output().is_empty());
    }
}
