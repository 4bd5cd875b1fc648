//! Pattern matching against a child's output stream.
//!
//! Output arrives as raw byte chunks from a reader thread. The [`Expecter`]
//! decodes them, appends them to a buffer and waits until one of a set of
//! patterns matches. Text after the match stays buffered for the next call.

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use regex::Regex;

use crate::error::{Error, Result};

/// Result of a successful [`Expecter::expect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Index of the pattern that matched.
    pub index: usize,
    /// Everything received before the match.
    pub before: String,
    /// The matched text itself.
    pub matched: String,
}

/// Buffered, pattern-driven reader over a stream of output chunks.
pub struct Expecter {
    chunks: Receiver<Vec<u8>>,
    buffer: String,
    /// Trailing bytes of an incomplete UTF-8 sequence.
    partial: Vec<u8>,
    timeout: Option<Duration>,
}

impl Expecter {
    /// Create an expecter that waits without limit.
    pub fn new(chunks: Receiver<Vec<u8>>) -> Self {
        Self {
            chunks,
            buffer: String::new(),
            partial: Vec::new(),
            timeout: None,
        }
    }

    /// Give up on a single `expect` call after `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.set_timeout(timeout);
        self
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Text received but not yet consumed by a match.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Block until one of `patterns` matches the buffered output.
    ///
    /// When several patterns match, the one whose match starts first wins;
    /// ties go to the lower index.
    pub fn expect(&mut self, patterns: &[Regex]) -> Result<Match> {
        let deadline = self.timeout.map(|t| Instant::now() + t);

        loop {
            if let Some(found) = self.take_match(patterns) {
                return Ok(found);
            }
            self.receive(deadline)?;
        }
    }

    fn take_match(&mut self, patterns: &[Regex]) -> Option<Match> {
        let (index, start, end) = patterns
            .iter()
            .enumerate()
            .filter_map(|(i, re)| re.find(&self.buffer).map(|m| (i, m.start(), m.end())))
            .min_by_key(|&(i, start, _)| (start, i))?;

        let before = self.buffer[..start].to_string();
        let matched = self.buffer[start..end].to_string();
        self.buffer.drain(..end);

        Some(Match {
            index,
            before,
            matched,
        })
    }

    fn receive(&mut self, deadline: Option<Instant>) -> Result<()> {
        let chunk = match deadline {
            None => self.chunks.recv().map_err(|_| self.exited())?,
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match self.chunks.recv_timeout(remaining) {
                    Ok(chunk) => chunk,
                    Err(RecvTimeoutError::Timeout) => {
                        return Err(Error::Timeout(self.timeout.unwrap_or_default()));
                    }
                    Err(RecvTimeoutError::Disconnected) => return Err(self.exited()),
                }
            }
        };

        self.push_bytes(&chunk);
        Ok(())
    }

    fn exited(&self) -> Error {
        Error::ChildExited {
            pending: self.buffer.clone(),
        }
    }

    fn push_bytes(&mut self, chunk: &[u8]) {
        self.partial.extend_from_slice(chunk);
        let bytes = std::mem::take(&mut self.partial);

        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    self.buffer.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match e.error_len() {
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            // Sequence cut at the chunk boundary; wait for the rest.
                            self.partial = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn patterns(list: &[&str]) -> Vec<Regex> {
        list.iter().map(|p| Regex::new(p).unwrap()).collect()
    }

    #[test]
    fn test_match_across_chunks() {
        let (tx, rx) = mpsc::channel();
        let mut expecter = Expecter::new(rx);

        tx.send(b" => 3\n>".to_vec()).unwrap();
        tx.send(b">> ".to_vec()).unwrap();

        let m = expecter.expect(&patterns(&[">>> ", r"\.\.\. "])).unwrap();
        assert_eq!(m.index, 0);
        assert_eq!(m.before, " => 3\n");
        assert_eq!(m.matched, ">>> ");
        assert_eq!(expecter.pending(), "");
    }

    #[test]
    fn test_earliest_match_wins() {
        let (tx, rx) = mpsc::channel();
        let mut expecter = Expecter::new(rx);
        tx.send(b"... >>> ".to_vec()).unwrap();

        let m = expecter.expect(&patterns(&[">>> ", r"\.\.\. "])).unwrap();
        assert_eq!(m.index, 1);
        assert_eq!(m.before, "");
        assert_eq!(expecter.pending(), ">>> ");

        let m = expecter.expect(&patterns(&[">>> ", r"\.\.\. "])).unwrap();
        assert_eq!(m.index, 0);
    }

    #[test]
    fn test_tie_goes_to_lower_index() {
        let (tx, rx) = mpsc::channel();
        let mut expecter = Expecter::new(rx);
        tx.send(b"abc".to_vec()).unwrap();

        let m = expecter.expect(&patterns(&["a", "ab"])).unwrap();
        assert_eq!(m.index, 0);
        assert_eq!(expecter.pending(), "bc");
    }

    #[test]
    fn test_split_utf8_sequence() {
        let (tx, rx) = mpsc::channel();
        let mut expecter = Expecter::new(rx);
        let lambda = "λ\n>>> ".as_bytes();

        tx.send(lambda[..1].to_vec()).unwrap();
        tx.send(lambda[1..].to_vec()).unwrap();

        let m = expecter.expect(&patterns(&[">>> "])).unwrap();
        assert_eq!(m.before, "λ\n");
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let (tx, rx) = mpsc::channel();
        let mut expecter = Expecter::new(rx);
        tx.send(vec![b'a', 0xff, b'b', b'>', b'>', b'>', b' ']).unwrap();

        let m = expecter.expect(&patterns(&[">>> "])).unwrap();
        assert_eq!(m.before, "a\u{fffd}b");
    }

    #[test]
    fn test_disconnect_reports_pending_output() {
        let (tx, rx) = mpsc::channel();
        let mut expecter = Expecter::new(rx);
        tx.send(b"bye".to_vec()).unwrap();
        drop(tx);

        match expecter.expect(&patterns(&[">>> "])) {
            Err(Error::ChildExited { pending }) => assert_eq!(pending, "bye"),
            other => panic!("expected ChildExited, got {:?}", other),
        }
    }

    #[test]
    fn test_timeout() {
        let (_tx, rx) = mpsc::channel::<Vec<u8>>();
        let mut expecter = Expecter::new(rx).with_timeout(Some(Duration::from_millis(20)));

        assert!(matches!(
            expecter.expect(&patterns(&[">>> "])),
            Err(Error::Timeout(_))
        ));
    }
}
