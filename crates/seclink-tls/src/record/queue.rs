//! Outgoing record queue.
//!
//! Encoded records wait here until the transport accepts them. A short
//! write keeps its offset so a retry after WouldBlock resumes mid-record
//! instead of resending bytes.

use std::collections::VecDeque;
use std::io::Write;

use seclink_types::TlsError;

#[derive(Default)]
pub struct RecordQueue {
    queue: VecDeque<Vec<u8>>,
    offset: usize,
}

impl RecordQueue {
    pub fn new() -> Self {
        RecordQueue::default()
    }

    pub fn push(&mut self, record: Vec<u8>) {
        self.queue.push_back(record);
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drop everything still queued. Used when a connection dies and only
    /// a final alert should go out.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.offset = 0;
    }

    /// Write queued records until the queue drains or the transport blocks.
    /// An io WouldBlock surfaces as [`TlsError::WouldBlock`] with the queue
    /// position preserved.
    pub fn flush<W: Write>(&mut self, transport: &mut W) -> Result<(), TlsError> {
        while let Some(front) = self.queue.front() {
            let n = transport.write(&front[self.offset..])?;
            if n == 0 {
                return Err(TlsError::IoError(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "transport accepted no bytes",
                )));
            }
            self.offset += n;
            if self.offset == front.len() {
                self.queue.pop_front();
                self.offset = 0;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    /// Accepts at most `cap` bytes per call, then reports WouldBlock.
    struct Throttled {
        written: Vec<u8>,
        cap: usize,
        budget: usize,
    }

    impl Throttled {
        fn new(cap: usize, budget: usize) -> Self {
            Throttled {
                written: Vec::new(),
                cap,
                budget,
            }
        }
    }

    impl Write for Throttled {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.budget == 0 {
                return Err(io::Error::new(io::ErrorKind::WouldBlock, "throttled"));
            }
            self.budget -= 1;
            let n = buf.len().min(self.cap);
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_flush_drains_in_order() {
        let mut q = RecordQueue::new();
        q.push(vec![1, 2, 3]);
        q.push(vec![4, 5]);
        let mut t = Throttled::new(64, usize::MAX);
        q.flush(&mut t).unwrap();
        assert!(q.is_empty());
        assert_eq!(t.written, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_short_writes_resume_at_offset() {
        let mut q = RecordQueue::new();
        q.push(vec![10, 11, 12, 13, 14]);
        let mut t = Throttled::new(2, 1);
        assert!(matches!(q.flush(&mut t), Err(TlsError::WouldBlock)));
        assert_eq!(t.written, vec![10, 11]);
        assert!(!q.is_empty());

        t.budget = usize::MAX;
        q.flush(&mut t).unwrap();
        assert_eq!(t.written, vec![10, 11, 12, 13, 14]);
        assert!(q.is_empty());
    }

    #[test]
    fn test_zero_length_write_is_an_error() {
        let mut q = RecordQueue::new();
        q.push(vec![1]);
        let mut t = Throttled::new(0, usize::MAX);
        assert!(matches!(q.flush(&mut t), Err(TlsError::IoError(_))));
    }
}
