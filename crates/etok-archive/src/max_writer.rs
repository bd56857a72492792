use std::error::Error as StdError;
use std::io::{self, Write};

/// Raised by [`MaxWriter`] inside an `io::Error` when the ceiling is hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("max config size exceeded ({0} bytes)")]
pub struct MaxSizeError(pub u64);

/// Counts the bytes passed to the wrapped writer and refuses any write that
/// would take the total past `max`. A `max` of zero never refuses.
#[derive(Debug)]
pub struct MaxWriter<W> {
    inner: W,
    tally: u64,
    max: u64,
}

impl<W: Write> MaxWriter<W> {
    pub fn new(inner: W, max: u64) -> Self {
        Self {
            inner,
            tally: 0,
            max,
        }
    }

    /// Bytes accepted by the wrapped writer so far.
    pub fn tally(&self) -> u64 {
        self.tally
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for MaxWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.max != 0 && self.tally + buf.len() as u64 > self.max {
            return Err(io::Error::other(MaxSizeError(self.max)));
        }
        let n = self.inner.write(buf)?;
        self.tally += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Find a [`MaxSizeError`] anywhere in the cause chain of `err`.
pub fn max_size_error(err: &io::Error) -> Option<MaxSizeError> {
    let mut cause: Option<&(dyn StdError + 'static)> =
        err.get_ref().map(|e| e as &(dyn StdError + 'static));
    while let Some(current) = cause {
        if let Some(found) = current.downcast_ref::<MaxSizeError>() {
            return Some(*found);
        }
        cause = match current.downcast_ref::<io::Error>() {
            Some(inner) => inner.get_ref().map(|e| e as &(dyn StdError + 'static)),
            None => current.source(),
        };
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_accepts_everything() {
        let mut w = MaxWriter::new(Vec::new(), 0);
        w.write_all(&[0u8; 4096]).unwrap();
        assert_eq!(w.tally(), 4096);
        assert_eq!(w.into_inner().len(), 4096);
    }

    #[test]
    fn write_up_to_limit_succeeds() {
        let mut w = MaxWriter::new(Vec::new(), 10);
        w.write_all(b"0123456789").unwrap();
        assert_eq!(w.tally(), 10);
    }

    #[test]
    fn write_past_limit_fails_with_limit() {
        let mut w = MaxWriter::new(Vec::new(), 10);
        w.write_all(b"01234").unwrap();
        let err = w.write_all(b"567890").unwrap_err();

        assert_eq!(max_size_error(&err), Some(MaxSizeError(10)));
        // nothing from the refused write reached the sink
        assert_eq!(w.tally(), 5);
        assert_eq!(w.get_ref().as_slice(), b"01234");
    }

    #[test]
    fn cause_found_through_wrapping() {
        let inner = io::Error::other(MaxSizeError(7));
        let outer = io::Error::new(io::ErrorKind::Other, inner);
        assert_eq!(max_size_error(&outer), Some(MaxSizeError(7)));
    }

    #[test]
    fn unrelated_errors_have_no_cause() {
        let err = io::Error::new(io::ErrorKind::BrokenPipe, "pipe");
        assert_eq!(max_size_error(&err), None);
    }
}
