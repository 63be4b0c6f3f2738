//! Serial link abstractions
//!
//! The frame link is a single half-duplex UART. Writes go out in one piece;
//! reads are always bounded so the caller's loop keeps running even when the
//! peer is silent.

/// Serial transmitter
pub trait SerialTx {
    /// Error type for transmit operations
    type Error;

    /// Write all of `data` to the link
    fn write_all(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Flush any buffered data
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// Serial receiver
pub trait SerialRx {
    /// Error type for receive operations
    type Error;

    /// Read whatever is available into `buf`, waiting at most `timeout_ms`
    ///
    /// Returns the number of bytes read. `Ok(0)` means the poll window
    /// elapsed without data and is not an error.
    fn read_timeout(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error>;
}
