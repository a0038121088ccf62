//! Memory-read collaborator seam
//!
//! The engine never touches the traced process's memory directly; every
//! pointer-family decode goes through this trait. Implementations are
//! expected to be synchronous and non-blocking.

use anyhow::Result;

use crate::value::{Address, RawWord};

/// Raw memory-read primitives supplied by the host.
///
/// All methods take absolute addresses in the traced process. Errors are
/// host-defined; the engine wraps them into its own decode taxonomy.
pub trait MemoryReader: Send + Sync {
    /// Read one pointer-sized word.
    fn read_pointer(&self, address: Address) -> Result<RawWord>;

    fn read_u8(&self, address: Address) -> Result<u8>;

    fn read_u16(&self, address: Address) -> Result<u16>;

    fn read_i32(&self, address: Address) -> Result<i32>;

    /// Read exactly `len` bytes.
    fn read_bytes(&self, address: Address, len: usize) -> Result<Vec<u8>>;

    /// Read a UTF-8 string, bounded by `len` bytes or NUL-terminated when
    /// `len` is `None`.
    fn read_utf8(&self, address: Address, len: Option<usize>) -> Result<String>;

    /// Read a UTF-16 string, bounded by `len` code units or NUL-terminated
    /// when `len` is `None`.
    fn read_utf16(&self, address: Address, len: Option<usize>) -> Result<String>;

    /// Width in bytes of one pointer slot, used when walking vtables.
    fn pointer_width(&self) -> u64 {
        std::mem::size_of::<usize>() as u64
    }
}
