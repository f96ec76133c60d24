use std::fmt;

/// Default capacity: 16 rows of 16 cells.
pub const DEFAULT_CAPACITY: usize = 0x100;
/// Cells per row when memory is shown as a grid.
pub const ROW_WIDTH: usize = 16;

/// Fixed-size, byte-addressable program and data memory.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Memory {
    cells: Box<[u8]>,
}

impl Memory {
    /// All cells start at zero. The capacity never changes afterwards.
    pub fn new(capacity: usize) -> Self {
        Memory {
            cells: vec![0; capacity].into_boxed_slice(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    pub fn get(&self, addr: usize) -> Option<u8> {
        self.cells.get(addr).copied()
    }

    pub fn get_mut(&mut self, addr: usize) -> Option<&mut u8> {
        self.cells.get_mut(addr)
    }

    /// `len` cells starting at `addr`, or `None` if any of them is out of range.
    pub fn slice(&self, addr: usize, len: usize) -> Option<&[u8]> {
        self.cells.get(addr..addr.checked_add(len)?)
    }

    /// Copy `bytes` to the start of memory. On overflow nothing is written and the first
    /// address past the end is returned.
    pub fn load(&mut self, bytes: &[u8]) -> Result<(), usize> {
        if bytes.len() > self.capacity() {
            return Err(self.capacity());
        }
        self.cells[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    pub fn dump(&self) -> &[u8] {
        &self.cells
    }

    /// `(address, value)` for every cell.
    pub fn iter(&self) -> impl Iterator<Item = (usize, u8)> + '_ {
        self.cells.iter().copied().enumerate()
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.cells.chunks(ROW_WIDTH)
    }
}

impl Default for Memory {
    fn default() -> Self {
        Memory::new(DEFAULT_CAPACITY)
    }
}

impl fmt::Display for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.capacity();
        if len >= 1_024_000 {
            write!(f, "{} megabyte(s)", len / 1_000_000)
        } else if len >= 1000 {
            write!(f, "{} kilobyte(s)", len / 1000)
        } else {
            write!(f, "{} byte(s)", len)
        }
    }
}
