//! Duck Machine memory subsystem.
//!
//! Memory is a flat array of 32-bit words addressed from 0. The CPU
//! owns it exclusively; a program image is copied in before a run.

use serde::{Deserialize, Serialize};

/// Default number of memory words.
pub const DEFAULT_MEMORY_WORDS: usize = 1024;

/// Word-addressed main memory.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    cells: Vec<u32>,
}

impl Memory {
    /// Create a memory of `words` zeroed cells.
    pub fn new(words: usize) -> Self {
        Self {
            cells: vec![0; words],
        }
    }

    /// Number of words.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Read the word at `addr`.
    pub fn read(&self, addr: i32) -> Result<u32, MemoryError> {
        let index = self.index(addr)?;
        Ok(self.cells[index])
    }

    /// Write `value` at `addr`.
    pub fn write(&mut self, addr: i32, value: u32) -> Result<(), MemoryError> {
        let index = self.index(addr)?;
        self.cells[index] = value;
        Ok(())
    }

    /// Map a signed effective address to a cell index.
    fn index(&self, addr: i32) -> Result<usize, MemoryError> {
        usize::try_from(addr)
            .ok()
            .filter(|&index| index < self.cells.len())
            .ok_or(MemoryError::AddressOutOfRange {
                addr,
                size: self.cells.len(),
            })
    }

    /// Clear all memory to zeros.
    pub fn clear(&mut self) {
        self.cells.iter_mut().for_each(|cell| *cell = 0);
    }

    /// Copy a program image into memory starting at `base`.
    pub fn load_image(&mut self, base: u32, image: &[u32]) -> Result<(), MemoryError> {
        let base = base as usize;
        let available = self.cells.len().saturating_sub(base);
        if base > self.cells.len() || image.len() > available {
            return Err(MemoryError::ImageTooLarge {
                base,
                size: image.len(),
                available,
            });
        }

        self.cells[base..base + image.len()].copy_from_slice(image);
        Ok(())
    }

    /// Dump memory contents (for debugging).
    pub fn dump(&self, start: usize, count: usize) -> Vec<(usize, u32)> {
        let end = start.saturating_add(count).min(self.cells.len());
        (start.min(end)..end).map(|i| (i, self.cells[i])).collect()
    }

    /// All cells, lowest address first.
    pub fn as_slice(&self) -> &[u32] {
        &self.cells
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_WORDS)
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Only count non-zero cells
        let non_zero = self.cells.iter().filter(|&&cell| cell != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &self.cells.len())
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// Address is outside valid memory range.
    AddressOutOfRange { addr: i32, size: usize },
    /// Program image does not fit above its base address.
    ImageTooLarge { base: usize, size: usize, available: usize },
}

impl std::fmt::Display for MemoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryError::AddressOutOfRange { addr, size } => {
                write!(f, "memory address {} out of range (0 to {})", addr, size.saturating_sub(1))
            }
            MemoryError::ImageTooLarge { base, size, available } => {
                write!(
                    f,
                    "image of {} words at base {} exceeds available space {}",
                    size, base, available
                )
            }
        }
    }
}

impl std::error::Error for MemoryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_read_write() {
        let mut mem = Memory::new(16);
        mem.write(10, 42).unwrap();
        assert_eq!(mem.read(10), Ok(42));
    }

    #[test]
    fn test_memory_bounds() {
        let mem = Memory::new(16);

        assert!(mem.read(0).is_ok());
        assert!(mem.read(15).is_ok());

        assert_eq!(
            mem.read(16),
            Err(MemoryError::AddressOutOfRange { addr: 16, size: 16 })
        );
        assert!(mem.read(-1).is_err());
    }

    #[test]
    fn test_failed_write_changes_nothing() {
        let mut mem = Memory::new(4);
        let before = mem.clone();
        assert!(mem.write(4, 99).is_err());
        assert_eq!(mem, before);
    }

    #[test]
    fn test_load_image() {
        let mut mem = Memory::new(8);
        mem.load_image(2, &[1, 2, 3]).unwrap();

        assert_eq!(mem.dump(0, 6), vec![(0, 0), (1, 0), (2, 1), (3, 2), (4, 3), (5, 0)]);
    }

    #[test]
    fn test_load_image_too_large() {
        let mut mem = Memory::new(4);
        assert_eq!(
            mem.load_image(2, &[1, 2, 3]),
            Err(MemoryError::ImageTooLarge { base: 2, size: 3, available: 2 })
        );
        assert!(mem.load_image(10, &[1]).is_err());
        assert!(mem.load_image(4, &[]).is_ok());
    }

    #[test]
    fn test_clear() {
        let mut mem = Memory::new(4);
        mem.load_image(0, &[7, 7, 7, 7]).unwrap();
        mem.clear();
        assert!(mem.as_slice().iter().all(|&w| w == 0));
    }
}
