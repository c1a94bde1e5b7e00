//! Reusable staging buffer.

use stratus_types::{Element, StratusError, StratusResult};

/// Flat buffer sized for the largest local domain of a cycle.
///
/// Backed by 8-byte words so that any [`Element`] view is aligned. The
/// buffer only grows; one allocation serves every field of a cycle.
#[derive(Debug, Default)]
pub struct StagingBuffer {
    words: Vec<u64>,
}

impl StagingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A buffer able to hold `cells` elements of `elem_bytes` each.
    pub fn with_capacity(cells: usize, elem_bytes: usize) -> Self {
        let mut buf = Self::new();
        buf.ensure(cells, elem_bytes);
        buf
    }

    /// Grows the buffer to hold at least `cells` elements of `elem_bytes` each.
    pub fn ensure(&mut self, cells: usize, elem_bytes: usize) {
        let words = (cells * elem_bytes).div_ceil(8);
        if self.words.len() < words {
            self.words.resize(words, 0);
        }
    }

    /// Capacity in bytes.
    pub fn capacity_bytes(&self) -> usize {
        self.words.len() * 8
    }

    /// Typed view of the first `cells` elements.
    pub fn slice_mut<T: Element>(&mut self, cells: usize) -> StratusResult<&mut [T]> {
        let all: &mut [T] = bytemuck::try_cast_slice_mut(self.words.as_mut_slice())
            .map_err(|e| StratusError::Precondition(format!("Staging view failed: {e}")))?;
        let available = all.len();
        all.get_mut(..cells).ok_or_else(|| {
            StratusError::Precondition(format!(
                "Staging buffer holds {available} elements, {cells} requested"
            ))
        })
    }

    /// Raw bytes of the first `cells` elements of type `T`.
    pub fn bytes<T: Element>(&self, cells: usize) -> StratusResult<&[u8]> {
        let len = cells * std::mem::size_of::<T>();
        let all: &[u8] = bytemuck::cast_slice(self.words.as_slice());
        all.get(..len).ok_or_else(|| {
            StratusError::Precondition(format!(
                "Staging buffer holds {} bytes, {len} requested",
                all.len()
            ))
        })
    }

    /// Releases the allocation.
    pub fn release(&mut self) {
        self.words = Vec::new();
    }
}
