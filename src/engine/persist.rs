//! Binary snapshots of a `SalienceSet`.
//!
//! Layout (little-endian):
//!
//! ```text
//! total_weight: f64
//! count:        u32
//! weights:      f64 × count
//! items:        u32 × count   (pointers into an external object table)
//! ```
//!
//! Items are never inlined. The caller supplies a [`PointerTable`] that maps
//! items to pointers on write and back on read, so the items themselves can be
//! persisted by whatever owns them.

use super::salience::{SalienceSet, check_finite};
use crate::Error;
use std::io::{Read, Write};

/// Entries reserved up front when reading; the stored count is untrusted.
const PREALLOCATE_LIMIT: usize = 1024;

/// Maps items to stable pointers and back.
pub trait PointerTable<T> {
    fn write_pointer(&mut self, item: &T) -> u32;
    fn read_pointer(&self, pointer: u32) -> Option<T>;
}

/// A `Vec` is the simplest object table: pointers are indices, and equal items
/// share a pointer.
impl<T: Clone + PartialEq> PointerTable<T> for Vec<T> {
    fn write_pointer(&mut self, item: &T) -> u32 {
        match self.iter().position(|known| known == item) {
            Some(index) => index as u32,
            None => {
                self.push(item.clone());
                (self.len() - 1) as u32
            }
        }
    }

    fn read_pointer(&self, pointer: u32) -> Option<T> {
        self.get(pointer as usize).cloned()
    }
}

impl<T: Clone + PartialEq> SalienceSet<T> {
    /// Write the set, registering each item in `table`.
    pub fn write_to<W: Write, P: PointerTable<T>>(&self, writer: &mut W, table: &mut P) -> Result<(), Error> {
        writer.write_all(&self.total_weight().to_le_bytes())?;
        writer.write_all(&(self.len() as u32).to_le_bytes())?;
        for (weight, _) in self.iter() {
            writer.write_all(&weight.to_le_bytes())?;
        }
        for (_, item) in self.iter() {
            writer.write_all(&table.write_pointer(item).to_le_bytes())?;
        }
        Ok(())
    }

    /// Read a set written by [`write_to`](Self::write_to).
    ///
    /// Entries come back in their original order and the stored total is
    /// trusted as-is. The stored count only bounds the read loop; buffers grow
    /// with the entries actually present.
    pub fn read_from<R: Read, P: PointerTable<T>>(reader: &mut R, table: &P) -> Result<Self, Error> {
        let total = check_finite(read_f64(reader)?)?;
        let count = read_u32(reader)? as usize;

        let mut weights = Vec::with_capacity(count.min(PREALLOCATE_LIMIT));
        for _ in 0..count {
            weights.push(check_finite(read_f64(reader)?)?);
        }

        let mut entries = Vec::with_capacity(weights.len());
        for weight in weights {
            let pointer = read_u32(reader)?;
            let item = table.read_pointer(pointer).ok_or(Error::DanglingPointer(pointer))?;
            entries.push((weight, item));
        }

        Ok(SalienceSet::from_parts(total, entries))
    }
}

fn read_f64<R: Read>(reader: &mut R) -> Result<f64, Error> {
    let mut bytes = [0u8; 8];
    reader.read_exact(&mut bytes)?;
    Ok(f64::from_le_bytes(bytes))
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32, Error> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}
