use crate::{HashError, ObjectId};

/// Size of a serialized fan-out table.
pub const FANOUT_BYTES: usize = 256 * 4;

/// Cumulative object counts by leading sha byte.
///
/// Entry `i` holds the number of objects whose first byte is `<= i`, so the
/// objects starting with byte `b` occupy `table[b-1]..table[b]` of a sorted
/// sha table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanoutTable {
    table: [u32; 256],
}

impl FanoutTable {
    /// Build from ids that are already sorted ascending.
    pub fn build(sorted: &[ObjectId]) -> Self {
        let mut table = [0u32; 256];
        for oid in sorted {
            table[oid.first_byte() as usize] += 1;
        }
        let mut running = 0u32;
        for slot in table.iter_mut() {
            running += *slot;
            *slot = running;
        }
        Self { table }
    }

    /// Index range of the bucket for `first_byte`.
    pub fn range(&self, first_byte: u8) -> std::ops::Range<usize> {
        let end = self.table[first_byte as usize] as usize;
        let start = match first_byte {
            0 => 0,
            b => self.table[b as usize - 1] as usize,
        };
        start..end
    }

    /// Total object count (the last entry).
    pub fn total(&self) -> u32 {
        self.table[255]
    }

    pub fn get(&self, index: u8) -> u32 {
        self.table[index as usize]
    }

    /// Parse 256 big-endian `u32`s, rejecting a table that ever decreases.
    pub fn from_bytes(data: &[u8]) -> Result<Self, HashError> {
        if data.len() < FANOUT_BYTES {
            return Err(HashError::TruncatedFanout(data.len()));
        }
        let mut table = [0u32; 256];
        for (i, chunk) in data[..FANOUT_BYTES].chunks_exact(4).enumerate() {
            table[i] = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            if i > 0 && table[i] < table[i - 1] {
                return Err(HashError::NonMonotonicFanout { index: i });
            }
        }
        Ok(Self { table })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.table.iter().flat_map(|n| n.to_be_bytes()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid_starting_with(b: u8) -> ObjectId {
        let mut bytes = [0u8; 20];
        bytes[0] = b;
        ObjectId::new(bytes)
    }

    #[test]
    fn buckets_and_gaps() {
        let oids: Vec<_> = [0x00, 0x00, 0x01, 0x05, 0xff]
            .into_iter()
            .map(oid_starting_with)
            .collect();
        let ft = FanoutTable::build(&oids);
        assert_eq!(ft.total(), 5);
        assert_eq!(ft.range(0x00), 0..2);
        assert_eq!(ft.range(0x02), 3..3);
        assert_eq!(ft.get(0x04), 3);
        assert_eq!(ft.range(0xff), 4..5);
    }

    #[test]
    fn serialized_form_parses_back() {
        let oids: Vec<_> = (0..=255u8).map(oid_starting_with).collect();
        let ft = FanoutTable::build(&oids);
        let bytes = ft.to_bytes();
        assert_eq!(bytes.len(), FANOUT_BYTES);
        assert_eq!(FanoutTable::from_bytes(&bytes).unwrap(), ft);
    }

    #[test]
    fn decreasing_table_rejected() {
        let mut bytes = vec![0u8; FANOUT_BYTES];
        bytes[3] = 5;
        assert!(matches!(
            FanoutTable::from_bytes(&bytes),
            Err(HashError::NonMonotonicFanout { index: 1 })
        ));
    }

    #[test]
    fn short_input_rejected() {
        assert!(matches!(
            FanoutTable::from_bytes(&[0u8; 100]),
            Err(HashError::TruncatedFanout(100))
        ));
    }
}
