//! The fragment table:
//! where each fragment of a pixel data element lives.
//!
//! Encapsulated pixel data is a sequence of items,
//! each one prefixed by an 8-byte header
//! (item tag `(FFFE,E000)` and a 32-bit little endian length)
//! and terminated by a sequence delimiter `(FFFE,E0DD)`.
//! Slot 0 is the basic offset table,
//! frame data begins at slot 1.
//!
//! The table does not need to know the item boundaries in advance.
//! Slots are resolved lazily by reading the next item header
//! at the physical offset right after the previous item,
//! so that only the fragments actually visited are ever inspected.
use crate::error::{
    ReadFragmentSnafu, ReadItemHeaderSnafu, Result, SeekSourceSnafu, UndefinedItemLengthSnafu,
    UnexpectedItemTagSnafu,
};
use crate::header::{self, ITEM, SEQUENCE_DELIMITER};
use byteordered::byteorder::{ByteOrder, LittleEndian};
use byteordered::Endianness;
use snafu::{OptionExt, ResultExt};
use std::io::{Read, Seek, SeekFrom};
use tracing::{debug, warn};

/// A slot of the fragment table.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// Fragment content held in memory.
    Inline(Vec<u8>),
    /// Fragment content at a known position of the underlying source.
    Resolved {
        /// physical offset of the first byte of the fragment's value
        offset: u64,
        /// the fragment's value length in bytes
        length: u32,
        /// the byte order of multi-byte samples in the fragment
        endianness: Endianness,
    },
    /// Fragment not yet discovered.
    Unresolved,
}

impl Fragment {
    /// The length of the fragment in bytes,
    /// or `None` if it is not resolved yet.
    pub fn len(&self) -> Option<u64> {
        match self {
            Fragment::Inline(data) => Some(data.len() as u64),
            Fragment::Resolved { length, .. } => Some(u64::from(*length)),
            Fragment::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, Fragment::Unresolved)
    }
}

/// An ordered, monotonically growing list of fragment slots.
#[derive(Debug, Clone)]
pub struct FragmentTable {
    fragments: Vec<Fragment>,
    /// number of leading slots which are resolved
    resolved: usize,
    /// physical offset of the next item header to read
    next_header: u64,
    sealed: bool,
    end_offset: Option<u64>,
    endianness: Endianness,
}

impl FragmentTable {
    /// Create a table for encapsulated pixel data
    /// whose first item header (the basic offset table)
    /// is at the given physical offset.
    pub fn encapsulated(offset: u64) -> Self {
        FragmentTable {
            fragments: Vec::new(),
            resolved: 0,
            next_header: offset,
            sealed: false,
            end_offset: None,
            endianness: Endianness::Little,
        }
    }

    /// Create a table for native pixel data:
    /// slot 1 is the whole value of the pixel data element,
    /// at the given physical offset.
    pub fn native(offset: u64, length: u32, endianness: Endianness) -> Self {
        FragmentTable {
            fragments: vec![
                Fragment::Inline(Vec::new()),
                Fragment::Resolved {
                    offset,
                    length,
                    endianness,
                },
            ],
            resolved: 2,
            next_header: offset + u64::from(length),
            sealed: true,
            end_offset: Some(offset + u64::from(length)),
            endianness,
        }
    }

    /// Create a table for native pixel data already in memory.
    pub fn native_inline(data: Vec<u8>) -> Self {
        Self::from_slots(vec![Fragment::Inline(Vec::new()), Fragment::Inline(data)])
    }

    /// Create a sealed table of in-memory fragments,
    /// with the given basic offset table in slot 0.
    pub fn from_fragments<I>(offset_table: &[u32], fragments: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let mut bot = vec![0; offset_table.len() * 4];
        LittleEndian::write_u32_into(offset_table, &mut bot);
        Self::from_slots(
            std::iter::once(Fragment::Inline(bot))
                .chain(fragments.into_iter().map(Fragment::Inline))
                .collect(),
        )
    }

    fn from_slots(fragments: Vec<Fragment>) -> Self {
        FragmentTable {
            resolved: fragments.len(),
            fragments,
            next_header: 0,
            sealed: true,
            end_offset: None,
            endianness: Endianness::Little,
        }
    }

    /// Pre-allocate unresolved slots for the given number of data fragments,
    /// so that the table does not reallocate during resolution.
    pub fn with_expected_fragments(mut self, count: usize) -> Self {
        if !self.sealed {
            let target = count + 1;
            if self.fragments.len() < target {
                self.fragments.resize(target, Fragment::Unresolved);
            }
        }
        self
    }

    /// The number of known slots, including the basic offset table
    /// and any pre-allocated unresolved slots.
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// The number of slots resolved so far.
    pub fn resolved_len(&self) -> usize {
        self.resolved
    }

    pub fn get(&self, slot: usize) -> Option<&Fragment> {
        self.fragments.get(slot)
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Whether the end of the sequence was found,
    /// in which case the number of slots is final.
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// The physical offset right after the sequence delimiter,
    /// known once the table is sealed.
    pub fn end_offset(&self) -> Option<u64> {
        self.end_offset
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Resolve every slot up to and including `slot`.
    ///
    /// Returns `Ok(false)` if the sequence ended before that slot.
    pub fn resolve<S>(&mut self, source: &mut S, slot: usize) -> Result<bool>
    where
        S: ?Sized + Read + Seek,
    {
        while self.resolved <= slot {
            if !self.resolve_next(source)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Resolve the next unresolved slot
    /// by reading the item header after the last resolved item.
    ///
    /// Returns `Ok(false)` if there are no more fragments.
    pub fn resolve_next<S>(&mut self, source: &mut S) -> Result<bool>
    where
        S: ?Sized + Read + Seek,
    {
        if self.sealed {
            return Ok(false);
        }
        let offset = self.next_header;
        source
            .seek(SeekFrom::Start(offset))
            .context(SeekSourceSnafu { offset })?;

        match header::read_item_header(source).context(ReadItemHeaderSnafu { offset })? {
            None => {
                warn!(
                    "Pixel data sequence ended at offset {} without a delimiter",
                    offset
                );
                self.seal(offset);
                Ok(false)
            }
            Some((SEQUENCE_DELIMITER, _)) => {
                debug!(
                    "Sequence delimiter at offset {}, {} slots",
                    offset, self.resolved
                );
                self.seal(offset + 8);
                Ok(false)
            }
            Some((ITEM, len)) => {
                let length = len.get().context(UndefinedItemLengthSnafu { offset })?;
                let fragment = Fragment::Resolved {
                    offset: offset + 8,
                    length,
                    endianness: self.endianness,
                };
                if self.resolved < self.fragments.len() {
                    self.fragments[self.resolved] = fragment;
                } else {
                    self.fragments.push(fragment);
                }
                self.resolved += 1;
                self.next_header = offset + 8 + u64::from(length);
                Ok(true)
            }
            Some((tag, _)) => UnexpectedItemTagSnafu { tag, offset }.fail(),
        }
    }

    /// Resolve all remaining slots.
    pub fn resolve_all<S>(&mut self, source: &mut S) -> Result<()>
    where
        S: ?Sized + Read + Seek,
    {
        while self.resolve_next(source)? {}
        Ok(())
    }

    fn seal(&mut self, end_offset: u64) {
        self.sealed = true;
        self.end_offset = Some(end_offset);
        // pre-allocated slots past the end never existed
        self.fragments.truncate(self.resolved);
    }

    /// Read the full contents of a slot.
    ///
    /// Returns `Ok(None)` if the sequence ended before that slot.
    pub fn read_slot<S>(&mut self, source: &mut S, slot: usize) -> Result<Option<Vec<u8>>>
    where
        S: ?Sized + Read + Seek,
    {
        if !self.resolve(source, slot)? {
            return Ok(None);
        }
        match &self.fragments[slot] {
            Fragment::Inline(data) => Ok(Some(data.clone())),
            Fragment::Resolved { offset, length, .. } => {
                let offset = *offset;
                source
                    .seek(SeekFrom::Start(offset))
                    .context(SeekSourceSnafu { offset })?;
                let mut data = vec![0; *length as usize];
                source
                    .read_exact(&mut data)
                    .context(ReadFragmentSnafu { slot })?;
                Ok(Some(data))
            }
            Fragment::Unresolved => Ok(None),
        }
    }

    /// Read and decode the basic offset table in slot 0.
    ///
    /// An empty offset table yields an empty vector.
    pub fn offset_table<S>(&mut self, source: &mut S) -> Result<Vec<u32>>
    where
        S: ?Sized + Read + Seek,
    {
        let data = self.read_slot(source, 0)?.unwrap_or_default();
        Ok(data.chunks_exact(4).map(LittleEndian::read_u32).collect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::Error;
    use crate::header::{write_item_header, Length};
    use crate::Tag;
    use std::io::Cursor;

    /// Build the bytes of an encapsulated pixel data value
    /// (items and sequence delimiter),
    /// preceded by `prefix` filler bytes.
    pub(crate) fn encapsulated_bytes(prefix: usize, bot: &[u32], fragments: &[Vec<u8>]) -> Vec<u8> {
        let mut out = vec![0xAA; prefix];
        let mut table = vec![0; bot.len() * 4];
        LittleEndian::write_u32_into(bot, &mut table);
        write_item_header(&mut out, ITEM, Length(table.len() as u32)).unwrap();
        out.extend(table);
        for fragment in fragments {
            write_item_header(&mut out, ITEM, Length(fragment.len() as u32)).unwrap();
            out.extend(fragment);
        }
        write_item_header(&mut out, SEQUENCE_DELIMITER, Length(0)).unwrap();
        out
    }

    #[test]
    fn resolve_lazily() {
        let data = encapsulated_bytes(16, &[], &[vec![1; 40], vec![2; 60], vec![3; 50]]);
        let mut source = Cursor::new(data);
        let mut table = FragmentTable::encapsulated(16);

        assert!(table.resolve(&mut source, 1).unwrap());
        assert_eq!(table.resolved_len(), 2);
        assert_eq!(
            table.get(0),
            Some(&Fragment::Resolved {
                offset: 24,
                length: 0,
                endianness: Endianness::Little
            })
        );
        assert_eq!(table.get(1).and_then(Fragment::len), Some(40));
        assert!(!table.is_sealed());

        assert!(table.resolve(&mut source, 3).unwrap());
        assert!(!table.resolve(&mut source, 4).unwrap());
        assert!(table.is_sealed());
        assert_eq!(table.len(), 4);
        // 16 prefix + 8 BOT header + 3 * 8 headers + 150 data + 8 delimiter
        assert_eq!(table.end_offset(), Some(16 + 8 + 24 + 150 + 8));
    }

    #[test]
    fn resolution_is_idempotent() {
        let data = encapsulated_bytes(0, &[], &[vec![1; 10], vec![2; 20]]);
        let mut source = Cursor::new(data);
        let mut table = FragmentTable::encapsulated(0);
        table.resolve(&mut source, 2).unwrap();
        let before = table.fragments().to_vec();
        table.resolve(&mut source, 1).unwrap();
        table.resolve(&mut source, 2).unwrap();
        assert_eq!(table.fragments(), &before[..]);
    }

    #[test]
    fn read_slot_and_offset_table() {
        let data = encapsulated_bytes(4, &[0, 48], &[vec![7; 40], vec![9; 60]]);
        let mut source = Cursor::new(data);
        let mut table = FragmentTable::encapsulated(4);
        assert_eq!(table.offset_table(&mut source).unwrap(), vec![0, 48]);
        assert_eq!(table.read_slot(&mut source, 2).unwrap(), Some(vec![9; 60]));
        assert_eq!(table.read_slot(&mut source, 3).unwrap(), None);
    }

    #[test]
    fn pre_allocated_slots_are_dropped_at_the_end() {
        let data = encapsulated_bytes(0, &[], &[vec![1; 4]]);
        let mut source = Cursor::new(data);
        let mut table = FragmentTable::encapsulated(0).with_expected_fragments(5);
        assert_eq!(table.len(), 6);
        assert_eq!(table.get(3), Some(&Fragment::Unresolved));
        table.resolve_all(&mut source).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.fragments().iter().all(Fragment::is_resolved));
    }

    #[test]
    fn unexpected_tag_is_an_error() {
        let mut data = encapsulated_bytes(0, &[], &[vec![1; 4]]);
        // overwrite the fragment's item tag
        data[8..12].copy_from_slice(&[0x08, 0x00, 0x16, 0x00]);
        let mut source = Cursor::new(data);
        let mut table = FragmentTable::encapsulated(0);
        let err = table.resolve(&mut source, 1).unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedItemTag {
                tag: Tag(0x0008, 0x0016),
                offset: 8,
                ..
            }
        ));
    }

    #[test]
    fn undefined_item_length_is_an_error() {
        let mut data = Vec::new();
        write_item_header(&mut data, ITEM, Length::UNDEFINED).unwrap();
        let mut table = FragmentTable::encapsulated(0);
        let err = table.resolve(&mut Cursor::new(data), 0).unwrap_err();
        assert!(matches!(err, Error::UndefinedItemLength { offset: 0, .. }));
    }

    #[test]
    fn end_of_source_at_item_boundary() {
        let mut data = encapsulated_bytes(0, &[], &[vec![1; 4]]);
        // drop the sequence delimiter
        data.truncate(data.len() - 8);
        let mut source = Cursor::new(data);
        let mut table = FragmentTable::encapsulated(0);
        table.resolve_all(&mut source).unwrap();
        assert!(table.is_sealed());
        assert_eq!(table.len(), 2);
        assert_eq!(table.end_offset(), Some(20));
    }

    #[test]
    fn truncated_header_is_an_io_error() {
        let mut data = encapsulated_bytes(0, &[], &[vec![1; 4]]);
        data.truncate(data.len() - 3);
        let mut table = FragmentTable::encapsulated(0);
        let err = table.resolve_all(&mut Cursor::new(data)).unwrap_err();
        assert!(matches!(err, Error::ReadItemHeader { offset: 20, .. }));
    }

    #[test]
    fn native_table() {
        let table = FragmentTable::native(1000, 256, Endianness::Big);
        assert!(table.is_sealed());
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1).and_then(Fragment::len), Some(256));
        assert_eq!(table.end_offset(), Some(1256));
    }
}
