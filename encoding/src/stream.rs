//! The segmented stream:
//! a seekable byte stream over the logical concatenation
//! of a range of fragments.
//!
//! Logical positions are mapped onto physical offsets of the underlying source
//! by walking the fragment table,
//! resolving fragments on demand along the way.
//! A stream over the whole object starts unbounded,
//! and its upper bound is pinned once the sequence delimiter is found.
//!
//! A stream borrows both the source and the fragment table.
//! Dropping it leaves the source open
//! and keeps every fragment resolved so far in the table.
use crate::error::{ReadFragmentSnafu, SeekSourceSnafu, WriteSinkSnafu};
use crate::fragment::{Fragment, FragmentTable};
use snafu::ResultExt;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::ops::Range;
use tracing::debug;

pub use crate::error::{Error, Result};

/// The default number of fragments resolved past a stream's upper bound
/// when looking for the end of the pixel data sequence.
pub const DEFAULT_RESOLVE_GUARD: usize = 16;

const TRANSFER_BUFFER_SIZE: usize = 8192;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct CurrentSlot {
    slot: usize,
    /// logical offset of the first byte of the slot
    start: u64,
    /// logical offset past the last byte of the slot
    end: u64,
}

/// A random access byte stream over a range of fragments.
///
/// Reads never cross a fragment boundary in a single call.
/// Once any operation fails,
/// the stream's state is unspecified and it should be discarded.
#[derive(Debug)]
pub struct SegmentedStream<'a, S: ?Sized> {
    source: &'a mut S,
    table: &'a mut FragmentTable,
    first_slot: usize,
    /// exclusive upper bound, open until pinned
    last_slot: Option<usize>,
    position: u64,
    current: Option<CurrentSlot>,
    /// logical length, once known
    known_end: Option<u64>,
    resolve_guard: usize,
}

impl<'a, S> SegmentedStream<'a, S>
where
    S: ?Sized + Read + Seek,
{
    /// Create a stream over every data fragment of the table (slots `1..`).
    pub fn whole_object(source: &'a mut S, table: &'a mut FragmentTable) -> Self {
        Self::new(source, table, 1, None)
    }

    /// Create a stream over the given range of slots.
    pub fn slots(source: &'a mut S, table: &'a mut FragmentTable, slots: Range<usize>) -> Self {
        let last = slots.end.max(slots.start);
        Self::new(source, table, slots.start, Some(last))
    }

    /// Create a stream over a single slot.
    pub fn single_slot(source: &'a mut S, table: &'a mut FragmentTable, slot: usize) -> Self {
        Self::slots(source, table, slot..slot + 1)
    }

    fn new(
        source: &'a mut S,
        table: &'a mut FragmentTable,
        first_slot: usize,
        last_slot: Option<usize>,
    ) -> Self {
        SegmentedStream {
            source,
            table,
            first_slot,
            last_slot,
            position: 0,
            current: None,
            known_end: None,
            resolve_guard: DEFAULT_RESOLVE_GUARD,
        }
    }

    /// Set the number of fragments which may be resolved
    /// past the stream's upper bound by [`offset_past_end`](Self::offset_past_end).
    pub fn with_resolve_guard(mut self, guard: usize) -> Self {
        self.resolve_guard = guard;
        self
    }

    /// The current logical position.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn first_slot(&self) -> usize {
        self.first_slot
    }

    /// The exclusive upper bound of the stream's slot range,
    /// or `None` if the end has not been found yet.
    pub fn last_slot(&self) -> Option<usize> {
        self.last_slot
    }

    /// The slot containing the current position, if any.
    pub fn current_slot(&self) -> Option<usize> {
        self.current.map(|c| c.slot)
    }

    /// Move to the given logical position.
    ///
    /// Positions past the end of the stream are accepted,
    /// subsequent reads will return no data.
    pub fn seek_to(&mut self, pos: u64) -> Result<u64> {
        // resume from the current slot when moving forward
        let (mut slot, mut start) = match self.current {
            Some(c) if pos >= c.start => (c.slot, c.start),
            _ => (self.first_slot, 0),
        };

        loop {
            if self.last_slot.map_or(false, |last| slot >= last)
                || !self.table.resolve(&mut *self.source, slot)?
            {
                if self.last_slot.map_or(true, |last| slot < last) {
                    debug!("Pinned stream upper bound at slot {}", slot);
                    self.last_slot = Some(slot);
                }
                self.known_end = Some(start);
                self.current = None;
                self.position = pos;
                return Ok(pos);
            }

            let fragment = &self.table.fragments()[slot];
            let end = start + fragment.len().unwrap_or(0);
            if pos < end {
                if let Fragment::Resolved { offset, .. } = fragment {
                    let offset = offset + (pos - start);
                    self.source
                        .seek(SeekFrom::Start(offset))
                        .context(SeekSourceSnafu { offset })?;
                }
                self.current = Some(CurrentSlot { slot, start, end });
                self.position = pos;
                return Ok(pos);
            }
            start = end;
            slot += 1;
        }
    }

    /// Read bytes from the current slot into `buf`,
    /// moving to the next slot first if the current one is exhausted.
    ///
    /// Returns 0 at the end of the stream.
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.last_slot.is_some() && self.known_end.map_or(false, |end| self.position >= end) {
            return Ok(0);
        }
        let in_current = self
            .current
            .map_or(false, |c| self.position >= c.start && self.position < c.end);
        if !in_current {
            self.seek_to(self.position)?;
        }
        let Some(current) = self.current else {
            return Ok(0);
        };

        let available = (current.end - self.position).min(buf.len() as u64) as usize;
        let buf = &mut buf[..available];
        let n = match &self.table.fragments()[current.slot] {
            Fragment::Inline(data) => {
                let from = (self.position - current.start) as usize;
                buf.copy_from_slice(&data[from..from + available]);
                available
            }
            Fragment::Resolved { .. } => {
                let n = read_retrying(&mut *self.source, buf)
                    .context(ReadFragmentSnafu { slot: current.slot })?;
                if n == 0 {
                    return Err(io::Error::from(io::ErrorKind::UnexpectedEof))
                        .context(ReadFragmentSnafu { slot: current.slot });
                }
                n
            }
            Fragment::Unresolved => 0,
        };
        self.position += n as u64;
        Ok(n)
    }

    /// Read every remaining byte of the stream into `sink`.
    ///
    /// Returns the number of bytes transferred.
    pub fn transfer_to<W>(&mut self, sink: &mut W) -> Result<u64>
    where
        W: ?Sized + Write,
    {
        let mut buf = [0_u8; TRANSFER_BUFFER_SIZE];
        let mut total = 0;
        loop {
            let n = self.read_chunk(&mut buf)?;
            if n == 0 {
                return Ok(total);
            }
            sink.write_all(&buf[..n]).context(WriteSinkSnafu)?;
            total += n as u64;
        }
    }

    /// Read the rest of the stream into a new vector.
    pub fn read_to_vec(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.transfer_to(&mut out)?;
        Ok(out)
    }

    /// Determine the logical length of the stream.
    ///
    /// This is expensive:
    /// it resolves every remaining fragment within the stream's bounds.
    /// The current position is restored afterwards.
    pub fn length(&mut self) -> Result<u64> {
        if let (Some(_), Some(end)) = (self.last_slot, self.known_end) {
            return Ok(end);
        }
        let saved = self.position;
        self.seek_to(u64::MAX)?;
        let end = self.known_end.unwrap_or(0);
        self.seek_to(saved)?;
        Ok(end)
    }

    /// Determine the physical offset right after the end of the pixel data
    /// (past the sequence delimiter),
    /// so that the elements following it can be read.
    ///
    /// Like [`length`](Self::length), this resolves every fragment of the stream,
    /// plus up to the resolve guard's number of fragments past its upper bound.
    /// Returns `None` if the delimiter is not reached within the guard.
    pub fn offset_past_end(&mut self) -> Result<Option<u64>> {
        let saved = self.position;
        self.length()?;
        let mut extra = 0;
        while !self.table.is_sealed() && extra < self.resolve_guard {
            if !self.table.resolve_next(&mut *self.source)? {
                break;
            }
            extra += 1;
        }
        let end = self.table.end_offset().filter(|_| self.table.is_sealed());
        if end.is_none() {
            debug!(
                "End of pixel data not found within {} fragments past slot {:?}",
                self.resolve_guard, self.last_slot
            );
        }
        // resolution moved the source
        self.current = None;
        self.seek_to(saved)?;
        Ok(end)
    }
}

fn read_retrying<R: ?Sized + Read>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match source.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

impl<S> Read for SegmentedStream<'_, S>
where
    S: ?Sized + Read + Seek,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_chunk(buf).map_err(io::Error::from)
    }
}

impl<S> Seek for SegmentedStream<'_, S>
where
    S: ?Sized + Read + Seek,
{
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
            SeekFrom::End(delta) => self.length()?.checked_add_signed(delta),
        };
        match target {
            Some(p) => Ok(self.seek_to(p)?),
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )),
        }
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::tests::encapsulated_bytes;
    use rstest::rstest;
    use std::io::Cursor;

    /// source bytes are a function of their offset
    fn patterned(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    /// A single 100-byte fragment whose value starts at offset 1000.
    fn single_fragment_source() -> Vec<u8> {
        let mut data = patterned(1200);
        let items = encapsulated_bytes(0, &[], &[data[1000..1100].to_vec()]);
        // basic offset table item at 984, fragment item header at 992
        data[984..1100].copy_from_slice(&items[..116]);
        data[1100..1108].copy_from_slice(&items[116..]);
        data.truncate(1108);
        data
    }

    #[test]
    fn seek_and_read_within_fragment() {
        let mut source = Cursor::new(single_fragment_source());
        let mut table = FragmentTable::encapsulated(984);
        let mut stream = SegmentedStream::whole_object(&mut source, &mut table);

        assert_eq!(stream.seek_to(50).unwrap(), 50);
        let mut buf = [0; 10];
        assert_eq!(stream.read_chunk(&mut buf).unwrap(), 10);
        assert_eq!(&buf[..], &patterned(1060)[1050..1060]);
        assert_eq!(stream.position(), 60);
        assert_eq!(stream.current_slot(), Some(1));
    }

    #[test]
    fn length_resolves_and_restores_position() {
        let mut source = Cursor::new(single_fragment_source());
        let mut table = FragmentTable::encapsulated(984);
        let mut stream = SegmentedStream::whole_object(&mut source, &mut table);
        stream.seek_to(20).unwrap();
        assert_eq!(stream.length().unwrap(), 100);
        assert_eq!(stream.position(), 20);
        assert_eq!(stream.last_slot(), Some(2));

        let mut buf = [0; 4];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf[..], &patterned(1024)[1020..1024]);
    }

    #[test]
    fn reads_do_not_cross_fragments() {
        let data = encapsulated_bytes(0, &[], &[vec![1; 40], vec![2; 60], vec![3; 50]]);
        let mut source = Cursor::new(data);
        let mut table = FragmentTable::encapsulated(0);
        let mut stream = SegmentedStream::whole_object(&mut source, &mut table);

        let mut buf = [0; 100];
        stream.seek_to(30).unwrap();
        assert_eq!(stream.read_chunk(&mut buf).unwrap(), 10);
        assert!(buf[..10].iter().all(|&b| b == 1));
        assert_eq!(stream.read_chunk(&mut buf).unwrap(), 60);
        assert!(buf[..60].iter().all(|&b| b == 2));
        assert_eq!(stream.position(), 100);
    }

    #[test]
    fn terminator_pins_upper_bound() {
        let data = encapsulated_bytes(0, &[], &[vec![1; 40], vec![2; 60], vec![3; 50]]);
        let mut source = Cursor::new(data);
        let mut table = FragmentTable::encapsulated(0);
        let mut stream = SegmentedStream::whole_object(&mut source, &mut table);

        assert_eq!(stream.last_slot(), None);
        let all = stream.read_to_vec().unwrap();
        assert_eq!(all.len(), 150);
        assert_eq!(stream.last_slot(), Some(4));

        // seeking beyond the end is not an error
        assert_eq!(stream.seek_to(1000).unwrap(), 1000);
        let mut buf = [0; 8];
        assert_eq!(stream.read_chunk(&mut buf).unwrap(), 0);
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
    }

    #[rstest]
    #[case(0)]
    #[case(39)]
    #[case(40)]
    #[case(99)]
    #[case(149)]
    fn repeated_seeks_land_on_same_offset(#[case] pos: u64) {
        let data = encapsulated_bytes(0, &[], &[patterned(40), patterned(60), patterned(50)]);
        let mut source = Cursor::new(data);
        let mut table = FragmentTable::encapsulated(0);
        let mut stream = SegmentedStream::whole_object(&mut source, &mut table);

        let mut first = [0; 1];
        stream.seek_to(pos).unwrap();
        stream.read_chunk(&mut first).unwrap();
        for _ in 0..3 {
            stream.seek_to(149).unwrap();
            stream.read_chunk(&mut [0; 1]).unwrap();
            let mut again = [0; 1];
            stream.seek_to(pos).unwrap();
            stream.read_chunk(&mut again).unwrap();
            assert_eq!(first, again);
        }
    }

    #[test]
    fn single_slot_stream() {
        let data = encapsulated_bytes(0, &[], &[vec![1; 40], vec![2; 60], vec![3; 50]]);
        let mut source = Cursor::new(data);
        let mut table = FragmentTable::encapsulated(0);
        let mut stream = SegmentedStream::single_slot(&mut source, &mut table, 2);
        assert_eq!(stream.length().unwrap(), 60);
        let mut out = Vec::new();
        assert_eq!(stream.transfer_to(&mut out).unwrap(), 60);
        assert_eq!(out, vec![2; 60]);
        // the rest of the sequence was never visited
        assert!(!table.is_sealed());
    }

    #[test]
    fn offset_past_end_from_single_slot() {
        let mut data = encapsulated_bytes(0, &[], &[vec![1; 40], vec![2; 60], vec![3; 50]]);
        let end = data.len() as u64;
        data.extend_from_slice(&[0xEE; 16]);
        let mut source = Cursor::new(data);
        let mut table = FragmentTable::encapsulated(0);

        let mut stream = SegmentedStream::single_slot(&mut source, &mut table, 1);
        assert_eq!(stream.offset_past_end().unwrap(), Some(end));

        let mut stream = SegmentedStream::single_slot(&mut source, &mut table, 1);
        assert_eq!(stream.position(), 0);
        assert_eq!(stream.read_to_vec().unwrap(), vec![1; 40]);
    }

    #[test]
    fn offset_past_end_beyond_guard() {
        let fragments: Vec<_> = (0..5).map(|i| vec![i; 4]).collect();
        let data = encapsulated_bytes(0, &[], &fragments);
        let mut source = Cursor::new(data);
        let mut table = FragmentTable::encapsulated(0);
        let mut stream =
            SegmentedStream::single_slot(&mut source, &mut table, 1).with_resolve_guard(2);
        assert_eq!(stream.offset_past_end().unwrap(), None);
    }

    #[test]
    fn inline_fragments() {
        let mut table = FragmentTable::from_fragments(&[], vec![vec![1, 2, 3], vec![4, 5]]);
        let mut source = Cursor::new(Vec::<u8>::new());
        let mut stream = SegmentedStream::whole_object(&mut source, &mut table);
        stream.seek(SeekFrom::End(-3)).unwrap();
        assert_eq!(stream.read_to_vec().unwrap(), vec![3, 4, 5]);
        assert_eq!(stream.last_slot(), Some(3));
    }

    #[test]
    fn truncated_fragment_is_an_error() {
        let mut data = encapsulated_bytes(0, &[], &[vec![1; 40]]);
        // cut the fragment short and drop the delimiter
        data.truncate(16 + 20);
        let mut source = Cursor::new(data);
        let mut table = FragmentTable::encapsulated(0);
        let mut stream = SegmentedStream::whole_object(&mut source, &mut table);
        let err = stream.read_to_vec().unwrap_err();
        assert!(matches!(err, Error::ReadFragment { slot: 1, .. }));
    }
}
