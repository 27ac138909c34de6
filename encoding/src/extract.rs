//! Frame extraction:
//! mapping frame indices to fragments
//! and retrieving the bytes of any frame.
use crate::descriptor::FrameDescriptor;
use crate::error::{
    FragmentFrameMismatchSnafu, FragmentTooShortSnafu, FrameOutOfRangeSnafu, Result,
};
use crate::fragment::{Fragment, FragmentTable};
use crate::probe::FrameStartProbe;
use crate::stream::SegmentedStream;
use byteordered::Endianness;
use snafu::{ensure, OptionExt};
use std::io::{Read, Seek};
use std::ops::Range;
use tracing::debug;

/// Number of leading bytes of a fragment given to a frame start probe.
const PROBE_LEN: usize = 1024;

/// How frames are laid out over the fragments of a pixel data element.
#[derive(Debug, Copy, Clone)]
pub enum FragmentLayout {
    /// A single fragment (slot 1) holds every frame contiguously.
    Native,
    /// Each frame is in exactly one fragment.
    OneFragmentPerFrame,
    /// A frame may be split over several fragments,
    /// frame boundaries are found with the given probe.
    MaySplitFrames(&'static (dyn FrameStartProbe + Sync)),
}

/// Retrieves the bytes of individual frames
/// from a fragment table and its underlying source.
///
/// The frame to fragment map is built on first use
/// and kept for the lifetime of the extractor.
#[derive(Debug)]
pub struct FrameExtractor<S> {
    source: S,
    table: FragmentTable,
    descriptor: FrameDescriptor,
    layout: FragmentLayout,
    frame_map: Option<Vec<Range<usize>>>,
}

impl<S> FrameExtractor<S>
where
    S: Read + Seek,
{
    pub fn new(
        source: S,
        table: FragmentTable,
        descriptor: FrameDescriptor,
        layout: FragmentLayout,
    ) -> Self {
        let table = match layout {
            FragmentLayout::OneFragmentPerFrame => {
                table.with_expected_fragments(descriptor.number_of_frames() as usize)
            }
            _ => table,
        };
        FrameExtractor {
            source,
            table,
            descriptor,
            layout,
            frame_map: None,
        }
    }

    /// Pre-allocate slots for the given number of data fragments.
    pub fn with_fragment_count_hint(mut self, count: usize) -> Self {
        self.table = self.table.with_expected_fragments(count);
        self
    }

    pub fn descriptor(&self) -> &FrameDescriptor {
        &self.descriptor
    }

    pub fn layout(&self) -> FragmentLayout {
        self.layout
    }

    pub fn table(&self) -> &FragmentTable {
        &self.table
    }

    /// Recover the source and the fragment table.
    pub fn into_inner(self) -> (S, FragmentTable) {
        (self.source, self.table)
    }

    /// The number of data fragments.
    ///
    /// This resolves every fragment of the pixel data.
    pub fn fragment_count(&mut self) -> Result<usize> {
        self.table.resolve_all(&mut self.source)?;
        Ok(self.table.len().saturating_sub(1))
    }

    /// Read the basic offset table.
    pub fn offset_table(&mut self) -> Result<Vec<u32>> {
        self.table.offset_table(&mut self.source)
    }

    /// Create a stream over every data fragment.
    pub fn whole_object(&mut self) -> SegmentedStream<'_, S> {
        SegmentedStream::whole_object(&mut self.source, &mut self.table)
    }

    /// Create a stream over a single slot of the table,
    /// including slot 0.
    pub fn slot_stream(&mut self, slot: usize) -> SegmentedStream<'_, S> {
        SegmentedStream::single_slot(&mut self.source, &mut self.table, slot)
    }

    /// The range of slots holding the given encapsulated frame.
    pub fn frame_slots(&mut self, frame: u32) -> Result<Range<usize>> {
        let frames = self.descriptor.number_of_frames();
        ensure!(frame < frames, FrameOutOfRangeSnafu { frame });
        let frame_idx = frame as usize;
        match self.layout {
            FragmentLayout::Native => Ok(1..2),
            _ if frames == 1 => {
                let count = self.fragment_count()?;
                Ok(1..count + 1)
            }
            FragmentLayout::OneFragmentPerFrame => Ok(frame_idx + 1..frame_idx + 2),
            FragmentLayout::MaySplitFrames(probe) => {
                if self.frame_map.is_none() {
                    self.frame_map = Some(self.build_frame_map(probe)?);
                }
                self.frame_map
                    .as_ref()
                    .and_then(|map| map.get(frame_idx))
                    .cloned()
                    .context(FrameOutOfRangeSnafu { frame })
            }
        }
    }

    /// Create a stream over the fragments of an encapsulated frame.
    pub fn frame_stream(&mut self, frame: u32) -> Result<SegmentedStream<'_, S>> {
        let slots = self.frame_slots(frame)?;
        Ok(SegmentedStream::slots(&mut self.source, &mut self.table, slots))
    }

    /// Retrieve the bytes of the given frame.
    ///
    /// Native frames are read from their range in slot 1.
    /// Encapsulated frames are the concatenation of their fragments.
    /// Multi-byte samples of big endian native data
    /// are converted to little endian.
    pub fn frame_bytes(&mut self, frame: u32) -> Result<Vec<u8>> {
        let frames = self.descriptor.number_of_frames();
        ensure!(frame < frames, FrameOutOfRangeSnafu { frame });

        match self.layout {
            FragmentLayout::Native => self.native_frame_bytes(frame),
            _ if frames == 1 => self.whole_object().read_to_vec(),
            FragmentLayout::OneFragmentPerFrame => {
                let slot = frame as usize + 1;
                ensure!(
                    self.table.resolve(&mut self.source, slot)?,
                    FrameOutOfRangeSnafu { frame }
                );
                self.slot_stream(slot).read_to_vec()
            }
            FragmentLayout::MaySplitFrames(_) => self.frame_stream(frame)?.read_to_vec(),
        }
    }

    fn native_frame_bytes(&mut self, frame: u32) -> Result<Vec<u8>> {
        if self.descriptor.bits_allocated() == 1 {
            return self.packed_frame_bytes(frame);
        }
        let frame_len = self.descriptor.frame_len() as u64;
        let start = u64::from(frame) * frame_len;
        let mut out = self.read_native_range(frame, start, frame_len)?;

        let big_endian = matches!(
            self.table.get(1),
            Some(Fragment::Resolved {
                endianness: Endianness::Big,
                ..
            })
        );
        let sample_len = self.descriptor.bytes_per_sample();
        if big_endian && sample_len > 1 {
            for sample in out.chunks_exact_mut(sample_len) {
                sample.reverse();
            }
        }
        Ok(out)
    }

    /// Frames of 1-bit samples are packed back to back,
    /// so a frame may start in the middle of a byte.
    /// The returned frame starts at bit 0 of its first byte,
    /// with the unused bits of the last byte cleared.
    fn packed_frame_bytes(&mut self, frame: u32) -> Result<Vec<u8>> {
        let samples = self.descriptor.samples_per_frame() as u64;
        let start_bit = u64::from(frame) * samples;
        let shift = (start_bit % 8) as u32;
        let len = (u64::from(shift) + samples + 7) / 8;
        let raw = self.read_native_range(frame, start_bit / 8, len)?;

        let frame_len = self.descriptor.frame_len();
        let mut out: Vec<u8> = if shift == 0 {
            raw[..frame_len].to_vec()
        } else {
            (0..frame_len)
                .map(|i| {
                    let next = raw.get(i + 1).copied().unwrap_or(0);
                    (raw[i] >> shift) | (next << (8 - shift))
                })
                .collect()
        };
        let tail_bits = samples % 8;
        if tail_bits != 0 {
            if let Some(last) = out.last_mut() {
                *last &= (1_u8 << tail_bits) - 1;
            }
        }
        Ok(out)
    }

    /// Read `len` bytes at `start` of the native pixel data in slot 1.
    fn read_native_range(&mut self, frame: u32, start: u64, len: u64) -> Result<Vec<u8>> {
        let needed = start + len;
        let available = if self.table.resolve(&mut self.source, 1)? {
            self.table.get(1).and_then(Fragment::len).unwrap_or(0)
        } else {
            0
        };
        ensure!(
            needed <= available,
            FragmentTooShortSnafu {
                slot: 1_usize,
                frame,
                available,
                needed,
            }
        );

        let mut stream = SegmentedStream::single_slot(&mut self.source, &mut self.table, 1);
        stream.seek_to(start)?;
        let mut out = vec![0; len as usize];
        let mut filled = 0;
        while filled < out.len() {
            let n = stream.read_chunk(&mut out[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(out)
    }

    /// Find the slot ranges of each frame.
    fn build_frame_map(&mut self, probe: &dyn FrameStartProbe) -> Result<Vec<Range<usize>>> {
        let frames = self.descriptor.number_of_frames();
        let count = self.fragment_count()?;

        let starts: Vec<usize> = if count == frames as usize {
            (1..=count).collect()
        } else if count < frames as usize {
            return FragmentFrameMismatchSnafu {
                found: count,
                frames,
            }
            .fail();
        } else if let Some(starts) = self.starts_from_offset_table(count)? {
            debug!("Mapped {} frames to fragments from the offset table", frames);
            starts
        } else {
            let mut starts = Vec::with_capacity(frames as usize);
            for slot in 1..=count {
                let mut head = [0; PROBE_LEN];
                let mut stream = self.slot_stream(slot);
                let mut filled = 0;
                while filled < head.len() {
                    let n = stream.read_chunk(&mut head[filled..])?;
                    if n == 0 {
                        break;
                    }
                    filled += n;
                }
                if probe.is_frame_start(&head[..filled]) {
                    starts.push(slot);
                }
            }
            debug!(
                "Probed {} fragments, found {} frame starts",
                count,
                starts.len()
            );
            starts
        };

        ensure!(
            starts.len() == frames as usize && starts.first() == Some(&1),
            FragmentFrameMismatchSnafu {
                found: starts.len(),
                frames,
            }
        );

        Ok(starts
            .iter()
            .enumerate()
            .map(|(i, &start)| start..starts.get(i + 1).copied().unwrap_or(count + 1))
            .collect())
    }

    /// Find the first slot of each frame using the basic offset table,
    /// if it has one entry per frame and each entry points to an item.
    fn starts_from_offset_table(&mut self, count: usize) -> Result<Option<Vec<usize>>> {
        let offsets = self.offset_table()?;
        if offsets.len() != self.descriptor.number_of_frames() as usize {
            return Ok(None);
        }
        let mut starts = Vec::with_capacity(offsets.len());
        let mut item_offset = 0_u64;
        let mut offsets = offsets.into_iter().map(u64::from).peekable();
        for slot in 1..=count {
            if offsets.peek() == Some(&item_offset) {
                offsets.next();
                starts.push(slot);
            }
            item_offset += 8 + self.table.get(slot).and_then(Fragment::len).unwrap_or(0);
        }
        if offsets.next().is_some() || starts.first() != Some(&1) {
            debug!("Offset table does not match the fragment items, ignoring it");
            return Ok(None);
        }
        Ok(Some(starts))
    }
}
