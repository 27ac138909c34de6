//! Data set reading in explicit or implicit VR little endian.
//!
//! The reader keeps track of the physical offset of every byte it consumes,
//! so that the pixel data element can be located without reading it.
use crate::dictionary;
use crate::mem::{InMemDicomObject, InMemElement, Value};
use byteordered::byteorder::{ByteOrder, LittleEndian};
use fragstream_encoding::header::{ITEM, ITEM_DELIMITER, SEQUENCE_DELIMITER};
use fragstream_encoding::tags;
use fragstream_encoding::{Length, PrimitiveValue, Tag, VR};
use snafu::{Backtrace, ResultExt, Snafu};
use std::io::{self, Read};
use tracing::debug;

/// An error which may occur while reading a data set.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Could not read element header at offset {}", offset))]
    ReadHeader {
        offset: u64,
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display("Could not read value of element {} at offset {}", tag, offset))]
    ReadValue {
        tag: Tag,
        offset: u64,
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display("Unknown value representation {:?} in element {}", code, tag))]
    InvalidVr {
        tag: Tag,
        code: [u8; 2],
        backtrace: Backtrace,
    },
    #[snafu(display("Undefined length in element {} at offset {}", tag, offset))]
    UndefinedLength {
        tag: Tag,
        offset: u64,
        backtrace: Backtrace,
    },
    #[snafu(display("Unexpected element {} at offset {}", tag, offset))]
    UnexpectedTag {
        tag: Tag,
        offset: u64,
        backtrace: Backtrace,
    },
    #[snafu(display("Premature end of data set at offset {}", offset))]
    PrematureEnd { offset: u64, backtrace: Backtrace },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The header of a data element, as read from the source.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ElementHeader {
    pub tag: Tag,
    pub vr: VR,
    pub len: Length,
}

/// The header of the top-level pixel data element
/// and where its value begins.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PixelDataHeader {
    pub vr: VR,
    pub len: Length,
    /// physical offset of the first byte after the element header
    pub value_offset: u64,
}

/// A byte source which counts the bytes read from it.
#[derive(Debug)]
struct CountingReader<R> {
    inner: R,
    position: u64,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }
}

/// A reader of data set elements.
#[derive(Debug)]
pub struct DataSetReader<R> {
    source: CountingReader<R>,
    explicit_vr: bool,
}

impl<R: Read> DataSetReader<R> {
    /// Create a data set reader
    /// whose first byte is at the given physical offset.
    pub fn new(source: R, explicit_vr: bool, offset: u64) -> Self {
        DataSetReader {
            source: CountingReader {
                inner: source,
                position: offset,
            },
            explicit_vr,
        }
    }

    /// The physical offset of the next byte to read.
    pub fn position(&self) -> u64 {
        self.source.position
    }

    pub fn into_inner(self) -> R {
        self.source.inner
    }

    /// Read the next element header.
    ///
    /// Returns `None` if the source ended before the header.
    pub fn read_header(&mut self) -> Result<Option<ElementHeader>> {
        let offset = self.position();
        let mut buf = [0u8; 8];
        if !read_exact_or_eof(&mut self.source, &mut buf[..4]).context(ReadHeaderSnafu { offset })? {
            return Ok(None);
        }
        let tag = Tag(
            LittleEndian::read_u16(&buf[0..2]),
            LittleEndian::read_u16(&buf[2..4]),
        );

        // item and delimiter headers never carry a VR
        if tag.group() == 0xFFFE || !self.explicit_vr {
            self.source
                .read_exact(&mut buf[4..8])
                .context(ReadHeaderSnafu { offset })?;
            let len = Length(LittleEndian::read_u32(&buf[4..8]));
            let vr = if tag.group() == 0xFFFE {
                VR::UN
            } else {
                dictionary::vr_or_unknown(tag)
            };
            return Ok(Some(ElementHeader { tag, vr, len }));
        }

        self.source
            .read_exact(&mut buf[4..8])
            .context(ReadHeaderSnafu { offset })?;
        let code = [buf[4], buf[5]];
        let vr = VR::from_binary(code).ok_or_else(|| InvalidVrSnafu { tag, code }.build())?;
        let len = if vr.has_short_length() {
            Length(u32::from(LittleEndian::read_u16(&buf[6..8])))
        } else {
            let mut len = [0u8; 4];
            self.source
                .read_exact(&mut len)
                .context(ReadHeaderSnafu { offset })?;
            Length(LittleEndian::read_u32(&len))
        };
        Ok(Some(ElementHeader { tag, vr, len }))
    }

    /// Read a top-level data set up to the pixel data element.
    ///
    /// When the pixel data element is found,
    /// its header is consumed and returned,
    /// but not its value.
    pub fn read_until_pixel_data(&mut self) -> Result<(InMemDicomObject, Option<PixelDataHeader>)> {
        let mut obj = InMemDicomObject::new_empty();
        while let Some(header) = self.read_header()? {
            if header.tag == tags::PIXEL_DATA {
                let pixel_data = PixelDataHeader {
                    vr: header.vr,
                    len: header.len,
                    value_offset: self.position(),
                };
                debug!(
                    "Pixel data {} of length {} at offset {}",
                    header.vr, header.len, pixel_data.value_offset
                );
                return Ok((obj, Some(pixel_data)));
            }
            let value = self.read_value(header)?;
            obj.put(InMemElement::new(header.tag, header.vr, value));
        }
        Ok((obj, None))
    }

    /// Read every remaining element into the given object.
    pub fn read_to_end(&mut self, obj: &mut InMemDicomObject) -> Result<()> {
        while let Some(header) = self.read_header()? {
            let value = self.read_value(header)?;
            obj.put(InMemElement::new(header.tag, header.vr, value));
        }
        Ok(())
    }

    /// Read the value of an element whose header was just read.
    pub fn read_value(&mut self, header: ElementHeader) -> Result<Value> {
        let ElementHeader { tag, vr, len } = header;
        if tag.group() == 0xFFFE {
            return UnexpectedTagSnafu {
                tag,
                offset: self.position() - 8,
            }
            .fail();
        }

        if vr == VR::SQ || len.is_undefined() {
            if vr != VR::SQ && vr != VR::UN {
                return UndefinedLengthSnafu {
                    tag,
                    offset: self.position(),
                }
                .fail();
            }
            // a sequence of unknown VR is always in implicit VR
            let saved = self.explicit_vr;
            if vr == VR::UN {
                self.explicit_vr = false;
            }
            let items = self.read_sequence(len);
            self.explicit_vr = saved;
            return items.map(Value::Sequence);
        }

        let offset = self.position();
        let mut data = Vec::new();
        (&mut self.source)
            .take(u64::from(len.0))
            .read_to_end(&mut data)
            .context(ReadValueSnafu { tag, offset })?;
        if data.len() < len.0 as usize {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof))
                .context(ReadValueSnafu { tag, offset });
        }
        Ok(Value::Primitive(PrimitiveValue::from_bytes(vr, &data)))
    }

    fn read_sequence(&mut self, len: Length) -> Result<Vec<InMemDicomObject>> {
        let end = len.get().map(|l| self.position() + u64::from(l));
        let mut items = Vec::new();
        loop {
            if matches!(end, Some(end) if self.position() >= end) {
                break;
            }
            let offset = self.position();
            let header = self
                .read_header()?
                .ok_or_else(|| PrematureEndSnafu { offset }.build())?;
            match header.tag {
                SEQUENCE_DELIMITER => break,
                ITEM => {
                    let item_end = header.len.get().map(|l| self.position() + u64::from(l));
                    items.push(self.read_item(item_end)?);
                }
                tag => return UnexpectedTagSnafu { tag, offset }.fail(),
            }
        }
        Ok(items)
    }

    fn read_item(&mut self, end: Option<u64>) -> Result<InMemDicomObject> {
        let mut obj = InMemDicomObject::new_empty();
        loop {
            if matches!(end, Some(end) if self.position() >= end) {
                break;
            }
            let offset = self.position();
            let header = self
                .read_header()?
                .ok_or_else(|| PrematureEndSnafu { offset }.build())?;
            if header.tag == ITEM_DELIMITER {
                break;
            }
            let value = self.read_value(header)?;
            obj.put(InMemElement::new(header.tag, header.vr, value));
        }
        Ok(obj)
    }
}

/// Fill the buffer, or return `false` if the source is already at its end.
fn read_exact_or_eof<R: Read>(source: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}
