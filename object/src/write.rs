//! Data set writing in explicit or implicit VR little endian.
use crate::mem::{InMemDicomObject, InMemElement, Value};
use fragstream_encoding::header::{self, ITEM, ITEM_DELIMITER, SEQUENCE_DELIMITER};
use fragstream_encoding::tags;
use fragstream_encoding::{Length, Tag, VR};
use snafu::{ensure, Backtrace, ResultExt, Snafu};
use std::io::{self, Write};

/// An error which may occur while writing a data set.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Could not write header of element {}", tag))]
    WriteHeader {
        tag: Tag,
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display("Could not write value of element {}", tag))]
    WriteValue {
        tag: Tag,
        backtrace: Backtrace,
        source: io::Error,
    },
    #[snafu(display("Value of element {} is too long for {}: {} bytes", tag, vr, length))]
    ValueTooLong {
        tag: Tag,
        vr: VR,
        length: usize,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A writer of data set elements.
#[derive(Debug)]
pub struct DataSetWriter<W> {
    to: W,
    explicit_vr: bool,
}

impl<W: Write> DataSetWriter<W> {
    pub fn new(to: W, explicit_vr: bool) -> Self {
        DataSetWriter { to, explicit_vr }
    }

    /// Create a writer for explicit VR little endian.
    pub fn explicit_vr_le(to: W) -> Self {
        Self::new(to, true)
    }

    pub fn is_explicit_vr(&self) -> bool {
        self.explicit_vr
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.to
    }

    pub fn into_inner(self) -> W {
        self.to
    }

    /// Write a data element header.
    pub fn write_header(&mut self, tag: Tag, vr: VR, len: Length) -> Result<()> {
        let mut buf = [0u8; 12];
        buf[0..2].copy_from_slice(&tag.0.to_le_bytes());
        buf[2..4].copy_from_slice(&tag.1.to_le_bytes());
        let header_len = if !self.explicit_vr {
            buf[4..8].copy_from_slice(&len.0.to_le_bytes());
            8
        } else if vr.has_short_length() {
            ensure!(
                len.0 <= 0xFFFF,
                ValueTooLongSnafu {
                    tag,
                    vr,
                    length: len.0 as usize,
                }
            );
            buf[4..6].copy_from_slice(&vr.to_bytes());
            buf[6..8].copy_from_slice(&(len.0 as u16).to_le_bytes());
            8
        } else {
            buf[4..6].copy_from_slice(&vr.to_bytes());
            buf[8..12].copy_from_slice(&len.0.to_le_bytes());
            12
        };
        self.to
            .write_all(&buf[..header_len])
            .context(WriteHeaderSnafu { tag })
    }

    /// Write a whole data element.
    pub fn write_element(&mut self, elem: &InMemElement) -> Result<()> {
        let tag = elem.tag();
        match elem.value() {
            Value::Primitive(value) => {
                let bytes = value.to_bytes(elem.vr());
                ensure!(
                    bytes.len() < 0xFFFF_FFFF,
                    ValueTooLongSnafu {
                        tag,
                        vr: elem.vr(),
                        length: bytes.len(),
                    }
                );
                self.write_header(tag, elem.vr(), Length(bytes.len() as u32))?;
                self.to.write_all(&bytes).context(WriteValueSnafu { tag })
            }
            Value::Sequence(items) => {
                // sequences and items are always written with undefined length
                self.write_header(tag, VR::SQ, Length::UNDEFINED)?;
                for item in items {
                    self.write_delimiter(ITEM, Length::UNDEFINED)?;
                    self.write_elements(item.iter())?;
                    self.write_delimiter(ITEM_DELIMITER, Length(0))?;
                }
                self.write_delimiter(SEQUENCE_DELIMITER, Length(0))
            }
        }
    }

    /// Write a sequence of elements in the given order.
    pub fn write_elements<'a, I>(&mut self, elements: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a InMemElement>,
    {
        for elem in elements {
            self.write_element(elem)?;
        }
        Ok(())
    }

    /// Write the elements of an object which precede the pixel data.
    pub fn write_before_pixel_data(&mut self, obj: &InMemDicomObject) -> Result<()> {
        self.write_elements(obj.iter().filter(|e| e.tag() < tags::PIXEL_DATA))
    }

    /// Write the elements of an object which follow the pixel data.
    pub fn write_after_pixel_data(&mut self, obj: &InMemDicomObject) -> Result<()> {
        self.write_elements(obj.iter().filter(|e| e.tag() > tags::PIXEL_DATA))
    }

    /// Write the header of an encapsulated pixel data element.
    pub fn write_encapsulated_pixel_data_header(&mut self) -> Result<()> {
        self.write_header(tags::PIXEL_DATA, VR::OB, Length::UNDEFINED)
    }

    /// Write one item of encapsulated pixel data.
    pub fn write_item(&mut self, data: &[u8]) -> Result<()> {
        self.write_delimiter(ITEM, Length(data.len() as u32))?;
        self.to
            .write_all(data)
            .context(WriteValueSnafu { tag: ITEM })
    }

    /// Write the sequence delimiter which ends encapsulated pixel data.
    pub fn write_sequence_delimiter(&mut self) -> Result<()> {
        self.write_delimiter(SEQUENCE_DELIMITER, Length(0))
    }

    /// Item and delimiter headers look the same in every encoding.
    fn write_delimiter(&mut self, tag: Tag, len: Length) -> Result<()> {
        header::write_item_header(&mut self.to, tag, len).context(WriteHeaderSnafu { tag })
    }
}

impl<W: Write> Write for DataSetWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.to.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.to.flush()
    }
}
