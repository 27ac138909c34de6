//! Basic header types: attribute tags, value lengths,
//! value representations and sequence item headers.
use byteordered::byteorder::{ByteOrder, LittleEndian};
use std::fmt;
use std::io::{self, Read, Write};

/// The data type for a DICOM attribute tag,
/// as a pair of group and element numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(pub u16, pub u16);

impl Tag {
    /// Getter for the tag's group value.
    #[inline]
    pub const fn group(self) -> u16 {
        self.0
    }

    /// Getter for the tag's element value.
    #[inline]
    pub const fn element(self) -> u16 {
        self.1
    }

    /// Whether this tag belongs to the file meta information group.
    #[inline]
    pub const fn is_meta(self) -> bool {
        self.0 == 0x0002
    }
}

impl From<(u16, u16)> for Tag {
    #[inline]
    fn from((group, element): (u16, u16)) -> Self {
        Tag(group, element)
    }
}

impl PartialEq<(u16, u16)> for Tag {
    fn eq(&self, other: &(u16, u16)) -> bool {
        self.0 == other.0 && self.1 == other.1
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({:04X},{:04X})", self.0, self.1)
    }
}

/// A value length as found in element and item headers.
///
/// The special value `0xFFFF_FFFF` denotes an undefined length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Length(pub u32);

impl Length {
    /// The undefined length.
    pub const UNDEFINED: Length = Length(0xFFFF_FFFF);

    /// Create a defined length.
    ///
    /// # Panics
    ///
    /// Panics if `len` is the reserved undefined length value.
    #[inline]
    pub fn defined(len: u32) -> Self {
        assert_ne!(len, Self::UNDEFINED.0);
        Length(len)
    }

    #[inline]
    pub fn is_undefined(self) -> bool {
        self == Self::UNDEFINED
    }

    #[inline]
    pub fn is_defined(self) -> bool {
        !self.is_undefined()
    }

    /// Fetch the inner length value if it is defined.
    #[inline]
    pub fn get(self) -> Option<u32> {
        if self.is_undefined() {
            None
        } else {
            Some(self.0)
        }
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.get() {
            Some(len) => write!(f, "{}", len),
            None => f.write_str("U/L"),
        }
    }
}

/// A DICOM value representation.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone, Ord, PartialOrd)]
pub enum VR {
    AE,
    AS,
    AT,
    CS,
    DA,
    DS,
    DT,
    FL,
    FD,
    IS,
    LO,
    LT,
    OB,
    OD,
    OF,
    OL,
    OV,
    OW,
    PN,
    SH,
    SL,
    SQ,
    SS,
    ST,
    SV,
    TM,
    UC,
    UI,
    UL,
    UN,
    UR,
    US,
    UT,
    UV,
}

impl VR {
    /// Obtain the value representation from its two-byte code.
    pub fn from_binary(chars: [u8; 2]) -> Option<Self> {
        use VR::*;
        let vr = match &chars {
            b"AE" => AE,
            b"AS" => AS,
            b"AT" => AT,
            b"CS" => CS,
            b"DA" => DA,
            b"DS" => DS,
            b"DT" => DT,
            b"FL" => FL,
            b"FD" => FD,
            b"IS" => IS,
            b"LO" => LO,
            b"LT" => LT,
            b"OB" => OB,
            b"OD" => OD,
            b"OF" => OF,
            b"OL" => OL,
            b"OV" => OV,
            b"OW" => OW,
            b"PN" => PN,
            b"SH" => SH,
            b"SL" => SL,
            b"SQ" => SQ,
            b"SS" => SS,
            b"ST" => ST,
            b"SV" => SV,
            b"TM" => TM,
            b"UC" => UC,
            b"UI" => UI,
            b"UL" => UL,
            b"UN" => UN,
            b"UR" => UR,
            b"US" => US,
            b"UT" => UT,
            b"UV" => UV,
            _ => return None,
        };
        Some(vr)
    }

    /// Retrieve the two-character code of this value representation.
    pub fn to_string(self) -> &'static str {
        use VR::*;
        match self {
            AE => "AE",
            AS => "AS",
            AT => "AT",
            CS => "CS",
            DA => "DA",
            DS => "DS",
            DT => "DT",
            FL => "FL",
            FD => "FD",
            IS => "IS",
            LO => "LO",
            LT => "LT",
            OB => "OB",
            OD => "OD",
            OF => "OF",
            OL => "OL",
            OV => "OV",
            OW => "OW",
            PN => "PN",
            SH => "SH",
            SL => "SL",
            SQ => "SQ",
            SS => "SS",
            ST => "ST",
            SV => "SV",
            TM => "TM",
            UC => "UC",
            UI => "UI",
            UL => "UL",
            UN => "UN",
            UR => "UR",
            US => "US",
            UT => "UT",
            UV => "UV",
        }
    }

    /// Retrieve the two-byte code of this value representation.
    pub fn to_bytes(self) -> [u8; 2] {
        let s = self.to_string().as_bytes();
        [s[0], s[1]]
    }

    /// Whether the value length of this VR is encoded
    /// in 16 bits in the explicit VR transfer syntaxes (PS3.5 7.1.2).
    pub fn has_short_length(self) -> bool {
        use VR::*;
        matches!(
            self,
            AE | AS
                | AT
                | CS
                | DA
                | DS
                | DT
                | FL
                | FD
                | IS
                | LO
                | LT
                | PN
                | SH
                | SL
                | SS
                | ST
                | TM
                | UI
                | UL
                | US
        )
    }

    /// Whether values of this VR are textual.
    pub fn is_textual(self) -> bool {
        use VR::*;
        matches!(
            self,
            AE | AS | CS | DA | DS | DT | IS | LO | LT | PN | SH | ST | TM | UC | UI | UR | UT
        )
    }
}

impl fmt::Display for VR {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(VR::to_string(*self))
    }
}

/// Tag of a sequence item.
pub const ITEM: Tag = Tag(0xFFFE, 0xE000);
/// Tag of an item delimitation item.
pub const ITEM_DELIMITER: Tag = Tag(0xFFFE, 0xE00D);
/// Tag of a sequence delimitation item.
pub const SEQUENCE_DELIMITER: Tag = Tag(0xFFFE, 0xE0DD);

/// Data type for describing a sequence item header,
/// either an item start or one of the two delimiters.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum SequenceItemHeader {
    /// The cursor contains an item.
    Item {
        /// the length of the item in bytes (can be undefined)
        len: Length,
    },
    /// The cursor read an item delimiter.
    ItemDelimiter,
    /// The cursor read a sequence delimiter.
    SequenceDelimiter,
}

impl SequenceItemHeader {
    /// Interpret raw header properties as a sequence item header.
    /// Returns `None` if the tag is none of the item tags.
    pub fn new(tag: Tag, len: Length) -> Option<Self> {
        match tag {
            ITEM => Some(SequenceItemHeader::Item { len }),
            ITEM_DELIMITER => Some(SequenceItemHeader::ItemDelimiter),
            SEQUENCE_DELIMITER => Some(SequenceItemHeader::SequenceDelimiter),
            _ => None,
        }
    }

    /// The tag of this header.
    pub fn tag(&self) -> Tag {
        match self {
            SequenceItemHeader::Item { .. } => ITEM,
            SequenceItemHeader::ItemDelimiter => ITEM_DELIMITER,
            SequenceItemHeader::SequenceDelimiter => SEQUENCE_DELIMITER,
        }
    }

    /// The value length of this header (zero for delimiters).
    pub fn length(&self) -> Length {
        match self {
            SequenceItemHeader::Item { len } => *len,
            _ => Length(0),
        }
    }

    /// Encode this header in little endian (8 bytes).
    pub fn write_to<W: ?Sized + Write>(&self, to: &mut W) -> io::Result<()> {
        write_item_header(to, self.tag(), self.length())
    }
}

/// Encode a raw 8-byte item header in little endian.
pub fn write_item_header<W: ?Sized + Write>(to: &mut W, tag: Tag, len: Length) -> io::Result<()> {
    let mut buf = [0u8; 8];
    LittleEndian::write_u16(&mut buf[0..2], tag.0);
    LittleEndian::write_u16(&mut buf[2..4], tag.1);
    LittleEndian::write_u32(&mut buf[4..8], len.0);
    to.write_all(&buf)
}

/// Decode a raw 8-byte item header in little endian:
/// tag group, tag element, and a 32-bit length.
///
/// Returns `Ok(None)` if the source ended
/// before the first byte of the header.
/// A header cut short after that is an `UnexpectedEof` error.
pub fn read_item_header<R: ?Sized + Read>(source: &mut R) -> io::Result<Option<(Tag, Length)>> {
    let mut buf = [0u8; 8];
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    match filled {
        0 => Ok(None),
        8 => {
            let tag = Tag(
                LittleEndian::read_u16(&buf[0..2]),
                LittleEndian::read_u16(&buf[2..4]),
            );
            Ok(Some((tag, Length(LittleEndian::read_u32(&buf[4..8])))))
        }
        _ => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "item header cut short",
        )),
    }
}
