//! A minimal attribute dictionary.
//!
//! Only the value representations of the attributes
//! which this library reads, writes or rewrites are known.
//! Data sets in implicit VR fall back to `UN` for anything else,
//! which preserves the value bytes as they are.
use fragstream_encoding::tags;
use fragstream_encoding::{Tag, VR};

/// Look up the value representation of an attribute by tag.
pub fn lookup_vr(tag: Tag) -> Option<VR> {
    use VR::*;

    // group length
    if tag.element() == 0x0000 {
        return Some(UL);
    }
    if (0x6000..=0x601E).contains(&tag.group()) && tag.group() % 2 == 0 {
        return overlay_vr(tag.element());
    }

    let vr = match (tag.group(), tag.element()) {
        (0x0002, 0x0001) => OB,
        (0x0002, 0x0002) | (0x0002, 0x0003) | (0x0002, 0x0010) | (0x0002, 0x0012) => UI,
        (0x0002, 0x0013) => SH,
        (0x0002, 0x0016) | (0x0002, 0x0017) | (0x0002, 0x0018) => AE,
        (0x0002, 0x0100) => UI,
        (0x0002, 0x0102) => OB,

        (0x0008, 0x0005) | (0x0008, 0x0008) => CS,
        (0x0008, 0x0012) | (0x0008, 0x0020) | (0x0008, 0x0021) | (0x0008, 0x0022) => DA,
        (0x0008, 0x0013) | (0x0008, 0x0030) | (0x0008, 0x0031) | (0x0008, 0x0032) => TM,
        (0x0008, 0x0016) | (0x0008, 0x0018) => UI,
        (0x0008, 0x0050) => SH,
        (0x0008, 0x0060) => CS,
        (0x0008, 0x0070) | (0x0008, 0x0080) | (0x0008, 0x1030) | (0x0008, 0x103E) => LO,
        (0x0008, 0x0090) => PN,

        (0x0010, 0x0010) => PN,
        (0x0010, 0x0020) => LO,
        (0x0010, 0x0030) => DA,
        (0x0010, 0x0040) => CS,

        (0x0018, 0x0050) | (0x0018, 0x0088) => DS,
        (0x0018, 0x0015) => CS,

        (0x0020, 0x000D) | (0x0020, 0x000E) | (0x0020, 0x0052) => UI,
        (0x0020, 0x0010) => SH,
        (0x0020, 0x0011) | (0x0020, 0x0012) | (0x0020, 0x0013) => IS,
        (0x0020, 0x0032) | (0x0020, 0x0037) => DS,
        (0x0020, 0x0020) => CS,

        (0x0028, 0x0002) | (0x0028, 0x0006) | (0x0028, 0x0010) | (0x0028, 0x0011) => US,
        (0x0028, 0x0004) => CS,
        (0x0028, 0x0008) => IS,
        (0x0028, 0x0030) => DS,
        (0x0028, 0x0100) | (0x0028, 0x0101) | (0x0028, 0x0102) | (0x0028, 0x0103) => US,
        (0x0028, 0x0120) | (0x0028, 0x0121) => US,
        (0x0028, 0x1050) | (0x0028, 0x1051) | (0x0028, 0x1052) | (0x0028, 0x1053) => DS,
        (0x0028, 0x1054) => LO,
        (0x0028, 0x1056) => CS,
        (0x0028, 0x2110) => CS,
        (0x0028, 0x2112) => DS,
        (0x0028, 0x2114) => CS,

        (0x0088, 0x0200) => SQ,

        (0x7FE0, 0x0001) | (0x7FE0, 0x0002) => OV,
        (0x7FE0, 0x0003) => UV,
        (0x7FE0, 0x0010) => OW,
        _ => return None,
    };
    Some(vr)
}

fn overlay_vr(element: u16) -> Option<VR> {
    let base = Tag(0x6000, element);
    let vr = match base {
        tags::OVERLAY_ROWS | tags::OVERLAY_COLUMNS => VR::US,
        tags::NUMBER_OF_FRAMES_IN_OVERLAY => VR::IS,
        tags::OVERLAY_TYPE => VR::CS,
        tags::OVERLAY_ORIGIN => VR::SS,
        tags::OVERLAY_BITS_ALLOCATED | tags::OVERLAY_BIT_POSITION => VR::US,
        tags::OVERLAY_DATA => VR::OW,
        _ => return None,
    };
    Some(vr)
}

/// Look up the value representation of an attribute by tag,
/// falling back to `UN`.
pub fn vr_or_unknown(tag: Tag) -> VR {
    lookup_vr(tag).unwrap_or(VR::UN)
}
