//! The frame descriptor:
//! an immutable snapshot of the image attributes
//! needed to interpret raw frame bytes as pixels.
use crate::tags;
use crate::{PrimitiveValue, Tag};
use snafu::{Backtrace, OptionExt, Snafu};
use std::fmt;

/// Read-only access to the attributes of a data set by tag.
///
/// This is implemented by the attribute store of the object crate,
/// and by anything else able to provide image attributes.
pub trait AttributeSource {
    /// Retrieve the value of the attribute with the given tag,
    /// or `None` if it is not present.
    fn attribute(&self, tag: Tag) -> Option<&PrimitiveValue>;
}

impl<T: ?Sized + AttributeSource> AttributeSource for &T {
    fn attribute(&self, tag: Tag) -> Option<&PrimitiveValue> {
        (**self).attribute(tag)
    }
}

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum DescriptorError {
    #[snafu(display("Missing required attribute `{}`", name))]
    MissingAttribute {
        name: &'static str,
        backtrace: Backtrace,
    },
    #[snafu(display("Semantically invalid value `{}` for attribute `{}`", value, name))]
    InvalidValue {
        name: &'static str,
        value: String,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = DescriptorError> = std::result::Result<T, E>;

/// A decoded representation of the DICOM _Photometric Interpretation_ attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PhotometricInterpretation {
    Monochrome1,
    Monochrome2,
    PaletteColor,
    Rgb,
    YbrFull,
    YbrFull422,
    YbrPartial420,
    YbrIct,
    YbrRct,
    /// Any other interpretation, kept verbatim.
    Other(String),
}

impl PhotometricInterpretation {
    pub fn as_str(&self) -> &str {
        match self {
            PhotometricInterpretation::Monochrome1 => "MONOCHROME1",
            PhotometricInterpretation::Monochrome2 => "MONOCHROME2",
            PhotometricInterpretation::PaletteColor => "PALETTE COLOR",
            PhotometricInterpretation::Rgb => "RGB",
            PhotometricInterpretation::YbrFull => "YBR_FULL",
            PhotometricInterpretation::YbrFull422 => "YBR_FULL_422",
            PhotometricInterpretation::YbrPartial420 => "YBR_PARTIAL_420",
            PhotometricInterpretation::YbrIct => "YBR_ICT",
            PhotometricInterpretation::YbrRct => "YBR_RCT",
            PhotometricInterpretation::Other(s) => s,
        }
    }

    pub fn is_monochrome(&self) -> bool {
        matches!(
            self,
            PhotometricInterpretation::Monochrome1 | PhotometricInterpretation::Monochrome2
        )
    }
}

impl From<&str> for PhotometricInterpretation {
    fn from(value: &str) -> Self {
        match value.trim() {
            "MONOCHROME1" => PhotometricInterpretation::Monochrome1,
            "MONOCHROME2" => PhotometricInterpretation::Monochrome2,
            "PALETTE COLOR" => PhotometricInterpretation::PaletteColor,
            "RGB" => PhotometricInterpretation::Rgb,
            "YBR_FULL" => PhotometricInterpretation::YbrFull,
            "YBR_FULL_422" => PhotometricInterpretation::YbrFull422,
            "YBR_PARTIAL_420" => PhotometricInterpretation::YbrPartial420,
            "YBR_ICT" => PhotometricInterpretation::YbrIct,
            "YBR_RCT" => PhotometricInterpretation::YbrRct,
            other => PhotometricInterpretation::Other(other.to_string()),
        }
    }
}

impl fmt::Display for PhotometricInterpretation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded representation of the DICOM _Pixel Representation_ attribute.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum PixelRepresentation {
    /// unsigned pixel data sample values
    #[default]
    Unsigned = 0,
    /// signed pixel data sample values
    Signed = 1,
}

/// A decoded representation of the DICOM _Planar Configuration_ attribute.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum PlanarConfiguration {
    /// samples of each pixel are contiguous (`R1 G1 B1 R2 G2 B2 ...`)
    #[default]
    Standard = 0,
    /// each color plane is contiguous (`R1 R2 ... G1 G2 ... B1 B2 ...`)
    PixelFirst = 1,
}

/// An overlay plane associated with the image,
/// from one of the `60xx` repeating groups.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayDescriptor {
    /// the repeating group (`0x6000` to `0x601E`)
    pub group: u16,
    pub rows: u16,
    pub columns: u16,
    /// `G` for graphics, `R` for region of interest
    pub overlay_type: String,
    /// one-based row and column of the first overlay point
    pub origin: (i16, i16),
    pub bits_allocated: u16,
    pub bit_position: u16,
    pub number_of_frames: u32,
    /// whether the overlay bits live in the unused high bits
    /// of the pixel data, rather than in `(60xx,3000)`
    pub embedded: bool,
}

/// Value mapping parameters:
/// modality rescale and VOI windowing.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueMapping {
    pub rescale_intercept: f64,
    pub rescale_slope: f64,
    /// window center/width pairs, possibly empty
    pub windows: Vec<(f64, f64)>,
    pub voi_lut_function: Option<String>,
}

impl Default for ValueMapping {
    fn default() -> Self {
        ValueMapping {
            rescale_intercept: 0.,
            rescale_slope: 1.,
            windows: Vec::new(),
            voi_lut_function: None,
        }
    }
}

/// The pixel padding value pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PixelPadding {
    pub value: i64,
    pub range_limit: Option<i64>,
}

/// An immutable description of one image frame's layout,
/// shared by every frame of the object.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameDescriptor {
    rows: u16,
    columns: u16,
    samples_per_pixel: u16,
    photometric_interpretation: PhotometricInterpretation,
    bits_allocated: u16,
    bits_stored: u16,
    high_bit: u16,
    pixel_representation: PixelRepresentation,
    planar_configuration: PlanarConfiguration,
    number_of_frames: u32,
    overlays: Vec<OverlayDescriptor>,
    value_mapping: ValueMapping,
    padding: Option<PixelPadding>,
}

impl FrameDescriptor {
    /// Create a descriptor from the bare geometry,
    /// with all other properties set to their defaults
    /// (a single unsigned `MONOCHROME2` or `RGB` frame,
    /// bits stored equal to bits allocated).
    pub fn new(rows: u16, columns: u16, samples_per_pixel: u16, bits_allocated: u16) -> Self {
        let photometric_interpretation = if samples_per_pixel == 3 {
            PhotometricInterpretation::Rgb
        } else {
            PhotometricInterpretation::Monochrome2
        };
        FrameDescriptor {
            rows,
            columns,
            samples_per_pixel,
            photometric_interpretation,
            bits_allocated,
            bits_stored: bits_allocated,
            high_bit: bits_allocated.saturating_sub(1),
            pixel_representation: PixelRepresentation::Unsigned,
            planar_configuration: PlanarConfiguration::Standard,
            number_of_frames: 1,
            overlays: Vec::new(),
            value_mapping: ValueMapping::default(),
            padding: None,
        }
    }

    /// Build a descriptor from the attributes of a data set.
    ///
    /// _Rows_, _Columns_, _Samples per Pixel_, _Bits Allocated_
    /// and _Photometric Interpretation_ are required.
    /// Other attributes fall back to their defaults when absent.
    pub fn from_attributes(source: &dyn AttributeSource) -> Result<Self> {
        let rows = required_u16(source, tags::ROWS, "Rows")?;
        let columns = required_u16(source, tags::COLUMNS, "Columns")?;
        let samples_per_pixel = required_u16(source, tags::SAMPLES_PER_PIXEL, "SamplesPerPixel")?;
        let bits_allocated = required_u16(source, tags::BITS_ALLOCATED, "BitsAllocated")?;
        let photometric_interpretation = PhotometricInterpretation::from(
            &*source
                .attribute(tags::PHOTOMETRIC_INTERPRETATION)
                .context(MissingAttributeSnafu {
                    name: "PhotometricInterpretation",
                })?
                .to_str(),
        );

        if rows == 0 || columns == 0 {
            return InvalidValueSnafu {
                name: "Rows/Columns",
                value: format!("{}x{}", rows, columns),
            }
            .fail();
        }
        if !matches!(bits_allocated, 1 | 8 | 16 | 32 | 64) {
            return InvalidValueSnafu {
                name: "BitsAllocated",
                value: bits_allocated.to_string(),
            }
            .fail();
        }

        let bits_stored =
            optional_u16(source, tags::BITS_STORED, "BitsStored")?.unwrap_or(bits_allocated);
        let high_bit =
            optional_u16(source, tags::HIGH_BIT, "HighBit")?.unwrap_or(bits_stored.saturating_sub(1));
        let pixel_representation =
            match optional_u16(source, tags::PIXEL_REPRESENTATION, "PixelRepresentation")? {
                None | Some(0) => PixelRepresentation::Unsigned,
                Some(1) => PixelRepresentation::Signed,
                Some(other) => {
                    return InvalidValueSnafu {
                        name: "PixelRepresentation",
                        value: other.to_string(),
                    }
                    .fail()
                }
            };
        let planar_configuration =
            match optional_u16(source, tags::PLANAR_CONFIGURATION, "PlanarConfiguration")? {
                Some(1) if samples_per_pixel > 1 => PlanarConfiguration::PixelFirst,
                _ => PlanarConfiguration::Standard,
            };

        let number_of_frames = match source.attribute(tags::NUMBER_OF_FRAMES) {
            None => 1,
            Some(v) if v.is_empty() => 1,
            Some(v) => match v.to_int() {
                Some(n) if n > 0 && n <= u32::MAX as i64 => n as u32,
                _ => {
                    return InvalidValueSnafu {
                        name: "NumberOfFrames",
                        value: v.to_str().into_owned(),
                    }
                    .fail()
                }
            },
        };

        let overlays = (0x6000..=0x601E)
            .step_by(2)
            .filter_map(|group| read_overlay(source, group))
            .collect();

        let windows = match (
            source
                .attribute(tags::WINDOW_CENTER)
                .and_then(PrimitiveValue::to_f64s),
            source
                .attribute(tags::WINDOW_WIDTH)
                .and_then(PrimitiveValue::to_f64s),
        ) {
            (Some(centers), Some(widths)) => centers.into_iter().zip(widths).collect(),
            _ => Vec::new(),
        };
        let value_mapping = ValueMapping {
            rescale_intercept: source
                .attribute(tags::RESCALE_INTERCEPT)
                .and_then(PrimitiveValue::to_f64)
                .unwrap_or(0.),
            rescale_slope: source
                .attribute(tags::RESCALE_SLOPE)
                .and_then(PrimitiveValue::to_f64)
                .unwrap_or(1.),
            windows,
            voi_lut_function: source
                .attribute(tags::VOILUT_FUNCTION)
                .map(|v| v.to_str().trim().to_string())
                .filter(|s| !s.is_empty()),
        };

        let padding = source
            .attribute(tags::PIXEL_PADDING_VALUE)
            .and_then(PrimitiveValue::to_int)
            .map(|value| PixelPadding {
                value,
                range_limit: source
                    .attribute(tags::PIXEL_PADDING_RANGE_LIMIT)
                    .and_then(PrimitiveValue::to_int),
            });

        Ok(FrameDescriptor {
            rows,
            columns,
            samples_per_pixel,
            photometric_interpretation,
            bits_allocated,
            bits_stored,
            high_bit,
            pixel_representation,
            planar_configuration,
            number_of_frames,
            overlays,
            value_mapping,
            padding,
        })
    }

    pub fn with_photometric_interpretation(mut self, pi: PhotometricInterpretation) -> Self {
        self.photometric_interpretation = pi;
        self
    }

    pub fn with_bits_stored(mut self, bits_stored: u16) -> Self {
        self.bits_stored = bits_stored;
        self.high_bit = bits_stored.saturating_sub(1);
        self
    }

    pub fn with_pixel_representation(mut self, pr: PixelRepresentation) -> Self {
        self.pixel_representation = pr;
        self
    }

    pub fn with_planar_configuration(mut self, pc: PlanarConfiguration) -> Self {
        self.planar_configuration = pc;
        self
    }

    pub fn with_number_of_frames(mut self, frames: u32) -> Self {
        self.number_of_frames = frames.max(1);
        self
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn columns(&self) -> u16 {
        self.columns
    }

    pub fn samples_per_pixel(&self) -> u16 {
        self.samples_per_pixel
    }

    pub fn photometric_interpretation(&self) -> &PhotometricInterpretation {
        &self.photometric_interpretation
    }

    pub fn bits_allocated(&self) -> u16 {
        self.bits_allocated
    }

    pub fn bits_stored(&self) -> u16 {
        self.bits_stored
    }

    pub fn high_bit(&self) -> u16 {
        self.high_bit
    }

    pub fn pixel_representation(&self) -> PixelRepresentation {
        self.pixel_representation
    }

    pub fn planar_configuration(&self) -> PlanarConfiguration {
        self.planar_configuration
    }

    pub fn number_of_frames(&self) -> u32 {
        self.number_of_frames
    }

    pub fn overlays(&self) -> &[OverlayDescriptor] {
        &self.overlays
    }

    pub fn value_mapping(&self) -> &ValueMapping {
        &self.value_mapping
    }

    pub fn padding(&self) -> Option<PixelPadding> {
        self.padding
    }

    /// The number of bytes occupied by one sample in native form.
    pub fn bytes_per_sample(&self) -> usize {
        (self.bits_allocated as usize + 7) / 8
    }

    /// The number of samples in one frame.
    pub fn samples_per_frame(&self) -> usize {
        self.rows as usize * self.columns as usize * self.samples_per_pixel as usize
    }

    /// The length of one native frame in bytes.
    ///
    /// For 1-bit data the length is rounded up to whole bytes.
    pub fn frame_len(&self) -> usize {
        (self.samples_per_frame() * self.bits_allocated as usize + 7) / 8
    }
}

fn required_u16(source: &dyn AttributeSource, tag: Tag, name: &'static str) -> Result<u16> {
    optional_u16(source, tag, name)?.context(MissingAttributeSnafu { name })
}

fn optional_u16(source: &dyn AttributeSource, tag: Tag, name: &'static str) -> Result<Option<u16>> {
    match source.attribute(tag) {
        None => Ok(None),
        Some(v) if v.is_empty() => Ok(None),
        Some(v) => match v.to_u16() {
            Some(x) => Ok(Some(x)),
            None => InvalidValueSnafu {
                name,
                value: v.to_str().into_owned(),
            }
            .fail(),
        },
    }
}

fn read_overlay(source: &dyn AttributeSource, group: u16) -> Option<OverlayDescriptor> {
    let get = |tag: Tag| source.attribute(tags::in_overlay_group(tag, group));
    let rows = get(tags::OVERLAY_ROWS)?.to_u16()?;
    let columns = get(tags::OVERLAY_COLUMNS)?.to_u16()?;
    let origin = get(tags::OVERLAY_ORIGIN)
        .and_then(PrimitiveValue::to_ints)
        .filter(|v| v.len() >= 2)
        .map(|v| (v[0] as i16, v[1] as i16))
        .unwrap_or((1, 1));
    Some(OverlayDescriptor {
        group,
        rows,
        columns,
        overlay_type: get(tags::OVERLAY_TYPE)
            .map(|v| v.to_str().trim().to_string())
            .unwrap_or_else(|| "G".to_string()),
        origin,
        bits_allocated: get(tags::OVERLAY_BITS_ALLOCATED)
            .and_then(PrimitiveValue::to_u16)
            .unwrap_or(1),
        bit_position: get(tags::OVERLAY_BIT_POSITION)
            .and_then(PrimitiveValue::to_u16)
            .unwrap_or(0),
        number_of_frames: get(tags::NUMBER_OF_FRAMES_IN_OVERLAY)
            .and_then(PrimitiveValue::to_int)
            .map(|n| n.max(1) as u32)
            .unwrap_or(1),
        embedded: get(tags::OVERLAY_DATA).is_none(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Attrs(HashMap<Tag, PrimitiveValue>);

    impl AttributeSource for Attrs {
        fn attribute(&self, tag: Tag) -> Option<&PrimitiveValue> {
            self.0.get(&tag)
        }
    }

    fn ct_attributes() -> Attrs {
        let mut map = HashMap::new();
        map.insert(tags::ROWS, PrimitiveValue::from(64_u16));
        map.insert(tags::COLUMNS, PrimitiveValue::from(32_u16));
        map.insert(tags::SAMPLES_PER_PIXEL, PrimitiveValue::from(1_u16));
        map.insert(tags::BITS_ALLOCATED, PrimitiveValue::from(16_u16));
        map.insert(tags::BITS_STORED, PrimitiveValue::from(12_u16));
        map.insert(tags::HIGH_BIT, PrimitiveValue::from(11_u16));
        map.insert(tags::PIXEL_REPRESENTATION, PrimitiveValue::from(1_u16));
        map.insert(tags::PHOTOMETRIC_INTERPRETATION, "MONOCHROME2 ".into());
        map.insert(tags::NUMBER_OF_FRAMES, "3 ".into());
        map.insert(tags::RESCALE_INTERCEPT, "-1024".into());
        map.insert(tags::WINDOW_CENTER, "40\\400".into());
        map.insert(tags::WINDOW_WIDTH, "350\\1500".into());
        Attrs(map)
    }

    #[test]
    fn descriptor_from_attributes() {
        let desc = FrameDescriptor::from_attributes(&ct_attributes()).unwrap();
        assert_eq!(desc.rows(), 64);
        assert_eq!(desc.columns(), 32);
        assert_eq!(desc.number_of_frames(), 3);
        assert_eq!(desc.pixel_representation(), PixelRepresentation::Signed);
        assert_eq!(
            desc.photometric_interpretation(),
            &PhotometricInterpretation::Monochrome2
        );
        assert_eq!(desc.frame_len(), 64 * 32 * 2);
        assert_eq!(desc.value_mapping().rescale_intercept, -1024.);
        assert_eq!(desc.value_mapping().rescale_slope, 1.);
        assert_eq!(
            desc.value_mapping().windows,
            vec![(40., 350.), (400., 1500.)]
        );
        assert!(desc.overlays().is_empty());
        assert_eq!(desc.padding(), None);
    }

    #[test]
    fn missing_rows_is_an_error() {
        let mut attrs = ct_attributes();
        attrs.0.remove(&tags::ROWS);
        let err = FrameDescriptor::from_attributes(&attrs).unwrap_err();
        assert!(matches!(
            err,
            DescriptorError::MissingAttribute { name: "Rows", .. }
        ));
    }

    #[test]
    fn bad_number_of_frames() {
        let mut attrs = ct_attributes();
        attrs.0.insert(tags::NUMBER_OF_FRAMES, "0".into());
        let err = FrameDescriptor::from_attributes(&attrs).unwrap_err();
        assert!(matches!(
            err,
            DescriptorError::InvalidValue {
                name: "NumberOfFrames",
                ..
            }
        ));
    }

    #[test]
    fn overlays_and_padding() {
        let mut attrs = ct_attributes();
        attrs.0.insert(Tag(0x6002, 0x0010), PrimitiveValue::from(64_u16));
        attrs.0.insert(Tag(0x6002, 0x0011), PrimitiveValue::from(32_u16));
        attrs.0.insert(Tag(0x6002, 0x0102), PrimitiveValue::from(15_u16));
        attrs.0.insert(tags::PIXEL_PADDING_VALUE, PrimitiveValue::from(0_u16));

        let desc = FrameDescriptor::from_attributes(&attrs).unwrap();
        assert_eq!(desc.overlays().len(), 1);
        let overlay = &desc.overlays()[0];
        assert_eq!(overlay.group, 0x6002);
        assert_eq!(overlay.bit_position, 15);
        assert!(overlay.embedded);
        assert_eq!(
            desc.padding(),
            Some(PixelPadding {
                value: 0,
                range_limit: None
            })
        );
    }

    #[test]
    fn frame_len_of_bit_data() {
        let desc = FrameDescriptor::new(3, 3, 1, 1);
        assert_eq!(desc.frame_len(), 2);
        let desc = FrameDescriptor::new(4, 4, 3, 8);
        assert_eq!(desc.frame_len(), 48);
        assert_eq!(
            desc.photometric_interpretation(),
            &PhotometricInterpretation::Rgb
        );
    }
}
