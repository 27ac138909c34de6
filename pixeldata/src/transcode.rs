//! Transcoding of DICOM objects into another transfer syntax.
//!
//! A [`Transcoder`] is prepared into a [`DeferredWrite`],
//! which has already read and re-encoded the first frame,
//! chosen the output encoding and rewritten the attributes.
//! Writing it out only streams the remaining frames to the sink.
use fragstream_encoding::adapters::{DecodeError, EncodeError, EncodeOptions};
use fragstream_encoding::descriptor::FrameDescriptor;
use fragstream_encoding::ops::{AttributeAction, AttributeOp};
use fragstream_encoding::tags;
use fragstream_encoding::{FrameExtractor, Length, PrimitiveValue, Tag, VR};
use fragstream_object::{
    DataSetWriter, FileDicomObject, FileMetaTable, InMemDicomObject, PixelSource,
    IMPLEMENTATION_CLASS_UID, IMPLEMENTATION_VERSION_NAME,
};
use fragstream_transfer_syntax_registry::{
    entries, DynPixelDataReader, DynPixelDataWriter, TransferSyntax, TransferSyntaxRegistry,
};
use snafu::{ensure, OptionExt, ResultExt, Snafu};
use std::fmt;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Snafu)]
pub struct Error(InnerError);

/// An error occurred during the object transcoding process.
#[derive(Debug, Snafu)]
pub(crate) enum InnerError {
    /// Unrecognized transfer syntax of receiving object ({uid})
    UnknownSrcTransferSyntax { uid: String },

    /// Unsupported target transfer syntax {uid}
    UnsupportedTransferSyntax { uid: String },

    /// Data set cannot be written in {uid} with pixel data in {target}
    IncompatibleDatasetTransferSyntax { uid: String, target: String },

    /// No decoder for pixel data in {uid}
    MissingReader { uid: String },

    /// No suitable encoding found for the image
    NoSuitableEncoding,

    /// Could not access pixel data of receiving object
    AccessPixelData {
        source: fragstream_object::AccessError,
    },

    /// Could not read frame #{frame}
    ReadFrame {
        frame: u32,
        source: fragstream_encoding::Error,
    },

    /// Could not decode frame #{frame}
    DecodeFrame { frame: u32, source: DecodeError },

    /// Could not encode frame #{frame}
    EncodeFrame { frame: u32, source: EncodeError },

    /// Encoded frame #{frame} has {actual} bytes, expected {expected}
    EncodedFrameLength {
        frame: u32,
        actual: usize,
        expected: usize,
    },

    /// Native pixel data of {length} bytes does not fit in a single element
    PixelDataTooLong { length: u64 },

    /// Could not update attribute {tag}
    ApplyAttribute {
        tag: Tag,
        source: fragstream_object::ApplyError,
    },

    /// Could not write object
    WriteObject {
        source: fragstream_object::WriteError,
    },

    /// Could not write data set
    WriteDataSet {
        source: fragstream_object::write::Error,
    },

    /// Could not write pixel data
    WritePixelData { source: std::io::Error },

    #[snafu(display("Could not create temporary file in '{}'", dir.display()))]
    CreateTempFile {
        dir: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Could not persist output file '{}'", path.display()))]
    PersistFile {
        path: PathBuf,
        source: tempfile::PersistError,
    },
}

/// Alias for the result of transcoding a DICOM object.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A callback which may modify each decoded frame before it is encoded,
/// given the frame index and the description of the decoded frame.
pub type FrameEditor<'a> = dyn FnMut(u32, &FrameDescriptor, &mut Vec<u8>) + 'a;

/// Decide whether the pixel data must be decoded and encoded again
/// to go from one transfer syntax to another.
///
/// Objects without pixel data never need transcoding.
/// An editor over the decoded frames always requires it.
/// Otherwise, it is needed unless both transfer syntaxes are the same
/// or both are native.
pub fn transcode_needed(
    source: &TransferSyntax,
    target: &TransferSyntax,
    has_pixel_data: bool,
    has_editor: bool,
) -> bool {
    if !has_pixel_data {
        return false;
    }
    if has_editor {
        return true;
    }
    source != target && !(source.is_native() && target.is_native())
}

/// A substitution of the requested encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct Adjustment {
    /// The UID of the transfer syntax which was not used
    pub skipped: &'static str,
    /// Why it was not used
    pub reason: String,
}

impl fmt::Display for Adjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "skipped {}: {}", self.skipped, self.reason)
    }
}

/// The outcome of a successful transcoding.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeReport {
    /// The UID of the transfer syntax requested
    pub requested: &'static str,
    /// The UID of the transfer syntax of the output
    pub transfer_syntax: &'static str,
    /// Whether the pixel data was decoded and encoded again
    pub transcoded: bool,
    /// Encodings skipped before settling on the output transfer syntax
    pub adjustments: Vec<Adjustment>,
}

impl TranscodeReport {
    /// Whether the output is in a transfer syntax other than the one requested.
    pub fn is_adjusted(&self) -> bool {
        self.requested != self.transfer_syntax
    }
}

/// Options for transcoding.
#[derive(Debug, Clone)]
pub struct TranscodeOptions {
    encode: EncodeOptions,
    fallbacks: Vec<&'static TransferSyntax>,
    retain_implementation: bool,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        TranscodeOptions {
            encode: EncodeOptions::default(),
            fallbacks: vec![&entries::RLE_LOSSLESS, &entries::EXPLICIT_VR_LITTLE_ENDIAN],
            retain_implementation: false,
        }
    }
}

impl TranscodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the options given to the pixel data encoder.
    pub fn encode_options(mut self, options: EncodeOptions) -> Self {
        self.encode = options;
        self
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.encode = self.encode.with_quality(quality);
        self
    }

    pub fn compression_ratio(mut self, ratio: f32) -> Self {
        self.encode = self.encode.with_compression_ratio(ratio);
        self
    }

    /// Set the transfer syntaxes to try, in order,
    /// when the requested one cannot encode the image.
    ///
    /// Defaults to RLE Lossless, then Explicit VR Little Endian.
    pub fn fallbacks<I>(mut self, fallbacks: I) -> Self
    where
        I: IntoIterator<Item = &'static TransferSyntax>,
    {
        self.fallbacks = fallbacks.into_iter().collect();
        self
    }

    /// Keep the implementation class UID and version name
    /// of the original file meta group.
    pub fn retain_implementation(mut self, retain: bool) -> Self {
        self.retain_implementation = retain;
        self
    }

    pub fn encode(&self) -> &EncodeOptions {
        &self.encode
    }
}

/// Interface for transcoding a DICOM object's pixel data
/// to comply with a different transfer syntax.
pub trait Transcode {
    /// Write the receiving object to a new file
    /// in the transfer syntax `ts`,
    /// replacing one or more attributes to fit the intended transfer syntax,
    /// including the meta group specifying the transfer syntax.
    ///
    /// On failure, no file is left at `path`.
    fn transcode_to_file<P>(&self, ts: &'static TransferSyntax, path: P) -> Result<TranscodeReport>
    where
        P: AsRef<Path>,
    {
        self.transcode_to_file_with_options(ts, path, TranscodeOptions::default())
    }

    /// Write the receiving object to a new file
    /// in the transfer syntax `ts`,
    /// with the given options.
    fn transcode_to_file_with_options<P>(
        &self,
        ts: &'static TransferSyntax,
        path: P,
        options: TranscodeOptions,
    ) -> Result<TranscodeReport>
    where
        P: AsRef<Path>;
}

impl Transcode for FileDicomObject {
    fn transcode_to_file_with_options<P>(
        &self,
        ts: &'static TransferSyntax,
        path: P,
        options: TranscodeOptions,
    ) -> Result<TranscodeReport>
    where
        P: AsRef<Path>,
    {
        Transcoder::new(self, ts).with_options(options).write_file(path)
    }
}

/// A builder for converting an object into another transfer syntax.
pub struct Transcoder<'a> {
    object: &'a FileDicomObject,
    target: &'static TransferSyntax,
    options: TranscodeOptions,
    editor: Option<Box<FrameEditor<'a>>>,
}

impl fmt::Debug for Transcoder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transcoder")
            .field("target", &self.target.uid())
            .field("options", &self.options)
            .field("editor", &self.editor.is_some())
            .finish_non_exhaustive()
    }
}

impl<'a> Transcoder<'a> {
    pub fn new(object: &'a FileDicomObject, target: &'static TransferSyntax) -> Self {
        Transcoder {
            object,
            target,
            options: TranscodeOptions::default(),
            editor: None,
        }
    }

    pub fn with_options(mut self, options: TranscodeOptions) -> Self {
        self.options = options;
        self
    }

    /// Modify every decoded frame before it is encoded.
    ///
    /// The pixel data is always decoded and encoded again
    /// when an editor is set.
    pub fn with_editor<F>(mut self, editor: F) -> Self
    where
        F: FnMut(u32, &FrameDescriptor, &mut Vec<u8>) + 'a,
    {
        self.editor = Some(Box::new(editor));
        self
    }

    /// Whether the pixel data would be decoded and encoded again.
    pub fn is_needed(&self) -> Result<bool> {
        let source = source_transfer_syntax(self.object)?;
        Ok(transcode_needed(
            source,
            self.target,
            self.object.pixel_data().is_some(),
            self.editor.is_some(),
        ))
    }

    /// Validate the operation and prepare the output,
    /// without writing anything.
    ///
    /// When transcoding, the first frame is decoded and encoded here,
    /// so that decoding problems and unrepresentable images
    /// are found before any output exists.
    pub fn prepare(self) -> Result<DeferredWrite<'a>> {
        let Transcoder {
            object,
            target,
            options,
            editor,
        } = self;
        let source_ts = source_transfer_syntax(object)?;
        let has_pixel_data = object.pixel_data().is_some();

        let mut meta = object.meta().clone();
        if !options.retain_implementation {
            meta.implementation_class_uid = IMPLEMENTATION_CLASS_UID.to_string();
            meta.implementation_version_name = Some(IMPLEMENTATION_VERSION_NAME.to_string());
        }

        if !transcode_needed(source_ts, target, has_pixel_data, editor.is_some()) {
            ensure!(
                target.is_dataset_supported(),
                UnsupportedTransferSyntaxSnafu { uid: target.uid() }
            );
            if has_pixel_data {
                object.open_pixel_source().context(AccessPixelDataSnafu)?;
            }
            debug!("Copying pixel data from {} to {}", source_ts, target);
            meta.set_transfer_syntax(target.uid());
            return Ok(DeferredWrite {
                object,
                meta,
                dataset: (**object).clone(),
                output: target,
                pipeline: None,
                report: TranscodeReport {
                    requested: target.uid(),
                    transfer_syntax: target.uid(),
                    transcoded: false,
                    adjustments: Vec::new(),
                },
            });
        }

        let reader = source_ts.pixel_reader().context(MissingReaderSnafu {
            uid: source_ts.uid(),
        })?;
        let frames = object.frame_extractor().context(AccessPixelDataSnafu)?;
        let decoded = reader.decoded_descriptor(frames.descriptor());
        let mut source = FrameSource {
            frames,
            reader,
            decoded,
            editor,
        };
        let first = source.decode(0)?;

        let mut adjustments = Vec::new();
        let mut chosen = None;
        let candidates = std::iter::once(target)
            .chain(options.fallbacks.iter().copied().filter(|ts| *ts != target));
        for ts in candidates {
            let writer = match ts.pixel_writer() {
                Some(writer) if ts.is_dataset_supported() => writer,
                _ => {
                    warn!("No pixel data encoder for {}", ts);
                    adjustments.push(Adjustment {
                        skipped: ts.uid(),
                        reason: "no pixel data encoder available".to_string(),
                    });
                    continue;
                }
            };
            let mut encoded = Vec::new();
            match writer.encode_frame(&source.decoded, &first, &options.encode, &mut encoded) {
                Ok(ops) => {
                    chosen = Some((ts, writer, ops, encoded));
                    break;
                }
                Err(EncodeError::Unrepresentable { reason }) => {
                    warn!("Cannot encode image in {}: {}", ts, reason);
                    adjustments.push(Adjustment {
                        skipped: ts.uid(),
                        reason,
                    });
                }
                Err(source) => {
                    return Err(Error(InnerError::EncodeFrame { frame: 0, source }));
                }
            }
        }
        let (output, writer, ops, encoded) = chosen.context(NoSuitableEncodingSnafu)?;
        debug!("Transcoding from {} to {}", source_ts, output);

        if output.is_native() {
            let frame_len = source.decoded.frame_len();
            ensure!(
                encoded.len() == frame_len,
                EncodedFrameLengthSnafu {
                    frame: 0_u32,
                    actual: encoded.len(),
                    expected: frame_len,
                }
            );
            let length = native_length(
                &source.decoded,
                source.frames.descriptor().number_of_frames(),
            );
            ensure!(length < u64::from(u32::MAX), PixelDataTooLongSnafu { length });
        }

        let dataset = rewrite_attributes(object, &source.decoded, ops)?;
        meta.set_transfer_syntax(output.uid());

        Ok(DeferredWrite {
            object,
            meta,
            dataset,
            output,
            pipeline: Some(Box::new(FramePipeline {
                source,
                writer,
                encode: options.encode,
                first: Some(encoded),
            })),
            report: TranscodeReport {
                requested: target.uid(),
                transfer_syntax: output.uid(),
                transcoded: true,
                adjustments,
            },
        })
    }

    /// Write the transcoded object to a new file.
    ///
    /// The output is written to a temporary file in the same directory,
    /// which only replaces `path` once everything was written.
    pub fn write_file<P>(self, path: P) -> Result<TranscodeReport>
    where
        P: AsRef<Path>,
    {
        self.prepare()?.write_file(path, None)
    }
}

fn source_transfer_syntax(object: &FileDicomObject) -> Result<&'static TransferSyntax> {
    let uid = object.meta().transfer_syntax();
    Ok(TransferSyntaxRegistry
        .get(uid)
        .context(UnknownSrcTransferSyntaxSnafu { uid })?)
}

/// Copy the object's attributes,
/// adjusted to describe the decoded and re-encoded pixel data.
fn rewrite_attributes(
    object: &FileDicomObject,
    decoded: &FrameDescriptor,
    writer_ops: Vec<AttributeOp>,
) -> Result<InMemDicomObject> {
    let mut dataset: InMemDicomObject = (**object).clone();
    for tag in [
        tags::EXTENDED_OFFSET_TABLE,
        tags::EXTENDED_OFFSET_TABLE_LENGTHS,
        tags::ENCAPSULATED_PIXEL_DATA_VALUE_TOTAL_LENGTH,
        tags::PIXEL_DATA,
    ] {
        dataset.remove_element(tag);
    }

    let mut ops = vec![AttributeOp::new(
        tags::PHOTOMETRIC_INTERPRETATION,
        AttributeAction::SetStr(decoded.photometric_interpretation().to_string().into()),
    )];
    if decoded.samples_per_pixel() > 1 {
        ops.push(AttributeOp::new(
            tags::PLANAR_CONFIGURATION,
            AttributeAction::Set(PrimitiveValue::from(0_u16)),
        ));
    }
    for op in ops.into_iter().chain(writer_ops) {
        let tag = op.tag;
        dataset.apply(op).context(ApplyAttributeSnafu { tag })?;
    }
    Ok(dataset)
}

/// Decoded frames of the receiving object, fetched on demand.
struct FrameSource<'a> {
    frames: FrameExtractor<PixelSource>,
    reader: &'static DynPixelDataReader,
    decoded: FrameDescriptor,
    editor: Option<Box<FrameEditor<'a>>>,
}

impl FrameSource<'_> {
    fn decode(&mut self, frame: u32) -> Result<Vec<u8>> {
        let data = self
            .frames
            .frame_bytes(frame)
            .context(ReadFrameSnafu { frame })?;
        let mut out = Vec::with_capacity(self.decoded.frame_len());
        self.reader
            .decode_frame(self.frames.descriptor(), &data, &mut out)
            .context(DecodeFrameSnafu { frame })?;
        if let Some(editor) = self.editor.as_mut() {
            editor(frame, &self.decoded, &mut out);
        }
        Ok(out)
    }
}

struct FramePipeline<'a> {
    source: FrameSource<'a>,
    writer: &'static DynPixelDataWriter,
    encode: EncodeOptions,
    /// the first frame, encoded while preparing
    first: Option<Vec<u8>>,
}

impl FramePipeline<'_> {
    fn encode(&mut self, frame: u32) -> Result<Vec<u8>> {
        if frame == 0 {
            if let Some(first) = self.first.take() {
                return Ok(first);
            }
        }
        let data = self.source.decode(frame)?;
        let mut out = Vec::new();
        self.writer
            .encode_frame(&self.source.decoded, &data, &self.encode, &mut out)
            .context(EncodeFrameSnafu { frame })?;
        debug!("Frame #{} encoded into {} bytes", frame, out.len());
        Ok(out)
    }

    fn write<W: Write>(&mut self, writer: &mut DataSetWriter<W>, native: bool) -> Result<()> {
        let frames = self.source.frames.descriptor().number_of_frames();
        if native {
            let frame_len = self.source.decoded.frame_len();
            let length = native_length(&self.source.decoded, frames);
            let vr = if self.source.decoded.bits_allocated() > 8 {
                VR::OW
            } else {
                VR::OB
            };
            writer
                .write_header(tags::PIXEL_DATA, vr, Length((length + length % 2) as u32))
                .context(WriteDataSetSnafu)?;
            let mut packer = (self.source.decoded.bits_allocated() == 1).then(BitPacker::default);
            for frame in 0..frames {
                let data = self.encode(frame)?;
                ensure!(
                    data.len() == frame_len,
                    EncodedFrameLengthSnafu {
                        frame,
                        actual: data.len(),
                        expected: frame_len,
                    }
                );
                match packer.as_mut() {
                    Some(packer) => {
                        let packed = packer.push(&data, self.source.decoded.samples_per_frame());
                        writer.write_all(&packed).context(WritePixelDataSnafu)?;
                    }
                    None => writer.write_all(&data).context(WritePixelDataSnafu)?,
                }
            }
            if let Some(rest) = packer.and_then(BitPacker::finish) {
                writer.write_all(&[rest]).context(WritePixelDataSnafu)?;
            }
            if length % 2 == 1 {
                writer.write_all(&[0]).context(WritePixelDataSnafu)?;
            }
        } else {
            writer
                .write_encapsulated_pixel_data_header()
                .context(WriteDataSetSnafu)?;
            // empty basic offset table
            writer.write_item(&[]).context(WriteDataSetSnafu)?;
            for frame in 0..frames {
                let mut data = self.encode(frame)?;
                if data.len() % 2 == 1 {
                    data.push(0);
                }
                writer.write_item(&data).context(WriteDataSetSnafu)?;
            }
            writer
                .write_sequence_delimiter()
                .context(WriteDataSetSnafu)?;
        }
        Ok(())
    }
}

/// The byte length of native pixel data.
/// Frames of 1-bit samples follow each other without padding.
fn native_length(descriptor: &FrameDescriptor, frames: u32) -> u64 {
    if descriptor.bits_allocated() == 1 {
        (u64::from(frames) * descriptor.samples_per_frame() as u64 + 7) / 8
    } else {
        u64::from(frames) * descriptor.frame_len() as u64
    }
}

/// Joins byte aligned frames of 1-bit samples into a continuous bit stream.
#[derive(Debug, Default)]
struct BitPacker {
    carry: u8,
    bits: u32,
}

impl BitPacker {
    /// Append the first `samples` bits of `frame`,
    /// returning the bytes completed.
    fn push(&mut self, frame: &[u8], samples: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(frame.len() + 1);
        let mut remaining = samples;
        for &byte in frame {
            if remaining == 0 {
                break;
            }
            let n = remaining.min(8) as u32;
            remaining -= n as usize;
            let byte = u16::from(byte) & ((1 << n) - 1);
            let mut acc = u16::from(self.carry) | (byte << self.bits);
            let mut total = self.bits + n;
            while total >= 8 {
                out.push(acc as u8);
                acc >>= 8;
                total -= 8;
            }
            self.carry = acc as u8;
            self.bits = total;
        }
        out
    }

    /// The last incomplete byte, if any.
    fn finish(self) -> Option<u8> {
        (self.bits > 0).then_some(self.carry)
    }
}

/// A transcoding operation which was validated
/// and only needs to be written out.
pub struct DeferredWrite<'a> {
    object: &'a FileDicomObject,
    meta: FileMetaTable,
    dataset: InMemDicomObject,
    output: &'static TransferSyntax,
    pipeline: Option<Box<FramePipeline<'a>>>,
    report: TranscodeReport,
}

impl fmt::Debug for DeferredWrite<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredWrite")
            .field("meta", &self.meta)
            .field("output", &self.output.uid())
            .field("report", &self.report)
            .finish_non_exhaustive()
    }
}

impl DeferredWrite<'_> {
    /// The report of the operation, as known before writing.
    pub fn report(&self) -> &TranscodeReport {
        &self.report
    }

    /// The file meta group to be written.
    pub fn meta(&self) -> &FileMetaTable {
        &self.meta
    }

    /// The attributes to be written, without the pixel data.
    pub fn dataset(&self) -> &InMemDicomObject {
        &self.dataset
    }

    /// Write the whole object to the given sink.
    ///
    /// The data set is encoded in `dataset_ts`,
    /// which defaults to the output transfer syntax.
    /// Native pixel data may be carried by any other native transfer syntax.
    pub fn write_to<W>(
        self,
        sink: W,
        dataset_ts: Option<&'static TransferSyntax>,
    ) -> Result<TranscodeReport>
    where
        W: Write,
    {
        let DeferredWrite {
            object,
            mut meta,
            dataset,
            output,
            pipeline,
            mut report,
        } = self;
        let dataset_ts = match dataset_ts {
            Some(ts) if ts != output => {
                ensure!(
                    output.is_native() && ts.is_native() && ts.is_dataset_supported(),
                    IncompatibleDatasetTransferSyntaxSnafu {
                        uid: ts.uid(),
                        target: output.uid(),
                    }
                );
                ts
            }
            _ => output,
        };
        meta.set_transfer_syntax(dataset_ts.uid());
        report.transfer_syntax = dataset_ts.uid();

        let mut sink = sink;
        fragstream_object::write_file_header(&mut sink, &meta).context(WriteObjectSnafu)?;
        let mut writer = DataSetWriter::new(sink, dataset_ts.is_explicit_vr());
        writer
            .write_before_pixel_data(&dataset)
            .context(WriteDataSetSnafu)?;
        match pipeline {
            None => object
                .write_pixel_data(&mut writer)
                .context(WriteObjectSnafu)?,
            Some(mut pipeline) => pipeline.write(&mut writer, output.is_native())?,
        }
        writer
            .write_after_pixel_data(&dataset)
            .context(WriteDataSetSnafu)?;
        writer.flush().context(WritePixelDataSnafu)?;
        Ok(report)
    }

    /// Write the whole object to a new file.
    ///
    /// The output is written to a temporary file in the same directory,
    /// which only replaces `path` once everything was written.
    /// On failure, the temporary file is removed.
    pub fn write_file<P>(
        self,
        path: P,
        dataset_ts: Option<&'static TransferSyntax>,
    ) -> Result<TranscodeReport>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut file = tempfile::Builder::new()
            .prefix(".transcode")
            .tempfile_in(dir)
            .context(CreateTempFileSnafu { dir })?;
        let report = self.write_to(BufWriter::new(file.as_file_mut()), dataset_ts)?;
        file.persist(path).context(PersistFileSnafu { path })?;
        debug!("Written {}", path.display());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fragstream_object::{FileMetaTableBuilder, InMemElement, PixelData};
    use rstest::rstest;

    #[rstest]
    #[case(&entries::EXPLICIT_VR_LITTLE_ENDIAN, &entries::IMPLICIT_VR_LITTLE_ENDIAN, true, false, false)]
    #[case(&entries::EXPLICIT_VR_LITTLE_ENDIAN, &entries::EXPLICIT_VR_LITTLE_ENDIAN, true, true, true)]
    #[case(&entries::RLE_LOSSLESS, &entries::RLE_LOSSLESS, true, false, false)]
    #[case(&entries::RLE_LOSSLESS, &entries::EXPLICIT_VR_LITTLE_ENDIAN, true, false, true)]
    #[case(&entries::EXPLICIT_VR_LITTLE_ENDIAN, &entries::JPEG_BASELINE, true, false, true)]
    #[case(&entries::EXPLICIT_VR_LITTLE_ENDIAN, &entries::JPEG_BASELINE, false, true, false)]
    fn necessity(
        #[case] source: &TransferSyntax,
        #[case] target: &TransferSyntax,
        #[case] has_pixel_data: bool,
        #[case] has_editor: bool,
        #[case] expected: bool,
    ) {
        assert_eq!(
            transcode_needed(source, target, has_pixel_data, has_editor),
            expected
        );
    }

    #[test]
    fn default_options() {
        let options = TranscodeOptions::default();
        assert_eq!(options.encode().quality, None);
        let fallbacks: Vec<_> = options.fallbacks.iter().map(|ts| ts.uid()).collect();
        assert_eq!(
            fallbacks,
            vec![
                entries::RLE_LOSSLESS.uid(),
                entries::EXPLICIT_VR_LITTLE_ENDIAN.uid()
            ]
        );
        let options = options.quality(50).compression_ratio(8.);
        assert_eq!(options.encode().quality, Some(50));
        assert_eq!(options.encode().compression_ratio, Some(8.));
    }

    fn object(bits_allocated: u16, frames: u32) -> FileDicomObject {
        let meta = FileMetaTableBuilder::new()
            .media_storage_sop_class_uid("1.2.840.10008.5.1.4.1.1.7")
            .media_storage_sop_instance_uid("2.25.9")
            .transfer_syntax(entries::EXPLICIT_VR_LITTLE_ENDIAN.uid())
            .build()
            .unwrap();
        let obj = InMemDicomObject::from_element_iter([
            InMemElement::primitive(tags::SAMPLES_PER_PIXEL, VR::US, 1_u16),
            InMemElement::primitive(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "MONOCHROME2"),
            InMemElement::primitive(tags::NUMBER_OF_FRAMES, VR::IS, frames.to_string()),
            InMemElement::primitive(tags::ROWS, VR::US, 2_u16),
            InMemElement::primitive(tags::COLUMNS, VR::US, 2_u16),
            InMemElement::primitive(tags::BITS_ALLOCATED, VR::US, bits_allocated),
            InMemElement::primitive(tags::BITS_STORED, VR::US, bits_allocated),
            InMemElement::primitive(tags::PIXEL_REPRESENTATION, VR::US, 0_u16),
        ]);
        let len = 4 * usize::from(bits_allocated / 8) * frames as usize;
        let data = (0..len).map(|i| i as u8).collect();
        FileDicomObject::new_in_memory(
            meta,
            obj,
            Some(PixelData::InMemoryNative { vr: VR::OB, data }),
        )
    }

    #[test]
    fn unrepresentable_image_falls_back() {
        let obj = object(32, 1);
        let deferred = Transcoder::new(&obj, &entries::JPEG_BASELINE)
            .prepare()
            .unwrap();
        let report = deferred.report();
        assert!(report.transcoded);
        assert!(report.is_adjusted());
        assert_eq!(report.transfer_syntax, entries::RLE_LOSSLESS.uid());
        assert_eq!(report.adjustments.len(), 1);
        assert_eq!(report.adjustments[0].skipped, entries::JPEG_BASELINE.uid());
        assert_eq!(deferred.meta().transfer_syntax(), entries::RLE_LOSSLESS.uid());
    }

    #[test]
    fn no_suitable_encoding() {
        let obj = object(32, 1);
        let err = Transcoder::new(&obj, &entries::JPEG_BASELINE)
            .with_options(TranscodeOptions::new().fallbacks([]))
            .prepare()
            .unwrap_err();
        assert!(matches!(err, Error(InnerError::NoSuitableEncoding)));
    }

    #[test]
    fn editor_forces_transcoding() {
        let obj = object(8, 2);
        let mut seen = Vec::new();
        let mut out = Vec::new();
        let report = Transcoder::new(&obj, &entries::EXPLICIT_VR_LITTLE_ENDIAN)
            .with_editor(|frame, descriptor, data| {
                assert_eq!(descriptor.frame_len(), 4);
                seen.push(frame);
                data.iter_mut().for_each(|v| *v = 0xFF);
            })
            .prepare()
            .unwrap()
            .write_to(&mut out, None)
            .unwrap();
        assert!(report.transcoded);
        assert!(!report.is_adjusted());
        assert_eq!(seen, vec![0, 1]);
        // the edited pixel data closes the output
        assert_eq!(&out[out.len() - 8..], &[0xFF; 8]);
    }

    #[test]
    fn dataset_encoding_chosen_when_writing() {
        let obj = object(8, 1);
        let deferred = Transcoder::new(&obj, &entries::EXPLICIT_VR_LITTLE_ENDIAN)
            .prepare()
            .unwrap();
        let report = deferred
            .write_to(Vec::new(), Some(&entries::IMPLICIT_VR_LITTLE_ENDIAN))
            .unwrap();
        assert!(!report.transcoded);
        assert_eq!(
            report.transfer_syntax,
            entries::IMPLICIT_VR_LITTLE_ENDIAN.uid()
        );

        let deferred = Transcoder::new(&obj, &entries::RLE_LOSSLESS)
            .prepare()
            .unwrap();
        let err = deferred
            .write_to(Vec::new(), Some(&entries::IMPLICIT_VR_LITTLE_ENDIAN))
            .unwrap_err();
        assert!(matches!(
            err,
            Error(InnerError::IncompatibleDatasetTransferSyntax { .. })
        ));
    }

    #[test]
    fn attributes_rewritten_for_encoding() {
        let mut obj = object(8, 1);
        obj.put(InMemElement::primitive(
            tags::ENCAPSULATED_PIXEL_DATA_VALUE_TOTAL_LENGTH,
            VR::UV,
            8_u64,
        ));
        let deferred = Transcoder::new(&obj, &entries::RLE_LOSSLESS)
            .prepare()
            .unwrap();
        let dataset = deferred.dataset();
        assert!(dataset
            .element_opt(tags::ENCAPSULATED_PIXEL_DATA_VALUE_TOTAL_LENGTH)
            .is_none());
        assert_eq!(
            dataset.str_value(tags::PHOTOMETRIC_INTERPRETATION).unwrap(),
            "MONOCHROME2"
        );
        assert_eq!(dataset.u16_value(tags::ROWS), Some(2));
    }

    #[test]
    fn bit_packer_joins_frames() {
        let mut packer = BitPacker::default();
        assert_eq!(packer.push(&[0xFF, 0x01], 9), vec![0xFF]);
        assert_eq!(packer.push(&[0x01, 0xFF], 9), vec![0x03]);
        assert_eq!(packer.finish(), Some(0x02));

        let mut packer = BitPacker::default();
        assert_eq!(packer.push(&[0xAB], 8), vec![0xAB]);
        assert_eq!(packer.finish(), None);
    }

    #[test]
    fn single_bit_frames_stay_packed() {
        let meta = FileMetaTableBuilder::new()
            .media_storage_sop_class_uid("1.2.840.10008.5.1.4.1.1.7")
            .media_storage_sop_instance_uid("2.25.10")
            .transfer_syntax(entries::EXPLICIT_VR_LITTLE_ENDIAN.uid())
            .build()
            .unwrap();
        let obj = InMemDicomObject::from_element_iter([
            InMemElement::primitive(tags::SAMPLES_PER_PIXEL, VR::US, 1_u16),
            InMemElement::primitive(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "MONOCHROME2"),
            InMemElement::primitive(tags::NUMBER_OF_FRAMES, VR::IS, "2"),
            InMemElement::primitive(tags::ROWS, VR::US, 3_u16),
            InMemElement::primitive(tags::COLUMNS, VR::US, 3_u16),
            InMemElement::primitive(tags::BITS_ALLOCATED, VR::US, 1_u16),
            InMemElement::primitive(tags::BITS_STORED, VR::US, 1_u16),
            InMemElement::primitive(tags::PIXEL_REPRESENTATION, VR::US, 0_u16),
        ]);
        let obj = FileDicomObject::new_in_memory(
            meta,
            obj,
            Some(PixelData::InMemoryNative {
                vr: VR::OB,
                data: vec![0xFF, 0x03, 0x02],
            }),
        );

        let mut frames = Vec::new();
        let mut out = Vec::new();
        Transcoder::new(&obj, &entries::EXPLICIT_VR_LITTLE_ENDIAN)
            .with_editor(|_, _, data| frames.push(data.clone()))
            .prepare()
            .unwrap()
            .write_to(&mut out, None)
            .unwrap();
        assert_eq!(frames, vec![vec![0xFF, 0x01], vec![0x01, 0x01]]);
        // 18 bits, padded to an even length
        assert_eq!(
            &out[out.len() - 16..out.len() - 4],
            &[0xE0, 0x7F, 0x10, 0x00, b'O', b'B', 0, 0, 4, 0, 0, 0]
        );
        assert_eq!(&out[out.len() - 4..], &[0xFF, 0x03, 0x02, 0x00]);
    }
}
