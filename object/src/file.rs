//! DICOM files: opening, pixel data location and writing.
//!
//! Opening a file reads the file meta group
//! and every data element before the pixel data.
//! The pixel data value itself is not read:
//! only its position is recorded,
//! so that frames can be fetched later on
//! through a [`FrameExtractor`].
use crate::mem::InMemDicomObject;
use crate::meta::FileMetaTable;
use crate::read::DataSetReader;
use crate::write::DataSetWriter;
use crate::{
    AccessError, AccessUnsupportedTransferSyntaxSnafu, DescribeFramesSnafu,
    LocateTrailingElementsSnafu, NoPixelDataSnafu, OpenFileSnafu, OpenPixelSourceSnafu,
    ParseMetaDataSetSnafu, PrintDataSetSnafu, ReadDataSetSnafu, ReadError, ReadFileSnafu,
    ReadPixelDataSnafu, ReadPreambleBytesSnafu, ReadUnsupportedTransferSyntaxSnafu,
    CopyFragmentSnafu, WriteError, WriteFileSnafu, WritePixelDataSnafu,
    WriteUnsupportedTransferSyntaxSnafu,
};
use fragstream_encoding::stream::DEFAULT_RESOLVE_GUARD;
use fragstream_encoding::tags;
use fragstream_encoding::{
    FrameDescriptor, FrameExtractor, FragmentTable, Length, SegmentedStream, VR,
};
use fragstream_transfer_syntax_registry::{TransferSyntax, TransferSyntaxRegistry};
use snafu::{OptionExt, ResultExt};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Open a DICOM file with the default options.
///
/// The file must have the standard encoding structure:
/// 128-byte preamble, file meta group,
/// and the rest of the data set.
pub fn open_file<P>(path: P) -> Result<FileDicomObject, ReadError>
where
    P: AsRef<Path>,
{
    OpenFileOptions::new().open_file(path)
}

/// A builder type for opening a DICOM file with additional options.
///
/// # Example
///
/// ```no_run
/// # use fragstream_object::OpenFileOptions;
/// let file = OpenFileOptions::new()
///     .read_trailing_elements(true)
///     .open_file("path/to/file.dcm")?;
/// # Result::<(), Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenFileOptions {
    read_trailing_elements: bool,
    resolve_guard: usize,
}

impl Default for OpenFileOptions {
    fn default() -> Self {
        OpenFileOptions {
            read_trailing_elements: false,
            resolve_guard: DEFAULT_RESOLVE_GUARD,
        }
    }
}

impl OpenFileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether to read the data elements which follow the pixel data.
    ///
    /// For encapsulated pixel data,
    /// this resolves every fragment item header
    /// to find the end of the pixel data sequence.
    /// Disabled by default.
    pub fn read_trailing_elements(mut self, option: bool) -> Self {
        self.read_trailing_elements = option;
        self
    }

    /// Set how many fragments may be resolved
    /// past the expected end of the pixel data
    /// when looking for the sequence delimiter.
    pub fn resolve_guard(mut self, guard: usize) -> Self {
        self.resolve_guard = guard;
        self
    }

    /// Open the file at the given path.
    pub fn open_file<P>(self, path: P) -> Result<FileDicomObject, ReadError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let mut file = BufReader::new(File::open(path).context(OpenFileSnafu { filename: path })?);

        let mut preamble = [0u8; 128];
        file.read_exact(&mut preamble).context(ReadPreambleBytesSnafu)?;

        let (meta, meta_len) = FileMetaTable::read_from(&mut file).context(ParseMetaDataSetSnafu)?;
        let ts = TransferSyntaxRegistry
            .get(meta.transfer_syntax())
            .filter(|ts| ts.is_dataset_supported())
            .context(ReadUnsupportedTransferSyntaxSnafu {
                uid: meta.transfer_syntax(),
            })?;
        debug!("Opening {} in {}", path.display(), ts);

        let mut reader = DataSetReader::new(&mut file, ts.is_explicit_vr(), 128 + meta_len);
        let (mut obj, header) = reader.read_until_pixel_data().context(ReadDataSetSnafu)?;

        let mut fragments = None;
        let pixel_data = match header {
            None => None,
            Some(header) => {
                let pixel_data = match header.len.get() {
                    Some(length) => PixelData::FileNative {
                        offset: header.value_offset,
                        length,
                        vr: header.vr,
                    },
                    None => PixelData::FileEncapsulated {
                        offset: header.value_offset,
                    },
                };
                if self.read_trailing_elements {
                    let end = match pixel_data {
                        PixelData::FileNative { offset, length, .. } => {
                            Some(offset + u64::from(length))
                        }
                        _ => {
                            // expect at least one fragment per frame,
                            // the guard covers frames split over more fragments
                            let frames = obj.int_value(tags::NUMBER_OF_FRAMES).unwrap_or(1).max(1);
                            let mut table = FragmentTable::encapsulated(header.value_offset);
                            let end = SegmentedStream::slots(
                                &mut file,
                                &mut table,
                                0..frames as usize + 1,
                            )
                            .with_resolve_guard(self.resolve_guard)
                            .offset_past_end()
                            .context(LocateTrailingElementsSnafu)?;
                            fragments = Some(table);
                            end
                        }
                    };
                    match end {
                        Some(end) => {
                            file.seek(SeekFrom::Start(end))
                                .context(ReadFileSnafu { filename: path })?;
                            DataSetReader::new(&mut file, ts.is_explicit_vr(), end)
                                .read_to_end(&mut obj)
                                .context(ReadDataSetSnafu)?;
                        }
                        None => warn!(
                            "End of pixel data not found in {}, trailing elements were not read",
                            path.display()
                        ),
                    }
                }
                Some(pixel_data)
            }
        };

        Ok(FileDicomObject {
            meta,
            obj,
            pixel_data,
            path: Some(path.to_path_buf()),
            fragments,
        })
    }
}

/// Where the pixel data of an object lives.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelData {
    /// Native pixel data in a file,
    /// as a single value of the given length.
    FileNative { offset: u64, length: u32, vr: VR },
    /// Encapsulated pixel data in a file,
    /// `offset` being the position of the first item header.
    FileEncapsulated { offset: u64 },
    /// Native pixel data in memory.
    InMemoryNative { vr: VR, data: Vec<u8> },
    /// Encapsulated pixel data in memory.
    InMemoryEncapsulated {
        offset_table: Vec<u32>,
        fragments: Vec<Vec<u8>>,
    },
}

impl PixelData {
    pub fn is_encapsulated(&self) -> bool {
        matches!(
            self,
            PixelData::FileEncapsulated { .. } | PixelData::InMemoryEncapsulated { .. }
        )
    }
}

/// The byte source of an object's pixel data.
#[derive(Debug)]
pub enum PixelSource {
    /// A fresh handle to the object's file.
    File(BufReader<File>),
    /// A memory buffer, for objects whose pixel data is inline.
    Memory(Cursor<Vec<u8>>),
}

impl Read for PixelSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            PixelSource::File(f) => f.read(buf),
            PixelSource::Memory(m) => m.read(buf),
        }
    }
}

impl Seek for PixelSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            PixelSource::File(f) => f.seek(pos),
            PixelSource::Memory(m) => m.seek(pos),
        }
    }
}

/// A DICOM object with its file meta group
/// and the location of its pixel data.
///
/// The object dereferences to the data set attributes,
/// which never include the pixel data element.
#[derive(Debug)]
pub struct FileDicomObject {
    meta: FileMetaTable,
    obj: InMemDicomObject,
    pixel_data: Option<PixelData>,
    path: Option<PathBuf>,
    /// fragments already resolved while opening
    fragments: Option<FragmentTable>,
}

impl FileDicomObject {
    /// Create an object which is not backed by a file.
    ///
    /// `FileNative` and `FileEncapsulated` pixel data
    /// cannot be read from such an object.
    pub fn new_in_memory(
        meta: FileMetaTable,
        obj: InMemDicomObject,
        pixel_data: Option<PixelData>,
    ) -> Self {
        FileDicomObject {
            meta,
            obj,
            pixel_data,
            path: None,
            fragments: None,
        }
    }

    pub fn meta(&self) -> &FileMetaTable {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut FileMetaTable {
        &mut self.meta
    }

    pub fn pixel_data(&self) -> Option<&PixelData> {
        self.pixel_data.as_ref()
    }

    /// The path of the file this object was opened from.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Separate the data set attributes from the rest of the object.
    pub fn into_parts(self) -> (FileMetaTable, InMemDicomObject, Option<PixelData>) {
        (self.meta, self.obj, self.pixel_data)
    }

    /// The transfer syntax declared in the file meta group.
    pub fn transfer_syntax(&self) -> Result<&'static TransferSyntax, AccessError> {
        TransferSyntaxRegistry
            .get(self.meta.transfer_syntax())
            .context(AccessUnsupportedTransferSyntaxSnafu {
                uid: self.meta.transfer_syntax(),
            })
    }

    /// Describe the image frames from the object's attributes.
    pub fn frame_descriptor(&self) -> Result<FrameDescriptor, AccessError> {
        FrameDescriptor::from_attributes(&self.obj).context(DescribeFramesSnafu)
    }

    /// Create a fragment table for the object's pixel data.
    ///
    /// Fragments already resolved while opening the file are kept.
    pub fn fragment_table(&self) -> Result<FragmentTable, AccessError> {
        if let Some(table) = &self.fragments {
            return Ok(table.clone());
        }
        let pixel_data = self.pixel_data.as_ref().context(NoPixelDataSnafu)?;
        Ok(match pixel_data {
            PixelData::FileNative { offset, length, .. } => {
                FragmentTable::native(*offset, *length, self.transfer_syntax()?.endianness())
            }
            PixelData::FileEncapsulated { offset } => FragmentTable::encapsulated(*offset),
            PixelData::InMemoryNative { data, .. } => FragmentTable::native_inline(data.clone()),
            PixelData::InMemoryEncapsulated {
                offset_table,
                fragments,
            } => FragmentTable::from_fragments(offset_table, fragments.iter().cloned()),
        })
    }

    /// Open an independent byte source for the object's pixel data.
    pub fn open_pixel_source(&self) -> Result<PixelSource, AccessError> {
        match self.pixel_data.as_ref().context(NoPixelDataSnafu)? {
            PixelData::FileNative { .. } | PixelData::FileEncapsulated { .. } => {
                let path = self.path.as_ref().context(NoPixelDataSnafu)?;
                let file = File::open(path).context(OpenPixelSourceSnafu { filename: path })?;
                Ok(PixelSource::File(BufReader::new(file)))
            }
            PixelData::InMemoryNative { .. } | PixelData::InMemoryEncapsulated { .. } => {
                Ok(PixelSource::Memory(Cursor::new(Vec::new())))
            }
        }
    }

    /// Create a frame extractor over the object's pixel data,
    /// with its own byte source.
    pub fn frame_extractor(&self) -> Result<FrameExtractor<PixelSource>, AccessError> {
        let ts = self.transfer_syntax()?;
        let layout = ts
            .fragment_layout()
            .context(AccessUnsupportedTransferSyntaxSnafu { uid: ts.uid() })?;
        let descriptor = self.frame_descriptor()?;
        let table = self.fragment_table()?;
        let source = self.open_pixel_source()?;
        Ok(FrameExtractor::new(source, table, descriptor, layout))
    }

    /// Write the object to a new file at the given path,
    /// in the transfer syntax of its file meta group.
    pub fn write_to_file<P>(&self, path: P) -> Result<(), WriteError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let file = File::create(path).context(WriteFileSnafu { filename: path })?;
        let mut to = BufWriter::new(file);
        self.write_all(&mut to)?;
        to.flush().context(WriteFileSnafu { filename: path })
    }

    /// Write the whole object, including preamble and file meta group,
    /// to the given writer.
    ///
    /// Pixel data is copied as is, without decoding.
    pub fn write_all<W>(&self, mut to: W) -> Result<(), WriteError>
    where
        W: Write,
    {
        let ts = TransferSyntaxRegistry
            .get(self.meta.transfer_syntax())
            .filter(|ts| ts.is_dataset_supported())
            .context(WriteUnsupportedTransferSyntaxSnafu {
                uid: self.meta.transfer_syntax(),
            })?;
        crate::write_file_header(&mut to, &self.meta)?;

        let mut writer = DataSetWriter::new(to, ts.is_explicit_vr());
        writer
            .write_before_pixel_data(&self.obj)
            .context(PrintDataSetSnafu)?;
        self.write_pixel_data(&mut writer)?;
        writer
            .write_after_pixel_data(&self.obj)
            .context(PrintDataSetSnafu)
    }

    /// Write the pixel data element as is,
    /// streaming every fragment from its source.
    ///
    /// Nothing is written if the object has no pixel data.
    pub fn write_pixel_data<W>(&self, writer: &mut DataSetWriter<W>) -> Result<(), WriteError>
    where
        W: Write,
    {
        let pixel_data = match &self.pixel_data {
            Some(pixel_data) => pixel_data,
            None => return Ok(()),
        };
        let mut source = self.open_pixel_source().context(ReadPixelDataSnafu)?;
        let mut table = self.fragment_table().context(ReadPixelDataSnafu)?;
        match pixel_data {
            PixelData::FileNative { length, vr, .. } => {
                writer
                    .write_header(tags::PIXEL_DATA, *vr, Length(*length))
                    .context(PrintDataSetSnafu)?;
                SegmentedStream::single_slot(&mut source, &mut table, 1)
                    .transfer_to(writer.get_mut())
                    .context(CopyFragmentSnafu)?;
            }
            PixelData::InMemoryNative { vr, data } => {
                writer
                    .write_header(tags::PIXEL_DATA, *vr, Length(data.len() as u32))
                    .context(PrintDataSetSnafu)?;
                writer.write_all(data).context(WritePixelDataSnafu)?;
            }
            PixelData::FileEncapsulated { .. } | PixelData::InMemoryEncapsulated { .. } => {
                writer
                    .write_encapsulated_pixel_data_header()
                    .context(PrintDataSetSnafu)?;
                let mut slot = 0;
                while table.resolve(&mut source, slot).context(CopyFragmentSnafu)? {
                    let len = table.get(slot).and_then(|f| f.len()).unwrap_or(0);
                    fragstream_encoding::header::write_item_header(
                        writer.get_mut(),
                        fragstream_encoding::header::ITEM,
                        Length(len as u32),
                    )
                    .context(WritePixelDataSnafu)?;
                    SegmentedStream::single_slot(&mut source, &mut table, slot)
                        .transfer_to(writer.get_mut())
                        .context(CopyFragmentSnafu)?;
                    slot += 1;
                }
                writer
                    .write_sequence_delimiter()
                    .context(PrintDataSetSnafu)?;
            }
        }
        Ok(())
    }
}

impl std::ops::Deref for FileDicomObject {
    type Target = InMemDicomObject;

    fn deref(&self) -> &Self::Target {
        &self.obj
    }
}

impl std::ops::DerefMut for FileDicomObject {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::InMemElement;
    use crate::meta::FileMetaTableBuilder;
    use fragstream_encoding::header::{write_item_header, ITEM, SEQUENCE_DELIMITER};
    use fragstream_encoding::PrimitiveValue;
    use fragstream_transfer_syntax_registry::entries;

    fn meta(ts: &str) -> FileMetaTable {
        FileMetaTableBuilder::new()
            .media_storage_sop_class_uid("1.2.840.10008.5.1.4.1.1.7")
            .media_storage_sop_instance_uid("2.25.1")
            .transfer_syntax(ts)
            .build()
            .unwrap()
    }

    fn image(rows: u16, columns: u16, frames: u32) -> InMemDicomObject {
        InMemDicomObject::from_element_iter([
            InMemElement::primitive(tags::SAMPLES_PER_PIXEL, VR::US, 1_u16),
            InMemElement::primitive(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "MONOCHROME2"),
            InMemElement::primitive(tags::NUMBER_OF_FRAMES, VR::IS, frames.to_string()),
            InMemElement::primitive(tags::ROWS, VR::US, rows),
            InMemElement::primitive(tags::COLUMNS, VR::US, columns),
            InMemElement::primitive(tags::BITS_ALLOCATED, VR::US, 8_u16),
            InMemElement::primitive(tags::BITS_STORED, VR::US, 8_u16),
            InMemElement::primitive(tags::PIXEL_REPRESENTATION, VR::US, 0_u16),
        ])
    }

    #[test]
    fn native_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("native.dcm");

        let data: Vec<u8> = (0..32).collect();
        let mut obj = image(4, 4, 2);
        obj.put(InMemElement::new(
            fragstream_encoding::Tag(0xFFFA, 0xFFFA),
            VR::OB,
            crate::Value::Primitive(PrimitiveValue::from(vec![9_u8, 9])),
        ));
        let object = FileDicomObject::new_in_memory(
            meta(entries::EXPLICIT_VR_LITTLE_ENDIAN.uid()),
            obj,
            Some(PixelData::InMemoryNative { vr: VR::OB, data }),
        );
        object.write_to_file(&path).unwrap();

        let reopened = OpenFileOptions::new()
            .read_trailing_elements(true)
            .open_file(&path)
            .unwrap();
        assert!(matches!(
            reopened.pixel_data(),
            Some(PixelData::FileNative { length: 32, .. })
        ));
        assert_eq!(reopened.u16_value(tags::ROWS), Some(4));
        assert!(reopened
            .element_opt(fragstream_encoding::Tag(0xFFFA, 0xFFFA))
            .is_some());

        let mut frames = reopened.frame_extractor().unwrap();
        assert_eq!(frames.frame_bytes(1).unwrap(), (16..32).collect::<Vec<u8>>());
    }

    #[test]
    fn encapsulated_trailing_elements() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("encapsulated.dcm");

        let mut obj = image(2, 2, 2);
        obj.put(InMemElement::new(
            fragstream_encoding::Tag(0xFFFA, 0xFFFA),
            VR::OB,
            crate::Value::Primitive(PrimitiveValue::from(vec![1_u8, 2])),
        ));
        let object = FileDicomObject::new_in_memory(
            meta(entries::ENCAPSULATED_UNCOMPRESSED_EXPLICIT_VR_LITTLE_ENDIAN.uid()),
            obj,
            Some(PixelData::InMemoryEncapsulated {
                offset_table: vec![],
                fragments: vec![vec![1, 2, 3, 4], vec![5, 6, 7, 8]],
            }),
        );
        object.write_to_file(&path).unwrap();

        // without trailing elements
        let plain = open_file(&path).unwrap();
        assert!(plain
            .element_opt(fragstream_encoding::Tag(0xFFFA, 0xFFFA))
            .is_none());

        let full = OpenFileOptions::new()
            .read_trailing_elements(true)
            .open_file(&path)
            .unwrap();
        assert!(full
            .element_opt(fragstream_encoding::Tag(0xFFFA, 0xFFFA))
            .is_some());
        let mut frames = full.frame_extractor().unwrap();
        assert_eq!(frames.fragment_count().unwrap(), 2);
        assert_eq!(frames.frame_bytes(1).unwrap(), vec![5, 6, 7, 8]);
    }

    #[test]
    fn trailing_elements_past_resolve_guard() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("many.dcm");

        // one frame declared, four fragments
        let mut obj = image(1, 1, 1);
        obj.put(InMemElement::primitive(
            fragstream_encoding::Tag(0xFFFA, 0xFFFA),
            VR::OB,
            vec![0_u8, 0],
        ));
        let object = FileDicomObject::new_in_memory(
            meta(entries::ENCAPSULATED_UNCOMPRESSED_EXPLICIT_VR_LITTLE_ENDIAN.uid()),
            obj,
            Some(PixelData::InMemoryEncapsulated {
                offset_table: vec![],
                fragments: vec![vec![1], vec![2], vec![3], vec![4]],
            }),
        );
        object.write_to_file(&path).unwrap();

        let opened = OpenFileOptions::new()
            .read_trailing_elements(true)
            .resolve_guard(2)
            .open_file(&path)
            .unwrap();
        assert!(opened
            .element_opt(fragstream_encoding::Tag(0xFFFA, 0xFFFA))
            .is_none());

        let opened = OpenFileOptions::new()
            .read_trailing_elements(true)
            .open_file(&path)
            .unwrap();
        assert!(opened
            .element_opt(fragstream_encoding::Tag(0xFFFA, 0xFFFA))
            .is_some());
    }

    #[test]
    fn reject_big_endian() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("be.dcm");
        let mut out = Vec::new();
        crate::write_file_header(&mut out, &meta(entries::EXPLICIT_VR_BIG_ENDIAN.uid())).unwrap();
        std::fs::write(&path, out).unwrap();

        let err = open_file(&path).unwrap_err();
        assert!(matches!(err, ReadError::ReadUnsupportedTransferSyntax { .. }));
    }

    #[test]
    fn open_hand_written_encapsulated_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hand.dcm");

        let mut out = Vec::new();
        crate::write_file_header(
            &mut out,
            &meta(entries::ENCAPSULATED_UNCOMPRESSED_EXPLICIT_VR_LITTLE_ENDIAN.uid()),
        )
        .unwrap();
        let mut writer = DataSetWriter::explicit_vr_le(&mut out);
        writer.write_elements(image(1, 3, 1).iter()).unwrap();
        writer.write_encapsulated_pixel_data_header().unwrap();
        let writer = writer.into_inner();
        write_item_header(writer, ITEM, Length(0)).unwrap();
        write_item_header(writer, ITEM, Length(2)).unwrap();
        writer.extend([1, 2]);
        write_item_header(writer, ITEM, Length(2)).unwrap();
        writer.extend([3, 0]);
        write_item_header(writer, SEQUENCE_DELIMITER, Length(0)).unwrap();
        std::fs::write(&path, out).unwrap();

        let obj = open_file(&path).unwrap();
        assert!(obj.pixel_data().map(PixelData::is_encapsulated).unwrap_or(false));
        let mut frames = obj.frame_extractor().unwrap();
        // a single frame spans every fragment
        assert_eq!(frames.frame_bytes(0).unwrap(), vec![1, 2, 3, 0]);
    }

    #[test]
    fn no_pixel_data() {
        let object =
            FileDicomObject::new_in_memory(meta("1.2.840.10008.1.2.1"), image(1, 1, 1), None);
        assert!(matches!(
            object.frame_extractor(),
            Err(AccessError::NoPixelData { .. })
        ));
    }
}
