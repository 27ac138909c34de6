//! Module containing data structures and readers of DICOM file meta information tables.
use crate::mem::{InMemElement, Value};
use crate::read::{self, DataSetReader};
use crate::write::{self, DataSetWriter};
use fragstream_encoding::tags;
use fragstream_encoding::{Length, PrimitiveValue, Tag, VR};
use snafu::{ensure, Backtrace, OptionExt, ResultExt, Snafu};
use std::io::{Read, Write};
use tracing::debug;

const DICM_MAGIC_CODE: [u8; 4] = [b'D', b'I', b'C', b'M'];

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The file meta group parser could not read
    /// the magic code `DICM` from its source.
    #[snafu(display("Could not start reading DICOM data"))]
    ReadMagicCode {
        backtrace: Backtrace,
        source: std::io::Error,
    },

    /// Invalid DICOM data, detected from checking the `DICM` code.
    #[snafu(display("Invalid DICOM data"))]
    NotDicom { backtrace: Backtrace },

    /// An issue occurred while decoding the next data element
    /// in the file meta data set.
    #[snafu(display("Could not decode data element"))]
    DecodeElement {
        #[snafu(backtrace)]
        source: read::Error,
    },

    /// A data element with an unexpected tag was retrieved:
    /// the parser was expecting another tag first,
    /// or at least one that is part of the the file meta group.
    #[snafu(display("Unexpected data element tagged {}", tag))]
    UnexpectedTag { tag: Tag, backtrace: Backtrace },

    /// A required file meta data element is missing.
    #[snafu(display("Missing data element `{}`", alias))]
    MissingElement {
        alias: &'static str,
        backtrace: Backtrace,
    },

    /// The value length of a data element in the file meta group
    /// was unexpected.
    #[snafu(display("Unexpected length {} for data element tagged {}", length, tag))]
    UnexpectedDataValueLength {
        tag: Tag,
        length: Length,
        backtrace: Backtrace,
    },

    /// The magic code `DICM` could not be written.
    #[snafu(display("Could not write magic code"))]
    WriteMagicCode {
        backtrace: Backtrace,
        source: std::io::Error,
    },

    /// The file meta group data set could not be written.
    #[snafu(display("Could not write file meta group data set"))]
    WriteSet {
        #[snafu(backtrace)]
        source: write::Error,
    },
}

type Result<T, E = Error> = std::result::Result<T, E>;

/// DICOM File Meta Information Table.
///
/// This data type contains the relevant parts of the file meta information table, as
/// specified in [1].
///
/// UIDs are kept without their trailing padding.
///
/// [1]: http://dicom.nema.org/medical/dicom/current/output/chtml/part06/chapter_7.html
#[derive(Debug, Clone, PartialEq)]
pub struct FileMetaTable {
    /// File Meta Information Group Length
    pub information_group_length: u32,
    /// File Meta Information Version
    pub information_version: [u8; 2],
    /// Media Storage SOP Class UID
    pub media_storage_sop_class_uid: String,
    /// Media Storage SOP Instance UID
    pub media_storage_sop_instance_uid: String,
    /// Transfer Syntax UID
    pub transfer_syntax: String,
    /// Implementation Class UID
    pub implementation_class_uid: String,

    /// Implementation Version Name
    pub implementation_version_name: Option<String>,
    /// Source Application Entity Title
    pub source_application_entity_title: Option<String>,
}

impl FileMetaTable {
    /// Read the magic code `DICM` and the file meta group
    /// from the given source.
    pub fn from_reader<R: Read>(file: R) -> Result<Self> {
        Self::read_from(file).map(|(table, _)| table)
    }

    /// Read the magic code `DICM` and the file meta group,
    /// returning the table and the number of bytes read.
    pub(crate) fn read_from<R: Read>(mut file: R) -> Result<(Self, u64)> {
        let mut buff = [0u8; 4];
        file.read_exact(&mut buff).context(ReadMagicCodeSnafu)?;
        ensure!(buff == DICM_MAGIC_CODE, NotDicomSnafu);

        let mut reader = DataSetReader::new(file, true, 4);
        let group_length = {
            let header = reader
                .read_header()
                .context(DecodeElementSnafu)?
                .context(MissingElementSnafu {
                    alias: "FileMetaInformationGroupLength",
                })?;
            ensure!(
                header.tag == tags::FILE_META_INFORMATION_GROUP_LENGTH,
                UnexpectedTagSnafu { tag: header.tag }
            );
            ensure!(
                header.len == Length(4),
                UnexpectedDataValueLengthSnafu {
                    tag: header.tag,
                    length: header.len,
                }
            );
            match reader.read_value(header).context(DecodeElementSnafu)? {
                Value::Primitive(v) => v.to_int().unwrap_or(0) as u32,
                Value::Sequence(_) => return UnexpectedTagSnafu { tag: header.tag }.fail(),
            }
        };

        let end = reader.position() + u64::from(group_length);
        let mut builder = FileMetaTableBuilder::new().group_length(group_length);
        while reader.position() < end {
            let header = reader
                .read_header()
                .context(DecodeElementSnafu)?
                .context(MissingElementSnafu {
                    alias: "TransferSyntax",
                })?;
            ensure!(
                header.tag.is_meta(),
                UnexpectedTagSnafu { tag: header.tag }
            );
            let value = match reader.read_value(header).context(DecodeElementSnafu)? {
                Value::Primitive(v) => v,
                Value::Sequence(_) => return UnexpectedTagSnafu { tag: header.tag }.fail(),
            };
            builder = match header.tag {
                tags::FILE_META_INFORMATION_VERSION => match value {
                    PrimitiveValue::U8(v) if v.len() == 2 => builder.information_version([v[0], v[1]]),
                    _ => {
                        return UnexpectedDataValueLengthSnafu {
                            tag: header.tag,
                            length: header.len,
                        }
                        .fail()
                    }
                },
                tags::MEDIA_STORAGE_SOP_CLASS_UID => {
                    builder.media_storage_sop_class_uid(value.to_str())
                }
                tags::MEDIA_STORAGE_SOP_INSTANCE_UID => {
                    builder.media_storage_sop_instance_uid(value.to_str())
                }
                tags::TRANSFER_SYNTAX_UID => builder.transfer_syntax(value.to_str()),
                tags::IMPLEMENTATION_CLASS_UID => builder.implementation_class_uid(value.to_str()),
                tags::IMPLEMENTATION_VERSION_NAME => {
                    builder.implementation_version_name(value.to_str())
                }
                tags::SOURCE_APPLICATION_ENTITY_TITLE => {
                    builder.source_application_entity_title(value.to_str())
                }
                tag => {
                    debug!("Ignoring file meta element {}", tag);
                    builder
                }
            };
        }

        let read = reader.position();
        builder.build().map(|table| (table, read))
    }

    /// Retrieve the transfer syntax UID, without padding.
    pub fn transfer_syntax(&self) -> &str {
        self.transfer_syntax.trim_end_matches(['\0', ' '])
    }

    /// Set the transfer syntax UID
    /// and update the group length accordingly.
    pub fn set_transfer_syntax(&mut self, uid: &str) {
        self.transfer_syntax = uid.trim_end_matches(['\0', ' ']).to_string();
        self.update_information_group_length();
    }

    /// Recalculate the file meta information group length
    /// from the current contents of the table.
    pub fn update_information_group_length(&mut self) {
        self.information_group_length = self
            .body_elements()
            .iter()
            .map(|e| match e.value() {
                Value::Primitive(v) => {
                    let header_len = if e.vr().has_short_length() { 8 } else { 12 };
                    header_len + v.to_bytes(e.vr()).len() as u32
                }
                Value::Sequence(_) => 0,
            })
            .sum();
    }

    /// The elements of the meta group, except for the group length.
    fn body_elements(&self) -> Vec<InMemElement> {
        let mut elems = vec![
            InMemElement::primitive(
                tags::FILE_META_INFORMATION_VERSION,
                VR::OB,
                self.information_version.to_vec(),
            ),
            InMemElement::primitive(
                tags::MEDIA_STORAGE_SOP_CLASS_UID,
                VR::UI,
                self.media_storage_sop_class_uid.as_str(),
            ),
            InMemElement::primitive(
                tags::MEDIA_STORAGE_SOP_INSTANCE_UID,
                VR::UI,
                self.media_storage_sop_instance_uid.as_str(),
            ),
            InMemElement::primitive(tags::TRANSFER_SYNTAX_UID, VR::UI, self.transfer_syntax.as_str()),
            InMemElement::primitive(
                tags::IMPLEMENTATION_CLASS_UID,
                VR::UI,
                self.implementation_class_uid.as_str(),
            ),
        ];
        if let Some(v) = &self.implementation_version_name {
            elems.push(InMemElement::primitive(
                tags::IMPLEMENTATION_VERSION_NAME,
                VR::SH,
                v.as_str(),
            ));
        }
        if let Some(v) = &self.source_application_entity_title {
            elems.push(InMemElement::primitive(
                tags::SOURCE_APPLICATION_ENTITY_TITLE,
                VR::AE,
                v.as_str(),
            ));
        }
        elems
    }

    /// Write the magic code `DICM` and the file meta group.
    ///
    /// The group length is recalculated before writing.
    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        let mut table = self.clone();
        table.update_information_group_length();

        writer
            .write_all(&DICM_MAGIC_CODE)
            .context(WriteMagicCodeSnafu)?;

        let mut dset = DataSetWriter::explicit_vr_le(writer);
        dset.write_element(&InMemElement::primitive(
            tags::FILE_META_INFORMATION_GROUP_LENGTH,
            VR::UL,
            table.information_group_length,
        ))
        .context(WriteSetSnafu)?;
        dset.write_elements(&table.body_elements())
            .context(WriteSetSnafu)
    }
}

/// A builder for DICOM meta information tables.
#[derive(Debug, Default, Clone)]
pub struct FileMetaTableBuilder {
    /// File Meta Information Group Length (UL)
    information_group_length: Option<u32>,
    /// File Meta Information Version (OB)
    information_version: Option<[u8; 2]>,
    /// Media Storage SOP Class UID (UI)
    media_storage_sop_class_uid: Option<String>,
    /// Media Storage SOP Instance UID (UI)
    media_storage_sop_instance_uid: Option<String>,
    /// Transfer Syntax UID (UI)
    transfer_syntax: Option<String>,
    /// Implementation Class UID (UI)
    implementation_class_uid: Option<String>,

    /// Implementation Version Name (SH)
    implementation_version_name: Option<String>,
    /// Source Application Entity Title (AE)
    source_application_entity_title: Option<String>,
}

/// Remove trailing padding from a UID or short text value.
fn trimmed<T: AsRef<str>>(value: T) -> String {
    value.as_ref().trim_end_matches(['\0', ' ']).to_string()
}

impl FileMetaTableBuilder {
    /// Create a new, empty builder.
    pub fn new() -> FileMetaTableBuilder {
        FileMetaTableBuilder::default()
    }

    /// Define the meta information group length.
    pub fn group_length(mut self, value: u32) -> FileMetaTableBuilder {
        self.information_group_length = Some(value);
        self
    }

    /// Define the meta information version.
    pub fn information_version(mut self, value: [u8; 2]) -> FileMetaTableBuilder {
        self.information_version = Some(value);
        self
    }

    /// Define the media storage SOP class UID.
    pub fn media_storage_sop_class_uid<T: AsRef<str>>(mut self, value: T) -> FileMetaTableBuilder {
        self.media_storage_sop_class_uid = Some(trimmed(value));
        self
    }

    /// Define the media storage SOP instance UID.
    pub fn media_storage_sop_instance_uid<T: AsRef<str>>(
        mut self,
        value: T,
    ) -> FileMetaTableBuilder {
        self.media_storage_sop_instance_uid = Some(trimmed(value));
        self
    }

    /// Define the transfer syntax UID.
    pub fn transfer_syntax<T: AsRef<str>>(mut self, value: T) -> FileMetaTableBuilder {
        self.transfer_syntax = Some(trimmed(value));
        self
    }

    /// Define the implementation class UID.
    pub fn implementation_class_uid<T: AsRef<str>>(mut self, value: T) -> FileMetaTableBuilder {
        self.implementation_class_uid = Some(trimmed(value));
        self
    }

    /// Define the implementation version name.
    pub fn implementation_version_name<T: AsRef<str>>(mut self, value: T) -> FileMetaTableBuilder {
        self.implementation_version_name = Some(trimmed(value));
        self
    }

    /// Define the source application entity title.
    pub fn source_application_entity_title<T: AsRef<str>>(
        mut self,
        value: T,
    ) -> FileMetaTableBuilder {
        self.source_application_entity_title = Some(trimmed(value));
        self
    }

    /// Build the table.
    ///
    /// The implementation class UID and version name
    /// default to those of this library.
    pub fn build(self) -> Result<FileMetaTable> {
        let information_version = self.information_version.unwrap_or([0, 1]);
        let media_storage_sop_class_uid =
            self.media_storage_sop_class_uid
                .context(MissingElementSnafu {
                    alias: "MediaStorageSOPClassUID",
                })?;
        let media_storage_sop_instance_uid =
            self.media_storage_sop_instance_uid
                .context(MissingElementSnafu {
                    alias: "MediaStorageSOPInstanceUID",
                })?;
        let transfer_syntax = self.transfer_syntax.context(MissingElementSnafu {
            alias: "TransferSyntax",
        })?;
        let (implementation_class_uid, implementation_version_name) =
            match self.implementation_class_uid {
                Some(uid) => (uid, self.implementation_version_name),
                None => (
                    crate::IMPLEMENTATION_CLASS_UID.to_string(),
                    self.implementation_version_name
                        .or_else(|| Some(crate::IMPLEMENTATION_VERSION_NAME.to_string())),
                ),
            };

        let mut table = FileMetaTable {
            information_group_length: 0,
            information_version,
            media_storage_sop_class_uid,
            media_storage_sop_instance_uid,
            transfer_syntax,
            implementation_class_uid,
            implementation_version_name,
            source_application_entity_title: self.source_application_entity_title,
        };
        match self.information_group_length {
            Some(len) => table.information_group_length = len,
            None => table.update_information_group_length(),
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> FileMetaTable {
        FileMetaTableBuilder::new()
            .media_storage_sop_class_uid("1.2.840.10008.5.1.4.1.1.7")
            .media_storage_sop_instance_uid("2.25.123456789")
            .transfer_syntax("1.2.840.10008.1.2.1\0")
            .build()
            .unwrap()
    }

    #[test]
    fn build_with_defaults() {
        let table = sample_table();
        assert_eq!(table.transfer_syntax(), "1.2.840.10008.1.2.1");
        assert_eq!(table.information_version, [0, 1]);
        assert_eq!(table.implementation_class_uid, crate::IMPLEMENTATION_CLASS_UID);
        assert!(table.information_group_length > 0);
    }

    #[test]
    fn missing_transfer_syntax() {
        let err = FileMetaTableBuilder::new()
            .media_storage_sop_class_uid("1.2.3")
            .media_storage_sop_instance_uid("4.5.6")
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::MissingElement {
                alias: "TransferSyntax",
                ..
            }
        ));
    }

    #[test]
    fn write_then_read() {
        let table = sample_table();
        let mut out = Vec::new();
        table.write(&mut out).unwrap();
        assert_eq!(&out[0..4], b"DICM");
        // group length element covers the rest of the group
        assert_eq!(out.len() as u32, 4 + 12 + table.information_group_length);

        let (read, bytes_read) = FileMetaTable::read_from(&out[..]).unwrap();
        assert_eq!(bytes_read, out.len() as u64);
        assert_eq!(read, table);
    }

    #[test]
    fn change_transfer_syntax() {
        let mut table = sample_table();
        let before = table.information_group_length;
        table.set_transfer_syntax("1.2.840.10008.1.2.4.50");
        assert_eq!(table.transfer_syntax(), "1.2.840.10008.1.2.4.50");
        assert_eq!(table.information_group_length, before + 2);
    }

    #[test]
    fn not_dicom() {
        let err = FileMetaTable::from_reader(&b"DICX"[..]).unwrap_err();
        assert!(matches!(err, Error::NotDicom { .. }));
    }
}
