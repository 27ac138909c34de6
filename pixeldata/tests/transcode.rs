//! Transcoding files into other transfer syntaxes and reading them back.
use fragstream_encoding::tags;
use fragstream_encoding::VR;
use fragstream_object::{
    open_file, FileDicomObject, FileMetaTableBuilder, InMemDicomObject, InMemElement, PixelData,
};
use fragstream_pixeldata::{Transcode, TranscodeOptions, Transcoder};
use fragstream_transfer_syntax_registry::{entries, TransferSyntax};
use std::path::Path;

/// Write a native object with the given geometry
/// and return the pixel data written.
fn write_source(
    path: &Path,
    ts: &TransferSyntax,
    samples_per_pixel: u16,
    bits_allocated: u16,
    frames: u32,
    data_frames: u32,
) -> Vec<u8> {
    let (rows, columns) = (8_u16, 6_u16);
    let frame_len = usize::from(rows)
        * usize::from(columns)
        * usize::from(samples_per_pixel)
        * usize::from(bits_allocated / 8);
    let data: Vec<u8> = (0..frame_len * data_frames as usize)
        .map(|i| (i * 7 % 251) as u8)
        .collect();

    let meta = FileMetaTableBuilder::new()
        .media_storage_sop_class_uid("1.2.840.10008.5.1.4.1.1.7")
        .media_storage_sop_instance_uid("2.25.4242")
        .transfer_syntax(ts.uid())
        .build()
        .unwrap();
    let pi = if samples_per_pixel == 3 {
        "RGB"
    } else {
        "MONOCHROME2"
    };
    let mut obj = InMemDicomObject::from_element_iter([
        InMemElement::primitive(tags::SOP_INSTANCE_UID, VR::UI, "2.25.4242"),
        InMemElement::primitive(tags::SAMPLES_PER_PIXEL, VR::US, samples_per_pixel),
        InMemElement::primitive(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, pi),
        InMemElement::primitive(tags::NUMBER_OF_FRAMES, VR::IS, frames.to_string()),
        InMemElement::primitive(tags::ROWS, VR::US, rows),
        InMemElement::primitive(tags::COLUMNS, VR::US, columns),
        InMemElement::primitive(tags::BITS_ALLOCATED, VR::US, bits_allocated),
        InMemElement::primitive(tags::BITS_STORED, VR::US, bits_allocated),
        InMemElement::primitive(tags::PIXEL_REPRESENTATION, VR::US, 0_u16),
    ]);
    if samples_per_pixel > 1 {
        obj.put(InMemElement::primitive(
            tags::PLANAR_CONFIGURATION,
            VR::US,
            0_u16,
        ));
    }
    FileDicomObject::new_in_memory(
        meta,
        obj,
        Some(PixelData::InMemoryNative {
            vr: VR::OB,
            data: data.clone(),
        }),
    )
    .write_to_file(path)
    .unwrap();
    data
}

/// Decode every frame of the file at `path`.
fn decode_all(path: &Path) -> Vec<u8> {
    let obj = open_file(path).unwrap();
    let reader = obj.transfer_syntax().unwrap().pixel_reader().unwrap();
    let mut frames = obj.frame_extractor().unwrap();
    let count = frames.descriptor().number_of_frames();
    let mut out = Vec::new();
    for frame in 0..count {
        let data = frames.frame_bytes(frame).unwrap();
        reader
            .decode_frame(frames.descriptor(), &data, &mut out)
            .unwrap();
    }
    out
}

#[cfg(feature = "rle")]
#[test]
fn rle_lossless_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.dcm");
    let target = dir.path().join("rle.dcm");
    let data = write_source(&source, &entries::EXPLICIT_VR_LITTLE_ENDIAN, 3, 16, 3, 3);

    let report = open_file(&source)
        .unwrap()
        .transcode_to_file(&entries::RLE_LOSSLESS, &target)
        .unwrap();
    assert!(report.transcoded);
    assert!(report.adjustments.is_empty());

    let obj = open_file(&target).unwrap();
    assert_eq!(obj.meta().transfer_syntax(), entries::RLE_LOSSLESS.uid());
    assert_eq!(
        obj.meta().implementation_class_uid,
        fragstream_object::IMPLEMENTATION_CLASS_UID
    );
    assert_eq!(obj.u16_value(tags::PLANAR_CONFIGURATION), Some(0));
    let mut frames = obj.frame_extractor().unwrap();
    assert_eq!(frames.fragment_count().unwrap(), 3);

    assert_eq!(decode_all(&target), data);
}

#[cfg(feature = "jpeg")]
#[test]
fn jpeg_baseline_marks_lossy_compression() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.dcm");
    let target = dir.path().join("jpeg.dcm");
    write_source(&source, &entries::EXPLICIT_VR_LITTLE_ENDIAN, 1, 8, 2, 2);

    let obj = open_file(&source).unwrap();
    let report = Transcoder::new(&obj, &entries::JPEG_BASELINE)
        .with_options(TranscodeOptions::new().quality(95))
        .write_file(&target)
        .unwrap();
    assert_eq!(report.transfer_syntax, entries::JPEG_BASELINE.uid());

    let obj = open_file(&target).unwrap();
    assert_eq!(obj.str_value(tags::LOSSY_IMAGE_COMPRESSION).unwrap(), "01");
    assert_eq!(
        obj.str_value(tags::LOSSY_IMAGE_COMPRESSION_METHOD).unwrap(),
        "ISO_10918_1"
    );
    assert_eq!(
        obj.str_value(tags::PHOTOMETRIC_INTERPRETATION).unwrap(),
        "MONOCHROME2"
    );
    assert_eq!(decode_all(&target).len(), 2 * 8 * 6);
}

#[test]
fn fallback_to_explicit_vr_little_endian() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.dcm");
    let target = dir.path().join("fallback.dcm");
    let data = write_source(&source, &entries::IMPLICIT_VR_LITTLE_ENDIAN, 1, 32, 2, 2);

    let obj = open_file(&source).unwrap();
    let report = obj
        .transcode_to_file_with_options(
            &entries::JPEG_BASELINE,
            &target,
            TranscodeOptions::new().fallbacks([&entries::EXPLICIT_VR_LITTLE_ENDIAN]),
        )
        .unwrap();
    assert!(report.is_adjusted());
    assert_eq!(report.adjustments.len(), 1);
    assert_eq!(report.adjustments[0].skipped, entries::JPEG_BASELINE.uid());
    assert_eq!(
        report.transfer_syntax,
        entries::EXPLICIT_VR_LITTLE_ENDIAN.uid()
    );

    let obj = open_file(&target).unwrap();
    assert_eq!(
        obj.meta().transfer_syntax(),
        entries::EXPLICIT_VR_LITTLE_ENDIAN.uid()
    );
    assert_eq!(decode_all(&target), data);
}

#[test]
fn pass_through_changes_data_set_encoding_only() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.dcm");
    let target = dir.path().join("implicit.dcm");
    let data = write_source(&source, &entries::EXPLICIT_VR_LITTLE_ENDIAN, 1, 16, 2, 2);

    let obj = open_file(&source).unwrap();
    let transcoder = Transcoder::new(&obj, &entries::IMPLICIT_VR_LITTLE_ENDIAN);
    assert!(!transcoder.is_needed().unwrap());
    let report = transcoder.write_file(&target).unwrap();
    assert!(!report.transcoded);

    let obj = open_file(&target).unwrap();
    assert_eq!(
        obj.meta().transfer_syntax(),
        entries::IMPLICIT_VR_LITTLE_ENDIAN.uid()
    );
    assert_eq!(obj.str_value(tags::SOP_INSTANCE_UID).unwrap(), "2.25.4242");
    assert_eq!(decode_all(&target), data);
}

#[cfg(feature = "rle")]
#[test]
fn encapsulated_pass_through_copies_fragments() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.dcm");
    let rle = dir.path().join("rle.dcm");
    let copy = dir.path().join("copy.dcm");
    write_source(&source, &entries::EXPLICIT_VR_LITTLE_ENDIAN, 1, 8, 2, 2);
    open_file(&source)
        .unwrap()
        .transcode_to_file(&entries::RLE_LOSSLESS, &rle)
        .unwrap();

    let report = open_file(&rle)
        .unwrap()
        .transcode_to_file(&entries::RLE_LOSSLESS, &copy)
        .unwrap();
    assert!(!report.transcoded);
    assert_eq!(std::fs::read(&rle).unwrap(), std::fs::read(&copy).unwrap());
}

#[test]
fn failed_write_leaves_nothing_behind() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.dcm");
    let target = dir.path().join("broken.dcm");
    // three frames declared, only two present
    write_source(&source, &entries::EXPLICIT_VR_LITTLE_ENDIAN, 1, 8, 3, 2);

    let obj = open_file(&source).unwrap();
    let result = Transcoder::new(&obj, &entries::RLE_LOSSLESS).write_file(&target);
    assert!(result.is_err());
    assert!(!target.exists());
    let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}
