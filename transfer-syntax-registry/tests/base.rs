//! Registry tests, to ensure that transfer syntaxes are properly
//! registered when linked together in a separate program.

use fragstream_encoding::FragmentLayout;
use fragstream_transfer_syntax_registry::{entries, TransferSyntaxRegistry};
use rstest::rstest;

fn assert_dataset_supported(mut uid: &'static str) {
    let ts = TransferSyntaxRegistry.get(uid);
    assert!(ts.is_some(), "{} should be registered", uid);
    let ts = ts.unwrap();
    if uid.ends_with('\0') {
        uid = &uid[0..uid.len() - 1];
    }
    assert_eq!(ts.uid(), uid);
    assert!(ts.is_dataset_supported());
}

#[test]
fn contains_base_ts() {
    // contains implicit VR little endian and is fully supported
    assert_dataset_supported("1.2.840.10008.1.2");

    // should work the same for trailing null characters
    assert_dataset_supported("1.2.840.10008.1.2\0");

    // contains explicit VR little endian and is fully supported
    assert_dataset_supported("1.2.840.10008.1.2.1");
}

#[test]
fn unsupported_data_sets_are_known() {
    let big_endian = TransferSyntaxRegistry.get("1.2.840.10008.1.2.2").unwrap();
    assert!(!big_endian.is_dataset_supported());
    let deflated = TransferSyntaxRegistry.get("1.2.840.10008.1.2.1.99").unwrap();
    assert!(!deflated.is_dataset_supported());
    assert!(deflated.fragment_layout().is_none());
}

#[test]
fn unknown_uid() {
    assert!(TransferSyntaxRegistry.get("1.2.3.4").is_none());
}

#[rstest]
#[case("1.2.840.10008.1.2.1.98", true)]
#[case("1.2.840.10008.1.2.5", true)]
#[case("1.2.840.10008.1.2.4.50", true)]
#[case("1.2.840.10008.1.2.4.51", false)]
#[case("1.2.840.10008.1.2.4.70", false)]
#[case("1.2.840.10008.1.2.4.80", false)]
#[case("1.2.840.10008.1.2.4.91", false)]
fn encapsulated_adapters(#[case] uid: &str, #[case] can_write: bool) {
    let ts = TransferSyntaxRegistry.get(uid).unwrap();
    assert!(ts.is_encapsulated());
    assert!(ts.is_dataset_supported());
    assert_eq!(ts.pixel_writer().is_some(), can_write);
}

#[test]
fn fragment_layouts() {
    assert!(matches!(
        entries::EXPLICIT_VR_LITTLE_ENDIAN.fragment_layout(),
        Some(FragmentLayout::Native)
    ));
    assert!(matches!(
        entries::RLE_LOSSLESS.fragment_layout(),
        Some(FragmentLayout::OneFragmentPerFrame)
    ));
    assert!(matches!(
        entries::JPEG_BASELINE.fragment_layout(),
        Some(FragmentLayout::MaySplitFrames(_))
    ));
    assert!(matches!(
        entries::JPEG_2000_IMAGE_COMPRESSION.fragment_layout(),
        Some(FragmentLayout::MaySplitFrames(_))
    ));
}

#[test]
fn native_pixel_data_has_adapters() {
    let ts = TransferSyntaxRegistry.get("1.2.840.10008.1.2").unwrap();
    assert!(ts.is_native());
    assert!(ts.pixel_reader().is_some());
    assert!(ts.pixel_writer().is_some());
}

#[test]
fn registry_lists_all_entries() {
    assert_eq!(TransferSyntaxRegistry.iter().count(), 14);
}
