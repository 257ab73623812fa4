//! Tamper and failure-path tests.
//!
//! Flipping any bit of the header, length prefix, ciphertext manifest or an
//! item's ciphertext must surface as an authentication or structure error —
//! never silent success. Trailer damage alone is the one soft failure.

use obscur_core::{
    ItemSpec, ManifestWriteKey, PackageError, PackageWriter, SimpleKeyProvider, WriteOptions,
    read_package,
};
use obscur_core::PayloadLayout;
use obscur_proto::PayloadItemKind;
use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;

const KEY: [u8; 32] = [0x42; 32];

/// A Simple-layout package whose 64 KiB item dwarfs the header, terminal
/// pad and trailer, so offsets taken from the end land inside item
/// ciphertext.
fn sample_package() -> Vec<u8> {
    let mut options = WriteOptions::new(ManifestWriteKey::key(KEY.to_vec()));
    options.layout = PayloadLayout::simple();

    let mut writer = PackageWriter::new(options).unwrap();
    writer
        .add_item(ItemSpec::from_bytes(PayloadItemKind::File, "bulk.bin", vec![0x5Au8; 65536]))
        .unwrap();

    let mut wire = Vec::new();
    writer.write_with_rng(&mut wire, &mut ChaCha20Rng::from_seed([9u8; 32])).unwrap();
    wire
}

fn provider() -> SimpleKeyProvider {
    let mut provider = SimpleKeyProvider::new();
    provider.add_symmetric_key(KEY.to_vec());
    provider
}

/// Bytes consumed by the plaintext header (tag + varint + DTO).
fn header_len(wire: &[u8]) -> usize {
    let mut input = wire;
    obscur_proto::read_header(&mut input).unwrap();
    wire.len() - input.len()
}

#[test]
fn s4_manifest_ciphertext_bit_flip_fails_authentication() {
    let mut wire = sample_package();
    // First ciphertext byte sits right after the header and the 4-byte
    // obfuscated length prefix.
    let target = header_len(&wire) + 4;
    wire[target] ^= 0x01;

    let err = read_package(wire.as_slice(), &provider()).unwrap_err();
    assert!(matches!(err, PackageError::ManifestNotAuthenticated), "got {err}");
}

#[test]
fn s5_wrong_key_is_key_not_found() {
    let wire = sample_package();

    let mut wrong = SimpleKeyProvider::new();
    wrong.add_symmetric_key(vec![0x43u8; 32]);

    let err = read_package(wire.as_slice(), &wrong).unwrap_err();
    assert!(matches!(err, PackageError::KeyNotFound), "got {err}");
}

#[test]
fn header_tag_bit_flip_is_malformed() {
    let mut wire = sample_package();
    wire[0] ^= 0x01;

    let err = read_package(wire.as_slice(), &provider()).unwrap_err();
    assert!(matches!(err, PackageError::Malformed { .. }), "got {err}");
}

#[test]
fn header_dto_bit_flip_never_succeeds() {
    let wire = sample_package();
    let header_len = header_len(&wire);

    // Every byte of the plaintext header is load-bearing: tag, varint
    // length, or DTO content feeding key confirmation and the MAC's
    // associated data.
    for target in [0, 9, 10, 11, header_len / 2, header_len - 1] {
        let mut tampered = wire.clone();
        tampered[target] ^= 0x01;
        assert!(
            read_package(tampered.as_slice(), &provider()).is_err(),
            "flip at byte {target} must not read back cleanly"
        );
    }
}

#[test]
fn length_prefix_bit_flip_never_succeeds() {
    let wire = sample_package();
    let prefix_start = header_len(&wire);

    for bit in 0..8 {
        let mut tampered = wire.clone();
        tampered[prefix_start] ^= 1 << bit;

        let err = read_package(tampered.as_slice(), &provider()).unwrap_err();
        assert!(
            matches!(
                err,
                PackageError::ManifestNotAuthenticated
                    | PackageError::Malformed { .. }
                    | PackageError::Truncated { .. }
            ),
            "prefix bit {bit}: got {err}"
        );
    }
}

#[test]
fn payload_bit_flip_fails_the_owning_item() {
    let mut wire = sample_package();
    // Well inside the 64 KiB item ciphertext: past the terminal pad
    // (<= 255 bytes) and trailer (10 bytes) from the end.
    let target = wire.len() - 300;
    wire[target] ^= 0x01;

    let err = read_package(wire.as_slice(), &provider()).unwrap_err();
    let PackageError::ItemNotAuthenticated { path, .. } = err else {
        unreachable!("expected item authentication failure, got {err}");
    };
    assert_eq!(path, "bulk.bin");
}

#[test]
fn truncated_manifest_is_reported_as_truncation() {
    let wire = sample_package();
    let keep = header_len(&wire) + 10;
    let err = read_package(&wire[..keep], &provider()).unwrap_err();
    assert!(matches!(err, PackageError::Truncated { .. }), "got {err}");
}

#[test]
fn truncated_payload_is_reported_as_truncation() {
    let wire = sample_package();
    // Drop the trailer plus a slab of payload.
    let keep = wire.len() - 2000;
    let err = read_package(&wire[..keep], &provider()).unwrap_err();
    assert!(
        matches!(
            err,
            PackageError::Truncated { context: "payload region" }
                | PackageError::Truncated { context: "payload padding" }
        ),
        "got {err}"
    );
}

#[test]
fn empty_input_is_truncated_at_the_header_tag() {
    let err = read_package(&[][..], &provider()).unwrap_err();
    assert!(matches!(err, PackageError::Truncated { context: "header tag" }));
}

#[test]
fn corrupt_trailer_is_a_soft_failure() {
    let mut wire = sample_package();
    let last = wire.len() - 1;
    wire[last] ^= 0xFF;

    let contents = read_package(wire.as_slice(), &provider()).unwrap();
    assert!(!contents.trailer_valid, "corrupt trailer must be flagged");
    assert_eq!(contents.items[0].content, vec![0x5Au8; 65536], "payload still verified");
}

#[test]
fn missing_trailer_is_a_soft_failure() {
    let wire = sample_package();
    let contents = read_package(&wire[..wire.len() - 10], &provider()).unwrap();
    assert!(!contents.trailer_valid);
    assert_eq!(contents.items[0].content, vec![0x5Au8; 65536]);
}

#[test]
fn missing_item_keys_aggregate_before_surfacing() {
    let manifest_key = vec![0x10u8; 32];
    let mut writer =
        PackageWriter::new(WriteOptions::new(ManifestWriteKey::key(manifest_key.clone()))).unwrap();
    writer
        .add_item(
            ItemSpec::from_bytes(PayloadItemKind::File, "first.bin", vec![1u8; 64])
                .with_derived_key(vec![0x21u8; 32]),
        )
        .unwrap();
    writer
        .add_item(
            ItemSpec::from_bytes(PayloadItemKind::File, "second.bin", vec![2u8; 64])
                .with_derived_key(vec![0x22u8; 32]),
        )
        .unwrap();

    let mut wire = Vec::new();
    writer.write_with_rng(&mut wire, &mut ChaCha20Rng::from_seed([8u8; 32])).unwrap();

    // Manifest key present, both item keys absent.
    let mut partial = SimpleKeyProvider::new();
    partial.add_symmetric_key(manifest_key);

    let err = read_package(wire.as_slice(), &partial).unwrap_err();
    let PackageError::ItemKeysNotFound { items } = err else {
        unreachable!("expected aggregated item key misses, got {err}");
    };
    assert_eq!(items.len(), 2);
    let paths: Vec<&str> = items.iter().map(|(_, path)| path.as_str()).collect();
    assert!(paths.contains(&"first.bin"));
    assert!(paths.contains(&"second.bin"));
}
