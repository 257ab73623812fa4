//! End-to-end round-trip tests.
//!
//! Write a package, read it back, and require byte-identical content and
//! metadata across every manifest crypto scheme, payload layout and cipher
//! suite combination the format supports.

use obscur_core::{
    CryptoSuite, ItemSpec, ManifestWriteKey, PackageWriter, SimpleKeyProvider, WriteOptions,
    read_package,
};
use obscur_crypto::EcKeypair;
use obscur_proto::{FrameshiftConfig, PayloadItemKind, PayloadLayoutScheme};
use obscur_core::PayloadLayout;
use rand_chacha::ChaCha20Rng;
use rand_core::{RngCore, SeedableRng};

fn rng(seed: u8) -> ChaCha20Rng {
    ChaCha20Rng::from_seed([seed; 32])
}

fn write_package(
    options: WriteOptions,
    items: Vec<ItemSpec>,
    seed: u8,
) -> Vec<u8> {
    let mut writer = PackageWriter::new(options).unwrap();
    for item in items {
        writer.add_item(item).unwrap();
    }
    let mut wire = Vec::new();
    writer.write_with_rng(&mut wire, &mut rng(seed)).unwrap();
    wire
}

#[test]
fn s1_symmetric_frameshift_single_message() {
    let key = {
        let mut key = vec![0u8; 32];
        rng(0xA1).fill_bytes(&mut key);
        key
    };

    let mut options = WriteOptions::new(ManifestWriteKey::key(key.clone()));
    options.layout = PayloadLayout::frameshift(FrameshiftConfig {
        min_chunk: 64,
        max_chunk: 512,
        min_shift: 4,
        max_shift: 16,
    });

    let wire = write_package(
        options,
        vec![ItemSpec::from_bytes(PayloadItemKind::Message, "hello.txt", b"hello world\n".to_vec())],
        1,
    );

    assert_eq!(
        &wire[..10],
        hex::decode("4f43706b672d4f484149").unwrap().as_slice(),
        "package must begin with OCpkg-OHAI"
    );
    assert_eq!(
        &wire[wire.len() - 10..],
        hex::decode("4b4241492d4f43706b67").unwrap().as_slice(),
        "package must end with KBAI-OCpkg"
    );

    let mut provider = SimpleKeyProvider::new();
    provider.add_symmetric_key(key);
    let contents = read_package(wire.as_slice(), &provider).unwrap();

    assert_eq!(contents.items.len(), 1);
    assert_eq!(contents.items[0].path, "hello.txt");
    assert_eq!(contents.items[0].kind, PayloadItemKind::Message);
    assert_eq!(contents.items[0].content, b"hello world\n");
    assert_eq!(contents.manifest_key_index, Some(0));
    assert!(contents.trailer_valid);
}

#[test]
fn s2_passphrase_simple_two_files() {
    let passphrase = "correct horse battery staple";

    let mut options = WriteOptions::new(ManifestWriteKey::passphrase(passphrase));
    options.layout = PayloadLayout::simple();

    let wire = write_package(
        options,
        vec![
            ItemSpec::from_bytes(PayloadItemKind::File, "one.bin", vec![0u8; 1]),
            ItemSpec::from_bytes(PayloadItemKind::File, "zeros.bin", vec![0u8; 65536]),
        ],
        2,
    );

    let mut provider = SimpleKeyProvider::new();
    provider.add_passphrase(passphrase);
    let contents = read_package(wire.as_slice(), &provider).unwrap();

    assert_eq!(contents.items.len(), 2);
    assert_eq!(contents.items[0].path, "one.bin");
    assert_eq!(contents.items[0].content, vec![0u8; 1]);
    assert_eq!(contents.items[1].path, "zeros.bin");
    assert_eq!(contents.items[1].content, vec![0u8; 65536]);
}

#[test]
fn s3_um1_hybrid_one_mebibyte() {
    let mut seed_rng = rng(0xB2);
    let sender = EcKeypair::generate(&mut seed_rng);
    let recipient = EcKeypair::generate(&mut seed_rng);

    let mut content = vec![0u8; 1024 * 1024];
    seed_rng.fill_bytes(&mut content);

    let options = WriteOptions::new(ManifestWriteKey::Um1 {
        sender: sender.clone(),
        recipient_public: recipient.public,
    });
    let wire = write_package(
        options,
        vec![ItemSpec::from_bytes(PayloadItemKind::File, "random.bin", content.clone())],
        3,
    );

    // Reader side: sender's public key, recipient's keypair.
    let mut provider = SimpleKeyProvider::new();
    provider.add_foreign_public_key(sender.public).add_ec_keypair(recipient);

    let contents = read_package(wire.as_slice(), &provider).unwrap();
    assert_eq!(contents.items[0].content, content);
}

#[test]
fn s6_candidate_pool_reports_the_matching_index() {
    let mut key_rng = rng(0xC3);
    let mut pool: Vec<Vec<u8>> = Vec::new();
    for _ in 0..16 {
        let mut key = vec![0u8; 32];
        key_rng.fill_bytes(&mut key);
        pool.push(key);
    }

    let wire = write_package(
        WriteOptions::new(ManifestWriteKey::key(pool[7].clone())),
        vec![ItemSpec::from_bytes(PayloadItemKind::Message, "m", b"needle".to_vec())],
        4,
    );

    let mut provider = SimpleKeyProvider::new();
    for key in &pool {
        provider.add_symmetric_key(key.clone());
    }

    let contents = read_package(wire.as_slice(), &provider).unwrap();
    assert_eq!(contents.manifest_key_index, Some(7));
    assert_eq!(contents.items[0].content, b"needle");
}

#[test]
fn every_layout_round_trips_multiple_items() {
    let key = vec![0x11u8; 32];
    let contents: Vec<(PayloadItemKind, &str, Vec<u8>)> = vec![
        (PayloadItemKind::Message, "note.txt", b"short note".to_vec()),
        (PayloadItemKind::File, "big.bin", (0..40_000u32).map(|i| (i % 251) as u8).collect()),
        (PayloadItemKind::KeyAction, "rotate", vec![0xAA; 777]),
    ];

    for (seed, scheme) in [
        (10u8, PayloadLayoutScheme::Simple),
        (11, PayloadLayoutScheme::Frameshift),
        (12, PayloadLayoutScheme::Fabric),
    ] {
        let mut options = WriteOptions::new(ManifestWriteKey::key(key.clone()));
        options.layout = match scheme {
            PayloadLayoutScheme::Simple => PayloadLayout::simple(),
            PayloadLayoutScheme::Frameshift => PayloadLayout::default(),
            PayloadLayoutScheme::Fabric => PayloadLayout::fabric(FrameshiftConfig {
                min_chunk: 100,
                max_chunk: 900,
                min_shift: 1,
                max_shift: 32,
            }),
        };

        let items = contents
            .iter()
            .map(|(kind, path, data)| ItemSpec::from_bytes(*kind, *path, data.clone()))
            .collect();
        let wire = write_package(options, items, seed);

        let mut provider = SimpleKeyProvider::new();
        provider.add_symmetric_key(key.clone());
        let read = read_package(wire.as_slice(), &provider).unwrap();

        assert_eq!(read.items.len(), contents.len(), "{scheme:?}");
        for (extracted, (kind, path, data)) in read.items.iter().zip(&contents) {
            assert_eq!(extracted.kind, *kind, "{scheme:?}");
            assert_eq!(&extracted.path, path, "{scheme:?}");
            assert_eq!(&extracted.content, data, "{scheme:?}");
        }
    }
}

#[test]
fn empty_and_single_byte_items_round_trip() {
    let key = vec![0x22u8; 32];
    let wire = write_package(
        WriteOptions::new(ManifestWriteKey::key(key.clone())),
        vec![
            ItemSpec::from_bytes(PayloadItemKind::File, "empty.bin", Vec::new()),
            ItemSpec::from_bytes(PayloadItemKind::File, "one.bin", vec![0x5A]),
        ],
        20,
    );

    let mut provider = SimpleKeyProvider::new();
    provider.add_symmetric_key(key);
    let contents = read_package(wire.as_slice(), &provider).unwrap();

    assert_eq!(contents.items[0].content, Vec::<u8>::new());
    assert_eq!(contents.items[1].content, vec![0x5A]);
}

#[test]
fn derived_item_keys_round_trip() {
    let manifest_key = vec![0x33u8; 32];
    let item_key_a = vec![0x44u8; 32];
    let item_key_b = vec![0x55u8; 32];

    let wire = write_package(
        WriteOptions::new(ManifestWriteKey::key(manifest_key.clone())),
        vec![
            ItemSpec::from_bytes(PayloadItemKind::File, "a.bin", vec![1u8; 300])
                .with_derived_key(item_key_a.clone()),
            ItemSpec::from_bytes(PayloadItemKind::File, "b.bin", vec![2u8; 300])
                .with_derived_key(item_key_b.clone()),
            ItemSpec::from_bytes(PayloadItemKind::File, "carried.bin", vec![3u8; 300]),
        ],
        21,
    );

    let mut provider = SimpleKeyProvider::new();
    provider
        .add_symmetric_key(manifest_key)
        .add_symmetric_key(item_key_b)
        .add_symmetric_key(item_key_a);

    let contents = read_package(wire.as_slice(), &provider).unwrap();
    assert_eq!(contents.items[0].content, vec![1u8; 300]);
    assert_eq!(contents.items[1].content, vec![2u8; 300]);
    assert_eq!(contents.items[2].content, vec![3u8; 300]);
}

#[test]
fn compression_off_and_payload_offset_round_trip() {
    let key = vec![0x66u8; 32];
    let mut options = WriteOptions::new(ManifestWriteKey::key(key.clone()));
    options.use_compression = false;
    options.payload_offset = 1024;

    let wire = write_package(
        options,
        vec![ItemSpec::from_bytes(PayloadItemKind::Message, "m", b"offset me".to_vec())],
        22,
    );

    let mut provider = SimpleKeyProvider::new();
    provider.add_symmetric_key(key);
    let contents = read_package(wire.as_slice(), &provider).unwrap();
    assert_eq!(contents.items[0].content, b"offset me");
}

#[test]
fn aes_ctr_suite_round_trips_end_to_end() {
    let key = vec![0x77u8; 32];
    let mut options = WriteOptions::new(ManifestWriteKey::key(key.clone()));
    options.suite = CryptoSuite::aes256_ctr();

    let wire = write_package(
        options,
        vec![
            ItemSpec::from_bytes(PayloadItemKind::File, "ctr.bin", vec![0x10u8; 2000])
                .with_suite(CryptoSuite::aes256_ctr()),
        ],
        23,
    );

    let mut provider = SimpleKeyProvider::new();
    provider.add_symmetric_key(key);
    let contents = read_package(wire.as_slice(), &provider).unwrap();
    assert_eq!(contents.items[0].content, vec![0x10u8; 2000]);
}

#[test]
fn cbc_manifest_with_stream_items_round_trips() {
    let key = vec![0x88u8; 32];
    let mut options = WriteOptions::new(ManifestWriteKey::key(key.clone()));
    options.suite = CryptoSuite::aes256_cbc();

    let wire = write_package(
        options,
        vec![ItemSpec::from_bytes(PayloadItemKind::Message, "m", b"cbc manifest".to_vec())],
        24,
    );

    let mut provider = SimpleKeyProvider::new();
    provider.add_symmetric_key(key);
    let contents = read_package(wire.as_slice(), &provider).unwrap();
    assert_eq!(contents.items[0].content, b"cbc manifest");
}

#[test]
fn lazily_opened_sources_round_trip() {
    let key = vec![0x99u8; 32];
    let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 241) as u8).collect();
    let source = payload.clone();

    let mut writer =
        PackageWriter::new(WriteOptions::new(ManifestWriteKey::key(key.clone()))).unwrap();
    writer
        .add_item(ItemSpec::from_reader(
            PayloadItemKind::File,
            "lazy.bin",
            payload.len() as u64,
            move || Ok(Box::new(std::io::Cursor::new(source))),
        ))
        .unwrap();

    let mut wire = Vec::new();
    writer.write_with_rng(&mut wire, &mut rng(25)).unwrap();

    let mut provider = SimpleKeyProvider::new();
    provider.add_symmetric_key(key);
    let contents = read_package(wire.as_slice(), &provider).unwrap();
    assert_eq!(contents.items[0].content, payload);
}

#[test]
fn metadata_survives_the_round_trip() {
    let key = vec![0xAAu8; 32];
    let wire = write_package(
        WriteOptions::new(ManifestWriteKey::key(key.clone())),
        vec![ItemSpec::from_bytes(PayloadItemKind::KeyAction, "deep/path/item", vec![7u8; 123])],
        26,
    );

    let mut provider = SimpleKeyProvider::new();
    provider.add_symmetric_key(key);

    let report = obscur_core::read_package_with(wire.as_slice(), &provider, |_, _| Ok(())).unwrap();
    assert_eq!(report.items.len(), 1);
    assert_eq!(report.items[0].path, "deep/path/item");
    assert_eq!(report.items[0].kind, PayloadItemKind::KeyAction);
    assert_eq!(report.items[0].length, 123);
    assert!(report.trailer_valid);
}
