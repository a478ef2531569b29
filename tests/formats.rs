//! End-to-end add/extract through the service for every built-in format.

#![cfg(all(feature = "ooxml", feature = "odf", feature = "images"))]

mod common;

use std::path::Path;

use chrono::Utc;
use docmark::envelope::wire::{
    JSON_TAG, OFFICE_DELIMITERS, PDF_DELIMITERS, PNG_DELIMITERS, RTF_GROUP_OPEN,
};
use docmark::jpeg::segment::{COM, SegmentWalker};
use docmark::{
    ExtractedWatermark, Integrity, WatermarkError, WatermarkOptions, WatermarkService,
};
use memchr::memmem;

fn service() -> WatermarkService {
    WatermarkService::new(WatermarkOptions::default()).unwrap()
}

fn fixtures() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        ("docx", common::docx()),
        ("xlsx", common::xlsx()),
        ("pptx", common::pptx()),
        ("odt", common::odt()),
        ("jpg", common::jpeg()),
        ("jpeg", common::jpeg()),
        ("png", common::png()),
        ("pdf", common::PDF.to_vec()),
        ("rtf", common::RTF.to_vec()),
    ]
}

#[test]
fn test_roundtrip_every_format() {
    let dir = tempfile::tempdir().unwrap();
    let service = service();
    for (ext, bytes) in fixtures() {
        let input = common::put(dir.path(), &format!("in.{ext}"), &bytes);
        let output = dir.path().join(format!("out.{ext}"));

        service.add_file(&input, &output, "机密 CONFIDENTIAL").unwrap();
        assert_eq!(std::fs::read(&input).unwrap(), bytes, "{ext} input modified");

        let found = service.extract_file(&output).unwrap();
        assert_eq!(found.text, "机密 CONFIDENTIAL", "{ext}");
        assert_eq!(found.integrity, Integrity::Verified, "{ext}");
    }
}

#[test]
fn test_spreadsheet_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let original = common::xlsx();
    let input = common::put(dir.path(), "book.xlsx", &original);
    let output = dir.path().join("book-marked.xlsx");

    let before = Utc::now();
    service().add_file(&input, &output, "CONFIDENTIAL-42").unwrap();

    let marked = std::fs::read(&output).unwrap();
    let names = common::member_names(&marked);
    for name in common::member_names(&original) {
        assert!(names.contains(&name), "{name} dropped");
    }
    let custom = common::read_member(&marked, "docProps/custom.xml").unwrap();
    assert!(custom.contains(OFFICE_DELIMITERS.begin));
    assert!(custom.contains(OFFICE_DELIMITERS.end));

    let found = service().extract_file(&output).unwrap();
    assert_eq!(found.text, "CONFIDENTIAL-42");
    let drift = (found.timestamp - before).num_seconds().abs();
    assert!(drift <= 2, "timestamp {} s from call", drift);
}

#[test]
fn test_jpeg_single_comment_segment() {
    let dir = tempfile::tempdir().unwrap();
    let input = common::put(dir.path(), "photo.jpg", &common::jpeg());
    let output = dir.path().join("photo-marked.jpg");
    service().add_file(&input, &output, "CONFIDENTIAL").unwrap();
    // Adding again replaces the comment
    service().add_file(&output, &output, "CONFIDENTIAL").unwrap();

    let marked = std::fs::read(&output).unwrap();
    assert_eq!(&marked[..2], &[0xFF, 0xD8]);

    let comments: Vec<_> = SegmentWalker::new(&marked)
        .filter(|s| s.marker == COM)
        .collect();
    assert_eq!(comments.len(), 1);
    let segment = &comments[0];
    let declared = u16::from_be_bytes([marked[segment.offset + 2], marked[segment.offset + 3]]);
    assert_eq!(declared as usize, segment.payload.len() + 2);
    assert!(marked[segment.payload.clone()].starts_with(JSON_TAG));

    let decoded = image::load_from_memory(&marked).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (24, 16));
}

#[test]
fn test_png_still_decodes() {
    let dir = tempfile::tempdir().unwrap();
    let input = common::put(dir.path(), "a.png", &common::png());
    let output = dir.path().join("b.png");
    service().add_file(&input, &output, "x").unwrap();
    let decoded = image::load_from_memory(&std::fs::read(&output).unwrap()).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (24, 16));
}

#[test]
fn test_not_found_on_clean_files() {
    let dir = tempfile::tempdir().unwrap();
    let service = service();
    for (ext, bytes) in fixtures() {
        let input = common::put(dir.path(), &format!("clean.{ext}"), &bytes);
        match service.extract_file(&input) {
            Err(WatermarkError::WatermarkNotFound { searched, .. }) => {
                assert!(!searched.is_empty(), "{ext}")
            },
            other => panic!("{ext}: expected WatermarkNotFound, got {other:?}"),
        }
    }
}

#[test]
fn test_readd_keeps_files_valid() {
    let dir = tempfile::tempdir().unwrap();
    let service = service();
    for (ext, bytes) in fixtures() {
        let path = common::put(dir.path(), &format!("twice.{ext}"), &bytes);
        service.add_file(&path, &path, "first").unwrap();
        service.add_file(&path, &path, "second").unwrap();

        let marked = std::fs::read(&path).unwrap();
        match ext {
            "pdf" => assert!(marked.starts_with(b"%PDF-")),
            "rtf" => assert!(marked.starts_with(b"{\\rtf")),
            "docx" | "xlsx" | "pptx" | "odt" => {
                let names = common::member_names(&marked);
                let mut unique = names.clone();
                unique.sort();
                unique.dedup();
                assert_eq!(names.len(), unique.len(), "{ext} has duplicate members");
            },
            _ => {},
        }
        assert_eq!(service.extract_file(&path).unwrap().text, "second", "{ext}");
    }
}

#[test]
fn test_odt_mimetype_stays_first() {
    let dir = tempfile::tempdir().unwrap();
    let input = common::put(dir.path(), "doc.odt", &common::odt());
    let output = dir.path().join("doc-marked.odt");
    service().add_file(&input, &output, "x").unwrap();

    let marked = std::fs::read(&output).unwrap();
    assert_eq!(common::member_names(&marked)[0], "mimetype");
    let manifest = common::read_member(&marked, "META-INF/manifest.xml").unwrap();
    assert!(manifest.contains("watermark-data.xml"));
}

#[test]
fn test_tampered_office_envelope_is_flagged() {
    let dir = tempfile::tempdir().unwrap();
    let input = common::put(dir.path(), "doc.docx", &common::docx());
    let marked = dir.path().join("marked.docx");
    let options = WatermarkOptions::default().with_redundant_writes(false);
    let service = WatermarkService::new(options).unwrap();
    service.add_file(&input, &marked, "original").unwrap();

    // Swap the checksum for the digest of other text
    let bytes = std::fs::read(&marked).unwrap();
    let core = common::read_member(&bytes, "docProps/core.xml").unwrap();
    let begin = core.find(OFFICE_DELIMITERS.begin).unwrap() + OFFICE_DELIMITERS.begin.len();
    let end = core.find(OFFICE_DELIMITERS.end).unwrap();
    let fields: Vec<&str> = core[begin..end].split('|').collect();
    let forged = format!("{}|{}|{}", fields[0], fields[1], "0".repeat(32));
    let tampered_core = format!("{}{}{}", &core[..begin], forged, &core[end..]);
    let tampered = common::put(
        dir.path(),
        "tampered.docx",
        &common::with_member(&bytes, "docProps/core.xml", tampered_core.as_bytes()),
    );

    // The forged checksum also changes the derived key, so decryption
    // either fails outright or yields text that cannot verify
    match service.extract_file(&tampered) {
        Ok(found) => assert!(matches!(found.integrity, Integrity::Mismatch { .. })),
        Err(e) => assert!(e.is_integrity_failure(), "unexpected error: {e}"),
    }
}

#[test]
fn test_wrong_secret_rejected_for_sealed_formats() {
    let dir = tempfile::tempdir().unwrap();
    let input = common::put(dir.path(), "doc.rtf", common::RTF);
    let output = dir.path().join("marked.rtf");
    service().add_file(&input, &output, "secret text").unwrap();

    let other = WatermarkService::new(WatermarkOptions::default().with_shared_secret("another"))
        .unwrap();
    let err = other.extract_file(&output).unwrap_err();
    assert!(err.is_integrity_failure());
}

#[test]
fn test_signature_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let fake = common::put(dir.path(), "fake.pdf", common::RTF);
    assert!(matches!(
        service().add_file(&fake, &dir.path().join("o.pdf"), "x"),
        Err(WatermarkError::InvalidFormatSignature { .. })
    ));
    assert!(!dir.path().join("o.pdf").exists());
}

#[test]
fn test_missing_input() {
    let err = service()
        .extract_file(Path::new("/nonexistent/dir/file.docx"))
        .unwrap_err();
    assert!(matches!(err, WatermarkError::InputNotFound(_)));
}

/// A flipped envelope byte may leave the original text, flag the result or
/// fail, but never yields other text that verifies.
fn assert_flip_outcome(
    result: Result<ExtractedWatermark, WatermarkError>,
    original: &str,
    at: usize,
) {
    match result {
        Ok(found) => assert!(
            found.text == original || !found.is_reliable(),
            "byte {at}: verified {:?} instead of {:?}",
            found.text,
            original
        ),
        Err(WatermarkError::WatermarkNotFound { .. }) => {},
        Err(e) => assert!(e.is_integrity_failure(), "byte {at}: unexpected error {e}"),
    }
}

/// Byte range of the first `begin` .. `end` pair in `data`.
fn region(data: &[u8], begin: &[u8], end: &[u8]) -> std::ops::Range<usize> {
    let start = memmem::find(data, begin).unwrap();
    let stop = start + memmem::find(&data[start..], end).unwrap() + end.len();
    start..stop
}

/// Flip every byte of `range` in the marked flat file and extract each copy.
fn flip_flat(
    ext: &str,
    original: &[u8],
    text: &str,
    locate: impl Fn(&[u8]) -> std::ops::Range<usize>,
) {
    let dir = tempfile::tempdir().unwrap();
    let service = service();
    let input = common::put(dir.path(), &format!("in.{ext}"), original);
    let marked_path = dir.path().join(format!("marked.{ext}"));
    service.add_file(&input, &marked_path, text).unwrap();
    let marked = std::fs::read(&marked_path).unwrap();

    let flipped_path = dir.path().join(format!("flipped.{ext}"));
    for at in locate(&marked) {
        let mut flipped = marked.clone();
        flipped[at] ^= 0x01;
        std::fs::write(&flipped_path, &flipped).unwrap();
        assert_flip_outcome(service.extract_file(&flipped_path), text, at);
    }
}

/// Flip every byte of the envelope held in one package member.
fn flip_member(ext: &str, original: &[u8], member: &str, text: &str) {
    let dir = tempfile::tempdir().unwrap();
    let service = WatermarkService::new(WatermarkOptions::default().with_redundant_writes(false))
        .unwrap();
    let input = common::put(dir.path(), &format!("in.{ext}"), original);
    let marked_path = dir.path().join(format!("marked.{ext}"));
    service.add_file(&input, &marked_path, text).unwrap();
    let marked = std::fs::read(&marked_path).unwrap();
    let part = common::read_member(&marked, member).unwrap().into_bytes();

    let flipped_path = dir.path().join(format!("flipped.{ext}"));
    for at in region(&part, OFFICE_DELIMITERS.begin.as_bytes(), OFFICE_DELIMITERS.end.as_bytes()) {
        let mut flipped = part.clone();
        flipped[at] ^= 0x01;
        std::fs::write(&flipped_path, common::with_member(&marked, member, &flipped)).unwrap();
        assert_flip_outcome(service.extract_file(&flipped_path), text, at);
    }
}

#[test]
fn test_flipped_bytes_pdf() {
    flip_flat("pdf", common::PDF, "CONFIDENTIAL", |data| {
        region(data, PDF_DELIMITERS.begin.as_bytes(), PDF_DELIMITERS.end.as_bytes())
    });
}

#[test]
fn test_flipped_bytes_pdf_after_readd() {
    let once = docmark::pdf::PdfWatermarker::new(&WatermarkOptions::default())
        .embed(common::PDF, "older")
        .unwrap();
    flip_flat("pdf", &once, "newer", |data| {
        // Only the newest marker; the older one must not take its place
        let start = memmem::rfind(data, PDF_DELIMITERS.begin.as_bytes()).unwrap();
        let newest = region(
            &data[start..],
            PDF_DELIMITERS.begin.as_bytes(),
            PDF_DELIMITERS.end.as_bytes(),
        );
        start + newest.start..start + newest.end
    });
}

#[test]
fn test_flipped_bytes_png() {
    flip_flat("png", &common::png(), "CONFIDENTIAL", |data| {
        region(data, PNG_DELIMITERS.begin.as_bytes(), PNG_DELIMITERS.end.as_bytes())
    });
}

#[test]
fn test_flipped_bytes_jpeg_comment() {
    flip_flat("jpg", &common::jpeg(), "CONFIDENTIAL", |data| {
        SegmentWalker::new(data)
            .find(|s| s.marker == COM)
            .unwrap()
            .payload
    });
}

#[test]
fn test_flipped_bytes_rtf_group() {
    flip_flat("rtf", common::RTF, "CONFIDENTIAL", |data| {
        region(data, RTF_GROUP_OPEN.as_bytes(), b"\\watermark-end}")
    });
}

#[test]
fn test_flipped_bytes_docx_keywords() {
    flip_member("docx", &common::docx(), "docProps/core.xml", "CONFIDENTIAL");
}

#[test]
fn test_flipped_bytes_odt_keyword() {
    flip_member("odt", &common::odt(), "meta.xml", "CONFIDENTIAL");
}
