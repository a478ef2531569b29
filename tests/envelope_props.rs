//! Property tests for the envelope codec.

use docmark::envelope::wire::{Payload, parse_fields, to_fields};
use docmark::{EnvelopeCodec, EnvelopeProfile, FormatKind, Integrity, WatermarkError};
use proptest::prelude::*;

fn any_format() -> impl Strategy<Value = FormatKind> {
    prop::sample::select(FormatKind::ALL.to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn sealed_text_opens_verified(
        format in any_format(),
        text in "[^\\s]\\PC{0,99}",
        secret in "[a-z0-9]{1,24}",
    ) {
        let codec = EnvelopeCodec::new(EnvelopeProfile::for_format(format), secret);
        let envelope = codec.seal(&text).unwrap();
        let opened = codec.open(&envelope).unwrap();
        prop_assert_eq!(opened.text, text);
        prop_assert_eq!(opened.integrity, Integrity::Verified);

        // The delimited field form carries the same envelope
        match parse_fields(&to_fields(&envelope)).unwrap() {
            Payload::Sealed(parsed) => prop_assert_eq!(parsed, envelope),
            Payload::Legacy(_) => prop_assert!(false, "sealed envelope parsed as legacy"),
        }
    }

    #[test]
    fn shifted_timestamp_never_verifies(
        format in any_format(),
        text in "[A-Za-z0-9 ]{1,40}",
        shift in 1i64..100_000,
    ) {
        let codec = EnvelopeCodec::new(EnvelopeProfile::for_format(format), "secret");
        let mut envelope = codec.seal(&text).unwrap();
        let moved = docmark::envelope::Timestamp::from_unix(envelope.timestamp.unix() + shift).unwrap();
        envelope.timestamp = moved;

        match codec.open(&envelope) {
            Ok(opened) => prop_assert!(!opened.integrity.is_verified()),
            Err(e) => prop_assert!(
                e.is_integrity_failure(),
                "unexpected error: {}", e
            ),
        }
    }
}

#[test]
fn blank_text_rejected() {
    let codec = EnvelopeCodec::new(EnvelopeProfile::for_format(FormatKind::Pdf), "secret");
    assert!(matches!(codec.seal("   "), Err(WatermarkError::InvalidText(_))));
}
