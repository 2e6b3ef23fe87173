use orphan_core::scan::{ScanResult, has_orphan_markers, scan_line};
use proptest::prelude::*;

fn hex_der() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..64)
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(2000))]

    // Arbitrary text never panics and resolves to exactly one variant.
    #[test]
    fn scan_is_total(line in ".{0,200}") {
        let result = scan_line(&line);
        prop_assert_eq!(result.is_match(), has_orphan_markers(&line));
    }

    #[test]
    fn unlabelled_lines_never_match(prefix in "[a-zA-Z0-9 :\\[\\]=]{0,40}", der in hex_der(), reg in 0_i64..1_000_000) {
        let line = format!("{prefix} stored certificate: cert=[{}] regID=[{reg}]", hex::encode(der));
        prop_assume!(!line.contains("orphaning"));
        prop_assert_eq!(scan_line(&line), ScanResult::NoMatch);
    }

    #[test]
    fn labelled_lines_yield_payload(
        label in prop::sample::select(vec!["orphaning certificate", "orphaning precertificate"]),
        der in hex_der(),
        reg in 0_i64..i64::MAX,
    ) {
        let line = format!("[AUDIT] Failed RPC to store at SA, {label}: cert=[{}] err=[x], regID=[{reg}]", hex::encode(&der));
        match scan_line(&line) {
            ScanResult::Candidate(candidate) => {
                prop_assert_eq!(candidate.der, der);
                prop_assert_eq!(candidate.reg_id, reg);
            }
            other => prop_assert!(false, "expected candidate, got {other:?}"),
        }
    }

    // Odd-length payloads can never decode, so they are malformed, not skipped.
    #[test]
    fn odd_length_hex_is_malformed(der in hex_der(), reg in 0_i64..1000) {
        let mut encoded = hex::encode(der);
        encoded.push('a');
        let line = format!("orphaning certificate: cert=[{encoded}] regID=[{reg}]");
        prop_assert!(matches!(scan_line(&line), ScanResult::Malformed(_)));
    }
}
