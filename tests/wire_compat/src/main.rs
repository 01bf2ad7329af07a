fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use movelink_protocol::contract::{ecg_contract, ecg_info_uri, hr_contract};
    use movelink_protocol::{DecodeError, decode_ecg_batch, decode_ecg_info, decode_hr};

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a captured device payload verbatim.
    fn load_fixture(name: &str) -> String {
        let path = fixtures_dir().join(name);
        fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    // --- Responses ---

    #[test]
    fn fixture_ecg_info() {
        let info = decode_ecg_info(&load_fixture("ecg_info.json")).unwrap();
        assert_eq!(info.array_size, Some(16));
        assert_eq!(info.current_sample_rate, Some(128));
        assert!(info.available_sample_rates.contains(&128));
        assert_eq!(info.batch_size_or(32), 16);
    }

    #[test]
    fn fixture_ecg_info_without_array_size() {
        let info = decode_ecg_info(&load_fixture("ecg_info_no_array_size.json")).unwrap();
        assert_eq!(info.array_size, None);
        assert_eq!(info.batch_size_or(16), 16);
    }

    // --- Notifications ---

    #[test]
    fn fixture_hr_notification() {
        let hr = decode_hr(&load_fixture("hr_notification.json")).unwrap();
        assert_eq!(hr.average, Some(71.6));
        assert_eq!(hr.rr_intervals, vec![833, 845]);
        assert_eq!(hr.latest_rr().unwrap(), 833);
    }

    #[test]
    fn fixture_hr_notification_empty_rr() {
        let hr = decode_hr(&load_fixture("hr_notification_empty_rr.json")).unwrap();
        assert_eq!(hr.average, Some(70.2));
        assert!(matches!(hr.latest_rr(), Err(DecodeError::EmptySequence)));
    }

    #[test]
    fn fixture_ecg_notification() {
        let batch = decode_ecg_batch(&load_fixture("ecg_notification.json")).unwrap();
        assert_eq!(batch.samples.len(), 16);
        assert_eq!(batch.samples[0], -1520);
        assert_eq!(batch.samples[15], -961);
        assert_eq!(batch.timestamp, Some(413245));
    }

    #[test]
    fn fixture_truncated_notification_is_syntax_error() {
        let err = decode_ecg_batch(&load_fixture("ecg_notification_truncated.json")).unwrap_err();
        assert!(matches!(err, DecodeError::Syntax(_)));
    }

    #[test]
    fn hr_fixture_is_not_an_ecg_batch() {
        let err = decode_ecg_batch(&load_fixture("hr_notification.json")).unwrap_err();
        assert!(matches!(err, DecodeError::MissingField("Samples")));
    }

    // --- Addressing ---

    #[test]
    fn subscription_contracts_match_firmware_format() {
        assert_eq!(hr_contract("174630000192"), r#"{"Uri": "174630000192/Meas/HR"}"#);
        assert_eq!(
            ecg_contract("174630000192", 128),
            r#"{"Uri": "174630000192/Meas/ECG/128"}"#
        );
        assert_eq!(
            ecg_info_uri("174630000192"),
            "suunto://174630000192/Meas/ECG/Info"
        );
    }

    #[test]
    fn contract_is_valid_json() {
        let v: serde_json::Value = serde_json::from_str(&ecg_contract("A\"1", 256)).unwrap();
        assert_eq!(v["Uri"], "A\"1/Meas/ECG/256");
    }
}
