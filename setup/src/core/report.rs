//! Decoding of the discovery tool's JSON report.

use serde_json::Value;

use crate::core::types::{DiscoveryRecord, DiscoveryReport, RejectedRecord};
use crate::error::ProbeError;

/// Decode helper-container output as a JSON array of discovery records.
///
/// Output that is not a JSON array fails with `DiscoveryReportMalformed`
/// and keeps the raw bytes. Array entries that do not decode as a record are
/// collected in `rejected` without affecting their siblings.
pub fn decode_report(raw: &[u8]) -> Result<DiscoveryReport, ProbeError> {
    let text = std::str::from_utf8(raw).map_err(|err| ProbeError::DiscoveryReportMalformed {
        reason: format!("output is not utf-8: {err}"),
        raw: raw.to_vec(),
    })?;
    let value: Value =
        serde_json::from_str(text.trim()).map_err(|err| ProbeError::DiscoveryReportMalformed {
            reason: err.to_string(),
            raw: raw.to_vec(),
        })?;
    let Value::Array(entries) = value else {
        return Err(ProbeError::DiscoveryReportMalformed {
            reason: format!("expected a JSON array, found {}", kind(&value)),
            raw: raw.to_vec(),
        });
    };

    let mut report = DiscoveryReport::default();
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<DiscoveryRecord>(entry.clone()) {
            Ok(record) => report.records.push(record),
            Err(err) => report.rejected.push(RejectedRecord {
                index,
                reason: err.to_string(),
                raw: entry,
            }),
        }
    }
    Ok(report)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_PEER: &str = r#"[{"MSPID":"Org1MSP","LedgerHeight":"12","Endpoint":"peer0.org1.example.com:7051","Identity":"-----BEGIN CERTIFICATE-----","Chaincodes":["cc1"]}]"#;

    #[test]
    fn decodes_single_record() {
        let report = decode_report(ONE_PEER.as_bytes()).expect("decode");
        assert_eq!(report.records.len(), 1);
        let record = &report.records[0];
        assert_eq!(record.endpoint, "peer0.org1.example.com:7051");
        assert_eq!(record.mspid, "Org1MSP");
        assert_eq!(record.chaincodes, vec!["cc1"]);
        assert!(report.rejected.is_empty());
    }

    #[test]
    fn re_encoding_preserves_fields() {
        let report = decode_report(ONE_PEER.as_bytes()).expect("decode");
        let encoded = serde_json::to_string(&report.records).expect("encode");
        let again = decode_report(encoded.as_bytes()).expect("decode again");
        assert_eq!(again.records, report.records);
        let original: Value = serde_json::from_str(ONE_PEER).expect("json");
        let encoded: Value = serde_json::from_str(&encoded).expect("json");
        assert_eq!(original, encoded);
    }

    #[test]
    fn non_json_is_malformed_with_raw_bytes() {
        let err = decode_report(b"connection refused").unwrap_err();
        match err {
            ProbeError::DiscoveryReportMalformed { raw, .. } => {
                assert_eq!(raw, b"connection refused");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_output_is_malformed_not_empty() {
        assert!(matches!(
            decode_report(b""),
            Err(ProbeError::DiscoveryReportMalformed { .. })
        ));
    }

    #[test]
    fn object_instead_of_array_is_malformed() {
        let err = decode_report(br#"{"MSPID":"Org1MSP"}"#).unwrap_err();
        assert!(err.to_string().contains("an object"));
    }

    #[test]
    fn empty_array_is_valid() {
        let report = decode_report(b" []\r\n").expect("decode");
        assert!(report.records.is_empty());
        assert!(report.rejected.is_empty());
    }

    #[test]
    fn partial_records_do_not_abort_siblings() {
        let raw = r#"[
            {"MSPID":"Org1MSP","LedgerHeight":"3","Endpoint":"peer0:7051","Identity":"a","Chaincodes":[]},
            {"MSPID":"Org2MSP","Endpoint":"peer0.org2:9051"},
            {"MSPID":"Org2MSP","LedgerHeight":"3","Endpoint":"peer1:7051","Identity":"b","Extra":true}
        ]"#;
        let report = decode_report(raw.as_bytes()).expect("decode");
        let endpoints: Vec<&str> = report.records.iter().map(|r| r.endpoint.as_str()).collect();
        assert_eq!(endpoints, vec!["peer0:7051", "peer1:7051"]);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].index, 1);
        assert!(report.rejected[0].reason.contains("LedgerHeight"));
    }
}
