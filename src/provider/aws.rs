use std::io::Read;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::event::{CloudEvent, ProviderType};
use crate::error::ParseError;
use crate::provider::CloudProvider;

/// AWS CloudWatch Logs / Kinesis adapter.
///
/// Two input shapes: a single CloudWatch Logs notification whose `awslogs.data`
/// is base64-encoded gzip-compressed JSON, or a Kinesis delivery wrapper whose
/// `records[].data` entries are each encoded the same way.
pub struct AwsProvider {
    extract_log_events: bool,
}

#[derive(Debug, Deserialize)]
struct CloudWatchEnvelope {
    #[serde(default)]
    awslogs: Option<AwsLogs>,
    #[serde(default)]
    records: Vec<KinesisRecord>,
}

#[derive(Debug, Deserialize)]
struct AwsLogs {
    #[serde(default)]
    data: String,
}

#[derive(Debug, Deserialize)]
struct KinesisRecord {
    #[serde(rename = "recordId", default)]
    record_id: String,
    #[serde(default)]
    data: String,
}

/// Decoded CloudWatch Logs payload, used when log-event extraction is on.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CloudWatchLogsData {
    #[serde(default)]
    log_group: String,
    #[serde(default)]
    log_stream: String,
    #[serde(default)]
    log_events: Vec<LogLine>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LogLine {
    #[serde(default)]
    id: String,
    #[serde(default)]
    timestamp: i64,
    #[serde(default)]
    message: String,
}

impl AwsProvider {
    pub fn new(extract_log_events: bool) -> Self {
        AwsProvider { extract_log_events }
    }

    fn parse_cloudwatch_data(&self, decoded: &[u8]) -> Vec<CloudEvent> {
        if self.extract_log_events {
            if let Ok(data) = serde_json::from_slice::<CloudWatchLogsData>(decoded) {
                if !data.log_events.is_empty() {
                    return data
                        .log_events
                        .into_iter()
                        .filter_map(|line| {
                            let raw = match serde_json::to_vec(&line) {
                                Ok(raw) => raw,
                                Err(e) => {
                                    warn!("Skipping log event {}: {}", line.id, e);
                                    return None;
                                }
                            };
                            Some(CloudEvent {
                                provider_type: ProviderType::Aws,
                                timestamp: Some(line.timestamp),
                                log_group: Some(data.log_group.clone()),
                                log_stream: Some(data.log_stream.clone()),
                                message: Some(line.message),
                                metadata: None,
                                raw_data: raw,
                            })
                        })
                        .collect();
                }
            }
        }

        vec![CloudEvent::raw(ProviderType::Aws, decoded.to_vec())]
    }
}

impl CloudProvider for AwsProvider {
    fn name(&self) -> &'static str {
        "aws"
    }

    fn parse_batch(&self, raw: &Value) -> Result<Vec<CloudEvent>, ParseError> {
        let envelope: CloudWatchEnvelope = serde_json::from_value(raw.clone())
            .map_err(|e| ParseError::InvalidJson(e.to_string()))?;

        // Kinesis wrapper: every record decodes independently, a bad record is
        // skipped and never aborts the batch.
        if !envelope.records.is_empty() {
            let mut events = Vec::with_capacity(envelope.records.len());
            let mut skipped = 0usize;

            for record in &envelope.records {
                match decode_cloudwatch_data(&record.data) {
                    Ok(decoded) => events.push(CloudEvent::raw(ProviderType::Aws, decoded)),
                    Err(e) => {
                        skipped += 1;
                        warn!("Skipping undecodable Kinesis record {}: {}", record.record_id, e);
                    }
                }
            }

            if skipped > 0 {
                warn!("Skipped {} of {} Kinesis records", skipped, envelope.records.len());
            }

            return Ok(events);
        }

        // Single CloudWatch Logs notification: an undecodable payload is fatal
        // for the invocation.
        if let Some(awslogs) = &envelope.awslogs {
            if !awslogs.data.is_empty() {
                let decoded = decode_cloudwatch_data(&awslogs.data)?;
                return Ok(self.parse_cloudwatch_data(&decoded));
            }
        }

        debug!("CloudWatch envelope carried no awslogs data and no records");
        Ok(Vec::new())
    }
}

/// base64 -> gzip -> raw JSON bytes, the CloudWatch subscription encoding.
fn decode_cloudwatch_data(data: &str) -> Result<Vec<u8>, ParseError> {
    let compressed = BASE64
        .decode(data)
        .map_err(|e| ParseError::InvalidBase64(e.to_string()))?;

    let mut decoder = GzDecoder::new(compressed.as_slice());
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| ParseError::InvalidGzip(e.to_string()))?;

    Ok(decompressed)
}
