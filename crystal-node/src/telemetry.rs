//write-only sinks: per request analytics and fault reporting

use crate::error::{ShardError, UpstreamError};
use crystal_types::{PathDetails, ShardAddress};
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataPoint {
    pub blobs: Vec<String>,
    pub doubles: Vec<f64>,
    pub indexes: Vec<String>,
}

impl DataPoint {
    //blobs: id, address, key, method / doubles: level, keys held / indexes: address
    pub fn for_request(details: &PathDetails, method: &str, keys: usize) -> Self {
        DataPoint {
            blobs: vec![
                details.id.clone(),
                details.address.to_string(),
                details.key.clone(),
                method.to_string(),
            ],
            doubles: vec![details.level as f64, keys as f64],
            indexes: vec![details.address.to_string()],
        }
    }
}

pub trait TelemetrySink: Send + Sync + 'static {
    fn write_data_point(&self, point: DataPoint);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn write_data_point(&self, point: DataPoint) {
        debug!(
            target: "crystal::telemetry",
            blobs = ?point.blobs,
            doubles = ?point.doubles,
            indexes = ?point.indexes,
            "data point"
        );
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn write_data_point(&self, _point: DataPoint) {}
}

//context attached to a reported fault
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestTags {
    pub id: String,
    pub address: String,
    pub method: String,
}

pub trait ErrorReporter: Send + Sync + 'static {
    fn capture(&self, fault: &ShardError, tags: &RequestTags);

    fn capture_upstream(&self, fault: &UpstreamError, address: &ShardAddress) {
        warn!(%address, error = %fault, "propagation to parent failed, will retry");
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn capture(&self, fault: &ShardError, tags: &RequestTags) {
        error!(
            id = %tags.id,
            address = %tags.address,
            method = %tags.method,
            error = %fault,
            "unhandled fault"
        );
    }
}
