//! Mapping of a measurement onto the sheet's columns. Columns are positional, so the order here
//! is the sheet layout.

use crate::{
    measurement::{
        MeasurementRecord,
        TIMESTAMP_FORMAT,
    },
    Error,
    Result,
};
use chrono::NaiveDateTime;
use gsheets_client::CellValue;

/// Format the timestamp is written in.
pub const SHEET_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const COLUMN_COUNT: usize = 24;

/// Header of each column, 1-indexed in the sheet.
pub const COLUMN_HEADERS: [&str; COLUMN_COUNT] = [
    "Timestamp",
    "ISP",
    "Server Country",
    "Server Host",
    "Server ID",
    "Server IP",
    "Server Location",
    "Server Name",
    "Server Port",
    "Ping Jitter",
    "Ping Latency",
    "Download Bandwidth",
    "Download Bytes",
    "Download Elapsed",
    "Upload Bandwidth",
    "Upload Bytes",
    "Upload Elapsed",
    "Interface ExternalIp",
    "Interface InternalIp",
    "Interface IsVpn",
    "Interface MacAddr",
    "Interface Name",
    "Result URL",
    "Result ID",
];

/// One row of the sheet, derived from a single measurement.
///
/// Absent fields are already rejected when the CLI output is parsed; the only mapping failure is
/// a timestamp that does not match [`TIMESTAMP_FORMAT`]. Empty strings are written as they are.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow([CellValue; COLUMN_COUNT]);

impl SheetRow {
    pub fn cells(&self) -> &[CellValue] {
        &self.0
    }
}

impl TryFrom<&MeasurementRecord> for SheetRow {
    type Error = Error;

    fn try_from(record: &MeasurementRecord) -> Result<Self> {
        let timestamp = reformat_timestamp(&record.timestamp)?;

        Ok(SheetRow([
            timestamp.into(),
            record.isp.clone().into(),
            record.server.country.clone().into(),
            record.server.host.clone().into(),
            record.server.id.into(),
            record.server.ip.clone().into(),
            record.server.location.clone().into(),
            record.server.name.clone().into(),
            record.server.port.into(),
            record.ping.jitter.into(),
            record.ping.latency.into(),
            record.download.bandwidth.into(),
            record.download.bytes.into(),
            record.download.elapsed.into(),
            record.upload.bandwidth.into(),
            record.upload.bytes.into(),
            record.upload.elapsed.into(),
            record.interface.external_ip.clone().into(),
            record.interface.internal_ip.clone().into(),
            record.interface.is_vpn.into(),
            record.interface.mac_addr.clone().into(),
            record.interface.name.clone().into(),
            record.result.url.clone().into(),
            record.result.id.clone().into(),
        ]))
    }
}

/// `2023-05-01T12:00:00Z` -> `2023-05-01 12:00:00`
pub fn reformat_timestamp(timestamp: &str) -> Result<String> {
    NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
        .map(|ts| ts.format(SHEET_TIMESTAMP_FORMAT).to_string())
        .map_err(|err| Error::Mapping(format!("invalid timestamp {timestamp:?}: {err}")))
}
