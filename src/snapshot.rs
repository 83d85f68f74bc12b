extern crate reqwest;
extern crate serde;
extern crate serde_json;
extern crate std;

use crate::result;

/// Largest body we are willing to hold in memory. The published document
/// is well under 1 KiB.
pub const MAX_SNAPSHOT_BYTES: usize = 8 * 1024;

const USER_AGENT: &str = "metrodash from http://mrjon.es";

pub type FetchFn = fn(&str, std::time::Duration) -> result::DashResult<String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    pub metro: MetroInfo,
    pub stock: StockInfo,
    pub time: TimeInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetroInfo {
    pub station: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_departure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes_until: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockInfo {
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default)]
    pub change_percent: f64,
    #[serde(default)]
    pub market_open: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeInfo {
    pub display: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    pub date: String,
}

pub fn fetch_snapshot(url: &str, timeout: std::time::Duration) -> result::DashResult<Snapshot> {
    return fetch_snapshot_ext(url, timeout, real_fetch_json_fn);
}

pub fn fetch_snapshot_ext(url: &str, timeout: std::time::Duration, fetch_json_fn: FetchFn) -> result::DashResult<Snapshot> {
    let raw_json = fetch_json_fn(url, timeout)?;
    debug!("Fetched {} from {}",
           pretty_bytes::converter::convert(raw_json.len() as f64), url);
    let snapshot = parse_snapshot(&raw_json)?;
    // raw_json is dropped here; only the parsed fields stay alive.
    return Ok(snapshot);
}

/// Decodes a document and rejects it unless every part the display needs is
/// there. A document missing any of the three sections is thrown away whole.
pub fn parse_snapshot(raw_json: &str) -> result::DashResult<Snapshot> {
    if raw_json.len() > MAX_SNAPSHOT_BYTES {
        return Err(result::DashError::SnapshotTooLarge(raw_json.len()));
    }
    let snapshot: Snapshot = serde_json::from_str(raw_json)?;
    snapshot.validate()?;
    return Ok(snapshot);
}

impl Snapshot {
    pub fn validate(&self) -> result::DashResult<()> {
        require_text("metro.station", &self.metro.station)?;
        require_text("stock.symbol", &self.stock.symbol)?;
        require_text("time.display", &self.time.display)?;
        require_text("time.date", &self.time.date)?;

        if let Some(price) = self.stock.price {
            if !price.is_finite() {
                return Err(result::DashError::MalformedSnapshot(
                    "stock.price is not a finite number".to_string()));
            }
        }
        if !self.stock.change_percent.is_finite() {
            return Err(result::DashError::MalformedSnapshot(
                "stock.change_percent is not a finite number".to_string()));
        }
        return Ok(());
    }
}

fn require_text(field: &str, value: &str) -> result::DashResult<()> {
    if value.trim().is_empty() {
        return Err(result::DashError::MalformedSnapshot(
            format!("{} is empty", field)));
    }
    return Ok(());
}

pub fn real_fetch_json_fn(url: &str, timeout: std::time::Duration) -> result::DashResult<String> {
    use std::io::Read;

    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()?;
    let response = client.get(url)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .send()?;

    if response.status() != reqwest::StatusCode::OK {
        return Err(result::DashError::HttpStatus(response.status().as_u16()));
    }

    if let Some(length) = response.content_length() {
        if length as usize > MAX_SNAPSHOT_BYTES {
            return Err(result::DashError::SnapshotTooLarge(length as usize));
        }
    }

    // Servers don't always send Content-Length, so cap the read itself.
    let mut response_body = String::new();
    response.take(MAX_SNAPSHOT_BYTES as u64 + 1).read_to_string(&mut response_body)?;
    if response_body.len() > MAX_SNAPSHOT_BYTES {
        return Err(result::DashError::SnapshotTooLarge(response_body.len()));
    }
    return Ok(response_body);
}
