use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration, read from `LEASEBOOK_*` environment variables.
///
/// Gateway keys and media presets are deployment secrets and are never
/// compiled in.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_dir: PathBuf,
    /// WAL appends after which the compactor rewrites the log.
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
    pub payment_key_id: String,
    pub merchant_name: String,
    pub currency: String,
    pub media_cloud_name: String,
    pub media_upload_preset: String,
    pub media_upload_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            compact_threshold: 1000,
            metrics_port: None,
            payment_key_id: String::new(),
            merchant_name: "HousingHub".into(),
            currency: "INR".into(),
            media_cloud_name: String::new(),
            media_upload_preset: String::new(),
            media_upload_timeout: Duration::from_secs(60),
        }
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(var)
    }

    /// Build from any variable lookup; unset or unparsable values keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            data_dir: lookup("LEASEBOOK_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            compact_threshold: lookup("LEASEBOOK_COMPACT_THRESHOLD")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.compact_threshold),
            metrics_port: lookup("LEASEBOOK_METRICS_PORT").and_then(|s| s.parse().ok()),
            payment_key_id: lookup("LEASEBOOK_PAYMENT_KEY_ID").unwrap_or(defaults.payment_key_id),
            merchant_name: lookup("LEASEBOOK_MERCHANT_NAME").unwrap_or(defaults.merchant_name),
            currency: lookup("LEASEBOOK_CURRENCY").unwrap_or(defaults.currency),
            media_cloud_name: lookup("LEASEBOOK_MEDIA_CLOUD").unwrap_or(defaults.media_cloud_name),
            media_upload_preset: lookup("LEASEBOOK_MEDIA_PRESET")
                .unwrap_or(defaults.media_upload_preset),
            media_upload_timeout: lookup("LEASEBOOK_UPLOAD_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.media_upload_timeout),
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("leasebook.wal")
    }
}
