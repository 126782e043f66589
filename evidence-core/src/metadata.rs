//! Evidence metadata record.
//!
//! The JSON field names are a fixed external contract:
//!
//! ```text
//! { timestamp_utc, gps: { lat, lon }, hash_sha256, user_agent, platform,
//!   timezone_offset_min, image_resolution: { width, height } }
//! ```

use chrono::{DateTime, Local, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EvidenceError, Result};

/// Placeholder used when no position is known.
pub const UNAVAILABLE: &str = "N/A";

/// Format a capture time as ISO-8601 with millisecond precision, e.g.
/// `2024-01-01T00:00:00.000Z`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Last known position of the capturing device.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Geolocation {
    /// No fix available (permission denied, timeout, no hardware).
    #[default]
    Unavailable,
    Position { latitude: f64, longitude: f64 },
}

impl Geolocation {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self::Position {
            latitude,
            longitude,
        }
    }

    /// Like [`Geolocation::new`], but rejects coordinates off the globe.
    pub fn checked(latitude: f64, longitude: f64) -> Result<Self> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(EvidenceError::InvalidGeometry(format!(
                "latitude {latitude} outside [-90, 90]"
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(EvidenceError::InvalidGeometry(format!(
                "longitude {longitude} outside [-180, 180]"
            )));
        }
        Ok(Self::new(latitude, longitude))
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Position { latitude, longitude } if latitude.is_finite() && longitude.is_finite())
    }

    /// Latitude and longitude with six decimals, or `N/A` for both.
    pub fn formatted(&self) -> (String, String) {
        match *self {
            Self::Position {
                latitude,
                longitude,
            } if self.is_available() => (format!("{latitude:.6}"), format!("{longitude:.6}")),
            _ => (UNAVAILABLE.to_string(), UNAVAILABLE.to_string()),
        }
    }
}

/// Descriptors of the capturing environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentInfo {
    pub user_agent: String,
    pub platform: String,
    /// UTC minus local time in minutes (UTC+02:00 is -120).
    pub timezone_offset_min: i32,
}

impl EnvironmentInfo {
    /// Describe the running process.
    pub fn detect() -> Self {
        let offset_secs = Local::now().offset().local_minus_utc();
        Self {
            user_agent: concat!("evidence/", env!("CARGO_PKG_VERSION")).to_string(),
            platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
            timezone_offset_min: -(offset_secs / 60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpsCoordinates {
    pub lat: String,
    pub lon: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageResolution {
    pub width: u32,
    pub height: u32,
}

/// Structured record accompanying the evidence image.
///
/// Built once per capture and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceMetadata {
    timestamp_utc: String,
    gps: GpsCoordinates,
    hash_sha256: String,
    user_agent: String,
    platform: String,
    timezone_offset_min: i32,
    image_resolution: ImageResolution,
}

impl EvidenceMetadata {
    /// Assemble the record. Never fails; a missing position becomes `N/A`.
    pub fn compose(
        digest_hex: &str,
        captured_at: DateTime<Utc>,
        geolocation: &Geolocation,
        env: &EnvironmentInfo,
        resolution: (u32, u32),
    ) -> Self {
        let (lat, lon) = geolocation.formatted();
        Self {
            timestamp_utc: format_timestamp(captured_at),
            gps: GpsCoordinates { lat, lon },
            hash_sha256: digest_hex.to_ascii_lowercase(),
            user_agent: env.user_agent.clone(),
            platform: env.platform.clone(),
            timezone_offset_min: env.timezone_offset_min,
            image_resolution: ImageResolution {
                width: resolution.0,
                height: resolution.1,
            },
        }
    }

    pub fn timestamp_utc(&self) -> &str {
        &self.timestamp_utc
    }

    pub fn gps(&self) -> &GpsCoordinates {
        &self.gps
    }

    pub fn hash_sha256(&self) -> &str {
        &self.hash_sha256
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn timezone_offset_min(&self) -> i32 {
        self.timezone_offset_min
    }

    pub fn image_resolution(&self) -> ImageResolution {
        self.image_resolution
    }

    /// Check the record against the schema before it leaves the process.
    pub fn validate(&self) -> Result<()> {
        let hash_ok = self.hash_sha256.len() == 64
            && self
                .hash_sha256
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !hash_ok {
            return Err(EvidenceError::SerializationError(format!(
                "hash_sha256 must be 64 lowercase hex characters, got {:?}",
                self.hash_sha256
            )));
        }

        DateTime::parse_from_rfc3339(&self.timestamp_utc).map_err(|e| {
            EvidenceError::SerializationError(format!(
                "timestamp_utc {:?} is not ISO-8601: {e}",
                self.timestamp_utc
            ))
        })?;

        for (name, value) in [("lat", &self.gps.lat), ("lon", &self.gps.lon)] {
            if value != UNAVAILABLE && value.parse::<f64>().is_err() {
                return Err(EvidenceError::SerializationError(format!(
                    "gps.{name} must be a number or \"{UNAVAILABLE}\", got {value:?}"
                )));
            }
        }

        Ok(())
    }

    /// Pretty-printed UTF-8 JSON with fixed field order.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        self.validate()?;
        serde_json::to_vec_pretty(self).map_err(|e| EvidenceError::SerializationError(e.to_string()))
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let metadata: Self = serde_json::from_slice(bytes)
            .map_err(|e| EvidenceError::SerializationError(e.to_string()))?;
        metadata.validate()?;
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const HASH: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    fn env() -> EnvironmentInfo {
        EnvironmentInfo {
            user_agent: "test-agent".into(),
            platform: "linux-x86_64".into(),
            timezone_offset_min: -120,
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_timestamp_format() {
        assert_eq!(format_timestamp(at()), "2024-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_unavailable_geolocation_uses_sentinel() {
        let metadata =
            EvidenceMetadata::compose(HASH, at(), &Geolocation::Unavailable, &env(), (960, 540));
        assert_eq!(metadata.gps().lat, "N/A");
        assert_eq!(metadata.gps().lon, "N/A");
        assert!(metadata.to_json().is_ok());
    }

    #[test]
    fn test_non_finite_position_is_unavailable() {
        let geo = Geolocation::new(f64::NAN, 1.0);
        assert!(!geo.is_available());
        assert_eq!(geo.formatted().0, "N/A");
    }

    #[test]
    fn test_checked_position_range() {
        assert!(Geolocation::checked(90.0, -180.0).unwrap().is_available());
        assert!(Geolocation::checked(-90.0, 180.0).is_ok());
        assert!(matches!(
            Geolocation::checked(200.0, 0.0),
            Err(EvidenceError::InvalidGeometry(_))
        ));
        assert!(Geolocation::checked(0.0, -180.5).is_err());
        assert!(Geolocation::checked(f64::NAN, 0.0).is_err());
        assert!(Geolocation::checked(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_json_field_names() {
        let metadata = EvidenceMetadata::compose(
            HASH,
            at(),
            &Geolocation::new(37.123456, -122.123456),
            &env(),
            (960, 540),
        );
        let value: serde_json::Value = serde_json::from_slice(&metadata.to_json().unwrap()).unwrap();

        assert_eq!(value["timestamp_utc"], "2024-01-01T00:00:00.000Z");
        assert_eq!(value["gps"]["lat"], "37.123456");
        assert_eq!(value["gps"]["lon"], "-122.123456");
        assert_eq!(value["hash_sha256"], HASH);
        assert_eq!(value["user_agent"], "test-agent");
        assert_eq!(value["platform"], "linux-x86_64");
        assert_eq!(value["timezone_offset_min"], -120);
        assert_eq!(value["image_resolution"]["width"], 960);
        assert_eq!(value["image_resolution"]["height"], 540);
    }

    #[test]
    fn test_json_roundtrip() {
        let metadata =
            EvidenceMetadata::compose(HASH, at(), &Geolocation::new(1.5, 2.5), &env(), (4, 3));
        let restored = EvidenceMetadata::from_json(&metadata.to_json().unwrap()).unwrap();
        assert_eq!(restored, metadata);
    }

    #[test]
    fn test_uppercase_digest_is_normalized() {
        let metadata = EvidenceMetadata::compose(
            &HASH.to_uppercase(),
            at(),
            &Geolocation::Unavailable,
            &env(),
            (1, 1),
        );
        assert_eq!(metadata.hash_sha256(), HASH);
    }

    #[test]
    fn test_malformed_digest_rejected_at_serialization() {
        let metadata =
            EvidenceMetadata::compose("not-a-hash", at(), &Geolocation::Unavailable, &env(), (1, 1));
        assert!(matches!(
            metadata.to_json(),
            Err(EvidenceError::SerializationError(_))
        ));
    }

    #[test]
    fn test_detect_environment() {
        let env = EnvironmentInfo::detect();
        assert!(env.user_agent.starts_with("evidence/"));
        assert!(env.platform.contains(std::env::consts::OS));
    }
}
