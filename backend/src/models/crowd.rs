use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lowest crowd level a user can report.
pub const MIN_CROWD_LEVEL: i32 = 1;
/// Highest crowd level a user can report.
pub const MAX_CROWD_LEVEL: i32 = 5;

/// Crowd level rating (1 = empty, 5 = crowded).
///
/// Construction is validated, so a `CrowdLevel` held anywhere in the crate is
/// always within `MIN_CROWD_LEVEL..=MAX_CROWD_LEVEL`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct CrowdLevel(u8);

impl CrowdLevel {
    pub fn new(value: i32) -> Result<Self, String> {
        if !(MIN_CROWD_LEVEL..=MAX_CROWD_LEVEL).contains(&value) {
            return Err(format!(
                "Crowd level must be between {} and {}, got {}",
                MIN_CROWD_LEVEL, MAX_CROWD_LEVEL, value
            ));
        }
        Ok(Self(value as u8))
    }

    pub fn value(&self) -> i32 {
        self.0 as i32
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64
    }
}

impl TryFrom<i32> for CrowdLevel {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        CrowdLevel::new(value)
    }
}

impl From<CrowdLevel> for i32 {
    fn from(level: CrowdLevel) -> Self {
        level.value()
    }
}

impl fmt::Display for CrowdLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of transit station.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StationType {
    #[default]
    Metro,
    Bus,
    Train,
}

impl StationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StationType::Metro => "metro",
            StationType::Bus => "bus",
            StationType::Train => "train",
        }
    }
}

impl FromStr for StationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "metro" => Ok(Self::Metro),
            "bus" => Ok(Self::Bus),
            "train" => Ok(Self::Train),
            other => Err(format!("Unknown station type: {}", other)),
        }
    }
}

impl fmt::Display for StationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clamp a continuous crowd estimate to the reportable range.
pub fn clamp_crowd_level(value: f64) -> f64 {
    value.clamp(MIN_CROWD_LEVEL as f64, MAX_CROWD_LEVEL as f64)
}

/// Clamp a confidence score to [0, 1].
pub fn clamp_confidence(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Round to two decimals, the precision exposed by the API.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crowd_level_bounds() {
        assert!(CrowdLevel::new(0).is_err());
        assert!(CrowdLevel::new(6).is_err());
        for v in 1..=5 {
            assert_eq!(CrowdLevel::new(v).unwrap().value(), v);
        }
    }

    #[test]
    fn test_crowd_level_serde_rejects_out_of_range() {
        let ok: CrowdLevel = serde_json::from_str("3").unwrap();
        assert_eq!(ok.value(), 3);
        assert_eq!(serde_json::to_string(&ok).unwrap(), "3");
        assert!(serde_json::from_str::<CrowdLevel>("9").is_err());
    }

    #[test]
    fn test_station_type_parsing() {
        assert_eq!("Metro".parse::<StationType>().unwrap(), StationType::Metro);
        assert_eq!("bus".parse::<StationType>().unwrap(), StationType::Bus);
        assert!("ferry".parse::<StationType>().is_err());
        assert_eq!(StationType::default(), StationType::Metro);
        assert_eq!(
            serde_json::to_string(&StationType::Train).unwrap(),
            "\"train\""
        );
    }

    #[test]
    fn test_clamps_and_rounding() {
        assert_eq!(clamp_crowd_level(7.2), 5.0);
        assert_eq!(clamp_crowd_level(-1.0), 1.0);
        assert_eq!(clamp_crowd_level(3.3), 3.3);
        assert_eq!(clamp_confidence(1.4), 1.0);
        assert_eq!(clamp_confidence(-0.1), 0.0);
        assert_eq!(round2(3.14159), 3.14);
        assert_eq!(round2(2.005_1), 2.01);
    }
}
