//! Entity identifiers.
//!
//! Both storage backends hand out monotonically increasing 64-bit keys, so
//! every entity shares the same integer representation.

define_id_type!(
    /// Station identifier (primary key).
    i64,
    StationId
);

define_id_type!(
    /// User identifier (primary key).
    i64,
    UserId
);

define_id_type!(
    /// Crowd report identifier (primary key).
    i64,
    ReportId
);

define_id_type!(
    /// Stored prediction identifier (primary key).
    i64,
    PredictionId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_roundtrip_and_display() {
        let id = StationId::new(42);
        assert_eq!(id.value(), 42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(i64::from(id), 42);
        assert_eq!(StationId::from(7), StationId(7));
    }

    #[test]
    fn test_id_from_str() {
        assert_eq!(" 12 ".parse::<UserId>().unwrap(), UserId(12));
        assert!("abc".parse::<UserId>().is_err());
    }

    #[test]
    fn test_id_serializes_as_number() {
        let json = serde_json::to_string(&ReportId::new(5)).unwrap();
        assert_eq!(json, "5");
        let back: ReportId = serde_json::from_str("5").unwrap();
        assert_eq!(back, ReportId(5));
    }
}
