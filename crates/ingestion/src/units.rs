//! Declared unit conversions.
//!
//! Adapters never infer units. Each adapter publishes the table of
//! conversions it is willing to apply; a raw unit without an entry in that
//! table makes the record malformed.

use wave_common::CanonicalField;

/// Units that appear in upstream wave, wind and pressure products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Meter,
    Centimeter,
    Foot,
    Second,
    MeterPerSecond,
    Knot,
    KilometerPerHour,
    Pascal,
    Hectopascal,
    Degree,
    KilogramPerCubicMeter,
}

impl Unit {
    /// Parse a unit label as written by NDBC, CMEMS, ERA5 or CSV exports.
    pub fn parse(label: &str) -> Option<Self> {
        let normalized = label.trim().to_lowercase().replace(' ', "");
        let unit = match normalized.as_str() {
            "m" | "meter" | "meters" | "metre" | "metres" => Unit::Meter,
            "cm" | "centimeter" | "centimeters" => Unit::Centimeter,
            "ft" | "feet" => Unit::Foot,
            "s" | "sec" | "secs" | "second" | "seconds" => Unit::Second,
            "m/s" | "ms-1" | "ms^-1" | "mps" => Unit::MeterPerSecond,
            "kt" | "kts" | "kn" | "knot" | "knots" => Unit::Knot,
            "km/h" | "kmh" | "kph" => Unit::KilometerPerHour,
            "pa" | "pascal" => Unit::Pascal,
            "hpa" | "mb" | "mbar" | "millibar" => Unit::Hectopascal,
            "deg" | "degt" | "degree" | "degrees" | "degrees_true" => Unit::Degree,
            "kg/m3" | "kgm-3" | "kg/m^3" => Unit::KilogramPerCubicMeter,
            _ => return None,
        };
        Some(unit)
    }

    /// SI unit used for a canonical field.
    pub fn canonical_for(field: CanonicalField) -> Self {
        match field {
            CanonicalField::SignificantWaveHeight => Unit::Meter,
            CanonicalField::WavePeriod => Unit::Second,
            CanonicalField::WindSpeed => Unit::MeterPerSecond,
            CanonicalField::WindDirection => Unit::Degree,
            CanonicalField::SeaLevelPressure => Unit::Pascal,
            CanonicalField::Density => Unit::KilogramPerCubicMeter,
        }
    }
}

/// One declared linear conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conversion {
    pub from: Unit,
    pub to: Unit,
    pub factor: f64,
}

impl Conversion {
    pub const fn new(from: Unit, to: Unit, factor: f64) -> Self {
        Self { from, to, factor }
    }
}

pub const CENTIMETERS_TO_METERS: Conversion =
    Conversion::new(Unit::Centimeter, Unit::Meter, 0.01);
pub const FEET_TO_METERS: Conversion = Conversion::new(Unit::Foot, Unit::Meter, 0.3048);
pub const KNOTS_TO_METERS_PER_SECOND: Conversion =
    Conversion::new(Unit::Knot, Unit::MeterPerSecond, 1852.0 / 3600.0);
pub const KMH_TO_METERS_PER_SECOND: Conversion =
    Conversion::new(Unit::KilometerPerHour, Unit::MeterPerSecond, 1000.0 / 3600.0);
pub const HECTOPASCALS_TO_PASCALS: Conversion =
    Conversion::new(Unit::Hectopascal, Unit::Pascal, 100.0);

/// Find the factor that converts `from` into `to`, if declared.
///
/// Identity is always declared.
pub fn conversion_factor(table: &[Conversion], from: Unit, to: Unit) -> Option<f64> {
    if from == to {
        return Some(1.0);
    }
    table
        .iter()
        .find(|c| c.from == from && c.to == to)
        .map(|c| c.factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_labels() {
        assert_eq!(Unit::parse("degT"), Some(Unit::Degree));
        assert_eq!(Unit::parse("sec"), Some(Unit::Second));
        assert_eq!(Unit::parse("m s-1"), Some(Unit::MeterPerSecond));
        assert_eq!(Unit::parse("hPa"), Some(Unit::Hectopascal));
        assert_eq!(Unit::parse("furlongs"), None);
    }

    #[test]
    fn test_undeclared_conversion_is_none() {
        let table = [HECTOPASCALS_TO_PASCALS];
        assert_eq!(
            conversion_factor(&table, Unit::Hectopascal, Unit::Pascal),
            Some(100.0)
        );
        assert_eq!(conversion_factor(&table, Unit::Knot, Unit::MeterPerSecond), None);
        assert_eq!(conversion_factor(&table, Unit::Meter, Unit::Meter), Some(1.0));
    }

    #[test]
    fn test_knots() {
        let factor = KNOTS_TO_METERS_PER_SECOND.factor;
        assert!((10.0 * factor - 5.144444).abs() < 1e-6);
    }
}
