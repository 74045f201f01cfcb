//! Up axis and linear units of the source scene.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::util::Error;

/// Scene up axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    #[default]
    Y,
    Z,
}

impl Axis {
    /// Token authored as layer `upAxis`.
    pub fn token(&self) -> &'static str {
        match self {
            Self::Y => "Y",
            Self::Z => "Z",
        }
    }
}

/// Linear distance unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DistanceUnit {
    Nanometers,
    Micrometers,
    Millimeters,
    #[default]
    Centimeters,
    Decimeters,
    Meters,
    Kilometers,
    LightYears,
    Inches,
    Feet,
    Yards,
    Miles,
}

impl DistanceUnit {
    /// All units.
    pub const ALL: [DistanceUnit; 12] = [
        Self::Nanometers,
        Self::Micrometers,
        Self::Millimeters,
        Self::Centimeters,
        Self::Decimeters,
        Self::Meters,
        Self::Kilometers,
        Self::LightYears,
        Self::Inches,
        Self::Feet,
        Self::Yards,
        Self::Miles,
    ];

    /// Option token (`cm`, `inch`, ...).
    pub fn token(&self) -> &'static str {
        match self {
            Self::Nanometers => "nm",
            Self::Micrometers => "um",
            Self::Millimeters => "mm",
            Self::Centimeters => "cm",
            Self::Decimeters => "dm",
            Self::Meters => "m",
            Self::Kilometers => "km",
            Self::LightYears => "lightyear",
            Self::Inches => "inch",
            Self::Feet => "foot",
            Self::Yards => "yard",
            Self::Miles => "mile",
        }
    }

    /// Length of one unit in meters.
    pub fn meters_per_unit(&self) -> f64 {
        match self {
            Self::Nanometers => 1e-9,
            Self::Micrometers => 1e-6,
            Self::Millimeters => 1e-3,
            Self::Centimeters => 1e-2,
            Self::Decimeters => 0.1,
            Self::Meters => 1.0,
            Self::Kilometers => 1000.0,
            Self::LightYears => 9.4607304725808e15,
            Self::Inches => 0.0254,
            Self::Feet => 0.3048,
            Self::Yards => 0.9144,
            Self::Miles => 1609.344,
        }
    }

    /// Unit whose meters-per-unit matches `mpu`, if any.
    pub fn from_meters_per_unit(mpu: f64) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|u| (u.meters_per_unit() - mpu).abs() <= mpu.abs() * 1e-9)
    }
}

impl FromStr for DistanceUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|u| u.token() == s)
            .ok_or_else(|| Error::InvalidOption {
                option: "unit",
                value: s.to_string(),
            })
    }
}

impl TryFrom<String> for DistanceUnit {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DistanceUnit> for String {
    fn from(u: DistanceUnit) -> Self {
        u.token().to_string()
    }
}

impl fmt::Display for DistanceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens() {
        for u in DistanceUnit::ALL {
            assert_eq!(u.token().parse::<DistanceUnit>().unwrap(), u);
            assert_eq!(DistanceUnit::from_meters_per_unit(u.meters_per_unit()), Some(u));
        }
        assert!("parsec".parse::<DistanceUnit>().is_err());
        assert_eq!(DistanceUnit::Decimeters.meters_per_unit(), 0.1);
    }

    #[test]
    fn test_axis_serde() {
        let a: Axis = serde_json::from_str("\"z\"").unwrap();
        assert_eq!(a, Axis::Z);
        assert_eq!(a.token(), "Z");
    }
}
