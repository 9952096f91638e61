use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// The string form is also the serde form.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(Frequency {
    Once => "once",
    Twice => "twice",
    Three => "three",
    Four => "four",
    AsNeeded => "asneeded",
});

str_enum!(Potency {
    Low => "low",
    Moderate => "moderate",
    High => "high",
    VeryHigh => "very-high",
    Unknown => "unknown",
});

str_enum!(RiskCategory {
    Low => "Low",
    Moderate => "Moderate",
    High => "High",
});

str_enum!(AlcoholUse {
    Heavy => "Heavy",
    Light => "Light",
    Moderate => "Moderate",
    None => "None",
});

str_enum!(Gender {
    Male => "male",
    Female => "female",
    Other => "other",
});

str_enum!(Theme {
    Light => "light",
    Dark => "dark",
});

impl Frequency {
    /// Scheduled administrations per day. "As needed" counts as one.
    pub fn doses_per_day(&self) -> u32 {
        match self {
            Self::Once | Self::AsNeeded => 1,
            Self::Twice => 2,
            Self::Three => 3,
            Self::Four => 4,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Once => "Once daily",
            Self::Twice => "Twice daily",
            Self::Three => "Three times daily",
            Self::Four => "Four times daily",
            Self::AsNeeded => "As needed",
        }
    }
}

impl Potency {
    /// High and very-high potency medications are flagged in the roster view.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Self::High | Self::VeryHigh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn frequency_round_trip() {
        for (variant, s) in [
            (Frequency::Once, "once"),
            (Frequency::Twice, "twice"),
            (Frequency::Three, "three"),
            (Frequency::Four, "four"),
            (Frequency::AsNeeded, "asneeded"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(Frequency::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn potency_serializes_with_hyphen() {
        let json = serde_json::to_string(&Potency::VeryHigh).unwrap();
        assert_eq!(json, "\"very-high\"");
        let back: Potency = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Potency::VeryHigh);
    }

    #[test]
    fn invalid_value_reports_enum_name() {
        match Gender::from_str("unspecified").unwrap_err() {
            DatabaseError::InvalidEnum { field, value } => {
                assert_eq!(field, "Gender");
                assert_eq!(value, "unspecified");
            }
            other => panic!("Expected InvalidEnum, got: {other}"),
        }
    }

    #[test]
    fn as_needed_counts_one_dose() {
        assert_eq!(Frequency::AsNeeded.doses_per_day(), 1);
        assert_eq!(Frequency::Four.doses_per_day(), 4);
        assert_eq!(Frequency::Three.label(), "Three times daily");
    }

    #[test]
    fn elevated_potency() {
        assert!(Potency::VeryHigh.is_elevated());
        assert!(Potency::High.is_elevated());
        assert!(!Potency::Moderate.is_elevated());
        assert!(!Potency::Unknown.is_elevated());
    }
}
