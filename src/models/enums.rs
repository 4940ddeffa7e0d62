use crate::db::StoreError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = StoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(StoreError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(TherapyStatus {
    Active => "active",
    Completed => "completed",
    Stopped => "stopped",
    Planned => "planned",
});

impl TherapyStatus {
    /// A therapy counts as received only once it is underway or finished.
    pub fn is_received(&self) -> bool {
        matches!(self, Self::Active | Self::Completed)
    }
}

str_enum!(Sex {
    Female => "female",
    Male => "male",
    Other => "other",
    Unknown => "unknown",
});
