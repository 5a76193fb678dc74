//! Faction definitions and the fixed city layout for each side.

use serde::{Deserialize, Serialize};

use crate::math::{GridPos, COLS, ROWS};

/// Side length of a city footprint.
pub const CITY_SIZE: i32 = 5;

/// Unique identifier for factions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactionId {
    /// The northern city, along the `y = 0` edge.
    White,
    /// The southern city, along the `y = COLS - 1` edge.
    Black,
}

impl FactionId {
    /// Both factions in world setup order.
    pub const ALL: [Self; 2] = [Self::White, Self::Black];

    /// Get the display name for this faction.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::White => "White Army",
            Self::Black => "Black Army",
        }
    }

    /// Get the short name for this faction.
    #[must_use]
    pub const fn short_name(&self) -> &'static str {
        match self {
            Self::White => "white",
            Self::Black => "black",
        }
    }

    /// The opposing faction.
    #[must_use]
    pub const fn opponent(&self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }

    /// Top-left corner of this faction's city footprint.
    #[must_use]
    pub const fn city_origin(&self) -> GridPos {
        match self {
            Self::White => GridPos::new(COLS / 2 - 3, 0),
            Self::Black => GridPos::new(COLS / 2 - 3, ROWS - CITY_SIZE),
        }
    }

    /// Cell where newly produced units appear.
    #[must_use]
    pub const fn spawn_point(&self) -> GridPos {
        match self {
            Self::White => GridPos::new(COLS / 2 - 1, CITY_SIZE),
            Self::Black => GridPos::new(COLS / 2 - 1, ROWS - CITY_SIZE - 1),
        }
    }

    /// Cell collectors walk back to in order to deposit wood.
    #[must_use]
    pub const fn depot_point(&self) -> GridPos {
        match self {
            Self::White => GridPos::new(COLS / 2 - 4, CITY_SIZE / 2),
            Self::Black => GridPos::new(COLS / 2 - 4, ROWS - CITY_SIZE / 2 - 1),
        }
    }
}

impl std::str::FromStr for FactionId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "white" => Ok(Self::White),
            "black" => Ok(Self::Black),
            other => Err(format!("unknown faction: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_city_layout_constants() {
        assert_eq!(FactionId::White.city_origin(), GridPos::new(7, 0));
        assert_eq!(FactionId::Black.city_origin(), GridPos::new(7, 15));
        assert_eq!(FactionId::White.spawn_point(), GridPos::new(9, 5));
        assert_eq!(FactionId::Black.spawn_point(), GridPos::new(9, 14));
        assert_eq!(FactionId::White.depot_point(), GridPos::new(6, 2));
        assert_eq!(FactionId::Black.depot_point(), GridPos::new(6, 17));
    }

    #[test]
    fn test_opponent_is_symmetric() {
        for faction in FactionId::ALL {
            assert_ne!(faction, faction.opponent());
            assert_eq!(faction, faction.opponent().opponent());
        }
    }

    #[test]
    fn test_parse_faction() {
        assert_eq!("White".parse::<FactionId>(), Ok(FactionId::White));
        assert_eq!("black".parse::<FactionId>(), Ok(FactionId::Black));
        assert!("grey".parse::<FactionId>().is_err());
    }
}
