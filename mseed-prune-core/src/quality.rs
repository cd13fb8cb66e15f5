//! Data-quality codes and the total order pruning priority is based on.
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::ToPrimitive;

use crate::errors::PruneError;

/// One of the three Mini-SEED data-quality indicators, totally ordered
/// `Q > D > R` (quality-controlled > data-center > raw).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Quality {
    /// Raw, unprocessed data.
    Raw = 0,
    /// Data-center processed (the common case).
    DataCenter = 1,
    /// Quality-controlled.
    QualityControlled = 2,
}

impl Quality {
    /// Parse the single-character SEED quality code (`'Q'`, `'D'`, or `'R'`).
    pub fn from_byte(b: u8) -> Result<Self, PruneError> {
        match b {
            b'R' => Ok(Quality::Raw),
            b'D' => Ok(Quality::DataCenter),
            b'Q' => Ok(Quality::QualityControlled),
            other => Err(PruneError::ParseEnum {
                what: "Quality",
                code: other as u16,
            }),
        }
    }

    /// The single-character SEED quality code.
    pub fn to_byte(self) -> u8 {
        match self {
            Quality::Raw => b'R',
            Quality::DataCenter => b'D',
            Quality::QualityControlled => b'Q',
        }
    }

    /// Numeric rank, used only to back [`Ord`]; higher is better priority.
    fn rank(self) -> u8 {
        self.to_u8().expect("Quality always fits in a u8")
    }
}

impl PartialOrd for Quality {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quality {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_byte() as char)
    }
}

/// Compare two quality codes the way the original `qcompare` does:
/// -1 if `a` outranks `b`, 0 if equal, 1 if `b` outranks `a`.
pub fn qcompare(a: Quality, b: Quality) -> i32 {
    match a.cmp(&b) {
        std::cmp::Ordering::Greater => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Less => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_order() {
        assert!(Quality::QualityControlled > Quality::DataCenter);
        assert!(Quality::DataCenter > Quality::Raw);
        assert!(Quality::QualityControlled > Quality::Raw);
    }

    #[test]
    fn qcompare_matches_spec() {
        assert_eq!(qcompare(Quality::QualityControlled, Quality::DataCenter), -1);
        assert_eq!(qcompare(Quality::DataCenter, Quality::Raw), -1);
        assert_eq!(qcompare(Quality::QualityControlled, Quality::Raw), -1);
        assert_eq!(qcompare(Quality::Raw, Quality::Raw), 0);
        assert_eq!(qcompare(Quality::Raw, Quality::QualityControlled), 1);
    }

    #[test]
    fn byte_roundtrip() {
        for &b in &[b'Q', b'D', b'R'] {
            let q = Quality::from_byte(b).unwrap();
            assert_eq!(q.to_byte(), b);
        }
        assert!(Quality::from_byte(b'X').is_err());
    }
}
