//! Bases, codons, and acids (spec §3, §4.2, SPEC_FULL.md §B).
//!
//! The 64-entry codon→acid table is the generic genetic code of this engine;
//! it is immutable for the lifetime of a loaded genome but may be overridden
//! per-genome at load time (spec §6, `codonTable`).

use std::{collections::HashMap, f64::consts::E, f64::consts::FRAC_1_SQRT_2, fmt, str::FromStr};

use ref_cast::RefCast;

use crate::{geometry::Point, unit::Unit};

/// A borrowed run of [`Base`]s, displayed as its `TCAG` text without
/// allocating (spec §6 `getGenomeBases`'s "raw bases" output).
///
/// Mirrors `biocore::sequence::SequenceSlice`'s zero-cost `RefCast` wrapper
/// over a base vector, scaled down to the one thing stylus needs a slice
/// view for: printing.
#[derive(RefCast)]
#[repr(transparent)]
pub struct BaseSlice([Base]);
impl BaseSlice {
    pub fn ref_cast(bases: &[Base]) -> &Self {
        RefCast::ref_cast(bases)
    }
}
impl fmt::Display for BaseSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for base in &self.0 {
            write!(f, "{base}")?;
        }
        Ok(())
    }
}

pub const CODON_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum Base {
    T = b'T',
    C = b'C',
    A = b'A',
    G = b'G',
}
impl Base {
    /// Purine <-> pyrimidine swap used by transversions (spec §4.7).
    pub fn transversion(self) -> Self {
        match self {
            Self::A => Self::C,
            Self::G => Self::T,
            Self::C => Self::A,
            Self::T => Self::G,
        }
    }
    /// Same-class swap (A<->G, C<->T) used by transitions.
    pub fn transition(self) -> Self {
        match self {
            Self::A => Self::G,
            Self::G => Self::A,
            Self::C => Self::T,
            Self::T => Self::C,
        }
    }
}
impl fmt::Display for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::T => "T",
            Self::C => "C",
            Self::A => "A",
            Self::G => "G",
        })
    }
}
impl TryFrom<char> for Base {
    type Error = BaseDecodeError;
    fn try_from(c: char) -> Result<Self, Self::Error> {
        match c.to_ascii_uppercase() {
            'T' => Ok(Self::T),
            'C' => Ok(Self::C),
            'A' => Ok(Self::A),
            'G' => Ok(Self::G),
            from => Err(BaseDecodeError::InvalidBaseChar { from }),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum BaseDecodeError {
    #[error("invalid DNA base: {from}")]
    InvalidBaseChar { from: char },
}

pub type Codon = [Base; CODON_LEN];

/// Which compass direction, 45° increments, clockwise from North.
///
/// `original_source/src/core/headers.hpp`'s `DIRECTION` enum fixes this
/// ordering (`Stop` is not on the compass and sorts first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Direction {
    Stop,
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}
impl Direction {
    /// 45°-step distance between two directions on the compass (0 for `Stop`
    /// on either side), used by trivector coherence (spec §4.2).
    pub fn step_distance(self, other: Self) -> Option<u8> {
        if self == Self::Stop || other == Self::Stop {
            return None;
        }
        let a = self as i32 - 1;
        let b = other as i32 - 1;
        let diff = (a - b).rem_euclid(8);
        Some(diff.min(8 - diff) as u8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Magnitude {
    Short,
    Medium,
    Long,
}

/// One of the 21 acids in the closed set: `Stop`, plus the four major axes
/// (short/medium/long) and four diagonal axes (short/medium only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Acid {
    Stop,
    Cardinal(Direction, Magnitude),
    Diagonal(Direction, Magnitude),
}
impl Acid {
    pub const ALL: [Acid; 21] = [
        Acid::Stop,
        Acid::Cardinal(Direction::North, Magnitude::Short),
        Acid::Cardinal(Direction::North, Magnitude::Medium),
        Acid::Cardinal(Direction::North, Magnitude::Long),
        Acid::Diagonal(Direction::NorthEast, Magnitude::Short),
        Acid::Diagonal(Direction::NorthEast, Magnitude::Medium),
        Acid::Cardinal(Direction::East, Magnitude::Short),
        Acid::Cardinal(Direction::East, Magnitude::Medium),
        Acid::Cardinal(Direction::East, Magnitude::Long),
        Acid::Diagonal(Direction::SouthEast, Magnitude::Short),
        Acid::Diagonal(Direction::SouthEast, Magnitude::Medium),
        Acid::Cardinal(Direction::South, Magnitude::Short),
        Acid::Cardinal(Direction::South, Magnitude::Medium),
        Acid::Cardinal(Direction::South, Magnitude::Long),
        Acid::Diagonal(Direction::SouthWest, Magnitude::Short),
        Acid::Diagonal(Direction::SouthWest, Magnitude::Medium),
        Acid::Cardinal(Direction::West, Magnitude::Short),
        Acid::Cardinal(Direction::West, Magnitude::Medium),
        Acid::Cardinal(Direction::West, Magnitude::Long),
        Acid::Diagonal(Direction::NorthWest, Magnitude::Short),
        Acid::Diagonal(Direction::NorthWest, Magnitude::Medium),
    ];

    pub fn direction(self) -> Direction {
        match self {
            Acid::Stop => Direction::Stop,
            Acid::Cardinal(d, _) | Acid::Diagonal(d, _) => d,
        }
    }
    pub fn is_stop(self) -> bool {
        matches!(self, Acid::Stop)
    }

    /// Vector length, per spec §3 / SPEC_FULL.md §B:
    /// cardinal `{1, sqrt(e), e}`, diagonal `{sqrt(1/2), 1.1658...}`.
    pub fn length(self) -> f64 {
        const MEDIUM_CARDINAL: f64 = 1.648_721_270_700_128; // e^0.5
        const MEDIUM_DIAGONAL: f64 = 1.165_821_990_798_562;
        match self {
            Acid::Stop => 0.0,
            Acid::Cardinal(_, Magnitude::Short) => 1.0,
            Acid::Cardinal(_, Magnitude::Medium) => MEDIUM_CARDINAL,
            Acid::Cardinal(_, Magnitude::Long) => E,
            Acid::Diagonal(_, Magnitude::Short) => FRAC_1_SQRT_2,
            Acid::Diagonal(_, Magnitude::Medium) => MEDIUM_DIAGONAL,
            Acid::Diagonal(_, Magnitude::Long) => unreachable!("diagonals have no long magnitude"),
        }
    }

    /// Unit direction vector (length 1), before scaling by [`Acid::length`].
    fn unit_vector(self) -> (f64, f64) {
        match self.direction() {
            Direction::Stop => (0.0, 0.0),
            Direction::North => (0.0, 1.0),
            Direction::NorthEast => (FRAC_1_SQRT_2, FRAC_1_SQRT_2),
            Direction::East => (1.0, 0.0),
            Direction::SouthEast => (FRAC_1_SQRT_2, -FRAC_1_SQRT_2),
            Direction::South => (0.0, -1.0),
            Direction::SouthWest => (-FRAC_1_SQRT_2, -FRAC_1_SQRT_2),
            Direction::West => (-1.0, 0.0),
            Direction::NorthWest => (-FRAC_1_SQRT_2, FRAC_1_SQRT_2),
        }
    }

    /// The displacement this acid contributes to a pen trace.
    pub fn vector(self) -> (Unit, Unit) {
        let (ux, uy) = self.unit_vector();
        let len = self.length();
        (Unit::new(ux * len), Unit::new(uy * len))
    }
    pub fn apply(self, from: Point) -> Point {
        let (dx, dy) = self.vector();
        from.translate(dx, dy)
    }
}

/// Mutable-at-load codon→acid table (spec §3, §9 "codon table mutability").
#[derive(Debug, Clone)]
pub struct CodonTable {
    map: HashMap<Codon, Acid>,
}
impl CodonTable {
    pub fn standard() -> Self {
        Self {
            map: STANDARD_TABLE.iter().copied().collect(),
        }
    }
    pub fn get(&self, codon: Codon) -> Acid {
        self.map[&codon]
    }
    /// Override a single entry (from a genome's `codonTable/entry`), per spec §6.
    pub fn set(&mut self, codon: Codon, acid: Acid) {
        self.map.insert(codon, acid);
    }
    /// Every [`Acid`] variant must appear at least once (spec §3 invariant).
    pub fn covers_every_acid(&self) -> bool {
        Acid::ALL.iter().all(|a| self.map.values().any(|v| v == a))
    }
}
impl Default for CodonTable {
    fn default() -> Self {
        Self::standard()
    }
}

fn codon(s: &str) -> Codon {
    let bytes = s.as_bytes();
    [
        Base::try_from(bytes[0] as char).unwrap(),
        Base::try_from(bytes[1] as char).unwrap(),
        Base::try_from(bytes[2] as char).unwrap(),
    ]
}

/// The canonical codon→acid table, reproduced from
/// `original_source/src/core/genome.cpp`'s `CodonTable::s_mapCodonToType`
/// (SPEC_FULL.md §B). `ATG`/`TAA`/`TAG`/`TGA` map to ordinary acids here —
/// start/stop identity is a property of gene position, not the table.
static STANDARD_TABLE: std::sync::LazyLock<Vec<(Codon, Acid)>> = std::sync::LazyLock::new(|| {
    use Acid::*;
    use Direction::*;
    use Magnitude::*;

    let rows: &[(&str, Acid)] = &[
        ("TTT", Cardinal(North, Long)),
        ("TTC", Cardinal(North, Long)),
        ("TTA", Cardinal(North, Medium)),
        ("TTG", Cardinal(North, Medium)),
        ("TCT", Diagonal(SouthEast, Medium)),
        ("TCC", Diagonal(SouthEast, Medium)),
        ("TCA", Diagonal(SouthEast, Medium)),
        ("TCG", Diagonal(SouthEast, Medium)),
        ("TAT", Cardinal(South, Long)),
        ("TAC", Cardinal(South, Long)),
        ("TAA", Stop),
        ("TAG", Stop),
        ("TGT", Diagonal(NorthWest, Medium)),
        ("TGC", Diagonal(NorthWest, Medium)),
        ("TGA", Stop),
        ("TGG", Diagonal(NorthWest, Medium)),
        ("CTT", Cardinal(North, Short)),
        ("CTC", Cardinal(North, Short)),
        ("CTA", Cardinal(North, Short)),
        ("CTG", Cardinal(North, Short)),
        ("CCT", Diagonal(SouthEast, Short)),
        ("CCC", Diagonal(SouthEast, Short)),
        ("CCA", Diagonal(SouthEast, Short)),
        ("CCG", Diagonal(SouthEast, Short)),
        ("CAT", Cardinal(South, Medium)),
        ("CAC", Cardinal(South, Medium)),
        ("CAA", Cardinal(South, Short)),
        ("CAG", Cardinal(South, Short)),
        ("CGT", Diagonal(NorthWest, Short)),
        ("CGC", Diagonal(NorthWest, Short)),
        ("CGA", Diagonal(NorthWest, Short)),
        ("CGG", Diagonal(NorthWest, Short)),
        ("ATT", Diagonal(NorthEast, Medium)),
        ("ATC", Diagonal(NorthEast, Medium)),
        ("ATA", Diagonal(NorthEast, Medium)),
        ("ATG", Diagonal(NorthEast, Medium)),
        ("ACT", Cardinal(East, Long)),
        ("ACC", Cardinal(East, Long)),
        ("ACA", Cardinal(East, Medium)),
        ("ACG", Cardinal(East, Medium)),
        ("AAT", Diagonal(SouthWest, Medium)),
        ("AAC", Diagonal(SouthWest, Medium)),
        ("AAA", Diagonal(SouthWest, Medium)),
        ("AAG", Diagonal(SouthWest, Medium)),
        ("AGT", Cardinal(West, Long)),
        ("AGC", Cardinal(West, Long)),
        ("AGA", Cardinal(West, Medium)),
        ("AGG", Cardinal(West, Medium)),
        ("GTT", Diagonal(NorthEast, Short)),
        ("GTC", Diagonal(NorthEast, Short)),
        ("GTA", Diagonal(NorthEast, Short)),
        ("GTG", Diagonal(NorthEast, Short)),
        ("GCT", Cardinal(East, Short)),
        ("GCC", Cardinal(East, Short)),
        ("GCA", Cardinal(East, Short)),
        ("GCG", Cardinal(East, Short)),
        ("GAT", Diagonal(SouthWest, Short)),
        ("GAC", Diagonal(SouthWest, Short)),
        ("GAA", Diagonal(SouthWest, Short)),
        ("GAG", Diagonal(SouthWest, Short)),
        ("GGT", Cardinal(West, Short)),
        ("GGC", Cardinal(West, Short)),
        ("GGA", Cardinal(West, Short)),
        ("GGG", Cardinal(West, Short)),
    ];
    assert_eq!(rows.len(), 64);
    rows.iter().map(|(s, a)| (codon(s), *a)).collect()
});

/// The three canonical start codons and three canonical stop codons.
pub const START_CODONS: [&str; 1] = ["ATG"];
pub const STOP_CODONS: [&str; 3] = ["TAA", "TAG", "TGA"];

pub fn is_start_codon(c: Codon) -> bool {
    START_CODONS.iter().any(|s| codon(s) == c)
}
pub fn is_stop_codon(c: Codon) -> bool {
    STOP_CODONS.iter().any(|s| codon(s) == c)
}

impl FromStr for Base {
    type Err = BaseDecodeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let c = chars.next().ok_or(BaseDecodeError::InvalidBaseChar { from: '\0' })?;
        if chars.next().is_some() {
            return Err(BaseDecodeError::InvalidBaseChar { from: c });
        }
        Base::try_from(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_table_has_64_entries_and_covers_every_acid() {
        let table = CodonTable::standard();
        assert_eq!(table.map.len(), 64);
        assert!(table.covers_every_acid());
    }

    #[test]
    fn start_stop_codons_are_fixed() {
        assert!(is_start_codon(codon("ATG")));
        assert!(is_stop_codon(codon("TAA")));
        assert!(is_stop_codon(codon("TAG")));
        assert!(is_stop_codon(codon("TGA")));
        assert!(!is_stop_codon(codon("ATG")));
    }

    #[test]
    fn transversion_swaps_purine_pyrimidine() {
        assert_eq!(Base::A.transversion(), Base::C);
        assert_eq!(Base::G.transversion(), Base::T);
        assert_eq!(Base::A.transition(), Base::G);
    }

    #[test]
    fn override_replaces_single_entry() {
        let mut table = CodonTable::standard();
        let before = table.get(codon("TTT"));
        table.set(codon("TTT"), Acid::Stop);
        assert_ne!(table.get(codon("TTT")), before);
        assert_eq!(table.get(codon("TTT")), Acid::Stop);
    }

    #[test]
    fn coherent_step_distance() {
        assert_eq!(Direction::North.step_distance(Direction::NorthEast), Some(1));
        assert_eq!(Direction::North.step_distance(Direction::South), Some(4));
        assert_eq!(Direction::North.step_distance(Direction::North), Some(0));
    }

    #[test]
    fn base_slice_displays_as_text() {
        let bases = [Base::A, Base::T, Base::G, Base::C];
        assert_eq!(BaseSlice::ref_cast(&bases).to_string(), "ATGC");
    }
}
