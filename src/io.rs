//! Reader/writer interfaces for the documents the engine consumes and emits.
//!
//! XML parsing, schema validation, and HTTP fetching are external
//! collaborators; this module fixes the shape the core is written against so
//! an embedding application can plug in whatever document layer it has.

use crate::{
    acid::CodonTable,
    error::StylusResult,
    genome::Genome,
    han::HanRef,
};

/// Parses a `genome` document into a loaded [`Genome`] (spec §6 "Genome
/// XML"). Base indices in the document are 1-based; the returned genome's
/// indices are 0-based.
pub trait GenomeReader {
    fn read_genome(&mut self, source: &str) -> StylusResult<Genome>;
    fn read_codon_table(&mut self, source: &str) -> StylusResult<CodonTable>;
}

/// A serialization detail mask for [`GenomeWriter::write_genome`] (spec §6
/// "getGenome | detail mask | Serialize").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailMask {
    /// Bases and gene ranges only.
    Minimal,
    /// Minimal plus strokes, groups, and scores.
    Scored,
    /// Every field, sufficient for a byte-identical round trip.
    All,
}

pub trait GenomeWriter {
    fn write_genome(&mut self, genome: &Genome, detail: DetailMask) -> StylusResult<String>;
}

/// Parses a `hanDefinition` document (spec §6 "Han XML").
pub trait HanReader {
    fn read_han(&mut self, source: &str) -> StylusResult<HanRef>;
}

/// Emits one trial snapshot for disk persistence or streaming to a caller
/// (spec §1 "the core ... emits trial snapshots through opaque reader/writer
/// interfaces").
pub trait SnapshotWriter {
    fn write_snapshot(&mut self, genome: &Genome, trial: u64) -> StylusResult<()>;
}
