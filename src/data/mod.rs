//! Data structures for samples, abundance records, and tabular access.

pub mod abundance;
pub mod sample;
pub mod table;

pub use abundance::{AbundanceRecord, EntityMetadata, OmicsCategory, Rank, TaxonomicTool};
pub use sample::{Sample, SampleTable, ECOSYSTEM_LABELS};
pub use table::{DirSource, MemorySource, Table, TableKind, TableSource, Value};
