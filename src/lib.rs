//! Study-vs-Compendium Statistical Comparison Engine
//!
//! This library ingests per-sample scientific measurements (physical
//! variables, chemical-abundance profiles, and hierarchical
//! taxonomic-abundance profiles) grouped into studies, and compares each
//! study against the rest of the collection — the *compendium*.
//!
//! # Overview
//!
//! The library is organized into composable modules:
//!
//! - **data**: Tabular access, sample records, abundance records
//! - **stats**: Descriptive statistics, rank-sum significance, effect size
//! - **analysis**: Top-K ranking, outlier detection, study/sample orchestration
//! - **cache**: Two-tier durable cache keyed by entity id and source freshness
//! - **engine**: The `Compendium` facade tying source, analysis, and cache
//! - **config**: Engine configuration (variables, thresholds, baseline mode)
//!
//! # Example
//!
//! ```no_run
//! use compendium::prelude::*;
//!
//! let source = DirSource::new("data");
//! let config = EngineConfig::new("analysis_cache");
//! let engine = Compendium::new(Box::new(source), config).unwrap();
//!
//! // Cached after the first computation, invalidated when source files change.
//! let study = engine.study_analysis("sty-11-abc").unwrap();
//! let sample = engine.sample_analysis("bsm-11-xyz").unwrap();
//! println!("{} outlier screens, {} sample slots",
//!     study.omics.outliers.len(), sample.physical.len());
//! ```

pub mod analysis;
pub mod cache;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod stats;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::analysis::{
        compute_sample_analysis, compute_study_analysis, detect_outliers,
        top_by_mean_abundance, Direction, EcosystemSummary, EntityComparison, MapData,
        RankedEntity, SampleAnalysis, SampleEntity, SampleVariable, StudyAnalysis,
        VariableComparison, VariableSlot, TOP_K,
    };
    pub use crate::cache::{AnalysisCache, CacheEntry};
    pub use crate::config::{CompendiumBaseline, EngineConfig};
    pub use crate::data::{
        AbundanceRecord, DirSource, EntityMetadata, OmicsCategory, Rank, Sample, SampleTable,
        Table, TableKind, TableSource, TaxonomicTool,
    };
    pub use crate::engine::Compendium;
    pub use crate::error::{CompendiumError, Result};
    pub use crate::stats::{
        cliffs_delta, describe, mann_whitney_u, DescriptiveStats, Histogram, RankSumTest,
    };
}
