//! The `Compendium` facade: cache-aware study and sample analysis.
//!
//! Each request checks the source freshness oracle once, drops the in-memory
//! cache layers when any source table has advanced, and then serves from
//! cache or computes under a per-entity lock. The lock makes concurrent
//! misses for the same entity compute once (single-flight) instead of racing
//! to the same cache file.

use crate::analysis::sample::compute_sample_analysis;
use crate::analysis::study::compute_study_analysis;
use crate::analysis::{SampleAnalysis, StudyAnalysis};
use crate::cache::AnalysisCache;
use crate::config::EngineConfig;
use crate::data::{SampleTable, TableKind, TableSource};
use crate::error::{CompendiumError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Study-vs-compendium analysis engine with layered caching.
pub struct Compendium {
    source: Box<dyn TableSource>,
    config: EngineConfig,
    study_cache: AnalysisCache<StudyAnalysis>,
    sample_cache: AnalysisCache<SampleAnalysis>,
    /// Freshness observed at the last source check.
    last_check: Mutex<f64>,
    /// Per-entity computation locks.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Compendium {
    /// Create an engine over a tabular source, with caches rooted under
    /// `config.cache_dir`.
    pub fn new(source: Box<dyn TableSource>, config: EngineConfig) -> Result<Self> {
        let study_cache = AnalysisCache::new(config.cache_dir.join("study"))?;
        let sample_cache = AnalysisCache::new(config.cache_dir.join("sample"))?;
        Ok(Self {
            source,
            config,
            study_cache,
            sample_cache,
            last_check: Mutex::new(0.0),
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Drop both in-memory cache layers; durable entries are re-judged by
    /// freshness on the next read.
    pub fn invalidate_all(&self) {
        self.study_cache.invalidate_all();
        self.sample_cache.invalidate_all();
    }

    /// Analysis for one study, served from cache when fresh.
    ///
    /// A study with no samples is `StudyNotFound`.
    pub fn study_analysis(&self, study_id: &str) -> Result<StudyAnalysis> {
        let fresh = self.check_source_freshness()?;
        if let Some(analysis) = self.study_cache.get(study_id, fresh) {
            log::debug!("using cached analysis for study {study_id}");
            return Ok(analysis);
        }

        let lock = self.entity_lock(&format!("study/{study_id}"));
        let _guard = lock.lock().expect("entity lock poisoned");

        // A concurrent request may have computed while this one waited.
        if let Some(analysis) = self.study_cache.get(study_id, fresh) {
            return Ok(analysis);
        }

        let samples = self.load_samples()?;
        let analysis = compute_study_analysis(self.source.as_ref(), &samples, study_id, &self.config)?;
        self.study_cache.put(study_id, analysis.clone(), fresh)?;
        Ok(analysis)
    }

    /// Analysis for one sample, served from cache when fresh.
    ///
    /// Ensures the owning study's analysis first; the sample entry is valid
    /// only while it is at least as fresh as both the source tables and the
    /// study's current cache entry.
    pub fn sample_analysis(&self, sample_id: &str) -> Result<SampleAnalysis> {
        let fresh = self.check_source_freshness()?;
        let samples = self.load_samples()?;
        let sample = samples
            .get(sample_id)
            .ok_or_else(|| CompendiumError::SampleNotFound(sample_id.to_string()))?;
        let study_id = sample.study_id.clone();

        let study = self.study_analysis(&study_id)?;
        // Layered validity: the sample entry must be at least as fresh as the
        // owning study's current entry.
        let study_fresh = self.study_cache.freshness(&study_id).unwrap_or(fresh);
        let min_fresh = fresh.max(study_fresh);

        if let Some(analysis) = self.sample_cache.get(sample_id, min_fresh) {
            log::debug!("using cached analysis for sample {sample_id}");
            return Ok(analysis);
        }

        let lock = self.entity_lock(&format!("sample/{sample_id}"));
        let _guard = lock.lock().expect("entity lock poisoned");

        if let Some(analysis) = self.sample_cache.get(sample_id, min_fresh) {
            return Ok(analysis);
        }

        let analysis = compute_sample_analysis(self.source.as_ref(), sample, &study)?;
        self.sample_cache.put(sample_id, analysis.clone(), min_fresh)?;
        Ok(analysis)
    }

    fn load_samples(&self) -> Result<SampleTable> {
        let table = self.source.load(TableKind::Samples)?;
        SampleTable::from_table(&table, &self.config.physical_variables)
    }

    /// Query the freshness oracle, clearing in-memory caches when any source
    /// table has advanced past the last recorded check.
    fn check_source_freshness(&self) -> Result<f64> {
        let fresh = self.source.max_modification_time(&TableKind::all())?;
        let mut last = self.last_check.lock().expect("freshness lock poisoned");
        if fresh > *last {
            if *last > 0.0 {
                log::info!("source data changed, clearing in-memory caches");
                self.study_cache.invalidate_all();
                self.sample_cache.invalidate_all();
            }
            *last = fresh;
        }
        Ok(fresh)
    }

    fn entity_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().expect("lock table poisoned");
        locks.entry(key.to_string()).or_default().clone()
    }
}
