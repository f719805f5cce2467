//! End-to-end tests for the analysis engine over real data directories.

use approx::assert_relative_eq;
use compendium::data::MemorySource;
use compendium::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const SAMPLES_TSV: &str = "id\tstudy_id\tsample_name\tcollection_date\tph\tecosystem\tlatitude\tlongitude\n\
s1\tst1\tSoil core 1\t2021-04-01\t6.0\tSoil\t45.0\t-120.0\n\
s2\tst1\tSoil core 2\t2021-04-02\t6.5\tSoil\t45.1\t-120.1\n\
s3\tst1\tSoil core 3\t\t7.0\tSoil\t\t\n\
c1\tst2\tCreek 1\t2020-06-10\t6.8\tWater\t40.0\t-100.0\n\
c2\tst2\tCreek 2\t2020-06-11\t7.2\tWater\t40.1\t-100.1\n\
c3\tst3\tLake 1\t2019-09-20\t8.0\tWater\t30.0\t-90.0\n";

const METABOLOMICS_TSV: &str = "sample_id\tcompound_name\tpeak_area\tmolecular_formula\tcommon_name\n\
s1\tGlucose\t8.0\tC6H12O6\tD-glucose\n\
s2\tGlucose\t10.0\tC6H12O6\tD-glucose\n\
s3\tGlucose\t12.0\tC6H12O6\tD-glucose\n\
s1\tLactate\t2.0\tC3H6O3\t\n\
s2\tLactate\t3.0\tC3H6O3\t\n\
c1\tGlucose\t3.0\tC6H12O6\tD-glucose\n\
c2\tGlucose\t4.0\tC6H12O6\tD-glucose\n\
c3\tGlucose\t5.0\tC6H12O6\tD-glucose\n";

const KRAKEN_TSV: &str = "sample_id\tname\trank\tabundance\n\
s1\tFirmicutes\tphylum\t0.6\n\
s2\tFirmicutes\tphylum\t0.4\n\
s3\tFirmicutes\tphylum\t0.5\n\
s1\tBacillus subtilis\tspecies\t0.2\n\
c1\tFirmicutes\tphylum\t0.1\n\
c2\tProteobacteria\tphylum\t0.9\n";

fn write_data_dir(dir: &Path) {
    fs::write(dir.join("samples.tsv"), SAMPLES_TSV).unwrap();
    fs::write(dir.join("metabolomics.tsv"), METABOLOMICS_TSV).unwrap();
    fs::write(dir.join("kraken.tsv"), KRAKEN_TSV).unwrap();
}

fn config(cache_dir: &Path) -> EngineConfig {
    let _ = env_logger::builder().is_test(true).try_init();
    EngineConfig {
        physical_variables: vec!["ph".to_string()],
        ..EngineConfig::new(cache_dir)
    }
}

fn memory_engine(cache_dir: &Path) -> (MemorySource, Compendium) {
    let source = MemorySource::new()
        .with_table(TableKind::Samples, SAMPLES_TSV)
        .with_table(
            TableKind::Omics(OmicsCategory::Metabolomics),
            METABOLOMICS_TSV,
        )
        .with_table(TableKind::Taxonomic(TaxonomicTool::Kraken), KRAKEN_TSV);
    source.set_modified(100.0);
    let engine = Compendium::new(Box::new(source.clone()), config(cache_dir)).unwrap();
    (source, engine)
}

#[test]
fn test_study_analysis_end_to_end() {
    let data = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write_data_dir(data.path());

    let engine = Compendium::new(
        Box::new(DirSource::new(data.path())),
        config(cache.path()),
    )
    .unwrap();

    let study = engine.study_analysis("st1").unwrap();
    assert_eq!(study.study_id, "st1");
    assert_eq!(study.sample_count, 3);

    // ph: study [6.0, 6.5, 7.0] vs per-study means [7.0, 8.0].
    let ph = study.physical.get("ph").unwrap().as_ok().unwrap();
    assert_relative_eq!(ph.study.mean, 6.5, epsilon = 1e-12);
    assert_relative_eq!(ph.study.std, 0.5, epsilon = 1e-12);
    assert_relative_eq!(ph.compendium_mean, 7.5, epsilon = 1e-12);
    assert_relative_eq!(
        ph.compendium_std,
        std::f64::consts::FRAC_1_SQRT_2,
        epsilon = 1e-12
    );
    assert_eq!(ph.compendium_study_count, 2);
    assert!(ph.effect_size < 0.0);
    assert!((0.0..=1.0).contains(&ph.p_value));

    // Metabolomics top10: Glucose (mean 10) above Lactate (mean 2.5).
    let top10 = study.omics.top10.get(&OmicsCategory::Metabolomics).unwrap();
    assert_eq!(top10.len(), 2);
    assert_eq!(top10[0].id, "Glucose");
    assert_relative_eq!(top10[0].mean_abundance, 10.0, epsilon = 1e-12);
    assert_relative_eq!(top10[0].std_abundance, 2.0, epsilon = 1e-12);
    assert_eq!(top10[0].sample_count, 3);

    // Kraken phylum top10 for the study.
    let kraken = study.taxonomic.top10.get(&TaxonomicTool::Kraken).unwrap();
    let phyla = kraken.get(&Rank::Phylum).unwrap();
    assert_eq!(phyla[0].id, "Firmicutes");
    assert_relative_eq!(phyla[0].mean_abundance, 0.5, epsilon = 1e-12);

    // Ecosystem and map blocks are populated.
    assert_eq!(
        study.ecosystem.most_common.get("ecosystem").map(String::as_str),
        Some("Soil")
    );
    assert_eq!(study.map_data.locations.len(), 2);

    // The study entry landed in the durable cache.
    assert!(cache.path().join("study/st1.json").exists());
}

#[test]
fn test_sample_analysis_end_to_end() {
    let data = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write_data_dir(data.path());

    let engine = Compendium::new(
        Box::new(DirSource::new(data.path())),
        config(cache.path()),
    )
    .unwrap();

    // No prior study request: the engine computes the study first.
    let sample = engine.sample_analysis("s3").unwrap();
    assert_eq!(sample.study_id, "st1");
    assert_eq!(sample.name.as_deref(), Some("Soil core 3"));

    let ph = sample.physical.get("ph").unwrap();
    assert_relative_eq!(ph.value, 7.0, epsilon = 1e-12);
    assert_relative_eq!(ph.z_score, 1.0, epsilon = 1e-12);

    // Glucose study stats (mean 10, std 2); s3 observed 12 -> z = 1.
    let metabolites = sample.omics.get(&OmicsCategory::Metabolomics).unwrap();
    let glucose = metabolites.iter().find(|e| e.id == "Glucose").unwrap();
    assert_relative_eq!(glucose.abundance, 12.0, epsilon = 1e-12);
    assert_relative_eq!(glucose.z_score, 1.0, epsilon = 1e-12);

    // s3 never saw Lactate: abundance 0 with a z-score against study stats.
    let lactate = metabolites.iter().find(|e| e.id == "Lactate").unwrap();
    assert_relative_eq!(lactate.abundance, 0.0, epsilon = 1e-12);

    // Both cache layers are populated.
    assert!(cache.path().join("study/st1.json").exists());
    assert!(cache.path().join("sample/s3.json").exists());
}

#[test]
fn test_not_found_conditions() {
    let data = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write_data_dir(data.path());

    let engine = Compendium::new(
        Box::new(DirSource::new(data.path())),
        config(cache.path()),
    )
    .unwrap();

    // A study with zero samples is fatal, not a silent empty result.
    assert!(matches!(
        engine.study_analysis("st-empty"),
        Err(CompendiumError::StudyNotFound(_))
    ));
    assert!(matches!(
        engine.sample_analysis("nope"),
        Err(CompendiumError::SampleNotFound(_))
    ));
}

#[test]
fn test_cache_served_across_engines() {
    let data = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    write_data_dir(data.path());

    let first = Compendium::new(
        Box::new(DirSource::new(data.path())),
        config(cache.path()),
    )
    .unwrap();
    let original = first.study_analysis("st1").unwrap();

    // A fresh engine over the same cache dir serves the durable entry.
    let second = Compendium::new(
        Box::new(DirSource::new(data.path())),
        config(cache.path()),
    )
    .unwrap();
    let reloaded = second.study_analysis("st1").unwrap();
    assert_eq!(original, reloaded);
}

#[test]
fn test_repeated_requests_are_stable() {
    let cache = TempDir::new().unwrap();
    let (_source, engine) = memory_engine(cache.path());

    let first = engine.study_analysis("st1").unwrap();
    let second = engine.study_analysis("st1").unwrap();
    assert_eq!(first, second);

    let sample_first = engine.sample_analysis("s1").unwrap();
    let sample_second = engine.sample_analysis("s1").unwrap();
    assert_eq!(sample_first, sample_second);
}

#[test]
fn test_invalidation_on_source_change() {
    let cache = TempDir::new().unwrap();
    let (source, engine) = memory_engine(cache.path());

    let before = engine.study_analysis("st1").unwrap();
    let ph = before.physical.get("ph").unwrap().as_ok().unwrap();
    assert_relative_eq!(ph.study.mean, 6.5, epsilon = 1e-12);

    // Rewrite the samples table and advance the freshness clock.
    source.set_table(
        TableKind::Samples,
        "id\tstudy_id\tph\n\
         s1\tst1\t5.0\n\
         s2\tst1\t5.5\n\
         c1\tst2\t7.0\n\
         c3\tst3\t8.0\n",
    );
    source.set_modified(200.0);

    let after = engine.study_analysis("st1").unwrap();
    let ph = after.physical.get("ph").unwrap().as_ok().unwrap();
    assert_relative_eq!(ph.study.mean, 5.25, epsilon = 1e-12);
    assert_eq!(after.sample_count, 2);
}

#[test]
fn test_sample_cache_follows_study_recompute() {
    let cache = TempDir::new().unwrap();
    let (source, engine) = memory_engine(cache.path());

    let before = engine.sample_analysis("s1").unwrap();
    assert_relative_eq!(
        before.physical.get("ph").unwrap().z_score,
        -1.0,
        epsilon = 1e-12
    );

    // Shift the study's ph distribution; the sample projection must follow.
    source.set_table(
        TableKind::Samples,
        "id\tstudy_id\tph\n\
         s1\tst1\t6.0\n\
         s2\tst1\t8.0\n\
         s3\tst1\t10.0\n\
         c1\tst2\t7.0\n\
         c3\tst3\t8.0\n",
    );
    source.set_modified(300.0);

    let after = engine.sample_analysis("s1").unwrap();
    let ph = after.physical.get("ph").unwrap();
    // New study stats: mean 8, std 2 -> z = (6 - 8) / 2 = -1 again, but the
    // underlying stats prove the recompute happened.
    assert_relative_eq!(ph.study_mean, 8.0, epsilon = 1e-12);
    assert_relative_eq!(ph.study_std, 2.0, epsilon = 1e-12);
    assert_relative_eq!(ph.z_score, -1.0, epsilon = 1e-12);
}

#[test]
fn test_missing_omics_tables_yield_empty_blocks() {
    let data = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    // Samples only: every omics/taxonomic table is absent.
    fs::write(data.path().join("samples.tsv"), SAMPLES_TSV).unwrap();

    let engine = Compendium::new(
        Box::new(DirSource::new(data.path())),
        config(cache.path()),
    )
    .unwrap();

    let study = engine.study_analysis("st1").unwrap();
    for category in OmicsCategory::all() {
        assert!(study.omics.top10.get(&category).unwrap().is_empty());
        assert!(study.omics.outliers.get(&category).unwrap().is_empty());
    }
    for tool in TaxonomicTool::all() {
        assert!(study.taxonomic.top10.get(&tool).unwrap().is_empty());
    }
    // Partial data is still a valid, cacheable result.
    assert!(cache.path().join("study/st1.json").exists());
}

#[test]
fn test_outlier_lists_sorted_and_significant() {
    let cache = TempDir::new().unwrap();

    // Give st1 a strongly shifted compound with enough samples for the
    // rank-sum test to reach significance.
    let mut samples = String::from("id\tstudy_id\tph\n");
    let mut metabolomics = String::from("sample_id\tcompound_name\tpeak_area\n");
    for i in 0..12 {
        samples.push_str(&format!("s{i}\tst1\t6.{i}\n"));
        metabolomics.push_str(&format!("s{i}\tOsmolyte X\t{}\n", 100.0 + i as f64));
        metabolomics.push_str(&format!("s{i}\tBackground\t{}\n", 5.0 + (i % 3) as f64));
    }
    for i in 0..12 {
        let study = if i < 6 { "st2" } else { "st3" };
        samples.push_str(&format!("c{i}\t{study}\t7.{i}\n"));
        metabolomics.push_str(&format!("c{i}\tOsmolyte X\t{}\n", 1.0 + i as f64));
        metabolomics.push_str(&format!("c{i}\tBackground\t{}\n", 5.0 + (i % 3) as f64));
    }

    let source = MemorySource::new()
        .with_table(TableKind::Samples, &samples)
        .with_table(TableKind::Omics(OmicsCategory::Metabolomics), &metabolomics);
    source.set_modified(10.0);

    let engine = Compendium::new(Box::new(source), config(cache.path())).unwrap();
    let study = engine.study_analysis("st1").unwrap();

    let outliers = study.omics.outliers.get(&OmicsCategory::Metabolomics).unwrap();
    assert!(!outliers.is_empty());
    assert_eq!(outliers[0].id, "Osmolyte X");
    assert_eq!(outliers[0].direction, Direction::Higher);
    for outlier in outliers {
        assert!(outlier.p_value < 0.05);
    }
    for pair in outliers.windows(2) {
        assert!(pair[0].effect_size.abs() >= pair[1].effect_size.abs());
    }

    // Top-10 invariants: bounded length, descending means.
    let top10 = study.omics.top10.get(&OmicsCategory::Metabolomics).unwrap();
    assert!(top10.len() <= 10);
    for pair in top10.windows(2) {
        assert!(pair[0].mean_abundance >= pair[1].mean_abundance);
    }
}
