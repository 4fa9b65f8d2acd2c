//! Input list expansion and glob-driven runs.

use ingestbeam::io::glob::{expand_glob, is_pattern};
use ingestbeam::testing::*;
use ingestbeam::*;
use std::fs::create_dir_all;
use tempfile::TempDir;

#[test]
fn pattern_detection() {
    assert!(is_pattern("data/*.csv"));
    assert!(is_pattern("data/2010_?.csv"));
    assert!(is_pattern("data/201[0-3].csv"));
    assert!(!is_pattern("data/2010.csv"));
}

#[test]
fn glob_matches_are_sorted_and_skip_directories() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let base = dir.path();
    for name in ["c.csv", "a.csv", "b.csv", "notes.txt"] {
        std::fs::write(base.join(name), "x\n")?;
    }
    create_dir_all(base.join("d.csv"))?;

    let found = expand_glob(&format!("{}/*.csv", base.display()))?;
    let names: Vec<_> = found
        .iter()
        .filter_map(|p| p.file_name()?.to_str().map(str::to_owned))
        .collect();
    assert_eq!(names, vec!["a.csv", "b.csv", "c.csv"]);
    Ok(())
}

#[test]
fn entries_keep_configured_order() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let base = dir.path();
    create_dir_all(base.join("2011"))?;
    for name in ["2011/b.csv", "2011/a.csv", "z.csv"] {
        std::fs::write(base.join(name), "x\n")?;
    }

    let entries = vec![
        base.join("z.csv").display().to_string(),
        format!("{}/2011/*.csv", base.display()),
        base.join("later.csv").display().to_string(),
    ];
    let files = expand_inputs(&entries)?;
    assert_eq!(
        files,
        vec![
            base.join("z.csv"),
            base.join("2011/a.csv"),
            base.join("2011/b.csv"),
            base.join("later.csv"),
        ]
    );
    Ok(())
}

#[test]
fn pattern_without_matches_is_an_error() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let err = expand_inputs(&[format!("{}/*.csv", dir.path().display())]).unwrap_err();
    assert!(err.to_string().contains("no files found"));
    assert!(expand_inputs(&["data/[.csv"]).is_err());
    Ok(())
}

#[test]
fn config_inputs_drive_a_run() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    mock_csv_file(&dir, "2010_b.csv", &sample_accidents(10, 2), CsvFormat::default())?;
    mock_csv_file(&dir, "2010_a.csv", &sample_accidents(0, 3), CsvFormat::default())?;
    let output = dir.file_path("out/all.csv");

    let config = RunConfig::from_toml(&format!(
        "inputs = [{:?}]\noutput = {:?}\nbatch_size = 2\nqueue_capacity = 1\n",
        format!("{}/2010_*.csv", dir.path().display()),
        output.display().to_string(),
    ))?;
    config.validate()?;

    let pipeline = Pipeline::new(
        EnrichStage::with_threads(AccidentEnricher::default(), config.enrich_threads)?,
        config.pipeline_options(),
    )?;
    let files = config.resolve_inputs()?;
    let format = config.csv_format();
    let report = pipeline.run_csv(&files, &config.output, format, format)?;
    assert_eq!(report.total_records, 5);

    let written: Vec<RoadAccidentDetails> = read_csv_output(&output)?;
    let ids: Vec<String> = written.into_iter().map(|d| d.accident_id).collect();
    let expected: Vec<String> = sample_accidents(0, 3)
        .into_iter()
        .chain(sample_accidents(10, 2))
        .map(|a| a.accident_id)
        .collect();
    assert_eq!(ids, expected);
    Ok(())
}
