//! End-to-end runs over delimited files on disk.

use ingestbeam::testing::*;
use ingestbeam::*;
use std::fs;
use std::io::Write;

fn pipeline(
    batch_size: usize,
    queue_capacity: usize,
) -> anyhow::Result<Pipeline<AccidentEnricher>> {
    Ok(Pipeline::new(
        EnrichStage::new(AccidentEnricher::default()),
        PipelineOptions {
            batch_size,
            queue_capacity,
        },
    )?)
}

fn ids_of(details: &[RoadAccidentDetails]) -> Vec<String> {
    details.iter().map(|d| d.accident_id.clone()).collect()
}

#[test]
fn two_files_consolidate_in_order_with_one_header() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let first = mock_csv_file(&dir, "2010.csv", &sample_accidents(0, 5), CsvFormat::default())?;
    let second = mock_csv_file(&dir, "2011.csv", &sample_accidents(100, 3), CsvFormat::default())?;
    let output = dir.file_path("out/consolidated.csv");

    let report = pipeline(2, 1)?.run_csv(
        &[first.clone(), second.clone()],
        &output,
        CsvFormat::default(),
        CsvFormat::default(),
    )?;

    assert_eq!(report.total_records, 8);
    assert_eq!(report.files.len(), 2);
    assert_eq!(report.files[0].path, first);
    assert_eq!(report.files[0].batches, 3);
    assert_eq!(report.files[1].records_written, 3);

    let text = fs::read_to_string(&output)?;
    assert_eq!(text.matches("Accident_Index").count(), 1);
    assert!(text.starts_with("Accident_Index,"));
    assert!(text.lines().next().is_some_and(|h| h.ends_with("Police_Force_Name")));

    let written: Vec<RoadAccidentDetails> = read_csv_output(&output)?;
    let expected: Vec<String> = sample_accidents(0, 5)
        .into_iter()
        .chain(sample_accidents(100, 3))
        .map(|a| a.accident_id)
        .collect();
    assert_eq!(ids_of(&written), expected);
    Ok(())
}

#[test]
fn json_report_serializes() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let input = mock_csv_file(&dir, "a.csv", &sample_accidents(0, 4), CsvFormat::default())?;
    let report = pipeline(3, 2)?.run_csv(
        &[input],
        &dir.file_path("out.csv"),
        CsvFormat::default(),
        CsvFormat::default(),
    )?;
    let json: serde_json::Value = serde_json::to_value(&report)?;
    assert_eq!(json["total_records"], 4);
    assert_eq!(json["files"][0]["batches"], 2);
    assert_eq!(json["files"][0]["records_read"], 4);
    Ok(())
}

#[test]
fn csv_source_repeats_end_of_stream() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let path = mock_csv_file(&dir, "a.csv", &sample_accidents(0, 3), CsvFormat::default())?;
    let mut source = CsvBatchSource::<RoadAccident>::open(&path, 2, CsvFormat::default())?;
    assert_eq!(source.path(), path.as_path());

    let mut sizes = Vec::new();
    let mut seqs = Vec::new();
    while let Some(batch) = source.next_batch()?.into_batch() {
        sizes.push(batch.len());
        seqs.push(batch.seq());
    }
    assert_eq!(sizes, vec![2, 1]);
    assert_eq!(seqs, vec![0, 1]);
    for _ in 0..3 {
        assert!(source.next_batch()?.is_end());
    }
    assert_eq!(source.rows_read(), 3);
    Ok(())
}

#[test]
fn header_only_file_yields_marker_immediately() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let path = dir.file_path("empty.csv");
    fs::write(
        &path,
        "Accident_Index,Longitude,Latitude,Police_Force,Accident_Severity,Number_of_Vehicles,\
         Number_of_Casualties,Date,Time,Local_Authority_(District),Light_Conditions,\
         Weather_Conditions,Road_Surface_Conditions\n",
    )?;
    let mut source = CsvBatchSource::<RoadAccident>::open(&path, 10, CsvFormat::default())?;
    assert!(source.next_batch()?.is_end());

    let report = pipeline(10, 1)?.run_csv(
        &[path],
        &dir.file_path("out.csv"),
        CsvFormat::default(),
        CsvFormat::default(),
    )?;
    assert_eq!(report.total_records, 0);
    assert_eq!(report.files[0].batches, 0);
    Ok(())
}

#[test]
fn malformed_row_in_second_file_keeps_first_file() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let good = mock_csv_file(&dir, "good.csv", &sample_accidents(0, 6), CsvFormat::default())?;
    let bad = mock_csv_file(&dir, "bad.csv", &sample_accidents(50, 4), CsvFormat::default())?;
    let mut f = fs::OpenOptions::new().append(true).open(&bad)?;
    writeln!(
        f,
        "BAD0001,not-a-number,51.5,1,1,1,1,01/01/2010,10:00,Camden,Daylight,Fine no high winds,Dry"
    )?;
    drop(f);
    let output = dir.file_path("out.csv");

    let err = pipeline(2, 1)?
        .run_csv(&[good, bad.clone()], &output, CsvFormat::default(), CsvFormat::default())
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Read));
    match &err {
        PipelineError::Run { file, .. } => assert_eq!(file, &bad),
        other => panic!("unexpected error {other:?}"),
    }
    match err.root() {
        PipelineError::MalformedRecord { path, row, .. } => {
            assert_eq!(path, &bad);
            assert_eq!(*row, 5);
        }
        other => panic!("unexpected error {other:?}"),
    }

    // The output was closed on the failure path and still holds file one.
    let written: Vec<RoadAccidentDetails> = read_csv_output(&output)?;
    let ids = ids_of(&written);
    assert!(ids.len() >= 6 && ids.len() <= 10);
    assert_eq!(&ids[..6], ids_of_raw(&sample_accidents(0, 6)).as_slice());
    Ok(())
}

fn ids_of_raw(raw: &[RoadAccident]) -> Vec<String> {
    raw.iter().map(|a| a.accident_id.clone()).collect()
}

#[test]
fn missing_input_is_an_open_failure() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let missing = dir.file_path("nope.csv");
    let err = pipeline(10, 1)?
        .run_csv(
            &[missing.clone()],
            &dir.file_path("out.csv"),
            CsvFormat::default(),
            CsvFormat::default(),
        )
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Read));
    match err.root() {
        PipelineError::Open { path, .. } => assert_eq!(path, &missing),
        other => panic!("unexpected error {other:?}"),
    }
    Ok(())
}

#[test]
fn bad_date_fails_the_enrich_stage() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let mut rows = sample_accidents(0, 8);
    rows[5].date = "31/02/2010".into();
    let input = mock_csv_file(&dir, "a.csv", &rows, CsvFormat::default())?;

    let err = pipeline(4, 1)?
        .run_csv(&[input], &dir.file_path("out.csv"), CsvFormat::default(), CsvFormat::default())
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Enrich));
    match err.root() {
        PipelineError::Enrichment { record_id, reason } => {
            assert_eq!(record_id, &rows[5].accident_id);
            assert!(reason.contains("31/02/2010"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    Ok(())
}

#[test]
fn headerless_semicolon_files() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let format = CsvFormat {
        has_headers: false,
        delimiter: b';',
    };
    let input = mock_csv_file(&dir, "raw.txt", &sample_accidents(0, 5), format)?;
    assert!(!fs::read_to_string(&input)?.contains("Accident_Index"));

    let output = dir.file_path("out.txt");
    let report = pipeline(2, 1)?.run_csv(&[input], &output, format, format)?;
    assert_eq!(report.total_records, 5);

    let written: Vec<RoadAccidentDetails> = read_csv_vec(&output, format)?;
    assert_eq!(ids_of(&written), ids_of_raw(&sample_accidents(0, 5)));
    Ok(())
}

#[cfg(feature = "compression-gzip")]
#[test]
fn gzip_input_and_output() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let input = mock_csv_file(&dir, "a.csv.gz", &sample_accidents(0, 30), CsvFormat::default())?;
    assert_eq!(&fs::read(&input)?[..2], &[0x1f, 0x8b]);

    let output = dir.file_path("out.csv.gz");
    pipeline(7, 2)?.run_csv(&[input], &output, CsvFormat::default(), CsvFormat::default())?;
    assert_eq!(&fs::read(&output)?[..2], &[0x1f, 0x8b]);

    let written: Vec<RoadAccidentDetails> = read_csv_output(&output)?;
    assert_eq!(ids_of(&written), ids_of_raw(&sample_accidents(0, 30)));
    Ok(())
}

#[cfg(feature = "compression-zstd")]
#[test]
fn zstd_output_is_complete_after_run() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let input = mock_csv_file(&dir, "a.csv", &sample_accidents(0, 12), CsvFormat::default())?;
    let output = dir.file_path("out.csv.zst");
    pipeline(5, 1)?.run_csv(&[input], &output, CsvFormat::default(), CsvFormat::default())?;

    let written: Vec<RoadAccidentDetails> = read_csv_output(&output)?;
    assert_eq!(written.len(), 12);
    Ok(())
}

/// `name` inside `dir`, linked to a device that rejects every write.
#[cfg(target_os = "linux")]
fn full_device(dir: &TempDirPath, name: &str) -> anyhow::Result<Option<std::path::PathBuf>> {
    let full = std::path::Path::new("/dev/full");
    if !full.exists() {
        return Ok(None);
    }
    let link = dir.file_path(name);
    std::os::unix::fs::symlink(full, &link)?;
    Ok(Some(link))
}

#[cfg(target_os = "linux")]
#[test]
fn sink_close_failure_is_a_write_error() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let names = [
        "plain.csv",
        #[cfg(feature = "compression-gzip")]
        "out.csv.gz",
        #[cfg(feature = "compression-zstd")]
        "out.csv.zst",
        #[cfg(feature = "compression-bzip2")]
        "out.csv.bz2",
        #[cfg(feature = "compression-xz")]
        "out.csv.xz",
    ];
    for name in names {
        let Some(path) = full_device(&dir, name)? else {
            return Ok(());
        };
        let mut sink = CsvBatchSink::<RoadAccident>::open(&path, CsvFormat::default())?;
        let batch = Batch::new(0, sample_accidents(0, 3)).unwrap();
        // Depending on buffering the device error shows up at flush or at close.
        let outcome = sink.write(&batch).and_then(|()| sink.flush());
        let closed = match outcome {
            Ok(()) => sink.finish().map(|_| ()),
            Err(e) => Err(e),
        };
        assert!(
            matches!(closed, Err(PipelineError::IoWrite { .. })),
            "{name}: {closed:?}"
        );
    }
    Ok(())
}

#[cfg(all(target_os = "linux", feature = "compression-gzip"))]
#[test]
fn run_to_full_compressed_output_fails() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let input = mock_csv_file(&dir, "a.csv", &sample_accidents(0, 6), CsvFormat::default())?;
    let Some(output) = full_device(&dir, "out.csv.gz")? else {
        return Ok(());
    };
    let err = pipeline(4, 1)?
        .run_csv(&[input], &output, CsvFormat::default(), CsvFormat::default())
        .unwrap_err();
    assert!(matches!(err.root(), PipelineError::IoWrite { .. }), "{err:?}");
    Ok(())
}

#[test]
fn report_file_is_pretty_json() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let input = mock_csv_file(&dir, "a.csv", &sample_accidents(0, 3), CsvFormat::default())?;
    let output = dir.file_path("out.csv");
    let report =
        pipeline(2, 1)?.run_csv(&[input], &output, CsvFormat::default(), CsvFormat::default())?;

    let path = dir.file_path("report.json");
    report.write_json(&path)?;
    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
    assert_eq!(json["total_records"], 3);
    Ok(())
}

#[cfg(target_os = "linux")]
#[test]
fn report_write_failure_is_reported() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let Some(path) = full_device(&dir, "report.json")? else {
        return Ok(());
    };
    let err = RunReport::default().write_json(&path).unwrap_err();
    assert!(matches!(err, PipelineError::IoWrite { .. }), "{err:?}");
    Ok(())
}
