use chrono::{DateTime, TimeZone, Utc};
use endureio::config::toml_config::TomlConfig;
use endureio::fit::fixtures::{ActivityFixture, FixtureRecord};
use endureio::{read_fit_file, Cell, EtlEngine, EtlError, FitPipeline, LocalStorage, ReadOptions};
use std::io::Read;
use std::path::Path;
use tempfile::TempDir;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 6, 30, 0).unwrap()
}

fn run_fixture() -> Vec<u8> {
    let records = (0..6)
        .map(|i| FixtureRecord {
            offset_secs: i,
            heart_rate: Some(140 + i as u8),
            enhanced_speed_mm_s: Some(3200),
            stryd_power: Some(250),
            ..Default::default()
        })
        .collect();

    ActivityFixture::new(start())
        .records(records)
        .lap(0, "manual")
        .lap(3, "distance")
        .session(5, 1_600)
        .utc_offset_hours(1)
        .garmin_creator(3121)
        .build()
}

fn write_fixture(dir: &Path, name: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, run_fixture()).unwrap();
    path.to_string_lossy().into_owned()
}

fn toml_for(inputs: &[String], output: &Path, extra: &str) -> TomlConfig {
    let files = inputs
        .iter()
        .map(|f| format!("{:?}", f))
        .collect::<Vec<_>>()
        .join(", ");
    let content = format!(
        r#"
[pipeline]
name = "integration"

[source]
files = [{files}]

[load]
output_path = {output:?}
output_formats = ["csv", "json"]
{extra}
"#,
        files = files,
        output = output.to_string_lossy(),
        extra = extra,
    );
    TomlConfig::from_toml_str(&content).unwrap()
}

#[test]
fn test_read_fit_file_from_disk() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path(), "morning.fit");

    let frame = read_fit_file(&path, &ReadOptions::default()).unwrap();

    assert_eq!(frame.len(), 6);
    assert_eq!(frame.attrs.device.as_deref(), Some("garmin 3121"));
    assert_eq!(frame.attrs.utc_offset_seconds, Some(3600));
    assert_eq!(frame.rows[0].get("power"), Some(&Cell::Float(250.0)));
    assert_eq!(frame.rows[5].get("lap"), Some(&Cell::Int(1)));
    assert_eq!(
        frame.start_time().unwrap().to_rfc3339(),
        "2024-03-10T07:30:00+01:00"
    );
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let result = read_fit_file(dir.path().join("nope.fit"), &ReadOptions::default());
    assert!(matches!(result, Err(EtlError::IoError(_))));
}

#[tokio::test]
async fn test_end_to_end_writes_csv_and_json() {
    let dir = TempDir::new().unwrap();
    let input = write_fixture(dir.path(), "morning.fit");
    let output = dir.path().join("out");

    let config = toml_for(&[input], &output, "");
    let engine = EtlEngine::new(FitPipeline::new(LocalStorage::new("."), config));
    let result = engine.run().await.unwrap();
    assert_eq!(Path::new(&result), output.as_path());

    let csv = std::fs::read_to_string(output.join("morning.csv")).unwrap();
    let mut lines = csv.lines();
    let header = lines.next().unwrap();
    assert!(header.starts_with("timestamp,"));
    assert!(header.contains("power"));
    assert!(header.ends_with("duration,lap,lap_trigger"));
    assert_eq!(lines.count(), 6);

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output.join("morning.json")).unwrap())
            .unwrap();
    assert_eq!(json["rows"].as_array().unwrap().len(), 6);
    assert_eq!(json["attrs"]["device"], "garmin 3121");
}

#[tokio::test]
async fn test_end_to_end_zip_bundle() {
    let dir = TempDir::new().unwrap();
    let inputs = vec![
        write_fixture(dir.path(), "run.fit"),
        write_fixture(&{
            let nested = dir.path().join("other");
            std::fs::create_dir_all(&nested).unwrap();
            nested
        }, "run.fit"),
    ];
    let output = dir.path().join("out");

    let config = toml_for(
        &inputs,
        &output,
        "[load.compression]\nenabled = true\nfilename = \"runs.zip\"\n",
    );
    let engine = EtlEngine::new(FitPipeline::new(LocalStorage::new("."), config));
    let archive_path = engine.run().await.unwrap();
    assert!(archive_path.ends_with("runs.zip"));

    let file = std::fs::File::open(&archive_path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(names, vec!["run.csv", "run.json", "run_2.csv", "run_2.json"]);

    let mut csv = String::new();
    archive.by_name("run_2.csv").unwrap().read_to_string(&mut csv).unwrap();
    assert!(csv.starts_with("timestamp,"));
}

#[tokio::test]
async fn test_corrupt_input_fails_the_run() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("broken.fit");
    let mut bytes = run_fixture();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    std::fs::write(&input, &bytes).unwrap();
    let output = dir.path().join("out");

    let config = toml_for(&[input.to_string_lossy().into_owned()], &output, "");
    let engine = EtlEngine::new(FitPipeline::new(LocalStorage::new("."), config));
    let err = engine.run().await.unwrap_err();
    assert!(matches!(err, EtlError::FitError(_)));
    assert!(!output.join("broken.csv").exists());

    let config = toml_for(
        &[input.to_string_lossy().into_owned()],
        &output,
        "[read]\ncheck_crc = false\n",
    );
    let engine = EtlEngine::new(FitPipeline::new(LocalStorage::new("."), config));
    engine.run().await.unwrap();
    assert!(output.join("broken.csv").exists());
}
