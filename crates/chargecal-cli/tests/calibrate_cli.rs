use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn write_observation_file(path: &Path, lines: &[String]) {
    fs::write(path, lines.join("\n") + "\n").expect("observation file should be staged");
}

fn observation_line(
    string: u32,
    module: u32,
    path: u8,
    range: u8,
    slc_charge: f64,
    time: f64,
) -> String {
    let hlc_charge = 0.05 + 2.0 * slc_charge;
    format!(
        r#"{{"string":{string},"module":{module},"path":{path},"range":{range},"slc_charge":{slc_charge},"hlc_charge":{hlc_charge},"time":{time}}}"#
    )
}

fn synthetic_run_lines(string: u32, module: u32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut time = 59000.0;
    for range in 0..3_u8 {
        let band_floor = 10.0_f64.powi(i32::from(range) * 2);
        for path in 0..2_u8 {
            for index in 0..12 {
                let slc_charge = band_floor * (1.0 + 0.6 * index as f64);
                lines.push(observation_line(string, module, path, range, slc_charge, time));
                time += 0.001;
            }
        }
    }
    lines
}

fn run_calibrate(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_chargecal"))
        .args(args)
        .output()
        .expect("chargecal binary should run")
}

#[test]
fn calibrate_writes_one_row_per_cell_with_fitted_parameters() {
    let temp = TempDir::new().expect("tempdir should be created");
    let input_path = temp.path().join("observations.jsonl");
    let output_path = temp.path().join("results.jsonl");
    write_observation_file(&input_path, &synthetic_run_lines(1, 61));

    let output = run_calibrate(&[
        "calibrate",
        "--input",
        input_path.to_str().expect("utf-8 path"),
        "--output",
        output_path.to_str().expect("utf-8 path"),
        "--strings",
        "1-1",
        "--modules",
        "61-61",
        "--run-number",
        "139482",
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let results = fs::read_to_string(&output_path).expect("results should be written");
    let rows: Vec<Value> = results
        .lines()
        .map(|line| serde_json::from_str(line).expect("row should be valid JSON"))
        .collect();

    // 3 sub-paths x 3 sub-ranges for the single registered channel
    assert_eq!(rows.len(), 9);
    for row in &rows {
        assert_eq!(row["varname"], "slc_charge_cal");
        assert_eq!(row["string"], 1);
        assert_eq!(row["module"], 61);
        assert_eq!(row["run_number"], 139482);
        assert_eq!(row["recording_start_time"], 59000.0);

        let result = &row["result"];
        let p1 = result["p1"].as_f64().expect("p1 should be numeric");
        assert!((p1 - 2.0).abs() <= 1.0e-6, "p1 was {p1}");
        assert!(result["n"].as_u64().expect("n should be numeric") >= 12);
    }

    // combined rows pool both collected sub-paths
    let combined_low = rows
        .iter()
        .find(|row| row["path"] == 2 && row["range"] == 0)
        .expect("combined low row should exist");
    assert_eq!(combined_low["result"]["n"], 24);

    // low rows carry the low/mid threshold, mid rows the mid/high one,
    // high rows the -1 sentinel
    let low_crossover = rows
        .iter()
        .find(|row| row["path"] == 0 && row["range"] == 0)
        .expect("low row should exist")["result"]["crossover"]
        .as_f64()
        .expect("crossover should be numeric");
    let mid_crossover = rows
        .iter()
        .find(|row| row["path"] == 0 && row["range"] == 1)
        .expect("mid row should exist")["result"]["crossover"]
        .as_f64()
        .expect("crossover should be numeric");
    let high_crossover = rows
        .iter()
        .find(|row| row["path"] == 0 && row["range"] == 2)
        .expect("high row should exist")["result"]["crossover"]
        .as_f64()
        .expect("crossover should be numeric");
    assert!(low_crossover > 1.0 && low_crossover < 1000.0);
    assert!(mid_crossover > low_crossover);
    assert_eq!(high_crossover, -1.0);
}

#[test]
fn observations_split_across_files_match_a_single_file_run() {
    let temp = TempDir::new().expect("tempdir should be created");
    let lines = synthetic_run_lines(2, 62);

    let single_path = temp.path().join("single.jsonl");
    write_observation_file(&single_path, &lines);

    let part_dir = temp.path().join("parts");
    fs::create_dir_all(&part_dir).expect("part dir should exist");
    let (front, back) = lines.split_at(lines.len() / 3);
    write_observation_file(&part_dir.join("part-a.jsonl"), front);
    write_observation_file(&part_dir.join("part-b.jsonl"), back);

    let single_output = temp.path().join("single-results.jsonl");
    let split_output = temp.path().join("split-results.jsonl");

    let pattern = format!("{}/part-*.jsonl", part_dir.display());
    for (inputs, output_path) in [
        (vec![single_path.to_str().expect("utf-8 path").to_string()], &single_output),
        (vec![pattern], &split_output),
    ] {
        let mut args = vec!["calibrate".to_string()];
        for input in inputs {
            args.push("--input".to_string());
            args.push(input);
        }
        args.extend([
            "--output".to_string(),
            output_path.to_str().expect("utf-8 path").to_string(),
            "--strings".to_string(),
            "2-2".to_string(),
            "--modules".to_string(),
            "62-62".to_string(),
        ]);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = run_calibrate(&arg_refs);
        assert!(
            output.status.success(),
            "stderr: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }

    let single_rows = fs::read_to_string(&single_output).expect("single results exist");
    let split_rows = fs::read_to_string(&split_output).expect("split results exist");
    assert_eq!(single_rows, split_rows);
}

#[test]
fn stray_channels_are_skipped_under_the_default_geometry_policy() {
    let temp = TempDir::new().expect("tempdir should be created");
    let input_path = temp.path().join("observations.jsonl");
    let output_path = temp.path().join("results.jsonl");

    let mut lines = synthetic_run_lines(1, 61);
    // a channel outside the registered 1x1 grid
    lines.push(observation_line(9, 61, 0, 0, 5.0, 59001.0));
    write_observation_file(&input_path, &lines);

    let output = run_calibrate(&[
        "calibrate",
        "--input",
        input_path.to_str().expect("utf-8 path"),
        "--output",
        output_path.to_str().expect("utf-8 path"),
        "--strings",
        "1-1",
        "--modules",
        "61-61",
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("skipped 1 observation records"),
        "stderr: {stderr}"
    );

    let results = fs::read_to_string(&output_path).expect("results should be written");
    assert_eq!(results.lines().count(), 9);
    assert!(!results.contains(r#""string":9"#));
}

#[test]
fn missing_inputs_fail_with_a_usage_error() {
    let temp = TempDir::new().expect("tempdir should be created");
    let output = run_calibrate(&[
        "calibrate",
        "--input",
        temp.path().join("absent-*.jsonl").to_str().expect("utf-8 path"),
        "--output",
        temp.path().join("results.jsonl").to_str().expect("utf-8 path"),
    ]);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no input files matched"), "stderr: {stderr}");
}
