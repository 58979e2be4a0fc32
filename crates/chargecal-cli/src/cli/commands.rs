use super::records::{
    path_index, range_index, CellResult, ObservationRecord, ResultRecord, CROSSOVER_SENTINEL,
};
use super::CliError;
use anyhow::Context;
use chargecal_core::{
    run_calibration, CalError, CalibrationConfig, CalibrationSet, ChannelKey,
    ChargePairCollector, DiagnosticSeverity, Geometry, SubPath, SubRange,
    UnknownChannelPolicy,
};
use globset::Glob;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy)]
pub(super) struct IdRange {
    lo: u32,
    hi: u32,
}

impl IdRange {
    fn range(self) -> RangeInclusive<u32> {
        self.lo..=self.hi
    }
}

fn parse_id_range(text: &str) -> Result<IdRange, String> {
    let (lo, hi) = text
        .split_once('-')
        .ok_or_else(|| format!("expected LO-HI, got '{text}'"))?;
    let lo: u32 = lo.trim().parse().map_err(|_| format!("bad lower bound in '{text}'"))?;
    let hi: u32 = hi.trim().parse().map_err(|_| format!("bad upper bound in '{text}'"))?;
    if lo > hi {
        return Err(format!("range '{text}' is inverted"));
    }
    Ok(IdRange { lo, hi })
}

fn parse_channel(text: &str) -> Result<ChannelKey, String> {
    let (string_id, module_id) = text
        .split_once(',')
        .ok_or_else(|| format!("expected STRING,MODULE, got '{text}'"))?;
    let string_id = string_id
        .trim()
        .parse()
        .map_err(|_| format!("bad string id in '{text}'"))?;
    let module_id = module_id
        .trim()
        .parse()
        .map_err(|_| format!("bad module id in '{text}'"))?;
    Ok(ChannelKey::new(string_id, module_id))
}

#[derive(clap::Args)]
pub(super) struct CalibrateArgs {
    /// Observation JSONL files: literal paths or glob patterns
    #[arg(long = "input", required = true, value_name = "PATH|GLOB")]
    inputs: Vec<String>,

    /// Output JSONL path
    #[arg(long, value_name = "PATH")]
    output: PathBuf,

    /// Registered string range, inclusive
    #[arg(long, value_name = "LO-HI", default_value = "1-81", value_parser = parse_id_range)]
    strings: IdRange,

    /// Registered module range, inclusive
    #[arg(long, value_name = "LO-HI", default_value = "61-64", value_parser = parse_id_range)]
    modules: IdRange,

    /// Known-bad channel, repeatable
    #[arg(long = "bad-channel", value_name = "STRING,MODULE", value_parser = parse_channel)]
    bad_channels: Vec<ChannelKey>,

    /// Register channels outside the geometry on first observation
    /// instead of skipping their records
    #[arg(long)]
    lazy_register: bool,

    /// Run identifier stamped into each output record
    #[arg(long, default_value_t = 0)]
    run_number: u64,
}

/// Recording window of the folded stream, from the optional per-record
/// timestamps.
#[derive(Debug, Clone, Copy, Default)]
struct TimeWindow {
    start: Option<f64>,
    stop: Option<f64>,
}

impl TimeWindow {
    fn update(&mut self, time: f64) {
        self.start = Some(self.start.map_or(time, |start| start.min(time)));
        self.stop = Some(self.stop.map_or(time, |stop| stop.max(time)));
    }
}

pub(super) fn run_calibrate_command(args: CalibrateArgs) -> Result<i32, CliError> {
    let input_files = expand_inputs(&args.inputs)?;
    let geometry = Geometry::grid(args.strings.range(), args.modules.range());
    let policy = if args.lazy_register {
        UnknownChannelPolicy::RegisterLazily
    } else {
        UnknownChannelPolicy::Reject
    };

    let mut collector = ChargePairCollector::new(&geometry, policy);
    let mut window = TimeWindow::default();
    let mut skipped = 0_usize;
    for file in &input_files {
        info!("reading {}", file.display());
        skipped += fold_observation_file(file, &mut collector, &mut window)?;
    }
    if skipped > 0 {
        warn!("skipped {skipped} observation records");
    }

    let config = CalibrationConfig {
        unknown_channels: policy,
        bad_channels: args.bad_channels.iter().copied().collect(),
    };
    let output = run_calibration(&collector, &config);
    for diagnostic in &output.diagnostics {
        match diagnostic.severity() {
            DiagnosticSeverity::Warning => warn!("{diagnostic}"),
            DiagnosticSeverity::Error => error!("{diagnostic}"),
        }
    }

    let written = write_results(
        &args.output,
        &output.records,
        args.run_number,
        window,
    )?;
    info!(
        "wrote {written} cell records for {} channels to {}",
        output.records.len(),
        args.output.display()
    );
    Ok(0)
}

/// Expand literal paths and glob patterns into a sorted, deduplicated
/// file list. Patterns match files in the pattern's parent directory.
fn expand_inputs(patterns: &[String]) -> Result<Vec<PathBuf>, CliError> {
    let mut files = BTreeSet::new();
    for pattern in patterns {
        let literal = Path::new(pattern);
        if literal.is_file() {
            files.insert(literal.to_path_buf());
            continue;
        }

        let glob = Glob::new(pattern)
            .map_err(|source| CliError::Usage(format!("bad input pattern '{pattern}': {source}")))?;
        let matcher = glob.compile_matcher();
        let parent = literal
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let entries = fs::read_dir(parent)
            .with_context(|| format!("listing '{}' for pattern '{pattern}'", parent.display()))
            .map_err(CliError::Internal)?;
        for entry in entries {
            let path = entry
                .with_context(|| format!("listing '{}'", parent.display()))
                .map_err(CliError::Internal)?
                .path();
            if path.is_file() && matcher.is_match(&path) {
                files.insert(path);
            }
        }
    }

    if files.is_empty() {
        return Err(CliError::Usage(
            "no input files matched the given --input paths".to_string(),
        ));
    }
    Ok(files.into_iter().collect())
}

/// Fold one observation file into the collector. Returns the number of
/// records skipped because the core refused them; malformed JSON or
/// out-of-range indices abort the run.
fn fold_observation_file(
    path: &Path,
    collector: &mut ChargePairCollector,
    window: &mut TimeWindow,
) -> Result<usize, CliError> {
    let file = File::open(path)
        .with_context(|| format!("opening observation file '{}'", path.display()))
        .map_err(CliError::Internal)?;
    let reader = BufReader::new(file);

    let mut skipped = 0_usize;
    for (line_index, line) in reader.lines().enumerate() {
        let line = line
            .with_context(|| format!("reading '{}' line {}", path.display(), line_index + 1))
            .map_err(CliError::Internal)?;
        if line.trim().is_empty() {
            continue;
        }

        let record: ObservationRecord = serde_json::from_str(&line)
            .with_context(|| format!("decoding '{}' line {}", path.display(), line_index + 1))
            .map_err(CliError::Internal)?;
        let observation = record
            .to_observation()
            .with_context(|| format!("decoding '{}' line {}", path.display(), line_index + 1))
            .map_err(CliError::Internal)?;

        match collector.observe(&observation) {
            Ok(()) => {
                if let Some(time) = record.time {
                    window.update(time);
                }
            }
            Err(error @ (CalError::UnknownChannel { .. } | CalError::InvalidCharge { .. })) => {
                warn!("{}:{}: {error}", path.display(), line_index + 1);
                skipped += 1;
            }
            Err(error) => {
                return Err(CliError::Internal(anyhow::Error::new(error).context(
                    format!("folding '{}' line {}", path.display(), line_index + 1),
                )));
            }
        }
    }
    Ok(skipped)
}

/// Write one monitoring-style JSONL line per fitted cell. The channel's
/// low/mid threshold rides on the low sub-range rows, the mid/high
/// threshold on the mid rows; everything else carries the -1 sentinel.
fn write_results(
    path: &Path,
    records: &CalibrationSet,
    run_number: u64,
    window: TimeWindow,
) -> Result<usize, CliError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory '{}'", parent.display()))
            .map_err(CliError::Internal)?;
    }
    let file = File::create(path)
        .with_context(|| format!("creating output file '{}'", path.display()))
        .map_err(CliError::Internal)?;
    let mut writer = BufWriter::new(file);

    let mut written = 0_usize;
    for record in records.iter() {
        let channel = record.channel();
        for path_kind in SubPath::ALL {
            for range in SubRange::ALL {
                let Some(fit) = record.fit(path_kind, range) else {
                    warn!("cell {channel}/{path_kind}/{range} has no fit; row omitted");
                    continue;
                };

                let crossover = record
                    .crossover()
                    .map(|crossover| match range {
                        SubRange::Low => crossover.low_mid,
                        SubRange::Mid => crossover.mid_high,
                        SubRange::High => CROSSOVER_SENTINEL,
                    })
                    .filter(|threshold| threshold.is_finite())
                    .unwrap_or(CROSSOVER_SENTINEL);

                let row = ResultRecord {
                    varname: "slc_charge_cal",
                    string: channel.string_id,
                    module: channel.module_id,
                    path: path_index(path_kind),
                    range: range_index(range),
                    run_number,
                    recording_start_time: window.start,
                    recording_stop_time: window.stop,
                    result: CellResult {
                        n: fit.n,
                        p0: fit.p0,
                        p1: fit.p1,
                        p0_error: fit.p0_error,
                        p1_error: fit.p1_error,
                        chi2: fit.chi2,
                        sum_x: fit.statistics.x,
                        sum_xx: fit.statistics.xx,
                        sum_xy: fit.statistics.xy,
                        sum_y: fit.statistics.y,
                        sum_yy: fit.statistics.yy,
                        crossover,
                    },
                };

                let line = serde_json::to_string(&row)
                    .context("encoding result record")
                    .map_err(CliError::Internal)?;
                writeln!(writer, "{line}")
                    .with_context(|| format!("writing '{}'", path.display()))
                    .map_err(CliError::Internal)?;
                written += 1;
            }
        }
    }

    writer
        .flush()
        .with_context(|| format!("flushing '{}'", path.display()))
        .map_err(CliError::Internal)?;
    Ok(written)
}
