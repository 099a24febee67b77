//! Gait CLI - Command-line interface for gait kinematics
//!
//! Commands:
//! - analyze: Run a landmark stream through the pipeline and emit the report
//! - validate: Check a landmark stream for structural problems
//! - bands: Print the reference bands for a view and activity
//! - doctor: Diagnose configuration and environment
//! - schema: Print input/output schema information

use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, info};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use gait_kinematics::bands::ReferenceBandSet;
use gait_kinematics::ingest::{LandmarkStream, StreamSummary, STREAM_SCHEMA};
use gait_kinematics::summary::{GaitReport, REPORT_VERSION};
use gait_kinematics::{
    Activity, AnalysisConfig, CameraView, GaitAnalyzer, GaitError, JointGroup, TimeWindow,
    GAIT_VERSION, PRODUCER_NAME,
};

/// Gait - joint-angle kinematics from 2D pose landmarks
#[derive(Parser)]
#[command(name = "gait")]
#[command(author = "Stride Sync")]
#[command(version = GAIT_VERSION)]
#[command(about = "Score gait quality from pose landmark streams", long_about = None)]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a landmark stream
    Analyze {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Camera placement
        #[arg(long)]
        view: CameraView,

        /// Movement being analysed
        #[arg(long)]
        activity: Activity,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "json")]
        output_format: OutputFormat,

        /// Frame rate; required for NDJSON, overrides the document's for JSON
        #[arg(long)]
        fps: Option<f64>,

        /// Keep every n-th frame
        #[arg(long)]
        stride: Option<usize>,

        /// Window start in seconds from the first analysed frame
        #[arg(long)]
        start: Option<f64>,

        /// Window end in seconds from the first analysed frame
        #[arg(long)]
        end: Option<f64>,

        /// Analysis configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Include raw and filtered series in the report
        #[arg(long)]
        include_series: bool,
    },

    /// Validate a landmark stream
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Frame rate for NDJSON input
        #[arg(long)]
        fps: Option<f64>,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print reference bands
    Bands {
        /// Camera placement
        #[arg(long)]
        view: CameraView,

        /// Movement being analysed
        #[arg(long)]
        activity: Activity,

        /// Analysis configuration file whose band overrides apply
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check a configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (input or output)
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Landmark stream document `{fps, frames}`
    Json,
    /// Newline-delimited JSON (one frame per line)
    Ndjson,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON report
    Json,
    /// Pretty-printed JSON report
    JsonPretty,
    /// Human-readable ROM table
    Text,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (gait.landmark_stream.v1)
    Input,
    /// Output schema (gait report)
    Output,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), GaitCliError> {
    match cli.command {
        Commands::Analyze {
            input,
            output,
            view,
            activity,
            input_format,
            output_format,
            fps,
            stride,
            start,
            end,
            config,
            include_series,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(stride) = stride {
                config.ingest.stride = stride;
            }
            config.include_series |= include_series;
            let window = match (start, end) {
                (None, None) => None,
                (start, end) => Some(TimeWindow::new(
                    start.unwrap_or(0.0),
                    end.unwrap_or(f64::MAX),
                )?),
            };
            cmd_analyze(
                &input,
                &output,
                view,
                activity,
                input_format,
                output_format,
                fps,
                window,
                config,
            )
        }

        Commands::Validate {
            input,
            input_format,
            fps,
            json,
        } => cmd_validate(&input, input_format, fps, json),

        Commands::Bands {
            view,
            activity,
            config,
            json,
        } => cmd_bands(view, activity, config.as_deref(), json),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),

        Commands::Schema {
            schema_type,
            json_schema,
        } => cmd_schema(schema_type, json_schema),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_analyze(
    input: &Path,
    output: &Path,
    view: CameraView,
    activity: Activity,
    input_format: InputFormat,
    output_format: OutputFormat,
    fps: Option<f64>,
    window: Option<TimeWindow>,
    config: AnalysisConfig,
) -> Result<(), GaitCliError> {
    let stream = read_stream(input, &input_format, fps)?;
    info!(
        "read {} frames at {} fps from {}",
        stream.frames.len(),
        stream.fps,
        input.display()
    );

    let analyzer = GaitAnalyzer::with_config(config)?;
    let report = analyzer.analyze(&stream, view, activity, window)?;

    let output_data = format_report(&report, &output_format)?;

    if output.to_string_lossy() == "-" {
        println!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_validate(
    input: &Path,
    input_format: InputFormat,
    fps: Option<f64>,
    json: bool,
) -> Result<(), GaitCliError> {
    let stream = read_stream(input, &input_format, fps)?;
    let summary: StreamSummary = stream.summary();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total frames:      {}", summary.total_frames);
        println!("Detected frames:   {}", summary.detected_frames);
        println!("Undetected frames: {}", summary.undetected_frames);
        println!("Incomplete frames: {}", summary.incomplete_frames);
        println!("Duration:          {:.2} s", summary.duration_secs);

        if !summary.issues.is_empty() {
            println!("\nErrors:");
            for issue in &summary.issues {
                println!(
                    "  - Frame {} (position {}): {}",
                    issue.frame_index, issue.position, issue.error
                );
            }
        }
    }

    if !summary.issues.is_empty() {
        Err(GaitCliError::ValidationFailed(summary.issues.len()))
    } else if summary.total_frames == 0 {
        Err(GaitError::NoFrames.into())
    } else {
        Ok(())
    }
}

fn cmd_bands(
    view: CameraView,
    activity: Activity,
    config: Option<&Path>,
    json: bool,
) -> Result<(), GaitCliError> {
    let config = load_config(config)?;
    let set = ReferenceBandSet::standard().with_overrides(&config.bands);
    let table = set.table(view, activity);

    if json {
        println!("{}", serde_json::to_string_pretty(&table)?);
        return Ok(());
    }

    let ranges = |bands: &[gait_kinematics::bands::Band]| {
        if bands.is_empty() {
            return "-".to_string();
        }
        bands
            .iter()
            .map(|b| format!("{}-{}", b.min, b.max))
            .collect::<Vec<_>>()
            .join(", ")
    };

    println!("Reference bands: {}/{}", view, activity);
    println!("=========================");
    println!("{:<8} {:<16} {:<16} {:<16}", "group", "good", "moderate", "bad");
    for group in JointGroup::ALL {
        match table.groups.get(&group) {
            Some(bands) => println!(
                "{:<8} {:<16} {:<16} {:<16}",
                group.as_str(),
                ranges(&bands.good),
                ranges(&bands.moderate),
                ranges(&bands.bad)
            ),
            None => println!("{:<8} (no bands)", group.as_str()),
        }
    }
    Ok(())
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), GaitCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "gait_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("gait-kinematics version {}", GAIT_VERSION),
    });

    checks.push(DoctorCheck {
        name: "schema_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Input schema: {}, report version {}", STREAM_SCHEMA, REPORT_VERSION),
    });

    let standard = ReferenceBandSet::standard();
    let missing: Vec<String> = CameraView::ALL
        .iter()
        .flat_map(|&v| Activity::ALL.iter().map(move |&a| (v, a)))
        .filter(|&(v, a)| !standard.covers(v, a))
        .map(|(v, a)| format!("{v}/{a}"))
        .collect();
    checks.push(if missing.is_empty() {
        DoctorCheck {
            name: "reference_bands".to_string(),
            status: CheckStatus::Ok,
            message: "Built-in bands cover every view and activity".to_string(),
        }
    } else {
        DoctorCheck {
            name: "reference_bands".to_string(),
            status: CheckStatus::Error,
            message: format!("No bands for {}", missing.join(", ")),
        }
    });

    if let Some(config_path) = config {
        if config_path.exists() {
            match AnalysisConfig::from_file(config_path) {
                Ok(config) => checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Ok,
                    message: format!(
                        "Configuration valid (order {} Butterworth at {} Hz, {} band overrides)",
                        config.filter.order,
                        config.filter.cutoff_hz,
                        config.bands.len()
                    ),
                }),
                Err(e) => checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: e.to_string(),
                }),
            }
        } else {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Warning,
                message: "Configuration file does not exist".to_string(),
            });
        }
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (pass -i <file>)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (-i - ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: GAIT_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Gait Doctor Report");
        println!("==================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(GaitCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), GaitCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", input_json_schema());
            } else {
                println!("Input Schema: {}", STREAM_SCHEMA);
                println!();
                println!("A landmark stream document contains:");
                println!();
                println!("- fps: Source frame rate (> 0)");
                println!("- source_id: Optional video identifier");
                println!("- frames: Array of frames, each with");
                println!("  - frame_index: Strictly increasing integer");
                println!("  - timestamp: Seconds, non-decreasing");
                println!("  - landmarks: null (no detection), an array of 33 {{x, y}} points,");
                println!("    or an object keyed by landmark name (left_shoulder, ...)");
                println!();
                println!("NDJSON input carries one frame per line; pass --fps.");
                println!();
                println!("Required landmarks: shoulders, hips, knees, ankles, foot indices");
            }
        }
        SchemaType::Output => {
            if json_schema {
                println!("{}", output_json_schema());
            } else {
                println!("Output Schema: gait report {}", REPORT_VERSION);
                println!();
                println!("- report_version");
                println!("- producer: {{ name, version, instance_id }}");
                println!("- provenance: {{ source_id, view, activity, fps, effective_sample_rate, stride, window, computed_at_utc }}");
                println!("- quality: {{ frames_total, frames_analyzed, frames_dropped, flags }}");
                println!("- rom_table: {{ joint, min_angle, max_angle, range_of_motion }} per joint");
                println!("- joints: {{ joint, status, rom, rom_span, peaks, troughs, classification, narrative, cycle_stats }}");
                println!("- asymmetry: {{ group, delta, flagged }} for ankle, knee, hip");
                println!("- footwear: {{ category, reason }}");
                println!("- training: {{ name, description, target }}");
                println!("- series: optional {{ time, raw, filtered }} per joint");
            }
        }
    }

    Ok(())
}

// Helper functions

fn read_input(input: &Path) -> Result<String, GaitCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn read_stream(
    input: &Path,
    input_format: &InputFormat,
    fps: Option<f64>,
) -> Result<LandmarkStream, GaitCliError> {
    let input_data = read_input(input)?;
    let stream = match input_format {
        InputFormat::Json => {
            let mut stream = LandmarkStream::from_json(&input_data)?;
            if let Some(fps) = fps {
                debug!("overriding document fps {} with {}", stream.fps, fps);
                stream.fps = fps;
            }
            stream
        }
        InputFormat::Ndjson => {
            let fps = fps.ok_or(GaitCliError::MissingFps)?;
            let stream = LandmarkStream::from_ndjson(&input_data, fps)?;
            match input.file_stem() {
                Some(stem) if input.to_string_lossy() != "-" => {
                    stream.with_source_id(stem.to_string_lossy())
                }
                _ => stream,
            }
        }
    };
    Ok(stream)
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig, GaitCliError> {
    match path {
        Some(path) => Ok(AnalysisConfig::from_file(path)?),
        None => Ok(AnalysisConfig::default()),
    }
}

fn format_report(report: &GaitReport, format: &OutputFormat) -> Result<String, GaitCliError> {
    match format {
        OutputFormat::Json => Ok(report.to_json()?),
        OutputFormat::JsonPretty => Ok(report.to_json_pretty()?),
        OutputFormat::Text => Ok(format_text(report)),
    }
}

fn format_text(report: &GaitReport) -> String {
    let cell = |v: Option<f64>| v.map(|v| format!("{:.1}", v)).unwrap_or_else(|| "-".to_string());

    let mut lines = vec![
        format!(
            "Gait report: {}/{}",
            report.provenance.view, report.provenance.activity
        ),
        format!(
            "Frames analysed: {} of {} ({} dropped)",
            report.quality.frames_analyzed, report.quality.frames_total, report.quality.frames_dropped
        ),
        String::new(),
        format!(
            "{:<22} {:>8} {:>8} {:>8}  {}",
            "joint", "min", "max", "rom", "classification"
        ),
    ];
    for (row, joint) in report.rom_table.iter().zip(&report.joints) {
        lines.push(format!(
            "{:<22} {:>8} {:>8} {:>8}  {}",
            row.joint.label(),
            cell(row.min_angle),
            cell(row.max_angle),
            cell(row.range_of_motion),
            joint.classification.as_str()
        ));
    }
    lines.push(String::new());
    for record in &report.asymmetry {
        lines.push(format!(
            "Asymmetry {:<6} {:>8}{}",
            record.group.as_str(),
            cell(record.delta),
            if record.flagged { "  (flagged)" } else { "" }
        ));
    }
    lines.push(String::new());
    lines.push(format!("Footwear: {} ({})", report.footwear.category.label(), report.footwear.reason));
    for exercise in &report.training {
        lines.push(format!("Training: {} - {}", exercise.name, exercise.description));
    }
    lines.join("\n")
}

fn input_json_schema() -> String {
    let point = serde_json::json!({
        "type": "object",
        "required": ["x", "y"],
        "properties": {
            "x": { "type": "number" },
            "y": { "type": "number" }
        }
    });
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": STREAM_SCHEMA,
        "description": "Per-frame 2D pose landmarks from one video",
        "type": "object",
        "required": ["fps", "frames"],
        "properties": {
            "schema_version": { "type": "string", "const": STREAM_SCHEMA },
            "source_id": { "type": "string" },
            "fps": { "type": "number", "exclusiveMinimum": 0 },
            "frames": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["frame_index", "timestamp"],
                    "properties": {
                        "frame_index": { "type": "integer", "minimum": 0 },
                        "timestamp": { "type": "number" },
                        "landmarks": {
                            "oneOf": [
                                { "type": "null" },
                                { "type": "array", "items": { "oneOf": [{ "type": "null" }, point] } },
                                { "type": "object", "additionalProperties": { "oneOf": [{ "type": "null" }, point] } }
                            ]
                        }
                    }
                }
            }
        }
    })
    .to_string()
}

fn output_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "gait.report",
        "description": "Joint-angle kinematics report for one (video, view, activity) run",
        "type": "object",
        "required": [
            "report_version", "producer", "provenance", "quality",
            "rom_table", "joints", "asymmetry", "footwear", "training"
        ],
        "properties": {
            "report_version": { "type": "string" },
            "producer": {
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "version": { "type": "string" },
                    "instance_id": { "type": "string" }
                }
            },
            "provenance": {
                "type": "object",
                "properties": {
                    "source_id": { "type": ["string", "null"] },
                    "view": { "enum": ["side", "back"] },
                    "activity": { "enum": ["walking", "running", "pickup-pen"] },
                    "fps": { "type": "number" },
                    "effective_sample_rate": { "type": "number" },
                    "stride": { "type": "integer" },
                    "computed_at_utc": { "type": "string" }
                }
            },
            "quality": {
                "type": "object",
                "properties": {
                    "frames_total": { "type": "integer" },
                    "frames_analyzed": { "type": "integer" },
                    "frames_dropped": { "type": "integer" },
                    "flags": { "type": "array", "items": { "type": "string" } }
                }
            },
            "rom_table": { "type": "array", "items": { "type": "object" } },
            "joints": { "type": "array", "items": { "type": "object" } },
            "asymmetry": { "type": "array", "items": { "type": "object" } },
            "footwear": { "type": "object" },
            "training": { "type": "array", "items": { "type": "object" } }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum GaitCliError {
    Io(io::Error),
    Analysis(GaitError),
    Json(serde_json::Error),
    MissingFps,
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for GaitCliError {
    fn from(e: io::Error) -> Self {
        GaitCliError::Io(e)
    }
}

impl From<GaitError> for GaitCliError {
    fn from(e: GaitError) -> Self {
        GaitCliError::Analysis(e)
    }
}

impl From<serde_json::Error> for GaitCliError {
    fn from(e: serde_json::Error) -> Self {
        GaitCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<GaitCliError> for CliError {
    fn from(e: GaitCliError) -> Self {
        match e {
            GaitCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            GaitCliError::Analysis(e) => {
                let (code, hint) = match &e {
                    GaitError::NoFrames => ("NO_FRAMES", "Ensure the input stream is not empty"),
                    GaitError::NoDetections(_) => {
                        ("NO_DETECTIONS", "Check that the subject is visible in the video")
                    }
                    GaitError::CorruptSource(_) | GaitError::InvalidFrameRate(_) => {
                        ("CORRUPT_SOURCE", "Run 'gait validate' for details")
                    }
                    GaitError::JsonError(_) => ("PARSE_ERROR", "Ensure input matches gait.landmark_stream.v1"),
                    GaitError::InvalidWindow(_) => {
                        ("INVALID_WINDOW", "Choose --start/--end inside the analysed span")
                    }
                    GaitError::InvalidConfig(_) => ("INVALID_CONFIG", "Run 'gait doctor --config <file>'"),
                    GaitError::MissingBands { .. } => {
                        ("MISSING_BANDS", "Add band overrides for this view and activity")
                    }
                    GaitError::EncodingError(_) => ("ENCODING_ERROR", "Report this as a bug"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            GaitCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            GaitCliError::MissingFps => CliError {
                code: "MISSING_FPS".to_string(),
                message: "NDJSON input needs a frame rate".to_string(),
                hint: Some("Pass --fps".to_string()),
            },
            GaitCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} frame issues found", count),
                hint: Some("Fix the landmark source and retry".to_string()),
            },
            GaitCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
