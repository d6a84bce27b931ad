//! Command-line surface for `wls`.
//!
//! Compiled into the binary only. The library crate stays free of
//! argument parsing so embedders never pay for clap.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use wave_load_shaper::core::config::Config;
use wave_load_shaper::core::errors::WlsError;
use wave_load_shaper::journal::jsonl::JournalConfig;
use wave_load_shaper::journal::report::RunOutcome;
use wave_load_shaper::journal::sink::spawn_journal;
use wave_load_shaper::runner::clock::MonotonicClock;
use wave_load_shaper::runner::harness::LoadRunner;
use wave_load_shaper::runner::signals::AbortSignals;
use wave_load_shaper::runner::sim_pool::SimulatedPool;
use wave_load_shaper::shape::schedule::{WavePhase, WaveSchedule};
use wave_load_shaper::shape::wave::{LoadShape, ShapeTick, WaveShape};

// ──────────────────── argument surface ────────────────────

/// Top-level CLI parser.
#[derive(Debug, Parser)]
#[command(
    name = "wls",
    author,
    version,
    about = "Wave Load Shaper - plan and rehearse wave-shaped concurrency ramps",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Path to an alternate config file.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Emit machine-readable JSON instead of human output.
    #[arg(long, global = true)]
    json: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,

    /// Print extra detail while running.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress per-tick output, print only the final summary.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Validate a schedule and print its phase layout.
    Check(CheckArgs),
    /// Print the target curve tick by tick without running anything.
    Plan(PlanArgs),
    /// Rehearse a schedule against the simulated worker pool.
    Run(RunArgs),
    /// Inspect configuration.
    Config(ConfigArgs),
    /// Generate shell completion scripts.
    Completions(CompletionsArgs),
    /// Show version information.
    Version(VersionArgs),
}

/// Schedule selection shared by `check`, `plan` and `run`.
///
/// Field flags override whatever the preset or config file supplied,
/// so `--preset surge --max-users 50` is a scaled-down surge.
#[derive(Debug, Clone, Default, Args, Serialize)]
struct ScheduleArgs {
    /// Named schedule preset to start from.
    #[arg(long, value_name = "NAME")]
    preset: Option<String>,

    /// Peak worker count.
    #[arg(long, value_name = "N")]
    max_users: Option<u32>,

    /// Ramp-up duration in seconds.
    #[arg(long, value_name = "SECONDS")]
    ramp_up: Option<f64>,

    /// Hold duration in seconds.
    #[arg(long, value_name = "SECONDS")]
    hold: Option<f64>,

    /// Ramp-down duration in seconds.
    #[arg(long, value_name = "SECONDS")]
    ramp_down: Option<f64>,

    /// Advisory spawn rate in workers per second.
    #[arg(long, value_name = "RATE")]
    spawn_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, Args, Serialize)]
struct CheckArgs {
    #[command(flatten)]
    schedule: ScheduleArgs,
}

#[derive(Debug, Clone, Args, Serialize)]
struct PlanArgs {
    #[command(flatten)]
    schedule: ScheduleArgs,

    /// Sampling step in shape seconds.
    #[arg(long, default_value_t = 1.0, value_name = "SECONDS")]
    step: f64,

    /// Maximum number of rows to print, 0 means unlimited.
    #[arg(long, default_value_t = 0, value_name = "N")]
    limit: usize,
}

#[derive(Debug, Clone, Args, Serialize)]
struct RunArgs {
    #[command(flatten)]
    schedule: ScheduleArgs,

    /// Wall-clock milliseconds between polls, before speedup.
    #[arg(long, value_name = "MS")]
    poll_interval_ms: Option<u64>,

    /// Time compression factor: one wall second counts as this many
    /// shape seconds.
    #[arg(long, value_name = "FACTOR")]
    speedup: Option<f64>,

    /// Write the run journal to this path.
    #[arg(long, value_name = "PATH", conflicts_with = "no_journal")]
    journal: Option<PathBuf>,

    /// Skip the run journal entirely.
    #[arg(long)]
    no_journal: bool,

    /// Simulated latency per scaling order, in milliseconds.
    #[arg(long, default_value_t = 0, value_name = "MS")]
    scale_latency_ms: u64,
}

#[derive(Debug, Clone, Default, Args, Serialize)]
struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand, Serialize)]
enum ConfigCommand {
    /// Print the config file path.
    Path,
    /// Print the effective configuration.
    Show,
    /// Validate the configuration and exit.
    Validate,
    /// Print the stable config hash.
    Hash,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Target shell.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Default, Args, Serialize)]
struct VersionArgs {
    /// Include build metadata.
    #[arg(long)]
    verbose: bool,
}

// ──────────────────── output mode ────────────────────

/// How command results are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

fn output_mode(cli: &Cli) -> OutputMode {
    resolve_output_mode(
        cli.json,
        std::env::var("WLS_OUTPUT_FORMAT").ok().as_deref(),
        io::stdout().is_terminal(),
    )
}

/// Precedence: explicit `--json` flag, then `WLS_OUTPUT_FORMAT`, then
/// tty detection (pipes default to JSON).
fn resolve_output_mode(json_flag: bool, env_format: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }
    match env_format {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ if stdout_is_tty => OutputMode::Human,
        _ => OutputMode::Json,
    }
}

fn write_json_line(value: &serde_json::Value) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer(&mut handle, value)?;
    writeln!(handle)?;
    Ok(())
}

// ──────────────────── errors ────────────────────

/// CLI failure with an explicit process exit code.
#[derive(Debug, Error)]
pub enum CliError {
    /// The user asked for something invalid.
    #[error("{0}")]
    User(String),

    /// The environment refused, retrying may help.
    #[error("{0}")]
    Runtime(String),

    /// Output serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),

    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Exit code contract: 1 user error, 2 runtime or I/O, 3 serialization.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Json(_) => 3,
        }
    }
}

// ──────────────────── entry point ────────────────────

/// Execute the parsed command.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Check(args) => run_check(cli, args),
        Command::Plan(args) => run_plan(cli, args),
        Command::Run(args) => run_rehearsal(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Completions(args) => {
            run_completions(args);
            Ok(())
        }
        Command::Version(args) => run_version(cli, args),
    }
}

// ──────────────────── schedule resolution ────────────────────

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    Config::load(cli.config.as_deref()).map_err(|e| match e {
        WlsError::Io { .. } => CliError::Runtime(e.to_string()),
        other => CliError::User(other.to_string()),
    })
}

/// Layer the schedule: config file first, then preset, then field flags.
/// The result is validated as a whole, so flags can never smuggle in a
/// schedule the library would refuse.
fn resolve_schedule(config: &Config, args: &ScheduleArgs) -> Result<WaveSchedule, CliError> {
    let mut schedule = match args.preset.as_deref() {
        Some(name) => WaveSchedule::preset(name).ok_or_else(|| {
            CliError::User(format!(
                "unknown preset '{name}', expected one of: {}",
                WaveSchedule::preset_names().join(", ")
            ))
        })?,
        None => config.schedule,
    };

    if let Some(max_users) = args.max_users {
        schedule.max_users = max_users;
    }
    if let Some(ramp_up) = args.ramp_up {
        schedule.ramp_up_seconds = ramp_up;
    }
    if let Some(hold) = args.hold {
        schedule.hold_seconds = hold;
    }
    if let Some(ramp_down) = args.ramp_down {
        schedule.ramp_down_seconds = ramp_down;
    }
    if let Some(spawn_rate) = args.spawn_rate {
        schedule.spawn_rate = spawn_rate;
    }

    schedule
        .validate()
        .map_err(|e| CliError::User(e.to_string()))?;
    Ok(schedule)
}

// ──────────────────── check ────────────────────

fn run_check(cli: &Cli, args: &CheckArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let schedule = resolve_schedule(&config, &args.schedule)?;
    let shape = WaveShape::new(schedule).map_err(|e| CliError::User(e.to_string()))?;

    let hold_start = schedule.hold_start_seconds();
    let ramp_down_start = schedule.ramp_down_start_seconds();
    let total = shape.total_duration().as_secs_f64();

    match output_mode(cli) {
        OutputMode::Human => {
            println!("schedule {}", "ok".green().bold());
            println!("  peak:       {} workers", schedule.max_users);
            println!("  spawn rate: {} workers/s", schedule.spawn_rate);
            print_phase_span(WavePhase::RampUp.label(), 0.0, hold_start);
            print_phase_span(WavePhase::Hold.label(), hold_start, ramp_down_start);
            print_phase_span(WavePhase::RampDown.label(), ramp_down_start, total);
            println!("  total:      {total}s");
        }
        OutputMode::Json => {
            let payload = json!({
                "valid": true,
                "schedule": serde_json::to_value(schedule)?,
                "boundaries": {
                    "hold_start_seconds": hold_start,
                    "ramp_down_start_seconds": ramp_down_start,
                    "total_seconds": total,
                },
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn print_phase_span(name: &str, start: f64, end: f64) {
    if end > start {
        println!("  {name:<10}  {start}s .. {end}s");
    } else {
        println!("  {name:<10}  skipped");
    }
}

// ──────────────────── plan ────────────────────

#[derive(Debug, Clone, Serialize)]
struct PlanRow {
    elapsed_seconds: f64,
    phase: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_users: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    spawn_rate: Option<f64>,
}

fn run_plan(cli: &Cli, args: &PlanArgs) -> Result<(), CliError> {
    if !args.step.is_finite() || args.step <= 0.0 {
        return Err(CliError::User(format!(
            "--step must be a positive number of seconds, got {}",
            args.step
        )));
    }

    let config = load_config(cli)?;
    let schedule = resolve_schedule(&config, &args.schedule)?;
    let shape = WaveShape::new(schedule).map_err(|e| CliError::User(e.to_string()))?;
    let rows = plan_rows(&shape, args.step, args.limit);

    match output_mode(cli) {
        OutputMode::Human => {
            println!(
                "{:>9}  {:<9}  {:>6}  {:>8}",
                "elapsed", "phase", "target", "spawn/s"
            );
            for row in &rows {
                if let Some(target) = row.target_users {
                    println!(
                        "{:>8.1}s  {:<9}  {:>6}  {:>8.1}",
                        row.elapsed_seconds,
                        row.phase,
                        target,
                        row.spawn_rate.unwrap_or(0.0)
                    );
                } else {
                    println!(
                        "{:>8.1}s  {:<9}  {:>6}  {:>8}",
                        row.elapsed_seconds, row.phase, "-", "-"
                    );
                }
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "schedule": serde_json::to_value(schedule)?,
                "step_seconds": args.step,
                "rows": serde_json::to_value(&rows)?,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

/// Sample the curve on a fixed grid. Grid points are computed as
/// `index * step` rather than accumulated, so long plans do not drift.
fn plan_rows(shape: &WaveShape, step: f64, limit: usize) -> Vec<PlanRow> {
    let total = shape.total_duration().as_secs_f64();
    let mut rows = Vec::new();
    let mut index: u32 = 0;

    loop {
        if limit > 0 && rows.len() >= limit {
            return rows;
        }
        let t = f64::from(index) * step;
        if t >= total {
            break;
        }
        let elapsed = Duration::from_secs_f64(t);
        match shape.tick(elapsed) {
            ShapeTick::Active {
                target_users,
                spawn_rate,
            } => rows.push(PlanRow {
                elapsed_seconds: t,
                phase: shape.phase_at(elapsed).label(),
                target_users: Some(target_users),
                spawn_rate: Some(spawn_rate),
            }),
            ShapeTick::Terminal => break,
        }
        index += 1;
    }

    rows.push(PlanRow {
        elapsed_seconds: total,
        phase: WavePhase::Done.label(),
        target_users: None,
        spawn_rate: None,
    });
    rows
}

// ──────────────────── run ────────────────────

#[allow(clippy::too_many_lines)]
fn run_rehearsal(cli: &Cli, args: &RunArgs) -> Result<(), CliError> {
    let mode = output_mode(cli);
    let config = load_config(cli)?;
    let schedule = resolve_schedule(&config, &args.schedule)?;
    let shape = WaveShape::new(schedule).map_err(|e| CliError::User(e.to_string()))?;

    let speedup = args.speedup.unwrap_or(config.runner.speedup);
    if !speedup.is_finite() || speedup <= 0.0 {
        return Err(CliError::User(format!(
            "--speedup must be a positive number, got {speedup}"
        )));
    }
    let poll_ms = args
        .poll_interval_ms
        .unwrap_or(config.runner.poll_interval_ms)
        .max(1);
    // Speedup compresses wall time, not the tick grid: the shape still
    // sees one poll per poll interval of shape time.
    let poll_interval = Duration::from_millis(poll_ms).div_f64(speedup);

    let journal_path = if args.no_journal {
        None
    } else {
        Some(
            args.journal
                .clone()
                .unwrap_or_else(|| config.paths.journal_file.clone()),
        )
    };
    let journal = match &journal_path {
        Some(path) => {
            let (handle, join) = spawn_journal(JournalConfig::at(path.clone()))
                .map_err(|e| CliError::Runtime(e.to_string()))?;
            Some((handle, join))
        }
        None => None,
    };

    let mut pool = SimulatedPool::new();
    if args.scale_latency_ms > 0 {
        pool = pool.with_scale_latency(Duration::from_millis(args.scale_latency_ms), 0.3);
    }

    let config_hash = config
        .stable_hash()
        .map_err(|e| CliError::Runtime(e.to_string()))?;
    let clock = MonotonicClock::with_speedup(speedup);
    let mut runner =
        LoadRunner::new(shape, pool, clock, poll_interval).with_config_hash(config_hash);
    if let Some((handle, _)) = &journal {
        runner = runner.with_journal(handle.clone());
    }
    if mode == OutputMode::Human && !cli.quiet {
        println!(
            "running wave: peak {} workers, up {}s hold {}s down {}s at {}/s (speedup x{speedup})",
            schedule.max_users,
            schedule.ramp_up_seconds,
            schedule.hold_seconds,
            schedule.ramp_down_seconds,
            schedule.spawn_rate
        );
        if cli.verbose && let Some(path) = &journal_path {
            println!("journal: {}", path.display());
        }
        runner = runner.with_progress(|tick| {
            println!(
                "{:>8.1}s  {:<9}  target {:>5}  active {:>5}",
                tick.elapsed_seconds,
                tick.phase.unwrap_or("-"),
                tick.target_users,
                tick.active_workers
            );
        });
    }

    // Hooks stay installed until the process exits.
    let _signals = AbortSignals::onto(runner.abort_handle());

    let result = runner.run();

    if let Some((handle, join)) = journal {
        if let Err(e) = handle.finish() {
            eprintln!("wls: journal shutdown: {e}");
        }
        let _ = join.join();
    }

    let report = result.map_err(|e| CliError::Runtime(e.to_string()))?;

    match mode {
        OutputMode::Human => {
            let line = report.summary();
            match report.outcome {
                RunOutcome::Completed => println!("{}", line.green()),
                RunOutcome::Aborted => println!("{}", line.yellow()),
            }
            if report.dropped_journal_events > 0 {
                eprintln!(
                    "wls: {} journal events dropped under back-pressure",
                    report.dropped_journal_events
                );
            }
        }
        OutputMode::Json => write_json_line(&serde_json::to_value(&report)?)?,
    }
    Ok(())
}

// ──────────────────── config ────────────────────

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let command = args.command.clone().unwrap_or(ConfigCommand::Show);

    match command {
        ConfigCommand::Path => match output_mode(cli) {
            OutputMode::Human => println!("{}", config.paths.config_file.display()),
            OutputMode::Json => {
                write_json_line(&json!({ "path": config.paths.config_file }))?;
            }
        },
        ConfigCommand::Show => match output_mode(cli) {
            OutputMode::Human => {
                let rendered = toml::to_string_pretty(&config)
                    .map_err(|e| CliError::Runtime(e.to_string()))?;
                print!("{rendered}");
            }
            OutputMode::Json => write_json_line(&serde_json::to_value(&config)?)?,
        },
        ConfigCommand::Validate => match output_mode(cli) {
            // load_config already validated, reaching here means ok.
            OutputMode::Human => println!(
                "config {} ({})",
                "ok".green().bold(),
                config.paths.config_file.display()
            ),
            OutputMode::Json => {
                write_json_line(&json!({
                    "valid": true,
                    "path": config.paths.config_file,
                }))?;
            }
        },
        ConfigCommand::Hash => {
            let hash = config
                .stable_hash()
                .map_err(|e| CliError::Runtime(e.to_string()))?;
            match output_mode(cli) {
                OutputMode::Human => println!("{hash}"),
                OutputMode::Json => write_json_line(&json!({ "hash": hash }))?,
            }
        }
    }
    Ok(())
}

// ──────────────────── completions ────────────────────

fn run_completions(args: &CompletionsArgs) {
    let mut cmd = Cli::command();
    generate(args.shell, &mut cmd, "wls", &mut io::stdout());
}

// ──────────────────── version ────────────────────

fn run_version(cli: &Cli, args: &VersionArgs) -> Result<(), CliError> {
    let version = env!("CARGO_PKG_VERSION");
    match output_mode(cli) {
        OutputMode::Human => {
            println!("wls {version}");
            if args.verbose {
                println!("  edition:  2024");
                println!("  profile:  {}", build_profile());
            }
        }
        OutputMode::Json => {
            let payload = if args.verbose {
                json!({
                    "version": version,
                    "edition": "2024",
                    "profile": build_profile(),
                })
            } else {
                json!({ "version": version })
            };
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

const fn build_profile() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    }
}

// ──────────────────── tests ────────────────────
