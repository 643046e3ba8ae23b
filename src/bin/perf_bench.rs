use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use perf_bench::benches::disk::{self, DiskConfig, DiskEngine};
use perf_bench::benches::linalg::{self, LinalgConfig};
use perf_bench::benches::memory::{self, MemoryConfig};
use perf_bench::copy::CopyMode;
use perf_bench::harness::{BenchConfig, Profile, TrialConfig};
use perf_bench::report;
use perf_bench::schema::{BenchReport, Measurement, MeasurementFailure, RunMeta};
use perf_bench::throughput::BandwidthUnit;
use perf_bench::{BenchError, BenchKind};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, Level};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProfileArg {
    Quick,
    Full,
}

impl From<ProfileArg> for Profile {
    fn from(v: ProfileArg) -> Self {
        match v {
            ProfileArg::Quick => Profile::Quick,
            ProfileArg::Full => Profile::Full,
        }
    }
}

/// Overrides for the profile's warm-up/iteration counts.
#[derive(clap::Args, Debug, Clone)]
struct TrialArgs {
    /// Untimed warm-up runs before measuring.
    #[arg(long)]
    warmup: Option<u64>,

    /// Timed runs.
    #[arg(long)]
    iterations: Option<u64>,
}

impl TrialArgs {
    fn apply(&self, defaults: TrialConfig) -> TrialConfig {
        TrialConfig {
            warmup_count: self.warmup.unwrap_or(defaults.warmup_count),
            iteration_count: self.iterations.unwrap_or(defaults.iteration_count),
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
struct MemoryArgs {
    /// Number of f32 elements in the copied buffer.
    #[arg(long, default_value_t = memory::DEFAULT_ELEMENTS)]
    elements: usize,

    /// Worker counts for the split copy. Can be provided multiple times.
    #[arg(long = "workers", value_name = "N", num_args = 1.., action = ArgAction::Append)]
    workers: Vec<usize>,

    /// `pooled` reuses one worker pool and excludes thread start-up from the timing.
    #[arg(long, value_enum, default_value_t = CopyMode::ThreadPerPass)]
    mode: CopyMode,

    #[arg(long, value_enum, default_value_t = BandwidthUnit::GiB)]
    unit: BandwidthUnit,

    /// Memory clock in MHz; adds the theoretical peak bandwidth to the report.
    #[arg(long, value_name = "MHZ")]
    mem_freq_mhz: Option<f64>,

    #[arg(long, default_value_t = 2)]
    channels: u32,

    #[arg(long, default_value_t = 64)]
    bus_width_bits: u32,

    #[command(flatten)]
    trials: TrialArgs,
}

impl MemoryArgs {
    fn config(&self, cfg: &BenchConfig) -> MemoryConfig {
        let defaults = MemoryConfig::for_bench(cfg);
        MemoryConfig {
            elements: self.elements,
            worker_counts: if self.workers.is_empty() {
                defaults.worker_counts.clone()
            } else {
                self.workers.clone()
            },
            mode: self.mode,
            trials: self.trials.apply(defaults.trials),
            unit: self.unit,
            mem_freq_hz: self.mem_freq_mhz.map(|mhz| mhz * 1e6),
            channels: self.channels,
            bus_width_bits: self.bus_width_bits,
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
struct DiskArgs {
    /// Directory for the scratch file. Defaults to a fresh temporary directory.
    #[arg(long, value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Bytes written and read per measurement.
    #[arg(long, default_value_t = disk::DEFAULT_FILE_SIZE)]
    file_size: u64,

    /// Block sizes in bytes. Can be provided multiple times.
    #[arg(long = "block-size", value_name = "BYTES", num_args = 1.., action = ArgAction::Append)]
    block_sizes: Vec<u64>,

    #[arg(long, value_enum, default_value_t = DiskEngine::Native)]
    engine: DiskEngine,

    /// `dd` executable for `--engine dd`.
    #[arg(long, value_name = "PATH")]
    dd_program: Option<PathBuf>,

    /// Skip `sync` + cache drop before each trial.
    #[arg(long, default_value_t = false)]
    no_flush: bool,

    #[command(flatten)]
    trials: TrialArgs,
}

impl DiskArgs {
    fn config(&self, cfg: &BenchConfig, dir: PathBuf) -> DiskConfig {
        let defaults = DiskConfig::for_bench(cfg, dir);
        DiskConfig {
            file_size: self.file_size,
            block_sizes: if self.block_sizes.is_empty() {
                defaults.block_sizes.clone()
            } else {
                self.block_sizes.clone()
            },
            trials: self.trials.apply(defaults.trials),
            engine: self.engine,
            dd_program: self
                .dd_program
                .clone()
                .map_or(defaults.dd_program.clone(), PathBuf::into_os_string),
            flush_cache: !self.no_flush,
            ..defaults
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
struct CpuArgs {
    /// Matrix dimension. Defaults to the profile's size.
    #[arg(long)]
    size: Option<usize>,

    #[command(flatten)]
    trials: TrialArgs,
}

impl CpuArgs {
    fn config(&self, cfg: &BenchConfig) -> LinalgConfig {
        let defaults = LinalgConfig::for_bench(cfg);
        LinalgConfig {
            size: self.size.unwrap_or(defaults.size),
            trials: self.trials.apply(defaults.trials),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// RAM-to-RAM copy bandwidth, single-threaded and split across workers.
    Memory(MemoryArgs),

    /// Sequential disk write/read throughput per block size.
    ///
    /// Set PERF_BENCH_SUDO_PASSWORD to let the cache drop go through `sudo -S`.
    Disk(DiskArgs),

    /// Matrix multiply / inverse / linear solve GFLOP/s.
    Cpu(CpuArgs),

    /// Run all benchmarks with profile defaults.
    Suite {
        /// Which benchmark family to run.
        #[arg(long, value_enum, default_value_t = BenchKind::All)]
        only: BenchKind,

        /// Directory for the disk scratch file.
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = DiskEngine::Native)]
        engine: DiskEngine,

        #[arg(long, default_value_t = false)]
        no_flush: bool,
    },
}

#[derive(Parser, Debug)]
#[command(name = "perf-bench")]
#[command(about = "Disk, memory and CPU micro-benchmarks (JSON output)")]
struct Args {
    #[arg(long, value_enum, default_value_t = ProfileArg::Quick, global = true)]
    profile: ProfileArg,

    #[arg(long, default_value_t = 0, global = true)]
    seed: u64,

    /// Where to write the JSON report. If omitted, prints to stdout.
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    /// Also print a human-readable table to stderr.
    #[arg(long, default_value_t = false, global = true)]
    table: bool,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

fn now_utc_rfc3339() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("unix:{secs}")
}

fn git_sha_short() -> Option<String> {
    // Best-effort: read from environment set by CI/build scripts.
    std::env::var("GIT_SHA")
        .ok()
        .or_else(|| std::env::var("GITHUB_SHA").ok())
        .map(|s| s.chars().take(12).collect())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Scratch directory for the disk sweep: the given one, or a temp dir kept alive by the guard.
fn scratch_dir(dir: &Option<PathBuf>) -> io::Result<(PathBuf, Option<tempfile::TempDir>)> {
    match dir {
        Some(d) => Ok((d.clone(), None)),
        None => {
            let tmp = tempfile::Builder::new().prefix("perf-bench").tempdir()?;
            Ok((tmp.path().to_path_buf(), Some(tmp)))
        }
    }
}

struct Collected {
    measurements: Vec<Measurement>,
    failures: Vec<MeasurementFailure>,
    tables: Vec<String>,
}

fn run_disk(
    cfg: &BenchConfig,
    disk_cfg: &DiskConfig,
    out: &mut Collected,
) -> Result<(), BenchError> {
    let results = disk::sweep(cfg, disk_cfg)?;
    let (measurements, failures) = disk::to_measurements(disk_cfg, &results);
    out.tables.push(report::disk_table(&results));
    out.measurements.extend(measurements);
    out.failures.extend(failures);
    Ok(())
}

fn run(args: &Args) -> Result<(), BenchError> {
    let cfg = BenchConfig {
        profile: args.profile.into(),
        seed: args.seed,
    };

    let mut out = Collected {
        measurements: Vec::new(),
        failures: Vec::new(),
        tables: Vec::new(),
    };

    match &args.cmd {
        Command::Memory(m) => {
            out.measurements.extend(memory::run(&cfg, &m.config(&cfg))?);
        }
        Command::Disk(d) => {
            let (dir, _guard) = scratch_dir(&d.dir)?;
            run_disk(&cfg, &d.config(&cfg, dir), &mut out)?;
        }
        Command::Cpu(c) => {
            out.measurements.extend(linalg::run(&cfg, &c.config(&cfg))?);
        }
        Command::Suite {
            only,
            dir,
            engine,
            no_flush,
        } => {
            if only.includes(BenchKind::Cpu) {
                eprintln!("Running CPU benchmark");
                out.measurements
                    .extend(linalg::run(&cfg, &LinalgConfig::for_bench(&cfg))?);
            }
            if only.includes(BenchKind::Disk) {
                eprintln!("Running Disk IO benchmark");
                let (dir, _guard) = scratch_dir(dir)?;
                let disk_cfg = DiskConfig {
                    engine: *engine,
                    flush_cache: !*no_flush,
                    ..DiskConfig::for_bench(&cfg, dir)
                };
                run_disk(&cfg, &disk_cfg, &mut out)?;
            }
            if only.includes(BenchKind::Memory) {
                eprintln!("Running memory benchmark");
                out.measurements
                    .extend(memory::run(&cfg, &MemoryConfig::for_bench(&cfg))?);
            }
        }
    }

    if args.table {
        eprintln!("{}", report::measurement_table(&out.measurements));
        for t in &out.tables {
            eprintln!("{t}");
        }
    }

    let bench_report = BenchReport {
        run: RunMeta {
            schema_version: 1,
            bench_version: env!("CARGO_PKG_VERSION").to_string(),
            profile: cfg.profile.as_str().to_string(),
            seed: cfg.seed,
            timestamp_utc: now_utc_rfc3339(),
            git_sha: git_sha_short(),
        },
        measurements: out.measurements,
        failures: out.failures,
    };

    let json = serde_json::to_string_pretty(&bench_report).map_err(io::Error::other)?;
    if let Some(path) = &args.out {
        fs::write(path, json)?;
    } else {
        println!("{json}");
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "benchmark run failed");
            ExitCode::FAILURE
        }
    }
}
