//! linecrypt - record-by-record encryption for line-oriented files
//!
//! Usage:
//!   linecrypt keygen [--out FILE]          - Generate a hex key
//!   linecrypt encrypt SRC --ciphertext F --ledger F
//!   linecrypt decrypt CT --ledger F --output F [--verify SRC]
//!   linecrypt roundtrip SRC                - SRC.E.csv, SRC.row, SRC.D.csv

use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use linecrypt_core::constants::{
    DEFAULT_MAX_RECORD_LEN, DEFAULT_QUEUE_CAP, DEFAULT_RECLAIM_EVERY_ROWS, DEFAULT_WORKERS,
};
use linecrypt_core::prelude::*;

/// Encrypt newline-delimited records through a bounded worker pool
#[derive(Parser)]
#[command(name = "linecrypt", version)]
#[command(about = "Record-by-record authenticated encryption with a length ledger", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print the run report as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new random key (hex)
    Keygen {
        /// Write the key here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,

        /// Overwrite an existing key file
        #[arg(long)]
        force: bool,
    },

    /// Encrypt each record of SOURCE into an envelope stream plus ledger
    Encrypt {
        source: PathBuf,

        #[arg(long)]
        ciphertext: PathBuf,

        #[arg(long)]
        ledger: PathBuf,

        #[command(flatten)]
        key: KeyArgs,

        #[command(flatten)]
        pool: PoolArgs,
    },

    /// Decrypt an envelope stream framed by its ledger
    Decrypt {
        ciphertext: PathBuf,

        #[arg(long)]
        ledger: PathBuf,

        #[arg(long)]
        output: PathBuf,

        /// Compare every recovered record with this source file
        #[arg(long)]
        verify: Option<PathBuf>,

        #[command(flatten)]
        key: KeyArgs,

        #[command(flatten)]
        pool: PoolArgs,
    },

    /// Encrypt SOURCE, then decrypt it again and verify against SOURCE
    Roundtrip {
        source: PathBuf,

        #[command(flatten)]
        key: KeyArgs,

        #[command(flatten)]
        pool: PoolArgs,
    },
}

#[derive(Args)]
struct KeyArgs {
    /// File holding the 32-byte key as hex
    #[arg(long, env = "LINECRYPT_KEY_FILE")]
    key_file: PathBuf,
}

#[derive(Args)]
struct PoolArgs {
    /// Transform workers
    #[arg(long, env = "LINECRYPT_WORKERS", default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Capacity of the input and output queues
    #[arg(long, env = "LINECRYPT_QUEUE_CAP", default_value_t = DEFAULT_QUEUE_CAP)]
    queue_cap: usize,

    /// Rows between memory reclamation passes
    #[arg(long, env = "LINECRYPT_RECLAIM_EVERY", default_value_t = DEFAULT_RECLAIM_EVERY_ROWS)]
    reclaim_every: u64,

    /// Longest accepted record in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_RECORD_LEN)]
    max_record_len: usize,

    /// Size the pool from available cores and memory (overrides --workers / --queue-cap)
    #[arg(long)]
    auto: bool,

    /// Skip records that fail authentication instead of aborting
    #[arg(long)]
    collect_failures: bool,
}

impl PoolArgs {
    fn to_config(&self) -> PipelineConfig {
        let profile = if self.auto {
            ParallelismProfile::dynamic(self.max_record_len, 0.25, 4096)
        } else {
            ParallelismProfile::new(self.workers, self.queue_cap, self.queue_cap)
        };
        let policy = if self.collect_failures { FailurePolicy::Collect } else { FailurePolicy::FailFast };

        PipelineConfig::new(profile)
            .with_reclaim_every(self.reclaim_every)
            .with_max_record_len(self.max_record_len)
            .with_failure_policy(policy)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for reports and keys.
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("linecrypt={}", log_level).parse()?)
                .add_directive(format!("linecrypt_core={}", log_level).parse()?),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Keygen { out, force } => cmd_keygen(out.as_deref(), force),
        Commands::Encrypt { source, ciphertext, ledger, key, pool } => {
            let snap = run_encrypt(&source, &ciphertext, &ledger, &load_key(&key.key_file)?, &pool.to_config())?;
            report("encrypt", &snap, cli.json)
        }
        Commands::Decrypt { ciphertext, ledger, output, verify, key, pool } => {
            let snap = run_decrypt(
                &ciphertext,
                &ledger,
                &output,
                verify.as_deref(),
                &load_key(&key.key_file)?,
                &pool.to_config(),
            )?;
            report("decrypt", &snap, cli.json)
        }
        Commands::Roundtrip { source, key, pool } => cmd_roundtrip(&source, &load_key(&key.key_file)?, &pool, cli.json),
    }
}

// ============ KEYS ============

fn cmd_keygen(out: Option<&Path>, force: bool) -> Result<()> {
    let key = generate_key().context("cannot obtain key material from the OS")?;
    let text = format!("{}\n", key.to_hex());

    match out {
        None => print!("{text}"),
        Some(path) => {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .create_new(!force)
                .truncate(true)
                .open(path)
                .with_context(|| format!("cannot create key file {}", path.display()))?;
            file.write_all(text.as_bytes())?;
            file.sync_all()?;
            tracing::info!(path = %path.display(), "key written");
        }
    }
    Ok(())
}

fn load_key(path: &Path) -> Result<SecretKey> {
    let text = fs::read_to_string(path).with_context(|| format!("cannot read key file {}", path.display()))?;
    SecretKey::from_hex(&text).with_context(|| format!("invalid key in {}", path.display()))
}

// ============ RUNS ============

fn run_encrypt(
    source: &Path,
    ciphertext: &Path,
    ledger: &Path,
    key: &SecretKey,
    config: &PipelineConfig,
) -> Result<TelemetrySnapshot> {
    tracing::info!(source = %source.display(), "encrypting");
    encrypt_records(
        InputSource::File(source.to_path_buf()),
        OutputSink::File(ciphertext.to_path_buf()),
        OutputSink::File(ledger.to_path_buf()),
        key,
        config,
    )
    .with_context(|| format!("encrypt of {} failed", source.display()))
}

fn run_decrypt(
    ciphertext: &Path,
    ledger: &Path,
    output: &Path,
    verify: Option<&Path>,
    key: &SecretKey,
    config: &PipelineConfig,
) -> Result<TelemetrySnapshot> {
    tracing::info!(ciphertext = %ciphertext.display(), verify = verify.is_some(), "decrypting");
    decrypt_records(
        InputSource::File(ciphertext.to_path_buf()),
        InputSource::File(ledger.to_path_buf()),
        OutputSink::File(output.to_path_buf()),
        key,
        config,
        verify.map(|p| InputSource::File(p.to_path_buf())),
    )
    .with_context(|| format!("decrypt of {} failed", ciphertext.display()))
}

/// `<source>.E.csv`, `<source>.row`, `<source>.D.csv`
fn derived_paths(source: &Path) -> (PathBuf, PathBuf, PathBuf) {
    let with = |suffix: &str| {
        let mut name: OsString = source.as_os_str().to_owned();
        name.push(suffix);
        PathBuf::from(name)
    };
    (with(".E.csv"), with(".row"), with(".D.csv"))
}

fn cmd_roundtrip(source: &Path, key: &SecretKey, pool: &PoolArgs, json: bool) -> Result<()> {
    if !source.is_file() {
        bail!("source {} is not a file", source.display());
    }
    let config = pool.to_config();
    let (ciphertext, ledger, decrypted) = derived_paths(source);

    let enc = run_encrypt(source, &ciphertext, &ledger, key, &config)?;
    let dec = run_decrypt(&ciphertext, &ledger, &decrypted, Some(source), key, &config)?;

    report("encrypt", &enc, json)?;
    report("decrypt", &dec, json)?;
    if !json {
        println!("verified {} records against {}", dec.records_written(), source.display());
    }
    Ok(())
}

// ============ REPORT ============

fn report(label: &str, snap: &TelemetrySnapshot, json: bool) -> Result<()> {
    if json {
        println!("{}", snap.to_json()?);
        return Ok(());
    }

    let c = &snap.counters;
    println!("{label}:");
    println!("  records        {}", c.records_written);
    println!("  ledger entries {}", c.ledger_entries);
    println!("  plaintext      {} bytes", c.bytes_plaintext);
    println!("  envelopes      {} bytes", c.bytes_envelope);
    println!("  elapsed        {:.3} s", snap.elapsed.as_secs_f64());
    println!("  throughput     {:.1} MiB/s", snap.throughput_plaintext_bytes_per_sec / (1024.0 * 1024.0));
    println!(
        "  peaks          input {} / output {} / reorder {}",
        c.peak_input_queue, c.peak_output_queue, c.peak_reorder_depth
    );
    if c.reclaim_passes > 0 {
        println!(
            "  reclaim        {} passes, peak resident {:.1} MiB",
            c.reclaim_passes,
            c.peak_resident_bytes as f64 / (1024.0 * 1024.0)
        );
    }
    for (stage, dur) in snap.stage_times.iter() {
        println!("  {:<14} {:.3} ms", stage.to_string(), dur.as_secs_f64() * 1000.0);
    }
    if !snap.failures.is_empty() {
        println!("  skipped        {} records", snap.failures.len());
        for f in &snap.failures {
            println!("    #{}: {}", f.index, f.reason);
        }
    }
    Ok(())
}
