//! `bitconv`: host harness for the bit-serial 5×5 convolution fabric.
//!
//! ```text
//! USAGE:
//!   bitconv run        Convolve on the fabric via /dev/mem and verify
//!   bitconv simulate   Same flow against the simulated fabric
//!   bitconv reference  Software convolution only
//!   bitconv probe      Dump the status and counter registers
//! ```
//!
//! `run` and `simulate` exit with status 2 when the fabric disagrees with
//! the software reference, and 1 on any fatal error.

use anyhow::{Context, Result};
use bitconv_driver::{
    select_backend, BackendOptions, BackendSelection, BridgeBackend, BridgeConfig, CancelToken,
    Fault, HandshakeConfig, HandshakeDriver, PerformanceSampler, ReadRegister, RegisterInterface,
    SimConfig, StatusWord,
};
use bitconv_models::{compare, load_image, write_output, Kernel, ReferenceConvolver};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bitconv", about = "Bit-serial 5x5 convolution fabric harness", version)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Convolve on the programmed fabric and verify against software.
    Run {
        #[command(flatten)]
        job: JobArgs,
        #[command(flatten)]
        bridge: BridgeArgs,
    },
    /// Convolve on the simulated fabric and verify against software.
    Simulate {
        #[command(flatten)]
        job: JobArgs,
        #[command(flatten)]
        sim: SimArgs,
    },
    /// Software convolution only.
    Reference {
        /// Input image.
        #[arg(short, long, default_value = "input_x.txt")]
        input: PathBuf,
        /// Where to write the software output tensor.
        #[arg(short, long, default_value = "output_sw.txt")]
        output: PathBuf,
    },
    /// Read the status and counter registers once.
    Probe {
        #[command(flatten)]
        bridge: BridgeArgs,
    },
}

#[derive(Args)]
struct JobArgs {
    /// Input image: "height width channels" then the samples.
    #[arg(short, long, default_value = "input_x.txt")]
    input: PathBuf,
    /// Where to write the fabric output tensor.
    #[arg(short, long, default_value = "output_fpga.txt")]
    output: PathBuf,
    /// Polling cycles per cell before the fabric counts as unresponsive.
    #[arg(long, default_value_t = HandshakeConfig::DEFAULT_CYCLE_BUDGET)]
    cycle_budget: u32,
    /// Poll fabric-ready before every transfer.
    #[arg(long)]
    wait_for_ready: bool,
    /// Cancel the run after this many seconds.
    #[arg(long)]
    deadline_secs: Option<f64>,
}

impl JobArgs {
    fn handshake(&self) -> HandshakeConfig {
        HandshakeConfig {
            cycle_budget: self.cycle_budget,
            wait_for_ready: self.wait_for_ready,
        }
    }
}

#[derive(Args)]
struct BridgeArgs {
    /// Physical base of the lightweight bridge (decimal or 0x-prefixed hex).
    #[arg(long, default_value = "0xFF200000", value_parser = parse_address)]
    base: u64,
    /// Physical-memory device.
    #[arg(long, default_value = bitconv_chip::bridge::DEV_MEM)]
    device: PathBuf,
}

impl BridgeArgs {
    fn config(&self) -> BridgeConfig {
        BridgeConfig {
            device_path: self.device.clone(),
            base: self.base,
            ..BridgeConfig::default()
        }
    }
}

#[derive(Args)]
struct SimArgs {
    /// Strobes between a chunk falling due and output-valid rising.
    #[arg(long, default_value_t = 0)]
    latency: u32,
    /// Fabric clocks charged to READ_COUNT2 per bus access.
    #[arg(long, default_value_t = SimConfig::default().clocks_per_access)]
    clocks_per_access: u32,
    /// Status reads after each reset during which fabric-ready stays low.
    #[arg(long, default_value_t = 0)]
    ready_after_reset: u32,
    /// Inject a fault.
    #[arg(long, value_enum)]
    fault: Option<FaultKind>,
    /// Cell ordinal hit by `--fault corrupt-cell`.
    #[arg(long, default_value_t = 0)]
    fault_cell: usize,
    /// Bits flipped by `--fault corrupt-cell`.
    #[arg(long, default_value_t = 1)]
    fault_xor: u16,
}

#[derive(Clone, Copy, ValueEnum)]
enum FaultKind {
    /// Never present a result
    Unresponsive,
    /// Flip bits in one cell's result
    CorruptCell,
    /// Keep output-valid high after the last chunk
    Chatty,
}

impl SimArgs {
    fn config(&self) -> SimConfig {
        SimConfig {
            response_latency: self.latency,
            clocks_per_access: self.clocks_per_access,
            ready_after_reset: self.ready_after_reset,
            fault: self.fault.map(|kind| match kind {
                FaultKind::Unresponsive => Fault::Unresponsive,
                FaultKind::CorruptCell => Fault::CorruptCell {
                    ordinal: self.fault_cell,
                    xor: self.fault_xor,
                },
                FaultKind::Chatty => Fault::ChattyAfterDone,
            }),
        }
    }
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Cmd::Run { job, bridge } => {
            let options = BackendOptions {
                bridge: bridge.config(),
                ..BackendOptions::default()
            };
            cmd_verify(&job, BackendSelection::Bridge, &options)
        }
        Cmd::Simulate { job, sim } => {
            let options = BackendOptions {
                sim: sim.config(),
                ..BackendOptions::default()
            };
            cmd_verify(&job, BackendSelection::Software, &options)
        }
        Cmd::Reference { input, output } => {
            cmd_reference(&input, &output)?;
            Ok(ExitCode::SUCCESS)
        }
        Cmd::Probe { bridge } => {
            cmd_probe(&bridge.config())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn cmd_verify(
    job: &JobArgs,
    selection: BackendSelection,
    options: &BackendOptions,
) -> Result<ExitCode> {
    let image = load_image(&job.input)
        .with_context(|| format!("Cannot load {}", job.input.display()))?;
    let shape = image.shape();
    println!(
        "Image dimensions: {} rows, {} columns, {} channels",
        shape.height, shape.width, shape.channels
    );

    let kernel = Kernel::CENTER_WEIGHTED;
    let (reference, timing) = ReferenceConvolver::new(kernel)?.convolve_timed(&image)?;
    println!("\n{timing}");

    let regs = select_backend(selection, options).context("Cannot open register backend")?;
    let mut driver =
        HandshakeDriver::new(regs, job.handshake()).with_cancel(watchdog(job.deadline_secs)?);

    let (fabric, stats) = driver.run(&image, &kernel).context("Fabric run aborted")?;
    info!(
        "Polling: {:.1} cycles/cell (min {}, max {}), {} idle polls",
        stats.mean_cycles(),
        stats.min_cycles,
        stats.max_cycles,
        stats.idle_polls
    );

    let perf = PerformanceSampler::default().sample(driver.registers_mut(), fabric.len())?;
    println!("\n{perf}");

    let comparison = compare(&reference, &fabric)?;
    for m in comparison.mismatches() {
        eprintln!(
            "Mismatch at {}: software {} fabric {}",
            m.cell, m.reference, m.accelerator
        );
    }
    let unlisted = comparison.mismatch_count() - comparison.mismatches().len();
    if unlisted > 0 {
        eprintln!("... and {unlisted} more");
    }
    println!("\n{}", comparison.verdict());

    write_output(&job.output, &fabric)
        .with_context(|| format!("Cannot write {}", job.output.display()))?;

    Ok(if comparison.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

fn cmd_reference(input: &Path, output: &Path) -> Result<()> {
    let image = load_image(input).with_context(|| format!("Cannot load {}", input.display()))?;
    let (tensor, timing) =
        ReferenceConvolver::new(Kernel::CENTER_WEIGHTED)?.convolve_timed(&image)?;
    println!("{timing}");
    write_output(output, &tensor).with_context(|| format!("Cannot write {}", output.display()))?;
    Ok(())
}

fn cmd_probe(config: &BridgeConfig) -> Result<()> {
    let mut bridge = BridgeBackend::open(config)
        .with_context(|| format!("Cannot map bridge at {:#x}", config.base))?;

    let raw = bridge.read(ReadRegister::Status)?;
    let status = StatusWord::decode(raw);
    let compute = bridge.read(ReadRegister::ComputeCount)?;
    let overhead = bridge.read(ReadRegister::OverheadCount)?;

    println!("Bridge       : {:#x} via {}", config.base, config.device_path.display());
    println!(
        "READ         : {raw:#010x}  fabric_ready={} output_valid={} chunk={:#04b}",
        u8::from(status.fabric_ready),
        u8::from(status.output_valid),
        status.chunk
    );
    println!("READ_COUNT   : {compute}");
    println!("READ_COUNT2  : {overhead}");
    Ok(())
}

/// Token that fires after `deadline_secs`, or never.
fn watchdog(deadline_secs: Option<f64>) -> Result<CancelToken> {
    let token = CancelToken::new();
    if let Some(secs) = deadline_secs {
        let deadline = Duration::try_from_secs_f64(secs)
            .with_context(|| format!("Invalid deadline {secs}"))?;
        let fire = token.clone();
        std::thread::spawn(move || {
            std::thread::sleep(deadline);
            warn!("Deadline of {secs}s reached, cancelling");
            fire.cancel();
        });
    }
    Ok(token)
}

fn parse_address(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid address {s:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn addresses_parse_as_hex_or_decimal() {
        assert_eq!(parse_address("0xFF200000"), Ok(0xFF20_0000));
        assert_eq!(parse_address("0xff20_0000"), Ok(0xFF20_0000));
        assert_eq!(parse_address("4096"), Ok(4096));
        assert!(parse_address("0xZZ").is_err());
    }

    #[test]
    fn corrupt_fault_carries_cell_and_bits() {
        let cli = Cli::parse_from([
            "bitconv",
            "simulate",
            "--fault",
            "corrupt-cell",
            "--fault-cell",
            "3",
            "--fault-xor",
            "8",
        ]);
        let Cmd::Simulate { sim, job } = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(
            sim.config().fault,
            Some(Fault::CorruptCell { ordinal: 3, xor: 8 })
        );
        assert_eq!(job.input, PathBuf::from("input_x.txt"));
        assert_eq!(job.cycle_budget, HandshakeConfig::DEFAULT_CYCLE_BUDGET);
    }

    #[test]
    fn run_defaults_to_lightweight_bridge() {
        let cli = Cli::parse_from(["bitconv", "run"]);
        let Cmd::Run { bridge, .. } = cli.command else {
            panic!("expected run");
        };
        assert_eq!(bridge.config(), BridgeConfig::default());
    }

    #[test]
    fn negative_deadline_is_rejected() {
        assert!(watchdog(Some(-1.0)).is_err());
        assert!(!watchdog(None).unwrap().is_cancelled());
    }
}
