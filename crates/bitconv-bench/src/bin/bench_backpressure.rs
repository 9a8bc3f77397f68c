//! Handshake back-pressure sweep over the simulated fabric.
//!
//! Every result chunk waits `latency` strobes before output-valid rises,
//! and the driver keeps streaming (zero) planes meanwhile. A cell therefore
//! costs `15 + 8 × latency` polling cycles:
//!
//!   latency=0:  15 cycles/cell  (8 planes + 7 chunk cycles)
//!   latency=1:  23 cycles/cell
//!   latency=4:  47 cycles/cell
//!
//! Usage:
//!   cargo run --bin bench_backpressure
//!   cargo run --bin bench_backpressure -- --max-latency 32 --step 4 --size 64

use anyhow::{bail, Result};
use bitconv_chip::clock::FABRIC_HZ;
use bitconv_driver::{HandshakeConfig, HandshakeDriver, PerformanceSampler, SimConfig, SimulatedAccelerator};
use bitconv_models::{compare, Image, Kernel, ReferenceConvolver, Shape};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

const DEFAULT_SIZE: usize = 32;
const DEFAULT_CHANNELS: usize = 3;
const DEFAULT_MAX_LATENCY: u32 = 16;
const DEFAULT_STEP: u32 = 2;
const DEFAULT_SEED: u64 = 7;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let size = parse_arg(&args, "--size", DEFAULT_SIZE);
    let channels = parse_arg(&args, "--channels", DEFAULT_CHANNELS);
    let max_latency = parse_arg(&args, "--max-latency", DEFAULT_MAX_LATENCY);
    let step = parse_arg(&args, "--step", DEFAULT_STEP).max(1);
    let seed = parse_arg(&args, "--seed", DEFAULT_SEED);
    let clocks_per_access = parse_arg(
        &args,
        "--clocks-per-access",
        SimConfig::default().clocks_per_access,
    );

    let shape = Shape::new(size, size, channels);
    let mut rng = Xoshiro::new(seed);
    let image = Image::from_fn(shape, |_, _, _| rng.next_byte());
    let kernel = Kernel::CENTER_WEIGHTED;
    let (reference, sw) = ReferenceConvolver::new(kernel)?.convolve_timed(&image)?;

    println!("Handshake back-pressure sweep");
    println!("=============================");
    println!("Image          : {shape} ({} cells), seed {seed}", reference.len());
    println!("Latencies      : 0..={max_latency} step {step}");
    println!("Bus cost       : {clocks_per_access} fabric clocks/access");
    println!("Fabric clock   : {:.0} MHz", FABRIC_HZ / 1e6);
    println!("Software       : {:.3} µs/cell", sw.micros_per_cell());
    println!();
    println!(
        "{:>7}  {:>11}  {:>9}  {:>14}  {:>15}  {:>10}  {:>7}",
        "latency", "cycles/cell", "idle/cell", "compute µs/cell", "overhead µs/cell", "host ms", "verdict"
    );

    let mut latency = 0;
    while latency <= max_latency {
        let sim = SimulatedAccelerator::new(SimConfig {
            response_latency: latency,
            clocks_per_access,
            ..SimConfig::default()
        });
        let budget = HandshakeConfig::DEFAULT_CYCLE_BUDGET.max(64 * (latency + 1));
        let mut driver = HandshakeDriver::new(
            sim,
            HandshakeConfig {
                cycle_budget: budget,
                ..HandshakeConfig::default()
            },
        );

        let start = Instant::now();
        let (fabric, stats) = driver.run(&image, &kernel)?;
        let host_ms = start.elapsed().as_secs_f64() * 1e3;
        let perf = PerformanceSampler::default().sample(driver.registers_mut(), fabric.len())?;
        let comparison = compare(&reference, &fabric)?;

        let idle_per_cell = mean_per_cell(stats.idle_polls, stats.cells);
        println!(
            "{latency:>7}  {:>11.1}  {idle_per_cell:>9.1}  {:>14.3}  {:>15.3}  {host_ms:>10.2}  {:>7}",
            stats.mean_cycles(),
            perf.compute.micros_per_cell(),
            perf.overhead.micros_per_cell(),
            comparison.verdict()
        );

        if !comparison.passed() {
            bail!(
                "latency {latency}: {} of {} cells differ",
                comparison.mismatch_count(),
                comparison.cells()
            );
        }
        latency += step;
    }

    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn mean_per_cell(total: u64, cells: usize) -> f64 {
    if cells == 0 {
        return 0.0;
    }
    total as f64 / cells as f64
}

fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

struct Xoshiro {
    s: [u64; 4],
}

impl Xoshiro {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut z = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
        for slot in &mut s {
            z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
            *slot = z ^ (z >> 31);
        }
        Self { s }
    }

    fn next_u64(&mut self) -> u64 {
        let r = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);
        let t = self.s[1] << 17;
        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];
        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);
        r
    }

    fn next_byte(&mut self) -> u8 {
        self.next_u64().to_le_bytes()[7]
    }
}
