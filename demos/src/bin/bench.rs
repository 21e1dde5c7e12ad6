use std::time::Instant;

use anyhow::Result;
use burn::prelude::*;
use clap::Parser;
use segnets_demos::{create_device, get_backend_name, init_tracing, ModelArgs, SelectedBackend};

type B = SelectedBackend;

/// Time repeated forward passes of a segmentation network.
#[derive(Parser, Debug)]
#[command(name = "bench")]
struct Cli {
    #[command(flatten)]
    model: ModelArgs,

    /// Batch size of the input
    #[arg(long, default_value_t = 1)]
    batch: usize,

    /// Height and width of the input
    #[arg(short, long, default_value_t = 256)]
    size: usize,

    /// Untimed forward passes before measuring
    #[arg(long, default_value_t = 2)]
    warmup: usize,

    /// Timed forward passes
    #[arg(short, long, default_value_t = 20)]
    iterations: usize,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let device = create_device();
    let config = cli.model.to_config()?;
    let model = config.init::<B>(&device)?;
    let shape = [cli.batch, config.bands(), cli.size, cli.size];

    tracing::info!(
        backend = get_backend_name(),
        architecture = ?config.architecture(),
        ?shape,
        "starting benchmark"
    );

    for _ in 0..cli.warmup {
        let x = Tensor::<B, 4>::zeros(shape, &device);
        // Reading the data back forces lazy backends to run the graph.
        let _ = model.forward(x)?.logits.into_data();
    }

    let start = Instant::now();
    let mut timings = Vec::with_capacity(cli.iterations);
    for _ in 0..cli.iterations {
        let start_ = Instant::now();
        let x = Tensor::<B, 4>::zeros(shape, &device);
        let _ = model.forward(x)?.logits.into_data();
        timings.push(start_.elapsed());
    }
    let total = start.elapsed();

    if let (Some(min), Some(max)) = (timings.iter().min(), timings.iter().max()) {
        let mean = total / cli.iterations as u32;
        println!("Backend: {}", get_backend_name());
        println!(
            "Total time: {total:?}, Speed: {:.2} it/s",
            cli.iterations as f32 / total.as_secs_f32()
        );
        println!("Per iteration: mean {mean:?}, min {min:?}, max {max:?}");
    } else {
        println!("No iterations run");
    }

    Ok(())
}
