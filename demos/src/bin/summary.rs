use anyhow::{Context, Result};
use burn::{prelude::*, tensor::Distribution};
use clap::Parser;
use segnets_burn::SegNet;
use segnets_demos::{create_device, get_backend_name, init_tracing, ModelArgs, SelectedBackend};

type B = SelectedBackend;

/// Build a segmentation network, run one random forward pass and print its shapes and size.
#[derive(Parser, Debug)]
#[command(name = "summary")]
struct Cli {
    #[command(flatten)]
    model: ModelArgs,

    /// Batch size of the random input
    #[arg(long, default_value_t = 1)]
    batch: usize,

    /// Height and width of the random input
    #[arg(short, long, default_value_t = 256)]
    size: usize,

    /// Also print the module tree
    #[arg(long)]
    print_model: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let device = create_device();
    let config = cli.model.to_config()?;
    println!("Backend: {}", get_backend_name());
    println!(
        "Config: {}",
        serde_json::to_string_pretty(&config).context("failed to serialize config")?
    );

    let model = config.init::<B>(&device)?;
    if cli.print_model {
        match &model {
            SegNet::ENet(model) => println!("{model}"),
            SegNet::PspNet(model) => println!("{model}"),
            SegNet::RefineNet(model) => println!("{model}"),
        }
    }

    let x = Tensor::<B, 4>::random(
        [cli.batch, config.bands(), cli.size, cli.size],
        Distribution::Normal(0.0, 1.0),
        &device,
    );
    let input_shape = x.dims();
    let output = model.forward(x)?;

    println!("Params(M): {:.3}", model.num_params() as f64 / 1e6);
    println!("Input  shape: {input_shape:?}");
    println!("Output shape: {:?}", output.logits.dims());
    if let Some(aux) = output.aux {
        println!("Aux    shape: {:?}", aux.dims());
    }

    Ok(())
}
