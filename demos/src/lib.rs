//! Shared plumbing for the `summary` and `bench` binaries: backend selection, logging setup
//! and the command line flags that describe a model.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use segnets_burn::{
    Architecture, ENetConfig, PspBackbone, PspNetConfig, RefineNetConfig, ResNetDepth,
    SegNetConfig,
};

mod backend;

pub use backend::*;

/// Installs a `tracing` subscriber filtered by `RUST_LOG` (warnings and above by default).
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();
}

/// Flags selecting and configuring a segmentation network.
#[derive(Args, Debug)]
pub struct ModelArgs {
    /// JSON model configuration; overrides every other model flag
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Architecture: enet, pspnet or refinenet
    #[arg(short, long, default_value = "pspnet")]
    pub arch: Architecture,

    /// Number of input bands
    #[arg(short, long, default_value_t = 6)]
    pub bands: usize,

    /// Number of output classes
    #[arg(short = 'n', long, default_value_t = 3)]
    pub num_classes: usize,

    /// PSPNet encoder: resnet50 or mobilenet
    #[arg(long, default_value = "resnet50")]
    pub backbone: PspBackbone,

    /// PSPNet encoder output stride (8 or 16)
    #[arg(long, default_value_t = 8)]
    pub downsample_factor: usize,

    /// Build the PSPNet auxiliary classifier
    #[arg(long)]
    pub aux: bool,

    /// RefineNet encoder depth: 18, 34, 50, 101 or 152
    #[arg(long, default_value_t = 50)]
    pub depth: usize,

    /// Use PReLU instead of ReLU in ENet
    #[arg(long)]
    pub prelu: bool,
}

impl ModelArgs {
    /// Builds the validated model configuration described by the flags.
    pub fn to_config(&self) -> Result<SegNetConfig> {
        if let Some(path) = &self.config {
            return SegNetConfig::load_validated(path)
                .with_context(|| format!("failed to load model config {}", path.display()));
        }

        let config = match self.arch {
            Architecture::ENet => SegNetConfig::ENet(
                ENetConfig::new()
                    .with_bands(self.bands)
                    .with_num_classes(self.num_classes)
                    .with_encoder_relu(!self.prelu)
                    .with_decoder_relu(!self.prelu),
            ),
            Architecture::PspNet => SegNetConfig::PspNet(
                PspNetConfig::new(self.num_classes)
                    .with_bands(self.bands)
                    .with_backbone(self.backbone.clone())
                    .with_downsample_factor(self.downsample_factor)
                    .with_aux_branch(self.aux),
            ),
            Architecture::RefineNet => SegNetConfig::RefineNet(
                RefineNetConfig::new()
                    .with_depth(resnet_depth(self.depth)?)
                    .with_bands(self.bands)
                    .with_num_classes(self.num_classes),
            ),
        };
        config.validate().context("invalid model flags")?;
        Ok(config)
    }
}

fn resnet_depth(depth: usize) -> Result<ResNetDepth> {
    Ok(match depth {
        18 => ResNetDepth::ResNet18,
        34 => ResNetDepth::ResNet34,
        50 => ResNetDepth::ResNet50,
        101 => ResNetDepth::ResNet101,
        152 => ResNetDepth::ResNet152,
        _ => bail!("unsupported ResNet depth {depth}, use 18, 34, 50, 101 or 152"),
    })
}
