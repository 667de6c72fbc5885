use clap::Parser;
use em_dataset::{
    init_tracing, load_all, reader_for, AugmentPipeline, FlipAugment, PipelineConfig, Sampler,
    SamplerConfig, SamplerMode, TracingObserver, VolumeFormat,
};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Load datasets, build a sampler, and report what a few draws look like.
#[derive(Debug, Parser)]
#[command(name = "em-probe")]
struct ProbeArgs {
    /// TOML config (defaults to $EM_DATASET_CONFIG or ./em-dataset.toml).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the base data directory.
    #[arg(long)]
    base_dir: Option<PathBuf>,
    /// Dataset ids to load (repeatable); overrides the config list.
    #[arg(long = "data-id")]
    data_ids: Vec<String>,
    /// Class keys (repeatable); overrides the config list.
    #[arg(long = "class-key")]
    class_keys: Vec<String>,
    /// Volume file format: h5 or npy.
    #[arg(long)]
    format: Option<VolumeFormat>,
    /// Number of samples to draw.
    #[arg(long, default_value_t = 100)]
    draws: usize,
    #[arg(long)]
    seed: Option<u64>,
    /// Use validation masks instead of training masks.
    #[arg(long, default_value_t = false)]
    eval: bool,
    /// Apply random flips to each draw.
    #[arg(long, default_value_t = false)]
    flip: bool,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = ProbeArgs::parse();

    let mut cfg = match &args.config {
        Some(path) => PipelineConfig::from_path(path)?,
        None => PipelineConfig::load()?,
    };
    if let Some(dir) = args.base_dir {
        cfg.base_dir = dir;
    }
    if !args.data_ids.is_empty() {
        cfg.data_ids = Some(args.data_ids);
    }
    if !args.class_keys.is_empty() {
        cfg.class_keys = args.class_keys;
    }
    if let Some(format) = args.format {
        cfg.format = format;
    }
    if args.seed.is_some() {
        cfg.sampler.seed = args.seed;
    }
    if args.eval {
        cfg.sampler.mode = SamplerMode::Eval;
    }

    let reader = reader_for(cfg.format)?;
    let data = load_all(
        &cfg.families,
        &cfg.base_dir,
        &cfg.request()?,
        reader.as_ref(),
        &TracingObserver,
    )?;
    if data.is_empty() {
        anyhow::bail!("no datasets loaded from {}", cfg.base_dir.display());
    }
    println!("loaded {} dataset(s)", data.len());
    for (tag, bundle) in &data {
        let channels: Vec<_> = bundle.channels().map(|c| c.as_str()).collect();
        println!("  {tag}: {}", channels.join(","));
    }

    let augment = args.flip.then(|| {
        Box::new(AugmentPipeline::builder().flip(FlipAugment::default()).build())
            as Box<dyn em_dataset::Augment>
    });
    let mut sampler = Sampler::new(
        &data,
        cfg.sample_spec()?,
        SamplerConfig {
            mode: cfg.sampler.mode,
            augment,
            weights: cfg.sampler.weights.clone(),
            seed: cfg.sampler.seed,
            ..Default::default()
        },
    )?;
    println!("{}", sampler.describe());

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut shapes: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for _ in 0..args.draws {
        let sample = sampler.sample()?;
        for (name, patch) in &sample.streams {
            shapes
                .entry(name.clone())
                .or_insert_with(|| patch.shape().to_vec());
        }
        *counts.entry(sample.tag).or_default() += 1;
    }
    println!("draws per tag ({} total):", args.draws);
    for (tag, p) in sampler.tags().into_iter().zip(sampler.probabilities()) {
        let n = counts.get(tag).copied().unwrap_or(0);
        let frac = n as f64 / args.draws.max(1) as f64;
        println!("  {tag}: {n} ({frac:.3}, expected {p:.3})");
    }
    println!("stream shapes:");
    for (name, shape) in shapes {
        println!("  {name}: {shape:?}");
    }
    Ok(())
}
