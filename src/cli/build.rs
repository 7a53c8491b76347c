//! Index building command
//!
//! Builds an index from a `.bin` vector file with the reference backend and
//! the same knobs the native build tool takes.

use clap::Args;
use console::style;
use std::path::PathBuf;
use std::time::Instant;

use super::{parse_data_type, parse_metric, spinner};
use crate::native::flat::FlatLibrary;
use crate::native::IndexFactory;
use crate::params::BBAnnParameters;
use crate::PAGE_SIZE;

/// Arguments of the `build` command
#[derive(Args)]
pub struct BuildArgs {
    /// Element type of the data file (float, int8, uint8)
    #[arg(short = 't', long)]
    pub data_type: String,

    /// Path to the input .bin vector file
    #[arg(short, long)]
    pub data: PathBuf,

    /// Directory the index files are written to
    #[arg(short, long)]
    pub output: PathBuf,

    /// HNSW out-degree over block centroids
    #[arg(long, default_value = "32")]
    pub hnsw_m: u32,

    /// HNSW construction beam width
    #[arg(long, default_value = "500")]
    pub hnsw_ef_c: u32,

    /// Distance metric (L2, IP)
    #[arg(short = 'm', long, default_value = "L2")]
    pub metric: String,

    /// Number of first-level clusters
    #[arg(long, default_value = "20")]
    pub k1: u32,

    /// Disk block size in 4 KiB pages
    #[arg(long, default_value = "1")]
    pub pages_per_block: u64,

    /// Store block vectors scalar-quantized
    #[arg(long)]
    pub vector_use_sq: bool,

    /// Store HNSW centroids scalar-quantized
    #[arg(long)]
    pub use_hnsw_sq: bool,
}

impl BuildArgs {
    /// Build parameters for these arguments
    pub fn parameters(&self) -> crate::Result<BBAnnParameters> {
        if self.pages_per_block == 0 {
            return Err(anyhow::anyhow!("--pages-per-block must be at least 1"));
        }
        Ok(BBAnnParameters {
            data_file_path: self.data.to_string_lossy().into_owned(),
            index_prefix_path: index_prefix(&self.output),
            metric: parse_metric(&self.metric)?,
            hnsw_m: self.hnsw_m,
            hnsw_ef_c: self.hnsw_ef_c,
            k1: self.k1,
            block_size: self.pages_per_block * PAGE_SIZE,
            vector_use_sq: self.vector_use_sq,
            use_hnsw_sq: self.use_hnsw_sq,
            ..BBAnnParameters::default()
        })
    }
}

/// Index files live inside the output directory
pub(crate) fn index_prefix(dir: &std::path::Path) -> String {
    let mut prefix = dir.to_string_lossy().into_owned();
    if !prefix.ends_with('/') {
        prefix.push('/');
    }
    prefix
}

/// Build an index and save it under the output directory
pub fn run(args: BuildArgs, cli: &crate::Cli) -> crate::Result<()> {
    let start_time = Instant::now();

    let data_type = parse_data_type(&args.data_type)?;
    let params = args.parameters()?;

    if !cli.no_progress {
        println!("{}", style("📊 Building BBAnn Index").bold().green());
        println!("  Data: {}", args.data.display());
        println!("  Output: {}", params.index_prefix_path);
        println!("  Type: {}", data_type);
        println!("  Metric: {}", params.metric);
        println!("  K1: {}", params.k1);
        println!("  Block size: {} bytes", params.block_size);
        println!();
    }

    if cli.verbose {
        for (name, value) in params.to_options() {
            println!("  {} = {}", name, value);
        }
    }

    let mut index = FlatLibrary.create(data_type, params.metric);

    let pb = spinner(cli, "Building index...");
    let result = index.build(&params);
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    result?;

    let elapsed = start_time.elapsed();
    if !cli.no_progress {
        println!(
            "🎉 Index built successfully in {}",
            style(humantime::format_duration(elapsed)).bold().green()
        );
        println!("📁 Saved to: {}", params.index_prefix_path);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::Metric;

    fn args(output: &str) -> BuildArgs {
        BuildArgs {
            data_type: "uint8".to_string(),
            data: PathBuf::from("base.u8bin"),
            output: PathBuf::from(output),
            hnsw_m: 16,
            hnsw_ef_c: 200,
            metric: "IP".to_string(),
            k1: 64,
            pages_per_block: 2,
            vector_use_sq: true,
            use_hnsw_sq: false,
        }
    }

    #[test]
    fn test_parameters_from_args() {
        let params = args("/tmp/idx").parameters().unwrap();
        assert_eq!(params.index_prefix_path, "/tmp/idx/");
        assert_eq!(params.block_size, 8192);
        assert_eq!(params.metric, Metric::InnerProduct);
        assert_eq!(params.k1, 64);
        assert!(params.vector_use_sq);
        assert_eq!(params.n_probe, BBAnnParameters::default().n_probe);
    }

    #[test]
    fn test_prefix_keeps_existing_slash() {
        assert_eq!(index_prefix(std::path::Path::new("idx/")), "idx/");
    }

    #[test]
    fn test_zero_pages_rejected() {
        let mut a = args("idx");
        a.pages_per_block = 0;
        assert!(a.parameters().is_err());
    }
}
