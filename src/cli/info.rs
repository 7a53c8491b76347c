//! Information and analysis command
//!
//! Prints the header of `.bin` vector files and summaries of knn and range
//! answer files.

use clap::Args;
use console::style;
use std::path::{Path, PathBuf};

use super::parse_data_type;
use crate::formats::{read_any_bin_file, read_bin_metadata, read_knn_file, read_range_file, BinMetadata};

/// Arguments of the `info` command
#[derive(Args)]
pub struct InfoArgs {
    /// Path to file to analyze
    #[arg(short, long)]
    pub input: PathBuf,

    /// File kind (bin, knn, range)
    #[arg(long, default_value = "bin")]
    pub kind: String,

    /// Element type, needed to check sizes and preview vectors
    #[arg(short = 't', long)]
    pub data_type: Option<String>,

    /// Show first N rows
    #[arg(long)]
    pub preview: Option<usize>,
}

/// Print information about a file
pub fn run(args: InfoArgs, cli: &crate::Cli) -> crate::Result<()> {
    if !cli.no_progress {
        println!("{}", style("ℹ️  File Analysis").bold().blue());
        println!("  File: {}", args.input.display());
        println!("  File size: {}", format_file_size(&args.input)?);
        println!();
    }

    match args.kind.as_str() {
        "bin" => analyze_vectors(&args),
        "knn" => analyze_knn(&args),
        "range" => analyze_range(&args),
        other => Err(anyhow::anyhow!("Unsupported file kind: {}", other)),
    }
}

fn analyze_vectors(args: &InfoArgs) -> crate::Result<()> {
    let meta = read_bin_metadata(&args.input)?;
    println!("📊 Vectors:");
    println!("  Points: {}", style(meta.num_points).bold().green());
    println!("  Dimension: {}", style(meta.dim).bold().green());

    let data_type = match &args.data_type {
        Some(name) => parse_data_type(name)?,
        None => return Ok(()),
    };

    let actual = std::fs::metadata(&args.input)?.len();
    let expected = meta.file_size(data_type);
    if actual == expected {
        println!("  Size check: {} ({})", style("ok").green(), data_type);
    } else {
        println!(
            "  Size check: {} expected {} bytes for {}, found {}",
            style("mismatch").red().bold(),
            expected,
            data_type,
            actual
        );
        return Ok(());
    }

    if let Some(n) = args.preview {
        let vectors = read_any_bin_file(&args.input, data_type)?;
        show_preview(&meta, n, |i| vectors.row_f32(i));
    }
    Ok(())
}

fn show_preview(meta: &BinMetadata, n: usize, row: impl Fn(usize) -> Vec<f32>) {
    let shown = n.min(meta.num_points as usize);
    println!("\n🔎 First {} vectors:", shown);
    for i in 0..shown {
        let values = row(i);
        let head: Vec<String> = values.iter().take(8).map(|v| format!("{}", v)).collect();
        let more = if values.len() > 8 { ", ..." } else { "" };
        println!("  {}: [{}{}]", style(i).cyan(), head.join(", "), more);
    }
}

fn analyze_knn(args: &InfoArgs) -> crate::Result<()> {
    let res = read_knn_file(&args.input)?;
    println!("📊 k-NN answers:");
    println!("  Queries: {}", style(res.num_queries()).bold().green());
    println!("  k: {}", style(res.k()).bold().green());

    if let Some(n) = args.preview {
        for q in 0..n.min(res.num_queries()) {
            println!("  {}: {:?}", style(q).cyan(), res.neighbors(q));
        }
    }
    Ok(())
}

fn analyze_range(args: &InfoArgs) -> crate::Result<()> {
    let res = read_range_file(&args.input)?;
    let nq = res.num_queries();
    let total = res.ids().len();
    let empty = (0..nq).filter(|&q| res.query_ids(q).is_empty()).count();

    println!("📊 Range answers:");
    println!("  Queries: {}", style(nq).bold().green());
    println!("  Total results: {}", style(total).bold().green());
    if nq > 0 {
        println!("  Mean per query: {:.2}", total as f64 / nq as f64);
    }
    println!("  Queries without results: {}", empty);

    if let Some(n) = args.preview {
        for q in 0..n.min(nq) {
            println!("  {}: {:?}", style(q).cyan(), res.query_ids(q));
        }
    }
    Ok(())
}

fn format_file_size(path: &Path) -> crate::Result<String> {
    let bytes = std::fs::metadata(path)?.len();
    let units = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < units.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    Ok(format!("{:.2} {}", size, units[unit]))
}
