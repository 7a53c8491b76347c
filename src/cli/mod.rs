//! Command-line interface modules for BBAnn
//!
//! This module contains all CLI command implementations.

/// `build` command
pub mod build;
/// `info` command
pub mod info;
/// `run` command
pub mod run;
/// `search` command
pub mod search;

use crate::distance::Metric;
use crate::types::DataType;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Parse a metric given either as `L2`/`IP` or as `euclidean`/`ip`
pub fn parse_metric(name: &str) -> crate::Result<Metric> {
    Metric::from_native_name(name)
        .or_else(|| Metric::from_harness_name(&name.to_lowercase()))
        .ok_or_else(|| anyhow::anyhow!("Invalid distance metric: {} (expected L2 or IP)", name))
}

/// Parse an element type (`float`, `int8`, `uint8`)
pub fn parse_data_type(name: &str) -> crate::Result<DataType> {
    DataType::parse(name)
        .ok_or_else(|| anyhow::anyhow!("Invalid data type: {} (expected float, int8 or uint8)", name))
}

/// Spinner for a step of unknown length, `None` when progress output is off
pub(crate) fn spinner(cli: &crate::Cli, msg: &str) -> Option<ProgressBar> {
    if cli.no_progress {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metric_spellings() {
        assert_eq!(parse_metric("L2").unwrap(), Metric::L2);
        assert_eq!(parse_metric("euclidean").unwrap(), Metric::L2);
        assert_eq!(parse_metric("IP").unwrap(), Metric::InnerProduct);
        assert_eq!(parse_metric("ip").unwrap(), Metric::InnerProduct);
        assert!(parse_metric("cosine").is_err());
    }

    #[test]
    fn test_parse_data_type() {
        assert_eq!(parse_data_type("float").unwrap(), DataType::Float32);
        assert_eq!(parse_data_type("uint8").unwrap(), DataType::UInt8);
        assert!(parse_data_type("float16").is_err());
    }
}
