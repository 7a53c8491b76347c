//! Distance metrics
//!
//! The native library knows two metrics, L2 and inner product. Harness
//! datasets spell them `"euclidean"` and `"ip"`, the native tools spell them
//! `"L2"` and `"IP"`; both spellings are parsed here.

use std::cmp::Ordering;
use std::fmt;

/// Scalar (non-SIMD) kernels
pub mod scalar;

pub use scalar::{inner_product, l2_squared};

/// Distance metric types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Metric {
    /// Squared Euclidean distance, smaller is closer
    L2,
    /// Inner product, larger is closer
    #[serde(rename = "IP")]
    InnerProduct,
}

impl Metric {
    /// Parse the distance name a harness dataset reports
    pub fn from_harness_name(name: &str) -> Option<Self> {
        match name {
            "euclidean" => Some(Metric::L2),
            "ip" => Some(Metric::InnerProduct),
            _ => None,
        }
    }

    /// Parse the native library's metric name
    pub fn from_native_name(name: &str) -> Option<Self> {
        match name {
            "L2" => Some(Metric::L2),
            "IP" => Some(Metric::InnerProduct),
            _ => None,
        }
    }

    /// Distance name harness datasets use
    pub fn harness_name(&self) -> &'static str {
        match self {
            Metric::L2 => "euclidean",
            Metric::InnerProduct => "ip",
        }
    }

    /// Native library's metric name
    pub fn native_name(&self) -> &'static str {
        match self {
            Metric::L2 => "L2",
            Metric::InnerProduct => "IP",
        }
    }

    /// Score of `b` relative to query `a` under this metric
    #[inline]
    pub fn score<T: crate::VectorElement>(&self, a: &[T], b: &[T]) -> f32 {
        match self {
            Metric::L2 => l2_squared(a, b),
            Metric::InnerProduct => inner_product(a, b),
        }
    }

    /// Order two scores best-first
    #[inline]
    pub fn compare(&self, a: f32, b: f32) -> Ordering {
        match self {
            Metric::L2 => a.total_cmp(&b),
            Metric::InnerProduct => b.total_cmp(&a),
        }
    }

    /// True if `score` is at least as good as `bound`
    #[inline]
    pub fn within(&self, score: f32, bound: f32) -> bool {
        self.compare(score, bound) != Ordering::Greater
    }

    /// Score that every real score beats, used to pad short result rows
    pub fn worst_score(&self) -> f32 {
        match self {
            Metric::L2 => f32::MAX,
            Metric::InnerProduct => f32::MIN,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.native_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert_eq!(Metric::from_harness_name("euclidean"), Some(Metric::L2));
        assert_eq!(Metric::from_harness_name("ip"), Some(Metric::InnerProduct));
        assert_eq!(Metric::from_harness_name("angular"), None);
        assert_eq!(Metric::from_native_name("IP"), Some(Metric::InnerProduct));
        assert_eq!(Metric::from_native_name("l2"), None);
        assert_eq!(Metric::InnerProduct.to_string(), "IP");
    }

    #[test]
    fn test_ordering_follows_metric_direction() {
        assert_eq!(Metric::L2.compare(1.0, 2.0), Ordering::Less);
        assert_eq!(Metric::InnerProduct.compare(1.0, 2.0), Ordering::Greater);
        assert!(Metric::L2.within(2.0, 2.0));
        assert!(!Metric::L2.within(2.5, 2.0));
        assert!(Metric::InnerProduct.within(2.5, 2.0));
        assert!(Metric::L2.within(1e30, Metric::L2.worst_score()));
    }

    #[test]
    fn test_serde_uses_native_names() {
        let json = serde_json::to_string(&Metric::InnerProduct).unwrap();
        assert_eq!(json, "\"IP\"");
        let back: Metric = serde_json::from_str("\"L2\"").unwrap();
        assert_eq!(back, Metric::L2);
    }
}
