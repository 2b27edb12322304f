use super::RawMetrics;
use serde::{Deserialize, Serialize};

/// Scale-independent rates, per thousand lines of code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub ffi_density_per_kloc: f64,
    pub unsafe_blocks_per_kloc: f64,
    pub unsafe_fn_per_kloc: f64,
    pub no_mangle_per_kloc: f64,
    pub extern_c_per_kloc: f64,
}

impl DerivedMetrics {
    /// Compute the rates; a workspace with zero lines yields all zeros.
    #[must_use]
    pub fn from_raw(raw: &RawMetrics) -> Self {
        if raw.total_lines == 0 {
            return Self::default();
        }

        let per_kloc = |count: u64| per_kloc(count, raw.total_lines);

        Self {
            ffi_density_per_kloc: per_kloc(raw.ffi_constructs()),
            unsafe_blocks_per_kloc: per_kloc(raw.unsafe_count),
            unsafe_fn_per_kloc: per_kloc(raw.unsafe_fn_count),
            no_mangle_per_kloc: per_kloc(raw.no_mangle),
            extern_c_per_kloc: per_kloc(raw.extern_c),
        }
    }
}

#[expect(clippy::cast_precision_loss, reason = "line and construct counts are far below 2^52")]
fn per_kloc(count: u64, total_lines: u64) -> f64 {
    count as f64 * 1000.0 / total_lines as f64
}
