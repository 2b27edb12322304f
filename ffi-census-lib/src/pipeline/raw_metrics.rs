use crate::Result;
use ohno::{IntoAppError, bail};
use serde::{Deserialize, Serialize};

/// Highest payload schema version this adapter understands.
pub const PAYLOAD_SCHEMA: u32 = 1;

/// Counts reported by the metrics tool for one workspace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMetrics {
    pub total_lines: u64,
    pub extern_c: u64,
    pub link_attrs: u64,
    pub no_mangle: u64,
    pub unsafe_count: u64,
    pub unsafe_fn_count: u64,
    pub ffi_files: u64,
    pub syntax_tree_height: u64,
}

/// The tool's stdout payload.
///
/// Every field is optional so a tool that omits (or has not yet learned) a count still
/// parses; unknown fields are ignored. Aliases cover the names older tool builds used.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ToolPayload {
    schema: Option<u32>,
    #[serde(alias = "lines")]
    total_lines: u64,
    #[serde(alias = "extern_c_blocks")]
    extern_c: u64,
    #[serde(alias = "link_attr")]
    link_attrs: u64,
    #[serde(alias = "no_mangle_fns")]
    no_mangle: u64,
    #[serde(alias = "unsafe_count")]
    unsafe_blocks: u64,
    #[serde(alias = "unsafe_fn_count")]
    unsafe_fns: u64,
    #[serde(alias = "files_with_ffi")]
    ffi_files: u64,
    #[serde(alias = "syntax_tree_height", alias = "max_depth")]
    max_syntax_depth: u64,
}

impl RawMetrics {
    /// Parse the tool's JSON payload.
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        let payload: ToolPayload = serde_json::from_slice(payload).into_app_err("parsing metrics tool output")?;

        if let Some(schema) = payload.schema
            && schema > PAYLOAD_SCHEMA
        {
            bail!("metrics tool output uses schema {schema}, newest supported is {PAYLOAD_SCHEMA}");
        }

        Ok(Self {
            total_lines: payload.total_lines,
            extern_c: payload.extern_c,
            link_attrs: payload.link_attrs,
            no_mangle: payload.no_mangle,
            unsafe_count: payload.unsafe_blocks,
            unsafe_fn_count: payload.unsafe_fns,
            ffi_files: payload.ffi_files,
            syntax_tree_height: payload.max_syntax_depth,
        })
    }

    /// Sum of every boundary construct and unsafe site.
    #[must_use]
    pub const fn ffi_constructs(&self) -> u64 {
        self.extern_c + self.link_attrs + self.no_mangle + self.unsafe_count + self.unsafe_fn_count
    }
}
