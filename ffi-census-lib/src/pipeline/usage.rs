use super::FilePathManifest;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};

/// The role a source file plays, guessed from its path.
///
/// Variants are listed in priority order: a path lands in the first category whose
/// predicate matches one of its segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum UsageCategory {
    Kernel,
    Driver,
    Sandbox,
    Library,
    Other,
}

impl UsageCategory {
    fn matches_segment(self, segment: &str) -> bool {
        match self {
            Self::Kernel => segment.contains("kernel"),
            Self::Driver => segment.contains("driver") || segment == "drv",
            Self::Sandbox => segment.contains("sandbox"),
            Self::Library => matches!(segment, "lib" | "libs") || segment.contains("library"),
            Self::Other => true,
        }
    }

    /// Classify a single relative path.
    #[must_use]
    pub fn of_path(path: &str) -> Self {
        let segments: Vec<String> = path
            .split(['/', '\\'])
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
            .collect();

        Self::iter()
            .find(|category| *category == Self::Other || segments.iter().any(|s| category.matches_segment(s)))
            .unwrap_or(Self::Other)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounts {
    pub kernel: u64,
    pub driver: u64,
    pub sandbox: u64,
    pub library: u64,
    pub other: u64,
}

impl UsageCounts {
    const fn slot(&mut self, category: UsageCategory) -> &mut u64 {
        match category {
            UsageCategory::Kernel => &mut self.kernel,
            UsageCategory::Driver => &mut self.driver,
            UsageCategory::Sandbox => &mut self.sandbox,
            UsageCategory::Library => &mut self.library,
            UsageCategory::Other => &mut self.other,
        }
    }

    #[must_use]
    pub const fn total(&self) -> u64 {
        self.kernel + self.driver + self.sandbox + self.library + self.other
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageClassification {
    pub usage: UsageCounts,

    /// Mean number of path separators per manifest entry
    pub average_file_depth: f64,
}

/// Bucket every manifest path into exactly one usage category and compute mean path depth.
#[must_use]
#[expect(clippy::cast_precision_loss, reason = "path counts and depths are far below 2^52")]
pub fn classify(manifest: &FilePathManifest) -> UsageClassification {
    let mut usage = UsageCounts::default();
    let mut separators = 0u64;

    for path in manifest.paths() {
        *usage.slot(UsageCategory::of_path(path)) += 1;
        separators += path.matches('/').count() as u64;
    }

    let average_file_depth = if manifest.is_empty() {
        0.0
    } else {
        separators as f64 / manifest.len() as f64
    };

    UsageClassification { usage, average_file_depth }
}
