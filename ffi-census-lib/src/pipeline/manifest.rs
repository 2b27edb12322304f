use crate::Result;
use ohno::IntoAppError;
use std::fs;
use std::io::Write;
use std::path::Path;

/// The relative file paths a sparse acquisition is allowed to materialize, in manifest order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilePathManifest {
    paths: Vec<String>,
}

impl FilePathManifest {
    #[must_use]
    pub fn new(paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse newline-delimited text, dropping blank lines and surrounding whitespace.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        Self::new(text.lines().map(str::trim).filter(|line| !line.is_empty()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).into_app_err_with(|| format!("reading manifest '{}'", path.display()))?;
        Ok(Self::parse(&text))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).into_app_err_with(|| format!("unable to create directory '{}'", parent.display()))?;
        }

        let mut file = fs::File::create(path).into_app_err_with(|| format!("unable to create manifest '{}'", path.display()))?;
        for p in &self.paths {
            writeln!(file, "{p}").into_app_err_with(|| format!("unable to write manifest '{}'", path.display()))?;
        }

        Ok(())
    }

    #[must_use]
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.paths.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
