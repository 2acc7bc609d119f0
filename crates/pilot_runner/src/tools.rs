//! Discovery of local command-line tools.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Locates executables on the host.
pub trait ToolProbe: Send + Sync {
    /// Full path of `tool`, or `None` when it is not installed.
    fn locate(&self, tool: &str) -> Option<PathBuf>;
}

/// Looks tools up on `PATH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemToolProbe;

impl ToolProbe for SystemToolProbe {
    fn locate(&self, tool: &str) -> Option<PathBuf> {
        which::which(tool).ok()
    }
}

/// Fixed set of tools, for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct StaticToolProbe {
    tools: BTreeMap<String, PathBuf>,
}

impl StaticToolProbe {
    pub fn new<I, S>(tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tools = tools
            .into_iter()
            .map(|t| {
                let t = t.into();
                let path = PathBuf::from("/usr/bin").join(&t);
                (t, path)
            })
            .collect();
        Self { tools }
    }
}

impl ToolProbe for StaticToolProbe {
    fn locate(&self, tool: &str) -> Option<PathBuf> {
        self.tools.get(tool).cloned()
    }
}
