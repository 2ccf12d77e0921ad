//! cppcheck step configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Executable invoked when no other binary is configured.
pub const DEFAULT_BINARY: &str = "cppcheck";

/// Flag asking cppcheck for the version 2 XML report on stderr.
pub const XML_VERSION_FLAG: &str = "--xml-version=2";

/// Default timeout for one cppcheck invocation.
pub const DEFAULT_TIMEOUT_SECS: u64 = 1200;

/// Configuration for one cppcheck step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CppCheckConfig {
    /// Executable to run.
    pub binary: String,

    /// Extra arguments appended after the XML flag (paths, `--enable=...`).
    pub args: Vec<String>,

    /// Report the verbose message of each issue instead of the short one.
    pub verbose: bool,

    /// Timeout in seconds; 0 waits forever.
    pub timeout_secs: u64,

    /// Working directory; the host's current directory if unset.
    pub workdir: Option<PathBuf>,
}

impl Default for CppCheckConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            args: Vec::new(),
            verbose: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            workdir: None,
        }
    }
}

impl CppCheckConfig {
    /// Create a configuration with the given extra arguments.
    pub fn new(args: Vec<String>) -> Self {
        Self {
            args,
            ..Self::default()
        }
    }

    /// Select verbose messages.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Run another executable (a wrapper script, a pinned cppcheck build).
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    /// Full command line: binary, XML flag, then the extra arguments.
    pub fn command(&self) -> Vec<String> {
        let mut command = Vec::with_capacity(self.args.len() + 2);
        command.push(self.binary.clone());
        command.push(XML_VERSION_FLAG.to_string());
        command.extend(self.args.iter().cloned());
        command
    }
}
