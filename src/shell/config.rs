//! Subprocess runner configuration

/// Configuration for the subprocess runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Timeout for a single command in seconds
    pub timeout_secs: u64,

    /// Extra environment variables set on every child process
    pub env: Vec<(String, String)>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 600,
            env: Vec::new(),
        }
    }
}

impl RunnerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}
