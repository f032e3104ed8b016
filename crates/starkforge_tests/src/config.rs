use std::{path::PathBuf, time::Duration};

use starkforge_cheatcodes::BlockInfo;

use crate::FuzzConfig;

/// How long the aggregator waits for the next result before giving up.
pub const DEFAULT_RESULT_TIMEOUT: Duration = Duration::from_secs(1000);

/// Test runner configuration
#[derive(Clone, Debug)]
pub struct TestRunnerConfig {
    /// Project root directory. Relative targets and contract paths resolve
    /// against it.
    pub project_root: PathBuf,
    /// Number of worker threads running test suites.
    pub workers: usize,
    /// Configuration for fuzz testing
    pub fuzz: FuzzConfig,
    /// Ambient block values seen by contracts without overrides.
    pub block_info: BlockInfo,
    /// Maximum time to wait for a single result.
    pub result_timeout: Duration,
    /// Number of slowest test cases listed in the summary.
    pub slowest_test_cases: usize,
    /// Whether to collect covered source locations
    pub coverage: bool,
}

impl Default for TestRunnerConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            workers: num_cpus::get(),
            fuzz: FuzzConfig::default(),
            block_info: BlockInfo::default(),
            result_timeout: DEFAULT_RESULT_TIMEOUT,
            slowest_test_cases: 0,
            coverage: false,
        }
    }
}
