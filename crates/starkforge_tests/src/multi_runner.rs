//! Test runner that runs every collected suite on a pool of workers.

use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use starkforge_cheatcodes::{CheatcodeDependencies, ContractVm, CoveredLocation};
use starkforge_common::Compiler;

use crate::{
    CollectionResult, ReportedException, SharedRunState, SuiteRunner, TargetExpr, TestCollector,
    TestResult, TestRunnerConfig, TestRunnerError, TestSuite, TestingSeed, TestingSummary,
    result::{BrokenTestSuiteResult, CapturedOutput},
};

/// Everything a finished run produced.
#[derive(Debug)]
pub struct TestRunResult {
    pub summary: TestingSummary,
    /// Sorted, without duplicates. Empty unless coverage is enabled.
    pub covered_locations: Vec<CoveredLocation>,
}

/// Collects and runs test suites.
pub struct TestRunner {
    config: Arc<TestRunnerConfig>,
    vm: Arc<dyn ContractVm>,
    compiler: Arc<dyn Compiler>,
}

impl TestRunner {
    /// Creates a runner for the project at `config.project_root`.
    pub async fn new(
        mut config: TestRunnerConfig,
        vm: Arc<dyn ContractVm>,
        compiler: Arc<dyn Compiler>,
    ) -> Result<Self, TestRunnerError> {
        // Canonicalization touches the file system, hence the blocking thread
        let project_root = config.project_root.clone();
        config.project_root = tokio::task::spawn_blocking(move || {
            dunce::canonicalize(project_root).map_err(TestRunnerError::InvalidProjectRoot)
        })
        .await??;

        Ok(Self {
            config: Arc::new(config),
            vm,
            compiler,
        })
    }

    pub fn config(&self) -> &TestRunnerConfig {
        &self.config
    }

    pub fn project_root(&self) -> &Path {
        &self.config.project_root
    }

    /// Collects the suites selected by `targets`, minus `ignored`.
    pub fn collect(
        &self,
        targets: &[TargetExpr],
        ignored: &[TargetExpr],
        default_test_suite_glob: Option<&str>,
    ) -> Result<CollectionResult, TestRunnerError> {
        TestCollector::new(Arc::clone(&self.compiler), self.config.project_root.clone()).collect(
            targets,
            ignored,
            default_test_suite_glob,
        )
    }

    /// Runs every collected suite. See [`run_with`](Self::run_with).
    pub async fn run(&self, collection: CollectionResult) -> Result<TestRunResult, TestRunnerError> {
        self.run_with(collection, |_| {}).await
    }

    /// Runs every collected suite, calling `on_result` with each result as
    /// it arrives.
    ///
    /// Suites that failed to collect are reported first. The run is
    /// abandoned on an interrupt or if the next result or coverage report
    /// does not arrive in time.
    pub async fn run_with(
        &self,
        collection: CollectionResult,
        mut on_result: impl FnMut(&TestResult),
    ) -> Result<TestRunResult, TestRunnerError> {
        let start = Instant::now();
        let testing_seed = Arc::new(TestingSeed::new(self.config.fuzz.seed));
        let shared_state = Arc::new(SharedRunState::new(
            &collection,
            self.config.result_timeout,
        ));
        let mut summary = TestingSummary::new(
            Arc::clone(&testing_seed),
            collection.test_suites.len() + collection.broken_test_suites.len(),
            collection.test_cases_count,
        );
        let mut remaining = collection.expected_results_count();

        let CollectionResult {
            test_suites,
            broken_test_suites,
            ..
        } = collection;
        for broken in broken_test_suites {
            shared_state.put_result(TestResult::Broken(BrokenTestSuiteResult {
                file_path: broken.test_path,
                test_case_names: Vec::new(),
                exception: ReportedException::compilation(&broken.error),
                captured_output: CapturedOutput::new(),
            }))?;
        }

        let suites_count = test_suites.len();
        debug!(
            suites = suites_count,
            workers = self.config.workers,
            "running test suites"
        );
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut workers = tokio::task::spawn_blocking({
            let config = Arc::clone(&self.config);
            let dependencies = CheatcodeDependencies {
                vm: Arc::clone(&self.vm),
                compiler: Arc::clone(&self.compiler),
                project_root: self.config.project_root.clone(),
            };
            let shared_state = Arc::clone(&shared_state);
            let testing_seed = Arc::clone(&testing_seed);
            let cancelled = Arc::clone(&cancelled);
            move || {
                run_suites(
                    &test_suites,
                    dependencies,
                    &config,
                    &shared_state,
                    &testing_seed,
                    &cancelled,
                )
            }
        });

        let drained = async {
            let mut workers_done = false;
            let mut listening_for_interrupt = true;
            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);

            while remaining > 0 {
                tokio::select! {
                    result = shared_state.get_result() => {
                        let result = result?;
                        remaining = remaining.saturating_sub(result.weight());
                        on_result(&result);
                        summary.push(result);
                    }
                    joined = &mut workers, if !workers_done => {
                        workers_done = true;
                        joined??;
                    }
                    interrupted = &mut ctrl_c, if listening_for_interrupt => {
                        listening_for_interrupt = false;
                        match interrupted {
                            Ok(()) => return Err(TestRunnerError::Interrupted),
                            Err(error) => warn!(%error, "cannot listen for interrupts"),
                        }
                    }
                }
            }
            if !workers_done {
                (&mut workers).await??;
            }
            Ok::<_, TestRunnerError>(())
        }
        .await;
        if let Err(error) = drained {
            cancelled.store(true, Ordering::Relaxed);
            return Err(error);
        }

        let mut covered_locations = Vec::new();
        if self.config.coverage {
            for _ in 0..suites_count {
                covered_locations.extend(shared_state.get_covered_locations().await?);
            }
        }
        covered_locations.sort_unstable();
        covered_locations.dedup();

        info!(
            duration = ?start.elapsed(),
            passed = summary.passed(),
            failed = summary.failed(),
            broken = summary.broken(),
            "test run finished"
        );
        Ok(TestRunResult {
            summary,
            covered_locations,
        })
    }
}

fn run_suites(
    test_suites: &[TestSuite],
    dependencies: CheatcodeDependencies,
    config: &TestRunnerConfig,
    shared_state: &SharedRunState,
    testing_seed: &TestingSeed,
    cancelled: &AtomicBool,
) -> Result<(), TestRunnerError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers)
        .thread_name(|index| format!("starkforge-worker-{index}"))
        .build()?;

    pool.install(|| {
        test_suites.par_iter().try_for_each(|suite| {
            if cancelled.load(Ordering::Relaxed) {
                return Ok(());
            }
            SuiteRunner::new(
                suite,
                dependencies.clone(),
                config,
                shared_state,
                testing_seed,
                cancelled,
            )
            .run()
        })
    })?;
    Ok(())
}
