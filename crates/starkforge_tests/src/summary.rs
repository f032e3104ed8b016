use std::{collections::BTreeMap, path::Path, sync::Arc};

use comfy_table::{Cell, Color, Table, presets::NOTHING};
use yansi::Paint;

use crate::{
    FormatContext, TestResult, TestRunnerError, TestingSeed, formatter::format_execution_time,
};

const HEADER_WIDTH: usize = "Test suites: ".len();

/// Aggregated results of a test run.
#[derive(Debug)]
pub struct TestingSummary {
    testing_seed: Arc<TestingSeed>,
    /// Number of suites and cases the run collected, broken suites included.
    collected_test_suites_count: usize,
    collected_test_cases_count: usize,
    results: Vec<TestResult>,
}

#[derive(Clone, Copy, Default)]
struct Counts {
    broken: usize,
    failed: usize,
    passed: usize,
}

impl TestingSummary {
    pub fn new(
        testing_seed: Arc<TestingSeed>,
        collected_test_suites_count: usize,
        collected_test_cases_count: usize,
    ) -> Self {
        Self {
            testing_seed,
            collected_test_suites_count,
            collected_test_cases_count,
            results: Vec::new(),
        }
    }

    pub fn push(&mut self, result: TestResult) {
        self.results.push(result);
    }

    pub fn extend(&mut self, results: impl IntoIterator<Item = TestResult>) {
        self.results.extend(results);
    }

    /// Results in arrival order.
    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    pub fn testing_seed(&self) -> &TestingSeed {
        &self.testing_seed
    }

    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.is_passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.is_failed()).count()
    }

    /// Number of broken suite results.
    pub fn broken(&self) -> usize {
        self.results.iter().filter(|r| r.is_broken()).count()
    }

    /// Collected cases that produced neither a pass nor a failure.
    pub fn skipped(&self) -> usize {
        self.collected_test_cases_count
            .saturating_sub(self.passed() + self.failed())
    }

    /// Errors unless every collected case passed.
    pub fn assert_all_passed(&self) -> Result<(), TestRunnerError> {
        if self.failed() > 0 || self.broken() > 0 {
            return Err(TestRunnerError::NotAllPassed);
        }
        Ok(())
    }

    fn suite_counts(&self) -> Counts {
        let mut suites = BTreeMap::<&Path, Counts>::new();
        for result in &self.results {
            let suite = suites.entry(result.file_path()).or_default();
            if result.is_broken() {
                suite.broken += 1;
            } else if result.is_failed() {
                suite.failed += 1;
            } else {
                suite.passed += 1;
            }
        }

        let mut counts = Counts::default();
        for suite in suites.values() {
            if suite.broken > 0 {
                counts.broken += 1;
            } else if suite.failed > 0 {
                counts.failed += 1;
            } else if suite.passed > 0 {
                counts.passed += 1;
            }
        }
        counts
    }

    /// Renders the summary printed at the end of a run, preceded by the
    /// `slowest_test_cases` slowest cases when that is nonzero.
    pub fn render(&self, ctx: &FormatContext, slowest_test_cases: usize) -> String {
        let mut lines = Vec::new();

        if let Some(table) = self.slowest_test_cases_table(ctx, slowest_test_cases) {
            lines.push(ctx.bold("Slowest test cases:").to_string());
            lines.push(table);
            lines.push(String::new());
        }

        lines.push(format!(
            "{}{}",
            header(ctx, "Test suites:"),
            format_counts(ctx, self.suite_counts(), self.collected_test_suites_count)
        ));
        lines.push(format!(
            "{}{}",
            header(ctx, "Tests:"),
            format_counts(
                ctx,
                Counts {
                    broken: 0,
                    failed: self.failed(),
                    passed: self.passed(),
                },
                self.collected_test_cases_count
            )
        ));
        if self.testing_seed.was_used() {
            lines.push(format!(
                "{}{}",
                header(ctx, "Seed:"),
                self.testing_seed.value()
            ));
        }

        lines.join("\n")
    }

    fn slowest_test_cases_table(&self, ctx: &FormatContext, count: usize) -> Option<String> {
        let mut timed: Vec<_> = self
            .results
            .iter()
            .filter_map(|result| Some((result, result.execution_time()?)))
            .collect();
        if count == 0 || timed.is_empty() {
            return None;
        }
        timed.sort_by(|(_, a), (_, b)| b.cmp(a));

        let mut table = Table::new();
        table.load_preset(NOTHING);
        if ctx.colorize {
            table.enforce_styling();
        } else {
            table.force_no_tty();
        }
        for (i, (result, execution_time)) in timed.into_iter().take(count).enumerate() {
            table.add_row([
                Cell::new(format!("{}.", i + 1)).fg(Color::Cyan),
                Cell::new(ctx.display_path(result.file_path())).fg(Color::DarkGrey),
                Cell::new(result.test_case_name().unwrap_or_default()),
                Cell::new(format!("({})", format_execution_time(ctx, execution_time)))
                    .fg(Color::DarkGrey),
            ]);
        }
        Some(
            table
                .lines()
                .map(|line| line.trim_end().to_string())
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }
}

fn header(ctx: &FormatContext, name: &str) -> String {
    ctx.bold(format!("{name:<width$}", width = HEADER_WIDTH))
        .to_string()
}

fn format_counts(ctx: &FormatContext, counts: Counts, total: usize) -> String {
    let skipped = total.saturating_sub(counts.broken + counts.failed + counts.passed);
    let mut parts = Vec::new();
    if counts.broken > 0 {
        parts.push(ctx.paint(format!("{} broken", counts.broken).red()).to_string());
    }
    if counts.failed > 0 {
        parts.push(ctx.paint(format!("{} failed", counts.failed).red()).to_string());
    }
    if skipped > 0 {
        parts.push(ctx.paint(format!("{skipped} skipped").yellow()).to_string());
    }
    if counts.passed > 0 {
        parts.push(ctx.paint(format!("{} passed", counts.passed).green()).to_string());
    }
    if total > 0 {
        parts.push(format!("{total} total"));
    }
    parts.join(", ")
}
