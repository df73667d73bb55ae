//! Pass / fail / skip bookkeeping for `pmwatch run`

use pm_watch::{Result, SubtestOutcome};

pub struct ValidationSuite {
    verbose: bool,
    passed: usize,
    failed: usize,
    skipped: usize,
}

impl ValidationSuite {
    pub const fn new(verbose: bool) -> Self {
        Self { verbose, passed: 0, failed: 0, skipped: 0 }
    }

    /// Run one subtest; `false` when the error means later subtests cannot
    /// be trusted either
    pub fn run<F>(&mut self, name: &str, f: F) -> bool
    where
        F: FnOnce() -> Result<SubtestOutcome>,
    {
        print!("  {name:<40} ");
        match f() {
            Ok(SubtestOutcome::Pass) => {
                println!("✓ PASS");
                self.passed += 1;
            }
            Ok(SubtestOutcome::Skip(reason)) => {
                println!("─ SKIP");
                if self.verbose {
                    println!("         {reason}");
                }
                self.skipped += 1;
            }
            Ok(SubtestOutcome::Fail(reason)) => {
                println!("✗ FAIL");
                println!("         {reason}");
                self.failed += 1;
            }
            Err(e) => {
                println!("✗ ERROR");
                println!("         {e}");
                self.failed += 1;
                if e.is_fatal() {
                    println!("  Remaining subtests aborted");
                    return false;
                }
            }
        }
        true
    }

    /// Print the summary; `true` when nothing failed
    pub fn finish(&self) -> bool {
        let total = self.passed + self.failed + self.skipped;
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!(
            "Result: {} passed, {} failed, {} skipped  ({}/{})",
            self.passed, self.failed, self.skipped, self.passed, total
        );
        if self.failed == 0 {
            println!("All subtests passed ✓");
            true
        } else {
            println!("VALIDATION FAILED: {} subtest(s) require attention", self.failed);
            false
        }
    }
}
