//! Compile Config

use std::path::PathBuf;

use clap::Args;
use edge_promo::compiler::batch::{BatchOptions, SelectionWindow};
use jiff::{Timestamp, Zoned, civil::Date};

/// Which promotions a batch selects by date.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum WindowStrategy {
    /// Promotions valid today
    Current,

    /// Also promotions starting within `--future-days` or ended within `--past-days`
    IncludeFuture,

    /// Every active promotion
    AllActive,
}

/// Fixture and batch settings.
#[derive(Debug, Args)]
pub struct CompileConfig {
    /// Directory holding the `reference/`, `promotions/` and `bills/` fixture folders
    #[arg(long, env = "EDGE_PROMO_FIXTURES", default_value = "crates/core/fixtures")]
    pub fixtures_dir: PathBuf,

    /// Fixture set name
    #[arg(long, env = "EDGE_PROMO_SET", default_value = "nusantara")]
    pub set: String,

    /// Date selection strategy
    #[arg(long, env = "EDGE_PROMO_WINDOW", value_enum, default_value_t = WindowStrategy::Current)]
    pub window: WindowStrategy,

    /// Days ahead for `include-future`
    #[arg(long, env = "EDGE_PROMO_FUTURE_DAYS", default_value_t = 7)]
    pub future_days: u32,

    /// Days back for `include-future`
    #[arg(long, env = "EDGE_PROMO_PAST_DAYS", default_value_t = 0)]
    pub past_days: u32,

    /// Store-local date to compile for; defaults to today in the system time zone
    #[arg(long, env = "EDGE_PROMO_TODAY")]
    pub today: Option<Date>,
}

impl CompileConfig {
    /// Selection window built from the strategy flags.
    pub fn selection_window(&self) -> SelectionWindow {
        match self.window {
            WindowStrategy::Current => SelectionWindow::CurrentOnly,
            WindowStrategy::IncludeFuture => SelectionWindow::IncludeFuture {
                future_days: self.future_days,
                past_days: self.past_days,
            },
            WindowStrategy::AllActive => SelectionWindow::AllActive,
        }
    }

    /// Batch options stamped with `compiled_at`.
    pub fn batch_options(&self, compiled_at: Timestamp) -> BatchOptions {
        BatchOptions {
            today: self.today.unwrap_or_else(|| Zoned::now().date()),
            compiled_at,
            window: self.selection_window(),
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use jiff::civil::date;
    use testresult::TestResult;

    use super::*;

    #[derive(Debug, Parser)]
    struct Harness {
        #[command(flatten)]
        compile: CompileConfig,
    }

    #[test]
    fn include_future_carries_the_day_counts() -> TestResult {
        let harness = Harness::try_parse_from([
            "edge-promo",
            "--window",
            "include-future",
            "--future-days",
            "14",
            "--past-days",
            "2",
            "--today",
            "2026-03-14",
        ])?;

        let options = harness
            .compile
            .batch_options(Timestamp::from_second(1_773_446_400)?);

        assert_eq!(options.today, date(2026, 3, 14));
        assert_eq!(
            options.window,
            SelectionWindow::IncludeFuture {
                future_days: 14,
                past_days: 2
            }
        );

        Ok(())
    }

    #[test]
    fn defaults_select_current_promotions() -> TestResult {
        let harness = Harness::try_parse_from(["edge-promo"])?;

        assert_eq!(harness.compile.set, "nusantara");
        assert_eq!(
            harness.compile.selection_window(),
            SelectionWindow::CurrentOnly
        );

        Ok(())
    }

    #[test]
    fn rejects_malformed_dates() {
        let result = Harness::try_parse_from(["edge-promo", "--today", "14/03/2026"]);

        assert!(result.is_err());
    }
}
