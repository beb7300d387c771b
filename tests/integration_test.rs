//! Integration tests for the strategy runner.
//!
//! Tests cover:
//! - Buy-and-hold admission of new listings (scenario A)
//! - Market-cap rebalance weights (scenario B)
//! - Delisted holdings dropped without cash credit (scenario C)
//! - Annualized return over a ten year run (scenario D)
//! - Fetch errors skipping a year instead of delisting
//! - Exhausted data, cancellation, concurrent strategies, caching
//! - CSV and SQLite adapters producing identical runs

mod common;

use approx::assert_relative_eq;
use common::*;
use weightbench::adapters::cached_port::CachedPort;
use weightbench::domain::error::WeightbenchError;
use weightbench::domain::runner::{CancelFlag, StrategyRunner};
use weightbench::domain::strategy::StrategySpec;
use weightbench::domain::universe::SkipReason;

fn spec(id: &str) -> StrategySpec {
    StrategySpec::parse(id).unwrap()
}

mod buy_hold_admission {
    use super::*;

    fn scenario_a() -> MockDataPort {
        MockDataPort::new()
            .with_stock("X", 1996, None)
            .with_stock("Y", 2014, None)
            .with_stock("Z", 1990, None)
            .with_prices("X", 2010..=2015, 100.0, Some(1e9))
            .with_prices("Y", 2014..=2015, 100.0, Some(1e9))
            .with_prices("Z", 2012..=2015, 100.0, Some(1e9))
    }

    #[test]
    fn initial_year_holds_only_priced_ticker() {
        let port = scenario_a();
        let runner = StrategyRunner::new(&port, &port, run_config(2010, 2015, 1_000_000.0)).unwrap();
        let result = runner.run(&spec("equal_buy_hold")).unwrap();

        let first = result.snapshot(2010).unwrap();
        assert_eq!(first.holdings.len(), 1);
        assert_eq!(first.holding("X").unwrap().shares, 10_000);
        assert_relative_eq!(first.cash, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn new_listing_is_admitted_by_dilution() {
        let port = scenario_a();
        let runner = StrategyRunner::new(&port, &port, run_config(2010, 2015, 1_000_000.0)).unwrap();
        let result = runner.run(&spec("equal_buy_hold")).unwrap();

        let before = result.snapshot(2013).unwrap();
        assert!(before.holding("Z").is_none());
        assert_eq!(before.holding("X").unwrap().shares, 10_000);

        let after = result.snapshot(2014).unwrap();
        assert!(after.holding("Z").is_none());
        assert_eq!(after.holding("X").unwrap().shares, 5_000);
        let y = after.holding("Y").unwrap();
        assert_relative_eq!(y.value(), after.total_value / 2.0, max_relative = 1e-3);
        assert_relative_eq!(after.weight_sum() + after.cash / after.total_value, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn admitted_ticker_is_not_readmitted() {
        let port = scenario_a();
        let runner = StrategyRunner::new(&port, &port, run_config(2010, 2015, 1_000_000.0)).unwrap();
        let result = runner.run(&spec("equal_buy_hold")).unwrap();

        let last = result.snapshot(2015).unwrap();
        assert_eq!(last.holding("X").unwrap().shares, 5_000);
        assert_eq!(last.holding("Y").unwrap().shares, 5_000);
        assert!(last.holding("Z").is_none());
    }
}

mod market_cap_rebalance {
    use super::*;

    #[test]
    fn weights_follow_market_cap() {
        let port = MockDataPort::new()
            .with_stock("A", 2000, None)
            .with_stock("B", 2000, None)
            .with_prices("A", 2010..=2011, 100.0, Some(900e9))
            .with_prices("B", 2010..=2011, 50.0, Some(100e9));
        let runner = StrategyRunner::new(&port, &port, run_config(2010, 2011, 1_000_000.0)).unwrap();
        let result = runner.run(&spec("cap_rebalance")).unwrap();

        let snap = result.snapshot(2010).unwrap();
        assert_eq!(snap.holding("A").unwrap().shares, 9_000);
        assert_eq!(snap.holding("B").unwrap().shares, 2_000);
        assert_relative_eq!(snap.holding("A").unwrap().weight, 0.9, epsilon = 1e-3);
        assert_relative_eq!(snap.holding("B").unwrap().weight, 0.1, epsilon = 1e-3);
    }

    #[test]
    fn rebalance_conserves_value() {
        let port = MockDataPort::new()
            .with_stock("A", 2000, None)
            .with_stock("B", 2000, None)
            .with_stock("C", 2000, None)
            .with_observation("A", 2010, 33.0, Some(5e9))
            .with_observation("B", 2010, 71.0, Some(2e9))
            .with_observation("C", 2010, 13.0, Some(1e9))
            .with_observation("A", 2011, 41.0, Some(6e9))
            .with_observation("B", 2011, 64.0, Some(2e9))
            .with_observation("C", 2011, 17.0, Some(3e9));
        let runner = StrategyRunner::new(&port, &port, run_config(2010, 2011, 250_000.0)).unwrap();
        let result = runner.run(&spec("cap_rebalance")).unwrap();

        let prior = result.snapshot(2010).unwrap();
        let marked_value = prior.cash
            + prior.holding("A").unwrap().shares as f64 * 41.0
            + prior.holding("B").unwrap().shares as f64 * 64.0
            + prior.holding("C").unwrap().shares as f64 * 17.0;
        let after = result.snapshot(2011).unwrap();
        let holdings: f64 = after.holdings.iter().map(|h| h.value()).sum();
        assert_relative_eq!(holdings + after.cash, marked_value, epsilon = 1e-6);
        assert!(after.cash <= 3.0 * 64.0);
    }
}

mod delisting {
    use super::*;

    fn port() -> MockDataPort {
        MockDataPort::new()
            .with_stock("A", 2000, None)
            .with_stock("B", 2000, Some(2012))
            .with_prices("A", 2010..=2012, 100.0, Some(1e9))
            .with_prices("B", 2010..=2011, 200.0, Some(1e9))
    }

    #[test]
    fn buy_hold_drops_without_cash_credit() {
        let port = port();
        let runner = StrategyRunner::new(&port, &port, run_config(2010, 2012, 1_000_000.0)).unwrap();
        let result = runner.run(&spec("equal_buy_hold")).unwrap();

        let held = result.snapshot(2011).unwrap();
        assert_eq!(held.holding("B").unwrap().shares, 2_500);

        let after = result.snapshot(2012).unwrap();
        assert!(after.holding("B").is_none());
        assert_relative_eq!(after.cash, held.cash, epsilon = 1e-9);
        assert_relative_eq!(after.total_value, 500_000.0, epsilon = 1e-6);
        assert_relative_eq!(after.holding("A").unwrap().weight, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn rebalance_drops_without_cash_credit() {
        let port = port();
        let runner = StrategyRunner::new(&port, &port, run_config(2010, 2012, 1_000_000.0)).unwrap();
        let result = runner.run(&spec("equal_rebalance")).unwrap();

        let after = result.snapshot(2012).unwrap();
        assert!(after.holding("B").is_none());
        assert_eq!(after.holding("A").unwrap().shares, 5_000);
        assert_relative_eq!(after.total_value, 500_000.0, epsilon = 1e-6);
    }

    #[test]
    fn buy_hold_marks_holdings_that_left_the_window() {
        let port = MockDataPort::new()
            .with_stock("X", 2000, Some(2012))
            .with_stock("W", 2000, Some(2012))
            .with_prices("X", 2010..=2011, 100.0, Some(1e9))
            .with_prices("X", 2012..=2013, 150.0, Some(1e9))
            .with_prices("W", 2010..=2011, 100.0, Some(1e9));
        let runner = StrategyRunner::new(&port, &port, run_config(2010, 2013, 1_000_000.0)).unwrap();
        let result = runner.run(&spec("equal_buy_hold")).unwrap();

        assert!(result.skipped.is_empty());
        assert_eq!(result.snapshots.len(), 4);

        let after = result.snapshot(2012).unwrap();
        assert!(after.holding("W").is_none());
        assert_eq!(after.holding("X").unwrap().shares, 5_000);
        assert_relative_eq!(after.total_value, 750_000.0, epsilon = 1e-6);
        assert_relative_eq!(result.end_value, 750_000.0, epsilon = 1e-6);
    }
}

mod returns {
    use super::*;

    #[test]
    fn doubling_over_ten_years() {
        let port = MockDataPort::new()
            .with_stock("A", 2000, None)
            .with_prices("A", 2010..=2019, 100.0, Some(1e9))
            .with_observation("A", 2020, 200.0, Some(2e9));
        let runner = StrategyRunner::new(&port, &port, run_config(2010, 2020, 1_000_000.0)).unwrap();
        let result = runner.run(&spec("equal_buy_hold")).unwrap();

        assert_relative_eq!(result.start_value, 1_000_000.0, epsilon = 1e-6);
        assert_relative_eq!(result.end_value, 2_000_000.0, epsilon = 1e-6);
        assert_relative_eq!(result.total_return, 1.0, epsilon = 1e-9);
        assert_relative_eq!(result.annualized_return, 0.0718, epsilon = 1e-3);
        assert_relative_eq!(result.max_drawdown, 0.0, epsilon = 1e-12);
    }
}

mod failures {
    use super::*;

    #[test]
    fn fetch_error_skips_year_and_keeps_holding() {
        let port = MockDataPort::new()
            .with_stock("A", 2000, None)
            .with_stock("B", 2000, None)
            .with_prices("A", 2010..=2012, 100.0, Some(1e9))
            .with_prices("B", 2010..=2012, 100.0, Some(1e9))
            .with_error("B", 2011, "connection reset");
        let runner = StrategyRunner::new(&port, &port, run_config(2010, 2012, 100_000.0)).unwrap();
        let result = runner.run(&spec("equal_buy_hold")).unwrap();

        assert!(result.snapshot(2011).is_none());
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(
            result.skipped[0].reason,
            SkipReason::FetchFailed {
                tickers: vec!["B".to_string()]
            }
        );
        assert_eq!(result.snapshot(2012).unwrap().holding("B").unwrap().shares, 500);
    }

    #[test]
    fn index_fetch_error_does_not_skip_year() {
        let port = MockDataPort::new()
            .with_stock("A", 2000, None)
            .with_index("IDX", 1990)
            .with_prices("A", 2010..=2012, 100.0, Some(1e9))
            .with_error("IDX", 2010, "index feed down")
            .with_error("IDX", 2011, "index feed down")
            .with_error("IDX", 2012, "index feed down");
        let runner = StrategyRunner::new(&port, &port, run_config(2010, 2012, 100_000.0)).unwrap();
        let result = runner.run(&spec("equal_rebalance")).unwrap();

        assert!(result.skipped.is_empty());
        assert_eq!(result.snapshots.len(), 3);
        assert_eq!(port.fetch_count(), 3);
    }

    #[test]
    fn fetch_error_is_retried() {
        let port = MockDataPort::new()
            .with_stock("A", 2000, None)
            .with_prices("A", 2010..=2011, 100.0, None)
            .with_error("A", 2011, "timeout");
        let runner = StrategyRunner::new(&port, &port, run_config(2010, 2011, 100_000.0)).unwrap();
        runner.run(&spec("equal_rebalance")).unwrap();
        // one fetch in 2010, initial attempt plus one retry in 2011
        assert_eq!(port.fetch_count(), 3);
    }

    #[test]
    fn no_priced_year_is_exhausted_data() {
        let port = MockDataPort::new().with_stock("A", 2000, None);
        let runner = StrategyRunner::new(&port, &port, run_config(2010, 2012, 100_000.0)).unwrap();
        match runner.run(&spec("cap_buy_hold")) {
            Err(WeightbenchError::ExhaustedData { strategy, .. }) => {
                assert_eq!(strategy, "cap_buy_hold")
            }
            other => panic!("expected ExhaustedData, got {other:?}"),
        }
    }

    #[test]
    fn degenerate_year_carries_state_forward() {
        let port = MockDataPort::new()
            .with_stock("A", 2000, None)
            .with_observation("A", 2010, 100.0, None)
            .with_observation("A", 2012, 110.0, None);
        let runner = StrategyRunner::new(&port, &port, run_config(2010, 2012, 10_000.0)).unwrap();
        let result = runner.run(&spec("equal_rebalance")).unwrap();

        assert_eq!(result.skipped[0].year, 2011);
        assert_eq!(result.skipped[0].reason, SkipReason::NoPricedObservations);
        assert_eq!(result.snapshot(2012).unwrap().holding("A").unwrap().shares, 100);
    }

    #[test]
    fn cancelled_before_start() {
        let port = MockDataPort::new()
            .with_stock("A", 2000, None)
            .with_prices("A", 2010..=2012, 100.0, None);
        let cancel = CancelFlag::new();
        cancel.cancel();
        let runner = StrategyRunner::new(&port, &port, run_config(2010, 2012, 10_000.0))
            .unwrap()
            .with_cancel_flag(cancel);
        let result = runner.run(&spec("equal_rebalance")).unwrap();
        assert!(result.cancelled);
        assert!(result.snapshots.is_empty());
        assert_eq!(port.fetch_count(), 0);
    }
}

mod concurrency_and_cache {
    use super::*;

    fn port() -> MockDataPort {
        MockDataPort::new()
            .with_stock("A", 2000, None)
            .with_stock("B", 2000, None)
            .with_stock("C", 2011, None)
            .with_prices("A", 2010..=2013, 100.0, Some(8e9))
            .with_prices("B", 2010..=2013, 25.0, Some(2e9))
            .with_prices("C", 2011..=2013, 10.0, Some(1e9))
    }

    #[test]
    fn run_all_matches_sequential_runs() {
        let port = port();
        let runner = StrategyRunner::new(&port, &port, run_config(2010, 2013, 500_000.0)).unwrap();
        let specs = StrategySpec::all();

        let parallel = runner.run_all(&specs);
        assert_eq!(parallel.len(), specs.len());
        for (spec, result) in parallel {
            let sequential = runner.run(&spec).unwrap();
            assert_eq!(result.unwrap(), sequential);
        }
    }

    #[test]
    fn cached_port_answers_repeat_runs() {
        let cached = CachedPort::new(port());
        let runner = StrategyRunner::new(&cached, &cached, run_config(2010, 2013, 500_000.0)).unwrap();

        let first = runner.run(&spec("cap_rebalance")).unwrap();
        let fetched = cached.inner().fetch_count();
        let second = runner.run(&spec("cap_rebalance")).unwrap();

        assert_eq!(first, second);
        assert_eq!(cached.inner().fetch_count(), fetched);
        assert!(cached.stats().hits > 0);
    }

    #[test]
    fn availability_report_classifies_years() {
        let port = port().with_stock("D", 2000, None).with_prices("D", 2010..=2011, 5.0, Some(1e8));
        let runner = StrategyRunner::new(&port, &port, run_config(2010, 2013, 1.0)).unwrap();
        let report = runner.analyze_availability(None).unwrap();

        let y2011 = report.year(2011).unwrap();
        assert!(y2011.entering.contains("C"));
        assert!(y2011.continuing.contains("A"));
        let y2012 = report.year(2012).unwrap();
        assert!(y2012.exiting.contains("D"));
        assert!(!y2012.available.contains("D"));
        assert!(report.never_available().is_empty());
    }
}

#[cfg(feature = "sqlite")]
mod adapter_parity {
    use super::*;
    use std::fs;
    use weightbench::adapters::csv_adapter::{CsvAdapter, OBSERVATIONS_FILE, STOCKS_FILE};
    use weightbench::adapters::sqlite_adapter::SqliteAdapter;

    #[test]
    fn csv_and_sqlite_produce_identical_runs() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(
            dir.path().join(STOCKS_FILE),
            "ticker,start_date,end_date,kind\n\
             AAA,2000-01-01,,equity\n\
             BBB,2000-01-01,2012-02-01,equity\n\
             CCC,2011-03-01,,equity\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(OBSERVATIONS_FILE),
            "ticker,date,price,adjusted_price,shares_outstanding,market_cap\n\
             AAA,2010-01-04,20.0,20.0,1000000,\n\
             AAA,2011-01-03,22.0,22.0,1000000,\n\
             AAA,2012-01-03,25.0,25.0,1000000,\n\
             BBB,2010-01-04,40.0,40.0,,3000000\n\
             BBB,2011-01-03,38.0,38.0,,2800000\n\
             CCC,2012-01-03,9.0,9.0,,500000\n",
        )
        .unwrap();

        let csv = CsvAdapter::open(dir.path()).unwrap();
        let sqlite = SqliteAdapter::in_memory().unwrap();
        sqlite.initialize_schema().unwrap();
        sqlite.insert_stocks(csv.stocks()).unwrap();
        sqlite.insert_observations(csv.observations()).unwrap();

        let config = run_config(2010, 2012, 100_000.0);
        let from_csv = StrategyRunner::new(&csv, &csv, config.clone()).unwrap();
        let from_sqlite = StrategyRunner::new(&sqlite, &sqlite, config).unwrap();

        for spec in StrategySpec::all() {
            let a = from_csv.run(&spec).unwrap();
            let b = from_sqlite.run(&spec).unwrap();
            assert_eq!(a, b, "{} differs between adapters", spec.name);
        }
    }
}
