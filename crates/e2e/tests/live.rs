//! Full suite against a running app and real browsers
//!
//! Needs the backend on :3001, the front-end on :3000 and Playwright
//! installed. Run with: cargo test -p rwa-e2e --test live -- --ignored

use rwa_e2e::config::is_ci;
use rwa_e2e::{catalogue, Filter, Suite, SuiteConfig, TestRunner};

fn runner() -> TestRunner {
    let mut config = SuiteConfig::default();
    config.resolve_ci(is_ci());
    TestRunner::new(config).unwrap()
}

#[tokio::test]
#[ignore = "needs the Real World App and Playwright"]
async fn live_api_suite() {
    let filter = Filter {
        suite: Some(Suite::Api),
        ..Filter::default()
    };
    let suite = runner().run(&catalogue(), &filter).await.unwrap();
    assert!(suite.is_success(), "{:#?}", suite.results);
}

#[tokio::test]
#[ignore = "needs the Real World App and Playwright"]
async fn live_browser_suites_on_chromium() {
    let runner = runner();
    let filter = Filter {
        project: Some("chromium".into()),
        ..Filter::default()
    };
    let suite = runner.run(&catalogue(), &filter).await.unwrap();
    runner.write_results(&suite).unwrap();
    assert!(suite.is_success(), "{:#?}", suite.results);
    assert_eq!(suite.total, 2 + 6 + 2);
}
