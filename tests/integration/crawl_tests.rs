//! Integration tests for the crawl core
//!
//! These tests drive `run_crawl`, the visit pipeline, and the orchestrator
//! end-to-end against fake capabilities and a real in-memory SQLite store.

mod support;

use kite_harvest::brain::{BrainDecision, Verdict};
use kite_harvest::capabilities::{RuleAdvisor, Visibility};
use kite_harvest::events::ActivityLog;
use kite_harvest::frontier::{repopulate, CrawlState};
use kite_harvest::orchestrator::{run_crawl, CrawlOptions, Orchestrator};
use kite_harvest::pipeline::{extract_with_fallbacks, visit, PageContent};
use kite_harvest::planner::DoneReason;
use kite_harvest::storage::{CaptureMeta, ScrapeStatus, SqliteStore, Store, VisitStatus};
use kite_harvest::{Adaptation, PageType};
use std::sync::Arc;
use std::time::Duration;
use support::{
    page, FailingClassifier, FakeBrowser, HarnessBuilder, ScriptedAdvisor, StalledAdvisor,
    StalledValidator,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const LISTING: &str = "https://acme.test/jobs";

fn listing_with_links() -> String {
    page(&[
        "kind:list",
        "<p>job: Platform Engineer</p>",
        r#"<a href="/jobs/y">Y</a>"#,
        r#"<a href="/jobs/z">Z</a>"#,
        r#"<a href="https://elsewhere.test/jobs/1">External</a>"#,
        r#"<a href="/static/logo.png">Logo</a>"#,
        r#"<a href="/jobs">Self</a>"#,
    ])
}

fn last_status(store: &SqliteStore, source_id: i64) -> Option<ScrapeStatus> {
    store
        .source_stats()
        .unwrap()
        .into_iter()
        .find(|s| s.id == source_id)
        .and_then(|s| s.last_status)
}

#[tokio::test]
async fn test_listing_visit_fills_frontier_with_links_and_pagination() {
    let browser = FakeBrowser::new().with_page(LISTING, listing_with_links());
    let h = HarnessBuilder::new(browser, Arc::new(RuleAdvisor))
        .crawler(|c| {
            c.max_depth = 2;
            c.pagination_seeds = 4;
        })
        .build();
    let source = h.source("Acme", LISTING).await;

    let log = ActivityLog::new(h.sink.clone(), "Acme");
    let mut state = CrawlState::new(&source, h.ctx.limits(), CancellationToken::new());
    let start = state.take_next().unwrap();
    let mut session = h.ctx.caps.browser.open(Visibility::Headless).await.unwrap();

    let result = visit(&h.ctx, &log, &mut state, session.as_mut(), &start.url, start.depth).await;

    assert!(result.error.is_none(), "unexpected error: {:?}", result.error);
    assert_eq!(result.page_type, PageType::JobList);
    assert_eq!(result.jobs_count, 1);
    assert_eq!(result.links_discovered, 6);

    let mut queued: Vec<(String, u32)> = state
        .frontier
        .iter()
        .map(|e| (e.url.clone(), e.depth))
        .collect();
    queued.sort();
    assert_eq!(
        queued,
        vec![
            ("https://acme.test/jobs/y".to_string(), 1),
            ("https://acme.test/jobs/z".to_string(), 1),
            ("https://acme.test/jobs?page=2".to_string(), 1),
            ("https://acme.test/jobs?page=3".to_string(), 1),
            ("https://acme.test/jobs?page=4".to_string(), 1),
            ("https://acme.test/jobs?page=5".to_string(), 1),
        ]
    );
    assert!(state.frontier.peek().unwrap().url.contains("?page="));

    let visited = h.store.list_visited(source.id, None).await.unwrap();
    assert_eq!(visited, vec![LISTING.to_string()]);
}

#[tokio::test]
async fn test_nothing_beyond_max_depth_is_queued() {
    let browser = FakeBrowser::new().with_page(LISTING, listing_with_links());
    let h = HarnessBuilder::new(browser, Arc::new(RuleAdvisor))
        .crawler(|c| {
            c.max_depth = 1;
            c.pagination_seeds = 2;
        })
        .build();
    let source = h.source("Acme", LISTING).await;

    let log = ActivityLog::new(h.sink.clone(), "Acme");
    let mut state = CrawlState::new(&source, h.ctx.limits(), CancellationToken::new());
    state.take_next();
    let mut session = h.ctx.caps.browser.open(Visibility::Headless).await.unwrap();

    // A listing at the depth bound seeds nothing
    let result = visit(&h.ctx, &log, &mut state, session.as_mut(), LISTING, 1).await;

    assert_eq!(result.jobs_count, 1);
    assert_eq!(result.links_discovered, 0);
    assert!(state.frontier.is_empty());
}

#[tokio::test]
async fn test_discovered_links_are_queued_in_canonical_form() {
    let listing = page(&[
        "kind:list",
        r#"<a href="/jobs/y/?utm_source=mail#apply">Y</a>"#,
        r#"<a href="/jobs/y?ref=nav">Y again</a>"#,
        r#"<a href="https://WWW.acme.test/jobs/z">Z</a>"#,
    ]);
    let browser = FakeBrowser::new().with_page(LISTING, listing);
    let h = HarnessBuilder::new(browser, Arc::new(RuleAdvisor))
        .crawler(|c| {
            c.max_depth = 2;
            c.pagination_seeds = 0;
        })
        .build();
    let source = h.source("Acme", LISTING).await;

    let log = ActivityLog::new(h.sink.clone(), "Acme");
    let mut state = CrawlState::new(&source, h.ctx.limits(), CancellationToken::new());
    let start = state.take_next().unwrap();
    let mut session = h.ctx.caps.browser.open(Visibility::Headless).await.unwrap();

    let result = visit(&h.ctx, &log, &mut state, session.as_mut(), &start.url, start.depth).await;

    assert_eq!(result.links_discovered, 2);
    let mut queued: Vec<String> = state.frontier.iter().map(|e| e.url.clone()).collect();
    queued.sort();
    assert_eq!(
        queued,
        vec![
            "https://acme.test/jobs/y".to_string(),
            "https://acme.test/jobs/z".to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_captcha_cleared_by_human_after_ten_seconds() {
    let wall = "https://acme.test/apply/w";
    let browser = FakeBrowser::new()
        .with_page(
            LISTING,
            page(&["kind:list", "job: Backend Engineer", r#"<a href="/apply/w">Apply</a>"#]),
        )
        .with_wall(
            wall,
            page(&["kind:captcha", "Prove you are human"]),
            page(&[
                "kind:list",
                "job: Data Engineer",
                "job: Site Reliability Engineer",
                "job: Security Engineer",
                r#"<a href="/jobs/after">More</a>"#,
            ]),
        )
        .with_page("https://acme.test/jobs/after", page(&["Nothing to see"]));
    let h = HarnessBuilder::new(browser, Arc::new(RuleAdvisor)).build();
    let source = h.source("Acme", LISTING).await;

    let signal = h.signal.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        while !signal.resolve() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    });

    let stop = CancellationToken::new();
    let started = Instant::now();
    let mut session = h.ctx.caps.browser.open(Visibility::Headless).await.unwrap();
    let summary = run_crawl(&h.ctx, &source, session.as_mut(), &stop, &CrawlOptions::default())
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_secs(10));
    assert!(started.elapsed() < Duration::from_secs(300));
    assert_eq!(summary.jobs_extracted, 4);
    assert_eq!(summary.end, DoneReason::FrontierEmpty);

    // Seen once headless, once by the human, never again
    assert_eq!(h.browser.navigations_to(wall), 2);
    assert_eq!(h.browser.visible_navigations(), vec![wall.to_string()]);
    assert_eq!(h.browser.navigations_to("https://acme.test/jobs/after"), 1);

    // The side session was closed
    assert_eq!(h.browser.opened(), vec![Visibility::Headless, Visibility::Visible]);
    assert_eq!(h.browser.closed(), 1);

    let stats = h.store.source_stats().unwrap();
    assert_eq!(stats[0].jobs, 4);
    assert_eq!(stats[0].blocked, 0);
    assert_eq!(last_status(&h.store, source.id), Some(ScrapeStatus::Success));
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_login_wall_is_blocked_for_good() {
    let wall = "https://acme.test/login";
    let browser = FakeBrowser::new()
        .with_page(
            LISTING,
            page(&["kind:list", "job: Backend Engineer", r#"<a href="/login">Sign in</a>"#]),
        )
        .with_wall(
            wall,
            page(&["kind:login", "<input type=\"password\">"]),
            page(&["kind:login", "still locked"]),
        );
    let h = HarnessBuilder::new(browser, Arc::new(RuleAdvisor)).build();
    let source = h.source("Acme", LISTING).await;
    let stop = CancellationToken::new();

    let started = Instant::now();
    let mut session = h.ctx.caps.browser.open(Visibility::Headless).await.unwrap();
    let summary = run_crawl(&h.ctx, &source, session.as_mut(), &stop, &CrawlOptions::default())
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_secs(300));
    assert_eq!(summary.jobs_extracted, 1);
    assert_eq!(h.browser.navigations_to(wall), 2);
    assert!(h.signal.pending().is_empty());

    let blocked = h
        .store
        .list_visited(source.id, Some(VisitStatus::Blocked))
        .await
        .unwrap();
    assert_eq!(blocked, vec![wall.to_string()]);

    // The next crawl skips the blocked URL entirely
    run_crawl(&h.ctx, &source, session.as_mut(), &stop, &CrawlOptions::default())
        .await
        .unwrap();
    assert_eq!(h.browser.navigations_to(LISTING), 2);
    assert_eq!(h.browser.navigations_to(wall), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_retry_wait_exits_promptly() {
    let browser = FakeBrowser::new().with_page(LISTING, page(&["kind:list", "job: Engineer"]));
    let mut retry = BrainDecision::adapt(Verdict::Degraded, Adaptation::RetryCycleSoon);
    retry.wait_seconds = Some(600);
    let h = HarnessBuilder::new(browser, Arc::new(ScriptedAdvisor::new(vec![retry]))).build();
    let source = h.source("Acme", LISTING).await;

    let stop = CancellationToken::new();
    let trigger = stop.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let mut session = h.ctx.caps.browser.open(Visibility::Headless).await.unwrap();
    let summary = run_crawl(&h.ctx, &source, session.as_mut(), &stop, &CrawlOptions::default())
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(6));
    assert_eq!(summary.end, DoneReason::StopRequested);
    assert_eq!(h.browser.navigation_count(), 1);
    assert_eq!(last_status(&h.store, source.id), Some(ScrapeStatus::Stopped));
}

#[tokio::test(start_paused = true)]
async fn test_retry_wait_requeues_the_url() {
    let browser = FakeBrowser::new().with_page(LISTING, page(&["kind:list", "job: Engineer"]));
    let mut retry = BrainDecision::adapt(Verdict::Degraded, Adaptation::RetryCycleSoon);
    retry.wait_seconds = Some(30);
    let h = HarnessBuilder::new(browser, Arc::new(ScriptedAdvisor::new(vec![retry]))).build();
    let source = h.source("Acme", LISTING).await;
    let stop = CancellationToken::new();

    let started = Instant::now();
    let mut session = h.ctx.caps.browser.open(Visibility::Headless).await.unwrap();
    let summary = run_crawl(&h.ctx, &source, session.as_mut(), &stop, &CrawlOptions::default())
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_secs(30));
    assert_eq!(h.browser.navigations_to(LISTING), 2);
    assert_eq!(summary.jobs_extracted, 2);
}

#[tokio::test]
async fn test_retry_extraction_is_bounded() {
    let browser = FakeBrowser::new().with_page(LISTING, page(&["kind:list", "no postings yet"]));
    let retry = || BrainDecision::adapt(Verdict::Degraded, Adaptation::RetryExtraction);
    let advisor = ScriptedAdvisor::new(vec![retry(), retry(), retry(), retry()]);
    let h = HarnessBuilder::new(browser, Arc::new(advisor))
        .crawler(|c| c.max_retries = 2)
        .build();
    let source = h.source("Acme", LISTING).await;

    let mut session = h.ctx.caps.browser.open(Visibility::Headless).await.unwrap();
    let summary = run_crawl(
        &h.ctx,
        &source,
        session.as_mut(),
        &CancellationToken::new(),
        &CrawlOptions::default(),
    )
    .await
    .unwrap();

    // The first visit plus two retries
    assert_eq!(h.browser.navigations_to(LISTING), 3);
    assert_eq!(summary.jobs_extracted, 0);
}

#[tokio::test]
async fn test_cap_ends_crawl_before_next_visit() {
    let browser = FakeBrowser::new()
        .with_page(
            LISTING,
            page(&[
                "kind:list",
                "job: One",
                "job: Two",
                "job: Three",
                r#"<a href="/jobs/y">Y</a>"#,
            ]),
        )
        .with_page("https://acme.test/jobs/y", page(&["job: Four"]));
    let h = HarnessBuilder::new(browser, Arc::new(RuleAdvisor))
        .crawler(|c| c.max_jobs_per_source = 2)
        .build();
    let source = h.source("Acme", LISTING).await;

    let mut session = h.ctx.caps.browser.open(Visibility::Headless).await.unwrap();
    let summary = run_crawl(
        &h.ctx,
        &source,
        session.as_mut(),
        &CancellationToken::new(),
        &CrawlOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(summary.end, DoneReason::CapReached);
    assert_eq!(summary.jobs_extracted, 3);
    assert_eq!(summary.pages_visited, 1);
    assert_eq!(h.browser.navigations_to("https://acme.test/jobs/y"), 0);
    assert!(h
        .sink
        .messages()
        .iter()
        .any(|m| m == "1 URLs left unvisited: https://acme.test/jobs/y"));
}

#[tokio::test]
async fn test_stop_before_start_never_navigates() {
    let browser = FakeBrowser::new().with_page(LISTING, listing_with_links());
    let h = HarnessBuilder::new(browser, Arc::new(RuleAdvisor)).build();
    let source = h.source("Acme", LISTING).await;
    let stop = CancellationToken::new();
    stop.cancel();

    let mut session = h.ctx.caps.browser.open(Visibility::Headless).await.unwrap();
    let summary = run_crawl(&h.ctx, &source, session.as_mut(), &stop, &CrawlOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.end, DoneReason::StopRequested);
    assert_eq!(h.browser.navigation_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_advisor_defaults_to_continue() {
    let browser = FakeBrowser::new()
        .with_page(
            LISTING,
            page(&["kind:list", "job: Engineer", r#"<a href="/jobs/y">Y</a>"#]),
        )
        .with_page("https://acme.test/jobs/y", page(&["job: Designer"]));
    let h = HarnessBuilder::new(browser, Arc::new(StalledAdvisor))
        .scheduler(|s| s.advisory_timeout_ms = 1_000)
        .build();
    let source = h.source("Acme", LISTING).await;

    let started = Instant::now();
    let mut session = h.ctx.caps.browser.open(Visibility::Headless).await.unwrap();
    let summary = run_crawl(
        &h.ctx,
        &source,
        session.as_mut(),
        &CancellationToken::new(),
        &CrawlOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(summary.jobs_extracted, 2);
    assert_eq!(summary.pages_visited, 2);
    assert!(started.elapsed() < Duration::from_secs(60));
    assert!(h
        .sink
        .messages()
        .iter()
        .any(|m| m.contains("Advisory timed out")));
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_stalled_validation_exits_promptly() {
    // The start URL is not served, so the advisory context validates it
    let h = HarnessBuilder::new(FakeBrowser::new(), Arc::new(RuleAdvisor))
        .validator(Arc::new(StalledValidator))
        .scheduler(|s| s.advisory_timeout_ms = 600_000)
        .build();
    let source = h.source("Acme", LISTING).await;

    let stop = CancellationToken::new();
    let trigger = stop.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let mut session = h.ctx.caps.browser.open(Visibility::Headless).await.unwrap();
    let summary = run_crawl(&h.ctx, &source, session.as_mut(), &stop, &CrawlOptions::default())
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(6));
    assert_eq!(summary.end, DoneReason::StopRequested);
    assert_eq!(h.browser.navigation_count(), 1);
    assert_eq!(last_status(&h.store, source.id), Some(ScrapeStatus::Stopped));
    assert!(h
        .sink
        .messages()
        .iter()
        .any(|m| m.contains("Stop requested during validation")));
}

#[tokio::test(start_paused = true)]
async fn test_stalled_validation_is_bounded_by_advisory_timeout() {
    let h = HarnessBuilder::new(FakeBrowser::new(), Arc::new(ScriptedAdvisor::new(vec![])))
        .validator(Arc::new(StalledValidator))
        .scheduler(|s| s.advisory_timeout_ms = 1_000)
        .build();
    let source = h.source("Acme", LISTING).await;

    let started = Instant::now();
    let mut session = h.ctx.caps.browser.open(Visibility::Headless).await.unwrap();
    let summary = run_crawl(
        &h.ctx,
        &source,
        session.as_mut(),
        &CancellationToken::new(),
        &CrawlOptions::default(),
    )
    .await
    .unwrap();

    assert!(started.elapsed() >= Duration::from_secs(1));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(summary.end, DoneReason::FrontierEmpty);
    assert!(h
        .sink
        .messages()
        .iter()
        .any(|m| m.contains("Validation timed out after 1000ms")));
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_human_wait_does_not_block_the_url() {
    let wall = "https://acme.test/login";
    let browser = FakeBrowser::new()
        .with_page(
            LISTING,
            page(&["kind:list", "job: Backend Engineer", r#"<a href="/login">Sign in</a>"#]),
        )
        .with_wall(
            wall,
            page(&["kind:login", "<input type=\"password\">"]),
            page(&["kind:login", "still locked"]),
        );
    let h = HarnessBuilder::new(browser, Arc::new(RuleAdvisor)).build();
    let source = h.source("Acme", LISTING).await;

    let stop = CancellationToken::new();
    let trigger = stop.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let mut session = h.ctx.caps.browser.open(Visibility::Headless).await.unwrap();
    let summary = run_crawl(&h.ctx, &source, session.as_mut(), &stop, &CrawlOptions::default())
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(11));
    assert_eq!(summary.end, DoneReason::StopRequested);
    assert_eq!(h.browser.visible_navigations(), vec![wall.to_string()]);
    assert_eq!(h.browser.closed(), 1);
    assert!(h.signal.pending().is_empty());
    assert!(h
        .store
        .list_visited(source.id, Some(VisitStatus::Blocked))
        .await
        .unwrap()
        .is_empty());

    // A later crawl still reaches the wall and asks the human again
    run_crawl(
        &h.ctx,
        &source,
        session.as_mut(),
        &CancellationToken::new(),
        &CrawlOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(h.browser.navigations_to(wall), 4);
    assert_eq!(h.browser.visible_navigations().len(), 2);
}

#[tokio::test]
async fn test_classification_failure_assumes_listing() {
    let browser = FakeBrowser::new().with_page(LISTING, listing_with_links());
    let h = HarnessBuilder::new(browser, Arc::new(RuleAdvisor))
        .classifier(Arc::new(FailingClassifier))
        .crawler(|c| {
            c.max_depth = 2;
            c.pagination_seeds = 2;
        })
        .build();
    let source = h.source("Acme", LISTING).await;

    let log = ActivityLog::new(h.sink.clone(), "Acme");
    let mut state = CrawlState::new(&source, h.ctx.limits(), CancellationToken::new());
    let start = state.take_next().unwrap();
    let mut session = h.ctx.caps.browser.open(Visibility::Headless).await.unwrap();

    let result = visit(&h.ctx, &log, &mut state, session.as_mut(), &start.url, start.depth).await;

    assert!(result.error.is_none(), "unexpected error: {:?}", result.error);
    assert_eq!(result.page_type, PageType::JobList);
    assert_eq!(result.jobs_count, 1);
    assert!(state.is_queued("https://acme.test/jobs?page=2"));
    assert!(state.is_queued("https://acme.test/jobs?page=3"));
    assert!(state.is_queued("https://acme.test/jobs/y"));
    assert!(h
        .sink
        .messages()
        .iter()
        .any(|m| m.contains("Classification failed")));
}

#[tokio::test]
async fn test_spa_sources_wait_for_hydration() {
    let spa_ready = "https://careers.spa.test/jobs";
    let spa_slow = "https://careers.spa.test/jobs/late";
    let browser = FakeBrowser::new()
        .with_page(spa_ready, page(&[r#"<div id="app-root">"#, "job: Engineer"]))
        .with_page(spa_slow, page(&["<div>loading</div>"]))
        .with_page(LISTING, page(&["kind:list", "job: Analyst"]));
    let h = HarnessBuilder::new(browser, Arc::new(RuleAdvisor))
        .crawler(|c| {
            c.spa_domains = vec!["*.spa.test".to_string()];
            c.hydration_selector = "#app-root".to_string();
            c.hydration_ms = 5_000;
        })
        .build();
    let source = h.source("Spa", spa_ready).await;

    let log = ActivityLog::new(h.sink.clone(), "Spa");
    let mut state = CrawlState::new(&source, h.ctx.limits(), CancellationToken::new());
    let mut session = h.ctx.caps.browser.open(Visibility::Headless).await.unwrap();

    let ready = visit(&h.ctx, &log, &mut state, session.as_mut(), spa_ready, 0).await;
    assert_eq!(ready.jobs_count, 1);
    assert_eq!(
        h.browser.selector_waits(),
        vec![("#app-root".to_string(), Duration::from_millis(5_000))]
    );
    assert!(!h
        .sink
        .messages()
        .iter()
        .any(|m| m.contains("did not appear")));

    // Hydration that never completes is logged, and the page is still read
    let slow = visit(&h.ctx, &log, &mut state, session.as_mut(), spa_slow, 1).await;
    assert!(slow.error.is_none());
    assert_eq!(h.browser.selector_waits().len(), 2);
    assert!(h
        .sink
        .messages()
        .iter()
        .any(|m| m.contains("'#app-root' did not appear within 5000ms")));

    // Other domains are read without waiting
    visit(&h.ctx, &log, &mut state, session.as_mut(), LISTING, 1).await;
    assert_eq!(h.browser.selector_waits().len(), 2);
}

#[tokio::test]
async fn test_broken_start_url_is_corrected_and_persisted() {
    let broken = "https://acme.test/old-careers";
    let fixed = "https://acme.test/careers";
    let browser = FakeBrowser::new().with_page(fixed, page(&["kind:list", "job: Engineer"]));
    let h = HarnessBuilder::new(browser, Arc::new(RuleAdvisor))
        .invalid_sources()
        .resolves_to(fixed)
        .build();
    let source = h.source("Acme", broken).await;

    let mut session = h.ctx.caps.browser.open(Visibility::Headless).await.unwrap();
    let summary = run_crawl(
        &h.ctx,
        &source,
        session.as_mut(),
        &CancellationToken::new(),
        &CrawlOptions {
            cycle: 1,
            url_correction_attempts: 1,
        },
    )
    .await
    .unwrap();

    assert_eq!(summary.start_url, fixed);
    assert_eq!(summary.jobs_extracted, 1);
    assert_eq!(summary.url_correction_attempts, 2);
    assert_eq!(
        h.resolver.calls.lock().unwrap().clone(),
        vec![(broken.to_string(), 1)]
    );
    assert_eq!(h.store.get_source(source.id).await.unwrap().url, fixed);
}

#[tokio::test]
async fn test_correction_budget_is_respected() {
    let broken = "https://acme.test/old-careers";
    let h = HarnessBuilder::new(FakeBrowser::new(), Arc::new(RuleAdvisor))
        .invalid_sources()
        .crawler(|c| c.max_url_corrections = 3)
        .build();
    let source = h.source("Acme", broken).await;

    let mut session = h.ctx.caps.browser.open(Visibility::Headless).await.unwrap();
    let summary = run_crawl(
        &h.ctx,
        &source,
        session.as_mut(),
        &CancellationToken::new(),
        &CrawlOptions {
            cycle: 4,
            url_correction_attempts: 3,
        },
    )
    .await
    .unwrap();

    assert!(h.resolver.calls.lock().unwrap().is_empty());
    assert_eq!(summary.url_correction_attempts, 3);
    assert_eq!(h.store.get_source(source.id).await.unwrap().url, broken);
}

#[tokio::test]
async fn test_repopulate_reseeds_start_url_when_nothing_archived() {
    let h = HarnessBuilder::new(FakeBrowser::new(), Arc::new(RuleAdvisor)).build();
    let source = h.source("Acme", LISTING).await;
    let log = ActivityLog::new(h.sink.clone(), "Acme");
    let mut state = CrawlState::new(&source, h.ctx.limits(), CancellationToken::new());
    state.take_next();
    assert!(state.frontier.is_empty());

    let added = repopulate(&h.ctx.caps, &log, &mut state, 10).await;

    assert_eq!(added, 1);
    assert_eq!(state.refills, 1);
    assert_eq!(state.frontier.peek().unwrap().url, LISTING);
    assert!(!state.is_seen(LISTING));
}

#[tokio::test]
async fn test_repopulate_prefers_archived_captures() {
    let h = HarnessBuilder::new(FakeBrowser::new(), Arc::new(RuleAdvisor)).build();
    let source = h.source("Acme", LISTING).await;
    let capture = h
        .store
        .save_raw_capture(
            source.id,
            LISTING,
            &page(&[r#"<a href="/jobs/archived">Old</a>"#, r#"<a href="/jobs">Self</a>"#]),
        )
        .await
        .unwrap();
    h.store
        .save_cleaned_capture(capture, &page(&[r#"<a href="/jobs/archived">Old</a>"#]))
        .await
        .unwrap();

    let log = ActivityLog::new(h.sink.clone(), "Acme");
    let mut state = CrawlState::new(&source, h.ctx.limits(), CancellationToken::new());
    state.take_next();

    let added = repopulate(&h.ctx.caps, &log, &mut state, 10).await;

    assert_eq!(added, 1);
    let entry = state.frontier.peek().unwrap();
    assert_eq!(entry.url, "https://acme.test/jobs/archived");
    assert_eq!(entry.depth, 1);
    assert!(!state.is_queued(LISTING));
}

#[tokio::test]
async fn test_extraction_fallback_order() {
    let h = HarnessBuilder::new(FakeBrowser::new(), Arc::new(RuleAdvisor))
        .crawler(|c| c.large_content_bytes = 16)
        .build();
    let source = h.source("Acme", LISTING).await;
    let log = ActivityLog::new(h.sink.clone(), "Acme");
    let state = CrawlState::new(&source, h.ctx.limits(), CancellationToken::new());

    // Cleaned yields nothing, raw yields the embedded posting
    let raw = page(&["job: Engineer raw-only"]);
    let cleaned = page(&[]);
    let extraction = extract_with_fallbacks(
        &h.ctx,
        &log,
        &state,
        &PageContent {
            url: LISTING,
            raw_html: &raw,
            cleaned_html: &cleaned,
            capture_id: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(extraction.listings.len(), 1);
    assert_eq!(extraction.strategy, "lines+raw");

    // Both empty: the best prior capture is re-extracted
    let prior = h
        .store
        .save_raw_capture(source.id, LISTING, &page(&["job: Archived One", "job: Archived Two"]))
        .await
        .unwrap();
    h.store
        .update_capture_meta(
            prior,
            &CaptureMeta {
                page_type: PageType::JobList,
                jobs_count: 2,
                extraction_strategy: Some("lines".to_string()),
            },
        )
        .await
        .unwrap();

    let empty = page(&["nothing here at all"]);
    let extraction = extract_with_fallbacks(
        &h.ctx,
        &log,
        &state,
        &PageContent {
            url: LISTING,
            raw_html: &empty,
            cleaned_html: &empty,
            capture_id: Some(prior + 1),
        },
    )
    .await
    .unwrap();
    assert_eq!(extraction.listings.len(), 2);
    assert!(extraction.strategy.ends_with("+prior-capture"));
}

#[tokio::test]
async fn test_orchestrator_runs_sources_in_bounded_batches() {
    let browser = FakeBrowser::new()
        .with_page("https://a.test/jobs", page(&["kind:list", "job: A1"]))
        .with_page("https://b.test/jobs", page(&["kind:list", "job: B1", "job: B2"]))
        .with_page("https://c.test/jobs", page(&["kind:list", "job: C1"]));
    let h = HarnessBuilder::new(browser, Arc::new(RuleAdvisor))
        .scheduler(|s| s.parallel_sources = 2)
        .build();
    let sources = h
        .sources(&[
            ("Alpha", "https://a.test/jobs"),
            ("Beta", "https://b.test/jobs"),
            ("Gamma", "https://c.test/jobs"),
        ])
        .await;

    let report = Orchestrator::new(h.ctx.clone(), true)
        .run(&CancellationToken::new(), true)
        .await
        .unwrap();

    assert_eq!(report.cycles, 1);
    assert_eq!(report.jobs_extracted, 4);

    // Every source got its own headless session, all closed afterwards
    assert_eq!(h.browser.opened(), vec![Visibility::Headless; 3]);
    assert_eq!(h.browser.closed(), 3);
    assert!(h.browser.max_open() <= 2);

    for source in &sources {
        assert_eq!(last_status(&h.store, source.id), Some(ScrapeStatus::Success));
    }
}

#[tokio::test]
async fn test_source_failure_does_not_stop_the_cycle() {
    let h = HarnessBuilder::new(FakeBrowser::new().failing_open(), Arc::new(RuleAdvisor)).build();
    let sources = h
        .sources(&[("Alpha", "https://a.test/jobs"), ("Beta", "https://b.test/jobs")])
        .await;

    let mut orchestrator = Orchestrator::new(h.ctx.clone(), false);
    let report = orchestrator
        .run_cycle(1, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.failed(), 2);
    for source in &sources {
        assert_eq!(last_status(&h.store, source.id), Some(ScrapeStatus::Failed));
    }
}

#[tokio::test(start_paused = true)]
async fn test_corrections_spent_by_a_failed_crawl_still_count() {
    let broken = "https://acme.test/old-careers";
    let h = HarnessBuilder::new(FakeBrowser::new(), Arc::new(RuleAdvisor))
        .invalid_sources()
        .crawler(|c| c.max_url_corrections = 1)
        .unclosable_store()
        .build();
    let source = h.source("Acme", broken).await;

    let mut orchestrator = Orchestrator::new(h.ctx.clone(), false);
    let stop = CancellationToken::new();
    let first = orchestrator.run_cycle(1, &stop).await.unwrap();
    let second = orchestrator.run_cycle(2, &stop).await.unwrap();

    for report in [&first, &second] {
        assert_eq!(report.failed(), 1);
        assert_eq!(report.outcomes[0].url_correction_attempts, 1);
    }
    // The second crawl starts with the budget already spent
    assert_eq!(
        h.resolver.calls.lock().unwrap().clone(),
        vec![(broken.to_string(), 0)]
    );
    assert_eq!(last_status(&h.store, source.id), Some(ScrapeStatus::Failed));
}

#[tokio::test(start_paused = true)]
async fn test_single_source_reuses_one_session_across_cycles() {
    let browser = FakeBrowser::new().with_page(LISTING, page(&["kind:list", "job: Engineer"]));
    let h = HarnessBuilder::new(browser, Arc::new(RuleAdvisor))
        .scheduler(|s| s.cycle_delay_secs = 60)
        .build();
    h.source("Acme", LISTING).await;

    let stop = CancellationToken::new();
    let trigger = stop.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(90)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let report = Orchestrator::new(h.ctx.clone(), true)
        .run(&stop, false)
        .await
        .unwrap();

    assert_eq!(report.cycles, 2);
    assert!(started.elapsed() < Duration::from_secs(91));
    assert_eq!(h.browser.navigations_to(LISTING), 2);
    assert_eq!(h.browser.opened(), vec![Visibility::Visible]);
    assert_eq!(h.browser.closed(), 1);
    assert!(h
        .sink
        .messages()
        .iter()
        .any(|m| m == "Teardown complete"));
}
