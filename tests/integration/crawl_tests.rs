//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test the full
//! crawl cycle end-to-end: no duplicate fetches, page caps, and checkpoint
//! resume.

use docweld::config::CrawlConfig;
use docweld::crawler::{load_checkpoint, CrawlJob, JobState, Scheduler};
use docweld::storage::SqliteStore;
use docweld::url::normalize_url;
use std::path::Path;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn crawl_config() -> CrawlConfig {
    CrawlConfig {
        delay_seconds: 0.0,
        workers: 2,
        page_cap: 0,
        checkpoint_interval: 100,
        frontier_limit: 1000,
        timeout_seconds: 5,
    }
}

fn store() -> Arc<Mutex<SqliteStore>> {
    Arc::new(Mutex::new(SqliteStore::new_in_memory().unwrap()))
}

fn html_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_raw(body, "text/html")
}

/// Mounts `/` linking to `/a` and `/b`, each page expected exactly once
async fn mount_three_page_site(server: &MockServer) {
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_response(format!(
            r#"<html><body><a href="{0}/a">A</a><a href="{0}/b">B</a></body></html>"#,
            base
        )))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html_response("<html><body>leaf a</body></html>".to_string()))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(html_response("<html><body>leaf b</body></html>".to_string()))
        .expect(1)
        .mount(server)
        .await;
}

async fn run_job(
    base: &str,
    config: &CrawlConfig,
    checkpoint_dir: &Path,
    fresh: bool,
) -> docweld::crawler::JobReport {
    let base_url = normalize_url(base).unwrap();
    let job = CrawlJob::new("docs", base_url, vec![], "hash");
    let store = store();
    let run_id = store.lock().unwrap().create_run("hash").unwrap();

    let mut scheduler = Scheduler::new(job, config, store, run_id, checkpoint_dir, fresh).unwrap();
    scheduler.run().await.unwrap()
}

#[tokio::test]
async fn test_no_duplicate_fetches_with_two_workers() {
    let server = MockServer::start().await;
    mount_three_page_site(&server).await;

    let dir = tempfile::TempDir::new().unwrap();
    let report = run_job(&server.uri(), &crawl_config(), dir.path(), true).await;

    assert_eq!(report.state, JobState::Completed);
    assert_eq!(report.pages_fetched, 3);
    assert_eq!(report.visited as u64, report.pages_fetched);
    assert!(report.errors.is_empty());

    // The expect(1) on each mock verifies no URL was fetched twice when the
    // server is dropped here.
}

#[tokio::test]
async fn test_relative_and_duplicate_links_deduplicated() {
    let server = MockServer::start().await;
    let base = server.uri();

    // Relative links, a repeated link, a fragment, and an off-site link:
    // only /a survives scope and dedup.
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_response(format!(
            r#"<html><body>
               <a href="/a">one</a>
               <a href="{0}/a">same again</a>
               <a href="/a#section">fragment</a>
               <a href="https://elsewhere.example.com/x">offsite</a>
               </body></html>"#,
            base
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html_response("<html></html>".to_string()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::TempDir::new().unwrap();
    let report = run_job(&base, &crawl_config(), dir.path(), true).await;

    assert_eq!(report.state, JobState::Completed);
    assert_eq!(report.pages_fetched, 2);
}

#[tokio::test]
async fn test_resume_matches_uninterrupted_run() {
    let server = MockServer::start().await;
    let base = server.uri();

    for (route, body) in [
        (
            "/",
            format!(
                r#"<html><body><a href="{0}/a">A</a><a href="{0}/b">B</a></body></html>"#,
                base
            ),
        ),
        ("/a", "<html><body>leaf a</body></html>".to_string()),
        ("/b", "<html><body>leaf b</body></html>".to_string()),
    ] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(html_response(body))
            .mount(&server)
            .await;
    }

    // Uninterrupted run for reference
    let uninterrupted_dir = tempfile::TempDir::new().unwrap();
    let reference = run_job(&base, &crawl_config(), uninterrupted_dir.path(), true).await;
    assert_eq!(reference.state, JobState::Completed);
    let reference_record = load_checkpoint(&reference.checkpoint).unwrap().unwrap();

    // Interrupted run: page cap 1 stops after the seed, leaving /a and /b
    // pending in the checkpoint
    let resumed_dir = tempfile::TempDir::new().unwrap();
    let mut capped = crawl_config();
    capped.page_cap = 1;
    let partial = run_job(&base, &capped, resumed_dir.path(), true).await;
    assert_eq!(partial.pages_fetched, 1);

    // Resume without the cap and finish
    let finished = run_job(&base, &crawl_config(), resumed_dir.path(), false).await;
    assert_eq!(finished.state, JobState::Completed);

    let resumed_record = load_checkpoint(&finished.checkpoint).unwrap().unwrap();
    assert_eq!(resumed_record.frontier.visited, reference_record.frontier.visited);
    assert_eq!(resumed_record.frontier.pages_fetched, 3);
}

#[tokio::test]
async fn test_server_errors_skipped_job_completes() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_response(format!(
            r#"<html><body><a href="{0}/gone">gone</a><a href="{0}/ok">ok</a></body></html>"#,
            base
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(html_response("<html></html>".to_string()))
        .mount(&server)
        .await;

    let dir = tempfile::TempDir::new().unwrap();
    let report = run_job(&base, &crawl_config(), dir.path(), true).await;

    assert_eq!(report.state, JobState::Completed);
    // Failed fetches still count as visited
    assert_eq!(report.pages_fetched, 3);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].url.ends_with("/gone"));
}

#[tokio::test]
async fn test_transient_error_retried_once() {
    let server = MockServer::start().await;

    // First attempt 503, retry succeeds
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_response("<html></html>".to_string()))
        .mount(&server)
        .await;

    let dir = tempfile::TempDir::new().unwrap();
    let report = run_job(&server.uri(), &crawl_config(), dir.path(), true).await;

    assert_eq!(report.state, JobState::Completed);
    assert_eq!(report.pages_fetched, 1);
    assert!(report.errors.is_empty());
}

#[tokio::test]
async fn test_pages_streamed_to_store() {
    let server = MockServer::start().await;
    mount_three_page_site(&server).await;

    let base_url = normalize_url(&server.uri()).unwrap();
    let job = CrawlJob::new("docs", base_url, vec![], "hash");
    let store = store();
    let run_id = store.lock().unwrap().create_run("hash").unwrap();

    let dir = tempfile::TempDir::new().unwrap();
    let mut scheduler = Scheduler::new(
        job,
        &crawl_config(),
        Arc::clone(&store),
        run_id,
        dir.path(),
        true,
    )
    .unwrap();
    let report = scheduler.run().await.unwrap();
    assert_eq!(report.state, JobState::Completed);

    let store = store.lock().unwrap();
    assert_eq!(store.count_pages().unwrap(), 3);
    assert_eq!(store.pages_for_source("docs").unwrap().len(), 3);
}
