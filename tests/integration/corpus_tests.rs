//! End-to-end corpus pipeline tests
//!
//! Drives the full path: TOML config on disk, crawl against a mock server,
//! extraction from pages and a source tree, conflict detection, merge, and
//! the JSON artifact.

use docweld::config::load_config_with_hash;
use docweld::merge::{MergedCorpus, MergedEntry};
use docweld::{output, pipeline};
use std::path::Path;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn write_config(dir: &Path, base: &str, src_root: &Path) -> std::path::PathBuf {
    let config_path = dir.join("docweld.toml");
    let contents = format!(
        r#"
[corpus]
name = "example"
output-path = "{out}"
checkpoint-dir = "{ckpt}"
database-path = "{db}"

[crawl]
delay-seconds = 0.0
workers = 2
timeout-seconds = 5

[[source]]
name = "docs"
kind = "web"
base-url = "{base}"

[[source]]
name = "lib"
kind = "code"
root = "{root}"
"#,
        out = dir.join("corpus.json").display(),
        ckpt = dir.join("checkpoints").display(),
        db = dir.join("pages.db").display(),
        base = base,
        root = src_root.display(),
    );
    std::fs::write(&config_path, contents).unwrap();
    config_path
}

#[tokio::test]
async fn test_full_pipeline_detects_return_type_drift() {
    let server = MockServer::start().await;

    // Documentation claims `count` returns str; the code says int
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(
                    "<html><body>\
                     <pre><code>def count(x: int) -> str:</code></pre>\
                     <p>Counts things.</p>\
                     </body></html>",
                    "text/html",
                ),
        )
        .mount(&server)
        .await;

    let dir = tempfile::TempDir::new().unwrap();
    let src = dir.path().join("src");
    std::fs::create_dir(&src).unwrap();
    std::fs::write(src.join("counter.py"), "def count(x: int) -> int:\n    return x\n").unwrap();

    let config_path = write_config(dir.path(), &server.uri(), &src);
    let (config, hash) = load_config_with_hash(&config_path).unwrap();

    let outcome = pipeline::run(&config, &hash, true).await.unwrap();

    assert!(!outcome.interrupted);
    assert_eq!(outcome.corpus.summary.pages, 1);
    assert_eq!(outcome.corpus.summary.entities, 1);
    assert_eq!(outcome.corpus.summary.conflicts, 1);
    assert_eq!(
        outcome.corpus.summary.conflicts_by_type.get("signature-mismatch"),
        Some(&1)
    );
    assert_eq!(
        outcome.corpus.summary.conflicts_by_severity.get("medium"),
        Some(&1)
    );

    // Default policy: code wins the structural fields
    let entity = outcome
        .corpus
        .entries
        .iter()
        .find_map(|entry| match entry {
            MergedEntry::Entity { signature, .. } => Some(signature),
            MergedEntry::Page(_) => None,
        })
        .unwrap();
    assert_eq!(entity.return_type.as_deref(), Some("int"));

    // The artifact round-trips through JSON
    output::write_corpus(Path::new(&config.corpus.output_path), &outcome.corpus).unwrap();
    let raw = std::fs::read_to_string(&config.corpus.output_path).unwrap();
    let parsed: MergedCorpus = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed.summary.conflicts, 1);
}

#[tokio::test]
async fn test_pipeline_fails_fast_on_invalid_config() {
    let dir = tempfile::TempDir::new().unwrap();
    let config_path = dir.path().join("bad.toml");
    std::fs::write(
        &config_path,
        r#"
[corpus]
name = "broken"
output-path = "out.json"
checkpoint-dir = "ckpt"
database-path = "pages.db"

[crawl]
delay-seconds = 0.5
workers = 50

[[source]]
name = "docs"
kind = "web"
base-url = "https://docs.example.com/"
"#,
    )
    .unwrap();

    // Worker count outside 1..=10 is rejected before any crawling
    assert!(load_config_with_hash(&config_path).is_err());
}
