//! Signature extraction
//!
//! Two independent producers fill the same [`SignatureRecord`] shape:
//!
//! - [`docs`]: scrapes rendered documentation pages for declaration markers
//!   (fenced code blocks and headings), provenance `docs`
//! - the code path: [`rust_ast`] walks real syntax trees for Rust sources;
//!   [`patterns`] applies per-language declaration regexes for everything
//!   else, provenance `code`
//!
//! Downstream comparison never needs to know which path produced a record.

pub mod docs;
pub mod patterns;
pub mod rust_ast;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Which side of the corpus a signature came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Docs,
    Code,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Docs => write!(f, "docs"),
            Provenance::Code => write!(f, "code"),
        }
    }
}

/// Where a signature was found
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceLocator {
    Url(String),
    File { path: String, line: usize },
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocator::Url(url) => write!(f, "{}", url),
            SourceLocator::File { path, line } => write!(f, "{}:{}", path, line),
        }
    }
}

/// One declared parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(rename = "type-hint")]
    pub type_hint: Option<String>,
    pub default: Option<String>,
}

/// A function/method signature as seen by one extraction path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub name: String,
    pub params: Vec<Param>,
    #[serde(rename = "return-type")]
    pub return_type: Option<String>,
    pub description: String,
    pub provenance: Provenance,
    pub locator: SourceLocator,
}

impl SignatureRecord {
    /// Entity-identity key: the final name segment, lowercased
    ///
    /// `Client::fetch`, `client.fetch` and `fetch` all identify the same
    /// logical entity within one unit.
    pub fn normalized_name(&self) -> String {
        let tail = self
            .name
            .rsplit("::")
            .next()
            .unwrap_or(&self.name)
            .rsplit('.')
            .next()
            .unwrap_or(&self.name);
        tail.to_lowercase()
    }

    /// How many parameters carry a type hint; used for duplicate tie-breaks
    pub fn hinted_param_count(&self) -> usize {
        self.params.iter().filter(|p| p.type_hint.is_some()).count()
    }
}

/// Errors from the code extraction path
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Languages the code path understands, keyed by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    Go,
}

impl Language {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "rs" => Some(Language::Rust),
            "py" => Some(Language::Python),
            "js" | "mjs" | "ts" => Some(Language::JavaScript),
            "go" => Some(Language::Go),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::Go => "go",
        }
    }

    /// Extracts signatures from one source file in this language
    ///
    /// Rust goes through a real syntax tree; the rest go through per-language
    /// declaration patterns. Both paths emit the same record shape.
    pub fn extract(&self, source: &str, path: &Path) -> Result<Vec<SignatureRecord>, ExtractError> {
        match self {
            Language::Rust => rust_ast::extract(source, path),
            Language::Python | Language::JavaScript | Language::Go => {
                Ok(patterns::extract(*self, source, path))
            }
        }
    }
}

/// Directories never worth descending into
const SKIPPED_DIRS: &[&str] = &["target", "node_modules", "__pycache__", "vendor", "dist"];

/// Walks a source tree and extracts signatures from every recognized file
///
/// Unparsable or unreadable files are logged and skipped; extraction
/// continues for the rest of the tree. Files are visited in path order so
/// output is stable across runs.
pub fn extract_from_tree(root: &Path) -> std::io::Result<Vec<SignatureRecord>> {
    let mut files = Vec::new();
    collect_source_files(root, &mut files)?;
    files.sort();

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for path in &files {
        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => ext,
            None => continue,
        };
        let language = match Language::from_extension(ext) {
            Some(language) => language,
            None => continue,
        };

        let source = match std::fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable file");
                skipped += 1;
                continue;
            }
        };

        match language.extract(&source, path) {
            Ok(mut found) => records.append(&mut found),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unparsable file");
                skipped += 1;
            }
        }
    }

    tracing::debug!(
        root = %root.display(),
        files = files.len(),
        skipped,
        signatures = records.len(),
        "code extraction finished"
    );

    Ok(records)
}

fn collect_source_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if name.starts_with('.') {
            continue;
        }

        if path.is_dir() {
            if SKIPPED_DIRS.contains(&name.as_ref()) {
                continue;
            }
            collect_source_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// Splits a raw parameter list on top-level commas and parses each piece
///
/// Understands `name: Type = default` (Python/Rust style), `name = default`,
/// and `name Type` (Go style). Receivers (`self`, `cls`, `&self`) are
/// dropped since they are not comparable parameters.
pub(crate) fn parse_param_list(raw: &str) -> Vec<Param> {
    split_top_level(raw)
        .into_iter()
        .filter_map(|piece| parse_param(&piece))
        .collect()
}

fn split_top_level(raw: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();

    for c in raw.chars() {
        match c {
            '(' | '[' | '{' | '<' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '}' | '>' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                pieces.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        pieces.push(current.trim().to_string());
    }

    pieces.retain(|p| !p.is_empty());
    pieces
}

fn parse_param(piece: &str) -> Option<Param> {
    let piece = piece.trim();
    if piece.is_empty() {
        return None;
    }

    let bare = piece.trim_start_matches('&').trim_start_matches("mut ").trim();
    // Receivers and Python's bare separator markers are not real parameters
    if matches!(bare, "self" | "cls" | "*" | "/") {
        return None;
    }

    // name: Type = default
    if let Some((name, rest)) = piece.split_once(':') {
        let (type_hint, default) = match rest.split_once('=') {
            Some((ty, default)) => (ty.trim(), Some(default.trim().to_string())),
            None => (rest.trim(), None),
        };
        let type_hint = if type_hint.is_empty() {
            None
        } else {
            Some(type_hint.to_string())
        };
        return Some(Param {
            name: name.trim().trim_start_matches('*').to_string(),
            type_hint,
            default,
        });
    }

    // name = default
    if let Some((name, default)) = piece.split_once('=') {
        return Some(Param {
            name: name.trim().to_string(),
            type_hint: None,
            default: Some(default.trim().to_string()),
        });
    }

    // name Type (Go)
    if let Some((name, ty)) = piece.split_once(' ') {
        return Some(Param {
            name: name.trim().to_string(),
            type_hint: Some(ty.trim().to_string()),
            default: None,
        });
    }

    Some(Param {
        name: piece.trim_start_matches('*').to_string(),
        type_hint: None,
        default: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> SignatureRecord {
        SignatureRecord {
            name: name.to_string(),
            params: vec![],
            return_type: None,
            description: String::new(),
            provenance: Provenance::Code,
            locator: SourceLocator::File {
                path: "lib.rs".to_string(),
                line: 1,
            },
        }
    }

    #[test]
    fn test_normalized_name_strips_qualifiers() {
        assert_eq!(record("fetch").normalized_name(), "fetch");
        assert_eq!(record("Client::Fetch").normalized_name(), "fetch");
        assert_eq!(record("client.fetch").normalized_name(), "fetch");
        assert_eq!(record("pkg.Client.Fetch").normalized_name(), "fetch");
    }

    #[test]
    fn test_parse_param_list_typed_with_default() {
        let params = parse_param_list("name: str, count: int = 3");
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].name, "name");
        assert_eq!(params[0].type_hint.as_deref(), Some("str"));
        assert_eq!(params[1].default.as_deref(), Some("3"));
    }

    #[test]
    fn test_parse_param_list_skips_receivers() {
        let params = parse_param_list("&mut self, url: &str");
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].name, "url");

        let params = parse_param_list("self, timeout=30");
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].default.as_deref(), Some("30"));
    }

    #[test]
    fn test_parse_param_list_nested_generics() {
        let params = parse_param_list("items: Vec<(String, u32)>, flag: bool");
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].type_hint.as_deref(), Some("Vec<(String, u32)>"));
    }

    #[test]
    fn test_parse_param_list_go_style() {
        let params = parse_param_list("url string, timeout time.Duration");
        assert_eq!(params.len(), 2);
        assert_eq!(params[1].name, "timeout");
        assert_eq!(params[1].type_hint.as_deref(), Some("time.Duration"));
    }

    #[test]
    fn test_language_from_extension() {
        assert_eq!(Language::from_extension("rs"), Some(Language::Rust));
        assert_eq!(Language::from_extension("py"), Some(Language::Python));
        assert_eq!(Language::from_extension("go"), Some(Language::Go));
        assert_eq!(Language::from_extension("md"), None);
    }

    #[test]
    fn test_extract_from_tree_skips_bad_files() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("good.rs"),
            "pub fn alpha(x: u32) -> u32 { x }",
        )
        .unwrap();
        std::fs::write(dir.path().join("bad.rs"), "fn broken( {{{").unwrap();
        std::fs::write(dir.path().join("notes.md"), "not source").unwrap();

        let records = extract_from_tree(dir.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "alpha");
    }

    #[test]
    fn test_extract_from_tree_ignores_vendor_dirs() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("node_modules")).unwrap();
        std::fs::write(
            dir.path().join("node_modules").join("dep.js"),
            "function hidden() {}",
        )
        .unwrap();
        std::fs::write(dir.path().join("app.js"), "function visible() {}").unwrap();

        let records = extract_from_tree(dir.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "visible");
    }
}
