//! Pattern-based signature extraction for non-AST languages
//!
//! One regex strategy per language, tuned to that language's declaration
//! syntax. Pattern extraction is approximate: it captures top-level and
//! simply-indented declarations and their adjacent documentation, and that is
//! all it promises. Anything it misreads surfaces later as a conflict rather
//! than a crash.

use crate::extract::{parse_param_list, Language, Provenance, SignatureRecord, SourceLocator};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

fn python_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?m)^[ \t]*(?:async\s+)?def\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(([^)]*)\)\s*(?:->\s*([^:\n]+))?:",
        )
        .expect("python pattern is valid")
    })
}

fn javascript_patterns() -> &'static [Regex; 2] {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // function declarations
            Regex::new(r"(?m)^[ \t]*(?:export\s+)?(?:async\s+)?function\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*\(([^)]*)\)")
                .expect("js function pattern is valid"),
            // const name = (args) => arrow assignments
            Regex::new(r"(?m)^[ \t]*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*=\s*(?:async\s+)?\(([^)]*)\)\s*=>")
                .expect("js arrow pattern is valid"),
        ]
    })
}

fn go_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?m)^func\s+(?:\(\s*\w+\s+\*?(\w+)\s*\)\s*)?([A-Za-z_][A-Za-z0-9_]*)\s*\(([^)]*)\)\s*([^{\n]*)\{",
        )
        .expect("go pattern is valid")
    })
}

/// Extracts signatures from one source file using the language's patterns
pub fn extract(language: Language, source: &str, path: &Path) -> Vec<SignatureRecord> {
    let path_str = path.display().to_string();
    match language {
        Language::Python => extract_python(source, &path_str),
        Language::JavaScript => extract_javascript(source, &path_str),
        Language::Go => extract_go(source, &path_str),
        // Rust never reaches the pattern path
        Language::Rust => Vec::new(),
    }
}

fn extract_python(source: &str, path: &str) -> Vec<SignatureRecord> {
    python_pattern()
        .captures_iter(source)
        .map(|captures| {
            let whole = captures.get(0).expect("capture 0 always present");
            SignatureRecord {
                name: captures[1].to_string(),
                params: parse_param_list(&captures[2]),
                return_type: captures
                    .get(3)
                    .map(|m| m.as_str().trim().to_string())
                    .filter(|s| !s.is_empty()),
                description: python_docstring(source, whole.end()),
                provenance: Provenance::Code,
                locator: SourceLocator::File {
                    path: path.to_string(),
                    line: line_of(source, whole.start()),
                },
            }
        })
        .collect()
}

fn extract_javascript(source: &str, path: &str) -> Vec<SignatureRecord> {
    let mut records: Vec<SignatureRecord> = javascript_patterns()
        .iter()
        .flat_map(|pattern| pattern.captures_iter(source))
        .map(|captures| {
            let whole = captures.get(0).expect("capture 0 always present");
            let line = line_of(source, whole.start());
            SignatureRecord {
                name: captures[1].to_string(),
                params: parse_param_list(&captures[2]),
                return_type: None,
                description: preceding_line_comment(source, whole.start()),
                provenance: Provenance::Code,
                locator: SourceLocator::File {
                    path: path.to_string(),
                    line,
                },
            }
        })
        .collect();

    // Two patterns scan independently; restore source order
    records.sort_by_key(|r| match &r.locator {
        SourceLocator::File { line, .. } => *line,
        SourceLocator::Url(_) => 0,
    });
    records
}

fn extract_go(source: &str, path: &str) -> Vec<SignatureRecord> {
    go_pattern()
        .captures_iter(source)
        .map(|captures| {
            let whole = captures.get(0).expect("capture 0 always present");
            let name = match captures.get(1) {
                Some(receiver) => format!("{}.{}", receiver.as_str(), &captures[2]),
                None => captures[2].to_string(),
            };
            SignatureRecord {
                name,
                params: parse_param_list(&captures[3]),
                return_type: captures
                    .get(4)
                    .map(|m| m.as_str().trim().trim_matches(|c| c == '(' || c == ')').to_string())
                    .filter(|s| !s.is_empty()),
                description: preceding_line_comment(source, whole.start()),
                provenance: Provenance::Code,
                locator: SourceLocator::File {
                    path: path.to_string(),
                    line: line_of(source, whole.start()),
                },
            }
        })
        .collect()
}

/// 1-based line number of a byte offset
fn line_of(source: &str, offset: usize) -> usize {
    source[..offset].bytes().filter(|b| *b == b'\n').count() + 1
}

/// First line of a docstring immediately following a `def` line
fn python_docstring(source: &str, after: usize) -> String {
    let rest = &source[after..];
    let trimmed = rest.trim_start();

    for quote in ["\"\"\"", "'''"] {
        if let Some(body) = trimmed.strip_prefix(quote) {
            if let Some(end) = body.find(quote) {
                return body[..end]
                    .lines()
                    .map(str::trim)
                    .find(|l| !l.is_empty())
                    .unwrap_or("")
                    .to_string();
            }
        }
    }
    String::new()
}

/// Contiguous `//` comment lines directly above a declaration, joined
fn preceding_line_comment(source: &str, before: usize) -> String {
    let mut lines: Vec<&str> = Vec::new();
    for line in source[..before].lines().rev() {
        let trimmed = line.trim();
        if let Some(comment) = trimmed.strip_prefix("//") {
            lines.push(comment.trim_start_matches('/').trim());
        } else if trimmed.is_empty() && lines.is_empty() {
            continue;
        } else {
            break;
        }
    }
    lines.reverse();
    lines.join(" ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn run(language: Language, source: &str) -> Vec<SignatureRecord> {
        extract(language, source, &PathBuf::from("sample"))
    }

    #[test]
    fn test_python_def_with_docstring() {
        let source = r#"
import os

def resolve(path: str, strict: bool = False) -> str:
    """Resolves a path to its canonical form.

    Symlinks are followed.
    """
    return os.path.realpath(path)
"#;

        let records = run(Language::Python, source);
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.name, "resolve");
        assert_eq!(record.params.len(), 2);
        assert_eq!(record.params[1].default.as_deref(), Some("False"));
        assert_eq!(record.return_type.as_deref(), Some("str"));
        assert_eq!(record.description, "Resolves a path to its canonical form.");
        assert_eq!(
            record.locator,
            SourceLocator::File {
                path: "sample".to_string(),
                line: 4
            }
        );
    }

    #[test]
    fn test_python_method_self_dropped() {
        let source = "class Store:\n    def save(self, key, value=None):\n        pass\n";
        let records = run(Language::Python, source);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].params.len(), 2);
        assert_eq!(records[0].params[0].name, "key");
    }

    #[test]
    fn test_javascript_function_and_arrow() {
        let source = r#"
// Renders the panel into place.
export function render(template, data) {
  return template(data);
}

const sum = (a, b) => a + b;
"#;

        let records = run(Language::JavaScript, source);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "render");
        assert_eq!(records[0].description, "Renders the panel into place.");
        assert_eq!(records[1].name, "sum");
        assert_eq!(records[1].params.len(), 2);
    }

    #[test]
    fn test_go_function_and_method() {
        let source = r#"
package store

// Open opens the database file.
func Open(path string) (*DB, error) {
    return nil, nil
}

func (db *DB) Close() error {
    return nil
}
"#;

        let records = run(Language::Go, source);
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].name, "Open");
        assert_eq!(records[0].params.len(), 1);
        assert_eq!(records[0].params[0].type_hint.as_deref(), Some("string"));
        assert_eq!(records[0].return_type.as_deref(), Some("*DB, error"));
        assert_eq!(records[0].description, "Open opens the database file.");

        assert_eq!(records[1].name, "DB.Close");
        assert_eq!(records[1].return_type.as_deref(), Some("error"));
    }

    #[test]
    fn test_no_matches_in_plain_text() {
        assert!(run(Language::Python, "just notes, no code").is_empty());
        assert!(run(Language::Go, "func is a keyword we mention").is_empty());
    }
}
