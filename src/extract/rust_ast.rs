//! AST-based signature extraction for Rust sources
//!
//! The one language with an exact code path: files parse into a real syntax
//! tree, so parameter names, types, and doc comments come out verbatim
//! instead of through pattern matching. Free functions and inherent/trait
//! impl methods are captured; methods are named `Type::method` so the entity
//! key still reduces to the method name.

use crate::extract::{ExtractError, Param, Provenance, SignatureRecord, SourceLocator};
use quote::ToTokens;
use std::path::Path;
use syn::{Attribute, FnArg, ImplItem, Item, ReturnType, Signature};

/// Parses one Rust source file and extracts every function signature
pub fn extract(source: &str, path: &Path) -> Result<Vec<SignatureRecord>, ExtractError> {
    let file = syn::parse_file(source).map_err(|e| ExtractError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let path_str = path.display().to_string();
    let mut records = Vec::new();

    for item in &file.items {
        match item {
            Item::Fn(item_fn) => {
                records.push(signature_record(
                    &item_fn.sig,
                    None,
                    &item_fn.attrs,
                    &path_str,
                ));
            }
            Item::Impl(item_impl) => {
                let type_name = type_name_of(&item_impl.self_ty);
                for impl_item in &item_impl.items {
                    if let ImplItem::Fn(method) = impl_item {
                        records.push(signature_record(
                            &method.sig,
                            type_name.as_deref(),
                            &method.attrs,
                            &path_str,
                        ));
                    }
                }
            }
            _ => {}
        }
    }

    Ok(records)
}

fn signature_record(
    sig: &Signature,
    owner: Option<&str>,
    attrs: &[Attribute],
    path: &str,
) -> SignatureRecord {
    let name = match owner {
        Some(owner) => format!("{}::{}", owner, sig.ident),
        None => sig.ident.to_string(),
    };

    let params = sig
        .inputs
        .iter()
        .filter_map(|arg| match arg {
            FnArg::Receiver(_) => None,
            FnArg::Typed(pat_type) => Some(Param {
                name: pattern_name(&pat_type.pat),
                type_hint: Some(tokens_to_string(&pat_type.ty)),
                default: None,
            }),
        })
        .collect();

    let return_type = match &sig.output {
        ReturnType::Default => None,
        ReturnType::Type(_, ty) => Some(tokens_to_string(ty)),
    };

    SignatureRecord {
        name,
        params,
        return_type,
        description: doc_comment_text(attrs),
        provenance: Provenance::Code,
        locator: SourceLocator::File {
            path: path.to_string(),
            line: sig.ident.span().start().line,
        },
    }
}

fn pattern_name(pat: &syn::Pat) -> String {
    match pat {
        syn::Pat::Ident(ident) => ident.ident.to_string(),
        // Destructuring patterns have no single name; keep the source text
        other => tokens_to_string(other),
    }
}

fn type_name_of(ty: &syn::Type) -> Option<String> {
    match ty {
        syn::Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .map(|segment| segment.ident.to_string()),
        _ => None,
    }
}

/// Renders a token stream without the extra spaces `quote` inserts around
/// punctuation, so `& str` reads back as `&str`
fn tokens_to_string<T: ToTokens>(tokens: &T) -> String {
    tokens
        .to_token_stream()
        .to_string()
        .replace("& ", "&")
        .replace(" , ", ", ")
        .replace(" :: ", "::")
        .replace(" < ", "<")
        .replace(" > ", ">")
        .replace(" >", ">")
        .replace("< ", "<")
}

/// First paragraph of the doc comment, joined to one line
fn doc_comment_text(attrs: &[Attribute]) -> String {
    let mut lines = Vec::new();
    for attr in attrs {
        if !attr.path().is_ident("doc") {
            continue;
        }
        if let syn::Meta::NameValue(name_value) = &attr.meta {
            if let syn::Expr::Lit(expr_lit) = &name_value.value {
                if let syn::Lit::Str(lit) = &expr_lit.lit {
                    let line = lit.value();
                    let line = line.trim();
                    if line.is_empty() && !lines.is_empty() {
                        break;
                    }
                    if !line.is_empty() {
                        lines.push(line.to_string());
                    }
                }
            }
        }
    }
    lines.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(source: &str) -> Vec<SignatureRecord> {
        extract(source, &PathBuf::from("src/lib.rs")).unwrap()
    }

    #[test]
    fn test_free_function_full_signature() {
        let records = parse(
            r#"
            /// Fetches a page from the server.
            ///
            /// Longer detail that belongs to a later paragraph.
            pub fn fetch(url: &str, timeout: u64) -> Result<String, Error> {
                unimplemented!()
            }
            "#,
        );

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.name, "fetch");
        assert_eq!(record.params.len(), 2);
        assert_eq!(record.params[0].name, "url");
        assert_eq!(record.params[0].type_hint.as_deref(), Some("&str"));
        assert_eq!(record.params[1].type_hint.as_deref(), Some("u64"));
        assert_eq!(record.return_type.as_deref(), Some("Result<String, Error>"));
        assert_eq!(record.description, "Fetches a page from the server.");
        assert_eq!(record.provenance, Provenance::Code);
    }

    #[test]
    fn test_impl_methods_qualified_and_receiver_skipped() {
        let records = parse(
            r#"
            struct Client;

            impl Client {
                pub fn connect(&mut self, host: String) -> bool {
                    true
                }

                fn close(self) {}
            }
            "#,
        );

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Client::connect");
        assert_eq!(records[0].params.len(), 1);
        assert_eq!(records[0].params[0].name, "host");
        assert_eq!(records[1].name, "Client::close");
        assert!(records[1].params.is_empty());
        assert!(records[1].return_type.is_none());
    }

    #[test]
    fn test_line_numbers_recorded() {
        let records = parse("fn first() {}\n\nfn second() {}\n");
        assert_eq!(records.len(), 2);
        let lines: Vec<usize> = records
            .iter()
            .map(|r| match &r.locator {
                SourceLocator::File { line, .. } => *line,
                SourceLocator::Url(_) => panic!("expected file locator"),
            })
            .collect();
        assert_eq!(lines, vec![1, 3]);
    }

    #[test]
    fn test_unparsable_source_errors() {
        let result = extract("fn broken( {{{", &PathBuf::from("bad.rs"));
        assert!(matches!(result, Err(ExtractError::Parse { .. })));
    }

    #[test]
    fn test_undocumented_function_has_empty_description() {
        let records = parse("pub fn quiet() {}");
        assert_eq!(records.len(), 1);
        assert!(records[0].description.is_empty());
    }
}
