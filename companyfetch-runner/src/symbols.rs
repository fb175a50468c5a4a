//! Symbol list loading.
//!
//! The list is a JSON array of records, each carrying at least a string
//! `symbol`. Records without one are dropped silently. Symbols that cannot be
//! used as a directory name are dropped with a warning, and repeated symbols
//! keep only their first occurrence. File order is the processing order.

use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SymbolListError {
    #[error("symbol list not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read symbol list {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("symbol list {} is not valid JSON: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("symbol list {} must be a JSON array of records", path.display())]
    NotAnArray { path: PathBuf },
}

/// One entry of the symbol list. Fields other than `symbol` are carried along
/// untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolRecord {
    pub symbol: String,
    pub extra: Map<String, Value>,
}

impl SymbolRecord {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            extra: Map::new(),
        }
    }
}

/// Load the symbol list from `path`.
pub fn load_symbols(path: &Path) -> Result<Vec<SymbolRecord>, SymbolListError> {
    let content = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            SymbolListError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            SymbolListError::Read {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let value: Value = serde_json::from_str(&content).map_err(|source| SymbolListError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let Value::Array(items) = value else {
        return Err(SymbolListError::NotAnArray {
            path: path.to_path_buf(),
        });
    };

    let records = records_from_items(items);
    tracing::debug!(path = %path.display(), count = records.len(), "loaded symbol list");
    Ok(records)
}

fn records_from_items(items: Vec<Value>) -> Vec<SymbolRecord> {
    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(items.len());

    for item in items {
        let Value::Object(mut fields) = item else {
            continue;
        };
        let symbol = match fields.remove("symbol") {
            Some(Value::String(s)) => s,
            _ => continue,
        };

        if !is_usable_dir_name(&symbol) {
            tracing::warn!(symbol = %symbol, "skipping symbol that is not a usable directory name");
            continue;
        }
        if !seen.insert(symbol.clone()) {
            tracing::debug!(symbol = %symbol, "dropping duplicate symbol");
            continue;
        }

        records.push(SymbolRecord {
            symbol,
            extra: fields,
        });
    }

    records
}

/// True when `symbol` can name exactly one directory under the output root.
pub fn is_usable_dir_name(symbol: &str) -> bool {
    !symbol.is_empty()
        && symbol != "."
        && symbol != ".."
        && !symbol.contains(['/', '\\', '\0'])
}

/// Keep only the records whose symbol is in `only`, in list order.
/// An empty `only` keeps everything.
pub fn restrict_to(records: Vec<SymbolRecord>, only: &[String]) -> Vec<SymbolRecord> {
    if only.is_empty() {
        return records;
    }

    for wanted in only {
        if !records.iter().any(|r| &r.symbol == wanted) {
            tracing::warn!(symbol = %wanted, "requested symbol is not in the symbol list");
        }
    }

    records
        .into_iter()
        .filter(|r| only.contains(&r.symbol))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn symbols(records: &[SymbolRecord]) -> Vec<&str> {
        records.iter().map(|r| r.symbol.as_str()).collect()
    }

    #[test]
    fn keeps_order_and_extra_fields() {
        let items = json!([
            {"symbol": "MSFT", "name": "Microsoft"},
            {"symbol": "AAPL"},
            {"symbol": "ACME", "sector": "Tech", "weight": 0.5}
        ]);
        let records = records_from_items(items.as_array().cloned().unwrap());

        assert_eq!(symbols(&records), vec!["MSFT", "AAPL", "ACME"]);
        assert_eq!(records[0].extra.get("name"), Some(&json!("Microsoft")));
        assert_eq!(records[2].extra.len(), 2);
        assert!(!records[2].extra.contains_key("symbol"));
    }

    #[test]
    fn records_without_string_symbol_are_dropped() {
        let items = json!([
            {"symbol": "AAPL"},
            {"ticker": "MSFT"},
            {"symbol": 42},
            {"symbol": null},
            "GOOG",
            {"symbol": "ACME"}
        ]);
        let records = records_from_items(items.as_array().cloned().unwrap());
        assert_eq!(symbols(&records), vec!["AAPL", "ACME"]);
    }

    #[test]
    fn unusable_names_and_duplicates_are_dropped() {
        let items = json!([
            {"symbol": "AAPL", "n": 1},
            {"symbol": ""},
            {"symbol": ".."},
            {"symbol": "A/B"},
            {"symbol": "AAPL", "n": 2},
            {"symbol": "BRK-B"}
        ]);
        let records = records_from_items(items.as_array().cloned().unwrap());
        assert_eq!(symbols(&records), vec!["AAPL", "BRK-B"]);
        assert_eq!(records[0].extra.get("n"), Some(&json!(1)));
    }

    #[test]
    fn dir_name_rules() {
        assert!(is_usable_dir_name("AAPL"));
        assert!(is_usable_dir_name("^GSPC"));
        assert!(is_usable_dir_name("BRK.B"));
        assert!(!is_usable_dir_name("."));
        assert!(!is_usable_dir_name("a\\b"));
    }

    #[test]
    fn restrict_keeps_list_order() {
        let records = vec![
            SymbolRecord::new("AAPL"),
            SymbolRecord::new("MSFT"),
            SymbolRecord::new("ACME"),
        ];
        let only = vec!["ACME".to_string(), "AAPL".to_string(), "ZZZZ".to_string()];
        let kept = restrict_to(records.clone(), &only);
        assert_eq!(symbols(&kept), vec!["AAPL", "ACME"]);

        assert_eq!(restrict_to(records, &[]).len(), 3);
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = load_symbols(Path::new("/nonexistent/symbols.json")).unwrap_err();
        assert!(matches!(err, SymbolListError::NotFound { .. }));
    }
}
