// rust/distgraph-core/src/catalog/address.rs

use std::path::PathBuf;

use crate::error::{GraphError, Result};

/// Where the engine address list comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressSource {
    /// Addresses given inline in the configuration.
    List(Vec<String>),
    /// A file with one `host:port` per line, or `;`-separated.
    File(PathBuf),
}

impl AddressSource {
    /// Load and validate the address list, one entry per server instance.
    pub fn resolve(&self) -> Result<Vec<String>> {
        let addresses = match self {
            AddressSource::List(list) => list
                .iter()
                .map(|entry| entry.trim().to_string())
                .filter(|entry| !entry.is_empty())
                .collect::<Vec<_>>(),
            AddressSource::File(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    GraphError::io_with_source(path, "failed to read address file", e)
                })?;
                parse_address_list(&content)
            }
        };

        if addresses.is_empty() {
            return Err(GraphError::config("address list is empty"));
        }
        for address in &addresses {
            validate_address(address)?;
        }
        Ok(addresses)
    }
}

/// Split a newline- or semicolon-delimited address list.
pub fn parse_address_list(content: &str) -> Vec<String> {
    content
        .split(|c| c == '\n' || c == ';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

fn validate_address(address: &str) -> Result<()> {
    let invalid = || GraphError::config(format!("invalid address '{address}', expected host:port"));
    let (host, port) = address.rsplit_once(':').ok_or_else(invalid)?;
    if host.is_empty() || port.parse::<u16>().is_err() {
        return Err(invalid());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_line_and_semicolon_delimited() {
        let parsed = parse_address_list("10.0.0.1:8245\n10.0.0.2:8245;10.0.0.3:8245\n\n");
        assert_eq!(
            parsed,
            vec!["10.0.0.1:8245", "10.0.0.2:8245", "10.0.0.3:8245"]
        );
    }

    #[test]
    fn test_resolve_inline_list() {
        let source = AddressSource::List(vec![" 127.0.0.1:8245 ".to_string()]);
        assert_eq!(source.resolve().unwrap(), vec!["127.0.0.1:8245"]);
    }

    #[test]
    fn test_resolve_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "172.31.50.123:8245").unwrap();
        writeln!(file, "172.31.50.124:8245").unwrap();

        let source = AddressSource::File(file.path().to_path_buf());
        assert_eq!(source.resolve().unwrap().len(), 2);
    }

    #[test]
    fn test_resolve_missing_file() {
        let source = AddressSource::File(PathBuf::from("/nonexistent/ip_list.txt"));
        assert!(matches!(source.resolve(), Err(GraphError::Io { .. })));
    }

    #[test]
    fn test_rejects_malformed_entries() {
        for bad in ["localhost", ":8245", "host:port", "host:70000"] {
            let source = AddressSource::List(vec![bad.to_string()]);
            assert!(
                matches!(source.resolve(), Err(GraphError::Config { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_empty_list() {
        let source = AddressSource::List(vec![]);
        assert!(source.resolve().is_err());
    }
}
