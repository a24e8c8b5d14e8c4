use ruql_core::error::RuqlError;
use ruql_core::format::OutputFormat;
use ruql_core::resolve::ViewMode;

/// One qualifier=value assignment from the command line
#[derive(Debug, Clone)]
pub struct ContextPair {
    pub qualifier: String,
    pub value: String,
}

/// Parse a context assignment of the form `qualifier=value`
pub fn parse_context_pair(s: &str) -> std::result::Result<ContextPair, String> {
    match s.split_once('=') {
        Some((qualifier, value)) if !qualifier.trim().is_empty() && !value.trim().is_empty() => {
            Ok(ContextPair {
                qualifier: qualifier.trim().to_string(),
                value: value.trim().to_string(),
            })
        }
        _ => Err(RuqlError::InvalidContextArg(s.to_string()).to_string()),
    }
}

/// Parse an output format from string
pub fn parse_format(s: &str) -> std::result::Result<OutputFormat, String> {
    s.parse::<OutputFormat>().map_err(|e| e.to_string())
}

/// Parse a view mode from string
pub fn parse_view_mode(s: &str) -> std::result::Result<ViewMode, String> {
    s.parse::<ViewMode>().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_context_pair() {
        let pair = parse_context_pair("language=en-US").unwrap();
        assert_eq!(pair.qualifier, "language");
        assert_eq!(pair.value, "en-US");

        assert!(parse_context_pair("language").is_err());
        assert!(parse_context_pair("=en").is_err());
        assert!(parse_context_pair("language=").is_err());
    }

    #[test]
    fn test_parse_view_mode() {
        assert!(parse_view_mode("all").is_ok());
        assert!(parse_view_mode("everything").is_err());
    }
}
