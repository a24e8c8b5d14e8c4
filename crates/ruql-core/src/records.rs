//! Utilities for records output format

use crate::engine::ResourceListEntry;
use crate::filter::FilteredResource;
use crate::overlay::PendingKind;
use crate::resolve::ResolutionReport;

/// Escape double quotes in a string for records format.
/// Replaces `"` with `\"` to allow safe embedding in quoted fields.
pub fn escape_quotes(s: &str) -> String {
    s.replace('\"', r#"\""#)
}

/// Format a resource listing line in records format
///
/// Returns a formatted R-line with id, candidate count, and overlay state.
pub fn format_resource_record(entry: &ResourceListEntry) -> String {
    let mut annotations = String::new();
    if let Some(kind) = entry.pending {
        let state = match kind {
            PendingKind::New => "new",
            PendingKind::Modified => "modified",
            PendingKind::Deleted => "deleted",
        };
        annotations.push_str(&format!(" pending={}", state));
    }
    if entry.has_edit {
        annotations.push_str(" edited");
    }
    format!(
        "R {} candidates={}{}",
        entry.id, entry.candidate_count, annotations
    )
}

/// Format a resolution outcome in records format
///
/// Returns a V-line for a resolved value or an E-line for a failure.
pub fn format_resolution_record(report: &ResolutionReport) -> String {
    if report.success {
        let value = report
            .value
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_default();
        let source = report
            .source
            .map(|s| format!(" source={:?}", s).to_lowercase())
            .unwrap_or_default();
        format!("V {}{} {}", report.id, source, value)
    } else {
        format!(
            "E {} \"{}\"",
            report.id,
            escape_quotes(report.error.as_deref().unwrap_or("resolution failed"))
        )
    }
}

/// Format a per-resource filter statistic in records format
///
/// Returns an F-line with kept/original counts and a warning marker.
pub fn format_filter_record(entry: &FilteredResource) -> String {
    let warn = if entry.has_warning { " warn" } else { "" };
    format!(
        "F {} kept={}/{}{}",
        entry.id, entry.filtered_candidate_count, entry.original_candidate_count, warn
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::ViewMode;

    #[test]
    fn test_escape_quotes() {
        assert_eq!(escape_quotes(r#"say "hi""#), r#"say \"hi\""#);
    }

    #[test]
    fn test_resource_record() {
        let entry = ResourceListEntry {
            id: "platform.title".to_string(),
            candidate_count: 2,
            pending: Some(PendingKind::New),
            has_edit: true,
        };
        assert_eq!(
            format_resource_record(&entry),
            "R platform.title candidates=2 pending=new edited"
        );
    }

    #[test]
    fn test_resolution_record_failure() {
        let report = ResolutionReport {
            id: "ghost".to_string(),
            success: false,
            view: ViewMode::Composed,
            value: None,
            error: Some("resource ghost not found".to_string()),
            source: None,
            has_edit: false,
            candidates: Vec::new(),
        };
        assert_eq!(
            format_resolution_record(&report),
            "E ghost \"resource ghost not found\""
        );
    }

    #[test]
    fn test_filter_record() {
        let entry = FilteredResource {
            id: "platform.title".to_string(),
            original_candidate_count: 2,
            filtered_candidate_count: 0,
            has_warning: true,
        };
        assert_eq!(format_filter_record(&entry), "F platform.title kept=0/2 warn");
    }
}
