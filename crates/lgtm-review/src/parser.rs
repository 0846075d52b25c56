//! Heuristic parsing of free-text LLM reviews.
//!
//! The model is asked for markdown sections but is free to answer however it
//! likes, so every extraction step has a fallback and parsing never fails:
//! a response with no recognisable structure still yields a summary (its
//! first 200 characters), no findings, no recommendations and a verdict.

use lgtm_core::{FindingType, ReviewConfig, ReviewFinding, ReviewResult, Severity};
use regex::Regex;

use crate::assessment::determine_assessment;

/// At most this many findings are kept.
pub const MAX_FINDINGS: usize = 10;

/// At most this many recommendations are kept.
pub const MAX_RECOMMENDATIONS: usize = 5;

/// Recommendation lines must be strictly longer than this after cleaning.
pub const MIN_RECOMMENDATION_LEN: usize = 10;

/// Characters kept when the response has no summary section.
pub const SUMMARY_FALLBACK_CHARS: usize = 200;

/// Longest finding description, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 150;

/// Placeholder file for findings that are not attributed to a file.
pub const UNATTRIBUTED_FILE: &str = "various";

/// Keyword groups in priority order. The first group with a hit claims the line.
const KEYWORD_GROUPS: &[(FindingType, &[&str])] = &[
    (FindingType::Bug, &["bug", "error", "issue", "problem"]),
    (
        FindingType::Security,
        &["security", "vulnerability", "unsafe", "exploit"],
    ),
    (
        FindingType::Performance,
        &["performance", "slow", "optimize", "inefficient"],
    ),
    (FindingType::Style, &["style", "formatting", "convention"]),
    (
        FindingType::BestPractice,
        &["best practice", "refactor", "improve"],
    ),
];

/// Tunables for [`parse_review_response`].
///
/// # Examples
///
/// ```
/// use lgtm_review::parser::{ParseOptions, MIN_RECOMMENDATION_LEN};
///
/// assert_eq!(ParseOptions::default().min_recommendation_len, MIN_RECOMMENDATION_LEN);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Recommendation lines of this many characters or fewer are dropped.
    pub min_recommendation_len: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            min_recommendation_len: MIN_RECOMMENDATION_LEN,
        }
    }
}

impl From<&ReviewConfig> for ParseOptions {
    fn from(config: &ReviewConfig) -> Self {
        Self {
            min_recommendation_len: config.min_recommendation_len,
        }
    }
}

/// Ways a section can be introduced, tried in this order.
#[derive(Debug, Clone, Copy)]
enum SectionStyle {
    /// `**Name**`, content runs to the next line starting with `**`.
    Bold,
    /// `## Name`, content runs to the next line starting with `##`.
    Heading,
    /// `Name:`, content runs to the next blank line.
    Label,
}

const SECTION_STYLES: [SectionStyle; 3] =
    [SectionStyle::Bold, SectionStyle::Heading, SectionStyle::Label];

impl SectionStyle {
    fn header(self, name: &str) -> Option<Regex> {
        let name = regex::escape(name);
        let pattern = match self {
            SectionStyle::Bold => format!(r"(?i)\*\*{name}[:\s]*\*\*\s*"),
            SectionStyle::Heading => format!(r"(?i)##\s*{name}[:\s]*"),
            SectionStyle::Label => format!(r"(?i){name}[:\s]*"),
        };
        Regex::new(&pattern).ok()
    }

    fn terminator(self) -> &'static str {
        match self {
            SectionStyle::Bold => "\n**",
            SectionStyle::Heading => "\n##",
            SectionStyle::Label => "\n\n",
        }
    }

    /// Raw (untrimmed) body of the first section introduced in this style.
    fn capture<'a>(self, text: &'a str, name: &str) -> Option<&'a str> {
        let header = self.header(name)?;
        let start = header.find(text)?.end();
        let rest = &text[start..];
        let end = rest.find(self.terminator()).unwrap_or(rest.len());
        Some(&rest[..end]).filter(|body| !body.is_empty())
    }
}

/// Find a named section, trying bold headers, then `##` headings, then loose
/// `Name:` labels. Matching is case-insensitive; the body is trimmed.
///
/// # Examples
///
/// ```
/// use lgtm_review::parser::extract_section;
///
/// let text = "## Summary\nAdds retries.\n## Findings\nnone";
/// assert_eq!(extract_section(text, "summary").as_deref(), Some("Adds retries."));
/// assert_eq!(extract_section(text, "Verdict"), None);
/// ```
pub fn extract_section(text: &str, name: &str) -> Option<String> {
    SECTION_STYLES
        .iter()
        .find_map(|style| style.capture(text, name))
        .map(|body| body.trim().to_string())
}

/// Summary section, or the first 200 characters of the response.
pub fn extract_summary(text: &str) -> String {
    extract_section(text, "Summary")
        .unwrap_or_else(|| text.chars().take(SUMMARY_FALLBACK_CHARS).collect())
}

/// Scan the response line by line for finding keywords.
///
/// Each line yields at most one finding, classified by the first keyword
/// group it matches. Descriptions are lowercased, trimmed and capped at 150
/// characters; the first ten findings are kept.
///
/// # Examples
///
/// ```
/// use lgtm_core::{FindingType, Severity};
/// use lgtm_review::parser::extract_findings;
///
/// let findings = extract_findings("Looks good.\nThere is a critical security vulnerability in auth.js");
/// assert_eq!(findings.len(), 1);
/// assert_eq!(findings[0].kind, FindingType::Security);
/// assert_eq!(findings[0].severity, Severity::High);
/// ```
pub fn extract_findings(text: &str) -> Vec<ReviewFinding> {
    text.to_lowercase()
        .split('\n')
        .filter_map(classify_line)
        .take(MAX_FINDINGS)
        .collect()
}

fn classify_line(line: &str) -> Option<ReviewFinding> {
    let (kind, _) = KEYWORD_GROUPS
        .iter()
        .find(|(_, words)| words.iter().any(|word| line.contains(word)))?;

    Some(ReviewFinding {
        kind: *kind,
        severity: line_severity(line),
        file: UNATTRIBUTED_FILE.to_string(),
        line: None,
        description: line.trim().chars().take(MAX_DESCRIPTION_CHARS).collect(),
        suggestion: None,
    })
}

fn line_severity(line: &str) -> Severity {
    if line.contains("critical") || line.contains("high") {
        Severity::High
    } else if line.contains("medium") {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Pull recommendation lines out of a "Recommendations" (or "Suggestions")
/// section.
///
/// Leading bullets and numbering are stripped; lines no longer than
/// `min_len` characters are dropped and at most five are kept.
///
/// # Examples
///
/// ```
/// use lgtm_review::parser::extract_recommendations;
///
/// let text = "**Recommendations**\n- Add tests for the retry path\n2) Log the status code";
/// let recs = extract_recommendations(text, 10);
/// assert_eq!(recs, vec!["Add tests for the retry path", "Log the status code"]);
/// ```
pub fn extract_recommendations(text: &str, min_len: usize) -> Vec<String> {
    let Some(section) =
        extract_section(text, "Recommendations").or_else(|| extract_section(text, "Suggestions"))
    else {
        return Vec::new();
    };

    section
        .split('\n')
        .map(strip_list_marker)
        .filter(|line| line.chars().count() > min_len)
        .take(MAX_RECOMMENDATIONS)
        .map(str::to_string)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    line.trim_start_matches(|c: char| {
        matches!(c, '-' | '*' | '.' | ')') || c.is_ascii_digit() || c.is_whitespace()
    })
    .trim()
}

/// Turn a raw LLM response into a [`ReviewResult`].
///
/// Deterministic and infallible: the same input always produces the same
/// result.
///
/// # Examples
///
/// ```
/// use lgtm_core::Assessment;
/// use lgtm_review::parser::{parse_review_response, ParseOptions};
///
/// let result = parse_review_response("Overall I approve this PR.", &ParseOptions::default());
/// assert_eq!(result.assessment, Assessment::Approve);
/// assert_eq!(result.summary, "Overall I approve this PR.");
/// ```
pub fn parse_review_response(raw: &str, options: &ParseOptions) -> ReviewResult {
    let summary = extract_summary(raw);
    let findings = extract_findings(raw);
    let recommendations = extract_recommendations(raw, options.min_recommendation_len);
    let assessment = determine_assessment(raw, &findings);

    ReviewResult {
        summary,
        findings,
        recommendations,
        assessment,
        raw_review: raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lgtm_core::Assessment;

    #[test]
    fn bold_section_runs_to_next_bold_header() {
        let text = "**Summary**\nLooks fine.\n**Findings**\nno major issues\n";
        assert_eq!(extract_section(text, "Summary").as_deref(), Some("Looks fine."));
    }

    #[test]
    fn bold_section_accepts_colon_inside_markers() {
        let text = "**Summary:** Adds pagination\nto the list endpoint.";
        assert_eq!(
            extract_section(text, "summary").as_deref(),
            Some("Adds pagination\nto the list endpoint.")
        );
    }

    #[test]
    fn heading_section_runs_to_next_heading() {
        let text = "# Review\n## Summary\n\nRewrites the parser.\n\nMore detail.\n## Findings\n- none";
        assert_eq!(
            extract_section(text, "Summary").as_deref(),
            Some("Rewrites the parser.\n\nMore detail.")
        );
    }

    #[test]
    fn heading_section_matches_deeper_headings() {
        let text = "### Summary\nSmall fix.";
        assert_eq!(extract_section(text, "Summary").as_deref(), Some("Small fix."));
    }

    #[test]
    fn label_section_runs_to_blank_line() {
        let text = "summary: Moves config loading.\nNo behavior change.\n\nFindings: none";
        assert_eq!(
            extract_section(text, "Summary").as_deref(),
            Some("Moves config loading.\nNo behavior change.")
        );
    }

    #[test]
    fn bold_style_wins_over_heading_style() {
        let text = "## Summary\nfrom heading\n**Summary**\nfrom bold";
        assert_eq!(extract_section(text, "Summary").as_deref(), Some("from bold"));
    }

    #[test]
    fn empty_bold_capture_falls_through_to_next_style() {
        // The bold header sits at the very end, so its body is empty; the loose
        // label strategy then finds the earlier plain-text occurrence.
        let text = "Summary: real content\n\n**Summary**";
        assert_eq!(extract_section(text, "Summary").as_deref(), Some("real content"));
    }

    #[test]
    fn missing_section_is_none() {
        assert_eq!(extract_section("nothing to see", "Recommendations"), None);
        assert_eq!(extract_section("", "Summary"), None);
    }

    #[test]
    fn section_name_is_matched_literally() {
        let text = "**C++ notes**\nuse RAII";
        assert_eq!(extract_section(text, "C++ notes").as_deref(), Some("use RAII"));
    }

    #[test]
    fn summary_falls_back_to_prefix() {
        let raw = "z".repeat(300);
        assert_eq!(extract_summary(&raw), "z".repeat(200));
        assert_eq!(extract_summary("short reply"), "short reply");
    }

    #[test]
    fn first_matching_group_wins() {
        let findings = extract_findings("This bug is also a security hole");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingType::Bug);
    }

    #[test]
    fn each_keyword_group_is_recognised() {
        let text = "\
unsafe pointer cast
the loop is slow
naming convention differs
consider a refactor here
nothing to report";
        let kinds: Vec<FindingType> = extract_findings(text).iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![
                FindingType::Security,
                FindingType::Performance,
                FindingType::Style,
                FindingType::BestPractice,
            ]
        );
    }

    #[test]
    fn severity_keywords() {
        let findings = extract_findings(
            "HIGH risk error in parser\nmedium problem with retries\nminor style nit",
        );
        let severities: Vec<Severity> = findings.iter().map(|f| f.severity).collect();
        assert_eq!(severities, vec![Severity::High, Severity::Medium, Severity::Low]);
    }

    #[test]
    fn critical_counts_as_high() {
        let findings = extract_findings("Critical: unhandled error on empty input");
        assert_eq!(findings[0].severity, Severity::High);
    }

    #[test]
    fn description_is_lowercased_trimmed_and_capped() {
        let line = format!("   Bug: {}   ", "A".repeat(200));
        let findings = extract_findings(&line);
        let description = &findings[0].description;
        assert_eq!(description.chars().count(), MAX_DESCRIPTION_CHARS);
        assert!(description.starts_with("bug: aaa"));
        assert_eq!(findings[0].file, UNATTRIBUTED_FILE);
        assert!(findings[0].line.is_none());
    }

    #[test]
    fn findings_are_capped_in_text_order() {
        let text: String = (0..15).map(|i| format!("bug number {i}\n")).collect();
        let findings = extract_findings(&text);
        assert_eq!(findings.len(), MAX_FINDINGS);
        assert_eq!(findings[0].description, "bug number 0");
        assert_eq!(findings[9].description, "bug number 9");
    }

    #[test]
    fn recommendations_strip_markers_and_filter_short_lines() {
        let text = "\
## Recommendations
- Validate the token before use
* Cache the parsed config object
3. Add an integration test for 404s
1) short
-
## Assessment
Comment";
        let recs = extract_recommendations(text, MIN_RECOMMENDATION_LEN);
        assert_eq!(
            recs,
            vec![
                "Validate the token before use",
                "Cache the parsed config object",
                "Add an integration test for 404s",
            ]
        );
    }

    #[test]
    fn recommendation_threshold_is_strict() {
        let text = "**Recommendations**\n- do this\n* and this\n1) short";
        // "do this" (7), "and this" (8) and "short" (5) are all too short by default.
        assert!(extract_recommendations(text, MIN_RECOMMENDATION_LEN).is_empty());
        // With a lower threshold the 5-character line sits exactly on the boundary.
        assert_eq!(extract_recommendations(text, 5), vec!["do this", "and this"]);
    }

    #[test]
    fn recommendations_fall_back_to_suggestions() {
        let text = "Suggestions:\n- Prefer iterators over index loops\n";
        assert_eq!(
            extract_recommendations(text, MIN_RECOMMENDATION_LEN),
            vec!["Prefer iterators over index loops"]
        );
    }

    #[test]
    fn recommendations_are_capped() {
        let body: String = (0..8)
            .map(|i| format!("- recommendation number {i}\n"))
            .collect();
        let text = format!("**Recommendations**\n{body}");
        let recs = extract_recommendations(&text, MIN_RECOMMENDATION_LEN);
        assert_eq!(recs.len(), MAX_RECOMMENDATIONS);
        assert_eq!(recs[4], "recommendation number 4");
    }

    #[test]
    fn no_recommendation_section_gives_empty_list() {
        assert!(extract_recommendations("all good", MIN_RECOMMENDATION_LEN).is_empty());
    }

    #[test]
    fn bold_summary_scenario() {
        let raw = "**Summary**\nLooks fine.\n**Findings**\nno major issues\n";
        let result = parse_review_response(raw, &ParseOptions::default());
        assert_eq!(result.summary, "Looks fine.");
        // "issues" contains the bug keyword "issue".
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.findings[0].kind, FindingType::Bug);
        assert_eq!(result.findings[0].severity, Severity::Low);
        assert_eq!(result.assessment, Assessment::Comment);
        assert_eq!(result.raw_review, raw);
    }

    #[test]
    fn critical_security_scenario() {
        let raw = "There is a critical security vulnerability in auth.js";
        let result = parse_review_response(raw, &ParseOptions::default());
        assert_eq!(result.findings.len(), 1);
        let finding = &result.findings[0];
        assert_eq!(finding.kind, FindingType::Security);
        assert_eq!(finding.severity, Severity::High);
        assert_eq!(finding.file, "various");
        assert_eq!(
            finding.description,
            "there is a critical security vulnerability in auth.js"
        );
        assert_eq!(result.assessment, Assessment::RequestChanges);
    }

    #[test]
    fn explicit_approval_beats_findings() {
        let raw = "Overall I approve this PR.\nCritical bug in the retry loop.";
        let result = parse_review_response(raw, &ParseOptions::default());
        assert_eq!(result.findings[0].severity, Severity::High);
        assert_eq!(result.assessment, Assessment::Approve);
    }

    #[test]
    fn parsing_is_deterministic() {
        let raw = "## Summary\nAdds a cache.\n## Findings\n- medium issue with eviction\n- slow lookup\n## Recommendations\n- Bound the cache size explicitly";
        let options = ParseOptions::default();
        let first = parse_review_response(raw, &options);
        let second = parse_review_response(raw, &options);
        assert_eq!(first, second);
        assert_eq!(first.recommendations, vec!["Bound the cache size explicitly"]);
    }

    #[test]
    fn unstructured_text_still_parses() {
        let result = parse_review_response("", &ParseOptions::default());
        assert_eq!(result.summary, "");
        assert!(result.findings.is_empty());
        assert!(result.recommendations.is_empty());
        assert_eq!(result.assessment, Assessment::Comment);
    }

    #[test]
    fn options_follow_review_config() {
        let config = ReviewConfig {
            min_recommendation_len: 3,
            ..ReviewConfig::default()
        };
        assert_eq!(ParseOptions::from(&config).min_recommendation_len, 3);
    }
}
