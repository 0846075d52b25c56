use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of a pull request taken at the start of a review.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use lgtm_core::PullRequestData;
///
/// let pr = PullRequestData {
///     id: 1,
///     number: 42,
///     title: "Add login rate limiting".into(),
///     body: String::new(),
///     author: "octocat".into(),
///     branch: "feature/rate-limit".into(),
///     base_branch: "main".into(),
///     state: "open".into(),
///     url: "https://github.com/acme/api/pull/42".into(),
///     created_at: Utc::now(),
///     updated_at: Utc::now(),
/// };
/// assert_eq!(pr.number, 42);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestData {
    /// GitHub's global identifier for the pull request.
    pub id: u64,
    /// Repository-scoped pull request number.
    pub number: u64,
    /// Pull request title.
    pub title: String,
    /// Description text (empty when the author left none).
    pub body: String,
    /// Login of the author, `"unknown"` for deleted accounts.
    pub author: String,
    /// Head (source) branch name.
    pub branch: String,
    /// Base (target) branch name.
    pub base_branch: String,
    /// `open` or `closed`.
    pub state: String,
    /// Browser URL of the pull request.
    pub url: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// Per-file change statistics of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChange {
    /// Path of the file in the head revision.
    pub filename: String,
    /// `added`, `modified`, `removed`, `renamed`, ...
    pub status: String,
    /// Added line count.
    pub additions: u64,
    /// Removed line count.
    pub deletions: u64,
    /// Total changed lines.
    pub changes: u64,
    /// Unified diff for the file; GitHub omits it for large or binary files.
    pub patch: Option<String>,
}

/// Category of a review finding.
///
/// # Examples
///
/// ```
/// use lgtm_core::FindingType;
///
/// let t: FindingType = serde_json::from_str("\"best-practice\"").unwrap();
/// assert_eq!(t, FindingType::BestPractice);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindingType {
    /// Functional defect.
    Bug,
    /// Security weakness.
    Security,
    /// Performance concern.
    Performance,
    /// Style or formatting remark.
    Style,
    /// General best-practice or refactoring advice.
    BestPractice,
}

impl FindingType {
    /// Wire spelling of the category.
    pub fn as_str(self) -> &'static str {
        match self {
            FindingType::Bug => "bug",
            FindingType::Security => "security",
            FindingType::Performance => "performance",
            FindingType::Style => "style",
            FindingType::BestPractice => "best-practice",
        }
    }
}

impl fmt::Display for FindingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a review finding.
///
/// # Examples
///
/// ```
/// use lgtm_core::Severity;
///
/// let s: Severity = "HIGH".parse().unwrap();
/// assert_eq!(s, Severity::High);
/// assert_eq!(s.to_string(), "high");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Must be addressed before merging.
    High,
    /// Should be addressed.
    Medium,
    /// Nice to have.
    Low,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::High => write!(f, "high"),
            Severity::Medium => write!(f, "medium"),
            Severity::Low => write!(f, "low"),
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// Overall verdict of a review.
///
/// # Examples
///
/// ```
/// use lgtm_core::Assessment;
///
/// let a: Assessment = "request_changes".parse().unwrap();
/// assert_eq!(a, Assessment::RequestChanges);
/// assert_eq!(serde_json::to_string(&a).unwrap(), "\"REQUEST_CHANGES\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Assessment {
    /// The change can be merged as is.
    Approve,
    /// The change needs work before merging.
    RequestChanges,
    /// Feedback without a blocking verdict.
    Comment,
}

impl Assessment {
    /// Wire spelling of the verdict.
    pub fn as_str(self) -> &'static str {
        match self {
            Assessment::Approve => "APPROVE",
            Assessment::RequestChanges => "REQUEST_CHANGES",
            Assessment::Comment => "COMMENT",
        }
    }
}

impl fmt::Display for Assessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Assessment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "APPROVE" => Ok(Assessment::Approve),
            "REQUEST_CHANGES" => Ok(Assessment::RequestChanges),
            "COMMENT" => Ok(Assessment::Comment),
            other => Err(format!("unknown assessment: {other}")),
        }
    }
}

/// A single finding extracted from the LLM review text.
///
/// # Examples
///
/// ```
/// use lgtm_core::{FindingType, ReviewFinding, Severity};
///
/// let finding = ReviewFinding {
///     kind: FindingType::Security,
///     severity: Severity::High,
///     file: "various".into(),
///     line: None,
///     description: "token is logged in plain text".into(),
///     suggestion: None,
/// };
/// let json = serde_json::to_value(&finding).unwrap();
/// assert_eq!(json["type"], "security");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewFinding {
    /// Category of the finding.
    #[serde(rename = "type")]
    pub kind: FindingType,
    /// How urgent the finding is.
    pub severity: Severity,
    /// File the finding refers to.
    pub file: String,
    /// Line in the new version of the file, when known.
    pub line: Option<u32>,
    /// What is wrong.
    pub description: String,
    /// How to fix it, when known.
    pub suggestion: Option<String>,
}

/// Structured outcome of one review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResult {
    /// Short summary of the change.
    pub summary: String,
    /// Findings in the order they appear in the review text (at most 10).
    pub findings: Vec<ReviewFinding>,
    /// Cleaned recommendation lines (at most 5).
    pub recommendations: Vec<String>,
    /// Derived verdict.
    pub assessment: Assessment,
    /// The unmodified LLM response.
    pub raw_review: String,
}

impl fmt::Display for ReviewResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Review Results")?;
        writeln!(f, "==============")?;
        writeln!(
            f,
            "Assessment: {} | Findings: {} | Recommendations: {}\n",
            self.assessment,
            self.findings.len(),
            self.recommendations.len(),
        )?;
        writeln!(f, "Summary:\n  {}\n", self.summary)?;

        if self.findings.is_empty() {
            writeln!(f, "No findings.")?;
        } else {
            for finding in &self.findings {
                writeln!(
                    f,
                    "[{}/{}] {}",
                    finding.kind.as_str().to_uppercase(),
                    finding.severity,
                    finding.description,
                )?;
            }
        }

        if !self.recommendations.is_empty() {
            writeln!(f, "\nRecommendations:")?;
            for rec in &self.recommendations {
                writeln!(f, "  - {rec}")?;
            }
        }

        Ok(())
    }
}

impl ReviewResult {
    /// Render the review result as markdown.
    ///
    /// # Examples
    ///
    /// ```
    /// use lgtm_core::{Assessment, ReviewResult};
    ///
    /// let result = ReviewResult {
    ///     summary: "Small refactor".into(),
    ///     findings: vec![],
    ///     recommendations: vec![],
    ///     assessment: Assessment::Comment,
    ///     raw_review: String::new(),
    /// };
    /// let md = result.to_markdown();
    /// assert!(md.contains("# Review Results"));
    /// assert!(md.contains("COMMENT"));
    /// ```
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# Review Results\n\n");
        out.push_str(&format!(
            "**Assessment:** `{}` | **Findings:** {} | **Recommendations:** {}\n\n",
            self.assessment,
            self.findings.len(),
            self.recommendations.len(),
        ));
        out.push_str(&format!("## Summary\n\n{}\n\n", self.summary));

        out.push_str("## Findings\n\n");
        if self.findings.is_empty() {
            out.push_str("No findings.\n\n");
        } else {
            for finding in &self.findings {
                let emoji = match finding.severity {
                    Severity::High => "\u{1f534}",
                    Severity::Medium => "\u{1f7e0}",
                    Severity::Low => "\u{1f7e2}",
                };
                out.push_str(&format!(
                    "- {emoji} **{}** ({}) — {}\n",
                    finding.kind, finding.severity, finding.description,
                ));
            }
            out.push('\n');
        }

        if !self.recommendations.is_empty() {
            out.push_str("## Recommendations\n\n");
            for (i, rec) in self.recommendations.iter().enumerate() {
                out.push_str(&format!("{}. {rec}\n", i + 1));
            }
        }
        out
    }
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use lgtm_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summary.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> ReviewResult {
        ReviewResult {
            summary: "Adds a cache layer".into(),
            findings: vec![ReviewFinding {
                kind: FindingType::Bug,
                severity: Severity::Medium,
                file: "various".into(),
                line: None,
                description: "possible error when the cache is empty".into(),
                suggestion: None,
            }],
            recommendations: vec!["Add a test for the empty cache path".into()],
            assessment: Assessment::Comment,
            raw_review: "raw".into(),
        }
    }

    #[test]
    fn output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!(
            "markdown".parse::<OutputFormat>().unwrap(),
            OutputFormat::Markdown
        );
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn assessment_roundtrips_through_json() {
        let json = serde_json::to_string(&Assessment::Approve).unwrap();
        assert_eq!(json, "\"APPROVE\"");

        let parsed: Assessment = serde_json::from_str("\"COMMENT\"").unwrap();
        assert_eq!(parsed, Assessment::Comment);
    }

    #[test]
    fn assessment_from_str_rejects_unknown() {
        assert_eq!(
            "approve".parse::<Assessment>().unwrap(),
            Assessment::Approve
        );
        assert!("LGTM".parse::<Assessment>().is_err());
    }

    #[test]
    fn finding_type_serializes_kebab_case() {
        let json = serde_json::to_string(&FindingType::BestPractice).unwrap();
        assert_eq!(json, "\"best-practice\"");
        assert_eq!(FindingType::Performance.to_string(), "performance");
    }

    #[test]
    fn severity_from_str() {
        assert_eq!("low".parse::<Severity>().unwrap(), Severity::Low);
        assert_eq!("Medium".parse::<Severity>().unwrap(), Severity::Medium);
        assert!("critical".parse::<Severity>().is_err());
    }

    #[test]
    fn review_result_serializes_camel_case() {
        let json = serde_json::to_value(sample_result()).unwrap();
        assert!(json.get("rawReview").is_some());
        assert!(json.get("raw_review").is_none());
        assert_eq!(json["assessment"], "COMMENT");
        assert_eq!(json["findings"][0]["type"], "bug");
        assert_eq!(json["findings"][0]["severity"], "medium");
    }

    #[test]
    fn pull_request_serializes_camel_case() {
        let pr = PullRequestData {
            id: 7,
            number: 3,
            title: "t".into(),
            body: String::new(),
            author: "a".into(),
            branch: "feat".into(),
            base_branch: "main".into(),
            state: "open".into(),
            url: "https://example.test/pr/3".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&pr).unwrap();
        assert_eq!(json["baseBranch"], "main");
        assert!(json.get("createdAt").is_some());
    }

    #[test]
    fn display_and_markdown_output() {
        let result = sample_result();
        let text = format!("{result}");
        assert!(text.contains("[BUG/medium]"));
        assert!(text.contains("Assessment: COMMENT"));
        assert!(text.contains("Add a test for the empty cache path"));

        let md = result.to_markdown();
        assert!(md.contains("## Summary"));
        assert!(md.contains("**bug** (medium)"));
        assert!(md.contains("1. Add a test"));
    }
}
