use lgtm_core::PullRequestData;

/// Appended after the kept prefix of an oversized diff.
pub const TRUNCATION_MARKER: &str = "\n\n... (diff truncated for review)";

/// Default character budget for the diff embedded in the prompt.
pub const DEFAULT_MAX_DIFF_CHARS: usize = 4000;

/// Built-in review prompt.
///
/// Placeholders: `{{title}}`, `{{author}}`, `{{branch}}`, `{{filesCount}}`,
/// `{{diff}}`. Each is substituted once.
pub const REVIEW_PROMPT_TEMPLATE: &str = "\
You are an experienced code reviewer. Review the pull request below and give \
constructive, specific feedback.

**Pull Request**
- Title: {{title}}
- Author: {{author}}
- Branch: {{branch}}
- Files changed: {{filesCount}}

**Diff**
{{diff}}

**What to look for**
1. Correctness bugs and unhandled errors
2. Security issues
3. Performance problems
4. Readability, conventions and best practices

Answer in markdown using these sections:
**Summary** - what the change does
**Findings** - one issue per line, mention its severity (critical/high/medium/low)
**Recommendations** - a short list of concrete improvements
**Assessment** - Approve, Request Changes or Comment
";

/// Pull request fields substituted into the review prompt.
///
/// # Examples
///
/// ```
/// use lgtm_review::prompt::PromptFields;
///
/// let fields = PromptFields {
///     title: "Fix login".into(),
///     author: "octocat".into(),
///     source_branch: "fix/login".into(),
///     base_branch: "main".into(),
///     files_count: 2,
/// };
/// assert_eq!(fields.branch_label(), "fix/login → main");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptFields {
    /// Pull request title.
    pub title: String,
    /// Author login.
    pub author: String,
    /// Head branch.
    pub source_branch: String,
    /// Base branch.
    pub base_branch: String,
    /// Number of changed files.
    pub files_count: usize,
}

impl PromptFields {
    /// Take the prompt fields from a fetched pull request.
    pub fn from_pull_request(pr: &PullRequestData, files_count: usize) -> Self {
        Self {
            title: pr.title.clone(),
            author: pr.author.clone(),
            source_branch: pr.branch.clone(),
            base_branch: pr.base_branch.clone(),
            files_count,
        }
    }

    /// `"<source> → <base>"`.
    pub fn branch_label(&self) -> String {
        format!("{} → {}", self.source_branch, self.base_branch)
    }
}

/// Bound the diff handed to the LLM.
///
/// Lengths are counted in characters. A diff of at most `max_chars` characters
/// is returned unchanged, otherwise its first `max_chars` characters followed
/// by [`TRUNCATION_MARKER`].
///
/// # Examples
///
/// ```
/// use lgtm_review::prompt::{truncate_diff, TRUNCATION_MARKER};
///
/// assert_eq!(truncate_diff("+short", 4000), "+short");
///
/// let long = "x".repeat(5000);
/// let out = truncate_diff(&long, 4000);
/// assert_eq!(out.len(), 4000 + TRUNCATION_MARKER.len());
/// assert!(out.ends_with("(diff truncated for review)"));
/// ```
pub fn truncate_diff(diff: &str, max_chars: usize) -> String {
    match diff.char_indices().nth(max_chars) {
        None => diff.to_string(),
        Some((cut, _)) => {
            let mut out = String::with_capacity(cut + TRUNCATION_MARKER.len());
            out.push_str(&diff[..cut]);
            out.push_str(TRUNCATION_MARKER);
            out
        }
    }
}

/// Fill `template` with the pull request fields and an already truncated diff.
///
/// Substitution is literal and replaces only the first occurrence of each
/// placeholder, in the order title, author, branch, files count, diff.
///
/// # Examples
///
/// ```
/// use lgtm_review::prompt::{build_review_prompt, PromptFields};
///
/// let fields = PromptFields {
///     title: "Add cache".into(),
///     author: "dev".into(),
///     source_branch: "cache".into(),
///     base_branch: "main".into(),
///     files_count: 3,
/// };
/// let prompt = build_review_prompt(
///     "{{title}} by {{author}} ({{branch}}, {{filesCount}} files)\n{{diff}}",
///     &fields,
///     "+let x = 1;",
/// );
/// assert_eq!(prompt, "Add cache by dev (cache → main, 3 files)\n+let x = 1;");
/// ```
pub fn build_review_prompt(template: &str, fields: &PromptFields, diff: &str) -> String {
    template
        .replacen("{{title}}", &fields.title, 1)
        .replacen("{{author}}", &fields.author, 1)
        .replacen("{{branch}}", &fields.branch_label(), 1)
        .replacen("{{filesCount}}", &fields.files_count.to_string(), 1)
        .replacen("{{diff}}", diff, 1)
}
