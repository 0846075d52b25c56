use lgtm_core::{Assessment, FindingType, ReviewFinding, Severity};

/// Label applied to approved pull requests.
pub const APPROVED_LABEL: &str = "review:approved";
/// Label applied when changes are requested.
pub const CHANGES_REQUESTED_LABEL: &str = "review:changes-requested";
/// Label applied when the review only comments.
pub const COMMENTED_LABEL: &str = "review:commented";
/// Label for anything that is not a known verdict.
pub const PENDING_LABEL: &str = "review:pending";

/// More bug plus security findings than this forces a change request.
pub const BLOCKING_FINDINGS_THRESHOLD: usize = 2;

/// Decide the verdict for a review.
///
/// Rules, first match wins, over the lowercased text:
/// 1. mentions "approve" but not "not approve": [`Assessment::Approve`]
/// 2. mentions "request changes" or "needs changes": [`Assessment::RequestChanges`]
/// 3. any high-severity finding, or more than two bug/security findings:
///    [`Assessment::RequestChanges`]
/// 4. otherwise [`Assessment::Comment`]
///
/// # Examples
///
/// ```
/// use lgtm_core::Assessment;
/// use lgtm_review::assessment::determine_assessment;
///
/// assert_eq!(determine_assessment("LGTM, approve", &[]), Assessment::Approve);
/// assert_eq!(determine_assessment("I do not approve", &[]), Assessment::Comment);
/// assert_eq!(determine_assessment("This needs changes", &[]), Assessment::RequestChanges);
/// ```
pub fn determine_assessment(text: &str, findings: &[ReviewFinding]) -> Assessment {
    let lower = text.to_lowercase();

    if lower.contains("approve") && !lower.contains("not approve") {
        return Assessment::Approve;
    }
    if lower.contains("request changes") || lower.contains("needs changes") {
        return Assessment::RequestChanges;
    }

    let has_high = findings.iter().any(|f| f.severity == Severity::High);
    let blocking = findings
        .iter()
        .filter(|f| matches!(f.kind, FindingType::Bug | FindingType::Security))
        .count();

    if has_high || blocking > BLOCKING_FINDINGS_THRESHOLD {
        Assessment::RequestChanges
    } else {
        Assessment::Comment
    }
}

/// The pull request label for a verdict.
///
/// # Examples
///
/// ```
/// use lgtm_core::Assessment;
/// use lgtm_review::assessment::review_label;
///
/// assert_eq!(review_label(Assessment::RequestChanges), "review:changes-requested");
/// ```
pub fn review_label(assessment: Assessment) -> &'static str {
    match assessment {
        Assessment::Approve => APPROVED_LABEL,
        Assessment::RequestChanges => CHANGES_REQUESTED_LABEL,
        Assessment::Comment => COMMENTED_LABEL,
    }
}

/// Total mapping from a verdict string to its label.
///
/// Accepts anything [`Assessment`]'s `FromStr` does; every other string maps
/// to [`PENDING_LABEL`].
///
/// # Examples
///
/// ```
/// use lgtm_review::assessment::{label_for, PENDING_LABEL};
///
/// assert_eq!(label_for("APPROVE"), "review:approved");
/// assert_eq!(label_for("maybe"), PENDING_LABEL);
/// ```
pub fn label_for(assessment: &str) -> &'static str {
    assessment
        .parse::<Assessment>()
        .map(review_label)
        .unwrap_or(PENDING_LABEL)
}
