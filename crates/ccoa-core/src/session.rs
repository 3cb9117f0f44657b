//! Repository session naming.

use url::Url;

/// Collection name for a repository URL: scheme stripped, path separators
/// and dots replaced by underscores.
///
/// `https://github.com/a/b` and `github.com/a/b` both map to
/// `github_com_a_b`.
#[must_use]
pub fn collection_name(repo_url: &str) -> String {
    let trimmed = repo_url.trim();
    let without_scheme = trimmed
        .split_once("://")
        .map_or(trimmed, |(_, rest)| rest)
        .trim_end_matches('/');
    without_scheme.replace(['/', '.'], "_")
}

/// Parse a user-supplied repository URL.
///
/// # Errors
///
/// Returns a message when the URL is empty, looks like a command-line
/// option, or does not parse.
pub fn parse_repo_url(repo_url: &str) -> Result<Url, String> {
    let trimmed = repo_url.trim();
    if trimmed.is_empty() {
        return Err("repo_url must not be empty".into());
    }
    if trimmed.starts_with('-') {
        return Err("repo_url must not start with '-'".into());
    }
    Url::parse(trimmed).map_err(|e| format!("repo_url is not a valid URL: {e}"))
}

/// Directory name used for the checkout: last path segment without `.git`.
#[must_use]
pub fn checkout_dir_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .map(|s| s.trim_end_matches(".git"))
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .unwrap_or("repo")
        .to_owned()
}
