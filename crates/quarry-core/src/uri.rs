//! Remote-URI normalization.
//!
//! Two differently written URIs that address the same repository must
//! compare equal after normalization, e.g. `git@host:repo.git` and
//! `https://host/repo.git` both normalize to `repo` under the git rules.

use crate::repository::VcsKind;

/// Canonical path form of a remote URI under one VCS scheme's rules.
pub fn normalized_path(kind: VcsKind, uri: &str) -> String {
    let path = strip_authority(uri.trim());
    let path = path.trim_matches('/');
    let path = match kind {
        VcsKind::Git => path.strip_suffix(".git").unwrap_or(path),
        VcsKind::Svn | VcsKind::Mercurial => path,
    };
    path.trim_end_matches('/').to_string()
}

/// Every normalization of a URI across the supported schemes.
///
/// Used when the intended VCS kind of a caller-supplied URI is not
/// known: the caller matches against the union. Some of the produced
/// forms may legitimately never match anything.
pub fn all_normalized_paths(uri: &str) -> Vec<String> {
    let mut paths: Vec<String> = VcsKind::ALL
        .iter()
        .map(|kind| normalized_path(*kind, uri))
        .collect();
    paths.sort();
    paths.dedup();
    paths
}

/// Drop the scheme and authority portion of a URI, leaving the path.
/// Handles `scheme://host/path`, scp-like `user@host:path`, and bare
/// paths.
fn strip_authority(raw: &str) -> &str {
    if let Some(idx) = raw.find("://") {
        let rest = &raw[idx + 3..];
        match rest.find('/') {
            Some(slash) => &rest[slash + 1..],
            None => "",
        }
    } else if let Some(colon) = raw.find(':') {
        if raw[..colon].contains('/') {
            // A slash before the colon means this is a plain path, not
            // an scp-like authority.
            raw
        } else {
            &raw[colon + 1..]
        }
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn git_scp_and_https_forms_agree() {
        assert_eq!(normalized_path(VcsKind::Git, "git@host:repo.git"), "repo");
        assert_eq!(
            normalized_path(VcsKind::Git, "https://host/repo.git"),
            "repo"
        );
        assert_eq!(normalized_path(VcsKind::Git, "ssh://host/repo.git/"), "repo");
    }

    #[test]
    fn git_nested_path() {
        assert_eq!(
            normalized_path(VcsKind::Git, "git@host:team/repo.git"),
            "team/repo"
        );
    }

    #[test]
    fn svn_keeps_dot_git_and_trims_slashes() {
        assert_eq!(
            normalized_path(VcsKind::Svn, "svn+ssh://host/path/trunk/"),
            "path/trunk"
        );
        assert_eq!(
            normalized_path(VcsKind::Svn, "https://host/repo.git"),
            "repo.git"
        );
    }

    #[test]
    fn mercurial_bare_path() {
        assert_eq!(normalized_path(VcsKind::Mercurial, "/var/hg/repo/"), "var/hg/repo");
    }

    #[test]
    fn host_only_uri_normalizes_to_empty() {
        assert_eq!(normalized_path(VcsKind::Git, "https://host"), "");
    }

    #[test]
    fn all_schemes_union_is_deduplicated() {
        let paths = all_normalized_paths("git@host:repo.git");
        // git strips the suffix, svn and mercurial keep it
        assert_eq!(paths, vec!["repo".to_string(), "repo.git".to_string()]);
    }
}
