use std::collections::BTreeSet;

use quarry_core::Phid;

/// Disjoint partition of caller-supplied identifier tokens into the
/// three id-spaces a repository can be addressed by.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IdentifierPartition {
    numeric: BTreeSet<String>,
    callsigns: BTreeSet<String>,
    phids: BTreeSet<String>,
}

impl IdentifierPartition {
    pub fn is_empty(&self) -> bool {
        self.numeric.is_empty() && self.callsigns.is_empty() && self.phids.is_empty()
    }

    pub fn numeric(&self) -> &BTreeSet<String> {
        &self.numeric
    }

    pub fn callsigns(&self) -> &BTreeSet<String> {
        &self.callsigns
    }

    pub fn phids(&self) -> &BTreeSet<String> {
        &self.phids
    }

    /// Numeric tokens as ids. Tokens too large for an i64 cannot match
    /// any stored row and are dropped here.
    pub(crate) fn numeric_ids(&self) -> Vec<i64> {
        self.numeric.iter().filter_map(|t| t.parse().ok()).collect()
    }
}

/// Classify mixed identifier tokens: all-ASCII-digit tokens are numeric
/// ids, tokens with the repository global-handle shape are phids, and
/// everything else is a callsign. Total and deterministic; duplicate
/// tokens collapse.
pub fn classify<I, S>(tokens: I) -> IdentifierPartition
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut partition = IdentifierPartition::default();
    for token in tokens {
        let token = token.as_ref();
        if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
            partition.numeric.insert(token.to_string());
        } else if Phid::is_repository_handle(token) {
            partition.phids.insert(token.to_string());
        } else {
            partition.callsigns.insert(token.to_string());
        }
    }
    partition
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_mixed_tokens() {
        let p = classify(["42", "rXYZ", "PHID-REPO-xyz"]);
        assert_eq!(p.numeric().len(), 1);
        assert!(p.numeric().contains("42"));
        // Plain identifiers are taken literally; only the datasource
        // free-text path strips a leading "r".
        assert!(p.callsigns().contains("rXYZ"));
        assert!(p.phids().contains("PHID-REPO-xyz"));
    }

    #[test]
    fn sets_are_pairwise_disjoint_and_cover_input() {
        let tokens = ["1", "007", "ABC", "PHID-REPO-a", "PHID-USER-b", "x1"];
        let p = classify(tokens);

        let mut union: BTreeSet<&str> = BTreeSet::new();
        for set in [p.numeric(), p.callsigns(), p.phids()] {
            for token in set {
                assert!(union.insert(token), "token {token} in two sets");
            }
        }
        let expected: BTreeSet<&str> = tokens.iter().copied().collect();
        assert_eq!(union, expected);
    }

    #[test]
    fn duplicates_collapse() {
        let p = classify(["42", "42", "ABC", "ABC"]);
        assert_eq!(p.numeric().len(), 1);
        assert_eq!(p.callsigns().len(), 1);
    }

    #[test]
    fn non_repository_handles_are_callsigns() {
        let p = classify(["PHID-USER-abc"]);
        assert!(p.phids().is_empty());
        assert!(p.callsigns().contains("PHID-USER-abc"));
    }

    #[test]
    fn empty_token_is_a_callsign() {
        let p = classify([""]);
        assert!(p.callsigns().contains(""));
        assert!(p.numeric().is_empty());
    }

    #[test]
    fn oversized_numeric_tokens_never_resolve() {
        let p = classify(["99999999999999999999999999"]);
        assert_eq!(p.numeric().len(), 1);
        assert!(p.numeric_ids().is_empty());
    }
}
