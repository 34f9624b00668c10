//! Identity slugs and the tolerant local/remote name matching.
//!
//! Packages are known by several names: the repository (`connexion-people`),
//! the manifest alias (`people`) and the directory (`People`). All of them
//! reduce to a lowercase slug.

/// Lowercase, runs of non-alphanumerics collapsed to a single `-`, trimmed.
pub fn slugify(s: &str) -> String {
    let mut slug = String::with_capacity(s.len());
    let mut pending_dash = false;
    for c in s.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// `people` -> `People`.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Repository name rendered for humans: `connexion-worship-planner` -> `Worship Planner`.
pub fn headline(repo: &str, prefix: &str) -> String {
    let stem = repo.strip_prefix(prefix).unwrap_or(repo);
    stem.split(['-', '_', ' '])
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

/// How a local package was matched to an identity, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchKind {
    Alias,
    Name,
    PrefixStripped,
}

/// Decide whether a local package (by alias and directory name) answers to `identity`.
pub fn match_kind(
    identity: &str,
    alias: Option<&str>,
    dir_name: &str,
    prefix: &str,
) -> Option<MatchKind> {
    let wanted = slugify(identity);
    if alias.is_some_and(|a| slugify(a) == wanted) {
        return Some(MatchKind::Alias);
    }
    let name = slugify(dir_name);
    if name == wanted {
        return Some(MatchKind::Name);
    }
    let stripped_prefix = slugify(prefix);
    let bare = wanted
        .strip_prefix(&stripped_prefix)
        .map(|s| s.trim_start_matches('-'))
        .filter(|s| !s.is_empty());
    match bare {
        Some(bare) if name == bare => Some(MatchKind::PrefixStripped),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("connexion-people"), "connexion-people");
        assert_eq!(slugify("People"), "people");
        assert_eq!(slugify("  Worship  Planner!! "), "worship-planner");
        assert_eq!(slugify("a__b--c"), "a-b-c");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn test_headline() {
        assert_eq!(headline("connexion-people", "connexion-"), "People");
        assert_eq!(
            headline("connexion-worship-planner", "connexion-"),
            "Worship Planner"
        );
        assert_eq!(headline("reports", "connexion-"), "Reports");
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("people"), "People");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_match_by_alias() {
        assert_eq!(
            match_kind("people", Some("people"), "Members", "connexion-"),
            Some(MatchKind::Alias)
        );
        assert_eq!(
            match_kind("connexion-people", Some("Connexion People"), "People", "connexion-"),
            Some(MatchKind::Alias)
        );
    }

    #[test]
    fn test_match_by_directory_name() {
        assert_eq!(
            match_kind("people", None, "People", "connexion-"),
            Some(MatchKind::Name)
        );
    }

    #[test]
    fn test_match_with_prefix_stripped() {
        assert_eq!(
            match_kind("connexion-people", Some("members"), "People", "connexion-"),
            Some(MatchKind::PrefixStripped)
        );
    }

    #[test]
    fn test_no_match() {
        assert_eq!(match_kind("connexion-people", None, "Property", "connexion-"), None);
        assert_eq!(match_kind("connexion-x", None, "", "connexion-"), None);
        assert_eq!(match_kind("connexion", None, "People", "connexion-"), None);
    }
}
