//! Static navigation rules: from route X, which routes are likely next.
//!
//! Patterns are either an exact path (`/festivals`) or a prefix ending in
//! `/*` (`/festivals/genre/*`), which matches any path below that prefix.
//! Exact patterns win over prefixes, and longer prefixes win over shorter.

/// Default rule table for the festival site.
const FESTIVAL_SITE_RULES: &[(&str, &[&str])] = &[
    ("/", &["/festivals", "/quiz"]),
    (
        "/festivals",
        &["/festivals/region/europe", "/festivals/month/july", "/festivals/genre/electronic"],
    ),
    ("/festivals/region/*", &["/festivals", "/festivals/month/july"]),
    ("/festivals/month/*", &["/festivals", "/festivals/region/europe"]),
    ("/festivals/genre/*", &["/festivals", "/quiz"]),
    ("/festival/*", &["/festivals"]),
    ("/quiz", &["/festivals"]),
    ("/blog", &["/festivals"]),
    ("/blog/*", &["/blog", "/festivals"]),
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pattern {
    Exact(String),
    /// Stored without the trailing `*`, keeping the slash.
    Prefix(String),
}

impl Pattern {
    fn parse(raw: &str) -> Self {
        match raw.strip_suffix('*') {
            Some(prefix) if prefix.ends_with('/') => Pattern::Prefix(prefix.to_string()),
            _ => Pattern::Exact(normalize_path(raw).unwrap_or_else(|| raw.to_string())),
        }
    }

    /// Match strength, higher is more specific. `None` when not matching.
    fn score(&self, path: &str) -> Option<usize> {
        match self {
            Pattern::Exact(exact) => (exact == path).then_some(usize::MAX),
            Pattern::Prefix(prefix) => (path.len() > prefix.len()
                && path.starts_with(prefix.as_str()))
            .then_some(prefix.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Rule {
    pattern: Pattern,
    next: Vec<String>,
}

/// An ordered table of navigation predictions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteRules {
    rules: Vec<Rule>,
}

impl RouteRules {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The festival site's navigation table.
    pub fn festival_site() -> Self {
        FESTIVAL_SITE_RULES
            .iter()
            .fold(Self::new(), |rules, (pattern, next)| {
                rules.rule(*pattern, next.iter().copied())
            })
    }

    /// Add a rule. Later rules with an equally specific pattern lose.
    pub fn rule<I, S>(mut self, pattern: &str, next: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules.push(Rule {
            pattern: Pattern::parse(pattern),
            next: next.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Routes likely to follow `path`, never including `path` itself.
    pub fn predict(&self, path: &str) -> Vec<String> {
        let Some(path) = normalize_path(path) else {
            return Vec::new();
        };

        let mut best: Option<(usize, &Rule)> = None;
        for rule in &self.rules {
            if let Some(score) = rule.pattern.score(&path) {
                if best.map_or(true, |(top, _)| score > top) {
                    best = Some((score, rule));
                }
            }
        }

        best.map(|(_, rule)| {
            rule.next
                .iter()
                .filter(|next| **next != path)
                .cloned()
                .collect()
        })
        .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Canonical form of a same-origin path.
///
/// Returns `None` for anything that is not a same-origin absolute path
/// (`https://…`, `//host/…`, `mailto:`, relative paths). Query strings and
/// fragments are dropped, and so is a trailing slash other than the root.
pub fn normalize_path(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if !raw.starts_with('/') || raw.starts_with("//") {
        return None;
    }

    let end = raw.find(['?', '#']).unwrap_or(raw.len());
    let path = &raw[..end];
    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };
    Some(path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/festivals/"), Some("/festivals".to_string()));
        assert_eq!(normalize_path("/festivals?page=2#top"), Some("/festivals".to_string()));
        assert_eq!(normalize_path("/"), Some("/".to_string()));
        assert_eq!(normalize_path("/?utm=x"), Some("/".to_string()));
        assert_eq!(normalize_path("https://example.com/festivals"), None);
        assert_eq!(normalize_path("//cdn.example.com/x"), None);
        assert_eq!(normalize_path("festivals"), None);
        assert_eq!(normalize_path(""), None);
    }

    #[test]
    fn test_exact_rule() {
        let rules = RouteRules::festival_site();
        assert_eq!(rules.predict("/"), vec!["/festivals", "/quiz"]);
        assert_eq!(rules.predict("/quiz/"), vec!["/festivals"]);
    }

    #[test]
    fn test_prefix_rule() {
        let rules = RouteRules::festival_site();
        assert_eq!(
            rules.predict("/festivals/genre/techno"),
            vec!["/festivals", "/quiz"]
        );
        assert_eq!(rules.predict("/festival/primavera-sound"), vec!["/festivals"]);
    }

    #[test]
    fn test_prediction_excludes_current_path() {
        let rules = RouteRules::festival_site();
        assert_eq!(
            rules.predict("/festivals/month/july"),
            vec!["/festivals", "/festivals/region/europe"]
        );
        assert_eq!(
            rules.predict("/festivals/region/europe"),
            vec!["/festivals", "/festivals/month/july"]
        );

        let rules = RouteRules::new().rule("/a/*", ["/a/b", "/c"]);
        assert_eq!(rules.predict("/a/b"), vec!["/c"]);
    }

    #[test]
    fn test_exact_beats_prefix_and_longest_prefix_wins() {
        let rules = RouteRules::new()
            .rule("/blog/*", ["/blog"])
            .rule("/blog/2024/*", ["/blog/2024"])
            .rule("/blog/2024/lineups", ["/festivals"]);

        assert_eq!(rules.predict("/blog/2024/lineups"), vec!["/festivals"]);
        assert_eq!(rules.predict("/blog/2024/recap"), vec!["/blog/2024"]);
        assert_eq!(rules.predict("/blog/other"), vec!["/blog"]);
    }

    #[test]
    fn test_prefix_does_not_match_its_own_root() {
        let rules = RouteRules::new().rule("/festival/*", ["/festivals"]);
        assert!(rules.predict("/festival").is_empty());
    }

    #[test]
    fn test_unknown_route() {
        let rules = RouteRules::festival_site();
        assert!(rules.predict("/about").is_empty());
        assert!(rules.predict("https://elsewhere.example/").is_empty());
        assert_eq!(rules.len(), 9);
    }
}
