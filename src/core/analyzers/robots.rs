// src/core/analyzers/robots.rs

//! Parse robots.txt files.

/// Rules of the robots.txt group that applies to one crawler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RobotsRules {
    pub allowed: Vec<String>,
    pub disallowed: Vec<String>,
    pub sitemaps: Vec<String>,
}

impl RobotsRules {
    /// Whether `path` may be crawled. The longest matching pattern wins and
    /// `Allow` wins a tie.
    pub fn is_allowed(&self, path: &str) -> bool {
        let longest = |patterns: &[String]| {
            patterns
                .iter()
                .filter(|p| path_matches(path, p))
                .map(|p| p.len())
                .max()
        };
        match (longest(&self.allowed), longest(&self.disallowed)) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(allow), Some(disallow)) => allow >= disallow,
        }
    }
}

#[derive(Default)]
struct Group {
    agents: Vec<String>,
    allowed: Vec<String>,
    disallowed: Vec<String>,
}

/// Parses `txt` and returns the rules for `user_agent`.
///
/// A group naming the agent takes precedence over the `*` group; with
/// neither present everything is allowed.
pub fn parse_robots(txt: &str, user_agent: &str) -> RobotsRules {
    let mut groups: Vec<Group> = Vec::new();
    let mut sitemaps = Vec::new();
    // Consecutive user-agent lines share one group.
    let mut collecting_agents = false;

    for line in txt.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                if !collecting_agents {
                    groups.push(Group::default());
                    collecting_agents = true;
                }
                if let Some(group) = groups.last_mut() {
                    group.agents.push(value.to_ascii_lowercase());
                }
            }
            "allow" | "disallow" => {
                collecting_agents = false;
                let Some(group) = groups.last_mut() else {
                    continue;
                };
                if value.is_empty() {
                    continue;
                }
                if key == "allow" {
                    group.allowed.push(value.to_string());
                } else {
                    group.disallowed.push(value.to_string());
                }
            }
            "sitemap" => {
                if !value.is_empty() {
                    sitemaps.push(value.to_string());
                }
            }
            _ => collecting_agents = false,
        }
    }

    let ua = user_agent.to_ascii_lowercase();
    let chosen = groups
        .iter()
        .find(|g| g.agents.iter().any(|a| a == &ua))
        .or_else(|| groups.iter().find(|g| g.agents.iter().any(|a| a == "*")));

    match chosen {
        Some(group) => RobotsRules {
            allowed: group.allowed.clone(),
            disallowed: group.disallowed.clone(),
            sitemaps,
        },
        None => RobotsRules { sitemaps, ..RobotsRules::default() },
    }
}

/// Prefix match with `*` wildcards and an optional `$` end anchor.
fn path_matches(path: &str, pattern: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(p) => (p, true),
        None => (pattern, false),
    };
    let mut parts = pattern.split('*');
    let first = parts.next().unwrap_or("");
    let Some(mut rest) = path.strip_prefix(first) else {
        return false;
    };
    let mut wildcard = false;
    for part in parts {
        wildcard = true;
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    if !anchored {
        return true;
    }
    // With a trailing `*$` any tail is fine; otherwise the path must end here,
    // or the final literal must be the path's suffix.
    if pattern.ends_with('*') || rest.is_empty() {
        return true;
    }
    wildcard && pattern.rsplit('*').next().is_some_and(|last| path.ends_with(last))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_robots() {
        let txt = r#"
User-agent: *
Allow: /
Disallow: /admin
Disallow: /private/  # staff only

Sitemap: https://example.com/sitemap.xml
"#;

        let rules = parse_robots(txt, "auditly");
        assert_eq!(rules.allowed.len(), 1);
        assert_eq!(rules.disallowed.len(), 2);
        assert_eq!(rules.sitemaps.len(), 1);

        assert!(rules.is_allowed("/"));
        assert!(rules.is_allowed("/about"));
        assert!(!rules.is_allowed("/admin"));
        assert!(!rules.is_allowed("/admin/settings"));
        assert!(!rules.is_allowed("/private/data"));
    }

    #[test]
    fn test_allow_overrides_disallow() {
        let txt = "User-agent: *\nDisallow: /api/\nAllow: /api/public/\n";
        let rules = parse_robots(txt, "auditly");
        assert!(!rules.is_allowed("/api/secret"));
        assert!(rules.is_allowed("/api/public/docs"));
    }

    #[test]
    fn test_specific_group_beats_wildcard() {
        let txt = "User-agent: *\nDisallow: /\n\nUser-agent: Googlebot\nUser-agent: Auditly\nDisallow: /tmp\n";
        let rules = parse_robots(txt, "auditly");
        assert!(rules.is_allowed("/page"));
        assert!(!rules.is_allowed("/tmp/x"));

        let other = parse_robots(txt, "somebot");
        assert!(!other.is_allowed("/page"));
    }

    #[test]
    fn test_empty_disallow_allows_everything() {
        let rules = parse_robots("User-agent: *\nDisallow:\n", "auditly");
        assert!(rules.is_allowed("/anything"));
    }

    #[test]
    fn test_wildcards_and_anchor() {
        assert!(path_matches("/a/b.pdf", "/*.pdf$"));
        assert!(!path_matches("/a/b.pdf?x=1", "/*.pdf$"));
        assert!(path_matches("/shop/cart/1", "/shop/*/1"));
        assert!(path_matches("/exact", "/exact$"));
        assert!(!path_matches("/exactly", "/exact$"));
    }
}
