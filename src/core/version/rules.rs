// ─── Platform Rules ───
// Decides whether a platform-conditioned library applies to this machine.

use regex::Regex;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LibraryRule {
    pub action: RuleAction,
    #[serde(default)]
    pub os: Option<OsRule>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct OsRule {
    #[serde(default)]
    pub name: Option<String>,
    /// Regular expression matched against the start of the OS release string.
    #[serde(default)]
    pub version: Option<String>,
}

/// The machine the rules are evaluated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// Ecosystem OS tag (`linux`, `osx`, `windows`, ...).
    pub name: String,
    /// Kernel release string, e.g. `6.1.0-18-amd64`.
    pub release: String,
    /// Pointer width tag substituted for `${arch}`: `"64"` or `"32"`.
    pub arch: &'static str,
}

impl Platform {
    pub fn new(name: &str, release: &str, arch: &'static str) -> Self {
        Self {
            name: normalize_os_name(name).to_string(),
            release: release.to_string(),
            arch,
        }
    }

    /// Describe the running machine.
    pub fn current() -> Self {
        let release = sysinfo::System::kernel_version().unwrap_or_default();
        Self::new(std::env::consts::OS, &release, pointer_width())
    }
}

/// Map the host OS name to the tag used by version descriptors.
///
/// Only the Darwin family is renamed; everything else passes through.
pub fn normalize_os_name(name: &str) -> &str {
    match name {
        "macos" | "darwin" => "osx",
        other => other,
    }
}

pub fn pointer_width() -> &'static str {
    if cfg!(target_pointer_width = "64") {
        "64"
    } else {
        "32"
    }
}

impl LibraryRule {
    /// Whether this rule's OS clause selects `platform`.
    pub fn matches(&self, platform: &Platform) -> bool {
        let Some(os) = &self.os else {
            return true;
        };

        if let Some(name) = &os.name {
            if name != &platform.name {
                return false;
            }
        }

        match &os.version {
            None => true,
            Some(pattern) => version_prefix_matches(pattern, &platform.release),
        }
    }
}

fn version_prefix_matches(pattern: &str, release: &str) -> bool {
    match Regex::new(&format!("^(?:{pattern})")) {
        Ok(re) => re.is_match(release),
        Err(e) => {
            warn!("Ignoring rule with malformed OS version pattern {:?}: {}", pattern, e);
            false
        }
    }
}

/// Evaluate a rule list in order; the last matching rule decides.
///
/// An empty list allows the entry. Rules that do not match leave the
/// current decision untouched.
pub fn evaluate(rules: &[LibraryRule], platform: &Platform) -> bool {
    apply_rules(true, rules, platform)
}

/// Rule evaluation for conditional launch arguments.
///
/// Unlike libraries, a conditional argument is only emitted when some rule
/// explicitly allows it; a non-empty list starts from deny.
pub fn evaluate_argument(rules: &[LibraryRule], platform: &Platform) -> bool {
    apply_rules(rules.is_empty(), rules, platform)
}

fn apply_rules(mut allowed: bool, rules: &[LibraryRule], platform: &Platform) -> bool {
    for rule in rules {
        if rule.matches(platform) {
            allowed = rule.action == RuleAction::Allow;
        }
    }

    allowed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(action: RuleAction, os: Option<&str>) -> LibraryRule {
        LibraryRule {
            action,
            os: os.map(|name| OsRule {
                name: Some(name.into()),
                version: None,
            }),
        }
    }

    fn linux() -> Platform {
        Platform::new("linux", "6.1.0-18-amd64", "64")
    }

    #[test]
    fn no_rules_means_allowed() {
        assert!(evaluate(&[], &linux()));
    }

    #[test]
    fn last_matching_rule_wins() {
        let platform = linux();
        let allow_last = [
            rule(RuleAction::Disallow, None),
            rule(RuleAction::Allow, Some("linux")),
        ];
        assert!(evaluate(&allow_last, &platform));

        let disallow_last = [
            rule(RuleAction::Allow, Some("linux")),
            rule(RuleAction::Disallow, None),
        ];
        assert!(!evaluate(&disallow_last, &platform));
    }

    #[test]
    fn non_matching_rule_keeps_default() {
        let rules = [rule(RuleAction::Disallow, Some("linux"))];
        assert!(evaluate(&rules, &Platform::new("macos", "23.1.0", "64")));
        assert!(!evaluate(&rules, &linux()));
    }

    #[test]
    fn allow_only_other_os_is_disallowed_here() {
        let rules = [
            rule(RuleAction::Disallow, None),
            rule(RuleAction::Allow, Some("osx")),
        ];
        assert!(!evaluate(&rules, &linux()));
        assert!(evaluate(&rules, &Platform::new("darwin", "19.6.0", "64")));
    }

    #[test]
    fn version_pattern_is_a_prefix_regex() {
        let rules = [LibraryRule {
            action: RuleAction::Disallow,
            os: Some(OsRule {
                name: Some("osx".into()),
                version: Some(r"^10\.5\.\d$".into()),
            }),
        }];
        assert!(!evaluate(&rules, &Platform::new("osx", "10.5.8", "64")));
        assert!(evaluate(&rules, &Platform::new("osx", "10.15.7", "64")));

        let prefix = [LibraryRule {
            action: RuleAction::Disallow,
            os: Some(OsRule {
                name: None,
                version: Some("6\\.1".into()),
            }),
        }];
        assert!(!evaluate(&prefix, &linux()));
        assert!(evaluate(&prefix, &Platform::new("linux", "5.6.1", "64")));
    }

    #[test]
    fn malformed_version_pattern_never_matches() {
        let rules = [LibraryRule {
            action: RuleAction::Disallow,
            os: Some(OsRule {
                name: Some("linux".into()),
                version: Some("(".into()),
            }),
        }];
        assert!(evaluate(&rules, &linux()));
    }

    #[test]
    fn argument_rules_start_from_deny() {
        let windows_only = [rule(RuleAction::Allow, Some("windows"))];
        assert!(!evaluate_argument(&windows_only, &linux()));
        assert!(evaluate_argument(&windows_only, &Platform::new("windows", "10.0", "64")));
        // The same list does not exclude a library.
        assert!(evaluate(&windows_only, &linux()));

        assert!(evaluate_argument(&[], &linux()));
        assert!(evaluate_argument(&[rule(RuleAction::Allow, None)], &linux()));
        let disallow_here = [
            rule(RuleAction::Allow, None),
            rule(RuleAction::Disallow, Some("linux")),
        ];
        assert!(!evaluate_argument(&disallow_here, &linux()));
    }

    #[test]
    fn rules_deserialize_from_descriptor_shape() {
        let rules: Vec<LibraryRule> = serde_json::from_value(serde_json::json!([
            {"action": "allow"},
            {"action": "disallow", "os": {"name": "osx"}}
        ]))
        .unwrap();
        assert_eq!(rules[0], rule(RuleAction::Allow, None));
        assert_eq!(rules[1], rule(RuleAction::Disallow, Some("osx")));
    }

    #[test]
    fn darwin_is_normalized_to_osx() {
        assert_eq!(normalize_os_name("darwin"), "osx");
        assert_eq!(normalize_os_name("macos"), "osx");
        assert_eq!(normalize_os_name("windows"), "windows");
        assert_eq!(normalize_os_name("linux"), "linux");
    }
}
