//! Rule evaluation: whether a library or argument entry applies to the current platform.

use serde::Deserialize;

use crate::os::Os;

/// One `allow`/`disallow` clause, optionally gated on an OS (and, for modern argument
/// rules, on named feature flags).
#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    pub action: Action,
    #[serde(default)]
    pub os: Option<OsClause>,
    #[serde(default)]
    pub features: Option<std::collections::HashMap<String, bool>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OsClause {
    pub name: Option<String>,
}

/// The result of evaluating a rule list. `NoRules` and `Unrecognized` both end up
/// "excluded" or "included" depending on context, but are kept distinct so a caller can
/// tell a deliberate absence of rules from a shape this evaluator doesn't understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    /// No rules were present; the entry is unconditionally included.
    NoRules,
    /// Rules were present and evaluated to a definite allow/disallow.
    Applied(bool),
    /// The rule list had a shape this evaluator does not recognize; conservatively
    /// treated as excluded by callers.
    Unrecognized,
}

impl RuleOutcome {
    pub fn included(self) -> bool {
        match self {
            Self::NoRules => true,
            Self::Applied(included) => included,
            Self::Unrecognized => false,
        }
    }
}

/// Evaluate a library's `rules` list against the current OS, following the two
/// legacy manifest shapes actually seen in the wild:
///
/// - no rules: include
/// - one rule, `allow` gated on `os`: include unless the current OS is excluded by it
/// - two rules, `allow` then `disallow` on `os.osx`: include only on osx
///
/// Any other shape is conservatively excluded.
pub fn evaluate_library_rules(rules: &[Rule], current: Os) -> RuleOutcome {
    match rules {
        [] => RuleOutcome::NoRules,
        [rule] if rule.action == Action::Allow => match &rule.os {
            None => RuleOutcome::Applied(true),
            Some(clause) => RuleOutcome::Applied(!matches_os(clause, current)),
        },
        [first, second]
            if first.action == Action::Allow
                && second.action == Action::Disallow
                && second.os.as_ref().and_then(|o| o.name.as_deref()) == Some("osx") =>
        {
            RuleOutcome::Applied(current == Os::Osx)
        }
        _ => RuleOutcome::Unrecognized,
    }
}

/// Evaluate a modern structured argument's own `rules` list, additionally honoring
/// named feature flags (e.g. `is_demo_user`, `has_custom_resolution`) supplied by the
/// caller. Unlike library rules, an empty list still means "include", and a rule with
/// only a `features` clause (no `os`) is evaluated purely against `features`.
pub fn evaluate_argument_rules(
    rules: &[Rule],
    current: Os,
    features: &std::collections::HashMap<String, bool>,
) -> bool {
    if rules.is_empty() {
        return true;
    }

    let mut included = false;
    for rule in rules {
        let os_ok = rule.os.as_ref().map_or(true, |clause| matches_os(clause, current));
        let features_ok = rule.features.as_ref().map_or(true, |wanted| {
            wanted.iter().all(|(key, &value)| features.get(key).copied().unwrap_or(false) == value)
        });
        let applies = os_ok && features_ok;
        if applies {
            included = rule.action == Action::Allow;
        }
    }
    included
}

fn matches_os(clause: &OsClause, current: Os) -> bool {
    match &clause.name {
        Some(name) => Os::from_tag(name) == Some(current),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allow_os(name: &str) -> Rule {
        Rule { action: Action::Allow, os: Some(OsClause { name: Some(name.to_string()) }), features: None }
    }

    fn disallow_os(name: &str) -> Rule {
        Rule { action: Action::Disallow, os: Some(OsClause { name: Some(name.to_string()) }), features: None }
    }

    #[test]
    fn no_rules_includes_everywhere() {
        assert_eq!(evaluate_library_rules(&[], Os::Linux), RuleOutcome::NoRules);
        assert!(RuleOutcome::NoRules.included());
    }

    #[test]
    fn single_allow_osx_excludes_on_osx() {
        let rules = [allow_os("osx")];
        assert!(!evaluate_library_rules(&rules, Os::Osx).included());
        assert!(evaluate_library_rules(&rules, Os::Linux).included());
        assert!(evaluate_library_rules(&rules, Os::Windows).included());
    }

    #[test]
    fn allow_then_disallow_osx_includes_only_on_osx() {
        let rules = [Rule { action: Action::Allow, os: None, features: None }, disallow_os("osx")];
        assert!(evaluate_library_rules(&rules, Os::Osx).included());
        assert!(!evaluate_library_rules(&rules, Os::Linux).included());
        assert!(!evaluate_library_rules(&rules, Os::Windows).included());
    }

    #[test]
    fn unrecognized_shape_is_excluded() {
        let rules = [disallow_os("osx"), disallow_os("windows"), disallow_os("linux")];
        assert_eq!(evaluate_library_rules(&rules, Os::Linux), RuleOutcome::Unrecognized);
        assert!(!evaluate_library_rules(&rules, Os::Linux).included());
    }

    #[test]
    fn argument_rules_consult_features() {
        let mut features = std::collections::HashMap::new();
        features.insert("is_demo_user".to_string(), true);
        let rules = [Rule {
            action: Action::Allow,
            os: None,
            features: Some(std::collections::HashMap::from([("is_demo_user".to_string(), true)])),
        }];
        assert!(evaluate_argument_rules(&rules, Os::Linux, &features));
        features.insert("is_demo_user".to_string(), false);
        assert!(!evaluate_argument_rules(&rules, Os::Linux, &features));
    }
}
