/// Immutable descriptor for one enumerated user preference.
///
/// A definition names the preference (the name doubles as the remote record
/// field and as part of the scoped storage key), lists the closed set of
/// values the preference may take, and picks the default that is published
/// whenever no stored value is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreferenceDef {
    name: &'static str,
    values: &'static [&'static str],
    default: &'static str,
}

impl PreferenceDef {
    /// Creates a definition.
    ///
    /// Panics if `values` is empty or `default` is not a member of `values`.
    /// Definitions are program constants, so a bad one is a bug to catch in
    /// development, not a runtime condition to recover from.
    pub fn new(
        name: &'static str,
        values: &'static [&'static str],
        default: &'static str,
    ) -> Self {
        assert!(
            !values.is_empty(),
            "preference {:?} must have at least one valid value",
            name
        );
        assert!(
            values.contains(&default),
            "default {:?} for preference {:?} is not in its value set",
            default,
            name
        );
        Self {
            name,
            values,
            default,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn values(&self) -> &'static [&'static str] {
        self.values
    }

    pub fn default_value(&self) -> &'static str {
        self.default
    }

    /// Whether `candidate` is a member of the value set.
    pub fn is_valid(&self, candidate: &str) -> bool {
        self.normalize(candidate).is_some()
    }

    /// Maps an arbitrary string (user input, cached bytes, remote payload)
    /// onto the canonical member of the value set, or `None` if it is not a
    /// member. Unrecognized stored values are treated as absent by callers.
    pub fn normalize(&self, candidate: &str) -> Option<&'static str> {
        self.values.iter().copied().find(|v| *v == candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn theme() -> PreferenceDef {
        PreferenceDef::new("theme", &["light", "dark", "system"], "system")
    }

    #[test]
    fn normalize_accepts_members_only() {
        let def = theme();
        assert_eq!(def.normalize("dark"), Some("dark"));
        assert_eq!(def.normalize("Dark"), None);
        assert_eq!(def.normalize(""), None);
        assert_eq!(def.normalize("blurple"), None);
    }

    #[test]
    fn default_is_reported() {
        let def = theme();
        assert_eq!(def.default_value(), "system");
        assert!(def.is_valid(def.default_value()));
    }

    #[test]
    #[should_panic(expected = "not in its value set")]
    fn default_outside_set_is_a_contract_violation() {
        PreferenceDef::new("theme", &["light", "dark"], "system");
    }

    #[test]
    #[should_panic(expected = "at least one valid value")]
    fn empty_value_set_is_a_contract_violation() {
        PreferenceDef::new("theme", &[], "system");
    }
}
