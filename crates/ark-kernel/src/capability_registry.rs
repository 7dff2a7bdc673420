//! [`CapabilityRegistry`] – static tool grants per department.
//!
//! Departments declare tools by name in configuration.  Names are resolved
//! against the closed [`Capability`] enum when the grant is made, so a typo
//! fails at construction with [`ArkError::UnknownCapability`] instead of
//! being silently skipped.  Afterwards [`CapabilityRegistry::check`] enforces
//! least privilege before a tool is used.

use std::collections::{BTreeSet, HashMap};

use ark_types::{ArkError, Capability};

/// Manages the set of [`Capability`] grants for each department.
///
/// # Example
///
/// ```
/// use ark_kernel::capability_registry::CapabilityRegistry;
/// use ark_types::Capability;
///
/// let mut registry = CapabilityRegistry::new();
/// registry.grant_named("critic", "check_security").unwrap();
///
/// assert!(registry.check("critic", Capability::CheckSecurity).is_ok());
/// assert!(registry.check("critic", Capability::PlanEvolution).is_err());
/// assert!(registry.grant_named("critic", "teleport").is_err());
/// ```
#[derive(Debug, Default, Clone)]
pub struct CapabilityRegistry {
    grants: HashMap<String, BTreeSet<Capability>>,
}

impl CapabilityRegistry {
    /// Create an empty registry with no grants.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `cap` to `agent`.  Duplicate grants are ignored.
    pub fn grant(&mut self, agent: &str, cap: Capability) {
        self.grants.entry(agent.to_string()).or_default().insert(cap);
    }

    /// Resolve `name` and grant it to `agent`.
    pub fn grant_named(&mut self, agent: &str, name: &str) -> Result<Capability, ArkError> {
        let cap: Capability = name.parse()?;
        self.grant(agent, cap);
        Ok(cap)
    }

    /// Resolve and grant every name, failing on the first unknown one.
    /// Nothing is granted when any name is unknown.
    pub fn grant_all<'a, I>(&mut self, agent: &str, names: I) -> Result<Vec<Capability>, ArkError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let caps = names
            .into_iter()
            .map(str::parse::<Capability>)
            .collect::<Result<Vec<_>, _>>()?;
        for cap in &caps {
            self.grant(agent, *cap);
        }
        Ok(caps)
    }

    /// Revoke `cap` from `agent`.  No-ops if absent.
    pub fn revoke(&mut self, agent: &str, cap: Capability) {
        if let Some(set) = self.grants.get_mut(agent) {
            set.remove(&cap);
        }
    }

    /// `Ok(())` when `agent` holds `cap`, [`ArkError::Unauthorized`] otherwise.
    pub fn check(&self, agent: &str, cap: Capability) -> Result<(), ArkError> {
        let has = self.grants.get(agent).is_some_and(|s| s.contains(&cap));
        if has {
            Ok(())
        } else {
            Err(ArkError::Unauthorized {
                agent: agent.to_string(),
                capability: cap,
            })
        }
    }

    /// Capabilities held by `agent`, in declaration order.
    pub fn granted(&self, agent: &str) -> Vec<Capability> {
        self.grants
            .get(agent)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_and_check_passes() {
        let mut registry = CapabilityRegistry::new();
        registry.grant("architect", Capability::PlanEvolution);
        assert!(registry.check("architect", Capability::PlanEvolution).is_ok());
    }

    #[test]
    fn ungranted_capability_is_denied() {
        let registry = CapabilityRegistry::new();
        let result = registry.check("architect", Capability::PlanEvolution);
        assert!(matches!(result, Err(ArkError::Unauthorized { .. })));
    }

    #[test]
    fn grants_are_per_agent() {
        let mut registry = CapabilityRegistry::new();
        registry.grant("engineer", Capability::ValidateSyntax);
        assert!(registry.check("critic", Capability::ValidateSyntax).is_err());
    }

    #[test]
    fn grant_named_rejects_unknown_tool() {
        let mut registry = CapabilityRegistry::new();
        let err = registry.grant_named("engineer", "compile_universe").unwrap_err();
        assert_eq!(err, ArkError::UnknownCapability("compile_universe".into()));
        assert!(registry.granted("engineer").is_empty());
    }

    #[test]
    fn grant_all_is_all_or_nothing() {
        let mut registry = CapabilityRegistry::new();
        assert!(registry
            .grant_all("critic", ["check_security", "bogus"])
            .is_err());
        assert!(registry.granted("critic").is_empty());

        let caps = registry
            .grant_all("critic", ["identify_bottlenecks", "check_security"])
            .unwrap();
        assert_eq!(caps.len(), 2);
        assert_eq!(
            registry.granted("critic"),
            vec![Capability::CheckSecurity, Capability::IdentifyBottlenecks]
        );
    }

    #[test]
    fn revoke_removes_capability() {
        let mut registry = CapabilityRegistry::new();
        registry.grant("documentor", Capability::GetSystemStateSummary);
        registry.revoke("documentor", Capability::GetSystemStateSummary);
        assert!(registry
            .check("documentor", Capability::GetSystemStateSummary)
            .is_err());
        // Revoking from an unknown agent must not panic.
        registry.revoke("ghost", Capability::CheckSecurity);
    }

    #[test]
    fn duplicate_grant_is_idempotent() {
        let mut registry = CapabilityRegistry::new();
        registry.grant("meta_observer", Capability::GetSystemStateSummary);
        registry.grant("meta_observer", Capability::GetSystemStateSummary);
        assert_eq!(registry.granted("meta_observer").len(), 1);
    }
}
