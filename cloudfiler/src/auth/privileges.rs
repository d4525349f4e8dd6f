//! Privilege table: which roles may perform which action.
//!
//! Actions are identified by their exact route path (case-sensitive). An
//! action with no entry is open to any authenticated caller. An entry either
//! marks the action public or lists role names, any one of which suffices.
//!
//! The table is copy-on-write. Registration swaps in a new map, so a reader
//! always sees a whole snapshot and never a half-written entry.

use arc_swap::ArcSwap;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

/// What an action demands of its caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// No session needed
    Public,
    /// Any authenticated caller (the default for unregistered actions)
    Authenticated,
    /// An authenticated caller holding at least one of these roles. An empty
    /// set admits nobody.
    AnyRole(BTreeSet<String>),
}

impl Requirement {
    pub fn any_role<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Requirement::AnyRole(roles.into_iter().map(Into::into).collect())
    }

    /// Role names required, empty for public and authenticated-only actions
    pub fn roles(&self) -> Vec<String> {
        match self {
            Requirement::AnyRole(roles) => roles.iter().cloned().collect(),
            Requirement::Public | Requirement::Authenticated => Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct PrivilegeTable {
    entries: ArcSwap<HashMap<String, Requirement>>,
}

impl PrivilegeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entry for an action
    pub fn register(&self, action: impl Into<String>, requirement: Requirement) {
        let action = action.into();
        debug!(action = %action, ?requirement, "Registering privilege");
        self.entries.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(action.clone(), requirement.clone());
            next
        });
    }

    pub fn lookup(&self, action: &str) -> Option<Requirement> {
        self.entries.load().get(action).cloned()
    }

    pub fn requirement_for(&self, action: &str) -> Requirement {
        self.lookup(action).unwrap_or(Requirement::Authenticated)
    }

    /// Actions whose entry names this role, sorted
    pub fn references_role(&self, role: &str) -> Vec<String> {
        let snapshot = self.entries.load();
        let mut actions: Vec<_> = snapshot
            .iter()
            .filter(|(_, req)| matches!(req, Requirement::AnyRole(roles) if roles.contains(role)))
            .map(|(action, _)| action.clone())
            .collect();
        actions.sort();
        actions
    }

    /// Current entries, for inspection
    pub fn snapshot(&self) -> Arc<HashMap<String, Requirement>> {
        self.entries.load_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_entry_means_authenticated() {
        let table = PrivilegeTable::new();
        assert_eq!(table.lookup("/file/list"), None);
        assert_eq!(table.requirement_for("/file/list"), Requirement::Authenticated);
    }

    #[test]
    fn test_lookup_is_exact() {
        let table = PrivilegeTable::new();
        table.register("/role/delete", Requirement::any_role(["Admin"]));

        assert_eq!(table.lookup("/role/delete"), Some(Requirement::any_role(["Admin"])));
        assert_eq!(table.lookup("/Role/Delete"), None);
        assert_eq!(table.lookup("/role/delete/"), None);
        assert_eq!(table.lookup("/role"), None);
    }

    #[test]
    fn test_register_overwrites() {
        let table = PrivilegeTable::new();
        table.register("/role/delete", Requirement::any_role(["Admin"]));
        table.register("/role/delete", Requirement::any_role(["Owner", "Admin"]));

        assert_eq!(table.requirement_for("/role/delete").roles(), vec!["Admin".to_string(), "Owner".to_string()]);
        assert_eq!(table.snapshot().len(), 1);
    }

    #[test]
    fn test_empty_role_set_is_not_absent() {
        let table = PrivilegeTable::new();
        table.register("/locked", Requirement::AnyRole(BTreeSet::new()));
        assert_eq!(table.requirement_for("/locked"), Requirement::AnyRole(BTreeSet::new()));
        assert_ne!(table.requirement_for("/locked"), table.requirement_for("/unregistered"));
    }

    #[test]
    fn test_references_role() {
        let table = PrivilegeTable::new();
        table.register("/user/list", Requirement::any_role(["Admin"]));
        table.register("/role/delete", Requirement::any_role(["Admin", "Ops"]));
        table.register("/auth/login", Requirement::Public);

        assert_eq!(table.references_role("Admin"), vec!["/role/delete".to_string(), "/user/list".to_string()]);
        assert_eq!(table.references_role("Ops"), vec!["/role/delete".to_string()]);
        assert!(table.references_role("admin").is_empty());
    }

    #[test]
    fn test_concurrent_registration_keeps_every_entry() {
        let table = Arc::new(PrivilegeTable::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let table = table.clone();
                std::thread::spawn(move || table.register(format!("/action/{i}"), Requirement::any_role(["Admin"])))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(table.snapshot().len(), 16);
    }
}
