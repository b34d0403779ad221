//! Live server connections, addressable by id or by server name.

use std::sync::Arc;

use dashmap::DashMap;
use slirc_wire::Address;

use super::connection::{Connection, ConnectionId};

#[derive(Default)]
pub struct ServerRegistry {
    by_id: DashMap<ConnectionId, Arc<Connection>>,
    by_name: DashMap<String, ConnectionId>,
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `conn`. Returns false if its name is already taken; the
    /// connection is then reachable by id only.
    pub fn insert(&self, conn: Arc<Connection>) -> bool {
        let id = conn.id();
        let named = match self.by_name.entry(conn.name().to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(id);
                true
            }
        };
        self.by_id.insert(id, conn);
        named
    }

    pub fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.by_id.get(&id).map(|c| Arc::clone(c.value()))
    }

    pub fn by_name(&self, name: &str) -> Option<Arc<Connection>> {
        let id = *self.by_name.get(name)?;
        self.get(id)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Look up the target of a routed worker line.
    pub fn resolve(&self, address: &Address) -> Option<Arc<Connection>> {
        match address {
            Address::Id(id) => self.get(*id),
            Address::Name(name) => self.by_name(name),
        }
    }

    /// Forget and release a connection.
    pub fn remove(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        let (_, conn) = self.by_id.remove(&id)?;
        self.by_name.remove_if(conn.name(), |_, v| *v == id);
        conn.release();
        Some(conn)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.by_id.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Release every connection; used once at shutdown.
    pub fn release_all(&self) {
        for id in self.ids() {
            self.remove(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{ConnectionFlags, ConnectionSettings, Identity};

    fn conn(name: &str) -> Arc<Connection> {
        Connection::create(
            name,
            "127.0.0.1",
            6667,
            ConnectionFlags::default(),
            Identity::default(),
            ConnectionSettings::default(),
        )
    }

    #[test]
    fn test_resolve_by_id_and_name() {
        let registry = ServerRegistry::new();
        let a = conn("libera");
        let b = conn("oftc");
        assert!(registry.insert(Arc::clone(&a)));
        assert!(registry.insert(Arc::clone(&b)));

        assert_eq!(registry.resolve(&Address::Id(a.id())).unwrap().id(), a.id());
        assert_eq!(
            registry.resolve(&Address::Name("oftc".into())).unwrap().id(),
            b.id()
        );
        assert!(registry.resolve(&Address::Name("efnet".into())).is_none());
        assert!(registry.resolve(&Address::Id(u64::MAX)).is_none());
    }

    #[test]
    fn test_duplicate_name_keeps_first() {
        let registry = ServerRegistry::new();
        let a = conn("net");
        let b = conn("net");
        assert!(registry.insert(Arc::clone(&a)));
        assert!(!registry.insert(Arc::clone(&b)));
        assert_eq!(registry.by_name("net").unwrap().id(), a.id());
        assert!(registry.get(b.id()).is_some());

        registry.remove(a.id());
        assert!(!registry.contains_name("net"));
        assert!(a.is_released());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_release_all() {
        let registry = ServerRegistry::new();
        let a = conn("a");
        registry.insert(Arc::clone(&a));
        registry.insert(conn("b"));
        registry.release_all();
        assert!(registry.is_empty());
        assert!(a.is_released());
    }
}
