//! Configuration types shared by the unit tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::{Config, ConfigEntity, PartyId, Rejection};

#[derive(Config, Debug, Clone, Default, PartialEq)]
#[config(name = "Alpha")]
pub struct Alpha {
    #[config(reload_required)]
    pub x: i32,
    pub y: String,
}

impl ConfigEntity for Alpha {}

#[derive(Config, Debug, Clone, Default)]
#[config(name = "Beta")]
pub struct Beta {
    pub inner: Alpha,
    #[config(reload_required)]
    pub z: i32,
}

impl ConfigEntity for Beta {}

#[derive(Config, Debug, Clone, Default)]
pub struct Siblings {
    pub first: Alpha,
    pub second: Alpha,
    #[config(reload_required)]
    pub tail: i32,
}

#[derive(Config, Debug, Clone, Default)]
pub struct Gate {
    #[config(reload_required)]
    pub port: u16,
    #[config(ignore, reload_required)]
    pub session: String,
}

#[derive(Config, Debug, Clone, Default)]
pub struct Hidden {
    #[config(label = "Shown Value")]
    pub visible: i32,
    #[config(skip)]
    pub scratch: String,
    #[config(ignore)]
    pub cache: Vec<String>,
}

/// Linked chain of aggregates; level 1 is the root.
#[derive(Config, Debug, Clone, Default)]
pub struct Chain {
    #[config(reload_required)]
    pub value: i32,
    pub next: Option<Box<Chain>>,
}

impl Chain {
    pub fn with_len(len: usize) -> Self {
        let mut chain = Chain::default();
        for _ in 1..len {
            chain = Chain {
                value: 0,
                next: Some(Box::new(chain)),
            };
        }
        chain
    }

    pub fn level_mut(&mut self, level: usize) -> Option<&mut Chain> {
        let mut node = self;
        for _ in 1..level {
            node = node.next.as_deref_mut()?;
        }
        Some(node)
    }
}

#[derive(Config, Debug, Clone, Default)]
#[config(reload_required, label = "Terrain Generator")]
pub struct Terrain {
    pub seed: u64,
}

#[derive(Config, Debug, Clone, Default)]
pub struct WorldSettings {
    pub terrain: Terrain,
    #[config(label = "Fallback")]
    pub backup_terrain: Terrain,
}

#[derive(Config, Debug, Clone, Default)]
pub struct Database {
    #[config(reload_required)]
    pub url: String,
    pub pool: u32,
}

#[derive(Config, Debug, Clone, Default)]
pub struct Cache {
    pub size: u32,
}

/// Optional sub-objects, present on one side only in some tests.
#[derive(Config, Debug, Clone, Default)]
pub struct Storage {
    pub primary: Option<Database>,
    pub cache: Option<Cache>,
}

/// Graph node shared by reference, for cycle tests.
#[derive(Config, Debug, Clone, Default)]
pub struct Node {
    #[config(reload_required)]
    pub value: i32,
    pub next: Option<Arc<RwLock<Node>>>,
}

impl Node {
    pub fn shared(value: i32) -> Arc<RwLock<Node>> {
        Arc::new(RwLock::new(Node { value, next: None }))
    }
}

/// Builds a ring of `len` nodes holding `value`, returning the head and all
/// nodes in order.
pub fn ring(len: usize, value: i32) -> (Arc<RwLock<Node>>, Vec<Arc<RwLock<Node>>>) {
    let nodes: Vec<_> = (0..len).map(|_| Node::shared(value)).collect();
    for (i, node) in nodes.iter().enumerate() {
        node.write().next = Some(Arc::clone(&nodes[(i + 1) % len]));
    }
    (Arc::clone(&nodes[0]), nodes)
}

#[derive(Config, Debug, Clone, Default)]
#[config(name = "ServerSettings", scope = "server_shared")]
pub struct ServerSettings {
    #[config(reload_required)]
    pub port: u16,
    pub motd: String,
    pub banned: Vec<String>,
    pub limits: BTreeMap<String, u32>,
    #[config(skip)]
    pub changed: u32,
}

impl ConfigEntity for ServerSettings {
    fn on_changed(&mut self) {
        self.changed += 1;
    }

    fn accept_changes(&self, pending: &Self, _proposer: PartyId) -> Result<(), Rejection> {
        if pending.motd.len() > 64 {
            return Err(Rejection::new("server.motd.too_long"));
        }
        Ok(())
    }
}
