//! Configuration types shared by the runtime tests.

use std::sync::Arc;

use parking_lot::RwLock;
use reconf_core::{Config, ConfigEntity, PartyId, Rejection};

#[derive(Config, Debug, Clone, Default, PartialEq)]
#[config(scope = "server_shared")]
pub struct ServerRules {
    #[config(reload_required)]
    pub port: u16,
    pub motd: String,
    pub max_players: u32,
    #[config(ignore)]
    pub session_token: String,
    #[config(skip)]
    pub changes: u32,
    #[config(skip)]
    pub loads: u32,
}

impl ConfigEntity for ServerRules {
    fn on_loaded(&mut self) {
        self.loads += 1;
    }

    fn on_changed(&mut self) {
        self.changes += 1;
    }

    fn accept_changes(&self, pending: &Self, proposer: PartyId) -> Result<(), Rejection> {
        if proposer != PartyId::LOCAL && pending.max_players > 100 {
            return Err(Rejection::new("rules.max_players.too_high"));
        }
        Ok(())
    }
}

#[derive(Config, Debug, Clone, Default, PartialEq)]
pub struct ClientPrefs {
    pub volume: u8,
    pub theme: String,
}

impl ConfigEntity for ClientPrefs {}

#[derive(Config, Debug, Clone, Default, PartialEq)]
#[config(scope = "server_only", label = "Anti-Cheat")]
pub struct AntiCheat {
    pub strict: bool,
}

impl ConfigEntity for AntiCheat {}

#[derive(Config, Debug, Clone, Default)]
pub struct Tuning {
    #[config(reload_required)]
    pub threads: u32,
    pub gain: f64,
}

/// Server-shared entity holding its tuning in a shared node.
#[derive(Config, Debug, Clone, Default)]
#[config(scope = "server_shared")]
pub struct Engine {
    pub tuning: Arc<RwLock<Tuning>>,
    pub motd: String,
}

impl ConfigEntity for Engine {
    fn accept_changes(&self, pending: &Self, _proposer: PartyId) -> Result<(), Rejection> {
        if pending.motd == "forbidden" {
            return Err(Rejection::new("engine.motd.forbidden"));
        }
        Ok(())
    }
}
