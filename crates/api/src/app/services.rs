//! Service wiring: one engine, one hub, one pump connecting them.

use std::sync::{Arc, Mutex};

use innkeep_auth::{Hs256JwtValidator, JwtValidator};
use innkeep_events::InMemoryEventBus;
use innkeep_infra::{
    DomainEnvelope, EngineConfig, InMemoryInventoryStore, InMemoryInvoicingClient, InventoryEngine,
    NotificationPump, NotificationRouter, PumpHandle,
};
use innkeep_notifications::{Authenticator, HubConfig, InMemoryReadStateStore, NotificationHub};

pub type Store = Arc<InMemoryInventoryStore>;
pub type Bus = Arc<InMemoryEventBus<DomainEnvelope>>;
pub type Engine = InventoryEngine<Store, Bus>;

pub struct AppServices {
    pub engine: Engine,
    pub hub: Arc<NotificationHub>,
    pub authenticator: Authenticator,
    pub invoicing: Arc<InMemoryInvoicingClient>,
    pump: Mutex<Option<PumpHandle>>,
}

impl AppServices {
    /// Stop fan-out: join the pump thread and close every live connection.
    pub fn shutdown(&self) {
        let pump = self.pump.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(pump) = pump {
            pump.shutdown();
        }
        self.hub.stop();
    }
}

impl core::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppServices")
            .field("connections", &self.hub.connection_count())
            .finish_non_exhaustive()
    }
}

/// Build the in-memory service graph. Must be called within a tokio runtime
/// (the hub spawns its heartbeat sweep).
pub fn build_services(
    jwt: Arc<dyn JwtValidator>,
    engine_config: EngineConfig,
    hub_config: HubConfig,
) -> std::io::Result<AppServices> {
    let store: Store = Arc::new(InMemoryInventoryStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let invoicing = Arc::new(InMemoryInvoicingClient::new());

    let hub = NotificationHub::new(hub_config.clone(), Arc::new(InMemoryReadStateStore::new()));
    hub.start();

    let pump = NotificationPump::spawn(&bus, NotificationRouter::new(Arc::clone(&store)), Arc::clone(&hub))?;

    let engine = InventoryEngine::new(store, bus, invoicing.clone(), engine_config);

    Ok(AppServices {
        engine,
        hub,
        authenticator: Authenticator::new(jwt, hub_config.handshake_timeout),
        invoicing,
        pump: Mutex::new(Some(pump)),
    })
}

/// Validator for `secret`, shared by the HTTP middleware and the socket handshake.
pub fn jwt_validator(secret: &str) -> Arc<dyn JwtValidator> {
    Arc::new(Hs256JwtValidator::new(secret.as_bytes()))
}
