use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::{auth::IdentityProvider, config::AppSettings, database::ConnectionFactory};

/// Everything handlers share for the lifetime of the process.
#[derive(Clone)]
pub struct AppState {
    /// Single instance, shared by every request.
    pub identity: Arc<IdentityProvider>,
    pub connections: ConnectionFactory,
}

impl AppState {
    pub fn new(identity: IdentityProvider, connections: ConnectionFactory) -> Self {
        Self {
            identity: Arc::new(identity),
            connections,
        }
    }
}

pub fn init_state(config: &AppSettings) -> Result<AppState> {
    let identity = IdentityProvider::from_config(&config.auth)?;
    info!(
        authority = %identity.authority(),
        audience = %identity.audience(),
        "bearer authentication registered"
    );
    let connections = ConnectionFactory::new(&config.database)?;
    Ok(AppState::new(identity, connections))
}
