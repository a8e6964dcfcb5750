pub mod carpool;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod store;
pub mod utils;

use std::sync::Arc;

pub use carpool::CarpoolEngine;
pub use config::Config;
pub use error::{AppError, AppResult};

use store::ActiveBookingStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ActiveBookingStore>,
    pub engine: Arc<CarpoolEngine>,
    pub config: Config,
}

impl AppState {
    pub fn new(engine: CarpoolEngine, config: Config) -> Self {
        Self {
            store: Arc::clone(engine.store()),
            engine: Arc::new(engine),
            config,
        }
    }
}
