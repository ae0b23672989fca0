use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use rusqlite::Connection;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::models::User;
use crate::services::backend::BookingBackend;
use crate::services::countdown::CountdownEvent;
use crate::services::flow::BookingSession;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub backend: Box<dyn BookingBackend>,
    pub sessions: Mutex<HashMap<Uuid, BookingSession>>,
    pub current_user: RwLock<Option<User>>,
    pub countdown_tx: broadcast::Sender<CountdownEvent>,
}

impl AppState {
    pub fn new(conn: Connection, config: AppConfig, backend: Box<dyn BookingBackend>) -> Self {
        let (countdown_tx, _) = broadcast::channel(256);
        Self {
            db: Arc::new(Mutex::new(conn)),
            config,
            backend,
            sessions: Mutex::new(HashMap::new()),
            current_user: RwLock::new(None),
            countdown_tx,
        }
    }
}
