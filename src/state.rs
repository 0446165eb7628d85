use std::sync::Arc;

use crate::checkout::CheckoutService;
use crate::db::{DbPool, OrmConn};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub checkout: Arc<CheckoutService>,
}
