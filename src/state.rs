//! Shared application state for all record routes.

use crate::controller::Controller;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<Controller>,
}
