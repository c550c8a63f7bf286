//! Record CRUD routes. One router per record type, nested by the consumer
//! under the type's URI prefix.

use crate::handlers::{create, delete as delete_handler, list, read, update};
use crate::record::Record;
use crate::state::AppState;
use axum::{routing::put, Router};
use serde::{de::DeserializeOwned, Serialize};

/// `PUT /` creates, `PUT /:id` updates, `GET /:id` reads one,
/// `GET /?limit=&offset=&order=&order_direction=&filter_<field>=` lists,
/// `DELETE /:id` deletes.
pub fn record_routes<T>(state: AppState) -> Router
where
    T: Record + Serialize + DeserializeOwned,
{
    Router::new()
        .route("/", put(create::<T>).get(list::<T>))
        .route(
            "/:id",
            put(update::<T>).get(read::<T>).delete(delete_handler::<T>),
        )
        .with_state(state)
}
