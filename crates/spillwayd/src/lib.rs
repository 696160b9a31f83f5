//! spillwayd — REST surface over per-group scaling controllers.
//!
//! The binary (`main.rs`) assembles the controllers from a groups.toml
//! definition file and a simulated cloud; this library holds the router so
//! tests can drive the API without a listening socket.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/groups` | List group names |
//! | GET | `/api/v1/groups/:name` | Group status snapshot |
//! | POST | `/api/v1/groups/:name/adjust` | Apply a scaling adjustment |
//! | POST | `/api/v1/groups/:name/resize` | Resize to an exact capacity |

pub mod handlers;

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use spillway_controller::GroupController;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub groups: Arc<BTreeMap<String, Arc<GroupController>>>,
}

/// Build the daemon's API router over the given group controllers.
pub fn build_router(groups: BTreeMap<String, Arc<GroupController>>) -> Router {
    let state = ApiState {
        groups: Arc::new(groups),
    };

    let api_routes = Router::new()
        .route("/groups", get(handlers::list_groups))
        .route("/groups/{name}", get(handlers::group_status))
        .route("/groups/{name}/adjust", post(handlers::adjust_group))
        .route("/groups/{name}/resize", post(handlers::resize_group))
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}
