//! REST API handlers.
//!
//! Each handler resolves a group controller from `ApiState` and returns a
//! JSON response.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use spillway_core::AdjustmentType;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

// ── Groups ─────────────────────────────────────────────────────

/// GET /api/v1/groups
pub async fn list_groups(State(state): State<ApiState>) -> impl IntoResponse {
    let names: Vec<String> = state.groups.keys().cloned().collect();
    ApiResponse::ok(names)
}

/// GET /api/v1/groups/:name
pub async fn group_status(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let Some(controller) = state.groups.get(&name) else {
        return error_response("group not found", StatusCode::NOT_FOUND).into_response();
    };
    match controller.status().await {
        Ok(status) => ApiResponse::ok(status).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

// ── Scaling ────────────────────────────────────────────────────

/// Adjustment request body.
#[derive(serde::Deserialize)]
pub struct AdjustRequest {
    pub amount: i64,
    pub kind: AdjustmentType,
}

/// POST /api/v1/groups/:name/adjust
///
/// A request landing inside the group's cooldown window still returns 200;
/// the outcome in the body says it was skipped.
pub async fn adjust_group(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(req): Json<AdjustRequest>,
) -> impl IntoResponse {
    let Some(controller) = state.groups.get(&name) else {
        return error_response("group not found", StatusCode::NOT_FOUND).into_response();
    };
    match controller.adjust(req.amount, req.kind).await {
        Ok(outcome) => ApiResponse::ok(outcome).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// Resize request body.
#[derive(serde::Deserialize)]
pub struct ResizeRequest {
    pub target: u32,
}

/// POST /api/v1/groups/:name/resize
///
/// The target is clamped to the group's bounds here at the boundary, so an
/// out-of-range request lands on the nearest bound instead of failing.
pub async fn resize_group(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(req): Json<ResizeRequest>,
) -> impl IntoResponse {
    let Some(controller) = state.groups.get(&name) else {
        return error_response("group not found", StatusCode::NOT_FOUND).into_response();
    };
    let target = controller.clamp(req.target).await;
    match controller.resize(target).await {
        Ok(report) => ApiResponse::ok(serde_json::json!({
            "group": name,
            "previous": report.previous,
            "target": report.target,
            "region": report.region,
            "registered": report.refresh.registered,
            "removed": report.refresh.removed,
        }))
        .into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    use spillway_cloud::{LaunchRequest, LogNotifier};
    use spillway_cloud::sim::{SimCompute, SimLb, SimQuota, SimTemplateGroup};
    use spillway_controller::{GroupController, Reconciler};
    use spillway_core::{GroupConfig, LaunchTemplate, RollingUpdatePolicy};
    use spillway_members::PoolMembership;
    use spillway_placement::{BootTuning, HomeRegion, OverflowRegion};
    use spillway_state::GroupStore;

    struct TestWorld {
        templates: Arc<SimTemplateGroup>,
        state: ApiState,
    }

    fn web_config(cooldown: u64) -> GroupConfig {
        GroupConfig {
            name: "web".to_string(),
            min_size: 1,
            max_size: 5,
            desired_capacity: None,
            cooldown,
            rolling_update: RollingUpdatePolicy::default(),
            launch_template: Some(LaunchTemplate {
                image: "img-web".to_string(),
                flavor: "m1.small".to_string(),
                key_name: None,
                user_data: None,
                security_groups: vec![],
            }),
            instance_id: None,
            home_subnet: "subnet-home".to_string(),
            overflow_subnet: "subnet-ovf".to_string(),
            overflow_region: "region-two".to_string(),
            lb_pool: "pool-web".to_string(),
            member_port: 80,
        }
    }

    fn make_world(cooldown: u64) -> TestWorld {
        let config = web_config(cooldown);
        let compute = Arc::new(SimCompute::new());
        let lb = Arc::new(SimLb::with_pools(&["pool-web"]));
        let templates = Arc::new(SimTemplateGroup::new());
        let store = GroupStore::open_in_memory().unwrap();
        let membership = Arc::new(PoolMembership::new(
            lb.clone(),
            store.clone(),
            "web",
            "pool-web",
            80,
        ));
        let home = HomeRegion::new("home", templates.clone(), Arc::new(SimQuota::roomy()));
        let launch = LaunchRequest::from_template(
            config.launch_template.as_ref().unwrap(),
            &config.overflow_subnet,
        );
        let overflow = OverflowRegion::new(
            "region-two",
            "web",
            compute,
            store.clone(),
            membership.clone(),
            launch,
        )
        .with_tuning(BootTuning {
            timeout: Duration::from_millis(250),
            poll_interval: Duration::from_millis(1),
        });
        let reconciler = Reconciler::new(
            "web",
            vec![Arc::new(home), Arc::new(overflow)],
            membership,
        )
        .unwrap();
        let controller =
            GroupController::new(config, store, reconciler, Arc::new(LogNotifier)).unwrap();

        let mut groups = BTreeMap::new();
        groups.insert("web".to_string(), Arc::new(controller));
        TestWorld {
            templates,
            state: ApiState {
                groups: Arc::new(groups),
            },
        }
    }

    #[tokio::test]
    async fn list_groups_ok() {
        let world = make_world(0);
        let resp = list_groups(State(world.state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn status_of_known_group() {
        let world = make_world(0);
        let resp = group_status(State(world.state), Path("web".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn status_of_unknown_group_is_404() {
        let world = make_world(0);
        let resp = group_status(State(world.state), Path("nope".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn adjust_moves_capacity() {
        let world = make_world(0);
        let req = AdjustRequest {
            amount: 3,
            kind: AdjustmentType::Exact,
        };
        let resp = adjust_group(State(world.state), Path("web".to_string()), Json(req))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(world.templates.count(), 3);
    }

    #[tokio::test]
    async fn adjust_in_cooldown_is_still_200() {
        let world = make_world(60);
        let req = AdjustRequest {
            amount: 1,
            kind: AdjustmentType::Delta,
        };
        let resp = adjust_group(State(world.state.clone()), Path("web".to_string()), Json(req))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let req = AdjustRequest {
            amount: 3,
            kind: AdjustmentType::Delta,
        };
        let resp = adjust_group(State(world.state), Path("web".to_string()), Json(req))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        // The second adjustment was discarded by the cooldown.
        assert_eq!(world.templates.count(), 1);
    }

    #[tokio::test]
    async fn resize_clamps_to_bounds() {
        let world = make_world(0);
        let req = ResizeRequest { target: 100 };
        let resp = resize_group(State(world.state), Path("web".to_string()), Json(req))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(world.templates.count(), 5);
    }

    #[tokio::test]
    async fn resize_of_unknown_group_is_404() {
        let world = make_world(0);
        let req = ResizeRequest { target: 2 };
        let resp = resize_group(State(world.state), Path("nope".to_string()), Json(req))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
