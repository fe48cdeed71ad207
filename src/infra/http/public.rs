use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    application::{
        error::HttpError,
        menu::{MenuResolutionService, ResolvedMenu, effective_role},
        repos::MenuRepo,
    },
    cache::{CacheTrigger, SharedPurge},
    domain::{access::AccessibleLevels, types::Role},
};

use super::{
    db_health_response,
    middleware::{log_responses, set_request_context},
    role::RoleResolver,
};

#[derive(Clone)]
pub struct HttpState {
    pub menus: Arc<MenuResolutionService>,
    pub trigger: CacheTrigger,
    pub repo: Arc<dyn MenuRepo>,
    pub roles: Arc<dyn RoleResolver>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/menu", get(get_menu).delete(purge_menu))
        .route("/menu/{id}/children", get(get_children))
        .route("/_health/db", get(public_health))
        .route("/_health/cache", get(cache_health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

/// Envelope shared by the menu read endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MenuEnvelope<'a, T: Serialize> {
    success: bool,
    data: &'a T,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_id: Option<Uuid>,
    user_role: Role,
    accessible_levels: &'a AccessibleLevels,
    cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_source: Option<&'static str>,
    response_time_ms: u64,
}

impl<'a, T: Serialize> MenuEnvelope<'a, T> {
    fn new(menu: &'a ResolvedMenu, data: &'a T, started_at: Instant) -> Self {
        Self {
            success: true,
            data,
            parent_id: None,
            user_role: menu.snapshot.role,
            accessible_levels: &menu.snapshot.accessible_levels,
            cached: menu.served_from.is_cached(),
            cache_source: menu.served_from.cache_source(),
            response_time_ms: elapsed_ms(started_at),
        }
    }
}

#[derive(Debug, Serialize)]
struct MessageBody {
    success: bool,
    message: String,
}

async fn get_menu(State(state): State<HttpState>, headers: HeaderMap) -> Response {
    let started_at = Instant::now();
    let claim = state.roles.role_claim(&headers);

    match state.menus.resolve(claim.as_deref()).await {
        Ok(menu) => {
            let body = MenuEnvelope::new(&menu, &menu.snapshot.entries, started_at);
            Json(body).into_response()
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn get_children(
    State(state): State<HttpState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Response {
    let started_at = Instant::now();
    let claim = state.roles.role_claim(&headers);

    match state.menus.resolve_children(claim.as_deref(), id).await {
        Ok(resolved) => {
            let mut body = MenuEnvelope::new(&resolved.menu, &resolved.children, started_at);
            body.parent_id = Some(resolved.parent_id);
            Json(body).into_response()
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn purge_menu(State(state): State<HttpState>, headers: HeaderMap) -> Response {
    let claim = state.roles.role_claim(&headers);
    let role = effective_role(claim.as_deref());
    if !role.is_admin() {
        return HttpError::new(
            "infra::http::purge_menu",
            StatusCode::FORBIDDEN,
            "Only administrators can clear the menu cache",
            format!("role `{role}` attempted a menu cache purge"),
        )
        .into_response();
    }

    let report = state.trigger.menu_mutated().await;
    let message = match report.shared {
        SharedPurge::Failed => "Local menu cache cleared; shared cache could not be reached",
        SharedPurge::Disabled | SharedPurge::Purged(_) => "Menu cache cleared",
    };

    Json(MessageBody {
        success: true,
        message: message.to_string(),
    })
    .into_response()
}

async fn public_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.repo.health_check().await)
}

async fn cache_health(State(state): State<HttpState>) -> Response {
    Json(state.menus.cache().stats()).into_response()
}

fn elapsed_ms(started_at: Instant) -> u64 {
    u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX)
}
