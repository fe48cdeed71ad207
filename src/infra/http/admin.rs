//! Admin listener: menu maintenance over JSON.
//!
//! Every route requires the ADMIN role claim. Each successful write purges the
//! menu cache before the response is sent.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post, put},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    application::{
        admin::{
            AdminMenuService,
            menus::{MenuItemCommand, ReorderCommand},
        },
        error::HttpError,
        menu::effective_role,
        repos::MenuOrderParams,
    },
    domain::types::VisibilityLevel,
};

use super::{
    middleware::{log_responses, set_request_context},
    role::RoleResolver,
};

#[derive(Clone)]
pub struct AdminState {
    pub menus: Arc<AdminMenuService>,
    pub roles: Arc<dyn RoleResolver>,
}

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/menus", get(list_menus).post(create_menu))
        .route("/menus/order", put(reorder_menus))
        .route("/menus/cache", delete(purge_cache))
        .route("/menus/{id}", patch(update_menu).delete(delete_menu))
        .route("/menus/{id}/children", post(create_sub_menu))
        .route("/submenus/{id}", patch(update_sub_menu).delete(delete_sub_menu))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn require_admin(
    State(state): State<AdminState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let claim = state.roles.role_claim(request.headers());
    let role = effective_role(claim.as_deref());
    if !role.is_admin() {
        return HttpError::new(
            "infra::http::admin::require_admin",
            StatusCode::FORBIDDEN,
            "Administrator role required",
            format!("role `{role}` denied on admin listener"),
        )
        .into_response();
    }

    next.run(request).await
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MenuItemRequest {
    label: String,
    path: String,
    #[serde(default)]
    display_order: i32,
    visibility: VisibilityLevel,
    #[serde(default = "default_active")]
    active: bool,
}

impl From<MenuItemRequest> for MenuItemCommand {
    fn from(payload: MenuItemRequest) -> Self {
        Self {
            label: payload.label,
            path: payload.path,
            display_order: payload.display_order,
            visibility: payload.visibility,
            active: payload.active,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderItem {
    id: Uuid,
    display_order: i32,
}

#[derive(Debug, Deserialize)]
struct ReorderRequest {
    order: Vec<OrderItem>,
}

#[derive(Debug, Serialize)]
struct DataBody<T: Serialize> {
    success: bool,
    data: T,
}

impl<T: Serialize> DataBody<T> {
    fn new(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

#[derive(Debug, Serialize)]
struct MessageBody {
    success: bool,
    message: &'static str,
}

fn message(message: &'static str) -> Json<MessageBody> {
    Json(MessageBody {
        success: true,
        message,
    })
}

async fn list_menus(State(state): State<AdminState>) -> Result<impl IntoResponse, HttpError> {
    let entries = state.menus.list().await?;
    Ok(DataBody::new(entries))
}

async fn create_menu(
    State(state): State<AdminState>,
    Json(payload): Json<MenuItemRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let entry = state.menus.create_menu(payload.into()).await?;
    Ok((StatusCode::CREATED, DataBody::new(entry)))
}

async fn update_menu(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<MenuItemRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let entry = state.menus.update_menu(id, payload.into()).await?;
    Ok(DataBody::new(entry))
}

async fn delete_menu(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    state.menus.delete_menu(id).await?;
    Ok(message("Menu item deleted"))
}

async fn reorder_menus(
    State(state): State<AdminState>,
    Json(payload): Json<ReorderRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let command = ReorderCommand {
        order: payload
            .order
            .into_iter()
            .map(|item| MenuOrderParams {
                id: item.id,
                display_order: item.display_order,
            })
            .collect(),
    };
    state.menus.reorder(command).await?;
    Ok(message("Menu order updated"))
}

async fn create_sub_menu(
    State(state): State<AdminState>,
    Path(menu_id): Path<Uuid>,
    Json(payload): Json<MenuItemRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let entry = state.menus.create_sub_menu(menu_id, payload.into()).await?;
    Ok((StatusCode::CREATED, DataBody::new(entry)))
}

async fn update_sub_menu(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<MenuItemRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let entry = state.menus.update_sub_menu(id, payload.into()).await?;
    Ok(DataBody::new(entry))
}

async fn delete_sub_menu(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    state.menus.delete_sub_menu(id).await?;
    Ok(message("Sub-menu item deleted"))
}

async fn purge_cache(State(state): State<AdminState>) -> impl IntoResponse {
    state.menus.invalidate().await;
    message("Menu cache cleared")
}
