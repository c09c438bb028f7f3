//! `/login` endpoints.

use super::render::login_page;
use crate::handshake::{LoginForm, Orchestrator, RenderInstruction};
use axum::{
    Form, Json,
    extract::{Extension, Query},
    http::{HeaderMap, header::ACCEPT},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use utoipa::IntoParams;

#[derive(Deserialize, IntoParams, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct LoginQuery {
    /// Identity to pre-fill in the form.
    pub identity: Option<String>,
}

#[utoipa::path(
    get,
    path = "/login",
    params(LoginQuery),
    responses(
        (status = 200, description = "Login form awaiting a phone number", body = RenderInstruction)
    ),
    tag = "login"
)]
pub async fn login_form(headers: HeaderMap, Query(query): Query<LoginQuery>) -> Response {
    respond(&headers, RenderInstruction::form(query.identity))
}

#[utoipa::path(
    post,
    path = "/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Step accepted; next state in body", body = RenderInstruction),
        (status = 400, description = "Missing identity, no data, invalid phone or incorrect password", body = RenderInstruction),
        (status = 401, description = "Phone number banned or third-party apps disabled", body = RenderInstruction),
        (status = 403, description = "Not whitelisted, or incorrect/expired code", body = RenderInstruction),
        (status = 404, description = "Phone number not registered", body = RenderInstruction),
        (status = 429, description = "Phone number temporarily banned for flooding", body = RenderInstruction),
        (status = 500, description = "Unexpected failure", body = RenderInstruction)
    ),
    tag = "login"
)]
pub async fn login_submit(
    headers: HeaderMap,
    orchestrator: Extension<Arc<Orchestrator>>,
    payload: Option<Form<LoginForm>>,
) -> Response {
    // An unreadable body is treated like an empty form.
    let form = payload.map(|Form(form)| form).unwrap_or_default();

    debug!("login form: {:?}", form);

    let instruction = orchestrator.handle(form).await;
    respond(&headers, instruction)
}

fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|accept| accept.contains("application/json"))
}

fn respond(headers: &HeaderMap, instruction: RenderInstruction) -> Response {
    let status = instruction.status;
    if wants_json(headers) {
        (status, Json(instruction)).into_response()
    } else {
        (status, Html(login_page(&instruction))).into_response()
    }
}
