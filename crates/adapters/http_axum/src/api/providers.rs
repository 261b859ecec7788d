//! JSON REST handlers for providers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use mims_app::ports::Backend;
use mims_domain::id::ProviderId;
use mims_domain::provider::Provider;
use mims_domain::user::Permission;

use super::{double_option, parse_id};
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateProviderRequest {
    pub name: String,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub active: Option<bool>,
}

/// Partial update. `null` clears a contact field.
#[derive(Deserialize)]
pub struct UpdateProviderRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub contact_email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub contact_phone: Option<Option<String>>,
    pub active: Option<bool>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl UpdateProviderRequest {
    fn apply(self, provider: &mut Provider) {
        if let Some(name) = self.name {
            provider.name = name.trim().to_string();
        }
        if let Some(email) = self.contact_email {
            provider.contact_email = non_blank(email).map(|e| e.to_ascii_lowercase());
        }
        if let Some(phone) = self.contact_phone {
            provider.contact_phone = non_blank(phone);
        }
        if let Some(active) = self.active {
            provider.active = active;
        }
    }
}

/// Possible responses from the provider endpoints.
pub enum ProviderResponse {
    List(Json<Vec<Provider>>),
    Ok(Json<Provider>),
    Created(Json<Provider>),
    NoContent,
}

impl IntoResponse for ProviderResponse {
    fn into_response(self) -> Response {
        match self {
            Self::List(json) => json.into_response(),
            Self::Ok(json) => json.into_response(),
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// `GET /api/providers`
pub async fn list<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
) -> Result<ProviderResponse, ApiError> {
    current.require(Permission::ViewCases)?;
    let providers = state.providers.list_providers().await?;
    Ok(ProviderResponse::List(Json(providers)))
}

/// `POST /api/providers`
pub async fn create<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Json(req): Json<CreateProviderRequest>,
) -> Result<ProviderResponse, ApiError> {
    current.require(Permission::ManageSettings)?;
    let mut builder = Provider::builder()
        .name(req.name)
        .active(req.active.unwrap_or(true));
    if let Some(email) = req.contact_email {
        builder = builder.contact_email(email);
    }
    if let Some(phone) = req.contact_phone {
        builder = builder.contact_phone(phone);
    }
    let provider = state.providers.create_provider(builder.build()?).await?;
    Ok(ProviderResponse::Created(Json(provider)))
}

/// `GET /api/providers/{id}`
pub async fn get<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<ProviderResponse, ApiError> {
    current.require(Permission::ViewCases)?;
    let provider = state
        .providers
        .get_provider(parse_id(&id, "provider")?)
        .await?;
    Ok(ProviderResponse::Ok(Json(provider)))
}

/// `PATCH /api/providers/{id}`
pub async fn update<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateProviderRequest>,
) -> Result<ProviderResponse, ApiError> {
    current.require(Permission::ManageSettings)?;
    let id: ProviderId = parse_id(&id, "provider")?;
    let mut provider = state.providers.get_provider(id).await?;
    req.apply(&mut provider);
    let provider = state.providers.update_provider(provider).await?;
    Ok(ProviderResponse::Ok(Json(provider)))
}

/// `DELETE /api/providers/{id}`
pub async fn delete<B: Backend>(
    State(state): State<AppState<B>>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<ProviderResponse, ApiError> {
    current.require(Permission::ManageSettings)?;
    state
        .providers
        .delete_provider(parse_id(&id, "provider")?)
        .await?;
    Ok(ProviderResponse::NoContent)
}

#[cfg(test)]
mod tests {
    use crate::test_support::{TestApp, request, send};
    use axum::http::StatusCode;
    use mims_domain::id::ProviderId;
    use mims_domain::user::Role;
    use serde_json::json;

    #[tokio::test]
    async fn should_create_provider_and_clear_contact() {
        let app = TestApp::new();
        let (_, token) = app.login_as(Role::Admin).await;

        let (status, _, created) = send(
            app.router(),
            request(
                "POST",
                "/api/providers",
                Some(&token),
                Some(json!({"name": "CoolAir Co", "contact_email": "Ops@CoolAir.example"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["contact_email"], "ops@coolair.example");

        let uri = format!("/api/providers/{}", created["id"].as_str().unwrap());
        let (status, _, patched) = send(
            app.router(),
            request("PATCH", &uri, Some(&token), Some(json!({"contact_email": null}))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(patched["contact_email"].is_null());
    }

    #[tokio::test]
    async fn should_return_409_for_duplicate_name() {
        let app = TestApp::new();
        let (_, token) = app.login_as(Role::Admin).await;
        for expected in [StatusCode::CREATED, StatusCode::CONFLICT] {
            let (status, _, _) = send(
                app.router(),
                request("POST", "/api/providers", Some(&token), Some(json!({"name": "Acme"}))),
            )
            .await;
            assert_eq!(status, expected);
        }
    }

    #[tokio::test]
    async fn should_return_400_for_bad_email() {
        let app = TestApp::new();
        let (_, token) = app.login_as(Role::Admin).await;
        let (status, _, _) = send(
            app.router(),
            request(
                "POST",
                "/api/providers",
                Some(&token),
                Some(json!({"name": "Acme", "contact_email": "nope"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn should_return_404_for_unknown_provider() {
        let app = TestApp::new();
        let (_, token) = app.login_as(Role::Viewer).await;
        let uri = format!("/api/providers/{}", ProviderId::new());
        let (status, _, _) = send(app.router(), request("GET", &uri, Some(&token), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
