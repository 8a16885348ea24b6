use axum::{Json, debug_handler, extract::State};

use crate::{
    auth::RequireAuth,
    error::AppResult,
    models::{Account, AccountEdit},
    services::AccountService,
    state::AppState,
};

/// The caller's account, created on first visit
#[debug_handler(state = AppState)]
#[utoipa::path(
    get,
    tag = "account",
    path = "/account",
    responses(
        (status = OK, body = Account),
        (status = UNAUTHORIZED, description = "Missing or invalid bearer token"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_account(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    accounts: AccountService,
) -> AppResult<Json<Account>> {
    let user = state.identity.user_info(&identity).await?;
    Ok(Json(accounts.get_or_create_account(&user).await?))
}

/// Update the caller's display name or picture
#[debug_handler(state = AppState)]
#[utoipa::path(
    put,
    tag = "account",
    path = "/account",
    request_body = AccountEdit,
    responses(
        (status = OK, body = Account),
        (status = BAD_REQUEST, description = "Invalid account data"),
        (status = UNAUTHORIZED, description = "Missing or invalid bearer token"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn edit_account(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    accounts: AccountService,
    Json(edit): Json<AccountEdit>,
) -> AppResult<Json<Account>> {
    let user = state.identity.user_info(&identity).await?;
    Ok(Json(accounts.edit(&user, edit).await?))
}
