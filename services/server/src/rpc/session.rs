//! `user.*` session/account methods: login, register, logout, profile
//! read/write, password change.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use turntable_core::auth::Credentials;
use turntable_core::context::RequestContext;
use turntable_core::error::DomainError;
use turntable_core::repository::UserRecord;
use turntable_core::router::Handler;
use turntable_core::Client;
use turntable_protocol::methods::session::{
    ChangePasswordParams, ChangePasswordResult, GetProfileParams, GetProfileResult, LoginParams, LoginResult, LogoutResult, RegisterParams, RegisterResult, UpdateProfileParams,
    UpdateProfileResult, UserProfile,
};

use crate::state::AppState;

use super::parse_params;

fn profile_of(record: &UserRecord) -> UserProfile {
    UserProfile {
        user_id: record.id.clone(),
        username: record.username.clone(),
        avatar_url: record.avatar_url.clone(),
        roles: Vec::new(),
        level: super::level_for_experience(record.experience),
        experience: record.experience,
    }
}

struct Login {
    state: AppState,
}

#[async_trait]
impl Handler for Login {
    async fn call(&self, _ctx: RequestContext, client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: LoginParams = parse_params(params)?;
        let (claims, token) = self
            .state
            .auth
            .login(Credentials {
                username: params.username,
                password: params.password,
            })
            .await?;
        let user_id = claims.user_id.ok_or_else(|| DomainError::Internal("login succeeded without a user id".to_owned()))?;
        let username = claims.username.unwrap_or_default();
        let record = self.state.user_accounts.ensure(&user_id, &username).await;
        self.state.hub.bind_user(client.id(), user_id).await;
        Ok(serde_json::to_value(LoginResult {
            token,
            profile: profile_of(&record),
        })
        .expect("login result always serializes"))
    }
}

struct Register {
    state: AppState,
}

#[async_trait]
impl Handler for Register {
    async fn call(&self, _ctx: RequestContext, client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: RegisterParams = parse_params(params)?;
        let (user_id, token) = self.state.accounts.register(&params.username, &params.password).await?;
        let record = self.state.user_accounts.ensure(&user_id, &params.username).await;
        self.state.hub.bind_user(client.id(), user_id).await;
        Ok(serde_json::to_value(RegisterResult {
            token,
            profile: profile_of(&record),
        })
        .expect("register result always serializes"))
    }
}

struct Logout {
    state: AppState,
}

#[async_trait]
impl Handler for Logout {
    async fn call(&self, ctx: RequestContext, _client: Client, _params: Option<Value>) -> Result<Value, DomainError> {
        let user_id = ctx.claims().user_id.clone().ok_or(DomainError::AuthenticationRequired)?;
        self.state.auth.logout(&user_id).await?;
        self.state.presence.remove(&user_id).await?;
        Ok(serde_json::to_value(LogoutResult { ok: true }).expect("logout result always serializes"))
    }
}

struct GetProfile {
    state: AppState,
}

#[async_trait]
impl Handler for GetProfile {
    async fn call(&self, ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: GetProfileParams = parse_params(params)?;
        let user_id = params.user_id.or_else(|| ctx.claims().user_id.clone()).ok_or(DomainError::AuthenticationRequired)?;
        let record = self.state.users.get(&user_id).await?;
        Ok(serde_json::to_value(profile_of(&record) as GetProfileResult).expect("profile result always serializes"))
    }
}

struct UpdateProfile {
    state: AppState,
}

#[async_trait]
impl Handler for UpdateProfile {
    async fn call(&self, ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: UpdateProfileParams = parse_params(params)?;
        let user_id = ctx.claims().user_id.clone().ok_or(DomainError::AuthenticationRequired)?;
        let record = self.state.users.update_profile(&user_id, params.username, params.avatar_url).await?;
        Ok(serde_json::to_value(profile_of(&record) as UpdateProfileResult).expect("update profile result always serializes"))
    }
}

struct ChangePassword {
    state: AppState,
}

#[async_trait]
impl Handler for ChangePassword {
    async fn call(&self, ctx: RequestContext, _client: Client, params: Option<Value>) -> Result<Value, DomainError> {
        let params: ChangePasswordParams = parse_params(params)?;
        let user_id = ctx.claims().user_id.clone().ok_or(DomainError::AuthenticationRequired)?;
        self.state.accounts.change_password(&user_id, &params.current_password, &params.new_password).await?;
        Ok(serde_json::to_value(ChangePasswordResult { ok: true }).expect("change password result always serializes"))
    }
}

pub(crate) async fn register(state: &AppState) {
    super::register(&state.router, "user.login", false, Arc::new(Login { state: state.clone() })).await;
    super::register(&state.router, "user.register", false, Arc::new(Register { state: state.clone() })).await;
    super::register(&state.router, "user.logout", true, Arc::new(Logout { state: state.clone() })).await;
    super::register(&state.router, "user.getProfile", true, Arc::new(GetProfile { state: state.clone() })).await;
    super::register(&state.router, "user.updateProfile", true, Arc::new(UpdateProfile { state: state.clone() })).await;
    super::register(&state.router, "user.changePassword", true, Arc::new(ChangePassword { state: state.clone() })).await;
}
