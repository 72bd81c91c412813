//! Authentication calls on top of a [`ClientSession`]

use crate::client::ClientSession;
use crate::endpoints;
use crate::errors::ApiResult;
use crate::request::RequestOptions;
use crate::token::{Token, UserProfile};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use tracing::{info, warn};

/// Body of a successful login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    #[serde(rename = "type", default = "default_token_type")]
    pub token_type: String,
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub user_type: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl LoginResponse {
    /// Profile part of the response
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            user_type: self.user_type.clone(),
        }
    }
}

/// Account kinds that can register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Patient,
    Doctor,
}

impl Registration {
    fn path(self) -> &'static str {
        match self {
            Registration::Patient => endpoints::auth::REGISTER_PATIENT,
            Registration::Doctor => endpoints::auth::REGISTER_DOCTOR,
        }
    }
}

/// Login, logout and account calls
#[derive(Debug, Clone)]
pub struct AuthApi {
    session: ClientSession,
}

impl AuthApi {
    pub fn new(session: ClientSession) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &ClientSession {
        &self.session
    }

    /// Sign in and keep the issued token and profile in the token store.
    ///
    /// A rejected login is never treated as an expired session.
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<LoginResponse> {
        let response: LoginResponse = self
            .session
            .post(
                endpoints::auth::LOGIN,
                &json!({ "email": email, "password": password }),
                RequestOptions::new().skip_auth_refresh(),
            )
            .await?;

        let store = self.session.token_store();
        store.set(Token::with_lifetime(
            response.token.clone(),
            self.session.config().token_lifetime,
        ));
        store.set_user(response.profile());
        self.session.clear_cache();

        info!("Signed in as {}", response.email);
        Ok(response)
    }

    /// Sign out. The local session is cleared even if the backend call fails.
    pub async fn logout(&self) {
        let result: ApiResult<JsonValue> = self
            .session
            .post(
                endpoints::auth::LOGOUT,
                &JsonValue::Null,
                RequestOptions::new().silent().skip_auth_refresh(),
            )
            .await;
        if let Err(error) = result {
            warn!(%error, "Logout call failed; clearing local session anyway");
        }

        self.session.token_store().clear();
        self.session.clear_cache();
        info!("Signed out");
    }

    /// Check the current token with the backend
    pub async fn validate(&self) -> ApiResult<JsonValue> {
        self.session
            .get(endpoints::auth::VALIDATE, RequestOptions::new().no_cache())
            .await
    }

    /// Create an account of the given kind
    pub async fn register<B>(&self, kind: Registration, details: &B) -> ApiResult<JsonValue>
    where
        B: Serialize + ?Sized,
    {
        self.session
            .post(kind.path(), details, RequestOptions::new().skip_auth_refresh())
            .await
    }

    /// Ask for a password reset mail
    pub async fn forgot_password(&self, email: &str) -> ApiResult<JsonValue> {
        self.session
            .post(
                endpoints::auth::FORGOT_PASSWORD,
                &json!({ "email": email }),
                RequestOptions::new().skip_auth_refresh(),
            )
            .await
    }
}
