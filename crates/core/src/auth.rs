use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{ClientError, Entity};
use crate::model::User;
use crate::session::{CredentialStore, Session};
use crate::transport::{ApiRequest, Transport};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    user: Option<User>,
}

/// Login, registration and logout against the API, keeping the [`Session`] and the
/// on-disk [`CredentialStore`] in step.
#[derive(Clone)]
pub struct AuthService {
    transport: Arc<dyn Transport>,
    session: Session,
    store: CredentialStore,
}

impl AuthService {
    pub fn new(transport: Arc<dyn Transport>, session: Session, store: CredentialStore) -> Self {
        Self {
            transport,
            session,
            store,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, ClientError> {
        tracing::info!(email, "logging in");
        let body = json!({ "email": email.trim(), "password": password });
        self.authenticate(ApiRequest::post("/login").json(body), "Login failed")
            .await
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<User, ClientError> {
        tracing::info!(email, "registering account");
        let body = json!({
            "name": name.trim(),
            "email": email.trim(),
            "password": password,
            "password_confirmation": password,
        });
        self.authenticate(ApiRequest::post("/register").json(body), "Registration failed")
            .await
    }

    /// Revoke the token server-side while it is still attached, then forget it locally
    /// whatever the server said.
    pub async fn logout(&self) {
        if self.session.is_authenticated() {
            if let Err(err) = self.transport.send(ApiRequest::post("/logout")).await {
                tracing::warn!(error = %err, "logout request failed, clearing local credentials anyway");
            }
        }
        self.forget();
    }

    /// Fetch the authenticated user. A failure means the stored token is no longer
    /// usable, so local credentials are dropped.
    pub async fn current_user(&self) -> Result<User, ClientError> {
        let raw = match self.transport.send(ApiRequest::get("/user")).await {
            Ok(raw) => raw,
            Err(err) => {
                let err = ClientError::from_transport(Entity::User, err);
                tracing::warn!(error = %err, "could not fetch current user");
                self.forget();
                return Err(err);
            }
        };

        let user = match decode_user(raw) {
            Some(user) => user,
            None => {
                self.forget();
                return Err(ClientError::unknown("Failed to load user"));
            }
        };
        self.session.set_user(Some(user.clone()));
        Ok(user)
    }

    async fn authenticate(&self, request: ApiRequest, fallback: &str) -> Result<User, ClientError> {
        let raw = self
            .transport
            .send(request)
            .await
            .map_err(|err| ClientError::from_transport(Entity::User, err))?;

        let payload = match raw {
            Value::Object(ref map) if map.contains_key("data") && !map.contains_key("access_token") => {
                map.get("data").cloned().unwrap_or(Value::Null)
            }
            other => other,
        };
        let response: TokenResponse =
            serde_json::from_value(payload).map_err(|_| ClientError::unknown(fallback))?;
        let token = response
            .access_token
            .or(response.token)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ClientError::unknown(fallback))?;
        let user = response.user.ok_or_else(|| ClientError::unknown(fallback))?;

        self.session.begin(token.clone(), Some(user.clone()));
        if let Err(err) = self.store.save(&token, Some(&user)) {
            tracing::warn!(error = %err, "could not persist credentials");
        }
        tracing::info!(user_id = user.id, "authenticated");
        Ok(user)
    }

    fn forget(&self) {
        self.session.end();
        if let Err(err) = self.store.clear() {
            tracing::warn!(error = %err, "could not remove stored credentials");
        }
    }
}

fn decode_user(raw: Value) -> Option<User> {
    let candidate = match raw {
        Value::Object(mut map) => match map.remove("user") {
            Some(user @ Value::Object(_)) => user,
            _ => Value::Object(map),
        },
        _ => return None,
    };
    serde_json::from_value(candidate).ok()
}
