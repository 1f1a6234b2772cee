//! Session handling against the hosted auth service.
//!
//! The service is the only source of truth for credentials. This module keeps
//! a transient local mirror of the issued session, persists it across page
//! loads, and tells registered listeners whenever the mirror changes.

use std::cell::RefCell;

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::{Error, SupabaseConfig};

#[cfg(target_arch = "wasm32")]
const SESSION_STORAGE_KEY: &str = "turnstile-session";

/// A token this close to its deadline is treated as already expired, so it is
/// never handed out with only seconds left on it.
const EXPIRY_MARGIN_SECONDS: i64 = 60;

slotmap::new_key_type! {
    /// Handle for an auth-change subscription.
    pub struct AuthChangeKey;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct AuthUser {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp (seconds) after which `access_token` stops working.
    pub expires_at: i64,
    pub user: AuthUser,
}

impl Session {
    pub fn is_expired(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        now.timestamp() >= self.expires_at - EXPIRY_MARGIN_SECONDS
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self, now: chrono::DateTime<chrono::Utc>) -> Session {
        let expires_at = self
            .expires_at
            .unwrap_or(now.timestamp() + self.expires_in);
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

/// The service answers a signup either with a full session (auto-confirm on)
/// or with just the created user while email confirmation is pending.
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(AuthUser),
}

type AuthListener = Box<dyn Fn(Option<&Session>)>;

pub struct AuthClient {
    config: SupabaseConfig,
    session: RefCell<Option<Session>>,
    listeners: RefCell<SlotMap<AuthChangeKey, AuthListener>>,
}

impl AuthClient {
    pub fn new(config: SupabaseConfig) -> Self {
        Self {
            config,
            session: RefCell::new(load_persisted_session()),
            listeners: RefCell::new(SlotMap::with_key()),
        }
    }

    pub fn config(&self) -> &SupabaseConfig {
        &self.config
    }

    pub fn current_session(&self) -> Option<Session> {
        self.session.borrow().clone()
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.session.borrow().as_ref().map(|s| s.user.clone())
    }

    /// Bearer token for table and storage calls; the public anon key stands
    /// in while nobody is signed in.
    pub fn bearer_token(&self) -> String {
        self.session
            .borrow()
            .as_ref()
            .map(|s| s.access_token.clone())
            .unwrap_or_else(|| self.config.supabase_anon_key.clone())
    }

    /// Listeners fire with the new session (or `None`) after every sign-in,
    /// sign-up that issued a session, refresh and sign-out. Listeners must
    /// not subscribe or unsubscribe from inside the callback.
    pub fn on_auth_change(&self, listener: impl Fn(Option<&Session>) + 'static) -> AuthChangeKey {
        self.listeners.borrow_mut().insert(Box::new(listener))
    }

    pub fn unsubscribe(&self, key: AuthChangeKey) {
        self.listeners.borrow_mut().remove(key);
    }

    /// Current session, refreshing it first when the mirrored one is past
    /// its deadline. Answers `None` when there is no usable session.
    pub async fn get_session(&self) -> Option<Session> {
        let session = self.session.borrow().clone()?;
        if !session.is_expired(chrono::Utc::now()) {
            return Some(session);
        }
        match self.refresh_session().await {
            Ok(session) => Some(session),
            Err(e) => {
                log::warn!("Session restore failed: {e}");
                None
            }
        }
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, Error> {
        let SupabaseConfig {
            supabase_url,
            supabase_anon_key,
        } = &self.config;
        let url = format!("{supabase_url}/auth/v1/token?grant_type=password");

        let client = fetch_happen::Client;
        let response = client
            .post(&url)
            .header("apikey", supabase_anon_key)
            .header("Authorization", format!("Bearer {supabase_anon_key}"))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .map_err(|e| Error::Request(format!("{e:?}")))?
            .send()
            .await
            .map_err(|e| Error::Request(format!("{e:?}")))?;

        if !response.ok() {
            return Err(Error::for_status(response).await);
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(format!("{e:?}")))?;
        let session = token.into_session(chrono::Utc::now());
        self.replace_session(Some(session.clone()));
        Ok(session)
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, Error> {
        let SupabaseConfig {
            supabase_url,
            supabase_anon_key,
        } = &self.config;
        let url = format!("{supabase_url}/auth/v1/signup");

        let client = fetch_happen::Client;
        let response = client
            .post(&url)
            .header("apikey", supabase_anon_key)
            .header("Authorization", format!("Bearer {supabase_anon_key}"))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .map_err(|e| Error::Request(format!("{e:?}")))?
            .send()
            .await
            .map_err(|e| Error::Request(format!("{e:?}")))?;

        if !response.ok() {
            return Err(Error::for_status(response).await);
        }

        let parsed: SignUpResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(format!("{e:?}")))?;
        match parsed {
            SignUpResponse::Session(token) => {
                let session = token.into_session(chrono::Utc::now());
                let user = session.user.clone();
                self.replace_session(Some(session));
                Ok(user)
            }
            SignUpResponse::User(user) => Ok(user),
        }
    }

    /// Drops the local session, then revokes it remotely as a best effort.
    /// The service invalidates server-side state on its own schedule, so a
    /// failed revoke still leaves this client signed out.
    pub async fn sign_out(&self) {
        let token = self
            .session
            .borrow()
            .as_ref()
            .map(|s| s.access_token.clone());
        self.replace_session(None);

        let Some(token) = token else {
            return;
        };

        let SupabaseConfig {
            supabase_url,
            supabase_anon_key,
        } = &self.config;
        let url = format!("{supabase_url}/auth/v1/logout");

        let client = fetch_happen::Client;
        let request = client
            .post(&url)
            .header("apikey", supabase_anon_key)
            .header("Authorization", format!("Bearer {token}"))
            .json(&serde_json::json!({}));
        match request {
            Ok(request) => match request.send().await {
                Ok(response) if !response.ok() => {
                    log::warn!("Sign-out revoke answered status {}", response.status());
                }
                Ok(_) => {}
                Err(e) => log::warn!("Sign-out revoke failed: {e:?}"),
            },
            Err(e) => log::warn!("Sign-out revoke failed: {e:?}"),
        }
    }

    /// Trades the refresh token for a fresh session. A definitive rejection
    /// from the service drops the local mirror; transient transport errors
    /// leave it in place.
    pub async fn refresh_session(&self) -> Result<Session, Error> {
        let refresh_token = self
            .session
            .borrow()
            .as_ref()
            .map(|s| s.refresh_token.clone())
            .ok_or(Error::NotSignedIn)?;

        let SupabaseConfig {
            supabase_url,
            supabase_anon_key,
        } = &self.config;
        let url = format!("{supabase_url}/auth/v1/token?grant_type=refresh_token");

        let client = fetch_happen::Client;
        let response = client
            .post(&url)
            .header("apikey", supabase_anon_key)
            .header("Authorization", format!("Bearer {supabase_anon_key}"))
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .map_err(|e| Error::Request(format!("{e:?}")))?
            .send()
            .await
            .map_err(|e| Error::Request(format!("{e:?}")))?;

        if !response.ok() {
            let err = Error::for_status(response).await;
            self.replace_session(None);
            return Err(err);
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(format!("{e:?}")))?;
        let session = token.into_session(chrono::Utc::now());
        self.replace_session(Some(session.clone()));
        Ok(session)
    }

    fn replace_session(&self, session: Option<Session>) {
        *self.session.borrow_mut() = session.clone();
        match &session {
            Some(session) => persist_session(session),
            None => clear_persisted_session(),
        }

        let listeners = self.listeners.borrow();
        for (_, listener) in listeners.iter() {
            listener(session.as_ref());
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn local_storage() -> Option<web_sys::Storage> {
    web_sys::window()?.local_storage().ok().flatten()
}

#[cfg(target_arch = "wasm32")]
fn load_persisted_session() -> Option<Session> {
    let raw = local_storage()?.get_item(SESSION_STORAGE_KEY).ok().flatten()?;
    match serde_json::from_str(&raw) {
        Ok(session) => Some(session),
        Err(e) => {
            log::warn!("Discarding unreadable persisted session: {e:?}");
            None
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn persist_session(session: &Session) {
    let Some(storage) = local_storage() else {
        return;
    };
    match serde_json::to_string(session) {
        Ok(raw) => {
            if let Err(e) = storage.set_item(SESSION_STORAGE_KEY, &raw) {
                log::warn!("Failed to persist session: {e:?}");
            }
        }
        Err(e) => log::warn!("Failed to serialize session: {e:?}"),
    }
}

#[cfg(target_arch = "wasm32")]
fn clear_persisted_session() {
    let Some(storage) = local_storage() else {
        return;
    };
    if let Err(e) = storage.remove_item(SESSION_STORAGE_KEY) {
        log::warn!("Failed to clear persisted session: {e:?}");
    }
}

// The mirror is memory-only off the web target.
#[cfg(not(target_arch = "wasm32"))]
fn load_persisted_session() -> Option<Session> {
    None
}

#[cfg(not(target_arch = "wasm32"))]
fn persist_session(_session: &Session) {}

#[cfg(not(target_arch = "wasm32"))]
fn clear_persisted_session() {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn test_config() -> SupabaseConfig {
        SupabaseConfig {
            supabase_url: "https://example.supabase.co".to_string(),
            supabase_anon_key: "anon-key".to_string(),
        }
    }

    fn session_expiring_at(expires_at: i64) -> Session {
        Session {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at,
            user: AuthUser {
                id: "user-1".to_string(),
                email: Some("user@example.com".to_string()),
            },
        }
    }

    #[test]
    fn test_session_expiry_respects_margin() {
        let now = chrono::Utc::now();
        // Well within the deadline
        assert!(!session_expiring_at(now.timestamp() + 3600).is_expired(now));
        // Inside the safety margin counts as expired
        assert!(session_expiring_at(now.timestamp() + 30).is_expired(now));
        // Long past the deadline
        assert!(session_expiring_at(now.timestamp() - 100).is_expired(now));
    }

    #[test]
    fn test_token_response_falls_back_to_expires_in() {
        let now = chrono::Utc::now();
        let token = TokenResponse {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_in: 3600,
            expires_at: None,
            user: AuthUser {
                id: "user-1".to_string(),
                email: None,
            },
        };
        let session = token.into_session(now);
        assert_eq!(session.expires_at, now.timestamp() + 3600);
    }

    #[test]
    fn test_session_round_trips_through_serde() {
        let session = session_expiring_at(4_102_444_800);
        let raw = serde_json::to_string(&session).unwrap();
        let restored: Session = serde_json::from_str(&raw).unwrap();
        assert_eq!(session, restored);
    }

    #[test]
    fn test_signup_response_with_session() {
        let raw = r#"{
            "access_token": "access",
            "refresh_token": "refresh",
            "expires_in": 3600,
            "expires_at": 4102444800,
            "user": { "id": "user-1", "email": "user@example.com" }
        }"#;
        match serde_json::from_str::<SignUpResponse>(raw).unwrap() {
            SignUpResponse::Session(token) => assert_eq!(token.access_token, "access"),
            SignUpResponse::User(_) => panic!("expected the session shape"),
        }
    }

    #[test]
    fn test_signup_response_with_pending_confirmation() {
        let raw = r#"{ "id": "user-1", "email": "user@example.com" }"#;
        match serde_json::from_str::<SignUpResponse>(raw).unwrap() {
            SignUpResponse::User(user) => assert_eq!(user.id, "user-1"),
            SignUpResponse::Session(_) => panic!("expected the bare-user shape"),
        }
    }

    #[test]
    fn test_listeners_fire_on_session_change() {
        let client = AuthClient::new(test_config());
        let seen: Rc<RefCell<Vec<Option<String>>>> = Rc::new(RefCell::new(Vec::new()));

        let seen_by_listener = Rc::clone(&seen);
        let key = client.on_auth_change(move |session| {
            seen_by_listener
                .borrow_mut()
                .push(session.map(|s| s.access_token.clone()));
        });

        client.replace_session(Some(session_expiring_at(4_102_444_800)));
        client.replace_session(None);
        assert_eq!(
            *seen.borrow(),
            vec![Some("access".to_string()), None]
        );

        client.unsubscribe(key);
        client.replace_session(Some(session_expiring_at(4_102_444_800)));
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn test_bearer_token_falls_back_to_anon_key() {
        let client = AuthClient::new(test_config());
        assert_eq!(client.bearer_token(), "anon-key");

        client.replace_session(Some(session_expiring_at(4_102_444_800)));
        assert_eq!(client.bearer_token(), "access");
    }
}
