//! Durable login/session flags. The whole record round-trips through one
//! local-storage key, and every mutation goes through a named transition so
//! the flags can never disagree with each other: holding a token always means
//! being signed in, and signing out drops the token and the cached role in
//! the same step.

use std::cell::RefCell;

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::utils;

const AUTH_STATE_STORAGE_KEY: &str = "gearfeed-auth-state";

pub(crate) const DEFAULT_LOCALE: &str = "en";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    pub is_logged_in: bool,
    pub is_onboarding: bool,
    pub is_guest: bool,
    pub token: Option<String>,
    pub locale: String,
    pub role: Option<String>,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            is_logged_in: false,
            is_onboarding: true,
            is_guest: false,
            token: None,
            locale: DEFAULT_LOCALE.to_string(),
            role: None,
        }
    }
}

impl AuthState {
    pub fn set_logged_in(&mut self, logged_in: bool) {
        self.is_logged_in = logged_in;
        if !logged_in {
            self.token = None;
        }
    }

    pub fn set_token(&mut self, token: String) {
        // Holding a token means being signed in; the two flags move together.
        self.token = Some(token);
        self.is_logged_in = true;
    }

    pub fn set_logout(&mut self) {
        self.is_logged_in = false;
        self.is_guest = false;
        self.token = None;
        self.role = None;
    }

    pub fn clear_auth(&mut self) {
        self.is_logged_in = false;
        self.token = None;
        self.role = None;
    }

    pub fn set_locale(&mut self, locale: String) {
        self.locale = locale;
    }

    pub fn set_onboarding(&mut self, onboarding: bool) {
        self.is_onboarding = onboarding;
    }

    pub fn set_guest(&mut self, guest: bool) {
        self.is_guest = guest;
    }

    pub fn set_role(&mut self, role: Option<String>) {
        self.role = role;
    }
}

slotmap::new_key_type! {
    /// Handle for a state-change subscription from the shell.
    pub struct StateSubscriberKey;
}

/// Single owner of the durable flags. Everything — the session synchronizer,
/// the route selection, the screens — reads and writes through here; there
/// are no side-channel key reads.
pub(crate) struct AuthStore {
    state: RefCell<AuthState>,
    subscribers: RefCell<SlotMap<StateSubscriberKey, js_sys::Function>>,
}

impl AuthStore {
    /// Reads the durable copy before any reader can observe the state. A
    /// missing or unreadable record falls back to first-launch defaults.
    pub(crate) fn load() -> Self {
        let state = match utils::storage_get(AUTH_STATE_STORAGE_KEY) {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(state) => state,
                Err(e) => {
                    log::warn!("Discarding unreadable auth state: {e:?}");
                    AuthState::default()
                }
            },
            None => AuthState::default(),
        };
        Self {
            state: RefCell::new(state),
            subscribers: RefCell::new(SlotMap::with_key()),
        }
    }

    pub(crate) fn snapshot(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Applies one transition, writes the record back to durable storage and
    /// tells the shell's subscribers afterwards, in that order — a subscriber
    /// reading back always sees the post-transition state.
    pub(crate) fn update(&self, transition: impl FnOnce(&mut AuthState)) {
        {
            let mut state = self.state.borrow_mut();
            transition(&mut state);
        }
        self.persist();
        self.notify();
    }

    fn persist(&self) {
        match serde_json::to_string(&*self.state.borrow()) {
            Ok(raw) => utils::storage_set(AUTH_STATE_STORAGE_KEY, &raw),
            Err(e) => log::warn!("Failed to serialize auth state: {e:?}"),
        }
    }

    fn notify(&self) {
        let subscribers = self.subscribers.borrow();
        for (_, callback) in subscribers.iter() {
            let this = wasm_bindgen::JsValue::null();
            let _ = callback.call0(&this);
        }
    }

    pub(crate) fn subscribe(&self, callback: js_sys::Function) -> StateSubscriberKey {
        self.subscribers.borrow_mut().insert(callback)
    }

    pub(crate) fn unsubscribe(&self, key: StateSubscriberKey) {
        self.subscribers.borrow_mut().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_in_mechanic() -> AuthState {
        let mut state = AuthState::default();
        state.set_token("tok-1".to_string());
        state.set_role(Some("mechanic".to_string()));
        state.set_guest(true);
        state
    }

    #[test]
    fn test_defaults_match_first_launch() {
        let state = AuthState::default();
        assert!(!state.is_logged_in);
        assert!(state.is_onboarding);
        assert!(!state.is_guest);
        assert_eq!(state.token, None);
        assert_eq!(state.locale, "en");
        assert_eq!(state.role, None);
    }

    #[test]
    fn test_token_always_implies_logged_in() {
        let transitions: Vec<(&str, fn(&mut AuthState))> = vec![
            ("set_token", |s| s.set_token("tok-1".to_string())),
            ("set_logged_in(false)", |s| s.set_logged_in(false)),
            ("set_token again", |s| s.set_token("tok-2".to_string())),
            ("clear_auth", |s| s.clear_auth()),
            ("set_guest", |s| s.set_guest(true)),
            ("set_role", |s| s.set_role(Some("mechanic".to_string()))),
            ("set_token third", |s| s.set_token("tok-3".to_string())),
            ("set_logout", |s| s.set_logout()),
            ("set_locale", |s| s.set_locale("fr".to_string())),
        ];

        let mut state = AuthState::default();
        for (name, transition) in transitions {
            transition(&mut state);
            assert!(
                state.token.is_none() || state.is_logged_in,
                "token held while logged out after {name}"
            );
        }
    }

    #[test]
    fn test_logout_clears_token_role_and_guest() {
        let mut state = signed_in_mechanic();
        state.set_logout();
        assert!(!state.is_logged_in);
        assert!(!state.is_guest);
        assert_eq!(state.token, None);
        assert_eq!(state.role, None);
    }

    #[test]
    fn test_clear_auth_keeps_guest_flag() {
        let mut state = signed_in_mechanic();
        state.clear_auth();
        assert!(!state.is_logged_in);
        assert_eq!(state.token, None);
        assert_eq!(state.role, None);
        // Unlike a full logout, guest browsing survives
        assert!(state.is_guest);
    }

    #[test]
    fn test_locale_always_has_a_value() {
        let mut state = AuthState::default();
        assert_eq!(state.locale, "en");
        state.set_locale("ar".to_string());
        state.set_logout();
        assert_eq!(state.locale, "ar");
    }

    #[test]
    fn test_state_round_trips_through_serde() {
        let mut state = signed_in_mechanic();
        state.set_locale("fr".to_string());
        state.set_onboarding(false);

        let raw = serde_json::to_string(&state).unwrap();
        let restored: AuthState = serde_json::from_str(&raw).unwrap();
        assert_eq!(state, restored);
    }

    #[test]
    fn test_durable_field_names_stay_stable() {
        // The persisted record keeps the key names the old client wrote, so
        // an upgraded install restores its flags instead of resetting them.
        let raw = serde_json::to_string(&AuthState::default()).unwrap();
        for field in [
            "isLoggedIn",
            "isOnboarding",
            "isGuest",
            "token",
            "locale",
            "role",
        ] {
            assert!(raw.contains(field), "missing durable field {field}");
        }
    }
}
