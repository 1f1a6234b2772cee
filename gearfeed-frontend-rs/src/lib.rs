#![deny(clippy::string_slice)]

//! App core for the Gearfeed client. The hosted service owns authentication,
//! the relational rows and the stored media; this crate owns the durable
//! login flags, keeps them reconciled with the issued session, decides which
//! screen group the shell shows, and performs the feed and profile calls.
//! The rendering shell talks to one `Gearfeed` instance through wasm-bindgen.

mod auth_state;
mod feed;
mod profile;
mod router;
mod session_sync;
mod supabase;
mod utils;

pub use auth_state::AuthState;
pub use feed::{MediaType, Post, PostAuthor};
pub use profile::{OwnPost, ProfileRow, ProfileView};
pub use router::{MainScreen, Route, RouteGroup};

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::LazyLock;

use slotmap::Key;
use turnstile::auth::{AuthChangeKey, AuthClient};
use wasm_bindgen::prelude::*;

use crate::auth_state::{AuthStore, StateSubscriberKey};
use crate::session_sync::{SESSION_REFRESH_INTERVAL_MS, reconcile};

// putting this inside LOGGER prevents us from accidentally initializing the logger more than once
#[allow(clippy::declare_interior_mutable_const)]
const LOGGER: LazyLock<()> = LazyLock::new(|| {
    utils::set_panic_hook();

    wasm_logger::init(wasm_logger::Config::default());
    log::info!("Logging initialized");
});

#[wasm_bindgen]
pub struct Gearfeed {
    auth: Rc<AuthClient>,
    store: Rc<AuthStore>,
    session_listener: RefCell<Option<AuthChangeKey>>,
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
impl Gearfeed {
    /// Loads the durable flags before anything can read them, so there is no
    /// window where the shell would act on made-up defaults.
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen(constructor))]
    pub fn new() -> Self {
        // used to only initialize the logger once
        #[allow(clippy::borrow_interior_mutable_const)]
        *LOGGER;

        Self {
            auth: Rc::new(AuthClient::new(supabase::supabase_config())),
            store: Rc::new(AuthStore::load()),
            session_listener: RefCell::new(None),
        }
    }

    /// One startup pass: ask the service for the current session, fold the
    /// answer into the durable flags, then stay subscribed to session
    /// changes. Call [`Gearfeed::teardown`] when the shell unmounts.
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub async fn initialize_session(&self) {
        let session = self.auth.get_session().await;

        // A change notification may have landed while the fetch was in
        // flight; both paths apply the same idempotent rule, so the last
        // writer wins either way.
        self.store.update(|state| reconcile(state, session.as_ref()));

        let store = Rc::clone(&self.store);
        let key = self.auth.on_auth_change(move |session| {
            store.update(|state| reconcile(state, session));
        });
        if let Some(previous) = self.session_listener.borrow_mut().replace(key) {
            self.auth.unsubscribe(previous);
        }
    }

    /// Releases the session-change subscription acquired by
    /// [`Gearfeed::initialize_session`]. Safe to call more than once.
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn teardown(&self) {
        if let Some(key) = self.session_listener.borrow_mut().take() {
            self.auth.unsubscribe(key);
        }
    }

    /// Long-running proactive token refresh. Returns only once the abort
    /// signal fires: start it at mount without awaiting, abort at unmount.
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub async fn run_session_refresh(&self, abort_signal: Option<web_sys::AbortSignal>) {
        loop {
            utils::sleep_ms(SESSION_REFRESH_INTERVAL_MS).await;

            if let Some(ref signal) = abort_signal {
                if signal.aborted() {
                    return;
                }
            }

            match self.auth.refresh_session().await {
                Ok(session) => self.store.update(|state| reconcile(state, Some(&session))),
                Err(e) => {
                    log::warn!("Scheduled session refresh failed: {e}");
                    self.store.update(|state| reconcile(state, None));
                }
            }
        }
    }

    /// Password sign-in. The session lands in the durable flags before this
    /// returns, so the next route read already answers the main group.
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub async fn sign_in(&self, email: String, password: String) -> Result<(), JsValue> {
        let session = self
            .auth
            .sign_in_with_password(&email, &password)
            .await
            .map_err(|e| JsValue::from_str(&format!("{e}")))?;
        self.store.update(|state| reconcile(state, Some(&session)));
        Ok(())
    }

    /// Create the account, then its profile row. The profile insert is a
    /// second independent call: when it fails the auth user still exists and
    /// the failure is the operation's outcome.
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub async fn sign_up(
        &self,
        name: String,
        email: String,
        password: String,
    ) -> Result<(), JsValue> {
        let user = self
            .auth
            .sign_up(email.trim(), &password)
            .await
            .map_err(|e| JsValue::from_str(&format!("{e}")))?;

        let row = profile::NewProfile {
            id: &user.id,
            username: name.trim(),
            email: email.trim(),
        };
        turnstile::postgrest::insert(
            self.config(),
            &self.auth.bearer_token(),
            profile::PROFILES_TABLE,
            &row,
        )
        .await
        .map_err(|e| JsValue::from_str(&format!("{e}")))?;
        Ok(())
    }

    /// Ends the session remotely (best effort) and locally.
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub async fn sign_out(&self) {
        self.auth.sign_out().await;
        self.store.update(|state| reconcile(state, None));
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn state(&self) -> AuthState {
        self.store.snapshot()
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn is_logged_in(&self) -> bool {
        self.store.snapshot().is_logged_in
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn current_route(&self) -> Route {
        router::route_for(&self.store.snapshot())
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn set_locale(&self, locale: String) {
        self.store.update(|state| state.set_locale(locale));
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn set_onboarding(&self, onboarding: bool) {
        self.store.update(|state| state.set_onboarding(onboarding));
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn set_guest(&self, guest: bool) {
        self.store.update(|state| state.set_guest(guest));
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn set_role(&self, role: Option<String>) {
        self.store.update(|state| state.set_role(role));
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn clear_auth(&self) {
        self.store.update(|state| state.clear_auth());
    }

    /// The shell re-reads `state`/`current_route` whenever the callback
    /// fires; the whole screen group is swapped when the group changed.
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn subscribe(&self, callback: js_sys::Function) -> u64 {
        self.store.subscribe(callback).data().as_ffi()
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn unsubscribe(&self, key: u64) {
        self.store
            .unsubscribe(StateSubscriberKey::from(slotmap::KeyData::from_ffi(key)));
    }
}

impl Gearfeed {
    pub(crate) fn auth(&self) -> &AuthClient {
        &self.auth
    }

    pub(crate) fn config(&self) -> &turnstile::SupabaseConfig {
        self.auth.config()
    }
}
