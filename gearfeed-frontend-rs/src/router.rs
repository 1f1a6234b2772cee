//! Which screen group the shell should be showing. The selection is a pure
//! function of the durable flags: the shell re-reads it whenever the state
//! store notifies, and swaps the whole group when the answer changes.

use serde::{Deserialize, Serialize};

use crate::auth_state::AuthState;

const MECHANIC_ROLE: &str = "mechanic";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "snake_case")]
pub enum RouteGroup {
    /// Sign-in / sign-up stack.
    Auth,
    /// The signed-in screen group.
    Main,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "snake_case")]
pub enum MainScreen {
    MechanicHome,
    Tabs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct Route {
    pub group: RouteGroup,
    /// Landing screen when entering the main group; absent while signed out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landing: Option<MainScreen>,
}

pub(crate) fn route_for(state: &AuthState) -> Route {
    if !state.is_logged_in {
        return Route {
            group: RouteGroup::Auth,
            landing: None,
        };
    }
    let landing = match state.role.as_deref() {
        Some(MECHANIC_ROLE) => MainScreen::MechanicHome,
        _ => MainScreen::Tabs,
    };
    Route {
        group: RouteGroup::Main,
        landing: Some(landing),
    }
}
