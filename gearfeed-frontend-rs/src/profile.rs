//! The signed-in user's profile and their own posts.

use serde::{Deserialize, Serialize};
use wasm_bindgen::JsValue;
use wasm_bindgen::prelude::wasm_bindgen;

use crate::Gearfeed;
use crate::feed::{MediaType, POSTS_TABLE};

pub(crate) const PROFILES_TABLE: &str = "profiles";

#[derive(Debug, Clone, Serialize, Deserialize, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct ProfileRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct OwnPost {
    pub id: String,
    pub media_url: String,
    pub media_type: MediaType,
    pub created_at: String,
}

/// Everything the profile screen shows, fetched in one pass.
#[derive(Debug, Clone, Serialize, Deserialize, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct ProfileView {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Absent when the user never finished setting up a profile row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileRow>,
    pub posts: Vec<OwnPost>,
}

#[derive(Serialize)]
pub(crate) struct NewProfile<'a> {
    pub(crate) id: &'a str,
    pub(crate) username: &'a str,
    pub(crate) email: &'a str,
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
impl Gearfeed {
    /// The current user's profile row and posts. A missing profile row is an
    /// ordinary answer; failing to load it at all is only logged, matching
    /// how tolerant the old client was here.
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub async fn fetch_profile(
        &self,
        abort_signal: Option<web_sys::AbortSignal>,
    ) -> Result<JsValue, JsValue> {
        let user = self
            .auth()
            .current_user()
            .ok_or_else(|| JsValue::from_str("Not signed in"))?;

        let profile = match turnstile::postgrest::TableQuery::new(
            self.config(),
            self.auth().bearer_token(),
            PROFILES_TABLE,
        )
        .select("username,avatar_url")
        .eq("id", &user.id)
        .fetch_optional::<ProfileRow>()
        .await
        {
            Ok(profile) => profile,
            Err(e) => {
                log::warn!("Failed to load profile row: {e}");
                None
            }
        };

        let posts: Vec<OwnPost> = turnstile::postgrest::TableQuery::new(
            self.config(),
            self.auth().bearer_token(),
            POSTS_TABLE,
        )
        .select("id,media_url,media_type,created_at")
        .eq("user_id", &user.id)
        .order_desc("created_at")
        .fetch()
        .await
        .map_err(|e| JsValue::from_str(&format!("Failed to load profile: {e}")))?;

        if let Some(ref signal) = abort_signal {
            if signal.aborted() {
                return Ok(JsValue::NULL);
            }
        }

        let view = ProfileView {
            user_id: user.id,
            email: user.email,
            profile,
            posts,
        };
        serde_wasm_bindgen::to_value(&view)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {e:?}")))
    }
}
