//! The media feed: list, publish, delete.

use serde::{Deserialize, Serialize};
use wasm_bindgen::JsValue;
use wasm_bindgen::prelude::wasm_bindgen;

use crate::Gearfeed;
use crate::utils;

pub(crate) const SOCIAL_BUCKET: &str = "social";
pub(crate) const POSTS_TABLE: &str = "posts";

const POST_COLUMNS: &str = "id,user_id,media_url,media_type,created_at,profiles(username,avatar_url)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Image,
    Video,
}

#[derive(Debug, Clone, Serialize, Deserialize, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct PostAuthor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub media_url: String,
    pub media_type: MediaType,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profiles: Option<PostAuthor>,
}

#[derive(Serialize)]
struct NewPost<'a> {
    user_id: &'a str,
    media_url: &'a str,
    media_type: MediaType,
}

pub(crate) fn media_type_for(content_type: Option<&str>) -> MediaType {
    match content_type {
        Some(content_type) if content_type.starts_with("video") => MediaType::Video,
        _ => MediaType::Image,
    }
}

/// File extension for an upload: the picked file's own extension wins, then
/// the content type decides between the two media kinds.
pub(crate) fn extension_for(file_name: Option<&str>, content_type: Option<&str>) -> String {
    if let Some((_, ext)) = file_name.and_then(|name| name.rsplit_once('.')) {
        if !ext.is_empty() {
            return ext.to_ascii_lowercase();
        }
    }
    match content_type {
        Some(content_type) if content_type.contains("video") => "mp4".to_string(),
        _ => "jpg".to_string(),
    }
}

/// Storage path of a post's object, recovered from its public URL: owner id
/// plus the last path segment with any query string stripped.
pub(crate) fn object_path_for(media_url: &str, user_id: &str) -> String {
    let file_name = media_url
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .split('?')
        .next()
        .unwrap_or_default();
    format!("{user_id}/{file_name}")
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
impl Gearfeed {
    /// Newest-first feed across all users, with each author's profile joined
    /// in. The answer replaces the shell's list wholesale.
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub async fn fetch_posts(
        &self,
        abort_signal: Option<web_sys::AbortSignal>,
    ) -> Result<JsValue, JsValue> {
        let posts: Vec<Post> = turnstile::postgrest::TableQuery::new(
            self.config(),
            self.auth().bearer_token(),
            POSTS_TABLE,
        )
        .select(POST_COLUMNS)
        .order_desc("created_at")
        .fetch()
        .await
        .map_err(|e| JsValue::from_str(&format!("Failed to load posts: {e}")))?;

        // A dismissed screen's answer is dropped, not delivered
        if let Some(ref signal) = abort_signal {
            if signal.aborted() {
                return Ok(JsValue::NULL);
            }
        }

        serde_wasm_bindgen::to_value(&posts)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {e:?}")))
    }

    /// Publish one picked media item: upload the object, then insert the row
    /// pointing at its public URL. The two steps are independent service
    /// calls; a failed insert leaves the uploaded object behind.
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub async fn upload_post(
        &self,
        bytes: Vec<u8>,
        content_type: Option<String>,
        file_name: Option<String>,
    ) -> Result<(), JsValue> {
        let user = self
            .auth()
            .current_user()
            .ok_or_else(|| JsValue::from_str("Please login to upload"))?;

        let media_type = media_type_for(content_type.as_deref());
        let ext = extension_for(file_name.as_deref(), content_type.as_deref());
        let path = format!("{}/{}.{ext}", user.id, utils::unique_media_stem());
        let content_type = content_type.unwrap_or_else(|| "image/jpeg".to_string());

        turnstile::storage::upload_object(
            self.config(),
            &self.auth().bearer_token(),
            SOCIAL_BUCKET,
            &path,
            bytes,
            &content_type,
        )
        .await
        .map_err(|e| JsValue::from_str(&format!("Upload failed: {e}")))?;

        let media_url = turnstile::storage::public_url(self.config(), SOCIAL_BUCKET, &path);
        let row = NewPost {
            user_id: &user.id,
            media_url: &media_url,
            media_type,
        };
        turnstile::postgrest::insert(
            self.config(),
            &self.auth().bearer_token(),
            POSTS_TABLE,
            &row,
        )
        .await
        .map_err(|e| JsValue::from_str(&format!("Upload failed: {e}")))?;

        Ok(())
    }

    /// Remove a post's stored object and its row. A failed object removal is
    /// logged and the row delete still runs (the old client behaved the same
    /// way); a failed row delete is the operation's error, and the post shows
    /// up again on the next fetch.
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub async fn delete_post(
        &self,
        post_id: String,
        media_url: String,
        user_id: String,
    ) -> Result<(), JsValue> {
        let path = object_path_for(&media_url, &user_id);
        if let Err(e) = turnstile::storage::remove_objects(
            self.config(),
            &self.auth().bearer_token(),
            SOCIAL_BUCKET,
            &[path],
        )
        .await
        {
            log::warn!("Failed to remove stored media for post {post_id}: {e}");
        }

        turnstile::postgrest::delete_eq(
            self.config(),
            &self.auth().bearer_token(),
            POSTS_TABLE,
            "id",
            &post_id,
        )
        .await
        .map_err(|e| JsValue::from_str(&format!("Failed to delete: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_path_from_public_url() {
        let media_url =
            "https://example.supabase.co/storage/v1/object/public/social/u1/42_abc.jpg";
        assert_eq!(object_path_for(media_url, "u1"), "u1/42_abc.jpg");
    }

    #[test]
    fn test_object_path_strips_query_string() {
        let media_url =
            "https://example.supabase.co/storage/v1/object/public/social/u1/42_abc.jpg?token=sig";
        assert_eq!(object_path_for(media_url, "u1"), "u1/42_abc.jpg");
    }

    #[test]
    fn test_extension_prefers_file_name() {
        assert_eq!(
            extension_for(Some("clip.MOV"), Some("video/quicktime")),
            "mov"
        );
        assert_eq!(extension_for(Some("photo.png"), None), "png");
    }

    #[test]
    fn test_extension_falls_back_to_content_type() {
        assert_eq!(extension_for(None, Some("video/mp4")), "mp4");
        assert_eq!(extension_for(None, Some("image/png")), "jpg");
        assert_eq!(extension_for(Some("noext"), Some("video/mp4")), "mp4");
    }

    #[test]
    fn test_extension_defaults_to_jpg() {
        assert_eq!(extension_for(None, None), "jpg");
    }

    #[test]
    fn test_media_type_from_content_type() {
        assert_eq!(media_type_for(Some("video/mp4")), MediaType::Video);
        assert_eq!(media_type_for(Some("image/png")), MediaType::Image);
        assert_eq!(media_type_for(None), MediaType::Image);
    }

    #[test]
    fn test_media_type_serializes_to_column_values() {
        assert_eq!(
            serde_json::to_string(&MediaType::Image).unwrap(),
            r#""image""#
        );
        assert_eq!(
            serde_json::to_string(&MediaType::Video).unwrap(),
            r#""video""#
        );
    }
}
