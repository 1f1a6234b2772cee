//! Object storage: upload, public URLs, removal.

use crate::{Error, SupabaseConfig};

/// Publicly reachable URL for an object in a public bucket. Pure string
/// assembly; the service serves whatever lives at the path.
pub fn public_url(config: &SupabaseConfig, bucket: &str, path: &str) -> String {
    format!(
        "{}/storage/v1/object/public/{bucket}/{path}",
        config.supabase_url
    )
}

/// Uploads one object as a raw request body. Goes through the browser fetch
/// directly: the JSON-oriented client has no raw-body surface.
#[cfg(target_arch = "wasm32")]
pub async fn upload_object(
    config: &SupabaseConfig,
    bearer_token: &str,
    bucket: &str,
    path: &str,
    bytes: Vec<u8>,
    content_type: &str,
) -> Result<(), Error> {
    use wasm_bindgen::JsCast;

    let url = format!("{}/storage/v1/object/{bucket}/{path}", config.supabase_url);

    let headers = web_sys::Headers::new().map_err(|e| Error::Request(format!("{e:?}")))?;
    headers
        .append("apikey", &config.supabase_anon_key)
        .map_err(|e| Error::Request(format!("{e:?}")))?;
    headers
        .append("Authorization", &format!("Bearer {bearer_token}"))
        .map_err(|e| Error::Request(format!("{e:?}")))?;
    headers
        .append("Content-Type", content_type)
        .map_err(|e| Error::Request(format!("{e:?}")))?;

    let body: wasm_bindgen::JsValue = js_sys::Uint8Array::from(bytes.as_slice()).into();
    let init = web_sys::RequestInit::new();
    init.set_method("POST");
    init.set_headers(headers.as_ref());
    init.set_body(&body);

    let request = web_sys::Request::new_with_str_and_init(&url, &init)
        .map_err(|e| Error::Request(format!("{e:?}")))?;
    let window =
        web_sys::window().ok_or_else(|| Error::Request("no window".to_string()))?;
    let response = wasm_bindgen_futures::JsFuture::from(window.fetch_with_request(&request))
        .await
        .map_err(|e| Error::Request(format!("{e:?}")))?;
    let response: web_sys::Response = response
        .dyn_into()
        .map_err(|e| Error::Parse(format!("{e:?}")))?;

    if !response.ok() {
        let body = match response.text() {
            Ok(promise) => wasm_bindgen_futures::JsFuture::from(promise)
                .await
                .ok()
                .and_then(|value| value.as_string())
                .unwrap_or_else(|| "<unreadable body>".to_string()),
            Err(_) => "<unreadable body>".to_string(),
        };
        return Err(Error::Status {
            status: response.status(),
            body,
        });
    }
    Ok(())
}

#[cfg(not(target_arch = "wasm32"))]
pub async fn upload_object(
    _config: &SupabaseConfig,
    _bearer_token: &str,
    _bucket: &str,
    _path: &str,
    _bytes: Vec<u8>,
    _content_type: &str,
) -> Result<(), Error> {
    Err(Error::Request(
        "object upload is only available in the browser runtime".to_string(),
    ))
}

/// Removes the listed object paths from a bucket in one call.
pub async fn remove_objects(
    config: &SupabaseConfig,
    bearer_token: &str,
    bucket: &str,
    paths: &[String],
) -> Result<(), Error> {
    let url = format!("{}/storage/v1/object/{bucket}", config.supabase_url);

    let client = fetch_happen::Client;
    let response = client
        .delete(&url)
        .header("apikey", &config.supabase_anon_key)
        .header("Authorization", format!("Bearer {bearer_token}"))
        .json(&serde_json::json!({ "prefixes": paths }))
        .map_err(|e| Error::Request(format!("{e:?}")))?
        .send()
        .await
        .map_err(|e| Error::Request(format!("{e:?}")))?;

    if !response.ok() {
        return Err(Error::for_status(response).await);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_url_shape() {
        let config = SupabaseConfig {
            supabase_url: "https://example.supabase.co".to_string(),
            supabase_anon_key: "anon-key".to_string(),
        };
        assert_eq!(
            public_url(&config, "social", "u1/42_abc.jpg"),
            "https://example.supabase.co/storage/v1/object/public/social/u1/42_abc.jpg"
        );
    }
}
