pub fn set_panic_hook() {
    // When the `console_error_panic_hook` feature is enabled, we can call the
    // `set_panic_hook` function at least once during initialization, and then
    // we will get better error messages if our code ever panics.
    //
    // For more details see
    // https://github.com/rustwasm/console_error_panic_hook#readme
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

pub(crate) fn storage_get(key: &str) -> Option<String> {
    let storage = web_sys::window()?.local_storage().ok().flatten()?;
    match storage.get_item(key) {
        Ok(value) => value,
        Err(e) => {
            log::warn!("Failed to read {key} from local storage: {e:?}");
            None
        }
    }
}

pub(crate) fn storage_set(key: &str, value: &str) {
    let Some(storage) = web_sys::window().and_then(|w| w.local_storage().ok().flatten()) else {
        return;
    };
    if let Err(e) = storage.set_item(key, value) {
        log::warn!("Failed to write {key} to local storage: {e:?}");
    }
}

/// Sleep using JavaScript's setTimeout via JsFuture.
pub(crate) async fn sleep_ms(ms: i32) {
    let promise = js_sys::Promise::new(&mut |resolve, _| {
        web_sys::window()
            .unwrap()
            .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms)
            .unwrap();
    });
    let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
}

/// Unique stem for an uploaded object's file name: millisecond timestamp plus
/// a 9-character base-36 suffix, the same shape the old client generated.
pub(crate) fn unique_media_stem() -> String {
    let now_ms = js_sys::Date::now() as u64;
    let mut suffix = String::new();
    for _ in 0..9 {
        let digit = (js_sys::Math::random() * 36.0) as u32 % 36;
        suffix.push(char::from_digit(digit, 36).unwrap_or('0'));
    }
    format!("{now_ms}_{suffix}")
}
