//! Client plumbing for the hosted backend service: sessions, table rows and
//! object storage. The service owns all persistence and authorization; this
//! crate only shapes requests and mirrors the session it was issued.

pub mod auth;
pub mod postgrest;
pub mod storage;

#[derive(serde::Serialize, serde::Deserialize, Clone, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct SupabaseConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("request failed: {0}")]
    Request(String),
    #[error("service answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not parse response: {0}")]
    Parse(String),
    #[error("not signed in")]
    NotSignedIn,
}

impl Error {
    pub(crate) async fn for_status(response: fetch_happen::Response) -> Self {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        Error::Status { status, body }
    }
}
