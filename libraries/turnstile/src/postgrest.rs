//! Minimal table access over the service's REST interface: column selection,
//! equality filters and descending ordering are the only query shapes the
//! app needs, so they are the only ones modeled.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{Error, SupabaseConfig};

pub struct TableQuery<'a> {
    config: &'a SupabaseConfig,
    bearer_token: String,
    table: &'a str,
    select: Option<String>,
    filters: Vec<(String, String)>,
    order_desc: Option<String>,
}

impl<'a> TableQuery<'a> {
    pub fn new(config: &'a SupabaseConfig, bearer_token: String, table: &'a str) -> Self {
        Self {
            config,
            bearer_token,
            table,
            select: None,
            filters: Vec::new(),
            order_desc: None,
        }
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.select = Some(columns.to_string());
        self
    }

    pub fn eq(mut self, column: &str, value: &str) -> Self {
        self.filters.push((column.to_string(), value.to_string()));
        self
    }

    pub fn order_desc(mut self, column: &str) -> Self {
        self.order_desc = Some(column.to_string());
        self
    }

    fn url(&self) -> String {
        let mut params: Vec<String> = Vec::new();
        if let Some(select) = &self.select {
            params.push(format!("select={select}"));
        }
        for (column, value) in &self.filters {
            params.push(format!("{column}=eq.{value}"));
        }
        if let Some(column) = &self.order_desc {
            params.push(format!("order={column}.desc"));
        }

        let base = format!("{}/rest/v1/{}", self.config.supabase_url, self.table);
        if params.is_empty() {
            base
        } else {
            format!("{base}?{}", params.join("&"))
        }
    }

    pub async fn fetch<T: DeserializeOwned>(self) -> Result<Vec<T>, Error> {
        let url = self.url();

        let client = fetch_happen::Client;
        let response = client
            .get(&url)
            .header("apikey", &self.config.supabase_anon_key)
            .header("Authorization", format!("Bearer {}", self.bearer_token))
            .send()
            .await
            .map_err(|e| Error::Request(format!("{e:?}")))?;

        if !response.ok() {
            return Err(Error::for_status(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| Error::Parse(format!("{e:?}")))
    }

    /// First matching row, if any. The row being absent is an ordinary
    /// answer, not an error.
    pub async fn fetch_optional<T: DeserializeOwned>(self) -> Result<Option<T>, Error> {
        let rows: Vec<T> = self.fetch().await?;
        Ok(rows.into_iter().next())
    }
}

pub async fn insert(
    config: &SupabaseConfig,
    bearer_token: &str,
    table: &str,
    row: &impl Serialize,
) -> Result<(), Error> {
    let url = format!("{}/rest/v1/{table}", config.supabase_url);

    let client = fetch_happen::Client;
    let response = client
        .post(&url)
        .header("apikey", &config.supabase_anon_key)
        .header("Authorization", format!("Bearer {bearer_token}"))
        .header("Prefer", "return=minimal".to_string())
        .json(row)
        .map_err(|e| Error::Request(format!("{e:?}")))?
        .send()
        .await
        .map_err(|e| Error::Request(format!("{e:?}")))?;

    if !response.ok() {
        return Err(Error::for_status(response).await);
    }
    Ok(())
}

pub async fn delete_eq(
    config: &SupabaseConfig,
    bearer_token: &str,
    table: &str,
    column: &str,
    value: &str,
) -> Result<(), Error> {
    let url = format!("{}/rest/v1/{table}?{column}=eq.{value}", config.supabase_url);

    let client = fetch_happen::Client;
    let response = client
        .delete(&url)
        .header("apikey", &config.supabase_anon_key)
        .header("Authorization", format!("Bearer {bearer_token}"))
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

    fn test_config() -> SupabaseConfig {
        SupabaseConfig {
            supabase_url: "https://example.supabase.co".to_string(),
            supabase_anon_key: "anon-key".to_string(),
        }
    }

    #[test]
    fn test_query_url_with_select_filter_and_order() {
        let config = test_config();
        let query = TableQuery::new(&config, "token".to_string(), "posts")
            .select("id,user_id,media_url")
            .eq("user_id", "u1")
            .order_desc("created_at");
        assert_eq!(
            query.url(),
            "https://example.supabase.co/rest/v1/posts?select=id,user_id,media_url&user_id=eq.u1&order=created_at.desc"
        );
    }

    #[test]
    fn test_query_url_without_parameters() {
        let config = test_config();
        let query = TableQuery::new(&config, "token".to_string(), "posts");
        assert_eq!(query.url(), "https://example.supabase.co/rest/v1/posts");
    }

    #[test]
    fn test_query_url_with_several_filters() {
        let config = test_config();
        let query = TableQuery::new(&config, "token".to_string(), "profiles")
            .eq("id", "u1")
            .eq("email", "user@example.com");
        assert_eq!(
            query.url(),
            "https://example.supabase.co/rest/v1/profiles?id=eq.u1&email=eq.user@example.com"
        );
    }
}
