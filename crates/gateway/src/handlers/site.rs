//! Site presentation settings

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;
use scholarpress_common::errors::Result;

#[derive(Debug, Default, Serialize)]
pub struct SiteConfigResponse {
    pub logo_url: Option<String>,
    pub footer_text: Option<String>,
}

/// Logo and footer; empty when the site has not been configured
pub async fn site_config(State(state): State<AppState>) -> Result<Json<SiteConfigResponse>> {
    let response = state
        .repo
        .site_config()
        .await?
        .map(|row| SiteConfigResponse {
            logo_url: row.logo_url,
            footer_text: row.footer_text,
        })
        .unwrap_or_default();

    Ok(Json(response))
}
