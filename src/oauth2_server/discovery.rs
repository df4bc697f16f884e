// ABOUTME: OpenID Connect discovery document
// ABOUTME: Static metadata with endpoint URLs derived from the public base URL
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use super::models::OAuth2Error;
use crate::constants::oauth::{
    client_auth_methods, grant_types, response_types, scopes, PKCE_METHOD_S256, SIGNING_ALGORITHM,
};
use serde::{Deserialize, Serialize};
use url::Url;

/// OpenID Provider Metadata (OpenID Connect Discovery 1.0, section 3)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenIdConfiguration {
    /// Issuer identifier, equal to the `iss` claim
    pub issuer: String,
    /// `/authorize`
    pub authorization_endpoint: String,
    /// `/token`
    pub token_endpoint: String,
    /// `/userinfo`
    pub userinfo_endpoint: String,
    /// `/.well-known/jwks.json`
    pub jwks_uri: String,
    /// Supported scopes
    pub scopes_supported: Vec<String>,
    /// Supported response types
    pub response_types_supported: Vec<String>,
    /// Supported grant types
    pub grant_types_supported: Vec<String>,
    /// Subject identifier types
    pub subject_types_supported: Vec<String>,
    /// ID token signing algorithms
    pub id_token_signing_alg_values_supported: Vec<String>,
    /// Token endpoint client authentication methods
    pub token_endpoint_auth_methods_supported: Vec<String>,
    /// PKCE methods
    pub code_challenge_methods_supported: Vec<String>,
    /// Claims `/userinfo` and ID tokens may carry
    pub claims_supported: Vec<String>,
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_owned()).collect()
}

/// Build the discovery document for `base_url`
///
/// # Errors
///
/// `invalid_request` when `base_url` is not an absolute http(s) URL
pub fn openid_configuration(
    issuer: &str,
    base_url: &str,
) -> Result<OpenIdConfiguration, OAuth2Error> {
    let parsed = Url::parse(base_url)
        .map_err(|_| OAuth2Error::invalid_request("base_url must be an absolute URL"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(OAuth2Error::invalid_request("base_url must use http or https"));
    }
    let base = base_url.trim_end_matches('/');

    Ok(OpenIdConfiguration {
        issuer: issuer.to_owned(),
        authorization_endpoint: format!("{base}/authorize"),
        token_endpoint: format!("{base}/token"),
        userinfo_endpoint: format!("{base}/userinfo"),
        jwks_uri: format!("{base}/.well-known/jwks.json"),
        scopes_supported: owned(scopes::SUPPORTED),
        response_types_supported: owned(&[response_types::CODE]),
        grant_types_supported: owned(grant_types::SUPPORTED),
        subject_types_supported: owned(&["public"]),
        id_token_signing_alg_values_supported: owned(&[SIGNING_ALGORITHM]),
        token_endpoint_auth_methods_supported: owned(&[
            client_auth_methods::CLIENT_SECRET_BASIC,
            client_auth_methods::CLIENT_SECRET_POST,
            client_auth_methods::NONE,
        ]),
        code_challenge_methods_supported: owned(&[PKCE_METHOD_S256]),
        claims_supported: owned(&[
            "sub",
            "name",
            "username",
            "picture",
            "email",
            "email_verified",
            "phone_number",
        ]),
    })
}
