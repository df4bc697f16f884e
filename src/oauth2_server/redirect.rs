// ABOUTME: Builds client redirect URLs carrying code or error parameters and state
// ABOUTME: Keeps any query the registered URI already has and omits state when absent
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use url::Url;

/// Append `params` (and `state`, when present) to `redirect_uri`
///
/// Returns `None` when `redirect_uri` is not an absolute URL. `state` is
/// echoed verbatim; an absent state produces no `state` parameter at all.
#[must_use]
pub fn build_redirect(
    redirect_uri: &str,
    params: &[(&str, &str)],
    state: Option<&str>,
) -> Option<String> {
    let mut url = Url::parse(redirect_uri).ok()?;
    {
        let mut query = url.query_pairs_mut();
        for (name, value) in params {
            query.append_pair(name, value);
        }
        if let Some(state) = state {
            query.append_pair("state", state);
        }
    }
    Some(url.into())
}
