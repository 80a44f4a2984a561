//! Connection negotiation and hub URL handling.

use reqwest::Url;

use crate::{error::ClientError, infrastructure::dto::hub::NegotiateResponse};

/// Redirects followed before giving up
const MAX_NEGOTIATE_REDIRECTS: usize = 100;

/// Where to open the transport after negotiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedEndpoint {
    pub url: Url,
    pub access_token: Option<String>,
}

pub fn parse_hub_url(hub_url: &str) -> Result<Url, ClientError> {
    Url::parse(hub_url).map_err(|e| {
        ClientError::ConnectionEstablishment(format!("invalid hub url '{}': {}", hub_url, e))
    })
}

/// `{hub}/negotiate?negotiateVersion=1`, keeping any query the hub URL already has
pub fn negotiate_url(hub_url: &Url) -> Url {
    let mut url = hub_url.clone();
    let path = format!("{}/negotiate", url.path().trim_end_matches('/'));
    url.set_path(&path);
    url.query_pairs_mut().append_pair("negotiateVersion", "1");
    url
}

/// Switch `http`/`https` to `ws`/`wss`.
pub fn to_websocket_url(mut url: Url) -> Result<Url, ClientError> {
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(ClientError::ConnectionEstablishment(format!(
                "unsupported hub url scheme '{}'",
                other
            )));
        }
    };
    url.set_scheme(scheme).map_err(|_| {
        ClientError::ConnectionEstablishment(format!("cannot use scheme '{}' for {}", scheme, url))
    })?;
    Ok(url)
}

/// Ask the hub for a connection id, following redirects.
pub async fn negotiate(
    http: &reqwest::Client,
    hub_url: &str,
) -> Result<NegotiatedEndpoint, ClientError> {
    let mut url = parse_hub_url(hub_url)?;
    let mut access_token: Option<String> = None;

    for _ in 0..MAX_NEGOTIATE_REDIRECTS {
        let mut request = http.post(negotiate_url(&url));
        if let Some(token) = &access_token {
            request = request.bearer_auth(token);
        }

        tracing::debug!("Negotiating with {}", url);
        let mut response: NegotiateResponse = request
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| ClientError::ConnectionEstablishment(format!("negotiate failed: {}", e)))?
            .json()
            .await
            .map_err(|e| {
                ClientError::ConnectionEstablishment(format!("invalid negotiate response: {}", e))
            })?;

        if let Some(error) = response.error.take() {
            return Err(ClientError::ConnectionEstablishment(format!(
                "hub refused negotiation: {}",
                error
            )));
        }

        if let Some(redirect) = response.url.take() {
            tracing::debug!("Negotiate redirected to {}", redirect);
            url = parse_hub_url(&redirect)?;
            access_token = response.access_token.take();
            continue;
        }

        if !response.supports_websockets() {
            return Err(ClientError::ConnectionEstablishment(
                "hub does not offer the WebSockets transport".to_string(),
            ));
        }

        if let Some(id) = response.connection_id_for_transport() {
            url.query_pairs_mut().append_pair("id", id);
        }
        return Ok(NegotiatedEndpoint { url, access_token });
    }

    Err(ClientError::ConnectionEstablishment(format!(
        "negotiate exceeded {} redirects",
        MAX_NEGOTIATE_REDIRECTS
    )))
}
