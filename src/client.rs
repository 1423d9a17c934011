//! Analytics Client
//!
//! Authenticated HTTP client for the analytics API. Combines the transport,
//! the token manager, and the flexible response decoders.

use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

use crate::columnar::HistResponse;
use crate::core::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestHttpTransport};
use crate::error::{truncate_body, AnalyticsResult, ConfigurationError, DecodeError, NetworkError};
use crate::flows::ClientCredentialsFlowImpl;
use crate::token::{DefaultTokenManager, FileTokenStorage, TokenManager};
use crate::types::{AnalyticsConfig, HistQuery, Token};

/// Credential applied to a single request.
#[derive(Clone)]
pub enum AuthScheme {
    /// No credential.
    None,
    /// `Authorization: Bearer <token>`.
    Bearer(SecretString),
    /// `Authorization: Basic base64(username:password)`.
    Basic {
        username: String,
        password: SecretString,
    },
    /// Custom header carrying a key.
    ApiKey { header: String, value: SecretString },
}

impl AuthScheme {
    /// Bearer scheme for a token.
    pub fn bearer(token: &Token) -> Self {
        Self::Bearer(SecretString::new(token.secret().to_string()))
    }

    /// Basic scheme.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: SecretString::new(password.into()),
        }
    }

    /// API key scheme.
    pub fn api_key(header: impl Into<String>, value: impl Into<String>) -> Self {
        Self::ApiKey {
            header: header.into(),
            value: SecretString::new(value.into()),
        }
    }

    fn apply(&self, request: HttpRequest) -> HttpRequest {
        match self {
            Self::None => request,
            Self::Bearer(token) => request.with_header(
                "authorization",
                format!("Bearer {}", token.expose_secret()),
            ),
            Self::Basic { username, password } => {
                let credentials = format!("{}:{}", username, password.expose_secret());
                let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
                request.with_header("authorization", format!("Basic {}", encoded))
            }
            Self::ApiKey { header, value } => {
                request.with_header(header.clone(), value.expose_secret().to_string())
            }
        }
    }
}

impl std::fmt::Debug for AuthScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Bearer(_) => write!(f, "Bearer([REDACTED])"),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            Self::ApiKey { header, .. } => f
                .debug_struct("ApiKey")
                .field("header", header)
                .field("value", &"[REDACTED]")
                .finish(),
        }
    }
}

/// Token manager used by [`AnalyticsClient::new`].
pub type DefaultAnalyticsTokenManager =
    DefaultTokenManager<ClientCredentialsFlowImpl<ReqwestHttpTransport>, FileTokenStorage>;

/// Analytics API client.
pub struct AnalyticsClient<
    T: HttpTransport = ReqwestHttpTransport,
    M: TokenManager = DefaultAnalyticsTokenManager,
> {
    config: AnalyticsConfig,
    transport: Arc<T>,
    token_manager: Arc<M>,
}

impl AnalyticsClient<ReqwestHttpTransport, DefaultAnalyticsTokenManager> {
    /// Create a client with the reqwest transport and a file-backed token cache.
    pub fn new(config: AnalyticsConfig) -> AnalyticsResult<Self> {
        let transport = Arc::new(ReqwestHttpTransport::with_options(
            config.timeout,
            config.max_response_bytes,
            config.max_error_body_bytes,
        )?);
        let flow = Arc::new(ClientCredentialsFlowImpl::new(&config, transport.clone()));
        let storage = Arc::new(FileTokenStorage::new(config.token_cache_path.clone()));
        let token_manager = Arc::new(DefaultTokenManager::new(flow, storage));

        Ok(Self {
            config,
            transport,
            token_manager,
        })
    }
}

impl<T: HttpTransport, M: TokenManager> AnalyticsClient<T, M> {
    /// Create a client with custom components.
    pub fn with_components(config: AnalyticsConfig, transport: Arc<T>, token_manager: Arc<M>) -> Self {
        Self {
            config,
            transport,
            token_manager,
        }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn token_manager(&self) -> &Arc<M> {
        &self.token_manager
    }

    /// Bearer scheme from a currently valid token.
    pub async fn bearer_auth(&self) -> AnalyticsResult<AuthScheme> {
        let token = self.token_manager.get_valid_token().await?;
        Ok(AuthScheme::bearer(&token))
    }

    /// Full URL of a named endpoint.
    pub fn endpoint_url(&self, name: &str) -> Result<String, ConfigurationError> {
        self.config.endpoint_url(name)
    }

    /// Send a request with one credential applied.
    ///
    /// A present `body` is sent as JSON. Statuses outside 2xx become
    /// [`NetworkError::UnexpectedStatus`] with a bounded body snippet.
    pub async fn send_authorized(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<&serde_json::Value>,
        auth: &AuthScheme,
    ) -> AnalyticsResult<HttpResponse> {
        let mut request = HttpRequest {
            method,
            url: url.to_string(),
            headers: Default::default(),
            body: None,
            timeout: Some(self.config.timeout),
        };

        if let Some(body) = body {
            let bytes = serde_json::to_vec(body).map_err(DecodeError::from)?;
            request = request
                .with_header("content-type", "application/json")
                .with_body(bytes);
        }

        self.dispatch(auth.apply(request)).await
    }

    /// Issue a bearer-authorized request and decode the JSON body into `R`.
    ///
    /// `query` pairs are set on the URL: a key already present, in the
    /// endpoint or earlier in `query`, is overwritten.
    /// Caller `headers` replace defaults of the same name in any casing,
    /// except `authorization`, which always carries the bearer token.
    pub async fn fetch_typed<R, K, V>(
        &self,
        method: HttpMethod,
        endpoint: &str,
        headers: &[(&str, &str)],
        query: &[(K, V)],
    ) -> AnalyticsResult<R>
    where
        R: DeserializeOwned,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let url = build_url(endpoint, query)?;
        let auth = self.bearer_auth().await?;

        let mut request = HttpRequest {
            method,
            url,
            headers: Default::default(),
            body: None,
            timeout: Some(self.config.timeout),
        }
        .with_header("accept", "application/json");
        for (name, value) in headers {
            request = request.with_header(*name, *value);
        }

        let response = self.dispatch(auth.apply(request)).await?;
        let decoded = serde_json::from_slice(&response.body).map_err(DecodeError::from)?;
        Ok(decoded)
    }

    /// Fetch a named endpoint with a GET.
    pub async fn fetch_endpoint<R: DeserializeOwned>(
        &self,
        name: &str,
        query: &[(&str, &str)],
    ) -> AnalyticsResult<R> {
        let url = self.endpoint_url(name)?;
        self.fetch_typed(HttpMethod::Get, &url, &self.version_header(), query)
            .await
    }

    /// Fetch historical KPI data from the configured endpoint.
    pub async fn fetch_hist_data(&self, query: &HistQuery) -> AnalyticsResult<HistResponse> {
        let endpoint = self.config.hist_endpoint()?;
        let response: HistResponse = self
            .fetch_typed(HttpMethod::Get, endpoint, &self.version_header(), &query.to_params())
            .await?;

        debug!(
            columns = response.configs.len(),
            rows = response.items.len(),
            "Fetched historical data"
        );
        Ok(response)
    }

    fn version_header(&self) -> [(&str, &str); 1] {
        [(
            self.config.api_version_header.as_str(),
            self.config.api_version.as_str(),
        )]
    }

    async fn dispatch(&self, request: HttpRequest) -> AnalyticsResult<HttpResponse> {
        debug!(method = request.method.as_str(), url = %request.url, "Sending request");

        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(NetworkError::UnexpectedStatus {
                status: response.status,
                body: truncate_body(&response.text(), self.config.max_error_body_bytes),
            }
            .into());
        }
        Ok(response)
    }
}

/// Parse `endpoint` and set each query pair on it.
pub fn build_url<K, V>(endpoint: &str, query: &[(K, V)]) -> Result<String, ConfigurationError>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut url = url::Url::parse(endpoint).map_err(|e| ConfigurationError::InvalidEndpoint {
        url: endpoint.to_string(),
        message: e.to_string(),
    })?;

    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    for (key, value) in query {
        let key = key.as_ref();
        pairs.retain(|(existing, _)| existing != key);
        pairs.push((key.to_string(), value.as_ref().to_string()));
    }

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(&pairs);
    }

    Ok(url.to_string())
}
