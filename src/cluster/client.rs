//! Kubernetes REST client.
//!
//! Implements [`ClusterApi`] over the Kubernetes HTTP API with bearer-token
//! authentication and an optional custom certificate authority.

use async_trait::async_trait;
use reqwest::{Certificate, Client, Method, RequestBuilder, StatusCode, header};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::config::ClusterConfig;
use crate::error::{ClusterError, Result};
use crate::manifest::ResourceKind;

use super::api::ClusterApi;

/// Content type for JSON merge patches.
const MERGE_PATCH_CONTENT_TYPE: &str = "application/merge-patch+json";

/// User agent sent with every request.
const USER_AGENT: &str = concat!("kube-deploy/", env!("CARGO_PKG_VERSION"));

/// Kubernetes API client.
#[derive(Clone)]
pub struct KubeClient {
    /// HTTP client.
    client: Client,
    /// API server base URL, without trailing slash.
    server: String,
    /// Bearer token.
    token: String,
}

impl std::fmt::Debug for KubeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClient")
            .field("server", &self.server)
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

/// The `Status` object returned with API failures.
#[derive(Debug, Default, Deserialize)]
struct Status {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    message: String,
}

/// Identity of the object a request addresses, for error reporting.
struct Target<'a> {
    kind: ResourceKind,
    name: &'a str,
    namespace: &'a str,
}

impl KubeClient {
    /// Creates a client for `server`.
    ///
    /// `ca_pem` is an optional PEM certificate added to the trust roots.
    ///
    /// # Errors
    ///
    /// Returns an error if the certificate is unusable or the HTTP client
    /// cannot be created.
    pub fn new(
        server: &str,
        token: &str,
        ca_pem: Option<&[u8]>,
    ) -> std::result::Result<Self, ClusterError> {
        let mut builder = Client::builder().use_rustls_tls().user_agent(USER_AGENT);

        if let Some(pem) = ca_pem {
            let certificate = Certificate::from_pem(pem).map_err(|e| {
                ClusterError::network(format!("Invalid cluster CA certificate: {e}"))
            })?;
            builder = builder.add_root_certificate(certificate);
        }

        let client = builder
            .build()
            .map_err(|e| ClusterError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            server: server.trim().trim_end_matches('/').to_string(),
            token: token.trim().to_string(),
        })
    }

    /// Creates a client from the cluster section of the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the CA data is not valid base64 or the client
    /// cannot be created.
    pub fn from_config(config: &ClusterConfig) -> Result<Self> {
        let ca_pem = config.ca_pem()?;
        Ok(Self::new(&config.server, &config.token, ca_pem.as_deref())?)
    }

    /// Returns the API server base URL.
    #[must_use]
    pub fn server(&self) -> &str {
        &self.server
    }

    fn collection_url(&self, kind: ResourceKind, namespace: &str) -> String {
        format!(
            "{}{}/namespaces/{}/{}",
            self.server,
            kind.api_prefix(),
            namespace,
            kind.plural()
        )
    }

    fn object_url(&self, kind: ResourceKind, namespace: &str, name: &str) -> String {
        format!("{}/{}", self.collection_url(kind, namespace), name)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        trace!("{method} {url}");
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header(header::ACCEPT, "application/json")
    }

    /// Sends a request and decodes the returned object.
    async fn send(
        &self,
        request: RequestBuilder,
        target: Target<'_>,
    ) -> std::result::Result<Value, ClusterError> {
        let response = request
            .send()
            .await
            .map_err(|e| ClusterError::network(format!("Request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<Value>()
                .await
                .map_err(|e| ClusterError::InvalidResponse {
                    message: format!("Failed to parse response: {e}"),
                });
        }

        let body = response.text().await.unwrap_or_default();
        let details = serde_json::from_str::<Status>(&body).unwrap_or_else(|_| Status {
            reason: String::new(),
            message: body,
        });

        Err(match status {
            StatusCode::NOT_FOUND => ClusterError::NotFound {
                kind: target.kind,
                name: target.name.to_string(),
                namespace: target.namespace.to_string(),
            },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClusterError::Unauthorized {
                status: status.as_u16(),
                message: details.message,
            },
            _ => ClusterError::Api {
                status: status.as_u16(),
                reason: details.reason,
                message: details.message,
            },
        })
    }
}

/// Reads `metadata.name` from an object.
fn object_name(object: &Value) -> std::result::Result<&str, ClusterError> {
    object
        .pointer("/metadata/name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ClusterError::InvalidRequest {
            message: String::from("object has no metadata.name"),
        })
}

#[async_trait]
impl ClusterApi for KubeClient {
    async fn get(
        &self,
        kind: ResourceKind,
        name: &str,
        namespace: &str,
    ) -> std::result::Result<Value, ClusterError> {
        debug!("Looking up {kind} '{namespace}/{name}'");
        let url = self.object_url(kind, namespace, name);
        self.send(
            self.request(Method::GET, &url),
            Target {
                kind,
                name,
                namespace,
            },
        )
        .await
    }

    async fn create(
        &self,
        kind: ResourceKind,
        namespace: &str,
        object: &Value,
    ) -> std::result::Result<Value, ClusterError> {
        let name = object
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let url = self.collection_url(kind, namespace);
        self.send(
            self.request(Method::POST, &url).json(object),
            Target {
                kind,
                name,
                namespace,
            },
        )
        .await
    }

    async fn update(
        &self,
        kind: ResourceKind,
        namespace: &str,
        object: &Value,
    ) -> std::result::Result<Value, ClusterError> {
        let name = object_name(object)?;
        let url = self.object_url(kind, namespace, name);
        self.send(
            self.request(Method::PUT, &url).json(object),
            Target {
                kind,
                name,
                namespace,
            },
        )
        .await
    }

    async fn patch(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        patch: &[u8],
    ) -> std::result::Result<Value, ClusterError> {
        if name.is_empty() {
            return Err(ClusterError::InvalidRequest {
                message: String::from("patch target has no name"),
            });
        }

        let url = self.object_url(kind, namespace, name);
        self.send(
            self.request(Method::PATCH, &url)
                .header(header::CONTENT_TYPE, MERGE_PATCH_CONTENT_TYPE)
                .body(patch.to_vec()),
            Target {
                kind,
                name,
                namespace,
            },
        )
        .await
    }
}
