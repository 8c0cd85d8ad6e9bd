//! OpenWhisk REST backend.

use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::ExposeSecret;
use serde_json::{json, Map, Value};
use tracing::{debug, instrument};
use url::Url;

use super::{ActionDeployment, BackendError, DeploymentBackend, EntityReceipt, PackageDeployment};
use crate::config::DeployConfig;
use crate::error::{DeployError, DeployResult};
use crate::manifest::ActionRuntime;
use crate::types::{ActivationId, Parameters, PlatformTarget};

/// Header carrying the correlation id on outgoing calls.
const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest platform diagnostic kept in an error.
const MAX_DIAGNOSTIC_LEN: usize = 512;

/// Manifest limit names and their platform equivalents.
const LIMIT_NAMES: &[(&str, &str)] = &[
    ("timeout", "timeout"),
    ("memorySize", "memory"),
    ("logSize", "logs"),
    ("concurrentActivations", "concurrency"),
];

/// Deploys entities through the OpenWhisk REST API.
#[derive(Debug, Clone)]
pub struct WhiskBackend {
    client: Client,
    namespace: String,
}

impl WhiskBackend {
    /// Create a backend from configuration.
    pub fn new(config: &DeployConfig) -> DeployResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| DeployError::Config(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            namespace: config.namespace.clone(),
        })
    }

    async fn put(
        &self,
        target: &PlatformTarget,
        url: Url,
        body: &Value,
        activation: &ActivationId,
    ) -> Result<EntityReceipt, BackendError> {
        let (user, password) = split_auth(target.auth.expose_secret());
        let response = self
            .client
            .put(url)
            .basic_auth(user, password)
            .header(REQUEST_ID_HEADER, activation.as_str())
            .json(body)
            .send()
            .await?;

        receipt(response).await
    }
}

#[async_trait]
impl DeploymentBackend for WhiskBackend {
    #[instrument(skip_all, fields(package = %package.name))]
    async fn deploy_package(
        &self,
        target: &PlatformTarget,
        package: &PackageDeployment,
        activation: &ActivationId,
    ) -> Result<EntityReceipt, BackendError> {
        let url = entity_url(
            &target.api_host,
            &self.namespace,
            "packages",
            &[package.name.as_str()],
        )?;
        debug!(%url, "putting package");
        self.put(target, url, &package_body(package), activation).await
    }

    #[instrument(skip_all, fields(action = %action.qualified_name()))]
    async fn deploy_action(
        &self,
        target: &PlatformTarget,
        action: &ActionDeployment,
        activation: &ActivationId,
    ) -> Result<EntityReceipt, BackendError> {
        let segments: Vec<&str> = action
            .package
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(action.name.as_str()))
            .collect();
        let url = entity_url(&target.api_host, &self.namespace, "actions", &segments)?;
        debug!(%url, kind = %action.runtime.kind, "putting action");
        self.put(target, url, &action_body(action), activation).await
    }
}

/// Base URL for an API host; hosts without a scheme use `https`.
fn base_url(api_host: &str) -> Result<Url, BackendError> {
    let host = api_host.trim().trim_end_matches('/');
    let candidate = if host.contains("://") {
        host.to_owned()
    } else {
        format!("https://{host}")
    };

    let url = Url::parse(&candidate)
        .map_err(|e| BackendError::InvalidTarget(format!("{host}: {e}")))?;
    if !matches!(url.scheme(), "https" | "http") || url.host_str().is_none() {
        return Err(BackendError::InvalidTarget(host.to_owned()));
    }
    Ok(url)
}

/// `{host}/api/v1/namespaces/{ns}/{collection}/{segments..}?overwrite=true`.
fn entity_url(
    api_host: &str,
    namespace: &str,
    collection: &str,
    segments: &[&str],
) -> Result<Url, BackendError> {
    let mut url = base_url(api_host)?;
    url.path_segments_mut()
        .map_err(|()| BackendError::InvalidTarget(api_host.to_owned()))?
        .pop_if_empty()
        .extend(["api", "v1", "namespaces", namespace, collection])
        .extend(segments);
    url.query_pairs_mut().append_pair("overwrite", "true");
    Ok(url)
}

/// `user:password` credentials; a credential without `:` is a bare user.
fn split_auth(auth: &str) -> (&str, Option<&str>) {
    match auth.split_once(':') {
        Some((user, password)) => (user, Some(password)),
        None => (auth, None),
    }
}

fn key_values(parameters: &Parameters) -> Vec<Value> {
    parameters
        .iter()
        .map(|(key, value)| json!({ "key": key, "value": value }))
        .collect()
}

fn package_body(package: &PackageDeployment) -> Value {
    json!({
        "name": package.name,
        "parameters": key_values(&package.parameters),
        "publish": false,
    })
}

fn action_body(action: &ActionDeployment) -> Value {
    let runtime = &action.runtime;
    let mut exec = Map::new();
    exec.insert("kind".to_owned(), json!(runtime.kind));
    exec.insert("code".to_owned(), json!(action.code));
    if let Some(main) = &runtime.main {
        exec.insert("main".to_owned(), json!(main));
    }

    let mut body = json!({
        "name": action.name,
        "exec": exec,
        "parameters": key_values(&action.parameters),
        "annotations": key_values(&annotations(runtime)),
    });
    if let Some(limits) = runtime.limits.as_ref().and_then(platform_limits) {
        body["limits"] = limits;
    }
    body
}

fn annotations(runtime: &ActionRuntime) -> Parameters {
    let mut annotations = runtime.annotations.clone();
    annotations.insert("web-export".to_owned(), json!(runtime.web_export));
    if runtime.web_export {
        annotations.entry("final".to_owned()).or_insert(json!(true));
    }
    annotations
}

/// Rename manifest limit keys; unknown keys pass through.
fn platform_limits(limits: &Value) -> Option<Value> {
    let limits = limits.as_object()?;
    let renamed: Map<String, Value> = limits
        .iter()
        .map(|(key, value)| {
            let name = LIMIT_NAMES
                .iter()
                .find(|(from, _)| *from == key.as_str())
                .map_or(key.as_str(), |(_, to)| *to);
            (name.to_owned(), value.clone())
        })
        .collect();
    Some(Value::Object(renamed))
}

async fn receipt(response: Response) -> Result<EntityReceipt, BackendError> {
    let status = response.status();
    let activation_id = response
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    if status.is_success() {
        return Ok(EntityReceipt { activation_id });
    }

    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Rejected {
        status: status.as_u16(),
        message: diagnostic(&body, status.canonical_reason().unwrap_or("error")),
    })
}

/// The platform's `error` field if the body is JSON, else the raw body.
fn diagnostic(body: &str, fallback: &str) -> String {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_owned))
        .unwrap_or_else(|| body.trim().to_owned());

    if message.is_empty() {
        return fallback.to_owned();
    }
    message.chars().take(MAX_DIAGNOSTIC_LEN).collect()
}
