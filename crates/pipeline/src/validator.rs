//! Example Validator: check request examples against the schema and the live API
//!
//! The structural check always runs first, so a payload that violates the
//! endpoint's declared schema is rejected without any HTTP traffic.

use futures_util::stream::{self, StreamExt};
use futures_util::FutureExt;
use routedoc_common::{AuthScheme, Credential, Example, ProviderConfig, ValidationState};
use routedoc_generator::{EndpointDocs, ProviderDocs};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::http::{truncate_string, HttpRequest, HttpTransport};
use crate::json_schema::SchemaCheck;
use crate::retry::{execute_with_retry, RetryPolicy};

/// Number of payload characters kept in rejection logs
const LOGGED_PAYLOAD_CHARS: usize = 200;

/// Why an example was rejected
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// Payload does not conform to the request schema
    Schema(Vec<String>),
    /// The live API answered with a permanent non-success status
    Status { status: u16, body: String },
    /// No definitive answer could be obtained
    Unverifiable(String),
}

impl RejectReason {
    /// Whether a fresh candidate could fare better
    pub fn allows_regeneration(&self) -> bool {
        !matches!(self, RejectReason::Unverifiable(_))
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Schema(errors) => write!(f, "schema violation: {}", errors.join("; ")),
            RejectReason::Status { status, body } if body.is_empty() => {
                write!(f, "API answered HTTP {}", status)
            }
            RejectReason::Status { status, body } => {
                write!(f, "API answered HTTP {}: {}", status, body)
            }
            RejectReason::Unverifiable(cause) => write!(f, "unverifiable: {}", cause),
        }
    }
}

/// Classification of one example
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Accepted by the live API
    Valid,
    /// Structurally valid, live check disabled
    Unvalidated,
    Rejected(RejectReason),
}

impl Verdict {
    pub fn state(&self) -> ValidationState {
        match self {
            Verdict::Valid => ValidationState::Valid,
            Verdict::Unvalidated => ValidationState::Unvalidated,
            Verdict::Rejected(_) => ValidationState::Rejected,
        }
    }
}

struct LiveTarget {
    transport: Arc<dyn HttpTransport>,
    policy: RetryPolicy,
    credential: Option<Credential>,
}

/// Validator for one provider
pub struct ExampleValidator {
    provider: ProviderConfig,
    live: Option<LiveTarget>,
}

impl ExampleValidator {
    /// Schema checks only; structurally valid examples stay `unvalidated`
    pub fn structural_only(provider: ProviderConfig) -> Self {
        Self {
            provider,
            live: None,
        }
    }

    /// Schema checks followed by a real request against `provider.base_url`
    pub fn live(
        provider: ProviderConfig,
        transport: Arc<dyn HttpTransport>,
        policy: RetryPolicy,
        credential: Option<Credential>,
    ) -> Self {
        Self {
            provider,
            live: Some(LiveTarget {
                transport,
                policy,
                credential,
            }),
        }
    }

    pub fn is_live(&self) -> bool {
        self.live.is_some()
    }

    /// Classify a request payload for `endpoint`
    pub async fn validate(&self, endpoint: &EndpointDocs, payload: &Value) -> Verdict {
        let verdict = self.classify(endpoint, payload).await;
        match &verdict {
            Verdict::Rejected(reason) => warn!(
                provider = %self.provider.id,
                endpoint = %endpoint.key,
                reason = %reason,
                payload = %truncate_string(&payload.to_string(), LOGGED_PAYLOAD_CHARS),
                "Example rejected"
            ),
            other => debug!(
                provider = %self.provider.id,
                endpoint = %endpoint.key,
                state = %other.state(),
                "Example accepted"
            ),
        }
        verdict
    }

    async fn classify(&self, endpoint: &EndpointDocs, payload: &Value) -> Verdict {
        if let Some(schema) = endpoint.request_schema() {
            match SchemaCheck::compile(&schema.to_value()) {
                Ok(check) => {
                    let errors = check.errors(payload);
                    if !errors.is_empty() {
                        return Verdict::Rejected(RejectReason::Schema(errors));
                    }
                }
                Err(e) => return Verdict::Rejected(RejectReason::Unverifiable(e.to_string())),
            }
        }

        let Some(live) = &self.live else {
            return Verdict::Unvalidated;
        };

        let request = match self.build_request(endpoint, payload, live.credential.as_ref()) {
            Ok(request) => request,
            Err(reason) => return Verdict::Rejected(reason),
        };

        // Errors are masked before the retry loop logs them
        let transport = live.transport.as_ref();
        let credential = live.credential.as_ref();
        let request = &request;
        let result = execute_with_retry(&live.policy, "validate_example", || async move {
            transport
                .send(request.clone())
                .await
                .and_then(|response| response.error_for_status())
                .map_err(|e| e.redacted(credential))
        })
        .await;

        match result {
            Ok(_) => Verdict::Valid,
            Err(e) if e.is_retryable() => {
                Verdict::Rejected(RejectReason::Unverifiable(e.to_string()))
            }
            Err(PipelineError::Http { status, body, .. }) => {
                Verdict::Rejected(RejectReason::Status {
                    status,
                    body: truncate_string(&body, LOGGED_PAYLOAD_CHARS),
                })
            }
            Err(e) => Verdict::Rejected(RejectReason::Unverifiable(e.to_string())),
        }
    }

    /// The request a live check sends for `payload`
    pub fn build_request(
        &self,
        endpoint: &EndpointDocs,
        payload: &Value,
        credential: Option<&Credential>,
    ) -> Result<HttpRequest, RejectReason> {
        let auth = &self.provider.auth;
        let secret = match (auth.env_var(), credential) {
            (None, _) => None,
            (Some(_), Some(credential)) => Some(credential.expose()),
            (Some(env), None) => {
                return Err(RejectReason::Unverifiable(format!(
                    "credential {} is not configured",
                    env
                )))
            }
        };

        let path = fill_path(&endpoint.key.path, |name| match auth {
            AuthScheme::PathParam { name: auth_name, .. } if auth_name == name => {
                secret.map(str::to_string)
            }
            _ => path_parameter_value(endpoint, name),
        })
        .map_err(|name| {
            RejectReason::Unverifiable(format!("no value for path parameter '{}'", name))
        })?;

        let base = self.provider.base_url.trim_end_matches('/');
        let mut url = url::Url::parse(&format!("{}{}", base, path))
            .map_err(|e| RejectReason::Unverifiable(format!("invalid request URL: {}", e)))?;

        let mut headers = vec![
            (
                "Accept".to_string(),
                self.provider
                    .accept
                    .clone()
                    .unwrap_or_else(|| "application/json".to_string()),
            ),
            ("Content-Type".to_string(), "application/json".to_string()),
        ];
        match (auth, secret) {
            (AuthScheme::Bearer { .. }, Some(secret)) => {
                headers.push(("Authorization".to_string(), format!("Bearer {}", secret)));
            }
            (AuthScheme::Header { name, .. }, Some(secret)) => {
                headers.push((name.clone(), secret.to_string()));
            }
            (AuthScheme::Query { param, .. }, Some(secret)) => {
                url.query_pairs_mut().append_pair(param, secret);
            }
            _ => {}
        }

        Ok(HttpRequest {
            method: endpoint.key.method,
            url: url.to_string(),
            headers,
            body: Some(payload.clone()),
        })
    }

    /// Check extracted request examples when the provider asks for it
    ///
    /// Rejected extracted examples are kept with state `rejected`; they come
    /// from the provider's own document and are never dropped.
    pub async fn check_extracted(
        &self,
        docs: &ProviderDocs,
        examples: Vec<Example>,
        concurrency: usize,
    ) -> Vec<Example> {
        if !self.provider.validate_extracted || !self.is_live() {
            return examples;
        }

        let mut checked: Vec<Example> = stream::iter(examples)
            .map(|example| async move {
                let Some(endpoint) = docs.endpoint(&example.endpoint) else {
                    return example;
                };
                if !example.is_request() {
                    return example;
                }
                let verdict = self.validate(endpoint, &example.payload).await;
                if let Verdict::Rejected(reason) = &verdict {
                    warn!(
                        provider = %self.provider.id,
                        endpoint = %example.endpoint,
                        reason = %reason,
                        "Publishing extracted example that failed validation"
                    );
                }
                let state = verdict.state();
                example.with_validation(state)
            }
            .boxed())
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;
        checked.sort_by(|a, b| (&a.endpoint, a.direction).cmp(&(&b.endpoint, b.direction)));
        checked
    }
}

/// Substitute `{name}` segments of a path template
///
/// Returns the first parameter name `value` has no answer for.
pub fn fill_path<F>(template: &str, mut value: F) -> Result<String, String>
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        let name = &rest[open + 1..open + close];
        let filled = value(name).ok_or_else(|| name.to_string())?;
        out.push_str(&rest[..open]);
        out.push_str(&urlencoding::encode(&filled));
        rest = &rest[open + close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Sample value of a path parameter
///
/// Its example, otherwise the schema's default, example or first enum value.
fn path_parameter_value(endpoint: &EndpointDocs, name: &str) -> Option<String> {
    let parameter = endpoint.path_parameters().find(|p| p.name == name)?;
    let value = parameter.example.as_ref().map(|n| n.to_value()).or_else(|| {
        let schema = parameter.schema.as_ref()?.to_value();
        schema
            .get("default")
            .or_else(|| schema.get("example"))
            .or_else(|| schema.get("enum").and_then(|e| e.get(0)))
            .cloned()
    })?;
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use routedoc_common::{EndpointKey, HttpMethod, ProviderId, RoutePredicate};
    use routedoc_generator::RequestBodyDocs;
    use routedoc_parser::Node;
    use serde_json::json;

    fn provider(auth: AuthScheme) -> ProviderConfig {
        ProviderConfig {
            id: ProviderId::new("inavi").unwrap(),
            title: "iNavi Maps".into(),
            docs_url: "https://maps.test/api-docs".into(),
            base_url: "https://maps.test/".into(),
            route: RoutePredicate::PathPrefix("/".into()),
            strip_prefix: None,
            auth,
            accept: None,
            synthesize_examples: false,
            validate_extracted: false,
            generation_hints: Vec::new(),
        }
    }

    fn endpoint(path: &str, parameters: Value) -> EndpointDocs {
        EndpointDocs {
            key: EndpointKey::new(path, HttpMethod::Post),
            id: "post_x".into(),
            summary: String::new(),
            description: String::new(),
            operation_id: None,
            tags: Vec::new(),
            deprecated: false,
            parameters: serde_json::from_value(parameters).unwrap(),
            request_body: Some(RequestBodyDocs {
                content_type: "application/json".into(),
                required: true,
                description: None,
                schema: Some(Node::from_value(json!({
                    "type": "object",
                    "required": ["start"],
                    "properties": {"start": {"type": "string"}}
                }))),
            }),
            responses: Vec::new(),
            extracted: Vec::new(),
        }
    }

    #[test]
    fn test_fill_path() {
        let filled = fill_path("/maps/v3.0/appkeys/{appkey}/route", |name| {
            (name == "appkey").then(|| "k/1".to_string())
        });
        assert_eq!(filled.unwrap(), "/maps/v3.0/appkeys/k%2F1/route");
        assert_eq!(fill_path("/a/{x}/b/{y}", |_| None).unwrap_err(), "x");
        assert_eq!(fill_path("/plain", |_| None).unwrap(), "/plain");
    }

    #[test]
    fn test_path_param_auth() {
        let validator = ExampleValidator::structural_only(provider(AuthScheme::PathParam {
            name: "appkey".into(),
            env: "IMAPS_APP_KEY".into(),
        }));
        let credential = Credential::new("IMAPS_APP_KEY", "abcd1234efgh5678");
        let request = validator
            .build_request(
                &endpoint("/maps/v3.0/appkeys/{appkey}/route-normal", json!([])),
                &json!({"start": "a"}),
                Some(&credential),
            )
            .unwrap();
        assert_eq!(
            request.url,
            "https://maps.test/maps/v3.0/appkeys/abcd1234efgh5678/route-normal"
        );
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.body, Some(json!({"start": "a"})));
    }

    #[test]
    fn test_bearer_and_query_auth() {
        let credential = Credential::new("TOKEN", "secret-value-123");
        let bearer = ExampleValidator::structural_only(provider(AuthScheme::Bearer {
            env: "TOKEN".into(),
        }));
        let request = bearer
            .build_request(&endpoint("/route", json!([])), &json!({}), Some(&credential))
            .unwrap();
        assert!(request
            .headers
            .contains(&("Authorization".to_string(), "Bearer secret-value-123".to_string())));

        let query = ExampleValidator::structural_only(provider(AuthScheme::Query {
            param: "appkey".into(),
            env: "TOKEN".into(),
        }));
        let request = query
            .build_request(&endpoint("/route", json!([])), &json!({}), Some(&credential))
            .unwrap();
        assert_eq!(request.url, "https://maps.test/route?appkey=secret-value-123");
    }

    #[test]
    fn test_path_parameter_from_schema() {
        let validator = ExampleValidator::structural_only(provider(AuthScheme::None));
        let docs = endpoint(
            "/regions/{region}/route",
            json!([{"name": "region", "in": "path", "required": true, "schema": {"type": "string", "enum": ["kr", "jp"]}}]),
        );
        let request = validator.build_request(&docs, &json!({}), None).unwrap();
        assert_eq!(request.url, "https://maps.test/regions/kr/route");
    }

    #[test]
    fn test_missing_credential_is_unverifiable() {
        let validator = ExampleValidator::structural_only(provider(AuthScheme::Bearer {
            env: "TOKEN".into(),
        }));
        let err = validator
            .build_request(&endpoint("/route", json!([])), &json!({}), None)
            .unwrap_err();
        assert!(matches!(err, RejectReason::Unverifiable(_)));
        assert!(!err.allows_regeneration());
    }

    #[test]
    fn test_unfillable_path_parameter() {
        let validator = ExampleValidator::structural_only(provider(AuthScheme::None));
        let err = validator
            .build_request(&endpoint("/orders/{orderId}", json!([])), &json!({}), None)
            .unwrap_err();
        assert_eq!(
            err,
            RejectReason::Unverifiable("no value for path parameter 'orderId'".to_string())
        );
    }

    #[tokio::test]
    async fn test_structural_only_verdicts() {
        let validator = ExampleValidator::structural_only(provider(AuthScheme::None));
        let docs = endpoint("/route", json!([]));
        assert_eq!(validator.validate(&docs, &json!({"start": "a"})).await, Verdict::Unvalidated);
        let verdict = validator.validate(&docs, &json!({"start": 1})).await;
        assert!(matches!(verdict, Verdict::Rejected(RejectReason::Schema(_))));
        assert_eq!(verdict.state(), ValidationState::Rejected);
    }
}
