//! Stacks node read-only contract calls.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clarity::{self, ClarityValue, QualifiedContractIdentifier, StandardPrincipalData};
use crate::error::{ApiError, CoreError};
use crate::http::{build_client, parse_base_url, read_body};

#[async_trait]
pub trait StacksNode: Send + Sync {
    /// Evaluate a read-only contract function on behalf of `sender`.
    async fn call_read_only(
        &self,
        contract: &QualifiedContractIdentifier,
        function: &str,
        sender: &StandardPrincipalData,
        args: &[ClarityValue],
    ) -> Result<ClarityValue, CoreError>;
}

#[derive(Debug, Serialize)]
struct ReadOnlyRequest {
    sender: String,
    arguments: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ReadOnlyResponse {
    okay: bool,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    cause: Option<String>,
}

/// Client for the Stacks node RPC (`/v2/contracts/call-read/...`).
pub struct HiroNodeClient {
    client: reqwest::Client,
    base_url: String,
}

impl HiroNodeClient {
    pub fn new(base_url: &str) -> Result<Self, CoreError> {
        Ok(Self {
            client: build_client().map_err(CoreError::Node)?,
            base_url: parse_base_url(base_url)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl StacksNode for HiroNodeClient {
    async fn call_read_only(
        &self,
        contract: &QualifiedContractIdentifier,
        function: &str,
        sender: &StandardPrincipalData,
        args: &[ClarityValue],
    ) -> Result<ClarityValue, CoreError> {
        let url = format!(
            "{}/v2/contracts/call-read/{}/{}/{function}",
            self.base_url, contract.issuer, contract.name
        );
        let request = ReadOnlyRequest {
            sender: sender.to_string(),
            arguments: args.iter().map(clarity::to_hex).collect(),
        };
        debug!(%url, args = request.arguments.len(), "read-only call");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| CoreError::Node(ApiError::Transport(e)))?;
        let body = read_body(&url, response).await.map_err(CoreError::Node)?;

        let parsed: ReadOnlyResponse = serde_json::from_str(&body).map_err(|e| {
            CoreError::Node(ApiError::InvalidResponse(format!(
                "decode read-only response: {e}; body={body}"
            )))
        })?;

        if !parsed.okay {
            return Err(CoreError::ReadOnlyRejected(
                parsed.cause.unwrap_or_else(|| "no cause given".to_owned()),
            ));
        }
        let result = parsed.result.ok_or_else(|| {
            CoreError::Node(ApiError::InvalidResponse(
                "okay response without `result`".to_owned(),
            ))
        })?;
        Ok(clarity::from_hex(&result)?)
    }
}

// ==============================================================================
// Mock
// ==============================================================================


#[cfg(test)]
mod tests {
    use axum::extract::Path;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    use super::*;
    use crate::clarity::ClarityValueExt;

    const DEPLOYER: &str = "ST3QFME3CANQFQNR86TYVKQYCFT7QX4PRXM1V9W6H";

    async fn spawn_node() -> String {
        let router = Router::new().route(
            "/v2/contracts/call-read/{address}/{name}/{function}",
            post(
                |Path((address, name, function)): Path<(String, String, String)>,
                 Json(body): Json<Value>| async move {
                    match function.as_str() {
                        "echo-args" => Json(json!({
                            "okay": true,
                            // (ok u<arg count>)
                            "result": clarity::to_hex(&clarity::ok(clarity::uint(
                                body["arguments"].as_array().map_or(0, |a| a.len()) as u64,
                            ))),
                        })),
                        "whoami" => Json(json!({
                            "okay": true,
                            "result": clarity::to_hex(&clarity::tuple([
                                ("contract", clarity::buffer(format!("{address}.{name}")).unwrap()),
                                ("sender", clarity::buffer(
                                    body["sender"].as_str().unwrap_or_default(),
                                ).unwrap()),
                            ]).unwrap()),
                        })),
                        "broken" => Json(json!({ "okay": true })),
                        _ => Json(json!({
                            "okay": false,
                            "cause": format!("Unchecked(NoSuchPublicFunction(\"{function}\"))"),
                        })),
                    }
                },
            ),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("ephemeral port must bind");
        let addr = listener.local_addr().expect("listener has an address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{addr}")
    }

    fn contract() -> QualifiedContractIdentifier {
        clarity::parse_contract_id(&format!("{DEPLOYER}.clarity-bitcoin-bitbadge")).unwrap()
    }

    fn sender() -> StandardPrincipalData {
        clarity::parse_standard_principal(DEPLOYER).unwrap()
    }

    #[tokio::test]
    async fn posts_hex_arguments_and_decodes_result() {
        let node = HiroNodeClient::new(&spawn_node().await).unwrap();
        let value = node
            .call_read_only(
                &contract(),
                "echo-args",
                &sender(),
                &[clarity::uint(1u64), ClarityValue::Bool(true)],
            )
            .await
            .unwrap();
        assert_eq!(value, clarity::ok(clarity::uint(2u64)));
    }

    #[tokio::test]
    async fn path_and_sender_reach_the_node() {
        let node = HiroNodeClient::new(&spawn_node().await).unwrap();
        let value = node
            .call_read_only(&contract(), "whoami", &sender(), &[])
            .await
            .unwrap();
        assert_eq!(
            value.tuple_field("contract").and_then(ClarityValueExt::buffer_bytes),
            Some(format!("{DEPLOYER}.clarity-bitcoin-bitbadge").as_bytes())
        );
        assert_eq!(
            value.tuple_field("sender").and_then(ClarityValueExt::buffer_bytes),
            Some(DEPLOYER.as_bytes())
        );
    }

    #[tokio::test]
    async fn okay_false_is_a_rejection() {
        let node = HiroNodeClient::new(&spawn_node().await).unwrap();
        let err = node
            .call_read_only(&contract(), "missing", &sender(), &[])
            .await
            .expect_err("node rejects unknown functions");
        match err {
            CoreError::ReadOnlyRejected(cause) => assert!(cause.contains("NoSuchPublicFunction")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn okay_without_result_is_invalid() {
        let node = HiroNodeClient::new(&spawn_node().await).unwrap();
        let err = node
            .call_read_only(&contract(), "broken", &sender(), &[])
            .await
            .expect_err("missing result");
        assert!(matches!(err, CoreError::Node(ApiError::InvalidResponse(_))));
    }
}
