use std::{
    io::{Error, ErrorKind, Result},
    sync::atomic::{AtomicU64, Ordering},
};

use crate::api::{BlockHeader, BlockId, EventFilter, EventsChunk, TransactionReceipt};
use http::{Method, Request};
use hyper::{body, client::HttpConnector, Body, Client as HyperClient};
use jsonrpc_core::{Call, Id, MethodCall, Params, Value, Version};
use serde::{de, Serialize};

pub use http::Uri;

/// HTTP client for a Starknet JSON-RPC endpoint. Request ids are handed out
/// atomically so the client can be shared between sessions.
pub struct Client<C> {
    id: AtomicU64,
    client: HyperClient<C>,
    endpoint: Uri,
}

impl Client<HttpConnector> {
    pub fn new(endpoint: Uri) -> Self {
        let client = HyperClient::new();
        Self {
            id: AtomicU64::new(0),
            client,
            endpoint,
        }
    }

    /// Parses the endpoint from a string, e.g. a config value.
    pub fn from_endpoint(endpoint: &str) -> Result<Self> {
        let uri = endpoint.parse::<Uri>().map_err(|e| {
            Error::new(
                ErrorKind::InvalidInput,
                format!("invalid rpc endpoint {:?}: {}", endpoint, e),
            )
        })?;
        Ok(Self::new(uri))
    }
}

impl Client<HttpConnector> {
    fn next_id(&self) -> Id {
        Id::Num(self.id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn endpoint(&self) -> &Uri {
        &self.endpoint
    }

    /// Returns a serialized json request as string and the request id.
    pub fn raw_request(&self, method: &str, params: &Params) -> Result<(Id, String)> {
        let id = self.next_id();
        let request = jsonrpc_core::Request::Single(Call::MethodCall(MethodCall {
            jsonrpc: Some(Version::V2),
            method: method.to_owned(),
            params: params.to_owned(),
            id: id.clone(),
        }));
        let json = serde_json::to_string(&request)?;
        Ok((id, json))
    }

    /// Returns the number of the latest accepted block.
    pub async fn block_number(&self) -> Result<u64> {
        self.call("starknet_blockNumber", Params::Array(vec![]))
            .await
    }

    /// Returns the chain id felt, e.g. `0x534e5f4d41494e` for mainnet.
    pub async fn chain_id(&self) -> Result<String> {
        self.call("starknet_chainId", Params::Array(vec![])).await
    }

    /// Returns one chunk of events matching the filter.
    pub async fn get_events(&self, filter: &EventFilter) -> Result<EventsChunk> {
        self.call("starknet_getEvents", named_params(&[("filter", filter)])?)
            .await
    }

    /// Returns the header fields of a block by number.
    pub async fn get_block_header(&self, block_number: u64) -> Result<BlockHeader> {
        self.call(
            "starknet_getBlockWithTxHashes",
            named_params(&[("block_id", &BlockId::number(block_number))])?,
        )
        .await
    }

    pub async fn get_transaction_receipt(&self, tx_hash: &str) -> Result<TransactionReceipt> {
        self.call(
            "starknet_getTransactionReceipt",
            named_params(&[("transaction_hash", &tx_hash)])?,
        )
        .await
    }

    async fn call<T: de::DeserializeOwned>(&self, method: &str, params: Params) -> Result<T> {
        let (id, json_request) = self.raw_request(method, &params)?;
        log::debug!("rpc request {:?}: {}", id, json_request);
        self.post_de::<T>(&json_request).await
    }

    /// Returns a deserialized response from client request.
    pub async fn post_de<T: de::DeserializeOwned>(&self, json: &str) -> Result<T> {
        let req = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.to_string())
            .header("content-type", "application/json")
            .body(Body::from(json.to_owned()))
            .map_err(|e| {
                Error::new(
                    ErrorKind::Other,
                    format!("failed to create client request: {}", e),
                )
            })?;

        let resp = self.client.request(req).await.map_err(|e| {
            Error::new(
                ErrorKind::Other,
                format!("client post request failed: {}", e),
            )
        })?;
        let status = resp.status();

        let bytes = body::to_bytes(resp.into_body())
            .await
            .map_err(|e| Error::new(ErrorKind::Other, e.to_string()))?;

        if !status.is_success() {
            return Err(Error::new(
                ErrorKind::Other,
                format!(
                    "rpc endpoint returned {}: {}",
                    status,
                    String::from_utf8_lossy(&bytes)
                ),
            ));
        }

        // deserialize bytes to value
        let v: Value = serde_json::from_slice(&bytes).map_err(|e| {
            Error::new(
                ErrorKind::InvalidData,
                format!("failed to deserialize response to value: {}", e),
            )
        })?;

        if let Some(err) = v.get("error") {
            return Err(Error::new(
                ErrorKind::Other,
                format!(
                    "rpc error {}: {}",
                    err["code"],
                    err["message"].as_str().unwrap_or("unknown error")
                ),
            ));
        }

        // deserialize result to T
        serde_json::from_value(v["result"].to_owned()).map_err(|e| {
            Error::new(
                ErrorKind::InvalidData,
                format!("failed to deserialize response: {}", e),
            )
        })
    }
}

fn named_params<T: Serialize + ?Sized>(fields: &[(&str, &T)]) -> Result<Params> {
    let mut map = serde_json::Map::with_capacity(fields.len());
    for (name, value) in fields {
        map.insert((*name).to_owned(), serde_json::to_value(value)?);
    }
    Ok(Params::Map(map))
}

#[tokio::test]
async fn test_raw_request() {
    let cli = Client::new(Uri::from_static("http://test.url"));
    let (id, _) = cli.raw_request("starknet_blockNumber", &Params::None).unwrap();
    assert_eq!(id, jsonrpc_core::Id::Num(0));
    let (id, req) = cli
        .raw_request("starknet_blockNumber", &Params::Array(vec![]))
        .unwrap();
    assert_eq!(id, jsonrpc_core::Id::Num(1));
    assert_eq!(
        req,
        r#"{"jsonrpc":"2.0","method":"starknet_blockNumber","params":[],"id":1}"#
    );
}

#[test]
fn test_named_params() {
    let params = named_params(&[("block_id", &BlockId::number(3))]).unwrap();
    assert_eq!(
        serde_json::to_value(&params).unwrap(),
        serde_json::json!({"block_id": {"block_number": 3}})
    );
}

#[test]
fn test_from_endpoint() {
    assert!(Client::from_endpoint("http://127.0.0.1:5050/rpc").is_ok());
    let err = Client::from_endpoint("not a uri").err().unwrap();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}
