//! A minimal bitcoind JSON-RPC client.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use delegation_tracker::{chain::ChainTipSource, errors::ChainClientError};
use jsonrpsee::{
    core::{client::ClientT, ClientError},
    http_client::{HeaderMap, HeaderValue, HttpClient, HttpClientBuilder},
    rpc_params,
};
use staking_primitives::types::BitcoinBlockHeight;

use crate::config::BtcClientConfig;

/// Talks to bitcoind over HTTP with basic authentication.
#[derive(Debug, Clone)]
pub(crate) struct BitcoinClient {
    inner: HttpClient,
}

impl BitcoinClient {
    pub(crate) fn new(config: &BtcClientConfig) -> Result<Self, ChainClientError> {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", basic_auth(&config.user, &config.pass)?);

        let inner = HttpClientBuilder::default()
            .set_headers(headers)
            .build(&config.url)
            .map_err(|e| ChainClientError::Config(e.to_string()))?;

        Ok(Self { inner })
    }
}

#[async_trait]
impl ChainTipSource for BitcoinClient {
    async fn current_tip_height(&self) -> Result<BitcoinBlockHeight, ChainClientError> {
        self.inner
            .request::<BitcoinBlockHeight, _>("getblockcount", rpc_params![])
            .await
            .map_err(|e| match e {
                ClientError::ParseError(e) => ChainClientError::UnexpectedResponse(e.to_string()),
                e => ChainClientError::Rpc(e.to_string()),
            })
    }
}

fn basic_auth(user: &str, pass: &str) -> Result<HeaderValue, ChainClientError> {
    let credentials = STANDARD.encode(format!("{user}:{pass}"));

    HeaderValue::from_str(&format!("Basic {credentials}"))
        .map_err(|e| ChainClientError::Config(e.to_string()))
}
