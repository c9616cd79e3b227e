// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::common::error::AppError;
use alloy::network::Ethereum;
use alloy::providers::RootProvider;
use alloy::rpc::client::RpcClient;
use alloy::transports::http::Http;
use std::time::Duration;
use url::Url;

pub type HttpProvider = RootProvider<Ethereum>;

pub struct ConnectionFactory;

impl ConnectionFactory {
    /// HTTP provider whose every RPC call is bounded by `timeout`.
    pub fn http(rpc_url: &str, timeout: Duration) -> Result<HttpProvider, AppError> {
        let url =
            Url::parse(rpc_url).map_err(|e| AppError::Config(format!("Invalid RPC URL: {}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Connection(format!("RPC HTTP client: {}", e)))?;
        let transport = Http::with_client(client, url);
        let is_local = transport.guess_local();
        let provider = RootProvider::new(RpcClient::new(transport, is_local));
        Ok(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_rpc_url() {
        let Err(err) = ConnectionFactory::http("not a url", Duration::from_secs(10)) else {
            panic!("malformed URL must fail");
        };
        assert!(matches!(err, AppError::Config(msg) if msg.contains("Invalid RPC URL")));
    }

    #[test]
    fn accepts_http_rpc_url() {
        assert!(ConnectionFactory::http("http://127.0.0.1:8545", Duration::from_secs(10)).is_ok());
    }
}
