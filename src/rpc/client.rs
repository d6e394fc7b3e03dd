//! Source chain reader over Bitcoin Core JSON-RPC

use super::types::{
    GetBlockHeaderResult, GetBlockTransactionsResult, GetBlockTxidsResult,
    GetRawTransactionResult, JsonRpcRequest, JsonRpcResponse, RPC_INVALID_ADDRESS_OR_KEY,
    RPC_INVALID_PARAMETER,
};
use crate::chain::{prove_in_block, ClientError, SourceChain};
use crate::core::{narrow_u32, BlockHeader};
use crate::crypto::{decode_from_wire_hash, EncodingError, Hash256, MerkleProof};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Per-request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP basic auth credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcAuth {
    pub user: String,
    pub password: Option<String>,
}

/// JSON-RPC client for a Bitcoin Core node
pub struct BitcoinRpcClient {
    client: Client,
    url: String,
    auth: Option<RpcAuth>,
    request_id: AtomicU64,
}

impl BitcoinRpcClient {
    /// Create a client for the node at `url`
    pub fn new(url: impl Into<String>, auth: Option<RpcAuth>) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            auth,
            request_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Call a JSON-RPC method
    async fn call<P, R>(&self, method: &str, params: P) -> Result<R, ClientError>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let id = self.next_id();
        let request = JsonRpcRequest::new(method, params, id);
        log::trace!("RPC #{} {}", id, method);

        let mut builder = self.client.post(&self.url).json(&request);
        if let Some(auth) = &self.auth {
            builder = builder.basic_auth(&auth.user, auth.password.as_ref());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        // Error objects can arrive with a non-2xx status (1.0 dialect)
        let rpc_response: JsonRpcResponse<R> = match serde_json::from_slice(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(ClientError::Http {
                    status: status.as_u16(),
                })
            }
            Err(e) => return Err(ClientError::Decode(format!("{}: {}", method, e))),
        };

        if let Some(error) = rpc_response.error {
            return Err(ClientError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        rpc_response
            .result
            .ok_or_else(|| ClientError::Decode(format!("{}: missing result", method)))
    }

    /// `getrawtransaction <txid> true`
    async fn raw_transaction_verbose(
        &self,
        txid: &Hash256,
    ) -> Result<GetRawTransactionResult, ClientError> {
        self.call("getrawtransaction", (txid.to_rpc_hex(), true))
            .await
            .map_err(|e| unknown_transaction(e, txid))
    }

    /// `getblock <hash> 1`
    async fn block_txids(&self, hash: &Hash256) -> Result<GetBlockTxidsResult, ClientError> {
        self.call("getblock", (hash.to_rpc_hex(), 1))
            .await
            .map_err(|e| unknown_block(e, hash))
    }
}

fn unknown_block(error: ClientError, hash: &Hash256) -> ClientError {
    match error {
        ClientError::Rpc { code, .. } if code == RPC_INVALID_ADDRESS_OR_KEY => {
            ClientError::UnknownBlock(*hash)
        }
        other => other,
    }
}

fn unknown_transaction(error: ClientError, txid: &Hash256) -> ClientError {
    match error {
        ClientError::Rpc { code, .. } if code == RPC_INVALID_ADDRESS_OR_KEY => {
            ClientError::UnknownTransaction(*txid)
        }
        other => other,
    }
}

fn decode_hex(field: &str, hex_str: &str) -> Result<Vec<u8>, ClientError> {
    hex::decode(hex_str).map_err(|e| ClientError::Decode(format!("{}: {}", field, e)))
}

fn parse_txids(txids: &[String]) -> Result<Vec<Hash256>, ClientError> {
    txids
        .iter()
        .map(|txid| decode_from_wire_hash(txid.as_str()).map_err(ClientError::from))
        .collect()
}

#[async_trait]
impl SourceChain for BitcoinRpcClient {
    async fn current_height(&self) -> Result<u32, ClientError> {
        let count: u64 = self.call("getblockcount", [(); 0]).await?;
        Ok(narrow_u32("height", count)?)
    }

    async fn hash_at_height(&self, height: u32) -> Result<Hash256, ClientError> {
        let hash: String = self
            .call("getblockhash", (height,))
            .await
            .map_err(|e| match e {
                ClientError::Rpc { code, .. } if code == RPC_INVALID_PARAMETER => {
                    ClientError::UnknownHeight(height)
                }
                other => other,
            })?;
        Ok(decode_from_wire_hash(hash.as_str())?)
    }

    async fn header_at_hash(&self, hash: &Hash256) -> Result<BlockHeader, ClientError> {
        let result: GetBlockHeaderResult = self
            .call("getblockheader", (hash.to_rpc_hex(), true))
            .await
            .map_err(|e| unknown_block(e, hash))?;
        let header = BlockHeader::try_from(result)?;

        if header.hash != *hash {
            return Err(EncodingError::HashMismatch {
                height: header.height,
                expected: *hash,
                computed: header.hash,
            }
            .into());
        }
        header.verify_identity()?;
        Ok(header)
    }

    async fn transactions_in_block(&self, hash: &Hash256) -> Result<Vec<Vec<u8>>, ClientError> {
        let block: GetBlockTransactionsResult = self
            .call("getblock", (hash.to_rpc_hex(), 2))
            .await
            .map_err(|e| unknown_block(e, hash))?;
        block
            .tx
            .iter()
            .map(|tx| decode_hex("transaction hex", &tx.hex))
            .collect()
    }

    async fn transaction_ids_in_block(
        &self,
        hash: &Hash256,
    ) -> Result<Vec<Hash256>, ClientError> {
        let block = self.block_txids(hash).await?;
        parse_txids(&block.tx)
    }

    async fn merkle_proof_for_transaction(
        &self,
        txid: &Hash256,
    ) -> Result<MerkleProof, ClientError> {
        let tx = self.raw_transaction_verbose(txid).await?;
        let block_hash = match tx.block_hash {
            Some(hash) => decode_from_wire_hash(hash.as_str())?,
            None => return Err(ClientError::UnknownTransaction(*txid)),
        };

        let txids = self.transaction_ids_in_block(&block_hash).await?;
        let header = self.header_at_hash(&block_hash).await?;
        prove_in_block(&header, &txids, txid)
    }

    async fn raw_transaction(&self, txid: &Hash256) -> Result<Vec<u8>, ClientError> {
        let hex_str: String = self
            .call("getrawtransaction", (txid.to_rpc_hex(), false))
            .await
            .map_err(|e| unknown_transaction(e, txid))?;
        decode_hex("transaction hex", &hex_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_per_instance() {
        let first = BitcoinRpcClient::new("http://127.0.0.1:18443", None).unwrap();
        let second = BitcoinRpcClient::new("http://127.0.0.1:18443", None).unwrap();
        assert_eq!(first.next_id(), 1);
        assert_eq!(first.next_id(), 2);
        assert_eq!(second.next_id(), 1);
    }

    #[test]
    fn test_rpc_error_mapping() {
        let hash = Hash256([5; 32]);
        let not_found = ClientError::Rpc {
            code: RPC_INVALID_ADDRESS_OR_KEY,
            message: "Block not found".to_string(),
        };
        assert_eq!(unknown_block(not_found, &hash), ClientError::UnknownBlock(hash));

        let other = ClientError::Http { status: 502 };
        assert_eq!(unknown_transaction(other.clone(), &hash), other);
    }

    #[test]
    fn test_parse_txids() {
        let txids = vec![
            "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b".to_string(),
        ];
        let parsed = parse_txids(&txids).unwrap();
        assert_eq!(parsed[0].to_rpc_hex(), txids[0]);
        assert!(parse_txids(&["zz".to_string()]).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_node_is_transient() {
        // Port 9 (discard) on localhost is closed in test environments
        let client = BitcoinRpcClient::new("http://127.0.0.1:9", None).unwrap();
        let err = client.current_height().await.unwrap_err();
        assert!(err.is_transient(), "unexpected error: {err}");
    }
}
