use crate::config::ClientConfig;
use crate::error::{Result, WagerError};
use crate::ledger::abi::{self, Token};
use crate::ledger::LedgerGateway;
use crate::types::{Action, Address, Board, GameId, GameRecord, PendingGame, TxHash, TxReceipt};
use async_trait::async_trait;
use primitive_types::U256;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

const METHOD_NOT_FOUND: i64 = -32601;
const USER_REJECTED: i64 = 4001;
const EXECUTION_REVERTED: i64 = 3;

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    block_number: Option<String>,
    status: Option<String>,
}

impl RpcErrorObject {
    fn revert_data(&self) -> Option<Vec<u8>> {
        self.data
            .as_ref()
            .and_then(|d| d.as_str().or_else(|| d.get("data").and_then(Value::as_str)))
            .and_then(|hex| abi::from_hex(hex).ok())
            .filter(|bytes| !bytes.is_empty())
    }

    /// The contract itself refused the call, as opposed to the node failing
    /// to answer it.
    fn is_revert(&self) -> bool {
        self.code == EXECUTION_REVERTED
            || self.revert_data().is_some()
            || self
                .message
                .to_ascii_lowercase()
                .starts_with("execution reverted")
    }

    /// Human-readable reason, preferring the decoded `Error(string)` payload.
    fn reason(&self) -> String {
        let revert = self
            .revert_data()
            .and_then(|bytes| abi::decode_revert_reason(&bytes));

        match revert {
            Some(reason) => reason,
            None if self.code == USER_REJECTED => "request denied by wallet".to_string(),
            None => self.message.clone(),
        }
    }

    /// Writes: whatever the node refuses is a refusal of the action.
    fn into_error(self) -> WagerError {
        WagerError::rejected(self.reason())
    }

    /// Reads: only a revert is an answer; anything else means the ledger
    /// could not be read.
    fn into_read_error(self) -> WagerError {
        if self.is_revert() {
            WagerError::rejected(self.reason())
        } else {
            WagerError::remote(format!("node error {}: {}", self.code, self.message))
        }
    }
}

fn parse_quantity(value: &str) -> Result<u64> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    u64::from_str_radix(digits, 16)
        .map_err(|e| WagerError::decode(format!("invalid quantity '{}': {}", value, e)))
}

/// Ledger gateway over Ethereum JSON-RPC.
///
/// Signing is delegated to the node: accounts come from `eth_accounts` and
/// writes go through `eth_sendTransaction`.
pub struct JsonRpcLedger {
    http: reqwest::Client,
    config: ClientConfig,
    next_id: AtomicU64,
}

impl JsonRpcLedger {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| WagerError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            config,
            next_id: AtomicU64::new(1),
        })
    }

    /// Outer error is transport; inner error is what the node answered.
    async fn call_raw(
        &self,
        method: &str,
        params: Value,
    ) -> Result<std::result::Result<Value, RpcErrorObject>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let response = self
            .http
            .post(&self.config.rpc_url)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": method,
                "params": params,
            }))
            .send()
            .await?
            .error_for_status()?
            .json::<RpcResponse>()
            .await?;

        if let Some(err) = response.error {
            tracing::debug!("{} returned error {}: {}", method, err.code, err.message);
            return Ok(Err(err));
        }

        Ok(Ok(response.result.unwrap_or(Value::Null)))
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        self.call_raw(method, params)
            .await?
            .map_err(RpcErrorObject::into_error)
    }

    async fn read(&self, method: &str, params: Value) -> Result<Value> {
        self.call_raw(method, params)
            .await?
            .map_err(RpcErrorObject::into_read_error)
    }

    fn call_object(&self, from: Option<&Address>, data: &[u8]) -> Value {
        let mut tx = json!({
            "to": self.config.contract_address.as_str(),
            "data": abi::to_hex(data),
        });
        if let Some(from) = from {
            tx["from"] = json!(from.as_str());
        }
        tx
    }

    /// `eth_call` against the contract. Reverts surface as `Rejected`, every
    /// other node error as `RemoteUnavailable`.
    async fn eth_call(&self, from: Option<&Address>, data: &[u8]) -> Result<Vec<u8>> {
        let result = self
            .read("eth_call", json!([self.call_object(from, data), "latest"]))
            .await?;
        let hex = result
            .as_str()
            .ok_or_else(|| WagerError::decode("eth_call result is not a string"))?;
        abi::from_hex(hex)
    }

    async fn block_number(&self) -> Result<u64> {
        let result = self.read("eth_blockNumber", json!([])).await?;
        let hex = result
            .as_str()
            .ok_or_else(|| WagerError::decode("eth_blockNumber result is not a string"))?;
        parse_quantity(hex)
    }

    async fn receipt(&self, tx: &TxHash) -> Result<Option<RawReceipt>> {
        let result = self
            .read("eth_getTransactionReceipt", json!([tx.0]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(result)?))
    }

    async fn poll_until_final(&self, tx: &TxHash) -> Result<TxReceipt> {
        loop {
            if let Some(receipt) = self.receipt(tx).await? {
                if let Some(block_hex) = receipt.block_number.as_deref() {
                    let block_number = parse_quantity(block_hex)?;

                    if receipt.status.as_deref().map(parse_quantity).transpose()? == Some(0) {
                        return Err(WagerError::rejected(format!(
                            "transaction {} reverted in block {}",
                            tx, block_number
                        )));
                    }

                    let head = self.block_number().await?;
                    let depth = head.saturating_sub(block_number) + 1;
                    if depth >= self.config.confirmations {
                        return Ok(TxReceipt {
                            tx_hash: tx.clone(),
                            block_number,
                        });
                    }
                    tracing::debug!(
                        "{} has {}/{} confirmations",
                        tx,
                        depth,
                        self.config.confirmations
                    );
                }
            }
            tokio::time::sleep(self.config.receipt_poll_interval).await;
        }
    }

    fn parse_accounts(result: Value) -> Result<Option<Address>> {
        let accounts: Vec<String> = serde_json::from_value(result)?;
        accounts.first().map(|a| Address::parse(a)).transpose()
    }
}

#[async_trait]
impl LedgerGateway for JsonRpcLedger {
    async fn request_accounts(&self) -> Result<Address> {
        let result = match self.call_raw("eth_requestAccounts", json!([])).await? {
            Ok(value) => value,
            // plain nodes do not implement the wallet prompt
            Err(err) if err.code == METHOD_NOT_FOUND => self.read("eth_accounts", json!([])).await?,
            Err(err) => {
                return Err(WagerError::wallet_unavailable(err.reason()));
            }
        };

        Self::parse_accounts(result)?
            .ok_or_else(|| WagerError::wallet_unavailable("node exposes no accounts"))
    }

    async fn accounts(&self) -> Result<Option<Address>> {
        let result = self.read("eth_accounts", json!([])).await?;
        Self::parse_accounts(result)
    }

    async fn player_game(&self, player: &Address) -> Result<GameId> {
        let data = abi::encode_call(abi::PLAYER_TO_GAME, &[Token::Address(player.clone())]);
        match self.eth_call(None, &data).await {
            Ok(bytes) => Ok(GameId(abi::decode_u64(&bytes)?)),
            // the contract reverts for players without a game
            Err(WagerError::Rejected { reason }) => {
                tracing::debug!("playerToGame reverted for {}: {}", player, reason);
                Ok(GameId::NONE)
            }
            Err(e) => Err(e),
        }
    }

    async fn game(&self, id: GameId) -> Result<Option<GameRecord>> {
        let data = abi::encode_call(abi::GAMES, &[Token::Uint(U256::from(id.0))]);
        let bytes = self.eth_call(None, &data).await?;
        abi::decode_game_record(&bytes)
    }

    async fn board(&self, player: &Address) -> Result<Board> {
        let data = abi::encode_call(abi::GET_BOARD, &[]);
        let bytes = self.eth_call(Some(player), &data).await?;
        abi::decode_board(&bytes)
    }

    async fn pending_games(&self) -> Result<Vec<PendingGame>> {
        let data = abi::encode_call(abi::GET_PENDING_GAMES, &[]);
        let bytes = self.eth_call(None, &data).await?;
        abi::decode_pending_games(&bytes)
    }

    async fn remaining_timeout(&self, player: &Address) -> Result<u64> {
        let data = abi::encode_call(abi::GET_TIME_UNTIL_TIMEOUT, &[]);
        let bytes = self.eth_call(Some(player), &data).await?;
        let seconds = abi::decode_uint(&bytes)?;
        Ok(if seconds > U256::from(u64::MAX) {
            u64::MAX
        } else {
            seconds.low_u64()
        })
    }

    async fn send_transaction(&self, from: &Address, action: &Action) -> Result<TxHash> {
        let data = abi::action_calldata(action);
        let mut tx = self.call_object(Some(from), &data);
        tx["value"] = json!(format!("{:#x}", action.value().0));

        let result = self.call("eth_sendTransaction", json!([tx])).await?;
        let hash = result
            .as_str()
            .ok_or_else(|| WagerError::decode("eth_sendTransaction result is not a string"))?;

        tracing::info!("Submitted {} from {}: {}", action, from, hash);
        Ok(TxHash(hash.to_string()))
    }

    async fn await_finality(&self, tx: &TxHash) -> Result<TxReceipt> {
        match tokio::time::timeout(self.config.confirmation_timeout, self.poll_until_final(tx))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(WagerError::timeout(format!(
                "transaction {} not final after {:?}",
                tx, self.config.confirmation_timeout
            ))),
        }
    }
}
