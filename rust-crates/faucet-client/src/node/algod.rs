use crate::{
    FaucetError,
    Result,
    address::Address,
    node::{
        AccountInfo,
        BlockHeader,
        ChainQuery,
        CompiledProgram,
        NodeStatus,
        PendingTransaction,
        TransactionParams,
    },
    redact::mask,
};
use base64::{
    Engine,
    engine::general_purpose::STANDARD,
};
use reqwest::{
    RequestBuilder,
    StatusCode,
};
use serde::{
    Deserialize,
    de::DeserializeOwned,
};
use std::time::Duration;
use tracing::debug;

const TOKEN_HEADER: &str = "X-Algo-API-Token";

/// `ChainQuery` over the algod v2 REST API.
#[derive(Clone)]
pub struct AlgodClient {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl AlgodClient {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FaucetError::Config(format!("failed to build HTTP client: {e}")))?;
        debug!(
            %base_url,
            token = %token.as_deref().map(mask).unwrap_or_default(),
            "algod client ready"
        );
        Ok(Self {
            base_url,
            token: token.filter(|t| !t.is_empty()),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn with_token(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header(TOKEN_HEADER, token),
            None => request,
        }
    }

    async fn send(&self, path: &str, request: RequestBuilder) -> Result<Option<Vec<u8>>> {
        let res = self.with_token(request).send().await?;
        let status = res.status();
        let bytes = res.bytes().await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(FaucetError::Node {
                context: path.to_owned(),
                status: Some(status.as_u16()),
                message: error_message(&bytes),
            });
        }
        Ok(Some(bytes.to_vec()))
    }

    async fn fetch_optional<T: DeserializeOwned>(
        &self,
        path: &str,
        request: RequestBuilder,
    ) -> Result<Option<T>> {
        match self.send(path, request).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let url = format!("{}{}", self.base_url, path);
        self.fetch_optional(path, self.http.get(url)).await
    }

    fn box_request(&self, app_id: u64, name: &[u8]) -> RequestBuilder {
        let url = format!("{}/v2/applications/{app_id}/box", self.base_url);
        self.http
            .get(url)
            .query(&[("name", format!("b64:{}", STANDARD.encode(name)))])
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get_optional(path).await?.ok_or_else(|| FaucetError::Node {
            context: path.to_owned(),
            status: Some(StatusCode::NOT_FOUND.as_u16()),
            message: "not found".to_owned(),
        })
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let request = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body);
        let bytes = self.send(path, request).await?.ok_or_else(|| FaucetError::Node {
            context: path.to_owned(),
            status: Some(StatusCode::NOT_FOUND.as_u16()),
            message: "not found".to_owned(),
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl ChainQuery for AlgodClient {
    async fn status(&self) -> Result<NodeStatus> {
        let dto: StatusDto = self.get("/v2/status").await?;
        Ok(dto.into())
    }

    async fn status_after_block(&self, round: u64) -> Result<NodeStatus> {
        let path = format!("/v2/status/wait-for-block-after/{round}");
        let dto: StatusDto = self.get(&path).await?;
        Ok(dto.into())
    }

    async fn account_info(&self, address: &Address) -> Result<AccountInfo> {
        let path = format!("/v2/accounts/{address}?exclude=all");
        let dto: AccountDto = self.get(&path).await?;
        Ok(dto.into_account(*address))
    }

    async fn application_boxes(&self, app_id: u64) -> Result<Vec<Vec<u8>>> {
        let path = format!("/v2/applications/{app_id}/boxes");
        let dto: BoxesDto = self.get(&path).await?;
        Ok(dto.into_names())
    }

    async fn box_by_name(&self, app_id: u64, name: &[u8]) -> Result<Option<Vec<u8>>> {
        let path = format!("/v2/applications/{app_id}/box");
        let dto: Option<BoxValueDto> = self
            .fetch_optional(&path, self.box_request(app_id, name))
            .await?;
        dto.map(BoxValueDto::into_value).transpose()
    }

    async fn block(&self, round: u64) -> Result<BlockHeader> {
        let path = format!("/v2/blocks/{round}?format=json");
        let dto: BlockDto = self.get(&path).await?;
        Ok(dto.into_header(round))
    }

    async fn transaction_params(&self) -> Result<TransactionParams> {
        let dto: ParamsDto = self.get("/v2/transactions/params").await?;
        Ok(dto.into())
    }

    async fn compile_program(&self, source: &str) -> Result<CompiledProgram> {
        let dto: CompileDto = self
            .post(
                "/v2/teal/compile",
                "text/plain",
                source.as_bytes().to_vec(),
            )
            .await?;
        dto.try_into()
    }

    async fn broadcast(&self, signed: &[Vec<u8>]) -> Result<String> {
        let body = signed.concat();
        let dto: BroadcastDto = self
            .post("/v2/transactions", "application/x-binary", body)
            .await
            .map_err(|err| match err {
                FaucetError::Node {
                    status: Some(400),
                    message,
                    ..
                } => FaucetError::Rejected(message),
                other => other,
            })?;
        Ok(dto.tx_id)
    }

    async fn pending_transaction(&self, txid: &str) -> Result<PendingTransaction> {
        let path = format!("/v2/transactions/pending/{txid}?format=json");
        let dto: PendingDto = self.get(&path).await?;
        Ok(dto.into())
    }
}

fn decode_b64(field: &str, raw: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(raw)
        .map_err(|e| FaucetError::Decode(format!("{field}: {e}")))
}

fn error_message(body: &[u8]) -> String {
    #[derive(Deserialize)]
    struct ErrorDto {
        message: String,
    }
    serde_json::from_slice::<ErrorDto>(body)
        .map(|dto| dto.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(body).into_owned())
}

#[derive(Deserialize)]
struct StatusDto {
    #[serde(rename = "last-round", alias = "lastRound")]
    last_round: u64,
}

impl From<StatusDto> for NodeStatus {
    fn from(dto: StatusDto) -> Self {
        NodeStatus {
            last_round: dto.last_round,
        }
    }
}

#[derive(Deserialize)]
struct AccountDto {
    #[serde(default)]
    amount: u64,
    #[serde(default, rename = "min-balance", alias = "minBalance")]
    min_balance: u64,
}

impl AccountDto {
    fn into_account(self, address: Address) -> AccountInfo {
        AccountInfo {
            address,
            amount: self.amount,
            min_balance: self.min_balance,
        }
    }
}

#[derive(Deserialize)]
struct BoxesDto {
    #[serde(default)]
    boxes: Vec<BoxNameDto>,
}

#[derive(Deserialize)]
struct BoxNameDto {
    name: String,
}

impl BoxesDto {
    /// Names that fail to decode are skipped.
    fn into_names(self) -> Vec<Vec<u8>> {
        self.boxes
            .into_iter()
            .filter_map(|b| STANDARD.decode(b.name).ok())
            .collect()
    }
}

#[derive(Deserialize)]
struct BoxValueDto {
    value: String,
}

impl BoxValueDto {
    fn into_value(self) -> Result<Vec<u8>> {
        decode_b64("box value", &self.value)
    }
}

/// Seeds appear at `block.seed`, `block.header.seed`, or top-level `seed`
/// depending on node version.
#[derive(Deserialize)]
struct BlockDto {
    block: Option<BlockBodyDto>,
    seed: Option<String>,
}

#[derive(Deserialize)]
struct BlockBodyDto {
    seed: Option<String>,
    header: Option<BlockHeaderDto>,
}

#[derive(Deserialize)]
struct BlockHeaderDto {
    seed: Option<String>,
}

impl BlockDto {
    fn into_header(self, round: u64) -> BlockHeader {
        let raw = self
            .block
            .and_then(|body| body.seed.or_else(|| body.header.and_then(|h| h.seed)))
            .or(self.seed);
        let seed = raw
            .and_then(|s| STANDARD.decode(s).ok())
            .filter(|bytes| !bytes.is_empty());
        BlockHeader { round, seed }
    }
}

#[derive(Deserialize)]
struct ParamsDto {
    #[serde(default)]
    fee: u64,
    #[serde(rename = "min-fee", alias = "minFee")]
    min_fee: u64,
    #[serde(rename = "last-round", alias = "lastRound")]
    last_round: u64,
    #[serde(rename = "genesis-id", alias = "genesisID", alias = "genesisId")]
    genesis_id: String,
    #[serde(rename = "genesis-hash", alias = "genesisHash")]
    genesis_hash: String,
}

impl From<ParamsDto> for TransactionParams {
    fn from(dto: ParamsDto) -> Self {
        TransactionParams {
            fee: dto.fee,
            min_fee: dto.min_fee,
            last_round: dto.last_round,
            genesis_id: dto.genesis_id,
            genesis_hash: dto.genesis_hash,
        }
    }
}

#[derive(Deserialize)]
struct CompileDto {
    hash: String,
    result: String,
}

impl TryFrom<CompileDto> for CompiledProgram {
    type Error = FaucetError;

    fn try_from(dto: CompileDto) -> Result<Self> {
        Ok(CompiledProgram {
            bytecode: decode_b64("compiled program", &dto.result)?,
            hash: dto.hash,
        })
    }
}

#[derive(Deserialize)]
struct BroadcastDto {
    #[serde(rename = "txId", alias = "txid")]
    tx_id: String,
}

#[derive(Deserialize)]
struct PendingDto {
    #[serde(default, rename = "confirmed-round", alias = "confirmedRound")]
    confirmed_round: Option<u64>,
    #[serde(default, rename = "pool-error", alias = "poolError")]
    pool_error: String,
}

impl From<PendingDto> for PendingTransaction {
    fn from(dto: PendingDto) -> Self {
        PendingTransaction {
            confirmed_round: dto.confirmed_round,
            pool_error: dto.pool_error,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn status__kebab_and_camel_case__normalize_to_same_round() {
        let kebab: StatusDto =
            serde_json::from_str(r#"{"last-round": 41000000, "time-since-last-round": 1200}"#)
                .unwrap();
        let camel: StatusDto = serde_json::from_str(r#"{"lastRound": 41000000}"#).unwrap();

        let kebab = NodeStatus::from(kebab);
        assert_eq!(kebab, NodeStatus::from(camel));
        assert_eq!(kebab.last_round, 41_000_000);
    }

    #[test]
    fn block__seed_under_block__is_decoded() {
        // given
        let json = r#"{"block": {"rnd": 999999, "seed": "AAAAAAAAAAgqKg=="}}"#;

        // when
        let header = serde_json::from_str::<BlockDto>(json)
            .unwrap()
            .into_header(999_999);

        // then
        assert_eq!(header.round, 999_999);
        assert_eq!(header.seed, Some(vec![0, 0, 0, 0, 0, 0, 0, 8, 42, 42]));
    }

    #[test]
    fn block__seed_under_header_or_top_level__is_found() {
        let nested = r#"{"block": {"header": {"seed": "AQ=="}}}"#;
        let top = r#"{"seed": "Ag=="}"#;

        let nested = serde_json::from_str::<BlockDto>(nested).unwrap().into_header(5);
        let top = serde_json::from_str::<BlockDto>(top).unwrap().into_header(5);

        assert_eq!(nested.seed, Some(vec![1]));
        assert_eq!(top.seed, Some(vec![2]));
    }

    #[test]
    fn block__missing_or_garbled_seed__is_none() {
        let missing = r#"{"block": {"rnd": 5}}"#;
        let garbled = r#"{"block": {"seed": "***"}}"#;

        assert_eq!(
            serde_json::from_str::<BlockDto>(missing).unwrap().into_header(5).seed,
            None
        );
        assert_eq!(
            serde_json::from_str::<BlockDto>(garbled).unwrap().into_header(5).seed,
            None
        );
    }

    #[test]
    fn params__either_naming__normalizes() {
        // given
        let kebab = r#"{"fee": 0, "min-fee": 1000, "last-round": 10,
            "genesis-id": "mainnet-v1.0", "genesis-hash": "wGHE2Pwdvd7S12BL5FaOP20EGYesN73ktiC1qzkkit8="}"#;
        let camel = r#"{"minFee": 1000, "lastRound": 10,
            "genesisID": "mainnet-v1.0", "genesisHash": "wGHE2Pwdvd7S12BL5FaOP20EGYesN73ktiC1qzkkit8="}"#;

        // when
        let a: TransactionParams = serde_json::from_str::<ParamsDto>(kebab).unwrap().into();
        let b: TransactionParams = serde_json::from_str::<ParamsDto>(camel).unwrap().into();

        // then
        assert_eq!(a, b);
        assert_eq!(a.min_fee, 1_000);
        assert_eq!(a.genesis_id, "mainnet-v1.0");
    }

    #[test]
    fn boxes__base64_names__are_decoded_and_bad_ones_skipped() {
        let json = r#"{"boxes": [{"name": "BwcH"}, {"name": "%%%"}]}"#;

        let names = serde_json::from_str::<BoxesDto>(json).unwrap().into_names();

        assert_eq!(names, vec![vec![7, 7, 7]]);
    }

    #[test]
    fn compile__result__is_decoded_to_bytecode() {
        let json = r#"{"hash": "ABC", "result": "BiAB"}"#;

        let program = CompiledProgram::try_from(serde_json::from_str::<CompileDto>(json).unwrap())
            .unwrap();

        assert_eq!(program.bytecode, vec![0x06, 0x20, 0x01]);
        assert_eq!(program.hash, "ABC");
    }

    #[test]
    fn pending__pool_error_and_round__are_read() {
        let confirmed: PendingTransaction =
            serde_json::from_str::<PendingDto>(r#"{"confirmed-round": 12, "pool-error": ""}"#)
                .unwrap()
                .into();
        let rejected: PendingTransaction =
            serde_json::from_str::<PendingDto>(r#"{"pool-error": "overspend"}"#)
                .unwrap()
                .into();

        assert_eq!(confirmed.confirmed_round, Some(12));
        assert_eq!(rejected.confirmed_round, None);
        assert_eq!(rejected.pool_error, "overspend");
    }

    #[test]
    fn error_message__json_body__extracts_message() {
        assert_eq!(error_message(br#"{"message": "no such box"}"#), "no such box");
        assert_eq!(error_message(b"plain"), "plain");
    }

    #[test]
    fn box_request__reserved_base64_characters__are_percent_encoded() {
        // given
        let client =
            AlgodClient::new("http://node.local/", None, Duration::from_secs(1)).unwrap();

        // when
        let request = client.box_request(7, &[0xfb, 0xff]).build().unwrap();

        // then
        assert_eq!(request.url().path(), "/v2/applications/7/box");
        assert_eq!(request.url().query(), Some("name=b64%3A%2B%2F8%3D"));
    }
}
