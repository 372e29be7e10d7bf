//! HTTP surface for the shielded ledger.
//!
//! One process owns one ledger instance behind a mutex; handlers lock it,
//! run one state-machine call, sync the store, and answer. All 32-byte
//! values travel as 0x-prefixed hex.

use std::{
    env,
    sync::{Arc, Mutex},
};

use axum::{
    extract::{Path as AxumPath, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use uuid::Uuid;
use zkpl_common::{hex32, parse_hex32, KeyType, OutputCiphertext};
use zkpl_ledger::custody::Approval;
use zkpl_ledger::{DigestBindingVerifier, InMemoryCustody, LedgerError, ShieldedLedger};

pub mod store;

pub use store::LedgerStore;

const LEDGER_DB_ENV: &str = "ZKPL_LEDGER_DB";
const DEFAULT_LEDGER_DB_PATH: &str = "data/ledger.db";
const BIND_ADDR_ENV: &str = "ZKPL_BIND_ADDR";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const ASSET_ID_ENV: &str = "ZKPL_ASSET_ID";
const DEFAULT_ASSET_ID: &str = "USDC";
const VERIFICATION_KEY_ENV: &str = "ZKPL_VERIFICATION_KEY";
const DEFAULT_VERIFICATION_KEY: &[u8] = b"zkpl-dev-vkey";
const ENABLE_SECP256R1_ENV: &str = "ZKPL_ENABLE_SECP256R1";
const DEV_ACCOUNT_ENV: &str = "ZKPL_DEV_ACCOUNT";
const DEV_BALANCE_ENV: &str = "ZKPL_DEV_BALANCE";

const CODE_INVALID_REQUEST: &str = "INVALID_REQUEST";
const CODE_NOT_FOUND: &str = "NOT_FOUND";
const CODE_STORE: &str = "STORE_ERROR";

#[derive(Clone)]
pub struct AppState {
    ledger: Arc<Mutex<ShieldedLedger>>,
    store: LedgerStore,
}

impl AppState {
    pub fn new(ledger: ShieldedLedger, store: LedgerStore) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(ledger)),
            store,
        }
    }

    /// Build the production state: open the store, replay persisted leaves,
    /// install the verifier, seed any devnet account.
    pub fn from_env() -> Result<Self, sled::Error> {
        let db_path =
            env::var(LEDGER_DB_ENV).unwrap_or_else(|_| DEFAULT_LEDGER_DB_PATH.to_string());
        let store = LedgerStore::persistent(&db_path)?;
        let persisted = store.load()?;

        let asset = env::var(ASSET_ID_ENV).unwrap_or_else(|_| DEFAULT_ASSET_ID.to_string());
        let mut custody =
            InMemoryCustody::new(asset).with_pool_balance(persisted.total_deposited);
        if let Ok(account) = env::var(DEV_ACCOUNT_ENV) {
            let balance = env::var(DEV_BALANCE_ENV)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            custody = custody.with_account(account, balance);
        }

        let mut ledger = ShieldedLedger::restore(
            Box::new(custody),
            &persisted.leaves,
            &persisted.nullifiers,
            persisted.total_deposited,
            persisted.metadata,
            persisted.ciphertexts,
        );

        let vkey = match env::var(VERIFICATION_KEY_ENV) {
            Ok(value) => hex::decode(value.trim_start_matches("0x"))
                .unwrap_or_else(|_| DEFAULT_VERIFICATION_KEY.to_vec()),
            Err(_) => DEFAULT_VERIFICATION_KEY.to_vec(),
        };
        ledger.install_verifier(Box::new(DigestBindingVerifier), vkey);

        if matches!(
            env::var(ENABLE_SECP256R1_ENV).as_deref(),
            Ok("1") | Ok("true")
        ) {
            ledger.enable_secp256r1();
        }

        info!(
            leaves = persisted.leaves.len(),
            nullifiers = persisted.nullifiers.len(),
            total_deposited = persisted.total_deposited,
            "ledger state replayed"
        );
        Ok(Self::new(ledger, store))
    }
}

struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, CODE_INVALID_REQUEST, message)
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, CODE_NOT_FOUND, message)
    }

    fn store(err: sled::Error) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            CODE_STORE,
            err.to_string(),
        )
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let status = StatusCode::from_u16(err.suggested_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, err.error_code(), err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    error_code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message,
            error_code: self.code,
        };
        (self.status, Json(body)).into_response()
    }
}

// ----------------------------------------------------------------------
// Wire types
// ----------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
pub struct CiphertextWire {
    pub commitment: String,
    pub key_type: u8,
    pub ephemeral_pubkey: String,
    pub nonce: String,
    pub ciphertext: String,
}

impl CiphertextWire {
    fn decode(&self) -> Result<OutputCiphertext, ApiError> {
        let key_type = KeyType::from_u8(self.key_type)
            .ok_or(LedgerError::UnsupportedKeyType(self.key_type))?;
        let nonce_bytes = decode_hex(&self.nonce)?;
        let nonce: [u8; 12] = nonce_bytes
            .try_into()
            .map_err(|_| ApiError::bad_request("nonce must be 12 bytes"))?;
        Ok(OutputCiphertext {
            commitment: parse_hex32(&self.commitment).map_err(ApiError::from_parse)?,
            key_type,
            ephemeral_pubkey: decode_hex(&self.ephemeral_pubkey)?,
            nonce,
            ciphertext: decode_hex(&self.ciphertext)?,
        })
    }

    pub fn encode(ct: &OutputCiphertext) -> Self {
        Self {
            commitment: hex32(&ct.commitment),
            key_type: ct.key_type.as_u8(),
            ephemeral_pubkey: format!("0x{}", hex::encode(&ct.ephemeral_pubkey)),
            nonce: format!("0x{}", hex::encode(ct.nonce)),
            ciphertext: format!("0x{}", hex::encode(&ct.ciphertext)),
        }
    }
}

impl ApiError {
    fn from_parse(err: anyhow::Error) -> Self {
        Self::bad_request(err.to_string())
    }
}

fn decode_hex(s: &str) -> Result<Vec<u8>, ApiError> {
    hex::decode(s.strip_prefix("0x").unwrap_or(s))
        .map_err(|e| ApiError::bad_request(format!("invalid hex: {e}")))
}

#[derive(Deserialize)]
pub struct DepositRequest {
    pub commitment: String,
    pub ciphertext: CiphertextWire,
    pub amount: u64,
    pub depositor: String,
    pub metadata: Option<String>,
}

#[derive(Deserialize)]
pub struct ApprovalWire {
    pub token: String,
    pub amount: u64,
    pub nonce: u64,
}

#[derive(Deserialize)]
pub struct ApprovedDepositRequest {
    #[serde(flatten)]
    pub deposit: DepositRequest,
    pub approval: ApprovalWire,
    pub signature: String,
}

#[derive(Serialize)]
pub struct DepositResponse {
    pub tx_id: Uuid,
    pub leaf_index: u64,
    pub new_root: String,
}

#[derive(Deserialize)]
pub struct TransferRequest {
    pub encrypted_outputs: Vec<CiphertextWire>,
    pub proof: String,
    pub public_values: String,
    #[serde(default)]
    pub output_metadata: Vec<Option<String>>,
}

#[derive(Serialize)]
pub struct TransferResponse {
    pub tx_id: Uuid,
    pub new_root: String,
    pub next_leaf_index: u64,
}

#[derive(Deserialize)]
pub struct WithdrawRequest {
    pub recipient: String,
    pub amount: u64,
    pub proof: String,
    pub public_values: String,
    #[serde(default)]
    pub change_outputs: Vec<CiphertextWire>,
}

#[derive(Deserialize)]
pub struct DepositAndTransferRequest {
    pub deposit_commitment: String,
    pub encrypted_outputs: Vec<CiphertextWire>,
    pub proof: String,
    pub public_values: String,
    pub amount: u64,
    pub depositor: String,
}

#[derive(Serialize)]
pub struct RootResponse {
    pub root: String,
    pub next_leaf_index: u64,
}

#[derive(Serialize)]
pub struct NullifierResponse {
    pub nullifier: String,
    pub used: bool,
}

#[derive(Serialize)]
pub struct BalanceResponse {
    pub total_deposited: u64,
    pub pool_balance: u64,
}

#[derive(Serialize)]
pub struct MetadataResponse {
    pub commitment: String,
    pub metadata: String,
}

#[derive(Serialize)]
pub struct ProofResponse {
    pub leaf_index: u64,
    pub siblings: Vec<String>,
}

// ----------------------------------------------------------------------
// Router and handlers
// ----------------------------------------------------------------------

pub async fn serve() -> anyhow::Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = app_router(AppState::from_env()?).layer(cors);
    let addr = env::var(BIND_ADDR_ENV).unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    info!(%addr, "listening");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/ledger/root", get(get_root))
        .route("/ledger/balance", get(get_balance))
        .route("/ledger/nullifier/:nullifier", get(get_nullifier))
        .route("/ledger/metadata/:commitment", get(get_metadata))
        .route("/ledger/ciphertext/:commitment", get(get_ciphertext))
        .route("/ledger/proof/:leaf_index", get(get_proof))
        .route("/ledger/deposit", post(deposit_handler))
        .route(
            "/ledger/deposit-with-approval",
            post(approved_deposit_handler),
        )
        .route("/ledger/transfer", post(transfer_handler))
        .route("/ledger/withdraw", post(withdraw_handler))
        .route(
            "/ledger/deposit-and-transfer",
            post(deposit_and_transfer_handler),
        )
        .with_state(state)
}

fn lock_ledger(state: &AppState) -> std::sync::MutexGuard<'_, ShieldedLedger> {
    match state.ledger.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

async fn get_root(State(state): State<AppState>) -> Json<RootResponse> {
    let ledger = lock_ledger(&state);
    Json(RootResponse {
        root: hex32(&ledger.current_root()),
        next_leaf_index: ledger.next_leaf_index(),
    })
}

async fn get_balance(State(state): State<AppState>) -> Json<BalanceResponse> {
    let ledger = lock_ledger(&state);
    Json(BalanceResponse {
        total_deposited: ledger.total_deposited(),
        pool_balance: ledger.pool_balance(),
    })
}

async fn get_nullifier(
    State(state): State<AppState>,
    AxumPath(nullifier): AxumPath<String>,
) -> Result<Json<NullifierResponse>, ApiError> {
    let parsed = parse_hex32(&nullifier).map_err(ApiError::from_parse)?;
    let ledger = lock_ledger(&state);
    Ok(Json(NullifierResponse {
        nullifier: hex32(&parsed),
        used: ledger.nullifier_used(&parsed),
    }))
}

async fn get_metadata(
    State(state): State<AppState>,
    AxumPath(commitment): AxumPath<String>,
) -> Result<Json<MetadataResponse>, ApiError> {
    let parsed = parse_hex32(&commitment).map_err(ApiError::from_parse)?;
    let ledger = lock_ledger(&state);
    let blob = ledger
        .metadata_of(&parsed)
        .ok_or_else(|| ApiError::not_found(format!("no metadata for {}", hex32(&parsed))))?;
    Ok(Json(MetadataResponse {
        commitment: hex32(&parsed),
        metadata: format!("0x{}", hex::encode(blob)),
    }))
}

async fn get_ciphertext(
    State(state): State<AppState>,
    AxumPath(commitment): AxumPath<String>,
) -> Result<Json<CiphertextWire>, ApiError> {
    let parsed = parse_hex32(&commitment).map_err(ApiError::from_parse)?;
    let ledger = lock_ledger(&state);
    let ciphertext = ledger
        .ciphertext_of(&parsed)
        .ok_or_else(|| ApiError::not_found(format!("no ciphertext for {}", hex32(&parsed))))?;
    Ok(Json(CiphertextWire::encode(ciphertext)))
}

async fn get_proof(
    State(state): State<AppState>,
    AxumPath(leaf_index): AxumPath<u64>,
) -> Result<Json<ProofResponse>, ApiError> {
    let ledger = lock_ledger(&state);
    let proof = ledger
        .prove_leaf(leaf_index as usize)
        .ok_or_else(|| ApiError::not_found(format!("no leaf at index {leaf_index}")))?;
    Ok(Json(ProofResponse {
        leaf_index: proof.leaf_index,
        siblings: proof.siblings.iter().map(hex32).collect(),
    }))
}

async fn deposit_handler(
    State(state): State<AppState>,
    Json(req): Json<DepositRequest>,
) -> Result<Json<DepositResponse>, ApiError> {
    let commitment = parse_hex32(&req.commitment).map_err(ApiError::from_parse)?;
    let ciphertext = req.ciphertext.decode()?;
    let metadata = req.metadata.as_deref().map(decode_hex).transpose()?;

    let mut ledger = lock_ledger(&state);
    let leaf_index = ledger.deposit(
        commitment,
        &ciphertext,
        req.amount,
        &req.depositor,
        metadata.as_deref(),
    )?;
    commit(&state, &mut ledger)?;
    Ok(Json(DepositResponse {
        tx_id: Uuid::new_v4(),
        leaf_index,
        new_root: hex32(&ledger.current_root()),
    }))
}

async fn approved_deposit_handler(
    State(state): State<AppState>,
    Json(req): Json<ApprovedDepositRequest>,
) -> Result<Json<DepositResponse>, ApiError> {
    let commitment = parse_hex32(&req.deposit.commitment).map_err(ApiError::from_parse)?;
    let ciphertext = req.deposit.ciphertext.decode()?;
    let metadata = req.deposit.metadata.as_deref().map(decode_hex).transpose()?;
    let signature = decode_hex(&req.signature)?;
    let approval = Approval {
        token: req.approval.token,
        amount: req.approval.amount,
        nonce: req.approval.nonce,
    };

    let mut ledger = lock_ledger(&state);
    let leaf_index = ledger.deposit_with_approval(
        commitment,
        &ciphertext,
        req.deposit.amount,
        &approval,
        &signature,
        &req.deposit.depositor,
        metadata.as_deref(),
    )?;
    commit(&state, &mut ledger)?;
    Ok(Json(DepositResponse {
        tx_id: Uuid::new_v4(),
        leaf_index,
        new_root: hex32(&ledger.current_root()),
    }))
}

async fn transfer_handler(
    State(state): State<AppState>,
    Json(req): Json<TransferRequest>,
) -> Result<Json<TransferResponse>, ApiError> {
    let outputs = decode_ciphertexts(&req.encrypted_outputs)?;
    let proof = decode_hex(&req.proof)?;
    let public_values = decode_hex(&req.public_values)?;
    let metadata = req
        .output_metadata
        .iter()
        .map(|m| m.as_deref().map(decode_hex).transpose())
        .collect::<Result<Vec<_>, _>>()?;

    let mut ledger = lock_ledger(&state);
    ledger.submit_transfer(&outputs, &proof, &public_values, &metadata)?;
    commit(&state, &mut ledger)?;
    Ok(Json(TransferResponse {
        tx_id: Uuid::new_v4(),
        new_root: hex32(&ledger.current_root()),
        next_leaf_index: ledger.next_leaf_index(),
    }))
}

async fn withdraw_handler(
    State(state): State<AppState>,
    Json(req): Json<WithdrawRequest>,
) -> Result<Json<TransferResponse>, ApiError> {
    let change = decode_ciphertexts(&req.change_outputs)?;
    let proof = decode_hex(&req.proof)?;
    let public_values = decode_hex(&req.public_values)?;

    let mut ledger = lock_ledger(&state);
    ledger.withdraw(&req.recipient, req.amount, &proof, &public_values, &change)?;
    commit(&state, &mut ledger)?;
    Ok(Json(TransferResponse {
        tx_id: Uuid::new_v4(),
        new_root: hex32(&ledger.current_root()),
        next_leaf_index: ledger.next_leaf_index(),
    }))
}

async fn deposit_and_transfer_handler(
    State(state): State<AppState>,
    Json(req): Json<DepositAndTransferRequest>,
) -> Result<Json<TransferResponse>, ApiError> {
    let deposit_commitment =
        parse_hex32(&req.deposit_commitment).map_err(ApiError::from_parse)?;
    let outputs = decode_ciphertexts(&req.encrypted_outputs)?;
    let proof = decode_hex(&req.proof)?;
    let public_values = decode_hex(&req.public_values)?;

    let mut ledger = lock_ledger(&state);
    ledger.deposit_and_transfer(
        deposit_commitment,
        &outputs,
        &proof,
        &public_values,
        req.amount,
        &req.depositor,
    )?;
    commit(&state, &mut ledger)?;
    Ok(Json(TransferResponse {
        tx_id: Uuid::new_v4(),
        new_root: hex32(&ledger.current_root()),
        next_leaf_index: ledger.next_leaf_index(),
    }))
}

fn decode_ciphertexts(wires: &[CiphertextWire]) -> Result<Vec<OutputCiphertext>, ApiError> {
    wires.iter().map(CiphertextWire::decode).collect()
}

/// Persist after a successful state change. The store reads the ledger
/// state directly; drained events go to the log for external indexers.
fn commit(state: &AppState, ledger: &mut ShieldedLedger) -> Result<(), ApiError> {
    for event in ledger.drain_events() {
        tracing::debug!(event = ?event, "ledger event");
    }
    state.store.sync(ledger).map_err(ApiError::store)
}
