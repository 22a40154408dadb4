//! HTTP client tests against local stub servers
//!
//! Covers the wire formats of the chain RPC, swap gateway, price oracle
//! and market data clients.

use crate::support::*;
use axum::http::StatusCode;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use raydium_scalper::config::DiscoveryConfig;
use raydium_scalper::discovery::{
    CandidateSource, DexScreenerClient, DiscoveryError, GeckoTerminalScanner, MarketDataSource,
};
use raydium_scalper::models::TokenBalance;
use raydium_scalper::price_oracle::{HttpPriceOracle, OracleError, PriceOracle};
use raydium_scalper::rpc::{ChainClient, HttpChainClient, RpcError};
use raydium_scalper::swap::{HttpSwapGateway, SwapError, SwapGateway, SwapRequest};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::json;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;
use solana_sdk::transaction::VersionedTransaction;

fn rpc_result(result: serde_json::Value) -> serde_json::Value {
    json!({"jsonrpc": "2.0", "id": 1, "result": result})
}

fn chain(url: &str) -> HttpChainClient {
    HttpChainClient::new(open_session(), url, 2)
}

// =============================================================================
// CHAIN RPC
// =============================================================================

#[tokio::test]
async fn test_get_balance() {
    let server = stub_server(
        StatusCode::OK,
        rpc_result(json!({"context": {"slot": 1}, "value": 2_500_000_000u64})),
    )
    .await;
    let address = Pubkey::new_unique();

    let lamports = chain(&server.url).get_balance(&address).await.unwrap();
    assert_eq!(lamports, 2_500_000_000);

    let body = server.requests()[0].body.clone().unwrap();
    assert_eq!(body["method"], "getBalance");
    assert_eq!(body["params"][0], address.to_string());
}

#[tokio::test]
async fn test_get_parsed_token_balance() {
    let server = stub_server(
        StatusCode::OK,
        rpc_result(json!({
            "context": {"slot": 1},
            "value": {
                "data": {
                    "program": "spl-token",
                    "parsed": {
                        "info": {
                            "isNative": false,
                            "mint": "MINT",
                            "owner": "OWNER",
                            "state": "initialized",
                            "tokenAmount": {
                                "amount": "1500000",
                                "decimals": 6,
                                "uiAmount": 1.5,
                                "uiAmountString": "1.5"
                            }
                        },
                        "type": "account"
                    },
                    "space": 165
                },
                "executable": false,
                "lamports": 2039280,
                "owner": "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA",
                "rentEpoch": 0
            }
        })),
    )
    .await;

    let balance = chain(&server.url)
        .get_token_balance(&Pubkey::new_unique())
        .await
        .unwrap();
    assert_eq!(balance, Some(TokenBalance::from_raw(1_500_000, 6)));
    assert_eq!(balance.unwrap().ui_amount, Decimal::new(15, 1));

    let body = server.requests()[0].body.clone().unwrap();
    assert_eq!(body["method"], "getAccountInfo");
    assert_eq!(body["params"][1]["encoding"], "jsonParsed");
}

#[tokio::test]
async fn test_missing_token_account_is_none() {
    let server = stub_server(
        StatusCode::OK,
        rpc_result(json!({"context": {"slot": 1}, "value": null})),
    )
    .await;

    let balance = chain(&server.url)
        .get_token_balance(&Pubkey::new_unique())
        .await
        .unwrap();
    assert_eq!(balance, None);
}

#[tokio::test]
async fn test_raw_account_is_not_token_account() {
    let server = stub_server(
        StatusCode::OK,
        rpc_result(json!({
            "context": {"slot": 1},
            "value": {"data": ["AAAA", "base64"], "executable": false, "lamports": 1, "owner": "11111111111111111111111111111111"}
        })),
    )
    .await;

    let result = chain(&server.url).get_token_balance(&Pubkey::new_unique()).await;
    assert!(matches!(result, Err(RpcError::NotTokenAccount(_))));
}

#[tokio::test]
async fn test_send_transaction_encodes_base64() {
    let server = stub_server(StatusCode::OK, rpc_result(json!("5ignature"))).await;
    let payer = Keypair::new();
    let signed = raydium_scalper::swap::sign_transaction(
        unsigned_transaction(&payer.pubkey()),
        &payer,
    )
    .unwrap();

    let signature = chain(&server.url).send_transaction(&signed).await.unwrap();
    assert_eq!(signature, "5ignature");

    let body = server.requests()[0].body.clone().unwrap();
    assert_eq!(body["method"], "sendTransaction");
    assert_eq!(body["params"][1]["encoding"], "base64");
    assert_eq!(body["params"][1]["maxRetries"], 2);

    let bytes = BASE64
        .decode(body["params"][0].as_str().unwrap())
        .unwrap();
    let sent: VersionedTransaction = bincode::deserialize(&bytes).unwrap();
    assert_eq!(sent.signatures, signed.signatures);
    assert_ne!(sent.signatures[0], Signature::default());
}

#[tokio::test]
async fn test_node_error_classification() {
    let server = stub_server(
        StatusCode::OK,
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32002, "message": "Transaction simulation failed: Blockhash not found"}
        }),
    )
    .await;

    let err = chain(&server.url)
        .get_balance(&Pubkey::new_unique())
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::Node { code: -32002, .. }));
    assert!(err.is_transient());

    assert!(!node_error("Transaction simulation failed: insufficient funds").is_transient());
}

#[tokio::test]
async fn test_unavailable_node_is_transient() {
    let server = stub_server(StatusCode::SERVICE_UNAVAILABLE, json!({})).await;

    let err = chain(&server.url)
        .get_balance(&Pubkey::new_unique())
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::Status(503)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_released_session_rejects_calls() {
    let server = stub_server(StatusCode::OK, rpc_result(json!({"context": {}, "value": 1}))).await;
    let session = open_session();
    let client = HttpChainClient::new(session.clone(), server.url.clone(), 2);

    assert!(session.release());
    let err = client.get_balance(&Pubkey::new_unique()).await.unwrap_err();
    assert!(matches!(err, RpcError::Closed(_)));
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn test_stalled_rpc_body_is_transient() {
    let url = stalled_body_server().await;
    let client = HttpChainClient::new(short_timeout_session(), url, 2);

    let err = client.get_balance(&Pubkey::new_unique()).await.unwrap_err();
    assert!(matches!(err, RpcError::Transport(_)), "got {err:?}");
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_malformed_rpc_body_is_terminal() {
    let server = stub_server(StatusCode::OK, json!("garbage")).await;

    let err = chain(&server.url)
        .get_balance(&Pubkey::new_unique())
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::InvalidResponse(_)));
    assert!(!err.is_transient());
}

// =============================================================================
// SWAP GATEWAY
// =============================================================================

fn swap_request(owner: &Keypair) -> SwapRequest {
    SwapRequest {
        from_mint: raydium_scalper::constants::mints::SOL.to_string(),
        to_mint: new_token(),
        amount: "1000000000".to_string(),
        slippage: 3000,
        priority_micro_lamports: "100000".to_string(),
        owner: owner.pubkey().to_string(),
        provider: "raydium".to_string(),
    }
}

fn gateway(url: &str) -> HttpSwapGateway {
    HttpSwapGateway::new(open_session(), url, SecretString::new("test-key".to_string()))
}

#[tokio::test]
async fn test_swap_gateway_returns_decoded_transaction() {
    let owner = Keypair::new();
    let unsigned = unsigned_transaction(&owner.pubkey());
    let encoded = BASE64.encode(bincode::serialize(&unsigned).unwrap());
    let server = stub_server(
        StatusCode::OK,
        json!({"success": true, "data": {"base64Transaction": encoded}}),
    )
    .await;

    let request = swap_request(&owner);
    let transaction = gateway(&server.url).unsigned_transaction(&request).await.unwrap();
    assert_eq!(transaction.message, unsigned.message);

    let recorded = &server.requests()[0];
    assert_eq!(recorded.api_key.as_deref(), Some("test-key"));
    let query = recorded.query.clone().unwrap();
    for expected in [
        format!("fromMint={}", request.from_mint),
        format!("toMint={}", request.to_mint),
        "amount=1000000000".to_string(),
        "slippage=3000".to_string(),
        "priorityMicroLamports=100000".to_string(),
        format!("owner={}", request.owner),
        "provider=raydium".to_string(),
    ] {
        assert!(query.contains(&expected), "{expected} missing from {query}");
    }
}

#[tokio::test]
async fn test_swap_gateway_rejection() {
    let server = stub_server(
        StatusCode::OK,
        json!({"success": false, "message": "Insufficient liquidity"}),
    )
    .await;

    let err = gateway(&server.url)
        .unsigned_transaction(&swap_request(&Keypair::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, SwapError::Rejected(ref m) if m == "Insufficient liquidity"));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_swap_gateway_missing_transaction() {
    let server = stub_server(StatusCode::OK, json!({"success": true, "data": {}})).await;

    let err = gateway(&server.url)
        .unsigned_transaction(&swap_request(&Keypair::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, SwapError::MissingField("data.base64Transaction")));
}

#[tokio::test]
async fn test_stalled_gateway_body_is_transient() {
    let url = stalled_body_server().await;
    let gateway = HttpSwapGateway::new(
        short_timeout_session(),
        url,
        SecretString::new("test-key".to_string()),
    );

    let err = gateway
        .unsigned_transaction(&swap_request(&Keypair::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, SwapError::Transport(_)), "got {err:?}");
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_malformed_gateway_body_is_terminal() {
    let server = stub_server(StatusCode::OK, json!("not an object")).await;

    let err = gateway(&server.url)
        .unsigned_transaction(&swap_request(&Keypair::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, SwapError::Decode(_)));
    assert!(!err.is_transient());
}

// =============================================================================
// PRICE ORACLE
// =============================================================================

#[tokio::test]
async fn test_oracle_price() {
    let mint = new_token();
    let mut data = serde_json::Map::new();
    data.insert(mint.clone(), json!({"id": mint.clone(), "price": "0.5"}));
    let server = stub_server(StatusCode::OK, json!({"data": data, "timeTaken": 0.01})).await;

    let price = HttpPriceOracle::new(open_session(), server.url.clone())
        .price_usd(&mint)
        .await
        .unwrap();
    assert_eq!(price, Decimal::new(5, 1));
    assert_eq!(server.requests()[0].query, Some(format!("ids={mint}")));
}

#[tokio::test]
async fn test_oracle_rate_limited() {
    let server = stub_server(StatusCode::TOO_MANY_REQUESTS, json!({})).await;

    let result = HttpPriceOracle::new(open_session(), server.url.clone())
        .price_usd(&new_token())
        .await;
    assert!(matches!(result, Err(OracleError::RateLimited)));
}

// =============================================================================
// MARKET DATA
// =============================================================================

#[tokio::test]
async fn test_dexscreener_first_pair() {
    let mint = new_token();
    let server = stub_server(
        StatusCode::OK,
        json!([
            {"pairAddress": "FIRST", "marketCap": 750000, "txns": {"m5": {"buys": 5, "sells": 2}}},
            {"pairAddress": "SECOND", "marketCap": 1}
        ]),
    )
    .await;

    let pair = DexScreenerClient::new(open_session(), format!("{}/token-pairs/v1/solana", server.url))
        .pair_data(&mint)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pair.pair_address.as_deref(), Some("FIRST"));
    assert_eq!(pair.market_cap, Some(Decimal::from(750_000)));
    assert_eq!(server.requests()[0].path, format!("/token-pairs/v1/solana/{mint}"));
}

#[tokio::test]
async fn test_dexscreener_no_pairs() {
    let server = stub_server(StatusCode::OK, json!([])).await;

    let pair = DexScreenerClient::new(open_session(), server.url.clone())
        .pair_data(&new_token())
        .await
        .unwrap();
    assert!(pair.is_none());
}

#[tokio::test]
async fn test_dexscreener_error_status() {
    let server = stub_server(StatusCode::BAD_GATEWAY, json!({})).await;

    let result = DexScreenerClient::new(open_session(), server.url.clone())
        .pair_data(&new_token())
        .await;
    assert!(matches!(result, Err(DiscoveryError::Status(502))));
}

#[tokio::test]
async fn test_trending_scan() {
    let pool = |id: &str, change: &str| {
        json!({
            "id": format!("solana_{id}pool"),
            "type": "pool",
            "attributes": {
                "name": format!("{id} / SOL"),
                "reserve_in_usd": "250000.5",
                "volume_usd": {"h1": "800000"},
                "price_change_percentage": {"h1": change},
                "transactions": {"h1": {"buys": 600, "sells": 200}}
            },
            "relationships": {"base_token": {"data": {"id": format!("solana_{id}")}}}
        })
    };
    let server = stub_server(
        StatusCode::OK,
        json!({"data": [pool("AAA", "4.5"), pool("BBB", "30"), pool("CCC", "-2")]}),
    )
    .await;

    let config = DiscoveryConfig {
        trending_url: server.url.clone(),
        ..DiscoveryConfig::default()
    };
    let candidates = GeckoTerminalScanner::new(open_session(), config)
        .candidates()
        .await
        .unwrap();

    let addresses: Vec<&str> = candidates.iter().map(|c| c.address.as_str()).collect();
    assert_eq!(addresses, vec!["BBB", "AAA"]);
    assert_eq!(candidates[0].name, "BBB / SOL");

    let query = server.requests()[0].query.clone().unwrap();
    assert!(query.contains("include=address"));
    assert!(query.contains("duration=1h"));
}
