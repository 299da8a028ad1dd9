use actix_web::{web, HttpResponse, Responder};
use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::blockchain::{Address, Block, Transaction};
use crate::node::Node;

/// Shared node state; one lock serializes every chain mutation
pub type NodeData = web::Data<Mutex<Node>>;

/// Request for the transact endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct TransactRequest {
    /// The recipient's address
    pub recipient: Address,

    /// The amount to transfer
    pub amount: u64,
}

fn lock_node(node: &NodeData) -> Result<MutexGuard<'_, Node>, HttpResponse> {
    node.lock().map_err(|_| {
        error!("Node state lock is poisoned");
        HttpResponse::InternalServerError().json(json!({
            "error": "Node state is unavailable"
        }))
    })
}

/// Get the full blockchain
pub async fn get_blocks(node: NodeData) -> impl Responder {
    let node = match lock_node(&node) {
        Ok(node) => node,
        Err(response) => return response,
    };

    HttpResponse::Ok().json(node.blockchain().chain())
}

/// Offer a chain received from a peer
///
/// The chain is adopted only when it is longer than ours and fully valid.
pub async fn receive_chain(node: NodeData, chain: web::Json<Vec<Block>>) -> impl Responder {
    let mut node = match lock_node(&node) {
        Ok(node) => node,
        Err(response) => return response,
    };

    match node.receive_chain(chain.into_inner()) {
        Ok(()) => HttpResponse::Ok().json(json!({
            "message": "Chain replaced",
            "length": node.blockchain().len()
        })),
        Err(err) => HttpResponse::Conflict().json(json!({
            "error": err.to_string()
        })),
    }
}

/// Send coins from the node wallet
pub async fn transact(node: NodeData, transact_req: web::Json<TransactRequest>) -> impl Responder {
    let mut node = match lock_node(&node) {
        Ok(node) => node,
        Err(response) => return response,
    };

    let TransactRequest { recipient, amount } = transact_req.into_inner();
    match node.transact(recipient, amount) {
        Ok(transaction) => HttpResponse::Created().json(transaction),
        Err(err) => HttpResponse::BadRequest().json(json!({
            "error": err.to_string()
        })),
    }
}

/// Get the pending transactions keyed by id
pub async fn get_transaction_pool_map(node: NodeData) -> impl Responder {
    let node = match lock_node(&node) {
        Ok(node) => node,
        Err(response) => return response,
    };

    HttpResponse::Ok().json(node.pool().transaction_map())
}

/// Replace the pending transactions with a snapshot from a peer
pub async fn receive_transaction_pool_map(
    node: NodeData,
    transaction_map: web::Json<HashMap<String, Transaction>>,
) -> impl Responder {
    let mut node = match lock_node(&node) {
        Ok(node) => node,
        Err(response) => return response,
    };

    node.receive_pool(transaction_map.into_inner());

    HttpResponse::Ok().json(json!({
        "message": "Transaction pool replaced",
        "size": node.pool().len()
    }))
}

/// Mine the pending transactions into a new block
///
/// Mining runs on the blocking thread pool while holding the node lock.
pub async fn mine_transactions(node: NodeData) -> impl Responder {
    let node = node.into_inner();

    let mined = web::block(move || {
        let mut node = node.lock().map_err(|_| "Node state is unavailable")?;
        Ok::<Block, &'static str>(node.mine_transactions())
    })
    .await;

    match mined {
        Ok(Ok(block)) => {
            info!("Block {} mined over HTTP", block.hash);
            HttpResponse::Ok().json(block)
        }
        Ok(Err(err)) => HttpResponse::InternalServerError().json(json!({ "error": err })),
        Err(err) => HttpResponse::InternalServerError().json(json!({
            "error": format!("Failed to mine block: {}", err)
        })),
    }
}

/// Get the node wallet address and its balance replayed from the chain
pub async fn get_wallet_info(node: NodeData) -> impl Responder {
    let node = match lock_node(&node) {
        Ok(node) => node,
        Err(response) => return response,
    };

    HttpResponse::Ok().json(node.wallet_info())
}
