use std::{
    collections::BTreeSet,
    convert::Infallible,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use hyper::{
    service::{make_service_fn, service_fn},
    Body, Request, Response, Server,
};
use medialane_feed::{
    api::EmittedEvent,
    config::{Collection, Config},
    decode::Selectors,
    felt,
};
use serde_json::{json, Value};

pub const COLLECTION: &str = "0x0123";
pub const MARKETPLACE: &str = "0x0456";
pub const ALICE: &str = "0xa11ce";
pub const BOB: &str = "0xb0b";
pub const HEAD: u64 = 30;

pub fn block_timestamp(block_number: u64) -> u64 {
    1_000 + block_number * 10
}

/// In-process stand-in for a Starknet JSON-RPC node.
pub struct MockNode {
    pub head: u64,
    pub events: Vec<EmittedEvent>,
    pub fail_events: AtomicBool,
    pub event_calls: AtomicUsize,
    pub header_calls: AtomicUsize,
}

impl MockNode {
    /// 20 mints, one transfer sharing a tx with a mint, a listing, a sale,
    /// one unknown event and one malformed transfer.
    pub fn medialane() -> Self {
        let selectors = Selectors::default();
        let mut events = Vec::new();
        let event = |from: &str, block: u64, tx: String, keys: Vec<String>, data: Vec<&str>| {
            EmittedEvent {
                from_address: from.to_owned(),
                keys,
                data: data.into_iter().map(str::to_owned).collect(),
                block_hash: Some(format!("0x{:x}", block)),
                block_number: Some(block),
                transaction_hash: tx,
            }
        };

        for block in 1..=20u64 {
            let owner = if block % 2 == 0 { ALICE } else { BOB };
            events.push(event(
                COLLECTION,
                block,
                format!("0x{:x}a", block),
                vec![
                    selectors.transfer.clone(),
                    "0x0".to_owned(),
                    owner.to_owned(),
                    format!("0x{:x}", block),
                    "0x0".to_owned(),
                ],
                vec![],
            ));
            if block == 12 {
                events.push(event(
                    COLLECTION,
                    block,
                    "0xca".to_owned(),
                    vec![
                        selectors.transfer.clone(),
                        ALICE.to_owned(),
                        BOB.to_owned(),
                        "0xc".to_owned(),
                        "0x0".to_owned(),
                    ],
                    vec![],
                ));
            }
        }
        events.push(event(
            MARKETPLACE,
            21,
            "0x21".to_owned(),
            vec![
                selectors.order_created.clone(),
                "0x0de7".to_owned(),
                ALICE.to_owned(),
            ],
            vec![COLLECTION, "0x2", "0x0", "0x3e8", "0x0", "0x0"],
        ));
        events.push(event(
            MARKETPLACE,
            22,
            "0x22".to_owned(),
            vec![
                selectors.order_fulfilled.clone(),
                "0x0de7".to_owned(),
                ALICE.to_owned(),
                BOB.to_owned(),
            ],
            vec![COLLECTION, "0x2", "0x0", "0x3e8", "0x0"],
        ));
        events.push(event(
            COLLECTION,
            23,
            "0x23".to_owned(),
            vec![felt::starknet_keccak(b"Approval"), ALICE.to_owned()],
            vec![],
        ));
        events.push(event(
            COLLECTION,
            24,
            "0x24".to_owned(),
            vec![selectors.transfer.clone(), ALICE.to_owned()],
            vec![],
        ));

        Self {
            head: HEAD,
            events,
            fail_events: AtomicBool::new(false),
            event_calls: AtomicUsize::new(0),
            header_calls: AtomicUsize::new(0),
        }
    }

    /// Blocks holding at least one event.
    pub fn event_blocks(&self) -> BTreeSet<u64> {
        self.events.iter().filter_map(|e| e.block_number).collect()
    }

    fn respond(&self, request: &Value) -> Value {
        let id = request["id"].clone();
        let params = &request["params"];
        let result = match request["method"].as_str().unwrap_or_default() {
            "starknet_blockNumber" => json!(self.head),
            "starknet_chainId" => json!("0x534e5f5345504f4c4941"),
            "starknet_getEvents" => {
                self.event_calls.fetch_add(1, Ordering::SeqCst);
                if self.fail_events.load(Ordering::SeqCst) {
                    return rpc_error(id, -32603, "Internal error");
                }
                self.events_chunk(&params["filter"])
            }
            "starknet_getBlockWithTxHashes" => {
                self.header_calls.fetch_add(1, Ordering::SeqCst);
                let number = params["block_id"]["block_number"].as_u64().unwrap();
                json!({
                    "status": "ACCEPTED_ON_L2",
                    "block_hash": format!("0x{:x}", number),
                    "block_number": number,
                    "timestamp": block_timestamp(number),
                    "transactions": []
                })
            }
            "starknet_getTransactionReceipt" => {
                let hash = params["transaction_hash"].as_str().unwrap();
                let events: Vec<&EmittedEvent> = self
                    .events
                    .iter()
                    .filter(|e| e.transaction_hash == hash)
                    .collect();
                if events.is_empty() {
                    return rpc_error(id, 29, "Transaction hash not found");
                }
                json!({
                    "type": "INVOKE",
                    "transaction_hash": hash,
                    "block_number": events[0].block_number,
                    "execution_status": "SUCCEEDED",
                    "events": events
                        .iter()
                        .map(|e| json!({"from_address": e.from_address, "keys": e.keys, "data": e.data}))
                        .collect::<Vec<_>>()
                })
            }
            _ => return rpc_error(id, -32601, "Method not found"),
        };
        json!({"jsonrpc": "2.0", "id": id, "result": result})
    }

    fn events_chunk(&self, filter: &Value) -> Value {
        let from = filter["from_block"]["block_number"].as_u64().unwrap();
        let to = filter["to_block"]["block_number"].as_u64().unwrap();
        let address = felt::normalize(filter["address"].as_str().unwrap()).unwrap();
        let chunk_size = filter["chunk_size"].as_u64().unwrap() as usize;
        let offset = filter["continuation_token"]
            .as_str()
            .map(|t| t.parse::<usize>().unwrap())
            .unwrap_or(0);

        let matching: Vec<&EmittedEvent> = self
            .events
            .iter()
            .filter(|e| {
                let block = e.block_number.unwrap();
                block >= from && block <= to && felt::normalize(&e.from_address).unwrap() == address
            })
            .collect();
        let end = matching.len().min(offset + chunk_size);
        let token = (end < matching.len()).then(|| end.to_string());
        let page = &matching[offset.min(end)..end];
        json!({
            "events": page,
            "continuation_token": token
        })
    }
}

fn rpc_error(id: Value, code: i64, message: &str) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}})
}

async fn handle(node: Arc<MockNode>, req: Request<Body>) -> Result<Response<Body>, Infallible> {
    let bytes = hyper::body::to_bytes(req.into_body()).await.unwrap();
    let request: Value = serde_json::from_slice(&bytes).unwrap();
    Ok(Response::new(Body::from(node.respond(&request).to_string())))
}

/// Serves the node on an ephemeral port and returns its endpoint.
pub fn serve(node: Arc<MockNode>) -> String {
    let make_svc = make_service_fn(move |_conn| {
        let node = Arc::clone(&node);
        async move { Ok::<_, Infallible>(service_fn(move |req| handle(Arc::clone(&node), req))) }
    });
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let server = Server::bind(&addr).serve(make_svc);
    let endpoint = format!("http://{}", server.local_addr());
    tokio::spawn(async move {
        if let Err(e) = server.await {
            log::error!("mock node failed: {}", e);
        }
    });
    endpoint
}

pub fn config(endpoint: String) -> Config {
    Config {
        rpc_endpoint: endpoint,
        start_block: 1,
        block_window: 5,
        events_chunk_size: 2,
        collections: vec![Collection {
            address: COLLECTION.to_owned(),
            label: "Nova".to_owned(),
        }],
        marketplace: Some(MARKETPLACE.to_owned()),
        ..Default::default()
    }
}

pub fn init_logger() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}
