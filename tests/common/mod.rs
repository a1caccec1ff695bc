#![allow(dead_code)]

use pixflow::domain::ports::StoreHandle;
use pixflow::domain::transfer::TransferRequest;
use pixflow::infrastructure::in_memory::InMemoryStore;
use pixflow::infrastructure::seed::SeedData;
use rust_decimal::Decimal;
use std::sync::Arc;

pub const SEED_PATH: &str = "tests/fixtures/seed.json";

pub const ANA: &str = "cust-ana";
pub const ANA_ACCOUNT: &str = "acc-ana";
pub const ANA_CARD: &str = "card-ana";
pub const BOB: &str = "cust-bob";
pub const BOB_ACCOUNT: &str = "acc-bob";
pub const BOB_PHONE: &str = "+5511987654321";
pub const CID: &str = "cust-cid";

/// In-memory store loaded with the fixture seed. The concrete handle is
/// returned too so tests can inject faults.
pub async fn seeded_store() -> (Arc<InMemoryStore>, StoreHandle) {
    let memory = Arc::new(InMemoryStore::new());
    let store: StoreHandle = memory.clone();
    SeedData::load(SEED_PATH)
        .unwrap()
        .apply(&store)
        .await
        .unwrap();
    (memory, store)
}

/// Balance-funded transfer from Ana to `key`.
pub fn transfer_to(key: &str, amount: Decimal, token: &str) -> TransferRequest {
    TransferRequest {
        idempotency_key: token.into(),
        source_account_id: ANA_ACCOUNT.into(),
        destination_key_value: key.into(),
        amount,
        ..Default::default()
    }
}
