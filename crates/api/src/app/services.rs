//! Service construction: pick a storage backend from the environment and
//! hand every service its store handle.

use std::sync::Arc;

use campusbill_auth::Hs256TokenCodec;
use campusbill_infra::services::{
    InvoiceService, PaymentService, SchoolService, StatementService, StudentService, UserService,
};
use campusbill_infra::store::{BillingStore, InMemoryStore, PostgresStore, UserStore};

#[cfg(feature = "redis")]
use campusbill_infra::store::CachedBillingStore;

/// Handles to every application service, shared across handlers.
///
/// Services are store-agnostic (`Arc<dyn BillingStore>` inside), so this is
/// the same struct whether the process runs on the in-memory store or on
/// Postgres.
#[derive(Clone)]
pub struct AppServices {
    pub schools: SchoolService,
    pub students: StudentService,
    pub invoices: InvoiceService,
    pub payments: PaymentService,
    pub statements: StatementService,
    pub users: UserService,
    pub tokens: Arc<Hs256TokenCodec>,
}

/// Build services over the store selected by the environment.
///
/// `USE_PERSISTENT_STORES=true` selects Postgres (`DATABASE_URL` required);
/// anything else runs on the in-memory store. With the `redis` feature the
/// Postgres store is additionally wrapped in the statement cache
/// (`REDIS_URL`, defaulting to a local instance).
pub async fn build_services(tokens: Arc<Hs256TokenCodec>) -> AppServices {
    let use_persistent = std::env::var("USE_PERSISTENT_STORES")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    if use_persistent {
        build_persistent_services(tokens).await
    } else {
        build_in_memory_services(tokens)
    }
}

fn build_in_memory_services(tokens: Arc<Hs256TokenCodec>) -> AppServices {
    let store = Arc::new(InMemoryStore::default());
    wire(store.clone(), store, tokens)
}

async fn build_persistent_services(tokens: Arc<Hs256TokenCodec>) -> AppServices {
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set when USE_PERSISTENT_STORES=true");

    let store = PostgresStore::connect(&database_url)
        .await
        .expect("failed to connect to Postgres");

    #[cfg(feature = "redis")]
    {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        // Statement reads go through the cache; user lookups hit Postgres
        // directly.
        let cached = Arc::new(
            CachedBillingStore::new(store.clone(), &redis_url)
                .expect("failed to connect to Redis"),
        );
        wire(cached, Arc::new(store), tokens)
    }
    #[cfg(not(feature = "redis"))]
    {
        let store = Arc::new(store);
        wire(store.clone(), store, tokens)
    }
}

fn wire(
    billing: Arc<dyn BillingStore>,
    users: Arc<dyn UserStore>,
    tokens: Arc<Hs256TokenCodec>,
) -> AppServices {
    AppServices {
        schools: SchoolService::new(billing.clone()),
        students: StudentService::new(billing.clone()),
        invoices: InvoiceService::new(billing.clone()),
        payments: PaymentService::new(billing.clone()),
        statements: StatementService::new(billing),
        users: UserService::new(users),
        tokens,
    }
}
