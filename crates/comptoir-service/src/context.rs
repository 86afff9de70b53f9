//! # Service Context
//!
//! Shared handles every domain service needs: the database, the clock, the
//! retry policy and the code generator settings.
//!
//! ## Unit of Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  service.create(input)                                                  │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  ctx.run("customer.create", || self.create_once(&input))               │
//! │     │                                                                   │
//! │     ├── attempt: begin ─► writes ─► commit                              │
//! │     │        │                                                          │
//! │     │        └── Busy / flag race ─► tx dropped (rollback) ─► backoff   │
//! │     │                                                                   │
//! │     └── still transient after max_attempts ─► ServiceError::Conflict    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use comptoir_core::clock::{ClockSource, SystemClock};
use comptoir_core::sequence::DEFAULT_PADDING;
use comptoir_db::{retry_transient, Database, RetryPolicy, SequenceGenerator};

use crate::config::AppConfig;
use crate::error::{ServiceError, ServiceResult};

#[derive(Clone)]
pub struct ServiceContext {
    db: Database,
    clock: Arc<dyn ClockSource>,
    retry: RetryPolicy,
    padding: u32,
}

impl ServiceContext {
    /// System clock, default retry policy, 4-digit codes.
    pub fn new(db: Database) -> Self {
        ServiceContext {
            db,
            clock: Arc::new(SystemClock),
            retry: RetryPolicy::default(),
            padding: DEFAULT_PADDING,
        }
    }

    pub fn from_config(db: Database, config: &AppConfig) -> Self {
        ServiceContext::new(db)
            .with_retry(config.retry_policy())
            .with_padding(config.code_padding)
    }

    pub fn with_clock(mut self, clock: Arc<dyn ClockSource>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn clock(&self) -> &dyn ClockSource {
        self.clock.as_ref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Code generator bound to this context's clock and padding.
    pub fn sequences(&self) -> SequenceGenerator {
        SequenceGenerator::new(self.db.pool().clone(), Arc::clone(&self.clock))
            .with_padding(self.padding)
            .with_retry(self.retry)
    }

    /// Runs one unit of work, replaying it on transient conflicts.
    pub(crate) async fn run<T, F, Fut>(&self, op_name: &str, op: F) -> ServiceResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ServiceResult<T>>,
    {
        retry_transient(&self.retry, op_name, op)
            .await
            .map_err(ServiceError::exhausted)
    }
}
