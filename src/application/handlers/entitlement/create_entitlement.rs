//! CreateEntitlementHandler - Command handler for provisioning a new account's record.

use std::sync::Arc;

use crate::domain::entitlement::{
    CreationIntent, EntitlementError, EntitlementPolicy, EntitlementRecord,
};
use crate::domain::foundation::AccountId;
use crate::ports::{Clock, EntitlementStore};

/// Command to create the entitlement record for a new account.
#[derive(Debug, Clone)]
pub struct CreateEntitlementCommand {
    pub account_id: AccountId,
    pub intent: CreationIntent,
}

/// Handler for provisioning entitlement records.
pub struct CreateEntitlementHandler {
    store: Arc<dyn EntitlementStore>,
    clock: Arc<dyn Clock>,
    policy: EntitlementPolicy,
}

impl CreateEntitlementHandler {
    pub fn new(
        store: Arc<dyn EntitlementStore>,
        clock: Arc<dyn Clock>,
        policy: EntitlementPolicy,
    ) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateEntitlementCommand,
    ) -> Result<EntitlementRecord, EntitlementError> {
        if self.store.get(&cmd.account_id).await?.is_some() {
            return Err(EntitlementError::already_exists(cmd.account_id));
        }

        let record = EntitlementRecord::provision(
            cmd.account_id,
            cmd.intent,
            self.clock.now(),
            &self.policy,
        );
        self.store.create(&record).await?;

        tracing::info!(
            account_id = %record.account_id,
            plan = %record.plan,
            "Entitlement record created"
        );

        Ok(record)
    }
}
