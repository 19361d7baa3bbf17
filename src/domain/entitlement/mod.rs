//! Entitlement domain - who may use paid functionality, and when.
//!
//! Everything in this module is pure: no I/O, no clock reads. Application
//! handlers supply `now` and persist the patches computed here.

mod errors;
mod gate;
mod plan;
mod policy;
mod record;
mod subscription;
pub mod transitions;
pub mod trial_timer;
mod webhook_errors;

pub use errors::EntitlementError;
pub use gate::{is_entitled, EntitlementSnapshot};
pub use plan::Plan;
pub use policy::EntitlementPolicy;
pub use record::{
    ConditionalUpdate, CreationIntent, EntitlementPatch, EntitlementRecord, Precondition,
};
pub use subscription::{Subscription, SubscriptionStatus};
pub use webhook_errors::WebhookError;
