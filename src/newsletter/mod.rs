//! Subscription lifecycle and newsletter dispatch.
//!
//! A subscriber's token is the only credential for verify, confirm,
//! preference and unsubscribe actions. Dispatch fans a payload out to
//! confirmed subscribers whose preferences allow its content kind.

pub mod content;
pub mod dispatch;
pub mod token;

pub use content::NewsletterPayload;
pub use dispatch::{DispatchReport, dispatch};
