//! Domain services on top of the HTTP clients
//!
//! Each service here is independently testable: trackers and discovery are
//! generic over the client traits, wallet selection is a pure function.

pub mod discovery;
pub mod order_tracker;
pub mod topup_tracker;
pub mod wallet;
