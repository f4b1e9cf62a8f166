// ============================================================================
// Messaging - Status Change Channel
// ============================================================================
//
// Publish/subscribe transport with per-recipient topics: one topic per
// vendor identity, one per order identity. Delivery is at-most-once per
// connected subscriber with no replay; ordering is guaranteed within a
// single topic only.
//
// ============================================================================

pub mod channel;
pub mod topic;

pub use channel::{ChannelError, StatusChannel, Subscription};
pub use topic::Topic;
