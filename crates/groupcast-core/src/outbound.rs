//! Delivery seam between group logic and the network.

use std::sync::Arc;

use crate::error::DeliveryError;

/// Channel towards one participant's delivery endpoint.
///
/// # Contract
///
/// `deliver` must not block: it hands the line to whatever performs the
/// socket write (a queue drained by a writer task in production) and returns.
/// This is what makes it safe to call while holding the group lock. An `Err`
/// means the channel is permanently broken.
pub trait Outbound: Clone + Send + Sync + 'static {
    /// Queue one line (without terminator) for delivery.
    fn deliver(&self, line: &Arc<str>) -> Result<(), DeliveryError>;

    /// Whether `self` and `other` feed the same underlying channel.
    ///
    /// Clones of one channel are the same; the channel opened by a later
    /// join of the same handle is not.
    fn same_channel(&self, other: &Self) -> bool;
}
