//! Cooperative delays

use std::time::Duration;
use tokio::time::Instant;

/// Suspend the current task for `duration`.
pub async fn delay(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

/// Suspend for `duration`, but never past `deadline`.
pub async fn delay_until(duration: Duration, deadline: Instant) {
    let remaining = deadline.saturating_duration_since(Instant::now());
    delay(duration.min(remaining)).await;
}
