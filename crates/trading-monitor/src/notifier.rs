//! Notification sinks.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use trading_core::traits::{NotificationKind, NotificationSink};

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify(&self, message: &str, kind: NotificationKind) {
        match kind {
            NotificationKind::Emergency => warn!(kind = %kind, "{}", message),
            _ => info!(kind = %kind, "{}", message),
        }
    }
}

/// Throttles another sink per notification kind.
///
/// At most one message per kind is forwarded within its cooldown; the rest
/// are dropped. Emergency and info messages always go through.
pub struct CooldownNotifier {
    inner: Arc<dyn NotificationSink>,
    default_cooldown: Duration,
    cooldowns: HashMap<NotificationKind, Duration>,
    last_sent: Mutex<HashMap<NotificationKind, Instant>>,
}

impl CooldownNotifier {
    pub fn new(inner: Arc<dyn NotificationSink>, default_cooldown: Duration) -> Self {
        Self {
            inner,
            default_cooldown,
            cooldowns: HashMap::new(),
            last_sent: Mutex::new(HashMap::new()),
        }
    }

    /// Override the cooldown for one kind.
    pub fn with_cooldown(mut self, kind: NotificationKind, cooldown: Duration) -> Self {
        self.cooldowns.insert(kind, cooldown);
        self
    }

    pub fn cooldown(&self, kind: NotificationKind) -> Duration {
        self.cooldowns
            .get(&kind)
            .copied()
            .unwrap_or(self.default_cooldown)
    }

    fn is_exempt(kind: NotificationKind) -> bool {
        matches!(kind, NotificationKind::Emergency | NotificationKind::Info)
    }

    /// Record a send if the kind is out of cooldown. Returns whether to send.
    async fn admit(&self, kind: NotificationKind) -> bool {
        if Self::is_exempt(kind) {
            return true;
        }
        let now = Instant::now();
        let mut last_sent = self.last_sent.lock().await;
        match last_sent.get(&kind) {
            Some(at) if now.duration_since(*at) < self.cooldown(kind) => false,
            _ => {
                last_sent.insert(kind, now);
                true
            }
        }
    }
}

#[async_trait]
impl NotificationSink for CooldownNotifier {
    async fn notify(&self, message: &str, kind: NotificationKind) {
        if self.admit(kind).await {
            self.inner.notify(message, kind).await;
        } else {
            debug!(kind = %kind, "Notification suppressed by cooldown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        sent: std::sync::Mutex<Vec<(NotificationKind, String)>>,
    }

    impl Recorder {
        fn count(&self, kind: NotificationKind) -> usize {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|(k, _)| *k == kind)
                .count()
        }
    }

    #[async_trait]
    impl NotificationSink for Recorder {
        async fn notify(&self, message: &str, kind: NotificationKind) {
            self.sent.lock().unwrap().push((kind, message.to_string()));
        }
    }

    fn throttled(cooldown: Duration) -> (CooldownNotifier, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        (CooldownNotifier::new(recorder.clone(), cooldown), recorder)
    }

    #[tokio::test]
    async fn test_repeats_within_cooldown_are_dropped() {
        let (notifier, recorder) = throttled(Duration::from_secs(300));
        notifier.notify("buy KRW-BTC", NotificationKind::Trade).await;
        notifier.notify("buy KRW-ETH", NotificationKind::Trade).await;
        notifier.notify("status", NotificationKind::Report).await;

        assert_eq!(recorder.count(NotificationKind::Trade), 1);
        assert_eq!(recorder.count(NotificationKind::Report), 1);
    }

    #[tokio::test]
    async fn test_emergencies_are_never_throttled() {
        let (notifier, recorder) = throttled(Duration::from_secs(300));
        for _ in 0..3 {
            notifier.notify("halted", NotificationKind::Emergency).await;
            notifier.notify("started", NotificationKind::Info).await;
        }
        assert_eq!(recorder.count(NotificationKind::Emergency), 3);
        assert_eq!(recorder.count(NotificationKind::Info), 3);
    }

    #[tokio::test]
    async fn test_cooldown_expires() {
        let (notifier, recorder) = throttled(Duration::from_millis(30));
        notifier.notify("first", NotificationKind::Advisory).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        notifier.notify("second", NotificationKind::Advisory).await;
        assert_eq!(recorder.count(NotificationKind::Advisory), 2);
    }

    #[tokio::test]
    async fn test_per_kind_override() {
        let (notifier, recorder) = throttled(Duration::ZERO);
        let notifier = notifier.with_cooldown(NotificationKind::Report, Duration::from_secs(1800));
        assert_eq!(notifier.cooldown(NotificationKind::Report), Duration::from_secs(1800));

        notifier.notify("a", NotificationKind::Trade).await;
        notifier.notify("b", NotificationKind::Trade).await;
        notifier.notify("r1", NotificationKind::Report).await;
        notifier.notify("r2", NotificationKind::Report).await;

        assert_eq!(recorder.count(NotificationKind::Trade), 2);
        assert_eq!(recorder.count(NotificationKind::Report), 1);
    }
}
