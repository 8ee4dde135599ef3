//! Push token registration.
//!
//! The platform bridge hands over a one-shot receiver; whenever the token
//! arrives, exactly one `token_session` request is queued.

use crate::Beacon;
use beacon_outbox::{RequestBuilder, RequestQueue};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushPlatform {
    Android,
    Ios,
}

impl PushPlatform {
    fn token_key(&self) -> &'static str {
        match self {
            Self::Android => "android_token",
            Self::Ios => "ios_token",
        }
    }
}

/// Which push environment the token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushMode {
    Production,
    Development,
    AdHoc,
}

impl PushMode {
    fn as_param(&self) -> &'static str {
        match self {
            Self::Production => "0",
            Self::Development => "1",
            Self::AdHoc => "2",
        }
    }
}

impl Beacon {
    /// Wait for the token in the background and queue it once it arrives.
    ///
    /// The task resolves to the queued request id, or `None` if the sender
    /// was dropped or test mode is on.
    pub fn register_push_token(
        &self,
        platform: PushPlatform,
        mode: PushMode,
        token: oneshot::Receiver<String>,
    ) -> JoinHandle<Option<i64>> {
        let builder: Arc<RequestBuilder> = self.builder.clone();
        let queue: Arc<RequestQueue> = self.queue.clone();
        let test_mode = self.config.enable_test_mode;

        tokio::spawn(async move {
            let token = match token.await {
                Ok(token) if !token.trim().is_empty() => token,
                Ok(_) => {
                    warn!("Empty push token ignored");
                    return None;
                }
                Err(_) => {
                    warn!("Push token sender dropped");
                    return None;
                }
            };
            if test_mode {
                return None;
            }

            let payload = builder.build(vec![
                ("token_session".to_string(), "1".to_string()),
                (platform.token_key().to_string(), token),
                ("test_mode".to_string(), mode.as_param().to_string()),
            ]);
            let request = queue.enqueue(payload).await;
            info!(request_id = request.id, ?platform, "Push token queued");
            Some(request.id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{harness, queued_params};

    #[tokio::test]
    async fn test_token_becomes_one_request() {
        let h = harness().await;
        let (tx, rx) = oneshot::channel();
        let task = h
            .beacon
            .register_push_token(PushPlatform::Android, PushMode::AdHoc, rx);

        assert_eq!(h.beacon.queue().count().await, 0);
        tx.send("tok-123".to_string()).unwrap();
        assert!(task.await.unwrap().is_some());

        let params = queued_params(&h.beacon).await;
        assert_eq!(params.len(), 1);
        assert_eq!(params[0]["token_session"], "1");
        assert_eq!(params[0]["android_token"], "tok-123");
        assert_eq!(params[0]["test_mode"], "2");
    }

    #[tokio::test]
    async fn test_dropped_sender_queues_nothing() {
        let h = harness().await;
        let (tx, rx) = oneshot::channel::<String>();
        let task = h
            .beacon
            .register_push_token(PushPlatform::Ios, PushMode::Production, rx);
        drop(tx);

        assert_eq!(task.await.unwrap(), None);
        assert_eq!(h.beacon.queue().count().await, 0);
    }
}
