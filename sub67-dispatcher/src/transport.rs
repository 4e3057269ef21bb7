use sub67_shared::clients::email::EmailClient;
use sub67_shared::clients::fcm::{FcmClient, MulticastResponse, PushMessage};
use sub67_shared::AppResult;

/// Sends one message to several device tokens and reports per-token results.
#[async_trait::async_trait]
pub trait PushTransport: Send + Sync {
    async fn send_multicast(&self, message: &PushMessage, tokens: &[String]) -> AppResult<MulticastResponse>;
}

#[async_trait::async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, html: &str) -> AppResult<()>;
}

#[async_trait::async_trait]
impl PushTransport for FcmClient {
    async fn send_multicast(&self, message: &PushMessage, tokens: &[String]) -> AppResult<MulticastResponse> {
        self.send_each(message, tokens).await
    }
}

#[async_trait::async_trait]
impl EmailTransport for EmailClient {
    async fn send_email(&self, to: &str, subject: &str, html: &str) -> AppResult<()> {
        EmailClient::send_email(self, to, subject, html).await
    }
}
