use std::collections::BTreeMap;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult, ErrorCode};

const FCM_ENDPOINT: &str = "https://fcm.googleapis.com/v1/projects";

/// A push notification addressed to every token of one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    /// String-only key/value data delivered to the app alongside the alert.
    pub data: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenOutcome {
    Sent,
    /// The push service no longer recognises this token; it should be dropped.
    Invalid { code: String },
    /// Transient failure. The token is kept.
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenResult {
    pub token: String,
    pub outcome: TokenOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MulticastResponse {
    pub responses: Vec<TokenResult>,
}

impl MulticastResponse {
    pub fn success_count(&self) -> usize {
        self.responses
            .iter()
            .filter(|r| r.outcome == TokenOutcome::Sent)
            .count()
    }

    pub fn failure_count(&self) -> usize {
        self.responses.len() - self.success_count()
    }

    pub fn invalid_tokens(&self) -> Vec<String> {
        self.responses
            .iter()
            .filter(|r| matches!(r.outcome, TokenOutcome::Invalid { .. }))
            .map(|r| r.token.clone())
            .collect()
    }
}

#[derive(Clone)]
pub struct FcmClient {
    client: Client,
    project_id: String,
    access_token: String,
}

impl FcmClient {
    /// `access_token` is a short-lived OAuth2 bearer token for the Firebase
    /// messaging scope. It expires after about an hour; the deployment must
    /// rotate it and restart the service, or every send fails with 401.
    pub fn new(client: Client, project_id: &str, access_token: &str) -> Self {
        Self {
            client,
            project_id: project_id.to_string(),
            access_token: access_token.to_string(),
        }
    }

    /// Send `message` to each token individually and report per-token results.
    ///
    /// Only an authentication rejection fails the whole call; every other
    /// problem is attributed to the token it happened on.
    pub async fn send_each(&self, message: &PushMessage, tokens: &[String]) -> AppResult<MulticastResponse> {
        let url = format!("{FCM_ENDPOINT}/{}/messages:send", self.project_id);
        let mut responses = Vec::with_capacity(tokens.len());

        for token in tokens {
            let request = SendRequest {
                message: build_message(message, token),
            };

            let outcome = match self.client
                .post(&url)
                .bearer_auth(&self.access_token)
                .json(&request)
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => TokenOutcome::Sent,
                Ok(resp) if matches!(resp.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                    return Err(AppError::new(
                        ErrorCode::PushSendFailed,
                        format!("push service rejected credentials ({})", resp.status()),
                    ));
                }
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let body = resp.text().await.unwrap_or_default();
                    classify_failure(status, &body)
                }
                Err(e) => TokenOutcome::Failed {
                    reason: e.to_string(),
                },
            };

            responses.push(TokenResult {
                token: token.clone(),
                outcome,
            });
        }

        Ok(MulticastResponse { responses })
    }
}

/// Decide whether a failed send means the token is dead or the failure is transient.
///
/// Only `UNREGISTERED` or a 404 marks a token dead. `INVALID_ARGUMENT` usually
/// points at the payload, so the token is kept.
pub fn classify_failure(status: u16, body: &str) -> TokenOutcome {
    let error_code = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|env| {
            env.error
                .details
                .into_iter()
                .find_map(|d| d.error_code)
        });

    match error_code.as_deref() {
        Some(code @ "UNREGISTERED") => TokenOutcome::Invalid {
            code: code.to_string(),
        },
        _ if status == 404 => TokenOutcome::Invalid {
            code: "NOT_FOUND".to_string(),
        },
        Some(code) => TokenOutcome::Failed {
            reason: format!("{status} {code}"),
        },
        None => TokenOutcome::Failed {
            reason: format!("status {status}"),
        },
    }
}

fn build_message<'a>(message: &'a PushMessage, token: &'a str) -> FcmMessage<'a> {
    FcmMessage {
        token,
        notification: FcmNotification {
            title: &message.title,
            body: &message.body,
        },
        data: &message.data,
        android: serde_json::json!({
            "priority": "high",
            "notification": {
                "channel_id": "job_notifications",
                "sound": "default",
                "notification_priority": "PRIORITY_HIGH",
                "click_action": "FLUTTER_NOTIFICATION_CLICK",
            },
        }),
        apns: serde_json::json!({
            "headers": { "apns-priority": "10" },
            "payload": {
                "aps": {
                    "sound": "default",
                    "badge": 1,
                    "content-available": 1,
                },
            },
        }),
    }
}

#[derive(Serialize)]
struct SendRequest<'a> {
    message: FcmMessage<'a>,
}

#[derive(Serialize)]
struct FcmMessage<'a> {
    token: &'a str,
    notification: FcmNotification<'a>,
    data: &'a BTreeMap<String, String>,
    android: serde_json::Value,
    apns: serde_json::Value,
}

#[derive(Serialize)]
struct FcmNotification<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDetail {
    #[serde(default)]
    error_code: Option<String>,
}
