// Thin client for the Twilio Verify v2 API (send a one-time code, check it).

use std::collections::HashMap;

pub mod models;
use reqwest::{Client, StatusCode};
use tracing::{debug, error};

use crate::models::{OTPResponse, OTPVerifyResponse, TwilioErrorBody};

const VERIFY_BASE_URL: &str = "https://verify.twilio.com/v2";

/// Twilio error codes that mean the recipient itself is unusable.
const INVALID_RECIPIENT_CODES: &[u32] = &[21211, 60200, 60205];
/// "Max send attempts reached" / "Max check attempts reached".
const RATE_LIMIT_CODES: &[u32] = &[60202, 60203];
/// Requested resource (verification) not found, usually expired.
const NOT_FOUND_CODE: u32 = 20404;

#[derive(Debug, Clone)]
pub struct TwilioOptions {
    pub account_sid: String,
    pub auth_token: String,
    pub service_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TwilioError {
    #[error("recipient rejected by Twilio: {message}")]
    InvalidRecipient { code: u32, message: String },

    #[error("verification not found or expired")]
    VerificationNotFound,

    #[error("rate limited by Twilio: {message}")]
    RateLimited { message: String },

    #[error("Twilio returned {status}: {message}")]
    Api {
        status: u16,
        code: Option<u32>,
        message: String,
    },

    #[error("request to Twilio failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl TwilioError {
    /// Classify a non-success response from the Verify API.
    pub fn from_response(status: StatusCode, body: TwilioErrorBody) -> Self {
        let code = body.code;
        match code {
            Some(c) if INVALID_RECIPIENT_CODES.contains(&c) => TwilioError::InvalidRecipient {
                code: c,
                message: body.message,
            },
            Some(c) if RATE_LIMIT_CODES.contains(&c) => TwilioError::RateLimited {
                message: body.message,
            },
            Some(NOT_FOUND_CODE) => TwilioError::VerificationNotFound,
            _ if status == StatusCode::NOT_FOUND => TwilioError::VerificationNotFound,
            _ if status == StatusCode::TOO_MANY_REQUESTS => TwilioError::RateLimited {
                message: body.message,
            },
            _ => TwilioError::Api {
                status: status.as_u16(),
                code,
                message: body.message,
            },
        }
    }
}

/// Delivery channel for a verification, derived from the recipient format.
pub fn channel_for(recipient: &str) -> &'static str {
    if recipient.contains('@') {
        "email"
    } else {
        "sms"
    }
}

#[derive(Debug, Clone)]
pub struct TwilioService {
    options: TwilioOptions,
    client: Client,
    base_url: String,
}

impl TwilioService {
    pub fn new(options: TwilioOptions) -> Self {
        Self {
            options,
            client: Client::new(),
            base_url: VERIFY_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different Verify host (local stubs).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn service_url(&self, resource: &str) -> String {
        format!(
            "{base}/Services/{serv_id}/{resource}",
            base = self.base_url.trim_end_matches('/'),
            serv_id = self.options.service_id,
        )
    }

    /// Start a verification: Twilio sends a code to `recipient`.
    pub async fn send_otp(&self, recipient: &str) -> Result<OTPResponse, TwilioError> {
        let mut form_body: HashMap<&str, &str> = HashMap::new();
        form_body.insert("To", recipient);
        form_body.insert("Channel", channel_for(recipient));

        let response = self
            .client
            .post(self.service_url("Verifications"))
            .basic_auth(&self.options.account_sid, Some(&self.options.auth_token))
            .form(&form_body)
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        let otp = response.json::<OTPResponse>().await?;
        debug!(sid = %otp.sid, status = %otp.status, "Twilio verification started");
        Ok(otp)
    }

    /// Check a submitted code against a verification started by [`send_otp`].
    ///
    /// A wrong code is not an error here: Twilio answers with status
    /// `pending`, see [`OTPVerifyResponse::is_approved`].
    ///
    /// [`send_otp`]: TwilioService::send_otp
    pub async fn verify_otp(
        &self,
        verification_sid: &str,
        code: &str,
    ) -> Result<OTPVerifyResponse, TwilioError> {
        let mut form_body: HashMap<&str, &str> = HashMap::new();
        form_body.insert("VerificationSid", verification_sid);
        form_body.insert("Code", code);

        let response = self
            .client
            .post(self.service_url("VerificationCheck"))
            .basic_auth(&self.options.account_sid, Some(&self.options.auth_token))
            .form(&form_body)
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        Ok(response.json::<OTPVerifyResponse>().await?)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, TwilioError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let raw = response.text().await.unwrap_or_default();
        error!("Twilio error ({}): {}", status, raw);
        let body = serde_json::from_str::<TwilioErrorBody>(&raw).unwrap_or_else(|_| {
            TwilioErrorBody {
                message: raw,
                ..Default::default()
            }
        });
        Err(TwilioError::from_response(status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(code: Option<u32>, message: &str) -> TwilioErrorBody {
        TwilioErrorBody {
            code,
            message: message.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_channel_for_phone_and_email() {
        assert_eq!(channel_for("+94771234567"), "sms");
        assert_eq!(channel_for("rider@example.com"), "email");
    }

    #[test]
    fn test_invalid_parameter_to_is_invalid_recipient() {
        let err = TwilioError::from_response(
            StatusCode::BAD_REQUEST,
            body(Some(60200), "Invalid parameter `To`"),
        );
        assert!(matches!(
            err,
            TwilioError::InvalidRecipient { code: 60200, .. }
        ));
    }

    #[test]
    fn test_max_attempts_is_rate_limited() {
        let err = TwilioError::from_response(
            StatusCode::TOO_MANY_REQUESTS,
            body(Some(60203), "Max send attempts reached"),
        );
        assert!(matches!(err, TwilioError::RateLimited { .. }));
    }

    #[test]
    fn test_missing_verification_is_not_found() {
        let err = TwilioError::from_response(StatusCode::NOT_FOUND, body(None, ""));
        assert!(matches!(err, TwilioError::VerificationNotFound));

        let err = TwilioError::from_response(
            StatusCode::NOT_FOUND,
            body(Some(20404), "The requested resource was not found"),
        );
        assert!(matches!(err, TwilioError::VerificationNotFound));
    }

    #[test]
    fn test_unknown_failure_keeps_status() {
        let err = TwilioError::from_response(
            StatusCode::UNAUTHORIZED,
            body(Some(20003), "Authenticate"),
        );
        match err {
            TwilioError::Api { status, code, .. } => {
                assert_eq!(status, 401);
                assert_eq!(code, Some(20003));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_service_url_uses_service_id() {
        let service = TwilioService::new(TwilioOptions {
            account_sid: "AC123".to_string(),
            auth_token: "token".to_string(),
            service_id: "VA456".to_string(),
        })
        .with_base_url("http://localhost:4010/v2/");

        assert_eq!(
            service.service_url("VerificationCheck"),
            "http://localhost:4010/v2/Services/VA456/VerificationCheck"
        );
    }

    #[test]
    fn test_verify_response_approval() {
        let approved: OTPVerifyResponse = serde_json::from_str(
            r#"{"sid":"VE1","to":"+94771234567","status":"approved","valid":true}"#,
        )
        .unwrap();
        assert!(approved.is_approved());

        let pending: OTPVerifyResponse =
            serde_json::from_str(r#"{"sid":"VE1","to":"+94771234567","status":"pending"}"#)
                .unwrap();
        assert!(!pending.is_approved());
    }
}
