use serde::{Deserialize, Serialize};

/// Response from `POST /Services/{sid}/Verifications`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OTPResponse {
    /// Verification SID (`VE...`), used later as the challenge handle
    pub sid: String,
    pub to: String,
    pub channel: String,
    pub status: String,
}

/// Response from `POST /Services/{sid}/VerificationCheck`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OTPVerifyResponse {
    pub sid: String,
    pub to: String,
    /// `approved` when the code matched, `pending` when it did not
    pub status: String,
    #[serde(default)]
    pub valid: bool,
}

impl OTPVerifyResponse {
    pub fn is_approved(&self) -> bool {
        self.status == "approved"
    }
}

/// Error body Twilio returns with non-2xx responses
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TwilioErrorBody {
    #[serde(default)]
    pub code: Option<u32>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub more_info: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
}
