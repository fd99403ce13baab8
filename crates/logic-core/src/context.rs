use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://ngabbs.com";
pub const DEFAULT_MOCK_BASE_URL: &str = "https://raw.fastgit.org/BugenZhao/MNGA/gh-pages/api";

/// Backend messages that arrive in the error slot but mean the call worked.
pub const DEFAULT_SUCCESS_MESSAGES: &[&str] = &["完毕", "没有符合条件的结果", "今天已经签到"];

const APPLE_UA: &str = "NGA_skull/7.2.4(iPhone13,2;iOS 14.6)";
const ANDROID_UA: &str = "Nga_Official/80023(Android10)";
const DESKTOP_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.0 Safari/605.1.15";

/// Client flavour the backend sees through the user agent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    #[default]
    Apple,
    Android,
    Desktop,
}

impl Device {
    pub fn user_agent(self) -> &'static str {
        match self {
            Self::Apple => APPLE_UA,
            Self::Android => ANDROID_UA,
            Self::Desktop => DESKTOP_UA,
        }
    }

    /// Parse a case-insensitive device name.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "apple" | "ios" => Some(Self::Apple),
            "android" => Some(Self::Android),
            "desktop" => Some(Self::Desktop),
            _ => None,
        }
    }
}

/// Logged-in account credentials attached to every call.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthInfo {
    pub uid: String,
    pub token: String,
}

impl fmt::Debug for AuthInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthInfo")
            .field("uid", &self.uid)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Per-call context forwarded to the backend inside the request envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallContext {
    pub base_url: String,
    pub user_agent: String,
    pub auth: Option<AuthInfo>,
}

/// Cross-cutting settings handed to the dispatcher at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicContext {
    /// Backend base URL without trailing slash.
    pub base_url: String,
    pub device: Device,
    pub auth: Option<AuthInfo>,
    /// Domain error infos that are treated as success.
    pub success_messages: Vec<String>,
}

impl Default for LogicContext {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            device: Device::default(),
            auth: None,
            success_messages: DEFAULT_SUCCESS_MESSAGES
                .iter()
                .map(|message| (*message).to_owned())
                .collect(),
        }
    }
}

impl LogicContext {
    pub fn with_auth(mut self, auth: AuthInfo) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn is_success_message(&self, info: &str) -> bool {
        let info = info.trim();
        self.success_messages.iter().any(|message| message == info)
    }

    pub fn call_context(&self) -> CallContext {
        CallContext {
            base_url: self.base_url.clone(),
            user_agent: self.device.user_agent().to_owned(),
            auth: self.auth.clone(),
        }
    }
}
