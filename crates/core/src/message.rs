//! Inbound notifications from the settings surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message sent to a running page context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// One setting was written.
    SettingChanged { key: String, value: Value },
    /// Settings were reset to their defaults.
    SettingsReset,
}

/// Reply to every handled message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
}

impl Ack {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_setting_changed() {
        let message: Message =
            serde_json::from_value(json!({ "type": "SETTING_CHANGED", "key": "autoSendWebhook", "value": true }))
                .unwrap();
        assert_eq!(message, Message::SettingChanged { key: "autoSendWebhook".to_string(), value: json!(true) });
    }

    #[test]
    fn test_parse_settings_reset() {
        let message: Message = serde_json::from_str(r#"{"type":"SETTINGS_RESET"}"#).unwrap();
        assert_eq!(message, Message::SettingsReset);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(serde_json::from_str::<Message>(r#"{"type":"POPUP_REFRESH_SETTINGS"}"#).is_err());
    }

    #[test]
    fn test_ack_shape() {
        assert_eq!(serde_json::to_string(&Ack::ok()).unwrap(), r#"{"success":true}"#);
    }
}
