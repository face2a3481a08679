//! Payload encoding.
//!
//! Turns the structured content a user typed into the literal string that ends up inside the
//! QR symbol. Encoding is total: empty fields fall back to placeholders or are left out, so
//! every [`ContentSpec`] produces some payload.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Payload used when the URL field is empty.
pub const URL_PLACEHOLDER: &str = "https://example.com";
/// Payload used when the text field is empty.
pub const TEXT_PLACEHOLDER: &str = "Enter your text here";

/// The kind of content being encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Url,
    Text,
    Email,
    Phone,
    Wifi,
}

impl ContentType {
    pub const ALL: [ContentType; 5] = [
        ContentType::Url,
        ContentType::Text,
        ContentType::Email,
        ContentType::Phone,
        ContentType::Wifi,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            ContentType::Url => "url",
            ContentType::Text => "text",
            ContentType::Email => "email",
            ContentType::Phone => "phone",
            ContentType::Wifi => "wifi",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Wi-Fi authentication scheme as written into the `T:` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WifiSecurity {
    #[default]
    #[serde(rename = "WPA")]
    Wpa,
    #[serde(rename = "WEP")]
    Wep,
    #[serde(rename = "nopass", alias = "open")]
    Open,
}

impl WifiSecurity {
    pub fn as_str(&self) -> &'static str {
        match self {
            WifiSecurity::Wpa => "WPA",
            WifiSecurity::Wep => "WEP",
            WifiSecurity::Open => "nopass",
        }
    }
}

impl FromStr for WifiSecurity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wpa" | "wpa2" => Ok(WifiSecurity::Wpa),
            "wep" => Ok(WifiSecurity::Wep),
            "nopass" | "open" | "none" => Ok(WifiSecurity::Open),
            other => Err(format!("unknown Wi-Fi security {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailFields {
    pub address: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WifiFields {
    pub ssid: String,
    pub password: String,
    pub security: WifiSecurity,
}

/// Content for every type at once, plus the type currently selected.
///
/// Switching [`kind`](Self::kind) keeps the other fields around; only the selected one is
/// encoded.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentSpec {
    pub kind: ContentType,
    pub url: String,
    pub text: String,
    pub email: EmailFields,
    pub phone: String,
    pub wifi: WifiFields,
}

impl ContentSpec {
    /// Encodes the currently selected content type.
    pub fn payload(&self) -> String {
        encode(self.kind, self)
    }
}

/// Builds the payload string for `kind` from `content`.
///
/// # Example
///
/// ```rust
/// use qirust_studio::payload::{encode, ContentSpec, ContentType};
///
/// let mut content = ContentSpec::default();
/// assert_eq!(encode(ContentType::Url, &content), "https://example.com");
///
/// content.phone = "555-1234".to_string();
/// assert_eq!(encode(ContentType::Phone, &content), "tel:555-1234");
/// ```
pub fn encode(kind: ContentType, content: &ContentSpec) -> String {
    match kind {
        ContentType::Url => non_empty_or(&content.url, URL_PLACEHOLDER),
        ContentType::Text => non_empty_or(&content.text, TEXT_PLACEHOLDER),
        ContentType::Email => encode_email(&content.email),
        ContentType::Phone => format!("tel:{}", content.phone),
        ContentType::Wifi => encode_wifi(&content.wifi),
    }
}

fn non_empty_or(value: &str, placeholder: &str) -> String {
    if value.is_empty() {
        placeholder.to_string()
    } else {
        value.to_string()
    }
}

// Every present query field is introduced with '?', not just the first one.
fn encode_email(email: &EmailFields) -> String {
    let mut result = format!("mailto:{}", email.address);
    for (key, value) in [("subject", &email.subject), ("body", &email.body)] {
        if !value.is_empty() {
            result.push('?');
            result.push_str(key);
            result.push('=');
            result.push_str(value);
        }
    }
    result
}

fn encode_wifi(wifi: &WifiFields) -> String {
    let mut segments = vec![format!("T:{}", wifi.security.as_str())];
    if !wifi.ssid.is_empty() {
        segments.push(format!("S:{}", wifi.ssid));
    }
    if wifi.security != WifiSecurity::Open && !wifi.password.is_empty() {
        segments.push(format!("P:{}", wifi.password));
    }
    format!("WIFI:{};;", segments.join(";"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wifi(security: WifiSecurity, ssid: &str, password: &str) -> ContentSpec {
        ContentSpec {
            kind: ContentType::Wifi,
            wifi: WifiFields {
                ssid: ssid.to_string(),
                password: password.to_string(),
                security,
            },
            ..ContentSpec::default()
        }
    }

    #[test]
    fn test_url_and_text_fall_back_to_placeholders() {
        let content = ContentSpec::default();
        assert_eq!(encode(ContentType::Url, &content), "https://example.com");
        assert_eq!(encode(ContentType::Text, &content), "Enter your text here");

        let content = ContentSpec {
            url: "https://rust-lang.org".to_string(),
            text: "hello".to_string(),
            ..ContentSpec::default()
        };
        assert_eq!(encode(ContentType::Url, &content), "https://rust-lang.org");
        assert_eq!(encode(ContentType::Text, &content), "hello");
    }

    #[test]
    fn test_every_type_yields_non_empty_payload() {
        let content = ContentSpec::default();
        for kind in ContentType::ALL {
            assert!(!encode(kind, &content).is_empty(), "{kind} payload was empty");
        }
    }

    #[test]
    fn test_phone() {
        let mut content = ContentSpec::default();
        assert_eq!(encode(ContentType::Phone, &content), "tel:");
        content.phone = "555-1234".to_string();
        assert_eq!(encode(ContentType::Phone, &content), "tel:555-1234");
    }

    #[test]
    fn test_wifi_open_network_omits_password() {
        let content = wifi(WifiSecurity::Open, "Home", "x");
        assert_eq!(content.payload(), "WIFI:T:nopass;S:Home;;");
    }

    #[test]
    fn test_wifi_wpa() {
        let content = wifi(WifiSecurity::Wpa, "Net", "pass123");
        assert_eq!(content.payload(), "WIFI:T:WPA;S:Net;P:pass123;;");
    }

    #[test]
    fn test_wifi_empty_fields_keep_terminator() {
        assert_eq!(wifi(WifiSecurity::Wep, "", "").payload(), "WIFI:T:WEP;;");
        assert_eq!(wifi(WifiSecurity::Wpa, "", "secret").payload(), "WIFI:T:WPA;P:secret;;");
    }

    #[test]
    fn test_email_joins_every_field_with_question_mark() {
        let mut content = ContentSpec {
            kind: ContentType::Email,
            ..ContentSpec::default()
        };
        assert_eq!(content.payload(), "mailto:");

        content.email.address = "me@example.com".to_string();
        assert_eq!(content.payload(), "mailto:me@example.com");

        content.email.body = "See you".to_string();
        assert_eq!(content.payload(), "mailto:me@example.com?body=See you");

        content.email.subject = "Hi".to_string();
        assert_eq!(content.payload(), "mailto:me@example.com?subject=Hi?body=See you");
    }

    #[test]
    fn test_switching_type_keeps_other_fields() {
        let mut content = ContentSpec {
            url: "https://a.example".to_string(),
            phone: "123".to_string(),
            ..ContentSpec::default()
        };
        content.kind = ContentType::Phone;
        assert_eq!(content.payload(), "tel:123");
        content.kind = ContentType::Url;
        assert_eq!(content.payload(), "https://a.example");
    }

    #[test]
    fn test_security_deserializes_from_open_alias() {
        let security: WifiSecurity = serde_json::from_str("\"open\"").unwrap();
        assert_eq!(security, WifiSecurity::Open);
        let security: WifiSecurity = serde_json::from_str("\"nopass\"").unwrap();
        assert_eq!(security, WifiSecurity::Open);
    }
}
