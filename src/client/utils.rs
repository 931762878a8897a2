use secrecy::ExposeSecret;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use crate::client::config::Config;
use crate::client::consts::API_KEY_QUERY_PARAM;

pub fn build_request(config: &Config) -> tokio_tungstenite::tungstenite::Result<Request> {
    format!(
        "{}?{}={}",
        config.base_url(),
        API_KEY_QUERY_PARAM,
        config.api_key().expose_secret()
    )
    .into_client_request()
}

/// Service frames are JSON, but may arrive as binary websocket messages.
pub fn frame_text(bytes: Vec<u8>) -> Result<String, std::string::FromUtf8Error> {
    String::from_utf8(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_carries_key() {
        let config = Config::builder()
            .with_base_url("wss://example.test/ws")
            .with_api_key("secret-key")
            .build();
        let request = build_request(&config).unwrap();
        assert_eq!(request.uri().to_string(), "wss://example.test/ws?key=secret-key");
    }

    #[test]
    fn test_binary_frames_decode_as_utf8() {
        assert_eq!(frame_text(br#"{"setupComplete":{}}"#.to_vec()).unwrap(), r#"{"setupComplete":{}}"#);
        assert!(frame_text(vec![0xff, 0xfe]).is_err());
    }
}
