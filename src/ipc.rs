//! Wire protocol between the engine daemon and its clients.
//!
//! Newline-delimited JSON over a Unix socket. Every request travels in an
//! [`Envelope`] with an explicit id; the matching [`Reply::Result`] echoes
//! that id, so correlation never depends on connection identity even
//! though the speaking guard keeps requests single-flight anyway.

use serde::{Deserialize, Serialize};

/// A client request. `lang` travels as its wire token (`"EN"`/`"AR"`);
/// unknown tokens fall back to English at dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Speak {
        text: String,
        #[serde(default = "default_lang")]
        lang: String,
    },
    Stop,
    Ping,
}

fn default_lang() -> String {
    "EN".to_string()
}

/// Request envelope carrying the correlation id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: u64,
    #[serde(flatten)]
    pub request: Request,
}

/// A service reply. Exactly one per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    Result { id: u64, text: String },
}

/// Serialize a message as one wire line.
pub fn to_line<T: Serialize>(msg: &T) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(msg)?;
    line.push('\n');
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speak_wire_shape() {
        let envelope = Envelope {
            id: 3,
            request: Request::Speak {
                text: "hello".into(),
                lang: "AR".into(),
            },
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&envelope).unwrap()).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["type"], "speak");
        assert_eq!(json["text"], "hello");
        assert_eq!(json["lang"], "AR");
    }

    #[test]
    fn ping_and_stop_wire_shape() {
        let ping = to_line(&Envelope {
            id: 7,
            request: Request::Ping,
        })
        .unwrap();
        assert_eq!(ping, "{\"id\":7,\"type\":\"ping\"}\n");

        let parsed: Envelope = serde_json::from_str("{\"id\":9,\"type\":\"stop\"}").unwrap();
        assert_eq!(parsed.id, 9);
        assert_eq!(parsed.request, Request::Stop);
    }

    #[test]
    fn missing_lang_defaults_to_en() {
        let parsed: Envelope =
            serde_json::from_str("{\"id\":1,\"type\":\"speak\",\"text\":\"hi\"}").unwrap();
        assert_eq!(
            parsed.request,
            Request::Speak {
                text: "hi".into(),
                lang: "EN".into(),
            }
        );
    }

    #[test]
    fn reply_round_trip() {
        let reply = Reply::Result {
            id: 42,
            text: "Done speaking.".into(),
        };
        let line = to_line(&reply).unwrap();
        let parsed: Reply = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(parsed, reply);
    }
}
