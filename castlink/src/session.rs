//! A receiver app session: the state Chromecast reports for one running
//! application, plus whatever media playback status it has last reported.
//!
//! Session operations live on [`crate::client::ChromecastClient`] rather
//! than on `Session` itself, since every operation needs to talk back to
//! the client's request/response machinery; keeping `Session` a plain
//! data record avoids a `Session` <-> `Client` reference cycle.

use serde_json::Value;

use crate::envelope::MEDIA_NS;

#[derive(Clone, Debug, Default)]
pub struct Session {
    pub app_id: String,
    pub display_name: String,
    pub namespaces: Vec<String>,
    pub session_id: String,
    pub status_text: String,
    pub transport_id: Option<String>,
    pub connected: bool,

    pub media_loaded: bool,
    pub media_position: f64,
    pub media_status: String,
    pub media_session_id: Option<u64>,
    pub media_finished: bool,
}

impl Session {
    pub(crate) fn from_app_data(data: &Value) -> Session {
        Session {
            app_id: data["appId"].as_str().unwrap_or_default().to_owned(),
            display_name: data["displayName"].as_str().unwrap_or_default().to_owned(),
            namespaces: data["namespaces"]
                .as_array()
                .map(|arr| {
                    arr.iter()
                        .filter_map(|ns| ns["name"].as_str().map(str::to_owned))
                        .collect()
                })
                .unwrap_or_default(),
            session_id: data["sessionId"].as_str().unwrap_or_default().to_owned(),
            status_text: data["statusText"].as_str().unwrap_or_default().to_owned(),
            transport_id: data["transportId"].as_str().map(str::to_owned),
            connected: false,
            media_loaded: false,
            media_position: 0.0,
            media_status: String::new(),
            media_session_id: None,
            media_finished: false,
        }
    }

    /// Refresh the app-identity fields from a fresh `applications[]` entry
    /// while keeping whatever media/connection state we've already tracked
    /// for this session.
    pub(crate) fn refresh(&mut self, data: &Value) {
        let refreshed = Session::from_app_data(data);
        self.app_id = refreshed.app_id;
        self.display_name = refreshed.display_name;
        self.namespaces = refreshed.namespaces;
        self.status_text = refreshed.status_text;
        self.transport_id = refreshed.transport_id;
    }

    pub fn uses_cast_api(&self) -> bool {
        self.transport_id.is_some()
    }

    /// Namespace to address media control messages to: the first
    /// namespace the receiver app advertised, or the well-known media
    /// namespace if it advertised none.
    pub fn control_namespace(&self) -> &str {
        self.namespaces.first().map(String::as_str).unwrap_or(MEDIA_NS)
    }

    pub(crate) fn update_media_status(&mut self, data: &Value) {
        if data["type"].as_str() != Some("MEDIA_STATUS") {
            return;
        }
        let status = match &data["status"] {
            Value::Array(arr) => match arr.first() {
                Some(s) => s,
                None => return,
            },
            other => other,
        };
        self.media_session_id = status["mediaSessionId"].as_u64();
        self.media_status = status["playerState"].as_str().unwrap_or_default().to_owned();
        self.media_position = status["currentTime"].as_f64().unwrap_or(0.0);
        self.media_loaded = true;
        if status.get("idleReason").is_some() {
            self.media_finished = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn media_status_extracts_first_array_element() {
        let mut session = Session::default();
        session.update_media_status(&json!({
            "type": "MEDIA_STATUS",
            "status": [{"mediaSessionId": 7, "playerState": "PLAYING", "currentTime": 12.5}]
        }));
        assert_eq!(session.media_session_id, Some(7));
        assert_eq!(session.media_status, "PLAYING");
        assert!(!session.media_finished);
    }

    #[test]
    fn idle_reason_marks_finished() {
        let mut session = Session::default();
        session.update_media_status(&json!({
            "type": "MEDIA_STATUS",
            "status": [{"idleReason": "FINISHED"}]
        }));
        assert!(session.media_finished);
    }

    #[test]
    fn non_media_status_message_is_ignored() {
        let mut session = Session::default();
        session.update_media_status(&json!({"type": "LOAD_FAILED"}));
        assert!(!session.media_loaded);
    }

    #[test]
    fn session_without_transport_id_is_not_cast_api_capable() {
        let session = Session::from_app_data(&json!({"appId": "ABCD1234", "sessionId": "s1"}));
        assert!(!session.uses_cast_api());
    }

    #[test]
    fn session_with_transport_id_is_cast_api_capable() {
        let session = Session::from_app_data(&json!({"appId": "ABCD1234", "sessionId": "s1", "transportId": "t1"}));
        assert!(session.uses_cast_api());
    }
}
