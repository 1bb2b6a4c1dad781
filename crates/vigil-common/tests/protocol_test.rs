//! Wire-name checks for messages crossing context boundaries.

use vigil_common::protocol::{Envelope, Message, TabId, TabIdResponse};
use vigil_common::session::MonitorMode;

#[test]
fn test_start_message_uses_camel_case_fields() {
    let json = r##"{
        "action": "start",
        "selector": "#price",
        "mode": "notContains",
        "searchText": "sold out",
        "interval": 5,
        "initialContent": "Sold Out"
    }"##;

    let msg: Message = serde_json::from_str(json).unwrap();
    assert_eq!(
        msg,
        Message::Start {
            selector: "#price".into(),
            mode: MonitorMode::NotContains,
            search_text: "sold out".into(),
            interval: 5,
            initial_content: Some("Sold Out".into()),
        }
    );
}

#[test]
fn test_start_message_without_initial_content() {
    let json = r##"{"action":"start","selector":"#price","mode":"change","interval":5}"##;
    let msg: Message = serde_json::from_str(json).unwrap();
    assert!(matches!(
        msg,
        Message::Start {
            initial_content: None,
            ..
        }
    ));
}

#[test]
fn test_clear403_action_name() {
    let msg = Message::Clear403 {
        url: "https://shop.example.com".into(),
    };
    let value = serde_json::to_value(&msg).unwrap();
    assert_eq!(value["action"], "clear403");
    assert_eq!(value["url"], "https://shop.example.com");
}

#[test]
fn test_only_tab_id_query_expects_response() {
    assert!(Envelope::from(Message::GetCurrentTabId).expects_response);
    assert!(!Envelope::from(Message::Stop).expects_response);
    assert!(!Envelope::from(Message::PlaySound).expects_response);
    assert!(
        !Envelope::from(Message::ElementSelected {
            selector: "#a".into()
        })
        .expects_response
    );
}

#[test]
fn test_tab_id_response_shape() {
    let resp = TabIdResponse {
        tab_id: Some(TabId::new("7")),
    };
    assert_eq!(
        serde_json::to_string(&resp).unwrap(),
        r#"{"tabId":"7"}"#
    );
}
