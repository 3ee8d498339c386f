use crate::helpers::{ADA_SLOT, KIOSK, connect_ws, make_test_app, seed, spawn_server};
use futures_util::StreamExt;
use serial_test::serial;
use services::{AttendanceEngine, ScanEvent};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::{Error, protocol::Message};
use util::ws::notification_topic;

#[tokio::test]
#[serial]
async fn instructor_receives_check_in_notification() {
    let (app, state) = make_test_app().await;
    let s = seed(&state).await;
    let addr = spawn_server(app).await;

    let (mut socket, _) = connect_ws(&addr.to_string(), &format!("notifications/{}", s.lecturer.id))
        .await
        .unwrap();

    let topic = notification_topic(s.lecturer.id);
    for _ in 0..50 {
        if state.ws().subscriber_count(&topic).await > 0 {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }

    let event = ScanEvent {
        attendance_type: "Time In".into(),
        class_id: Some(s.open_lab.id),
        fingerprint_slot_id: Some(ADA_SLOT),
        device_id: Some(KIOSK.into()),
        ..Default::default()
    };
    AttendanceEngine::from_state(&state).handle(&event).await.unwrap();

    let frame = timeout(Duration::from_secs(2), async {
        loop {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => return text.as_str().to_owned(),
                Some(Ok(_)) => continue,
                other => panic!("socket closed: {other:?}"),
            }
        }
    })
    .await
    .unwrap();

    let json: serde_json::Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(json["event"], "notification.created");
    assert_eq!(json["topic"], topic);
    assert!(json["payload"]["message"].as_str().unwrap().contains("Ada Lovelace"));
}

#[tokio::test]
#[serial]
async fn unknown_user_cannot_subscribe() {
    let (app, _) = make_test_app().await;
    let addr = spawn_server(app).await;

    match connect_ws(&addr.to_string(), "notifications/4242").await {
        Ok(_) => panic!("unknown user should not connect"),
        Err(Error::Http(resp)) => assert_eq!(resp.status(), 404),
        Err(e) => panic!("unexpected error: {e:?}"),
    }
}
