//! End-to-end presence lifecycle flows.

use std::sync::Arc;

use uuid::Uuid;

use khidma_entity::OnlineStatus;
use khidma_realtime::event::{InboundEvent, OutboundEvent};

use crate::helpers::{drain, TestApp};

#[tokio::test]
async fn two_devices_stay_online_until_last_disconnect() {
    let Some(app) = TestApp::connect(Vec::new()).await else {
        return;
    };
    let user = Uuid::new_v4();
    app.insert_user(user, "bilal").await;

    let conn_a = Uuid::new_v4();
    let conn_b = Uuid::new_v4();
    let (_handle_a, _rx_a) = app
        .gateway
        .attach(TestApp::attach_request(user, conn_a))
        .await
        .expect("attach first device");
    let (_handle_b, _rx_b) = app
        .gateway
        .attach(TestApp::attach_request(user, conn_b))
        .await
        .expect("attach second device");

    let stored = app.users.find_by_id(user).await.expect("load").expect("user");
    assert_eq!(stored.online_status, OnlineStatus::Online);

    app.gateway.detach(conn_a).await.expect("detach first device");
    let stored = app.users.find_by_id(user).await.expect("load").expect("user");
    assert_eq!(stored.online_status, OnlineStatus::Online);
    assert_eq!(
        app.sessions
            .list_active_by_user(user)
            .await
            .expect("list sessions")
            .len(),
        1
    );

    let before_offline = chrono::Utc::now();
    app.gateway.detach(conn_b).await.expect("detach last device");
    let stored = app.users.find_by_id(user).await.expect("load").expect("user");
    assert_eq!(stored.online_status, OnlineStatus::Offline);
    assert!(stored.last_activity >= before_offline);
    assert!(app
        .sessions
        .list_active_by_user(user)
        .await
        .expect("list sessions")
        .is_empty());
}

#[tokio::test]
async fn repeated_disconnect_broadcasts_offline_once() {
    let observer = Uuid::new_v4();
    let Some(app) = TestApp::connect(vec![observer]).await else {
        return;
    };
    let user = Uuid::new_v4();
    app.insert_user(user, "subject").await;
    app.insert_user(observer, "watcher").await;
    let mut rx = app.attach_observer(observer);

    let conn = Uuid::new_v4();
    app.gateway
        .attach(TestApp::attach_request(user, conn))
        .await
        .expect("attach");
    assert_eq!(drain(&mut rx).len(), 1);

    app.gateway.detach(conn).await.expect("detach");
    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    match &events[0] {
        OutboundEvent::PresenceChanged { user_id, .. } => assert_eq!(*user_id, user),
        other => panic!("unexpected event: {other:?}"),
    }

    // A replayed disconnect finds the session already inactive and
    // must not re-announce the user going offline.
    assert!(app
        .sessions
        .deactivate(conn)
        .await
        .expect("deactivate")
        .is_none());
    app.broadcaster
        .on_disconnect(conn)
        .await
        .expect("replayed disconnect");
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn additional_device_does_not_rebroadcast_presence() {
    let observer = Uuid::new_v4();
    let Some(app) = TestApp::connect(vec![observer]).await else {
        return;
    };
    let user = Uuid::new_v4();
    app.insert_user(user, "subject").await;
    app.insert_user(observer, "watcher").await;
    let mut rx = app.attach_observer(observer);

    app.gateway
        .attach(TestApp::attach_request(user, Uuid::new_v4()))
        .await
        .expect("attach first device");
    assert_eq!(drain(&mut rx).len(), 1);

    app.gateway
        .attach(TestApp::attach_request(user, Uuid::new_v4()))
        .await
        .expect("attach second device");
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn heartbeat_on_deactivated_session_detaches_quietly() {
    let Some(app) = TestApp::connect(Vec::new()).await else {
        return;
    };
    let user = Uuid::new_v4();
    app.insert_user(user, "amal").await;

    let conn = Uuid::new_v4();
    let (handle, _rx) = app
        .gateway
        .attach(TestApp::attach_request(user, conn))
        .await
        .expect("attach");

    // Maintenance pulls the session out from under the live connection.
    app.sessions
        .deactivate(conn)
        .await
        .expect("force deactivate");

    app.gateway
        .handle_inbound(&handle, InboundEvent::Heartbeat)
        .await
        .expect("heartbeat on gone session");
    assert!(app.registry.get(&conn).is_none());
}

#[tokio::test]
async fn reconnect_with_same_connection_id_replaces_stale_session() {
    let Some(app) = TestApp::connect(Vec::new()).await else {
        return;
    };
    let user = Uuid::new_v4();
    app.insert_user(user, "nadia").await;

    let conn = Uuid::new_v4();
    let (stale, _rx_stale) = app
        .gateway
        .attach(TestApp::attach_request(user, conn))
        .await
        .expect("first attach");

    // The transport dropped without a detach; the client reconnects
    // presenting the same connection id.
    let (live, _rx_live) = app
        .gateway
        .attach(TestApp::attach_request(user, conn))
        .await
        .expect("reattach");

    assert!(!stale.is_alive());
    assert!(live.is_alive());
    assert_eq!(
        app.sessions
            .list_active_by_user(user)
            .await
            .expect("list sessions")
            .len(),
        1
    );
    let current = app.registry.get(&conn).expect("registered connection");
    assert!(Arc::ptr_eq(&current, &live));

    let stored = app.users.find_by_id(user).await.expect("load").expect("user");
    assert_eq!(stored.online_status, OnlineStatus::Online);
}
