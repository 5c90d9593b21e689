use playback_core::{ClientMessage, ConnId, ServerMessage};
use serde_json::json;

use crate::utils::{TestConn, init_tracing, room, spawn_hub};

#[tokio::test]
async fn test_join_snapshot_and_notices() {
    init_tracing();
    let hub = spawn_hub();
    let demo = room("demo");

    let mut a = TestConn::connect(&hub).await.unwrap();
    let mut b = TestConn::connect(&hub).await.unwrap();

    assert!(a.join(&demo).await.unwrap().is_empty());

    let snapshot = b.join(&demo).await.unwrap();
    assert_eq!(snapshot, vec![a.conn_id.clone()]);

    assert_eq!(
        a.recv().await.unwrap(),
        ServerMessage::UserJoined {
            room_id: demo.clone(),
            conn_id: b.conn_id.clone(),
        }
    );

    // A repeated join answers with a snapshot but announces nothing.
    assert_eq!(b.join(&demo).await.unwrap(), vec![a.conn_id.clone()]);
    a.assert_silent().await.unwrap();
    b.assert_silent().await.unwrap();
}

#[tokio::test]
async fn test_broadcast_excludes_sender() {
    init_tracing();
    let hub = spawn_hub();
    let demo = room("demo");

    let mut a = TestConn::connect(&hub).await.unwrap();
    let mut b = TestConn::connect(&hub).await.unwrap();
    let mut c = TestConn::connect(&hub).await.unwrap();
    a.join(&demo).await.unwrap();
    b.join(&demo).await.unwrap();
    c.join(&demo).await.unwrap();
    // Drain join notices.
    for _ in 0..2 {
        a.recv().await.unwrap();
    }
    b.recv().await.unwrap();

    let payload = json!({ "type": "offer", "sdp": "v=0" });
    a.offer(&demo, payload.clone()).await.unwrap();

    let expected = ServerMessage::Offer {
        room_id: demo.clone(),
        from: a.conn_id.clone(),
        payload,
    };
    assert_eq!(b.recv().await.unwrap(), expected);
    assert_eq!(c.recv().await.unwrap(), expected);
    a.assert_silent().await.unwrap();
}

#[tokio::test]
async fn test_departed_member_receives_nothing() {
    init_tracing();
    let hub = spawn_hub();
    let demo = room("demo");

    let mut a = TestConn::connect(&hub).await.unwrap();
    let mut b = TestConn::connect(&hub).await.unwrap();
    a.join(&demo).await.unwrap();
    b.join(&demo).await.unwrap();
    a.recv().await.unwrap();

    let b_id = b.conn_id.clone();
    b.disconnect().await.unwrap();

    assert_eq!(
        a.recv().await.unwrap(),
        ServerMessage::UserLeft {
            room_id: demo.clone(),
            conn_id: b_id,
        }
    );

    a.send(ClientMessage::SendMsg {
        room_id: demo.clone(),
        payload: json!("anyone?"),
    })
    .await
    .unwrap();

    assert_eq!(
        hub.members_of(demo).await.unwrap(),
        vec![a.conn_id.clone()]
    );
    a.assert_silent().await.unwrap();
}

#[tokio::test]
async fn test_targeted_message_reaches_only_target() {
    init_tracing();
    let hub = spawn_hub();
    let demo = room("demo");

    let mut a = TestConn::connect(&hub).await.unwrap();
    let mut b = TestConn::connect(&hub).await.unwrap();
    let mut c = TestConn::connect(&hub).await.unwrap();
    for conn in [&mut a, &mut b, &mut c] {
        conn.join(&demo).await.unwrap();
    }
    for _ in 0..2 {
        a.recv().await.unwrap();
    }
    b.recv().await.unwrap();

    let payload = json!({ "type": "offer", "sdp": "share" });
    a.send(ClientMessage::ScreenShareOffer {
        target_id: b.conn_id.clone(),
        payload: payload.clone(),
    })
    .await
    .unwrap();

    assert_eq!(
        b.recv().await.unwrap(),
        ServerMessage::ScreenShareOffer {
            from: a.conn_id.clone(),
            payload,
        }
    );
    a.assert_silent().await.unwrap();
    c.assert_silent().await.unwrap();
}

#[tokio::test]
async fn test_stale_target_is_dropped_silently() {
    init_tracing();
    let hub = spawn_hub();

    let mut a = TestConn::connect(&hub).await.unwrap();
    a.send(ClientMessage::ScreenShareAnswer {
        target_id: ConnId::new(),
        payload: json!({}),
    })
    .await
    .unwrap();

    a.assert_silent().await.unwrap();
}

#[tokio::test]
async fn test_disconnect_cascades_over_every_room() {
    init_tracing();
    let hub = spawn_hub();
    let (r1, r2) = (room("one"), room("two"));

    let mut a = TestConn::connect(&hub).await.unwrap();
    let mut b = TestConn::connect(&hub).await.unwrap();
    let mut c = TestConn::connect(&hub).await.unwrap();
    b.join(&r1).await.unwrap();
    c.join(&r2).await.unwrap();
    a.join(&r1).await.unwrap();
    a.join(&r2).await.unwrap();
    b.recv().await.unwrap();
    c.recv().await.unwrap();

    let a_id = a.conn_id.clone();
    a.disconnect().await.unwrap();

    assert_eq!(
        b.recv().await.unwrap(),
        ServerMessage::UserLeft {
            room_id: r1.clone(),
            conn_id: a_id.clone(),
        }
    );
    assert_eq!(
        c.recv().await.unwrap(),
        ServerMessage::UserLeft {
            room_id: r2.clone(),
            conn_id: a_id.clone(),
        }
    );
    assert!(!hub.members_of(r1).await.unwrap().contains(&a_id));
    assert!(!hub.members_of(r2).await.unwrap().contains(&a_id));
}

#[tokio::test]
async fn test_broadcast_from_non_member_is_rejected() {
    init_tracing();
    let hub = spawn_hub();
    let demo = room("demo");

    let mut outsider = TestConn::connect(&hub).await.unwrap();
    let mut member = TestConn::connect(&hub).await.unwrap();
    member.join(&demo).await.unwrap();

    outsider.offer(&demo, json!({ "sdp": "x" })).await.unwrap();

    assert!(matches!(
        outsider.recv().await.unwrap(),
        ServerMessage::Error { .. }
    ));
    member.assert_silent().await.unwrap();
}

#[tokio::test]
async fn test_get_users_excludes_requester() {
    init_tracing();
    let hub = spawn_hub();
    let demo = room("demo");

    let mut a = TestConn::connect(&hub).await.unwrap();
    let mut b = TestConn::connect(&hub).await.unwrap();
    a.join(&demo).await.unwrap();
    b.join(&demo).await.unwrap();
    a.recv().await.unwrap();

    b.send(ClientMessage::GetUsersInRoom {
        room_id: demo.clone(),
    })
    .await
    .unwrap();
    assert_eq!(
        b.recv().await.unwrap(),
        ServerMessage::UsersInRoom {
            room_id: demo.clone(),
            users: vec![a.conn_id.clone()],
        }
    );

    b.send(ClientMessage::GetUsersInRoom {
        room_id: room("empty"),
    })
    .await
    .unwrap();
    assert_eq!(
        b.recv().await.unwrap(),
        ServerMessage::UsersInRoom {
            room_id: room("empty"),
            users: vec![],
        }
    );
}

#[tokio::test]
async fn test_leave_room_notifies_remaining_members() {
    init_tracing();
    let hub = spawn_hub();
    let demo = room("demo");

    let mut a = TestConn::connect(&hub).await.unwrap();
    let mut b = TestConn::connect(&hub).await.unwrap();
    a.join(&demo).await.unwrap();
    b.join(&demo).await.unwrap();
    a.recv().await.unwrap();

    b.send(ClientMessage::LeaveRoom {
        room_id: demo.clone(),
    })
    .await
    .unwrap();

    assert_eq!(
        a.recv().await.unwrap(),
        ServerMessage::UserLeft {
            room_id: demo.clone(),
            conn_id: b.conn_id.clone(),
        }
    );
    assert_eq!(hub.members_of(demo).await.unwrap(), vec![a.conn_id.clone()]);
    b.assert_silent().await.unwrap();
}
