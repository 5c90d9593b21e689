use crate::utils::{TestClient, init_tracing, room, spawn_hub};
use playback_client::{CallPhase, ClientEvent};
use playback_server::HubHandle;
use std::collections::HashSet;

async fn three_members(hub: &HubHandle) -> (TestClient, TestClient, TestClient) {
    let demo = room("demo");
    let (a, _) = TestClient::join(hub, &demo).await.unwrap();
    let (b, _) = TestClient::join(hub, &demo).await.unwrap();
    let (c, _) = TestClient::join(hub, &demo).await.unwrap();

    for client in [&a, &b, &c] {
        client.wait_until(|s| s.mesh_peers.len() == 2).await.unwrap();
    }
    (a, b, c)
}

#[tokio::test]
async fn test_single_share_reaches_every_member() {
    init_tracing();
    let hub = spawn_hub();
    let (a, b, c) = three_members(&hub).await;

    a.handle.start_share().await.unwrap();

    for viewer in [&b, &c] {
        let state = viewer
            .wait_until(|s| s.share_streams.contains_key(&a.conn_id))
            .await
            .unwrap();
        assert_eq!(state.share_streams.len(), 1);
        // Screen shares never touch the main call.
        assert_eq!(state.call_phase, CallPhase::Idle);
    }
    assert!(a.handle.inspect().await.unwrap().share_streams.is_empty());
}

#[tokio::test]
async fn test_three_sharers_build_full_mesh() {
    init_tracing();
    let hub = spawn_hub();
    let (a, b, c) = three_members(&hub).await;

    let (ra, rb, rc) = tokio::join!(
        a.handle.start_share(),
        b.handle.start_share(),
        c.handle.start_share()
    );
    ra.unwrap();
    rb.unwrap();
    rc.unwrap();

    let all: HashSet<_> = [&a, &b, &c].iter().map(|x| x.conn_id.clone()).collect();
    for client in [&a, &b, &c] {
        let state = client
            .wait_until(|s| s.share_streams.len() == 2)
            .await
            .unwrap();
        let mut expected = all.clone();
        expected.remove(&client.conn_id);
        let senders: HashSet<_> = state.share_streams.keys().cloned().collect();
        assert_eq!(senders, expected);
    }

    let total: usize = [&a, &b, &c].iter().map(|x| x.factory.mesh_created()).sum();
    assert_eq!(total, 6);
}

#[tokio::test]
async fn test_departure_mid_share_is_cleaned_up() {
    init_tracing();
    let hub = spawn_hub();
    let (mut a, b, mut c) = three_members(&hub).await;

    let (ra, rb, rc) = tokio::join!(
        a.handle.start_share(),
        b.handle.start_share(),
        c.handle.start_share()
    );
    ra.unwrap();
    rb.unwrap();
    rc.unwrap();
    for client in [&a, &c] {
        client
            .wait_until(|s| s.share_streams.len() == 2)
            .await
            .unwrap();
    }

    let b_id = b.conn_id.clone();
    b.disconnect().await.unwrap();

    for client in [&mut a, &mut c] {
        let removed = ClientEvent::ShareStreamRemoved(b_id.clone());
        client.wait_for(|e| *e == removed).await.unwrap();

        let state = client.handle.inspect().await.unwrap();
        assert!(!state.mesh_peers.contains(&b_id));
        assert!(!state.share_streams.contains_key(&b_id));
        assert_eq!(state.mesh_peers.len(), 1);
        assert_eq!(state.share_streams.len(), 1);
    }
}

#[tokio::test]
async fn test_stopped_share_disappears_for_viewers() {
    init_tracing();
    let hub = spawn_hub();
    let (a, mut b, _c) = three_members(&hub).await;

    a.handle.start_share().await.unwrap();
    b.wait_until(|s| s.share_streams.contains_key(&a.conn_id))
        .await
        .unwrap();

    a.handle.stop_share().await.unwrap();

    let removed = ClientEvent::ShareStreamRemoved(a.conn_id.clone());
    b.wait_for(|e| *e == removed).await.unwrap();
    let state = b.handle.inspect().await.unwrap();
    assert!(state.share_streams.is_empty());
    assert_eq!(state.mesh_peers.len(), 2);
}
