// End-to-end coverage of the scenarios a client observes across a real
// socket: join order and welcome bursts, authority denial, holder actions,
// and the grace-period eviction window.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hub::collaborators::{DescriptorTrack, InMemoryCollaborators, SessionDescriptor};
use hub::token::TokenMinter;
use hub::AppState;
use lt_protocol::{Envelope, MessageType};
use lt_test_utils::MockWsClient;

async fn spawn_hub(grace_period: Duration) -> (SocketAddr, Arc<InMemoryCollaborators>) {
    let collaborators = Arc::new(InMemoryCollaborators::new());
    let state = AppState::new(
        collaborators.clone(),
        collaborators.clone(),
        TokenMinter::from_key([5u8; 32]),
        grace_period,
    );
    let router = hub::build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (addr, collaborators)
}

fn seed(collaborators: &InMemoryCollaborators, session_id: &str, track_count: usize) {
    collaborators.seed_session(SessionDescriptor {
        id: session_id.to_owned(),
        host_user_id: "host-user".to_owned(),
        tracks: (0..track_count)
            .map(|i| DescriptorTrack {
                media_file_id: format!("media-{i}"),
                title: format!("Track {i}"),
                artist: "Artist".to_owned(),
                album: "Album".to_owned(),
                duration: 180.0,
            })
            .collect(),
        format: None,
        max_bit_rate: None,
    });
}

async fn drain_burst(client: &mut MockWsClient, count: usize) -> Vec<Envelope> {
    let mut out = Vec::new();
    for _ in 0..count {
        out.push(client.recv().await.unwrap());
    }
    out
}

#[tokio::test]
async fn host_join_receives_welcome_state_and_participants() {
    let (addr, collaborators) = spawn_hub(Duration::from_secs(30)).await;
    seed(&collaborators, "s1", 2);

    let mut host = MockWsClient::connect(&format!("ws://{addr}/lt/s1/ws?name=Host&host=true"))
        .await
        .unwrap();

    let burst = drain_burst(&mut host, 4).await;
    assert_eq!(burst[0].kind, MessageType::Welcome);
    assert_eq!(burst[1].kind, MessageType::State);
    assert_eq!(burst[2].kind, MessageType::Participants);
    assert_eq!(burst[3].kind, MessageType::Remote);
}

#[tokio::test]
async fn guest_join_then_remote_request_notifies_holder() {
    let (addr, collaborators) = spawn_hub(Duration::from_secs(30)).await;
    seed(&collaborators, "s2", 1);

    let mut host = MockWsClient::connect(&format!("ws://{addr}/lt/s2/ws?name=Host&host=true"))
        .await
        .unwrap();
    drain_burst(&mut host, 4).await;

    let mut guest = MockWsClient::connect(&format!("ws://{addr}/lt/s2/ws?name=Guest"))
        .await
        .unwrap();
    drain_burst(&mut guest, 4).await; // welcome, state, participants, remote -- a holder is already assigned

    // host sees the updated participants broadcast from the guest joining
    let host_update = host.recv().await.unwrap();
    assert_eq!(host_update.kind, MessageType::Participants);

    guest
        .send(&Envelope::command("request_remote", serde_json::json!(null)))
        .await
        .unwrap();

    let notified = host.recv().await.unwrap();
    assert_eq!(notified.kind, MessageType::RemoteRequested);
}

#[tokio::test]
async fn guest_pause_is_denied_when_host_holds_remote() {
    let (addr, collaborators) = spawn_hub(Duration::from_secs(30)).await;
    seed(&collaborators, "s3", 1);

    let mut host = MockWsClient::connect(&format!("ws://{addr}/lt/s3/ws?name=Host&host=true"))
        .await
        .unwrap();
    drain_burst(&mut host, 4).await;

    let mut guest = MockWsClient::connect(&format!("ws://{addr}/lt/s3/ws?name=Guest"))
        .await
        .unwrap();
    drain_burst(&mut guest, 4).await;
    let _ = host.recv().await.unwrap(); // participants broadcast

    guest
        .send(&Envelope::command("pause", serde_json::json!(null)))
        .await
        .unwrap();

    let reply = guest.recv().await.unwrap();
    assert_eq!(reply.kind, MessageType::Error);
}

#[tokio::test]
async fn holder_seek_broadcasts_state_to_every_participant() {
    let (addr, collaborators) = spawn_hub(Duration::from_secs(30)).await;
    seed(&collaborators, "s4", 1);

    let mut host = MockWsClient::connect(&format!("ws://{addr}/lt/s4/ws?name=Host&host=true"))
        .await
        .unwrap();
    drain_burst(&mut host, 4).await;

    let mut guest = MockWsClient::connect(&format!("ws://{addr}/lt/s4/ws?name=Guest"))
        .await
        .unwrap();
    drain_burst(&mut guest, 4).await;
    let _ = host.recv().await.unwrap();

    host.send(&Envelope::command("seek", serde_json::json!({"position": 42.0})))
        .await
        .unwrap();

    let host_state = host.recv().await.unwrap();
    let guest_state = guest.recv().await.unwrap();
    assert_eq!(host_state.kind, MessageType::State);
    assert_eq!(guest_state.kind, MessageType::State);
}

#[tokio::test]
async fn removing_the_current_track_is_rejected() {
    let (addr, collaborators) = spawn_hub(Duration::from_secs(30)).await;
    seed(&collaborators, "s5", 2);

    let mut host = MockWsClient::connect(&format!("ws://{addr}/lt/s5/ws?name=Host&host=true"))
        .await
        .unwrap();
    drain_burst(&mut host, 4).await;

    host.send(&Envelope::command(
        "queue_remove",
        serde_json::json!({"queue_position": 0}),
    ))
    .await
    .unwrap();

    let reply = host.recv().await.unwrap();
    assert_eq!(reply.kind, MessageType::Error);
}

#[tokio::test]
async fn session_is_evicted_after_grace_period_once_empty() {
    let (addr, collaborators) = spawn_hub(Duration::from_millis(100)).await;
    seed(&collaborators, "s6", 1);

    {
        let mut host = MockWsClient::connect(&format!("ws://{addr}/lt/s6/ws?name=Host&host=true"))
            .await
            .unwrap();
        drain_burst(&mut host, 4).await;
        host.close().await.unwrap();
    }

    tokio::time::sleep(Duration::from_millis(400)).await;

    // a second join for the same session ID is treated as a fresh load from
    // the still-seeded store, since the in-memory session object was evicted
    let mut rejoin = MockWsClient::connect(&format!("ws://{addr}/lt/s6/ws?name=Host&host=true"))
        .await
        .unwrap();
    let burst = drain_burst(&mut rejoin, 4).await;
    assert_eq!(burst[0].kind, MessageType::Welcome);
}
