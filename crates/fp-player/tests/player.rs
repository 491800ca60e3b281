//! Player actor: commands, resize coalescing, and shutdown.

mod common;

use std::time::Duration;

use common::{session, FakeProbe, RecordingSink, Script, ScriptedDecoder};
use fp_core::{Error, FailureKind, PlaybackState, TargetSize, Viewport};
use fp_player::Player;

const SOURCE: &str = "/media/clip.mp4";

fn viewport(width: u32, height: u32) -> Viewport {
    Viewport { width, height }
}

async fn wait_for_frames(sink: &RecordingSink, n: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while sink.frame_count() < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("frames did not arrive");
}

#[tokio::test]
async fn streams_until_decoder_exits() {
    let sink = RecordingSink::default();
    let decoder = ScriptedDecoder::new(Script::finite(5, 3, 0));
    let handle = Player::spawn(session(FakeProbe::new(64, 48), decoder, sink.clone()));

    let target = handle.start(SOURCE, viewport(16, 16)).await.unwrap();
    assert_eq!(target, TargetSize::new(16, 12));

    let state = tokio::time::timeout(
        Duration::from_secs(5),
        handle.wait_for(|s| s.is_idle() || s.failure_kind().is_some()),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(state, PlaybackState::Idle);
    assert_eq!(sink.frame_count(), 5);

    let session = handle.shutdown().await.unwrap();
    assert_eq!(session.stats().frames, 5);
    assert_eq!(session.stats().trailing_bytes_dropped, 3);
}

#[tokio::test]
async fn resize_while_streaming_restarts_decoder() {
    let sink = RecordingSink::default();
    let decoder = ScriptedDecoder::new(Script::endless());
    let handle = Player::spawn(session(
        FakeProbe::new(64, 48),
        decoder.clone(),
        sink.clone(),
    ));

    handle.start(SOURCE, viewport(16, 16)).await.unwrap();
    wait_for_frames(&sink, 2).await;

    let target = handle.resize(viewport(8, 8)).await.unwrap();
    assert_eq!(target, TargetSize::new(8, 6));
    assert_eq!(decoder.termination_count(), 1);
    let restarted_at = sink.frame_count();

    wait_for_frames(&sink, restarted_at + 2).await;
    let after = sink.frames().split_off(restarted_at);
    assert!(after.iter().all(|f| f.fill == 2 && f.size == target));

    let session = handle.shutdown().await.unwrap();
    assert!(!session.is_live());
    assert_eq!(decoder.termination_count(), 2);
}

#[tokio::test]
async fn queued_resizes_are_coalesced() {
    let decoder = ScriptedDecoder::new(Script::endless());
    let handle = Player::spawn(session(
        FakeProbe::new(64, 48),
        decoder.clone(),
        RecordingSink::default(),
    ));
    handle.start(SOURCE, viewport(16, 16)).await.unwrap();

    let (a, b, c) = tokio::join!(
        handle.resize(viewport(8, 8)),
        handle.resize(viewport(32, 32)),
        handle.resize(viewport(4, 4)),
    );

    let last = TargetSize::new(4, 3);
    assert_eq!(c.unwrap(), last);
    assert_eq!(a.unwrap(), last);
    assert_eq!(b.unwrap(), last);
    // One initial start plus a single restart for all three resizes.
    assert_eq!(decoder.spawn_count(), 2);
    assert_eq!(*decoder.targets.lock().unwrap().last().unwrap(), last);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn resize_before_start_is_validation_error() {
    let decoder = ScriptedDecoder::new(Script::endless());
    let handle = Player::spawn(session(
        FakeProbe::new(64, 48),
        decoder.clone(),
        RecordingSink::default(),
    ));

    let err = handle.resize(viewport(8, 8)).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(decoder.spawn_count(), 0);
    assert!(handle.state().is_idle());

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn stop_returns_to_idle_and_reports_stats() {
    let sink = RecordingSink::default();
    let decoder = ScriptedDecoder::new(Script::endless());
    let handle = Player::spawn(session(
        FakeProbe::new(64, 48),
        decoder.clone(),
        sink.clone(),
    ));

    handle.start(SOURCE, viewport(16, 16)).await.unwrap();
    wait_for_frames(&sink, 1).await;

    let stats = handle.stop().await.unwrap();
    assert!(stats.frames >= 1);
    assert!(handle.state().is_idle());
    assert_eq!(decoder.termination_count(), 1);

    // A second stop is a no-op.
    handle.stop().await.unwrap();
    assert_eq!(decoder.termination_count(), 1);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn start_failure_is_reported_to_caller() {
    let decoder = ScriptedDecoder::new(Script::endless());
    let handle = Player::spawn(session(
        FakeProbe::failing("Invalid data found when processing input"),
        decoder.clone(),
        RecordingSink::default(),
    ));

    let err = handle.start(SOURCE, viewport(16, 16)).await.unwrap_err();
    assert!(matches!(err, Error::Probe(_)));
    assert!(matches!(handle.state(), PlaybackState::Failed(_)));
    assert_eq!(decoder.spawn_count(), 0);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn decode_failure_leaves_player_usable() {
    let sink = RecordingSink::default();
    let decoder = ScriptedDecoder::sequence(vec![Script::finite(3, 0, 1)], Script::finite(2, 0, 0));
    let handle = Player::spawn(session(FakeProbe::new(64, 48), decoder.clone(), sink.clone()));

    handle.start(SOURCE, viewport(16, 16)).await.unwrap();
    let state = tokio::time::timeout(
        Duration::from_secs(5),
        handle.wait_for(|s| s.failure_kind().is_some()),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(state.failure_kind(), Some(FailureKind::Decode));
    assert_eq!(sink.frame_count(), 3);

    handle.start(SOURCE, viewport(16, 16)).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle.wait_for(|s| s.is_idle()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sink.frame_count(), 5);
    assert_eq!(decoder.spawn_count(), 2);

    handle.shutdown().await.unwrap();
}
