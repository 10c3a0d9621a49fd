//! Integration tests for connectivity interruption handling.

mod common;

use bridge_traits::network::ConnectivityStatus;
use bridge_traits::time::{ManualDelay, ManualTickerSource, TickerSource};
use common::{remote_episode, settle, FakeBackend};
use core_playback::{InterruptionCoordinator, Player, PlayerConfig};
use core_runtime::events::EventBus;
use std::sync::Arc;
use std::time::Duration;

const GRACE: Duration = Duration::from_secs(3);

struct Fixture {
    backend: Arc<FakeBackend>,
    ticker: Arc<ManualTickerSource>,
    delay: Arc<ManualDelay>,
    player: Arc<Player>,
    coordinator: Arc<InterruptionCoordinator>,
}

fn fixture() -> Fixture {
    let backend = FakeBackend::new();
    let ticker = Arc::new(ManualTickerSource::new(Duration::from_millis(500)));
    let delay = Arc::new(ManualDelay::new());
    let events = EventBus::new(16);
    let player = Arc::new(
        Player::new(
            Arc::clone(&backend) as _,
            Arc::clone(&ticker) as Arc<dyn TickerSource>,
            PlayerConfig::default(),
            events.clone(),
        )
        .expect("valid config"),
    );
    let coordinator = InterruptionCoordinator::new(
        Arc::clone(&player),
        Arc::clone(&delay) as _,
        events,
        GRACE,
    );
    Fixture {
        backend,
        ticker,
        delay,
        player,
        coordinator,
    }
}

async fn advance(delay: &ManualDelay, by: Duration) {
    settle().await;
    delay.advance(by);
    settle().await;
}

#[tokio::test]
async fn loss_while_playing_pauses_at_position() {
    let f = fixture();
    f.player
        .play(remote_episode("ep-1"), Some(Duration::from_secs(30)), None)
        .await
        .unwrap();

    f.coordinator
        .handle_status(ConnectivityStatus::Disconnected)
        .await;
    settle().await;

    assert!(!f.player.is_playing());
    assert_eq!(f.player.current_position(), Some(Duration::from_secs(30)));
}

#[tokio::test]
async fn loss_while_paused_never_overwrites_user_pause() {
    let f = fixture();
    f.player
        .play(remote_episode("ep-1"), None, None)
        .await
        .unwrap();
    f.coordinator.notify_manual_pause();
    f.player.pause().await.unwrap();

    f.coordinator
        .handle_status(ConnectivityStatus::Disconnected)
        .await;
    f.coordinator
        .handle_status(ConnectivityStatus::Connected)
        .await;
    advance(&f.delay, GRACE).await;

    // No auto-resume: the pause belonged to the user.
    assert!(!f.player.is_playing());
}

#[tokio::test]
async fn loss_observes_pause_committed_before_its_critical_section() {
    let f = fixture();
    f.player
        .play(remote_episode("ep-1"), None, None)
        .await
        .unwrap();

    // Pause lands on the player without a manual-pause notification,
    // as if it raced ahead of the loss report.
    f.player.pause().await.unwrap();

    f.coordinator
        .handle_status(ConnectivityStatus::Disconnected)
        .await;
    f.coordinator
        .handle_status(ConnectivityStatus::Connected)
        .await;
    advance(&f.delay, GRACE).await;

    // The coordinator never owned this pause, so it never resumes it.
    assert!(!f.player.is_playing());
}

#[tokio::test]
async fn recovery_auto_resumes_after_grace_period() {
    let f = fixture();
    f.player
        .play(remote_episode("ep-1"), Some(Duration::from_secs(10)), None)
        .await
        .unwrap();

    f.coordinator
        .handle_status(ConnectivityStatus::Disconnected)
        .await;
    f.coordinator
        .handle_status(ConnectivityStatus::Connected)
        .await;

    // Not yet: one second short of the grace period.
    advance(&f.delay, GRACE - Duration::from_secs(1)).await;
    assert!(!f.player.is_playing());

    advance(&f.delay, Duration::from_secs(1)).await;
    assert!(f.player.is_playing());
    assert_eq!(f.player.current_position(), Some(Duration::from_secs(10)));

    // Ticking resumed from the interruption position.
    f.ticker.tick();
    settle().await;
    assert_eq!(
        f.player.current_position(),
        Some(Duration::from_millis(10_500))
    );
}

#[tokio::test]
async fn second_loss_cancels_pending_resume() {
    let f = fixture();
    f.player
        .play(remote_episode("ep-1"), None, None)
        .await
        .unwrap();

    f.coordinator
        .handle_status(ConnectivityStatus::Disconnected)
        .await;
    f.coordinator
        .handle_status(ConnectivityStatus::Connected)
        .await;
    settle().await;

    // Drops again before the grace period elapses.
    f.coordinator
        .handle_status(ConnectivityStatus::Disconnected)
        .await;

    // Even after the original grace would have fired, still paused.
    advance(&f.delay, GRACE * 2).await;
    assert!(!f.player.is_playing());

    // A later recovery schedules a fresh grace period and resumes.
    f.coordinator
        .handle_status(ConnectivityStatus::Connected)
        .await;
    advance(&f.delay, GRACE).await;
    assert!(f.player.is_playing());
}

#[tokio::test]
async fn manual_pause_during_grace_suppresses_auto_resume() {
    let f = fixture();
    f.player
        .play(remote_episode("ep-1"), None, None)
        .await
        .unwrap();

    f.coordinator
        .handle_status(ConnectivityStatus::Disconnected)
        .await;
    f.coordinator
        .handle_status(ConnectivityStatus::Connected)
        .await;
    settle().await;

    // User pauses while the resume is pending.
    f.coordinator.notify_manual_pause();
    f.player.pause().await.unwrap();

    advance(&f.delay, GRACE * 2).await;
    assert!(!f.player.is_playing());
}

#[tokio::test]
async fn duplicate_statuses_are_deduplicated() {
    let f = fixture();
    f.player
        .play(remote_episode("ep-1"), None, None)
        .await
        .unwrap();

    f.coordinator
        .handle_status(ConnectivityStatus::Disconnected)
        .await;
    settle().await;
    f.backend.clear_commands();

    // A repeated loss report must not issue another pause.
    f.coordinator
        .handle_status(ConnectivityStatus::Disconnected)
        .await;
    settle().await;
    assert!(f.backend.commands().is_empty());
}

#[tokio::test]
async fn unknown_status_is_ignored() {
    let f = fixture();
    f.player
        .play(remote_episode("ep-1"), None, None)
        .await
        .unwrap();

    f.coordinator
        .handle_status(ConnectivityStatus::Unknown)
        .await;
    settle().await;
    assert!(f.player.is_playing());
}

#[tokio::test]
async fn loss_in_idle_is_a_noop() {
    let f = fixture();
    f.coordinator
        .handle_status(ConnectivityStatus::Disconnected)
        .await;
    f.coordinator
        .handle_status(ConnectivityStatus::Connected)
        .await;
    advance(&f.delay, GRACE).await;

    assert!(f.backend.commands().is_empty());
    assert!(!f.player.is_playing());
}
