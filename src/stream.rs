//! Change detection over successive feed snapshots.
//!
//! `ChangeDetector` holds the last good snapshot and reports games that are
//! new or differ from it. `spawn_change_loop` drives it from a periodic task
//! and pushes results into a bounded channel, so a slow consumer slows the
//! polling down instead of losing notifications.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval as tick_interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::types::{Game, GameUpdate, Snapshot};

/// Anything able to produce a full feed snapshot.
#[async_trait]
pub trait SnapshotSource: Send + Sync + 'static {
    async fn load(&self, cancel: &CancellationToken) -> Result<Snapshot>;
}

#[derive(Debug, Default)]
enum DetectorState {
    #[default]
    Priming,
    Steady(Snapshot),
}

/// Diffs each snapshot against the previous successful one.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    state: DetectorState,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// True until the first snapshot has been applied.
    pub fn is_priming(&self) -> bool {
        matches!(self.state, DetectorState::Priming)
    }

    pub fn last(&self) -> Option<&Snapshot> {
        match &self.state {
            DetectorState::Priming => None,
            DetectorState::Steady(snapshot) => Some(snapshot),
        }
    }

    /// Return games of `current` that are missing from, or differ from, the
    /// retained snapshot, then retain `current`. Games that disappeared are
    /// not reported.
    pub fn apply(&mut self, current: Snapshot) -> Vec<Game> {
        let changed = match &self.state {
            DetectorState::Priming => current.values().cloned().collect(),
            DetectorState::Steady(last) => current
                .iter()
                .filter(|(id, game)| last.get(*id) != Some(*game))
                .map(|(_, game)| game.clone())
                .collect(),
        };
        self.state = DetectorState::Steady(current);
        changed
    }
}

/// Spawn the polling task and return its notification stream.
///
/// The first load runs immediately, the next ones every `interval`. Loads
/// never overlap: a slow load delays the following tick. The task exits,
/// closing the stream, when `cancel` fires or the receiver is dropped.
pub fn spawn_change_loop<S: SnapshotSource>(
    source: S,
    interval: Duration,
    cancel: CancellationToken,
    buffer: usize,
) -> mpsc::Receiver<GameUpdate> {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    tokio::spawn(run_change_loop(source, interval, cancel, tx));
    rx
}

async fn run_change_loop<S: SnapshotSource>(
    source: S,
    interval: Duration,
    cancel: CancellationToken,
    tx: mpsc::Sender<GameUpdate>,
) {
    let mut ticker = tick_interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut detector = ChangeDetector::new();
    info!("Watching lottery feed every {:?}", interval);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let updates: Vec<GameUpdate> = match source.load(&cancel).await {
            Ok(snapshot) => {
                let total = snapshot.len();
                let changed = detector.apply(snapshot);
                debug!("Feed tick: {} games, {} changed", total, changed.len());
                changed.into_iter().map(GameUpdate::Game).collect()
            }
            Err(_) if cancel.is_cancelled() => break,
            Err(e) => {
                warn!("Feed tick failed: {}", e);
                vec![GameUpdate::Error(e)]
            }
        };

        for update in updates {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Stopped watching lottery feed");
                    return;
                }
                sent = tx.send(update) => {
                    if sent.is_err() {
                        info!("Change stream receiver dropped, stopping");
                        return;
                    }
                }
            }
        }
    }

    info!("Stopped watching lottery feed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeedError;
    use crate::types::StateProv;
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::timeout;

    fn game(id: &str, numbers: &str) -> Game {
        Game {
            id: id.to_string(),
            name: format!("Game {}", id),
            state_provs: vec![StateProv {
                id: "CA".to_string(),
                name: "California".to_string(),
                country: "U.S.A.".to_string(),
            }],
            update_time: Utc.with_ymd_and_hms(2007, 10, 17, 3, 8, 37).unwrap(),
            last_draw_date: NaiveDate::from_ymd_opt(2007, 10, 16).unwrap(),
            last_draw_numbers: numbers.to_string(),
            next_draw_date: NaiveDate::from_ymd_opt(2007, 10, 19).unwrap(),
            jackpot: None,
        }
    }

    fn snapshot(games: &[Game]) -> Snapshot {
        games
            .iter()
            .map(|g| (format!("{}-10/16/2007", g.id), g.clone()))
            .collect()
    }

    /// Replays scripted load results, then repeats the last snapshot.
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<Snapshot>>>,
        loads: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Snapshot>>) -> (Self, Arc<AtomicUsize>) {
            let loads = Arc::new(AtomicUsize::new(0));
            let source = Self {
                script: Mutex::new(script.into()),
                loads: Arc::clone(&loads),
            };
            (source, loads)
        }
    }

    #[async_trait]
    impl SnapshotSource for ScriptedSource {
        async fn load(&self, _cancel: &CancellationToken) -> Result<Snapshot> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                return script.pop_front().unwrap();
            }
            match script.front() {
                Some(Ok(snapshot)) => Ok(snapshot.clone()),
                _ => Ok(Snapshot::new()),
            }
        }
    }

    /// Never completes until cancelled.
    struct HangingSource;

    #[async_trait]
    impl SnapshotSource for HangingSource {
        async fn load(&self, cancel: &CancellationToken) -> Result<Snapshot> {
            cancel.cancelled().await;
            Err(FeedError::Cancelled)
        }
    }

    async fn next_game(rx: &mut mpsc::Receiver<GameUpdate>) -> Game {
        match timeout(Duration::from_secs(3600), rx.recv()).await {
            Ok(Some(GameUpdate::Game(game))) => game,
            other => panic!("expected game update, got {:?}", other),
        }
    }

    #[test]
    fn test_first_snapshot_reports_everything() {
        let mut detector = ChangeDetector::new();
        assert!(detector.is_priming());

        let changed = detector.apply(snapshot(&[game("1", "01"), game("2", "02")]));
        assert_eq!(changed.len(), 2);
        assert!(!detector.is_priming());
    }

    #[test]
    fn test_first_empty_snapshot_leaves_priming() {
        let mut detector = ChangeDetector::new();
        assert!(detector.apply(Snapshot::new()).is_empty());
        assert!(!detector.is_priming());
        assert!(detector.last().unwrap().is_empty());
    }

    #[test]
    fn test_identical_snapshot_reports_nothing() {
        let mut detector = ChangeDetector::new();
        detector.apply(snapshot(&[game("1", "01"), game("2", "02")]));
        assert!(detector.apply(snapshot(&[game("1", "01"), game("2", "02")])).is_empty());
    }

    #[test]
    fn test_changed_outcome_reports_only_that_game() {
        let mut detector = ChangeDetector::new();
        detector.apply(snapshot(&[game("1", "01"), game("2", "02")]));

        let changed = detector.apply(snapshot(&[game("1", "01"), game("2", "03")]));
        assert_eq!(changed, vec![game("2", "03")]);
    }

    #[test]
    fn test_location_and_jackpot_changes_are_detected() {
        let mut detector = ChangeDetector::new();
        detector.apply(snapshot(&[game("1", "01")]));

        let mut with_location = game("1", "01");
        with_location.state_provs.push(StateProv {
            id: "GA".to_string(),
            name: "Georgia".to_string(),
            country: "U.S.A.".to_string(),
        });
        assert_eq!(detector.apply(snapshot(&[with_location.clone()])).len(), 1);

        let mut with_jackpot = with_location;
        with_jackpot.jackpot = Some(crate::types::Jackpot {
            date: NaiveDate::from_ymd_opt(2007, 10, 19).unwrap(),
            amount: 34000000,
        });
        assert_eq!(detector.apply(snapshot(&[with_jackpot])).len(), 1);
    }

    #[test]
    fn test_removed_then_readded_game_is_reported_again() {
        let mut detector = ChangeDetector::new();
        detector.apply(snapshot(&[game("1", "01"), game("2", "02")]));

        assert!(detector.apply(snapshot(&[game("1", "01")])).is_empty());
        assert_eq!(
            detector.apply(snapshot(&[game("1", "01"), game("2", "02")])),
            vec![game("2", "02")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_emits_changes_and_errors() {
        let first = snapshot(&[game("1", "01"), game("2", "02")]);
        let (source, loads) = ScriptedSource::new(vec![
            Ok(first.clone()),
            Ok(first.clone()),
            Err(FeedError::Malformed("truncated".into())),
            Ok(snapshot(&[game("1", "01"), game("2", "05")])),
        ]);
        let cancel = CancellationToken::new();
        let mut rx = spawn_change_loop(source, Duration::from_secs(60), cancel.clone(), 1);

        // Priming tick reports every game.
        assert_eq!(next_game(&mut rx).await.id, "1");
        assert_eq!(next_game(&mut rx).await.id, "2");

        // Second tick is identical and silent; third fails.
        match timeout(Duration::from_secs(600), rx.recv()).await {
            Ok(Some(GameUpdate::Error(e))) => assert!(matches!(e, FeedError::Malformed(_))),
            other => panic!("expected error update, got {:?}", other),
        }
        assert_eq!(loads.load(Ordering::SeqCst), 3);

        // Fourth tick diffs against the snapshot from before the failure.
        let changed = next_game(&mut rx).await;
        assert_eq!(changed, game("2", "05"));

        cancel.cancel();
        assert!(timeout(Duration::from_secs(600), rx.recv()).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_load_is_immediate() {
        let (source, loads) = ScriptedSource::new(vec![Ok(snapshot(&[game("1", "01")]))]);
        let cancel = CancellationToken::new();
        let mut rx = spawn_change_loop(source, Duration::from_secs(3600), cancel.clone(), 4);

        let received = timeout(Duration::from_millis(10), rx.recv()).await;
        assert!(matches!(received, Ok(Some(GameUpdate::Game(_)))));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        cancel.cancel();
    }

    #[tokio::test]
    async fn test_cancel_while_blocked_on_full_channel() {
        let games: Vec<Game> = (0..5).map(|i| game(&i.to_string(), "01")).collect();
        let (source, _) = ScriptedSource::new(vec![Ok(snapshot(&games))]);
        let cancel = CancellationToken::new();
        let mut rx = spawn_change_loop(source, Duration::from_secs(60), cancel.clone(), 1);

        // Let the buffer fill, then cancel without reading.
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        let mut received = 0;
        while let Ok(Some(_)) = timeout(Duration::from_secs(5), rx.recv()).await {
            received += 1;
        }
        assert!(received < games.len());
    }

    #[tokio::test]
    async fn test_cancel_during_load() {
        let cancel = CancellationToken::new();
        let mut rx = spawn_change_loop(HangingSource, Duration::from_secs(60), cancel.clone(), 1);

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let next = timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert!(next.is_none(), "no error update after cancellation");
    }

    #[tokio::test]
    async fn test_dropped_receiver_stops_loop() {
        let (source, loads) = ScriptedSource::new(vec![Ok(snapshot(&[game("1", "01")]))]);
        let cancel = CancellationToken::new();
        let rx = spawn_change_loop(source, Duration::from_millis(5), cancel.clone(), 1);
        drop(rx);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }
}
