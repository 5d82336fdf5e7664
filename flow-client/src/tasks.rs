//! Background tasks driving the sync controller.
//!
//! Two triggers start a sync besides explicit calls: connectivity events
//! from the platform and a periodic timer. Both only call into the
//! controller, so the single-flight gate applies to them too.

use crate::config::SyncSettings;
use crate::controller::SyncController;
use crate::remote::RemoteService;
use crate::store::PersistedStore;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

/// A reachability event from the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Reachability {
    /// `None` when the platform cannot tell; treated as offline.
    pub reachable: Option<bool>,
}

impl Reachability {
    /// An event with a definite answer.
    pub fn known(reachable: bool) -> Self {
        Self {
            reachable: Some(reachable),
        }
    }
}

/// Feed reachability events into the controller until the sender closes.
pub fn spawn_connectivity_listener<S, R>(
    controller: Arc<SyncController<S, R>>,
    mut events: mpsc::Receiver<Reachability>,
) -> tokio::task::JoinHandle<()>
where
    S: PersistedStore + 'static,
    R: RemoteService + 'static,
{
    tokio::spawn(async move {
        tracing::debug!("Connectivity listener started");

        while let Some(event) = events.recv().await {
            if let Some(outcome) = controller.on_connectivity_change(event.reachable).await {
                tracing::info!("Reconnect sync finished: {:?}", outcome);
            }
        }

        tracing::debug!("Connectivity listener stopped");
    })
}

/// Spawn the periodic sync task.
///
/// Returns a handle that can be used to abort the task. The first sync
/// runs one interval after spawning.
pub fn spawn_periodic_sync<S, R>(
    controller: Arc<SyncController<S, R>>,
    settings: SyncSettings,
) -> tokio::task::JoinHandle<()>
where
    S: PersistedStore + 'static,
    R: RemoteService + 'static,
{
    tokio::spawn(async move {
        if !settings.periodic {
            tracing::info!("Periodic sync disabled");
            return;
        }

        let period = settings.interval();
        tracing::info!("Periodic sync started (interval: {}s)", period.as_secs());

        let mut timer = interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        timer.tick().await;

        loop {
            timer.tick().await;
            let outcome = controller.sync_data().await;
            tracing::debug!("Periodic sync: {:?}", outcome);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::controller::SyncOutcome;
    use crate::remote::MockRemote;
    use crate::store::MemoryStore;
    use flowstate_types::{RemoteAction, Timestamp};
    use std::time::Duration;

    fn controller() -> (Arc<SyncController<MemoryStore, MockRemote>>, MockRemote) {
        let remote = MockRemote::new();
        let controller =
            SyncController::new(ClientConfig::default(), MemoryStore::new(), remote.clone());
        (Arc::new(controller), remote)
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn listener_replays_queue_on_reconnect() {
        let (controller, remote) = controller();
        let (tx, rx) = mpsc::channel(8);
        let task = spawn_connectivity_listener(Arc::clone(&controller), rx);

        tx.send(Reachability::known(false)).await.unwrap();
        wait_for(|| !controller.state().is_online).await;

        controller
            .handle_offline_action(RemoteAction::SetLanguage {
                language: "hi".into(),
            })
            .await;
        assert!(remote.applied().is_empty());

        tx.send(Reachability::known(true)).await.unwrap();
        wait_for(|| remote.applied().len() == 1).await;

        drop(tx);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn unknown_reachability_means_offline() {
        let (controller, _remote) = controller();
        let (tx, rx) = mpsc::channel(8);
        let task = spawn_connectivity_listener(Arc::clone(&controller), rx);

        tx.send(Reachability::default()).await.unwrap();
        drop(tx);
        task.await.unwrap();

        assert!(!controller.state().is_online);
    }

    #[tokio::test]
    async fn disabled_periodic_task_exits() {
        let (controller, _remote) = controller();
        let settings = SyncSettings {
            interval_secs: 1,
            periodic: false,
        };

        let task = spawn_periodic_sync(controller, settings);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_task_syncs_after_interval() {
        let (controller, _remote) = controller();
        let settings = SyncSettings {
            interval_secs: 60,
            periodic: true,
        };

        let task = spawn_periodic_sync(Arc::clone(&controller), settings);
        assert_eq!(controller.state().last_sync_time, Timestamp::zero());

        tokio::time::sleep(Duration::from_secs(61)).await;
        wait_for(|| controller.state().last_sync_time != Timestamp::zero()).await;

        task.abort();
    }

    #[tokio::test]
    async fn periodic_sync_skips_while_offline() {
        let (controller, _remote) = controller();
        controller.on_connectivity_change(Some(false)).await;
        assert_eq!(controller.sync_data().await, SyncOutcome::Offline);
    }
}
