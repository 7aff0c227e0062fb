//! Busy-state scenarios driven through the public coordinator API.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use busy_gate::{BusyCoordinator, OperationMeta, Subscription};
use tokio::sync::{oneshot, Barrier};

fn record(coordinator: &BusyCoordinator) -> (Arc<Mutex<Vec<bool>>>, Subscription) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let sub = coordinator
        .state()
        .subscribe(move |busy| sink.lock().unwrap().push(busy));
    (seen, sub)
}

#[tokio::test]
async fn test_overlapping_success_then_failure() {
    let coordinator = BusyCoordinator::default();
    let (seen, _sub) = record(&coordinator);

    let (done1, wait1) = oneshot::channel::<Result<&str, String>>();
    let (done2, wait2) = oneshot::channel::<Result<&str, String>>();

    let c = coordinator.clone();
    let o1 = tokio::spawn(async move {
        c.wrap(&OperationMeta::new("/portfolios"), async move { wait1.await.unwrap() }).await
    });
    let c = coordinator.clone();
    let o2 = tokio::spawn(async move {
        c.wrap(&OperationMeta::new("/portfolios/3/performance"), async move { wait2.await.unwrap() })
            .await
    });

    while coordinator.gate().active_count() < 2 {
        tokio::task::yield_now().await;
    }

    done1.send(Ok("loaded")).unwrap();
    assert_eq!(o1.await.unwrap(), Ok("loaded"));
    assert!(coordinator.state().is_busy());

    done2.send(Err("timeout".to_string())).unwrap();
    assert_eq!(o2.await.unwrap(), Err("timeout".to_string()));
    assert!(!coordinator.state().is_busy());

    assert_eq!(*seen.lock().unwrap(), vec![false, true, false]);
}

#[tokio::test]
async fn test_skip_marker_never_moves_flag() {
    let coordinator = BusyCoordinator::default();
    let (seen, _sub) = record(&coordinator);

    let op = OperationMeta::new("/portfolios").header(
        "x-skip-busy".parse().unwrap(),
        "true".parse().unwrap(),
    );
    coordinator
        .wrap(&op, tokio::time::sleep(Duration::from_millis(10)))
        .await;

    assert_eq!(coordinator.gate().active_count(), 0);
    assert_eq!(*seen.lock().unwrap(), vec![false]);
}

#[tokio::test]
async fn test_named_keys_aggregate() {
    let coordinator = BusyCoordinator::default();
    let state = coordinator.state();
    let (seen, _sub) = record(&coordinator);

    state.set_for("rebalance", true);
    state.set_for("other", true);
    state.set_for("rebalance", false);
    assert!(state.is_busy());
    state.set_for("other", false);
    assert!(!state.is_busy());

    assert_eq!(*seen.lock().unwrap(), vec![false, true, false]);
}

#[tokio::test]
async fn test_clear_all_overrides_pending_operation() {
    let coordinator = BusyCoordinator::default();
    let (release, wait) = oneshot::channel::<()>();

    let c = coordinator.clone();
    let pending = tokio::spawn(async move {
        c.wrap(&OperationMeta::new("/portfolios"), wait).await
    });
    while coordinator.gate().active_count() == 0 {
        tokio::task::yield_now().await;
    }
    coordinator.state().set_for("rebalance", true);

    coordinator.state().clear_all();
    assert!(!coordinator.state().is_busy());
    assert!(coordinator.state().active_keys().is_empty());
    assert_eq!(coordinator.gate().active_count(), 1, "counted operation still pending");

    release.send(()).unwrap();
    pending.await.unwrap().unwrap();
    assert_eq!(coordinator.gate().active_count(), 0);
    assert!(!coordinator.state().is_busy());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_count_tracks_pending_operations() {
    const N: usize = 16;
    let coordinator = BusyCoordinator::default();
    let started = Arc::new(Barrier::new(N + 1));
    let mut releases = Vec::new();
    let mut handles = Vec::new();

    for i in 0..N {
        let (tx, rx) = oneshot::channel::<()>();
        releases.push(tx);
        let c = coordinator.clone();
        let started = started.clone();
        handles.push(tokio::spawn(async move {
            c.wrap(&OperationMeta::new(format!("/portfolios/{}", i)), async move {
                started.wait().await;
                let _ = rx.await;
            })
            .await
        }));
    }

    started.wait().await;
    assert_eq!(coordinator.gate().active_count(), N);

    for (done, (release, handle)) in releases.into_iter().zip(handles).enumerate() {
        release.send(()).unwrap();
        handle.await.unwrap();
        let remaining = N - done - 1;
        assert_eq!(coordinator.gate().active_count(), remaining);
        assert_eq!(coordinator.state().is_busy(), remaining > 0);
    }
}
