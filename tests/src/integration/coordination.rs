//! # Coordination Flows
//!
//! Barrier ordering across endpoints, swap order and navigation admission.

#[cfg(test)]
mod tests {
    use super::super::support::{within, Behavior, Harness};
    use router_bus::{EventFilter, EventTopic, NavigationOutcome, RouterEvent};
    use router_core::{
        GuardOutcome, HookTarget, LoadOptions, NavigationState, RouterConfig, SwapOrder,
        ViewportOptions,
    };
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn two_viewports(config: RouterConfig) -> Harness {
        let h = Harness::new(config);
        for name in ["a", "b", "c", "d"] {
            h.register(name, Behavior::default());
        }
        h.viewport(ViewportOptions::new("left")).await;
        h.viewport(ViewportOptions::new("right")).await;
        h
    }

    // =============================================================================
    // BARRIERS
    // =============================================================================

    #[tokio::test]
    async fn test_unload_guards_finish_before_any_load_guard() {
        let h = two_viewports(RouterConfig::default()).await;
        within(h.router.load("a@left+b@right", LoadOptions::default()))
            .await
            .unwrap();
        h.clear_log();

        assert!(within(h.router.load("c@left+d@right", LoadOptions::default()))
            .await
            .unwrap());

        let unloads = h.positions("canUnload:");
        let loads = h.positions("canLoad:");
        assert_eq!(unloads.len(), 2);
        assert_eq!(loads.len(), 2);
        assert!(unloads.iter().max() < loads.iter().min());
    }

    #[tokio::test]
    async fn test_loaded_barrier_holds_activation() {
        let config = RouterConfig {
            sync_states: vec![
                NavigationState::GuardedUnload,
                NavigationState::Loaded,
                NavigationState::Swapped,
            ],
            ..RouterConfig::default()
        };
        let h = two_viewports(config).await;

        assert!(within(h.router.load("a@left+b@right", LoadOptions::default()))
            .await
            .unwrap());

        let loading = h.positions("loading:");
        let activate = h.positions("activate:");
        assert_eq!(loading.len(), 2);
        assert_eq!(activate.len(), 2);
        assert!(loading.iter().max() < activate.iter().min());
    }

    // =============================================================================
    // SWAP ORDER
    // =============================================================================

    async fn swap_positions(order: SwapOrder) -> (usize, usize) {
        let config = RouterConfig {
            swap_order: order,
            ..RouterConfig::default()
        };
        let h = two_viewports(config).await;
        within(h.router.load("a@left", LoadOptions::default())).await.unwrap();
        within(h.router.load("b@left", LoadOptions::default())).await.unwrap();
        (h.positions("activate:b")[0], h.positions("deactivate:a")[0])
    }

    #[tokio::test]
    async fn test_attach_next_then_detach_current() {
        let (attach, detach) = swap_positions(SwapOrder::AttachNextDetachCurrent).await;
        assert!(attach < detach);
    }

    #[tokio::test]
    async fn test_detach_current_then_attach_next() {
        let (attach, detach) = swap_positions(SwapOrder::DetachCurrentAttachNext).await;
        assert!(detach < attach);
    }

    // =============================================================================
    // GUARD CHECKPOINTS
    // =============================================================================

    #[tokio::test]
    async fn test_can_load_interceptor_runs_once_per_content() {
        let h = Harness::new(RouterConfig::default());
        h.register("a", Behavior::default().viewport("inner"))
            .register("b", Behavior::default());
        h.viewport(ViewportOptions::new("main")).await;

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        h.router.hooks().add_can_load(HookTarget::only(["a"]), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(GuardOutcome::Allow) }
        });

        assert!(within(h.router.load("a/b", LoadOptions::default())).await.unwrap());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(h.count("canLoad:a"), 1);
        assert_eq!(h.count("canLoad:b"), 1);
    }

    // =============================================================================
    // ADMISSION
    // =============================================================================

    #[tokio::test]
    async fn test_concurrent_loads_are_serialized() {
        let h = two_viewports(RouterConfig::default()).await;
        let mut events = h.bus.subscribe(EventFilter::topics(vec![EventTopic::Navigation]));

        let loads: Vec<_> = ["a@left", "b@left", "c@right", "d@left+a@right"]
            .into_iter()
            .map(|path| {
                let router = h.router.clone();
                tokio::spawn(async move { router.load(path, LoadOptions::default()).await })
            })
            .collect();
        for load in within(futures::future::join_all(loads)).await {
            assert!(load.unwrap().unwrap());
        }

        let events = events.drain();
        let mut ended: BTreeMap<u64, usize> = BTreeMap::new();
        let mut running: Option<u64> = None;
        for event in &events {
            match event {
                RouterEvent::NavigationStarted { navigation_id, .. } => {
                    assert_eq!(running, None, "navigations overlapped");
                    running = Some(*navigation_id);
                }
                RouterEvent::NavigationEnded {
                    navigation_id,
                    outcome,
                    ..
                } => {
                    assert_eq!(running, Some(*navigation_id));
                    assert_eq!(*outcome, NavigationOutcome::Committed);
                    *ended.entry(*navigation_id).or_default() += 1;
                    running = None;
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(ended.len(), 4);
        assert!(ended.values().all(|count| *count == 1));
        assert_eq!(h.router.history_state().navigations.len(), 4);
    }

    #[tokio::test]
    async fn test_events_of_one_navigation_among_concurrent_loads() {
        let h = two_viewports(RouterConfig::default()).await;
        let mut events = h.bus.subscribe(EventFilter::all());

        let loads: Vec<_> = ["a@left", "b@right"]
            .into_iter()
            .map(|path| {
                let router = h.router.clone();
                tokio::spawn(async move { router.load(path, LoadOptions::default()).await })
            })
            .collect();
        let second = within(events.until_ended(2)).await;
        for load in within(futures::future::join_all(loads)).await {
            assert!(load.unwrap().unwrap());
        }

        assert_eq!(second.len(), 2);
        assert!(matches!(
            second[0],
            RouterEvent::NavigationStarted { navigation_id: 2, .. }
        ));
        assert!(matches!(
            second[1],
            RouterEvent::NavigationEnded {
                navigation_id: 2,
                outcome: NavigationOutcome::Committed,
                ..
            }
        ));
    }
}
