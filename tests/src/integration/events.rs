//! # Event Bus Flows
//!
//! Notification order for committed, failed and vetoed navigations, and
//! endpoint registration events.

#[cfg(test)]
mod tests {
    use super::super::support::{within, Behavior, Harness};
    use router_bus::{EventFilter, EventTopic, NavigationOutcome, RouterEvent};
    use router_core::ports::inbound::RouterApi;
    use router_core::{HookDecision, LoadOptions, RouterConfig, ViewportOptions};
    use std::time::Duration;
    use tokio::time::timeout;

    fn kinds(events: &[RouterEvent]) -> Vec<&'static str> {
        events
            .iter()
            .map(|event| match event {
                RouterEvent::NavigationStarted { .. } => "started",
                RouterEvent::NavigationFailed { .. } => "failed",
                RouterEvent::NavigationCancelled { .. } => "cancelled",
                RouterEvent::NavigationEnded { .. } => "ended",
                RouterEvent::EndpointConnected { .. } => "connected",
                RouterEvent::EndpointDisconnected { .. } => "disconnected",
            })
            .collect()
    }

    fn outcome(event: &RouterEvent) -> Option<NavigationOutcome> {
        match event {
            RouterEvent::NavigationEnded { outcome, .. } => Some(*outcome),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_connecting_a_viewport_is_announced() {
        let h = Harness::new(RouterConfig::default());
        let mut sub = h.bus.subscribe(EventFilter::topics(vec![EventTopic::Endpoint]));

        let main = h.viewport(ViewportOptions::new("main")).await;

        let event = timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("timeout waiting for event")
            .expect("should receive event");
        match event {
            RouterEvent::EndpointConnected { endpoint_id, name } => {
                assert_eq!(endpoint_id, main.0);
                assert_eq!(name, "main");
            }
            other => panic!("Expected EndpointConnected event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_committed_navigation_events() {
        let h = Harness::new(RouterConfig::default());
        h.register("a", Behavior::default().viewport("inner"))
            .register("b", Behavior::default());
        h.viewport(ViewportOptions::new("main")).await;
        let mut sub = h.bus.subscribe(EventFilter::all());

        within(h.router.load("a", LoadOptions::default())).await.unwrap();
        let first = sub.drain();
        assert_eq!(kinds(&first), vec!["started", "connected", "ended"]);
        assert_eq!(outcome(&first[2]), Some(NavigationOutcome::Committed));

        within(h.router.load("b", LoadOptions::default())).await.unwrap();
        let second = sub.drain();
        assert_eq!(kinds(&second), vec!["started", "ended", "disconnected"]);
        assert!(matches!(
            &second[2],
            RouterEvent::EndpointDisconnected { name, .. } if name == "inner"
        ));
    }

    #[tokio::test]
    async fn test_failed_navigation_events() {
        let h = Harness::new(RouterConfig::default());
        h.viewport(ViewportOptions::new("main")).await;
        let mut sub = h.bus.subscribe(EventFilter::topics(vec![EventTopic::Navigation]));

        assert!(within(h.router.load("missing", LoadOptions::default())).await.is_err());

        let events = sub.drain();
        assert_eq!(kinds(&events), vec!["started", "failed", "ended"]);
        assert_eq!(outcome(&events[2]), Some(NavigationOutcome::Failed));
    }

    #[tokio::test]
    async fn test_vetoed_navigation_events() {
        let h = Harness::new(RouterConfig::default());
        h.register("a", Behavior::default());
        h.viewport(ViewportOptions::new("main")).await;
        h.router
            .hooks()
            .add_before_navigation(|_| async { Ok(HookDecision::Veto) });
        let mut sub = h.bus.subscribe(EventFilter::all());

        assert!(!within(h.router.load("a", LoadOptions::default())).await.unwrap());

        let events = sub.drain();
        assert_eq!(kinds(&events), vec!["started", "cancelled", "ended"]);
        assert_eq!(outcome(&events[2]), Some(NavigationOutcome::Cancelled));
    }

    #[tokio::test]
    async fn test_parse_error_publishes_nothing() {
        let h = Harness::new(RouterConfig::default());
        h.viewport(ViewportOptions::new("main")).await;
        let mut sub = h.bus.subscribe(EventFilter::all());

        assert!(within(h.router.load("a(1", LoadOptions::default())).await.is_err());
        assert!(sub.drain().is_empty());
    }
}
