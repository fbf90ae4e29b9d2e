//! # History Flows
//!
//! Back, forward and refresh over committed navigations, record contents and
//! persistence of the store.

#[cfg(test)]
mod tests {
    use super::super::support::{within, Behavior, Harness};
    use router_core::ports::inbound::RouterApi;
    use router_core::{HookDecision, InMemoryHistory, LoadOptions, RouterConfig, ViewportOptions};
    use serde_json::json;
    use std::sync::Arc;

    async fn abc(h: &Harness) {
        for name in ["a", "b", "c"] {
            h.register(name, Behavior::default());
        }
        h.viewport(ViewportOptions::new("main")).await;
        for path in ["a", "b", "c"] {
            assert!(within(h.router.load(path, LoadOptions::default())).await.unwrap());
        }
    }

    fn active(h: &Harness) -> Option<String> {
        h.router
            .find_endpoint("main")
            .and_then(|main| h.router.active_component(main))
    }

    #[tokio::test]
    async fn test_back_forward_and_go() {
        let h = Harness::new(RouterConfig::default());
        abc(&h).await;

        assert!(within(h.router.back()).await.unwrap());
        assert_eq!(active(&h).as_deref(), Some("b"));
        assert!(within(h.router.go(-1)).await.unwrap());
        assert_eq!(active(&h).as_deref(), Some("a"));
        assert_eq!(h.router.history_state().navigation_index, 0);

        assert!(!within(h.router.back()).await.unwrap());
        assert_eq!(active(&h).as_deref(), Some("a"));

        assert!(within(h.router.go(2)).await.unwrap());
        assert_eq!(active(&h).as_deref(), Some("c"));
        assert!(!within(h.router.forward()).await.unwrap());
        assert_eq!(h.router.history_state().navigations.len(), 3);
    }

    #[tokio::test]
    async fn test_new_load_truncates_forward_entries() {
        let h = Harness::new(RouterConfig::default());
        abc(&h).await;
        within(h.router.go(-2)).await.unwrap();

        assert!(within(h.router.load("c", LoadOptions::default())).await.unwrap());

        let state = h.router.history_state();
        let paths: Vec<_> = state.navigations.iter().map(|n| n.path.as_str()).collect();
        assert_eq!(paths, vec!["a", "c"]);
        assert_eq!(state.navigation_index, 1);
    }

    #[tokio::test]
    async fn test_cancelled_history_move_restores_index() {
        let h = Harness::new(RouterConfig::default());
        h.register("a", Behavior::default())
            .register("b", Behavior::default().deny_unload());
        h.viewport(ViewportOptions::new("main")).await;
        within(h.router.load("a", LoadOptions::default())).await.unwrap();
        within(h.router.load("b", LoadOptions::default())).await.unwrap();

        assert!(!within(h.router.back()).await.unwrap());

        assert_eq!(active(&h).as_deref(), Some("b"));
        assert_eq!(h.router.history_state().navigation_index, 1);
    }

    #[tokio::test]
    async fn test_refresh_replaces_current_entry() {
        let h = Harness::new(RouterConfig::default());
        h.register("a", Behavior::default());
        h.viewport(ViewportOptions::new("main")).await;

        assert!(!within(h.router.refresh()).await.unwrap());
        within(h.router.load("a", LoadOptions::default())).await.unwrap();
        assert!(within(h.router.refresh()).await.unwrap());

        assert_eq!(active(&h).as_deref(), Some("a"));
        assert_eq!(h.router.history_state().navigations.len(), 1);
    }

    #[tokio::test]
    async fn test_replace_option_overwrites_entry() {
        let h = Harness::new(RouterConfig::default());
        abc(&h).await;

        let options = LoadOptions {
            replace: true,
            ..LoadOptions::default()
        };
        assert!(within(h.router.load("a", options)).await.unwrap());

        let state = h.router.history_state();
        assert_eq!(state.navigations.len(), 3);
        assert_eq!(state.navigations[2].path, "a");
    }

    // =============================================================================
    // RECORDS
    // =============================================================================

    #[tokio::test]
    async fn test_record_carries_request_details() {
        let h = Harness::new(RouterConfig::default());
        h.register("a", Behavior::default().title("Alpha"))
            .register("b", Behavior::default());
        h.viewport(ViewportOptions::new("main")).await;
        h.router
            .hooks()
            .add_transform_title(|title| HookDecision::Proceed(format!("{title} | Site")));

        within(h.router.load("a", LoadOptions::default())).await.unwrap();
        let options = LoadOptions {
            title: Some("Custom".to_string()),
            query: "x=1".to_string(),
            fragment: "top".to_string(),
            data: Some(json!({ "scroll": 120 })),
            ..LoadOptions::default()
        };
        within(h.router.load("b", options)).await.unwrap();

        let state = h.router.history_state();
        assert_eq!(state.navigations[0].title.as_deref(), Some("Alpha | Site"));
        let record = &state.navigations[1];
        assert_eq!(record.title.as_deref(), Some("Custom | Site"));
        assert_eq!(record.instruction, "b");
        assert_eq!(record.full_state_instruction, "b@main");
        assert_eq!(record.query, "x=1");
        assert_eq!(record.fragment, "top");
        assert_eq!(record.data, json!({ "scroll": 120 }));
    }

    #[tokio::test]
    async fn test_history_survives_json_round_trip() {
        let history = Arc::new(InMemoryHistory::new());
        let h = Harness::with_history(RouterConfig::default(), history.clone());
        for name in ["a", "b"] {
            h.register(name, Behavior::default());
        }
        h.viewport(ViewportOptions::new("main")).await;
        within(h.router.load("a", LoadOptions::default())).await.unwrap();
        within(h.router.load("b", LoadOptions::default())).await.unwrap();

        let saved = history.to_json().unwrap();
        assert!(saved.contains("\"navigationIndex\":1"));
        assert!(saved.contains("\"fullStateInstruction\":\"a@main\""));

        let restored = Arc::new(InMemoryHistory::from_json(&saved).unwrap());
        let next = Harness::with_history(RouterConfig::default(), restored);
        for name in ["a", "b"] {
            next.register(name, Behavior::default());
        }
        next.viewport(ViewportOptions::new("main")).await;

        assert!(within(next.router.back()).await.unwrap());
        assert_eq!(active(&next).as_deref(), Some("a"));
    }
}
