//! # Core Navigation Scenarios
//!
//! Nested paths, wide and deep loads, unmatched siblings, unload guards,
//! default child routes and cancellation in the middle of a transition.

#[cfg(test)]
mod tests {
    use super::super::support::{within, Behavior, Gate, Harness};
    use router_core::ports::inbound::RouterApi;
    use router_core::{LoadOptions, RouterConfig, RouterError, Separators, ViewportOptions};

    // =============================================================================
    // NESTED PATHS
    // =============================================================================

    #[tokio::test]
    async fn test_nested_path_matched_by_elimination() {
        let h = Harness::new(RouterConfig::default());
        h.register("a", Behavior::default().viewport("inner"))
            .register("b", Behavior::default());
        let main = h.viewport(ViewportOptions::new("main")).await;

        let parsed = h.router.parse("a/b").unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].component_name(), "a");
        assert_eq!(parsed[0].children().len(), 1);
        assert_eq!(parsed[0].children()[0].component_name(), "b");

        let committed = within(h.router.load("a/b", LoadOptions::default())).await.unwrap();

        assert!(committed);
        assert_eq!(h.router.active_component(main).as_deref(), Some("a"));
        assert!(h.router.check_active("b".into(), Some(main)).unwrap());
        assert_eq!(h.router.current_path(), "a/b");
        assert_eq!(h.count("activate:a"), 1);
        assert_eq!(h.count("activate:b"), 1);
    }

    #[tokio::test]
    async fn test_load_wider_than_iteration_bound() {
        let h = Harness::new(RouterConfig::default());
        let mut slots = Vec::new();
        for i in 0..120 {
            h.register(&format!("x{i}"), Behavior::default());
            slots.push(h.viewport(ViewportOptions::new(&format!("slot{i}"))).await);
        }
        let path = (0..120)
            .map(|i| format!("x{i}@slot{i}"))
            .collect::<Vec<_>>()
            .join("+");

        let committed = within(h.router.load(path.as_str(), LoadOptions::default())).await.unwrap();

        assert!(committed);
        for (i, slot) in slots.iter().enumerate() {
            assert_eq!(h.router.active_component(*slot), Some(format!("x{i}")));
        }
        assert_eq!(h.positions("activate:").len(), 120);
    }

    #[tokio::test]
    async fn test_load_deeper_than_iteration_bound() {
        let config = RouterConfig {
            max_processing_iterations: 4,
            ..RouterConfig::default()
        };
        let h = Harness::new(config);
        for i in 0..10 {
            h.register(&format!("level{i}"), Behavior::default().viewport("inner"));
        }
        let main = h.viewport(ViewportOptions::new("main")).await;
        let path = (0..10).map(|i| format!("level{i}")).collect::<Vec<_>>().join("/");

        let committed = within(h.router.load(path.as_str(), LoadOptions::default())).await.unwrap();

        assert!(committed);
        assert_eq!(h.router.active_component(main).as_deref(), Some("level0"));
        assert!(h.router.check_active(path.as_str().into(), None).unwrap());
        assert_eq!(h.router.current_path(), path);
        assert_eq!(h.positions("activate:").len(), 10);
    }

    // =============================================================================
    // UNMATCHED SIBLINGS
    // =============================================================================

    #[tokio::test]
    async fn test_sibling_without_endpoint_exhausts_iterations() {
        let config = RouterConfig {
            max_processing_iterations: 8,
            ..RouterConfig::default()
        };
        let h = Harness::new(config);
        h.register("a", Behavior::default()).register("b", Behavior::default());
        let main = h.viewport(ViewportOptions::new("main")).await;
        within(h.router.load("a", LoadOptions::default())).await.unwrap();

        let err = within(h.router.load("a+b", LoadOptions::default()))
            .await
            .unwrap_err();

        match err {
            RouterError::UnresolvedInstructions { iterations, remaining } => {
                assert_eq!(iterations, 8);
                assert_eq!(remaining, vec!["b".to_string()]);
            }
            other => panic!("expected unresolved instructions, got {other}"),
        }
        assert_eq!(h.router.active_component(main).as_deref(), Some("a"));
        assert_eq!(h.router.history_state().navigations.len(), 1);
    }

    // =============================================================================
    // GUARDS
    // =============================================================================

    #[tokio::test]
    async fn test_can_unload_denial_leaves_previous_content() {
        let h = Harness::new(RouterConfig::default());
        h.register("a", Behavior::default().deny_unload())
            .register("b", Behavior::default());
        let main = h.viewport(ViewportOptions::new("main")).await;
        within(h.router.load("a", LoadOptions::default())).await.unwrap();
        h.clear_log();

        let committed = within(h.router.load("b", LoadOptions::default())).await.unwrap();

        assert!(!committed);
        assert_eq!(h.router.active_component(main).as_deref(), Some("a"));
        assert_eq!(h.calls(), vec!["canUnload:a".to_string()]);
        assert_eq!(h.router.current_path(), "a");
    }

    #[tokio::test]
    async fn test_can_load_denial_disposes_new_instance() {
        let h = Harness::new(RouterConfig::default());
        h.register("a", Behavior::default())
            .register("locked", Behavior::default().deny_load());
        let main = h.viewport(ViewportOptions::new("main")).await;
        within(h.router.load("a", LoadOptions::default())).await.unwrap();

        let committed = within(h.router.load("locked", LoadOptions::default())).await.unwrap();

        assert!(!committed);
        assert_eq!(h.router.active_component(main).as_deref(), Some("a"));
        assert_eq!(h.count("canLoad:locked"), 1);
        assert_eq!(h.count("activate:locked"), 0);
        assert_eq!(h.count("dispose:locked"), 1);
        assert_eq!(h.count("deactivate:a"), 0);
    }

    #[tokio::test]
    async fn test_can_load_redirect_reroutes_endpoint() {
        let h = Harness::new(RouterConfig::default());
        h.register("account", Behavior::default().redirect("login"))
            .register("login", Behavior::default());
        let main = h.viewport(ViewportOptions::new("main")).await;

        let committed = within(h.router.load("account", LoadOptions::default())).await.unwrap();

        assert!(committed);
        assert_eq!(h.router.active_component(main).as_deref(), Some("login"));
        assert_eq!(h.count("activate:account"), 0);
        assert_eq!(h.count("activate:login"), 1);
        let history = h.router.history_state();
        assert_eq!(history.navigations[0].path, "login");
    }

    // =============================================================================
    // DEFAULTS
    // =============================================================================

    #[tokio::test]
    async fn test_default_child_route_completes() {
        let h = Harness::new(RouterConfig::default());
        h.register(
            "parent",
            Behavior::default()
                .endpoints(vec![ViewportOptions::new("child").with_default("leaf").into()]),
        )
        .register("leaf", Behavior::default());
        let main = h.viewport(ViewportOptions::new("main")).await;

        let committed = within(h.router.load("parent", LoadOptions::default())).await.unwrap();

        assert!(committed);
        assert!(h.router.check_active("leaf".into(), Some(main)).unwrap());
        assert!(h.router.check_active("parent/leaf".into(), None).unwrap());
        assert_eq!(h.count("activate:leaf"), 1);
        // The default is implied, so the recorded path leaves it out.
        assert_eq!(h.router.current_path(), "parent");
    }

    #[tokio::test]
    async fn test_cyclic_default_raises_exhaustion() {
        let config = RouterConfig {
            max_processing_iterations: 12,
            ..RouterConfig::default()
        };
        let h = Harness::new(config);
        h.register(
            "loop",
            Behavior::default()
                .endpoints(vec![ViewportOptions::new("inner").with_default("loop").into()]),
        );
        let main = h.viewport(ViewportOptions::new("main")).await;

        let err = within(h.router.load("loop", LoadOptions::default()))
            .await
            .unwrap_err();

        assert!(matches!(err, RouterError::UnresolvedInstructions { .. }));
        assert_eq!(h.router.active_component(main), None);
    }

    // =============================================================================
    // CUSTOM SEPARATORS
    // =============================================================================

    #[tokio::test]
    async fn test_configured_add_and_clear_tokens_drive_navigation() {
        let config = RouterConfig {
            clear_unspecified: true,
            separators: Separators {
                add: "&".into(),
                clear: "none".into(),
                ..Separators::default()
            },
            ..RouterConfig::default()
        };
        let h = Harness::new(config);
        h.register("a", Behavior::default())
            .register("b", Behavior::default())
            .register("c", Behavior::default());
        let left = h.viewport(ViewportOptions::new("left")).await;
        let right = h.viewport(ViewportOptions::new("right")).await;
        within(h.router.load("a@left+b@right", LoadOptions::default())).await.unwrap();

        let parsed = h.router.parse("c@left+&").unwrap();
        assert!(parsed[1].is_add());
        assert_eq!(h.router.parser().stringify(&parsed), "c@left+&");

        // The add token keeps the viewports the load leaves out.
        assert!(within(h.router.load("c@left+&", LoadOptions::default())).await.unwrap());
        assert_eq!(h.router.active_component(left).as_deref(), Some("c"));
        assert_eq!(h.router.active_component(right).as_deref(), Some("b"));

        assert!(within(h.router.load("none@left+&", LoadOptions::default())).await.unwrap());
        assert_eq!(h.router.active_component(left), None);
        assert_eq!(h.router.active_component(right).as_deref(), Some("b"));
        assert_eq!(h.count("dispose:c"), 1);

        // Without the add token the unspecified viewport is cleared.
        assert!(within(h.router.load("a@left", LoadOptions::default())).await.unwrap());
        assert_eq!(h.router.active_component(left).as_deref(), Some("a"));
        assert_eq!(h.router.active_component(right), None);
    }

    // =============================================================================
    // CANCELLATION
    // =============================================================================

    #[tokio::test]
    async fn test_cancel_mid_transition_rolls_back_every_endpoint() {
        let gate = Gate::default();
        let h = Harness::new(RouterConfig::default());
        h.register("a", Behavior::default())
            .register("b", Behavior::default().hold_loading(&gate));
        let left = h.viewport(ViewportOptions::new("left")).await;
        let right = h.viewport(ViewportOptions::new("right")).await;

        let router = h.router.clone();
        let pending =
            tokio::spawn(async move { router.load("a@left+b@right", LoadOptions::default()).await });
        within(gate.entered()).await;

        assert!(h.router.cancel());
        gate.open();
        let committed = within(pending).await.unwrap().unwrap();

        assert!(!committed);
        assert_eq!(h.router.active_component(left), None);
        assert_eq!(h.router.active_component(right), None);
        assert_eq!(h.count("dispose:a"), 1);
        assert_eq!(h.count("dispose:b"), 1);
        // Whatever got attached before the cancel is detached again.
        assert_eq!(h.count("activate:a"), h.count("deactivate:a"));
        assert_eq!(h.count("activate:b"), 0);
        assert!(h.router.history_state().navigations.is_empty());

        // The router accepts the next navigation.
        assert!(within(h.router.load("a@left", LoadOptions::default())).await.unwrap());
        assert_eq!(h.router.active_component(left).as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_cancel_during_deactivate_reattaches_previous_content() {
        let gate = Gate::default();
        let h = Harness::new(RouterConfig::default());
        h.register("a", Behavior::default().hold_deactivate(&gate))
            .register("b", Behavior::default());
        let main = h.viewport(ViewportOptions::new("main")).await;
        within(h.router.load("a", LoadOptions::default())).await.unwrap();
        h.clear_log();

        let router = h.router.clone();
        let pending = tokio::spawn(async move { router.load("b", LoadOptions::default()).await });
        within(gate.entered()).await;

        assert!(h.router.cancel());
        gate.open();
        let committed = within(pending).await.unwrap().unwrap();

        assert!(!committed);
        assert_eq!(h.router.active_component(main).as_deref(), Some("a"));
        assert_eq!(h.router.current_path(), "a");
        assert_eq!(h.count("deactivate:a"), 1);
        assert_eq!(h.count("activate:a"), 1);
        assert_eq!(h.count("dispose:a"), 0);
        assert_eq!(h.count("activate:b"), h.count("deactivate:b"));
        assert_eq!(h.count("dispose:b"), 1);
        assert!(h.positions("activate:a")[0] > h.positions("deactivate:a")[0]);

        // The reattached instance is the one the next navigation detaches.
        gate.open();
        assert!(within(h.router.load("b", LoadOptions::default())).await.unwrap());
        assert_eq!(h.router.active_component(main).as_deref(), Some("b"));
        assert_eq!(h.count("deactivate:a"), 2);
        assert_eq!(h.count("dispose:a"), 1);
    }
}
