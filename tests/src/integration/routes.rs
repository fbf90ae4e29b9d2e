//! # Configured Route Flows
//!
//! Path recognition through the route table, carry-over of the unmatched
//! rest of a path, redirects and URL rewriting hooks.

#[cfg(test)]
mod tests {
    use super::super::support::{within, Behavior, Harness};
    use parking_lot::Mutex;
    use router_core::ports::inbound::RouterApi;
    use router_core::{
        GuardOutcome, HookDecision, HookTarget, LoadOptions, Route, RouteTable, RouterConfig,
        RouterError, RoutingMode, ViewportOptions,
    };
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn table() -> RouteTable {
        RouteTable::new(vec![
            Route::new("home", "", "home"),
            Route::new("users", "users", "user-list"),
            Route::new("user", "users/:id", "user").with_title("User"),
            Route::redirect("people", "people", "users"),
        ])
    }

    async fn harness(config: RouterConfig) -> Harness {
        let h = Harness::with_routes(config, table());
        h.register("home", Behavior::default())
            .register("user-list", Behavior::default())
            .register("user", Behavior::default().viewport("details"))
            .register("posts", Behavior::default())
            .register("about", Behavior::default());
        h.viewport(ViewportOptions::new("main")).await;
        h
    }

    fn active(h: &Harness) -> Option<String> {
        h.router
            .find_endpoint("main")
            .and_then(|main| h.router.active_component(main))
    }

    #[tokio::test]
    async fn test_route_parameters_reach_guards() {
        let h = harness(RouterConfig::default()).await;
        let seen: Arc<Mutex<Option<BTreeMap<String, String>>>> = Arc::default();
        let sink = seen.clone();
        h.router.hooks().add_can_load(HookTarget::only(["user"]), move |context| {
            *sink.lock() = Some(context.parameters.clone());
            async { Ok(GuardOutcome::Allow) }
        });

        assert!(within(h.router.load("users/42", LoadOptions::default())).await.unwrap());

        assert_eq!(active(&h).as_deref(), Some("user"));
        let parameters = seen.lock().clone().expect("guard ran");
        assert_eq!(parameters.get("id").map(String::as_str), Some("42"));
        let state = h.router.history_state();
        assert_eq!(state.navigations[0].title.as_deref(), Some("User"));
        assert_eq!(state.navigations[0].instruction, "users/42");
    }

    #[tokio::test]
    async fn test_remaining_path_routes_inside_component() {
        let h = harness(RouterConfig::default()).await;

        assert!(within(h.router.load("users/7/posts", LoadOptions::default())).await.unwrap());

        assert_eq!(active(&h).as_deref(), Some("user"));
        assert!(h.router.check_active("user/posts".into(), None).unwrap());
    }

    #[tokio::test]
    async fn test_empty_path_uses_empty_route() {
        let h = harness(RouterConfig::default()).await;

        assert!(within(h.router.load("", LoadOptions::default())).await.unwrap());
        assert_eq!(active(&h).as_deref(), Some("home"));
    }

    #[tokio::test]
    async fn test_redirect_route() {
        let h = harness(RouterConfig::default()).await;

        assert!(within(h.router.load("people", LoadOptions::default())).await.unwrap());
        assert_eq!(active(&h).as_deref(), Some("user-list"));
    }

    #[tokio::test]
    async fn test_unknown_path_falls_back_to_direct_routing() {
        let h = harness(RouterConfig::default()).await;

        assert!(within(h.router.load("about", LoadOptions::default())).await.unwrap());
        assert_eq!(active(&h).as_deref(), Some("about"));
    }

    #[tokio::test]
    async fn test_configured_only_rejects_unknown_path() {
        let config = RouterConfig {
            use_direct_routing: false,
            ..RouterConfig::default()
        };
        let h = harness(config).await;

        let err = within(h.router.load("about", LoadOptions::default()))
            .await
            .unwrap_err();

        match err {
            RouterError::UnresolvedConfiguration { segment, mode } => {
                assert_eq!(segment, "about");
                assert_eq!(mode, RoutingMode::Configured);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(active(&h), None);
    }

    #[tokio::test]
    async fn test_url_transforms_wrap_the_path() {
        let h = harness(RouterConfig::default()).await;
        let hooks = h.router.hooks();
        hooks.add_transform_from_url(|url| {
            HookDecision::Proceed(url.strip_prefix("#/").unwrap_or(&url).to_string())
        });
        hooks.add_transform_to_url(|path| HookDecision::Proceed(format!("#/{path}")));

        assert!(within(h.router.load("#/about", LoadOptions::default())).await.unwrap());

        assert_eq!(active(&h).as_deref(), Some("about"));
        assert_eq!(h.router.current_path(), "#/about");
        assert_eq!(h.router.history_state().navigations[0].path, "#/about");
    }
}
