#[cfg(not(target_arch = "wasm32"))]
mod http_gateway_tests {
    use std::sync::Arc;

    use synced_prefs::{HttpRemoteGateway, RemoteGateway, WatchIdentity};

    // The base URL points at a closed port; these tests only exercise the
    // no-token short-circuit, which must not issue a request at all.

    #[tokio::test]
    async fn fetch_without_token_short_circuits_to_absent() {
        let identity = Arc::new(WatchIdentity::new());
        identity.sign_out();

        let gateway = HttpRemoteGateway::new("http://127.0.0.1:9/", "theme", identity);
        assert_eq!(gateway.fetch("alice").await, None);
    }

    #[tokio::test]
    async fn push_without_token_short_circuits_to_failure() {
        let identity = Arc::new(WatchIdentity::new());
        identity.sign_out();

        let gateway = HttpRemoteGateway::new("http://127.0.0.1:9", "theme", identity);
        assert!(!gateway.push("alice", "dark").await);
    }

    #[tokio::test]
    async fn unreachable_backend_degrades_to_absent() {
        let identity = Arc::new(WatchIdentity::new());
        identity.sign_in("alice", "token-alice");

        // Port 9 (discard) refuses connections; the failure must collapse
        // to "unavailable", never an error.
        let gateway = HttpRemoteGateway::new("http://127.0.0.1:9", "theme", identity);
        assert_eq!(gateway.fetch("alice").await, None);
        assert!(!gateway.push("alice", "dark").await);
    }
}
