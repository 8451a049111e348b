//! Mock server startup that tolerates sandboxes without loopback sockets.
//!
//! Set `UPLOADER_REQUIRE_SOCKET_TESTS=1` to turn a skip into a failure.

use std::net::TcpListener;

use wiremock::MockServer;

const REQUIRE_SOCKET_TESTS_ENV: &str = "UPLOADER_REQUIRE_SOCKET_TESTS";

fn sockets_required() -> bool {
    std::env::var(REQUIRE_SOCKET_TESTS_ENV).is_ok_and(|value| !value.is_empty() && value != "0")
}

/// Starts a wiremock server, or returns `None` when loopback sockets are
/// unavailable in this environment.
pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    if let Err(e) = TcpListener::bind("127.0.0.1:0") {
        assert!(
            !sockets_required(),
            "{REQUIRE_SOCKET_TESTS_ENV} is set but binding a loopback socket failed: {e}"
        );
        eprintln!("skipping socket test: cannot bind loopback socket: {e}");
        return None;
    }
    Some(MockServer::start().await)
}

/// Value returned by a test body that skipped.
pub fn socket_skip_return() {}
