// lt-test-utils: shared WebSocket test client for the hub's integration
// test suite.

pub mod mock_ws_client;

pub use mock_ws_client::MockWsClient;
