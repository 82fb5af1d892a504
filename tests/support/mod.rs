// Shared primitives for booting one flow server per integration test binary.
use std::{
    // `Arc` hands the address slot to the server thread; `OnceLock` is written once.
    sync::{Arc, OnceLock},
    // Polling intervals while the server comes up.
    time::Duration,
};

// `host:port` of the running server, set once the listener is bound.
static SERVER_ADDR: OnceLock<String> = OnceLock::new();
// Guards the bootstrap so concurrent tests start a single server.
static SERVER_READY: OnceLock<()> = OnceLock::new();

// Start the test server on first use and return its `host:port`.
pub fn ensure_server() -> &'static str {
    // Later callers skip straight to reading the published address.
    SERVER_READY.get_or_init(|| {
        // Slot the server thread fills with the port the OS picked.
        let published_addr = Arc::new(OnceLock::<String>::new());
        // Second handle moved into the server thread.
        let published_addr_thread = Arc::clone(&published_addr);
        // A plain OS thread keeps serving after each `#[tokio::test]` runtime shuts down.
        std::thread::spawn(move || {
            // The server gets a runtime of its own.
            let runtime = tokio::runtime::Runtime::new().expect("test runtime");
            runtime.block_on(async move {
                // Port 0 lets the OS choose a free port.
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral test port");
                // Read back the port that was actually assigned.
                let addr = listener.local_addr().expect("get local addr");
                // Tell the waiting test where to connect.
                let _ = published_addr_thread.set(addr.to_string());
                // Serve until the test binary exits.
                flow_server::run(listener).await.expect("server failed");
            });
        });
        // Return only once the address is known and the socket accepts.
        wait_for_server_addr_and_readiness(published_addr);
    });

    // Every test in the binary shares this address.
    SERVER_ADDR
        .get()
        .expect("server addr should be initialized")
        .as_str()
}

// Block until the address is published, then until a TCP connect succeeds.
fn wait_for_server_addr_and_readiness(published_addr: Arc<OnceLock<String>>) {
    // Spin on the slot until the server thread has bound its listener.
    let addr = loop {
        if let Some(addr) = published_addr.get() {
            break addr.clone();
        }
        // Back off between checks.
        std::thread::sleep(Duration::from_millis(10));
    };

    // Make the address visible to every later `ensure_server` call.
    let _ = SERVER_ADDR.set(addr.clone());

    // Bound is not the same as serving; retry connects for up to two seconds.
    for _ in 0..100 {
        // A successful connect means `axum::serve` is accepting.
        if std::net::TcpStream::connect(&addr).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    // Startup never reached an accepting state.
    panic!("server did not become ready in time");
}

// A session id no other test uses, so tests never share a playfield.
pub fn unique_session() -> String {
    format!("test-{}", uuid::Uuid::new_v4())
}
