/*!
 * Minimal harness for the DockThor Rust SDK.
 *
 * Replace TOKEN and PRIVATE_KEY with real project credentials, then run:
 *
 *   cargo run -p dockthor_demo
 *   cargo run -p dockthor_demo -- --panic        # test panic capture
 *   cargo run -p dockthor_demo -- --request      # test the request span collector
 */
use std::sync::Arc;

/// Paste your project token and private key here.
const TOKEN: &str = "PASTE_YOUR_TOKEN_HERE";
const PRIVATE_KEY: &str = "PASTE_YOUR_PRIVATE_KEY_HERE";

/// Stand-in for a web framework's request type.
struct DemoRequest {
    method: &'static str,
    path: &'static str,
}

impl dockthor::InboundRequest for DemoRequest {
    fn method(&self) -> &str {
        self.method
    }

    fn path(&self) -> &str {
        self.path
    }
}

fn main() -> dockthor::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let test_panic = args.iter().any(|a| a == "--panic");
    let test_request = args.iter().any(|a| a == "--request");

    let _guard = dockthor::init(dockthor::ClientOptions {
        environment: "demo".into(),
        ..dockthor::ClientOptions::new(TOKEN, PRIVATE_KEY)
    })?;

    /*
     * Send a plain text message.
     */
    match dockthor::capture_message("Hello from the DockThor Rust SDK!", dockthor::Level::Info) {
        Ok(()) => println!("[demo] Sent a text message"),
        Err(e) => println!("[demo] Message not delivered: {e}"),
    }

    /*
     * Capture a real error (file not found).
     */
    if let Err(e) = std::fs::read_to_string("/nonexistent/path.txt") {
        match dockthor::capture_error(&e) {
            Ok(()) => println!("[demo] Sent an io::Error: {e}"),
            Err(send_err) => println!("[demo] io::Error not delivered: {send_err}"),
        }
    }

    /*
     * Route two fake requests through the collector. The transactions are
     * delivered in the background; the handler results come back untouched.
     */
    if test_request {
        let client = dockthor::Client::new(dockthor::ClientOptions::new(TOKEN, PRIVATE_KEY))?;
        let client = Arc::new(client);
        let collector = dockthor::RequestSpanCollector::new(client.clone()).exclude_paths(["/health"]);

        let ok: Result<u16, std::io::Error> = collector.handle(
            DemoRequest { method: "GET", path: "/users" },
            |_| Ok(200),
        );
        println!("[demo] GET /users → {ok:?}");

        let failed: Result<u16, std::io::Error> = collector.handle(
            DemoRequest { method: "POST", path: "/orders" },
            |_| Err(std::io::Error::other("order store unavailable")),
        );
        println!("[demo] POST /orders → {failed:?}");

        client.close();
    }

    /*
     * The panic hook (catch_panics = true by default) reports this before
     * the process unwinds.
     */
    if test_panic {
        println!("[demo] Triggering a panic...");
        panic!("Test panic from the DockThor demo");
    }

    println!("[demo] Done. Pending deliveries are flushed when _guard drops.");
    Ok(())
}
