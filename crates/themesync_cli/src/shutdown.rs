use console::Term;

/// Resolves on the first Ctrl+C; a second one exits immediately.
///
/// In-flight deliveries keep running until the server drains.
pub(crate) async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }

    let is_tty = Term::stderr().is_term();
    if is_tty {
        eprintln!("\n\nShutdown requested, finishing current deliveries...");
        eprintln!("Press Ctrl+C again to force quit.");
    } else {
        tracing::warn!("Shutdown requested, finishing current deliveries");
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            if is_tty {
                eprintln!("Force quit!");
            }
            std::process::exit(130);
        }
    });
}
