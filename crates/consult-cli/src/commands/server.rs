//! `consult server`: Start the Consult HTTP backend server.

pub async fn run(
    host: String,
    port: u16,
    db_path: String,
    session_ttl_secs: Option<u64>,
) -> Result<(), String> {
    let config = consult_server::ServerConfig {
        host: host.clone(),
        port,
        db_path,
        session_ttl_secs,
    };

    println!("Starting Consult server on {}:{}...", host, port);

    let addr = consult_server::start_server(config).await?;
    println!("Consult server listening on http://{}", addr);

    // Keep the process running until interrupted
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to listen for Ctrl+C: {}", e))?;

    println!("\nShutting down...");
    Ok(())
}
