//! Web server command.

use console::style;

use crate::config::Settings;
use crate::server::parse_bind_address;

/// Start the web server.
pub async fn cmd_serve(settings: &Settings, bind: &str) -> anyhow::Result<()> {
    let (host, port) = parse_bind_address(bind);

    match settings.credentials() {
        Ok(credentials) => println!(
            "  {} Profile account: {}",
            style("✓").green(),
            credentials.email
        ),
        Err(e) => eprintln!("  {} {}", style("!").yellow(), e),
    }
    println!(
        "  {} Recordings: {}",
        style("→").dim(),
        settings.videos_dir.display()
    );

    println!(
        "{} Starting Roast Battle API at http://{}:{}",
        style("→").cyan(),
        host,
        port
    );
    println!("  Press Ctrl+C to stop");

    crate::server::serve(settings, bind).await
}
