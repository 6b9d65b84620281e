//! Configuration inspection command.

use console::style;

use crate::config::{Config, Settings};

/// Print where configuration came from and the settings it resolved to.
pub fn cmd_config_show(settings: &Settings, config: &Config) -> anyhow::Result<()> {
    match config.source_path {
        Some(ref path) => println!("{} Config file: {}", style("→").cyan(), path.display()),
        None => println!(
            "{} No config file found, using defaults",
            style("!").yellow()
        ),
    }

    println!();
    println!("{}", style("Storage").bold());
    println!("  working root:   {}", settings.working_root.display());
    println!("  videos:         {}", settings.videos_dir.display());
    println!("  scratch:        {}", settings.scratch_dir.display());
    println!(
        "  recording:      {} (quality {})",
        if settings.record_sessions { "on" } else { "off" },
        settings.recording_quality
    );

    println!();
    println!("{}", style("Browser").bold());
    println!("  headless:       {}", settings.browser.headless);
    println!(
        "  remote:         {}",
        settings.browser.remote_url.as_deref().unwrap_or("-")
    );
    println!("  login timeout:  {}ms", settings.timing.login_page_ms);
    println!("  page timeout:   {}ms", settings.timing.page_load_ms);

    println!();
    println!("{}", style("Services").bold());
    println!("  mediawiki:      {}", settings.mediawiki_endpoint);
    println!("  bind:           {}", settings.bind);

    println!();
    println!("{}", style("Profile account").bold());
    match settings.credentials() {
        Ok(credentials) => {
            println!("  {} email:       {}", style("✓").green(), credentials.email);
            println!("  {} password:    {:?}", style("✓").green(), credentials.password);
        }
        Err(e) => println!("  {} {}", style("✗").red(), e),
    }

    Ok(())
}
