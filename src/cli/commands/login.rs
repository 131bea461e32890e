//! Portal login command.

use console::style;

use crate::cli::helpers::{spinner, start_session, CredentialArgs};
use crate::config::{Config, Settings};

/// Log in and persist the session file.
pub async fn cmd_login(
    settings: &Settings,
    config: &Config,
    credentials: &CredentialArgs,
) -> anyhow::Result<()> {
    let Some((username, password)) = credentials.pair() else {
        anyhow::bail!("Credentials required: pass --username/--password or set PORTAL_USERNAME and PORTAL_PASSWORD");
    };
    if config.portal.base_url.is_none() {
        anyhow::bail!("portal.base_url is not configured (or set PORTAL_URL)");
    }

    settings.ensure_directories()?;
    let mut session = start_session(settings, config).await?;

    let pb = spinner(format!("Logging in as {}...", username))?;
    let ok = session.login(username, password).await;
    pb.finish_and_clear();

    let remote = session.is_remote();
    session.close().await;

    if ok {
        println!("{} Logged in as {}", style("✓").green(), username);
        if remote {
            println!(
                "  {} Remote browser: session was not saved locally",
                style("→").dim()
            );
        } else {
            println!(
                "  {} Session saved to {}",
                style("→").dim(),
                settings.session_file.display()
            );
        }
        Ok(())
    } else {
        anyhow::bail!("Login failed: the portal still shows a login page")
    }
}
