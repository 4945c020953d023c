//! Command handlers.
//!
//! `App` owns the configuration and the API client for one run of the CLI
//! and reacts to session termination by telling the user to log in again.

use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use swiftlink_core::models::{filter_links, LinkStats};
use swiftlink_core::{ApiClient, ApiError, Config, SessionEvent, Subscription};

use crate::format::{format_clicks, format_date, format_datetime, link_table_header, link_table_row};
use crate::Command;

/// Maximum accepted email length
const MAX_EMAIL_LENGTH: usize = 254;

/// Minimum password length accepted at registration
const MIN_PASSWORD_LENGTH: usize = 6;

pub struct App {
    config: Config,
    api: ApiClient,
    _session_events: Subscription,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let api = ApiClient::from_config(&config).context("Failed to create API client")?;

        let session_events = api.on_session_event(|event| {
            if event == SessionEvent::Terminated {
                eprintln!("Session expired. Please log in again with `swiftlink login`.");
            }
        });

        Ok(Self {
            config,
            api,
            _session_events: session_events,
        })
    }

    pub async fn run(&mut self, command: Command) -> Result<()> {
        debug!(?command, "Running command");
        match command {
            Command::Login { email } => self.login(email, false).await,
            Command::Register { email } => self.login(email, true).await,
            Command::Logout => self.logout().await,
            Command::Whoami => self.whoami().await,
            Command::Shorten { url } => self.shorten(&url).await,
            Command::Links { search } => self.links(search.as_deref()).await,
            Command::Resolve { code } => self.resolve(&code).await,
            Command::Delete { code } => self.delete(&code).await,
            Command::Stats { code } => self.stats(code.as_deref()).await,
        }
    }

    /// Resume the stored session. Anonymous commands carry on without one.
    async fn restore(&self) -> bool {
        match self.api.restore_session().await {
            Ok(session) => session.is_some(),
            Err(e) => {
                warn!(error = %e, "Could not resume session");
                false
            }
        }
    }

    async fn require_session(&self) -> Result<()> {
        if self.restore().await {
            Ok(())
        } else {
            Err(anyhow::anyhow!("Not logged in. Run `swiftlink login` first."))
        }
    }

    // ===== Account =====

    async fn login(&mut self, email: Option<String>, register: bool) -> Result<()> {
        let email = match email {
            Some(email) => email,
            None => self.prompt_email()?,
        };
        let email = email.trim().to_string();
        if email.is_empty() || email.len() > MAX_EMAIL_LENGTH || !email.contains('@') {
            return Err(anyhow::anyhow!("Please enter a valid email address"));
        }

        let password = rpassword::prompt_password("Password: ")?;
        if register && password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(anyhow::anyhow!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            ));
        }

        let result = if register {
            self.api.register(&email, &password).await
        } else {
            self.api.login(&email, &password).await
        };

        let session = match result {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, register, "Authentication failed");
                return Err(anyhow::anyhow!(describe_error(&e)));
            }
        };

        self.config.last_email = Some(email.clone());
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        let name = session.map(|s| s.subject).unwrap_or(email);
        if register {
            println!("Account created! Welcome to SwiftLink, {}.", name);
        } else {
            println!("Welcome back, {}!", name);
        }
        info!(register, "Login successful");
        Ok(())
    }

    async fn logout(&mut self) -> Result<()> {
        self.api.logout().await;
        println!("Logged out.");
        Ok(())
    }

    async fn whoami(&self) -> Result<()> {
        self.require_session().await?;
        let session = self
            .api
            .session()
            .ok_or_else(|| anyhow::anyhow!("Session token could not be decoded"))?;

        println!("Logged in as {}", session.subject);
        if let Some(minutes) = session.minutes_until_expiry() {
            println!("Access token expires in {} min (renewed automatically)", minutes);
        }
        Ok(())
    }

    fn prompt_email(&self) -> Result<String> {
        match self.config.last_email {
            Some(ref last) => print!("Email [{}]: ", last),
            None => print!("Email: "),
        }
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim();

        match (input.is_empty(), &self.config.last_email) {
            (true, Some(last)) => Ok(last.clone()),
            _ => Ok(input.to_string()),
        }
    }

    // ===== Links =====

    async fn shorten(&self, url: &str) -> Result<()> {
        let logged_in = self.restore().await;
        let link = self
            .api
            .create_link(url)
            .await
            .map_err(|e| anyhow::anyhow!(describe_error(&e)))?;

        println!("{}", self.api.short_url(&link.code));
        if !logged_in {
            println!("(anonymous link - log in to track clicks)");
        }
        Ok(())
    }

    async fn links(&self, search: Option<&str>) -> Result<()> {
        self.require_session().await?;
        let links = self
            .api
            .list_links()
            .await
            .map_err(|e| anyhow::anyhow!(describe_error(&e)))?;

        let shown = filter_links(&links, search.unwrap_or(""));
        if shown.is_empty() {
            match search {
                Some(query) => println!("No links match {:?}.", query),
                None => println!("You have no links yet. Create one with `swiftlink shorten <url>`."),
            }
            return Ok(());
        }

        println!("{}", link_table_header());
        for link in shown {
            println!("{}", link_table_row(link));
        }
        Ok(())
    }

    async fn resolve(&self, code: &str) -> Result<()> {
        self.restore().await;
        let link = self
            .api
            .resolve_link(code)
            .await
            .map_err(|e| anyhow::anyhow!(describe_error(&e)))?;

        println!("{}", link.url);
        if link.revoked {
            println!("(this link has been revoked)");
        }
        Ok(())
    }

    async fn delete(&self, code: &str) -> Result<()> {
        self.require_session().await?;
        let message = self
            .api
            .delete_link(code)
            .await
            .map_err(|e| anyhow::anyhow!(describe_error(&e)))?;

        println!("{}", message.unwrap_or_else(|| format!("Deleted {}", code)));
        Ok(())
    }

    async fn stats(&self, code: Option<&str>) -> Result<()> {
        self.require_session().await?;
        let links = self
            .api
            .list_links()
            .await
            .map_err(|e| anyhow::anyhow!(describe_error(&e)))?;

        let Some(code) = code else {
            let stats = LinkStats::from_links(&links);
            println!("Links:        {}", stats.total_links);
            println!("Active links: {}", stats.active_links);
            println!("Total clicks: {}", stats.total_clicks);
            return Ok(());
        };

        let link = links
            .iter()
            .find(|link| link.code == code)
            .ok_or_else(|| anyhow::anyhow!("You have no link with code {}", code))?;

        println!("{} -> {}", self.api.short_url(&link.code), link.url);
        println!("Created {}, {}", format_date(&link.created_at), format_clicks(link.click_count()));

        let clicks = link.clicks.as_deref().unwrap_or_default();
        if clicks.is_empty() {
            println!("No clicks yet. Share your link to start tracking clicks.");
        }
        for click in clicks {
            println!("  {}  {:<15}  {}", format_datetime(&click.created_at), click.ip, click.user_agent);
        }
        Ok(())
    }
}

/// User-facing message for an API failure.
fn describe_error(e: &ApiError) -> String {
    match e {
        ApiError::Renewal(_) => "Your session has expired. Please log in again.".to_string(),
        ApiError::Network(err) if err.is_timeout() => {
            "Connection timed out. Please try again.".to_string()
        }
        ApiError::Network(_) => {
            "Unable to connect to server. Check your internet connection.".to_string()
        }
        ApiError::Status {
            message: Some(message),
            ..
        } => message.clone(),
        err if err.is_unauthorized() => "Invalid email or password".to_string(),
        err if err.is_not_found() => "Link not found or has been revoked".to_string(),
        other => other.to_string(),
    }
}
