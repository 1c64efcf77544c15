//! Command handlers.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Subcommand;
use serde_json::Value;
use tracing::info;

use supplygate_core::api::{ApiClient, ApiRequest, LoginOutcome};
use supplygate_core::auth::token;
use supplygate_core::{Config, SessionGuard, SessionState};

use crate::host::CliNavigator;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in with email and password (and OTP when the backend asks for one)
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Exchange a one-time code for a session
    VerifyOtp {
        #[arg(long)]
        email: String,
        #[arg(long)]
        otp: String,
    },
    /// Check the stored session
    Status,
    /// Guarded GET request
    Get { path: String },
    /// Guarded POST request with an optional JSON body
    Post {
        path: String,
        #[arg(long)]
        body: Option<String>,
    },
    /// Guarded DELETE request
    Delete { path: String },
    /// Request a password-reset code
    ForgotPassword { email: String },
    /// Set a new password using a reset code
    ResetPassword {
        email: String,
        #[arg(long)]
        otp: String,
    },
    /// Clear the stored session
    Logout,
}

pub struct App {
    pub guard: SessionGuard,
    pub client: ApiClient,
    pub navigator: Arc<CliNavigator>,
    pub config: Config,
}

impl App {
    pub async fn run(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Login { email } => self.login(email).await,
            Command::VerifyOtp { email, otp } => self.verify_otp(&email, &otp).await,
            Command::Status => self.status(),
            Command::Get { path } => self.request(ApiRequest::get(path)).await,
            Command::Post { path, body } => {
                let mut request = ApiRequest::post(path);
                if let Some(body) = body {
                    let body: Value =
                        serde_json::from_str(&body).context("--body is not valid JSON")?;
                    request = request.with_json(&body)?;
                }
                self.request(request).await
            }
            Command::Delete { path } => self.request(ApiRequest::delete(path)).await,
            Command::ForgotPassword { email } => {
                self.navigator.enter("/forgot-password");
                self.client.forgot_password(&email).await?;
                println!("A reset code has been sent to {}", email);
                Ok(())
            }
            Command::ResetPassword { email, otp } => {
                self.navigator.enter("/reset-password");
                let password = rpassword::prompt_password("New password: ")
                    .context("Failed to read password")?;
                self.client.reset_password(&email, &otp, &password).await?;
                println!("Password updated, you can log in now");
                Ok(())
            }
            Command::Logout => {
                self.guard.logout()?;
                println!("Logged out");
                Ok(())
            }
        }
    }

    async fn login(&mut self, email: Option<String>) -> Result<()> {
        self.navigator.enter("/login");

        let email = match email.or_else(|| self.config.last_email.clone()) {
            Some(email) => email,
            None => prompt("Email: ")?,
        };
        let password =
            rpassword::prompt_password("Password: ").context("Failed to read password")?;

        let session = match self.client.login(&email, &password).await? {
            LoginOutcome::Authenticated(session) => session,
            LoginOutcome::OtpRequired => {
                self.navigator.enter("/verify-otp");
                let otp = prompt("One-time code: ")?;
                self.client.verify_otp(&email, &otp).await?
            }
        };

        let name = session.employee_name.clone().unwrap_or_else(|| email.clone());
        self.guard.establish(session)?;
        self.remember_email(&email);
        println!("Logged in as {}", name);
        Ok(())
    }

    async fn verify_otp(&mut self, email: &str, otp: &str) -> Result<()> {
        self.navigator.enter("/verify-otp");
        let session = self.client.verify_otp(email, otp).await?;
        self.guard.establish(session)?;
        self.remember_email(email);
        println!("Logged in");
        Ok(())
    }

    fn status(&self) -> Result<()> {
        match self.guard.state() {
            SessionState::NoSession => println!("Not logged in"),
            SessionState::ExpiredSession { .. } => println!("Session expired"),
            SessionState::ValidSession => {
                let Some(session) = self.guard.store().session() else {
                    bail!("Session disappeared while reading it");
                };
                println!(
                    "Logged in as {}",
                    session.employee_name.as_deref().unwrap_or("(unknown)")
                );
                if let Some(ref role) = session.role {
                    println!("  role:     {}", role);
                }
                if let Some(ref company) = session.company_id {
                    println!("  company:  {}", company);
                }
                if let Some(ref employee) = session.employee_id {
                    println!("  employee: {}", employee);
                }
                let expires_at = token::decode_claims(&session.token)
                    .ok()
                    .and_then(|claims| claims.expires_at());
                if let Some(expires_at) = expires_at {
                    println!("  expires:  {}", expires_at.format("%Y-%m-%d %H:%M:%S UTC"));
                }
                if let Some(remaining) = token::time_until_expiry(
                    &session.token,
                    Utc::now(),
                    self.guard.config().expiry_buffer(),
                ) {
                    println!("  expires in {}m", remaining.num_minutes().max(0));
                }
            }
        }
        Ok(())
    }

    async fn request(&self, request: ApiRequest) -> Result<()> {
        info!(method = %request.method, path = %request.path, "Guarded request");
        let response = self.client.send(request).await?;

        match response.json_value() {
            Some(body) => println!("{}", serde_json::to_string_pretty(&body)?),
            None if !response.body.is_empty() => println!("{}", response.body),
            None => println!("{}", response.status),
        }
        Ok(())
    }

    fn remember_email(&mut self, email: &str) {
        if self.config.last_email.as_deref() == Some(email) {
            return;
        }
        self.config.last_email = Some(email.to_string());
        if let Err(e) = self.config.save() {
            tracing::warn!(error = %e, "Failed to save config");
        }
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("Failed to read input")?;
    let line = line.trim().to_string();
    if line.is_empty() {
        bail!("No input given");
    }
    Ok(line)
}
