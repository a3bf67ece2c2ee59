// Interactive console that walks the rider onboarding the way the app
// screens do: sign up or log in, enter the OTP, see the session.

use anyhow::{Context, Result};
use colored::Colorize;
use console::Term;
use dialoguer::{theme::ColorfulTheme, Input, Select};
use rider_core::domains::auth::actions::VerificationState;
use rider_core::domains::auth::{
    AuthError, JwtService, LoginFlow, RegistrationFlow, VerificationFlow, VerificationHandoff,
    VerificationOutcome,
};
use rider_core::domains::profile::{
    complete_profile, InMemoryProfileRepository, PgProfileRepository,
};
use rider_core::domains::session::{
    restore_session, AuthScreen, SessionHandle, SessionListener, SessionStore,
};
use rider_core::kernel::{BaseProfileRepository, FileTokenStore, RiderDeps, TwilioIdentityGateway};
use rider_core::Config;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use twilio::{TwilioOptions, TwilioService};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,rider_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    let deps = build_deps(&config).await?;
    let term = Term::stdout();
    print_banner(&term)?;

    if let Some(identity) = restore_session(&deps).await {
        println!("{} {}", "Welcome back".green(), identity.phone_number);
    }
    let session = SessionListener::spawn(deps.clone(), SessionStore::new());

    wait_for_first_emission(&session).await;

    loop {
        println!();
        let state = session.store().snapshot();
        let keep_going = match state.screen {
            AuthScreen::Authenticated => home_screen(&deps, &session, &term).await?,
            _ => welcome_screen(&deps, &session, &config, &term).await?,
        };
        if !keep_going {
            break;
        }
    }

    println!("{}", "👋 Goodbye!".bright_blue());
    session.shutdown().await;
    Ok(())
}

async fn build_deps(config: &Config) -> Result<RiderDeps> {
    let twilio = Arc::new(TwilioService::new(TwilioOptions {
        account_sid: config.twilio_account_sid.clone(),
        auth_token: config.twilio_auth_token.clone(),
        service_id: config.twilio_verify_service_sid.clone(),
    }));
    let jwt_service = Arc::new(
        JwtService::new(&config.jwt_secret, config.jwt_issuer.clone())
            .with_ttl(chrono::Duration::hours(config.session_ttl_hours)),
    );
    let identity = TwilioIdentityGateway::new(twilio, jwt_service)
        .with_test_identifier(config.test_identifier_enabled);

    let profiles: Arc<dyn BaseProfileRepository> = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await
                .context("Failed to connect to database")?;
            let repo = PgProfileRepository::new(pool);
            repo.migrate().await.context("Failed to run migrations")?;
            tracing::info!("Database connected");
            Arc::new(repo)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, profiles are kept in memory");
            Arc::new(InMemoryProfileRepository::new())
        }
    };

    let deps = RiderDeps::new(Arc::new(identity), profiles, config.flow_settings());
    Ok(match &config.session_file {
        Some(path) => {
            tracing::debug!("Session token file: {}", path.display());
            deps.with_token_store(Arc::new(FileTokenStore::new(path)))
        }
        None => {
            tracing::warn!("No config directory, sign-in will not be kept");
            deps
        }
    })
}

fn print_banner(term: &Term) -> Result<()> {
    term.clear_screen()?;
    println!("{}", "🚕 Rider".bright_yellow().bold());
    println!("{}", "Phone sign-in console".dimmed());
    Ok(())
}

async fn wait_for_first_emission(session: &SessionHandle) {
    let mut rx = session.store().subscribe();
    let _ = rx.wait_for(|state| state.screen != AuthScreen::Initializing).await;
}

/// Run a blocking dialoguer prompt without stalling the runtime.
fn prompt<T>(f: impl FnOnce() -> dialoguer::Result<T>) -> Result<T> {
    Ok(tokio::task::block_in_place(f)?)
}

async fn welcome_screen(
    deps: &RiderDeps,
    session: &SessionHandle,
    config: &Config,
    term: &Term,
) -> Result<bool> {
    let options = vec!["📝 Sign up", "🔑 Log in", "🛑 Exit"];
    let selection = prompt(|| {
        Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Welcome")
            .items(&options)
            .default(0)
            .interact_on(term)
    })?;

    match selection {
        0 => sign_up(deps, session, config).await?,
        1 => log_in(deps, session, config).await?,
        _ => return Ok(false),
    }
    Ok(true)
}

async fn home_screen(deps: &RiderDeps, session: &SessionHandle, term: &Term) -> Result<bool> {
    let state = session.store().snapshot();
    match (&state.identity, &state.profile) {
        (Some(_), Some(profile)) => println!(
            "{} {} ({})",
            "Signed in as".green(),
            profile.username.bold(),
            profile.phone_number
        ),
        (Some(identity), None) => println!(
            "{} {} {}",
            "Signed in as".yellow(),
            identity.phone_number,
            "(profile incomplete)".yellow()
        ),
        _ => {}
    }

    let mut options = vec!["👤 Show session", "🔄 Refresh profile", "🚪 Sign out", "🛑 Exit"];
    if state.needs_profile() {
        options.insert(0, "✍️  Complete profile");
    }
    let selection = prompt(|| {
        Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Home")
            .items(&options)
            .default(0)
            .interact_on(term)
    })?;

    match options[selection] {
        "✍️  Complete profile" => {
            let username: String = prompt(|| {
                Input::with_theme(&ColorfulTheme::default())
                    .with_prompt("Username")
                    .interact_text()
            })?;
            match complete_profile(deps, session, &username).await {
                Ok(profile) => println!("{} {}", "✅ Profile saved for".green(), profile.username),
                Err(e) => report(&e),
            }
        }
        "👤 Show session" => {
            let state = session.store().snapshot();
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "identity": state.identity,
                    "profile": state.profile,
                }))?
            );
        }
        "🔄 Refresh profile" => session.refresh_profile(),
        "🚪 Sign out" => {
            deps.identity.sign_out().await;
            wait_for_screen(session, AuthScreen::Unauthenticated).await;
        }
        _ => return Ok(false),
    }
    Ok(true)
}

async fn sign_up(deps: &RiderDeps, session: &SessionHandle, config: &Config) -> Result<()> {
    let username: String = prompt(|| {
        Input::with_theme(&ColorfulTheme::default())
            .with_prompt("Username")
            .interact_text()
    })?;
    let (calling_code, local) = ask_phone(config)?;

    let mut flow = RegistrationFlow::new(deps.clone());
    match flow.submit(&username, &calling_code, &local).await {
        Ok(handoff) => otp_screen(deps, session, handoff).await,
        Err(e) => {
            report(&e);
            Ok(())
        }
    }
}

async fn log_in(deps: &RiderDeps, session: &SessionHandle, config: &Config) -> Result<()> {
    let (calling_code, local) = ask_phone(config)?;

    let mut flow = LoginFlow::new(deps.clone());
    match flow.submit(&calling_code, &local).await {
        Ok(handoff) => {
            println!("{}", "📨 A verification code has been sent to your phone.".green());
            otp_screen(deps, session, handoff).await
        }
        Err(e) => {
            report(&e);
            Ok(())
        }
    }
}

fn ask_phone(config: &Config) -> Result<(String, String)> {
    let calling_code: String = prompt(|| {
        Input::with_theme(&ColorfulTheme::default())
            .with_prompt("Country code")
            .default(config.default_calling_code.clone())
            .interact_text()
    })?;
    let local: String = prompt(|| {
        Input::with_theme(&ColorfulTheme::default())
            .with_prompt("Phone number")
            .interact_text()
    })?;
    Ok((calling_code, local))
}

async fn otp_screen(
    deps: &RiderDeps,
    session: &SessionHandle,
    handoff: VerificationHandoff,
) -> Result<()> {
    let mut flow = VerificationFlow::new(deps.clone(), handoff);
    println!("Code sent to {}", flow.phone_number().to_string().bold());

    loop {
        let timer = flow.countdown();
        let resend_label = if timer.can_resend() {
            "🔁 Resend code".to_string()
        } else {
            format!("⏳ Resend code in {}s", timer.remaining_seconds)
        };
        let options = vec!["🔢 Enter code".to_string(), resend_label, "⬅️  Back".to_string()];
        let selection = prompt(|| {
            Select::with_theme(&ColorfulTheme::default())
                .with_prompt("Verify your number")
                .items(&options)
                .default(0)
                .interact()
        })?;

        match selection {
            0 => {
                let code: String = prompt(|| {
                    Input::with_theme(&ColorfulTheme::default())
                        .with_prompt("6-digit code")
                        .interact_text()
                })?;
                match flow.verify(&code).await {
                    Ok(outcome) => {
                        match &outcome {
                            VerificationOutcome::Registered { profile, .. } => {
                                println!("{} {}", "✅ Welcome,".green(), profile.username.bold());
                            }
                            VerificationOutcome::SignedIn { .. } => {
                                println!("{}", "✅ Signed in".green())
                            }
                        }
                        wait_for_screen(session, AuthScreen::Authenticated).await;
                        return Ok(());
                    }
                    Err(e) => {
                        report(&e);
                        if flow.state() == VerificationState::Failed {
                            return Ok(());
                        }
                    }
                }
            }
            1 => match flow.resend().await {
                Ok(()) => println!("{}", "📨 A new code has been sent.".green()),
                Err(e) => report(&e),
            },
            _ => {
                flow.exit();
                return Ok(());
            }
        }
    }
}

async fn wait_for_screen(session: &SessionHandle, screen: AuthScreen) {
    let mut rx = session.store().subscribe();
    let waited = tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|state| state.screen == screen),
    )
    .await;
    if waited.is_err() {
        tracing::warn!("Session did not reach {:?} in time", screen);
    }
}

fn report(err: &AuthError) {
    let title = match err {
        AuthError::Validation(_) => "Invalid input",
        AuthError::UsernameTaken { .. } => "Username taken",
        AuthError::PhoneRegistered { .. } => "Phone number exists",
        AuthError::UserNotFound { .. } => "User not found",
        AuthError::InvalidPhone { .. } => "Invalid phone",
        AuthError::InvalidCode => "Verification failed",
        AuthError::ProviderUnavailable { .. } => "Service unavailable",
        AuthError::ProfileWriteFailed { .. } => "Profile not saved",
        AuthError::NotSignedIn => "Not signed in",
        AuthError::ResendNotReady { .. } => "Please wait",
        AuthError::Abandoned => "Cancelled",
    };
    println!("{} {}", format!("❌ {title}:").red().bold(), err);
}
