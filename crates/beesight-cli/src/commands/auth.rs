use beesight_core::integrations::keyring_store;
use beesight_core::storage::{BEEMINDER_TOKEN_SECRET, INSIGHT_PASSWORD_SECRET};
use clap::{Subcommand, ValueEnum};

#[derive(Clone, Copy, ValueEnum)]
pub enum Service {
    /// Insight Timer password
    Insight,
    /// Beeminder auth token
    Beeminder,
}

impl Service {
    fn secret_key(self) -> &'static str {
        match self {
            Service::Insight => INSIGHT_PASSWORD_SECRET,
            Service::Beeminder => BEEMINDER_TOKEN_SECRET,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Service::Insight => "insight password",
            Service::Beeminder => "beeminder auth token",
        }
    }
}

#[derive(Subcommand)]
pub enum AuthAction {
    /// Store a secret; used when the config file leaves it empty
    Set {
        service: Service,
        secret: String,
    },
    /// Remove a stored secret
    Clear { service: Service },
    /// Show which secrets are stored
    Status,
}

pub fn run(action: AuthAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        AuthAction::Set { service, secret } => {
            keyring_store::set(service.secret_key(), &secret)?;
            println!("{} stored", service.label());
        }
        AuthAction::Clear { service } => {
            keyring_store::delete(service.secret_key())?;
            println!("{} removed", service.label());
        }
        AuthAction::Status => {
            for service in [Service::Insight, Service::Beeminder] {
                let stored = keyring_store::get(service.secret_key())?.is_some();
                println!(
                    "{}: {}",
                    service.label(),
                    if stored { "stored" } else { "not stored" }
                );
            }
        }
    }
    Ok(())
}
