#![deny(clippy::all, clippy::pedantic)]

use std::fs;
use std::sync::Arc;

use letterbox::application::Session;
use letterbox::application::error::AppError;
use letterbox::cache::CacheConfig;
use letterbox::config::Settings;
use letterbox::infra::fetcher::{FetcherOptions, HttpFetcher};
use thiserror::Error;

use crate::args::Cli;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("site URL is required (use --site or LETTERBOX_SITE_URL)")]
    MissingSite,
    #[error("failed to read token file: {0}")]
    TokenFile(std::io::Error),
    #[error(transparent)]
    App(#[from] AppError),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::MissingSite | Self::TokenFile(_) => 2,
            Self::App(err) => err.exit_code(),
        }
    }
}

macro_rules! via_app_error {
    ($($error:ty),+ $(,)?) => {
        $(
            impl From<$error> for CliError {
                fn from(error: $error) -> Self {
                    Self::App(AppError::from(error))
                }
            }
        )+
    };
}

via_app_error!(
    letterbox::config::LoadError,
    letterbox::infra::error::InfraError,
    letterbox::infra::fetcher::FetchError,
    letterbox::cache::InvalidKeyError,
    letterbox::application::MutationError,
    serde_json::Error,
);

/// The token file wins over `LETTERBOX_TOKEN`; blank values count as absent.
pub fn resolve_token(cli: &Cli) -> Result<Option<String>, CliError> {
    let token = if let Some(path) = &cli.token_file {
        Some(fs::read_to_string(path).map_err(CliError::TokenFile)?)
    } else {
        cli.token_env.clone()
    };
    Ok(token
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty()))
}

pub fn build_session(cli: &Cli, settings: &Settings) -> Result<Session, CliError> {
    let base = settings.api.base_url.as_ref().ok_or(CliError::MissingSite)?;
    let options = FetcherOptions {
        timeout: settings.api.timeout,
        user_agent: settings
            .api
            .user_agent
            .clone()
            .unwrap_or_else(|| HttpFetcher::default_user_agent().to_string()),
    };
    let fetcher = HttpFetcher::new(base.as_str(), options)?;
    let token = resolve_token(cli)?;

    Ok(Session::new(
        Arc::new(fetcher),
        CacheConfig::from(&settings.cache),
        token,
    ))
}
