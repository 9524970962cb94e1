//! Command handlers for the terminal shell.
//!
//! Each invocation wires the controllers to the configured API and stores,
//! drives them through one operation and prints the result on stdout.

mod auth;
mod input;
mod posts;

use std::sync::Arc;

use tracing::debug;

use crate::application::auth::Credentials;
use crate::application::context::ControllerContext;
use crate::application::error::AppError;
use crate::cache::{CacheConfig, InvalidationSignal, SessionCache};
use crate::config::{Command, PostsCommand, Settings};
use crate::infra::http::HttpPostsClient;
use crate::infra::storage::open_store;

use super::console::{ConsoleNavigator, ConsoleNotifier, PromptConfirmer};
use super::markdown::MarkdownRenderer;

/// Everything a posts command needs.
pub struct Shell {
    pub ctx: ControllerContext,
    pub navigator: Arc<ConsoleNavigator>,
    pub renderer: MarkdownRenderer,
}

impl Shell {
    pub fn build(settings: &Settings, assume_yes: bool) -> Result<Self, AppError> {
        let api = HttpPostsClient::new(settings.api.base_url.as_str(), Some(settings.api.timeout))?;
        let session_store = open_store(settings.session.state_file.as_deref())?;
        let credentials = Credentials::new(open_store(Some(settings.auth.token_file.as_path()))?);

        let cache_config = CacheConfig::from(&settings.cache);
        let signal = Arc::new(InvalidationSignal::from_config(&cache_config));
        let cache = Arc::new(SessionCache::new(cache_config, session_store));
        let navigator = Arc::new(ConsoleNavigator::new());

        debug!(
            base_url = %settings.api.base_url,
            session_file = ?settings.session.state_file,
            cache_enabled = settings.cache.enabled,
            "Shell ready"
        );

        Ok(Self {
            ctx: ControllerContext {
                api: Arc::new(api),
                cache,
                signal,
                credentials,
                navigator: navigator.clone(),
                confirmer: Arc::new(PromptConfirmer::new(assume_yes)),
                notifier: Arc::new(ConsoleNotifier),
                default_tag: Some(settings.posts.default_tag.clone()),
            },
            navigator,
            renderer: MarkdownRenderer::new(),
        })
    }
}

pub async fn run(command: Command, settings: &Settings) -> Result<(), AppError> {
    match command {
        Command::Posts(cmd) => {
            let assume_yes = matches!(&cmd, PostsCommand::Delete(args) if args.yes);
            let shell = Shell::build(settings, assume_yes)?;
            posts::handle(&shell, cmd).await
        }
        Command::Auth(cmd) => {
            let credentials = Credentials::new(open_store(Some(settings.auth.token_file.as_path()))?);
            auth::handle(&credentials, cmd)
        }
    }
}
