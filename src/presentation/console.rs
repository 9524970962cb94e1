//! Terminal implementations of the UI collaborators.

use std::io::{self, BufRead, Write};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::application::ports::{Confirmer, Navigator, Notice, NoticeLevel, Notifier, Route};
use crate::util::lock;

const SOURCE: &str = "presentation::console";

/// Remembers where the controllers asked to go; a terminal has no history.
#[derive(Default)]
pub struct ConsoleNavigator {
    last: Mutex<Option<Route>>,
}

impl ConsoleNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_route(&self) -> Option<Route> {
        lock::lock(&self.last, SOURCE, "last_route").clone()
    }
}

impl Navigator for ConsoleNavigator {
    fn navigate(&self, route: Route, replace: bool) {
        debug!(route = %route, replace, "Navigation requested");
        if route == Route::Login {
            eprintln!("Sign in again with `writedesk auth set-token`.");
        }
        *lock::lock(&self.last, SOURCE, "navigate") = Some(route);
    }
}

/// Prints notices to stderr.
#[derive(Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => eprintln!("{}", notice.message),
            NoticeLevel::Error => eprintln!("error: {}", notice.message),
        }
    }
}

/// Asks on the terminal unless told to assume yes.
pub struct PromptConfirmer {
    assume_yes: bool,
}

impl PromptConfirmer {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl Confirmer for PromptConfirmer {
    fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }

        eprint!("{prompt} [y/N] ");
        if let Err(err) = io::stderr().flush() {
            warn!(error = %err, "Failed to flush prompt");
        }

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => is_yes(&answer),
            Err(err) => {
                warn!(error = %err, "Failed to read confirmation");
                false
            }
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use writedesk_api_types::PostId;

    use super::*;

    #[test]
    fn only_explicit_yes_confirms() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes(""));
        assert!(!is_yes("n"));
        assert!(!is_yes("yep"));
    }

    #[test]
    fn assume_yes_skips_the_prompt() {
        assert!(PromptConfirmer::new(true).confirm("Delete?"));
    }

    #[test]
    fn navigator_keeps_the_last_route() {
        let navigator = ConsoleNavigator::new();
        assert!(navigator.last_route().is_none());

        navigator.navigate(Route::Post(PostId::from(4)), true);
        navigator.navigate(Route::Listing, false);
        assert_eq!(navigator.last_route(), Some(Route::Listing));
    }
}
