use tracing::info;

use crate::application::auth::Credentials;
use crate::application::error::AppError;
use crate::config::AuthCommand;

use super::input::read_source_or_stdin;

pub(super) fn handle(credentials: &Credentials, cmd: AuthCommand) -> Result<(), AppError> {
    match cmd {
        AuthCommand::SetToken(args) => {
            let token = read_source_or_stdin(args.from_file.as_deref())?;
            let token = token.trim();
            if token.is_empty() {
                return Err(AppError::InvalidInput("token must not be empty".into()));
            }
            credentials.set_token(token)?;
            info!("Token updated from command line");
            println!("Token stored.");
        }
        AuthCommand::Clear => {
            credentials.clear();
            println!("Token cleared.");
        }
        AuthCommand::Status => {
            if credentials.is_signed_in() {
                println!("Signed in.");
            } else {
                println!("Signed out.");
            }
        }
    }
    Ok(())
}
