#![deny(clippy::all, clippy::pedantic)]

use letterbox::application::Session;
use letterbox::application::admin::letters::{self, LETTERS};

use crate::args::LettersCmd;
use crate::client::CliError;

pub async fn handle(session: &Session, cmd: LettersCmd) -> Result<(), CliError> {
    match cmd {
        LettersCmd::List(page) => super::list(session, &LETTERS, page.cursor.as_deref()).await,
        LettersCmd::Show { id } => super::show(session, &LETTERS, &id).await,
        LettersCmd::Delete { id, correspondence } => {
            let config = letters::delete(correspondence.as_deref())?;
            super::write(session, config, LETTERS.delete_descriptor(&id)).await
        }
    }
}
