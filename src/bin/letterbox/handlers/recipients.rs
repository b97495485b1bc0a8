#![deny(clippy::all, clippy::pedantic)]

use letterbox::application::Session;
use letterbox::application::admin::recipients::{self, RECIPIENTS};

use crate::args::RecipientsCmd;
use crate::client::CliError;

pub async fn handle(session: &Session, cmd: RecipientsCmd) -> Result<(), CliError> {
    match cmd {
        RecipientsCmd::List(page) => super::list(session, &RECIPIENTS, page.cursor.as_deref()).await,
        RecipientsCmd::Delete { id, correspondence } => {
            let config = recipients::delete(correspondence.as_deref())?;
            super::write(session, config, RECIPIENTS.delete_descriptor(&id)).await
        }
    }
}
