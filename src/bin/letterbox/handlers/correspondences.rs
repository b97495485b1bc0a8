#![deny(clippy::all, clippy::pedantic)]

use letterbox::application::Session;
use letterbox::application::admin::correspondences::{self, CORRESPONDENCES};

use crate::args::CorrespondencesCmd;
use crate::client::CliError;

pub async fn handle(session: &Session, cmd: CorrespondencesCmd) -> Result<(), CliError> {
    match cmd {
        CorrespondencesCmd::List(page) => {
            super::list(session, &CORRESPONDENCES, page.cursor.as_deref()).await
        }
        CorrespondencesCmd::Show { id } => super::show(session, &CORRESPONDENCES, &id).await,
        CorrespondencesCmd::Delete { id } => {
            let config = correspondences::delete(&id)?;
            super::write(session, config, CORRESPONDENCES.delete_descriptor(&id)).await
        }
    }
}
