use std::io::Write;

use crate::{App, Result};

use clap::{ArgMatches, SubCommand};

pub(crate) fn subcommand<'a, 'b>() -> clap::App<'a, 'b> {
    SubCommand::with_name("init").about("Create an empty storage (or open an existing one)")
}

pub(crate) fn run(app: &mut App, _matches: &ArgMatches) -> Result<()> {
    let path = app.storage_path()?;
    let storage = app.open_storage(false)?;
    let branch = storage.branch_ref().to_string();
    let head = storage.head();
    storage.close();

    writeln!(
        app,
        "Initialized storage in {} ({} at {})",
        path.display(),
        branch,
        head
    )?;

    Ok(())
}
