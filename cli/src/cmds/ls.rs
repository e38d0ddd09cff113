use std::io::Write;

use crate::{App, Result};

use clap::{Arg, ArgMatches, SubCommand};

pub(crate) fn subcommand<'a, 'b>() -> clap::App<'a, 'b> {
    SubCommand::with_name("ls")
        .about("List the objects at the tip of the branch")
        .arg(
            Arg::with_name("prefix")
                .help("Only list paths within this directory"),
        )
}

pub(crate) fn run(app: &mut App, matches: &ArgMatches) -> Result<()> {
    let prefix = matches.value_of("prefix").unwrap_or("");

    let storage = app.open_storage(true)?;
    let mut records = storage.get_all_objects(prefix)?;
    records.sort_by(|a, b| a.path().cmp(b.path()));

    for record in records {
        writeln!(app, "{} {}", record.blob_id(), record.path())?;
    }

    Ok(())
}
