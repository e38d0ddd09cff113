use crate::{App, Result};

use clap::{Arg, ArgMatches, SubCommand};

pub(crate) fn subcommand<'a, 'b>() -> clap::App<'a, 'b> {
    SubCommand::with_name("tag")
        .about("Name a revision")
        .arg(Arg::with_name("name").required(true).help("Tag name"))
        .arg(super::revision_arg().default_value("HEAD"))
        .arg(super::message_arg())
}

pub(crate) fn run(app: &mut App, matches: &ArgMatches) -> Result<()> {
    let name = matches.value_of("name").unwrap();
    let revision = matches.value_of("rev").unwrap_or("HEAD");

    let metadata = app.metadata(matches);
    let storage = app.open_storage(false)?;
    storage.tag(revision, name, &metadata)?;
    storage.close();

    Ok(())
}
