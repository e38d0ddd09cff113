use crate::{App, Result};

use clap::{Arg, ArgMatches, SubCommand};

pub(crate) fn subcommand<'a, 'b>() -> clap::App<'a, 'b> {
    SubCommand::with_name("rm")
        .about("Remove an object from the tip of the branch")
        .arg(
            Arg::with_name("path")
                .required(true)
                .help("Logical path of the object"),
        )
        .arg(super::message_arg())
}

pub(crate) fn run(app: &mut App, matches: &ArgMatches) -> Result<()> {
    let path = matches.value_of("path").unwrap();

    let metadata = app.metadata(matches);
    let storage = app.open_storage(false)?;
    storage.delete_object(path, &metadata)?;
    storage.close();

    Ok(())
}
