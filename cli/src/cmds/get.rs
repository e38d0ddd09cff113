use std::io::Write;

use crate::{App, Result};

use clap::{Arg, ArgMatches, SubCommand};

pub(crate) fn subcommand<'a, 'b>() -> clap::App<'a, 'b> {
    SubCommand::with_name("get")
        .about("Write an object's content to standard output")
        .arg(
            Arg::with_name("path")
                .required(true)
                .help("Logical path of the object"),
        )
        .arg(super::revision_arg())
}

pub(crate) fn run(app: &mut App, matches: &ArgMatches) -> Result<()> {
    let path = matches.value_of("path").unwrap();
    let revision = matches.value_of("rev");

    let storage = app.open_storage(true)?;
    let record = match storage.get_object(path, revision)? {
        Some(record) => record,
        None => {
            return Err(match revision {
                Some(revision) => format!("no object at `{}` as of `{}`", path, revision),
                None => format!("no object at `{}`", path),
            }
            .into())
        }
    };

    app.write_all(&record.content()?)?;
    Ok(())
}
