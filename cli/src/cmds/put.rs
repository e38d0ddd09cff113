use std::{
    fs,
    io::{Read, Write},
};

use crate::{App, Result};

use clap::{Arg, ArgMatches, SubCommand};

pub(crate) fn subcommand<'a, 'b>() -> clap::App<'a, 'b> {
    SubCommand::with_name("put")
        .about("Store a new revision of an object")
        .arg(
            Arg::with_name("path")
                .required(true)
                .help("Logical path of the object"),
        )
        .arg(
            Arg::with_name("file")
                .help("Read content from this file instead of standard input"),
        )
        .arg(super::message_arg())
}

pub(crate) fn run(app: &mut App, matches: &ArgMatches) -> Result<()> {
    let path = matches.value_of("path").unwrap();
    // ^^ unwrap: clap enforces `required`.

    let content = match matches.value_of("file") {
        Some(file) => fs::read(file)?,
        None => {
            let mut content = Vec::new();
            app.stdin.read_to_end(&mut content)?;
            content
        }
    };

    let metadata = app.metadata(matches);
    let storage = app.open_storage(false)?;
    let record = storage.append_object(path, &metadata, &mut content.as_slice(), content.len() as u64)?;
    storage.close();

    writeln!(app, "{}", record.revision())?;
    Ok(())
}
