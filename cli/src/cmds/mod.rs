use clap::Arg;

use crate::{App, Result};

mod get;
mod init;
mod log;
mod ls;
mod put;
mod rm;
mod tag;
mod tags;

pub(crate) fn add_subcommands<'a, 'b>(app: clap::App<'a, 'b>) -> clap::App<'a, 'b> {
    app.subcommand(get::subcommand())
        .subcommand(init::subcommand())
        .subcommand(log::subcommand())
        .subcommand(ls::subcommand())
        .subcommand(put::subcommand())
        .subcommand(rm::subcommand())
        .subcommand(tag::subcommand())
        .subcommand(tags::subcommand())
}

pub(crate) fn dispatch(app: &mut App) -> Result<()> {
    let matches = app.arg_matches.clone();
    // ^^ Need an independent copy of matches so we can still pass
    // the App struct through to subcommand imps.

    match matches.subcommand() {
        ("get", Some(m)) => get::run(app, &m),
        ("init", Some(m)) => init::run(app, &m),
        ("log", Some(m)) => log::run(app, &m),
        ("ls", Some(m)) => ls::run(app, &m),
        ("put", Some(m)) => put::run(app, &m),
        ("rm", Some(m)) => rm::run(app, &m),
        ("tag", Some(m)) => tag::run(app, &m),
        ("tags", Some(m)) => tags::run(app, &m),
        _ => unreachable!(),
        // unreachable: Should have exited out with appropriate help or
        // error message if no subcommand was given.
    }
}

// `-m <TITLE>` for subcommands that record a change.
fn message_arg<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name("message")
        .short("m")
        .long("message")
        .takes_value(true)
        .value_name("TITLE")
        .help("Title recorded with the change")
}

// `--rev <REVISION>` for subcommands that read history.
fn revision_arg<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name("rev")
        .long("rev")
        .takes_value(true)
        .value_name("REVISION")
        .help("Commit ID, tag name or HEAD")
}
