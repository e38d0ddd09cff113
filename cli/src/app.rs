use std::{
    env,
    io::{Read, Write},
    path::PathBuf,
};

#[cfg(test)]
use std::ffi::OsString;

use crate::{cmds, Result};

use clap::{crate_version, AppSettings, Arg, ArgMatches};
use revstore::{Attribution, ObjectMetadata, Storage, StorageConfig};
use tracing::debug;

const DEFAULT_AUTHOR: &str = "revstore";
const DEFAULT_EMAIL: &str = "revstore@localhost";

pub(crate) fn clap_app<'a, 'b>() -> clap::App<'a, 'b> {
    let app = clap::App::new("revstore")
        .version(crate_version!())
        .about("Inspect and edit a versioned object store")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .setting(AppSettings::VersionlessSubcommands)
        .arg(
            Arg::with_name("dir")
                .short("C")
                .takes_value(true)
                .value_name("DIR")
                .help("Use the storage in DIR instead of the current directory"),
        )
        .arg(
            Arg::with_name("remote")
                .long("remote")
                .takes_value(true)
                .value_name("URL")
                .help("Mirror changes to this remote"),
        )
        .arg(
            Arg::with_name("branch")
                .long("branch")
                .takes_value(true)
                .value_name("NAME")
                .help("Track this branch instead of the one HEAD names"),
        )
        .arg(
            Arg::with_name("author")
                .long("author")
                .takes_value(true)
                .value_name("NAME")
                .help("Name recorded on new revisions and tags"),
        )
        .arg(
            Arg::with_name("email")
                .long("email")
                .takes_value(true)
                .value_name("EMAIL")
                .help("Email recorded on new revisions and tags"),
        );

    cmds::add_subcommands(app)
}

pub(crate) struct App<'a> {
    pub arg_matches: ArgMatches<'a>,
    pub stdin: &'a mut dyn Read,
    pub stdout: &'a mut dyn Write,
}

impl<'a> App<'a> {
    pub fn run(&mut self) -> Result<()> {
        cmds::dispatch(self)
    }

    /// Absolute path of the storage directory (`-C`, else the current directory).
    pub fn storage_path(&self) -> Result<PathBuf> {
        let cwd = env::current_dir()?;
        Ok(match self.arg_matches.value_of("dir") {
            Some(dir) => cwd.join(dir),
            None => cwd,
        })
    }

    /// Open the storage. Read-only opens fail instead of creating a repository.
    pub fn open_storage(&self, read_only: bool) -> Result<Storage> {
        let mut builder = StorageConfig::builder(self.storage_path()?).read_only(read_only);
        if let Some(url) = self.arg_matches.value_of("remote") {
            builder = builder.remote_url(url);
        }
        if let Some(branch) = self.arg_matches.value_of("branch") {
            builder = builder.branch(branch);
        }

        let config = builder.build()?;
        debug!(target: "revstore::cli", ?config, "opening storage");
        Ok(Storage::open(config)?)
    }

    /// Metadata for a change, titled by the subcommand's `--message`.
    pub fn metadata(&self, sub_matches: &ArgMatches) -> ObjectMetadata {
        let author = Attribution::now(
            self.arg_matches.value_of("author").unwrap_or(DEFAULT_AUTHOR),
            self.arg_matches.value_of("email").unwrap_or(DEFAULT_EMAIL),
        );

        let metadata = ObjectMetadata::new(author);
        match sub_matches.value_of("message") {
            Some(message) => metadata.with_title(message),
            None => metadata,
        }
    }

    #[cfg(test)]
    pub fn run_with_stdin_and_args<I, T>(stdin: Vec<u8>, args: I) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let mut args: Vec<OsString> = args.into_iter().map(|x| x.into()).collect();
        args.insert(0, OsString::from("revstore"));

        let mut stdin = std::io::Cursor::new(stdin);
        let mut stdout = Vec::new();

        App {
            arg_matches: clap_app().get_matches_from_safe(args)?,
            stdin: &mut stdin,
            stdout: &mut stdout,
        }
        .run()?;

        Ok(stdout)
    }

    #[cfg(test)]
    pub fn run_with_args<I, T>(args: I) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let stdin: Vec<u8> = Vec::new();
        App::run_with_stdin_and_args(stdin, args)
    }
}

impl<'a> Write for App<'a> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.stdout.write(buf)
    }

    #[cfg(not(tarpaulin_include))]
    fn flush(&mut self) -> std::io::Result<()> {
        self.stdout.flush()
    }
}
