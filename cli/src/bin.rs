use std::{
    error::Error,
    io::{self, Write},
};

use tracing_subscriber::{fmt, EnvFilter};

mod app;
pub(crate) use app::App;

mod cmds;

#[cfg(test)]
mod temp_cwd;

pub(crate) type Result<T> = std::result::Result<T, Box<dyn Error>>;

#[allow(unused_must_use)]
#[cfg(not(tarpaulin_include))]
fn main() {
    // Kept as small as possible; everything past argument parsing is
    // reachable from the in-process tests through `App`.

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(io::stderr).init();

    let stdin = io::stdin();
    let mut stdin = stdin.lock();

    let stdout = io::stdout();
    let mut stdout = stdout.lock();

    let mut app = App {
        arg_matches: app::clap_app().get_matches(),
        stdin: &mut stdin,
        stdout: &mut stdout,
    };

    let r = app.run();

    app.flush();
    // Intentionally ignoring the result of this flush.

    std::process::exit(match r {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("ERROR: {}", err);
            1
        }
    });
}
