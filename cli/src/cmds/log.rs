use std::io::Write;

use crate::{App, Result};

use clap::{Arg, ArgMatches, SubCommand};

pub(crate) fn subcommand<'a, 'b>() -> clap::App<'a, 'b> {
    SubCommand::with_name("log")
        .about("List the revisions of an object, newest first")
        .arg(
            Arg::with_name("path")
                .required(true)
                .help("Logical path of the object"),
        )
}

pub(crate) fn run(app: &mut App, matches: &ArgMatches) -> Result<()> {
    let path = matches.value_of("path").unwrap();

    let storage = app.open_storage(true)?;
    for record in storage.get_revisions(path)? {
        let metadata = record.metadata();
        writeln!(
            app,
            "{} {} <{}> {}",
            record.revision(),
            metadata.author().name(),
            metadata.author().email(),
            metadata.title().unwrap_or("")
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::App;

    #[test]
    fn newest_first() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().to_str().unwrap();

        for (content, title) in &[("1", "first"), ("2", "second")] {
            App::run_with_stdin_and_args(
                content.as_bytes().to_vec(),
                vec!["-C", dir, "--author", "Ada", "put", "a", "-m", title],
            )
            .unwrap();
        }
        App::run_with_args(vec!["-C", dir, "rm", "a", "-m", "gone"]).unwrap();

        let stdout = App::run_with_args(vec!["-C", dir, "log", "a"]).unwrap();
        let stdout = String::from_utf8(stdout).unwrap();
        let lines: Vec<&str> = stdout.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" Ada <revstore@localhost> second"), "{}", lines[0]);
        assert!(lines[1].ends_with(" Ada <revstore@localhost> first"), "{}", lines[1]);
    }

    #[test]
    fn unknown_path_has_no_history() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().to_str().unwrap();
        App::run_with_args(vec!["-C", dir, "init"]).unwrap();

        let stdout = App::run_with_args(vec!["-C", dir, "log", "a"]).unwrap();
        assert!(stdout.is_empty());
    }
}
