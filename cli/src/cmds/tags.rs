use std::io::Write;

use crate::{App, Result};

use clap::{ArgMatches, SubCommand};

pub(crate) fn subcommand<'a, 'b>() -> clap::App<'a, 'b> {
    SubCommand::with_name("tags").about("List tags and the commits they name")
}

pub(crate) fn run(app: &mut App, _matches: &ArgMatches) -> Result<()> {
    let storage = app.open_storage(true)?;
    for tag in storage.get_tags()? {
        writeln!(app, "{} {}", tag.commit(), tag.name())?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::App;

    #[test]
    fn sorted_by_name() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().to_str().unwrap();

        App::run_with_args(vec!["-C", dir, "tag", "zeta"]).unwrap();
        let head = App::run_with_stdin_and_args(b"x".to_vec(), vec!["-C", dir, "put", "a"]).unwrap();
        let head = String::from_utf8(head).unwrap();
        App::run_with_args(vec!["-C", dir, "tag", "alpha"]).unwrap();

        let stdout = String::from_utf8(App::run_with_args(vec!["-C", dir, "tags"]).unwrap()).unwrap();
        let lines: Vec<&str> = stdout.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], format!("{} alpha", head.trim()));
        assert!(lines[1].ends_with(" zeta"));
    }
}
