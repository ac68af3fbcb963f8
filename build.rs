//! Renders the `images` manual pages from the shared clap definitions:
//! `images.1` for the binary and `images-<verb>.1` for each verb.

use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

use cli::Cli;

/// Verbs whose page would only repeat the top-level one.
const SKIPPED_VERBS: &[&str] = &["help"];

fn render(page: Man, target: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut buffer = Vec::new();
    page.render(&mut buffer)?;
    fs::write(target, buffer)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout();
    writeln!(stdout, "cargo:rerun-if-changed=build.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed=src/cli/mod.rs")?;

    let out_dir = env::var_os("OUT_DIR").map(PathBuf::from).ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "OUT_DIR was not set")
    })?;

    let command = Cli::command();
    for verb in command
        .get_subcommands()
        .filter(|verb| !SKIPPED_VERBS.contains(&verb.get_name()))
    {
        let title = format!("images-{}", verb.get_name());
        let target = out_dir.join(format!("{title}.1"));
        render(Man::new(verb.clone()).title(title), &target)?;
    }
    render(Man::new(command), &out_dir.join("images.1"))?;

    Ok(())
}
