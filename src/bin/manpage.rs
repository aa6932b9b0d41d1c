//! Render battmon(1) and a page per subcommand, into `man/` or the
//! directory given as the first argument.

use battmon::cli::Cli;
use clap::CommandFactory;
use std::fs;
use std::io;
use std::path::PathBuf;

fn main() -> io::Result<()> {
    let out = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from("man"), PathBuf::from);
    fs::create_dir_all(&out)?;

    clap_mangen::generate_to(Cli::command(), &out)?;

    let mut pages: Vec<_> = fs::read_dir(&out)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<_>>()?;
    pages.sort();
    for page in pages {
        println!("Generated {}", page.display());
    }

    Ok(())
}
