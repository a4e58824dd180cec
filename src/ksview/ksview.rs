use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rpassword::prompt_password;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use keepass::kdb3::{Credential, Database, Group, OpenOptions};


/// Print the contents of a KeePass 1.x database.
#[derive(Parser)]
#[command(name = "ksview", version)]
struct Cli {
    /// Database file (.kdb)
    file: PathBuf,

    /// Open without prompting for a password
    #[arg(long)]
    no_password: bool,

    /// Print entry passwords instead of masking them
    #[arg(long)]
    show_passwords: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}


fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { LevelFilter::DEBUG } else { LevelFilter::WARN };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::builder()
            .with_default_directive(level.into())
            .from_env_lossy())
        .with_writer(std::io::stderr)
        .init();

    let credential = if cli.no_password {
        Credential::Empty
    } else {
        let password = zeroize::Zeroizing::new(
            prompt_password("Database password: ").context("failed to read password")?);
        Credential::password(password.as_bytes())
    };

    let db = OpenOptions::new()
        .credential(credential)
        .open_path(&cli.file)
        .with_context(|| format!("failed to open {}", cli.file.display()))?;

    print_query(&db, cli.show_passwords);

    Ok(())
}


fn print_query(db: &Database, show_passwords: bool) {
    let glen = db.all_groups().map(|g| g.name().len()).max().unwrap_or(1).max(1);

    for g in db.groups() {
        print_group(db, g, glen, show_passwords);
    }
}


fn print_group(db: &Database, group: &Group, glen: usize, show_passwords: bool) {
    let indent = "  ".repeat(usize::from(group.level()));

    for e in group.entries() {
        let password = if show_passwords { e.password() } else { "********" };
        println!("{}{:<width$}\t| {}\t| {}\t| {}\t| {}",
                 indent, group.name(), e.title(), e.username(), password, e.url(),
                 width = glen);
    }

    for child in db.subgroups(group.id()) {
        print_group(db, child, glen, show_passwords);
    }
}
