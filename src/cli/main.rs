//-
// Copyright (c) 2020, Jason Lingle
//
// This file is part of Crymap.
//
// Crymap is free software: you can  redistribute it and/or modify it under the
// terms of  the GNU General Public  License as published by  the Free Software
// Foundation, either version  3 of the License, or (at  your option) any later
// version.
//
// Crymap is distributed  in the hope that  it will be useful,  but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Crymap. If not, see <http://www.gnu.org/licenses/>.


use std::fs;
use std::path::{Path, PathBuf};

use chrono::prelude::*;
use log::{error, info};
use structopt::StructOpt;

use crymap_mailstore::store::fetch::FetchGroup;
use crymap_mailstore::store::mailbox::Mailbox;
use crymap_mailstore::store::model::*;
use crymap_mailstore::store::namespace::Namespace;
use crymap_mailstore::support::error::Error;
use crymap_mailstore::support::log_prefix::LogPrefix;
use crymap_mailstore::support::sysexits::*;
use crymap_mailstore::support::system_config::{LoggingConfig, StoreConfig};

#[derive(StructOpt)]
#[structopt(max_term_width = 80)]
enum Command {
    Check(CheckSubcommand),
}

/// Validate a mail store configuration and show what it provisions.
///
/// The namespace described by the configuration is built in memory, and the
/// resulting mailbox hierarchy is printed in the form of IMAP LIST and STATUS
/// responses.
///
/// Message files given on the command line are appended to the chosen
/// mailbox first, and a summary of each is printed, which is useful for
/// checking how the store sees a particular message.
#[derive(StructOpt)]
struct CheckSubcommand {
    /// The TOML configuration file.
    #[structopt(long, short, parse(from_os_str))]
    config: PathBuf,

    /// The user to name in log messages.
    #[structopt(long, short)]
    user: Option<String>,

    /// Append the input messages to this mailbox
    /// [default: the configured inbox]
    #[structopt(long, short)]
    mailbox: Option<String>,

    /// Add this IMAP flag (e.g., '\Flagged') or keyword to the appended
    /// message(s). Can be passed multiple times.
    #[structopt(parse(try_from_str), short, long, number_of_values(1))]
    flag: Vec<Flag>,

    /// Message files to append.
    #[structopt(parse(from_os_str))]
    inputs: Vec<PathBuf>,
}

pub fn main() {
    // Clap exits with status 1 instead of EX_USAGE if we use the more concise
    // API
    let cmd = Command::from_clap(&match Command::clap().get_matches_safe() {
        Ok(matches) => matches,
        Err(
            e @ clap::Error {
                kind: clap::ErrorKind::HelpDisplayed,
                ..
            },
        )
        | Err(
            e @ clap::Error {
                kind: clap::ErrorKind::VersionDisplayed,
                ..
            },
        ) => {
            println!("{}", e.message);
            return;
        }
        Err(e) => {
            eprintln!("{}", e.message);
            EX_USAGE.exit()
        }
    });

    match cmd {
        Command::Check(cmd) => check(cmd),
    }
}

fn check(cmd: CheckSubcommand) {
    let config = match StoreConfig::load(&cmd.config) {
        Ok(config) => config,
        Err(e @ Error::Storage(..)) => {
            eprintln!("Error reading '{}': {}", cmd.config.display(), e);
            EX_NOINPUT.exit()
        }
        Err(e) => {
            eprintln!("Error in '{}': {}", cmd.config.display(), e);
            EX_CONFIG.exit()
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Failed to initialise logging: {}", e);
        EX_CONFIG.exit();
    }

    let log_prefix = LogPrefix::new("check".to_owned());
    if let Some(user) = cmd.user.clone() {
        log_prefix.set_user(user);
    }
    let namespace = match Namespace::from_config(&config.namespace, log_prefix)
    {
        Ok(ns) => ns,
        Err(e) => {
            error!("Failed to provision namespace: {}", e);
            EX_CONFIG.exit()
        }
    };

    if !cmd.inputs.is_empty() {
        let name = cmd.mailbox.as_ref().unwrap_or(&config.namespace.inbox);
        let mailbox = match namespace.resolve(name) {
            Some(mb) => mb,
            None => {
                eprintln!("No such mailbox: {}", name);
                EX_NOINPUT.exit()
            }
        };

        let flags = cmd.flag.iter().cloned().collect::<FlagSet>();
        for input in &cmd.inputs {
            if let Err(e) = append_file(&mailbox, &flags, input) {
                eprintln!("Failed to append '{}': {}", input.display(), e);
                if e.is_unavailable() {
                    EX_USAGE.exit();
                } else {
                    EX_NOINPUT.exit();
                }
            }
        }
    }

    if let Err(e) = print_summary(&namespace) {
        error!("Failed to summarise namespace: {}", e);
        EX_SOFTWARE.exit();
    }
}

fn init_logging(config: &LoggingConfig) -> Result<(), String> {
    use log4rs::append::console::{ConsoleAppender, Target};
    use log4rs::config::{Appender, Config, Root};
    use log4rs::encode::pattern::PatternEncoder;

    if let Some(ref file) = config.config_file {
        return log4rs::init_file(file, log4rs::file::Deserializers::new())
            .map_err(|e| e.to_string());
    }

    let level = config
        .level_filter()
        .ok_or_else(|| format!("Invalid log level '{}'", config.level))?;
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("{d} [{l}][{t}] {m}{n}")))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level))
        .map_err(|e| e.to_string())?;
    log4rs::init_config(config)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

fn append_file(
    mailbox: &Mailbox,
    flags: &FlagSet,
    path: &Path,
) -> Result<(), Error> {
    let mtime = fs::metadata(path)?
        .modified()
        .map(DateTime::<Local>::from)
        .unwrap_or_else(|_| Local::now());
    let mut file = fs::File::open(path)?;
    let uid = mailbox.append(mtime, flags, &mut file)?;
    info!("Appended '{}' to {} as {}", path.display(), mailbox.name(), uid);

    let fetched = mailbox.fetch(
        uid,
        FetchGroup::SEQUENCE_NUMBER
            | FetchGroup::FLAGS
            | FetchGroup::SIZE
            | FetchGroup::INTERNAL_DATE
            | FetchGroup::MIME_DESCRIPTOR,
    )?;

    println!(
        "* {} FETCH (UID {} FLAGS {} RFC822.SIZE {} INTERNALDATE \"{}\")",
        fetched.seqnum.map_or(0, u32::from),
        uid,
        fetched.flags.unwrap_or_default(),
        fetched.size.unwrap_or(0),
        fetched
            .internal_date
            .map(|d| d.format("%d-%b-%Y %H:%M:%S %z").to_string())
            .unwrap_or_default(),
    );
    if let Some(mime) = fetched.mime {
        let parms = mime
            .parms
            .iter()
            .map(|(name, value)| format!("{}={:?}", name, value))
            .collect::<Vec<_>>();
        println!(
            "  {}/{} [{}] header {} bytes, body {} bytes / {} lines",
            mime.typ,
            mime.subtype,
            parms.join("; "),
            mime.header_size,
            mime.body_size,
            mime.body_lines,
        );
    }

    Ok(())
}

fn print_summary(namespace: &Namespace) -> Result<(), Error> {
    for response in namespace.list_responses("*")? {
        let attributes = response
            .attributes
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>();
        println!(
            "* LIST ({}) \"{}\" \"{}\"",
            attributes.join(" "),
            namespace.delimiter(),
            response.name
        );
    }

    for mailbox in namespace.list("*")? {
        if !mailbox.is_selectable() {
            continue;
        }

        let status = mailbox.status(&StatusRequest::all())?;
        println!("* STATUS \"{}\" ({})", status.name, status);
    }

    Ok(())
}
