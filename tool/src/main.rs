mod commands;
mod error;

use clap::{
    app_from_crate, crate_authors, crate_description, crate_name, crate_version, AppSettings, Arg,
    SubCommand,
};
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};

use mpqkit::GameProfile;

const INFO_PROPERTIES: &[&str] = &[
    "format-version",
    "header-offset",
    "header-size",
    "archive-size",
    "file-count",
    "max-files",
    "sector-size",
    "signature-type",
];

const LIST_PROPERTIES: &[&str] = &[
    "hash-index",
    "file-index",
    "byte-offset",
    "file-size",
    "compressed-size",
    "flags",
    "locale",
];

fn main() {
    let matches = app_from_crate!()
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .setting(AppSettings::DisableHelpSubcommand)
        .setting(AppSettings::VersionlessSubcommands)
        .setting(AppSettings::ColorNever)
        .arg(
            Arg::with_name("verbose")
                .long("verbose")
                .multiple(true)
                .global(true)
                .help("logs more details, repeat for even more"),
        )
        .subcommand(SubCommand::with_name("version").about("prints the program version"))
        .subcommand(SubCommand::with_name("about").about("prints information about the program"))
        .subcommand(
            SubCommand::with_name("info")
                .about("prints information about an archive")
                .arg(archive_arg(1))
                .arg(
                    Arg::with_name("property")
                        .short("p")
                        .long("property")
                        .value_name("property")
                        .help("prints only the value of a single property")
                        .possible_values(INFO_PROPERTIES)
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("create")
                .about("creates an archive from a file or directory")
                .arg(
                    Arg::with_name("target")
                        .index(1)
                        .value_name("target")
                        .help("file or directory to put into the archive")
                        .validator(existing_path)
                        .required(true),
                )
                .arg(
                    Arg::with_name("output")
                        .short("o")
                        .long("output")
                        .value_name("file")
                        .help("archive to create, defaults to the target with an .mpq extension")
                        .takes_value(true),
                )
                .arg(game_arg())
                .arg(locale_arg())
                .arg(name_in_archive_arg())
                .arg(
                    Arg::with_name("sign")
                        .short("s")
                        .long("sign")
                        .help("signs the archive with a weak signature"),
                )
                .arg(
                    Arg::with_name("format-version")
                        .short("v")
                        .long("version")
                        .value_name("version")
                        .help("MPQ format version")
                        .possible_values(&["1", "2", "3", "4"])
                        .takes_value(true),
                )
                .arg(number_arg("sector-size", "sector size in bytes, a power of two"))
                .arg(number_arg("raw-chunk-size", "size of raw data chunks"))
                .arg(number_arg("stream-flags", "stream flags of the archive"))
                .arg(number_arg("file-flags1", "storage flags of the (listfile)"))
                .arg(number_arg("file-flags2", "storage flags of the (attributes)"))
                .arg(number_arg("file-flags3", "storage flags of the (signature)"))
                .arg(number_arg("attr-flags", "which attributes to store in the (attributes)"))
                .args(&storage_args()),
        )
        .subcommand(
            SubCommand::with_name("add")
                .about("adds a file to an archive")
                .arg(file_arg(1).validator(existing_file))
                .arg(archive_arg(2))
                .arg(game_arg())
                .arg(locale_arg())
                .arg(
                    Arg::with_name("path")
                        .short("p")
                        .long("path")
                        .value_name("dir")
                        .help("directory inside the archive to put the file into")
                        .takes_value(true),
                )
                .arg(name_in_archive_arg())
                .args(&storage_args()),
        )
        .subcommand(
            SubCommand::with_name("remove")
                .about("removes a file from an archive")
                .arg(file_arg(1))
                .arg(archive_arg(2))
                .arg(locale_arg()),
        )
        .subcommand(
            SubCommand::with_name("list")
                .about("lists the files of an archive")
                .arg(archive_arg(1))
                .arg(
                    Arg::with_name("detailed")
                        .short("d")
                        .long("detailed")
                        .help("prints file properties next to the names"),
                )
                .arg(
                    Arg::with_name("property")
                        .short("p")
                        .long("property")
                        .value_name("property")
                        .help("property to print, can be given several times")
                        .possible_values(LIST_PROPERTIES)
                        .multiple(true)
                        .number_of_values(1)
                        .takes_value(true),
                )
                .arg(listfile_arg()),
        )
        .subcommand(
            SubCommand::with_name("extract")
                .about("extracts files from an archive")
                .arg(archive_arg(1))
                .arg(
                    Arg::with_name("output")
                        .short("o")
                        .long("output")
                        .value_name("dir")
                        .help("directory where to output extracted files, defaults to the archive name")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("file")
                        .short("f")
                        .long("file")
                        .value_name("file")
                        .help("extracts only this file")
                        .takes_value(true),
                )
                .arg(listfile_arg())
                .arg(locale_arg()),
        )
        .subcommand(
            SubCommand::with_name("read")
                .about("writes the contents of a file in an archive to stdout")
                .arg(file_arg(1))
                .arg(archive_arg(2))
                .arg(locale_arg()),
        )
        .subcommand(
            SubCommand::with_name("verify")
                .about("checks the archive signature and the (attributes) checksums")
                .arg(archive_arg(1))
                .arg(
                    Arg::with_name("print")
                        .short("p")
                        .long("print")
                        .help("writes the raw signature to stdout instead"),
                )
                .arg(listfile_arg()),
        )
        .get_matches_safe();

    let matches = match matches {
        Err(error) => error.exit(),
        Ok(matches) => matches,
    };

    let (command, command_matches) = matches.subcommand();
    let verbosity = matches
        .occurrences_of("verbose")
        .max(command_matches.map_or(0, |m| m.occurrences_of("verbose")));
    init_logging(verbosity);

    let result = match (command, command_matches) {
        ("version", Some(_)) => commands::version().map(|_| 0),
        ("about", Some(_)) => commands::about().map(|_| 0),
        ("info", Some(matches)) => commands::info(matches).map(|_| 0),
        ("create", Some(matches)) => commands::create(matches).map(|_| 0),
        ("add", Some(matches)) => commands::add(matches).map(|_| 0),
        ("remove", Some(matches)) => commands::remove(matches).map(|_| 0),
        ("list", Some(matches)) => commands::list(matches).map(|_| 0),
        ("extract", Some(matches)) => commands::extract(matches).map(|_| 0),
        ("read", Some(matches)) => commands::read(matches).map(|_| 0),
        ("verify", Some(matches)) => commands::verify(matches).map(|ok| if ok { 0 } else { 1 }),
        (cmd, _) => {
            eprintln!("Unknown subcommand {} encountered", cmd);
            std::process::exit(1)
        }
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            eprintln!("[!] {}", error);
            std::process::exit(1)
        }
    }
}

fn init_logging(verbosity: u64) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let config = ConfigBuilder::new().set_time_level(LevelFilter::Off).build();

    if TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Never).is_err() {
        eprintln!("[!] Could not set up logging");
    }
}

fn archive_arg<'a, 'b>(index: u64) -> Arg<'a, 'b> {
    Arg::with_name("archive")
        .index(index)
        .value_name("archive")
        .help("MPQ archive")
        .validator(existing_file)
        .required(true)
}

fn file_arg<'a, 'b>(index: u64) -> Arg<'a, 'b> {
    Arg::with_name("file")
        .index(index)
        .value_name("file")
        .help("file to work with")
        .required(true)
}

fn game_arg<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name("game")
        .short("g")
        .long("game")
        .value_name("game")
        .help("game profile deciding how files are stored")
        .validator(known_game)
        .takes_value(true)
}

fn locale_arg<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name("locale")
        .long("locale")
        .value_name("locale")
        .help("locale of the file, such as deDE, or a 4-digit hex id")
        .takes_value(true)
}

fn name_in_archive_arg<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name("name-in-archive")
        .long("name-in-archive")
        .value_name("name")
        .help("name of the file inside the archive")
        .takes_value(true)
}

fn listfile_arg<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name("listfile")
        .short("l")
        .long("listfile")
        .value_name("file")
        .help("file with additional names to look for, one per line")
        .validator(existing_file)
        .takes_value(true)
}

fn number_arg<'a, 'b>(name: &'a str, help: &'a str) -> Arg<'a, 'b> {
    Arg::with_name(name)
        .long(name)
        .value_name("number")
        .help(help)
        .validator(|value| {
            commands::parse_number(&value)
                .map(|_| ())
                .map_err(|err| err.to_string())
        })
        .takes_value(true)
}

fn storage_args<'a, 'b>() -> Vec<Arg<'a, 'b>> {
    vec![
        number_arg("flags", "storage flags of added files"),
        number_arg("compression", "compression of the first sector"),
        number_arg("compression-next", "compression of the remaining sectors"),
    ]
}

fn existing_path(value: String) -> Result<(), String> {
    if std::path::Path::new(&value).exists() {
        Ok(())
    } else {
        Err(format!("{} does not exist", value))
    }
}

fn existing_file(value: String) -> Result<(), String> {
    if std::path::Path::new(&value).is_file() {
        Ok(())
    } else {
        Err(format!("{} is not a file", value))
    }
}

fn known_game(value: String) -> Result<(), String> {
    if value.eq_ignore_ascii_case("default") || GameProfile::lookup(&value).is_some() {
        Ok(())
    } else {
        Err(format!(
            "unknown game, expected one of: {}",
            GameProfile::canonical_names().join(", ")
        ))
    }
}
