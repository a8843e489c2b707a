// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("beacon")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Beacon Contributors")
        .about("CLI tool powered by Nix for package management")
        .subcommand_required(true)
        .subcommand(
            Command::new("install")
                .about("Install a package with optional version")
                .arg(Arg::new("package").required(true).help("Package name"))
                .arg(Arg::new("version").help("Version to install (default: latest)")),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove installed packages")
                .arg(
                    Arg::new("packages")
                        .required(true)
                        .action(ArgAction::Append)
                        .help("Package names to remove"),
                ),
        )
        .subcommand(
            Command::new("search")
                .about("Search available packages")
                .arg(Arg::new("term").help("Search term (lists everything if omitted)")),
        )
        .subcommand(
            Command::new("update")
                .about("Update a package, following upgrade mappings")
                .arg(Arg::new("package").required(true).help("Package name")),
        )
        .subcommand(Command::new("list").about("List all installed packages"))
        .subcommand(
            Command::new("login")
                .about("Login with your user address")
                .arg(
                    Arg::new("user_address")
                        .required(true)
                        .help("Wallet address to publish under"),
                ),
        )
        .subcommand(
            Command::new("push")
                .about("Push all installed packages to the hub")
                .arg(
                    Arg::new("project_name")
                        .required(true)
                        .help("Project name recorded with the snapshot"),
                ),
        )
        .subcommand(
            Command::new("pull")
                .about("Pull and install a package list from a share URL")
                .arg(
                    Arg::new("url")
                        .required(true)
                        .help("URL whose last path segment is the blob id"),
                ),
        )
        .subcommand(
            Command::new("quickstart")
                .about("Install all packages needed for a development environment")
                .arg(
                    Arg::new("environment")
                        .required(true)
                        .help("Environment name (see `beacon environments`)"),
                ),
        )
        .subcommand(Command::new("environments").about("List all available development environments"))
        .subcommand(
            Command::new("server")
                .about("Start the REST API server")
                .arg(
                    Arg::new("port")
                        .short('p')
                        .long("port")
                        .value_name("PORT")
                        .help("Port to listen on (default: $PORT or 5000)"),
                )
                .arg(
                    Arg::new("host")
                        .long("host")
                        .value_name("HOST")
                        .help("Address to bind (default: $HOST or 0.0.0.0)"),
                ),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    // Generate main man page
    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("beacon.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}
