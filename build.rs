// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn flag(id: &'static str, short: char, long: &'static str, help: &'static str) -> Arg {
    Arg::new(id)
        .short(short)
        .long(long)
        .action(ArgAction::SetTrue)
        .help(help)
}

fn build_cli() -> Command {
    Command::new("avexports")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Replace AV placeholders in exported bags with the real media files")
        .arg(
            Arg::new("input_dir")
                .required(true)
                .value_name("INPUT_DIR")
                .help("Directory holding the exported bag parents"),
        )
        .arg(
            Arg::new("output_dir")
                .required(true)
                .value_name("OUTPUT_DIR")
                .help("Directory the converted bag parents are moved to (must be empty or absent)"),
        )
        .arg(flag(
            "move_input",
            'm',
            "move",
            "Process the input directory in place instead of a staging copy",
        ))
        .arg(flag("fail_fast", 'f', "fail-fast", "Stop at the first dataset that fails"))
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .default_value("/etc/avexports/config.toml")
                .help("Path to the configuration file"),
        )
        .arg(flag(
            "verbose",
            'v',
            "verbose",
            "Log at debug level unless RUST_LOG says otherwise",
        ))
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("avexports.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
