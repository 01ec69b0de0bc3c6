use clap::{Parser, Subcommand};

use crate::cmd::*;

mod args;

pub mod io;
pub use io::*;

pub const HYPHEN: &str = "-";

/// The CLI interface for the bitpack application.
#[derive(Debug, Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
pub struct Cli {
    /// The selected command.
    #[clap(subcommand)]
    pub command: BitpackCommand,

    #[clap(flatten)]
    pub verbosity: args::Verbosity,
}

/// The top-level commands supported by bitpack.
#[derive(Debug, Subcommand)]
pub enum BitpackCommand {
    Pack(pack::Pack),
    Unpack(unpack::Unpack),
}

impl Command for BitpackCommand {
    fn handle(self) -> eyre::Result<()> {
        match self {
            Self::Pack(pack) => pack.handle(),
            Self::Unpack(unpack) => unpack.handle(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use clap::Parser;
    use serde_json::json;

    use super::*;
    use crate::cmd::Command;

    fn run(args: &[&str]) -> eyre::Result<()> {
        let cli = Cli::try_parse_from(["bitpack"].into_iter().chain(args.iter().copied()))?;
        cli.command.handle()
    }

    fn path(p: &Path) -> &str {
        p.to_str().unwrap()
    }

    #[test]
    fn pack_then_unpack() {
        let dir = tempfile::tempdir().unwrap();
        let packed = dir.path().join("frame.bin");
        let decoded = dir.path().join("frame.json");

        run(&[
            "pack",
            "-o",
            path(&packed),
            "bool=true",
            "u8:4=5",
            "i16:11=-1024",
            "u32:24=1234567",
            "f32=0.1",
            "str=This is a test string.",
        ])
        .unwrap();
        assert_eq!(fs::read(&packed).unwrap().len(), (40 + 32 + 32 + 22 * 8) / 8);

        run(&[
            "unpack",
            "-o",
            path(&decoded),
            path(&packed),
            "bool",
            "u8:4",
            "i16:11",
            "u32:24",
            "f32",
            "str",
        ])
        .unwrap();

        let json: serde_json::Value =
            serde_json::from_slice(&fs::read(&decoded).unwrap()).unwrap();
        assert_eq!(
            json,
            json!([
                { "field": "bool", "value": true },
                { "field": "u8:4", "value": 5 },
                { "field": "i16:11", "value": -1024 },
                { "field": "u32:24", "value": 1234567 },
                { "field": "f32", "value": 0.1 },
                { "field": "str", "value": "This is a test string." },
            ])
        );
    }

    #[test]
    fn unpack_hex_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("frame.hex");
        let output = dir.path().join("frame.json");
        fs::write(&input, "0b80\n").unwrap();

        run(&[
            "unpack",
            "--hex",
            "-o",
            path(&output),
            path(&input),
            "bool",
            "u8:4",
            "i16:11",
        ])
        .unwrap();

        let json: serde_json::Value =
            serde_json::from_slice(&fs::read(&output).unwrap()).unwrap();
        assert_eq!(json[2], json!({ "field": "i16:11", "value": -1024 }));
    }

    #[test]
    fn bad_input_fails() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("short.bin");
        let output = dir.path().join("out");
        fs::write(&input, [0xFF]).unwrap();

        assert!(run(&["pack", "-o", path(&output), "-c", "1", "u16=5"]).is_err());
        assert!(run(&["pack", "-o", path(&output), "u8:9=1"]).is_err());
        assert!(run(&["unpack", "-o", path(&output), path(&input), "u16"]).is_err());
        assert!(run(&["unpack", path(&dir.path().join("missing.bin")), "u8"]).is_err());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn full_device_output_fails() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("frame.hex");
        fs::write(&input, "05").unwrap();

        assert!(run(&["unpack", "--hex", "-o", "/dev/full", path(&input), "u8"]).is_err());
        assert!(run(&["pack", "-o", "/dev/full", "u8=5"]).is_err());
    }
}
