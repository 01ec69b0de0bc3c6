use std::{
    fs,
    io::{self, IsTerminal, Read},
    path::{Path, PathBuf},
};

use crate::cli::HYPHEN;

/// An input source to read a bitstream from.
#[derive(Clone, Debug)]
pub enum InputSource {
    /// The input will be read from stdin.
    Stdin,
    /// The input will be read from a single file.
    File(PathBuf),
}

impl InputSource {
    /// Evaluates a command line argument into an input source.
    ///
    /// When the value is "-", then input will be read from stdin.
    pub fn new(input: &str) -> Self {
        if input == HYPHEN {
            Self::Stdin
        } else {
            Self::File(input.into())
        }
    }

    /// Reads the whole input into a byte vector.
    ///
    /// Refuses to wait for a bitstream typed into an interactive
    /// terminal on stdin.
    pub fn read_to_vec(&self) -> eyre::Result<Vec<u8>> {
        match self {
            Self::Stdin => {
                let stdin = io::stdin();
                if stdin.is_terminal() {
                    eyre::bail!("stdin is a terminal; pipe the bitstream in or pass a file path");
                }

                let mut buf = Vec::new();
                stdin.lock().read_to_end(&mut buf)?;
                Ok(buf)
            }

            Self::File(path) => fs::read(path)
                .map_err(|e| eyre::eyre!("failed to read '{}': {e}", path.display())),
        }
    }
}

/// An output source for produced data.
#[derive(Clone, Debug)]
pub enum OutputSource {
    /// The output will be written to stdout.
    Stdout,
    /// The output will be written to a single file.
    File(PathBuf),
}

impl OutputSource {
    /// Evaluates a command line argument into an output source.
    ///
    /// When the value is "-", output will be printed to stdout.
    pub fn new(output: PathBuf) -> Self {
        if output.as_os_str() == HYPHEN {
            Self::Stdout
        } else {
            Self::File(output)
        }
    }
}

/// Writes `data` to the file at `path`, replacing previous contents.
pub fn write_file(path: &Path, data: &[u8]) -> eyre::Result<()> {
    fs::write(path, data).map_err(|e| eyre::eyre!("failed to write '{}': {e}", path.display()))
}
