use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
};

use bitpack_buf::BitBuffer;
use clap::Args;
use serde::Serialize;

use super::Command;
use crate::{
    cli::{InputSource, OutputSource, HYPHEN},
    field::{FieldSpec, Value},
};

/// Subcommand for unpacking a bitstream with a given schema.
#[derive(Debug, Args)]
pub struct Unpack {
    /// The input file holding the bitstream.
    ///
    /// When the value is "-", then input will be read from stdin.
    input: String,

    /// Treats the input as hex text instead of raw bytes.
    #[clap(long, default_value_t = false)]
    hex: bool,

    /// An optional output file for the decoded values as JSON.
    ///
    /// Defaults to "-" for printing output to stdout.
    #[clap(short, default_value = HYPHEN)]
    output: PathBuf,

    /// The fields to read in order, as `KIND[:BITS]`.
    ///
    /// This must replay the exact sequence of fields that was
    /// used to pack the data.
    #[clap(required = true)]
    schema: Vec<FieldSpec>,
}

/// A value decoded from the bitstream.
#[derive(Debug, Serialize)]
struct Decoded {
    field: String,
    value: Value,
}

impl Command for Unpack {
    fn handle(self) -> eyre::Result<()> {
        let data = InputSource::new(&self.input).read_to_vec()?;
        let values = unpack(decode_input(data, self.hex)?, &self.schema)?;

        match OutputSource::new(self.output) {
            OutputSource::Stdout => write_json(io::stdout().lock(), &values)?,
            OutputSource::File(path) => {
                let file = fs::File::create(&path)
                    .map_err(|e| eyre::eyre!("failed to create '{}': {e}", path.display()))?;
                write_json(io::BufWriter::new(file), &values)
                    .map_err(|e| eyre::eyre!("failed to write '{}': {e}", path.display()))?;
            }
        }

        Ok(())
    }
}

fn decode_input(data: Vec<u8>, hex: bool) -> eyre::Result<Vec<u8>> {
    if hex {
        let text = String::from_utf8(data)?;
        Ok(hex::decode(text.trim())?)
    } else {
        Ok(data)
    }
}

/// Replays `schema` over the bitstream in `data`.
fn unpack(data: Vec<u8>, schema: &[FieldSpec]) -> eyre::Result<Vec<Decoded>> {
    let mut buf = BitBuffer::from_vec(data);
    let mut values = Vec::with_capacity(schema.len());
    for spec in schema {
        log::trace!("Reading '{spec}' at bit {}", buf.pos());
        let value = spec
            .read(&mut buf)
            .map_err(|e| eyre::eyre!("failed to unpack '{spec}' at bit {}: {e}", buf.pos()))?;

        values.push(Decoded {
            field: spec.to_string(),
            value,
        });
    }

    log::debug!("Consumed {} of {} bits", buf.pos(), buf.bit_size());
    if buf.remaining_bits() >= 8 {
        log::warn!("{} trailing bytes were left unread", buf.remaining_bits() >> 3);
    }

    Ok(values)
}

fn write_json<W: Write>(mut out: W, values: &[Decoded]) -> eyre::Result<()> {
    serde_json::to_writer_pretty(&mut out, values)?;
    writeln!(out)?;
    out.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct FullDevice;

    impl Write for FullDevice {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("no space left on device"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn schema(raw: &[&str]) -> Vec<FieldSpec> {
        raw.iter().map(|s| s.parse().unwrap()).collect()
    }

    #[test]
    fn json_array_shape() {
        let data = vec![0b0000_1011, 0b1000_0000];
        let values = unpack(data, &schema(&["bool", "u8:4", "i16:11"])).unwrap();

        assert_eq!(
            serde_json::to_value(&values).unwrap(),
            json!([
                { "field": "bool", "value": true },
                { "field": "u8:4", "value": 5 },
                { "field": "i16:11", "value": -1024 },
            ])
        );
    }

    #[test]
    fn hex_input() {
        assert_eq!(
            decode_input(b" dead05\n".to_vec(), true).unwrap(),
            vec![0xDE, 0xAD, 0x05]
        );
        assert_eq!(decode_input(b"05".to_vec(), false).unwrap(), b"05".to_vec());
        assert!(decode_input(b"xyz".to_vec(), true).is_err());
    }

    #[test]
    fn short_input_fails() {
        assert!(unpack(vec![0xFF], &schema(&["u16"])).is_err());
        assert!(unpack(vec![0xFF, 0xFF, 0xFF, 0xFF], &schema(&["str"])).is_err());
    }

    #[test]
    fn failed_output_is_reported() {
        let values = unpack(vec![5], &schema(&["u8"])).unwrap();

        assert!(write_json(io::BufWriter::new(FullDevice), &values).is_err());
    }

    #[test]
    fn json_output() {
        let values = unpack(vec![5], &schema(&["u8"])).unwrap();
        let mut out = Vec::new();
        write_json(&mut out, &values).unwrap();

        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed, json!([{ "field": "u8", "value": 5 }]));
        assert_eq!(out.last(), Some(&b'\n'));
    }
}
