use std::{
    io::{self, Write},
    path::PathBuf,
};

use bitpack_buf::BitBuffer;
use clap::Args;

use super::Command;
use crate::{
    cli::{self, OutputSource, HYPHEN},
    field::Field,
};

/// Subcommand for packing a list of fields into a bitstream.
#[derive(Debug, Args)]
pub struct Pack {
    /// The capacity of the buffer in bytes.
    ///
    /// Defaults to the smallest size that fits all given fields.
    #[clap(short, long)]
    capacity: Option<usize>,

    /// An optional output file for the packed bytes.
    ///
    /// Defaults to "-" for printing the bytes as hex to stdout.
    /// Any other path receives the raw bytes.
    #[clap(short, default_value = HYPHEN)]
    output: PathBuf,

    /// The fields to pack in order, as `KIND[:BITS]=VALUE`.
    ///
    /// KIND is one of bool, u8, u16, i16, u32, i32, u64, i64,
    /// f32, f64, str or bytes. Values for bytes are given in hex.
    ///
    /// BITS may only be given for integer kinds and selects how
    /// many low bits of the value will be stored.
    #[clap(required = true)]
    fields: Vec<Field>,
}

impl Command for Pack {
    fn handle(self) -> eyre::Result<()> {
        let data = pack(&self.fields, self.capacity)?;
        match OutputSource::new(self.output) {
            OutputSource::Stdout => write_hex(io::stdout().lock(), &data)?,
            OutputSource::File(path) => cli::write_file(&path, &data)?,
        }

        Ok(())
    }
}

/// Packs `fields` into a buffer of `capacity` bytes and returns the
/// bytes populated by them.
fn pack(fields: &[Field], capacity: Option<usize>) -> eyre::Result<Vec<u8>> {
    let needed = fields.iter().map(Field::bit_len).sum::<usize>();
    let capacity = capacity.unwrap_or_else(|| needed.div_ceil(8));
    log::debug!("Packing {needed} bits into a buffer of {capacity} bytes");

    let mut buf = BitBuffer::new(capacity);
    for field in fields {
        if !field.fits() {
            log::warn!(
                "Value {:?} does not fit into '{}'; it will be truncated",
                field.value(),
                field.spec()
            );
        }

        log::trace!("Writing '{}' at bit {}", field.spec(), buf.pos());
        field
            .write(&mut buf)
            .map_err(|e| eyre::eyre!("failed to pack '{}': {e}", field.spec()))?;
    }

    let len = buf.written_bytes();
    let mut data = buf.into_inner();
    data.truncate(len);

    Ok(data)
}

fn write_hex<W: Write>(mut out: W, data: &[u8]) -> io::Result<()> {
    writeln!(out, "{}", hex::encode(data))?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(raw: &[&str]) -> Vec<Field> {
        raw.iter().map(|f| f.parse().unwrap()).collect()
    }

    #[test]
    fn default_capacity_fits_fields() {
        let data = pack(&fields(&["bool=1", "u8:4=5", "i16:11=-1024"]), None).unwrap();

        assert_eq!(data, vec![0b0000_1011, 0b1000_0000]);
    }

    #[test]
    fn explicit_capacity_emits_populated_bytes() {
        let data = pack(&fields(&["u8=5"]), Some(8)).unwrap();
        assert_eq!(data, vec![5]);

        let data = pack(&fields(&["u32:24=1234567"]), Some(3)).unwrap();
        assert_eq!(data, 1234567u32.to_le_bytes()[..3]);
    }

    #[test]
    fn capacity_overflow_fails() {
        assert!(pack(&fields(&["u16=5"]), Some(1)).is_err());
        assert!(pack(&fields(&["str=This is a test string."]), Some(25)).is_err());
    }

    #[test]
    fn hex_output() {
        let mut out = Vec::new();
        write_hex(&mut out, &[0xDE, 0xAD, 0x05]).unwrap();

        assert_eq!(out, b"dead05\n");
    }
}
