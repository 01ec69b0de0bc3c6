//! Checked variants of the [`BitBuffer`] operations.
//!
//! These validate every request before touching the buffer and
//! leave cursor and storage untouched on failure.

use crate::{BitBuffer, Error};

macro_rules! checked_int_impl {
    ($(
        $ty:ty {
            $try_write:ident, $try_write_part:ident => $write_part:ident,
            $try_read:ident, $try_read_part:ident => $read_part:ident $(,)*
        }
    )*) => {
        $(
            #[doc = concat!("Checked version of writing a whole [`", stringify!($ty), "`].")]
            #[inline]
            pub fn $try_write(&mut self, value: $ty) -> Result<(), Error> {
                self.$try_write_part(value, <$ty>::BITS)
            }

            #[doc = concat!("Checked version of [`Self::", stringify!($write_part), "`].")]
            pub fn $try_write_part(&mut self, value: $ty, nbits: u32) -> Result<(), Error> {
                self.check(nbits, <$ty>::BITS)?;
                self.$write_part(value, nbits);
                Ok(())
            }

            #[doc = concat!("Checked version of reading a whole [`", stringify!($ty), "`].")]
            #[inline]
            pub fn $try_read(&mut self) -> Result<$ty, Error> {
                self.$try_read_part(<$ty>::BITS)
            }

            #[doc = concat!("Checked version of [`Self::", stringify!($read_part), "`].")]
            pub fn $try_read_part(&mut self, nbits: u32) -> Result<$ty, Error> {
                self.check(nbits, <$ty>::BITS)?;
                Ok(self.$read_part(nbits))
            }
        )*
    };
}

impl BitBuffer {
    fn ensure_capacity(&self, nbits: usize) -> Result<(), Error> {
        if self.can_write(nbits) {
            Ok(())
        } else {
            let available = self.remaining_bits();
            log::debug!(
                "Rejecting access to {nbits} bits at position {}; only {available} left",
                self.pos
            );

            Err(Error::CapacityExceeded {
                requested: nbits,
                available,
            })
        }
    }

    fn check(&self, nbits: u32, max: u32) -> Result<(), Error> {
        if nbits > max {
            log::debug!("Rejecting {nbits}-bit access to a {max}-bit value");
            return Err(Error::InvalidWidth { bits: nbits, max });
        }

        self.ensure_capacity(nbits as usize)
    }

    // Runs `f` and restores the cursor if it fails halfway through.
    fn rewind_on_error<F, T>(&mut self, f: F) -> Result<T, Error>
    where
        F: FnOnce(&mut Self) -> Result<T, Error>,
    {
        let start = self.pos;
        f(self).inspect_err(|_| self.pos = start)
    }

    checked_int_impl! {
        u8 {
            try_write_u8, try_write_u8_part => write_u8_part,
            try_read_u8, try_read_u8_part => read_u8_part,
        }
        u16 {
            try_write_u16, try_write_u16_part => write_u16_part,
            try_read_u16, try_read_u16_part => read_u16_part,
        }
        i16 {
            try_write_i16, try_write_i16_part => write_i16_part,
            try_read_i16, try_read_i16_part => read_i16_part,
        }
        u32 {
            try_write_u32, try_write_u32_part => write_u32_part,
            try_read_u32, try_read_u32_part => read_u32_part,
        }
        i32 {
            try_write_i32, try_write_i32_part => write_i32_part,
            try_read_i32, try_read_i32_part => read_i32_part,
        }
        u64 {
            try_write_u64, try_write_u64_part => write_u64_part,
            try_read_u64, try_read_u64_part => read_u64_part,
        }
        i64 {
            try_write_i64, try_write_i64_part => write_i64_part,
            try_read_i64, try_read_i64_part => read_i64_part,
        }
    }

    /// Checked version of [`Self::write_bool`].
    #[inline]
    pub fn try_write_bool(&mut self, value: bool) -> Result<(), Error> {
        self.ensure_capacity(1)?;
        self.write_bool(value);
        Ok(())
    }

    /// Checked version of [`Self::read_bool`].
    #[inline]
    pub fn try_read_bool(&mut self) -> Result<bool, Error> {
        self.ensure_capacity(1)?;
        Ok(self.read_bool())
    }

    /// Checked version of [`Self::write_f32`].
    #[inline]
    pub fn try_write_f32(&mut self, value: f32) -> Result<(), Error> {
        self.try_write_u32(value.to_bits())
    }

    /// Checked version of [`Self::read_f32`].
    #[inline]
    pub fn try_read_f32(&mut self) -> Result<f32, Error> {
        self.try_read_u32().map(f32::from_bits)
    }

    /// Checked version of [`Self::write_f64`].
    #[inline]
    pub fn try_write_f64(&mut self, value: f64) -> Result<(), Error> {
        self.try_write_u64(value.to_bits())
    }

    /// Checked version of [`Self::read_f64`].
    #[inline]
    pub fn try_read_f64(&mut self) -> Result<f64, Error> {
        self.try_read_u64().map(f64::from_bits)
    }

    /// Checked version of [`Self::write_bytes`].
    ///
    /// Fails when the sequence is too long for the length prefix
    /// or does not fit into the buffer as a whole.
    pub fn try_write_bytes(&mut self, value: &[u8]) -> Result<(), Error> {
        if i32::try_from(value.len()).is_err() {
            return Err(Error::LengthOverflow(value.len()));
        }

        let nbits = (value.len() << 3).saturating_add(i32::BITS as usize);
        self.ensure_capacity(nbits)?;
        self.write_bytes(value);

        Ok(())
    }

    /// Checked version of [`Self::read_bytes`].
    ///
    /// Negative length prefixes and prefixes exceeding the remaining
    /// capacity are rejected before any allocation takes place.
    pub fn try_read_bytes(&mut self) -> Result<Vec<u8>, Error> {
        self.rewind_on_error(|this| {
            let len = this.try_read_i32()?;
            let len = usize::try_from(len).map_err(|_| {
                log::debug!("Rejecting negative length prefix {len}");
                Error::InvalidLength(len)
            })?;

            this.ensure_capacity(len.saturating_mul(8))?;
            Ok(this.read_raw_bytes(len))
        })
    }

    /// Checked version of [`Self::write_str`].
    #[inline]
    pub fn try_write_str(&mut self, value: &str) -> Result<(), Error> {
        self.try_write_bytes(value.as_bytes())
    }

    /// Checked version of [`Self::read_string`].
    ///
    /// Unlike the unchecked variant, this fails on invalid UTF-8.
    pub fn try_read_string(&mut self) -> Result<String, Error> {
        self.rewind_on_error(|this| {
            let bytes = this.try_read_bytes()?;
            String::from_utf8(bytes).map_err(Into::into)
        })
    }
}
