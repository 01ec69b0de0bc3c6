/// Produces a byte with the low `nbits` bits set.
#[inline(always)]
const fn low_mask(nbits: u32) -> u8 {
    ((1u16 << nbits) - 1) as u8
}

macro_rules! sign_extend_impl {
    ($($fn:ident($uty:ty) -> $ity:ty),* $(,)*) => {
        $(
            #[inline]
            fn $fn(value: $uty, nbits: u32) -> $ity {
                // Move the sign bit of the `nbits` wide value into the MSB,
                // then let the arithmetic shift replicate it downwards.
                match <$uty>::BITS.checked_sub(nbits) {
                    Some(shift) if nbits != 0 => ((value << shift) as $ity) >> shift,
                    _ => value as $ity,
                }
            }
        )*
    };
}

sign_extend_impl! {
    sign_extend_16(u16) -> i16,
    sign_extend_32(u32) -> i32,
    sign_extend_64(u64) -> i64,
}

/// A fixed-capacity buffer which enables bit-based serialization
/// and deserialization of data.
///
/// Reads and writes share a single bit cursor which is advanced by
/// exactly the number of bits every operation consumes. There is no
/// separation between a read mode and a write mode.
///
/// Individual bit writing starts at the LSB of the byte, working
/// towards the MSB.
///
/// # Panics
///
/// The unchecked `write_*` and `read_*` methods panic when the
/// operation runs past the end of the storage. Guard them with
/// [`Self::can_write`] and [`Self::can_read`], or use the `try_*`
/// variants instead.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BitBuffer {
    // The zero-initialized backing storage.
    pub(crate) inner: Box<[u8]>,

    // The bit position of the cursor in `inner`.
    pub(crate) pos: usize,
}

impl BitBuffer {
    /// Creates a zeroed [`BitBuffer`] with a capacity of `byte_size`
    /// bytes.
    pub fn new(byte_size: usize) -> Self {
        Self {
            inner: vec![0; byte_size].into_boxed_slice(),
            pos: 0,
        }
    }

    /// Creates a [`BitBuffer`] over previously produced bytes.
    ///
    /// The capacity is the length of `vec` and the cursor starts at
    /// the first bit, ready to replay the reads of a bitstream.
    pub fn from_vec(vec: Vec<u8>) -> Self {
        Self {
            inner: vec.into_boxed_slice(),
            pos: 0,
        }
    }

    /// Gets the total capacity of the buffer in bits.
    #[inline]
    pub fn bit_size(&self) -> usize {
        self.inner.len() << 3
    }

    /// Gets the total capacity of the buffer in bytes.
    #[inline]
    pub fn byte_size(&self) -> usize {
        self.inner.len()
    }

    /// Gets the current bit position of the cursor.
    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Moves the cursor to bit position `pos`.
    ///
    /// Positions past the end are clamped to [`Self::bit_size`].
    #[inline]
    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.bit_size());
    }

    /// Gets the number of bits between the cursor and the end of
    /// the buffer.
    #[inline]
    pub fn remaining_bits(&self) -> usize {
        self.bit_size() - self.pos
    }

    /// Gets the number of bytes touched by the cursor so far,
    /// including a trailing partial byte.
    #[inline]
    pub fn written_bytes(&self) -> usize {
        self.pos.div_ceil(8)
    }

    /// Checks if `nbits` more bits can be written at the cursor.
    #[inline]
    pub fn can_write(&self, nbits: usize) -> bool {
        nbits <= self.remaining_bits()
    }

    /// Checks if `nbits` more bits can be read at the cursor.
    #[inline]
    pub fn can_read(&self, nbits: usize) -> bool {
        nbits <= self.remaining_bits()
    }

    /// Zeroes the storage and rewinds the cursor to the start.
    pub fn reset(&mut self) {
        self.inner.fill(0);
        self.pos = 0;
    }

    /// Advances the cursor to the next byte boundary.
    ///
    /// Does nothing when the cursor is already aligned.
    #[inline]
    pub fn realign_to_byte(&mut self) {
        self.set_pos((self.pos + 7) & !7);
    }

    /// Gets a view of the buffer's storage as a byte slice.
    #[inline]
    pub fn view(&self) -> &[u8] {
        &self.inner
    }

    /// Consumes the [`BitBuffer`] and returns the byte storage.
    #[inline]
    pub fn into_inner(self) -> Vec<u8> {
        self.inner.into_vec()
    }

    /// Writes the low `nbits` bits of `value` at the cursor.
    ///
    /// Every other bit in the storage keeps its value, even in
    /// the bytes which are only partially covered by the write.
    pub(crate) fn write_bits(&mut self, value: u8, nbits: u32) {
        debug_assert!(nbits <= u8::BITS);

        if nbits == 0 {
            return;
        }

        let idx = self.pos >> 3;
        let used = (self.pos & 7) as u32;
        let free = u8::BITS - used;

        if nbits <= free {
            let mask = low_mask(nbits) << used;
            self.inner[idx] = (self.inner[idx] & !mask) | ((value << used) & mask);
        } else {
            // The value straddles two bytes. Its low `free` bits complete
            // the current byte and the rest starts off the next one.
            let rest = low_mask(nbits - free);
            self.inner[idx] = (self.inner[idx] & low_mask(used)) | (value << used);
            self.inner[idx + 1] = (self.inner[idx + 1] & !rest) | ((value >> free) & rest);
        }

        self.pos += nbits as usize;
    }

    /// Reads `nbits` bits at the cursor into the low bits of a byte.
    pub(crate) fn read_bits(&mut self, nbits: u32) -> u8 {
        debug_assert!(nbits <= u8::BITS);

        if nbits == 0 {
            return 0;
        }

        let idx = self.pos >> 3;
        let used = (self.pos & 7) as u32;
        let free = u8::BITS - used;

        let value = if used == 0 && nbits == u8::BITS {
            self.inner[idx]
        } else if nbits <= free {
            (self.inner[idx] >> used) & low_mask(nbits)
        } else {
            let first = self.inner[idx] >> used;
            let second = self.inner[idx + 1] & low_mask(nbits - free);
            first | (second << free)
        };

        self.pos += nbits as usize;
        value
    }

    // Writes `nbits` bits from little-endian `bytes`, one byte-sized
    // chunk at a time.
    fn write_chunks(&mut self, bytes: &[u8], nbits: u32) {
        let mut remaining = nbits;
        for &byte in bytes.iter().take(nbits.div_ceil(u8::BITS) as usize) {
            let chunk = remaining.min(u8::BITS);
            self.write_bits(byte, chunk);
            remaining -= chunk;
        }
    }

    // Reads `nbits` bits into little-endian `out`, one byte-sized
    // chunk at a time.
    fn read_chunks(&mut self, out: &mut [u8], nbits: u32) {
        let mut remaining = nbits;
        for byte in out.iter_mut().take(nbits.div_ceil(u8::BITS) as usize) {
            let chunk = remaining.min(u8::BITS);
            *byte = self.read_bits(chunk);
            remaining -= chunk;
        }
    }

    /// Writes a [`bool`] as a single bit.
    #[inline]
    pub fn write_bool(&mut self, value: bool) {
        self.write_bits(value as u8, 1);
    }

    /// Reads a single bit as a [`bool`].
    #[inline]
    pub fn read_bool(&mut self) -> bool {
        self.read_bits(1) == 1
    }

    /// Writes a whole [`u8`].
    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.write_u8_part(value, u8::BITS);
    }

    /// Writes the low `nbits` bits of a [`u8`].
    #[inline]
    pub fn write_u8_part(&mut self, value: u8, nbits: u32) {
        self.write_bits(value, nbits);
    }

    /// Reads a whole [`u8`].
    #[inline]
    pub fn read_u8(&mut self) -> u8 {
        self.read_u8_part(u8::BITS)
    }

    /// Reads `nbits` bits into a [`u8`].
    #[inline]
    pub fn read_u8_part(&mut self, nbits: u32) -> u8 {
        self.read_bits(nbits)
    }

    /// Writes a whole [`u16`].
    #[inline]
    pub fn write_u16(&mut self, value: u16) {
        self.write_u16_part(value, u16::BITS);
    }

    /// Writes the low `nbits` bits of a [`u16`].
    pub fn write_u16_part(&mut self, value: u16, nbits: u32) {
        debug_assert!(nbits <= u16::BITS);
        self.write_chunks(&value.to_le_bytes(), nbits);
    }

    /// Reads a whole [`u16`].
    #[inline]
    pub fn read_u16(&mut self) -> u16 {
        self.read_u16_part(u16::BITS)
    }

    /// Reads `nbits` bits into a [`u16`].
    pub fn read_u16_part(&mut self, nbits: u32) -> u16 {
        debug_assert!(nbits <= u16::BITS);
        let mut buf = [0; 2];
        self.read_chunks(&mut buf, nbits);
        u16::from_le_bytes(buf)
    }

    /// Writes a whole [`i16`].
    #[inline]
    pub fn write_i16(&mut self, value: i16) {
        self.write_i16_part(value, i16::BITS);
    }

    /// Writes the low `nbits` bits of an [`i16`]'s two's complement
    /// representation.
    #[inline]
    pub fn write_i16_part(&mut self, value: i16, nbits: u32) {
        self.write_u16_part(value as u16, nbits);
    }

    /// Reads a whole [`i16`].
    #[inline]
    pub fn read_i16(&mut self) -> i16 {
        self.read_i16_part(i16::BITS)
    }

    /// Reads an `nbits` wide two's complement value into an [`i16`],
    /// sign-extending it from its highest bit.
    #[inline]
    pub fn read_i16_part(&mut self, nbits: u32) -> i16 {
        sign_extend_16(self.read_u16_part(nbits), nbits)
    }

    /// Writes a whole [`u32`].
    #[inline]
    pub fn write_u32(&mut self, value: u32) {
        self.write_u32_part(value, u32::BITS);
    }

    /// Writes the low `nbits` bits of a [`u32`].
    pub fn write_u32_part(&mut self, value: u32, nbits: u32) {
        debug_assert!(nbits <= u32::BITS);
        self.write_chunks(&value.to_le_bytes(), nbits);
    }

    /// Reads a whole [`u32`].
    #[inline]
    pub fn read_u32(&mut self) -> u32 {
        self.read_u32_part(u32::BITS)
    }

    /// Reads `nbits` bits into a [`u32`].
    pub fn read_u32_part(&mut self, nbits: u32) -> u32 {
        debug_assert!(nbits <= u32::BITS);
        let mut buf = [0; 4];
        self.read_chunks(&mut buf, nbits);
        u32::from_le_bytes(buf)
    }

    /// Writes a whole [`i32`].
    #[inline]
    pub fn write_i32(&mut self, value: i32) {
        self.write_i32_part(value, i32::BITS);
    }

    /// Writes the low `nbits` bits of an [`i32`]'s two's complement
    /// representation.
    #[inline]
    pub fn write_i32_part(&mut self, value: i32, nbits: u32) {
        self.write_u32_part(value as u32, nbits);
    }

    /// Reads a whole [`i32`].
    #[inline]
    pub fn read_i32(&mut self) -> i32 {
        self.read_i32_part(i32::BITS)
    }

    /// Reads an `nbits` wide two's complement value into an [`i32`],
    /// sign-extending it from its highest bit.
    #[inline]
    pub fn read_i32_part(&mut self, nbits: u32) -> i32 {
        sign_extend_32(self.read_u32_part(nbits), nbits)
    }

    /// Writes a whole [`u64`].
    #[inline]
    pub fn write_u64(&mut self, value: u64) {
        self.write_u64_part(value, u64::BITS);
    }

    /// Writes the low `nbits` bits of a [`u64`].
    ///
    /// The value is written as two 32-bit halves, low half first.
    pub fn write_u64_part(&mut self, value: u64, nbits: u32) {
        debug_assert!(nbits <= u64::BITS);

        self.write_u32_part(value as u32, nbits.min(u32::BITS));
        if nbits > u32::BITS {
            self.write_u32_part((value >> 32) as u32, nbits - u32::BITS);
        }
    }

    /// Reads a whole [`u64`].
    #[inline]
    pub fn read_u64(&mut self) -> u64 {
        self.read_u64_part(u64::BITS)
    }

    /// Reads `nbits` bits into a [`u64`].
    pub fn read_u64_part(&mut self, nbits: u32) -> u64 {
        debug_assert!(nbits <= u64::BITS);

        let lo = self.read_u32_part(nbits.min(u32::BITS)) as u64;
        if nbits > u32::BITS {
            let hi = self.read_u32_part(nbits - u32::BITS) as u64;
            lo | (hi << 32)
        } else {
            lo
        }
    }

    /// Writes a whole [`i64`].
    #[inline]
    pub fn write_i64(&mut self, value: i64) {
        self.write_i64_part(value, i64::BITS);
    }

    /// Writes the low `nbits` bits of an [`i64`]'s two's complement
    /// representation.
    #[inline]
    pub fn write_i64_part(&mut self, value: i64, nbits: u32) {
        self.write_u64_part(value as u64, nbits);
    }

    /// Reads a whole [`i64`].
    #[inline]
    pub fn read_i64(&mut self) -> i64 {
        self.read_i64_part(i64::BITS)
    }

    /// Reads an `nbits` wide two's complement value into an [`i64`],
    /// sign-extending it from its highest bit.
    #[inline]
    pub fn read_i64_part(&mut self, nbits: u32) -> i64 {
        sign_extend_64(self.read_u64_part(nbits), nbits)
    }

    /// Writes the IEEE-754 bit pattern of an [`f32`].
    #[inline]
    pub fn write_f32(&mut self, value: f32) {
        self.write_u32(value.to_bits());
    }

    /// Reads an [`f32`] from its IEEE-754 bit pattern.
    #[inline]
    pub fn read_f32(&mut self) -> f32 {
        f32::from_bits(self.read_u32())
    }

    /// Writes the IEEE-754 bit pattern of an [`f64`].
    #[inline]
    pub fn write_f64(&mut self, value: f64) {
        self.write_u64(value.to_bits());
    }

    /// Reads an [`f64`] from its IEEE-754 bit pattern.
    #[inline]
    pub fn read_f64(&mut self) -> f64 {
        f64::from_bits(self.read_u64())
    }

    /// Writes a byte sequence prefixed by its length as an [`i32`].
    ///
    /// The caller must keep `value` at most [`i32::MAX`] bytes long.
    /// Longer sequences trip a debug assertion and get a wrapped length
    /// prefix in release builds; [`Self::try_write_bytes`] rejects them.
    ///
    /// # Panics
    ///
    /// Panics when the prefix and the bytes do not fit into the
    /// remaining capacity.
    pub fn write_bytes(&mut self, value: &[u8]) {
        debug_assert!(value.len() <= i32::MAX as usize);
        self.write_i32(value.len() as i32);

        if self.pos & 7 == 0 {
            // Aligned bytes can be copied over wholesale.
            let start = self.pos >> 3;
            self.inner[start..start + value.len()].copy_from_slice(value);
            self.pos += value.len() << 3;
        } else {
            for &byte in value {
                self.write_bits(byte, u8::BITS);
            }
        }
    }

    /// Reads a byte sequence prefixed by its length as an [`i32`].
    ///
    /// # Panics
    ///
    /// Panics when the length prefix is negative or covers more
    /// bytes than the buffer holds.
    pub fn read_bytes(&mut self) -> Vec<u8> {
        let len = self.read_i32();
        assert!(len >= 0, "negative length prefix: {len}");
        self.read_raw_bytes(len as usize)
    }

    pub(crate) fn read_raw_bytes(&mut self, len: usize) -> Vec<u8> {
        if self.pos & 7 == 0 {
            let start = self.pos >> 3;
            let out = self.inner[start..start + len].to_vec();
            self.pos += len << 3;
            out
        } else {
            // Grow on demand so a bogus length fails on the first
            // out-of-range byte instead of a huge allocation.
            let mut out = Vec::new();
            for _ in 0..len {
                out.push(self.read_bits(u8::BITS));
            }
            out
        }
    }

    /// Writes a string as length-prefixed UTF-8 bytes.
    #[inline]
    pub fn write_str(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    /// Reads a length-prefixed string.
    ///
    /// Invalid UTF-8 sequences are replaced with
    /// [`U+FFFD`](char::REPLACEMENT_CHARACTER).
    ///
    /// # Panics
    ///
    /// Panics under the same conditions as [`Self::read_bytes`].
    pub fn read_string(&mut self) -> String {
        String::from_utf8(self.read_bytes())
            .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
    }
}

impl From<Vec<u8>> for BitBuffer {
    fn from(vec: Vec<u8>) -> Self {
        Self::from_vec(vec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks() {
        assert_eq!(low_mask(0), 0);
        assert_eq!(low_mask(3), 0b111);
        assert_eq!(low_mask(8), 0xFF);
    }

    #[test]
    fn write_bits_within_byte() {
        let mut buf = BitBuffer::new(1);

        buf.write_bits(0b101, 3);
        buf.write_bits(0b11, 2);
        assert_eq!(buf.pos(), 5);
        assert_eq!(buf.view(), &[0b11_101]);
    }

    #[test]
    fn write_bits_ignores_excess_value_bits() {
        let mut buf = BitBuffer::new(2);

        buf.set_pos(2);
        buf.write_bits(0xFF, 3);
        assert_eq!(buf.view(), &[0b0001_1100, 0]);

        buf.set_pos(6);
        buf.write_bits(0xFF, 4);
        assert_eq!(buf.view(), &[0b1101_1100, 0b0000_0011]);
    }

    #[test]
    fn write_bits_straddling_preserves_neighbours() {
        let mut buf = BitBuffer::from_vec(vec![0xFF, 0xFF]);

        buf.set_pos(5);
        buf.write_bits(0, 6);
        assert_eq!(buf.pos(), 11);
        assert_eq!(buf.view(), &[0b0001_1111, 0b1111_1000]);

        buf.set_pos(5);
        buf.write_bits(0b10_1101, 6);
        assert_eq!(buf.view(), &[0b1011_1111, 0b1111_1101]);
    }

    #[test]
    fn read_bits_paths() {
        let mut buf = BitBuffer::from_vec(vec![0b1011_0110, 0b0000_0101]);

        assert_eq!(buf.read_bits(0), 0);
        assert_eq!(buf.pos(), 0);

        assert_eq!(buf.read_bits(8), 0b1011_0110);
        buf.set_pos(1);
        assert_eq!(buf.read_bits(3), 0b011);
        buf.set_pos(6);
        assert_eq!(buf.read_bits(5), 0b1_0110);
        assert_eq!(buf.pos(), 11);
    }

    #[test]
    fn sign_extension() {
        assert_eq!(sign_extend_16(0x400, 11), -1024);
        assert_eq!(sign_extend_16(0x3FF, 11), 1023);
        assert_eq!(sign_extend_32(0xFF_FFFF, 24), -1);
        assert_eq!(sign_extend_64(1, 1), -1);
        assert_eq!(sign_extend_64(0, 0), 0);
        assert_eq!(sign_extend_16(0x8000, 16), i16::MIN);
    }
}
