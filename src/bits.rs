//! Packed bit I/O
//!
//! Codes are packed MSB-first with no padding between them.  Each channel
//! owns its partial-byte residue, so any number of streams can be open at
//! once.  We rely on the `bit_vec` crate for the residue buffer; since it
//! only packs MSB-first this is a natural fit.
//!
//! The writer only ever hands whole bytes to the underlying stream, so no
//! `Seek` bound is needed; `flush` pads the final partial byte with zero
//! low-order bits.  The reader reports end of stream once the input is
//! exhausted and the residue is shorter than the requested width, which can
//! never be mistaken for a code because codes are at least 9 bits wide and
//! flush padding is at most 7.

use bit_vec::BitVec;
use std::io::{Read,Write,ErrorKind};
use crate::DYNERR;

/// widest code any caller may request, also the width of seed snapshot prefixes
pub const MAX_MAX_BITS: usize = 24;

pub struct BitWriter {
    bits: BitVec,
    written: u64
}

pub struct BitReader {
    bits: BitVec,
    ptr: usize,
    read: u64
}

impl BitWriter {
    pub fn new() -> Self {
        Self {
            bits: BitVec::new(),
            written: 0
        }
    }
    /// Append the low `num_bits` of `code` to the stream, most significant
    /// bit first, emitting any whole bytes that have accumulated.
    pub fn put_code<W: Write>(&mut self,num_bits: usize,code: usize,writer: &mut W) -> Result<(),DYNERR> {
        if num_bits == 0 || num_bits > MAX_MAX_BITS {
            log::error!("requested code width {}",num_bits);
            return Err(Box::new(crate::Error::InvalidConfig));
        }
        for i in (0..num_bits).rev() {
            self.bits.push(code >> i & 1 == 1);
        }
        self.drain_whole_bytes(writer)
    }
    /// `to_bytes` zero-fills the tail, so only hand it complete bytes and
    /// carry the remainder forward
    fn drain_whole_bytes<W: Write>(&mut self,writer: &mut W) -> Result<(),DYNERR> {
        let whole = self.bits.len() / 8;
        if whole == 0 {
            return Ok(());
        }
        let bytes = self.bits.to_bytes();
        writer.write_all(&bytes[0..whole])?;
        self.written += whole as u64;
        let mut rem = BitVec::new();
        for i in whole*8..self.bits.len() {
            rem.push(self.bits.get(i).unwrap());
        }
        self.bits = rem;
        Ok(())
    }
    /// Pad the residue to a byte boundary with zero bits and emit it.
    /// Call exactly once at the end of a run; the channel must not be
    /// written again afterwards.
    pub fn flush<W: Write>(&mut self,writer: &mut W) -> Result<(),DYNERR> {
        if !self.bits.is_empty() {
            writer.write_all(&self.bits.to_bytes())?;
            self.written += 1;
            self.bits = BitVec::new();
        }
        Ok(())
    }
    pub fn bytes_written(&self) -> u64 {
        self.written
    }
}

impl BitReader {
    pub fn new() -> Self {
        Self {
            bits: BitVec::new(),
            ptr: 0,
            read: 0
        }
    }
    /// keep the bit vector small, we don't need the bits behind us
    fn drop_leading_bits(&mut self) {
        let cpy = self.bits.clone();
        self.bits = BitVec::new();
        for i in self.ptr..cpy.len() {
            self.bits.push(cpy.get(i).unwrap());
        }
        self.ptr = 0;
    }
    /// Get the next code, pulling bytes from `reader` as needed.
    /// Returns `None` once the input is exhausted and fewer than `num_bits`
    /// bits remain buffered.
    pub fn get_code<R: Read>(&mut self,num_bits: usize,reader: &mut R) -> Result<Option<usize>,DYNERR> {
        if num_bits == 0 || num_bits > MAX_MAX_BITS {
            log::error!("requested code width {}",num_bits);
            return Err(Box::new(crate::Error::InvalidConfig));
        }
        while self.bits.len() - self.ptr < num_bits {
            let mut by: [u8;1] = [0];
            match reader.read_exact(&mut by) {
                Ok(()) => {
                    if self.bits.len() > 512 {
                        self.drop_leading_bits();
                    }
                    self.bits.append(&mut BitVec::from_bytes(&by));
                    self.read += 1;
                },
                Err(e) if e.kind()==ErrorKind::UnexpectedEof => return Ok(None),
                Err(e) => return Err(Box::new(e))
            }
        }
        let mut ans: usize = 0;
        for _i in 0..num_bits {
            ans <<= 1;
            ans |= self.bits.get(self.ptr).unwrap() as usize;
            self.ptr += 1;
        }
        Ok(Some(ans))
    }
    pub fn bytes_read(&self) -> u64 {
        self.read
    }
}

// *************** TESTS *****************

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn pack_msb_first() {
        let mut coder = BitWriter::new();
        let mut out: Vec<u8> = Vec::new();
        coder.put_code(9,99,&mut out).expect("write failed");
        coder.put_code(9,258,&mut out).expect("write failed");
        coder.flush(&mut out).expect("flush failed");
        // 001100011 100000010 + 6 pad bits
        assert_eq!(out,hex::decode("31c080").unwrap());
        assert_eq!(coder.bytes_written(),3);
    }

    #[test]
    fn flush_pads_low_zeros() {
        let mut coder = BitWriter::new();
        let mut out: Vec<u8> = Vec::new();
        coder.put_code(9,0x1ff,&mut out).expect("write failed");
        coder.flush(&mut out).expect("flush failed");
        assert_eq!(out,vec![0xff,0x80]);
    }

    #[test]
    fn unpack_across_byte_boundaries() {
        let mut src = Cursor::new(hex::decode("31c0a07020").unwrap());
        let mut decoder = BitReader::new();
        assert_eq!(decoder.get_code(9,&mut src).unwrap(),Some(99));
        assert_eq!(decoder.get_code(9,&mut src).unwrap(),Some(258));
        assert_eq!(decoder.get_code(9,&mut src).unwrap(),Some(259));
        assert_eq!(decoder.get_code(9,&mut src).unwrap(),Some(258));
        // only the 4 pad bits remain
        assert_eq!(decoder.get_code(9,&mut src).unwrap(),None);
        assert_eq!(decoder.bytes_read(),5);
    }

    #[test]
    fn variable_widths_roundtrip() {
        let widths = [9,10,11,12,13,20];
        let values = [511,1000,2000,4001,8100,1<<19];
        let mut coder = BitWriter::new();
        let mut out: Vec<u8> = Vec::new();
        for i in 0..widths.len() {
            coder.put_code(widths[i],values[i],&mut out).expect("write failed");
        }
        coder.flush(&mut out).expect("flush failed");
        let mut src = Cursor::new(out);
        let mut decoder = BitReader::new();
        for i in 0..widths.len() {
            assert_eq!(decoder.get_code(widths[i],&mut src).unwrap(),Some(values[i]));
        }
        assert_eq!(decoder.get_code(9,&mut src).unwrap(),None);
    }

    #[test]
    fn zero_width_rejected() {
        let mut coder = BitWriter::new();
        let mut out: Vec<u8> = Vec::new();
        assert!(coder.put_code(0,0,&mut out).is_err());
        assert!(coder.put_code(MAX_MAX_BITS+1,0,&mut out).is_err());
    }
}
