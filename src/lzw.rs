//! LZW with usage-based pruning
//!
//! Unlike classic LZW, which freezes or clears a full dictionary, this codec
//! can periodically evict entries that have not earned their keep.  The
//! encoder announces each code-width increase and each prune inline with the
//! reserved codes 1 and 0, so the decoder replays the same dictionary
//! transitions with no side channel.  A dictionary snapshot may also be
//! exchanged between independent runs to prime the table before the first
//! byte of data; the snapshot's file name travels in the stream header so
//! the decoder can prime itself from the same file.
//!
//! The wire format is self-describing and custom to this crate: a text
//! header line `max_bits:prune:name_len:name`, then variable-width codes
//! packed MSB-first starting at 9 bits, terminated by flush padding.

use std::io::{Cursor,Read,Write,BufReader,BufWriter,ErrorKind};
use std::fs::File;
use crate::bits::{BitReader,BitWriter,MAX_MAX_BITS};
use crate::dictionary::{Dictionary,FIRST_FREE_CODE,INITIAL_BITS,PRUNE_SIGNAL,WIDEN_SIGNAL};
use crate::DYNERR;

/// Options controlling compression
#[derive(Clone)]
pub struct Options {
    /// cap on the code width, 9 through 20; codes start at 9 bits and grow toward this
    pub max_code_bits: usize,
    /// evict entries used fewer than this many times when the table fills, 0 disables pruning
    pub prune_threshold: usize,
    /// snapshot that primes the dictionary; the name is recorded in the
    /// header so the decoder can open the same file
    pub seed_in: Option<String>,
    /// where to write the final dictionary snapshot, if anywhere
    pub snapshot_out: Option<String>
}

pub const STD_OPTIONS: Options = Options {
    max_code_bits: 12,
    prune_threshold: 0,
    seed_in: None,
    snapshot_out: None
};

/// header fields recovered by the decoder
struct Header {
    max_bits: usize,
    prune_threshold: usize,
    seed_name: Option<String>,
    len: u64
}

/// read decimal digits up to the next ':'
fn read_field<R: Read>(reader: &mut R,len: &mut u64) -> Result<i64,DYNERR> {
    let mut digits = String::new();
    let mut by: [u8;1] = [0];
    loop {
        match reader.read_exact(&mut by) {
            Ok(()) => {},
            Err(e) if e.kind()==ErrorKind::UnexpectedEof => {
                return Err(Box::new(crate::Error::StreamCorrupt));
            },
            Err(e) => return Err(Box::new(e))
        }
        *len += 1;
        if by[0] == b':' {
            break;
        }
        if digits.len() >= 19 {
            return Err(Box::new(crate::Error::StreamCorrupt));
        }
        digits.push(by[0] as char);
    }
    match digits.parse::<i64>() {
        Ok(val) => Ok(val),
        Err(_) => Err(Box::new(crate::Error::StreamCorrupt))
    }
}

fn read_header<R: Read>(reader: &mut R) -> Result<Header,DYNERR> {
    let mut len: u64 = 0;
    let max_bits = read_field(reader,&mut len)?;
    let prune_threshold = read_field(reader,&mut len)?;
    let name_len = read_field(reader,&mut len)?;
    if max_bits <= 8 || max_bits > MAX_MAX_BITS as i64 || prune_threshold < 0 || name_len < 0 {
        log::error!("header fields out of range");
        return Err(Box::new(crate::Error::StreamCorrupt));
    }
    let mut name_buf = vec![0;name_len as usize];
    let mut newline: [u8;1] = [0];
    match reader.read_exact(&mut name_buf).and_then(|_| reader.read_exact(&mut newline)) {
        Ok(()) => {},
        Err(e) if e.kind()==ErrorKind::UnexpectedEof => {
            return Err(Box::new(crate::Error::StreamCorrupt));
        },
        Err(e) => return Err(Box::new(e))
    }
    len += name_len as u64 + 1;
    if newline[0] != b'\n' {
        return Err(Box::new(crate::Error::StreamCorrupt));
    }
    let seed_name = match name_len {
        0 => None,
        _ => match String::from_utf8(name_buf) {
            Ok(s) => Some(s),
            Err(_) => return Err(Box::new(crate::Error::StreamCorrupt))
        }
    };
    Ok(Header {
        max_bits: max_bits as usize,
        prune_threshold: prune_threshold as usize,
        seed_name,
        len
    })
}

/// Main compression function.
/// `expanded_in` is any `Read` object, usually `std::fs::File` or `std::io::Cursor<&[u8]>`.
/// `compressed_out` is any `Write` object.
/// Returns (in_size,out_size) or error.
pub fn compress<R,W>(expanded_in: &mut R,compressed_out: &mut W,opt: &Options) -> Result<(u64,u64),DYNERR>
where R: Read, W: Write {
    if opt.max_code_bits <= 8 || opt.max_code_bits > 20 {
        return Err(Box::new(crate::Error::InvalidConfig));
    }
    let mut reader = BufReader::new(expanded_in);
    let mut writer = BufWriter::new(compressed_out);
    let mut coder = BitWriter::new();
    let mut dict = Dictionary::create(opt.max_code_bits);
    let mut num_bits = INITIAL_BITS;

    if let Some(name) = &opt.seed_in {
        let mut seed = File::open(name)?;
        num_bits += dict.load_seed(&mut seed)?;
        log::debug!("seeded dictionary with {} entries, width {}",dict.next_code()-FIRST_FREE_CODE,num_bits);
    }
    let seed_name = opt.seed_in.as_deref().unwrap_or("");
    let header = format!("{}:{}:{}:{}\n",opt.max_code_bits,opt.prune_threshold,seed_name.len(),seed_name);
    writer.write_all(header.as_bytes())?;

    let mut current: Option<usize> = None;
    let mut in_size: u64 = 0;
    let mut byte_in: [u8;1] = [0];
    log::debug!("entering byte loop");
    loop {
        match reader.read_exact(&mut byte_in) {
            Ok(()) => {},
            Err(e) if e.kind()==ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(Box::new(e))
        }
        in_size += 1;
        let k = byte_in[0];
        match dict.lookup(current,k) {
            Some(code) => {
                // still inside a known string, credit it and keep matching
                dict.bump(code);
                current = Some(code);
            },
            None => {
                if let Some(code) = current {
                    log::trace!("code: {}",code);
                    coder.put_code(num_bits,code,&mut writer)?;
                    let ins = dict.insert(Some(code),k);
                    if ins.widened {
                        // the signal goes out at the old width, then we grow
                        coder.put_code(num_bits,WIDEN_SIGNAL,&mut writer)?;
                        num_bits += 1;
                    }
                    if dict.is_full() && opt.prune_threshold > 0 {
                        coder.put_code(num_bits,PRUNE_SIGNAL,&mut writer)?;
                        let (fresh,new_bits) = dict.prune(opt.prune_threshold)?;
                        dict = fresh;
                        num_bits = new_bits;
                    }
                }
                // restart the match at the root for this byte, which always exists
                current = dict.lookup(None,k);
            }
        }
    }
    if let Some(code) = current {
        coder.put_code(num_bits,code,&mut writer)?;
    }
    coder.flush(&mut writer)?;
    writer.flush()?;
    if let Some(name) = &opt.snapshot_out {
        let mut snap = File::create(name)?;
        dict.write_snapshot(&mut snap)?;
        log::debug!("wrote snapshot of {} entries",dict.next_code()-FIRST_FREE_CODE);
    }
    Ok((in_size,header.len() as u64 + coder.bytes_written()))
}

/// Main decompression function.
/// `compressed_in` is any `Read` object, `expanded_out` any `Write` object.
/// Configuration comes from the stream header; if the header names a seed
/// dictionary that file is opened to prime the table.  `snapshot_out`
/// optionally receives the final dictionary snapshot.
/// Returns (in_size,out_size) or error.
pub fn expand<R,W>(compressed_in: &mut R,expanded_out: &mut W,snapshot_out: Option<&str>) -> Result<(u64,u64),DYNERR>
where R: Read, W: Write {
    let mut reader = BufReader::new(compressed_in);
    let mut writer = BufWriter::new(expanded_out);
    let header = read_header(&mut reader)?;
    let mut dict = Dictionary::create(header.max_bits);
    let mut num_bits = INITIAL_BITS;
    if let Some(name) = &header.seed_name {
        let mut seed = File::open(name)?;
        num_bits += dict.load_seed(&mut seed)?;
        log::debug!("seeded dictionary with {} entries, width {}",dict.next_code()-FIRST_FREE_CODE,num_bits);
    }
    let mut decoder = BitReader::new();
    let mut previous: Option<usize> = None;
    let mut scratch: Vec<u8> = Vec::new();
    let mut out_size: u64 = 0;

    log::debug!("entering code loop");
    while let Some(code) = decoder.get_code(num_bits,&mut reader)? {
        if code == PRUNE_SIGNAL {
            // the last expanded string has not been credited yet; do it now
            // so the usage counts match the encoder's when survivors are chosen
            if let Some(prev) = previous {
                dict.bump_chain(prev);
            }
            let (fresh,new_bits) = dict.prune(header.prune_threshold)?;
            dict = fresh;
            num_bits = new_bits;
            previous = None;
            continue;
        }
        if code == WIDEN_SIGNAL {
            if num_bits >= MAX_MAX_BITS {
                return Err(Box::new(crate::Error::StreamCorrupt));
            }
            num_bits += 1;
            continue;
        }
        if code > dict.next_code()
            || (code == dict.next_code() && (previous.is_none() || dict.is_full())) {
            log::error!("illegal code {} with {} defined",code,dict.next_code());
            return Err(Box::new(crate::Error::StreamCorrupt));
        }
        if let Some(prev) = previous {
            if !dict.is_full() {
                // KwKwK: the code on the wire can be the very entry being
                // defined, in which case its first byte comes from the
                // previous string
                let first = match code == dict.next_code() {
                    true => dict.first_byte(prev)?,
                    false => dict.first_byte(code)?
                };
                dict.insert(Some(prev),first);
            }
            dict.bump_chain(prev);
        }
        dict.expand(code,&mut scratch)?;
        log::trace!("  write {} as {:?}",code,scratch);
        writer.write_all(&scratch)?;
        out_size += scratch.len() as u64;
        previous = Some(code);
    }
    writer.flush()?;
    if let Some(name) = snapshot_out {
        let mut snap = File::create(name)?;
        dict.write_snapshot(&mut snap)?;
        log::debug!("wrote snapshot of {} entries",dict.next_code()-FIRST_FREE_CODE);
    }
    Ok((header.len + decoder.bytes_read(),out_size))
}

/// Convenience function, calls `compress` with a slice returning a Vec
pub fn compress_slice(slice: &[u8],opt: &Options) -> Result<Vec<u8>,DYNERR> {
    let mut src = Cursor::new(slice);
    let mut ans: Cursor<Vec<u8>> = Cursor::new(Vec::new());
    compress(&mut src,&mut ans,opt)?;
    Ok(ans.into_inner())
}

/// Convenience function, calls `expand` with a slice returning a Vec
pub fn expand_slice(slice: &[u8]) -> Result<Vec<u8>,DYNERR> {
    let mut src = Cursor::new(slice);
    let mut ans: Cursor<Vec<u8>> = Cursor::new(Vec::new());
    expand(&mut src,&mut ans,None)?;
    Ok(ans.into_inner())
}

// *************** TESTS *****************
