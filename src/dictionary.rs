//! LZW dictionary with usage counts
//!
//! The coder needs the same set of entries two ways: by content while
//! encoding, by code while decoding and while writing snapshots.  A single
//! `Vec` indexed by code owns every entry, and a `HashMap` from
//! `(prefix, byte)` to code is layered on top, so the two views cannot
//! drift apart.  Codes 0 and 1 are reserved for the inline control signals
//! and are never assigned to an entry; the 256 single-byte roots occupy
//! codes 2 through 257 and every learned string comes after.
//!
//! Each entry carries a usage count which the pruning rebuild consults to
//! decide who survives.  An entry is credited once each time it appears on
//! the prefix chain of an emitted code; the encoder does this through its
//! lookups, the decoder through [`Dictionary::bump_chain`].  Root counts
//! may differ between the two sides (the encoder never credits the root
//! that restarts a match) but that is harmless because roots always
//! survive a prune.

use std::collections::HashMap;
use std::io::{Read,Write,ErrorKind};
use crate::DYNERR;

/// reserved code telling the decoder to prune its dictionary
pub const PRUNE_SIGNAL: usize = 0;
/// reserved code telling the decoder the code width grew by one bit
pub const WIDEN_SIGNAL: usize = 1;
/// lowest code that names an entry, after the two reserved signals
pub const CODE_BASE: usize = 2;
/// lowest code not occupied by a single-byte root
pub const FIRST_FREE_CODE: usize = CODE_BASE + 256;
/// code width at the start of every run
pub const INITIAL_BITS: usize = 9;

/// One dictionary string, `(string for prefix) + byte`.
/// `prefix == None` marks a single-byte root.
#[derive(Clone)]
pub struct Entry {
    pub prefix: Option<usize>,
    pub byte: u8,
    pub usage: usize
}

/// outcome of an insertion attempt
pub struct Insertion {
    /// false when the dictionary was already full, a normal condition
    pub created: bool,
    /// the code space crossed a power of two, codes now need one more bit
    pub widened: bool
}

pub struct Dictionary {
    max_bits: usize,
    /// entries[i] holds the entry for code i + CODE_BASE
    entries: Vec<Entry>,
    /// content index over the same entries
    index: HashMap<(Option<usize>,u8),usize>,
    /// power-of-two occupancy threshold, doubles as the code space grows
    capacity: usize
}

impl Dictionary {
    /// Create a dictionary holding only the 256 roots, sized for 9-bit codes.
    pub fn create(max_bits: usize) -> Self {
        let mut dict = Self {
            max_bits,
            entries: Vec::new(),
            index: HashMap::new(),
            capacity: 1 << INITIAL_BITS
        };
        for i in 0..256 {
            dict.insert(None,i as u8);
        }
        dict
    }
    /// next code to be assigned, equals the count of codes in use
    /// (the two reserved signals included)
    pub fn next_code(&self) -> usize {
        self.entries.len() + CODE_BASE
    }
    pub fn is_full(&self) -> bool {
        self.next_code() >= 1 << self.max_bits
    }
    pub fn get(&self,code: usize) -> Option<&Entry> {
        if code < CODE_BASE {
            return None;
        }
        self.entries.get(code - CODE_BASE)
    }
    /// exact-match content lookup
    pub fn lookup(&self,prefix: Option<usize>,byte: u8) -> Option<usize> {
        self.index.get(&(prefix,byte)).copied()
    }
    /// credit one use to the entry for `code`
    pub fn bump(&mut self,code: usize) {
        if code >= CODE_BASE {
            if let Some(e) = self.entries.get_mut(code - CODE_BASE) {
                e.usage += 1;
            }
        }
    }
    /// Credit one use to every entry on the prefix chain of `code`.
    /// The decoder calls this once per received code for the previous code,
    /// matching the per-extension credits the encoder hands out as it builds
    /// the same match.
    pub fn bump_chain(&mut self,code: usize) {
        let mut cur = Some(code);
        while let Some(c) = cur {
            cur = match self.get(c) {
                Some(e) => e.prefix,
                None => break
            };
            self.bump(c);
        }
    }
    /// Assign the next dense code to `(prefix, byte)`.  Fails silently when
    /// the dictionary already holds `2^max_bits` codes; callers must check
    /// `created` before relying on the new code.
    pub fn insert(&mut self,prefix: Option<usize>,byte: u8) -> Insertion {
        if self.is_full() {
            return Insertion { created: false, widened: false };
        }
        let mut widened = false;
        if self.next_code() >= self.capacity {
            self.capacity *= 2;
            widened = true;
        }
        let code = self.next_code();
        self.index.insert((prefix,byte),code);
        self.entries.push(Entry { prefix, byte, usage: 0 });
        log::trace!("add {} linking to {:?}.{}",code,prefix,byte);
        Insertion { created: true, widened }
    }
    /// first byte of the string named by `code`
    pub fn first_byte(&self,code: usize) -> Result<u8,DYNERR> {
        let mut c = code;
        loop {
            match self.get(c) {
                Some(e) => match e.prefix {
                    Some(p) => c = p,
                    None => return Ok(e.byte)
                },
                None => return Err(Box::new(crate::Error::StreamCorrupt))
            }
        }
    }
    /// Expand `code` into its byte string, root first.  The chain is walked
    /// leaf to root into `out`, then reversed; no recursion, the scratch
    /// buffer is the caller's to reuse.
    pub fn expand(&self,code: usize,out: &mut Vec<u8>) -> Result<(),DYNERR> {
        out.clear();
        let mut cur = Some(code);
        while let Some(c) = cur {
            match self.get(c) {
                Some(e) => {
                    out.push(e.byte);
                    cur = e.prefix;
                },
                None => return Err(Box::new(crate::Error::StreamCorrupt))
            }
        }
        out.reverse();
        Ok(())
    }
    /// Rebuild keeping the roots plus every entry used at least `threshold`
    /// times.  Survivors are renumbered densely in ascending old-code order,
    /// prefixes remapped as we go; this is sound because a prefix always
    /// carries a smaller code than its dependents, so a surviving dependent
    /// whose prefix has not been remapped means the bookkeeping broke and we
    /// abort.  Usage counts reset on the new entries.  Returns the rebuilt
    /// dictionary and the minimum width able to address it, already one more
    /// bit if the new code space exactly fills its power-of-two capacity.
    pub fn prune(&self,threshold: usize) -> Result<(Dictionary,usize),DYNERR> {
        let mut fresh = Dictionary::create(self.max_bits);
        let mut width = INITIAL_BITS;
        let mut new_codes: Vec<Option<usize>> = vec![None;self.next_code()];
        for code in CODE_BASE..FIRST_FREE_CODE {
            new_codes[code] = Some(code);
        }
        for code in FIRST_FREE_CODE..self.next_code() {
            let e = &self.entries[code - CODE_BASE];
            if e.usage >= threshold {
                let prefix = match e.prefix.and_then(|p| new_codes[p]) {
                    Some(p) => p,
                    None => {
                        log::error!("surviving code {} depends on an evicted prefix",code);
                        return Err(Box::new(crate::Error::DictionaryCorrupt));
                    }
                };
                new_codes[code] = Some(fresh.next_code());
                let ins = fresh.insert(Some(prefix),e.byte);
                if ins.widened {
                    width += 1;
                }
            }
        }
        if fresh.next_code() == fresh.capacity {
            width += 1;
        }
        log::debug!("pruned {} codes down to {}, width {}",self.next_code(),fresh.next_code(),width);
        Ok((fresh,width))
    }
    /// Write the learned entries (codes 258 and up) as snapshot records:
    /// `':'`, the prefix as a 24-bit big-endian integer, the trailing byte.
    pub fn write_snapshot<W: Write>(&self,writer: &mut W) -> Result<(),DYNERR> {
        for code in FIRST_FREE_CODE..self.next_code() {
            let e = &self.entries[code - CODE_BASE];
            let prefix = e.prefix.unwrap_or(0) as u32;
            writer.write_all(&[b':'])?;
            writer.write_all(&prefix.to_be_bytes()[1..4])?;
            writer.write_all(&[e.byte])?;
        }
        Ok(())
    }
    /// Prime the dictionary from a snapshot produced by an earlier run.
    /// Records must arrive in ascending code order, so a prefix that is
    /// reserved or not yet defined marks the snapshot corrupt.  Returns how
    /// many width increases the new entries forced; encoder and decoder both
    /// replay these without any signal codes on the wire.
    pub fn load_seed<R: Read>(&mut self,reader: &mut R) -> Result<usize,DYNERR> {
        let mut widenings = 0;
        let mut tag: [u8;1] = [0];
        loop {
            match reader.read_exact(&mut tag) {
                Ok(()) => {},
                Err(e) if e.kind()==ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(Box::new(e))
            }
            if tag[0] != b':' {
                return Err(Box::new(crate::Error::SeedCorrupt));
            }
            let mut rec: [u8;4] = [0;4];
            match reader.read_exact(&mut rec) {
                Ok(()) => {},
                Err(e) if e.kind()==ErrorKind::UnexpectedEof => {
                    return Err(Box::new(crate::Error::SeedCorrupt));
                },
                Err(e) => return Err(Box::new(e))
            }
            let prefix = u32::from_be_bytes([0,rec[0],rec[1],rec[2]]) as usize;
            if prefix < CODE_BASE || prefix >= self.next_code() {
                log::error!("seed record names undefined prefix {}",prefix);
                return Err(Box::new(crate::Error::SeedCorrupt));
            }
            let ins = self.insert(Some(prefix),rec[3]);
            if ins.widened {
                widenings += 1;
            }
        }
        Ok(widenings)
    }
}

// *************** TESTS *****************

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roots_are_seeded() {
        let dict = Dictionary::create(12);
        assert_eq!(dict.next_code(),FIRST_FREE_CODE);
        assert_eq!(dict.lookup(None,b'a'),Some(CODE_BASE + b'a' as usize));
        assert_eq!(dict.lookup(Some(99),b'a'),None);
        assert!(dict.get(0).is_none());
        assert!(dict.get(1).is_none());
    }

    #[test]
    fn codes_are_dense() {
        let mut dict = Dictionary::create(12);
        let a = dict.lookup(None,b'a').unwrap();
        let ins = dict.insert(Some(a),b'b');
        assert!(ins.created && !ins.widened);
        let ins = dict.insert(Some(FIRST_FREE_CODE),b'c');
        assert!(ins.created);
        assert_eq!(dict.lookup(Some(a),b'b'),Some(FIRST_FREE_CODE));
        assert_eq!(dict.lookup(Some(FIRST_FREE_CODE),b'c'),Some(FIRST_FREE_CODE+1));
        assert_eq!(dict.next_code(),FIRST_FREE_CODE+2);
    }

    #[test]
    fn widens_at_power_of_two() {
        let mut dict = Dictionary::create(12);
        let mut prev = dict.lookup(None,0).unwrap();
        // codes 258..511 fit in 9 bits, code 512 forces the tenth
        while dict.next_code() < 512 {
            let ins = dict.insert(Some(prev),b'x');
            assert!(ins.created && !ins.widened);
            prev = dict.next_code() - 1;
        }
        let ins = dict.insert(Some(prev),b'y');
        assert!(ins.created && ins.widened);
    }

    #[test]
    fn full_insert_fails_silently() {
        let mut dict = Dictionary::create(9);
        let mut prev = dict.lookup(None,0).unwrap();
        while !dict.is_full() {
            assert!(dict.insert(Some(prev),b'x').created);
            prev = dict.next_code() - 1;
        }
        assert_eq!(dict.next_code(),512);
        let ins = dict.insert(Some(prev),b'z');
        assert!(!ins.created && !ins.widened);
        assert_eq!(dict.next_code(),512);
    }

    #[test]
    fn expansion_walks_to_root() {
        let mut dict = Dictionary::create(12);
        let a = dict.lookup(None,b'a').unwrap();
        dict.insert(Some(a),b'b');
        dict.insert(Some(FIRST_FREE_CODE),b'c');
        let mut scratch = Vec::new();
        dict.expand(FIRST_FREE_CODE+1,&mut scratch).expect("expand failed");
        assert_eq!(scratch,b"abc".to_vec());
        assert_eq!(dict.first_byte(FIRST_FREE_CODE+1).unwrap(),b'a');
        assert_eq!(dict.first_byte(a).unwrap(),b'a');
    }

    #[test]
    fn prune_keeps_used_entries() {
        let mut dict = Dictionary::create(12);
        let a = dict.lookup(None,b'a').unwrap();
        dict.insert(Some(a),b'b');            // 258
        dict.insert(Some(FIRST_FREE_CODE),b'c'); // 259
        dict.insert(Some(a),b'd');            // 260
        dict.bump(258);
        dict.bump(258);
        dict.bump(259);
        dict.bump(259);
        let (fresh,width) = dict.prune(2).expect("prune failed");
        // both survivors remap onto 258/259, the unused 260 is gone
        assert_eq!(fresh.next_code(),FIRST_FREE_CODE+2);
        assert_eq!(width,INITIAL_BITS);
        assert_eq!(fresh.lookup(Some(a),b'b'),Some(258));
        assert_eq!(fresh.lookup(Some(258),b'c'),Some(259));
        assert_eq!(fresh.lookup(Some(a),b'd'),None);
        // usage resets on the survivors
        assert_eq!(fresh.get(258).unwrap().usage,0);
        // prefix validity: every survivor's prefix is a root or a smaller survivor
        for code in FIRST_FREE_CODE..fresh.next_code() {
            let p = fresh.get(code).unwrap().prefix.unwrap();
            assert!(p >= CODE_BASE && p < code);
        }
    }

    #[test]
    fn prune_rejects_orphaned_dependent() {
        let mut dict = Dictionary::create(12);
        let a = dict.lookup(None,b'a').unwrap();
        dict.insert(Some(a),b'b');            // 258, stays at usage 0
        dict.insert(Some(FIRST_FREE_CODE),b'c'); // 259, depends on 258
        dict.bump(259);
        dict.bump(259);
        assert!(dict.prune(1).is_err());
    }

    #[test]
    fn prune_width_accounts_for_exact_fill() {
        let mut dict = Dictionary::create(12);
        let mut prev = dict.lookup(None,0).unwrap();
        // grow to 600 codes and mark every entry a survivor
        while dict.next_code() < 600 {
            dict.insert(Some(prev),b'x');
            prev = dict.next_code() - 1;
            dict.bump(prev);
        }
        let (fresh,width) = dict.prune(1).expect("prune failed");
        assert_eq!(fresh.next_code(),600);
        assert_eq!(width,10);
        // exactly 512 survivors would already need a tenth bit for the next code
        let mut dict = Dictionary::create(12);
        let mut prev = dict.lookup(None,0).unwrap();
        while dict.next_code() < 512 {
            dict.insert(Some(prev),b'x');
            prev = dict.next_code() - 1;
            dict.bump(prev);
        }
        let (fresh,width) = dict.prune(1).expect("prune failed");
        assert_eq!(fresh.next_code(),512);
        assert_eq!(width,10);
    }

    #[test]
    fn snapshot_roundtrip() {
        let mut dict = Dictionary::create(12);
        let a = dict.lookup(None,b'a').unwrap();
        dict.insert(Some(a),b'b');
        dict.insert(Some(FIRST_FREE_CODE),b'c');
        let mut snap: Vec<u8> = Vec::new();
        dict.write_snapshot(&mut snap).expect("snapshot failed");
        assert_eq!(snap.len(),2*5);
        assert_eq!(snap[0],b':');
        let mut seeded = Dictionary::create(12);
        let widenings = seeded.load_seed(&mut snap.as_slice()).expect("seed failed");
        assert_eq!(widenings,0);
        assert_eq!(seeded.next_code(),dict.next_code());
        assert_eq!(seeded.lookup(Some(a),b'b'),Some(FIRST_FREE_CODE));
        assert_eq!(seeded.lookup(Some(FIRST_FREE_CODE),b'c'),Some(FIRST_FREE_CODE+1));
    }

    #[test]
    fn seed_rejects_unknown_prefix() {
        // a record naming code 300 before it exists
        let mut rec: Vec<u8> = vec![b':'];
        rec.extend(&(300u32).to_be_bytes()[1..4]);
        rec.push(b'x');
        let mut dict = Dictionary::create(12);
        assert!(dict.load_seed(&mut rec.as_slice()).is_err());
        // reserved prefixes are just as illegal
        let mut rec: Vec<u8> = vec![b':'];
        rec.extend(&(1u32).to_be_bytes()[1..4]);
        rec.push(b'x');
        let mut dict = Dictionary::create(12);
        assert!(dict.load_seed(&mut rec.as_slice()).is_err());
    }

    #[test]
    fn seed_rejects_bad_tag() {
        let mut dict = Dictionary::create(12);
        assert!(dict.load_seed(&mut b";abcd".as_slice()).is_err());
        // truncated record
        assert!(dict.load_seed(&mut b":ab".as_slice()).is_err());
    }
}
