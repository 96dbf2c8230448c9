pub mod bits;
pub mod dictionary;
pub mod lzw;

type DYNERR = Box<dyn std::error::Error>;

/// Errors that abort an encode or decode run
#[derive(thiserror::Error,Debug)]
pub enum Error {
    /// a width or threshold the codec cannot operate with
    #[error("invalid configuration")]
    InvalidConfig,
    /// malformed header or illegal code in the compressed stream
    #[error("stream corrupted")]
    StreamCorrupt,
    /// pruning found a kept entry whose prefix was evicted
    #[error("dictionary corrupted")]
    DictionaryCorrupt,
    /// seed dictionary snapshot does not follow the record format
    #[error("seed dictionary corrupted")]
    SeedCorrupt
}
