pub mod decoder_process;
pub mod http_json;
pub mod message;
pub mod replay_file;

pub use decoder_process::DecoderProcessSource;
pub use http_json::HttpReadingSource;
pub use message::{decode_line, TransportMessage};
pub use replay_file::ReplayFileSource;
