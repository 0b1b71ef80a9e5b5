//! WEM (Wwise Encoded Media) header inspection
//!
//! WEM files are RIFF containers produced by the Wwise encoder. Only the
//! `fmt ` and `data` chunk headers are read; audio content is never decoded.
//!
//! Size-matched artifacts carry zero padding after the RIFF payload, which
//! [`WemHeader::trailing_bytes`] reports.

mod header;

pub use header::{WemHeader, format_name, parse_wem_header, read_wem_header};
