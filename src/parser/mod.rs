//! Mailbox input: streaming MBOX reader, header decoding and MIME tree conversion.

pub mod header;
pub mod mbox;
pub mod mime;
