//! Core data model types for messages, MIME parts, addresses and attachments.

pub mod address;
pub mod attachment;
pub mod ignore;
pub mod mail;
