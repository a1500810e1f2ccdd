//! Notebooklets for Microsoft Sentinel data.

pub mod host;
pub mod network;
