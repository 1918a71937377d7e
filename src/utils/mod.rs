//! Shared identifier helpers

pub mod modality;

pub use modality::{DefaultModality, Modality, MODALITY_CONTENT, MODALITY_SEPARATOR};
