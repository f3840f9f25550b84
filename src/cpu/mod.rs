pub mod vec_ldst;

pub use vec_ldst::{AddrMode, FieldGroup, VecLdStElem, VecLdStInfo};
