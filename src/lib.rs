//! This crate implements encoding and decoding functionality for several families of forward
//! error correction (FEC) codes: convolutional codes (Viterbi and BCJR/MAP decoding), turbo codes
//! built from parallel-concatenated convolutional constituents (iterative MAP decoding with serial
//! or parallel scheduling), and low-density parity-check (LDPC) codes (belief propagation
//! decoding). All codes share the [`Codec`] interface, which encodes and decodes any number of
//! blocks at once, processing independent blocks in parallel.
//!
//! The building blocks are available on their own as well: [`Trellis`] descriptions,
//! [`Permutation`] (interleavers and puncturing patterns), sparse and dense bit matrices over
//! GF(2), and a [`Modulation`] mapper/demapper producing bit LLR values.
//!
//! # Examples
//!
//! ```
//! use fecodec::{Bit, Codec, Convolutional, ConvolutionalOptions, Termination, Trellis};
//!
//! let trellis = Trellis::new(&[7], &[vec![0o171, 0o133]], &[])?;
//! let code = Convolutional::new(ConvolutionalOptions::new(trellis, 8).termination(Termination::Tail))?;
//! let msg = [Bit::One, Bit::Zero, Bit::One, Bit::One, Bit::Zero, Bit::Zero, Bit::One, Bit::Zero];
//! let parity = code.encode(&msg)?;
//! assert!(code.check(&parity)?);
//! let parity_llr: Vec<f64> = parity
//!     .iter()
//!     .map(|&b| if b == Bit::Zero { 4.0 } else { -4.0 })
//!     .collect();
//! assert_eq!(code.decode(&parity_llr)?, msg);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(
    clippy::complexity,
    clippy::pedantic,
    clippy::perf,
    clippy::style,
    clippy::suspicious,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_allocation,
    unused_import_braces,
    unused_qualifications
)]

pub mod archive;
pub mod bit_matrix;
pub mod codec;
mod common;
pub mod convolutional;
pub mod ldpc;
pub mod llr;
pub mod modulation;
pub mod permutation;
pub mod sim;
pub mod trellis;
pub mod turbo;
pub mod utils;

pub use archive::CodecArchive;
pub use bit_matrix::{BitMatrix, SparseBitMatrix};
pub use codec::{Codec, SoftCodec, SoftInput, SoftOutput};
pub use common::{Bit, Error};
pub use convolutional::{Convolutional, ConvolutionalOptions, Termination};
pub use ldpc::{Ldpc, LdpcOptions};
pub use llr::DecoderAlgorithm;
pub use modulation::Modulation;
pub use permutation::Permutation;
pub use trellis::Trellis;
pub use turbo::{Scheduling, Turbo, TurboOptions};
