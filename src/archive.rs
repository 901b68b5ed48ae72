//! Saving and loading codes of any family as JSON
//!
//! A [`CodecArchive`] wraps one code together with a `family` tag, so that a file can be loaded
//! without knowing in advance which kind of code it holds.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Codec, Convolutional, Error, Ldpc, SoftCodec, Turbo};

/// Code of any family supported by the crate
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(tag = "family")]
pub enum CodecArchive {
    /// Convolutional code
    Convolutional(Convolutional),
    /// Turbo code
    Turbo(Turbo),
    /// LDPC code
    Ldpc(Ldpc),
}

impl CodecArchive {
    /// Returns the wrapped code.
    #[must_use]
    pub fn codec(&self) -> &dyn Codec {
        match self {
            CodecArchive::Convolutional(code) => code,
            CodecArchive::Turbo(code) => code,
            CodecArchive::Ldpc(code) => code,
        }
    }

    /// Returns the wrapped code as a soft-in soft-out decoder.
    #[must_use]
    pub fn soft_codec(&self) -> &dyn SoftCodec {
        match self {
            CodecArchive::Convolutional(code) => code,
            CodecArchive::Turbo(code) => code,
            CodecArchive::Ldpc(code) => code,
        }
    }

    /// Returns name of the code family.
    #[must_use]
    pub fn family(&self) -> &str {
        match self {
            CodecArchive::Convolutional(_) => "Convolutional",
            CodecArchive::Turbo(_) => "Turbo",
            CodecArchive::Ldpc(_) => "Ldpc",
        }
    }

    /// Returns JSON representation.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Returns code from its JSON representation.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` does not describe a valid code.
    ///
    /// # Examples
    ///
    /// ```
    /// use fecodec::{Codec, CodecArchive};
    ///
    /// let json = r#"{
    ///     "family": "Convolutional",
    ///     "trellis": {"constraint_lengths": [3], "generators": [[7, 5]], "feedback": []},
    ///     "length": 10
    /// }"#;
    /// let archive = CodecArchive::from_json(json)?;
    /// assert_eq!(archive.family(), "Convolutional");
    /// assert_eq!(archive.codec().parity_size(), 24);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    /// Saves code to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Loads code from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not describe a valid code.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

impl From<Convolutional> for CodecArchive {
    fn from(code: Convolutional) -> Self {
        CodecArchive::Convolutional(code)
    }
}

impl From<Turbo> for CodecArchive {
    fn from(code: Turbo) -> Self {
        CodecArchive::Turbo(code)
    }
}

impl From<Ldpc> for CodecArchive {
    fn from(code: Ldpc) -> Self {
        CodecArchive::Ldpc(code)
    }
}

#[cfg(test)]
mod tests_of_codec_archive {
    use super::*;
    use crate::ldpc::gallager;
    use crate::{
        ConvolutionalOptions, LdpcOptions, Permutation, SparseBitMatrix, Trellis, TurboOptions,
    };

    fn all_archives() -> Vec<CodecArchive> {
        let conv = Convolutional::new(ConvolutionalOptions::new(
            Trellis::new(&[3], &[vec![0o7, 0o5]], &[]).unwrap(),
            16,
        ))
        .unwrap();
        let turbo = Turbo::new(TurboOptions::new(
            vec![Trellis::recursive_parity(&[0o13, 0o15]).unwrap()],
            vec![Permutation::default(), Permutation::qpp(40, 3, 10).unwrap()],
        ))
        .unwrap();
        let ldpc = Ldpc::new(LdpcOptions::new(gallager(24, 3, 6, 2).unwrap())).unwrap();
        vec![conv.into(), turbo.into(), ldpc.into()]
    }

    #[test]
    fn test_codec() {
        let archives = all_archives();
        assert_eq!(archives[0].family(), "Convolutional");
        assert_eq!(archives[0].codec().msg_size(), 16);
        assert_eq!(archives[1].family(), "Turbo");
        assert_eq!(archives[1].codec().parity_size(), 132);
        assert_eq!(archives[2].family(), "Ldpc");
        assert_eq!(archives[2].codec().parity_size(), 24);
        assert_eq!(archives[0].soft_codec().syst_size(), 18);
        assert_eq!(archives[1].soft_codec().state_size(), 80);
        assert_eq!(archives[2].soft_codec().state_size(), 72);
    }

    #[test]
    fn test_json() {
        for archive in all_archives() {
            let json = archive.to_json().unwrap();
            assert!(json.contains(&format!("\"family\": \"{}\"", archive.family())));
            assert_eq!(CodecArchive::from_json(&json).unwrap(), archive);
        }
        assert!(CodecArchive::from_json(r#"{"family": "Polar"}"#).is_err());
    }

    #[test]
    fn test_invalid_json() {
        let turbo: CodecArchive = Turbo::new(TurboOptions::new(
            vec![Trellis::recursive_parity(&[0o13, 0o15]).unwrap()],
            vec![
                Permutation::default(),
                Permutation::interleaver(&[3, 1, 0, 2]).unwrap(),
            ],
        ))
        .unwrap()
        .into();
        let json = serde_json::to_string(&turbo).unwrap();
        assert_eq!(CodecArchive::from_json(&json).unwrap(), turbo);
        let bad_interleaver = json.replace("[3,1,0,2]", "[3,1,0,99]");
        assert_ne!(bad_interleaver, json);
        assert!(CodecArchive::from_json(&bad_interleaver).is_err());

        let checks = SparseBitMatrix::from_rows(
            7,
            &[vec![0, 2, 4, 6], vec![1, 2, 5, 6], vec![3, 4, 5, 6]],
        )
        .unwrap();
        let ldpc: CodecArchive = Ldpc::new(LdpcOptions::new(checks)).unwrap().into();
        let json = serde_json::to_string(&ldpc).unwrap();
        let bad_checks = json.replace("[3,4,5,6]", "[3,4,5,7]");
        assert_ne!(bad_checks, json);
        assert!(CodecArchive::from_json(&bad_checks).is_err());
        let unsorted_checks = json.replace("[3,4,5,6]", "[6,4,3,5,4]");
        assert_eq!(CodecArchive::from_json(&unsorted_checks).unwrap(), ldpc);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join("fecodec_test_save_and_load.json");
        for archive in all_archives() {
            archive.save(&path).unwrap();
            assert_eq!(CodecArchive::load(&path).unwrap(), archive);
        }
        std::fs::remove_file(&path).unwrap();
        assert!(CodecArchive::load(&path).is_err());
    }
}
