//! This crate simulates the BER-versus-SNR and BLER-versus-SNR performance of convolutional, turbo
//! and LDPC codes over a BPSK-AWGN channel. Simulation parameters are specified on the command
//! line, and simulation results are saved to a JSON file.
//!
//! Build the executable with `cargo build --release` and then run `./target/release/fecodec -h`
//! for help on the command-line interface. Set `RUST_LOG=debug` for per-run progress.

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

use std::time::Instant;

use anyhow::Result;
use clap::parser::ValueSource;
use clap::{crate_name, crate_version, value_parser, Arg, ArgMatches, Command};
use fecodec::ldpc::gallager;
use fecodec::sim::{self, SimParams};
use fecodec::{
    CodecArchive, Convolutional, ConvolutionalOptions, DecoderAlgorithm, Ldpc, LdpcOptions,
    Permutation, Trellis, Turbo, TurboOptions,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Main function
fn main() -> Result<()> {
    let timer = Instant::now();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();
    let mut rng = rand::rng();
    let matches = command_line_parser().get_matches();
    let code = code_from_matches(&matches)?;
    if let Some(archive_filename) = matches.get_one::<String>("save_archive") {
        code.save(archive_filename)?;
        info!("Code saved to {archive_filename}");
    }
    let json_filename = &json_filename_from_matches(&matches);
    sim::run_bpsk_awgn_sims(&all_sim_params(&matches, &code), &mut rng, json_filename)?;
    info!("Elapsed time: {:.3?}", timer.elapsed());
    Ok(())
}

/// Returns command line parser.
fn command_line_parser() -> Command {
    Command::new(crate_name!())
        .version(crate_version!())
        .about("Evaluates the performance of an FEC code over a BPSK-AWGN channel")
        .arg(code_family())
        .arg(load_archive())
        .arg(save_archive())
        .arg(num_msg_bits_per_block())
        .arg(code_seed())
        .arg(decoder_algorithm())
        .arg(num_iter())
        .arg(first_snr_db())
        .arg(snr_step_db())
        .arg(num_snr())
        .arg(num_block_errors_min())
        .arg(num_blocks_per_run())
        .arg(num_runs_min())
        .arg(num_runs_max())
        .arg(sim_seed())
        .arg(json_filename())
}

/// Returns argument for code family.
fn code_family() -> Arg {
    Arg::new("code_family")
        .short('c')
        .value_parser(["convolutional", "turbo", "ldpc"])
        .default_value("turbo")
        .help("Code family")
}

/// Returns argument for name of JSON code archive to be simulated instead of a built-in code.
fn load_archive() -> Arg {
    Arg::new("load_archive")
        .short('l')
        .help("Name of JSON code archive to be simulated (overrides -c, -i, -g, -a and -t)")
}

/// Returns argument for name of JSON file to which the simulated code must be saved.
fn save_archive() -> Arg {
    Arg::new("save_archive")
        .short('o')
        .help("Name of JSON file to which the simulated code must be saved")
}

/// Returns argument for number of message bits per block.
fn num_msg_bits_per_block() -> Arg {
    Arg::new("num_msg_bits_per_block")
        .short('i')
        .value_parser(value_parser!(u32).range(1 ..))
        .default_value("40")
        .help("Number of message bits per block (LDPC: half the code length, rounded up)")
}

/// Returns argument for seed of the random interleaver or check matrix.
fn code_seed() -> Arg {
    Arg::new("code_seed")
        .short('g')
        .value_parser(value_parser!(u64))
        .default_value("0")
        .help("Seed of the turbo interleaver or of the LDPC check matrix")
}

/// Returns argument for decoder algorithm name.
fn decoder_algorithm() -> Arg {
    Arg::new("decoder_algorithm")
        .short('a')
        .value_parser(["Exact", "Linear", "Approximate"])
        .default_value("Exact")
        .help("Decoder algorithm name")
}

/// Returns argument for number of decoder iterations.
fn num_iter() -> Arg {
    Arg::new("num_iter")
        .short('t')
        .value_parser(value_parser!(u32))
        .default_value("8")
        .help("Maximum number of turbo or belief propagation iterations")
}

/// Returns argument for first Es/N0 (dB).
fn first_snr_db() -> Arg {
    Arg::new("first_snr_db")
        .short('r')
        .value_parser(value_parser!(f64))
        .allow_negative_numbers(true)
        .default_value("-5.0")
        .help("First Es/N0 (dB)")
}

/// Returns argument for Es/N0 step (dB).
fn snr_step_db() -> Arg {
    Arg::new("snr_step_db")
        .short('p')
        .value_parser(value_parser!(f64))
        .allow_negative_numbers(true)
        .default_value("1.0")
        .help("Es/N0 step (dB)")
}

/// Returns argument for number of Es/N0 values.
fn num_snr() -> Arg {
    Arg::new("num_snr")
        .short('s')
        .value_parser(value_parser!(u32))
        .default_value("4")
        .help("Number of Es/N0 values")
}

/// Returns argument for desired minimum number of block errors.
fn num_block_errors_min() -> Arg {
    Arg::new("num_block_errors_min")
        .short('e')
        .value_parser(value_parser!(u32))
        .default_value("500")
        .help("Desired minimum number of block errors")
}

/// Returns argument for number of blocks to be transmitted per run.
fn num_blocks_per_run() -> Arg {
    Arg::new("num_blocks_per_run")
        .short('b')
        .value_parser(value_parser!(u32))
        .default_value("1000")
        .help("Number of blocks to be transmitted per run")
}

/// Returns argument for minimum number of runs of blocks to be simulated.
fn num_runs_min() -> Arg {
    Arg::new("num_runs_min")
        .short('n')
        .value_parser(value_parser!(u32))
        .default_value("10")
        .help("Minimum number of runs of blocks to be simulated")
}

/// Returns argument for maximum number of runs of blocks to be simulated.
fn num_runs_max() -> Arg {
    Arg::new("num_runs_max")
        .short('x')
        .value_parser(value_parser!(u32))
        .default_value("100")
        .help("Maximum number of runs of blocks to be simulated")
}

/// Returns argument for seed of the simulation.
fn sim_seed() -> Arg {
    Arg::new("sim_seed")
        .short('d')
        .value_parser(value_parser!(u64))
        .help("Seed of the simulation, for reproducible results")
}

/// Returns argument for name of JSON file to which results must be saved.
fn json_filename() -> Arg {
    Arg::new("json_filename")
        .short('f')
        .default_value("results.json")
        .help("Name of JSON file to which results must be saved")
}

/// Returns code to be simulated based on command-line arguments.
fn code_from_matches(matches: &ArgMatches) -> Result<CodecArchive> {
    if let Some(archive_filename) = matches.get_one::<String>("load_archive") {
        return Ok(CodecArchive::load(archive_filename)?);
    }
    let msg_size = num_msg_bits_per_block_from_matches(matches) as usize;
    let code_seed: u64 = *matches.get_one("code_seed").unwrap();
    let algorithm = decoder_algorithm_from_matches(matches)?;
    let num_iter = num_iter_from_matches(matches) as usize;
    let code = match matches.get_one::<String>("code_family").unwrap().as_str() {
        "convolutional" => Convolutional::new(
            ConvolutionalOptions::new(Trellis::new(&[7], &[vec![0o171, 0o133]], &[])?, msg_size)
                .algorithm(algorithm),
        )?
        .into(),
        "turbo" => Turbo::new(
            TurboOptions::new(
                vec![Trellis::recursive_parity(&[0o13, 0o15])?],
                vec![
                    Permutation::default(),
                    Permutation::random_with_seed(msg_size, code_seed)?,
                ],
            )
            .iterations(num_iter)
            .algorithm(algorithm),
        )?
        .into(),
        "ldpc" => {
            let code_len = (2 * msg_size).div_ceil(6) * 6;
            Ldpc::new(
                LdpcOptions::new(gallager(code_len, 3, 6, code_seed)?)
                    .iterations(num_iter)
                    .algorithm(algorithm),
            )?
            .into()
        }
        _ => unreachable!("Invalid code family"),
    };
    Ok(code)
}

/// Returns simulation parameters based on command-line arguments.
fn all_sim_params(matches: &ArgMatches, code: &CodecArchive) -> Vec<SimParams> {
    let mut num_runs_min = num_runs_min_from_matches(matches);
    let mut num_runs_max = num_runs_max_from_matches(matches);
    if num_runs_min > num_runs_max {
        if let Some(ValueSource::DefaultValue) = matches.value_source("num_runs_min") {
            num_runs_min = num_runs_max;
        }
        if let Some(ValueSource::DefaultValue) = matches.value_source("num_runs_max") {
            num_runs_max = num_runs_min;
        }
    }
    let sim_seed = matches.get_one::<u64>("sim_seed").copied();
    all_es_over_n0_db_from_matches(matches)
        .into_iter()
        .zip(0 ..)
        .map(|(es_over_n0_db, n)| SimParams {
            code: code.clone(),
            es_over_n0_db,
            num_block_errors_min: num_block_errors_min_from_matches(matches),
            num_blocks_per_run: num_blocks_per_run_from_matches(matches),
            num_runs_min,
            num_runs_max,
            seed: sim_seed.map(|seed| seed.wrapping_add(n)),
        })
        .collect()
}

// OK to unwrap in the functions below: All command-line arguments they read have default values.

/// Returns number of message bits per block.
fn num_msg_bits_per_block_from_matches(matches: &ArgMatches) -> u32 {
    *matches.get_one("num_msg_bits_per_block").unwrap()
}

/// Returns decoder algorithm.
fn decoder_algorithm_from_matches(matches: &ArgMatches) -> Result<DecoderAlgorithm> {
    Ok(matches
        .get_one::<String>("decoder_algorithm")
        .unwrap()
        .parse()?)
}

/// Returns maximum number of decoder iterations.
fn num_iter_from_matches(matches: &ArgMatches) -> u32 {
    *matches.get_one("num_iter").unwrap()
}

/// Returns all Es/N0 (dB) values.
fn all_es_over_n0_db_from_matches(matches: &ArgMatches) -> Vec<f64> {
    let first_snr_db: f64 = *matches.get_one("first_snr_db").unwrap();
    let snr_step_db: f64 = *matches.get_one("snr_step_db").unwrap();
    let num_snr: u32 = *matches.get_one("num_snr").unwrap();
    (0 .. num_snr)
        .map(|n| first_snr_db + snr_step_db * f64::from(n))
        .collect()
}

/// Returns desired minimum number of block errors.
fn num_block_errors_min_from_matches(matches: &ArgMatches) -> u32 {
    *matches.get_one("num_block_errors_min").unwrap()
}

/// Returns number of blocks to be transmitted per run.
fn num_blocks_per_run_from_matches(matches: &ArgMatches) -> u32 {
    *matches.get_one("num_blocks_per_run").unwrap()
}

/// Returns minimum number of runs of blocks to be simulated.
fn num_runs_min_from_matches(matches: &ArgMatches) -> u32 {
    *matches.get_one("num_runs_min").unwrap()
}

/// Returns maximum number of runs of blocks to be simulated.
fn num_runs_max_from_matches(matches: &ArgMatches) -> u32 {
    *matches.get_one("num_runs_max").unwrap()
}

/// Returns name of JSON file to which simulation results must be saved.
fn json_filename_from_matches(matches: &ArgMatches) -> String {
    matches
        .get_one::<String>("json_filename")
        .unwrap()
        .to_string()
}

#[cfg(test)]
mod tests {
    use fecodec::Codec;

    use super::*;

    fn command_line_for_test() -> Vec<&'static str> {
        vec![
            crate_name!(),
            "-c",
            "turbo",
            "-i",
            "40",
            "-a",
            "Exact",
            "-t",
            "8",
            "-r",
            "-4.0",
            "-p",
            "0.2",
            "-s",
            "6",
            "-e",
            "50",
            "-b",
            "100",
            "-n",
            "10",
            "-x",
            "20",
            "-d",
            "7",
            "-f",
            "results.json",
        ]
    }

    #[test]
    fn test_command_line_parser() {
        assert!(command_line_parser()
            .try_get_matches_from(command_line_for_test())
            .is_ok());
        assert!(command_line_parser()
            .try_get_matches_from([crate_name!(), "-c", "polar"])
            .is_err());
        assert!(command_line_parser()
            .try_get_matches_from([crate_name!(), "-i", "0"])
            .is_err());
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_all_sim_params() {
        let matches = command_line_parser().get_matches_from(command_line_for_test());
        let code = code_from_matches(&matches).unwrap();
        let all_params = all_sim_params(&matches, &code);
        let all_es_over_n0_db = [-4.0, -3.8, -3.6, -3.4, -3.2, -3.0];
        assert_eq!(all_params.len(), 6);
        for (idx, params) in all_params.iter().enumerate() {
            assert_eq!(params.code, code);
            assert_eq!(params.es_over_n0_db, all_es_over_n0_db[idx]);
            assert_eq!(params.num_block_errors_min, 50);
            assert_eq!(params.num_blocks_per_run, 100);
            assert_eq!(params.num_runs_min, 10);
            assert_eq!(params.num_runs_max, 20);
            assert_eq!(params.seed, Some(7 + idx as u64));
        }
    }

    #[test]
    fn test_num_runs_defaults() {
        let matches = command_line_parser().get_matches_from([crate_name!(), "-x", "5"]);
        let code = code_from_matches(&matches).unwrap();
        let all_params = all_sim_params(&matches, &code);
        assert_eq!(all_params[0].num_runs_min, 5);
        assert_eq!(all_params[0].num_runs_max, 5);
        assert_eq!(all_params[0].seed, None);
    }

    #[test]
    fn test_code_from_matches() {
        let matches = command_line_parser().get_matches_from(command_line_for_test());
        let CodecArchive::Turbo(turbo) = code_from_matches(&matches).unwrap() else {
            panic!("Expected a turbo code");
        };
        assert_eq!(turbo.msg_size(), 40);
        assert_eq!(turbo.options().iterations, 8);
        assert_eq!(turbo.options().algorithm, DecoderAlgorithm::Exact);

        let matches = command_line_parser().get_matches_from([
            crate_name!(),
            "-c",
            "convolutional",
            "-i",
            "100",
        ]);
        let code = code_from_matches(&matches).unwrap();
        assert_eq!(code.family(), "Convolutional");
        assert_eq!(code.codec().msg_size(), 100);
        assert_eq!(code.codec().parity_size(), 212);

        let matches =
            command_line_parser().get_matches_from([crate_name!(), "-c", "ldpc", "-i", "40"]);
        let code = code_from_matches(&matches).unwrap();
        assert_eq!(code.family(), "Ldpc");
        assert_eq!(code.codec().parity_size(), 84);
    }

    #[test]
    fn test_load_archive() {
        let path = std::env::temp_dir().join("fecodec_test_load_archive.json");
        let matches = command_line_parser().get_matches_from([crate_name!(), "-c", "ldpc"]);
        let code = code_from_matches(&matches).unwrap();
        code.save(&path).unwrap();
        let path_str = path.to_str().unwrap();
        let matches = command_line_parser().get_matches_from([crate_name!(), "-l", path_str]);
        assert_eq!(code_from_matches(&matches).unwrap(), code);
        std::fs::remove_file(&path).unwrap();
    }
}
