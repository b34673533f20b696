//! Re-encodes a framed merkledag document under a different codec.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use mdag_coding::{decode_bytes, encode, Codec};
use mdag_node::CODEC_KEY;
use mdag_stream::Error;

#[derive(Debug, Parser)]
#[command(name = "mdag-convert", about = "Convert merkledag documents between codecs")]
struct Args {
    /// Input file
    #[arg(short = 'i')]
    input: PathBuf,

    /// Output file
    #[arg(short = 'o')]
    output: PathBuf,

    /// Target codec path (/cbor, /cbor/ipld-tagsv1, /json or /protobuf/msgio)
    #[arg(short = 'c')]
    codec: String,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("mdag-convert: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Error> {
    let codec =
        Codec::from_path(&args.codec).ok_or_else(|| Error::UnknownCodec(args.codec.clone()))?;

    let bytes = fs::read(&args.input)?;
    let (_, mut node) = decode_bytes(bytes)?;
    node.remove(CODEC_KEY);

    let mut out = Vec::new();
    encode(&mut out, &node, codec)?;
    fs::write(&args.output, out)?;
    Ok(())
}
