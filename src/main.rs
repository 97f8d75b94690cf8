//! Command line front end: encodes a raw 8-bit grayscale file to WSQ.
//!
//! ```bash
//! RUST_LOG=info wsq-encode finger.raw -W 500 -H 500 -q 0.75 -o finger.wsq
//! ```
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use clap::Parser;

use wsq_encoder::Encoder;

#[derive(Parser)]
#[command(name = "wsq-encode", version, about = "Encode raw grayscale images as WSQ")]
struct Cli {
    /// Input file (raw row-major 8-bit pixels)
    input: PathBuf,
    /// Output file (.wsq)
    #[arg(short, long)]
    output: PathBuf,
    /// Image width in pixels
    #[arg(short = 'W', long)]
    width: usize,
    /// Image height in pixels
    #[arg(short = 'H', long)]
    height: usize,
    /// Target bit rate, 0.75 to 2.2
    #[arg(short, long, default_value_t = 2.2)]
    quality: f32,
    /// Scan resolution written to the metadata
    #[arg(short, long, default_value_t = 500)]
    ppi: u32,
    /// Leave out the NIST metadata comment
    #[arg(long)]
    no_metadata: bool,
    /// Free-form comment stored in the file
    #[arg(short, long, default_value = "")]
    comment: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let encoder = Encoder::builder(cli.width, cli.height)?
        .quality(cli.quality)?
        .ppi(cli.ppi)?
        .include_metadata(!cli.no_metadata)
        .comment(cli.comment)?
        .build();

    let input = File::open(&cli.input)?;
    let output = BufWriter::new(File::create(&cli.output)?);
    encoder.encode_stream(input, output)?;
    log::info!("Wrote {}", cli.output.display());
    Ok(())
}
