use std::env;
use std::process::ExitCode;

use log::{error, info};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use paletted_section::protocol_types::traits::{SizedProt, WriteProt};
use paletted_section::{ChunkSection, SectionConfig, SectionError};

const USAGE: &str = "usage: paletted-section <snapshot.json> [out.bin]";

/**
 * Loads a section snapshot and writes its network encoding, either to the
 * given file or to stdout.
 */
async fn convert(input: &str, output: Option<&str>) -> Result<(), SectionError> {
    let config = SectionConfig::from_env()?;
    let json = fs::read_to_string(input).await?;
    let section = ChunkSection::from_json_with_config(&json, config)?;
    info!(
        "{input}: {} solid blocks, {} bits per block, {}",
        section.solid_block_count(),
        section.bits_per_block(),
        match section.palette() {
            Some(palette) => format!("{} palette entries", palette.len()),
            None => "global ids".to_string(),
        }
    );

    let mut buf: Vec<u8> = Vec::with_capacity(section.prot_size());
    section.write(&mut buf).await?;
    match output {
        Some(path) => fs::write(path, &buf).await?,
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&buf).await?;
            stdout.flush().await?;
        }
    }
    info!("Wrote {} bytes", buf.len());
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    env_logger::init();
    let args: Vec<String> = env::args().skip(1).collect();
    let Some(input) = args.first() else {
        eprintln!("{USAGE}");
        return ExitCode::from(2);
    };
    match convert(input, args.get(1).map(String::as_str)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Couldn't convert {input}: {e}");
            ExitCode::FAILURE
        }
    }
}
