//! Skinpack CLI - Merges per-resolution skin textures into single DDS files.
//!
//! This is the main entry point for the skinpack command-line application.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use glob::{MatchOptions, Pattern};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use skinpack_dds::{Header, MipmapManager, ScratchDir, TexConv};

/// Skinpack - skin texture merging tool
#[derive(Parser)]
#[command(name = "skinpack")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Show debug diagnostics
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge several resolutions of one texture into a single DDS file
    Merge {
        /// Input DDS files, in any order
        #[arg(short, long = "input", required = true)]
        inputs: Vec<PathBuf>,

        /// Output DDS file
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        options: MergeOptions,
    },

    /// Merge every texture found under a folder of resolution folders
    MergeDir {
        /// Input folder, searched recursively for DDS files
        #[arg(short, long)]
        input: PathBuf,

        /// Output folder
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        options: MergeOptions,
    },

    /// Print the header and mip levels of a DDS file
    Inspect {
        /// Input DDS file
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[derive(Args, Debug, Clone, Default)]
struct MergeOptions {
    /// Normalize the format for the asset packer
    #[arg(long)]
    convert: bool,

    /// texconv executable used to fill missing mip levels (implies --convert)
    #[arg(long, env = "SKINPACK_TEXCONV")]
    texconv: Option<PathBuf>,

    /// Scratch folder for texconv input and output
    #[arg(long, env = "SKINPACK_TEMP")]
    temp: Option<PathBuf>,

    /// Fail instead of skipping input files that cannot be merged
    #[arg(long)]
    strict: bool,
}

impl MergeOptions {
    fn scratch_root(&self) -> PathBuf {
        self.temp
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("skinpack"))
    }
}

/// Result of merging one texture.
#[derive(Debug)]
struct MergeSummary {
    levels: usize,
    missing: usize,
    warnings: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Merge { inputs, output, options } => {
            cmd_merge(&inputs, &output, &options)?;
        }
        Commands::MergeDir { input, output, options } => {
            cmd_merge_dir(&input, &output, &options)?;
        }
        Commands::Inspect { input } => {
            cmd_inspect(&input)?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_merge(inputs: &[PathBuf], output: &Path, options: &MergeOptions) -> Result<()> {
    println!("Merging {} files -> {}", inputs.len(), output.display());

    let summary = merge_texture(inputs, output, options)?;
    for warning in &summary.warnings {
        eprintln!("Warning: {}", warning);
    }

    println!("Wrote {} mip levels", summary.levels);
    if summary.missing > 0 {
        println!("{} mip levels are still missing", summary.missing);
    }

    Ok(())
}

fn cmd_merge_dir(input: &Path, output: &Path, options: &MergeOptions) -> Result<()> {
    println!("Scanning: {}", input.display());

    let groups = group_by_name(input)?;
    println!("Merging {} textures into {}...", groups.len(), output.display());

    fs::create_dir_all(output)?;

    let pb = ProgressBar::new(groups.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let mut incomplete = 0;

    for (name, paths) in &groups {
        pb.set_message(name.clone());

        let output_path = output.join(format!("{}.dds", name));
        let summary = merge_texture(paths, &output_path, options)
            .with_context(|| format!("Failed to merge {}", name))?;

        for warning in &summary.warnings {
            pb.println(format!("Warning: {}", warning));
        }
        if summary.missing > 0 {
            incomplete += 1;
        }

        pb.inc(1);
    }

    pb.finish_with_message("Done");
    println!(
        "Merged {} textures in {:?} ({} with missing mip levels)",
        groups.len(),
        start.elapsed(),
        incomplete
    );

    Ok(())
}

fn cmd_inspect(input: &Path) -> Result<()> {
    let mut reader = BufReader::new(File::open(input).context("Failed to open input file")?);
    let header = Header::decode(&mut reader).context("Failed to read DDS header")?;

    println!("File:         {}", input.display());
    println!("Dimensions:   {}x{}", header.width(), header.height());
    println!("FourCC:       {}", header.four_cc());
    if let Some(format) = header.dxgi_format() {
        println!("DXGI format:  {}", format);
    }
    println!("Pitch:        {}", header.pitch_or_linear_size());
    println!("Mip count:    {}", header.mipmap_count());
    println!("Flags:        {:#010x}", header.flags());
    println!("Caps:         {:#010x}", header.caps());

    let mut manager: MipmapManager = MipmapManager::default();
    let mut reader = BufReader::new(File::open(input)?);
    let outcome = manager.load_image(&mut reader).context("Failed to read mip levels")?;
    if let Some(warning) = outcome.warning() {
        println!("Warning:      {}", warning);
    }

    println!("Mip levels:   {}", manager.mip_count());
    let missing = manager.missing_mips();
    if missing.is_empty() {
        println!("Missing:      none");
    } else {
        let keys: Vec<String> = missing.iter().map(|key| key.to_string()).collect();
        println!("Missing:      {} (pixel counts)", keys.join(", "));
    }

    Ok(())
}

/// Merge the given files, which must all be resolutions of one texture.
fn merge_texture(inputs: &[PathBuf], output: &Path, options: &MergeOptions) -> Result<MergeSummary> {
    // Largest first: the first file to provide a level wins.
    let mut sources = Vec::with_capacity(inputs.len());
    for path in inputs {
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let header = Header::decode(&mut BufReader::new(file))
            .with_context(|| format!("Failed to read DDS header of {}", path.display()))?;
        sources.push((header.pixel_count(), path));
    }
    sources.sort_by_key(|(pixels, _)| Reverse(*pixels));

    let mut manager: MipmapManager = MipmapManager::default();
    let mut warnings = Vec::new();

    for (_, path) in &sources {
        let mut reader = BufReader::new(File::open(path)?);
        let outcome = manager
            .load_image(&mut reader)
            .with_context(|| format!("Failed to load {}", path.display()))?;

        if let Some(warning) = outcome.warning() {
            if options.strict {
                anyhow::bail!("{}: {}", path.display(), warning);
            }
            warnings.push(format!("{}: {}", path.display(), warning));
        }
    }

    if manager.is_empty() {
        anyhow::bail!("No usable images for {}", output.display());
    }

    if options.convert || options.texconv.is_some() {
        manager.convert().context("Failed to convert texture format")?;
    }

    let texconv = options
        .texconv
        .as_ref()
        .filter(|_| manager.has_missing_mips());

    if let Some(texconv) = texconv {
        let scratch = ScratchDir::prepare(options.scratch_root())
            .context("Failed to prepare texconv scratch folder")?;
        manager
            .generate_missing_mips(&TexConv::new(texconv), &scratch)
            .context("Failed to generate missing mip levels")?;
        manager.convert().context("Failed to convert texture format")?;
    }

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(output).context("Failed to create output file")?);
    manager.save(&mut writer).context("Failed to write output file")?;
    writer.flush()?;

    Ok(MergeSummary {
        levels: manager.mip_count(),
        missing: manager.missing_mips().len(),
        warnings,
    })
}

/// Find every DDS file under `root`, grouped by file stem.
///
/// Resolution folders hold same-named copies of each texture, so the stem
/// identifies the texture.
fn group_by_name(root: &Path) -> Result<BTreeMap<String, Vec<PathBuf>>> {
    let root = root.to_str().context("Input path is not valid UTF-8")?;
    let pattern = format!("{}/**/*.dds", Pattern::escape(root));
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };

    let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for entry in glob::glob_with(&pattern, options)? {
        let path = entry?;
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        groups.entry(name.to_owned()).or_default().push(path);
    }

    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skinpack_dds::{DdsHeader, FourCC};

    fn write_dds(path: &Path, header: Header, payload: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut out = Vec::new();
        header.encode(&mut out).unwrap();
        out.extend_from_slice(payload);
        fs::write(path, out).unwrap();
    }

    fn bc4u(size: u32) -> (Header, Vec<u8>) {
        let len = (size / 4) * (size / 4) * 8;
        let header = Header::new(size, size, FourCC::BC4U)
            .with_pitch_or_linear_size(len)
            .with_mipmap_count(1);
        (header, vec![size as u8; len as usize])
    }

    #[test]
    fn test_merge_orders_inputs_by_size() {
        let dir = tempfile::tempdir().unwrap();
        let small = dir.path().join("1k/body.dds");
        let large = dir.path().join("2k/body.dds");
        let (header, payload) = bc4u(128);
        write_dds(&small, header, &payload);
        let (header, payload) = bc4u(256);
        write_dds(&large, header, &payload);

        let output = dir.path().join("out/body.dds");
        let summary = merge_texture(&[small, large], &output, &MergeOptions::default()).unwrap();
        assert_eq!(summary.levels, 2);
        assert!(summary.warnings.is_empty());

        let data = fs::read(&output).unwrap();
        let (header, payload) = Header::parse(&data).unwrap();
        assert_eq!(header.width(), 256);
        assert_eq!(header.mipmap_count(), 2);
        assert_eq!(header.pitch_or_linear_size(), 32768);
        assert_ne!(header.flags() & DdsHeader::FLAG_MIPMAPCOUNT, 0);
        assert_eq!(payload.len(), 32768 + 8192);
        assert!(payload[..32768].iter().all(|&b| b == 0));
        assert!(payload[32768..].iter().all(|&b| b == 128));
    }

    #[test]
    fn test_merge_skips_or_fails_on_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("a.dds");
        let other = dir.path().join("b.dds");
        let (header, payload) = bc4u(64);
        write_dds(&good, header, &payload);
        let other_header = Header::new(32, 32, FourCC::BC5U).with_pitch_or_linear_size(1024);
        write_dds(&other, other_header, &[0; 1024]);

        let inputs = [good, other];
        let output = dir.path().join("merged.dds");

        let summary = merge_texture(&inputs, &output, &MergeOptions::default()).unwrap();
        assert_eq!(summary.levels, 1);
        assert_eq!(summary.warnings.len(), 1);
        assert!(summary.warnings[0].contains("does not match"));

        let strict = MergeOptions {
            strict: true,
            ..MergeOptions::default()
        };
        assert!(merge_texture(&inputs, &output, &strict).is_err());
    }

    #[test]
    fn test_merge_convert_normalizes_format() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.dds");
        let header = Header::new(16, 16, FourCC::ATI2).with_pitch_or_linear_size(256);
        write_dds(&input, header, &[7u8; 256]);

        let output = dir.path().join("converted.dds");
        let options = MergeOptions {
            convert: true,
            ..MergeOptions::default()
        };
        merge_texture(&[input], &output, &options).unwrap();

        let data = fs::read(&output).unwrap();
        let (header, payload) = Header::parse(&data).unwrap();
        assert_eq!(header.four_cc(), FourCC::BC5U);
        assert_eq!(payload, &[7u8; 256][..]);
    }

    #[test]
    fn test_texconv_implies_convert_for_complete_chain() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.dds");
        let header = Header::new(16, 16, FourCC::ATI2)
            .with_pitch_or_linear_size(256)
            .with_mipmap_count(5);
        write_dds(&input, header, &[1u8; 256 + 64 + 16 * 3]);

        let output = dir.path().join("converted.dds");
        let options = MergeOptions {
            texconv: Some(dir.path().join("no-such-texconv")),
            temp: Some(dir.path().join("scratch")),
            ..MergeOptions::default()
        };
        let summary = merge_texture(&[input], &output, &options).unwrap();
        assert_eq!(summary.levels, 5);
        assert_eq!(summary.missing, 0);

        let data = fs::read(&output).unwrap();
        let (header, _) = Header::parse(&data).unwrap();
        assert_eq!(header.four_cc(), FourCC::BC5U);
    }

    #[test]
    fn test_group_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let (header, payload) = bc4u(16);
        write_dds(&dir.path().join("4k/body.dds"), header, &payload);
        write_dds(&dir.path().join("2k/body.dds"), header, &payload);
        write_dds(&dir.path().join("2k/arms.DDS"), header, &payload);
        fs::write(dir.path().join("2k/notes.txt"), "not a texture").unwrap();

        let groups = group_by_name(dir.path()).unwrap();
        let names: Vec<&str> = groups.keys().map(String::as_str).collect();
        assert_eq!(names, ["arms", "body"]);
        assert_eq!(groups["body"].len(), 2);
    }
}
