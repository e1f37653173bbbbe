use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};

use imgmeta::{Config, CopyOptions, Family, ImageMetadata, Tag, WriteOptions};

#[derive(Parser, Debug)]
#[command(
    name = "imgmeta",
    version,
    about = "Read and edit the EXIF, IPTC and XMP metadata of images"
)]
struct Cli {
    /// Image file to inspect or edit
    #[arg(value_name = "PATH")]
    path: Option<PathBuf>,

    /// Path to config file (default: imgmeta.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default imgmeta.json and exit
    #[arg(long)]
    init: bool,

    /// Output metadata as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Set a tag from its text form; repeatable values are separated by ';'
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,

    /// Delete a tag
    #[arg(long, value_name = "KEY")]
    delete: Vec<String>,

    /// Set the JPEG comment; an empty string removes it
    #[arg(long, value_name = "TEXT")]
    comment: Option<String>,

    /// Declare the IPTC charset (utf-8), or "none" to remove the declaration
    #[arg(long, value_name = "NAME")]
    charset: Option<String>,

    /// Copy the metadata to another image
    #[arg(long = "copy-to", value_name = "DEST")]
    copy_to: Option<PathBuf>,

    /// Parts copied by --copy-to (default: all)
    #[arg(long, value_enum, value_delimiter = ',', requires = "copy_to")]
    only: Vec<Part>,

    /// Write embedded previews into a directory
    #[arg(long = "extract-previews", value_name = "DIR")]
    extract_previews: Option<PathBuf>,

    /// Keep the file's access and modification times when writing
    #[arg(long = "preserve-timestamps")]
    preserve_timestamps: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Part {
    Exif,
    Iptc,
    Xmp,
    Comment,
}

fn copy_options(parts: &[Part]) -> CopyOptions {
    if parts.is_empty() {
        return CopyOptions::default();
    }
    CopyOptions {
        exif: parts.contains(&Part::Exif),
        iptc: parts.contains(&Part::Iptc),
        xmp: parts.contains(&Part::Xmp),
        comment: parts.contains(&Part::Comment),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    let Some(path) = cli.path.as_deref() else {
        anyhow::bail!("No image specified. Use --help for usage.");
    };

    let config = Config::load(cli.config.as_deref())?;
    config.apply()?;

    let mut metadata = ImageMetadata::new(path);
    metadata
        .read()
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let write_options = WriteOptions {
        preserve_timestamps: cli.preserve_timestamps || config.write.preserve_timestamps,
    };

    if apply_edits(&cli, &config, &mut metadata)? {
        metadata
            .write_with(&write_options)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Updated {}", path.display());
    }

    // Handle --copy-to
    if let Some(dest) = &cli.copy_to {
        let mut target = ImageMetadata::new(dest);
        target
            .read()
            .with_context(|| format!("Failed to read {}", dest.display()))?;
        metadata.copy_to(&mut target, copy_options(&cli.only))?;
        target
            .write_with(&write_options)
            .with_context(|| format!("Failed to write {}", dest.display()))?;
        log::info!("Copied metadata to {}", dest.display());
    }

    // Handle --extract-previews
    if let Some(dir) = &cli.extract_previews {
        extract_previews(&metadata, path, dir)?;
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&metadata_json(&mut metadata, path)?)?);
    } else {
        print_metadata(&mut metadata, path)?;
    }

    Ok(())
}

/// Apply --charset, --set, --delete and --comment. Returns whether anything
/// changed.
fn apply_edits(cli: &Cli, config: &Config, metadata: &mut ImageMetadata) -> Result<bool> {
    let mut changed = false;

    let sets_iptc = cli
        .set
        .iter()
        .any(|s| Family::from_key(s).ok() == Some(Family::Iptc));
    let charset = match cli.charset.as_deref() {
        Some(name) => Some(name),
        None if sets_iptc => config.iptc.charset.as_deref(),
        None => None,
    };
    if let Some(name) = charset {
        let name = (!name.eq_ignore_ascii_case("none")).then_some(name);
        metadata.set_iptc_charset(name)?;
        changed = true;
    }

    for assignment in &cli.set {
        let (key, text) = assignment
            .split_once('=')
            .with_context(|| format!("Expected KEY=VALUE, got '{assignment}'"))?;
        let tag = Tag::parse(key.trim(), text).with_context(|| format!("Invalid value for {key}"))?;
        log::debug!("Setting {tag}");
        metadata.set_tag(tag)?;
        changed = true;
    }

    for key in &cli.delete {
        metadata
            .delete(key)
            .with_context(|| format!("Failed to delete {key}"))?;
        changed = true;
    }

    match cli.comment.as_deref() {
        Some("") => {
            metadata.clear_comment()?;
            changed = true;
        }
        Some(text) => {
            metadata.set_comment(text)?;
            changed = true;
        }
        None => {}
    }

    Ok(changed)
}

fn extract_previews(metadata: &ImageMetadata, path: &Path, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).context("Failed to create preview directory")?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let previews = metadata.previews()?;
    if previews.is_empty() {
        log::info!("No previews in {}", path.display());
    }
    for (i, preview) in previews.iter().enumerate() {
        let written = preview.write_to_file(&dir.join(format!("{stem}_preview{}", i + 1)))?;
        log::info!("Preview written: {}", written.display());
    }
    Ok(())
}

fn metadata_json(metadata: &mut ImageMetadata, path: &Path) -> Result<serde_json::Value> {
    let mut tags = Vec::new();
    for key in metadata.all_keys()? {
        match metadata.get(&key) {
            Ok(tag) => tags.push(serde_json::json!({
                "key": key,
                "type": tag.tag_type().to_string(),
                "kind": tag.value().map(|v| v.kind()),
                "value": tag.value().map(|v| v.to_string()),
            })),
            Err(e) => log::warn!("Skipping {key}: {e}"),
        }
    }
    let previews: Vec<serde_json::Value> = metadata
        .previews()?
        .iter()
        .map(|p| {
            serde_json::json!({
                "mime_type": p.mime_type,
                "dimensions": p.dimensions,
                "size": p.size(),
            })
        })
        .collect();

    Ok(serde_json::json!({
        "path": path.display().to_string(),
        "mime_type": metadata.mime_type()?,
        "dimensions": metadata.dimensions().ok(),
        "comment": metadata.comment()?,
        "tags": tags,
        "exposure": metadata.exposure_data().ok(),
        "rights": metadata.rights_data().ok(),
        "previews": previews,
    }))
}

// ANSI color codes
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Max width for the value column before wrapping.
const VAL_WIDTH: usize = 46;
/// Indent for continuation lines (tag column width + " : " = 25 chars + 2 leading spaces).
const INDENT: &str = "                           ";

/// Print all metadata of an image, organized by family.
fn print_metadata(metadata: &mut ImageMetadata, path: &Path) -> Result<()> {
    println!();
    println!("{BOLD}File:{RESET} {}", path.display());
    println!("{DIM}{}{RESET}", "═".repeat(72));

    let mut image_fields = vec![("MimeType", metadata.mime_type()?)];
    if let Ok((w, h)) = metadata.dimensions() {
        image_fields.push(("ImageSize", format!("{w} x {h}")));
    }
    if let Some(comment) = metadata.comment()? {
        image_fields.push(("Comment", comment));
    }
    print_section("Image", &image_fields);

    for (family, title) in [
        (Family::Exif, "EXIF"),
        (Family::Iptc, "IPTC"),
        (Family::Xmp, "XMP"),
    ] {
        let mut rows = Vec::new();
        for key in metadata.keys(family)? {
            let value = match metadata.get(&key) {
                Ok(tag) => match tag.value() {
                    Some(v) => format!("{v} [{}]", tag.tag_type()),
                    None => format!("(unset) [{}]", tag.tag_type()),
                },
                Err(e) => format!("{DIM}({e}){RESET}"),
            };
            rows.push((key, value));
        }
        if rows.is_empty() {
            continue;
        }
        println!("  {BOLD}{title}{RESET}");
        println!("  {DIM}{}{RESET}", "─".repeat(70));
        for (key, value) in &rows {
            print_row(key, value);
        }
        println!();
    }

    match metadata.exposure_data() {
        Ok(exposure) => {
            let mut fields = Vec::new();
            if let Some(iso) = exposure.iso {
                fields.push(("ISO", iso.to_string()));
            }
            if let Some(speed) = exposure.shutter_speed {
                fields.push(("ShutterSpeed", format!("{speed} s")));
            }
            if let Some(focal) = exposure.focal_length {
                fields.push(("FocalLength", format!("{focal} mm")));
            }
            if let Some(aperture) = exposure.aperture {
                fields.push(("Aperture", format!("f/{aperture}")));
            }
            fields.push(("Orientation", exposure.orientation.to_string()));
            print_section("Exposure", &fields);
        }
        Err(e) => log::warn!("Exposure data unavailable: {e}"),
    }

    match metadata.rights_data() {
        Ok(rights) => {
            let lang = |items: &[(String, String)]| {
                items
                    .iter()
                    .map(|(l, t)| format!("[{l}] {t}"))
                    .collect::<Vec<_>>()
                    .join("; ")
            };
            let mut fields = Vec::new();
            if let Some(creator) = &rights.creator {
                fields.push(("Creator", creator.join("; ")));
            }
            if let Some(artist) = &rights.artist {
                fields.push(("Artist", artist.clone()));
            }
            if let Some(r) = &rights.rights {
                fields.push(("Rights", lang(r)));
            }
            if let Some(copyright) = &rights.copyright {
                fields.push(("Copyright", copyright.clone()));
            }
            if let Some(marked) = rights.marked {
                fields.push(("Marked", marked.to_string()));
            }
            if let Some(usage) = &rights.usage {
                fields.push(("UsageTerms", lang(usage)));
            }
            print_section("Rights", &fields);
        }
        Err(e) => log::warn!("Rights data unavailable: {e}"),
    }

    let previews: Vec<(String, String)> = metadata
        .previews()?
        .iter()
        .enumerate()
        .map(|(i, p)| {
            (
                format!("Preview {}", i + 1),
                format!("{} {}x{}, {} bytes", p.mime_type, p.dimensions.0, p.dimensions.1, p.size()),
            )
        })
        .collect();
    let previews: Vec<(&str, String)> = previews.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
    print_section("Previews", &previews);

    if metadata.is_empty()? {
        println!("  {DIM}(no metadata found){RESET}");
        println!();
    }

    Ok(())
}

/// Print a titled block of rows, or nothing when empty.
fn print_section(title: &str, fields: &[(&str, String)]) {
    if fields.is_empty() {
        return;
    }
    println!("  {BOLD}{title}{RESET}");
    println!("  {DIM}{}{RESET}", "─".repeat(70));
    for (tag, val) in fields {
        print_row(tag, val);
    }
    println!();
}

/// Print a single row in the metadata table.
fn print_row(tag: &str, val: &str) {
    let tag_col = format!("{:<22}", tag);
    let lines = wrap_text(val, VAL_WIDTH);
    for (i, line) in lines.iter().enumerate() {
        if i == 0 {
            println!("  {tag_col} : {line}");
        } else {
            println!("  {INDENT}{line}");
        }
    }
}

/// Wrap text at word boundaries to fit within max_width.
fn wrap_text(s: &str, max_width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in s.split_whitespace() {
        if current_line.is_empty() {
            current_line = word.to_string();
        } else if current_line.len() + 1 + word.len() <= max_width {
            current_line.push(' ');
            current_line.push_str(word);
        } else {
            lines.push(current_line);
            current_line = word.to_string();
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(s.to_string());
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_selects_parts() {
        assert_eq!(copy_options(&[]), CopyOptions::default());
        let options = copy_options(&[Part::Xmp, Part::Comment]);
        assert!(!options.exif && !options.iptc);
        assert!(options.xmp && options.comment);
    }

    #[test]
    fn parse_arguments() {
        let cli = Cli::parse_from([
            "imgmeta",
            "photo.jpg",
            "--set",
            "Iptc.Application2.Keywords=sky; sea",
            "--copy-to",
            "other.jpg",
            "--only",
            "exif,iptc",
        ]);
        assert_eq!(cli.set, vec!["Iptc.Application2.Keywords=sky; sea"]);
        assert_eq!(cli.only, vec![Part::Exif, Part::Iptc]);
        assert!(Cli::try_parse_from(["imgmeta", "photo.jpg", "--only", "exif"]).is_err());
    }

    #[test]
    fn wrap_long_values() {
        let lines = wrap_text("one two three", 7);
        assert_eq!(lines, vec!["one two", "three"]);
        assert_eq!(wrap_text("", 10), vec![""]);
    }
}
