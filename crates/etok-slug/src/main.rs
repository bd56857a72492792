//! Package a terraform root module and its local modules into a slug, or
//! unpack one.

mod logging;

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use etok_archive::{
    Archive, ArchiveOptions, DEFAULT_IGNORE_FILE, MAX_CONFIG_SIZE, PayloadOptions, extract,
};
use tempfile::NamedTempFile;
use tracing::debug;

#[derive(Parser)]
#[command(name = "slug", version, about = "Terraform configuration slugs")]
struct Cli {
    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Archive a root module and every local module it calls.
    Pack(PackArgs),
    /// Extract a slug into a directory.
    Unpack {
        archive: PathBuf,
        destination: PathBuf,
    },
    /// List the local modules a root module calls.
    Modules { root: PathBuf },
}

#[derive(Args)]
struct PackArgs {
    /// Root module directory.
    root: PathBuf,

    /// Directory entry names are relative to. Defaults to the enclosing
    /// git repository, or the root module.
    #[arg(long)]
    base: Option<PathBuf>,

    /// Output file; `-` writes to stdout.
    #[arg(short, long, default_value = "config.tar.gz")]
    out: PathBuf,

    /// Compressed size ceiling in bytes; 0 disables it.
    #[arg(long, env = "ETOK_MAX_SIZE", default_value_t = MAX_CONFIG_SIZE)]
    max_size: u64,

    #[arg(long, env = "ETOK_IGNORE_FILE", default_value = DEFAULT_IGNORE_FILE)]
    ignore_file: String,

    /// Skip symlinks leaving their module instead of archiving the target.
    #[arg(long)]
    no_dereference: bool,

    /// Write a ConfigMap manifest with this name instead of the raw slug.
    #[arg(long, value_name = "NAME")]
    manifest: Option<String>,

    #[arg(long, default_value = "default")]
    namespace: String,

    /// Extra manifest label, repeatable.
    #[arg(
        long = "label",
        value_name = "KEY=VALUE",
        value_parser = parse_label,
        requires = "manifest"
    )]
    labels: Vec<(String, String)>,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(err) = run(cli.command) {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Pack(args) => cmd_pack(args),
        Command::Unpack {
            archive,
            destination,
        } => cmd_unpack(&archive, &destination),
        Command::Modules { root } => cmd_modules(&root),
    }
}

fn cmd_pack(args: PackArgs) -> Result<()> {
    if !args.root.is_dir() {
        bail!("root module {} is not a directory", args.root.display());
    }
    let base = match &args.base {
        Some(base) => base.clone(),
        None => repo_root(&args.root)?,
    };
    debug!(root = %args.root.display(), base = %base.display(), "packing");

    let options = ArchiveOptions::default()
        .max_size(args.max_size)
        .ignore_file_name(args.ignore_file)
        .dereference(!args.no_dereference);
    let mut archive = Archive::new(&args.root, &base, options).context("prepare archive")?;
    archive.walk().context("resolve local modules")?;
    let root_path = archive.root_path()?;

    let slug = match &args.manifest {
        Some(name) => {
            let options = args
                .labels
                .iter()
                .fold(PayloadOptions::default(), |o, (k, v)| o.label(k, v));
            let payload = archive
                .payload(name.as_str(), args.namespace.as_str(), &options)
                .context("build payload")?;
            eprintln!(
                "{} bytes for {}/{}",
                payload.len(),
                payload.namespace,
                payload.name
            );
            let mut manifest = payload.to_manifest()?;
            manifest.push('\n');
            manifest.into_bytes()
        }
        None => {
            let (slug, meta) = archive.pack_to_vec().context("pack slug")?;
            eprintln!(
                "{} entries, {} bytes ({} compressed)",
                meta.files.len(),
                meta.size,
                meta.compressed_size
            );
            slug
        }
    };
    write_output(&args.out, &slug)?;

    eprintln!("root module at {}", root_path.display());
    Ok(())
}

fn cmd_unpack(archive: &Path, destination: &Path) -> Result<()> {
    let file = File::open(archive).with_context(|| format!("open {}", archive.display()))?;
    fs::create_dir_all(destination)
        .with_context(|| format!("create {}", destination.display()))?;

    let unpacked = extract(io::BufReader::new(file), destination)
        .with_context(|| format!("extract {}", archive.display()))?;
    eprintln!("{} entries, {} bytes", unpacked.entries.len(), unpacked.total_bytes);
    Ok(())
}

fn cmd_modules(root: &Path) -> Result<()> {
    let base = repo_root(root)?;
    let mut archive = Archive::new(root, base, ArchiveOptions::default())?;
    archive.walk().context("resolve local modules")?;

    for module in archive.modules() {
        println!("{}", module.display());
    }
    Ok(())
}

/// Write a finished slug; a file only appears once it is complete.
fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if path == Path::new("-") {
        let mut stdout = io::stdout().lock();
        stdout.write_all(bytes).context("write stdout")?;
        return stdout.flush().context("flush stdout");
    }

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(dir)
        .with_context(|| format!("create temporary file in {}", dir.display()))?;
    staged
        .write_all(bytes)
        .with_context(|| format!("write {}", staged.path().display()))?;
    staged
        .persist(path)
        .with_context(|| format!("create {}", path.display()))?;
    Ok(())
}

/// Nearest ancestor of `root` holding a `.git` entry, else `root` itself.
fn repo_root(root: &Path) -> Result<PathBuf> {
    let root = etok_fs::absolute(root)?;
    Ok(root
        .ancestors()
        .find(|dir| dir.join(".git").exists())
        .unwrap_or(&root)
        .to_path_buf())
}

fn parse_label(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_owned(), v.to_owned())),
        _ => Err(format!("expected KEY=VALUE, got `{s}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::tempdir;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn pack_defaults() {
        let cli = Cli::try_parse_from(["slug", "pack", "envs/prod"]).unwrap();
        let Command::Pack(args) = cli.command else {
            panic!("expected pack");
        };
        assert_eq!(args.out, Path::new("config.tar.gz"));
        assert_eq!(args.ignore_file, ".terraformignore");
        assert!(!args.no_dereference);
        assert!(args.manifest.is_none());
    }

    #[test]
    fn labels_require_manifest() {
        assert!(Cli::try_parse_from(["slug", "pack", ".", "--label", "a=b"]).is_err());
        let cli =
            Cli::try_parse_from(["slug", "pack", ".", "--manifest", "run-1", "--label", "a=b"])
                .unwrap();
        let Command::Pack(args) = cli.command else {
            panic!("expected pack");
        };
        assert_eq!(args.labels, vec![("a".to_owned(), "b".to_owned())]);
    }

    #[test]
    fn parse_label_rejects_missing_key() {
        assert!(parse_label("=v").is_err());
        assert!(parse_label("novalue").is_err());
        assert_eq!(parse_label("k=").unwrap(), ("k".to_owned(), String::new()));
    }

    /// Deterministic incompressible bytes.
    fn noise(len: usize) -> Vec<u8> {
        let mut state: u32 = 0x9e37_79b9;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 24) as u8
            })
            .collect()
    }

    fn pack_args(args: &[&str]) -> PackArgs {
        let cli = Cli::try_parse_from(["slug", "pack"].iter().chain(args)).unwrap();
        let Command::Pack(args) = cli.command else {
            panic!("expected pack");
        };
        args
    }

    #[test]
    fn failed_pack_leaves_no_output() {
        let dir = tempdir().unwrap();
        let module = dir.path().join("m0");
        fs::create_dir(&module).unwrap();
        fs::write(module.join("random.bin"), noise(4000)).unwrap();
        let out = dir.path().join("out.tar.gz");

        let args = pack_args(&[
            module.to_str().unwrap(),
            "--base",
            dir.path().to_str().unwrap(),
            "--out",
            out.to_str().unwrap(),
            "--max-size",
            "100",
        ]);
        let err = cmd_pack(args).unwrap_err();

        assert!(format!("{err:#}").contains("max config size exceeded (100 bytes)"));
        assert!(!out.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn successful_pack_writes_output() {
        let dir = tempdir().unwrap();
        let module = dir.path().join("m0");
        fs::create_dir(&module).unwrap();
        fs::write(module.join("main.tf"), "terraform {}\n").unwrap();
        let out = dir.path().join("out.tar.gz");

        let args = pack_args(&[
            module.to_str().unwrap(),
            "--base",
            dir.path().to_str().unwrap(),
            "--out",
            out.to_str().unwrap(),
        ]);
        cmd_pack(args).unwrap();

        let dst = dir.path().join("unpacked");
        cmd_unpack(&out, &dst).unwrap();
        assert_eq!(
            fs::read_to_string(dst.join("m0/main.tf")).unwrap(),
            "terraform {}\n"
        );
    }

    #[test]
    fn repo_root_finds_git_ancestor() {
        let repo = tempdir().unwrap();
        fs::create_dir(repo.path().join(".git")).unwrap();
        fs::create_dir_all(repo.path().join("envs/prod")).unwrap();

        let found = repo_root(&repo.path().join("envs/prod")).unwrap();
        assert_eq!(found, repo.path());
    }

    #[test]
    fn repo_root_falls_back_to_root() {
        let dir = tempdir().unwrap();
        let module = dir.path().join("m0");
        fs::create_dir(&module).unwrap();

        // a `.git` higher up than the tempdir would be found first
        let found = repo_root(&module).unwrap();
        assert!(found == module || found.join(".git").exists());
    }
}
