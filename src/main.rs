use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use unraidcli_install::install::{self, GlobalOptions};

/// unraidcli-install - installer for the unraidcli command-line tool
///
/// Downloads the prebuilt unraidcli release for this machine, verifies it
/// against the SHA-256 pinned in the formula, installs it atomically and
/// runs `unraidcli --version` as a smoke test.
///
/// If the GITHUB_TOKEN environment variable is set, it will be used for authentication.
///
/// Examples:
///   unraidcli-install install                     # Install into the default bin dir
///   unraidcli-install install --bin-dir ~/bin     # Install into ~/bin
///   unraidcli-install --os linux --arch arm64 resolve
#[derive(Parser, Debug)]
#[command(author, version = env!("UNRAIDCLI_INSTALL_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Formula document to use instead of the built-in one (also via UNRAIDCLI_FORMULA)
    #[arg(long, env = "UNRAIDCLI_FORMULA", value_name = "PATH", global = true)]
    pub formula: Option<PathBuf>,

    /// Override the detected operating system (darwin, linux)
    #[arg(long, value_name = "OS", global = true)]
    pub os: Option<String>,

    /// Override the detected CPU architecture (amd64, arm64)
    #[arg(long, value_name = "ARCH", global = true)]
    pub arch: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Download, verify and install unraidcli
    Install(InstallArgs),

    /// Show the release target selected for this platform
    Resolve,

    /// Verify a local file against the pinned digest for this platform
    Verify(VerifyArgs),

    /// Run `unraidcli --version` on an existing installation
    Check(CheckArgs),

    /// Show the formula
    Info(InfoArgs),
}

#[derive(clap::Args, Debug)]
pub struct InstallArgs {
    /// Directory to install into (also via UNRAIDCLI_BIN_DIR)
    #[arg(long, env = "UNRAIDCLI_BIN_DIR", value_name = "DIR")]
    pub bin_dir: Option<PathBuf>,

    /// Skip running `unraidcli --version` after installing
    #[arg(long)]
    pub no_self_check: bool,
}

#[derive(clap::Args, Debug)]
pub struct VerifyArgs {
    /// The downloaded artifact
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct CheckArgs {
    /// Directory unraidcli is installed in (also via UNRAIDCLI_BIN_DIR)
    #[arg(long, env = "UNRAIDCLI_BIN_DIR", value_name = "DIR")]
    pub bin_dir: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct InfoArgs {
    /// Print the formula as JSON
    #[arg(long)]
    pub json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = unraidcli_install::runtime::RealRuntime;
    let options = GlobalOptions {
        formula: cli.formula,
        os: cli.os,
        arch: cli.arch,
    };

    match cli.command {
        Commands::Install(args) => {
            install::install(runtime, &options, args.bin_dir, !args.no_self_check).await?
        }
        Commands::Resolve => install::resolve(runtime, &options)?,
        Commands::Verify(args) => install::verify_file(runtime, &options, &args.file)?,
        Commands::Check(args) => install::check(runtime, args.bin_dir)?,
        Commands::Info(args) => install::info(runtime, &options, args.json)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_install_parsing() {
        let cli = Cli::try_parse_from(&["unraidcli-install", "install"]).unwrap();
        match cli.command {
            Commands::Install(args) => {
                assert!(!args.no_self_check);
            }
            _ => panic!("Expected Install command"),
        }
        assert_eq!(cli.formula, None);
        assert_eq!(cli.os, None);
    }

    #[test]
    fn test_cli_install_bin_dir_parsing() {
        let cli = Cli::try_parse_from(&[
            "unraidcli-install",
            "install",
            "--bin-dir",
            "/tmp/bin",
            "--no-self-check",
        ])
        .unwrap();
        match cli.command {
            Commands::Install(args) => {
                assert_eq!(args.bin_dir, Some(PathBuf::from("/tmp/bin")));
                assert!(args.no_self_check);
            }
            _ => panic!("Expected Install command"),
        }
    }

    #[test]
    fn test_cli_global_platform_parsing() {
        let cli = Cli::try_parse_from(&[
            "unraidcli-install",
            "--os",
            "linux",
            "resolve",
            "--arch",
            "arm64",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Resolve));
        assert_eq!(cli.os.as_deref(), Some("linux"));
        assert_eq!(cli.arch.as_deref(), Some("arm64"));
    }

    #[test]
    fn test_cli_verify_parsing() {
        let cli =
            Cli::try_parse_from(&["unraidcli-install", "verify", "./unraidcli-linux-amd64"])
                .unwrap();
        match cli.command {
            Commands::Verify(args) => {
                assert_eq!(args.file, PathBuf::from("./unraidcli-linux-amd64"));
            }
            _ => panic!("Expected Verify command"),
        }
    }

    #[test]
    fn test_cli_info_json_parsing() {
        let cli = Cli::try_parse_from(&["unraidcli-install", "info", "--json"]).unwrap();
        match cli.command {
            Commands::Info(args) => assert!(args.json),
            _ => panic!("Expected Info command"),
        }
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        let result = Cli::try_parse_from(&["unraidcli-install"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_verify_requires_file() {
        let result = Cli::try_parse_from(&["unraidcli-install", "verify"]);
        assert!(result.is_err());
    }
}
