use clap::{Parser, Subcommand};
use iconmaker::{Converter, TargetFormat, config, output, package};
use std::path::PathBuf;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "iconmaker")]
#[command(about = "Build ICO and ICNS icons from PNG and GIF images")]
#[command(long_about = "\
Build ICO and ICNS icons from PNG and GIF images

Images may be local paths or http(s) URLs. Standard sizes (16, 32, 64, 128,
256, 512, 1024) smaller than the largest image are generated by downscaling
it. Each format then keeps only the sizes it supports:

  ICO:   multiples of 8 below 256
  ICNS:  16, 32 and 128

Without --output the icon is written to a new output_* file in the temp
directory. The path of the result is printed on the last line.

Run 'iconmaker gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (defaults are used when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Parent directory for intermediate files (overrides `temp_dir`)
    #[arg(long, global = true)]
    temp_dir: Option<PathBuf>,

    /// Log stage details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert images into an icon container
    Convert {
        /// Container format: ico or icns
        target: String,
        /// Source images (paths or URLs)
        #[arg(required = true)]
        images: Vec<String>,
        /// Where to write the icon
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check an icon container and list its sizes
    Verify {
        /// Container format: ico or icns
        target: TargetFormat,
        path: PathBuf,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Convert {
            target,
            images,
            output,
        } => {
            let mut config = config::load_config(cli.config.as_deref())?;
            if let Some(dir) = cli.temp_dir {
                config.temp_dir = Some(dir);
            }
            let converter = Converter::new(&config)?;
            let conversion = converter.convert(&target, &images, output.as_deref())?;
            output::print_conversion(&conversion);
        }
        Command::Verify { target, path } => {
            let sizes = package::verify_container(target, &path)?;
            output::print_verify(target, &path, &sizes);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
