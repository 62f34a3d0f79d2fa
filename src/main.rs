#[macro_use]
extern crate tracing;

use std::{
    net::{AddrParseError, IpAddr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

use color_eyre::eyre::{eyre, WrapErr};
use futures::future::{join_all, try_join_all};
use structopt::StructOpt;
use strum_macros::EnumString;
use tokio::{runtime::Builder, signal};

use lanlights::{
    animation::AnimationEngine,
    color::Color,
    config::Config,
    device::Light,
    protocol::{DeviceId, DEFAULT_PORT},
};

#[derive(Debug, StructOpt)]
struct Opts {
    #[structopt(short, long, parse(from_occurrences))]
    verbose: u32,
    /// Configuration file, defaults to the user configuration directory
    #[structopt(short, long = "config")]
    config_path: Option<PathBuf>,
    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
struct DeviceOpts {
    /// Device address, with an optional port
    #[structopt(parse(try_from_str = parse_address))]
    address: SocketAddr,
    /// Only accept replies from the device with this MAC address
    #[structopt(short, long)]
    target: Option<DeviceId>,
}

#[derive(Debug, Clone, Copy, EnumString)]
#[strum(serialize_all = "lowercase")]
enum PowerState {
    On,
    Off,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// List the devices on the local network
    Discover,
    /// Turn a device on or off
    Power {
        #[structopt(flatten)]
        device: DeviceOpts,
        state: PowerState,
        #[structopt(short, long, default_value = "0")]
        duration_ms: u64,
    },
    /// Set the color of a device, as `hue,saturation,brightness,kelvin`
    Color {
        #[structopt(flatten)]
        device: DeviceOpts,
        color: Color,
        #[structopt(short, long, default_value = "0")]
        duration_ms: u64,
    },
    /// Run a configured animation until it ends or Ctrl+C is pressed
    Animate {
        /// Name of the animation in the configuration file
        name: String,
        /// Device addresses, with an optional port
        #[structopt(required = true, parse(try_from_str = parse_address))]
        addresses: Vec<SocketAddr>,
        /// Stop after this many seconds
        #[structopt(short, long)]
        seconds: Option<u64>,
    },
    /// Print the configuration in use
    DumpConfig,
}

fn parse_address(src: &str) -> Result<SocketAddr, AddrParseError> {
    src.parse()
        .or_else(|_| src.parse::<IpAddr>().map(|ip| SocketAddr::new(ip, DEFAULT_PORT)))
}

async fn connect(config: &Config, device: &DeviceOpts) -> color_eyre::eyre::Result<Light> {
    Light::connect(device.address, device.target, &config.connect_options())
        .await
        .wrap_err_with(|| format!("failed to connect to {}", device.address))
}

async fn animate(
    config: &Config,
    name: &str,
    addresses: &[SocketAddr],
    seconds: Option<u64>,
) -> color_eyre::eyre::Result<()> {
    let animation = config
        .animations
        .get(name)
        .ok_or_else(|| eyre!("no animation named `{}` in the configuration", name))?;

    let options = config.connect_options();
    let lights = try_join_all(
        addresses
            .iter()
            .map(|address| Light::connect(*address, None, &options)),
    )
    .await?;

    let engine = AnimationEngine::new();
    for light in &lights {
        let id = light.id();
        engine
            .start(
                light.clone(),
                animation.animation.build()?,
                animation.options().on_complete(move |outcome| {
                    info!(%id, ?outcome, "animation finished");
                }),
            )
            .await?;
    }

    let all_ended = join_all(lights.iter().map(|light| engine.wait_for_end(light.id())));
    let timeout = async {
        match seconds {
            Some(seconds) => tokio::time::sleep(Duration::from_secs(seconds)).await,
            None => futures::future::pending().await,
        }
    };

    tokio::select! {
        _ = all_ended => {
            return Ok(());
        }
        _ = timeout => {
            info!("time is up");
        }
        _ = signal::ctrl_c() => {
            info!("interrupted");
        }
    }

    // Apply the end colors, unless interrupted again
    tokio::select! {
        _ = engine.shutdown(false) => {}
        _ = signal::ctrl_c() => {
            engine.shutdown(true).await;
        }
    }

    Ok(())
}

async fn run(opts: Opts) -> color_eyre::eyre::Result<()> {
    let config = match opts.config_path.as_deref() {
        Some(path) => Config::load_file(path).await?,
        None => Config::load_default().await?,
    };

    match opts.command {
        Command::Discover => {
            let lights = config.discovery().run().await?;

            if lights.is_empty() {
                eprintln!("no device found");
            }

            for light in lights {
                println!("{}", light.info());
            }
        }
        Command::Power {
            device,
            state,
            duration_ms,
        } => {
            let light = connect(&config, &device).await?;
            light
                .set_power(
                    matches!(state, PowerState::On),
                    Duration::from_millis(duration_ms),
                    true,
                )
                .await?;
        }
        Command::Color {
            device,
            color,
            duration_ms,
        } => {
            let light = connect(&config, &device).await?;
            light
                .set_color(color, Duration::from_millis(duration_ms), true)
                .await?;
        }
        Command::Animate {
            name,
            addresses,
            seconds,
        } => {
            animate(&config, &name, &addresses, seconds).await?;
        }
        Command::DumpConfig => {
            print!("{}", config.to_string()?);
        }
    }

    Ok(())
}

fn install_tracing(opts: &Opts) -> Result<(), tracing_subscriber::util::TryInitError> {
    use tracing_error::ErrorLayer;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let fmt_layer = fmt::layer().with_writer(std::io::stderr);

    let filter_layer = EnvFilter::try_from_env("LANLIGHTS_LOG").unwrap_or_else(|_| {
        EnvFilter::new(match opts.verbose {
            0 => "lanlights=warn",
            1 => "lanlights=info",
            2 => "lanlights=debug",
            _ => "lanlights=trace",
        })
    });

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .try_init()
}

#[paw::main]
fn main(opts: Opts) -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    install_tracing(&opts)?;

    // Create tokio runtime
    let thd_count = match num_cpus::get() {
        1 => 2,
        other => other.min(4),
    };

    let rt = Builder::new_multi_thread()
        .worker_threads(thd_count)
        .enable_all()
        .build()?;
    rt.block_on(run(opts))
}
