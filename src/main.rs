use clap::{CommandFactory, Parser, Subcommand};
use snapo_core::capture::CaptureManager;
use snapo_core::link::{discover_servers, LinkConnection, LinkRecord, LinkSession};
use snapo_core::{AdbClient, DeviceTracker};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "snapo-core")]
#[command(about = "Snap-O's ADB client, device tracker, capture/recording/preview sessions, and Link client")]
struct Cli {
    /// ADB server host address.
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// ADB server port.
    #[arg(short = 'P', long, default_value_t = 5037)]
    port: u16,

    /// Path to the `adb` binary, used only to restart the server if a
    /// connection is refused.
    #[arg(long, default_value = "adb")]
    adb_binary: String,

    /// Target device serial number.
    #[arg(short, long)]
    serial: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Get ADB server version.
    Version,

    /// List connected devices. With --track, follow changes live instead of
    /// printing a single snapshot.
    Devices {
        #[arg(long)]
        track: bool,
    },

    /// Run a shell command on the device.
    Shell {
        /// Shell command to execute.
        #[arg(trailing_var_arg = true)]
        command: Vec<String>,
    },

    /// Push a local file to the device.
    Push {
        /// Local file path.
        local: PathBuf,
        /// Remote file path on device.
        remote: String,
    },

    /// Pull a file from the device.
    Pull {
        /// Remote file path on device.
        remote: String,
        /// Local file path.
        local: PathBuf,
    },

    /// Stream device logs (logcat).
    Logcat,

    /// Stat a remote file on the device.
    Stat {
        /// Remote path on device.
        path: String,
    },

    /// List a remote directory on the device.
    Ls {
        /// Remote directory path on device.
        path: String,
    },

    /// Take a screenshot and save it as a PNG.
    Screenshot {
        /// Local path to write the PNG to.
        out: PathBuf,
    },

    /// Record the screen until Ctrl-C, then save an MP4.
    Record {
        /// Local path to write the MP4 to.
        out: PathBuf,
    },

    /// Stream a live H.264 preview and report each NAL unit's type/size.
    Preview,

    /// Inspect a device's Snap-O Link servers.
    Link {
        #[command(subcommand)]
        action: LinkAction,
    },
}

#[derive(Subcommand)]
enum LinkAction {
    /// List discoverable Snap-O Link sockets on the device.
    List,
    /// Connect to a Link socket and print each record received. The NDJSON
    /// pretty-printing CLI layer itself is out of scope; this only proves
    /// the core record stream works end to end.
    Watch {
        /// Socket name reported by `link list`, without the leading `@`.
        socket: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let command = match cli.command {
        Some(cmd) => cmd,
        None => {
            Cli::command().print_help()?;
            println!();
            return Ok(());
        }
    };

    let client = AdbClient::with_adb_binary(&cli.host, cli.port, cli.adb_binary.clone());

    match command {
        Commands::Version => {
            let version = client.server_version().await?;
            println!("ADB server version: {}", version);
        }
        Commands::Devices { track: false } => {
            let devices = client.list_devices().await?;
            print_devices(&devices);
        }
        Commands::Devices { track: true } => {
            let tracker = DeviceTracker::new(Arc::new(client));
            let mut rx = tracker.subscribe();
            tracker.spawn();
            println!("Tracking devices (Ctrl-C to stop)...");
            while let Ok(devices) = rx.recv().await {
                print_devices(&devices);
                println!("---");
            }
        }
        Commands::Shell { command } => {
            if command.is_empty() {
                eprintln!("Error: no shell command specified");
                std::process::exit(1);
            }
            let cmd = command.join(" ");
            let output = client.shell(cli.serial.as_deref(), &cmd).await?;
            print!("{}", output);
        }
        Commands::Push { local, remote } => {
            client.push(cli.serial.as_deref(), &local, &remote).await?;
            println!("Pushed {} -> {}", local.display(), remote);
        }
        Commands::Pull { remote, local } => {
            client.pull(cli.serial.as_deref(), &remote, &local).await?;
            println!("Pulled {} -> {}", remote, local.display());
        }
        Commands::Logcat => {
            let mut stream = client.logcat(cli.serial.as_deref()).await?;
            let mut stdout = tokio::io::stdout();
            tokio::io::copy(&mut stream, &mut stdout).await?;
        }
        Commands::Stat { path } => {
            let stat = client.stat(cli.serial.as_deref(), &path).await?;
            println!("Mode:     {:o}", stat.mode);
            println!("Size:     {} bytes", stat.size);
            println!("Modified: {} (unix timestamp)", stat.mtime);
            if stat.is_file() {
                println!("Type:     regular file");
            } else if stat.is_directory() {
                println!("Type:     directory");
            }
        }
        Commands::Ls { path } => {
            let entries = client.list_dir(cli.serial.as_deref(), &path).await?;
            if entries.is_empty() {
                println!("(empty)");
            } else {
                for entry in &entries {
                    let type_char = if (entry.mode & 0o170000) == 0o040000 {
                        'd'
                    } else {
                        '-'
                    };
                    println!(
                        "{}{:o}  {:>8}  {}",
                        type_char,
                        entry.mode & 0o7777,
                        entry.size,
                        entry.name
                    );
                }
            }
        }
        Commands::Screenshot { out } => {
            let serial = require_serial(&cli.serial)?;
            let manager = CaptureManager::new(Arc::new(client));
            let shot = manager.screenshot(serial).await?;
            tokio::fs::write(&out, &shot.png_data).await?;
            println!(
                "Wrote {}x{} screenshot to {}",
                shot.width,
                shot.height,
                out.display()
            );
        }
        Commands::Record { out } => {
            let serial = require_serial(&cli.serial)?.to_string();
            let manager = CaptureManager::new(Arc::new(client));
            let session = manager.start_recording(&serial).await?;
            println!("Recording... press Enter to stop.");
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).ok();
            let result = manager.stop_recording(session, &out).await?;
            match result.metadata {
                Ok(meta) => println!(
                    "Saved {} ({}x{}, {:?})",
                    out.display(),
                    meta.width,
                    meta.height,
                    meta.duration
                ),
                Err(e) => println!("Saved {}, but metadata parse failed: {}", out.display(), e),
            }
        }
        Commands::Preview => {
            let serial = require_serial(&cli.serial)?.to_string();
            let manager = CaptureManager::new(Arc::new(client));
            let mut session = manager.start_preview(&serial).await?;
            println!("Streaming preview... press Ctrl-C to stop.");
            while let Some(unit) = session.units.recv().await {
                println!("NAL type={} len={}", unit.nal_type, unit.data.len());
            }
        }
        Commands::Link { action } => match action {
            LinkAction::List => {
                let serial = require_serial(&cli.serial)?;
                let sockets = discover_servers(&client, serial).await?;
                if sockets.is_empty() {
                    println!("No Snap-O Link sockets found.");
                } else {
                    for socket in sockets {
                        println!("{}", socket);
                    }
                }
            }
            LinkAction::Watch { socket } => {
                let serial = require_serial(&cli.serial)?.to_string();
                let client = Arc::new(client);
                let connection = LinkConnection::connect(client, &serial, &socket).await?;
                let mut session = LinkSession::start(connection).await?;
                while let Some(record) = session.records.recv().await {
                    match record {
                        LinkRecord::FeatureEvent { feature, payload } => {
                            println!("[{}] {}", feature, payload);
                        }
                        other => println!("{:?}", other),
                    }
                }
            }
        },
    }

    Ok(())
}

fn print_devices(devices: &[snapo_core::DeviceInfo]) {
    if devices.is_empty() {
        println!("No devices connected.");
        return;
    }
    println!("{:<24} State", "Serial");
    for d in devices {
        println!("{:<24} {}", d.serial, d.state);
    }
}

fn require_serial(serial: &Option<String>) -> Result<&str, &'static str> {
    serial
        .as_deref()
        .ok_or("this command requires --serial <SERIAL>")
}
