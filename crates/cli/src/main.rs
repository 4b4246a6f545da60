use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use sshmount_hosts::{AuthMethod, HostProfile, HostStore};
use sshmount_mounter::{
    mounts, preflight, LocalSpawner, MountEvent, Mounter, QueueSink,
};
use std::path::PathBuf;
use std::process::ExitCode;

mod prompt;

#[derive(Parser)]
#[command(name = "sshmount", version, about = "Mount remote filesystems over SSH")]
struct Cli {
    /// Hosts file to use instead of ~/.ssh/mounter/hosts.json
    #[arg(long, global = true)]
    hosts_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List saved hosts
    List,
    /// Save a new host
    Add {
        /// Display name for the host
        #[arg(long)]
        name: String,
        /// SSH user
        #[arg(long)]
        user: String,
        /// Hostname or address
        #[arg(long)]
        host: String,
        /// SSH port
        #[arg(long, default_value_t = 22)]
        port: u16,
        /// Remote directory to mount
        #[arg(long)]
        remote_path: String,
        /// Local mount point
        #[arg(long)]
        local_path: PathBuf,
        /// Authentication method
        #[arg(long, value_enum, default_value_t = AuthArg::PublicKey)]
        auth: AuthArg,
    },
    /// Delete a saved host
    Remove {
        /// Name of the host to delete
        name: String,
    },
    /// Mount a saved host
    Mount {
        /// Name of the host to mount
        name: String,
        /// Read the password from stdin instead of prompting on the terminal
        #[arg(long)]
        password_stdin: bool,
        /// On a changed host key, remove the cached key and retry without asking
        #[arg(long)]
        accept_changed_host_key: bool,
    },
    /// Unmount a saved host
    Unmount {
        /// Name of the host to unmount
        name: String,
    },
    /// Show saved hosts with their current mount state
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AuthArg {
    PublicKey,
    Password,
}

impl From<AuthArg> for AuthMethod {
    fn from(value: AuthArg) -> Self {
        match value {
            AuthArg::PublicKey => AuthMethod::PublicKey,
            AuthArg::Password => AuthMethod::Password,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("Error: {err:#}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let path = hosts_path(cli.hosts_file);

    match cli.command {
        Commands::List => cmd_list(path),
        Commands::Add {
            name,
            user,
            host,
            port,
            remote_path,
            local_path,
            auth,
        } => cmd_add(
            path,
            HostProfile {
                name,
                user,
                host,
                port,
                remote_path,
                local_path,
                auth: auth.into(),
            },
        ),
        Commands::Remove { name } => cmd_remove(path, &name),
        Commands::Mount {
            name,
            password_stdin,
            accept_changed_host_key,
        } => cmd_mount(path, &name, password_stdin, accept_changed_host_key).await,
        Commands::Unmount { name } => cmd_unmount(path, &name).await,
        Commands::Status => cmd_status(path).await,
    }
}

/// Resolution order: `--hosts-file`, then `SSHMOUNT_HOSTS`, then the default
/// location under `~/.ssh/mounter/`.
fn hosts_path(cli_path: Option<PathBuf>) -> PathBuf {
    cli_path
        .or_else(|| std::env::var_os("SSHMOUNT_HOSTS").map(PathBuf::from))
        .unwrap_or_else(HostStore::default_path)
}

fn load_store(path: PathBuf) -> anyhow::Result<HostStore> {
    let mut store = HostStore::new(path);
    store.load()?;
    Ok(store)
}

fn find_profile(store: &HostStore, name: &str) -> anyhow::Result<HostProfile> {
    store
        .find_by_name(name)
        .cloned()
        .with_context(|| format!("No host named {name}"))
}

fn format_host(profile: &HostProfile) -> String {
    let auth = match profile.auth {
        AuthMethod::PublicKey => "public-key",
        AuthMethod::Password => "password",
    };
    format!(
        "{:<16} {}:{}  {} -> {}  ({auth})",
        profile.name,
        profile.endpoint(),
        profile.port,
        profile.remote_path,
        profile.local_path.display(),
    )
}

fn cmd_list(path: PathBuf) -> anyhow::Result<()> {
    let store = load_store(path)?;

    if store.hosts().is_empty() {
        println!("No hosts saved.");
        return Ok(());
    }
    for profile in store.hosts() {
        println!("{}", format_host(profile));
    }
    Ok(())
}

fn cmd_add(path: PathBuf, profile: HostProfile) -> anyhow::Result<()> {
    let mut store = load_store(path)?;

    if store.find_by_name(&profile.name).is_some() {
        bail!("A host named {} already exists", profile.name);
    }

    let name = profile.name.clone();
    store.add(profile);
    store.save()?;
    println!("Saved {name}.");
    Ok(())
}

fn cmd_remove(path: PathBuf, name: &str) -> anyhow::Result<()> {
    let mut store = load_store(path)?;

    let index = store
        .hosts()
        .iter()
        .position(|h| h.name == name)
        .with_context(|| format!("No host named {name}"))?;

    store.remove(index);
    store.save()?;
    println!("Removed {name}.");
    Ok(())
}

async fn cmd_mount(
    path: PathBuf,
    name: &str,
    password_stdin: bool,
    accept_changed_host_key: bool,
) -> anyhow::Result<()> {
    let store = load_store(path)?;
    let profile = find_profile(&store, name)?;

    if !preflight::sshfs_installed() {
        bail!("sshfs was not found on PATH. Install sshfs and try again.");
    }
    if !preflight::fuse_available() {
        eprintln!("Warning: FUSE does not look available on this system.");
    }

    let sink = QueueSink::new();
    let mut mounter = Mounter::new(LocalSpawner::new(), sink.clone());
    mounter.mount(&profile).await?;

    Driver {
        mounter,
        sink,
        profile,
        password_stdin,
        accept_changed_host_key,
        failure: None,
    }
    .run()
    .await
}

async fn cmd_unmount(path: PathBuf, name: &str) -> anyhow::Result<()> {
    let store = load_store(path)?;
    let profile = find_profile(&store, name)?;

    let sink = QueueSink::new();
    let mut mounter = Mounter::new(LocalSpawner::new(), sink.clone());
    mounter.unmount(&profile.local_path).await?;

    Driver {
        mounter,
        sink,
        profile,
        password_stdin: false,
        accept_changed_host_key: false,
        failure: None,
    }
    .run()
    .await
}

async fn cmd_status(path: PathBuf) -> anyhow::Result<()> {
    let store = load_store(path)?;

    println!(
        "sshfs: {}",
        if preflight::sshfs_installed() {
            "found"
        } else {
            "not found"
        }
    );
    println!(
        "fuse:  {}",
        if preflight::fuse_available() {
            "available"
        } else {
            "not available"
        }
    );

    if store.hosts().is_empty() {
        println!("No hosts saved.");
        return Ok(());
    }

    let lines = mounts::list_active(&LocalSpawner::new()).await?;
    for profile in store.hosts() {
        let tag = if mounts::endpoint_is_mounted(&lines, &profile.endpoint()) {
            "[mounted]    "
        } else {
            "[not mounted]"
        };
        println!("{tag} {}", format_host(profile));
    }
    Ok(())
}

/// Drives one mount or unmount operation to completion: pumps the
/// orchestrator and turns its events into terminal interaction.
struct Driver {
    mounter: Mounter<LocalSpawner, QueueSink>,
    sink: QueueSink,
    profile: HostProfile,
    password_stdin: bool,
    accept_changed_host_key: bool,
    failure: Option<String>,
}

impl Driver {
    async fn run(mut self) -> anyhow::Result<()> {
        loop {
            // Events queued before the first pump (progress, the up-front
            // credential request in password mode) must be handled before
            // blocking on helper output, or a stdin-reading helper deadlocks.
            self.apply_pending().await?;
            if let Some(message) = self.failure.take() {
                return Err(anyhow::anyhow!(message));
            }

            if !self.mounter.pump().await {
                self.apply_pending().await?;
                return match self.failure.take() {
                    Some(message) => Err(anyhow::anyhow!(message)),
                    None => Ok(()),
                };
            }
        }
    }

    async fn apply_pending(&mut self) -> anyhow::Result<()> {
        for event in self.sink.drain() {
            match event {
                MountEvent::StateChanged(state) => tracing::debug!(?state, "state changed"),
                MountEvent::Progress(message) => println!("{message}"),
                MountEvent::CredentialRequired => {
                    let secret = if self.password_stdin {
                        prompt::read_line_from_stdin()?
                    } else {
                        prompt::read_secret(&format!(
                            "Password for {}: ",
                            self.profile.endpoint()
                        ))?
                    };
                    self.mounter.supply_credential(&secret).await;
                }
                MountEvent::HostKeyMismatch => {
                    eprintln!(
                        "WARNING: host identification for {} has changed.",
                        self.profile.host
                    );
                    let retry = self.accept_changed_host_key
                        || prompt::confirm("Remove the cached host key and retry?")?;
                    if retry {
                        self.mounter.remove_host_key_and_retry().await?;
                    } else {
                        self.mounter.decline_credential();
                        self.mounter.reset();
                        bail!("Mount aborted: the remote host key does not match the cached one");
                    }
                }
                MountEvent::MountSucceeded => println!(
                    "Mounted {} at {}",
                    self.profile.remote_spec(),
                    self.profile.local_path.display()
                ),
                MountEvent::UnmountSucceeded => {
                    println!("Unmounted {}", self.profile.local_path.display())
                }
                MountEvent::MountFailed(message) => self.failure = Some(message),
            }
        }
        Ok(())
    }
}
