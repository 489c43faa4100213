pub mod cli;
pub mod config;
mod inspect;
pub mod term;

use {
    anyhow::{Context as _, Result, bail},
    cli::{Cli, Command},
    config::Config,
    fs_err as fs,
    inspect::{describe_location, fields_table},
    std::{
        io::{self, Write},
        path::Path,
        sync::Mutex,
    },
    tdstore_sdk::{
        LocalKey, Passcode,
        key_data::{KeyData, UnlockedKeyData},
        record::{RecordStore, WriteOutcome, compose_data_name, data_name_key},
    },
    term::TermLayer,
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt},
};

pub fn setup_logger(log_file: Option<&Path>, log_filter: &str) -> Result<()> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(log_writer(log_file)?));
    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(EnvFilter::try_new(log_filter)?)
        .with(TermLayer)
        .init();
    Ok(())
}

/// Appends to `log_file`. Without a file only the terminal layer reports events.
fn log_writer(log_file: Option<&Path>) -> Result<Box<dyn Write + Send>> {
    Ok(match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            Box::new(fs::OpenOptions::new().create(true).append(true).open(path)?)
        }
        None => Box::new(io::sink()),
    })
}

pub fn run(cli: Cli, mut config: Config) -> Result<()> {
    if let Some(base_path) = cli.base_path {
        config.base_path = Some(base_path);
    }
    handle_command(cli.command, &config)
}

fn handle_command(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::FileName { index } => {
            let data_name = compose_data_name(&config.data_name, index);
            info!(
                "data name: {data_name}, directory: {}",
                data_name_key(&data_name)
            );
        }
        Command::Dump { name } => {
            let store = store(config)?;
            let record = store
                .read(&name)
                .with_context(|| format!("no valid copy of {name:?} found"))?;
            let table = fields_table(record.stream());
            info!("version: {}", record.version());
            info!("{table}");
        }
        Command::Unlock { show_key } => {
            let unlocked = unlock(config)?;
            info!("accounts: {:?}", unlocked.account_indices);
            if show_key {
                info!("local key: {}", unlocked.local_key.display_unmasked());
            }
        }
        Command::Decrypt { name, dir } => {
            let unlocked = unlock(config)?;
            let mut store = store(config)?;
            if let Some(dir) = dir {
                store = store.child(&dir);
            }
            let record = store.read_encrypted(&name, &unlocked.local_key)?;
            let table = fields_table(record.stream());
            info!("version: {}", record.version());
            info!("{table}");
        }
        Command::CreateKey { accounts, force } => {
            let store = RecordStore::open(config.base_path()?, config.app_version)?;
            if !force && KeyData::read(&store, &config.data_name).is_some() {
                bail!("key data already exists, use --force to replace it");
            }
            let passcode = passcode(config, "New passcode: ")?;
            let key_data = KeyData::create(&passcode, &LocalKey::generate(), &accounts);
            match key_data.write(&store, &config.data_name)? {
                WriteOutcome::Committed => info!("key data written"),
                WriteOutcome::Degraded => warn!("key data written without the safe copy"),
            }
        }
        Command::GenerateKey => {
            let key = store(config)?.generate_key();
            info!("{key}");
        }
        Command::Location { bytes, image } => {
            let described = describe_location(&bytes.0, image)?;
            info!("{described}");
        }
    }
    Ok(())
}

fn store(config: &Config) -> Result<RecordStore> {
    let base_path = config.base_path()?;
    if !base_path.is_dir() {
        bail!("base path {base_path:?} is not a directory");
    }
    Ok(RecordStore::new(base_path, config.app_version))
}

fn unlock(config: &Config) -> Result<UnlockedKeyData> {
    let key_data = KeyData::read(&store(config)?, &config.data_name)
        .with_context(|| format!("no key data for {:?}", config.data_name))?;
    let passcode = passcode(config, "Passcode: ")?;
    Ok(key_data.unlock(&passcode)?)
}

fn passcode(config: &Config, prompt: &str) -> Result<Passcode> {
    if let Some(passcode) = &config.passcode {
        return Ok(passcode.as_str().into());
    }
    Ok(rpassword::prompt_password(prompt)?.into())
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test")]
mod tests {
    use {
        super::*,
        clap::Parser,
        tdstore_sdk::{crypto::EncryptedDescriptor, key_data::DEFAULT_DATA_NAME},
        tempfile::TempDir,
    };

    fn config(base: &Path) -> Config {
        Config {
            base_path: Some(base.to_path_buf()),
            app_version: 5_001_000,
            data_name: DEFAULT_DATA_NAME.into(),
            passcode: Some("1234".into()),
            log_file: None,
            log_filter: "info".into(),
        }
    }

    fn run_args(config: &Config, args: &[&str]) -> Result<()> {
        let cli = Cli::try_parse_from(std::iter::once("tdstore").chain(args.iter().copied()))?;
        run(cli, config.clone())
    }

    #[test]
    fn key_data_flow() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("tdata");
        let config = config(&base);

        run_args(&config, &["create-key", "--accounts", "0,2"]).unwrap();
        assert!(run_args(&config, &["create-key"]).is_err());
        run_args(&config, &["unlock"]).unwrap();
        run_args(&config, &["dump", "key_data"]).unwrap();

        let unlocked = unlock(&config).unwrap();
        assert_eq!(unlocked.account_indices, [0, 2]);

        let store = RecordStore::new(&base, config.app_version).child("D877F783D5D3EF8C");
        fs::create_dir(store.base()).unwrap();
        let mut descriptor = EncryptedDescriptor::new();
        descriptor.stream().write_bytes(b"settings");
        let mut writer = store.writer("maps");
        writer.write_encrypted(descriptor, &unlocked.local_key);
        writer.finish().unwrap();
        run_args(&config, &["decrypt", "maps", "--dir", "D877F783D5D3EF8C"]).unwrap();

        let mut wrong = config.clone();
        wrong.passcode = Some("4321".into());
        assert!(run_args(&wrong, &["unlock"]).is_err());
    }

    #[test]
    fn missing_base_path() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir.path().join("missing"));
        assert!(run_args(&config, &["dump", "settings"]).is_err());
        run_args(&config, &["file-name", "1"]).unwrap();
        assert!(run_args(&config, &["generate-key"]).is_err());
        assert!(run_args(&config, &["location", "0000100203000000"]).is_err());
    }
}
