use {
    anyhow::{Result, format_err},
    clap::{Parser, Subcommand},
    derive_more::{From, Into},
    std::{path::PathBuf, str::FromStr},
};

#[derive(Debug, Parser)]
pub struct Cli {
    #[clap(long)]
    pub config: Option<PathBuf>,
    /// Overrides `base_path` from the config.
    #[clap(long)]
    pub base_path: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Print the data name and directory key of an account slot.
    FileName {
        #[arg(default_value_t = 0)]
        index: usize,
    },
    /// Verify a plain record and list its fields.
    Dump { name: String },
    /// Unlock the key data and list the account indices.
    Unlock {
        #[arg(long)]
        show_key: bool,
    },
    /// Decrypt a record with the unlocked local key and list its fields.
    Decrypt {
        name: String,
        /// Sub-directory the record lives in, e.g. an account directory.
        #[arg(long)]
        dir: Option<String>,
    },
    /// Create key data with a fresh local key.
    CreateKey {
        #[arg(long, value_delimiter = ',', default_value = "0")]
        accounts: Vec<i32>,
        /// Replace existing key data.
        #[arg(long)]
        force: bool,
    },
    /// Pick an unused file key in the base directory.
    GenerateKey,
    /// Decode a serialized location.
    Location {
        bytes: HexArg,
        /// Decode as an image location with dimensions.
        #[arg(long)]
        image: bool,
    },
}

/// Hex-encoded bytes given on the command line.
#[derive(Debug, Clone, PartialEq, Eq, From, Into)]
pub struct HexArg(pub Vec<u8>);

impl FromStr for HexArg {
    type Err = anyhow::Error;

    fn from_str(input: &str) -> Result<Self> {
        let input: String = input.chars().filter(|c| !c.is_whitespace()).collect();
        hex::decode(&input)
            .map(Self)
            .map_err(|err| format_err!("invalid hex input: {err}"))
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test")]
mod tests {
    use super::*;

    #[test]
    fn parse_commands() {
        let cli = Cli::try_parse_from(["tdstore", "--base-path", "/tmp/tdata", "file-name", "2"])
            .unwrap();
        assert_eq!(cli.base_path, Some(PathBuf::from("/tmp/tdata")));
        assert_eq!(cli.command, Command::FileName { index: 2 });

        let cli = Cli::try_parse_from(["tdstore", "create-key", "--accounts", "0,1"]).unwrap();
        assert_eq!(
            cli.command,
            Command::CreateKey {
                accounts: vec![0, 1],
                force: false
            }
        );

        let cli = Cli::try_parse_from(["tdstore", "location", "00 00 10 02"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Location {
                bytes: HexArg(vec![0, 0, 0x10, 2]),
                image: false
            }
        );
    }

    #[test]
    fn bad_hex() {
        assert!("0g".parse::<HexArg>().is_err());
        assert!("abc".parse::<HexArg>().is_err());
    }
}
