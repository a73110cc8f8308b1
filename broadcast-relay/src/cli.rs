use std::net::SocketAddr;

use clap::Parser;

use crate::config::{DEFAULT_READ_BUFFER_SIZE, RelayConfig, WriteFailurePolicy};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Socket address the relay should bind to. Use port 0 for an ephemeral port.
    #[arg(long, default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// Largest chunk, in bytes, read from a peer before it is relayed.
    #[arg(long, default_value_t = DEFAULT_READ_BUFFER_SIZE, value_parser = parse_buffer_size)]
    pub read_buffer_size: usize,

    /// What to do with a peer whose connection rejects a relayed chunk.
    #[arg(long, value_enum, default_value_t = WriteFailurePolicy::Drop)]
    pub on_write_error: WriteFailurePolicy,
}

impl Cli {
    pub fn into_config(self) -> RelayConfig {
        RelayConfig {
            listen: self.listen,
            read_buffer_size: self.read_buffer_size,
            on_write_error: self.on_write_error,
        }
    }
}

fn parse_buffer_size(value: &str) -> Result<usize, String> {
    let size: usize = value
        .parse()
        .map_err(|err| format!("'{value}' is not a byte count: {err}"))?;
    if size == 0 {
        return Err("read buffer size must be at least 1 byte".to_string());
    }
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_arguments_matches_default_config() {
        let cli = Cli::try_parse_from(["broadcast-relay"]).expect("parse defaults");
        assert_eq!(cli.into_config(), RelayConfig::default());
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "broadcast-relay",
            "--listen",
            "127.0.0.1:4000",
            "--read-buffer-size",
            "64",
            "--on-write-error",
            "log",
        ])
        .expect("parse flags");
        let config = cli.into_config();
        assert_eq!(config.listen, "127.0.0.1:4000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.read_buffer_size, 64);
        assert_eq!(config.on_write_error, WriteFailurePolicy::Log);
    }

    #[test]
    fn zero_buffer_size_is_rejected() {
        let result = Cli::try_parse_from(["broadcast-relay", "--read-buffer-size", "0"]);
        assert!(result.is_err());
    }
}
