use std::{net::IpAddr, path::PathBuf};

use clap::Parser;

pub const DEFAULT_PORT: u16 = 443;
pub const DEFAULT_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_TLS_CERT_FILE: &str = "/etc/webhook/certs/cert.pem";
pub const DEFAULT_TLS_KEY_FILE: &str = "/etc/webhook/certs/key.pem";

#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    /// webhook server port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// address the webhook server binds to
    #[arg(long, default_value = DEFAULT_ADDRESS)]
    pub address: IpAddr,
    /// file containing the x509 certificate for HTTPS
    #[arg(long = "tlsCertFile", default_value = DEFAULT_TLS_CERT_FILE)]
    pub tls_cert_file: PathBuf,
    /// file containing the x509 private key matching --tlsCertFile
    #[arg(long = "tlsKeyFile", default_value = DEFAULT_TLS_KEY_FILE)]
    pub tls_key_file: PathBuf,
    /// YAML file overriding the ignored namespaces and the injected DNS settings
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose_logging: bool,
    /// enable trace output (more detailed than verbose, overrides it if present)
    #[arg(long = "trace")]
    pub trace_logging: bool,
}

impl Cli {
    pub fn get_log_level(&self) -> LogLevel {
        if self.trace_logging {
            return LogLevel::Trace;
        }

        if self.verbose_logging {
            return LogLevel::Verbose;
        }

        LogLevel::Normal
    }
}

pub enum LogLevel {
    Normal,
    Verbose,
    Trace,
}
